//! Nested mutation tracking.
//!
//! Every object and array reachable from the root is wrapped when the root
//! is built and whenever a new one is inserted, so an edit at any depth is
//! reported up to the root's listener:
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use serde_json::json;
//! use sqlmodel_json_track::{ChangeListener, MutationTracker, NestedMutableJson, Shape};
//!
//! #[derive(Default)]
//! struct Dirty(Cell<bool>);
//!
//! impl ChangeListener for Dirty {
//!     fn changed(&self) {
//!         self.0.set(true);
//!     }
//! }
//!
//! let refs = NestedMutableJson::coerce(Shape::from(json!({"github.com": {"stars": 4}})))
//!     .unwrap()
//!     .unwrap();
//! let dirty = Rc::new(Dirty::default());
//! refs.attach(&dirty);
//!
//! let site = refs.as_dict().unwrap().get_dict("github.com").unwrap();
//! site.insert("stars", 5);
//! assert!(dirty.0.get());
//! assert_eq!(refs, json!({"github.com": {"stars": 5}}));
//! ```

mod dict;
mod list;
mod value;

pub use dict::TrackedDict;
pub use list::TrackedList;
pub use value::TrackedValue;

use std::rc::Weak;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlmodel_json_core::Result;

use crate::notify::ChangeListener;
use crate::shape::{MutationTracker, Shape, reject};

/// Root of a nested tracked tree: an object or an array.
#[derive(Debug, Clone, PartialEq)]
pub enum NestedMutableJson {
    Dict(TrackedDict),
    List(TrackedList),
}

impl NestedMutableJson {
    pub fn as_dict(&self) -> Option<&TrackedDict> {
        match self {
            NestedMutableJson::Dict(dict) => Some(dict),
            NestedMutableJson::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&TrackedList> {
        match self {
            NestedMutableJson::List(list) => Some(list),
            NestedMutableJson::Dict(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            NestedMutableJson::Dict(dict) => dict.len(),
            NestedMutableJson::List(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signal a change on the root without mutating anything.
    pub fn changed(&self) {
        match self {
            NestedMutableJson::Dict(dict) => dict.changed(),
            NestedMutableJson::List(list) => list.changed(),
        }
    }
}

impl MutationTracker for NestedMutableJson {
    const EXPECTED: &'static str = "object or array";

    fn coerce(value: Shape<Self>) -> Result<Option<Self>> {
        match value {
            Shape::Absent => Ok(None),
            Shape::Tracked(root) => Ok(Some(root)),
            Shape::Mapping(map) => Ok(Some(NestedMutableJson::Dict(TrackedDict::from_map(map)))),
            Shape::Sequence(items) => {
                Ok(Some(NestedMutableJson::List(TrackedList::from_vec(items))))
            }
            other => Err(reject(Self::EXPECTED, &other)),
        }
    }

    fn to_plain(&self) -> serde_json::Value {
        match self {
            NestedMutableJson::Dict(dict) => dict.to_plain(),
            NestedMutableJson::List(list) => list.to_plain(),
        }
    }

    fn deep_copy(&self) -> Self {
        match self {
            NestedMutableJson::Dict(dict) => NestedMutableJson::Dict(dict.deep_copy()),
            NestedMutableJson::List(list) => NestedMutableJson::List(list.deep_copy()),
        }
    }

    fn is_attached(&self) -> bool {
        match self {
            NestedMutableJson::Dict(dict) => dict.is_attached(),
            NestedMutableJson::List(list) => list.is_attached(),
        }
    }

    fn set_listener(&self, listener: Option<Weak<dyn ChangeListener>>) {
        match self {
            NestedMutableJson::Dict(dict) => dict.set_listener(listener),
            NestedMutableJson::List(list) => list.set_listener(listener),
        }
    }
}

impl PartialEq<serde_json::Value> for NestedMutableJson {
    fn eq(&self, other: &serde_json::Value) -> bool {
        match self {
            NestedMutableJson::Dict(dict) => dict == other,
            NestedMutableJson::List(list) => list == other,
        }
    }
}

impl PartialEq<NestedMutableJson> for serde_json::Value {
    fn eq(&self, other: &NestedMutableJson) -> bool {
        other == self
    }
}

impl From<TrackedDict> for NestedMutableJson {
    fn from(dict: TrackedDict) -> Self {
        NestedMutableJson::Dict(dict)
    }
}

impl From<TrackedList> for NestedMutableJson {
    fn from(list: TrackedList) -> Self {
        NestedMutableJson::List(list)
    }
}

impl Serialize for NestedMutableJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            NestedMutableJson::Dict(dict) => dict.serialize(serializer),
            NestedMutableJson::List(list) => list.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for NestedMutableJson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let plain = serde_json::Value::deserialize(deserializer)?;
        match Self::coerce(Shape::from(plain)) {
            Ok(Some(root)) => Ok(root),
            Ok(None) => Err(serde::de::Error::custom("expected an object or array, found null")),
            Err(err) => Err(serde::de::Error::custom(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counter(Cell<usize>);

    impl ChangeListener for Counter {
        fn changed(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn root_shape_follows_input() {
        let dict = NestedMutableJson::coerce(Shape::from(json!({"a": 1}))).unwrap().unwrap();
        assert!(dict.as_dict().is_some());
        let list = NestedMutableJson::coerce(Shape::from(json!([1]))).unwrap().unwrap();
        assert!(list.as_list().is_some());
        assert!(NestedMutableJson::coerce(Shape::from(json!(null))).unwrap().is_none());
    }

    #[test]
    fn scalar_root_is_rejected() {
        let err = NestedMutableJson::coerce(Shape::from(json!(42))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Coercion error: cannot coerce number into object or array"
        );
    }

    #[test]
    fn deep_list_edit_reaches_list_root() {
        let root = NestedMutableJson::coerce(Shape::from(json!([5, 6, 7, {"numbers": [8, 9, 10]}])))
            .unwrap()
            .unwrap();
        let counter = Rc::new(Counter::default());
        root.attach(&counter);

        let numbers = root.as_list().unwrap().get_dict(3).unwrap().get_list("numbers").unwrap();
        numbers.push(11);
        assert_eq!(root, json!([5, 6, 7, {"numbers": [8, 9, 10, 11]}]));
        assert_eq!(counter.0.get(), 1);

        root.detach();
        numbers.push(12);
        assert_eq!(counter.0.get(), 1);
    }

    #[test]
    fn equality_and_truthiness() {
        let empty = NestedMutableJson::coerce(Shape::from(json!([]))).unwrap().unwrap();
        assert!(empty.is_empty());
        assert_eq!(json!([]), empty);
        assert_ne!(empty, json!({}));
    }

    #[test]
    fn deserialize_rejects_scalars() {
        assert!(serde_json::from_str::<NestedMutableJson>("3").is_err());
        assert!(serde_json::from_str::<NestedMutableJson>("null").is_err());
        let root: NestedMutableJson = serde_json::from_str(r#"{"a": [1]}"#).unwrap();
        assert_eq!(root.to_plain(), json!({"a": [1]}));
    }
}
