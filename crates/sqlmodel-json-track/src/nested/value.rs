//! A single slot in a nested tracked tree.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{TrackedDict, TrackedList};
use crate::notify::{Owner, Parent};
use crate::shape::MutationTracker;

/// A value held inside a nested tracked container.
///
/// Objects and arrays are always wrapped (`Dict`/`List`) so mutations at
/// any depth reach the root; everything else stays a plain scalar. Cloning a
/// `TrackedValue` clones the handle, not the tree: use
/// [`deep_copy`](Self::deep_copy) for an independent structure.
#[derive(Clone)]
pub enum TrackedValue {
    Scalar(serde_json::Value),
    Dict(TrackedDict),
    List(TrackedList),
}

impl TrackedValue {
    /// Wrap a plain value, recursively tracking every object and array in it.
    ///
    /// The returned value is detached; inserting it into a container adopts it.
    pub fn wrap(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => TrackedValue::Dict(TrackedDict::from_map(map)),
            serde_json::Value::Array(items) => TrackedValue::List(TrackedList::from_vec(items)),
            scalar => TrackedValue::Scalar(scalar),
        }
    }

    /// Rebuild the plain, untracked equivalent.
    pub fn to_plain(&self) -> serde_json::Value {
        match self {
            TrackedValue::Scalar(value) => value.clone(),
            TrackedValue::Dict(dict) => dict.to_plain(),
            TrackedValue::List(list) => list.to_plain(),
        }
    }

    /// An independent, detached copy of this value.
    pub fn deep_copy(&self) -> Self {
        match self {
            TrackedValue::Scalar(value) => TrackedValue::Scalar(value.clone()),
            TrackedValue::Dict(dict) => TrackedValue::Dict(dict.deep_copy()),
            TrackedValue::List(list) => TrackedValue::List(list.deep_copy()),
        }
    }

    pub fn is_composite(&self) -> bool {
        !matches!(self, TrackedValue::Scalar(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TrackedValue::Scalar(serde_json::Value::Null))
    }

    pub fn as_dict(&self) -> Option<&TrackedDict> {
        match self {
            TrackedValue::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&TrackedList> {
        match self {
            TrackedValue::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&serde_json::Value> {
        match self {
            TrackedValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_scalar().and_then(serde_json::Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_scalar().and_then(serde_json::Value::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_scalar().and_then(serde_json::Value::as_bool)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(serde_json::Value::as_str)
    }

    fn parent(&self) -> Parent {
        match self {
            TrackedValue::Scalar(_) => Parent::Detached,
            TrackedValue::Dict(dict) => dict.parent(),
            TrackedValue::List(list) => list.parent(),
        }
    }

    fn node_addr(&self) -> Option<*const ()> {
        match self {
            TrackedValue::Scalar(_) => None,
            TrackedValue::Dict(dict) => Some(dict.node_addr()),
            TrackedValue::List(list) => Some(list.node_addr()),
        }
    }

    pub(crate) fn set_parent(&self, parent: Parent) {
        match self {
            TrackedValue::Scalar(_) => {}
            TrackedValue::Dict(dict) => dict.set_parent(parent),
            TrackedValue::List(list) => list.set_parent(parent),
        }
    }

    /// Cut the link to the container that used to hold this value.
    pub(crate) fn detach(&self) {
        self.set_parent(Parent::Detached);
    }

    /// Prepare this value for insertion into `owner`.
    ///
    /// A detached container is re-parented in place. A container that is
    /// still held elsewhere, or that is `owner` itself or one of its
    /// ancestors, is deep-copied so every node keeps exactly one owner and
    /// the tree stays acyclic.
    pub(crate) fn adopt(self, owner: &Owner) -> Self {
        let adopted = match self {
            TrackedValue::Scalar(value) => match value {
                composite @ (serde_json::Value::Object(_) | serde_json::Value::Array(_)) => {
                    TrackedValue::wrap(composite)
                }
                scalar => return TrackedValue::Scalar(scalar),
            },
            composite => {
                let shared = composite.parent().is_live()
                    || composite.node_addr().is_some_and(|addr| owner.is_within(addr));
                if shared {
                    tracing::trace!("Inserting a copy of a container that is already owned");
                    composite.deep_copy()
                } else {
                    composite
                }
            }
        };
        adopted.set_parent(owner.link());
        adopted
    }
}

impl Default for TrackedValue {
    fn default() -> Self {
        TrackedValue::Scalar(serde_json::Value::Null)
    }
}

impl fmt::Debug for TrackedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackedValue::Scalar(value) => fmt::Debug::fmt(value, f),
            TrackedValue::Dict(dict) => fmt::Debug::fmt(dict, f),
            TrackedValue::List(list) => fmt::Debug::fmt(list, f),
        }
    }
}

impl PartialEq for TrackedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TrackedValue::Scalar(a), TrackedValue::Scalar(b)) => a == b,
            _ => self.to_plain() == other.to_plain(),
        }
    }
}

impl PartialEq<serde_json::Value> for TrackedValue {
    fn eq(&self, other: &serde_json::Value) -> bool {
        match self {
            TrackedValue::Scalar(value) => value == other,
            _ => &self.to_plain() == other,
        }
    }
}

impl PartialEq<TrackedValue> for serde_json::Value {
    fn eq(&self, other: &TrackedValue) -> bool {
        other == self
    }
}

impl Serialize for TrackedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TrackedValue::Scalar(value) => value.serialize(serializer),
            TrackedValue::Dict(dict) => dict.serialize(serializer),
            TrackedValue::List(list) => list.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TrackedValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(TrackedValue::wrap)
    }
}

impl From<serde_json::Value> for TrackedValue {
    fn from(value: serde_json::Value) -> Self {
        TrackedValue::wrap(value)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for TrackedValue {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        TrackedValue::Dict(TrackedDict::from_map(map))
    }
}

impl From<TrackedDict> for TrackedValue {
    fn from(dict: TrackedDict) -> Self {
        TrackedValue::Dict(dict)
    }
}

impl From<TrackedList> for TrackedValue {
    fn from(list: TrackedList) -> Self {
        TrackedValue::List(list)
    }
}

macro_rules! scalar_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for TrackedValue {
                fn from(value: $ty) -> Self {
                    TrackedValue::Scalar(serde_json::Value::from(value))
                }
            }
        )*
    };
}

scalar_from!(bool, i32, i64, u32, u64, f64, String, &str);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrap_tracks_every_container() {
        let value = TrackedValue::wrap(json!({"a": [1, {"b": 2}], "c": "x"}));
        let dict = value.as_dict().unwrap();
        let list = dict.get_list("a").unwrap();
        assert!(list.get(1).unwrap().as_dict().is_some());
        assert_eq!(dict.get("c").unwrap().as_str(), Some("x"));
    }

    #[test]
    fn scalars_stay_plain() {
        let value = TrackedValue::wrap(json!(4));
        assert!(!value.is_composite());
        assert_eq!(value.as_i64(), Some(4));
        assert!(TrackedValue::default().is_null());
    }

    #[test]
    fn compares_with_plain_values() {
        let value = TrackedValue::wrap(json!({"k": [true, null]}));
        assert_eq!(value, json!({"k": [true, null]}));
        assert_eq!(json!({"k": [true, null]}), value);
        assert_ne!(value, json!({"k": [false, null]}));
        assert_eq!(value, value.deep_copy());
    }

    #[test]
    fn scalar_variant_holding_object_is_wrapped_on_adopt() {
        let parent = TrackedDict::new();
        parent.insert("raw", TrackedValue::Scalar(json!({"x": 1})));
        assert!(parent.get("raw").unwrap().as_dict().is_some());
    }

    #[test]
    fn serializes_like_plain() {
        let doc = json!({"z": [1, 2, {"y": null}], "a": "b"});
        let value = TrackedValue::wrap(doc.clone());
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            serde_json::to_string(&doc).unwrap()
        );
        let back: TrackedValue = serde_json::from_str(r#"{"n": [1]}"#).unwrap();
        assert_eq!(back, json!({"n": [1]}));
    }
}
