//! Single-level change-tracking mapping.

use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlmodel_json_core::{Error, Result};

use crate::notify::{ChangeListener, Node, Notify, Parent};
use crate::shape::{MutationTracker, Shape, reject};

type Entries = IndexMap<String, serde_json::Value>;

/// A JSON object that reports its own top-level mutations.
///
/// Values are stored as plain JSON. Getters hand out copies, so editing a
/// nested object means re-assigning it through [`insert`](Self::insert);
/// use [`TrackedDict`](crate::TrackedDict) for in-place nested edits.
#[derive(Clone)]
pub struct MutableDict {
    node: Rc<Node<Entries>>,
}

impl MutableDict {
    pub fn new() -> Self {
        Self::from_map(serde_json::Map::new())
    }

    /// Copy a plain object into a new, detached mapping.
    pub fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            node: Node::new("mutable_dict", map.into_iter().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.node.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.read().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.node.read().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.node.read().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.node.read().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, serde_json::Value)> {
        self.node
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn insert(
        &self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        let (key, value) = (key.into(), value.into());
        self.node.mutate("insert", |entries| entries.insert(key, value))
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.node.mutate("remove", |entries| entries.shift_remove(key))
    }

    /// Remove `key`, failing if it is missing.
    pub fn pop(&self, key: &str) -> Result<serde_json::Value> {
        self.node
            .mutate("pop", |entries| entries.shift_remove(key))
            .ok_or_else(|| Error::missing_key(key))
    }

    /// Remove and return the most recently inserted entry.
    pub fn pop_item(&self) -> Option<(String, serde_json::Value)> {
        self.node.mutate("pop_item", |entries| entries.pop())
    }

    pub fn set_default(
        &self,
        key: impl Into<String>,
        default: impl Into<serde_json::Value>,
    ) -> serde_json::Value {
        let (key, default) = (key.into(), default.into());
        self.node.mutate("set_default", |entries| {
            entries.entry(key).or_insert(default).clone()
        })
    }

    pub fn update<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        let staged: Vec<(String, serde_json::Value)> = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self.node.mutate("update", |current| current.extend(staged));
    }

    /// Like [`update`](Self::update) over a fallible source; pairs produced
    /// before the first error stay applied.
    pub fn try_update<I, K, V, E>(&self, entries: I) -> std::result::Result<(), E>
    where
        I: IntoIterator<Item = std::result::Result<(K, V), E>>,
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        let mut staged = Vec::new();
        let mut failure = None;
        for entry in entries {
            match entry {
                Ok((key, value)) => staged.push((key.into(), value.into())),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        self.node.mutate("try_update", |current| current.extend(staged));
        failure.map_or(Ok(()), Err)
    }

    pub fn clear(&self) {
        self.node.mutate("clear", |entries| entries.clear());
    }

    /// Signal a change without mutating anything.
    pub fn changed(&self) {
        self.node.signal("changed");
    }

    fn to_plain_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.node
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl MutationTracker for MutableDict {
    const EXPECTED: &'static str = "object";

    fn coerce(value: Shape<Self>) -> Result<Option<Self>> {
        match value {
            Shape::Absent => Ok(None),
            Shape::Tracked(dict) => Ok(Some(dict)),
            Shape::Mapping(map) => Ok(Some(Self::from_map(map))),
            other => Err(reject(Self::EXPECTED, &other)),
        }
    }

    fn to_plain(&self) -> serde_json::Value {
        serde_json::Value::Object(self.to_plain_map())
    }

    fn deep_copy(&self) -> Self {
        Self::from_map(self.to_plain_map())
    }

    fn is_attached(&self) -> bool {
        self.node.parent().is_live()
    }

    fn set_listener(&self, listener: Option<Weak<dyn ChangeListener>>) {
        self.node
            .set_parent(listener.map_or(Parent::Detached, Parent::Listener));
    }
}

impl Default for MutableDict {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MutableDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutableDict").field(&self.to_plain()).finish()
    }
}

impl PartialEq for MutableDict {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node) || *self.node.read() == *other.node.read()
    }
}

impl PartialEq<serde_json::Value> for MutableDict {
    fn eq(&self, other: &serde_json::Value) -> bool {
        other
            .as_object()
            .is_some_and(|map| &self.to_plain_map() == map)
    }
}

impl PartialEq<MutableDict> for serde_json::Value {
    fn eq(&self, other: &MutableDict) -> bool {
        other == self
    }
}

impl Serialize for MutableDict {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.node.read().iter())
    }
}

impl<'de> Deserialize<'de> for MutableDict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Map::deserialize(deserializer).map(Self::from_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counter(Cell<usize>);

    impl ChangeListener for Counter {
        fn changed(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn tracked(value: serde_json::Value) -> (MutableDict, Rc<Counter>) {
        let dict = MutableDict::coerce(Shape::from(value)).unwrap().unwrap();
        let counter = Rc::new(Counter::default());
        dict.attach(&counter);
        (dict, counter)
    }

    #[test]
    fn top_level_assignment_signals() {
        let (handles, counter) = tracked(json!({"twitter": "@JohnDoe"}));
        handles.insert("twitter", "@JDoe");
        assert_eq!(handles, json!({"twitter": "@JDoe"}));
        assert_eq!(counter.0.get(), 1);
    }

    #[test]
    fn same_value_assignment_still_signals() {
        let (handles, counter) = tracked(json!({"a": 1}));
        handles.insert("a", 1);
        assert_eq!(counter.0.get(), 1);
    }

    #[test]
    fn mutating_surface_signals_each_call() {
        let (dict, counter) = tracked(json!({"a": 1, "b": 2}));
        assert_eq!(dict.remove("a"), Some(json!(1)));
        assert!(dict.pop("missing").is_err());
        assert_eq!(dict.pop_item(), Some(("b".to_string(), json!(2))));
        assert_eq!(dict.set_default("c", 3), json!(3));
        assert_eq!(dict.set_default("c", 4), json!(3));
        dict.update([("d", json!({"nested": true}))]);
        let failed: std::result::Result<(), &str> =
            dict.try_update(vec![Ok(("e", 5)), Err("nope")]);
        assert_eq!(failed, Err("nope"));
        dict.clear();
        assert_eq!(counter.0.get(), 8);
    }

    #[test]
    fn nested_values_are_plain_copies() {
        let (dict, counter) = tracked(json!({"nested": {"x": 1}}));
        let mut nested = dict.get("nested").unwrap();
        nested["x"] = json!(2);
        assert_eq!(dict, json!({"nested": {"x": 1}}));
        assert_eq!(counter.0.get(), 0);

        dict.insert("nested", nested);
        assert_eq!(dict, json!({"nested": {"x": 2}}));
        assert_eq!(counter.0.get(), 1);
    }

    #[test]
    fn reads_do_not_signal() {
        let (dict, counter) = tracked(json!({"a": 1}));
        assert!(dict.contains_key("a"));
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.keys(), vec!["a"]);
        assert_eq!(dict.entries().len(), 1);
        assert_eq!(counter.0.get(), 0);
    }

    #[test]
    fn coerce_copies_plain_and_keeps_tracked() {
        assert!(MutableDict::coerce(Shape::from(json!(7))).unwrap_err().is_coercion());
        assert!(MutableDict::coerce(Shape::from(json!(["x"]))).unwrap_err().is_coercion());
        let existing = MutableDict::new();
        let same = MutableDict::coerce(Shape::Tracked(existing.clone())).unwrap().unwrap();
        assert!(Rc::ptr_eq(&existing.node, &same.node));
    }

    #[test]
    fn serializes_in_insertion_order() {
        let dict = MutableDict::from_map(json!({"b": 1, "a": 2}).as_object().cloned().unwrap());
        assert_eq!(serde_json::to_string(&dict).unwrap(), r#"{"b":1,"a":2}"#);
        let back: MutableDict = serde_json::from_str(r#"{"b":1,"a":2}"#).unwrap();
        assert_eq!(back, dict);
    }
}
