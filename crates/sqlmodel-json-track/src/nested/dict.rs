//! Nested change-tracking mapping.

use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlmodel_json_core::{Error, Result};

use super::{TrackedList, TrackedValue};
use crate::notify::{ChangeListener, Node, Notify, Owner, Parent};
use crate::shape::{MutationTracker, Shape, json_kind, reject};

type Entries = IndexMap<String, TrackedValue>;

/// A JSON object whose mutations, and those of every container inside it,
/// are reported upwards.
///
/// Keys keep insertion order. Re-assigning an existing key keeps its
/// position; removal preserves the order of the remaining keys.
#[derive(Clone)]
pub struct TrackedDict {
    node: Rc<Node<Entries>>,
}

impl TrackedDict {
    /// Create an empty, detached mapping.
    pub fn new() -> Self {
        Self {
            node: Node::new("dict", IndexMap::new()),
        }
    }

    /// Wrap a plain object, tracking every nested object and array.
    pub fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        let dict = Self::new();
        let owner = dict.owner();
        {
            let mut entries = dict.node.write();
            entries.reserve(map.len());
            for (key, value) in map {
                let child = TrackedValue::wrap(value);
                child.set_parent(owner.link());
                entries.insert(key, child);
            }
        }
        dict
    }

    fn owner(&self) -> Owner {
        Owner::of(&self.node)
    }

    pub(crate) fn node_addr(&self) -> *const () {
        Rc::as_ptr(&self.node).cast()
    }

    pub(crate) fn parent(&self) -> Parent {
        self.node.parent()
    }

    pub(crate) fn set_parent(&self, parent: Parent) {
        self.node.set_parent(parent);
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

    /// Handle to the value under `key`.
    ///
    /// Containers come back as live handles: mutating them marks this
    /// mapping (and its root) changed.
    pub fn get(&self, key: &str) -> Option<TrackedValue> {
        self.node.read().get(key).cloned()
    }

    pub fn get_dict(&self, key: &str) -> Option<TrackedDict> {
        self.get(key).and_then(|value| value.as_dict().cloned())
    }

    pub fn get_list(&self, key: &str) -> Option<TrackedList> {
        self.get(key).and_then(|value| value.as_list().cloned())
    }

    pub fn keys(&self) -> Vec<String> {
        self.node.read().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<TrackedValue> {
        self.node.read().values().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, TrackedValue)> {
        self.node
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Set `key` to `value`, returning the detached previous value.
    pub fn insert(
        &self,
        key: impl Into<String>,
        value: impl Into<TrackedValue>,
    ) -> Option<TrackedValue> {
        let key = key.into();
        let value = value.into().adopt(&self.owner());
        self.node.mutate("insert", |entries| {
            entries.insert(key, value).inspect(TrackedValue::detach)
        })
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&self, key: &str) -> Option<TrackedValue> {
        self.take("remove", key)
    }

    /// Remove `key`, failing if it is missing.
    pub fn pop(&self, key: &str) -> Result<TrackedValue> {
        self.take("pop", key).ok_or_else(|| Error::missing_key(key))
    }

    fn take(&self, op: &'static str, key: &str) -> Option<TrackedValue> {
        self.node.mutate(op, |entries| {
            entries.shift_remove(key).inspect(TrackedValue::detach)
        })
    }

    /// Remove and return the most recently inserted entry.
    pub fn pop_item(&self) -> Option<(String, TrackedValue)> {
        self.node.mutate("pop_item", |entries| {
            entries.pop().inspect(|(_, value)| value.detach())
        })
    }

    /// Return the value under `key`, inserting `default` first if absent.
    pub fn set_default(
        &self,
        key: impl Into<String>,
        default: impl Into<TrackedValue>,
    ) -> TrackedValue {
        let key = key.into();
        let value = match self.get(&key) {
            Some(existing) => existing,
            None => {
                let value = default.into().adopt(&self.owner());
                self.node.write().insert(key, value.clone());
                value
            }
        };
        self.node.signal("set_default");
        value
    }

    /// Insert every `(key, value)` pair, later pairs winning.
    pub fn update<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<TrackedValue>,
    {
        let owner = self.owner();
        let staged: Vec<(String, TrackedValue)> = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value.into().adopt(&owner)))
            .collect();
        self.apply("update", staged);
    }

    /// Like [`update`](Self::update) over a fallible source.
    ///
    /// Pairs produced before the first error stay applied, and the change is
    /// signalled either way.
    pub fn try_update<I, K, V, E>(&self, entries: I) -> std::result::Result<(), E>
    where
        I: IntoIterator<Item = std::result::Result<(K, V), E>>,
        K: Into<String>,
        V: Into<TrackedValue>,
    {
        let owner = self.owner();
        let mut staged = Vec::new();
        let mut failure = None;
        for entry in entries {
            match entry {
                Ok((key, value)) => staged.push((key.into(), value.into().adopt(&owner))),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        self.apply("try_update", staged);
        failure.map_or(Ok(()), Err)
    }

    /// Merge a plain JSON object into this mapping.
    pub fn merge(&self, other: serde_json::Value) -> Result<()> {
        match other {
            serde_json::Value::Object(map) => {
                self.update(map);
                Ok(())
            }
            other => {
                self.node.signal("merge");
                Err(Error::coercion("object", json_kind(&other)))
            }
        }
    }

    fn apply(&self, op: &'static str, staged: Vec<(String, TrackedValue)>) {
        self.node.mutate(op, |entries| {
            for (key, value) in staged {
                if let Some(previous) = entries.insert(key, value) {
                    previous.detach();
                }
            }
        });
    }

    pub fn clear(&self) {
        self.node.mutate("clear", |entries| {
            for value in entries.values() {
                value.detach();
            }
            entries.clear();
        });
    }

    /// Signal a change without mutating anything.
    pub fn changed(&self) {
        self.node.signal("changed");
    }

    fn to_plain_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.node
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.to_plain()))
            .collect()
    }
}

impl MutationTracker for TrackedDict {
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
        self.parent().is_live()
    }

    fn set_listener(&self, listener: Option<Weak<dyn ChangeListener>>) {
        self.set_parent(listener.map_or(Parent::Detached, Parent::Listener));
    }
}

impl Default for TrackedDict {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrackedDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TrackedDict").field(&self.to_plain()).finish()
    }
}

impl PartialEq for TrackedDict {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node) || self.to_plain_map() == other.to_plain_map()
    }
}

impl PartialEq<serde_json::Value> for TrackedDict {
    fn eq(&self, other: &serde_json::Value) -> bool {
        other
            .as_object()
            .is_some_and(|map| &self.to_plain_map() == map)
    }
}

impl PartialEq<TrackedDict> for serde_json::Value {
    fn eq(&self, other: &TrackedDict) -> bool {
        other == self
    }
}

impl Serialize for TrackedDict {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let entries = self.node.read();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TrackedDict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Map::deserialize(deserializer).map(Self::from_map)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for TrackedDict {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self::from_map(map)
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

    fn tracked(value: serde_json::Value) -> (TrackedDict, Rc<Counter>) {
        let dict = TrackedDict::coerce(Shape::from(value)).unwrap().unwrap();
        let counter = Rc::new(Counter::default());
        dict.attach(&counter);
        (dict, counter)
    }

    #[test]
    fn nested_increment_reaches_root_once() {
        let (root, counter) = tracked(json!({"github.com": {"x": 4, "y": 7}}));
        let site = root.get_dict("github.com").unwrap();
        let x = site.get("x").and_then(|v| v.as_i64()).unwrap();
        site.insert("x", x + 10);

        assert_eq!(root, json!({"github.com": {"x": 14, "y": 7}}));
        assert_eq!(counter.0.get(), 1);
    }

    #[test]
    fn inserted_plain_structure_becomes_tracked() {
        let (root, counter) = tracked(json!({}));
        root.insert("a", json!({"b": 1}));
        root.get_dict("a").unwrap().insert("b", 2);

        assert_eq!(root, json!({"a": {"b": 2}}));
        assert_eq!(counter.0.get(), 2);
    }

    #[test]
    fn every_mutating_call_signals_once() {
        let (root, counter) = tracked(json!({"a": 1, "b": 2, "c": 3}));
        root.insert("a", 1);
        assert_eq!(root.remove("b"), Some(TrackedValue::from(2)));
        assert!(root.remove("missing").is_none());
        assert_eq!(root.pop_item().map(|(k, _)| k), Some("c".to_string()));
        root.set_default("d", json!([]));
        root.update([("e", 5), ("f", 6)]);
        root.clear();
        assert_eq!(counter.0.get(), 7);
        assert!(root.is_empty());
    }

    #[test]
    fn pop_missing_key_fails_but_still_signals() {
        let (root, counter) = tracked(json!({"a": 1}));
        let err = root.pop("zzz").unwrap_err();
        assert_eq!(
            err.lookup_kind(),
            Some(sqlmodel_json_core::LookupErrorKind::Key)
        );
        assert_eq!(counter.0.get(), 1);
        assert_eq!(root.pop("a").unwrap(), json!(1));
    }

    #[test]
    fn try_update_keeps_pairs_before_failure() {
        let (root, counter) = tracked(json!({}));
        let source: Vec<std::result::Result<(&str, i64), &str>> =
            vec![Ok(("a", 1)), Ok(("b", 2)), Err("boom"), Ok(("c", 3))];
        assert_eq!(root.try_update(source), Err("boom"));
        assert_eq!(root, json!({"a": 1, "b": 2}));
        assert_eq!(counter.0.get(), 1);
    }

    #[test]
    fn merge_requires_object() {
        let (root, counter) = tracked(json!({"github.com": {"a": 4}}));
        let site = root.get_dict("github.com").unwrap();
        site.merge(json!({"someone/somerepo": 10})).unwrap();
        assert_eq!(
            root,
            json!({"github.com": {"a": 4, "someone/somerepo": 10}})
        );
        assert!(site.merge(json!([1])).unwrap_err().is_coercion());
        assert_eq!(counter.0.get(), 2);
    }

    #[test]
    fn set_default_returns_existing() {
        let (root, _counter) = tracked(json!({"tags": ["a"]}));
        let tags = root.set_default("tags", json!([]));
        assert_eq!(tags, json!(["a"]));
        let fresh = root.set_default("other", json!({"k": 1}));
        fresh.as_dict().unwrap().insert("k", 2);
        assert_eq!(root.get("other").unwrap(), json!({"k": 2}));
    }

    #[test]
    fn replaced_child_is_detached() {
        let (root, counter) = tracked(json!({"a": {"b": 1}}));
        let stale = root.get_dict("a").unwrap();
        root.insert("a", 5);
        assert_eq!(counter.0.get(), 1);

        stale.insert("b", 2);
        assert_eq!(counter.0.get(), 1);
        assert!(!stale.is_attached());
    }

    #[test]
    fn removed_child_can_move_to_another_key() {
        let (root, counter) = tracked(json!({"old": {"v": 1}}));
        let moved = root.remove("old").unwrap();
        root.insert("new", moved.clone());
        moved.as_dict().unwrap().insert("v", 2);

        assert_eq!(root, json!({"new": {"v": 2}}));
        assert_eq!(counter.0.get(), 3);
    }

    #[test]
    fn owned_child_is_copied_on_second_insert() {
        let (root, counter) = tracked(json!({"a": {"v": 1}}));
        let original = root.get("a").unwrap();
        root.insert("b", original.clone());

        root.get_dict("b").unwrap().insert("v", 2);
        assert_eq!(root, json!({"a": {"v": 1}, "b": {"v": 2}}));
        original.as_dict().unwrap().insert("v", 3);
        assert_eq!(root, json!({"a": {"v": 3}, "b": {"v": 2}}));
        assert_eq!(counter.0.get(), 3);
    }

    #[test]
    fn inserting_into_itself_inserts_a_copy() {
        let dict = TrackedDict::from_map(json!({"k": 1}).as_object().cloned().unwrap());
        dict.insert("me", dict.clone());
        assert_eq!(dict, json!({"k": 1, "me": {"k": 1}}));

        let child = dict.get_dict("me").unwrap();
        child.insert("parent", dict.clone());
        assert_eq!(child, json!({"k": 1, "parent": {"k": 1, "me": {"k": 1}}}));
    }

    #[test]
    fn key_order_is_preserved() {
        let (root, _counter) = tracked(json!({"z": 1, "a": 2, "m": 3}));
        root.insert("a", 20);
        root.remove("z");
        root.insert("b", 4);
        assert_eq!(root.keys(), vec!["a", "m", "b"]);
        assert_eq!(
            serde_json::to_string(&root).unwrap(),
            r#"{"a":20,"m":3,"b":4}"#
        );
    }

    #[test]
    fn coerce_rejects_non_objects() {
        let err = TrackedDict::coerce(Shape::from(json!([1, 2]))).unwrap_err();
        assert_eq!(err.to_string(), "Coercion error: cannot coerce array into object");
        assert!(TrackedDict::coerce(Shape::Absent).unwrap().is_none());

        let existing = TrackedDict::new();
        let same = TrackedDict::coerce(Shape::Tracked(existing.clone()))
            .unwrap()
            .unwrap();
        assert!(Rc::ptr_eq(&same.node, &existing.node));
    }

    #[test]
    fn deep_copy_is_independent() {
        let (root, counter) = tracked(json!({"refs": {"a": [1]}}));
        let copy = root.deep_copy();
        copy.get_dict("refs").unwrap().insert("b", 10);
        copy.insert("modified", true);

        assert_eq!(root, json!({"refs": {"a": [1]}}));
        assert!(!copy.is_attached());
        assert_eq!(counter.0.get(), 0);
    }

    #[test]
    fn deserialized_tree_is_wired() {
        let dict: TrackedDict =
            serde_json::from_str(r#"{"numbers": [1, 2, 3, {"4": 4}]}"#).unwrap();
        let counter = Rc::new(Counter::default());
        dict.attach(&counter);

        let numbers = dict.get_list("numbers").unwrap();
        numbers.push(5);
        numbers.get(3).unwrap().as_dict().unwrap().insert("5", 5);
        assert_eq!(dict, json!({"numbers": [1, 2, 3, {"4": 4, "5": 5}, 5]}));
        assert_eq!(counter.0.get(), 2);
    }

    #[test]
    fn equality_and_truthiness_match_plain() {
        let empty = TrackedDict::new();
        assert!(empty.is_empty());
        assert_eq!(empty, json!({}));
        assert_eq!(json!({}), empty);

        let full = TrackedDict::from(json!({"a": 1}).as_object().cloned().unwrap());
        assert!(!full.is_empty());
        assert_ne!(full, json!({"a": 2}));
        assert_ne!(full, json!([1]));
    }
}
