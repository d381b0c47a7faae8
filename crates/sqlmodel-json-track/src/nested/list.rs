//! Nested change-tracking sequence.

use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlmodel_json_core::{Error, Result};

use super::{TrackedDict, TrackedValue};
use crate::notify::{ChangeListener, Node, Notify, Owner, Parent};
use crate::shape::{MutationTracker, Shape, reject};

/// A JSON array whose mutations, and those of every container inside it,
/// are reported upwards.
#[derive(Clone)]
pub struct TrackedList {
    node: Rc<Node<Vec<TrackedValue>>>,
}

impl TrackedList {
    /// Create an empty, detached sequence.
    pub fn new() -> Self {
        Self {
            node: Node::new("list", Vec::new()),
        }
    }

    /// Wrap a plain array, tracking every nested object and array.
    pub fn from_vec(items: Vec<serde_json::Value>) -> Self {
        let list = Self::new();
        let owner = list.owner();
        {
            let mut slots = list.node.write();
            slots.reserve(items.len());
            for item in items {
                let child = TrackedValue::wrap(item);
                child.set_parent(owner.link());
                slots.push(child);
            }
        }
        list
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

    /// Handle to the item at `index`.
    pub fn get(&self, index: usize) -> Option<TrackedValue> {
        self.node.read().get(index).cloned()
    }

    pub fn get_dict(&self, index: usize) -> Option<TrackedDict> {
        self.get(index).and_then(|value| value.as_dict().cloned())
    }

    pub fn get_list(&self, index: usize) -> Option<TrackedList> {
        self.get(index).and_then(|value| value.as_list().cloned())
    }

    pub fn items(&self) -> Vec<TrackedValue> {
        self.node.read().clone()
    }

    pub fn contains(&self, value: &serde_json::Value) -> bool {
        self.position(value).is_some()
    }

    /// Index of the first item equal to `value`.
    pub fn position(&self, value: &serde_json::Value) -> Option<usize> {
        self.node.read().iter().position(|item| item == value)
    }

    /// Replace the item at `index`, returning the detached old item.
    pub fn set(&self, index: usize, value: impl Into<TrackedValue>) -> Result<TrackedValue> {
        let value = value.into();
        let len = self.len();
        if index >= len {
            self.node.signal("set");
            return Err(Error::index_out_of_range(index, len));
        }
        let value = value.adopt(&self.owner());
        let previous = self
            .node
            .mutate("set", |items| std::mem::replace(&mut items[index], value));
        previous.detach();
        Ok(previous)
    }

    pub fn push(&self, value: impl Into<TrackedValue>) {
        let value = value.into().adopt(&self.owner());
        self.node.mutate("push", |items| items.push(value));
    }

    /// Insert `value` before `index`; `index == len` appends.
    pub fn insert(&self, index: usize, value: impl Into<TrackedValue>) -> Result<()> {
        let value = value.into();
        let len = self.len();
        if index > len {
            self.node.signal("insert");
            return Err(Error::index_out_of_range(index, len));
        }
        let value = value.adopt(&self.owner());
        self.node.mutate("insert", |items| items.insert(index, value));
        Ok(())
    }

    pub fn extend<I, V>(&self, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<TrackedValue>,
    {
        let owner = self.owner();
        let staged: Vec<TrackedValue> = values
            .into_iter()
            .map(|value| value.into().adopt(&owner))
            .collect();
        self.node.mutate("extend", |items| items.extend(staged));
    }

    /// Like [`extend`](Self::extend) over a fallible source.
    ///
    /// Items produced before the first error stay appended, and the change is
    /// signalled either way.
    pub fn try_extend<I, V, E>(&self, values: I) -> std::result::Result<(), E>
    where
        I: IntoIterator<Item = std::result::Result<V, E>>,
        V: Into<TrackedValue>,
    {
        let owner = self.owner();
        let mut staged = Vec::new();
        let mut failure = None;
        for value in values {
            match value {
                Ok(value) => staged.push(value.into().adopt(&owner)),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        self.node.mutate("try_extend", |items| items.extend(staged));
        failure.map_or(Ok(()), Err)
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Option<TrackedValue> {
        self.node
            .mutate("pop", |items| items.pop().inspect(TrackedValue::detach))
    }

    /// Remove and return the item at `index`.
    pub fn remove_at(&self, index: usize) -> Result<TrackedValue> {
        self.node.mutate("remove_at", |items| {
            if index < items.len() {
                let removed = items.remove(index);
                removed.detach();
                Ok(removed)
            } else {
                Err(Error::index_out_of_range(index, items.len()))
            }
        })
    }

    /// Remove the first item equal to `value`.
    pub fn remove(&self, value: &serde_json::Value) -> Result<TrackedValue> {
        self.node.mutate("remove", |items| -> Result<TrackedValue> {
            let index = items
                .iter()
                .position(|item| item == value)
                .ok_or_else(Error::value_not_found)?;
            let removed = items.remove(index);
            removed.detach();
            Ok(removed)
        })
    }

    pub fn clear(&self) {
        self.node.mutate("clear", |items| {
            for item in items.drain(..) {
                item.detach();
            }
        });
    }

    pub fn reverse(&self) {
        self.node.mutate("reverse", |items| items.reverse());
    }

    /// Stable sort with `compare`.
    ///
    /// The items are moved out for the duration of the sort, so `compare`
    /// sees this list as empty.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&TrackedValue, &TrackedValue) -> Ordering,
    {
        let mut items = std::mem::take(&mut *self.node.write());
        items.sort_by(compare);
        *self.node.write() = items;
        self.node.signal("sort");
    }

    /// Signal a change without mutating anything.
    pub fn changed(&self) {
        self.node.signal("changed");
    }

    fn to_plain_vec(&self) -> Vec<serde_json::Value> {
        self.node.read().iter().map(TrackedValue::to_plain).collect()
    }
}

impl MutationTracker for TrackedList {
    const EXPECTED: &'static str = "array";

    fn coerce(value: Shape<Self>) -> Result<Option<Self>> {
        match value {
            Shape::Absent => Ok(None),
            Shape::Tracked(list) => Ok(Some(list)),
            Shape::Sequence(items) => Ok(Some(Self::from_vec(items))),
            other => Err(reject(Self::EXPECTED, &other)),
        }
    }

    fn to_plain(&self) -> serde_json::Value {
        serde_json::Value::Array(self.to_plain_vec())
    }

    fn deep_copy(&self) -> Self {
        Self::from_vec(self.to_plain_vec())
    }

    fn is_attached(&self) -> bool {
        self.parent().is_live()
    }

    fn set_listener(&self, listener: Option<Weak<dyn ChangeListener>>) {
        self.set_parent(listener.map_or(Parent::Detached, Parent::Listener));
    }
}

impl Default for TrackedList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrackedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TrackedList").field(&self.to_plain()).finish()
    }
}

impl PartialEq for TrackedList {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node) || self.to_plain_vec() == other.to_plain_vec()
    }
}

impl PartialEq<serde_json::Value> for TrackedList {
    fn eq(&self, other: &serde_json::Value) -> bool {
        other
            .as_array()
            .is_some_and(|items| &self.to_plain_vec() == items)
    }
}

impl PartialEq<TrackedList> for serde_json::Value {
    fn eq(&self, other: &TrackedList) -> bool {
        other == self
    }
}

impl Serialize for TrackedList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let items = self.node.read();
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items.iter() {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for TrackedList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<serde_json::Value>::deserialize(deserializer).map(Self::from_vec)
    }
}

impl From<Vec<serde_json::Value>> for TrackedList {
    fn from(items: Vec<serde_json::Value>) -> Self {
        Self::from_vec(items)
    }
}
