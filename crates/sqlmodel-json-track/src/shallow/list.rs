//! Single-level change-tracking array.

use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlmodel_json_core::{Error, Result};

use crate::notify::{ChangeListener, Node, Notify, Parent};
use crate::shape::{MutationTracker, Shape, reject};

/// A JSON array that reports its own top-level mutations.
///
/// Items are stored as plain JSON; [`get`](Self::get) returns a copy.
#[derive(Clone)]
pub struct MutableList {
    node: Rc<Node<Vec<serde_json::Value>>>,
}

impl MutableList {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<serde_json::Value>) -> Self {
        Self {
            node: Node::new("mutable_list", items),
        }
    }

    pub fn len(&self) -> usize {
        self.node.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<serde_json::Value> {
        self.node.read().get(index).cloned()
    }

    pub fn items(&self) -> Vec<serde_json::Value> {
        self.node.read().clone()
    }

    pub fn contains(&self, value: &serde_json::Value) -> bool {
        self.node.read().contains(value)
    }

    /// Replace the item at `index`, returning the previous one.
    pub fn set(
        &self,
        index: usize,
        value: impl Into<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let value = value.into();
        self.node.mutate("set", |items| {
            let len = items.len();
            items
                .get_mut(index)
                .map(|slot| std::mem::replace(slot, value))
                .ok_or_else(|| Error::index_out_of_range(index, len))
        })
    }

    pub fn push(&self, value: impl Into<serde_json::Value>) {
        let value = value.into();
        self.node.mutate("push", |items| items.push(value));
    }

    /// Insert before `index`; `index == len` appends.
    pub fn insert(&self, index: usize, value: impl Into<serde_json::Value>) -> Result<()> {
        let value = value.into();
        self.node.mutate("insert", |items| -> Result<()> {
            if index > items.len() {
                return Err(Error::index_out_of_range(index, items.len()));
            }
            items.insert(index, value);
            Ok(())
        })
    }

    pub fn extend<I, V>(&self, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        let staged: Vec<serde_json::Value> = values.into_iter().map(Into::into).collect();
        self.node.mutate("extend", |items| items.extend(staged));
    }

    /// Like [`extend`](Self::extend) over a fallible source; items produced
    /// before the first error stay appended.
    pub fn try_extend<I, V, E>(&self, values: I) -> std::result::Result<(), E>
    where
        I: IntoIterator<Item = std::result::Result<V, E>>,
        V: Into<serde_json::Value>,
    {
        let mut staged = Vec::new();
        let mut failure = None;
        for value in values {
            match value {
                Ok(value) => staged.push(value.into()),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        self.node.mutate("try_extend", |items| items.extend(staged));
        failure.map_or(Ok(()), Err)
    }

    pub fn pop(&self) -> Option<serde_json::Value> {
        self.node.mutate("pop", Vec::pop)
    }

    pub fn remove_at(&self, index: usize) -> Result<serde_json::Value> {
        self.node.mutate("remove_at", |items| -> Result<serde_json::Value> {
            if index >= items.len() {
                return Err(Error::index_out_of_range(index, items.len()));
            }
            Ok(items.remove(index))
        })
    }

    /// Remove the first item equal to `value`.
    pub fn remove(&self, value: &serde_json::Value) -> Result<serde_json::Value> {
        self.node.mutate("remove", |items| -> Result<serde_json::Value> {
            let position = items
                .iter()
                .position(|item| item == value)
                .ok_or_else(Error::value_not_found)?;
            Ok(items.remove(position))
        })
    }

    pub fn clear(&self) {
        self.node.mutate("clear", Vec::clear);
    }

    pub fn reverse(&self) {
        self.node.mutate("reverse", |items| items.reverse());
    }

    /// Signal a change without mutating anything.
    pub fn changed(&self) {
        self.node.signal("changed");
    }
}

impl MutationTracker for MutableList {
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
        serde_json::Value::Array(self.items())
    }

    fn deep_copy(&self) -> Self {
        Self::from_vec(self.items())
    }

    fn is_attached(&self) -> bool {
        self.node.parent().is_live()
    }

    fn set_listener(&self, listener: Option<Weak<dyn ChangeListener>>) {
        self.node
            .set_parent(listener.map_or(Parent::Detached, Parent::Listener));
    }
}

impl Default for MutableList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MutableList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutableList").field(&*self.node.read()).finish()
    }
}

impl PartialEq for MutableList {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node) || *self.node.read() == *other.node.read()
    }
}

impl PartialEq<serde_json::Value> for MutableList {
    fn eq(&self, other: &serde_json::Value) -> bool {
        other
            .as_array()
            .is_some_and(|items| *self.node.read() == *items)
    }
}

impl PartialEq<MutableList> for serde_json::Value {
    fn eq(&self, other: &MutableList) -> bool {
        other == self
    }
}

impl From<Vec<serde_json::Value>> for MutableList {
    fn from(items: Vec<serde_json::Value>) -> Self {
        Self::from_vec(items)
    }
}

impl Serialize for MutableList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.node.read().iter())
    }
}

impl<'de> Deserialize<'de> for MutableList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<serde_json::Value>::deserialize(deserializer).map(Self::from_vec)
    }
}
