//! Shallow mutation tracking.
//!
//! Only operations on the root container itself are reported. Nested objects
//! and arrays are held as plain JSON, so changing one in place goes unnoticed
//! until it is assigned back into the root.

mod dict;
mod list;

pub use dict::MutableDict;
pub use list::MutableList;

use std::rc::Weak;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlmodel_json_core::Result;

use crate::notify::ChangeListener;
use crate::shape::{MutationTracker, Shape, reject};

/// Root of a shallow tracked value: an object or an array.
#[derive(Debug, Clone, PartialEq)]
pub enum MutableJson {
    Dict(MutableDict),
    List(MutableList),
}

impl MutableJson {
    pub fn as_dict(&self) -> Option<&MutableDict> {
        match self {
            MutableJson::Dict(dict) => Some(dict),
            MutableJson::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&MutableList> {
        match self {
            MutableJson::List(list) => Some(list),
            MutableJson::Dict(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MutableJson::Dict(dict) => dict.len(),
            MutableJson::List(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn changed(&self) {
        match self {
            MutableJson::Dict(dict) => dict.changed(),
            MutableJson::List(list) => list.changed(),
        }
    }
}

impl MutationTracker for MutableJson {
    const EXPECTED: &'static str = "object or array";

    fn coerce(value: Shape<Self>) -> Result<Option<Self>> {
        match value {
            Shape::Absent => Ok(None),
            Shape::Tracked(root) => Ok(Some(root)),
            Shape::Mapping(map) => Ok(Some(MutableJson::Dict(MutableDict::from_map(map)))),
            Shape::Sequence(items) => Ok(Some(MutableJson::List(MutableList::from_vec(items)))),
            other => Err(reject(Self::EXPECTED, &other)),
        }
    }

    fn to_plain(&self) -> serde_json::Value {
        match self {
            MutableJson::Dict(dict) => dict.to_plain(),
            MutableJson::List(list) => list.to_plain(),
        }
    }

    fn deep_copy(&self) -> Self {
        match self {
            MutableJson::Dict(dict) => MutableJson::Dict(dict.deep_copy()),
            MutableJson::List(list) => MutableJson::List(list.deep_copy()),
        }
    }

    fn is_attached(&self) -> bool {
        match self {
            MutableJson::Dict(dict) => dict.is_attached(),
            MutableJson::List(list) => list.is_attached(),
        }
    }

    fn set_listener(&self, listener: Option<Weak<dyn ChangeListener>>) {
        match self {
            MutableJson::Dict(dict) => dict.set_listener(listener),
            MutableJson::List(list) => list.set_listener(listener),
        }
    }
}

impl PartialEq<serde_json::Value> for MutableJson {
    fn eq(&self, other: &serde_json::Value) -> bool {
        match self {
            MutableJson::Dict(dict) => dict == other,
            MutableJson::List(list) => list == other,
        }
    }
}

impl PartialEq<MutableJson> for serde_json::Value {
    fn eq(&self, other: &MutableJson) -> bool {
        other == self
    }
}

impl From<MutableDict> for MutableJson {
    fn from(dict: MutableDict) -> Self {
        MutableJson::Dict(dict)
    }
}

impl From<MutableList> for MutableJson {
    fn from(list: MutableList) -> Self {
        MutableJson::List(list)
    }
}

impl Serialize for MutableJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            MutableJson::Dict(dict) => dict.serialize(serializer),
            MutableJson::List(list) => list.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for MutableJson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let plain = serde_json::Value::deserialize(deserializer)?;
        match Self::coerce(Shape::from(plain)) {
            Ok(Some(root)) => Ok(root),
            Ok(None) => Err(serde::de::Error::custom("expected an object or array, found null")),
            Err(err) => Err(serde::de::Error::custom(err)),
        }
    }
}
