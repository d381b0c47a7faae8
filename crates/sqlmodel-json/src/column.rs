//! Mutation-tracked JSON column types.
//!
//! A [`JsonColumnType`] pairs a backing storage type with the tracker that
//! wraps values of the column. It is plain configuration: build one per
//! declared column and hand it to the attribute slot.

use std::rc::Weak;

use serde::{Serialize, Serializer};
use sqlmodel_json_core::{BackingType, Json, Result, SqlType, Value};
use sqlmodel_json_track::{
    ChangeListener, MutableDict, MutableJson, MutableList, MutationTracker, NestedMutableJson,
    Shape, TrackedDict, TrackedList,
};

/// Which tracker a column wraps its values in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Tracking {
    /// Only mutations of the root container are detected.
    #[default]
    Shallow,
    /// Mutations at any depth are detected.
    Nested,
}

/// Column type for JSON values with in-place change detection.
///
/// # Example
///
/// ```
/// use sqlmodel_json::{JsonColumnType, JsonText, Tracking};
///
/// let column = JsonColumnType::new().nested(true).with_backing(JsonText);
/// assert_eq!(column.tracking(), Tracking::Nested);
/// assert_eq!(column.sql_type().sql_name(), "TEXT");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonColumnType<B: BackingType = Json> {
    backing: B,
    tracking: Tracking,
}

impl JsonColumnType<Json> {
    /// Shallow tracking over a native JSON column.
    pub const fn new() -> Self {
        Self::with_tracking(Json, Tracking::Shallow)
    }
}

impl Default for JsonColumnType<Json> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BackingType> JsonColumnType<B> {
    pub const fn with_tracking(backing: B, tracking: Tracking) -> Self {
        Self { backing, tracking }
    }

    /// Select nested (`true`) or shallow (`false`) tracking.
    #[must_use]
    pub fn nested(mut self, nested: bool) -> Self {
        self.tracking = if nested {
            Tracking::Nested
        } else {
            Tracking::Shallow
        };
        self
    }

    /// Swap the backing storage type, keeping the tracking flavor.
    pub fn with_backing<C: BackingType>(self, backing: C) -> JsonColumnType<C> {
        JsonColumnType {
            backing,
            tracking: self.tracking,
        }
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }

    pub fn tracking(&self) -> Tracking {
        self.tracking
    }

    pub fn is_nested(&self) -> bool {
        self.tracking == Tracking::Nested
    }

    pub fn sql_type(&self) -> SqlType {
        self.backing.sql_type()
    }

    /// Wrap an incoming value in this column's tracker.
    ///
    /// A value tracked by the other flavor is rebuilt from its plain view.
    pub fn coerce(&self, value: Shape<TrackedJson>) -> Result<Option<TrackedJson>> {
        match self.tracking {
            Tracking::Shallow => {
                let value = value.map_tracked(|tracked| match tracked {
                    TrackedJson::Shallow(root) => Shape::Tracked(root),
                    other => Shape::from_plain(other.to_plain()),
                });
                Ok(MutableJson::coerce(value)?.map(TrackedJson::Shallow))
            }
            Tracking::Nested => {
                let value = value.map_tracked(|tracked| match tracked {
                    TrackedJson::Nested(root) => Shape::Tracked(root),
                    other => Shape::from_plain(other.to_plain()),
                });
                Ok(NestedMutableJson::coerce(value)?.map(TrackedJson::Nested))
            }
        }
    }

    /// Encode a (possibly absent) tracked value for storage.
    pub fn serialize(&self, value: Option<&TrackedJson>) -> Result<Value> {
        let plain = value.map(TrackedJson::to_plain);
        self.backing.serialize(plain.as_ref())
    }

    /// Decode a stored value and wrap it in this column's tracker.
    pub fn deserialize(&self, raw: &Value) -> Result<Option<TrackedJson>> {
        let plain = self.backing.deserialize(raw)?;
        self.coerce(Shape::from(plain))
    }
}

/// Build a column type over `backing` with shallow or nested tracking.
pub fn mutable_json_type<B: BackingType>(backing: B, nested: bool) -> JsonColumnType<B> {
    JsonColumnType::with_tracking(backing, Tracking::Shallow).nested(nested)
}

/// Shallow-tracked native JSON.
pub const MUTABLE_JSON: JsonColumnType = JsonColumnType::with_tracking(Json, Tracking::Shallow);

/// Nested-tracked native JSON.
pub const NESTED_MUTABLE_JSON: JsonColumnType =
    JsonColumnType::with_tracking(Json, Tracking::Nested);

/// The tracked root held by a JSON attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackedJson {
    Shallow(MutableJson),
    Nested(NestedMutableJson),
}

impl TrackedJson {
    pub fn tracking(&self) -> Tracking {
        match self {
            TrackedJson::Shallow(_) => Tracking::Shallow,
            TrackedJson::Nested(_) => Tracking::Nested,
        }
    }

    pub fn as_shallow(&self) -> Option<&MutableJson> {
        match self {
            TrackedJson::Shallow(root) => Some(root),
            TrackedJson::Nested(_) => None,
        }
    }

    pub fn as_nested(&self) -> Option<&NestedMutableJson> {
        match self {
            TrackedJson::Nested(root) => Some(root),
            TrackedJson::Shallow(_) => None,
        }
    }

    pub fn shallow_dict(&self) -> Option<&MutableDict> {
        self.as_shallow().and_then(MutableJson::as_dict)
    }

    pub fn shallow_list(&self) -> Option<&MutableList> {
        self.as_shallow().and_then(MutableJson::as_list)
    }

    pub fn nested_dict(&self) -> Option<&TrackedDict> {
        self.as_nested().and_then(NestedMutableJson::as_dict)
    }

    pub fn nested_list(&self) -> Option<&TrackedList> {
        self.as_nested().and_then(NestedMutableJson::as_list)
    }

    pub fn len(&self) -> usize {
        match self {
            TrackedJson::Shallow(root) => root.len(),
            TrackedJson::Nested(root) => root.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The plain, untracked equivalent.
    pub fn to_plain(&self) -> serde_json::Value {
        match self {
            TrackedJson::Shallow(root) => root.to_plain(),
            TrackedJson::Nested(root) => root.to_plain(),
        }
    }

    /// An independent copy bound to nothing.
    pub fn deep_copy(&self) -> Self {
        match self {
            TrackedJson::Shallow(root) => TrackedJson::Shallow(root.deep_copy()),
            TrackedJson::Nested(root) => TrackedJson::Nested(root.deep_copy()),
        }
    }

    pub fn is_attached(&self) -> bool {
        match self {
            TrackedJson::Shallow(root) => root.is_attached(),
            TrackedJson::Nested(root) => root.is_attached(),
        }
    }

    pub(crate) fn set_listener(&self, listener: Option<Weak<dyn ChangeListener>>) {
        match self {
            TrackedJson::Shallow(root) => root.set_listener(listener),
            TrackedJson::Nested(root) => root.set_listener(listener),
        }
    }
}

impl PartialEq<serde_json::Value> for TrackedJson {
    fn eq(&self, other: &serde_json::Value) -> bool {
        match self {
            TrackedJson::Shallow(root) => root == other,
            TrackedJson::Nested(root) => root == other,
        }
    }
}

impl PartialEq<TrackedJson> for serde_json::Value {
    fn eq(&self, other: &TrackedJson) -> bool {
        other == self
    }
}

impl From<MutableJson> for TrackedJson {
    fn from(root: MutableJson) -> Self {
        TrackedJson::Shallow(root)
    }
}

impl From<NestedMutableJson> for TrackedJson {
    fn from(root: NestedMutableJson) -> Self {
        TrackedJson::Nested(root)
    }
}

impl From<MutableDict> for TrackedJson {
    fn from(dict: MutableDict) -> Self {
        TrackedJson::Shallow(dict.into())
    }
}

impl From<TrackedDict> for TrackedJson {
    fn from(dict: TrackedDict) -> Self {
        TrackedJson::Nested(dict.into())
    }
}

impl From<TrackedList> for TrackedJson {
    fn from(list: TrackedList) -> Self {
        TrackedJson::Nested(list.into())
    }
}

impl From<TrackedJson> for Shape<TrackedJson> {
    fn from(root: TrackedJson) -> Self {
        Shape::Tracked(root)
    }
}

impl Serialize for TrackedJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TrackedJson::Shallow(root) => root.serialize(serializer),
            TrackedJson::Nested(root) => root.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlmodel_json_core::{JsonB, JsonBlob, JsonText, StorageErrorKind};

    #[test]
    fn factory_selects_tracking() {
        assert_eq!(MUTABLE_JSON.tracking(), Tracking::Shallow);
        assert_eq!(NESTED_MUTABLE_JSON.tracking(), Tracking::Nested);
        assert_eq!(mutable_json_type(JsonB, true).sql_type(), SqlType::JsonB);
        assert!(!mutable_json_type(JsonText, false).is_nested());
        assert_eq!(JsonColumnType::default(), MUTABLE_JSON);
    }

    #[test]
    fn coerce_follows_tracking_flavor() {
        let shallow = MUTABLE_JSON.coerce(Shape::from(json!({"a": {"b": 1}}))).unwrap().unwrap();
        assert!(shallow.shallow_dict().is_some());
        let nested = NESTED_MUTABLE_JSON
            .coerce(Shape::from(json!([{"b": 1}])))
            .unwrap()
            .unwrap();
        assert!(nested.nested_list().unwrap().get_dict(0).is_some());
    }

    #[test]
    fn coerce_rebuilds_other_flavor() {
        let shallow = MUTABLE_JSON.coerce(Shape::from(json!({"a": [1]}))).unwrap().unwrap();
        let nested = NESTED_MUTABLE_JSON.coerce(shallow.into()).unwrap().unwrap();
        assert_eq!(nested.tracking(), Tracking::Nested);
        assert!(nested.nested_dict().unwrap().get_list("a").is_some());
    }

    #[test]
    fn coerce_passes_null_and_rejects_scalars() {
        assert!(NESTED_MUTABLE_JSON.coerce(Shape::Absent).unwrap().is_none());
        let err = MUTABLE_JSON.coerce(Shape::from(json!(12))).unwrap_err();
        assert!(err.is_coercion());
    }

    #[test]
    fn storage_round_trip_per_backing() {
        let value = NESTED_MUTABLE_JSON.coerce(Shape::from(json!({"k": [1, 2]}))).unwrap();

        let native = NESTED_MUTABLE_JSON.serialize(value.as_ref()).unwrap();
        assert_eq!(native, Value::Json(json!({"k": [1, 2]})));

        let text = mutable_json_type(JsonText, true);
        let raw = text.serialize(value.as_ref()).unwrap();
        assert_eq!(raw, Value::Text(r#"{"k":[1,2]}"#.to_string()));
        assert_eq!(text.deserialize(&raw).unwrap().unwrap(), json!({"k": [1, 2]}));

        let blob = mutable_json_type(JsonBlob, false);
        let raw = blob.serialize(value.as_ref()).unwrap();
        assert_eq!(blob.deserialize(&raw).unwrap().unwrap(), json!({"k": [1, 2]}));
    }

    #[test]
    fn null_storage_is_absent() {
        assert_eq!(MUTABLE_JSON.serialize(None).unwrap(), Value::Null);
        assert!(MUTABLE_JSON.deserialize(&Value::Null).unwrap().is_none());
        assert!(
            MUTABLE_JSON
                .deserialize(&Value::Json(serde_json::Value::Null))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn stored_scalar_is_a_coercion_error() {
        let err = MUTABLE_JSON.deserialize(&Value::Json(json!("text"))).unwrap_err();
        assert!(err.is_coercion());
    }

    #[test]
    fn malformed_text_is_a_storage_error() {
        let column = mutable_json_type(JsonText, false);
        let err = column.deserialize(&Value::Text("{not json".to_string())).unwrap_err();
        match err {
            sqlmodel_json_core::Error::Storage(e) => assert_eq!(e.kind, StorageErrorKind::Decode),
            other => panic!("unexpected error: {other}"),
        }
    }
}
