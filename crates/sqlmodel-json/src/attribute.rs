//! Instrumented attribute slot for a mutation-tracked JSON column.
//!
//! `JsonAttribute` is the piece a model instance owns per JSON column. It
//! holds the tracked root, listens for its change signal and hands the
//! serialized value to the session on flush.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use sqlmodel_json_core::{BackingType, Json, Result, Value};
use sqlmodel_json_track::{ChangeListener, Shape};

use crate::column::{JsonColumnType, TrackedJson};

/// Dirty flag shared between the slot and its root's listener link.
#[derive(Debug)]
struct AttributeState {
    column: String,
    dirty: Cell<bool>,
    changes: Cell<usize>,
}

impl ChangeListener for AttributeState {
    fn changed(&self) {
        let changes = self.changes.get() + 1;
        self.changes.set(changes);
        self.dirty.set(true);
        tracing::debug!(column = %self.column, changes, "JSON attribute marked changed");
    }
}

/// The value of one JSON column on one model instance.
#[derive(Debug)]
pub struct JsonAttribute<B: BackingType = Json> {
    column_type: JsonColumnType<B>,
    state: Rc<AttributeState>,
    value: Option<TrackedJson>,
}

impl<B: BackingType> JsonAttribute<B> {
    /// Create an empty (NULL) slot for `column`.
    pub fn new(column: impl Into<String>, column_type: JsonColumnType<B>) -> Self {
        Self {
            column_type,
            state: Rc::new(AttributeState {
                column: column.into(),
                dirty: Cell::new(false),
                changes: Cell::new(0),
            }),
            value: None,
        }
    }

    pub fn column(&self) -> &str {
        &self.state.column
    }

    pub fn column_type(&self) -> &JsonColumnType<B> {
        &self.column_type
    }

    /// Populate the slot from a stored value.
    ///
    /// Loading is not a change: the slot is clean afterwards.
    #[tracing::instrument(level = "debug", skip(self, raw), fields(column = %self.state.column))]
    pub fn load(&mut self, raw: &Value) -> Result<()> {
        let value = self
            .column_type
            .deserialize(raw)
            .map_err(|e| e.for_column(&self.state.column))?;
        self.replace(value);
        self.state.dirty.set(false);
        tracing::debug!(null = self.value.is_none(), "Loaded JSON attribute");
        Ok(())
    }

    /// Assign a new value, wrapping it in the column's tracker.
    ///
    /// On a coercion error the slot is left exactly as it was. A root that
    /// is already bound to another live slot is copied rather than shared.
    #[tracing::instrument(level = "debug", skip(self, value), fields(column = %self.state.column))]
    pub fn set(&mut self, value: impl Into<Shape<TrackedJson>>) -> Result<()> {
        let value = self
            .column_type
            .coerce(value.into())
            .map_err(|e| e.for_column(&self.state.column))?;
        self.replace(value);
        self.state.changed();
        Ok(())
    }

    pub fn get(&self) -> Option<&TrackedJson> {
        self.value.as_ref()
    }

    /// The plain view of the current value.
    pub fn to_plain(&self) -> Option<serde_json::Value> {
        self.value.as_ref().map(TrackedJson::to_plain)
    }

    pub fn is_dirty(&self) -> bool {
        self.state.dirty.get()
    }

    /// Number of change signals received since the slot was created.
    pub fn change_count(&self) -> usize {
        self.state.changes.get()
    }

    /// Serialize the value if it changed since the last flush or load.
    ///
    /// Returns `None` when there is nothing to write. The slot stays dirty if
    /// the backing type fails to encode.
    #[tracing::instrument(level = "debug", skip(self), fields(column = %self.state.column))]
    pub fn flush(&mut self) -> Result<Option<Value>> {
        if !self.is_dirty() {
            tracing::trace!("JSON attribute clean, nothing to flush");
            return Ok(None);
        }
        let raw = self.column_type.serialize(self.value.as_ref())?;
        self.state.dirty.set(false);
        tracing::debug!(representation = raw.type_name(), "Flushed JSON attribute");
        Ok(Some(raw))
    }

    fn replace(&mut self, value: Option<TrackedJson>) {
        if let Some(old) = self.value.take() {
            old.set_listener(None);
        }
        let value = value.map(|root| {
            if root.is_attached() {
                tracing::trace!("Root is bound elsewhere, attaching a copy");
                root.deep_copy()
            } else {
                root
            }
        });
        if let Some(root) = &value {
            let listener: Weak<dyn ChangeListener> = Rc::downgrade(&self.state) as Weak<_>;
            root.set_listener(Some(listener));
        }
        self.value = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{MUTABLE_JSON, NESTED_MUTABLE_JSON, mutable_json_type};
    use serde_json::json;
    use sqlmodel_json_core::JsonText;

    #[test]
    fn load_is_clean() {
        let mut attr = JsonAttribute::new("refs", NESTED_MUTABLE_JSON);
        attr.load(&Value::Json(json!({"a": 1}))).unwrap();
        assert!(!attr.is_dirty());
        assert_eq!(attr.change_count(), 0);
        assert_eq!(attr.get().unwrap(), &json!({"a": 1}));
    }

    #[test]
    fn set_signals_once() {
        let mut attr = JsonAttribute::new("refs", MUTABLE_JSON);
        attr.set(json!({"a": 1})).unwrap();
        assert!(attr.is_dirty());
        assert_eq!(attr.change_count(), 1);
    }

    #[test]
    fn flush_resets_dirty() {
        let mut attr = JsonAttribute::new("refs", mutable_json_type(JsonText, false));
        attr.set(json!({"b": 2, "a": 1})).unwrap();
        let raw = attr.flush().unwrap();
        assert_eq!(raw, Some(Value::Text(r#"{"b":2,"a":1}"#.to_string())));
        assert!(!attr.is_dirty());
        assert_eq!(attr.flush().unwrap(), None);
    }

    #[test]
    fn coercion_error_names_column() {
        let mut attr = JsonAttribute::new("handles", MUTABLE_JSON);
        let err = attr.set(json!(5)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Coercion error: cannot coerce number into object or array for column 'handles'"
        );
    }

    #[test]
    fn replaced_root_is_detached() {
        let mut attr = JsonAttribute::new("refs", NESTED_MUTABLE_JSON);
        attr.set(json!({"a": 1})).unwrap();
        let old = attr.get().unwrap().clone();
        attr.set(json!({"b": 2})).unwrap();
        assert!(!old.is_attached());
        old.nested_dict().unwrap().insert("c", 3);
        assert_eq!(attr.change_count(), 2);
    }

    #[test]
    fn dropping_slot_detaches_root() {
        let mut attr = JsonAttribute::new("refs", NESTED_MUTABLE_JSON);
        attr.set(json!([1])).unwrap();
        let root = attr.get().unwrap().clone();
        drop(attr);
        assert!(!root.is_attached());
        root.nested_list().unwrap().push(2);
        assert_eq!(root, json!([1, 2]));
    }
}
