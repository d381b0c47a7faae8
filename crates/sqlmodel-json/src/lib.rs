//! Mutation-tracked JSON columns for SQLModel Rust.
//!
//! A JSON column normally only counts as modified when its attribute is
//! reassigned. The types here make in-place edits visible too:
//!
//! - `MUTABLE_JSON` tracks edits to the top-level object or array
//! - `NESTED_MUTABLE_JSON` tracks edits at any depth
//! - `mutable_json_type` builds the same over any `BackingType`
//!   (`Json`, `JsonB`, `JsonText`, `JsonBlob`, or your own)
//!
//! # Quick Start
//!
//! ```
//! use serde_json::json;
//! use sqlmodel_json::prelude::*;
//!
//! let mut refs = JsonAttribute::new("refs", NESTED_MUTABLE_JSON);
//! refs.load(&Value::Json(json!({"github.com": {"x": 4, "y": 7}}))).unwrap();
//! assert!(!refs.is_dirty());
//!
//! let site = refs.get().unwrap().nested_dict().unwrap().get_dict("github.com").unwrap();
//! let x = site.get("x").and_then(|v| v.as_i64()).unwrap();
//! site.insert("x", x + 10);
//!
//! assert!(refs.is_dirty());
//! assert_eq!(refs.to_plain(), Some(json!({"github.com": {"x": 14, "y": 7}})));
//! assert_eq!(
//!     refs.flush().unwrap(),
//!     Some(Value::Json(json!({"github.com": {"x": 14, "y": 7}})))
//! );
//! ```

pub mod attribute;
pub mod column;

pub use attribute::JsonAttribute;
pub use column::{
    JsonColumnType, MUTABLE_JSON, NESTED_MUTABLE_JSON, TrackedJson, Tracking, mutable_json_type,
};

pub use sqlmodel_json_core::{
    BackingType, CoercionError, Error, Json, JsonB, JsonBlob, JsonText, LookupError,
    LookupErrorKind, Result, SqlType, StorageError, StorageErrorKind, Value,
};
pub use sqlmodel_json_track::{
    ChangeListener, MutableDict, MutableJson, MutableList, MutationTracker, NestedMutableJson,
    Shape, TrackedDict, TrackedList, TrackedValue,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        BackingType, ChangeListener, Error, Json, JsonAttribute, JsonB, JsonBlob, JsonColumnType,
        JsonText, MUTABLE_JSON, MutableDict, MutableJson, MutableList, MutationTracker,
        NESTED_MUTABLE_JSON, NestedMutableJson, Result, Shape, TrackedDict, TrackedJson,
        TrackedList, TrackedValue, Tracking, Value, mutable_json_type,
    };
}
