//! Core types for mutation-tracked JSON columns.
//!
//! This crate holds the pieces shared by the tracking layer and the column
//! type factory:
//!
//! - `Error` taxonomy for coercion, container lookups and storage codecs
//! - `Value` for the raw representation a column stores
//! - `SqlType` for the declared column type
//! - `BackingType` and the stock JSON codecs that move plain values to and
//!   from storage

pub mod backing;
pub mod error;
pub mod types;
pub mod value;

pub use backing::{BackingType, Json, JsonB, JsonBlob, JsonText};
pub use error::{
    CoercionError, Error, LookupError, LookupErrorKind, Result, StorageError, StorageErrorKind,
};
pub use types::SqlType;
pub use value::Value;
