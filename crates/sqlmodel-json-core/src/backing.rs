//! Backing storage types for JSON columns.
//!
//! A backing type owns the translation between plain `serde_json::Value`s and
//! the raw [`Value`] a driver stores. The tracking layer only ever hands it
//! plain values, so any codec that satisfies [`BackingType`] can sit under a
//! mutation-tracked column.

use std::fmt;

use crate::error::{Error, Result, StorageError, StorageErrorKind};
use crate::types::SqlType;
use crate::value::Value;

/// Serializes plain JSON values to and from their stored representation.
///
/// `None` stands for SQL NULL on both sides.
pub trait BackingType: fmt::Debug {
    /// The SQL type the column is declared with.
    fn sql_type(&self) -> SqlType;

    /// Encode a plain value for storage.
    fn serialize(&self, value: Option<&serde_json::Value>) -> Result<Value>;

    /// Decode a stored value into a plain value.
    fn deserialize(&self, raw: &Value) -> Result<Option<serde_json::Value>>;
}

/// Native JSON column (the default backing type).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Json;

/// Native binary JSON column (PostgreSQL `JSONB`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonB;

/// JSON encoded into a `TEXT` column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonText;

/// JSON encoded as UTF-8 bytes into a `BLOB` column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonBlob;

fn non_null(value: serde_json::Value) -> Option<serde_json::Value> {
    if value.is_null() { None } else { Some(value) }
}

fn decode_bytes(raw: &[u8]) -> Result<Option<serde_json::Value>> {
    let value: serde_json::Value = serde_json::from_slice(raw)?;
    Ok(non_null(value))
}

fn unreadable(backing: &dyn BackingType, raw: &Value) -> Error {
    tracing::debug!(
        backing = ?backing,
        representation = raw.type_name(),
        "Unsupported stored representation"
    );
    Error::Storage(StorageError {
        kind: StorageErrorKind::Representation,
        message: format!(
            "{} column cannot read a {} value",
            backing.sql_type().sql_name(),
            raw.type_name()
        ),
        source: None,
    })
}

fn encode_native(value: Option<&serde_json::Value>) -> Value {
    match value {
        None | Some(serde_json::Value::Null) => Value::Null,
        Some(v) => Value::Json(v.clone()),
    }
}

fn decode_native(backing: &dyn BackingType, raw: &Value) -> Result<Option<serde_json::Value>> {
    match raw {
        Value::Null => Ok(None),
        Value::Json(v) => Ok(non_null(v.clone())),
        // SQLite and MySQL text protocols hand JSON back as text.
        Value::Text(s) => decode_bytes(s.as_bytes()),
        Value::Bytes(_) => Err(unreadable(backing, raw)),
    }
}

impl BackingType for Json {
    fn sql_type(&self) -> SqlType {
        SqlType::Json
    }

    fn serialize(&self, value: Option<&serde_json::Value>) -> Result<Value> {
        Ok(encode_native(value))
    }

    fn deserialize(&self, raw: &Value) -> Result<Option<serde_json::Value>> {
        decode_native(self, raw)
    }
}

impl BackingType for JsonB {
    fn sql_type(&self) -> SqlType {
        SqlType::JsonB
    }

    fn serialize(&self, value: Option<&serde_json::Value>) -> Result<Value> {
        Ok(encode_native(value))
    }

    fn deserialize(&self, raw: &Value) -> Result<Option<serde_json::Value>> {
        decode_native(self, raw)
    }
}

impl BackingType for JsonText {
    fn sql_type(&self) -> SqlType {
        SqlType::Text
    }

    fn serialize(&self, value: Option<&serde_json::Value>) -> Result<Value> {
        match value {
            None | Some(serde_json::Value::Null) => Ok(Value::Null),
            Some(v) => Ok(Value::Text(serde_json::to_string(v).map_err(Error::encode)?)),
        }
    }

    fn deserialize(&self, raw: &Value) -> Result<Option<serde_json::Value>> {
        match raw {
            Value::Null => Ok(None),
            Value::Text(s) => decode_bytes(s.as_bytes()),
            Value::Bytes(b) => decode_bytes(b),
            Value::Json(_) => Err(unreadable(self, raw)),
        }
    }
}

impl BackingType for JsonBlob {
    fn sql_type(&self) -> SqlType {
        SqlType::Blob
    }

    fn serialize(&self, value: Option<&serde_json::Value>) -> Result<Value> {
        match value {
            None | Some(serde_json::Value::Null) => Ok(Value::Null),
            Some(v) => Ok(Value::Bytes(serde_json::to_vec(v).map_err(Error::encode)?)),
        }
    }

    fn deserialize(&self, raw: &Value) -> Result<Option<serde_json::Value>> {
        match raw {
            Value::Null => Ok(None),
            Value::Bytes(b) => decode_bytes(b),
            Value::Text(s) => decode_bytes(s.as_bytes()),
            Value::Json(_) => Err(unreadable(self, raw)),
        }
    }
}
