//! SQL type definitions for JSON-carrying columns.

/// SQL data types a JSON column can be declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    // String types
    Text,

    // Binary types
    Blob,

    // JSON
    Json,
    JsonB,

    // Custom type name
    Custom(&'static str),
}

impl SqlType {
    /// Get the SQL type name for this type.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::Text => "TEXT".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Json => "JSON".to_string(),
            SqlType::JsonB => "JSONB".to_string(),
            SqlType::Custom(name) => name.to_string(),
        }
    }

    /// Check if the database understands JSON natively for this type.
    pub const fn is_native_json(&self) -> bool {
        matches!(self, SqlType::Json | SqlType::JsonB)
    }
}
