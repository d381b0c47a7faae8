//! Error types for tracked JSON operations.

use std::fmt;

/// The primary error type for all tracked JSON operations.
#[derive(Debug)]
pub enum Error {
    /// A value could not be coerced into the tracked container a column expects
    Coercion(CoercionError),
    /// A key, index or value lookup failed inside a container operation
    Lookup(LookupError),
    /// The backing storage type failed to encode or decode a value
    Storage(StorageError),
    /// Custom error with message
    Custom(String),
}

/// Raised when `coerce` receives a value of the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    /// Shape the tracker accepts ("object", "array", "object or array")
    pub expected: &'static str,
    /// Shape that was supplied
    pub actual: &'static str,
    /// Column the value was destined for, when known
    pub column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupError {
    pub kind: LookupErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupErrorKind {
    /// Key not present in a mapping
    Key,
    /// Index outside the bounds of a sequence
    Index,
    /// Value not present in a sequence
    Value,
}

#[derive(Debug)]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// Plain value could not be encoded for storage
    Encode,
    /// Stored representation could not be decoded
    Decode,
    /// Stored value has a representation the backing type does not read
    Representation,
}

impl CoercionError {
    /// Create a coercion error without column context.
    pub fn new(expected: &'static str, actual: &'static str) -> Self {
        Self {
            expected,
            actual,
            column: None,
        }
    }

    /// Attach the name of the column the value was assigned to.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl Error {
    /// Build a coercion error for the given expected and actual shapes.
    pub fn coercion(expected: &'static str, actual: &'static str) -> Self {
        Error::Coercion(CoercionError::new(expected, actual))
    }

    /// A mapping had no entry for `key`.
    pub fn missing_key(key: &str) -> Self {
        Error::Lookup(LookupError {
            kind: LookupErrorKind::Key,
            message: format!("key {key:?} not found"),
        })
    }

    /// A sequence index was out of range.
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Error::Lookup(LookupError {
            kind: LookupErrorKind::Index,
            message: format!("index {index} out of range for length {len}"),
        })
    }

    /// A sequence did not contain the requested value.
    pub fn value_not_found() -> Self {
        Error::Lookup(LookupError {
            kind: LookupErrorKind::Value,
            message: "value not found in list".to_string(),
        })
    }

    /// A document could not be encoded for storage.
    pub fn encode(err: serde_json::Error) -> Self {
        Error::storage(StorageErrorKind::Encode, err)
    }

    fn storage(kind: StorageErrorKind, err: serde_json::Error) -> Self {
        Error::Storage(StorageError {
            kind,
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }

    /// Attach a column name to a coercion error; other errors pass through.
    pub fn for_column(self, column: &str) -> Self {
        match self {
            Error::Coercion(e) if e.column.is_none() => Error::Coercion(e.with_column(column)),
            other => other,
        }
    }

    /// Is this a coercion (wrong shape) error?
    pub fn is_coercion(&self) -> bool {
        matches!(self, Error::Coercion(_))
    }

    /// Get the lookup kind if this is a lookup error.
    pub fn lookup_kind(&self) -> Option<LookupErrorKind> {
        match self {
            Error::Lookup(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Coercion(e) => write!(f, "Coercion error: {}", e),
            Error::Lookup(e) => write!(f, "Lookup error: {}", e.message),
            Error::Storage(e) => write!(f, "Storage error: {}", e.message),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Storage(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "cannot coerce {} into {} for column '{}'",
                self.actual, self.expected, col
            )
        } else {
            write!(f, "cannot coerce {} into {}", self.actual, self.expected)
        }
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<CoercionError> for Error {
    fn from(err: CoercionError) -> Self {
        Error::Coercion(err)
    }
}

impl From<LookupError> for Error {
    fn from(err: LookupError) -> Self {
        Error::Lookup(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<serde_json::Error> for Error {
    /// Parse failures; use [`Error::encode`] on the write path.
    fn from(err: serde_json::Error) -> Self {
        Error::storage(StorageErrorKind::Decode, err)
    }
}

/// Result type alias for tracked JSON operations.
pub type Result<T> = std::result::Result<T, Error>;
