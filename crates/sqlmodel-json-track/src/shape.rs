//! Coercion dispatch: classifying incoming values and the tracker contract.

use std::fmt;
use std::rc::{Rc, Weak};

use sqlmodel_json_core::{Error, Result};

use crate::notify::ChangeListener;

/// The closed set of shapes a value handed to `coerce` can take.
#[derive(Debug, Clone)]
pub enum Shape<T> {
    /// SQL NULL / JSON null: no container is created.
    Absent,
    /// A value that is already tracked by the requested tracker.
    Tracked(T),
    /// A plain JSON object.
    Mapping(serde_json::Map<String, serde_json::Value>),
    /// A plain JSON array.
    Sequence(Vec<serde_json::Value>),
    /// Anything else (strings, numbers, booleans).
    Other(serde_json::Value),
}

impl<T> Shape<T> {
    /// Classify a plain JSON value.
    pub fn from_plain(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Shape::Absent,
            serde_json::Value::Object(map) => Shape::Mapping(map),
            serde_json::Value::Array(items) => Shape::Sequence(items),
            other => Shape::Other(other),
        }
    }

    /// Human-readable name of the shape, used in coercion errors.
    pub fn describe(&self) -> &'static str {
        match self {
            Shape::Absent => "null",
            Shape::Tracked(_) => "tracked container",
            Shape::Mapping(_) => "object",
            Shape::Sequence(_) => "array",
            Shape::Other(value) => json_kind(value),
        }
    }

    /// Re-tag an already-tracked value for a different tracker.
    pub fn map_tracked<U>(self, f: impl FnOnce(T) -> Shape<U>) -> Shape<U> {
        match self {
            Shape::Absent => Shape::Absent,
            Shape::Tracked(tracked) => f(tracked),
            Shape::Mapping(map) => Shape::Mapping(map),
            Shape::Sequence(items) => Shape::Sequence(items),
            Shape::Other(value) => Shape::Other(value),
        }
    }
}

impl<T> From<serde_json::Value> for Shape<T> {
    fn from(value: serde_json::Value) -> Self {
        Shape::from_plain(value)
    }
}

impl<T> From<Option<serde_json::Value>> for Shape<T> {
    fn from(value: Option<serde_json::Value>) -> Self {
        value.map_or(Shape::Absent, Shape::from_plain)
    }
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Build the error for a shape a tracker does not accept.
pub(crate) fn reject<T>(expected: &'static str, value: &Shape<T>) -> Error {
    let actual = value.describe();
    tracing::debug!(expected, actual, "Value is not coercible");
    Error::coercion(expected, actual)
}

/// A container type that can serve as the mutation tracker of a column.
///
/// The persistence layer calls [`coerce`](Self::coerce) whenever a value is
/// loaded or assigned, then binds the resulting root to its attribute slot
/// with [`attach`](Self::attach).
pub trait MutationTracker: Clone + fmt::Debug + 'static {
    /// Shapes this tracker accepts, as reported in coercion errors.
    const EXPECTED: &'static str;

    /// Turn an incoming value into a tracked root, or `None` for NULL.
    fn coerce(value: Shape<Self>) -> Result<Option<Self>>;

    /// The plain, untracked equivalent of this value.
    fn to_plain(&self) -> serde_json::Value;

    /// A structural copy that shares nothing with `self` and notifies nobody.
    fn deep_copy(&self) -> Self;

    /// Is this value currently bound to a live parent or listener?
    fn is_attached(&self) -> bool;

    /// Replace the upward link of this root.
    fn set_listener(&self, listener: Option<Weak<dyn ChangeListener>>);

    /// Bind this root to `listener`.
    fn attach<L: ChangeListener + 'static>(&self, listener: &Rc<L>) {
        let weak: Weak<dyn ChangeListener> = Rc::downgrade(listener) as Weak<_>;
        self.set_listener(Some(weak));
    }

    /// Unbind this root; later mutations notify nobody.
    fn detach(&self) {
        self.set_listener(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_plain_values() {
        assert!(matches!(Shape::<()>::from_plain(json!(null)), Shape::Absent));
        assert!(matches!(Shape::<()>::from_plain(json!({})), Shape::Mapping(_)));
        assert!(matches!(Shape::<()>::from_plain(json!([1])), Shape::Sequence(_)));
        assert!(matches!(Shape::<()>::from_plain(json!(3)), Shape::Other(_)));
        assert!(matches!(Shape::<()>::from(None::<serde_json::Value>), Shape::Absent));
    }

    #[test]
    fn describes_shapes() {
        assert_eq!(Shape::<()>::from(json!("x")).describe(), "string");
        assert_eq!(Shape::<()>::from(json!(1.5)).describe(), "number");
        assert_eq!(Shape::<()>::from(json!(true)).describe(), "boolean");
        assert_eq!(Shape::Tracked(()).describe(), "tracked container");
    }

    #[test]
    fn reject_builds_coercion_error() {
        let err = reject("object", &Shape::<()>::from(json!(5)));
        assert_eq!(err.to_string(), "Coercion error: cannot coerce number into object");
    }

    #[test]
    fn map_tracked_only_touches_tracked() {
        let shape: Shape<i32> = Shape::Tracked(1);
        let mapped = shape.map_tracked(|n| Shape::<String>::Tracked(n.to_string()));
        assert!(matches!(mapped, Shape::Tracked(ref s) if s == "1"));

        let plain: Shape<i32> = Shape::from(json!({"a": 1}));
        assert!(matches!(
            plain.map_tracked(|_| Shape::<String>::Absent),
            Shape::Mapping(_)
        ));
    }
}
