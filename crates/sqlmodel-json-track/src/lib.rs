//! Change-tracking JSON containers.
//!
//! Two tracking flavors share one notification mechanism:
//!
//! - `shallow`: `MutableDict` / `MutableList` report only their own
//!   top-level mutations
//! - `nested`: `TrackedDict` / `TrackedList` wrap every object and array in
//!   the tree, so a mutation at any depth reaches the root
//!
//! A root is bound to a `ChangeListener` (usually the attribute slot of a
//! model instance) with `MutationTracker::attach`. Every mutating call
//! signals exactly once, whether or not the content actually changed.
//!
//! Containers are single-threaded (`Rc`/`RefCell`), matching the
//! one-session-per-thread ownership of model instances.

mod notify;
mod shape;

pub mod nested;
pub mod shallow;

pub use nested::{NestedMutableJson, TrackedDict, TrackedList, TrackedValue};
pub use notify::ChangeListener;
pub use shallow::{MutableDict, MutableJson, MutableList};
pub use shape::{MutationTracker, Shape};
