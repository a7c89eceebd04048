//! Entity model for the target registry.
//!
//! A [`target::Target`] is a named group of service-discovery entries; each
//! [`target::Entry`] pairs a list of `host:port` addresses with one label set.
//! Validation lives here so every storage backend sees the same rules.

pub mod errors;
pub mod target;

pub use errors::ModelError;
pub use target::{Entry, Target, TargetId};
