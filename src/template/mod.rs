//! Typed template units.
//!
//! Constructing a [`Template`] or [`SubTemplate`] only registers it; nothing
//! is read until [`registry::load_all`](crate::registry::load_all) (or the
//! unit's own `load`) parses its patterns and trial-renders the sample data.
//! A unit that loaded successfully renders without returning errors:
//!
//! - transport errors from the sink are discarded
//! - protocol violations, and engine failures that slipped past validation,
//!   panic with the [`TemplateError`](crate::TemplateError) as payload
//!
//! With live reload enabled every render re-validates first and injects the
//! reload script into the output.

mod sink;
mod unit;


pub use sink::ProtocolViolation;
pub use unit::{SubTemplate, Template};

/// Data type of templates that take no per-call data.
pub type NoData = ();
