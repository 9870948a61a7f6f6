//! Common utilities and types shared across Archiva modules.
//!
//! This module provides foundational types that are used throughout the
//! storage subsystem, ensuring consistency and type safety.

pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use events::{
    EventLevel, MemoryEventSink, NullEventSink, SystemEvent, SystemEventSink, TracingEventSink,
};
pub use types::{BackendKind, RelativePath};
