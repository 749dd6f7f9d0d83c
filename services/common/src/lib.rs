//! Shared fixed-point types and the in-process event bus used across the
//! execution router.

pub mod event_bus;
pub mod types;

pub use event_bus::*;
pub use types::*;
