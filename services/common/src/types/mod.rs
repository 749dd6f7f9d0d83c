//! Core types for the execution router

pub mod constants;
pub mod market;
pub mod types;

// Re-export all types
pub use constants::*;
pub use market::*;
pub use types::*;