//! # Core Type Definitions
//!
//! Shared identity and event types.

pub mod address;
pub mod events;

pub use address::*;
pub use events::*;
