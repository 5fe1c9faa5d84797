//! # Policy Module
//!
//! Supply-adjustment rules that drive the elastic token.

pub mod monetary;
pub mod params;

pub use monetary::*;
pub use params::*;
