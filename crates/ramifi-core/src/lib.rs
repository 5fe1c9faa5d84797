//! # Ramifi Core - Elastic Supply Engine
//!
//! Accounting and policy logic for a rebasing token. It provides:
//!
//! - Share-based balances that stay proportional across supply changes
//! - The monetary policy that turns price deviation into a supply delta
//! - TWAP and provider-median oracles feeding the policy
//! - An engine wiring the pieces together, with versioned snapshots
//!
//! ## Feature Flags
//!
//! - `client`: Enables serde serialization and JSON snapshots for off-chain use

pub mod constants;
pub mod engine;
pub mod errors;
pub mod governance;
pub mod math;
pub mod oracle;
pub mod policy;
pub mod token;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use engine::{EngineConfig, RebaseEngine};
pub use errors::{CoreError, CoreResult, OracleKind};
pub use governance::{Ownership, PendingOwner};
pub use oracle::{PriceFeed, ReferenceIndexOracle, ReferenceOracleConfig, TwapConfig, TwapOracle};
pub use policy::{MonetaryPolicy, PolicyParams, RebaseWindow, SupplyDelta};
pub use token::{ElasticToken, ShareLedger};
pub use types::*;
