//! # Token
//!
//! Share bookkeeping and the rebasing token built on it.

pub mod elastic;
pub mod ledger;

pub use elastic::ElasticToken;
pub use ledger::ShareLedger;

pub(crate) use elastic::TokenState;
