pub mod config;
pub mod error;
pub mod feeds;
pub mod keeper;

pub use config::{create_example_config, FeedConfig, KeeperConfig, RetryConfig};
pub use error::{KeeperError, KeeperResult};
pub use feeds::{FeedCursor, FeedIngestor, IndexReport, IngestStats, MarketSample};
pub use keeper::{Keeper, TickResult};
