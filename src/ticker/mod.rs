pub mod coincap;
pub mod feed;
pub mod manager;
pub mod state;
pub mod types;

pub use manager::TickerManager;
pub use state::DesiredAssetsOutcome;
pub use types::{AssetSet, PriceCell, TickerSnapshot, TickerStatus};
