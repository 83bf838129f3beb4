use crate::error::AppError;
use crate::ticker::types::{AssetSet, SnapshotPrice};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Message(Vec<u8>),
    Error(String),
    Closed,
}

#[async_trait]
pub trait FeedConnection: Send {
    // `None` once the connection is gone.
    async fn next_event(&mut self) -> Option<FeedEvent>;

    async fn close(&mut self);
}

#[async_trait]
pub trait PriceFeed: Send + Sync + 'static {
    async fn connect(&self, assets: &AssetSet) -> Result<Box<dyn FeedConnection>, AppError>;

    async fn fetch_snapshot(&self, assets: &AssetSet) -> Result<Vec<SnapshotPrice>, AppError>;
}
