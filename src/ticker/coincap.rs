use crate::error::AppError;
use crate::ticker::feed::{FeedConnection, FeedEvent, PriceFeed};
use crate::ticker::types::{snapshot_prices, AssetSet, SnapshotPayloadWire, SnapshotPrice};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};

pub type CoinCapWsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_REASON: &str = "subscription closed";

fn encode_key(assets: &AssetSet) -> String {
    url::form_urlencoded::byte_serialize(assets.key().as_str().as_bytes()).collect()
}

fn ws_endpoint(base_url: &str, assets: &AssetSet) -> String {
    format!("{base_url}?assets={}", encode_key(assets))
}

fn snapshot_endpoint(base_url: &str, assets: &AssetSet) -> String {
    format!("{base_url}?ids={}", encode_key(assets))
}

pub async fn connect_price_stream(
    base_url: &str,
    assets: &AssetSet,
) -> Result<CoinCapWsStream, AppError> {
    let ws_config = WebSocketConfig {
        max_message_size: Some(1 << 20),
        max_frame_size: Some(1 << 20),
        ..Default::default()
    };

    let request = ws_endpoint(base_url, assets);
    let (stream, _) = connect_async_with_config(request, Some(ws_config), false).await?;
    Ok(stream)
}

pub async fn fetch_snapshot_payload(
    client: &Client,
    base_url: &str,
    assets: &AssetSet,
) -> Result<SnapshotPayloadWire, AppError> {
    let endpoint = snapshot_endpoint(base_url, assets);
    let response = client.get(endpoint).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Upstream(format!("HTTP {status}")));
    }
    Ok(response.json::<SnapshotPayloadWire>().await?)
}

#[derive(Debug, Clone)]
pub struct CoinCapFeed {
    client: Client,
    ws_url: String,
    snapshot_url: String,
}

impl CoinCapFeed {
    pub fn new(client: Client, ws_url: impl Into<String>, snapshot_url: impl Into<String>) -> Self {
        Self {
            client,
            ws_url: ws_url.into(),
            snapshot_url: snapshot_url.into(),
        }
    }
}

#[async_trait]
impl PriceFeed for CoinCapFeed {
    async fn connect(&self, assets: &AssetSet) -> Result<Box<dyn FeedConnection>, AppError> {
        let stream = connect_price_stream(&self.ws_url, assets).await?;
        Ok(Box::new(CoinCapConnection {
            stream,
            finished: false,
        }))
    }

    async fn fetch_snapshot(&self, assets: &AssetSet) -> Result<Vec<SnapshotPrice>, AppError> {
        let payload = fetch_snapshot_payload(&self.client, &self.snapshot_url, assets).await?;
        Ok(snapshot_prices(payload))
    }
}

pub struct CoinCapConnection {
    stream: CoinCapWsStream,
    finished: bool,
}

#[async_trait]
impl FeedConnection for CoinCapConnection {
    async fn next_event(&mut self) -> Option<FeedEvent> {
        if self.finished {
            return None;
        }

        loop {
            let Some(frame) = self.stream.next().await else {
                self.finished = true;
                return Some(FeedEvent::Closed);
            };

            match frame {
                Ok(Message::Text(text)) => return Some(FeedEvent::Message(text.into_bytes())),
                Ok(Message::Binary(payload)) => return Some(FeedEvent::Message(payload)),
                Ok(Message::Close(_)) => {
                    self.finished = true;
                    return Some(FeedEvent::Closed);
                }
                Ok(_) => continue,
                // The stream yields `None` right after a fatal error, which is
                // reported as `Closed` on the following call.
                Err(error) => return Some(FeedEvent::Error(error.to_string())),
            }
        }
    }

    async fn close(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: CLOSE_REASON.into(),
        };
        if let Err(error) = self.stream.close(Some(frame)).await {
            tracing::debug!(%error, "websocket close handshake failed");
        }
    }
}
