use crate::error::AppError;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TickerStatus {
    Idle,
    Connecting,
    Open,
    Closed,
    Error,
}

impl TickerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TickerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetSet {
    symbols: BTreeSet<String>,
    key: SubscriptionKey,
}

impl AssetSet {
    pub fn from_raw<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols: BTreeSet<String> = raw
            .into_iter()
            .filter_map(|symbol| canonical_symbol(symbol.as_ref()))
            .collect();
        let key = SubscriptionKey(symbols.iter().map(String::as_str).collect::<Vec<_>>().join(","));
        Self { symbols, key }
    }

    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.symbols.iter().cloned().collect()
    }
}

pub fn canonical_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_lowercase();
    if symbol.is_empty() {
        None
    } else {
        Some(symbol)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceCell {
    pub value: f64,
    pub live: bool,
}

impl PriceCell {
    pub fn live(value: f64) -> Self {
        Self { value, live: true }
    }

    pub fn seeded(value: f64) -> Self {
        Self { value, live: false }
    }
}

pub type PriceMap = BTreeMap<String, PriceCell>;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TickerSnapshot {
    pub status: TickerStatus,
    pub key: SubscriptionKey,
    pub assets: Vec<String>,
    pub generation: u64,
    pub prices: PriceMap,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceWire {
    Text(String),
    Number(f64),
    #[allow(dead_code)]
    Other(IgnoredAny),
}

impl PriceWire {
    fn into_price(self) -> Option<f64> {
        let value = match self {
            Self::Text(raw) => raw.trim().parse::<f64>().ok()?,
            Self::Number(value) => value,
            Self::Other(_) => return None,
        };
        value.is_finite().then_some(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricePatch {
    pub prices: BTreeMap<String, f64>,
}

impl PricePatch {
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Decodes a stream frame such as `{"bitcoin":"65000.12"}`.
///
/// A payload that is not a JSON object fails as a whole; individual fields
/// with a missing or non-numeric price are dropped. Keys are kept verbatim,
/// so only exact canonical ids can match a subscribed asset.
pub fn parse_price_patch(payload: &mut [u8]) -> Result<PricePatch, AppError> {
    let wire: HashMap<String, PriceWire> = simd_json::serde::from_slice(payload)?;
    let prices = wire
        .into_iter()
        .filter_map(|(asset, price)| Some((asset, price.into_price()?)))
        .collect();
    Ok(PricePatch { prices })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntryWire {
    pub id: String,
    #[serde(default)]
    pub price_usd: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPayloadWire {
    #[serde(default)]
    pub data: Vec<SnapshotEntryWire>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPrice {
    pub asset: String,
    pub value: f64,
}

impl TryFrom<SnapshotEntryWire> for SnapshotPrice {
    type Error = AppError;

    fn try_from(value: SnapshotEntryWire) -> Result<Self, Self::Error> {
        let asset = canonical_symbol(&value.id)
            .ok_or_else(|| AppError::InvalidArgument("snapshot entry without id".to_string()))?;
        let raw = value.price_usd.ok_or_else(|| {
            AppError::InvalidArgument(format!("no snapshot price for '{asset}'"))
        })?;
        let price = raw
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::InvalidArgument(format!("invalid snapshot price '{raw}'")))?;
        if !price.is_finite() {
            return Err(AppError::InvalidArgument(
                "snapshot price must be finite".to_string(),
            ));
        }
        Ok(Self {
            asset,
            value: price,
        })
    }
}

// Unusable entries mean "no snapshot available" for that asset.
pub fn snapshot_prices(payload: SnapshotPayloadWire) -> Vec<SnapshotPrice> {
    payload
        .data
        .into_iter()
        .filter_map(|entry| SnapshotPrice::try_from(entry).ok())
        .collect()
}
