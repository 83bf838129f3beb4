use crate::ticker::feed::{FeedConnection, FeedEvent, PriceFeed};
use crate::ticker::state::{DesiredAssetsOutcome, Generation, TickerState};
use crate::ticker::types::{
    parse_price_patch, AssetSet, PriceMap, TickerSnapshot, TickerStatus,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct ConnectionHandle {
    generation: Generation,
    cancellation_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

struct TickerShared {
    feed: Arc<dyn PriceFeed>,
    snapshot_timeout: Duration,
    state: Mutex<TickerState>,
    updates: watch::Sender<TickerSnapshot>,
}

impl TickerShared {
    // Publishes a snapshot only when `apply` reports a change.
    fn mutate(&self, apply: impl FnOnce(&mut TickerState) -> bool) -> bool {
        let mut state = self.state.lock();
        let changed = apply(&mut state);
        if changed {
            self.updates.send_replace(state.snapshot());
        }
        changed
    }
}

enum StreamStep {
    Cancelled,
    Event(Option<FeedEvent>),
}

/// Keeps one live price subscription in line with the desired asset set.
///
/// Lifecycle operations are serialized: the previous connection task is
/// cancelled and awaited before the next one is spawned, so at most one
/// stream is open at a time. Callbacks from superseded generations are
/// dropped by [`TickerState`].
pub struct TickerManager {
    shared: Arc<TickerShared>,
    connection: tokio::sync::Mutex<Option<ConnectionHandle>>,
}

impl TickerManager {
    pub fn new(feed: Arc<dyn PriceFeed>, snapshot_timeout: Duration) -> Self {
        let state = TickerState::default();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            shared: Arc::new(TickerShared {
                feed,
                snapshot_timeout,
                state: Mutex::new(state),
                updates,
            }),
            connection: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn set_desired_assets<I, S>(&self, symbols: I) -> DesiredAssetsOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let assets = AssetSet::from_raw(symbols);
        let mut connection = self.connection.lock().await;

        let mut outcome = DesiredAssetsOutcome::Unchanged;
        self.shared.mutate(|state| {
            outcome = state.set_desired_assets(assets.clone());
            outcome != DesiredAssetsOutcome::Unchanged
        });

        match outcome {
            DesiredAssetsOutcome::Unchanged => {}
            DesiredAssetsOutcome::Idle => {
                info!("ticker asset set cleared; going idle");
                teardown(connection.take()).await;
            }
            DesiredAssetsOutcome::Subscribe(generation) => {
                info!(key = %assets.key(), generation, "ticker asset set changed");
                teardown(connection.take()).await;
                *connection = Some(self.spawn_subscription(assets, generation));
            }
        }

        outcome
    }

    // Restarts even when the key is unchanged; `false` when the set is empty.
    pub async fn open(&self) -> bool {
        let mut connection = self.connection.lock().await;

        let mut next_generation = None;
        self.shared.mutate(|state| {
            next_generation = state.restart();
            true
        });
        teardown(connection.take()).await;

        let Some(generation) = next_generation else {
            return false;
        };
        let assets = self.shared.state.lock().assets().clone();
        info!(key = %assets.key(), generation, "ticker subscription reopened");
        *connection = Some(self.spawn_subscription(assets, generation));
        true
    }

    pub async fn close(&self) {
        let mut connection = self.connection.lock().await;
        self.shared.mutate(|state| {
            state.close();
            true
        });
        teardown(connection.take()).await;
    }

    pub async fn dispose(&self) {
        let mut connection = self.connection.lock().await;
        self.shared.mutate(|state| {
            state.reset();
            true
        });
        teardown(connection.take()).await;
        debug!("ticker manager disposed");
    }

    pub fn status(&self) -> TickerStatus {
        self.shared.state.lock().status()
    }

    pub fn prices(&self) -> PriceMap {
        self.shared.state.lock().prices().clone()
    }

    pub fn snapshot(&self) -> TickerSnapshot {
        self.shared.state.lock().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<TickerSnapshot> {
        self.shared.updates.subscribe()
    }

    fn spawn_subscription(&self, assets: AssetSet, generation: Generation) -> ConnectionHandle {
        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.clone();
        let shared = Arc::clone(&self.shared);
        let join_handle = tokio::spawn(async move {
            run_subscription(shared, assets, generation, task_token).await;
        });

        ConnectionHandle {
            generation,
            cancellation_token,
            join_handle,
        }
    }
}

async fn teardown(handle: Option<ConnectionHandle>) {
    let Some(handle) = handle else {
        return;
    };
    handle.cancellation_token.cancel();
    if let Err(error) = handle.join_handle.await {
        warn!(generation = handle.generation, %error, "ticker connection task failed");
    }
}

async fn run_subscription(
    shared: Arc<TickerShared>,
    assets: AssetSet,
    generation: Generation,
    cancel_token: CancellationToken,
) {
    let connect_result = tokio::select! {
        _ = cancel_token.cancelled() => return,
        result = shared.feed.connect(&assets) => result,
    };

    let mut connection = match connect_result {
        Ok(connection) => connection,
        Err(error) => {
            warn!(key = %assets.key(), generation, %error, "price stream connect failed");
            shared.mutate(|state| state.apply_error(generation));
            shared.mutate(|state| state.apply_close(generation));
            return;
        }
    };

    if cancel_token.is_cancelled() || !shared.mutate(|state| state.apply_open(generation)) {
        connection.close().await;
        return;
    }
    info!(key = %assets.key(), generation, "price stream open");

    tokio::spawn(seed_from_snapshot(
        Arc::clone(&shared),
        assets.clone(),
        generation,
        cancel_token.clone(),
    ));

    pump_stream(&shared, connection.as_mut(), generation, &cancel_token).await;
}

async fn pump_stream(
    shared: &TickerShared,
    connection: &mut dyn FeedConnection,
    generation: Generation,
    cancel_token: &CancellationToken,
) {
    loop {
        let step = tokio::select! {
            _ = cancel_token.cancelled() => StreamStep::Cancelled,
            event = connection.next_event() => StreamStep::Event(event),
        };

        match step {
            StreamStep::Cancelled => {
                // Self-initiated close: no status transition is published.
                connection.close().await;
                debug!(generation, "price stream closed by teardown");
                return;
            }
            StreamStep::Event(Some(FeedEvent::Message(mut payload))) => {
                match parse_price_patch(payload.as_mut_slice()) {
                    Ok(patch) => {
                        shared.mutate(|state| state.apply_price_patch(generation, &patch) > 0);
                    }
                    Err(error) => {
                        debug!(generation, %error, "ignoring malformed price message");
                    }
                }
            }
            StreamStep::Event(Some(FeedEvent::Error(reason))) => {
                warn!(generation, %reason, "price stream error");
                shared.mutate(|state| state.apply_error(generation));
            }
            StreamStep::Event(Some(FeedEvent::Closed)) | StreamStep::Event(None) => {
                if shared.mutate(|state| state.apply_close(generation)) {
                    info!(generation, "price stream closed by remote");
                }
                return;
            }
        }
    }
}

async fn seed_from_snapshot(
    shared: Arc<TickerShared>,
    assets: AssetSet,
    generation: Generation,
    cancel_token: CancellationToken,
) {
    let fetch = tokio::time::timeout(shared.snapshot_timeout, shared.feed.fetch_snapshot(&assets));
    let result = tokio::select! {
        _ = cancel_token.cancelled() => return,
        result = fetch => result,
    };

    match result {
        Ok(Ok(entries)) => {
            let mut applied = 0;
            shared.mutate(|state| {
                applied = state.apply_snapshot(generation, &entries);
                applied > 0
            });
            debug!(generation, applied, "snapshot prices seeded");
        }
        Ok(Err(error)) => {
            debug!(generation, %error, "snapshot unavailable; waiting for live prices");
        }
        Err(_) => {
            debug!(
                generation,
                timeout_ms = shared.snapshot_timeout.as_millis() as u64,
                "snapshot timed out; waiting for live prices"
            );
        }
    }
}
