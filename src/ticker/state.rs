use crate::ticker::types::{
    AssetSet, PriceCell, PriceMap, PricePatch, SnapshotPrice, SubscriptionKey, TickerSnapshot,
    TickerStatus,
};

pub type Generation = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredAssetsOutcome {
    Unchanged,
    Idle,
    Subscribe(Generation),
}

#[derive(Debug)]
pub struct TickerState {
    generation: Generation,
    assets: AssetSet,
    status: TickerStatus,
    prices: PriceMap,
}

impl Default for TickerState {
    fn default() -> Self {
        Self {
            generation: 0,
            assets: AssetSet::default(),
            status: TickerStatus::Idle,
            prices: PriceMap::new(),
        }
    }
}

impl TickerState {
    pub fn status(&self) -> TickerStatus {
        self.status
    }

    pub fn assets(&self) -> &AssetSet {
        &self.assets
    }

    pub fn key(&self) -> &SubscriptionKey {
        self.assets.key()
    }

    pub fn prices(&self) -> &PriceMap {
        &self.prices
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    pub fn set_desired_assets(&mut self, assets: AssetSet) -> DesiredAssetsOutcome {
        if assets.key() == self.assets.key() {
            return DesiredAssetsOutcome::Unchanged;
        }

        self.invalidate();
        self.assets = assets;

        if self.assets.is_empty() {
            self.status = TickerStatus::Idle;
            self.prices.clear();
            return DesiredAssetsOutcome::Idle;
        }

        DesiredAssetsOutcome::Subscribe(self.begin_generation())
    }

    pub fn restart(&mut self) -> Option<Generation> {
        self.invalidate();
        if self.assets.is_empty() {
            self.status = TickerStatus::Idle;
            return None;
        }
        Some(self.begin_generation())
    }

    fn begin_generation(&mut self) -> Generation {
        self.generation = self.generation.wrapping_add(1);
        self.status = TickerStatus::Connecting;
        self.generation
    }

    // Supersedes every in-flight continuation without touching data.
    pub fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn close(&mut self) {
        self.invalidate();
        if !self.assets.is_empty() {
            self.status = TickerStatus::Closed;
        }
    }

    pub fn reset(&mut self) {
        self.invalidate();
        self.assets = AssetSet::default();
        self.status = TickerStatus::Idle;
        self.prices.clear();
    }

    pub fn apply_open(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.status = TickerStatus::Open;
        let assets = &self.assets;
        self.prices.retain(|asset, _| assets.contains(asset));
        true
    }

    pub fn apply_price_patch(&mut self, generation: Generation, patch: &PricePatch) -> usize {
        if !self.is_current(generation) {
            return 0;
        }
        let mut applied = 0;
        for (asset, value) in &patch.prices {
            if self.assets.contains(asset) {
                self.prices.insert(asset.clone(), PriceCell::live(*value));
                applied += 1;
            }
        }
        applied
    }

    // Only assets without a live tick are seeded.
    pub fn apply_snapshot(&mut self, generation: Generation, entries: &[SnapshotPrice]) -> usize {
        if !self.is_current(generation) {
            return 0;
        }
        let mut applied = 0;
        for entry in entries {
            if !self.assets.contains(&entry.asset) {
                continue;
            }
            let already_live = self
                .prices
                .get(&entry.asset)
                .map(|cell| cell.live)
                .unwrap_or(false);
            if !already_live {
                self.prices
                    .insert(entry.asset.clone(), PriceCell::seeded(entry.value));
                applied += 1;
            }
        }
        applied
    }

    pub fn apply_error(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation) || self.status == TickerStatus::Closed {
            return false;
        }
        self.status = TickerStatus::Error;
        true
    }

    pub fn apply_close(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.status = TickerStatus::Closed;
        true
    }

    pub fn snapshot(&self) -> TickerSnapshot {
        TickerSnapshot {
            status: self.status,
            key: self.assets.key().clone(),
            assets: self.assets.to_vec(),
            generation: self.generation,
            prices: self.prices.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(pairs: &[(&str, f64)]) -> PricePatch {
        PricePatch {
            prices: pairs
                .iter()
                .map(|(asset, value)| (asset.to_string(), *value))
                .collect(),
        }
    }

    fn snapshot_entry(asset: &str, value: f64) -> SnapshotPrice {
        SnapshotPrice {
            asset: asset.to_string(),
            value,
        }
    }

    fn subscribe(state: &mut TickerState, raw: &[&str]) -> Generation {
        match state.set_desired_assets(AssetSet::from_raw(raw.iter().copied())) {
            DesiredAssetsOutcome::Subscribe(generation) => generation,
            other => panic!("expected a new subscription, got {other:?}"),
        }
    }

    #[test]
    fn starts_idle_and_empty() {
        let state = TickerState::default();
        assert_eq!(state.status(), TickerStatus::Idle);
        assert!(state.prices().is_empty());
        assert!(state.key().is_empty());
    }

    #[test]
    fn equivalent_asset_lists_do_not_resubscribe() {
        let mut state = TickerState::default();
        let generation = subscribe(&mut state, &["Bitcoin", " ETHEREUM "]);

        let outcome =
            state.set_desired_assets(AssetSet::from_raw(["ethereum", "bitcoin", "BITCOIN"]));

        assert_eq!(outcome, DesiredAssetsOutcome::Unchanged);
        assert!(state.is_current(generation));
        assert_eq!(state.key().as_str(), "bitcoin,ethereum");
    }

    #[test]
    fn empty_set_goes_idle_and_clears_prices() {
        let mut state = TickerState::default();
        let generation = subscribe(&mut state, &["bitcoin"]);
        state.apply_open(generation);
        state.apply_price_patch(generation, &patch(&[("bitcoin", 1.0)]));

        let outcome = state.set_desired_assets(AssetSet::from_raw(Vec::<&str>::new()));

        assert_eq!(outcome, DesiredAssetsOutcome::Idle);
        assert_eq!(state.status(), TickerStatus::Idle);
        assert!(state.prices().is_empty());
        assert!(!state.is_current(generation));
    }

    #[test]
    fn empty_set_on_fresh_state_is_a_no_op() {
        let mut state = TickerState::default();
        let outcome = state.set_desired_assets(AssetSet::from_raw([" ", ""]));
        assert_eq!(outcome, DesiredAssetsOutcome::Unchanged);
        assert_eq!(state.status(), TickerStatus::Idle);
    }

    #[test]
    fn live_value_is_not_overwritten_by_snapshot() {
        let mut state = TickerState::default();
        let generation = subscribe(&mut state, &["bitcoin"]);
        state.apply_open(generation);
        state.apply_price_patch(generation, &patch(&[("bitcoin", 65_000.12)]));

        let applied = state.apply_snapshot(generation, &[snapshot_entry("bitcoin", 64_000.0)]);

        assert_eq!(applied, 0);
        assert_eq!(
            state.prices().get("bitcoin"),
            Some(&PriceCell::live(65_000.12))
        );
    }

    #[test]
    fn live_value_overwrites_snapshot() {
        let mut state = TickerState::default();
        let generation = subscribe(&mut state, &["ethereum"]);
        state.apply_open(generation);
        state.apply_snapshot(generation, &[snapshot_entry("ethereum", 3_200.5)]);
        assert_eq!(
            state.prices().get("ethereum"),
            Some(&PriceCell::seeded(3_200.5))
        );

        state.apply_price_patch(generation, &patch(&[("ethereum", 3_205.0)]));
        assert_eq!(
            state.prices().get("ethereum"),
            Some(&PriceCell::live(3_205.0))
        );
    }

    #[test]
    fn stale_generation_callbacks_change_nothing() {
        let mut state = TickerState::default();
        let stale = subscribe(&mut state, &["bitcoin"]);
        let current = subscribe(&mut state, &["solana"]);
        assert_ne!(stale, current);

        let before = state.snapshot();
        assert!(!state.apply_open(stale));
        assert_eq!(state.apply_price_patch(stale, &patch(&[("solana", 1.0)])), 0);
        assert_eq!(state.apply_snapshot(stale, &[snapshot_entry("solana", 2.0)]), 0);
        assert!(!state.apply_error(stale));
        assert!(!state.apply_close(stale));

        assert_eq!(state.snapshot(), before);
        assert_eq!(state.status(), TickerStatus::Connecting);
    }

    #[test]
    fn prunes_removed_assets_when_new_connection_opens() {
        let mut state = TickerState::default();
        let first = subscribe(&mut state, &["bitcoin", "ethereum"]);
        state.apply_open(first);
        state.apply_price_patch(first, &patch(&[("bitcoin", 1.0), ("ethereum", 2.0)]));

        let second = subscribe(&mut state, &["solana"]);
        assert!(state.apply_open(second));

        assert!(!state.prices().contains_key("bitcoin"));
        assert!(!state.prices().contains_key("ethereum"));
    }

    #[test]
    fn keeps_prices_of_assets_still_subscribed() {
        let mut state = TickerState::default();
        let first = subscribe(&mut state, &["bitcoin", "ethereum"]);
        state.apply_open(first);
        state.apply_price_patch(first, &patch(&[("bitcoin", 1.0), ("ethereum", 2.0)]));

        let second = subscribe(&mut state, &["bitcoin", "solana"]);
        state.apply_open(second);

        assert_eq!(state.prices().get("bitcoin"), Some(&PriceCell::live(1.0)));
        assert_eq!(state.prices().len(), 1);
    }

    #[test]
    fn ignores_unsubscribed_assets_in_messages_and_snapshots() {
        let mut state = TickerState::default();
        let generation = subscribe(&mut state, &["bitcoin"]);
        state.apply_open(generation);

        state.apply_price_patch(generation, &patch(&[("dogecoin", 0.1)]));
        state.apply_snapshot(generation, &[snapshot_entry("solana", 150.0)]);

        assert!(state.prices().is_empty());
    }

    #[test]
    fn only_exact_stream_keys_update_prices() {
        let mut state = TickerState::default();
        let generation = subscribe(&mut state, &["Bitcoin"]);
        state.apply_open(generation);

        let applied =
            state.apply_price_patch(generation, &patch(&[("Bitcoin", 1.0), ("bitcoin", 2.0)]));

        assert_eq!(applied, 1);
        assert_eq!(state.prices().get("bitcoin"), Some(&PriceCell::live(2.0)));
        assert!(!state.prices().contains_key("Bitcoin"));
    }

    #[test]
    fn error_does_not_override_closed() {
        let mut state = TickerState::default();
        let generation = subscribe(&mut state, &["bitcoin"]);
        state.apply_open(generation);

        assert!(state.apply_error(generation));
        assert_eq!(state.status(), TickerStatus::Error);
        assert!(state.apply_close(generation));
        assert!(!state.apply_error(generation));
        assert_eq!(state.status(), TickerStatus::Closed);
    }

    #[test]
    fn error_keeps_existing_prices() {
        let mut state = TickerState::default();
        let generation = subscribe(&mut state, &["bitcoin"]);
        state.apply_open(generation);
        state.apply_price_patch(generation, &patch(&[("bitcoin", 10.0)]));

        state.apply_error(generation);
        assert_eq!(state.prices().get("bitcoin"), Some(&PriceCell::live(10.0)));
    }

    #[test]
    fn close_keeps_set_and_prices_and_invalidates_generation() {
        let mut state = TickerState::default();
        let generation = subscribe(&mut state, &["bitcoin"]);
        state.apply_open(generation);
        state.apply_price_patch(generation, &patch(&[("bitcoin", 10.0)]));

        state.close();

        assert_eq!(state.status(), TickerStatus::Closed);
        assert_eq!(state.key().as_str(), "bitcoin");
        assert_eq!(state.prices().len(), 1);
        assert!(!state.is_current(generation));

        let restarted = state.restart().expect("non-empty set restarts");
        assert!(restarted > generation);
        assert_eq!(state.status(), TickerStatus::Connecting);
    }

    #[test]
    fn reset_returns_to_initial_idle_state() {
        let mut state = TickerState::default();
        let generation = subscribe(&mut state, &["bitcoin"]);
        state.apply_open(generation);

        state.reset();

        assert_eq!(state.status(), TickerStatus::Idle);
        assert!(state.key().is_empty());
        assert!(state.restart().is_none());
    }

    #[test]
    fn generations_increase_monotonically() {
        let mut state = TickerState::default();
        let first = subscribe(&mut state, &["bitcoin"]);
        let second = subscribe(&mut state, &["ethereum"]);
        let third = subscribe(&mut state, &["bitcoin"]);
        assert!(first < second && second < third);
    }
}
