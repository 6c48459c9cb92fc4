//! Live price cache: symbol → latest snapshot, merged from push and pull
//! sources.
//!
//! Reads hand out an immutable view that stays valid across later
//! mutations (copy-on-write), so observers never see a torn intermediate
//! state. Per-symbol ordering is last-write-wins by arrival order at the
//! cache, not by the timestamp inside the payload.

use crate::types::PriceSnapshot;
use std::collections::HashMap;
use std::sync::Arc;

/// Copy-on-write mapping from instrument symbol to its latest snapshot.
///
/// The cache lives for the whole session; entries are replaced wholesale
/// and never deleted. Disconnects do not clear it: last-known-good data is
/// intentionally stale-tolerant.
#[derive(Debug, Clone, Default)]
pub struct PriceCache {
    view: Arc<HashMap<String, PriceSnapshot>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-or-replace the snapshot for its symbol.
    pub fn apply(&mut self, snapshot: PriceSnapshot) {
        let map = Arc::make_mut(&mut self.view);
        map.insert(snapshot.symbol.clone(), snapshot);
    }

    /// Apply each snapshot independently, in sequence order. Later entries
    /// for the same symbol within one bulk win.
    pub fn apply_bulk(&mut self, snapshots: impl IntoIterator<Item = PriceSnapshot>) {
        let map = Arc::make_mut(&mut self.view);
        for snapshot in snapshots {
            map.insert(snapshot.symbol.clone(), snapshot);
        }
    }

    /// Current view of the cache.
    ///
    /// The returned map is safe to retain: subsequent `apply` calls produce
    /// a new view rather than mutating this one in place.
    pub fn read(&self) -> Arc<HashMap<String, PriceSnapshot>> {
        Arc::clone(&self.view)
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceSnapshot> {
        self.view.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn snapshot(symbol: &str, price: f64) -> PriceSnapshot {
        PriceSnapshot {
            symbol: symbol.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 2, 14, 30, 0).unwrap(),
            open: price - 1.0,
            high: price + 1.0,
            low: price - 2.0,
            close: price,
            volume: 1_000.0,
            current_price: price,
            last_update: None,
        }
    }

    #[test]
    fn test_apply_inserts_and_replaces() {
        let mut cache = PriceCache::new();
        cache.apply(snapshot("AAPL", 190.5));
        cache.apply(snapshot("AAPL", 191.0));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("AAPL").unwrap().current_price, 191.0);
    }

    #[test]
    fn test_replay_is_last_write_wins_per_symbol() {
        // Interleaved singles and bulks; each symbol must end at the last
        // call that mentioned it, by arrival order.
        let mut cache = PriceCache::new();
        cache.apply(snapshot("AAPL", 190.5));
        cache.apply_bulk([snapshot("AAPL", 191.0), snapshot("TSLA", 250.0)]);
        cache.apply(snapshot("TSLA", 249.0));
        cache.apply_bulk([snapshot("MSFT", 410.0)]);

        let view = cache.read();
        assert_eq!(view.len(), 3);
        assert_eq!(view["AAPL"].current_price, 191.0);
        assert_eq!(view["TSLA"].current_price, 249.0);
        assert_eq!(view["MSFT"].current_price, 410.0);
    }

    #[test]
    fn test_bulk_later_entry_wins_within_one_bulk() {
        let mut cache = PriceCache::new();
        cache.apply_bulk([snapshot("AAPL", 190.0), snapshot("AAPL", 192.5)]);
        assert_eq!(cache.get("AAPL").unwrap().current_price, 192.5);
    }

    #[test]
    fn test_read_view_survives_later_mutations() {
        let mut cache = PriceCache::new();
        cache.apply(snapshot("AAPL", 190.5));

        let before = cache.read();
        cache.apply(snapshot("AAPL", 199.0));
        cache.apply(snapshot("TSLA", 250.0));

        // Retained view is untouched; fresh view sees both writes.
        assert_eq!(before.len(), 1);
        assert_eq!(before["AAPL"].current_price, 190.5);
        let after = cache.read();
        assert_eq!(after["AAPL"].current_price, 199.0);
        assert_eq!(after["TSLA"].current_price, 250.0);
    }

    #[test]
    fn test_arrival_order_beats_payload_timestamp() {
        let mut cache = PriceCache::new();
        let mut older = snapshot("AAPL", 195.0);
        older.timestamp = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();

        cache.apply(snapshot("AAPL", 190.5));
        cache.apply(older);

        // No out-of-order correction: the later arrival wins.
        assert_eq!(cache.get("AAPL").unwrap().current_price, 195.0);
    }
}
