//! Expiry sweeper

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::ReservationCache;

/// Remove every reservation dated before `today`. Idempotent.
pub fn sweep(cache: &ReservationCache, today: NaiveDate) -> usize {
    let removed = cache.remove_expired(today);
    if removed > 0 {
        info!(removed, today = %today, "Expired reservations swept");
    } else {
        debug!(today = %today, "Sweep found nothing to expire");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{day, reservation};
    use slotbook_store::SqliteStore;
    use std::sync::Arc;

    #[test]
    fn sweep_is_idempotent() {
        let cache = ReservationCache::load(Arc::new(SqliteStore::in_memory().unwrap()));
        let today = day(0);
        cache.replace_all(vec![
            reservation(day(-1), "1era", "Cañón"),
            reservation(today, "8va", "Cañón"),
            reservation(day(1), "1era", "Cañón"),
        ]);

        assert_eq!(sweep(&cache, today), 1);
        let once = cache.all();

        assert_eq!(sweep(&cache, today), 0);
        assert_eq!(cache.all(), once);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn same_day_reservations_survive() {
        let cache = ReservationCache::load(Arc::new(SqliteStore::in_memory().unwrap()));
        let today = day(0);
        cache.add(reservation(today, "1era", "Cañón"));

        assert_eq!(sweep(&cache, today), 0);
        assert_eq!(sweep(&cache, day(1)), 1);
        assert!(cache.is_empty());
    }
}
