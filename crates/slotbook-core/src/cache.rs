//! Local reservation cache
//!
//! A non-authoritative mirror of what the Reservation Store holds. Every
//! mutation updates memory and the durable mirror under the same write lock,
//! so readers never see a half-applied change.

use chrono::NaiveDate;
use slotbook_api::{Reservation, SlotKey};
use slotbook_store::{MIRROR_SLOT, Store};
use slotbook_util::ReservationId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Reservations known to this client, keyed by id
pub struct ReservationCache {
    entries: RwLock<HashMap<ReservationId, Reservation>>,
    store: Arc<dyn Store>,
    slot: String,
}

impl ReservationCache {
    /// Load the cache from the durable mirror. An unreadable mirror starts
    /// the cache empty; the next sync repopulates it.
    pub fn load(store: Arc<dyn Store>) -> Self {
        Self::load_slot(store, MIRROR_SLOT)
    }

    pub fn load_slot(store: Arc<dyn Store>, slot: impl Into<String>) -> Self {
        let slot = slot.into();
        let entries = match store.load_mirror(&slot) {
            Ok(Some(reservations)) => reservations.into_iter().map(|r| (r.id, r)).collect(),
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!(error = %e, slot = %slot, "Failed to load reservation mirror, starting empty");
                HashMap::new()
            }
        };

        debug!(count = entries.len(), slot = %slot, "Reservation cache loaded");

        Self {
            entries: RwLock::new(entries),
            store,
            slot,
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, id: ReservationId) -> Option<Reservation> {
        self.read().get(&id).cloned()
    }

    /// Every cached reservation, past ones included
    pub fn all(&self) -> Vec<Reservation> {
        sorted(self.read().values().cloned().collect())
    }

    pub fn add(&self, reservation: Reservation) {
        let mut entries = self.write();
        debug!(reservation_id = %reservation.id, "Caching reservation");
        entries.insert(reservation.id, reservation);
        self.persist(&entries);
    }

    pub fn remove(&self, id: ReservationId) -> Option<Reservation> {
        let mut entries = self.write();
        let removed = entries.remove(&id);
        if removed.is_some() {
            debug!(reservation_id = %id, "Removed reservation from cache");
            self.persist(&entries);
        }
        removed
    }

    /// Swap the whole collection, as after a sync
    pub fn replace_all(&self, reservations: Vec<Reservation>) {
        let mut entries = self.write();
        *entries = reservations.into_iter().map(|r| (r.id, r)).collect();
        debug!(count = entries.len(), "Reservation cache replaced");
        self.persist(&entries);
    }

    /// Reservations whose date is today or later
    pub fn active_reservations(&self, today: NaiveDate) -> Vec<Reservation> {
        sorted(
            self.read()
                .values()
                .filter(|r| r.is_active(today))
                .cloned()
                .collect(),
        )
    }

    /// Slot keys held by active reservations
    pub fn occupied_slot_set(&self, today: NaiveDate) -> HashSet<SlotKey> {
        self.read()
            .values()
            .filter(|r| r.is_active(today))
            .map(Reservation::slot_key)
            .collect()
    }

    /// Drop every reservation dated before `today`; returns how many went
    pub fn remove_expired(&self, today: NaiveDate) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, r| r.is_active(today));
        let removed = before - entries.len();
        if removed > 0 {
            self.persist(&entries);
        }
        removed
    }

    fn persist(&self, entries: &HashMap<ReservationId, Reservation>) {
        let snapshot = sorted(entries.values().cloned().collect());
        if let Err(e) = self.store.save_mirror(&self.slot, &snapshot) {
            warn!(error = %e, slot = %self.slot, "Failed to persist reservation mirror");
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ReservationId, Reservation>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ReservationId, Reservation>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn sorted(mut reservations: Vec<Reservation>) -> Vec<Reservation> {
    reservations.sort_by(|a, b| {
        (a.date, a.shift, &a.resource, &a.hour, a.id).cmp(&(b.date, b.shift, &b.resource, &b.hour, b.id))
    });
    reservations
}
