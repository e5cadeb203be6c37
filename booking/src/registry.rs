use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::model::{Booking, BookingId, BookingStatus, Bracket};
use crate::store::BookingStore;

/// Manages the in-memory live set of bookings and persists changes to a
/// store.
///
/// Persistence discipline: every mutation that goes through the registry is
/// written to the store before returning; bookings are deleted from the
/// store only once they reach a terminal status (or are removed outright by
/// a cancellation/expiry).
pub struct BookingRegistry<S: BookingStore> {
    bookings: Arc<Mutex<HashMap<BookingId, Booking>>>,
    by_bracket: Arc<Mutex<HashMap<Bracket, Vec<BookingId>>>>,
    store: Arc<S>,
}

impl<S: BookingStore> BookingRegistry<S> {
    /// Initialize a fresh registry from the store (load_all).
    pub async fn new(store: Arc<S>) -> anyhow::Result<Self> {
        let registry = Self {
            bookings: Arc::new(Mutex::new(HashMap::new())),
            by_bracket: Arc::new(Mutex::new(HashMap::new())),
            store,
        };

        registry.restore_from_store().await?;
        Ok(registry)
    }

    /// Load all previously saved bookings and rebuild the bracket index.
    /// Called once at startup so non-terminal bookings survive restarts.
    async fn restore_from_store(&self) -> anyhow::Result<()> {
        let all: Vec<Booking> = self.store.load_all().await?;
        let mut bookings = self.bookings.lock().await;
        let mut by_bracket = self.by_bracket.lock().await;

        for b in all {
            if b.status.is_terminal() {
                // Terminal rows should never be in the store; drop them.
                warn!(booking_id = %b.id, status = %b.status, "discarding terminal booking from store");
                let _ = self.store.delete(&b.id).await;
                continue;
            }
            by_bracket.entry(b.bracket).or_default().push(b.id.clone());
            bookings.insert(b.id.clone(), b);
        }

        info!(count = bookings.len(), "bookings restored from store");
        Ok(())
    }

    /// Register a new booking, store it, and index it. Re-draws the short
    /// numeric id on the (unlikely) collision with a live booking.
    pub async fn create(&self, mut booking: Booking) -> anyhow::Result<BookingId> {
        {
            let bookings = self.bookings.lock().await;
            while bookings.contains_key(&booking.id) {
                booking.id = common::id::short_numeric_id();
            }
        }
        let id = booking.id.clone();

        self.store.save(&booking).await?;

        {
            let mut guard = self.bookings.lock().await;
            guard.insert(id.clone(), booking.clone());
        }

        {
            let mut idx = self.by_bracket.lock().await;
            idx.entry(booking.bracket).or_default().push(id.clone());
        }

        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Option<Booking> {
        let guard = self.bookings.lock().await;
        guard.get(id).cloned()
    }

    /// Apply `mutate` to the booking and persist the result. A mutation that
    /// lands the booking in a terminal status removes it from the registry
    /// and the store instead of saving it.
    pub async fn update<F>(&self, id: &str, mutate: F) -> anyhow::Result<Booking>
    where
        F: FnOnce(&mut Booking) -> anyhow::Result<()>,
    {
        let updated = {
            let mut guard = self.bookings.lock().await;
            let b = guard
                .get_mut(id)
                .ok_or_else(|| anyhow::anyhow!("No booking was found with ID {id}"))?;
            mutate(b)?;
            b.clone()
        };

        if updated.status.is_terminal() {
            self.remove(id).await?;
        } else {
            self.store.save(&updated).await?;
        }

        Ok(updated)
    }

    /// Drop a booking from memory, index and store, regardless of status.
    /// Used for cancellations and expiry in addition to terminal cleanup.
    pub async fn remove(&self, id: &str) -> anyhow::Result<()> {
        let removed = {
            let mut guard = self.bookings.lock().await;
            guard.remove(id)
        };

        if let Some(b) = removed {
            let mut idx = self.by_bracket.lock().await;
            if let Some(list) = idx.get_mut(&b.bracket) {
                list.retain(|bid| bid != id);
            }
        }

        self.store.delete(id).await?;
        info!(booking_id = %id, "booking removed");
        Ok(())
    }

    pub async fn list_all(&self) -> Vec<Booking> {
        let guard = self.bookings.lock().await;
        let mut all: Vec<Booking> = guard.values().cloned().collect();
        all.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms));
        all
    }

    /// Unclaimed bookings for the untaken board, one bracket at a time.
    pub async fn untaken_for(&self, bracket: Bracket) -> Vec<Booking> {
        let ids_opt = {
            let idx = self.by_bracket.lock().await;
            idx.get(&bracket).cloned()
        };

        let Some(ids) = ids_opt else { return vec![] };

        let bookings = self.bookings.lock().await;

        ids.iter()
            .filter_map(|id| bookings.get(id).cloned())
            .filter(|b| b.status == BookingStatus::Untaken)
            .collect()
    }

    /// Bookings whose age exceeds the retention window.
    pub async fn expired(&self, now_ms: u64, retention_ms: u64) -> Vec<Booking> {
        let guard = self.bookings.lock().await;
        guard
            .values()
            .filter(|b| b.age_ms(now_ms) > retention_ms)
            .cloned()
            .collect()
    }

    /// True while any booking has not settled on a booster yet, which makes
    /// a shutdown unsafe.
    pub async fn has_uncommitted(&self) -> bool {
        let guard = self.bookings.lock().await;
        guard.values().any(|b| b.status.is_uncommitted())
    }

    pub async fn len(&self) -> usize {
        self.bookings.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
