pub mod sqlite_store;

use std::collections::HashMap;

use gateway::UserId;

use crate::model::{Booking, Bracket};

#[async_trait::async_trait]
pub trait BookingStore: Send + Sync {
    async fn load_all(&self) -> anyhow::Result<Vec<Booking>>;
    async fn save(&self, booking: &Booking) -> anyhow::Result<()>;
    async fn delete(&self, booking_id: &str) -> anyhow::Result<()>;
}

/// Durable backing for the per-bracket fairness weight tables.
///
/// Tables are read and written whole; callers serialize their
/// read-modify-write cycles (see the engine's fairness handle).
#[async_trait::async_trait]
pub trait FairnessStore: Send + Sync {
    async fn load(&self, instance: &str, bracket: Bracket)
        -> anyhow::Result<HashMap<UserId, f64>>;
    async fn save(
        &self,
        instance: &str,
        bracket: Bracket,
        weights: &HashMap<UserId, f64>,
    ) -> anyhow::Result<()>;
}
