use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use booking::model::{Booking, BookingId};
use booking::store::BookingStore;

#[derive(Default)]
pub struct InMemoryBookingStore {
    pub map: Arc<Mutex<HashMap<BookingId, Booking>>>,
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn load_all(&self) -> anyhow::Result<Vec<Booking>> {
        Ok(self.map.lock().await.values().cloned().collect())
    }

    async fn save(&self, booking: &Booking) -> anyhow::Result<()> {
        self.map
            .lock()
            .await
            .insert(booking.id.clone(), booking.clone());
        Ok(())
    }

    async fn delete(&self, booking_id: &str) -> anyhow::Result<()> {
        self.map.lock().await.remove(booking_id);
        Ok(())
    }
}
