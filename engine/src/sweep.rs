//! Recurring expiry sweep: bookings older than the retention window are
//! force-expired regardless of status, their authors told when the booking
//! had already gone public, and the untaken board re-rendered.

use tracing::{info, instrument, warn};

use booking::model::BookingStatus;
use booking::store::BookingStore;

use crate::instance::Instance;

/// One sweep pass. Returns how many bookings were expired.
#[instrument(skip(instance), fields(instance = %instance.settings.name))]
pub async fn sweep_once<S: BookingStore>(instance: &Instance<S>) -> anyhow::Result<usize> {
    let now = common::time::now_ms();
    let expired = instance
        .registry
        .expired(now, instance.settings.retention_ms())
        .await;
    let count = expired.len();

    for b in expired {
        if b.status != BookingStatus::Compiling {
            let line = format!(
                "Your booking ``{}`` for ``{} {}`` has expired from the bookings board, if the buyer still wants a boost, please create a new booking",
                b.id,
                b.buyer.name.as_deref().unwrap_or("?"),
                b.boost_summary(),
            );
            if let Err(e) = instance.chat.send_dm(b.author, &line).await {
                warn!(error = ?e, booking_id = %b.id, "expiry notification failed");
            }
        }
        instance.registry.remove(&b.id).await?;
        info!(booking_id = %b.id, status = %b.status, "expired booking removed");
    }

    if let Err(e) = instance.board.render().await {
        warn!(error = ?e, "untaken board refresh after sweep failed");
    }

    Ok(count)
}
