//! Read-only monitoring surface: all active bookings as JSON, for external
//! dashboards.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};

use booking::model::Booking;

use crate::coordinator::Coordinator;

pub fn router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/bookings", get(list_bookings))
        .with_state(coordinator)
}

async fn list_bookings(State(coordinator): State<Arc<Coordinator>>) -> Json<Vec<Booking>> {
    let mut all = Vec::new();
    for instance in &coordinator.instances {
        all.extend(instance.registry.list_all().await);
    }
    Json(all)
}
