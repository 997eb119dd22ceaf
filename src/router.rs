use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use std::sync::Arc;

use crate::db::{ReadingStore, Registry};
use crate::handlers::{ingest, readings, registry};
use crate::middleware::BODY_LIMIT;
use crate::service::pipeline::IngestionPipeline;

#[derive(Clone)]
pub struct MonitorState {
    pub pipeline: IngestionPipeline,
    pub readings: ReadingStore,
    pub registry: Registry,
    pub operator_key: Arc<str>,
}

impl MonitorState {
    pub fn new(
        pipeline: IngestionPipeline,
        readings: ReadingStore,
        registry: Registry,
        operator_key: Arc<str>,
    ) -> Self {
        Self {
            pipeline,
            readings,
            registry,
            operator_key,
        }
    }
}

pub fn monitor_router(state: MonitorState) -> Router {
    Router::new()
        .route("/api/iot/reading", post(ingest::device_reading))
        .route(
            "/api/readings",
            post(ingest::operator_reading).get(readings::recent_readings),
        )
        .route("/api/readings/{id}", get(readings::get_reading))
        .route("/api/readings/{id}/notify", post(readings::retry_notification))
        .route("/api/patients", post(registry::create_patient))
        .route("/api/patients/{id}", get(registry::get_patient))
        .route("/api/patients/{id}/caregivers", post(registry::link_caregiver))
        .route(
            "/api/patients/{id}/caregivers/{caregiver_id}",
            delete(registry::unlink_caregiver),
        )
        .route("/api/caregivers", post(registry::create_caregiver))
        .route("/api/devices", post(registry::register_device))
        .route(
            "/api/devices/{device_id}",
            get(registry::get_device).patch(registry::update_device),
        )
        .route(
            "/api/devices/{device_id}/credential",
            post(registry::rotate_credential),
        )
        .route("/api/devices/{device_id}/readings", get(readings::device_readings))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}
