use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use crate::db::models::Reading;
use crate::error::MonitorError;
use crate::middleware::{ApiQuery, RequireOperatorKey};
use crate::router::MonitorState;
use crate::service::pipeline::AlertOutcome;

const DEFAULT_RECENT: u32 = 10;
const DEFAULT_DEVICE_HISTORY: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub patient_id: Option<i64>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ReadingList {
    pub count: usize,
    pub readings: Vec<Reading>,
}

impl From<Vec<Reading>> for ReadingList {
    fn from(readings: Vec<Reading>) -> Self {
        Self {
            count: readings.len(),
            readings,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub reading_id: i64,
    pub alert: AlertOutcome,
}

/// `GET /api/readings`
pub async fn recent_readings(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    ApiQuery(q): ApiQuery<RecentQuery>,
) -> Result<Json<ReadingList>, MonitorError> {
    let readings = state
        .readings
        .recent(q.patient_id, q.limit.unwrap_or(DEFAULT_RECENT))
        .await?;
    Ok(Json(readings.into()))
}

/// `GET /api/readings/{id}`
pub async fn get_reading(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    Path(id): Path<i64>,
) -> Result<Json<Reading>, MonitorError> {
    state
        .readings
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| MonitorError::not_found("reading", id))
}

/// `POST /api/readings/{id}/notify`
pub async fn retry_notification(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    Path(id): Path<i64>,
) -> Result<Json<NotifyResponse>, MonitorError> {
    let alert = state.pipeline.retry_notification(id).await?;
    Ok(Json(NotifyResponse {
        reading_id: id,
        alert,
    }))
}

/// `GET /api/devices/{device_id}/readings`
pub async fn device_readings(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    Path(device_id): Path<String>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> Result<Json<ReadingList>, MonitorError> {
    if state.registry.get_device(&device_id).await?.is_none() {
        return Err(MonitorError::not_found("device", device_id));
    }
    let readings = state
        .readings
        .by_device(&device_id, q.limit.unwrap_or(DEFAULT_DEVICE_HISTORY))
        .await?;
    Ok(Json(readings.into()))
}
