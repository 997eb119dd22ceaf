use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::MonitorError;
use crate::middleware::{ApiJson, RequireOperatorKey};
use crate::router::MonitorState;
use crate::service::pipeline::IngestOutcome;

#[derive(Debug, Deserialize)]
pub struct DeviceReadingRequest {
    #[serde(alias = "deviceId")]
    pub device_id: Option<String>,
    #[serde(alias = "credential", alias = "apiKey")]
    pub api_key: Option<String>,
    #[serde(alias = "heartRate")]
    pub heart_rate: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OperatorReadingRequest {
    #[serde(alias = "heartRate")]
    pub heart_rate: Option<i64>,
    #[serde(alias = "patientId")]
    pub patient_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'static str>,
    #[serde(flatten)]
    pub outcome: IngestOutcome,
}

fn missing(field: &str) -> MonitorError {
    MonitorError::Validation(format!("missing required field: {field}"))
}

fn required_text(value: Option<String>, field: &str) -> Result<String, MonitorError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| missing(field))
}

/// `POST /api/iot/reading`
pub async fn device_reading(
    State(state): State<MonitorState>,
    ApiJson(req): ApiJson<DeviceReadingRequest>,
) -> Result<Json<IngestResponse>, MonitorError> {
    let device_id = required_text(req.device_id, "device_id")?;
    let api_key = required_text(req.api_key, "api_key")?;
    let heart_rate = req.heart_rate.ok_or_else(|| missing("heart_rate"))?;

    let outcome = state
        .pipeline
        .ingest_device(&device_id, &api_key, heart_rate)
        .await?;
    info!(
        reading_id = outcome.reading_id,
        device_id = %device_id,
        dangerous = outcome.dangerous,
        "device reading accepted"
    );
    Ok(Json(IngestResponse {
        success: true,
        warning: None,
        outcome,
    }))
}

/// `POST /api/readings`
pub async fn operator_reading(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    ApiJson(req): ApiJson<OperatorReadingRequest>,
) -> Result<Json<IngestResponse>, MonitorError> {
    let heart_rate = req.heart_rate.ok_or_else(|| missing("heart_rate"))?;
    let patient_id = req.patient_id.ok_or_else(|| missing("patient_id"))?;

    let outcome = state.pipeline.ingest_operator(patient_id, heart_rate).await?;
    info!(
        reading_id = outcome.reading_id,
        patient_id,
        dangerous = outcome.dangerous,
        "operator reading accepted"
    );
    let warning = outcome
        .dangerous
        .then_some("Dangerous health condition detected. Caregivers have been notified.");
    Ok(Json(IngestResponse {
        success: true,
        warning,
        outcome,
    }))
}
