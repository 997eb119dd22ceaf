use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::models::{
    Caregiver, Device, DeviceUpdate, LinkedCaregiver, NewCaregiver, NewDevice, NewPatient, Patient,
};
use crate::error::MonitorError;
use crate::middleware::{ApiJson, RequireOperatorKey};
use crate::router::MonitorState;

#[derive(Debug, Serialize)]
pub struct PatientDetail {
    #[serde(flatten)]
    pub patient: Patient,
    pub caregivers: Vec<LinkedCaregiver>,
    pub devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    #[serde(alias = "caregiverId")]
    pub caregiver_id: i64,
    pub relationship: String,
}

/// Returned only by registration and rotation; the credential is never
/// readable afterwards.
#[derive(Debug, Serialize)]
pub struct IssuedCredential {
    #[serde(flatten)]
    pub device: Device,
    pub api_key: String,
}

/// `POST /api/patients`
pub async fn create_patient(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    ApiJson(req): ApiJson<NewPatient>,
) -> Result<(StatusCode, Json<Patient>), MonitorError> {
    let patient = state.registry.create_patient(req).await?;
    info!(patient_id = patient.id, "patient created");
    Ok((StatusCode::CREATED, Json(patient)))
}

/// `GET /api/patients/{id}`
pub async fn get_patient(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    Path(id): Path<i64>,
) -> Result<Json<PatientDetail>, MonitorError> {
    let patient = state
        .registry
        .get_patient(id)
        .await?
        .ok_or_else(|| MonitorError::not_found("patient", id))?;
    let caregivers = state.registry.caregivers_of(id).await?;
    let devices = state.registry.devices_of(id).await?;
    Ok(Json(PatientDetail {
        patient,
        caregivers,
        devices,
    }))
}

/// `POST /api/caregivers`
pub async fn create_caregiver(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    ApiJson(req): ApiJson<NewCaregiver>,
) -> Result<(StatusCode, Json<Caregiver>), MonitorError> {
    let caregiver = state.registry.create_caregiver(req).await?;
    info!(caregiver_id = caregiver.id, "caregiver created");
    Ok((StatusCode::CREATED, Json(caregiver)))
}

/// `POST /api/patients/{id}/caregivers`
pub async fn link_caregiver(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    Path(patient_id): Path<i64>,
    ApiJson(req): ApiJson<LinkRequest>,
) -> Result<(StatusCode, Json<Vec<LinkedCaregiver>>), MonitorError> {
    let relationship = req.relationship.trim();
    if relationship.is_empty() {
        return Err(MonitorError::Validation("relationship is required".into()));
    }
    state
        .registry
        .link_caregiver(patient_id, req.caregiver_id, relationship)
        .await?;
    info!(patient_id, caregiver_id = req.caregiver_id, "caregiver linked");
    let linked = state.registry.caregivers_of(patient_id).await?;
    Ok((StatusCode::CREATED, Json(linked)))
}

/// `DELETE /api/patients/{id}/caregivers/{caregiver_id}`
pub async fn unlink_caregiver(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    Path((patient_id, caregiver_id)): Path<(i64, i64)>,
) -> Result<StatusCode, MonitorError> {
    state
        .registry
        .unlink_caregiver(patient_id, caregiver_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/devices`
pub async fn register_device(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    ApiJson(req): ApiJson<NewDevice>,
) -> Result<(StatusCode, Json<IssuedCredential>), MonitorError> {
    let device = state.registry.register_device(req).await?;
    info!(device_id = %device.device_id, patient_id = ?device.patient_id, "device registered");
    let api_key = device.api_key.clone();
    Ok((StatusCode::CREATED, Json(IssuedCredential { device, api_key })))
}

/// `GET /api/devices/{device_id}`
pub async fn get_device(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    Path(device_id): Path<String>,
) -> Result<Json<Device>, MonitorError> {
    state
        .registry
        .get_device(&device_id)
        .await?
        .map(Json)
        .ok_or_else(|| MonitorError::not_found("device", device_id))
}

/// `PATCH /api/devices/{device_id}`
pub async fn update_device(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    Path(device_id): Path<String>,
    ApiJson(update): ApiJson<DeviceUpdate>,
) -> Result<Json<Device>, MonitorError> {
    let device = state.registry.update_device(&device_id, update).await?;
    info!(
        device_id = %device.device_id,
        status = device.status.as_str(),
        patient_id = ?device.patient_id,
        "device updated"
    );
    Ok(Json(device))
}

/// `POST /api/devices/{device_id}/credential`
pub async fn rotate_credential(
    _auth: RequireOperatorKey,
    State(state): State<MonitorState>,
    Path(device_id): Path<String>,
) -> Result<Json<IssuedCredential>, MonitorError> {
    let api_key = state.registry.rotate_credential(&device_id).await?;
    let mut device = state
        .registry
        .get_device(&device_id)
        .await?
        .ok_or_else(|| MonitorError::not_found("device", &device_id))?;
    device.api_key = api_key.clone();
    info!(device_id = %device_id, "device credential rotated");
    Ok(Json(IssuedCredential { device, api_key }))
}
