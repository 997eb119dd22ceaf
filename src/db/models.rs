use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::error::MonitorError;
use crate::service::classifier::Classification;
use crate::types::vitals::{BloodPressure, FeatureVector};

/// Stored reading joined with its patient's display name.
#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct Reading {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub patient_id: i64,
    pub patient_name: String,
    pub device_id: Option<String>,
    pub heart_rate: u32,
    pub hrv: u32,
    pub spo2: u32,
    pub systolic: u32,
    pub diastolic: u32,
    pub body_temp: f64,
    pub tachycardia_pred: bool,
    pub hypertrophy_pred: bool,
    pub cholesterol_pred: bool,
    pub tachycardia_prob: Option<f64>,
    pub hypertrophy_prob: Option<f64>,
    pub cholesterol_prob: Option<f64>,
    pub dangerous: bool,
    pub notified: bool,
}

impl Reading {
    pub fn features(&self) -> FeatureVector {
        FeatureVector {
            heart_rate: self.heart_rate,
            hrv: self.hrv,
            spo2: self.spo2,
            systolic: self.systolic,
            diastolic: self.diastolic,
            body_temperature: self.body_temp,
        }
    }

    pub fn blood_pressure(&self) -> BloodPressure {
        self.features().blood_pressure()
    }
}

/// Everything needed to insert a reading in one statement.
#[derive(Debug, Clone)]
pub struct NewReading {
    pub timestamp: DateTime<Utc>,
    pub patient_id: i64,
    pub device_id: Option<String>,
    pub features: FeatureVector,
    pub classification: Classification,
    pub dangerous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub medical_history: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub age: i64,
    pub gender: String,
    #[serde(default)]
    pub medical_history: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Caregiver {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCaregiver {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Caregiver as seen through a patient link.
#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct LinkedCaregiver {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub relationship: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Inactive,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for DeviceStatus {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(DeviceStatus::Active),
            "inactive" => Ok(DeviceStatus::Inactive),
            other => Err(MonitorError::Validation(format!("unknown device status `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct DeviceRow {
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    pub patient_id: Option<i64>,
    pub api_key: String,
    pub status: String,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A registered monitoring device. The credential is never serialized.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Device {
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    pub patient_id: Option<i64>,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub status: DeviceStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DeviceRow> for Device {
    type Error = MonitorError;

    fn try_from(r: DeviceRow) -> Result<Self, Self::Error> {
        Ok(Device {
            device_id: r.device_id,
            device_name: r.device_name,
            device_type: r.device_type,
            patient_id: r.patient_id,
            api_key: r.api_key,
            status: r.status.parse()?,
            last_seen: r.last_seen,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDevice {
    pub device_name: String,
    pub device_type: String,
    #[serde(default)]
    pub patient_id: Option<i64>,
}

/// Partial device update. `patient_id: Some(None)` unbinds the device.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceUpdate {
    #[serde(default)]
    pub status: Option<DeviceStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub patient_id: Option<Option<i64>>,
}

fn double_option<'de, D>(de: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i64>::deserialize(de).map(Some)
}
