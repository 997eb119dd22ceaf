use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MonitorError;

/// A heart rate already checked to be a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct HeartRate(u32);

impl HeartRate {
    pub fn new(bpm: i64) -> Result<Self, MonitorError> {
        if bpm <= 0 {
            return Err(MonitorError::Validation("Invalid heart rate".to_string()));
        }
        u32::try_from(bpm)
            .map(Self)
            .map_err(|_| MonitorError::Validation("Invalid heart rate".to_string()))
    }

    pub fn bpm(self) -> u32 {
        self.0
    }
}

/// Number of inputs every risk model receives.
pub const FEATURE_COUNT: usize = 6;

/// Physiological features derived from one heart-rate sample.
///
/// Field order matches [`FeatureVector::as_array`], which is the order the
/// risk models were fitted on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub heart_rate: u32,
    pub hrv: u32,
    pub spo2: u32,
    pub systolic: u32,
    pub diastolic: u32,
    pub body_temperature: f64,
}

impl FeatureVector {
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            f64::from(self.heart_rate),
            f64::from(self.hrv),
            f64::from(self.spo2),
            f64::from(self.systolic),
            f64::from(self.diastolic),
            self.body_temperature,
        ]
    }

    pub fn blood_pressure(&self) -> BloodPressure {
        BloodPressure {
            systolic: self.systolic,
            diastolic: self.diastolic,
        }
    }
}

/// Named feature, used by artifacts that reference a single input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    HeartRate,
    Hrv,
    Spo2,
    Systolic,
    Diastolic,
    BodyTemperature,
}

impl Feature {
    pub fn index(self) -> usize {
        match self {
            Feature::HeartRate => 0,
            Feature::Hrv => 1,
            Feature::Spo2 => 2,
            Feature::Systolic => 3,
            Feature::Diastolic => 4,
            Feature::BodyTemperature => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloodPressure {
    pub systolic: u32,
    pub diastolic: u32,
}

impl fmt::Display for BloodPressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.systolic, self.diastolic)
    }
}

impl Serialize for BloodPressure {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
