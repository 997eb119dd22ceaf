//! Heart-rate interpolation model producing the full feature vector.

use crate::types::vitals::{FeatureVector, HeartRate};

/// Derive the physiological feature vector for one sample.
pub fn derive(heart_rate: HeartRate) -> FeatureVector {
    let hr = heart_rate.bpm();
    FeatureVector {
        heart_rate: hr,
        hrv: 100u32.saturating_sub(hr).max(20),
        spo2: if hr < 100 { 98 } else { 95 },
        systolic: 110 + hr / 10,
        diastolic: 70 + hr / 20,
        body_temperature: 36.6 + (f64::from(hr) - 70.0) * 0.01,
    }
}
