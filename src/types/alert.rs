use serde::Serialize;

use crate::service::classifier::Classification;
use crate::types::vitals::{BloodPressure, FeatureVector};

/// Vitals and model verdicts carried by every caregiver alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub heart_rate: u32,
    pub blood_pressure: BloodPressure,
    pub spo2: u32,
    /// Rounded to one decimal place.
    pub body_temperature: f64,
    pub tachycardia: bool,
    pub hypertrophy: bool,
    pub high_cholesterol: bool,
}

impl HealthSnapshot {
    pub fn new(features: &FeatureVector, verdicts: &Classification) -> Self {
        Self {
            heart_rate: features.heart_rate,
            blood_pressure: features.blood_pressure(),
            spo2: features.spo2,
            body_temperature: round1(features.body_temperature),
            tachycardia: verdicts.tachycardia.verdict,
            hypertrophy: verdicts.hypertrophy.verdict,
            high_cholesterol: verdicts.high_cholesterol.verdict,
        }
    }
}

/// Round to one decimal using the exact binary value, so 36.65 (stored as
/// 36.6499...) becomes 36.6 rather than the 36.7 that `(v * 10).round()` gives.
pub fn round1(v: f64) -> f64 {
    format!("{v:.1}").parse().unwrap_or(v)
}

/// One outbound message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

impl AlertMessage {
    pub fn danger(
        recipient: &str,
        caregiver_name: &str,
        patient_name: &str,
        relationship: &str,
        snapshot: &HealthSnapshot,
    ) -> Self {
        let body = format!(
            "Dear {caregiver_name},\n\
             \n\
             This is an automated alert from the Heart Monitoring System.\n\
             \n\
             Your {relationship}, {patient_name}, has shown concerning health readings that may require attention:\n\
             \n\
             - Heart Rate: {hr} BPM\n\
             - Blood Pressure: {bp} mmHg\n\
             - SpO2: {spo2}%\n\
             - Body Temperature: {temp:.1}°C\n\
             \n\
             Detected Conditions:\n\
             - Tachycardia: {tachy}\n\
             - Cardiac Hypertrophy: {hyper}\n\
             - High Cholesterol Risk: {chol}\n\
             \n\
             Please check on the patient or contact their healthcare provider if needed.\n\
             \n\
             This is an automated message. Please do not reply.\n\
             \n\
             Heart Monitoring System\n",
            hr = snapshot.heart_rate,
            bp = snapshot.blood_pressure,
            spo2 = snapshot.spo2,
            temp = snapshot.body_temperature,
            tachy = yes_no(snapshot.tachycardia),
            hyper = yes_no(snapshot.hypertrophy),
            chol = yes_no(snapshot.high_cholesterol),
        );
        Self {
            recipient: recipient.to_string(),
            subject: format!("URGENT: Health Alert for {patient_name}"),
            body,
        }
    }
}
