//! Per-reading orchestration: featurize, classify, judge, persist, alert.
//!
//! The pipeline holds no per-reading state; each call is independent and the
//! reading store is the only shared mutable resource.

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::db::models::{NewReading, Patient, Reading};
use crate::db::{ReadingStore, Registry};
use crate::error::MonitorError;
use crate::service::classifier::{Classification, ClassifierRegistry};
use crate::service::danger::{DangerPolicy, DangerTrigger};
use crate::service::device_auth::DeviceAuthenticator;
use crate::service::features;
use crate::service::notifier::{DispatchReport, NotificationDispatcher};
use crate::types::alert::{HealthSnapshot, round1};
use crate::types::vitals::{BloodPressure, FeatureVector, HeartRate};

fn flag_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_millis(500))
        .with_max_times(3)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedFeatures {
    pub heart_rate: u32,
    pub hrv: u32,
    pub spo2: u32,
    pub blood_pressure: BloodPressure,
    pub body_temperature: f64,
}

impl From<&FeatureVector> for DerivedFeatures {
    fn from(f: &FeatureVector) -> Self {
        Self {
            heart_rate: f.heart_rate,
            hrv: f.hrv,
            spo2: f.spo2,
            blood_pressure: f.blood_pressure(),
            body_temperature: round1(f.body_temperature),
        }
    }
}

/// What happened to the caregiver alert for a reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AlertOutcome {
    /// Reading was not dangerous.
    NotRequired,
    /// Fan-out ran; `flagged` tells whether the reading is now marked.
    Dispatched {
        report: DispatchReport,
        flagged: bool,
    },
    /// Another call already owns or finished alerting for this reading;
    /// nothing was sent.
    AlreadyNotified,
    /// Caregivers could not be loaded; nothing was sent and the reading
    /// stays unflagged so it can be retried.
    Failed,
}

/// Result of ingesting one reading.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub reading_id: i64,
    pub timestamp: DateTime<Utc>,
    pub patient_id: i64,
    pub device_id: Option<String>,
    pub features: DerivedFeatures,
    pub classification: Classification,
    pub dangerous: bool,
    pub triggers: Vec<DangerTrigger>,
    pub alert: AlertOutcome,
}

#[derive(Clone)]
pub struct IngestionPipeline {
    classifiers: ClassifierRegistry,
    policy: DangerPolicy,
    readings: ReadingStore,
    registry: Registry,
    authenticator: DeviceAuthenticator,
    dispatcher: NotificationDispatcher,
}

impl IngestionPipeline {
    pub fn new(
        classifiers: ClassifierRegistry,
        policy: DangerPolicy,
        readings: ReadingStore,
        registry: Registry,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            classifiers,
            policy,
            readings,
            authenticator: DeviceAuthenticator::new(registry.clone()),
            registry,
            dispatcher,
        }
    }

    /// Operator path: patient chosen explicitly, no device credential.
    pub async fn ingest_operator(
        &self,
        patient_id: i64,
        heart_rate: i64,
    ) -> Result<IngestOutcome, MonitorError> {
        let heart_rate = HeartRate::new(heart_rate)?;
        if patient_id <= 0 {
            return Err(MonitorError::Validation("Invalid patient ID".to_string()));
        }
        self.process(patient_id, heart_rate, None).await
    }

    /// Device path: credential, activation and binding are checked before
    /// anything is derived; the reading is attributed to the device at insert.
    pub async fn ingest_device(
        &self,
        device_id: &str,
        credential: &str,
        heart_rate: i64,
    ) -> Result<IngestOutcome, MonitorError> {
        let heart_rate = HeartRate::new(heart_rate)?;
        let device = self.authenticator.admit(device_id, credential).await?;
        self.process(device.patient_id, heart_rate, Some(device.device_id))
            .await
    }

    async fn process(
        &self,
        patient_id: i64,
        heart_rate: HeartRate,
        device_id: Option<String>,
    ) -> Result<IngestOutcome, MonitorError> {
        let features = features::derive(heart_rate);
        let classification = self.classifiers.classify(&features);
        let triggers = self.policy.triggers(&classification, &features);
        let dangerous = !triggers.is_empty();

        let new = NewReading {
            timestamp: Utc::now(),
            patient_id,
            device_id,
            features,
            classification,
            dangerous,
        };
        let reading_id = self.readings.save(&new).await?;

        let alert = if dangerous {
            info!(reading_id, patient_id, ?triggers, "dangerous reading detected");
            self.alert_caregivers(reading_id, patient_id, &features, &classification)
                .await
        } else {
            AlertOutcome::NotRequired
        };

        Ok(IngestOutcome {
            reading_id,
            timestamp: new.timestamp,
            patient_id,
            device_id: new.device_id,
            features: DerivedFeatures::from(&features),
            classification,
            dangerous,
            triggers,
            alert,
        })
    }

    /// Claim, dispatch, then flag. Runs to completion once the reading is stored;
    /// failures here never undo the persisted reading.
    async fn alert_caregivers(
        &self,
        reading_id: i64,
        patient_id: i64,
        features: &FeatureVector,
        classification: &Classification,
    ) -> AlertOutcome {
        let patient = match self.registry.get_patient(patient_id).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                error!(reading_id, patient_id, "patient vanished before alerting");
                return AlertOutcome::Failed;
            }
            Err(e) => {
                error!(reading_id, patient_id, error = %e, "failed to load patient for alerting");
                return AlertOutcome::Failed;
            }
        };
        let snapshot = HealthSnapshot::new(features, classification);
        self.dispatch_and_flag(reading_id, &patient, &snapshot).await
    }

    async fn dispatch_and_flag(
        &self,
        reading_id: i64,
        patient: &Patient,
        snapshot: &HealthSnapshot,
    ) -> AlertOutcome {
        match self.readings.claim_alert(reading_id).await {
            Ok(true) => {}
            Ok(false) => {
                info!(reading_id, "alert already claimed by another call; skipping");
                return AlertOutcome::AlreadyNotified;
            }
            Err(e) => {
                error!(reading_id, error = %e, "failed to claim reading for alerting");
                return AlertOutcome::Failed;
            }
        }

        let report = match self.dispatcher.notify(patient, snapshot).await {
            Ok(report) => report,
            Err(e) => {
                error!(reading_id, error = %e, "caregiver lookup failed; alert not sent");
                if let Err(e) = self.readings.release_alert(reading_id).await {
                    error!(reading_id, error = %e, "failed to release alert claim");
                }
                return AlertOutcome::Failed;
            }
        };

        let flagged = (|| async { self.readings.mark_notified(reading_id).await })
            .retry(flag_retry_policy())
            .notify(|err, dur: Duration| {
                warn!(reading_id, "marking reading notified failed: {}, retrying in {:?}", err, dur);
            })
            .await;
        let flagged = match flagged {
            Ok(transitioned) => transitioned,
            Err(e) => {
                error!(reading_id, error = %e, "alert sent but reading could not be flagged");
                false
            }
        };
        AlertOutcome::Dispatched { report, flagged }
    }

    /// Re-run alerting for a stored reading that was dangerous but never
    /// flagged. Alerting goes through the same claim as ingestion, so
    /// overlapping calls never alert twice.
    pub async fn retry_notification(&self, reading_id: i64) -> Result<AlertOutcome, MonitorError> {
        let reading = self
            .readings
            .get(reading_id)
            .await?
            .ok_or_else(|| MonitorError::not_found("reading", reading_id))?;
        if !reading.dangerous {
            return Ok(AlertOutcome::NotRequired);
        }
        if reading.notified {
            return Ok(AlertOutcome::AlreadyNotified);
        }
        let patient = self
            .registry
            .get_patient(reading.patient_id)
            .await?
            .ok_or_else(|| MonitorError::not_found("patient", reading.patient_id))?;
        let snapshot = snapshot_of(&reading);
        Ok(self.dispatch_and_flag(reading_id, &patient, &snapshot).await)
    }
}

fn snapshot_of(reading: &Reading) -> HealthSnapshot {
    HealthSnapshot {
        heart_rate: reading.heart_rate,
        blood_pressure: reading.blood_pressure(),
        spo2: reading.spo2,
        body_temperature: round1(reading.body_temp),
        tachycardia: reading.tachycardia_pred,
        hypertrophy: reading.hypertrophy_pred,
        high_cholesterol: reading.cholesterol_pred,
    }
}
