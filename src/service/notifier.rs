use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::Registry;
use crate::db::models::Patient;
use crate::error::MonitorError;
use crate::service::mailer::Mailer;
use crate::types::alert::{AlertMessage, HealthSnapshot};

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Sends one alert to every caregiver linked to a patient.
///
/// Fan-out is best effort: a failed delivery is logged and counted, and the
/// remaining caregivers are still contacted. Flagging the reading is left to
/// the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    registry: Registry,
    mailer: Arc<dyn Mailer>,
    concurrency: usize,
}

impl NotificationDispatcher {
    pub fn new(registry: Registry, mailer: Arc<dyn Mailer>, concurrency: usize) -> Self {
        Self {
            registry,
            mailer,
            concurrency: concurrency.max(1),
        }
    }

    /// Errors only when the caregiver list cannot be read, in which case no
    /// delivery was attempted.
    pub async fn notify(
        &self,
        patient: &Patient,
        snapshot: &HealthSnapshot,
    ) -> Result<DispatchReport, MonitorError> {
        let caregivers = self.registry.caregivers_of(patient.id).await?;
        if caregivers.is_empty() {
            info!(patient_id = patient.id, "dangerous reading but no caregivers linked");
            return Ok(DispatchReport::default());
        }

        let messages: Vec<(i64, AlertMessage)> = caregivers
            .iter()
            .map(|c| {
                (
                    c.id,
                    AlertMessage::danger(&c.email, &c.name, &patient.name, &c.relationship, snapshot),
                )
            })
            .collect();

        let mailer = self.mailer.clone();
        let outcomes: Vec<bool> = stream::iter(messages)
            .map(|(caregiver_id, message)| {
                let mailer = mailer.clone();
                async move {
                    match mailer.deliver(&message).await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(
                                caregiver_id,
                                mailer = mailer.name(),
                                error = %e,
                                "alert delivery failed"
                            );
                            false
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let delivered = outcomes.iter().filter(|ok| **ok).count();
        let report = DispatchReport {
            attempted: outcomes.len(),
            delivered,
            failed: outcomes.len() - delivered,
        };
        info!(
            patient_id = patient.id,
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "caregiver alerts dispatched"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewCaregiver, NewPatient};
    use crate::db::sqlite::memory_pool;
    use crate::service::classifier::test_models::all_negative;
    use crate::service::features::derive;
    use crate::service::mailer::test_mailers::RecordingMailer;
    use crate::types::vitals::HeartRate;

    async fn patient_with(reg: &Registry, emails: &[&str]) -> Patient {
        let p = reg
            .create_patient(NewPatient {
                name: "Ada".into(),
                age: 64,
                gender: "F".into(),
                medical_history: None,
            })
            .await
            .unwrap();
        for (i, email) in emails.iter().enumerate() {
            let c = reg
                .create_caregiver(NewCaregiver {
                    name: format!("Carer {i}"),
                    email: email.to_string(),
                    phone: None,
                })
                .await
                .unwrap();
            reg.link_caregiver(p.id, c.id, "child").await.unwrap();
        }
        p
    }

    fn snapshot() -> HealthSnapshot {
        let f = derive(HeartRate::new(150).unwrap());
        HealthSnapshot::new(&f, &all_negative().classify(&f))
    }

    #[tokio::test]
    async fn one_attempt_per_caregiver() {
        let reg = Registry::new(memory_pool().await);
        let p = patient_with(&reg, &["a@example.com", "b@example.com", "c@example.com"]).await;
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = NotificationDispatcher::new(reg, mailer.clone(), 2);

        let report = dispatcher.notify(&p, &snapshot()).await.unwrap();
        assert_eq!(
            report,
            DispatchReport {
                attempted: 3,
                delivered: 3,
                failed: 0
            }
        );
        assert_eq!(mailer.sent_to(), vec!["a@example.com", "b@example.com", "c@example.com"]);
        let sent = mailer.sent.lock().unwrap();
        assert!(sent.iter().all(|m| m.body.contains("Your child, Ada,")));
    }

    #[tokio::test]
    async fn failing_caregiver_does_not_block_others() {
        let reg = Registry::new(memory_pool().await);
        let p = patient_with(&reg, &["broken@example.com", "ok@example.com"]).await;
        let mailer = Arc::new(RecordingMailer::failing_for(&["broken@example.com"]));
        let dispatcher = NotificationDispatcher::new(reg, mailer.clone(), 1);

        let report = dispatcher.notify(&p, &snapshot()).await.unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(mailer.sent_to(), vec!["ok@example.com"]);
    }

    #[tokio::test]
    async fn no_caregivers_means_no_attempts() {
        let reg = Registry::new(memory_pool().await);
        let p = patient_with(&reg, &[]).await;
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = NotificationDispatcher::new(reg, mailer.clone(), 4);

        let report = dispatcher.notify(&p, &snapshot()).await.unwrap();
        assert_eq!(report, DispatchReport::default());
        assert_eq!(mailer.attempt_count(), 0);
    }
}
