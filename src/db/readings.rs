use crate::db::models::{NewReading, Reading};
use crate::db::sqlite::SqlitePool;
use crate::error::MonitorError;

/// Upper bound for history queries.
pub const MAX_HISTORY: u32 = 500;

const READING_SELECT: &str = r#"
    SELECT r.id, r.timestamp, r.patient_id, p.name AS patient_name, r.device_id,
           r.heart_rate, r.hrv, r.spo2, r.systolic, r.diastolic, r.body_temp,
           r.tachycardia_pred, r.hypertrophy_pred, r.cholesterol_pred,
           r.tachycardia_prob, r.hypertrophy_prob, r.cholesterol_prob,
           r.dangerous, r.notified
    FROM readings r
    JOIN patients p ON r.patient_id = p.id
"#;

/// Sole owner of reading rows. Rows are append-only apart from the
/// one-way `notified` flag.
#[derive(Clone)]
pub struct ReadingStore {
    pool: SqlitePool,
}

fn check_limit(limit: u32) -> Result<u32, MonitorError> {
    if limit == 0 {
        return Err(MonitorError::Validation("limit must be positive".into()));
    }
    Ok(limit.min(MAX_HISTORY))
}

impl ReadingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert one reading, device attribution included. Fails with a
    /// database error when the patient or device reference is dangling.
    pub async fn save(&self, reading: &NewReading) -> Result<i64, MonitorError> {
        let f = &reading.features;
        let c = &reading.classification;
        let id = sqlx::query(
            r#"
            INSERT INTO readings (
                timestamp, patient_id, device_id,
                heart_rate, hrv, spo2, systolic, diastolic, body_temp,
                tachycardia_pred, hypertrophy_pred, cholesterol_pred,
                tachycardia_prob, hypertrophy_prob, cholesterol_prob,
                dangerous, notified
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(reading.timestamp)
        .bind(reading.patient_id)
        .bind(&reading.device_id)
        .bind(f.heart_rate)
        .bind(f.hrv)
        .bind(f.spo2)
        .bind(f.systolic)
        .bind(f.diastolic)
        .bind(f.body_temperature)
        .bind(c.tachycardia.verdict)
        .bind(c.hypertrophy.verdict)
        .bind(c.high_cholesterol.verdict)
        .bind(c.tachycardia.probability)
        .bind(c.hypertrophy.probability)
        .bind(c.high_cholesterol.probability)
        .bind(reading.dangerous)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Flip `notified` for a dangerous reading. Returns true only for the
    /// call that performed the transition; repeated calls are no-ops.
    pub async fn mark_notified(&self, reading_id: i64) -> Result<bool, MonitorError> {
        let affected = sqlx::query(
            "UPDATE readings SET notified = 1 WHERE id = ? AND dangerous = 1 AND notified = 0",
        )
        .bind(reading_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected == 1)
    }

    /// Take exclusive ownership of alerting for a dangerous reading.
    /// Only the caller that gets `true` may dispatch; every later or
    /// concurrent claim on the same reading gets `false`.
    pub async fn claim_alert(&self, reading_id: i64) -> Result<bool, MonitorError> {
        let affected = sqlx::query(
            "UPDATE readings SET alert_claimed = 1 WHERE id = ? AND dangerous = 1 AND alert_claimed = 0",
        )
        .bind(reading_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected == 1)
    }

    /// Give a claim back when nothing was sent, so alerting can be retried.
    /// A reading that is already flagged keeps its claim.
    pub async fn release_alert(&self, reading_id: i64) -> Result<(), MonitorError> {
        sqlx::query("UPDATE readings SET alert_claimed = 0 WHERE id = ? AND notified = 0")
            .bind(reading_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(&self, reading_id: i64) -> Result<Option<Reading>, MonitorError> {
        let reading = sqlx::query_as::<_, Reading>(&format!("{READING_SELECT} WHERE r.id = ?"))
            .bind(reading_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reading)
    }

    /// Most-recent-first, optionally for one patient.
    pub async fn recent(
        &self,
        patient_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Reading>, MonitorError> {
        let limit = check_limit(limit)?;
        let rows = match patient_id {
            Some(pid) => {
                sqlx::query_as::<_, Reading>(&format!(
                    "{READING_SELECT} WHERE r.patient_id = ? ORDER BY r.id DESC LIMIT ?"
                ))
                .bind(pid)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Reading>(&format!("{READING_SELECT} ORDER BY r.id DESC LIMIT ?"))
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    pub async fn by_device(&self, device_id: &str, limit: u32) -> Result<Vec<Reading>, MonitorError> {
        let limit = check_limit(limit)?;
        let rows = sqlx::query_as::<_, Reading>(&format!(
            "{READING_SELECT} WHERE r.device_id = ? ORDER BY r.id DESC LIMIT ?"
        ))
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Newest reading attributed to a device, if any.
    pub async fn latest_by_device(&self, device_id: &str) -> Result<Option<Reading>, MonitorError> {
        Ok(self.by_device(device_id, 1).await?.into_iter().next())
    }
}
