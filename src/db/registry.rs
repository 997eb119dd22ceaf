use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{
    Caregiver, Device, DeviceRow, DeviceUpdate, LinkedCaregiver, NewCaregiver, NewDevice,
    NewPatient, Patient,
};
use crate::db::sqlite::SqlitePool;
use crate::error::MonitorError;

const DEVICE_COLUMNS: &str = "device_id, device_name, device_type, patient_id, api_key, status, last_seen, created_at";

/// Patients, caregivers, their links, and devices. The ingestion pipeline
/// only reads from here, apart from the device last-seen stamp.
#[derive(Clone)]
pub struct Registry {
    pool: SqlitePool,
}

fn unique_as_conflict(e: sqlx::Error, msg: &str) -> MonitorError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            MonitorError::Conflict(msg.to_string())
        }
        _ => e.into(),
    }
}

/// New opaque device credential: 32 lowercase hex chars.
pub fn generate_credential() -> String {
    Uuid::new_v4().simple().to_string()
}

fn generate_device_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("DEV-{}", hex[..8].to_uppercase())
}

impl Registry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_patient(&self, new: NewPatient) -> Result<Patient, MonitorError> {
        if new.name.trim().is_empty() {
            return Err(MonitorError::Validation("patient name is required".into()));
        }
        let created_at = Utc::now();
        let id = sqlx::query(
            "INSERT INTO patients (name, age, gender, medical_history, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&new.name)
        .bind(new.age)
        .bind(&new.gender)
        .bind(&new.medical_history)
        .bind(created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Patient {
            id,
            name: new.name,
            age: new.age,
            gender: new.gender,
            medical_history: new.medical_history,
            created_at,
        })
    }

    pub async fn get_patient(&self, id: i64) -> Result<Option<Patient>, MonitorError> {
        let patient = sqlx::query_as::<_, Patient>(
            "SELECT id, name, age, gender, medical_history, created_at FROM patients WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(patient)
    }

    pub async fn create_caregiver(&self, new: NewCaregiver) -> Result<Caregiver, MonitorError> {
        if new.email.trim().is_empty() || !new.email.contains('@') {
            return Err(MonitorError::Validation("a valid caregiver email is required".into()));
        }
        let created_at = Utc::now();
        let id = sqlx::query(
            "INSERT INTO caregivers (name, email, phone, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_as_conflict(e, "a caregiver with this email already exists"))?
        .last_insert_rowid();

        Ok(Caregiver {
            id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            created_at,
        })
    }

    pub async fn link_caregiver(
        &self,
        patient_id: i64,
        caregiver_id: i64,
        relationship: &str,
    ) -> Result<(), MonitorError> {
        if self.get_patient(patient_id).await?.is_none() {
            return Err(MonitorError::not_found("patient", patient_id));
        }
        let caregiver: Option<(i64,)> = sqlx::query_as("SELECT id FROM caregivers WHERE id = ?")
            .bind(caregiver_id)
            .fetch_optional(&self.pool)
            .await?;
        if caregiver.is_none() {
            return Err(MonitorError::not_found("caregiver", caregiver_id));
        }

        sqlx::query(
            "INSERT INTO patient_caregivers (patient_id, caregiver_id, relationship, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(patient_id)
        .bind(caregiver_id)
        .bind(relationship)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| unique_as_conflict(e, "this caregiver is already associated with this patient"))?;
        Ok(())
    }

    pub async fn unlink_caregiver(&self, patient_id: i64, caregiver_id: i64) -> Result<(), MonitorError> {
        sqlx::query("DELETE FROM patient_caregivers WHERE patient_id = ? AND caregiver_id = ?")
            .bind(patient_id)
            .bind(caregiver_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn caregivers_of(&self, patient_id: i64) -> Result<Vec<LinkedCaregiver>, MonitorError> {
        let rows = sqlx::query_as::<_, LinkedCaregiver>(
            r#"SELECT c.id, c.name, c.email, pc.relationship
               FROM caregivers c
               JOIN patient_caregivers pc ON c.id = pc.caregiver_id
               WHERE pc.patient_id = ?
               ORDER BY pc.id"#,
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn register_device(&self, new: NewDevice) -> Result<Device, MonitorError> {
        if let Some(pid) = new.patient_id
            && self.get_patient(pid).await?.is_none()
        {
            return Err(MonitorError::not_found("patient", pid));
        }
        let device = Device {
            device_id: generate_device_id(),
            device_name: new.device_name,
            device_type: new.device_type,
            patient_id: new.patient_id,
            api_key: generate_credential(),
            status: crate::db::models::DeviceStatus::Active,
            last_seen: None,
            created_at: Utc::now(),
        };
        sqlx::query(
            r#"INSERT INTO devices (device_id, device_name, device_type, patient_id, api_key, status, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&device.device_id)
        .bind(&device.device_name)
        .bind(&device.device_type)
        .bind(device.patient_id)
        .bind(&device.api_key)
        .bind(device.status.as_str())
        .bind(device.created_at)
        .execute(&self.pool)
        .await?;
        Ok(device)
    }

    pub async fn get_device(&self, device_id: &str) -> Result<Option<Device>, MonitorError> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE device_id = ?"
        ))
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Device::try_from).transpose()
    }

    pub async fn devices_of(&self, patient_id: i64) -> Result<Vec<Device>, MonitorError> {
        let rows = sqlx::query_as::<_, DeviceRow>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE patient_id = ? ORDER BY created_at DESC"
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Device::try_from).collect()
    }

    pub async fn update_device(
        &self,
        device_id: &str,
        update: DeviceUpdate,
    ) -> Result<Device, MonitorError> {
        let mut device = self
            .get_device(device_id)
            .await?
            .ok_or_else(|| MonitorError::not_found("device", device_id))?;

        if let Some(Some(pid)) = update.patient_id
            && self.get_patient(pid).await?.is_none()
        {
            return Err(MonitorError::not_found("patient", pid));
        }
        if let Some(status) = update.status {
            device.status = status;
        }
        if let Some(binding) = update.patient_id {
            device.patient_id = binding;
        }

        sqlx::query("UPDATE devices SET status = ?, patient_id = ? WHERE device_id = ?")
            .bind(device.status.as_str())
            .bind(device.patient_id)
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(device)
    }

    /// Replace the device credential; the old one stops working immediately.
    pub async fn rotate_credential(&self, device_id: &str) -> Result<String, MonitorError> {
        let api_key = generate_credential();
        let affected = sqlx::query("UPDATE devices SET api_key = ? WHERE device_id = ?")
            .bind(&api_key)
            .bind(device_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(MonitorError::not_found("device", device_id));
        }
        Ok(api_key)
    }

    /// Stamp last contact. Returns false when the device no longer exists.
    pub async fn touch_last_seen(
        &self,
        device_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, MonitorError> {
        let affected = sqlx::query("UPDATE devices SET last_seen = ? WHERE device_id = ?")
            .bind(at)
            .bind(device_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected == 1)
    }
}
