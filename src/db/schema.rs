//! SQL DDL for initializing the monitor database.
//! SQLite-first design; statements are split on `;` when executed, so the
//! DDL must not contain semicolons inside comments or literals.

/// SQLite schema with:
/// - `readings` keyed by AUTOINCREMENT id, referencing patient and device
/// - `patient_caregivers` UNIQUE on (patient_id, caregiver_id)
/// - `devices` keyed by the externally issued device id
/// - booleans stored as INTEGER 0/1, timestamps as RFC3339 TEXT
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    age INTEGER NOT NULL,
    gender TEXT NOT NULL,
    medical_history TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS caregivers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    phone TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS patient_caregivers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL REFERENCES patients (id),
    caregiver_id INTEGER NOT NULL REFERENCES caregivers (id),
    relationship TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (patient_id, caregiver_id)
);

CREATE TABLE IF NOT EXISTS devices (
    device_id TEXT PRIMARY KEY,
    device_name TEXT NOT NULL,
    device_type TEXT NOT NULL,
    patient_id INTEGER NULL REFERENCES patients (id),
    api_key TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
    last_seen TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    patient_id INTEGER NOT NULL REFERENCES patients (id),
    device_id TEXT NULL REFERENCES devices (device_id),
    heart_rate INTEGER NOT NULL,
    hrv INTEGER NOT NULL,
    spo2 INTEGER NOT NULL,
    systolic INTEGER NOT NULL,
    diastolic INTEGER NOT NULL,
    body_temp REAL NOT NULL,
    tachycardia_pred INTEGER NOT NULL,
    hypertrophy_pred INTEGER NOT NULL,
    cholesterol_pred INTEGER NOT NULL,
    tachycardia_prob REAL NULL,
    hypertrophy_prob REAL NULL,
    cholesterol_prob REAL NULL,
    dangerous INTEGER NOT NULL,
    alert_claimed INTEGER NOT NULL DEFAULT 0,
    notified INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_readings_patient ON readings (patient_id, id);
CREATE INDEX IF NOT EXISTS idx_readings_device ON readings (device_id, id);
CREATE INDEX IF NOT EXISTS idx_devices_patient ON devices (patient_id);
"#;
