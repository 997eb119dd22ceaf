use chrono::Utc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::db::Registry;
use crate::db::models::{Device, DeviceStatus};
use crate::error::{AuthFailure, MonitorError};

/// A device that passed credential check, state checks, and binding.
#[derive(Debug, Clone)]
pub struct AdmittedDevice {
    pub device_id: String,
    pub patient_id: i64,
}

#[derive(Clone)]
pub struct DeviceAuthenticator {
    registry: Registry,
}

impl DeviceAuthenticator {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Verify the credential and stamp last contact on success.
    /// Unknown device and wrong credential both yield
    /// `MonitorError::Authentication` and leave no trace in storage.
    pub async fn authenticate(&self, device_id: &str, credential: &str) -> Result<Device, MonitorError> {
        let Some(device) = self.registry.get_device(device_id).await? else {
            warn!(device_id, reason = %AuthFailure::UnknownDevice, "device authentication rejected");
            return Err(MonitorError::Authentication(AuthFailure::UnknownDevice));
        };

        if !bool::from(device.api_key.as_bytes().ct_eq(credential.as_bytes())) {
            warn!(device_id, reason = %AuthFailure::CredentialMismatch, "device authentication rejected");
            return Err(MonitorError::Authentication(AuthFailure::CredentialMismatch));
        }

        if !self.registry.touch_last_seen(device_id, Utc::now()).await? {
            return Err(MonitorError::DeviceNotFound(device_id.to_string()));
        }
        debug!(device_id, "device authenticated");
        Ok(device)
    }

    /// Authenticate, then require the device to be active and bound.
    pub async fn admit(&self, device_id: &str, credential: &str) -> Result<AdmittedDevice, MonitorError> {
        let device = self.authenticate(device_id, credential).await?;
        if device.status != DeviceStatus::Active {
            return Err(MonitorError::DeviceInactive(device.device_id));
        }
        let Some(patient_id) = device.patient_id else {
            return Err(MonitorError::DeviceUnbound(device.device_id));
        };
        Ok(AdmittedDevice {
            device_id: device.device_id,
            patient_id,
        })
    }
}
