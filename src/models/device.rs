use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Outcome, Resource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

/// Device record. Every setter refreshes `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: Option<String>,
    pub data: Option<HashMap<String, String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processing_status: ProcessingStatus,
    pub idempotency_key: String,
}

impl Device {
    /// Builds a PENDING device. A missing idempotency key is replaced by a
    /// fresh UUID, so such requests never match an earlier one.
    pub fn new(
        id: Option<String>,
        name: Option<String>,
        data: Option<HashMap<String, String>>,
        idempotency_key: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.unwrap_or_default(),
            name,
            data,
            created_at: now,
            updated_at: now,
            processing_status: ProcessingStatus::Pending,
            idempotency_key: idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string()),
        }
    }

    pub fn set_name(&mut self, name: String) {
        self.name = Some(name);
        self.touch();
    }

    pub fn set_data(&mut self, data: HashMap<String, String>) {
        self.data = Some(data);
        self.touch();
    }

    pub fn set_status(&mut self, status: ProcessingStatus) {
        self.processing_status = status;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// `device-<unix millis>-<4 random digits>`
pub fn generate_device_id() -> String {
    format!(
        "device-{}-{}",
        Utc::now().timestamp_millis(),
        rand::thread_rng().gen_range(1000..9999)
    )
}

impl Resource for Device {
    const KIND: &'static str = "Device";

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn idempotency_key(&self) -> Option<&str> {
        Some(&self.idempotency_key)
    }

    fn mark_accepted(&mut self) {
        self.set_status(ProcessingStatus::Processing);
    }

    fn mark_processing(&mut self) {
        self.set_status(ProcessingStatus::Processing);
    }

    fn finish(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.set_status(ProcessingStatus::Completed),
            Outcome::Failed => self.set_status(ProcessingStatus::Failed),
        }
    }

    fn is_complete(&self) -> bool {
        self.processing_status.is_terminal()
    }
}

// ── Request payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct CreateDevice {
    pub id: Option<String>,
    pub name: Option<String>,
    pub data: Option<HashMap<String, String>>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateDevice {
    pub name: Option<String>,
    pub data: Option<HashMap<String, String>>,
}

/// Snapshot returned by `GET /devices/{id}/status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub id: String,
    pub status: ProcessingStatus,
    pub is_complete: bool,
    pub last_updated: DateTime<Utc>,
}

impl From<&Device> for DeviceStatus {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            status: device.processing_status,
            is_complete: device.is_complete(),
            last_updated: device.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_device_is_pending_with_generated_key() {
        let d = Device::new(None, Some("X".to_string()), None, None);
        assert_eq!(d.processing_status, ProcessingStatus::Pending);
        assert!(d.id.is_empty());
        assert!(Uuid::parse_str(&d.idempotency_key).is_ok());
    }

    #[test]
    fn caller_key_is_kept() {
        let d = Device::new(None, None, None, Some("k1".to_string()));
        assert_eq!(d.idempotency_key, "k1");
    }

    #[test]
    fn generated_id_format() {
        let id = generate_device_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "device");
        assert!(parts[1].parse::<i64>().is_ok());
        let suffix: u32 = parts[2].parse().unwrap();
        assert!((1000..9999).contains(&suffix));
    }

    #[test]
    fn status_change_refreshes_updated_at() {
        let mut d = Device::new(None, None, None, None);
        let before = d.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        d.finish(Outcome::Completed);
        assert!(d.updated_at > before);
        assert!(d.is_complete());
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(ProcessingStatus::Completed.is_terminal());
        assert!(ProcessingStatus::Failed.is_terminal());
        assert!(!ProcessingStatus::Pending.is_terminal());
        assert!(!ProcessingStatus::Processing.is_terminal());
        assert!(!ProcessingStatus::Cancelled.is_terminal());
    }

    #[test]
    fn wire_format_is_snake_case() {
        let mut d = Device::new(Some("d1".to_string()), Some("X".to_string()), None, None);
        d.mark_accepted();
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["processing_status"], "PROCESSING");
        assert!(v.get("created_at").is_some());
        assert!(v.get("idempotency_key").is_some());

        let status = serde_json::to_value(DeviceStatus::from(&d)).unwrap();
        assert_eq!(status["isComplete"], false);
        assert_eq!(status["status"], "PROCESSING");
        assert!(status.get("lastUpdated").is_some());
    }
}
