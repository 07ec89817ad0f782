use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{
    Application, ApplicationId, ConfirmationMode, PharmacistId, PharmacyId, Shift, ShiftId,
    ShiftStatus, Urgency,
};

/// Storage abstraction for shifts so the service module can be exercised in
/// isolation. Updates are compare-and-update: the store rejects writes whose
/// `revision` no longer matches the persisted record.
pub trait ShiftStore: Send + Sync {
    fn insert(&self, shift: Shift) -> Result<Shift, StoreError>;
    fn fetch(&self, id: &ShiftId) -> Result<Option<Shift>, StoreError>;
    fn update(&self, shift: Shift) -> Result<Shift, StoreError>;
    fn delete(&self, id: &ShiftId) -> Result<Option<Shift>, StoreError>;
    fn search(&self, query: &ShiftQuery) -> Result<Vec<Shift>, StoreError>;
}

/// Storage abstraction for applications. Terminal records are retained, so
/// `find_for_pair` can surface a reusable withdrawn/rejected record.
pub trait ApplicationStore: Send + Sync {
    fn insert(&self, application: Application) -> Result<Application, StoreError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError>;
    fn update(&self, application: Application) -> Result<Application, StoreError>;
    fn find_for_pair(
        &self,
        shift_id: &ShiftId,
        pharmacist_id: &PharmacistId,
    ) -> Result<Vec<Application>, StoreError>;
    fn find_for_shift(&self, shift_id: &ShiftId) -> Result<Vec<Application>, StoreError>;
    fn find_active_for_pharmacist(
        &self,
        pharmacist_id: &PharmacistId,
    ) -> Result<Vec<Application>, StoreError>;
}

/// Equality/range filters supported by the shift search surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShiftQuery {
    pub pharmacy_id: Option<PharmacyId>,
    pub date: Option<NaiveDate>,
    pub status: Option<ShiftStatus>,
    pub urgency: Option<Urgency>,
    pub confirmation: Option<ConfirmationMode>,
    /// Keep shifts starting at or after this instant.
    pub starts_after: Option<DateTime<Utc>>,
    /// Keep shifts ending at or before this instant.
    pub ends_before: Option<DateTime<Utc>>,
}

impl ShiftQuery {
    pub fn matches(&self, shift: &Shift) -> bool {
        if let Some(pharmacy_id) = &self.pharmacy_id {
            if &shift.pharmacy_id != pharmacy_id {
                return false;
            }
        }
        if let Some(date) = self.date {
            if shift.date != date {
                return false;
            }
        }
        if let Some(status) = self.status {
            if shift.status != status {
                return false;
            }
        }
        if let Some(urgency) = self.urgency {
            if shift.urgency != urgency {
                return false;
            }
        }
        if let Some(confirmation) = self.confirmation {
            if shift.confirmation != confirmation {
                return false;
            }
        }
        if let Some(starts_after) = self.starts_after {
            if shift.window.start < starts_after {
                return false;
            }
        }
        if let Some(ends_before) = self.ends_before {
            if shift.window.end > ends_before {
                return false;
            }
        }
        true
    }
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Duplicate,
    #[error("record not found")]
    NotFound,
    #[error("stale revision: record was modified concurrently")]
    StaleRevision,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Push channel the state machine and reconciler report events to.
/// Fire-and-forget: callers log failures and move on.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, channel: &str, event: &str, payload: Value) -> Result<(), NotifyError>;
}

/// Notification transport error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("push channel unavailable: {0}")]
    Transport(String),
}

/// Outbound mail hand-off; composition happens in [`super::email`], delivery
/// is consumed off the job queue by an adapter implementing this trait.
pub trait EmailTransport: Send + Sync {
    fn send(&self, message: &super::email::EmailMessage) -> Result<(), NotifyError>;
}

/// Contact details needed to address notifications and e-mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PharmacyContact {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PharmacistContact {
    pub name: String,
    pub email: String,
    pub license_number: String,
}

/// Read-only directory of account contacts. Registration, credentials, and
/// sessions live outside this crate.
pub trait ContactDirectory: Send + Sync {
    fn pharmacy(&self, id: &PharmacyId) -> Result<Option<PharmacyContact>, StoreError>;
    fn pharmacist(&self, id: &PharmacistId) -> Result<Option<PharmacistContact>, StoreError>;
}
