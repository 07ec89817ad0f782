use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for posted shifts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShiftId(pub String);

/// Identifier wrapper for shift applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for pharmacy accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PharmacyId(pub String);

/// Identifier wrapper for pharmacist accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PharmacistId(pub String);

impl PharmacyId {
    /// Push-channel key for events addressed to this pharmacy.
    pub fn channel_key(&self) -> String {
        format!("pharmacy_{}", self.0)
    }
}

impl PharmacistId {
    /// Push-channel key for events addressed to this pharmacist.
    pub fn channel_key(&self) -> String {
        format!("pharmacist_{}", self.0)
    }
}

/// Half-open time interval covered by a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Interval intersection test. Touching endpoints do not overlap, so a
    /// shift ending at 12:00 is compatible with one starting at 12:00.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }
}

/// Lifecycle of a posted shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Open,
    Filled,
    Cancelled,
}

impl ShiftStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ShiftStatus::Open => "open",
            ShiftStatus::Filled => "filled",
            ShiftStatus::Cancelled => "cancelled",
        }
    }
}

/// How an accepted application is finalized.
///
/// `RequiresConfirmation` shifts (Type A) hold the assignment as an offer until
/// the pharmacist confirms; `AutoConfirm` shifts (Type B) are locked in the
/// moment the pharmacy accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    RequiresConfirmation,
    AutoConfirm,
}

impl ConfirmationMode {
    pub const fn is_auto_confirm(self) -> bool {
        matches!(self, ConfirmationMode::AutoConfirm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Urgent,
}

/// A coverage shift posted by a pharmacy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub pharmacy_id: PharmacyId,
    pub date: NaiveDate,
    pub window: TimeWindow,
    pub hourly_rate: u32,
    pub status: ShiftStatus,
    pub confirmation: ConfirmationMode,
    pub urgency: Urgency,
    pub description: String,
    /// 0 means unlimited.
    pub max_applicants: u32,
    pub confirmed_pharmacist_id: Option<PharmacistId>,
    /// Derived index of application ids, maintained alongside the
    /// application store. The application records stay the source of truth.
    pub applications: Vec<ApplicationId>,
    /// Optimistic concurrency token, bumped by the store on every update.
    pub revision: u64,
}

impl Shift {
    pub fn is_open(&self) -> bool {
        self.status == ShiftStatus::Open
    }

    /// Mark the shift filled by the given pharmacist. Keeps the
    /// `Filled ⇔ confirmed_pharmacist_id` invariant in one place.
    pub fn fill(&mut self, pharmacist: PharmacistId) {
        self.status = ShiftStatus::Filled;
        self.confirmed_pharmacist_id = Some(pharmacist);
    }

    pub fn unlink_application(&mut self, id: &ApplicationId) {
        self.applications.retain(|existing| existing != id);
    }

    pub fn link_application(&mut self, id: ApplicationId) {
        if !self.applications.contains(&id) {
            self.applications.push(id);
        }
    }
}

/// Input for posting a new shift; identity and bookkeeping fields are
/// assigned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftDraft {
    pub date: NaiveDate,
    pub window: TimeWindow,
    pub hourly_rate: u32,
    pub confirmation: ConfirmationMode,
    #[serde(default = "default_urgency")]
    pub urgency: Urgency,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub max_applicants: u32,
}

fn default_urgency() -> Urgency {
    Urgency::Normal
}

/// Status of a pharmacist's application to a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Offered,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Offered => "offered",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    /// Active applications are the ones that count against the
    /// one-active-per-(shift, pharmacist) invariant.
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Applied | ApplicationStatus::Offered | ApplicationStatus::Accepted
        )
    }

    /// Terminal records are retained for audit and reused on re-apply.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }
}

/// A pharmacist's application to a single shift; the subject of the state
/// machine. Never hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub shift_id: ShiftId,
    pub pharmacist_id: PharmacistId,
    pub status: ApplicationStatus,
    pub notes: String,
    /// Optimistic concurrency token, bumped by the store on every update.
    pub revision: u64,
}

impl Application {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
