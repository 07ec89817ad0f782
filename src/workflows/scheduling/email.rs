use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::dispatch::{Job, JobError, JobHandler};
use super::repository::EmailTransport;

/// Fields the core supplies to the mail composer. Formatting beyond plain
/// text (branding, HTML layout) belongs to the delivery side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationEmailFields {
    pub pharmacy_name: String,
    pub pharmacist_name: String,
    pub license_number: String,
    pub shift_date: NaiveDate,
    pub notes: String,
    pub action: EmailAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailAction {
    Applied,
    Withdrawn,
    Offered,
}

impl EmailAction {
    pub const fn subject(self) -> &'static str {
        match self {
            EmailAction::Applied => "New application received for your shift",
            EmailAction::Withdrawn => "Application withdrawn",
            EmailAction::Offered => "You have been offered a shift",
        }
    }
}

/// Composed message ready for a transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Render the notification body for an application event.
pub fn compose_application_email(fields: &ApplicationEmailFields) -> String {
    let date = fields.shift_date.format("%A, %B %-d, %Y");
    let notes = if fields.notes.is_empty() {
        "No additional notes provided."
    } else {
        fields.notes.as_str()
    };

    match fields.action {
        EmailAction::Applied => format!(
            "Dear {pharmacy},\n\n\
             Pharmacist {pharmacist} (license {license}) has applied for your shift \
             scheduled on {date}.\n\nNotes from the pharmacist: {notes}\n\n\
             -- Pharma Coverage System",
            pharmacy = fields.pharmacy_name,
            pharmacist = fields.pharmacist_name,
            license = fields.license_number,
        ),
        EmailAction::Withdrawn => format!(
            "Dear {pharmacy},\n\n\
             Pharmacist {pharmacist} (license {license}) has withdrawn their application \
             for your shift scheduled on {date}.\n\nNotes: {notes}\n\n\
             -- Pharma Coverage System",
            pharmacy = fields.pharmacy_name,
            pharmacist = fields.pharmacist_name,
            license = fields.license_number,
        ),
        EmailAction::Offered => format!(
            "Dear {pharmacist},\n\n\
             {pharmacy} has offered you their shift scheduled on {date}. Please confirm \
             or decline the offer from your dashboard.\n\n\
             -- Pharma Coverage System",
            pharmacist = fields.pharmacist_name,
            pharmacy = fields.pharmacy_name,
        ),
    }
}

/// Queue-side adapter handing `notification-email` jobs to a transport.
pub struct EmailRelay {
    transport: Arc<dyn EmailTransport>,
}

impl EmailRelay {
    pub fn new(transport: Arc<dyn EmailTransport>) -> Self {
        Self { transport }
    }
}

impl JobHandler for EmailRelay {
    fn handle(&self, job: &Job) -> Result<(), JobError> {
        match job {
            Job::NotificationEmail(message) => {
                self.transport.send(message)?;
                Ok(())
            }
            other => Err(JobError::Unroutable(other.kind().name())),
        }
    }
}
