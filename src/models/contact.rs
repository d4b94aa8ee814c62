use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::Identified;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    #[default]
    New,
    Contacted,
    Completed,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Contacted => "contacted",
            ContactStatus::Completed => "completed",
        }
    }
}

/// One contact-form submission as stored under `contactForms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default)]
    pub message: String,
    pub submitted_at: String,
    #[serde(default)]
    pub status: ContactStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Fields written by other clients, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContactSubmission {
    pub fn submitted_time(&self) -> Option<DateTime<Utc>> {
        super::parse_timestamp(&self.submitted_at)
    }
}

impl Identified for ContactSubmission {
    fn id(&self) -> i64 {
        self.id
    }
}

/// Fields posted by the public contact form.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub service: Option<String>,
    pub budget: Option<String>,
    pub message: String,
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".to_string());
        }
        if !super::is_plausible_email(&self.email) {
            return Err("A valid email address is required".to_string());
        }
        if self.message.trim().is_empty() {
            return Err("Message is required".to_string());
        }
        Ok(())
    }

    pub fn into_submission(self, id: i64, submitted_at: String) -> ContactSubmission {
        ContactSubmission {
            id,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            company: non_empty(self.company),
            service: non_empty(self.service),
            budget: non_empty(self.budget),
            message: self.message,
            submitted_at,
            status: ContactStatus::New,
            notes: None,
            updated_at: None,
            extra: Map::new(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
