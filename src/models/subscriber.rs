use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::Identified;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    #[default]
    Active,
    Unsubscribed,
}

impl SubscriberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberStatus::Active => "active",
            SubscriberStatus::Unsubscribed => "unsubscribed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterSubscriber {
    pub id: i64,
    pub email: String,
    pub subscribed_at: String,
    #[serde(default)]
    pub status: SubscriberStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NewsletterSubscriber {
    pub fn subscribed_time(&self) -> Option<DateTime<Utc>> {
        super::parse_timestamp(&self.subscribed_at)
    }
}

impl Identified for NewsletterSubscriber {
    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsletterSignup {
    pub email: String,
}

impl NewsletterSignup {
    /// Lowercased, trimmed address, or an error if it is not an email.
    pub fn normalized_email(&self) -> Result<String, String> {
        let email = self.email.trim().to_lowercase();
        if super::is_plausible_email(&email) {
            Ok(email)
        } else {
            Err("A valid email address is required".to_string())
        }
    }
}
