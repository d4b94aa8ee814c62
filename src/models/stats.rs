use serde::Serialize;

use super::contact::ContactSubmission;
use super::subscriber::NewsletterSubscriber;

/// Submissions and subscribers that arrived inside the trailing growth window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MonthlyGrowth {
    pub forms: usize,
    pub subscribers: usize,
}

/// Dashboard summary, recomputed from the stored collections on every load
/// and mutation. Never persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_forms: usize,
    pub new_forms: usize,
    pub total_subscribers: usize,
    pub active_subscribers: usize,
    pub total_posts: usize,
    pub published_posts: usize,
    pub recent_forms: Vec<ContactSubmission>,
    pub recent_subscribers: Vec<NewsletterSubscriber>,
    pub monthly_growth: MonthlyGrowth,
}
