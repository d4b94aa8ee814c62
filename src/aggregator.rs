use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::de::DeserializeOwned;

use crate::models::contact::{ContactStatus, ContactSubmission};
use crate::models::post::BlogPost;
use crate::models::stats::{DashboardStats, MonthlyGrowth};
use crate::models::subscriber::{NewsletterSubscriber, SubscriberStatus};
use crate::seed;
use crate::store::{
    KvStore, WriteOutcome, BLOG_POSTS_KEY, CONTACT_FORMS_KEY, SUBSCRIBERS_KEY,
};

/// A typed collection plus the store revision it was read at (0 = key absent).
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    pub items: Vec<T>,
    pub revision: u64,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Collection {
            items: Vec::new(),
            revision: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub forms: Collection<ContactSubmission>,
    pub subscribers: Collection<NewsletterSubscriber>,
    pub posts: Collection<BlogPost>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsOptions {
    pub recent_limit: usize,
    pub growth_window: Duration,
}

impl Default for StatsOptions {
    fn default() -> Self {
        StatsOptions {
            recent_limit: 5,
            growth_window: Duration::days(30),
        }
    }
}

// ── Loading ─────────────────────────────────────────────────────────

/// Write the built-in blog posts if `blogPosts` is absent.
/// Returns whether this call seeded. Safe to call repeatedly and from
/// several instances at once: only the first writer wins.
pub fn ensure_initialized(store: &dyn KvStore) -> Result<bool, String> {
    if store.revision(BLOG_POSTS_KEY)? != 0 {
        return Ok(false);
    }
    let text = serde_json::to_string(&seed::blog_posts()).map_err(|e| e.to_string())?;
    match store.compare_and_set(BLOG_POSTS_KEY, &text, 0)? {
        WriteOutcome::Written(revision) => {
            info!(
                "[store] Seeded {} with built-in posts (revision {})",
                BLOG_POSTS_KEY, revision
            );
            Ok(true)
        }
        WriteOutcome::Conflict { .. } => Ok(false),
    }
}

/// Read and parse one key. Absent → empty collection at revision 0.
/// Malformed text is an error naming the key.
pub fn read_collection<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Collection<T>, String> {
    match store.entry(key)? {
        Some(entry) => {
            let items: Vec<T> =
                serde_json::from_str(&entry.value).map_err(|e| format!("{}: {}", key, e))?;
            Ok(Collection {
                items,
                revision: entry.revision,
            })
        }
        None => Ok(Collection::default()),
    }
}

/// Read all three collections. Pure read: does not seed.
pub fn load(store: &dyn KvStore) -> Result<Snapshot, String> {
    Ok(Snapshot {
        forms: read_collection(store, CONTACT_FORMS_KEY)?,
        subscribers: read_collection(store, SUBSCRIBERS_KEY)?,
        posts: read_collection(store, BLOG_POSTS_KEY)?,
    })
}

// ── Statistics ──────────────────────────────────────────────────────

/// First `limit` items ordered by timestamp, newest first. Items whose
/// timestamp does not parse sort last; equal timestamps keep stored order.
pub fn most_recent<T, F>(items: &[T], limit: usize, at: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> Option<DateTime<Utc>>,
{
    let mut keyed: Vec<(Option<DateTime<Utc>>, &T)> = items.iter().map(|i| (at(i), i)).collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
    keyed.into_iter().take(limit).map(|(_, i)| i.clone()).collect()
}

pub fn count_since<T, F>(items: &[T], cutoff: DateTime<Utc>, at: F) -> usize
where
    F: Fn(&T) -> Option<DateTime<Utc>>,
{
    items
        .iter()
        .filter(|i| at(i).is_some_and(|t| t >= cutoff))
        .count()
}

pub fn compute_stats(snapshot: &Snapshot, now: DateTime<Utc>, opts: &StatsOptions) -> DashboardStats {
    let forms = &snapshot.forms.items;
    let subscribers = &snapshot.subscribers.items;
    let posts = &snapshot.posts.items;
    // A window reaching past the representable range covers everything.
    let cutoff = now
        .checked_sub_signed(opts.growth_window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    DashboardStats {
        total_forms: forms.len(),
        new_forms: forms
            .iter()
            .filter(|f| f.status == ContactStatus::New)
            .count(),
        total_subscribers: subscribers.len(),
        active_subscribers: subscribers
            .iter()
            .filter(|s| s.status == SubscriberStatus::Active)
            .count(),
        total_posts: posts.len(),
        published_posts: posts.iter().filter(|p| p.is_published()).count(),
        recent_forms: most_recent(forms, opts.recent_limit, ContactSubmission::submitted_time),
        recent_subscribers: most_recent(
            subscribers,
            opts.recent_limit,
            NewsletterSubscriber::subscribed_time,
        ),
        monthly_growth: MonthlyGrowth {
            forms: count_since(forms, cutoff, ContactSubmission::submitted_time),
            subscribers: count_since(subscribers, cutoff, NewsletterSubscriber::subscribed_time),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format_timestamp;
    use crate::store::memory::MemoryStore;
    use chrono::TimeZone;

    fn form(id: i64, status: &str, submitted_at: &str) -> String {
        format!(
            r#"{{"id":{},"name":"N{}","email":"n{}@example.com","message":"hi","status":"{}","submittedAt":"{}"}}"#,
            id, id, id, status, submitted_at
        )
    }

    fn store_with_forms(forms: &[String]) -> MemoryStore {
        let s = MemoryStore::new();
        s.set(CONTACT_FORMS_KEY, &format!("[{}]", forms.join(",")))
            .unwrap();
        s
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn scenario_two_forms() {
        let s = store_with_forms(&[
            form(1, "new", "2024-01-01T00:00:00Z"),
            form(2, "contacted", "2024-01-10T00:00:00Z"),
        ]);
        let snap = load(&s).unwrap();
        let stats = compute_stats(&snap, at(2024, 1, 20), &StatsOptions::default());
        assert_eq!(stats.total_forms, 2);
        assert_eq!(stats.new_forms, 1);
        let ids: Vec<i64> = stats.recent_forms.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn absent_keys_load_empty_without_writing() {
        let s = MemoryStore::new();
        let snap = load(&s).unwrap();
        assert!(snap.forms.items.is_empty());
        assert!(snap.subscribers.items.is_empty());
        assert!(snap.posts.items.is_empty());
        assert_eq!(snap.forms.revision, 0);
        for key in crate::store::WATCHED_KEYS {
            assert_eq!(s.revision(key).unwrap(), 0);
        }
    }

    #[test]
    fn malformed_entry_fails_whole_load() {
        let s = MemoryStore::new();
        s.set(SUBSCRIBERS_KEY, "{not json").unwrap();
        let err = load(&s).unwrap_err();
        assert!(err.starts_with(SUBSCRIBERS_KEY), "{}", err);
    }

    #[test]
    fn recent_forms_capped_and_sorted() {
        let forms: Vec<String> = (1..=8)
            .map(|i| form(i, "new", &format_timestamp(at(2024, 1, (i * 3) as u32))))
            .collect();
        let s = store_with_forms(&forms);
        let stats = compute_stats(&load(&s).unwrap(), at(2024, 2, 1), &StatsOptions::default());
        assert_eq!(stats.recent_forms.len(), 5);
        let times: Vec<_> = stats
            .recent_forms
            .iter()
            .map(|f| f.submitted_time().unwrap())
            .collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(stats.recent_forms[0].id, 8);
    }

    #[test]
    fn fewer_than_limit_returns_all() {
        let s = store_with_forms(&[form(1, "new", "2024-01-01T00:00:00Z")]);
        let stats = compute_stats(&load(&s).unwrap(), at(2024, 2, 1), &StatsOptions::default());
        assert_eq!(stats.recent_forms.len(), 1);
    }

    #[test]
    fn unparseable_timestamps_sort_last_and_skip_growth() {
        let s = store_with_forms(&[
            form(1, "new", "garbage"),
            form(2, "new", "2024-01-10T00:00:00Z"),
        ]);
        let stats = compute_stats(&load(&s).unwrap(), at(2024, 1, 20), &StatsOptions::default());
        assert_eq!(stats.recent_forms[0].id, 2);
        assert_eq!(stats.recent_forms[1].id, 1);
        assert_eq!(stats.monthly_growth.forms, 1);
        assert_eq!(stats.total_forms, 2);
    }

    #[test]
    fn monthly_growth_window_is_inclusive() {
        let now = at(2024, 3, 31);
        let boundary = format_timestamp(now - Duration::days(30));
        let outside = format_timestamp(now - Duration::days(30) - Duration::seconds(1));
        let s = store_with_forms(&[
            form(1, "new", &boundary),
            form(2, "new", &outside),
            form(3, "completed", "2024-03-30T00:00:00Z"),
        ]);
        let stats = compute_stats(&load(&s).unwrap(), now, &StatsOptions::default());
        assert_eq!(stats.monthly_growth.forms, 2);
        assert!(stats.monthly_growth.forms <= stats.total_forms);
    }

    #[test]
    fn growth_window_wider_than_calendar_counts_everything() {
        let s = store_with_forms(&[
            form(1, "new", "1999-01-01T00:00:00Z"),
            form(2, "new", "2024-03-30T00:00:00Z"),
        ]);
        let opts = StatsOptions {
            growth_window: Duration::days(100_000_000),
            ..StatsOptions::default()
        };
        let stats = compute_stats(&load(&s).unwrap(), at(2024, 3, 31), &opts);
        assert_eq!(stats.monthly_growth.forms, 2);
    }

    #[test]
    fn subscriber_stats() {
        let s = MemoryStore::new();
        s.set(
            SUBSCRIBERS_KEY,
            r#"[{"id":1,"email":"a@x.io","subscribedAt":"2024-01-01T00:00:00Z","status":"active"},
                {"id":2,"email":"b@x.io","subscribedAt":"2024-03-20T00:00:00Z","status":"unsubscribed"}]"#,
        )
        .unwrap();
        let stats = compute_stats(&load(&s).unwrap(), at(2024, 3, 25), &StatsOptions::default());
        assert_eq!(stats.total_subscribers, 2);
        assert_eq!(stats.active_subscribers, 1);
        assert_eq!(stats.monthly_growth.subscribers, 1);
        assert_eq!(stats.recent_subscribers[0].id, 2);
    }

    #[test]
    fn recomputing_without_mutation_is_idempotent() {
        let s = store_with_forms(&[
            form(1, "new", "2024-01-01T00:00:00Z"),
            form(2, "contacted", "2024-01-10T00:00:00Z"),
        ]);
        let now = at(2024, 1, 20);
        let opts = StatsOptions::default();
        let first = compute_stats(&load(&s).unwrap(), now, &opts);
        let second = compute_stats(&load(&s).unwrap(), now, &opts);
        assert_eq!(first, second);
    }

    #[test]
    fn seeding_is_write_once() {
        let s = MemoryStore::new();
        assert!(ensure_initialized(&s).unwrap());
        let first = s.entry(BLOG_POSTS_KEY).unwrap().unwrap();
        assert!(!ensure_initialized(&s).unwrap());
        let second = s.entry(BLOG_POSTS_KEY).unwrap().unwrap();
        assert_eq!(first, second);

        let posts: Collection<BlogPost> = read_collection(&s, BLOG_POSTS_KEY).unwrap();
        assert_eq!(posts.items, seed::blog_posts());
    }

    #[test]
    fn existing_posts_are_never_overwritten_by_seed() {
        let s = MemoryStore::new();
        s.set(BLOG_POSTS_KEY, "[]").unwrap();
        assert!(!ensure_initialized(&s).unwrap());
        assert_eq!(s.get(BLOG_POSTS_KEY).unwrap(), Some("[]".to_string()));
    }
}
