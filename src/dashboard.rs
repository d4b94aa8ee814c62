use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Map;

use crate::aggregator::{self, Collection, Snapshot, StatsOptions};
use crate::ids::{find_index, next_id};
use crate::models::contact::{ContactForm, ContactStatus, ContactSubmission};
use crate::models::now_iso;
use crate::models::post::{unique_slug, BlogPost, PostForm};
use crate::models::stats::DashboardStats;
use crate::models::subscriber::{NewsletterSignup, NewsletterSubscriber, SubscriberStatus};
use crate::store::{
    KvStore, WriteOutcome, BLOG_POSTS_KEY, CONTACT_FORMS_KEY, SUBSCRIBERS_KEY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Forms,
    Subscribers,
    Posts,
}

impl CollectionKind {
    pub fn key(&self) -> &'static str {
        match self {
            CollectionKind::Forms => CONTACT_FORMS_KEY,
            CollectionKind::Subscribers => SUBSCRIBERS_KEY,
            CollectionKind::Posts => BLOG_POSTS_KEY,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            CONTACT_FORMS_KEY => Some(CollectionKind::Forms),
            SUBSCRIBERS_KEY => Some(CollectionKind::Subscribers),
            BLOG_POSTS_KEY => Some(CollectionKind::Posts),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardEvent {
    /// Everything was re-read from the store.
    Reloaded,
    /// A local mutation wrote this collection through.
    Changed(CollectionKind),
}

pub type ObserverId = u64;

type Observer = Box<dyn Fn(&DashboardEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardOptions {
    pub stats: StatsOptions,
    /// Re-reads allowed when a write-through finds the key changed underneath.
    pub write_retries: u32,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        DashboardOptions {
            stats: StatsOptions::default(),
            write_retries: 3,
        }
    }
}

/// A collection the dashboard can write through.
trait Stored: Serialize + DeserializeOwned + Clone {
    const KIND: CollectionKind;
    fn slot(snapshot: &Snapshot) -> &Collection<Self>;
    fn slot_mut(snapshot: &mut Snapshot) -> &mut Collection<Self>;
}

impl Stored for ContactSubmission {
    const KIND: CollectionKind = CollectionKind::Forms;
    fn slot(snapshot: &Snapshot) -> &Collection<Self> {
        &snapshot.forms
    }
    fn slot_mut(snapshot: &mut Snapshot) -> &mut Collection<Self> {
        &mut snapshot.forms
    }
}

impl Stored for NewsletterSubscriber {
    const KIND: CollectionKind = CollectionKind::Subscribers;
    fn slot(snapshot: &Snapshot) -> &Collection<Self> {
        &snapshot.subscribers
    }
    fn slot_mut(snapshot: &mut Snapshot) -> &mut Collection<Self> {
        &mut snapshot.subscribers
    }
}

impl Stored for BlogPost {
    const KIND: CollectionKind = CollectionKind::Posts;
    fn slot(snapshot: &Snapshot) -> &Collection<Self> {
        &snapshot.posts
    }
    fn slot_mut(snapshot: &mut Snapshot) -> &mut Collection<Self> {
        &mut snapshot.posts
    }
}

#[derive(Default)]
struct State {
    snapshot: Snapshot,
    stats: DashboardStats,
    loaded: bool,
}

/// Cached view of the three collections with write-through mutations.
///
/// Reads are served from memory after the first `activate`. Every mutation
/// updates memory and the store in the same call, using the revision the
/// cache was loaded at; if another instance wrote in between, the collection
/// is re-read and the mutation applied again instead of overwriting it.
pub struct Dashboard {
    store: Arc<dyn KvStore>,
    options: DashboardOptions,
    state: RwLock<State>,
    observers: Mutex<Vec<(ObserverId, Observer)>>,
    next_observer: AtomicU64,
    /// Serializes mutations from this instance.
    write_lock: Mutex<()>,
}

impl Dashboard {
    pub fn new(store: Arc<dyn KvStore>, options: DashboardOptions) -> Self {
        Dashboard {
            store,
            options,
            state: RwLock::new(State::default()),
            observers: Mutex::new(Vec::new()),
            next_observer: AtomicU64::new(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    // ── Loading ─────────────────────────────────────────────────────

    /// First load. Seeds the blog posts if absent, then reads everything.
    pub fn activate(&self) -> Result<DashboardStats, String> {
        self.reload()
    }

    /// Re-read every collection and recompute statistics.
    pub fn reload(&self) -> Result<DashboardStats, String> {
        aggregator::ensure_initialized(&*self.store)?;
        let snapshot = aggregator::load(&*self.store)?;
        let stats = aggregator::compute_stats(&snapshot, Utc::now(), &self.options.stats);
        {
            let mut state = self.state.write().map_err(|e| e.to_string())?;
            state.snapshot = snapshot;
            state.stats = stats.clone();
            state.loaded = true;
        }
        debug!(
            "[dashboard] loaded {} forms, {} subscribers, {} posts",
            stats.total_forms, stats.total_subscribers, stats.total_posts
        );
        self.publish(&DashboardEvent::Reloaded);
        Ok(stats)
    }

    fn ensure_loaded(&self) -> Result<(), String> {
        let loaded = self.state.read().map_err(|e| e.to_string())?.loaded;
        if !loaded {
            self.reload()?;
        }
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn stats(&self) -> Result<DashboardStats, String> {
        self.ensure_loaded()?;
        Ok(self.state.read().map_err(|e| e.to_string())?.stats.clone())
    }

    pub fn snapshot(&self) -> Result<Snapshot, String> {
        self.ensure_loaded()?;
        Ok(self.state.read().map_err(|e| e.to_string())?.snapshot.clone())
    }

    pub fn forms(&self) -> Result<Vec<ContactSubmission>, String> {
        self.items::<ContactSubmission>()
    }

    pub fn subscribers(&self) -> Result<Vec<NewsletterSubscriber>, String> {
        self.items::<NewsletterSubscriber>()
    }

    pub fn posts(&self) -> Result<Vec<BlogPost>, String> {
        self.items::<BlogPost>()
    }

    /// Published posts, newest first.
    pub fn published_posts(&self) -> Result<Vec<BlogPost>, String> {
        let posts: Vec<BlogPost> = self.posts()?.into_iter().filter(|p| p.is_published()).collect();
        let count = posts.len();
        Ok(aggregator::most_recent(&posts, count, BlogPost::published_time))
    }

    pub fn post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, String> {
        Ok(self.posts()?.into_iter().find(|p| p.slug == slug))
    }

    fn items<T: Stored>(&self) -> Result<Vec<T>, String> {
        self.ensure_loaded()?;
        let state = self.state.read().map_err(|e| e.to_string())?;
        Ok(T::slot(&state.snapshot).items.clone())
    }

    // ── Observers ───────────────────────────────────────────────────

    /// Register a callback run after every reload and mutation.
    /// Callbacks must not register or remove observers themselves.
    pub fn observe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&DashboardEvent) + Send + Sync + 'static,
    {
        let id = self.next_observer.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut observers) = self.observers.lock() {
            observers.push((id, Box::new(callback)));
        }
        id
    }

    pub fn unobserve(&self, id: ObserverId) -> bool {
        match self.observers.lock() {
            Ok(mut observers) => {
                let before = observers.len();
                observers.retain(|(oid, _)| *oid != id);
                observers.len() != before
            }
            Err(_) => false,
        }
    }

    fn publish(&self, event: &DashboardEvent) {
        if let Ok(observers) = self.observers.lock() {
            for (_, callback) in observers.iter() {
                callback(event);
            }
        }
    }

    // ── Write-through ───────────────────────────────────────────────

    /// Apply `apply` to the collection and write the whole result back.
    /// `apply` may run more than once when the stored copy moved on.
    fn mutate<T, R, F>(&self, apply: F) -> Result<R, String>
    where
        T: Stored,
        F: Fn(&mut Vec<T>) -> Result<R, String>,
    {
        let _guard = self.write_lock.lock().map_err(|e| e.to_string())?;
        self.ensure_loaded()?;

        let key = T::KIND.key();
        let (mut items, mut revision) = {
            let state = self.state.read().map_err(|e| e.to_string())?;
            let slot = T::slot(&state.snapshot);
            (slot.items.clone(), slot.revision)
        };

        let mut conflicts = 0;
        loop {
            let result = apply(&mut items)?;
            let text = serde_json::to_string(&items).map_err(|e| e.to_string())?;
            match self.store.compare_and_set(key, &text, revision)? {
                WriteOutcome::Written(new_revision) => {
                    {
                        let mut state = self.state.write().map_err(|e| e.to_string())?;
                        let slot = T::slot_mut(&mut state.snapshot);
                        slot.items = items;
                        slot.revision = new_revision;
                        state.stats = aggregator::compute_stats(
                            &state.snapshot,
                            Utc::now(),
                            &self.options.stats,
                        );
                    }
                    self.publish(&DashboardEvent::Changed(T::KIND));
                    return Ok(result);
                }
                WriteOutcome::Conflict { current } => {
                    conflicts += 1;
                    if conflicts > self.options.write_retries {
                        return Err(format!(
                            "{}: gave up after {} conflicting writes",
                            key, conflicts
                        ));
                    }
                    warn!(
                        "[store] {} changed underneath us (revision {} -> {}), re-applying",
                        key, revision, current
                    );
                    let fresh: Collection<T> = aggregator::read_collection(&*self.store, key)?;
                    items = fresh.items;
                    revision = fresh.revision;
                }
            }
        }
    }

    // ── Contact forms ───────────────────────────────────────────────

    /// Set status (and notes, when given) on submission `id`, stamping
    /// `updatedAt`. Unknown ids leave the records unchanged but the
    /// collection is still written back. Returns whether `id` was found.
    pub fn update_form_status(
        &self,
        id: i64,
        status: ContactStatus,
        notes: Option<String>,
    ) -> Result<bool, String> {
        self.mutate(|forms: &mut Vec<ContactSubmission>| {
            let now = now_iso();
            let mut found = false;
            for form in forms.iter_mut().filter(|f| f.id == id) {
                form.status = status;
                if let Some(notes) = &notes {
                    form.notes = Some(notes.clone());
                }
                form.updated_at = Some(now.clone());
                found = true;
            }
            Ok(found)
        })
    }

    pub fn delete_form(&self, id: i64) -> Result<bool, String> {
        self.mutate(|forms: &mut Vec<ContactSubmission>| {
            let before = forms.len();
            forms.retain(|f| f.id != id);
            Ok(forms.len() != before)
        })
    }

    pub fn submit_contact(&self, form: ContactForm) -> Result<ContactSubmission, String> {
        form.validate()?;
        self.mutate(|forms: &mut Vec<ContactSubmission>| {
            let submission = form.clone().into_submission(next_id(forms)?, now_iso());
            forms.push(submission.clone());
            Ok(submission)
        })
    }

    // ── Newsletter ──────────────────────────────────────────────────

    pub fn delete_subscriber(&self, id: i64) -> Result<bool, String> {
        self.mutate(|subs: &mut Vec<NewsletterSubscriber>| {
            let before = subs.len();
            subs.retain(|s| s.id != id);
            Ok(subs.len() != before)
        })
    }

    pub fn update_subscriber_status(
        &self,
        id: i64,
        status: SubscriberStatus,
    ) -> Result<bool, String> {
        self.mutate(|subs: &mut Vec<NewsletterSubscriber>| {
            match find_index(subs, id) {
                Some(idx) => {
                    subs[idx].status = status;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    /// Add a subscriber. An address already on the list is re-activated
    /// rather than duplicated.
    pub fn subscribe_newsletter(
        &self,
        signup: NewsletterSignup,
    ) -> Result<NewsletterSubscriber, String> {
        let email = signup.normalized_email()?;
        self.mutate(|subs: &mut Vec<NewsletterSubscriber>| {
            if let Some(existing) = subs
                .iter_mut()
                .find(|s| s.email.eq_ignore_ascii_case(&email))
            {
                existing.status = SubscriberStatus::Active;
                return Ok(existing.clone());
            }
            let subscriber = NewsletterSubscriber {
                id: next_id(subs)?,
                email: email.clone(),
                subscribed_at: now_iso(),
                status: SubscriberStatus::Active,
                extra: Map::new(),
            };
            subs.push(subscriber.clone());
            Ok(subscriber)
        })
    }

    // ── Blog posts ──────────────────────────────────────────────────

    pub fn create_post(&self, form: PostForm) -> Result<BlogPost, String> {
        form.validate()?;
        let base = form.base_slug();
        self.mutate(|posts: &mut Vec<BlogPost>| {
            let slug = unique_slug(&base, posts, None);
            let post = form.clone().into_post(next_id(posts)?, slug, &now_iso());
            posts.push(post.clone());
            Ok(post)
        })
    }

    /// Replace the editable fields of post `id`. Returns `None` if absent.
    pub fn update_post(&self, id: i64, form: PostForm) -> Result<Option<BlogPost>, String> {
        form.validate()?;
        let base = form.base_slug();
        self.mutate(|posts: &mut Vec<BlogPost>| {
            let Some(idx) = find_index(posts, id) else {
                return Ok(None);
            };
            let slug = unique_slug(&base, posts, Some(id));
            let mut updated = form.clone();
            if updated.published_at.is_none() {
                updated.published_at = Some(posts[idx].published_at.clone());
            }
            let mut post = updated.into_post(id, slug, &now_iso());
            let previous = &mut posts[idx];
            post.extra = std::mem::take(&mut previous.extra);
            for (field, value) in std::mem::take(&mut previous.seo.extra) {
                post.seo.extra.entry(field).or_insert(value);
            }
            posts[idx] = post.clone();
            Ok(Some(post))
        })
    }

    pub fn delete_post(&self, id: i64) -> Result<bool, String> {
        self.mutate(|posts: &mut Vec<BlogPost>| {
            let before = posts.len();
            posts.retain(|p| p.id != id);
            Ok(posts.len() != before)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::{PostCategory, PostStatus};
    use crate::models::parse_timestamp;
    use crate::seed;
    use crate::store::memory::MemoryStore;
    use std::sync::atomic::AtomicUsize;

    const TWO_FORMS: &str = r#"[
        {"id":1,"name":"Ann","email":"ann@example.com","message":"Quote please","status":"new","submittedAt":"2024-01-01T00:00:00Z"},
        {"id":2,"name":"Bob","email":"bob@example.com","message":"Redesign","status":"contacted","submittedAt":"2024-01-10T00:00:00Z"}
    ]"#;

    const TWO_SUBSCRIBERS: &str = r#"[
        {"id":1,"email":"a@example.com","subscribedAt":"2024-01-01T00:00:00Z","status":"active"},
        {"id":2,"email":"b@example.com","subscribedAt":"2024-01-05T00:00:00Z","status":"active"}
    ]"#;

    fn dashboard_with(store: &MemoryStore) -> Dashboard {
        let d = Dashboard::new(Arc::new(store.peer()), DashboardOptions::default());
        d.activate().unwrap();
        d
    }

    fn seeded_store() -> MemoryStore {
        let s = MemoryStore::new();
        s.set(CONTACT_FORMS_KEY, TWO_FORMS).unwrap();
        s.set(SUBSCRIBERS_KEY, TWO_SUBSCRIBERS).unwrap();
        s
    }

    fn fresh_forms(store: &MemoryStore) -> Vec<ContactSubmission> {
        aggregator::load(store).unwrap().forms.items
    }

    fn post_form(title: &str) -> PostForm {
        PostForm {
            title: title.to_string(),
            slug: None,
            excerpt: "Excerpt".to_string(),
            content: "<p>Body</p>".to_string(),
            author: "Ann".to_string(),
            category: PostCategory::Marketing,
            tags: vec!["growth".to_string()],
            featured_image: None,
            published_at: Some("2024-04-01T00:00:00Z".to_string()),
            status: PostStatus::Published,
            seo: None,
        }
    }

    #[test]
    fn test_activate_reports_stats() {
        let store = seeded_store();
        let d = dashboard_with(&store);
        let stats = d.stats().unwrap();
        assert_eq!(stats.total_forms, 2);
        assert_eq!(stats.new_forms, 1);
        assert_eq!(stats.total_subscribers, 2);
        assert_eq!(stats.total_posts, seed::blog_posts().len());
    }

    #[test]
    fn test_first_activation_seeds_posts_once() {
        let store = MemoryStore::new();
        let d = dashboard_with(&store);
        assert_eq!(d.posts().unwrap(), seed::blog_posts());
        let rev = store.revision(BLOG_POSTS_KEY).unwrap();

        let again = dashboard_with(&store);
        assert_eq!(again.posts().unwrap(), seed::blog_posts());
        assert_eq!(store.revision(BLOG_POSTS_KEY).unwrap(), rev);
        // Forms and subscribers stay absent until something is written
        assert!(store.get(CONTACT_FORMS_KEY).unwrap().is_none());
    }

    #[test]
    fn test_update_form_status_persists() {
        let store = seeded_store();
        let d = dashboard_with(&store);
        assert!(d
            .update_form_status(1, ContactStatus::Completed, Some("Signed".to_string()))
            .unwrap());

        let forms = fresh_forms(&store);
        let form = forms.iter().find(|f| f.id == 1).unwrap();
        assert_eq!(form.status, ContactStatus::Completed);
        assert_eq!(form.notes.as_deref(), Some("Signed"));
        let updated = parse_timestamp(form.updated_at.as_deref().unwrap()).unwrap();
        assert!(updated >= form.submitted_time().unwrap());

        // In-memory state moved with the store
        assert_eq!(d.stats().unwrap().new_forms, 0);
        assert_eq!(d.forms().unwrap(), forms);
    }

    #[test]
    fn test_update_form_status_keeps_notes_when_none() {
        let store = seeded_store();
        let d = dashboard_with(&store);
        d.update_form_status(2, ContactStatus::Contacted, Some("Called".to_string()))
            .unwrap();
        d.update_form_status(2, ContactStatus::Completed, None).unwrap();
        let form = fresh_forms(&store).into_iter().find(|f| f.id == 2).unwrap();
        assert_eq!(form.notes.as_deref(), Some("Called"));
        assert_eq!(form.status, ContactStatus::Completed);
    }

    #[test]
    fn test_update_unknown_form_is_noop_write() {
        let store = seeded_store();
        let d = dashboard_with(&store);
        let before_rev = store.revision(CONTACT_FORMS_KEY).unwrap();
        let before = fresh_forms(&store);
        assert!(!d.update_form_status(42, ContactStatus::Completed, None).unwrap());
        assert_eq!(fresh_forms(&store), before);
        assert!(store.revision(CONTACT_FORMS_KEY).unwrap() > before_rev);
    }

    #[test]
    fn test_delete_form() {
        let store = seeded_store();
        let d = dashboard_with(&store);
        assert!(d.delete_form(1).unwrap());
        let forms = fresh_forms(&store);
        assert_eq!(forms.len(), 1);
        assert!(forms.iter().all(|f| f.id != 1));
        assert_eq!(d.stats().unwrap().total_forms, 1);
    }

    #[test]
    fn test_delete_missing_subscriber_keeps_elements() {
        let store = seeded_store();
        let d = dashboard_with(&store);
        let before = aggregator::load(&store).unwrap().subscribers.items;
        assert!(!d.delete_subscriber(999).unwrap());
        let after = aggregator::load(&store).unwrap().subscribers.items;
        assert_eq!(before, after);
    }

    #[test]
    fn test_delete_subscriber() {
        let store = seeded_store();
        let d = dashboard_with(&store);
        assert!(d.delete_subscriber(2).unwrap());
        let subs = aggregator::load(&store).unwrap().subscribers.items;
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id, 1);
    }

    fn stored_json(store: &MemoryStore, key: &str) -> Vec<serde_json::Value> {
        serde_json::from_str(&store.get(key).unwrap().unwrap()).unwrap()
    }

    #[test]
    fn test_unknown_fields_survive_write_through() {
        let store = MemoryStore::new();
        store
            .set(
                SUBSCRIBERS_KEY,
                r#"[{"id":1,"email":"a@x.io","subscribedAt":"2024-01-01T00:00:00Z","status":"active","source":"footer"}]"#,
            )
            .unwrap();
        store
            .set(
                CONTACT_FORMS_KEY,
                r#"[{"id":1,"name":"Ann","email":"ann@example.com","message":"Hi","status":"new",
                     "submittedAt":"2024-01-01T00:00:00Z","phone":"555-1234","timeline":"ASAP"}]"#,
            )
            .unwrap();
        let d = dashboard_with(&store);

        assert!(!d.delete_subscriber(999).unwrap());
        let subs = stored_json(&store, SUBSCRIBERS_KEY);
        assert_eq!(subs[0]["source"], "footer");

        assert!(d.update_form_status(1, ContactStatus::Contacted, None).unwrap());
        let forms = stored_json(&store, CONTACT_FORMS_KEY);
        assert_eq!(forms[0]["status"], "contacted");
        assert_eq!(forms[0]["phone"], "555-1234");
        assert_eq!(forms[0]["timeline"], "ASAP");
    }

    #[test]
    fn test_post_edit_keeps_unmanaged_fields() {
        let store = MemoryStore::new();
        store
            .set(
                BLOG_POSTS_KEY,
                r#"[{"id":7,"title":"Old","slug":"old","category":"seo","publishedAt":"2024-01-01T00:00:00Z",
                     "status":"published","readingTime":4,"seo":{"metaTitle":"Old","canonical":"/blog/old"}}]"#,
            )
            .unwrap();
        let d = dashboard_with(&store);

        assert!(d.delete_post(999).is_ok());
        let posts = stored_json(&store, BLOG_POSTS_KEY);
        assert_eq!(posts[0]["seo"]["canonical"], "/blog/old");

        d.update_post(7, post_form("New Title")).unwrap().unwrap();
        let posts = stored_json(&store, BLOG_POSTS_KEY);
        assert_eq!(posts[0]["title"], "New Title");
        assert_eq!(posts[0]["readingTime"], 4);
        assert_eq!(posts[0]["seo"]["metaTitle"], "New Title");
        assert_eq!(posts[0]["seo"]["canonical"], "/blog/old");
    }

    #[test]
    fn test_exhausted_id_space_is_an_error() {
        let store = MemoryStore::new();
        store
            .set(
                CONTACT_FORMS_KEY,
                r#"[{"id":9223372036854775807,"name":"Max","email":"max@example.com","message":"m",
                     "status":"new","submittedAt":"2024-01-01T00:00:00Z"}]"#,
            )
            .unwrap();
        let d = dashboard_with(&store);
        let before = store.revision(CONTACT_FORMS_KEY).unwrap();

        let result = d.submit_contact(ContactForm {
            name: "Eve".to_string(),
            email: "eve@example.com".to_string(),
            company: None,
            service: None,
            budget: None,
            message: "Hello".to_string(),
        });
        assert!(result.is_err());
        assert_eq!(store.revision(CONTACT_FORMS_KEY).unwrap(), before);
        // The dashboard stays usable
        assert_eq!(d.stats().unwrap().total_forms, 1);
    }

    #[test]
    fn test_conflicting_tab_write_is_not_clobbered() {
        let store = seeded_store();
        let tab_a = dashboard_with(&store);
        let tab_b = dashboard_with(&store);

        // B deletes form 2 after A loaded; A then updates form 1 from its stale cache.
        assert!(tab_b.delete_form(2).unwrap());
        assert!(tab_a
            .update_form_status(1, ContactStatus::Contacted, None)
            .unwrap());

        let forms = fresh_forms(&store);
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].id, 1);
        assert_eq!(forms[0].status, ContactStatus::Contacted);
        assert_eq!(tab_a.forms().unwrap(), forms);
    }

    #[test]
    fn test_retry_budget_exhausted() {
        let store = seeded_store();
        let options = DashboardOptions {
            write_retries: 0,
            ..DashboardOptions::default()
        };
        let d = Dashboard::new(Arc::new(store.peer()), options);
        d.activate().unwrap();
        store.set(CONTACT_FORMS_KEY, "[]").unwrap();
        let err = d.delete_form(1).unwrap_err();
        assert!(err.contains(CONTACT_FORMS_KEY));
        assert_eq!(store.get(CONTACT_FORMS_KEY).unwrap(), Some("[]".to_string()));
    }

    #[test]
    fn test_observers_see_changes() {
        let store = seeded_store();
        let d = dashboard_with(&store);
        let changed = Arc::new(AtomicUsize::new(0));
        let reloaded = Arc::new(AtomicUsize::new(0));
        let (c, r) = (Arc::clone(&changed), Arc::clone(&reloaded));
        let id = d.observe(move |event| match event {
            DashboardEvent::Changed(CollectionKind::Forms) => {
                c.fetch_add(1, Ordering::SeqCst);
            }
            DashboardEvent::Reloaded => {
                r.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        });

        d.delete_form(1).unwrap();
        d.reload().unwrap();
        assert_eq!(changed.load(Ordering::SeqCst), 1);
        assert_eq!(reloaded.load(Ordering::SeqCst), 1);

        assert!(d.unobserve(id));
        assert!(!d.unobserve(id));
        d.delete_form(2).unwrap();
        assert_eq!(changed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_submit_contact_allocates_ids() {
        let store = seeded_store();
        let d = dashboard_with(&store);
        let form = ContactForm {
            name: "Cara".to_string(),
            email: "cara@example.com".to_string(),
            company: None,
            service: Some("SEO".to_string()),
            budget: Some("5k".to_string()),
            message: "Audit please".to_string(),
        };
        let created = d.submit_contact(form.clone()).unwrap();
        assert_eq!(created.id, 3);
        assert_eq!(created.status, ContactStatus::New);
        let second = d.submit_contact(form).unwrap();
        assert_eq!(second.id, 4);

        let stats = d.stats().unwrap();
        assert_eq!(stats.total_forms, 4);
        assert_eq!(stats.new_forms, 3);
        // Both new submissions may share a millisecond; either order is valid
        let mut newest: Vec<i64> = stats.recent_forms[..2].iter().map(|f| f.id).collect();
        newest.sort();
        assert_eq!(newest, vec![3, 4]);
        assert_eq!(stats.monthly_growth.forms, 2);
    }

    #[test]
    fn test_submit_contact_into_empty_store() {
        let store = MemoryStore::new();
        let d = dashboard_with(&store);
        let created = d
            .submit_contact(ContactForm {
                name: "Dan".to_string(),
                email: "dan@example.com".to_string(),
                company: None,
                service: None,
                budget: None,
                message: "Hello".to_string(),
            })
            .unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(fresh_forms(&store).len(), 1);
    }

    #[test]
    fn test_invalid_contact_is_rejected_without_write() {
        let store = seeded_store();
        let d = dashboard_with(&store);
        let rev = store.revision(CONTACT_FORMS_KEY).unwrap();
        let result = d.submit_contact(ContactForm {
            name: "".to_string(),
            email: "x@example.com".to_string(),
            company: None,
            service: None,
            budget: None,
            message: "hi".to_string(),
        });
        assert!(result.is_err());
        assert_eq!(store.revision(CONTACT_FORMS_KEY).unwrap(), rev);
    }

    #[test]
    fn test_subscribe_newsletter_dedupes() {
        let store = seeded_store();
        let d = dashboard_with(&store);
        d.update_subscriber_status(1, SubscriberStatus::Unsubscribed)
            .unwrap();
        assert_eq!(d.stats().unwrap().active_subscribers, 1);

        let again = d
            .subscribe_newsletter(NewsletterSignup {
                email: "A@Example.com".to_string(),
            })
            .unwrap();
        assert_eq!(again.id, 1);
        assert_eq!(again.status, SubscriberStatus::Active);

        let fresh = d
            .subscribe_newsletter(NewsletterSignup {
                email: "new@example.com".to_string(),
            })
            .unwrap();
        assert_eq!(fresh.id, 3);
        let stats = d.stats().unwrap();
        assert_eq!(stats.total_subscribers, 3);
        assert_eq!(stats.active_subscribers, 3);
    }

    #[test]
    fn test_update_missing_subscriber() {
        let store = seeded_store();
        let d = dashboard_with(&store);
        assert!(!d
            .update_subscriber_status(77, SubscriberStatus::Unsubscribed)
            .unwrap());
    }

    #[test]
    fn test_post_lifecycle() {
        let store = MemoryStore::new();
        let d = dashboard_with(&store);
        let seeded = seed::blog_posts().len();

        let created = d.create_post(post_form("Growth Playbook")).unwrap();
        assert_eq!(created.slug, "growth-playbook");
        assert_eq!(created.id, seeded as i64 + 1);
        let dup = d.create_post(post_form("Growth Playbook")).unwrap();
        assert_eq!(dup.slug, "growth-playbook-2");

        let mut edit = post_form("Growth Playbook, Revised");
        edit.published_at = None;
        edit.status = PostStatus::Draft;
        let updated = d.update_post(created.id, edit).unwrap().unwrap();
        assert_eq!(updated.slug, "growth-playbook-revised");
        assert_eq!(updated.published_at, created.published_at);
        assert!(d.update_post(999, post_form("Nope")).unwrap().is_none());

        assert_eq!(d.post_by_slug("growth-playbook-revised").unwrap().unwrap().id, created.id);
        assert!(d.published_posts().unwrap().iter().all(|p| p.id != created.id));

        assert!(d.delete_post(dup.id).unwrap());
        assert!(!d.delete_post(dup.id).unwrap());
        let stored = aggregator::load(&store).unwrap().posts.items;
        assert_eq!(stored.len(), seeded + 1);
    }

    #[test]
    fn test_published_posts_newest_first() {
        let store = MemoryStore::new();
        let d = dashboard_with(&store);
        let posts = d.published_posts().unwrap();
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_collection_kind_keys() {
        for kind in [
            CollectionKind::Forms,
            CollectionKind::Subscribers,
            CollectionKind::Posts,
        ] {
            assert_eq!(CollectionKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(CollectionKind::from_key("theme"), None);
    }
}
