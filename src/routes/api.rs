use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::json;
use std::net::IpAddr;
use std::sync::Arc;

use crate::dashboard::Dashboard;
use crate::models::contact::ContactForm;
use crate::models::subscriber::NewsletterSignup;
use crate::rate_limit::{IntakeLimits, RateLimiter};

use super::{bad_request, server_error, ApiError, ApiResult};

fn client_key(bucket: &str, ip: Option<IpAddr>) -> String {
    match ip {
        Some(ip) => format!("{}:{}", bucket, ip),
        None => format!("{}:unknown", bucket),
    }
}

fn check_limit(
    limiter: &RateLimiter,
    limits: &IntakeLimits,
    bucket: &str,
    ip: Option<IpAddr>,
) -> Result<(), ApiError> {
    if limiter.check_and_record(&client_key(bucket, ip), limits.max_attempts, limits.window) {
        Ok(())
    } else {
        log::warn!("[api] {} rate limit hit for {:?}", bucket, ip);
        Err((
            Status::TooManyRequests,
            Json(json!({"ok": false, "error": "Too many submissions, try again later"})),
        ))
    }
}

// ── Contact form ───────────────────────────────────────

#[post("/contact", format = "json", data = "<form>")]
pub fn contact_submit(
    dash: &State<Arc<Dashboard>>,
    limiter: &State<Arc<RateLimiter>>,
    limits: &State<IntakeLimits>,
    ip: Option<IpAddr>,
    form: Json<ContactForm>,
) -> ApiResult {
    let form = form.into_inner();
    form.validate().map_err(bad_request)?;
    check_limit(limiter, limits, "contact", ip)?;
    let submission = dash.submit_contact(form).map_err(server_error)?;
    log::info!("[api] Contact submission #{} received", submission.id);
    Ok(Json(json!({"ok": true, "id": submission.id})))
}

// ── Newsletter ─────────────────────────────────────────

#[post("/newsletter", format = "json", data = "<signup>")]
pub fn newsletter_subscribe(
    dash: &State<Arc<Dashboard>>,
    limiter: &State<Arc<RateLimiter>>,
    limits: &State<IntakeLimits>,
    ip: Option<IpAddr>,
    signup: Json<NewsletterSignup>,
) -> ApiResult {
    let signup = signup.into_inner();
    signup.normalized_email().map_err(bad_request)?;
    check_limit(limiter, limits, "newsletter", ip)?;
    let subscriber = dash.subscribe_newsletter(signup).map_err(server_error)?;
    Ok(Json(json!({"ok": true, "id": subscriber.id})))
}

// ── Published posts ────────────────────────────────────

#[get("/posts")]
pub fn posts_published(dash: &State<Arc<Dashboard>>) -> ApiResult {
    let posts = dash.published_posts().map_err(server_error)?;
    Ok(Json(json!({"ok": true, "posts": posts})))
}

#[get("/posts/<slug>")]
pub fn post_by_slug(dash: &State<Arc<Dashboard>>, slug: &str) -> ApiResult {
    match dash.post_by_slug(slug).map_err(server_error)? {
        Some(post) if post.is_published() => Ok(Json(json!({"ok": true, "post": post}))),
        _ => Err((
            Status::NotFound,
            Json(json!({"ok": false, "error": "Post not found"})),
        )),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![contact_submit, newsletter_subscribe, posts_published, post_by_slug]
}
