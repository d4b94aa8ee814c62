use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::dashboard::Dashboard;
use crate::models::contact::ContactStatus;
use crate::models::post::{PostCategory, PostForm};
use crate::models::subscriber::SubscriberStatus;

use super::{bad_request, server_error, ApiResult};

// ── Dashboard ──────────────────────────────────────────

#[get("/dashboard")]
pub fn dashboard(dash: &State<Arc<Dashboard>>) -> ApiResult {
    let stats = dash.stats().map_err(server_error)?;
    Ok(Json(json!({"ok": true, "stats": stats})))
}

#[post("/reload")]
pub fn reload(dash: &State<Arc<Dashboard>>) -> ApiResult {
    let stats = dash.reload().map_err(server_error)?;
    Ok(Json(json!({"ok": true, "stats": stats})))
}

// ── Contact forms ──────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FormStatusUpdate {
    pub status: ContactStatus,
    pub notes: Option<String>,
}

#[get("/forms")]
pub fn forms_list(dash: &State<Arc<Dashboard>>) -> ApiResult {
    let forms = dash.forms().map_err(server_error)?;
    Ok(Json(json!({"ok": true, "forms": forms})))
}

#[put("/forms/<id>/status", format = "json", data = "<update>")]
pub fn form_update_status(
    dash: &State<Arc<Dashboard>>,
    id: i64,
    update: Json<FormStatusUpdate>,
) -> ApiResult {
    let update = update.into_inner();
    let status = update.status;
    let found = dash
        .update_form_status(id, status, update.notes)
        .map_err(server_error)?;
    if found {
        log::info!("[admin] Contact form #{} marked {}", id, status.as_str());
    }
    Ok(Json(json!({"ok": true, "found": found})))
}

#[delete("/forms/<id>")]
pub fn form_delete(dash: &State<Arc<Dashboard>>, id: i64) -> ApiResult {
    let found = dash.delete_form(id).map_err(server_error)?;
    Ok(Json(json!({"ok": true, "found": found})))
}

// ── Subscribers ────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubscriberStatusUpdate {
    pub status: SubscriberStatus,
}

#[get("/subscribers")]
pub fn subscribers_list(dash: &State<Arc<Dashboard>>) -> ApiResult {
    let subscribers = dash.subscribers().map_err(server_error)?;
    Ok(Json(json!({"ok": true, "subscribers": subscribers})))
}

#[put("/subscribers/<id>/status", format = "json", data = "<update>")]
pub fn subscriber_update_status(
    dash: &State<Arc<Dashboard>>,
    id: i64,
    update: Json<SubscriberStatusUpdate>,
) -> ApiResult {
    let found = dash
        .update_subscriber_status(id, update.status)
        .map_err(server_error)?;
    if found {
        log::info!("[admin] Subscriber #{} marked {}", id, update.status.as_str());
    }
    Ok(Json(json!({"ok": true, "found": found})))
}

#[delete("/subscribers/<id>")]
pub fn subscriber_delete(dash: &State<Arc<Dashboard>>, id: i64) -> ApiResult {
    let found = dash.delete_subscriber(id).map_err(server_error)?;
    Ok(Json(json!({"ok": true, "found": found})))
}

// ── Blog posts ─────────────────────────────────────────

/// Category choices for the post editor.
#[get("/categories")]
pub fn categories_list() -> Json<Value> {
    let categories: Vec<Value> = PostCategory::ALL
        .iter()
        .map(|c| json!({"value": c, "label": c.label()}))
        .collect();
    Json(json!({"ok": true, "categories": categories}))
}

#[get("/posts")]
pub fn posts_list(dash: &State<Arc<Dashboard>>) -> ApiResult {
    let posts = dash.posts().map_err(server_error)?;
    Ok(Json(json!({"ok": true, "posts": posts})))
}

#[post("/posts", format = "json", data = "<form>")]
pub fn post_create(dash: &State<Arc<Dashboard>>, form: Json<PostForm>) -> ApiResult {
    let form = form.into_inner();
    form.validate().map_err(bad_request)?;
    let post = dash.create_post(form).map_err(server_error)?;
    Ok(Json(json!({"ok": true, "post": post})))
}

#[put("/posts/<id>", format = "json", data = "<form>")]
pub fn post_update(dash: &State<Arc<Dashboard>>, id: i64, form: Json<PostForm>) -> ApiResult {
    let form = form.into_inner();
    form.validate().map_err(bad_request)?;
    match dash.update_post(id, form).map_err(server_error)? {
        Some(post) => Ok(Json(json!({"ok": true, "post": post}))),
        None => Err((
            Status::NotFound,
            Json(json!({"ok": false, "error": format!("No post with id {}", id)})),
        )),
    }
}

#[delete("/posts/<id>")]
pub fn post_delete(dash: &State<Arc<Dashboard>>, id: i64) -> ApiResult {
    let found = dash.delete_post(id).map_err(server_error)?;
    Ok(Json(json!({"ok": true, "found": found})))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        dashboard,
        reload,
        forms_list,
        form_update_status,
        form_delete,
        subscribers_list,
        subscriber_update_status,
        subscriber_delete,
        categories_list,
        posts_list,
        post_create,
        post_update,
        post_delete,
    ]
}
