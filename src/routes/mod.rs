use rocket::http::Status;
use rocket::serde::json::Json;
use serde_json::{json, Value};

pub mod admin_api;
pub mod api;

pub type ApiError = (Status, Json<Value>);
pub type ApiResult = Result<Json<Value>, ApiError>;

pub fn bad_request(message: String) -> ApiError {
    (Status::BadRequest, Json(json!({"ok": false, "error": message})))
}

pub fn server_error(message: String) -> ApiError {
    log::error!("[api] {}", message);
    (
        Status::InternalServerError,
        Json(json!({"ok": false, "error": message})),
    )
}
