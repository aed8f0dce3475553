use rocket::Request;
use rocket::serde::json::{Json, serde_json};

#[rocket::catch(401)]
pub fn unauthorized() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Authentication required" }))
}

#[rocket::catch(404)]
pub fn not_found(req: &Request) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": format!("'{}' not found", req.uri()) }))
}

#[rocket::catch(409)]
pub fn conflict() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Resource conflict" }))
}

#[rocket::catch(422)]
pub fn unprocessable_entity() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Request body could not be parsed" }))
}
