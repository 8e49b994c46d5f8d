use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::state::AppState;

pub async fn list(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "profiles": state.orchestrator.profiles() }))
}
