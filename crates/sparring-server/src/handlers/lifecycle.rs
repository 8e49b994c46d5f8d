use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn pause(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let record = state.orchestrator.pause(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

pub async fn resume(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let record = state.orchestrator.resume(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

pub async fn terminate(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let record = state.orchestrator.terminate(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub reason: String,
}

pub async fn fail(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<FailRequest>,
) -> ApiResult<HttpResponse> {
    let record = state
        .orchestrator
        .fail(&path.into_inner(), &body.reason)
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

pub async fn terminate_all(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let terminated = state.orchestrator.terminate_all().await?;
    Ok(HttpResponse::Ok().json(json!({ "terminated": terminated })))
}
