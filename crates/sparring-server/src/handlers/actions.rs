use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sparring_core::DEFAULT_ACTION_LIMIT;

use crate::error::ApiResult;
use crate::state::AppState;

const MAX_ACTION_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct ActionsQuery {
    pub limit: Option<usize>,
}

pub async fn list(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ActionsQuery>,
) -> ApiResult<HttpResponse> {
    let agent_id = path.into_inner();
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTION_LIMIT)
        .min(MAX_ACTION_LIMIT);

    let actions = state.orchestrator.actions(&agent_id, limit).await?;
    Ok(HttpResponse::Ok().json(json!({
        "agent_id": agent_id,
        "actions": actions,
    })))
}

pub async fn response_policy(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let policy = state.orchestrator.response_policy(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(policy))
}
