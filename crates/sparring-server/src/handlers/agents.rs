use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sparring_core::{AgentFilter, AgentStatus, CreateAgentRequest, ProfileId, SparringError};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub profile: Option<String>,
}

impl ListQuery {
    fn to_filter(&self) -> Result<AgentFilter, SparringError> {
        let status = self
            .status
            .as_deref()
            .map(|s| s.parse::<AgentStatus>().map_err(SparringError::Validation))
            .transpose()?;
        let profile_id = self
            .profile
            .as_deref()
            .map(str::parse::<ProfileId>)
            .transpose()?;
        Ok(AgentFilter { status, profile_id })
    }
}

pub async fn create(
    state: web::Data<AppState>,
    body: web::Json<CreateAgentRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    log::debug!("Spawn requested for profile {}", request.profile);

    let record = state.orchestrator.create_agent(request).await?;
    Ok(HttpResponse::Created().json(record))
}

pub async fn list(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let filter = query.to_filter()?;
    let agents = state.orchestrator.list_agents(&filter).await?;
    Ok(HttpResponse::Ok().json(json!({
        "count": agents.len(),
        "agents": agents,
    })))
}

pub async fn get(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let record = state.orchestrator.get_agent(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

pub async fn remove(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    state.orchestrator.remove(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
