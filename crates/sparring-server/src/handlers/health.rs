use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use sparring_core::{AgentFilter, AgentStatus};

use crate::error::ApiResult;
use crate::state::AppState;

/// Service liveness plus a summary of the fleet.
pub async fn service(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let orchestrator = &state.orchestrator;
    let agents = orchestrator.list_agents(&AgentFilter::default()).await?;
    let active = agents
        .iter()
        .filter(|agent| agent.status == AgentStatus::Active)
        .count();

    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "agents": agents.len(),
        "active_agents": active,
        "running_loops": orchestrator.scheduler().running_agents().len(),
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
    })))
}

pub async fn agent(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let agent_id = path.into_inner();
    let report = state.orchestrator.health(&agent_id).await?;
    if !report.healthy {
        log::debug!("[{}] Health issues: {:?}", agent_id, report.issues);
    }
    Ok(HttpResponse::Ok().json(report))
}
