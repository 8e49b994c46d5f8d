use std::sync::Arc;

use actix_http::Request;
use actix_web::{
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test, web, App, Error,
};
use serde_json::{json, Value};
use sparring_core::{AgentOrchestrator, MemoryAgentStore, SimulatedEnvironment, SparringConfig};
use sparring_server::{app_config, AppState};

struct TestApp {
    environment: Arc<SimulatedEnvironment>,
    state: web::Data<AppState>,
}

fn test_state() -> TestApp {
    let environment = Arc::new(SimulatedEnvironment::new());
    let orchestrator = AgentOrchestrator::new(
        SparringConfig::default(),
        Arc::new(MemoryAgentStore::new()),
        environment.clone(),
    )
    .expect("orchestrator");
    TestApp {
        environment,
        state: web::Data::new(AppState::with_orchestrator(Arc::new(orchestrator))),
    }
}

async fn init(
    app: &TestApp,
) -> impl Service<Request, Response = ServiceResponse, Error = Error> {
    test::init_service(
        App::new()
            .app_data(app.state.clone())
            .configure(app_config),
    )
    .await
}

async fn spawn_agent<S>(service: &S, profile: &str) -> Value
where
    S: Service<Request, Response = ServiceResponse, Error = Error>,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/agents")
        .set_json(json!({ "profile": profile }))
        .to_request();
    let resp = test::call_service(service, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    test::read_body_json(resp).await
}

#[actix_web::test]
async fn health_and_profiles() {
    let app = test_state();
    let service = init(&app).await;

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["agents"], 0);

    let req = test::TestRequest::get().uri("/api/v1/profiles").to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    let ids: Vec<&str> = body["profiles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec!["cooperative", "adversarial", "chaotic", "passive", "dominant"]
    );
}

#[actix_web::test]
async fn spawn_and_fetch_agent() {
    let app = test_state();
    let service = init(&app).await;

    let created = spawn_agent(&service, "cooperative").await;
    assert_eq!(created["status"], "active");
    assert_eq!(created["profile_id"], "cooperative");
    let id = created["id"].as_str().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/agents/{}", id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["id"], id);
    assert!(body["prompt"].as_str().unwrap().contains("cooperative"));
}

#[actix_web::test]
async fn unknown_profile_is_bad_request() {
    let app = test_state();
    let service = init(&app).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/agents")
        .set_json(json!({ "profile": "griefer" }))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "unknown_profile");

    let req = test::TestRequest::get().uri("/api/v1/agents").to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["count"], 0);
}

#[actix_web::test]
async fn refused_connection_is_service_unavailable() {
    let app = test_state();
    app.environment.set_refuse_connect(true);
    let service = init(&app).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/agents")
        .set_json(json!({ "profile": "passive", "intensity": 0.2 }))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "environment_unavailable");
    assert_eq!(body["retryable"], true);
}

#[actix_web::test]
async fn lifecycle_routes() {
    let app = test_state();
    let service = init(&app).await;
    let created = spawn_agent(&service, "chaotic").await;
    let id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/agents/{}/pause", id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["status"], "paused");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/agents/{}/resume", id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["status"], "active");

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/agents/{}/terminate", id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["status"], "terminated");
    }
    assert_eq!(app.environment.disconnect_calls(), 1);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/agents/{}/resume", id))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "invalid_transition");
}

#[actix_web::test]
async fn fail_route_moves_agent_to_error() {
    let app = test_state();
    let service = init(&app).await;
    let created = spawn_agent(&service, "passive").await;
    let id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/agents/{}/fail", id))
        .set_json(json!({ "reason": "stuck in spawn chunk" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["metadata"]["error_reason"], "stuck in spawn chunk");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/agents/{}/pause", id))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/v1/agents/missing/fail")
        .set_json(json!({ "reason": "gone" }))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn list_filters_by_status_and_profile() {
    let app = test_state();
    let service = init(&app).await;
    spawn_agent(&service, "cooperative").await;
    let dominant = spawn_agent(&service, "dominant").await;
    let dominant_id = dominant["id"].as_str().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/agents/{}/pause", dominant_id))
        .to_request();
    test::call_service(&service, req).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/agents?status=paused")
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["agents"][0]["id"], dominant_id);

    let req = test::TestRequest::get()
        .uri("/api/v1/agents?profile=cooperative&status=active")
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["count"], 1);

    let req = test::TestRequest::get()
        .uri("/api/v1/agents?status=sleeping")
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn health_actions_and_removal() {
    let app = test_state();
    let service = init(&app).await;
    let created = spawn_agent(&service, "adversarial").await;
    let id = created["id"].as_str().unwrap().to_string();

    app.state.orchestrator.scheduler().run_tick(&id).await.unwrap();
    app.state.orchestrator.scheduler().run_tick(&id).await.unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/agents/{}/health", id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["healthy"], true);
    assert_eq!(body["loop_running"], true);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/agents/{}/actions?limit=1", id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["actions"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/agents/{}/response-policy", id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["profile_id"], "adversarial");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/agents/{}", id))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/agents/{}", id))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/agents/{}/health", id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["healthy"], false);
    assert_eq!(body["issues"][0], "Agent not found");
}

#[actix_web::test]
async fn terminate_all_route() {
    let app = test_state();
    let service = init(&app).await;
    spawn_agent(&service, "cooperative").await;
    spawn_agent(&service, "passive").await;

    let req = test::TestRequest::post()
        .uri("/api/v1/agents/terminate-all")
        .to_request();
    let body: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(body["terminated"], 2);
    assert_eq!(app.environment.connection_count(), 0);

    app.state.shutdown().await;
    assert!(app.state.orchestrator.scheduler().running_agents().is_empty());
}
