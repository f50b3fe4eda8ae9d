use crate::api::api_error::APIError;
use crate::api::model::{AcceptHostRequest, ChallengeRequest, HostnameResult};
use crate::api::routes::{check_controller_token, health_check};
use crate::api::server::ClientAppState;
use crate::client::CertBundle;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub(super) fn new(state: ClientAppState) -> Router {
    Router::new()
        .route("/healthcheck", get(health_check))
        .route("/controller/:token/accept_add_host", post(accept_add_host))
        .route("/controller/:token/start_responding", post(start_responding))
        .route("/controller/:token/stop_responding", post(stop_responding))
        .route(
            "/controller/:token/certs/:hostname",
            get(get_cert).put(put_cert),
        )
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.api_timeout))
        .with_state(state)
}

async fn accept_add_host(
    State(state): State<ClientAppState>,
    Path(token): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<AcceptHostRequest>, APIError>,
) -> Result<Json<HostnameResult>, APIError> {
    check_controller_token(&state.controller_token, &token)?;
    let hostname = state.controller.accept_add_host(&payload.reference).await?;
    Ok(Json(HostnameResult { hostname }))
}

async fn start_responding(
    State(state): State<ClientAppState>,
    Path(token): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<ChallengeRequest>, APIError>,
) -> Result<impl IntoResponse, APIError> {
    check_controller_token(&state.controller_token, &token)?;
    state
        .responder
        .start_responding(&payload.hostname, &payload.challenge())
        .await?;
    Ok(Json(json!({"ok":"responding"})))
}

async fn stop_responding(
    State(state): State<ClientAppState>,
    Path(token): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<ChallengeRequest>, APIError>,
) -> Result<impl IntoResponse, APIError> {
    check_controller_token(&state.controller_token, &token)?;
    state
        .responder
        .stop_responding(&payload.hostname, &payload.challenge())
        .await?;
    Ok(Json(json!({"ok":"stopped"})))
}

async fn get_cert(
    State(state): State<ClientAppState>,
    Path((token, hostname)): Path<(String, String)>,
) -> Result<Json<Option<CertBundle>>, APIError> {
    check_controller_token(&state.controller_token, &token)?;
    Ok(Json(state.certs.get(&hostname).await?))
}

async fn put_cert(
    State(state): State<ClientAppState>,
    Path((token, hostname)): Path<(String, String)>,
    WithRejection(Json(bundle), _): WithRejection<Json<CertBundle>, APIError>,
) -> Result<impl IntoResponse, APIError> {
    check_controller_token(&state.controller_token, &token)?;
    state.certs.store(&hostname, &bundle).await?;
    Ok(Json(json!({"ok":"stored"})))
}
