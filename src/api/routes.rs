use crate::api::api_error::APIError;
use crate::api::model::{
    AddHostRequest, AddHostResult, AddZoneRequest, AddZoneResult, DeleteTxtRequest,
    HostnameResult, SetTxtRequest, SetTxtResult,
};
use crate::api::server::ServerAppState;
use crate::capability::{tokens_match, HostCapability};
use crate::error::Error;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub(super) fn new(state: ServerAppState) -> Router {
    Router::new()
        .route("/healthcheck", get(health_check))
        .route("/controller/:token/add_zone", post(add_zone))
        .route("/controller/:token/add_host", post(add_host))
        .route("/host/:token/get_hostname", get(get_hostname))
        .route("/host/:token/set_txt", post(set_txt))
        .route("/host/:token/delete_txt", post(delete_txt))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.api_timeout))
        .with_state(state)
}

#[allow(clippy::unused_async)]
pub(super) async fn health_check() -> impl IntoResponse {
    Json(json!({"ok":"healthy"}))
}

pub(super) fn check_controller_token(expected: &str, token: &str) -> Result<(), Error> {
    if !tokens_match(expected, token) {
        tracing::debug!("rejected controller call with unknown token");
        return Err(Error::UnknownCapability);
    }
    Ok(())
}

async fn add_zone(
    State(state): State<ServerAppState>,
    Path(token): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<AddZoneRequest>, APIError>,
) -> Result<Json<AddZoneResult>, APIError> {
    check_controller_token(&state.controller_token, &token)?;
    // Detached so a request timeout can't interrupt self-test cleanup.
    let controller = state.controller.clone();
    let outcome = tokio::spawn(async move {
        controller
            .lock()
            .await
            .add_zone(&payload.zone, &payload.server_name)
            .await
    })
    .await??;
    Ok(Json(AddZoneResult {
        status: outcome.to_string(),
    }))
}

async fn add_host(
    State(state): State<ServerAppState>,
    Path(token): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<AddHostRequest>, APIError>,
) -> Result<Json<AddHostResult>, APIError> {
    check_controller_token(&state.controller_token, &token)?;
    let reference = state.controller.lock().await.add_host(&payload.hostname).await?;
    Ok(Json(AddHostResult { reference }))
}

async fn get_hostname(
    State(state): State<ServerAppState>,
    Path(token): Path<String>,
) -> Result<Json<HostnameResult>, APIError> {
    let host = state.controller.lock().await.host_controller(&token)?;
    Ok(Json(HostnameResult {
        hostname: host.get_hostname().await?,
    }))
}

async fn set_txt(
    State(state): State<ServerAppState>,
    Path(token): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<SetTxtRequest>, APIError>,
) -> Result<Json<SetTxtResult>, APIError> {
    let host = state.controller.lock().await.host_controller(&token)?;
    host.set_txt(&payload.subdomain, &payload.txt).await?;
    Ok(Json(SetTxtResult { txt: payload.txt }))
}

async fn delete_txt(
    State(state): State<ServerAppState>,
    Path(token): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<DeleteTxtRequest>, APIError>,
) -> Result<impl IntoResponse, APIError> {
    let host = state.controller.lock().await.host_controller(&token)?;
    host.delete_txt(&payload.subdomain).await?;
    Ok(Json(json!({"ok":"deleted"})))
}
