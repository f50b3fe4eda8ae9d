use crate::api::{client_routes, routes};
use crate::client::{CertStore, ChallengeResponder, ClientController};
use crate::config::{SharedClientConfig, SharedServerConfig};
use crate::zone::SharedZoneController;
use axum::routing::IntoMakeService;
use axum::Router;
use hyper::server::conn::AddrIncoming;
use std::sync::Arc;

pub type HttpServer = axum::Server<AddrIncoming, IntoMakeService<Router>>;

#[derive(Clone)]
pub(super) struct ServerAppState {
    pub config: SharedServerConfig,
    pub controller_token: Arc<str>,
    pub controller: SharedZoneController,
}

#[derive(Clone)]
pub(super) struct ClientAppState {
    pub config: SharedClientConfig,
    pub controller_token: Arc<str>,
    pub controller: ClientController,
    pub responder: ChallengeResponder,
    pub certs: CertStore,
}

/// Bind the server API: the controller and every host capability.
///
/// # Errors
///
/// Returns an error if `config.api_bind_addr` can't be bound.
pub fn new_server(
    config: SharedServerConfig,
    controller_token: &str,
    controller: SharedZoneController,
) -> hyper::Result<HttpServer> {
    let addr = config.api_bind_addr;
    let app = routes::new(ServerAppState {
        config,
        controller_token: controller_token.into(),
        controller,
    });
    Ok(axum::Server::try_bind(&addr)?.serve(app.into_make_service()))
}

/// Bind the client API used by the operator and the issuance engine.
///
/// # Errors
///
/// Returns an error if `config.api_bind_addr` can't be bound.
pub fn new_client(
    config: SharedClientConfig,
    controller_token: &str,
    controller: ClientController,
    responder: ChallengeResponder,
    certs: CertStore,
) -> hyper::Result<HttpServer> {
    let addr = config.api_bind_addr;
    let app = client_routes::new(ClientAppState {
        config,
        controller_token: controller_token.into(),
        controller,
        responder,
        certs,
    });
    Ok(axum::Server::try_bind(&addr)?.serve(app.into_make_service()))
}
