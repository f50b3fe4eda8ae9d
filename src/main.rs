use anyhow::{anyhow, Result};
use lancrab::capability::load_or_create_token;
use lancrab::client::{
    CertStore, ChallengeResponder, ClientController, CommandIssuer, Issuer, LogIssuer,
};
use lancrab::dns::router::AuthorityRouter;
use lancrab::error::Error::DNSError;
use lancrab::resolver::SystemTxtResolver;
use lancrab::rpc::{HttpConnector, RemoteController};
use lancrab::store::{create_state_dir, ClientStore, ServerStore};
use lancrab::{ClientConfig, ServerConfig, ZoneController};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{Mutex, RwLock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let args: Vec<String> = std::env::args().collect();
    let program_name = args.first().map_or("lancrab", String::as_str);
    let rest: Vec<&str> = args.iter().skip(1).map(String::as_str).collect();

    match rest.as_slice() {
        ["server", config_file] => run_server(config_file).await,
        ["client", config_file] => run_client(config_file).await,
        ["add-zone", config_file, zone, server_name] => {
            add_zone(config_file, zone, server_name).await
        }
        ["add-host", config_file, hostname] => add_host(config_file, hostname).await,
        ["accept-invitation", config_file, code] => accept_invitation(config_file, code).await,
        _ => Err(anyhow!(
            "usage:\n  \
             {program_name} server /path/to/server.json\n  \
             {program_name} client /path/to/client.json\n  \
             {program_name} add-zone /path/to/server.json <zone> <server-hostname>\n  \
             {program_name} add-host /path/to/server.json <hostname>\n  \
             {program_name} accept-invitation /path/to/client.json <code>"
        )),
    }
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lancrab=info".into()),
        )
        .init();
}

fn server_config(config_file: &str) -> Result<Arc<ServerConfig>> {
    let config = ServerConfig::try_from_file(config_file)?;
    tracing::debug!("loaded config from {config_file}");
    Ok(Arc::new(config))
}

fn client_config(config_file: &str) -> Result<Arc<ClientConfig>> {
    let config = ClientConfig::try_from_file(config_file)?;
    tracing::debug!("loaded config from {config_file}");
    Ok(Arc::new(config))
}

async fn run_server(config_file: &str) -> Result<()> {
    let config = server_config(config_file)?;
    create_state_dir(&config.state_dir).await?;
    let store = ServerStore::load(config.state_path()).await?;
    let token = load_or_create_token(&config.controller_token_path()).await?;

    let router = AuthorityRouter::new(config.ns_admin()?).shared();
    let resolver = SystemTxtResolver::new(&config.self_test_nameservers, config.self_test_timeout)?;
    let controller = ZoneController::new(
        store,
        router.clone(),
        Arc::new(resolver),
        config.self_test_timeout,
        config.public_url(),
    )
    .await?;

    tracing::info!("DNS listening on UDP {}", &config.dns_udp_bind_addr);
    tracing::info!("DNS listening on TCP {}", &config.dns_tcp_bind_addr);
    let dns_server = lancrab::dns::new(config.clone(), router).await?;
    let dns_handle = tokio::spawn(dns_server.block_until_done());

    tracing::info!("API listening on {}", &config.api_bind_addr);
    let api_server =
        lancrab::api::new_server(config.clone(), &token, Arc::new(Mutex::new(controller)))?;
    let api_handle = tokio::spawn(api_server);

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
        },
        Ok(dns_res) = dns_handle => {
            if let Err(err) = dns_res {
                return Err(DNSError(err).into())
            }
        }
        Ok(api_res) = api_handle => {
            if let Err(err) = api_res {
                return Err(err.into())
            }
        }
    }
    tracing::info!("goodbye");
    Ok(())
}

async fn run_client(config_file: &str) -> Result<()> {
    let config = client_config(config_file)?;
    create_state_dir(&config.state_dir).await?;
    let store = Arc::new(RwLock::new(ClientStore::load(config.state_path()).await?));
    let token = load_or_create_token(&config.controller_token_path()).await?;

    let connector = Arc::new(HttpConnector::new(config.rpc_timeout)?);
    let issuer: Arc<dyn Issuer> = match config.issue_command.clone().and_then(CommandIssuer::new)
    {
        Some(issuer) => Arc::new(issuer),
        None => Arc::new(LogIssuer),
    };
    let controller = ClientController::new(store.clone(), connector.clone(), issuer);
    let responder = ChallengeResponder::new(store.clone(), connector);
    let certs = CertStore::new(store, config.cert_dir());

    tracing::info!("API listening on {}", &config.api_bind_addr);
    let api_server =
        lancrab::api::new_client(config.clone(), &token, controller, responder, certs)?;
    let api_handle = tokio::spawn(api_server);

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
        },
        Ok(api_res) = api_handle => {
            if let Err(err) = api_res {
                return Err(err.into())
            }
        }
    }
    tracing::info!("goodbye");
    Ok(())
}

async fn server_controller(config: &ServerConfig) -> Result<RemoteController> {
    let token = load_or_create_token(&config.controller_token_path()).await?;
    let url = format!("{}/controller/{token}", config.public_url());
    Ok(RemoteController::new(&url, config.api_timeout)?)
}

async fn add_zone(config_file: &str, zone: &str, server_name: &str) -> Result<()> {
    let config = server_config(config_file)?;
    let status = server_controller(&config)
        .await?
        .add_zone(zone, server_name)
        .await?;
    println!("zone {zone}: {status}");
    Ok(())
}

async fn add_host(config_file: &str, hostname: &str) -> Result<()> {
    let config = server_config(config_file)?;
    let reference = server_controller(&config)
        .await?
        .add_host(hostname)
        .await?;
    println!("host {hostname} added. On the client, run:");
    println!("  lancrab accept-invitation /path/to/client.json {reference}");
    Ok(())
}

async fn accept_invitation(config_file: &str, code: &str) -> Result<()> {
    let config = client_config(config_file)?;
    let token = load_or_create_token(&config.controller_token_path()).await?;
    let url = format!("{}/controller/{token}", config.api_url());
    let hostname = RemoteController::new(&url, config.api_timeout)?
        .accept_add_host(code.trim())
        .await?;
    println!("now managing certificates for {hostname}");
    println!(
        "an executable {}/{hostname}/post-update-hook runs after each renewal",
        config.cert_dir().display()
    );
    Ok(())
}
