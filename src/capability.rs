//! Capability tokens and the per-host controller they unlock.
//!
//! A capability token is an unguessable string minted when a host is added. Whoever holds it can
//! set and delete TXT records below that one hostname, and nothing else: a [`HostController`] is
//! bound to its hostname at construction and exposes no way to name another.

use crate::dns::router::SharedRouter;
use crate::error::Error;
use crate::names;
use crate::store::ServerState;
use base64::engine::general_purpose;
use base64::{alphabet, engine, Engine};
use lazy_static::lazy_static;
use rand::RngCore;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use trust_dns_server::client::rr::LowerName;

/// Random bytes per token: 256 bits.
const TOKEN_BYTES: usize = 32;

lazy_static! {
    pub(crate) static ref BASE64_ENGINE: engine::GeneralPurpose =
        engine::GeneralPurpose::new(&alphabet::URL_SAFE, general_purpose::NO_PAD);
}

/// Mint a new capability token from the thread-local CSPRNG.
#[must_use]
pub fn new_token() -> String {
    let mut raw = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut raw);
    BASE64_ENGINE.encode(raw)
}

/// Compare a presented token against a known one without an early exit on the first mismatch.
#[must_use]
pub fn tokens_match(known: &str, presented: &str) -> bool {
    #[allow(deprecated)]
    let matched =
        ring::constant_time::verify_slices_are_equal(known.as_bytes(), presented.as_bytes());
    matched.is_ok()
}

/// Read the token stored at `path`, minting and storing a new one if there is none yet.
///
/// # Errors
///
/// Returns [`Error::IO`] if the token file can't be read or written.
pub async fn load_or_create_token(path: &Path) -> Result<String, Error> {
    match fs::read_to_string(path).await {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Ok(_) => create_token(path).await,
        Err(err) if err.kind() == ErrorKind::NotFound => create_token(path).await,
        Err(err) => Err(Error::IO(err)),
    }
}

async fn create_token(path: &Path) -> Result<String, Error> {
    let token = new_token();
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, format!("{token}\n")).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
    }
    fs::rename(&tmp, path).await?;
    tracing::info!("created controller token at {}", path.display());
    Ok(token)
}

/// The operations a capability holder may perform on its one host.
///
/// Implemented in-process by [`HostController`] and remotely by
/// [`HttpRemoteHost`][crate::rpc::HttpRemoteHost].
#[async_trait::async_trait]
pub trait HostCapability: Send + Sync {
    /// The hostname this capability governs.
    async fn get_hostname(&self) -> Result<String, Error>;

    /// Serve exactly one TXT record `value` at `<subdomain>.<hostname>`.
    async fn set_txt(&self, subdomain: &str, value: &str) -> Result<(), Error>;

    /// Stop serving `<subdomain>.<hostname>`. Deleting an absent record succeeds.
    async fn delete_txt(&self, subdomain: &str) -> Result<(), Error>;
}

/// Server-side controller for a single host.
#[derive(Clone)]
pub struct HostController {
    hostname: String,
    router: SharedRouter,
}

impl HostController {
    fn record_name(&self, subdomain: &str) -> Result<LowerName, Error> {
        let subdomain = names::subdomain(subdomain)?;
        names::to_fqdn(&format!("{subdomain}.{}", self.hostname))
    }
}

#[async_trait::async_trait]
impl HostCapability for HostController {
    async fn get_hostname(&self) -> Result<String, Error> {
        Ok(self.hostname.clone())
    }

    async fn set_txt(&self, subdomain: &str, value: &str) -> Result<(), Error> {
        let fqdn = self.record_name(subdomain)?;
        let mut router = self.router.write().await;
        let authority = router
            .authority_for_mut(&fqdn)
            .ok_or_else(|| Error::UnknownZone(self.hostname.clone()))?;
        authority.set_txt(&fqdn, value)?;
        tracing::info!("set TXT for {fqdn}");
        Ok(())
    }

    async fn delete_txt(&self, subdomain: &str) -> Result<(), Error> {
        let fqdn = self.record_name(subdomain)?;
        let mut router = self.router.write().await;
        let authority = router
            .authority_for_mut(&fqdn)
            .ok_or_else(|| Error::UnknownZone(self.hostname.clone()))?;
        authority.delete_txt(&fqdn)?;
        tracing::info!("deleted TXT for {fqdn}");
        Ok(())
    }
}

/// Turns capability tokens into [`HostController`]s.
#[derive(Clone)]
pub struct CapabilityRegistry {
    router: SharedRouter,
}

impl CapabilityRegistry {
    #[must_use]
    pub fn new(router: SharedRouter) -> Self {
        Self { router }
    }

    /// Resolve `token` against the hosts recorded in `state`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCapability`] if no host was issued this token.
    pub fn resolve(&self, state: &ServerState, token: &str) -> Result<HostController, Error> {
        let hostname = state
            .host_for_token(token)
            .ok_or(Error::UnknownCapability)?;
        Ok(HostController {
            hostname: hostname.to_string(),
            router: self.router.clone(),
        })
    }
}
