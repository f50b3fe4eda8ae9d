//! Publishes `dns-01` challenge responses through host capabilities.

use crate::capability::{HostCapability, BASE64_ENGINE};
use crate::client::SharedClientStore;
use crate::error::Error;
use crate::rpc::Connector;
use base64::Engine;
use ring::digest::{digest, SHA256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The label a `dns-01` response is published under, below the hostname being validated.
pub const DNS01_SUBDOMAIN: &str = "_acme-challenge";

/// A pending `dns-01` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dns01Challenge {
    pub key_authorization: String,
    pub subdomain: String,
}

impl Dns01Challenge {
    #[must_use]
    pub fn new(key_authorization: impl Into<String>) -> Self {
        Self {
            key_authorization: key_authorization.into(),
            subdomain: DNS01_SUBDOMAIN.to_string(),
        }
    }

    /// The TXT value proving control: base64url (unpadded) of the key authorization's SHA-256.
    #[must_use]
    pub fn validation(&self) -> String {
        BASE64_ENGINE.encode(digest(&SHA256, self.key_authorization.as_bytes()))
    }
}

/// Answers challenges for the hosts recorded in client state.
///
/// Start and stop for one host are serialized, so a stop never overtakes the start it follows.
#[derive(Clone)]
pub struct ChallengeResponder {
    store: SharedClientStore,
    connector: Arc<dyn Connector>,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ChallengeResponder {
    #[must_use]
    pub fn new(store: SharedClientStore, connector: Arc<dyn Connector>) -> Self {
        Self {
            store,
            connector,
            locks: Arc::default(),
        }
    }

    /// Publish the response to `challenge` for `hostname`. Returns once the server acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHost`] if the hostname was never paired, and whatever the
    /// capability call fails with otherwise, typically [`Error::Transport`].
    pub async fn start_responding(
        &self,
        hostname: &str,
        challenge: &Dns01Challenge,
    ) -> Result<(), Error> {
        let lock = self.host_lock(hostname).await;
        let _guard = lock.lock().await;
        let remote = self.remote_for(hostname).await?;
        remote
            .set_txt(&challenge.subdomain, &challenge.validation())
            .await?;
        tracing::info!("responding to challenge for {hostname}");
        Ok(())
    }

    /// Withdraw the response to `challenge` for `hostname`, whether or not validation passed.
    ///
    /// # Errors
    ///
    /// As for [`ChallengeResponder::start_responding`].
    pub async fn stop_responding(
        &self,
        hostname: &str,
        challenge: &Dns01Challenge,
    ) -> Result<(), Error> {
        let lock = self.host_lock(hostname).await;
        let _guard = lock.lock().await;
        let remote = self.remote_for(hostname).await?;
        remote.delete_txt(&challenge.subdomain).await?;
        tracing::info!("stopped responding to challenge for {hostname}");
        Ok(())
    }

    async fn host_lock(&self, hostname: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(hostname.to_string())
            .or_default()
            .clone()
    }

    async fn remote_for(&self, hostname: &str) -> Result<Box<dyn HostCapability>, Error> {
        let reference = self
            .store
            .read()
            .await
            .state()
            .reference(hostname)
            .map(str::to_string)
            .ok_or_else(|| Error::UnknownHost(hostname.to_string()))?;
        self.connector.connect(&reference).await
    }
}
