//! Certificate artifacts for the hosts a client manages.
//!
//! Each host gets a directory `<cert_dir>/<hostname>/` holding:
//! - `privkey.pem`: the private key (0600 on Unix)
//! - `cert.pem`: the leaf certificate
//! - `chain.pem`: the intermediate chain
//! - `fullchain.pem`: `cert.pem` followed by `chain.pem`
//!
//! After a new bundle is stored, an executable `post-update-hook` in the same directory is run
//! with the hostname as its only argument.

use crate::client::SharedClientStore;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const PRIVKEY_FILE: &str = "privkey.pem";
const CERT_FILE: &str = "cert.pem";
const CHAIN_FILE: &str = "chain.pem";
const FULLCHAIN_FILE: &str = "fullchain.pem";
pub const POST_UPDATE_HOOK: &str = "post-update-hook";

/// A private key with its certificate chain, all PEM encoded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CertBundle {
    pub private_key: String,
    pub certificate: String,
    pub chain: String,
}

impl CertBundle {
    #[must_use]
    pub fn full_chain(&self) -> String {
        format!("{}{}", self.certificate, self.chain)
    }
}

#[derive(Clone)]
pub struct CertStore {
    store: SharedClientStore,
    cert_dir: PathBuf,
}

impl CertStore {
    #[must_use]
    pub fn new(store: SharedClientStore, cert_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            cert_dir: cert_dir.into(),
        }
    }

    /// The directory holding the artifacts of `hostname`.
    #[must_use]
    pub fn host_dir(&self, hostname: &str) -> PathBuf {
        self.cert_dir.join(hostname)
    }

    /// The stored bundle for `hostname`, or `None` if nothing was stored yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHost`] if the hostname was never accepted by this client, and
    /// [`Error::IO`] if the artifacts can't be read.
    pub async fn get(&self, hostname: &str) -> Result<Option<CertBundle>, Error> {
        self.check_known(hostname).await?;
        let dir = self.host_dir(hostname);
        let Some(certificate) = read_optional(&dir.join(CERT_FILE)).await? else {
            return Ok(None);
        };
        Ok(Some(CertBundle {
            private_key: fs::read_to_string(dir.join(PRIVKEY_FILE)).await?,
            certificate,
            chain: read_optional(&dir.join(CHAIN_FILE)).await?.unwrap_or_default(),
        }))
    }

    /// Persist `bundle` as the artifacts of `hostname`, then run its post-update hook.
    ///
    /// Hook failures are logged and never fail the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHost`] if the hostname was never accepted by this client, and
    /// [`Error::IO`] if an artifact can't be written.
    pub async fn store(&self, hostname: &str, bundle: &CertBundle) -> Result<(), Error> {
        self.check_known(hostname).await?;
        let dir = self.host_dir(hostname);
        fs::create_dir_all(&dir).await?;

        // The key goes first so a reader never sees a new cert next to an old key for long.
        write_atomic(&dir.join(PRIVKEY_FILE), &bundle.private_key, Some(0o600)).await?;
        write_atomic(&dir.join(CERT_FILE), &bundle.certificate, None).await?;
        write_atomic(&dir.join(CHAIN_FILE), &bundle.chain, None).await?;
        write_atomic(&dir.join(FULLCHAIN_FILE), &bundle.full_chain(), None).await?;
        tracing::info!("stored certificate for {hostname} in {}", dir.display());

        run_hook(&dir.join(POST_UPDATE_HOOK), hostname).await;
        Ok(())
    }

    async fn check_known(&self, hostname: &str) -> Result<(), Error> {
        if self.store.read().await.state().reference(hostname).is_none() {
            return Err(Error::UnknownHost(hostname.to_string()));
        }
        Ok(())
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, Error> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::IO(err)),
    }
}

async fn write_atomic(path: &Path, contents: &str, mode: Option<u32>) -> Result<(), Error> {
    let tmp = path.with_extension("pem.tmp");
    let mut file = fs::File::create(&tmp).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = mode {
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(mode)).await?;
        }
    }
    #[cfg(not(unix))]
    let _ = mode;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn is_executable(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path).await else {
        return false;
    };
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.is_file() && meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        meta.is_file()
    }
}

/// Start `hook` if it exists and is executable. Its exit status is only logged.
async fn run_hook(hook: &Path, hostname: &str) {
    if !is_executable(hook).await {
        tracing::debug!("no executable post-update hook at {}", hook.display());
        return;
    }
    let mut command = Command::new(hook);
    command.arg(hostname);
    if let Some(dir) = hook.parent() {
        command.current_dir(dir);
    }
    match command.spawn() {
        Err(err) => tracing::warn!("failed to start {}: {err}", hook.display()),
        Ok(mut child) => {
            let hook = hook.display().to_string();
            let hostname = hostname.to_string();
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) if status.success() => {
                        tracing::info!("post-update hook for {hostname} finished");
                    }
                    Ok(status) => tracing::warn!("{hook} exited with {status}"),
                    Err(err) => tracing::warn!("waiting for {hook} failed: {err}"),
                }
            });
        }
    }
}
