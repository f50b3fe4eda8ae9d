//! Persisted control-plane state.
//!
//! Each role keeps one JSON document on disk, wrapped in a [`JsonStore`]. The in-memory copy is
//! the single source of truth; every mutation must be followed by a successful
//! [`JsonStore::save`] before it is reported to a caller. Saves write a temporary sibling file
//! and rename it over the previous state, so a crash mid-write leaves the old state intact.
//!
//! * [`server::ServerState`] holds zones and their hosts' capability tokens.
//! * [`client::ClientState`] holds the capability references of the hosts a client manages.

use crate::error::Error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub mod client;
pub mod server;

pub use client::{ClientState, ClientStore};
pub use server::{ServerState, ServerStore};

/// Create `dir` if needed and restrict it to its owner.
///
/// # Errors
///
/// Returns [`Error::IO`] if the directory can't be created or its permissions can't be set.
pub async fn create_state_dir(dir: &Path) -> Result<(), Error> {
    fs::create_dir_all(dir).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)).await?;
    }
    Ok(())
}

/// A JSON document of type `T` mirrored at a path on disk.
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    state: T,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Load the state at the given path. A missing file is initialized with an empty state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJSON`] if the state file is invalid.
    ///
    /// Returns [`Error::IO`] if the path can't be read, or the empty state can't be written.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        match fs::read(&path).await {
            Ok(contents) => {
                let state = serde_json::from_slice(&contents)?;
                Ok(Self { path, state })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("initializing empty state at {}", path.display());
                let store = Self {
                    path,
                    state: T::default(),
                };
                store.save().await?;
                Ok(store)
            }
            Err(err) => Err(Error::IO(err)),
        }
    }

    /// Durably replace the on-disk state with the in-memory state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJSON`] if the state can't be serialized.
    ///
    /// Returns [`Error::IO`] if the temporary file can't be written, synced or renamed. The
    /// previously saved state is left untouched in that case.
    ///
    /// The state holds capability tokens, so the file is only readable by its owner.
    pub async fn save(&self) -> Result<(), Error> {
        let mut data = serde_json::to_vec_pretty(&self.state)?;
        data.push(b'\n');
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        f.write_all(&data).await?;
        f.sync_all().await?;
        drop(f);
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> &T {
        &self.state
    }

    /// Mutable access to the in-memory state. Callers must [`save`][Self::save] afterwards.
    pub fn state_mut(&mut self) -> &mut T {
        &mut self.state
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
