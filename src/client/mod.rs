//! The LAN-side role.
//!
//! A client daemon holds one capability reference per host it manages. References arrive
//! through [`ClientController::accept_add_host`], usually pasted by an operator as an
//! invitation code minted by the server's `add-host`. The issuance engine then drives the
//! [`ChallengeResponder`] and the [`CertStore`] through the client API.

use crate::error::Error;
use crate::names;
use crate::rpc::Connector;
use crate::store::ClientStore;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod cert_store;
pub mod issuer;
pub mod responder;

pub use cert_store::{CertBundle, CertStore};
pub use issuer::{CommandIssuer, Issuer, LogIssuer};
pub use responder::{ChallengeResponder, Dns01Challenge};

pub type SharedClientStore = Arc<RwLock<ClientStore>>;

/// The client's controller object.
#[derive(Clone)]
pub struct ClientController {
    store: SharedClientStore,
    connector: Arc<dyn Connector>,
    issuer: Arc<dyn Issuer>,
}

impl ClientController {
    #[must_use]
    pub fn new(
        store: SharedClientStore,
        connector: Arc<dyn Connector>,
        issuer: Arc<dyn Issuer>,
    ) -> Self {
        Self {
            store,
            connector,
            issuer,
        }
    }

    /// Start managing the host behind `reference` and kick off issuance for it.
    ///
    /// Accepting a new reference for a hostname already managed replaces the old one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the reference can't be reached, [`Error::InvalidName`] if
    /// the server reports a malformed hostname, and [`Error::IO`] if the client state can't be
    /// saved. Nothing is recorded in any of those cases.
    pub async fn accept_add_host(&self, reference: &str) -> Result<String, Error> {
        let remote = self.connector.connect(reference).await?;
        let hostname = names::normalize(&remote.get_hostname().await?)?;

        {
            let mut store = self.store.write().await;
            let previous = store
                .state_mut()
                .hosts
                .insert(hostname.clone(), reference.to_string());
            if let Err(err) = store.save().await {
                let hosts = &mut store.state_mut().hosts;
                match previous {
                    Some(previous) => hosts.insert(hostname, previous),
                    None => hosts.remove(&hostname),
                };
                return Err(err);
            }
        }
        tracing::info!("accepted host {hostname}");

        self.issuer.issue(&hostname).await;
        Ok(hostname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::HostCapability;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedHost(String);

    #[async_trait]
    impl HostCapability for FixedHost {
        async fn get_hostname(&self) -> Result<String, Error> {
            Ok(self.0.clone())
        }

        async fn set_txt(&self, _: &str, _: &str) -> Result<(), Error> {
            Ok(())
        }

        async fn delete_txt(&self, _: &str) -> Result<(), Error> {
            Ok(())
        }
    }

    /// References are `ref:<hostname>`.
    struct FixedConnector;

    #[async_trait]
    impl Connector for FixedConnector {
        async fn connect(&self, reference: &str) -> Result<Box<dyn HostCapability>, Error> {
            let hostname = reference
                .strip_prefix("ref:")
                .ok_or_else(|| Error::Transport("unreachable".into()))?;
            Ok(Box::new(FixedHost(hostname.to_string())))
        }
    }

    #[derive(Default)]
    struct RecordingIssuer(Mutex<Vec<String>>);

    #[async_trait]
    impl Issuer for RecordingIssuer {
        async fn issue(&self, hostname: &str) {
            self.0.lock().unwrap().push(hostname.to_string());
        }
    }

    async fn controller(
        dir: &std::path::Path,
    ) -> (ClientController, SharedClientStore, Arc<RecordingIssuer>) {
        let store = Arc::new(RwLock::new(
            ClientStore::load(dir.join("config.json")).await.unwrap(),
        ));
        let issuer = Arc::new(RecordingIssuer::default());
        let controller =
            ClientController::new(store.clone(), Arc::new(FixedConnector), issuer.clone());
        (controller, store, issuer)
    }

    #[tokio::test]
    async fn accepted_host_is_persisted_and_issued() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, store, issuer) = controller(dir.path()).await;

        let hostname = controller
            .accept_add_host("ref:Printer.Lab.Example.org")
            .await
            .unwrap();
        assert_eq!(hostname, "printer.lab.example.org");
        assert_eq!(
            store.read().await.state().reference("printer.lab.example.org"),
            Some("ref:Printer.Lab.Example.org")
        );
        assert_eq!(*issuer.0.lock().unwrap(), vec![hostname.clone()]);

        let reloaded = ClientStore::load(dir.path().join("config.json"))
            .await
            .unwrap();
        assert_eq!(
            reloaded.state().reference(&hostname),
            Some("ref:Printer.Lab.Example.org")
        );
    }

    #[tokio::test]
    async fn failures_record_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, store, issuer) = controller(dir.path()).await;

        assert!(matches!(
            controller.accept_add_host("elsewhere").await,
            Err(Error::Transport(_))
        ));
        assert!(matches!(
            controller.accept_add_host("ref:bad..name").await,
            Err(Error::InvalidName { .. })
        ));
        assert!(store.read().await.state().hosts.is_empty());
        assert!(issuer.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_save_restores_the_previous_reference() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, store, issuer) = controller(dir.path()).await;
        controller
            .accept_add_host("ref:printer.lab.example.org")
            .await
            .unwrap();
        std::fs::create_dir(dir.path().join("config.json.tmp")).unwrap();

        assert!(matches!(
            controller.accept_add_host("ref:PRINTER.lab.example.org").await,
            Err(Error::IO(_))
        ));
        assert!(matches!(
            controller.accept_add_host("ref:scanner.lab.example.org").await,
            Err(Error::IO(_))
        ));

        let expected = Some("ref:printer.lab.example.org");
        assert_eq!(
            store.read().await.state().reference("printer.lab.example.org"),
            expected
        );
        assert_eq!(store.read().await.state().hosts.len(), 1);
        let reloaded = ClientStore::load(dir.path().join("config.json"))
            .await
            .unwrap();
        assert_eq!(reloaded.state().reference("printer.lab.example.org"), expected);
        assert_eq!(reloaded.state().hosts.len(), 1);
        assert_eq!(issuer.0.lock().unwrap().len(), 1);
    }
}
