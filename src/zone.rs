//! Zone onboarding and host registration.
//!
//! Adding a zone moves it from absent to provisional (in memory, routable) and then either to
//! confirmed (self-test passed, state saved) or back to absent (self-test or save failed). A
//! provisional zone is never persisted, and a rolled-back zone is no longer routable.
//!
//! The self-test publishes a random sentinel at `_lancrab-selftest.<zone>` and resolves it
//! through public DNS. Only an NS delegation that actually reaches this server can return it.

use crate::capability::{self, CapabilityRegistry, HostController};
use crate::dns::router::SharedRouter;
use crate::error::Error;
use crate::names;
use crate::resolver::TxtResolver;
use crate::store::server::Zone;
use crate::store::{ServerState, ServerStore};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use trust_dns_server::client::rr::LowerName;

/// Label of the self-test record below a zone's apex.
pub const SELF_TEST_LABEL: &str = "_lancrab-selftest";

/// Controller RPCs run one at a time, each including its save.
pub type SharedZoneController = Arc<Mutex<ZoneController>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddZoneOutcome {
    Added,
    AlreadyPresent,
}

impl fmt::Display for AddZoneOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddZoneOutcome::Added => f.write_str("added"),
            AddZoneOutcome::AlreadyPresent => f.write_str("already present"),
        }
    }
}

pub struct ZoneController {
    store: ServerStore,
    router: SharedRouter,
    registry: CapabilityRegistry,
    resolver: Arc<dyn TxtResolver>,
    self_test_timeout: Duration,
    public_url: String,
}

impl ZoneController {
    /// Create a controller over a loaded store, and route every stored zone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DNSError`] if a stored zone can't be turned into an authority.
    pub async fn new(
        store: ServerStore,
        router: SharedRouter,
        resolver: Arc<dyn TxtResolver>,
        self_test_timeout: Duration,
        public_url: impl Into<String>,
    ) -> Result<Self, Error> {
        router.write().await.sync(store.state())?;
        Ok(Self {
            registry: CapabilityRegistry::new(router.clone()),
            store,
            router,
            resolver,
            self_test_timeout,
            public_url: public_url.into(),
        })
    }

    #[must_use]
    pub fn state(&self) -> &ServerState {
        self.store.state()
    }

    /// The opaque reference handed out for a host token.
    #[must_use]
    pub fn reference_for(&self, token: &str) -> String {
        format!("{}/host/{token}", self.public_url.trim_end_matches('/'))
    }

    /// Resolve a capability token to its host's controller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCapability`] for tokens that weren't issued here.
    pub fn host_controller(&self, token: &str) -> Result<HostController, Error> {
        self.registry.resolve(self.store.state(), token)
    }

    /// Start serving `zone`, with `server_name` as its NS, once the self-test proves that the
    /// zone's delegation reaches this server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] for malformed names, before any state changes.
    ///
    /// Returns [`Error::DelegationTest`] if the self-test fails, and [`Error::IO`] or
    /// [`Error::InvalidJSON`] if the state can't be saved. In both cases the zone is rolled back.
    pub async fn add_zone(
        &mut self,
        zone: &str,
        server_name: &str,
    ) -> Result<AddZoneOutcome, Error> {
        let zone = names::zone(zone)?;
        let server_name = names::normalize(server_name)?;
        if self.store.state().zones.contains_key(&zone) {
            tracing::info!("zone {zone} already present");
            return Ok(AddZoneOutcome::AlreadyPresent);
        }

        tracing::info!("testing new zone {zone}");
        self.store
            .state_mut()
            .zones
            .insert(zone.clone(), Zone::new(server_name));
        let sync = self.router.write().await.sync(self.store.state());
        if let Err(err) = sync {
            self.store.state_mut().zones.remove(&zone);
            return Err(err);
        }

        let confirmed = match self.self_test(&zone).await {
            Ok(()) => self.store.save().await,
            Err(err) => Err(err),
        };
        if let Err(err) = confirmed {
            tracing::warn!("rolling back zone {zone}: {err}");
            self.rollback(&zone).await;
            return Err(err);
        }
        tracing::info!("added zone {zone}");
        Ok(AddZoneOutcome::Added)
    }

    /// Register `hostname` under the longest confirmed zone containing it, returning the opaque
    /// reference that controls it. Adding a host again mints an additional token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] for malformed names, [`Error::UnknownZone`] if no zone
    /// contains the hostname, and [`Error::IO`] or [`Error::InvalidJSON`] if the state can't be
    /// saved (the host is then not added).
    pub async fn add_host(&mut self, hostname: &str) -> Result<String, Error> {
        let hostname = names::normalize(hostname)?;
        let zone = names::owning_zone(&hostname, self.store.state().zone_names())
            .ok_or_else(|| Error::UnknownZone(hostname.clone()))?
            .to_string();
        if self.store.state().has_host(&hostname) {
            tracing::info!("issuing an additional capability for {hostname}");
        }

        let token = capability::new_token();
        let hosts = &mut self
            .store
            .state_mut()
            .zones
            .get_mut(&zone)
            .ok_or_else(|| Error::UnknownZone(hostname.clone()))?
            .hosts;
        hosts.push((hostname.clone(), token.clone()));
        if let Err(err) = self.store.save().await {
            if let Some(zone) = self.store.state_mut().zones.get_mut(&zone) {
                zone.hosts.pop();
            }
            return Err(err);
        }
        tracing::info!("added host {hostname} to zone {zone}");
        Ok(self.reference_for(&token))
    }

    async fn self_test(&self, zone: &str) -> Result<(), Error> {
        let fqdn = names::to_fqdn(&format!("{SELF_TEST_LABEL}.{zone}"))?;
        let sentinel = capability::new_token();
        self.set_test_record(&fqdn, Some(&sentinel)).await?;

        let answer = tokio::time::timeout(
            self.self_test_timeout,
            self.resolver.lookup_txt(&fqdn.to_string()),
        )
        .await;

        if let Err(err) = self.set_test_record(&fqdn, None).await {
            tracing::warn!("failed to remove self-test record {fqdn}: {err}");
        }

        let failed = |reason: String| Error::DelegationTest {
            zone: zone.to_string(),
            reason,
        };
        match answer {
            Err(_) => Err(failed("lookup timed out".to_string())),
            Ok(Err(failure)) => Err(failed(failure.to_string())),
            Ok(Ok(values)) if values.iter().any(|v| *v == sentinel) => {
                tracing::info!("self-test of zone {zone} succeeded");
                Ok(())
            }
            Ok(Ok(values)) => Err(failed(format!("unexpected TXT answer {values:?}"))),
        }
    }

    async fn set_test_record(&self, fqdn: &LowerName, value: Option<&str>) -> Result<(), Error> {
        let mut router = self.router.write().await;
        let authority = router
            .authority_for_mut(fqdn)
            .ok_or_else(|| Error::UnknownZone(fqdn.to_string()))?;
        match value {
            Some(value) => authority.set_txt(fqdn, value),
            None => authority.delete_txt(fqdn),
        }
    }

    async fn rollback(&mut self, zone: &str) {
        self.store.state_mut().zones.remove(zone);
        if let Err(err) = self.router.write().await.sync(self.store.state()) {
            tracing::error!("failed to drop zone {zone} from the router: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::HostCapability;
    use crate::dns::router::AuthorityRouter;
    use crate::names::to_fqdn;
    use crate::resolver::LookupFailure;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Answers from the router itself, as a working delegation would.
    struct DelegatedResolver {
        router: SharedRouter,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TxtResolver for DelegatedResolver {
        async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = to_fqdn(name).map_err(|e| LookupFailure::Other(e.to_string()))?;
            match self.router.read().await.txt_values(&name) {
                Some(values) if !values.is_empty() => Ok(values),
                _ => Err(LookupFailure::NoRecords),
            }
        }
    }

    enum Broken {
        NoRecords,
        WrongValue,
        Hangs,
        Fails,
    }

    #[async_trait::async_trait]
    impl TxtResolver for Broken {
        async fn lookup_txt(&self, _name: &str) -> Result<Vec<String>, LookupFailure> {
            match self {
                Broken::NoRecords => Err(LookupFailure::NoRecords),
                Broken::WrongValue => Ok(vec!["parked-domain".to_string()]),
                Broken::Hangs => std::future::pending().await,
                Broken::Fails => Err(LookupFailure::Other("connection refused".to_string())),
            }
        }
    }

    async fn controller(
        dir: &TempDir,
        router: &SharedRouter,
        resolver: Arc<dyn TxtResolver>,
    ) -> ZoneController {
        let store = ServerStore::load(dir.path().join("config.json"))
            .await
            .unwrap();
        ZoneController::new(
            store,
            router.clone(),
            resolver,
            Duration::from_millis(200),
            "https://ns.example.org:6318/",
        )
        .await
        .unwrap()
    }

    fn delegated(router: &SharedRouter) -> Arc<DelegatedResolver> {
        Arc::new(DelegatedResolver {
            router: router.clone(),
            calls: AtomicUsize::new(0),
        })
    }

    /// A directory squatting on the temporary state path makes every save fail.
    fn break_saves(dir: &TempDir) -> PathBuf {
        let tmp = dir.path().join("config.json.tmp");
        std::fs::create_dir(&tmp).unwrap();
        tmp
    }

    async fn on_disk(dir: &TempDir) -> ServerState {
        ServerStore::load(dir.path().join("config.json"))
            .await
            .unwrap()
            .state()
            .clone()
    }

    #[tokio::test]
    async fn add_zone_confirms_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let router = AuthorityRouter::new(None).shared();
        let resolver = delegated(&router);
        let mut zc = controller(&dir, &router, resolver.clone()).await;

        let outcome = zc.add_zone("lab.example.org", "ns.example.org").await.unwrap();
        assert_eq!(outcome, AddZoneOutcome::Added);
        assert_eq!(outcome.to_string(), "added");
        assert!(on_disk(&dir).await.zones.contains_key("lab.example.org"));

        let test_name = to_fqdn("_lancrab-selftest.lab.example.org").unwrap();
        assert_eq!(router.read().await.txt_values(&test_name), Some(vec![]));

        let again = zc.add_zone("Lab.Example.org.", "ns.example.org").await.unwrap();
        assert_eq!(again, AddZoneOutcome::AlreadyPresent);
        assert_eq!(again.to_string(), "already present");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_self_test_rolls_back() {
        for broken in [
            Broken::NoRecords,
            Broken::WrongValue,
            Broken::Hangs,
            Broken::Fails,
        ] {
            let dir = tempfile::tempdir().unwrap();
            let router = AuthorityRouter::new(None).shared();
            let mut zc = controller(&dir, &router, Arc::new(broken)).await;

            let err = zc
                .add_zone("lab.example.org", "ns.example.org")
                .await
                .unwrap_err();
            assert!(matches!(err, Error::DelegationTest { .. }), "{err:?}");
            assert!(zc.state().zones.is_empty());
            assert!(on_disk(&dir).await.zones.is_empty());
            assert_eq!(router.read().await.zones().count(), 0);
            let test_name = to_fqdn("_lancrab-selftest.lab.example.org").unwrap();
            assert_eq!(router.read().await.txt_values(&test_name), None);
        }
    }

    #[tokio::test]
    async fn failed_save_after_self_test_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let router = AuthorityRouter::new(None).shared();
        let resolver = delegated(&router);
        let mut zc = controller(&dir, &router, resolver.clone()).await;
        break_saves(&dir);

        let err = zc
            .add_zone("lab.example.org", "ns.example.org")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IO(_)), "{err:?}");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert!(zc.state().zones.is_empty());
        assert_eq!(router.read().await.zones().count(), 0);
        let test_name = to_fqdn("_lancrab-selftest.lab.example.org").unwrap();
        assert_eq!(router.read().await.txt_values(&test_name), None);
        assert!(on_disk(&dir).await.zones.is_empty());
    }

    #[tokio::test]
    async fn failed_self_test_keeps_other_zones() {
        let dir = tempfile::tempdir().unwrap();
        let router = AuthorityRouter::new(None).shared();
        let mut zc = controller(&dir, &router, delegated(&router)).await;
        zc.add_zone("one.example.org", "ns.example.org").await.unwrap();

        zc.resolver = Arc::new(Broken::NoRecords);
        assert!(zc.add_zone("two.example.org", "ns.example.org").await.is_err());
        assert_eq!(router.read().await.zones().count(), 1);
        assert_eq!(
            on_disk(&dir).await.zones.keys().collect::<Vec<_>>(),
            vec!["one.example.org"]
        );
    }

    #[tokio::test]
    async fn invalid_names_are_rejected_before_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let router = AuthorityRouter::new(None).shared();
        let resolver = delegated(&router);
        let mut zc = controller(&dir, &router, resolver.clone()).await;

        assert!(matches!(
            zc.add_zone("bad_zone..example.org", "ns.example.org").await,
            Err(Error::InvalidName { .. })
        ));
        assert!(matches!(
            zc.add_zone("org", "ns.example.org").await,
            Err(Error::InvalidName { .. })
        ));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert!(zc.state().zones.is_empty());
    }

    #[tokio::test]
    async fn add_host_mints_a_scoped_reference() {
        let dir = tempfile::tempdir().unwrap();
        let router = AuthorityRouter::new(None).shared();
        let mut zc = controller(&dir, &router, delegated(&router)).await;
        zc.add_zone("lab.example.org", "ns.example.org").await.unwrap();

        let reference = zc.add_host("printer.lab.example.org").await.unwrap();
        let token = reference
            .strip_prefix("https://ns.example.org:6318/host/")
            .unwrap();
        let host = zc.host_controller(token).unwrap();
        assert_eq!(host.get_hostname().await.unwrap(), "printer.lab.example.org");

        let persisted = on_disk(&dir).await;
        assert_eq!(
            persisted.zones["lab.example.org"].hosts,
            vec![("printer.lab.example.org".to_string(), token.to_string())]
        );
    }

    #[tokio::test]
    async fn failed_save_drops_the_new_host() {
        let dir = tempfile::tempdir().unwrap();
        let router = AuthorityRouter::new(None).shared();
        let mut zc = controller(&dir, &router, delegated(&router)).await;
        zc.add_zone("lab.example.org", "ns.example.org").await.unwrap();
        let squatter = break_saves(&dir);

        assert!(matches!(
            zc.add_host("printer.lab.example.org").await,
            Err(Error::IO(_))
        ));
        assert!(!zc.state().has_host("printer.lab.example.org"));
        assert!(on_disk(&dir).await.zones["lab.example.org"].hosts.is_empty());

        std::fs::remove_dir(squatter).unwrap();
        zc.add_host("printer.lab.example.org").await.unwrap();
        assert_eq!(on_disk(&dir).await.zones["lab.example.org"].hosts.len(), 1);
    }

    #[tokio::test]
    async fn add_host_needs_a_known_zone() {
        let dir = tempfile::tempdir().unwrap();
        let router = AuthorityRouter::new(None).shared();
        let mut zc = controller(&dir, &router, delegated(&router)).await;
        zc.add_zone("example.com", "ns.example.org").await.unwrap();

        assert!(matches!(
            zc.add_host("printer.evilexample.com").await,
            Err(Error::UnknownZone(_))
        ));
        assert!(matches!(
            zc.add_host("example.com").await,
            Err(Error::UnknownZone(_))
        ));
        assert!(on_disk(&dir).await.zones["example.com"].hosts.is_empty());
    }

    #[tokio::test]
    async fn stored_zones_are_routed_on_startup() {
        let dir = tempfile::tempdir().unwrap();
        let router = AuthorityRouter::new(None).shared();
        let mut zc = controller(&dir, &router, delegated(&router)).await;
        zc.add_zone("lab.example.org", "ns.example.org").await.unwrap();
        drop(zc);

        let fresh = AuthorityRouter::new(None).shared();
        let _zc = controller(&dir, &fresh, delegated(&fresh)).await;
        assert_eq!(fresh.read().await.zones().count(), 1);
    }
}
