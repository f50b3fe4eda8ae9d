use crate::dns::authority::{DynamicAuthority, Lookup};
use crate::error::Error;
use crate::names;
use crate::store::ServerState;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use trust_dns_proto::rr::DNSClass;
use trust_dns_server::client::rr::{LowerName, Name, Record, RecordType};

/// `SharedRouter` is shared between the DNS request handler (readers) and the control plane
/// (writers).
pub type SharedRouter = Arc<RwLock<AuthorityRouter>>;

/// The result of routing a query to an authority.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// No zone served here contains the name.
    Refused,
    /// The owning zone's answer, with its SOA for negative responses.
    Authoritative { lookup: Lookup, soa: Record },
}

/// Routes names to the [`DynamicAuthority`] of the longest zone containing them.
#[derive(Debug, Default)]
pub struct AuthorityRouter {
    ns_admin: Option<Name>,
    authorities: HashMap<LowerName, DynamicAuthority>,
}

impl AuthorityRouter {
    /// Create an empty router. Zones get `ns_admin` as SOA RNAME, or `root.<zone>` when `None`.
    #[must_use]
    pub fn new(ns_admin: Option<Name>) -> Self {
        Self {
            ns_admin,
            authorities: HashMap::default(),
        }
    }

    #[must_use]
    pub fn shared(self) -> SharedRouter {
        Arc::new(RwLock::new(self))
    }

    /// Bring the authority set in line with the zones of `state`. Authorities for zones that
    /// are still present are kept as they are, along with their dynamic records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DNSError`] if a zone or server name can't be converted to a DNS name. The
    /// router is left unchanged in that case.
    pub fn sync(&mut self, state: &ServerState) -> Result<(), Error> {
        let mut wanted = HashSet::with_capacity(state.zones.len());
        let mut added = Vec::new();
        for (zone_name, zone) in &state.zones {
            let origin = names::to_fqdn(zone_name)?;
            wanted.insert(origin.clone());
            if self.authorities.contains_key(&origin) {
                continue;
            }
            let ns_name: Name = names::to_fqdn(&zone.server_name)?.into();
            let ns_admin = match &self.ns_admin {
                Some(admin) => admin.clone(),
                None => Name::from_str(&format!("root.{zone_name}."))?,
            };
            tracing::info!("serving zone {zone_name} as {}", zone.server_name);
            added.push(DynamicAuthority::new(origin, ns_name, ns_admin));
        }
        self.authorities.retain(|origin, _| {
            let keep = wanted.contains(origin);
            if !keep {
                tracing::info!("no longer serving zone {origin}");
            }
            keep
        });
        for authority in added {
            self.authorities.insert(authority.origin().clone(), authority);
        }
        Ok(())
    }

    pub fn zones(&self) -> impl Iterator<Item = &LowerName> {
        self.authorities.keys()
    }

    #[must_use]
    pub fn authority_for(&self, name: &LowerName) -> Option<&DynamicAuthority> {
        let origin = self.origin_for(name)?;
        self.authorities.get(&origin)
    }

    pub fn authority_for_mut(&mut self, name: &LowerName) -> Option<&mut DynamicAuthority> {
        let origin = self.origin_for(name)?;
        self.authorities.get_mut(&origin)
    }

    #[must_use]
    pub fn lookup(&self, name: &LowerName, class: DNSClass, rtype: RecordType) -> Routed {
        match self.authority_for(name) {
            None => Routed::Refused,
            Some(authority) => Routed::Authoritative {
                lookup: authority.lookup(name, class, rtype),
                soa: authority.soa().clone(),
            },
        }
    }

    /// The TXT strings served at `name`, or `None` when no zone here contains it.
    #[must_use]
    pub fn txt_values(&self, name: &LowerName) -> Option<Vec<String>> {
        self.authority_for(name).map(|a| a.txt_values(name))
    }

    fn origin_for(&self, name: &LowerName) -> Option<LowerName> {
        self.authorities
            .keys()
            .filter(|origin| origin.zone_of(name))
            .max_by_key(|origin| origin.num_labels())
            .cloned()
    }
}
