//! Outbound TXT lookups for the zone self-test.
//!
//! The self-test must go through public resolution, so the production [`SystemTxtResolver`]
//! uses a recursive resolver (the system configuration, or explicitly configured nameservers)
//! rather than asking this server directly.

use crate::error::Error;
use std::net::IpAddr;
use std::time::Duration;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::TokioAsyncResolver;

/// Why a TXT lookup produced no usable answer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    #[error("no TXT records found")]
    NoRecords,
    #[error("lookup timed out")]
    Timeout,
    #[error("{0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait TxtResolver: Send + Sync {
    /// Look up the TXT record strings at the fully qualified `name`.
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupFailure>;
}

/// Resolves through recursive nameservers. A fresh resolver is built per lookup so that a
/// negative answer cached before delegation was fixed can't fail a retry.
pub struct SystemTxtResolver {
    config: ResolverConfig,
    opts: ResolverOpts,
}

impl SystemTxtResolver {
    /// Build a resolver. With no `nameservers` the system configuration is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolve`] if the system resolver configuration can't be read.
    pub fn new(nameservers: &[IpAddr], timeout: Duration) -> Result<Self, Error> {
        let (config, mut opts) = if nameservers.is_empty() {
            trust_dns_resolver::system_conf::read_system_conf()?
        } else {
            (
                ResolverConfig::from_parts(
                    None,
                    vec![],
                    NameServerConfigGroup::from_ips_clear(nameservers, 53, true),
                ),
                ResolverOpts::default(),
            )
        };
        opts.timeout = timeout;
        // Fail construction early rather than at the first self-test.
        TokioAsyncResolver::tokio(config.clone(), opts.clone())?;
        Ok(Self { config, opts })
    }
}

#[async_trait::async_trait]
impl TxtResolver for SystemTxtResolver {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupFailure> {
        let resolver = TokioAsyncResolver::tokio(self.config.clone(), self.opts.clone())
            .map_err(|err| LookupFailure::Other(err.to_string()))?;
        match resolver.txt_lookup(name).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|txt| {
                    txt.txt_data()
                        .iter()
                        .map(|part| String::from_utf8_lossy(part))
                        .collect::<String>()
                })
                .collect()),
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Err(LookupFailure::NoRecords),
                ResolveErrorKind::Timeout => Err(LookupFailure::Timeout),
                _ => Err(LookupFailure::Other(err.to_string())),
            },
        }
    }
}
