//! Error types.

use axum::extract::rejection::JsonRejection;
use std::net::IpAddr;
use std::time::Duration;
use trust_dns_resolver::error::ResolveError;
use trust_dns_server::proto::error::ProtoError;

/// Error enumerates the possible Lancrab error states.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a zone name, hostname or TXT subdomain doesn't have the expected label
    /// shape. See [`crate::names`].
    #[error("invalid name \"{name}\": {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// Returned when a TXT value can't be served as a single DNS character-string.
    #[error("TXT value is {0} bytes, at most 255 are allowed")]
    InvalidTxt(usize),

    /// Returned by [`ZoneController::add_host`][crate::zone::ZoneController::add_host] when no
    /// confirmed zone contains the requested hostname.
    #[error("no zone contains \"{0}\"")]
    UnknownZone(String),

    /// Returned when a capability token doesn't match any host. The token itself is never
    /// echoed back.
    #[error("unknown capability")]
    UnknownCapability,

    /// Returned when the client has never been registered for certificates for a hostname.
    #[error("unknown host \"{0}\"")]
    UnknownHost(String),

    /// Returned when the self-test of a newly added zone fails. The zone has been rolled back.
    #[error("failure to test zone \"{zone}\": {reason}. Is there an NS record pointing to us?")]
    DelegationTest { zone: String, reason: String },

    /// Returned when a capability reference can't be reached or answers with an error.
    #[error("capability call failed: {0}")]
    Transport(String),

    /// Returned when an API bind address isn't a loopback address, or an address within a
    /// private network space. The client API is only ever meant to be used locally.
    #[error("API bind address ({0}) must be a loopback or private IP")]
    InsecureAPIBind(IpAddr),

    /// Returned when the server's self-test may run longer than an API request is allowed to.
    /// A zone would then be reported as failed to the caller while it is still being tested.
    #[error("self_test_timeout ({self_test:?}) must be shorter than api_timeout ({api:?})")]
    SelfTestOutlastsAPI { self_test: Duration, api: Duration },

    /// Returned when clients `POST` invalid JSON.
    #[error(transparent)]
    JsonExtractorRejection(#[from] JsonRejection),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when processing JSON from disk fails due to invalid JSON content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),

    /// Returned when the DNS server encounters a generic DNS protocol error.
    #[error("DNS error")]
    DNSError(#[from] ProtoError),

    /// Returned when the outbound resolver can't be constructed.
    #[error("resolver error: {0}")]
    Resolve(#[from] ResolveError),
}

/// The coarse failure classes callers care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    DelegationTest,
    Transport,
    Persistence,
    Internal,
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidName { .. } | Error::InvalidTxt(_) | Error::JsonExtractorRejection(_) => {
                ErrorKind::Validation
            }
            Error::UnknownZone(_) | Error::UnknownCapability | Error::UnknownHost(_) => {
                ErrorKind::NotFound
            }
            Error::DelegationTest { .. } => ErrorKind::DelegationTest,
            Error::Transport(_) => ErrorKind::Transport,
            Error::IO(_) | Error::InvalidJSON(_) => ErrorKind::Persistence,
            Error::InsecureAPIBind(_)
            | Error::SelfTestOutlastsAPI { .. }
            | Error::DNSError(_)
            | Error::Resolve(_) => ErrorKind::Internal,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
