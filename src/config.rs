use crate::error::Error;
use ipnetwork::IpNetwork;
use lazy_static::lazy_static;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::borrow::Cow;
use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_server::client::rr::Name;

pub type SharedServerConfig = Arc<ServerConfig>;
pub type SharedClientConfig = Arc<ClientConfig>;

/// Name of the persisted state document inside a role's `state_dir`.
pub const STATE_FILE: &str = "config.json";
/// Name of the file holding the controller capability token inside a role's `state_dir`.
pub const CONTROLLER_TOKEN_FILE: &str = "controller.token";

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub state_dir: PathBuf,
    /// Base URL clients use to reach this server's API, e.g. `https://ns.example.org:6318`.
    pub public_url: String,
    pub ns_admin: Option<String>,
    pub api_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub api_timeout: Duration,
    pub dns_udp_bind_addr: SocketAddr,
    pub dns_tcp_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub dns_tcp_timeout: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub self_test_timeout: Duration,
    #[serde(default)]
    pub self_test_nameservers: Vec<IpAddr>,
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct ClientConfig {
    pub state_dir: PathBuf,
    pub cert_dir: Option<PathBuf>,
    pub api_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub api_timeout: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub rpc_timeout: Duration,
    #[serde(default)]
    pub issue_command: Option<Vec<String>>,
}

lazy_static! {
    // NOTE(XXX): Once the "ip" feature has stabilized we can use Ipv6Addr.is_unique_local[0].
    //            Presently this feature is unstable so we home-roll. See also RFC 4193[1].
    // [0]: https://doc.rust-lang.org/std/net/struct.Ipv6Addr.html#method.is_unique_local
    // [1]: https://www.rfc-editor.org/rfc/rfc4193.html
    static ref IPV6_UNIQUE_LOCAL_NETWORK: IpNetwork = IpNetwork::from_str("fc00::/7").unwrap();
}

fn read_json<T: serde::de::DeserializeOwned>(p: impl AsRef<Path>) -> Result<T, Error> {
    let f = File::open(p)?;
    let reader = BufReader::new(f);
    Ok(serde_json::from_reader(reader)?)
}

impl ServerConfig {
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let conf: ServerConfig = read_json(p)?;
        conf.validate()?;
        Ok(conf)
    }

    /// `add_zone` holds its API request open for the whole self-test, so the test must finish
    /// within the request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SelfTestOutlastsAPI`] if `self_test_timeout` isn't below `api_timeout`.
    pub fn validate(&self) -> Result<(), Error> {
        if self.self_test_timeout >= self.api_timeout {
            return Err(Error::SelfTestOutlastsAPI {
                self_test: self.self_test_timeout,
                api: self.api_timeout,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    #[must_use]
    pub fn controller_token_path(&self) -> PathBuf {
        self.state_dir.join(CONTROLLER_TOKEN_FILE)
    }

    /// The base URL of the server's API, without a trailing slash.
    #[must_use]
    pub fn public_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }

    /// The configured SOA RNAME, if any. `user@domain` is accepted.
    pub fn ns_admin(&self) -> Result<Option<Name>, Error> {
        match &self.ns_admin {
            Some(admin) => Ok(Some(Name::from_str(&sanitized_ns_admin(admin))?)),
            None => Ok(None),
        }
    }
}

impl ClientConfig {
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let conf: ClientConfig = read_json(p)?;
        bind_addr_is_secure(conf.api_bind_addr)?;
        Ok(conf)
    }

    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    #[must_use]
    pub fn controller_token_path(&self) -> PathBuf {
        self.state_dir.join(CONTROLLER_TOKEN_FILE)
    }

    #[must_use]
    pub fn cert_dir(&self) -> PathBuf {
        self.cert_dir
            .clone()
            .unwrap_or_else(|| self.state_dir.join("certs"))
    }

    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}", self.api_bind_addr)
    }
}

fn sanitized_ns_admin(ns_admin: &str) -> Cow<str> {
    match ns_admin.split_once('@') {
        Some((user, domain)) => {
            let user = user.replace('.', "\\.");
            Cow::Owned(format!("{user}.{domain}"))
        }
        _ => Cow::Borrowed(ns_admin),
    }
}

fn bind_addr_is_secure(addr: SocketAddr) -> Result<(), Error> {
    match addr {
        SocketAddr::V4(v4_addr) => {
            let ip = v4_addr.ip();
            if !ip.is_loopback() && !ip.is_private() {
                return Err(Error::InsecureAPIBind(IpAddr::V4(*ip)));
            }
            Ok(())
        }
        SocketAddr::V6(v6_addr) => {
            let ip = v6_addr.ip();
            if !ip.is_loopback() && !IPV6_UNIQUE_LOCAL_NETWORK.contains(IpAddr::V6(*ip)) {
                return Err(Error::InsecureAPIBind(IpAddr::V6(*ip)));
            }
            Ok(())
        }
    }
}
