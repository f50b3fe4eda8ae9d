use crate::capability::tokens_match;
use crate::store::JsonStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ServerStore = JsonStore<ServerState>;

/// The server's persisted state:
///
/// ```json
/// {"zones": {"lab.example.org": {"server_name": "ns.example.org",
///                                "hostname_swissnums": [["printer.lab.example.org", "..."]]}}}
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerState {
    pub zones: BTreeMap<String, Zone>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// The public hostname of this server, served as the zone's NS and SOA mname.
    pub server_name: String,
    /// `(hostname, capability token)` pairs, in creation order.
    #[serde(rename = "hostname_swissnums")]
    pub hosts: Vec<(String, String)>,
}

impl Zone {
    #[must_use]
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            hosts: Vec::new(),
        }
    }
}

impl ServerState {
    pub fn zone_names(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    /// Find the hostname a capability token was issued for.
    #[must_use]
    pub fn host_for_token(&self, token: &str) -> Option<&str> {
        self.zones
            .values()
            .flat_map(|z| z.hosts.iter())
            .find(|(_, t)| tokens_match(t, token))
            .map(|(hostname, _)| hostname.as_str())
    }

    #[must_use]
    pub fn has_host(&self, hostname: &str) -> bool {
        self.zones
            .values()
            .flat_map(|z| z.hosts.iter())
            .any(|(h, _)| h == hostname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_layout() {
        let mut state = ServerState::default();
        let mut zone = Zone::new("ns.example.org");
        zone.hosts
            .push(("printer.lab.example.org".to_string(), "tok".to_string()));
        state.zones.insert("lab.example.org".to_string(), zone);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"zones": {"lab.example.org": {
                "server_name": "ns.example.org",
                "hostname_swissnums": [["printer.lab.example.org", "tok"]],
            }}})
        );
    }

    #[test]
    fn token_lookup() {
        let mut state = ServerState::default();
        let mut a = Zone::new("ns.example.org");
        a.hosts.push(("a.one.example.org".into(), "t1".into()));
        let mut b = Zone::new("ns.example.org");
        b.hosts.push(("b.two.example.org".into(), "t2".into()));
        state.zones.insert("one.example.org".into(), a);
        state.zones.insert("two.example.org".into(), b);

        assert_eq!(state.host_for_token("t2"), Some("b.two.example.org"));
        assert_eq!(state.host_for_token("t3"), None);
        assert!(state.has_host("a.one.example.org"));
        assert!(!state.has_host("c.one.example.org"));
    }
}
