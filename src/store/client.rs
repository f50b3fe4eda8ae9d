use crate::store::JsonStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ClientStore = JsonStore<ClientState>;

/// The client's persisted state: the capability reference for each managed hostname.
///
/// ```json
/// {"hosts": {"printer.lab.example.org": "https://ns.example.org:6318/host/..."}}
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientState {
    pub hosts: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dyndns_furl: Option<String>,
}

impl ClientState {
    #[must_use]
    pub fn reference(&self, hostname: &str) -> Option<&str> {
        self.hosts.get(hostname).map(String::as_str)
    }
}
