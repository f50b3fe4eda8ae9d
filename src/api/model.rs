use crate::client::responder::{Dns01Challenge, DNS01_SUBDOMAIN};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct AddZoneRequest {
    pub zone: String,
    pub server_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct AddZoneResult {
    pub status: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct AddHostRequest {
    pub hostname: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct AddHostResult {
    pub reference: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct HostnameResult {
    pub hostname: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct SetTxtRequest {
    pub subdomain: String,
    pub txt: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct SetTxtResult {
    pub txt: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct DeleteTxtRequest {
    pub subdomain: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct AcceptHostRequest {
    pub reference: String,
}

fn default_subdomain() -> String {
    DNS01_SUBDOMAIN.to_string()
}

/// Sent by the issuance engine to start or stop responding to a `dns-01` challenge.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub(crate) struct ChallengeRequest {
    pub hostname: String,
    pub key_authorization: String,
    #[serde(default = "default_subdomain")]
    pub subdomain: String,
}

impl ChallengeRequest {
    pub fn challenge(&self) -> Dns01Challenge {
        Dns01Challenge {
            key_authorization: self.key_authorization.clone(),
            subdomain: self.subdomain.clone(),
        }
    }
}
