//! Capability RPC over HTTP.
//!
//! An opaque reference is a URL of the form `<public_url>/host/<token>`. Holding one is enough
//! to call the three [`HostCapability`] methods on the server, and nothing else. Controllers
//! live at `<base>/controller/<token>` and are driven by [`RemoteController`].

use crate::api::model::{
    AcceptHostRequest, AddHostRequest, AddHostResult, AddZoneRequest, AddZoneResult,
    DeleteTxtRequest, HostnameResult, SetTxtRequest, SetTxtResult,
};
use crate::capability::HostCapability;
use crate::error::Error;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Turns an opaque reference into something that can be called.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to the host capability behind `reference`.
    async fn connect(&self, reference: &str) -> Result<Box<dyn HostCapability>, Error>;
}

/// Connects to references served by a remote lancrab server.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the HTTP client can't be built.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        Ok(Self {
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, reference: &str) -> Result<Box<dyn HostCapability>, Error> {
        let url = Url::parse(reference)
            .map_err(|err| Error::Transport(format!("malformed reference: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") || !url.path().contains("/host/") {
            return Err(Error::Transport("malformed reference".to_string()));
        }
        Ok(Box::new(HttpRemoteHost {
            client: self.client.clone(),
            base_url: reference.trim_end_matches('/').to_string(),
        }))
    }
}

/// A [`HostCapability`] reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemoteHost {
    client: Client,
    base_url: String,
}

#[async_trait]
impl HostCapability for HttpRemoteHost {
    async fn get_hostname(&self) -> Result<String, Error> {
        let res: HostnameResult =
            call(self.client.get(format!("{}/get_hostname", self.base_url))).await?;
        Ok(res.hostname)
    }

    async fn set_txt(&self, subdomain: &str, value: &str) -> Result<(), Error> {
        let req = SetTxtRequest {
            subdomain: subdomain.to_string(),
            txt: value.to_string(),
        };
        let _: SetTxtResult = call(
            self.client
                .post(format!("{}/set_txt", self.base_url))
                .json(&req),
        )
        .await?;
        Ok(())
    }

    async fn delete_txt(&self, subdomain: &str) -> Result<(), Error> {
        let req = DeleteTxtRequest {
            subdomain: subdomain.to_string(),
        };
        let _: serde_json::Value = call(
            self.client
                .post(format!("{}/delete_txt", self.base_url))
                .json(&req),
        )
        .await?;
        Ok(())
    }
}

/// Client for a controller endpoint, on either the server or a client daemon.
#[derive(Debug, Clone)]
pub struct RemoteController {
    client: Client,
    base_url: String,
}

impl RemoteController {
    /// Drive the controller at `base_url`, e.g. `http://127.0.0.1:6319/controller/<token>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the HTTP client can't be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Ask the server to add and self-test a zone. Returns `"added"` or `"already present"`.
    pub async fn add_zone(&self, zone: &str, server_name: &str) -> Result<String, Error> {
        let res: AddZoneResult = self
            .post(
                "add_zone",
                &AddZoneRequest {
                    zone: zone.to_string(),
                    server_name: server_name.to_string(),
                },
            )
            .await?;
        Ok(res.status)
    }

    /// Ask the server for a new host capability. Returns its reference.
    pub async fn add_host(&self, hostname: &str) -> Result<String, Error> {
        let res: AddHostResult = self
            .post(
                "add_host",
                &AddHostRequest {
                    hostname: hostname.to_string(),
                },
            )
            .await?;
        Ok(res.reference)
    }

    /// Hand a reference to a client daemon. Returns the hostname it governs.
    pub async fn accept_add_host(&self, reference: &str) -> Result<String, Error> {
        let res: HostnameResult = self
            .post(
                "accept_add_host",
                &AcceptHostRequest {
                    reference: reference.to_string(),
                },
            )
            .await?;
        Ok(res.hostname)
    }

    async fn post<B, R>(&self, method: &str, body: &B) -> Result<R, Error>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        call(
            self.client
                .post(format!("{}/{method}", self.base_url))
                .json(body),
        )
        .await
    }
}

fn http_client(timeout: Duration) -> Result<Client, Error> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Send `request` and decode its JSON answer. Error statuses carry the remote `error` message.
async fn call<R: DeserializeOwned>(request: RequestBuilder) -> Result<R, Error> {
    let res = request.send().await?;
    let status = res.status();
    if !status.is_success() {
        let message = res
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("error")?.as_str().map(str::to_string))
            .unwrap_or_else(|| status.to_string());
        tracing::debug!("remote call failed with {status}: {message}");
        return Err(Error::Transport(format!("{status}: {message}")));
    }
    Ok(res.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connector_rejects_malformed_references() {
        let connector = HttpConnector::new(Duration::from_secs(1)).unwrap();
        for reference in ["not a url", "ftp://ns.example.org/host/abc", "https://ns.example.org/"] {
            assert!(matches!(
                connector.connect(reference).await,
                Err(Error::Transport(_))
            ));
        }
        assert!(connector
            .connect("https://ns.example.org:6318/host/abc")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_failure() {
        let connector = HttpConnector::new(Duration::from_secs(1)).unwrap();
        // Nothing listens on the discard port.
        let remote = connector
            .connect("http://127.0.0.1:9/host/abc")
            .await
            .unwrap();
        assert!(matches!(
            remote.set_txt("_acme-challenge", "abc123").await,
            Err(Error::Transport(_))
        ));
    }
}
