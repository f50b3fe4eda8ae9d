//! Capability RPC over HTTP.
//!
//! Every endpoint speaks JSON. Failures answer with a status code and a body of the form
//! `{"error": "..."}`: 400 for malformed input, 404 for unknown tokens, zones and hosts, 502 when
//! a zone's self-test or a remote call fails, and 500 otherwise.
//!
//! # Server API
//!
//! ## `/healthcheck` (GET)
//!
//!   Returns HTTP 200 (OK) and the JSON body `{"ok":"healthy"}` when the service is operational.
//!
//! ## `/controller/:token/add_zone` (POST)
//!
//!   Expects `{"zone": "lab.example.org", "server_name": "ns.example.org"}`. Publishes a sentinel
//!   TXT record in the zone, resolves it through public DNS, and only keeps the zone if the
//!   sentinel comes back. Returns `{"status": "added"}` or `{"status": "already present"}`.
//!
//! ## `/controller/:token/add_host` (POST)
//!
//!   Expects `{"hostname": "printer.lab.example.org"}` and returns `{"reference": "..."}`, the
//!   opaque reference to hand to the client managing that host.
//!
//! ## `/host/:token/get_hostname` (GET), `/host/:token/set_txt` (POST), `/host/:token/delete_txt` (POST)
//!
//!   The host capability. `set_txt` expects `{"subdomain": "_acme-challenge", "txt": "..."}` and
//!   serves exactly that value at `_acme-challenge.<hostname>` until replaced or deleted.
//!   `delete_txt` expects `{"subdomain": "_acme-challenge"}`.
//!
//! ```bash
//! ❯ curl --json '{"subdomain":"_acme-challenge","txt":"abc123"}' \
//!     https://ns.example.org:6318/host/<token>/set_txt
//! {"txt":"abc123"}
//! ❯ dig @ns.example.org +short _acme-challenge.printer.lab.example.org TXT
//! "abc123"
//! ```
//!
//! # Client API
//!
//! Bound to a loopback or private address only.
//!
//! ## `/controller/:token/accept_add_host` (POST)
//!
//!   Expects `{"reference": "..."}` and returns `{"hostname": "..."}`.
//!
//! ## `/controller/:token/start_responding`, `/controller/:token/stop_responding` (POST)
//!
//!   Expects `{"hostname": "...", "key_authorization": "...", "subdomain": "_acme-challenge"}`,
//!   with `subdomain` optional.
//!
//! ## `/controller/:token/certs/:hostname` (GET, PUT)
//!
//!   Reads or replaces the stored `{"private_key", "certificate", "chain"}` bundle. `GET`
//!   answers `null` when nothing was stored yet.

mod api_error;
mod client_routes;
pub(crate) mod model;
mod routes;
pub mod server;

pub use server::{new_client, new_server};
