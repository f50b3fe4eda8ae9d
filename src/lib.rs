//! Lancrab
//!
//! Certificates for LAN machines via a delegated DNS subzone.
//!
//! A public-facing server is authoritative for one or more small zones (e.g. `lab.example.org`)
//! delegated to it with an NS record. For every LAN host inside such a zone the server mints a
//! capability that can publish [RFC-8555][RFC-8555] [DNS-01] challenge responses below that
//! one hostname. A client daemon on the LAN holds those capabilities, answers challenges
//! through them, and stores the resulting certificates.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
//!
#![warn(clippy::pedantic)]

pub mod api;
pub mod capability;
pub mod client;
pub mod config;
pub mod dns;
pub mod error;
pub mod names;
pub mod resolver;
pub mod rpc;
pub mod store;
pub mod zone;

pub use api::{new_client as new_client_http, new_server as new_server_http};
pub use config::{ClientConfig, ServerConfig};
pub use dns::new as new_dns;
pub use zone::ZoneController;
