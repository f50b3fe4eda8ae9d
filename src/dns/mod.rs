//! Authoritative DNS for delegated zones.
//!
//! Each zone added with [`add_zone`][crate::zone::ZoneController::add_zone] gets a
//! [`DynamicAuthority`][authority::DynamicAuthority]. The
//! [`AuthorityRouter`][router::AuthorityRouter] sends every query to the authority of the
//! longest zone containing the query name. Names outside every zone are `REFUSED`.
//!
//! # Apex records
//!
//! The apex of each zone serves one `SOA` and one `NS` record, both naming the server name the
//! zone was added with. The SOA contact is `ServerConfig::ns_admin`, or `root.<zone>` when unset.
//!
//! E.g. for a zone added as `lab.example.org` with server name `ns.example.org`:
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 lab.example.org +short SOA
//! ns.example.org. root.lab.example.org. 20240312 86400 7200 3600000 60
//! ❯ dig @127.0.0.1 -p 5353 lab.example.org +short NS
//! ns.example.org.
//! ```
//!
//! _Note: The zone serial (`20240312`) is the UTC date the zone was loaded._
//!
//! # Dynamic TXT records
//!
//! Host capabilities publish and withdraw TXT records below their hostname at runtime, normally
//! at `_acme-challenge.<hostname>` to answer a `dns-01` challenge. Records are served with a
//! short TTL, and only from memory: a restart forgets them along with the challenges they
//! answered.
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 +short _acme-challenge.printer.lab.example.org TXT
//! "LPsIwTo7o8BoG0-vjCyGQGBWSVIPxI-i_X336eUOQZo"
//! ```
//!
//! Negative answers (`NXDOMAIN`, or `NOERROR` without answers for names that exist) carry the
//! zone's SOA in the authority section.

pub mod authority;
mod handlers;
pub mod router;
pub mod server;

pub use server::new;
