//! Validation of zone names, hostnames and TXT subdomains.
//!
//! Names are kept in their presentation form without a trailing dot, lowercased, e.g.
//! `printer.lab.example.org`. Conversion to wire names happens at the [DNS layer][crate::dns].

use crate::error::Error;
use std::str::FromStr;
use trust_dns_server::client::rr::{LowerName, Name};

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 253;

fn invalid(name: &str, reason: &'static str) -> Error {
    Error::InvalidName {
        name: name.to_string(),
        reason,
    }
}

fn check_label(name: &str, label: &str) -> Result<(), Error> {
    if label.is_empty() {
        return Err(invalid(name, "empty label"));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(invalid(name, "label longer than 63 characters"));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(invalid(name, "label starts or ends with a hyphen"));
    }
    if !label
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
    {
        return Err(invalid(name, "label contains characters other than a-z, 0-9, '-' or '_'"));
    }
    Ok(())
}

/// Normalize and validate a dot-separated name. A single trailing dot is accepted and removed.
///
/// # Errors
///
/// Returns [`Error::InvalidName`] if the name is empty, too long, or has a malformed label.
pub fn normalize(name: &str) -> Result<String, Error> {
    let lowered = name.strip_suffix('.').unwrap_or(name).to_ascii_lowercase();
    if lowered.is_empty() {
        return Err(invalid(name, "empty name"));
    }
    if lowered.len() > MAX_NAME_LEN {
        return Err(invalid(name, "name longer than 253 characters"));
    }
    for label in lowered.split('.') {
        check_label(name, label)?;
    }
    Ok(lowered)
}

/// Validate a zone name. Zones must have at least two labels; this server never claims a TLD.
///
/// # Errors
///
/// Returns [`Error::InvalidName`] for malformed or single-label names.
pub fn zone(name: &str) -> Result<String, Error> {
    let zone = normalize(name)?;
    if !zone.contains('.') {
        return Err(invalid(name, "a zone needs at least two labels"));
    }
    Ok(zone)
}

/// Validate a single-label TXT subdomain such as `_acme-challenge`.
///
/// # Errors
///
/// Returns [`Error::InvalidName`] if the subdomain is malformed or has more than one label.
pub fn subdomain(name: &str) -> Result<String, Error> {
    let lowered = name.to_ascii_lowercase();
    check_label(name, &lowered)?;
    Ok(lowered)
}

/// Whether `name` equals `zone` or lies below it, on a label boundary. `evilexample.com` is not
/// inside `example.com`.
#[must_use]
pub fn in_zone(name: &str, zone: &str) -> bool {
    match name.strip_suffix(zone) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('.'),
        None => false,
    }
}

/// Whether `name` lies strictly below `zone`.
#[must_use]
pub fn strictly_in_zone(name: &str, zone: &str) -> bool {
    name != zone && in_zone(name, zone)
}

/// Pick the longest of `zones` that strictly contains `hostname`.
pub fn owning_zone<'a>(hostname: &str, zones: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    zones
        .into_iter()
        .filter(|z| strictly_in_zone(hostname, z))
        .max_by_key(|z| z.len())
}

/// Convert a validated presentation name into a fully qualified [`LowerName`].
///
/// # Errors
///
/// Returns [`Error::DNSError`] if the DNS library refuses the name.
pub fn to_fqdn(name: &str) -> Result<LowerName, Error> {
    let mut name = Name::from_str(name)?;
    name.set_fqdn(true);
    Ok(LowerName::from(name))
}
