use crate::error::Error;
use lazy_static::lazy_static;
use std::collections::HashMap;
use time::macros::format_description;
use time::OffsetDateTime;
use trust_dns_proto::rr::rdata::SOA;
use trust_dns_proto::rr::DNSClass;
use trust_dns_server::client::rr::rdata::TXT;
use trust_dns_server::client::rr::{LowerName, Name, RData, Record, RecordType};

/// TTL for dynamic TXT records. Kept short so resolvers don't cache stale challenge responses.
pub const TXT_TTL: u32 = 5;
/// TTL for the zone apex SOA and NS records.
pub const APEX_TTL: u32 = 60;

lazy_static! {
    static ref SERIAL_FORMATTER: &'static [time::format_description::FormatItem<'static>] =
        format_description!(version = 2, "[year][month][day]");
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRecord {
    pub rtype: RecordType,
    pub ttl: u32,
    pub rdata: RData,
}

/// The outcome of an authoritative lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The name holds records of the queried type.
    Answer(Vec<Record>),
    /// The name exists but holds nothing of the queried type.
    NoData,
    /// The name doesn't exist in the zone.
    NxDomain,
}

/// An authority for one zone, answering from a mutable in-memory record table.
///
/// The table always holds the zone's SOA and NS records at the apex. TXT records can be
/// set and deleted at runtime.
#[derive(Debug, Clone)]
pub struct DynamicAuthority {
    origin: LowerName,
    soa: Record,
    records: HashMap<LowerName, Vec<ZoneRecord>>,
}

impl DynamicAuthority {
    /// Create an authority for `origin`, served by `ns_name` with SOA contact `ns_admin`.
    pub fn new(origin: LowerName, ns_name: Name, ns_admin: Name) -> Self {
        // NB: unwraps are safe: known date format producing values that will always parse as u32.
        let serial: u32 = OffsetDateTime::now_utc()
            .format(&SERIAL_FORMATTER)
            .unwrap()
            .parse()
            .unwrap();
        // See RIPE 203[0] for recommended values.
        // [0]: https://www.ripe.net/publications/docs/ripe-203
        let soa_rdata = RData::SOA(SOA::new(
            ns_name.clone(),
            ns_admin,
            serial,
            86_400,    // 24 hrs.
            7_200,     // 2 hours.
            3_600_000, // 1000 hours.
            60,        // keep negative answers short; challenge names come and go.
        ));
        let apex = vec![
            ZoneRecord {
                rtype: RecordType::SOA,
                ttl: APEX_TTL,
                rdata: soa_rdata.clone(),
            },
            ZoneRecord {
                rtype: RecordType::NS,
                ttl: APEX_TTL,
                rdata: RData::NS(ns_name),
            },
        ];
        let soa = Record::from_rdata(origin.clone().into(), APEX_TTL, soa_rdata);
        let mut records = HashMap::new();
        records.insert(origin.clone(), apex);
        Self {
            origin,
            soa,
            records,
        }
    }

    #[must_use]
    pub fn origin(&self) -> &LowerName {
        &self.origin
    }

    /// The SOA record, for the authority section of negative answers.
    #[must_use]
    pub fn soa(&self) -> &Record {
        &self.soa
    }

    /// Replace the record set at `name` with exactly one TXT record holding `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `name` is outside this zone or is the zone apex, and
    /// [`Error::InvalidTxt`] if `value` doesn't fit a character-string.
    pub fn set_txt(&mut self, name: &LowerName, value: &str) -> Result<(), Error> {
        self.check_dynamic_name(name)?;
        if value.len() > 255 {
            return Err(Error::InvalidTxt(value.len()));
        }
        tracing::debug!("set TXT {name} = {value:?}");
        self.records.insert(
            name.clone(),
            vec![ZoneRecord {
                rtype: RecordType::TXT,
                ttl: TXT_TTL,
                rdata: RData::TXT(TXT::new(vec![value.to_string()])),
            }],
        );
        Ok(())
    }

    /// Remove the record set at `name`. Removing an absent name is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `name` is outside this zone or is the zone apex.
    pub fn delete_txt(&mut self, name: &LowerName) -> Result<(), Error> {
        self.check_dynamic_name(name)?;
        if self.records.remove(name).is_some() {
            tracing::debug!("deleted TXT {name}");
        }
        Ok(())
    }

    #[must_use]
    pub fn lookup(&self, name: &LowerName, class: DNSClass, rtype: RecordType) -> Lookup {
        let Some(rrs) = self.records.get(name) else {
            // Empty non-terminals exist even without records of their own.
            if self.records.keys().any(|k| k != name && name.zone_of(k)) {
                return Lookup::NoData;
            }
            return Lookup::NxDomain;
        };
        if class != DNSClass::IN {
            return Lookup::NoData;
        }
        let answers: Vec<Record> = rrs
            .iter()
            .filter(|rr| rr.rtype == rtype)
            .map(|rr| Record::from_rdata(name.into(), rr.ttl, rr.rdata.clone()))
            .collect();
        if answers.is_empty() {
            Lookup::NoData
        } else {
            Lookup::Answer(answers)
        }
    }

    /// The TXT strings served at `name`, in record order.
    #[must_use]
    pub fn txt_values(&self, name: &LowerName) -> Vec<String> {
        self.records
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|rr| match &rr.rdata {
                RData::TXT(txt) => Some(
                    txt.txt_data()
                        .iter()
                        .map(|part| String::from_utf8_lossy(part))
                        .collect(),
                ),
                _ => None,
            })
            .collect()
    }

    fn check_dynamic_name(&self, name: &LowerName) -> Result<(), Error> {
        if *name == self.origin || !self.origin.zone_of(name) {
            return Err(Error::InvalidName {
                name: name.to_string(),
                reason: "not below this zone's apex",
            });
        }
        Ok(())
    }
}
