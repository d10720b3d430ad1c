//! Record normalization.
//!
//! Converts raw statistics tuples into [`AllocationRecord`]s, mapping each
//! registry's status vocabulary onto the four canonical classifications.
//! Rejections are per-record and reported to the caller; a bad tuple never
//! aborts a run.

use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::NaiveDate;
use log::debug;

use super::types::{
    AddressFamily, AllocationRecord, Classification, RawRecord, Registry, UNKNOWN_COUNTRY,
};

/// Reasons a raw tuple fails normalization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("record type `{0}` is not an address type")]
    NotAddressType(String),

    #[error("unparseable {family} start address `{start}`")]
    BadStart { family: AddressFamily, start: String },

    #[error("unparseable extent `{0}`")]
    BadExtent(String),

    #[error("IPv6 prefix length {0} out of range")]
    BadPrefixLength(u64),

    #[error("zero-length range")]
    EmptyRange,

    #[error("range end overflows the {0} address space")]
    Overflow(AddressFamily),
}

/// A successfully normalized record, plus the original status string when it
/// was not recognized and had to be defaulted to `reserved`.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub record: AllocationRecord,
    pub unknown_status: Option<String>,
}

/// Normalize one raw tuple from `registry`'s snapshot resolved to
/// `snapshot_date`.
///
/// Address math is validated here so that downstream decomposition and trie
/// insertion can assume ranges fit their family's address space.
pub fn normalize(
    raw: &RawRecord,
    registry: Registry,
    snapshot_date: NaiveDate,
) -> Result<Normalized, NormalizeError> {
    let family = match raw.rtype.trim() {
        "ipv4" => AddressFamily::Ipv4,
        "ipv6" => AddressFamily::Ipv6,
        other => return Err(NormalizeError::NotAddressType(other.to_string())),
    };

    let start = parse_start(family, raw.start.trim())?;

    let extent: u64 = raw
        .value
        .trim()
        .parse()
        .map_err(|_| NormalizeError::BadExtent(raw.value.clone()))?;

    match family {
        AddressFamily::Ipv4 => {
            if extent == 0 {
                return Err(NormalizeError::EmptyRange);
            }
            let end = start
                .checked_add(u128::from(extent))
                .ok_or(NormalizeError::Overflow(family))?;
            if end > 1u128 << 32 {
                return Err(NormalizeError::Overflow(family));
            }
        }
        AddressFamily::Ipv6 => {
            if extent > 128 {
                return Err(NormalizeError::BadPrefixLength(extent));
            }
        }
    }

    // Records carry their own allocation/assignment date, but the normalized
    // record is stamped with the registry's resolved snapshot date. The field
    // is still parsed so obviously broken tuples show up in debug logs.
    let raw_date = raw.date.trim();
    if !raw_date.is_empty() && NaiveDate::parse_from_str(raw_date, "%Y%m%d").is_err() {
        debug!(
            "{}: ignoring unparseable allocation date `{}` for {}",
            registry, raw_date, raw.start
        );
    }

    let (classification, unknown_status) = classify_status(registry, raw.status.trim());

    let country = match raw.country.trim() {
        "" | "*" => UNKNOWN_COUNTRY.to_string(),
        code => code.to_ascii_uppercase(),
    };

    Ok(Normalized {
        record: AllocationRecord {
            registry,
            family,
            start,
            extent,
            country,
            classification,
            date: snapshot_date,
        },
        unknown_status,
    })
}

fn parse_start(family: AddressFamily, start: &str) -> Result<u128, NormalizeError> {
    match family {
        AddressFamily::Ipv4 => start
            .parse::<Ipv4Addr>()
            .map(|addr| u128::from(u32::from(addr)))
            .map_err(|_| NormalizeError::BadStart {
                family,
                start: start.to_string(),
            }),
        AddressFamily::Ipv6 => start
            .parse::<Ipv6Addr>()
            .map(u128::from)
            .map_err(|_| NormalizeError::BadStart {
                family,
                start: start.to_string(),
            }),
    }
}

/// Map one registry's status string onto a canonical classification.
///
/// The vocabularies are nearly uniform across registries; `legacy` appears in
/// older ARIN files for pre-RIR allocations and is treated as allocated
/// space. Anything unrecognized defaults to `reserved` and is flagged for the
/// audit report.
fn classify_status(registry: Registry, status: &str) -> (Classification, Option<String>) {
    match status.to_ascii_lowercase().as_str() {
        "allocated" => (Classification::Allocated, None),
        "assigned" => (Classification::Assigned, None),
        "reserved" => (Classification::Reserved, None),
        "available" => (Classification::Available, None),
        "legacy" => (Classification::Allocated, None),
        _ => {
            debug!(
                "{}: unknown status `{}` defaulted to reserved",
                registry, status
            );
            (Classification::Reserved, Some(status.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rtype: &str, start: &str, value: &str, status: &str) -> RawRecord {
        RawRecord {
            registry: "apnic".to_string(),
            country: "AU".to_string(),
            rtype: rtype.to_string(),
            start: start.to_string(),
            value: value.to_string(),
            date: "20110101".to_string(),
            status: status.to_string(),
            opaque_id: None,
        }
    }

    fn snapshot() -> NaiveDate {
        NaiveDate::from_ymd_opt(2011, 1, 1).unwrap()
    }

    #[test]
    fn normalizes_ipv4_record() {
        let normalized =
            normalize(&raw("ipv4", "203.0.113.0", "256", "allocated"), Registry::Apnic, snapshot())
                .unwrap();
        let record = normalized.record;
        assert_eq!(record.family, AddressFamily::Ipv4);
        assert_eq!(record.start, 0xCB00_7100);
        assert_eq!(record.extent, 256);
        assert_eq!(record.classification, Classification::Allocated);
        assert_eq!(record.country, "AU");
        assert_eq!(record.date, snapshot());
        assert!(normalized.unknown_status.is_none());
    }

    #[test]
    fn normalizes_ipv6_record() {
        let normalized =
            normalize(&raw("ipv6", "2001:db8::", "32", "assigned"), Registry::Apnic, snapshot())
                .unwrap();
        assert_eq!(normalized.record.family, AddressFamily::Ipv6);
        assert_eq!(normalized.record.start, 0x2001_0db8 << 96);
        assert_eq!(normalized.record.extent, 32);
    }

    #[test]
    fn rejects_asn_records() {
        let err = normalize(&raw("asn", "64512", "1", "allocated"), Registry::Apnic, snapshot())
            .unwrap_err();
        assert_eq!(err, NormalizeError::NotAddressType("asn".to_string()));
    }

    #[test]
    fn rejects_bad_address_and_extent() {
        assert!(matches!(
            normalize(&raw("ipv4", "not-an-ip", "256", "allocated"), Registry::Apnic, snapshot()),
            Err(NormalizeError::BadStart { .. })
        ));
        assert!(matches!(
            normalize(&raw("ipv4", "203.0.113.0", "many", "allocated"), Registry::Apnic, snapshot()),
            Err(NormalizeError::BadExtent(_))
        ));
    }

    #[test]
    fn rejects_zero_extent_and_overflow() {
        assert_eq!(
            normalize(&raw("ipv4", "203.0.113.0", "0", "allocated"), Registry::Apnic, snapshot())
                .unwrap_err(),
            NormalizeError::EmptyRange
        );
        assert_eq!(
            normalize(&raw("ipv4", "255.255.255.255", "2", "allocated"), Registry::Apnic, snapshot())
                .unwrap_err(),
            NormalizeError::Overflow(AddressFamily::Ipv4)
        );
        // Exactly reaching the end of the space is fine.
        assert!(normalize(
            &raw("ipv4", "255.255.255.255", "1", "allocated"),
            Registry::Apnic,
            snapshot()
        )
        .is_ok());
    }

    #[test]
    fn rejects_out_of_range_ipv6_length() {
        assert_eq!(
            normalize(&raw("ipv6", "2001:db8::", "129", "allocated"), Registry::Apnic, snapshot())
                .unwrap_err(),
            NormalizeError::BadPrefixLength(129)
        );
    }

    #[test]
    fn unknown_status_defaults_to_reserved_and_flags() {
        let normalized =
            normalize(&raw("ipv4", "203.0.113.0", "256", "experimental"), Registry::Apnic, snapshot())
                .unwrap();
        assert_eq!(normalized.record.classification, Classification::Reserved);
        assert_eq!(normalized.unknown_status.as_deref(), Some("experimental"));
    }

    #[test]
    fn legacy_status_is_allocated() {
        let normalized =
            normalize(&raw("ipv4", "13.0.0.0", "16777216", "legacy"), Registry::Arin, snapshot())
                .unwrap();
        assert_eq!(normalized.record.classification, Classification::Allocated);
        assert!(normalized.unknown_status.is_none());
    }

    #[test]
    fn missing_country_becomes_unknown() {
        let mut record = raw("ipv4", "203.0.113.0", "256", "available");
        record.country = String::new();
        let normalized = normalize(&record, Registry::Apnic, snapshot()).unwrap();
        assert_eq!(normalized.record.country, UNKNOWN_COUNTRY);
    }
}
