//! Core data types for the statistics merge.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::NaiveDate;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};

/// The five Regional Internet Registries, in canonical processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Registry {
    Afrinic,
    Apnic,
    Arin,
    Lacnic,
    #[serde(rename = "ripencc")]
    RipeNcc,
}

impl Registry {
    /// All registries in the fixed order used for merging. First-writer-wins
    /// attribution depends on this order being stable across runs.
    pub const ALL: [Registry; 5] = [
        Registry::Afrinic,
        Registry::Apnic,
        Registry::Arin,
        Registry::Lacnic,
        Registry::RipeNcc,
    ];

    /// Registry name as it appears in extended statistics files and URLs.
    pub fn name(&self) -> &'static str {
        match self {
            Registry::Afrinic => "afrinic",
            Registry::Apnic => "apnic",
            Registry::Arin => "arin",
            Registry::Lacnic => "lacnic",
            Registry::RipeNcc => "ripencc",
        }
    }

    /// Parse a registry name as found in the first field of a record.
    pub fn from_name(name: &str) -> Option<Registry> {
        match name.trim().to_ascii_lowercase().as_str() {
            "afrinic" => Some(Registry::Afrinic),
            "apnic" => Some(Registry::Apnic),
            "arin" => Some(Registry::Arin),
            "lacnic" => Some(Registry::Lacnic),
            "ripencc" | "ripe-ncc" => Some(Registry::RipeNcc),
            _ => None,
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Address family of a record or prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Width of the family's address space in bits.
    pub fn bits(&self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128,
        }
    }

    /// Type label as used in extended statistics files ("ipv4"/"ipv6").
    pub fn type_label(&self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "ipv4",
            AddressFamily::Ipv6 => "ipv6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_label())
    }
}

/// Classification of a block of address space.
///
/// The variant order encodes restrictiveness: `Allocated` outranks
/// `Assigned`, which outranks `Reserved`, which outranks `Available`.
/// Conflict resolution between registries keeps the highest-ranked
/// classification, so the derived `Ord` makes the merge outcome independent
/// of insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Available,
    Reserved,
    Assigned,
    Allocated,
}

impl Classification {
    /// Status label as used in extended statistics files.
    pub fn status_label(&self) -> &'static str {
        match self {
            Classification::Available => "available",
            Classification::Reserved => "reserved",
            Classification::Assigned => "assigned",
            Classification::Allocated => "allocated",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_label())
    }
}

/// Country value for records that carry no usable country code.
pub const UNKNOWN_COUNTRY: &str = "unknown";

/// One raw `|`-separated record line from an extended statistics file,
/// before normalization. Field contents are kept verbatim so rejected
/// tuples can be reproduced in the audit report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub registry: String,
    pub country: String,
    pub rtype: String,
    pub start: String,
    pub value: String,
    pub date: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opaque_id: Option<String>,
}

/// A normalized allocation record, the unit of input to the aggregation
/// engine.
///
/// `start` is the first address of the range as an unsigned integer (IPv4
/// addresses occupy the low 32 bits). `extent` is an address count for IPv4
/// and a prefix length for IPv6, mirroring the convention of the source
/// files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub registry: Registry,
    pub family: AddressFamily,
    pub start: u128,
    pub extent: u64,
    pub country: String,
    pub classification: Classification,
    /// The resolved snapshot date of the owning registry. May differ between
    /// registries in one run when an archive gap forced a fallback.
    pub date: NaiveDate,
}

/// A CIDR-aligned prefix within one address family.
///
/// Invariant: all bits of `base` below `bits() - len` are zero. The
/// constructors enforce this; code holding a `Prefix` may rely on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Prefix {
    pub family: AddressFamily,
    pub base: u128,
    pub len: u8,
}

impl Prefix {
    /// Build a prefix, checking alignment and length.
    pub fn new(family: AddressFamily, base: u128, len: u8) -> Option<Prefix> {
        let bits = family.bits();
        if len > bits {
            return None;
        }
        let prefix = Prefix { family, base, len };
        if prefix.is_aligned() {
            Some(prefix)
        } else {
            None
        }
    }

    /// True when `base` has no bits set below the prefix boundary.
    pub fn is_aligned(&self) -> bool {
        let host_bits = u32::from(self.family.bits() - self.len);
        if host_bits >= 128 {
            // A zero-length prefix covers the whole space; only base 0 is valid.
            self.base == 0
        } else {
            self.base & ((1u128 << host_bits) - 1) == 0
        }
    }

    /// Number of addresses covered. Meaningful for IPv4 output extents; an
    /// IPv6 `/0` would not fit and callers never ask for it.
    pub fn address_count(&self) -> u128 {
        1u128 << u32::from(self.family.bits() - self.len)
    }

    /// Base address of the sibling prefix differing only in the last bit.
    /// `None` for the zero-length prefix, which has no sibling.
    pub fn sibling_base(&self) -> Option<u128> {
        if self.len == 0 {
            return None;
        }
        Some(self.base ^ (1u128 << u32::from(self.family.bits() - self.len)))
    }

    /// Typed CIDR view of this prefix.
    pub fn to_net(&self) -> IpNet {
        match self.family {
            AddressFamily::Ipv4 => {
                let addr = Ipv4Addr::from(self.base as u32);
                // Length is validated on construction.
                IpNet::V4(Ipv4Net::new(addr, self.len).expect("invalid IPv4 prefix length"))
            }
            AddressFamily::Ipv6 => {
                let addr = Ipv6Addr::from(self.base);
                IpNet::V6(Ipv6Net::new(addr, self.len).expect("invalid IPv6 prefix length"))
            }
        }
    }

    /// Base address in canonical text form, without the length.
    pub fn base_addr_string(&self) -> String {
        match self.family {
            AddressFamily::Ipv4 => Ipv4Addr::from(self.base as u32).to_string(),
            AddressFamily::Ipv6 => Ipv6Addr::from(self.base).to_string(),
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base_addr_string(), self.len)
    }
}
