//! Value types exchanged with the Network List Manager.

use std::fmt;

use bitflags::bitflags;
use chrono::{DateTime, Utc};

bitflags! {
    /// `NLM_CONNECTIVITY`: reachability per address family.
    ///
    /// An empty set means disconnected.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Connectivity: u32 {
        const IPV4_NO_TRAFFIC = 0x0001;
        const IPV6_NO_TRAFFIC = 0x0002;
        const IPV4_SUBNET = 0x0010;
        const IPV4_LOCAL_NETWORK = 0x0020;
        const IPV4_INTERNET = 0x0040;
        const IPV6_SUBNET = 0x0100;
        const IPV6_LOCAL_NETWORK = 0x0200;
        const IPV6_INTERNET = 0x0400;
    }
}

impl Connectivity {
    /// Keeps every bit, including ones this crate has no name for.
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_native(value: i32) -> Self {
        Self::from_bits_retain(value as u32)
    }

    pub const fn is_disconnected(self) -> bool {
        self.is_empty()
    }

    pub const fn has_internet(self) -> bool {
        self.intersects(Self::IPV4_INTERNET.union(Self::IPV6_INTERNET))
    }

    /// The widest reach over both address families.
    pub fn summary(self) -> &'static str {
        if self.has_internet() {
            "internet"
        } else if self.intersects(Self::IPV4_LOCAL_NETWORK | Self::IPV6_LOCAL_NETWORK) {
            "local network"
        } else if self.intersects(Self::IPV4_SUBNET | Self::IPV6_SUBNET) {
            "subnet"
        } else if self.intersects(Self::IPV4_NO_TRAFFIC | Self::IPV6_NO_TRAFFIC) {
            "no traffic"
        } else {
            "disconnected"
        }
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.summary())
    }
}

/// `NLM_DOMAIN_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainType {
    NonDomain,
    Domain,
    DomainAuthenticated,
    Other(i32),
}

impl From<i32> for DomainType {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::NonDomain,
            1 => Self::Domain,
            2 => Self::DomainAuthenticated,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonDomain => f.write_str("non-domain"),
            Self::Domain => f.write_str("domain"),
            Self::DomainAuthenticated => f.write_str("domain-authenticated"),
            Self::Other(v) => write!(f, "unknown ({v})"),
        }
    }
}

/// `NLM_NETWORK_CATEGORY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkCategory {
    Public,
    Private,
    DomainAuthenticated,
    Other(i32),
}

impl NetworkCategory {
    pub const fn to_native(self) -> i32 {
        match self {
            Self::Public => 0,
            Self::Private => 1,
            Self::DomainAuthenticated => 2,
            Self::Other(v) => v,
        }
    }
}

impl From<i32> for NetworkCategory {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::Public,
            1 => Self::Private,
            2 => Self::DomainAuthenticated,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for NetworkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
            Self::DomainAuthenticated => f.write_str("domain"),
            Self::Other(v) => write!(f, "unknown ({v})"),
        }
    }
}

/// `NLM_ENUM_NETWORK`: which networks `GetNetworks` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NetworkFilter {
    #[default]
    Connected,
    Disconnected,
    All,
}

impl NetworkFilter {
    pub const fn to_native(self) -> i32 {
        match self {
            Self::Connected => 0x01,
            Self::Disconnected => 0x02,
            Self::All => 0x03,
        }
    }
}

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET: i64 = 11_644_473_600;
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Converts a FILETIME (100 ns ticks since 1601-01-01 UTC).
///
/// Zero means "never" and yields `None`.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn filetime_to_utc(low: u32, high: u32) -> Option<DateTime<Utc>> {
    let ticks = (u64::from(high) << 32) | u64::from(low);
    if ticks == 0 {
        return None;
    }
    let secs = (ticks / TICKS_PER_SECOND) as i64 - FILETIME_UNIX_OFFSET;
    let nanos = (ticks % TICKS_PER_SECOND) as u32 * 100;
    DateTime::from_timestamp(secs, nanos)
}

/// `GetTimeCreatedAndConnected`, converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkTimes {
    pub created: Option<DateTime<Utc>>,
    pub connected: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_connectivity_bits_are_kept() {
        let c = Connectivity::from_native(0x0040 | 0x8000);
        assert!(c.has_internet());
        assert_eq!(c.bits(), 0x8040);
        assert_eq!(c.to_string(), "internet");
    }

    #[test]
    fn connectivity_summary_prefers_widest_reach() {
        assert_eq!(Connectivity::empty().summary(), "disconnected");
        assert!(Connectivity::empty().is_disconnected());
        let c = Connectivity::IPV4_SUBNET | Connectivity::IPV6_LOCAL_NETWORK;
        assert_eq!(c.summary(), "local network");
        assert_eq!(Connectivity::IPV6_NO_TRAFFIC.summary(), "no traffic");
    }

    #[test]
    fn enums_preserve_unknown_values() {
        assert_eq!(DomainType::from(1), DomainType::Domain);
        assert_eq!(DomainType::from(9), DomainType::Other(9));
        assert_eq!(NetworkCategory::from(7).to_native(), 7);
        assert_eq!(NetworkCategory::Private.to_native(), 1);
        assert_eq!(NetworkFilter::All.to_native(), 3);
    }

    #[test]
    fn filetime_conversion() {
        assert_eq!(filetime_to_utc(0, 0), None);
        // 2024-01-01T00:00:00Z
        let ticks: u64 = (1_704_067_200 + 11_644_473_600) * 10_000_000;
        let t = filetime_to_utc(ticks as u32, (ticks >> 32) as u32).unwrap();
        assert_eq!(t.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }
}
