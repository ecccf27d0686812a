//! IPv4 network specifications used by route allow and deny lists.
//!
//! Four textual forms are recognised, tried in this order:
//! - wildcard, e.g. `192.168.*.*`
//! - CIDR, e.g. `10.0.0.0/8`
//! - inclusive range, e.g. `10.0.0.5-10.0.0.10`
//! - single address, e.g. `127.0.0.1`
//!
//! Matching is done on `u32` values only. A wildcard octet becomes a zero byte in
//! the comparison mask, so no string substitution is involved.

use std::{fmt, net::Ipv4Addr, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::{RouteError, RouteResult};

/// A parsed IP-matching rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NetworkSpec {
    /// Exactly one address
    Single(Ipv4Addr),
    /// Dotted quad where some octets accept any value
    Wildcard { base: u32, mask: u32 },
    /// Base address with prefix length in `1..=32`
    Cidr { base: Ipv4Addr, prefix_len: u8 },
    /// Inclusive range, `low <= high`
    Range { low: Ipv4Addr, high: Ipv4Addr },
}

impl NetworkSpec {
    /// Classify a network specification string.
    pub fn classify(spec: &str) -> RouteResult<Self> {
        let spec = spec.trim();
        let invalid = || RouteError::InvalidNetworkSpec {
            spec: spec.to_string(),
        };

        if spec.contains('*') {
            return Self::parse_wildcard(spec).ok_or_else(invalid);
        }

        if let Some((base, prefix)) = spec.split_once('/') {
            let base = parse_addr(base).ok_or_else(invalid)?;
            let prefix_len = parse_decimal::<u8>(prefix).ok_or_else(invalid)?;
            if !(1..=32).contains(&prefix_len) {
                return Err(invalid());
            }
            return Ok(Self::Cidr { base, prefix_len });
        }

        if let Some((low, high)) = spec.split_once('-') {
            let low = parse_addr(low).ok_or_else(invalid)?;
            let high = parse_addr(high).ok_or_else(invalid)?;
            if u32::from(low) > u32::from(high) {
                return Err(invalid());
            }
            return Ok(Self::Range { low, high });
        }

        parse_addr(spec).map(Self::Single).ok_or_else(invalid)
    }

    fn parse_wildcard(spec: &str) -> Option<Self> {
        let octets: Vec<&str> = spec.split('.').collect();
        if octets.len() != 4 {
            return None;
        }

        let mut base = 0u32;
        let mut mask = 0u32;
        for octet in octets {
            base <<= 8;
            mask <<= 8;
            if octet == "*" {
                continue;
            }
            base |= u32::from(parse_decimal::<u8>(octet)?);
            mask |= 0xff;
        }

        Some(Self::Wildcard { base, mask })
    }

    /// Check if an address is covered by this network.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let addr = u32::from(addr);
        match *self {
            NetworkSpec::Single(single) => addr == u32::from(single),
            NetworkSpec::Wildcard { base, mask } => addr & mask == base & mask,
            NetworkSpec::Cidr { base, prefix_len } => {
                let mask = u32::MAX << (32 - u32::from(prefix_len));
                addr & mask == u32::from(base) & mask
            }
            NetworkSpec::Range { low, high } => (u32::from(low)..=u32::from(high)).contains(&addr),
        }
    }

    /// Check a dotted-decimal address. Anything that is not a valid IPv4
    /// address never matches.
    pub fn matches(&self, addr: &str) -> bool {
        parse_addr(addr).is_some_and(|addr| self.contains(addr))
    }
}

/// Ad hoc check of an address against a specification string.
///
/// Returns `false` when either side is malformed.
pub fn network_matches(addr: &str, spec: &str) -> bool {
    NetworkSpec::classify(spec).is_ok_and(|network| network.matches(addr))
}

fn parse_addr(s: &str) -> Option<Ipv4Addr> {
    Ipv4Addr::from_str(s.trim()).ok()
}

// Octet-style decimal: one to three digits, no sign, no surrounding space and
// no leading zero, the same shape `Ipv4Addr::from_str` accepts.
fn parse_decimal<T: FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || s.len() > 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for NetworkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkSpec::Single(addr) => write!(f, "{addr}"),
            NetworkSpec::Wildcard { base, mask } => {
                let octets: Vec<String> = (0..4)
                    .rev()
                    .map(|i| {
                        let shift = i * 8;
                        if (mask >> shift) & 0xff == 0 {
                            "*".to_string()
                        } else {
                            ((base >> shift) & 0xff).to_string()
                        }
                    })
                    .collect();
                write!(f, "{}", octets.join("."))
            }
            NetworkSpec::Cidr { base, prefix_len } => write!(f, "{base}/{prefix_len}"),
            NetworkSpec::Range { low, high } => write!(f, "{low}-{high}"),
        }
    }
}

impl FromStr for NetworkSpec {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NetworkSpec::classify(s)
    }
}

impl TryFrom<String> for NetworkSpec {
    type Error = RouteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        NetworkSpec::classify(&value)
    }
}

impl From<NetworkSpec> for String {
    fn from(spec: NetworkSpec) -> Self {
        spec.to_string()
    }
}
