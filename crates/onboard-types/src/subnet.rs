//! Appliance address notation and subnet matching.
//!
//! Appliance addresses may carry a route domain suffix and a prefix length,
//! e.g. `10.0.0.5%2/24`. A missing route domain means the default domain 0.
//! Everything here is pure and allocation-light.

use crate::ip::{IpAddress, IpPrefix};
use crate::ParseError;
use std::fmt;
use std::str::FromStr;

/// Default route domain id.
pub const DEFAULT_ROUTE_DOMAIN: u32 = 0;

/// An address in appliance notation: `<ip>[%<routeDomain>][/<prefixLen>]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelfAddress {
    ip: IpAddress,
    route_domain: Option<u32>,
    prefix_len: Option<u8>,
}

impl SelfAddress {
    /// Returns the bare IP.
    pub const fn ip(&self) -> &IpAddress {
        &self.ip
    }

    /// Returns the explicit route domain, if one was written.
    pub const fn route_domain(&self) -> Option<u32> {
        self.route_domain
    }

    /// Returns the route domain, defaulting to 0.
    pub fn effective_route_domain(&self) -> u32 {
        self.route_domain.unwrap_or(DEFAULT_ROUTE_DOMAIN)
    }

    /// Returns the prefix length, if one was written.
    pub const fn prefix_len(&self) -> Option<u8> {
        self.prefix_len
    }

    /// Returns the subnet, treating a missing prefix length as a host route.
    pub fn subnet(&self) -> IpPrefix {
        match self.prefix_len {
            Some(len) => IpPrefix::new(self.ip, len).unwrap_or_else(|_| IpPrefix::host(self.ip)),
            None => IpPrefix::host(self.ip),
        }
    }

    /// Returns true if `other` lies in this address's subnet and route domain.
    pub fn subnet_contains(&self, other: &SelfAddress) -> bool {
        self.effective_route_domain() == other.effective_route_domain()
            && self.subnet().contains(&other.ip)
    }

    /// Returns true if both name the same host, ignoring prefix lengths
    /// and route domains.
    pub fn same_host(&self, other: &SelfAddress) -> bool {
        self.ip == other.ip
    }
}

impl fmt::Display for SelfAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ip)?;
        if let Some(rd) = self.route_domain {
            write!(f, "%{}", rd)?;
        }
        if let Some(len) = self.prefix_len {
            write!(f, "/{}", len)?;
        }
        Ok(())
    }
}

impl FromStr for SelfAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (rest, prefix_len) = match s.rsplit_once('/') {
            Some((rest, len)) => {
                let len: u8 = len
                    .parse()
                    .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;
                (rest, Some(len))
            }
            None => (s, None),
        };

        let (ip_str, route_domain) = match rest.split_once('%') {
            Some((ip, rd)) => {
                let rd: u32 = rd
                    .parse()
                    .map_err(|_| ParseError::InvalidRouteDomain(s.to_string()))?;
                (ip, Some(rd))
            }
            None => (rest, None),
        };

        let ip: IpAddress = ip_str.parse()?;
        if let Some(len) = prefix_len {
            if len > ip.max_prefix_len() {
                return Err(ParseError::InvalidIpPrefix(s.to_string()));
            }
        }

        Ok(SelfAddress {
            ip,
            route_domain,
            prefix_len,
        })
    }
}

/// Strips the route domain and prefix length: `10.0.0.5%2/24` -> `10.0.0.5`.
///
/// Unparseable input is returned trimmed of the same suffixes so callers
/// can still compare strings.
pub fn normalize_address(address: &str) -> String {
    match address.parse::<SelfAddress>() {
        Ok(parsed) => parsed.ip.to_string(),
        Err(_) => {
            let no_len = address.split('/').next().unwrap_or(address);
            no_len.split('%').next().unwrap_or(no_len).trim().to_string()
        }
    }
}

/// Returns true if both strings name the same host after normalization.
///
/// The literal `none` never matches anything.
pub fn addresses_match(a: &str, b: &str) -> bool {
    if a.eq_ignore_ascii_case("none") || b.eq_ignore_ascii_case("none") {
        return false;
    }
    match (a.parse::<SelfAddress>(), b.parse::<SelfAddress>()) {
        (Ok(a), Ok(b)) => a.same_host(&b),
        _ => normalize_address(a) == normalize_address(b),
    }
}

/// Returns true if `address` lies inside the subnet of `subnet_owner`.
///
/// Malformed input on either side never matches.
pub fn address_in_subnet(address: &str, subnet_owner: &str) -> bool {
    match (address.parse::<SelfAddress>(), subnet_owner.parse::<SelfAddress>()) {
        (Ok(addr), Ok(owner)) => owner.subnet_contains(&addr),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_notation() {
        let addr: SelfAddress = "10.0.0.5%2/24".parse().unwrap();
        assert_eq!(addr.ip().to_string(), "10.0.0.5");
        assert_eq!(addr.route_domain(), Some(2));
        assert_eq!(addr.prefix_len(), Some(24));
        assert_eq!(addr.to_string(), "10.0.0.5%2/24");
    }

    #[test]
    fn test_parse_bare_and_v6() {
        let addr: SelfAddress = "10.0.0.5".parse().unwrap();
        assert_eq!(addr.route_domain(), None);
        assert_eq!(addr.prefix_len(), None);
        assert!(addr.subnet().is_host_route());

        let v6: SelfAddress = "fd00::5%3/64".parse().unwrap();
        assert_eq!(v6.effective_route_domain(), 3);
        assert_eq!(v6.subnet().network().to_string(), "fd00::");
    }

    #[test]
    fn test_parse_errors() {
        assert!("10.0.0.5/40".parse::<SelfAddress>().is_err());
        assert!("10.0.0.5%x/24".parse::<SelfAddress>().is_err());
        assert!("nonsense".parse::<SelfAddress>().is_err());
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("10.0.0.5%2/24"), "10.0.0.5");
        assert_eq!(normalize_address("10.0.0.5/24"), "10.0.0.5");
        assert_eq!(normalize_address("10.0.0.5"), "10.0.0.5");
        assert_eq!(normalize_address("2001:0db8::0001/64"), "2001:db8::1");
        assert_eq!(normalize_address("none"), "none");
    }

    #[test]
    fn test_addresses_match() {
        assert!(addresses_match("10.0.0.5", "10.0.0.5%0/24"));
        assert!(addresses_match("10.0.0.5%2", "10.0.0.5/24"));
        assert!(!addresses_match("10.0.0.5", "10.0.0.6/24"));
        assert!(!addresses_match("none", "none"));
    }

    #[test]
    fn test_address_in_subnet() {
        assert!(address_in_subnet("10.0.0.1", "10.0.0.5/24"));
        assert!(address_in_subnet("10.0.0.1%0", "10.0.0.5/24"));
        assert!(!address_in_subnet("10.0.1.1", "10.0.0.5/24"));
        assert!(!address_in_subnet("10.0.0.1", "10.0.0.5%2/24"));
        assert!(address_in_subnet("10.0.0.1%2", "10.0.0.5%2/24"));
        assert!(!address_in_subnet("bogus", "10.0.0.5/24"));
    }
}
