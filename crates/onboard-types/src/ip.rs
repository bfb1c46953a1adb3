//! IP address and prefix types with containment checks.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IP address that can be either IPv4 or IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpAddress {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
}

impl IpAddress {
    /// Returns true if this is an IPv4 address.
    pub const fn is_ipv4(&self) -> bool {
        matches!(self, IpAddress::V4(_))
    }

    /// Returns true if this is an IPv6 address.
    pub const fn is_ipv6(&self) -> bool {
        matches!(self, IpAddress::V6(_))
    }

    /// Maximum prefix length for this address family.
    pub const fn max_prefix_len(&self) -> u8 {
        match self {
            IpAddress::V4(_) => 32,
            IpAddress::V6(_) => 128,
        }
    }

    fn to_bits(self) -> u128 {
        match self {
            IpAddress::V4(addr) => u32::from(addr) as u128,
            IpAddress::V6(addr) => u128::from(addr),
        }
    }

    fn masked(self, prefix_len: u8) -> Self {
        let width = self.max_prefix_len() as u32;
        let host_bits = width - prefix_len as u32;
        let mask = if host_bits >= 128 {
            0
        } else {
            (!0u128) << host_bits
        };
        let bits = self.to_bits() & mask;
        match self {
            IpAddress::V4(_) => IpAddress::V4(Ipv4Addr::from(bits as u32)),
            IpAddress::V6(_) => IpAddress::V6(Ipv6Addr::from(bits)),
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAddress::V4(addr) => addr.fmt(f),
            IpAddress::V6(addr) => addr.fmt(f),
        }
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(':') {
            s.parse::<Ipv6Addr>()
                .map(IpAddress::V6)
                .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
        } else {
            s.parse::<Ipv4Addr>()
                .map(IpAddress::V4)
                .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
        }
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        IpAddress::V4(addr)
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(addr: Ipv6Addr) -> Self {
        IpAddress::V6(addr)
    }
}

/// An IP prefix in CIDR notation (e.g., 10.0.0.0/24 or 2001:db8::/32).
///
/// The address is kept as written; [`IpPrefix::network`] yields the masked form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IpPrefix {
    address: IpAddress,
    prefix_len: u8,
}

impl IpPrefix {
    /// Creates a new IP prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length is invalid for the address type
    /// (>32 for IPv4, >128 for IPv6).
    pub fn new(address: IpAddress, prefix_len: u8) -> Result<Self, ParseError> {
        let max_len = address.max_prefix_len();
        if prefix_len > max_len {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum {} for address type",
                prefix_len, max_len
            )));
        }

        Ok(IpPrefix {
            address,
            prefix_len,
        })
    }

    /// Returns a host prefix (/32 or /128) for the address.
    pub fn host(address: IpAddress) -> Self {
        IpPrefix {
            address,
            prefix_len: address.max_prefix_len(),
        }
    }

    /// Returns the address as written.
    pub const fn address(&self) -> &IpAddress {
        &self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns the network address (host bits cleared).
    pub fn network(&self) -> IpAddress {
        self.address.masked(self.prefix_len)
    }

    /// Returns true if `addr` falls inside this prefix.
    ///
    /// Addresses of the other family are never contained.
    pub fn contains(&self, addr: &IpAddress) -> bool {
        if addr.is_ipv4() != self.address.is_ipv4() {
            return false;
        }
        addr.masked(self.prefix_len) == self.network()
    }

    /// Returns true if this is a host route (/32 for IPv4, /128 for IPv6).
    pub const fn is_host_route(&self) -> bool {
        self.prefix_len == self.address.max_prefix_len()
    }

    /// Returns true if this is the default route (0.0.0.0/0 or ::/0).
    pub fn is_default(&self) -> bool {
        self.prefix_len == 0
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;

        let address: IpAddress = addr_str.parse()?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        IpPrefix::new(address, prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ip_address_discrimination() {
        let v4: IpAddress = "10.0.0.1".parse().unwrap();
        assert!(v4.is_ipv4());

        let v6: IpAddress = "::1".parse().unwrap();
        assert!(v6.is_ipv6());

        assert!("10.0.0".parse::<IpAddress>().is_err());
    }

    #[test]
    fn test_ip_prefix_parse() {
        let prefix: IpPrefix = "10.0.0.5/24".parse().unwrap();
        assert!(prefix.address().is_ipv4());
        assert_eq!(prefix.prefix_len(), 24);
        assert_eq!(prefix.network().to_string(), "10.0.0.0");

        let v6_prefix: IpPrefix = "2001:db8::1/32".parse().unwrap();
        assert_eq!(v6_prefix.network().to_string(), "2001:db8::");
    }

    #[test]
    fn test_contains() {
        let prefix: IpPrefix = "10.0.0.5/24".parse().unwrap();
        assert!(prefix.contains(&"10.0.0.254".parse().unwrap()));
        assert!(!prefix.contains(&"10.0.1.1".parse().unwrap()));
        assert!(!prefix.contains(&"::1".parse().unwrap()));

        let all: IpPrefix = "0.0.0.0/0".parse().unwrap();
        assert!(all.is_default());
        assert!(all.contains(&"192.168.7.7".parse().unwrap()));

        let v6: IpPrefix = "fd00:1::10/64".parse().unwrap();
        assert!(v6.contains(&"fd00:1::ffff".parse().unwrap()));
        assert!(!v6.contains(&"fd00:2::1".parse().unwrap()));
    }

    #[test]
    fn test_host_prefix() {
        let host = IpPrefix::host("10.1.1.1".parse().unwrap());
        assert!(host.is_host_route());
        assert!(host.contains(&"10.1.1.1".parse().unwrap()));
        assert!(!host.contains(&"10.1.1.2".parse().unwrap()));
    }

    #[test]
    fn test_invalid_prefix_length() {
        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
        assert!("2001:db8::/129".parse::<IpPrefix>().is_err());
        assert!("10.0.0.0".parse::<IpPrefix>().is_err());
    }

    #[test]
    fn test_display() {
        let prefix: IpPrefix = "192.168.0.0/16".parse().unwrap();
        assert_eq!(prefix.to_string(), "192.168.0.0/16");
    }
}
