//! Address types for declarative network onboarding.
//!
//! This crate provides the pure helpers the apply engine uses to decide
//! which appliance objects depend on each other:
//!
//! - [`IpAddress`]: IPv4 and IPv6 addresses
//! - [`IpPrefix`]: IP network prefixes (CIDR notation) with containment
//! - [`SelfAddress`]: appliance notation `<ip>[%<routeDomain>][/<len>]`
//! - [`normalize_address`], [`addresses_match`], [`address_in_subnet`]

mod ip;
mod subnet;

pub use ip::{IpAddress, IpPrefix};
pub use subnet::{
    address_in_subnet, addresses_match, normalize_address, SelfAddress, DEFAULT_ROUTE_DOMAIN,
};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid route domain in address: {0}")]
    InvalidRouteDomain(String),
}
