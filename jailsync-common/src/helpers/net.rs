use std::net::IpAddr;

use crate::JailsyncError;

/// Parses a single IPv4/IPv6 address, trimming surrounding whitespace.
pub fn parse_ip(value: &str) -> Result<IpAddr, JailsyncError> {
    value
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| JailsyncError::Validation("IP address", value.to_owned()))
}
