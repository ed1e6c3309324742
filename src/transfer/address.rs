//! Address codec
//!
//! Converts between `Endpoint` and the two host/port encodings used to
//! negotiate data connections: the legacy `h1,h2,h3,h4,p1,p2` form of
//! PORT/PASV and the delimiter-framed `|proto|host|port|` form of EPRT/EPSV.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::AddressError;

/// Network protocol tag for IPv4 in the extended encoding.
pub const PROTO_IPV4: u8 = 1;
/// Network protocol tag for IPv6 in the extended encoding.
pub const PROTO_IPV6: u8 = 2;

/// A host and port pair as exchanged during data-mode negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolves the endpoint to a socket address. The host must be an IP literal.
    pub fn socket_addr(&self) -> Result<SocketAddr, AddressError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| AddressError::InvalidHost(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// The protocol tag matching an address family.
pub fn protocol_tag(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => PROTO_IPV4,
        IpAddr::V6(_) => PROTO_IPV6,
    }
}

/// Encodes an IPv4 endpoint as `h1,h2,h3,h4,p1,p2`.
pub fn encode_legacy(endpoint: &Endpoint) -> Result<String, AddressError> {
    let ip: Ipv4Addr = endpoint
        .host
        .parse()
        .map_err(|_| AddressError::InvalidHost(endpoint.host.clone()))?;
    let [h1, h2, h3, h4] = ip.octets();
    Ok(format!(
        "{},{},{},{},{},{}",
        h1,
        h2,
        h3,
        h4,
        endpoint.port / 256,
        endpoint.port % 256
    ))
}

/// Decodes `h1,h2,h3,h4,p1,p2`. Every field must be a decimal in 0-255.
pub fn decode_legacy(encoded: &str) -> Result<Endpoint, AddressError> {
    let fields: Vec<&str> = encoded.trim().split(',').map(str::trim).collect();
    if fields.len() != 6 {
        return Err(AddressError::FieldCount(fields.len()));
    }

    let mut octets = [0u8; 4];
    for (octet, field) in octets.iter_mut().zip(&fields[..4]) {
        *octet =
            decimal_field(field).ok_or_else(|| AddressError::InvalidOctet(field.to_string()))?;
    }

    let mut port = 0u16;
    for field in &fields[4..] {
        let byte = decimal_field(field)
            .ok_or_else(|| AddressError::InvalidPort(encoded.trim().to_string()))?;
        port = (port << 8) | u16::from(byte);
    }

    Ok(Endpoint::new(Ipv4Addr::from(octets).to_string(), port))
}

/// A 0-255 field of ASCII digits only; `parse` alone would accept a sign.
fn decimal_field(field: &str) -> Option<u8> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Encodes an endpoint as `|tag|host|port|`.
pub fn encode_extended(protocol: u8, endpoint: &Endpoint) -> String {
    format!("|{}|{}|{}|", protocol, endpoint.host, endpoint.port)
}

/// Decodes a delimiter-framed address such as `|1|132.235.1.2|6275|` or the
/// EPSV form `|||6446|`.
///
/// The first character is taken as the delimiter. The port is the segment
/// between the third and fourth delimiter; the host may be empty.
pub fn decode_extended(encoded: &str) -> Result<Endpoint, AddressError> {
    let encoded = encoded.trim();
    let delimiter = encoded
        .chars()
        .next()
        .filter(|c| c.is_ascii_punctuation())
        .ok_or_else(|| AddressError::MissingDelimiter(encoded.to_string()))?;

    // "|1|host|port|" splits into ["", "1", "host", "port", ""]
    let segments: Vec<&str> = encoded.split(delimiter).collect();
    if segments.len() < 5 || !segments[4].is_empty() {
        return Err(AddressError::MissingDelimiter(encoded.to_string()));
    }

    let port_segment = segments[3];
    if port_segment.is_empty() || !port_segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddressError::InvalidPort(port_segment.to_string()));
    }
    let port = port_segment
        .parse::<u16>()
        .map_err(|_| AddressError::InvalidPort(port_segment.to_string()))?;

    Ok(Endpoint::new(segments[2], port))
}
