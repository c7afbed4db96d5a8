//! Client key derivation from the transport connection.

use std::net::{IpAddr, SocketAddr};

use crate::error::AdmissionError;

/// A key that uniquely identifies a client for rate limiting.
///
/// Derived only from the socket peer address. Request headers such as
/// `X-Forwarded-For` are under the sender's control and never consulted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    /// Wrap an already-derived key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the key from the peer address of the connection.
    ///
    /// The port is dropped since it changes per connection, and IPv4-mapped
    /// IPv6 addresses collapse to plain IPv4. A missing peer fails closed.
    pub fn from_peer(peer: Option<SocketAddr>) -> Result<Self, AdmissionError> {
        let addr = peer.ok_or(AdmissionError::AddressUndeterminable)?;
        Ok(Self::from_ip(addr.ip()))
    }

    /// Derive the key from a bare IP address.
    pub fn from_ip(ip: IpAddr) -> Self {
        Self(ip.to_canonical().to_string())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_ipv4_peer_drops_port() {
        let a: SocketAddr = "203.0.113.9:50123".parse().unwrap();
        let b: SocketAddr = "203.0.113.9:50124".parse().unwrap();

        let key_a = ClientKey::from_peer(Some(a)).unwrap();
        let key_b = ClientKey::from_peer(Some(b)).unwrap();

        assert_eq!(key_a.as_str(), "203.0.113.9");
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn test_key_from_ipv6_peer() {
        let addr: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
        let key = ClientKey::from_peer(Some(addr)).unwrap();
        assert_eq!(key.to_string(), "2001:db8::1");
    }

    #[test]
    fn test_ipv4_mapped_address_is_canonicalised() {
        let mapped: SocketAddr = "[::ffff:198.51.100.4]:8080".parse().unwrap();
        let plain: SocketAddr = "198.51.100.4:8080".parse().unwrap();

        assert_eq!(
            ClientKey::from_peer(Some(mapped)).unwrap(),
            ClientKey::from_peer(Some(plain)).unwrap()
        );
    }

    #[test]
    fn test_missing_peer_fails_closed() {
        assert_eq!(
            ClientKey::from_peer(None),
            Err(AdmissionError::AddressUndeterminable)
        );
    }
}
