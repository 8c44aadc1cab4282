//! Tunnel protocol types.

use std::fmt;

/// Supported tunnel protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// `WireGuard` userspace tunnel.
    WireGuard,
    /// `OpenVPN` tunnel (multi-hop capable).
    OpenVPN,
}

impl Protocol {
    /// Parse a protocol filter flag value.
    ///
    /// Accepts full names and the short forms `wg` / `ovpn`
    /// (case-insensitive). Returns `None` for unrecognised values.
    #[must_use]
    pub fn parse_flag(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wireguard" | "wg" => Some(Self::WireGuard),
            "openvpn" | "ovpn" => Some(Self::OpenVPN),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WireGuard => write!(f, "WireGuard"),
            Self::OpenVPN => write!(f, "OpenVPN"),
        }
    }
}
