//! Server catalog snapshot types.
//!
//! The catalog is produced by an external updater and consumed here as
//! a read-only JSON snapshot. One snapshot is loaded per connection
//! attempt; records are never mutated by the daemon.

use std::fmt;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::state::Protocol;

/// A single `WireGuard` host entry of a server record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WgHost {
    /// Public endpoint address of the host.
    pub host: String,
    /// `WireGuard` public key of the host.
    pub public_key: String,
    /// Tunnel-internal address of the host (the peer side of the tunnel).
    pub local_ip: String,
}

/// One catalog server entry, keyed by its gateway identifier.
///
/// A record supports `WireGuard` when it carries at least one host
/// entry and `OpenVPN` when it carries at least one plain IP address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Unique gateway identifier (e.g. `us-ny.wg.example.net`).
    pub gateway: String,
    pub city: String,
    pub country: String,
    pub country_code: String,
    /// `WireGuard` endpoint data.
    #[serde(default)]
    pub hosts: Vec<WgHost>,
    /// `OpenVPN` endpoint data.
    #[serde(default)]
    pub ip_addresses: Vec<String>,
}

impl ServerRecord {
    /// Whether this record can serve connections for `protocol`.
    #[must_use]
    pub fn supports(&self, protocol: Protocol) -> bool {
        match protocol {
            Protocol::WireGuard => !self.hosts.is_empty(),
            Protocol::OpenVPN => !self.ip_addresses.is_empty(),
        }
    }

    /// Protocols this record can serve, for display.
    #[must_use]
    pub fn protocols(&self) -> Vec<Protocol> {
        let mut protocols = Vec::new();
        if self.supports(Protocol::WireGuard) {
            protocols.push(Protocol::WireGuard);
        }
        if self.supports(Protocol::OpenVPN) {
            protocols.push(Protocol::OpenVPN);
        }
        protocols
    }
}

/// One antitracker DNS address pair: single-hop and multi-hop variants.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntitrackerAddrs {
    pub ip: String,
    #[serde(rename = "multihop-ip")]
    pub multihop_ip: String,
}

/// Catalog-supplied antitracker DNS addresses, by tier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntitrackerConfig {
    pub default: AntitrackerAddrs,
    pub hardcore: AntitrackerAddrs,
}

/// Non-server configuration carried by the catalog snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub antitracker: AntitrackerConfig,
}

/// A complete, read-only server catalog snapshot.
///
/// Iteration order of the server lists is the catalog order; filtering
/// and selection preserve it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServersSnapshot {
    #[serde(rename = "wireguard")]
    pub wireguard_servers: Vec<ServerRecord>,
    #[serde(rename = "openvpn")]
    pub openvpn_servers: Vec<ServerRecord>,
    pub config: CatalogConfig,
}

impl ServersSnapshot {
    /// Load a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| CatalogError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// All records in catalog order: `WireGuard` list first, then `OpenVPN`.
    pub fn all_servers(&self) -> impl Iterator<Item = &ServerRecord> {
        self.wireguard_servers
            .iter()
            .chain(self.openvpn_servers.iter())
    }
}

/// Errors loading a catalog snapshot
#[derive(Debug)]
pub enum CatalogError {
    Io { path: String, source: io::Error },
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read server catalog '{path}': {source}")
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse server catalog '{path}': {source}")
            }
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}
