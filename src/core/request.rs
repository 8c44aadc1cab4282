//! Connection request validation and plan construction.
//!
//! Turns a validated server selection plus user options into a single
//! immutable [`ConnectionPlan`]. Every validation error is detected
//! here, before any OS mutation or subprocess spawn.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::catalog::{ServerRecord, ServersSnapshot};
use crate::constants;
use crate::logger::{self, LogLevel};
use crate::state::Protocol;

use super::selector::{self, FilterOptions, LatencyProber};
use super::{RequestError, ValidationError};

/// User-supplied connection options, as carried by the front-end
/// connect command.
#[derive(Clone, Debug, Default)]
pub struct ConnectOptions {
    /// Free-text location mask (or exact entry gateway id for multi-hop).
    pub location: String,
    /// When the mask matches more than one server, take the first.
    pub any: bool,
    /// Probe filtered candidates and pick the fastest.
    pub fastest: bool,
    pub filter: FilterOptions,
    /// Exit server gateway id; non-empty selects a multi-hop connection.
    pub exit_server: String,
    /// Manual DNS server for this connection.
    pub dns: Option<String>,
    /// Use the catalog antitracker DNS (overrides manual DNS).
    pub antitracker: bool,
    /// Use the hardened-tier antitracker DNS (wins over `antitracker`).
    pub antitracker_hardcore: bool,
    /// Keep the firewall up for the duration of the connection.
    pub firewall_during_connection: bool,
    /// Custom tunnel MTU.
    pub mtu: Option<u16>,
    /// Remote tunnel port override.
    pub port: Option<u16>,
    /// Session-assigned client tunnel address.
    pub client_ip: Option<Ipv4Addr>,
    /// Session-assigned client private key.
    pub client_private_key: Option<String>,
    /// Program IPv6 tunnel addressing and routes.
    pub enable_ipv6: bool,
}

/// Chosen server(s) of a connection plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Hop {
    Single(ServerRecord),
    Multi {
        entry: ServerRecord,
        exit: ServerRecord,
    },
}

impl Hop {
    /// The server the tunnel is physically established to.
    #[must_use]
    pub fn entry(&self) -> &ServerRecord {
        match self {
            Self::Single(record) | Self::Multi { entry: record, .. } => record,
        }
    }

    #[must_use]
    pub const fn is_multi(&self) -> bool {
        matches!(self, Self::Multi { .. })
    }
}

/// Resolved tunnel endpoint addressing for a `WireGuard` plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TunnelEndpoints {
    /// Public endpoint address of the remote host.
    pub host: IpAddr,
    /// Remote host public key.
    pub public_key: String,
    /// Tunnel-internal address of the remote host (peer side).
    pub host_local_ip: Ipv4Addr,
    /// Tunnel-internal address assigned to this client.
    pub client_local_ip: Ipv4Addr,
    /// Client private key for the tunnel configuration.
    pub client_private_key: String,
    /// IPv6 tunnel-internal client address, when IPv6 is enabled.
    pub client_local_ipv6: Option<Ipv6Addr>,
    /// IPv6 tunnel-internal peer address, when IPv6 is enabled.
    pub host_local_ipv6: Option<Ipv6Addr>,
}

/// One immutable connection plan, built once per connection attempt and
/// owned by the connection lifecycle for the attempt's duration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionPlan {
    pub protocol: Protocol,
    pub hop: Hop,
    pub port: u16,
    /// Resolved DNS for the connection; `None` keeps the plan's
    /// computed default at apply time.
    pub dns: Option<IpAddr>,
    pub firewall_during_connection: bool,
    pub mtu: Option<u16>,
    /// Short exit server id for multi-hop (`de-ber` of `de-ber.ovpn...`).
    pub multihop_exit_id: Option<String>,
    /// Endpoint addressing; present for `WireGuard` plans.
    pub tunnel: Option<TunnelEndpoints>,
}

/// Build a validated connection plan from a catalog snapshot and user
/// options.
///
/// # Errors
///
/// Returns [`RequestError`] for malformed options or failed server
/// resolution. No OS state is touched on any path.
pub fn build_plan(
    snapshot: &ServersSnapshot,
    opts: &ConnectOptions,
    prober: &dyn LatencyProber,
) -> Result<ConnectionPlan, RequestError> {
    if opts.location.is_empty() && !opts.fastest {
        return Err(ValidationError::MissingLocation.into());
    }

    // Manual DNS must parse before anything else runs
    let manual_dns = match &opts.dns {
        Some(s) if !s.is_empty() => Some(
            IpAddr::from_str(s).map_err(|_| ValidationError::BadDnsAddress(s.clone()))?,
        ),
        _ => None,
    };

    if opts.exit_server.is_empty() {
        build_single_hop(snapshot, opts, manual_dns, prober)
    } else {
        build_multi_hop(snapshot, opts, manual_dns)
    }
}

fn build_single_hop(
    snapshot: &ServersSnapshot,
    opts: &ConnectOptions,
    manual_dns: Option<IpAddr>,
    prober: &dyn LatencyProber,
) -> Result<ConnectionPlan, RequestError> {
    let candidates = selector::filter_servers(snapshot, &opts.location, &opts.filter);

    let chosen = if opts.fastest && candidates.len() > 1 {
        selector::select_fastest(&candidates, opts.any, prober)?
    } else {
        selector::select_single(&candidates, opts.any)?
    };

    let protocol = if chosen.supports(Protocol::WireGuard)
        && opts.filter.protocol != Some(Protocol::OpenVPN)
    {
        Protocol::WireGuard
    } else {
        Protocol::OpenVPN
    };

    let tunnel = if protocol == Protocol::WireGuard {
        Some(resolve_endpoints(chosen, opts)?)
    } else {
        None
    };

    let dns = resolve_dns(snapshot, opts, manual_dns, false)?;

    Ok(ConnectionPlan {
        protocol,
        hop: Hop::Single(chosen.clone()),
        port: opts.port.unwrap_or(constants::DEFAULT_TUNNEL_PORT),
        dns,
        firewall_during_connection: opts.firewall_during_connection,
        mtu: opts.mtu,
        multihop_exit_id: None,
        tunnel,
    })
}

fn build_multi_hop(
    snapshot: &ServersSnapshot,
    opts: &ConnectOptions,
    manual_dns: Option<IpAddr>,
) -> Result<ConnectionPlan, RequestError> {
    if opts.fastest {
        return Err(ValidationError::IncompatibleFlags(
            "the fastest-server flag is not applicable for a multi-hop connection".to_string(),
        )
        .into());
    }
    if opts.filter.protocol == Some(Protocol::WireGuard) {
        return Err(ValidationError::IncompatibleFlags(
            "multi-hop connections are OpenVPN only; the WireGuard protocol filter cannot apply"
                .to_string(),
        )
        .into());
    }
    if opts.filter.location
        || opts.filter.city
        || opts.filter.country
        || opts.filter.country_code
        || opts.filter.invert
    {
        logger::log(
            LogLevel::Warning,
            "REQUEST",
            "Filtering flags are ignored for a multi-hop connection",
        );
    }

    let entry = selector::resolve_exact(snapshot, &opts.location, Protocol::OpenVPN)?;
    let exit = selector::resolve_exact(snapshot, &opts.exit_server, Protocol::OpenVPN)?;

    if entry.gateway == exit.gateway || entry.country_code == exit.country_code {
        return Err(ValidationError::InvalidMultiHopPair {
            entry: entry.gateway.clone(),
            exit: exit.gateway.clone(),
        }
        .into());
    }

    let dns = resolve_dns(snapshot, opts, manual_dns, true)?;
    let exit_id = exit
        .gateway
        .split('.')
        .next()
        .unwrap_or(&exit.gateway)
        .to_string();

    Ok(ConnectionPlan {
        protocol: Protocol::OpenVPN,
        hop: Hop::Multi {
            entry: entry.clone(),
            exit: exit.clone(),
        },
        port: opts.port.unwrap_or(constants::DEFAULT_TUNNEL_PORT),
        dns,
        firewall_during_connection: opts.firewall_during_connection,
        mtu: opts.mtu,
        multihop_exit_id: Some(exit_id),
        tunnel: None,
    })
}

/// Pick the DNS address for the connection: antitracker (hardened tier
/// wins) overrides a manual address; the hop mode selects the
/// single-hop or multi-hop antitracker variant.
fn resolve_dns(
    snapshot: &ServersSnapshot,
    opts: &ConnectOptions,
    manual_dns: Option<IpAddr>,
    multihop: bool,
) -> Result<Option<IpAddr>, ValidationError> {
    let antitracker = &snapshot.config.antitracker;

    let catalog_addr = if opts.antitracker_hardcore {
        Some(if multihop {
            &antitracker.hardcore.multihop_ip
        } else {
            &antitracker.hardcore.ip
        })
    } else if opts.antitracker {
        Some(if multihop {
            &antitracker.default.multihop_ip
        } else {
            &antitracker.default.ip
        })
    } else {
        None
    };

    match catalog_addr {
        Some(addr) => IpAddr::from_str(addr)
            .map(Some)
            .map_err(|_| ValidationError::BadDnsAddress(addr.clone())),
        None => Ok(manual_dns),
    }
}

fn resolve_endpoints(
    record: &ServerRecord,
    opts: &ConnectOptions,
) -> Result<TunnelEndpoints, ValidationError> {
    let host = record
        .hosts
        .first()
        .ok_or(ValidationError::MissingClientConfig("server host entry"))?;

    let endpoint = IpAddr::from_str(&host.host)
        .map_err(|_| ValidationError::BadDnsAddress(host.host.clone()))?;
    // Catalog peer addresses may carry a prefix length suffix
    let peer_str = host.local_ip.split('/').next().unwrap_or(&host.local_ip);
    let host_local_ip = Ipv4Addr::from_str(peer_str)
        .map_err(|_| ValidationError::BadDnsAddress(host.local_ip.clone()))?;

    let client_local_ip = opts
        .client_ip
        .ok_or(ValidationError::MissingClientConfig("client tunnel address"))?;
    let client_private_key = opts
        .client_private_key
        .clone()
        .ok_or(ValidationError::MissingClientConfig("client private key"))?;

    let (client_local_ipv6, host_local_ipv6) = if opts.enable_ipv6 {
        (
            Some(map_tunnel_ipv6(client_local_ip)),
            Some(map_tunnel_ipv6(host_local_ip)),
        )
    } else {
        (None, None)
    };

    Ok(TunnelEndpoints {
        host: endpoint,
        public_key: host.public_key.clone(),
        host_local_ip,
        client_local_ip,
        client_private_key,
        client_local_ipv6,
        host_local_ipv6,
    })
}

/// Map an IPv4 tunnel address into the provider's IPv6 tunnel prefix
/// (`fd00:4956:504e:ffff::/64` with the IPv4 address as the low 32 bits).
fn map_tunnel_ipv6(v4: Ipv4Addr) -> Ipv6Addr {
    let [a, b, c, d] = v4.octets();
    Ipv6Addr::new(
        0xfd00,
        0x4956,
        0x504e,
        0xffff,
        0,
        0,
        u16::from(a) << 8 | u16::from(b),
        u16::from(c) << 8 | u16::from(d),
    )
}
