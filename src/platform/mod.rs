//! Platform abstraction layer for OS-specific network commands.
//!
//! This module provides a trait-based abstraction over the route, DNS,
//! and interface commands the daemon issues, with the implementation
//! selected at startup. The connection lifecycle and the process
//! supervisor are platform-agnostic and only see [`NetCommands`].
//!
//! Supported platforms:
//! - macOS: route, ipconfig, ifconfig
//! - Linux: ip route, ip addr, /sys/class/net

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
compile_error!("veild currently only supports macOS and Linux");

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::sync::Arc;

use crate::shell;

/// The default route of the system, captured before any mutation.
///
/// Required to restore routing on teardown; exactly one snapshot is
/// live per active connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteSnapshot {
    /// Default gateway address.
    pub gateway: IpAddr,
    /// Interface the default route goes through.
    pub interface: String,
}

/// Raw OS network commands.
///
/// Implementations execute exactly one OS operation per method and
/// never track state; sequencing and restoration bookkeeping live in
/// the network configurator. A recording fake implements this trait in
/// tests.
pub trait NetCommands: Send + Sync {
    /// Detect the current default gateway and interface.
    ///
    /// `None` when detection fails or no default route exists (which
    /// doubles as the connectivity probe).
    fn default_route(&self) -> Option<RouteSnapshot>;

    /// Names of all network interfaces currently present.
    ///
    /// # Errors
    ///
    /// Returns [`shell::ExecError`] when the interface listing fails.
    fn list_interfaces(&self) -> shell::Result<Vec<String>>;

    /// Administrative state of an interface; `None` when the interface
    /// does not exist or the probe failed.
    fn interface_is_up(&self, name: &str) -> Option<bool>;

    /// Assign the IPv4 tunnel address and bring the interface up.
    fn assign_ipv4(&self, iface: &str, addr: Ipv4Addr) -> shell::Result<()>;

    /// Assign the IPv6 tunnel address.
    fn assign_ipv6(&self, iface: &str, addr: Ipv6Addr) -> shell::Result<()>;

    fn set_mtu(&self, iface: &str, mtu: u16) -> shell::Result<()>;

    /// Host route to a single address via a gateway.
    fn add_host_route(&self, dest: IpAddr, gateway: IpAddr) -> shell::Result<()>;
    fn delete_host_route(&self, dest: IpAddr) -> shell::Result<()>;

    /// Interface-scoped copy of a default route, used to preserve the
    /// original default so it can be precisely restored later.
    fn add_scoped_default_route(&self, gateway: IpAddr, iface: &str) -> shell::Result<()>;
    fn delete_scoped_default_route(&self, gateway: IpAddr, iface: &str) -> shell::Result<()>;

    fn add_default_route(&self, gateway: IpAddr) -> shell::Result<()>;
    fn delete_default_route(&self, gateway: IpAddr) -> shell::Result<()>;

    /// Default route through an interface rather than a gateway address.
    fn add_default_route_via_interface(&self, iface: &str) -> shell::Result<()>;

    /// One IPv6 half-space route (`::/1` or `8000::/1`) via an address.
    fn add_ipv6_half_route(&self, net: &str, via: Ipv6Addr) -> shell::Result<()>;
    fn delete_ipv6_half_route(&self, net: &str, via: Ipv6Addr) -> shell::Result<()>;

    /// Apply a resolver address via the platform DNS script.
    fn dns_up(&self, script: &Path, addr: IpAddr) -> shell::Result<()>;

    /// Register IPv6 resolution capability for the tunnel's local
    /// address. Must run before other interface configuration.
    fn dns_init_ipv6_resolver(
        &self,
        script: &Path,
        addr: Ipv6Addr,
        iface: &str,
    ) -> shell::Result<()>;

    /// Restore the prior resolver via the platform DNS script.
    fn dns_down(&self, script: &Path, addr: IpAddr) -> shell::Result<()>;
}

/// The platform implementation for the running OS.
#[must_use]
pub fn system_commands() -> Arc<dyn NetCommands> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(macos::MacCommands)
    }
    #[cfg(target_os = "linux")]
    {
        Arc::new(linux::LinuxCommands)
    }
}
