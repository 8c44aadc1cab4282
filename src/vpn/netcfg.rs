//! Network configuration for an active tunnel connection.
//!
//! Owns the [`RouteSnapshot`] and all routing/DNS bookkeeping for one
//! connection attempt. Every mutation recorded here has an exact
//! inverse applied during teardown, regardless of which programming
//! step failed. Only the connection lifecycle calls the mutating
//! methods; background tasks request reconciliation through it.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::constants;
use crate::core::TunnelEndpoints;
use crate::logger::{self, LogLevel};
use crate::platform::{NetCommands, RouteSnapshot};
use crate::shell;
use crate::utils;

const LOG_CATEGORY: &str = "NETCFG";

/// Route, DNS or addressing mutation failure.
#[derive(Debug)]
pub enum NetworkConfigError {
    /// No default gateway/interface could be detected.
    NoDefaultRoute,
    /// Assigning the tunnel interface address kept failing.
    AddressAssign {
        attempts: u32,
        source: shell::ExecError,
    },
    /// A route command failed.
    Command(shell::ExecError),
    /// The platform DNS script failed.
    DnsScript(shell::ExecError),
}

impl fmt::Display for NetworkConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDefaultRoute => write!(f, "failed to detect default gateway/interface"),
            Self::AddressAssign { attempts, source } => write!(
                f,
                "failed to set the tunnel interface address after {attempts} attempts: {source}"
            ),
            Self::Command(e) => write!(f, "route command failed: {e}"),
            Self::DnsScript(e) => write!(f, "DNS script failed: {e}"),
        }
    }
}

impl std::error::Error for NetworkConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoDefaultRoute => None,
            Self::AddressAssign { source, .. } | Self::Command(source) | Self::DnsScript(source) => {
                Some(source)
            }
        }
    }
}

/// Per-connection network configurator.
pub struct NetworkConfigurator {
    cmds: Arc<dyn NetCommands>,
    dns_script: PathBuf,
    /// Default route captured before any mutation.
    snapshot: Option<RouteSnapshot>,
    /// Host route added for the remote tunnel endpoint.
    host_route: Option<IpAddr>,
    /// Interface-scoped copy of the original default route.
    scoped_copy: Option<RouteSnapshot>,
    /// Plain default route this instance removed (to be restored).
    removed_default: Option<IpAddr>,
    /// IPv6 half-space routes added via the tunnel peer.
    v6_half_routes: Vec<(&'static str, Ipv6Addr)>,
    /// Resolver address applied via the DNS script.
    dns_applied: Option<IpAddr>,
    /// Spacing between address assignment attempts.
    addr_retry_delay: Duration,
}

impl NetworkConfigurator {
    #[must_use]
    pub fn new(cmds: Arc<dyn NetCommands>, dns_script: PathBuf) -> Self {
        Self {
            cmds,
            dns_script,
            snapshot: None,
            host_route: None,
            scoped_copy: None,
            removed_default: None,
            v6_half_routes: Vec::new(),
            dns_applied: None,
            addr_retry_delay: Duration::from_secs(constants::ADDR_ASSIGN_RETRY_SECS),
        }
    }

    /// Whether the system currently has a usable default route.
    #[must_use]
    pub fn has_connectivity(&self) -> bool {
        self.cmds.default_route().is_some()
    }

    /// Capture the current default gateway/interface before mutating
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkConfigError::NoDefaultRoute`] when detection
    /// fails.
    pub fn capture_snapshot(&mut self) -> Result<RouteSnapshot, NetworkConfigError> {
        let snapshot = self
            .cmds
            .default_route()
            .ok_or(NetworkConfigError::NoDefaultRoute)?;
        logger::log(
            LogLevel::Info,
            LOG_CATEGORY,
            format!(
                "Default route: {} via {}",
                snapshot.interface, snapshot.gateway
            ),
        );
        self.snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Register IPv6 resolution capability for the tunnel's local
    /// address. Runs before other interface configuration since
    /// ordering affects resolver readiness. Failure is logged, not
    /// escalated.
    pub fn init_ipv6_resolver(&self, endpoints: &TunnelEndpoints, iface: &str) {
        if let Some(addr) = endpoints.client_local_ipv6 {
            if let Err(e) = self.cmds.dns_init_ipv6_resolver(&self.dns_script, addr, iface) {
                logger::log(
                    LogLevel::Error,
                    LOG_CATEGORY,
                    format!("Failed to initialize IPv6 DNS resolver: {e}"),
                );
            }
        }
    }

    /// Assign tunnel interface addressing: mandatory IPv4, optional
    /// IPv6, each with bounded retry tolerant of transient busy errors.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkConfigError::AddressAssign`] when attempts are
    /// exhausted.
    pub fn assign_addresses(
        &self,
        iface: &str,
        endpoints: &TunnelEndpoints,
        stop: &AtomicBool,
    ) -> Result<(), NetworkConfigError> {
        logger::log(
            LogLevel::Info,
            LOG_CATEGORY,
            format!("Configuring {iface} interface..."),
        );

        self.assign_with_retry(stop, |cmds| {
            cmds.assign_ipv4(iface, endpoints.client_local_ip)
        })?;

        if let Some(addr) = endpoints.client_local_ipv6 {
            self.assign_with_retry(stop, |cmds| cmds.assign_ipv6(iface, addr))?;
        }

        Ok(())
    }

    fn assign_with_retry<F>(&self, stop: &AtomicBool, op: F) -> Result<(), NetworkConfigError>
    where
        F: Fn(&dyn NetCommands) -> shell::Result<()>,
    {
        let mut last_err = None;
        for attempt in 0..constants::ADDR_ASSIGN_ATTEMPTS {
            if attempt > 0 {
                utils::sleep_cancellable(
                    self.addr_retry_delay,
                    Duration::from_millis(constants::STOP_POLL_MS),
                    stop,
                );
            }
            if stop.load(std::sync::atomic::Ordering::SeqCst) {
                break;
            }
            match op(self.cmds.as_ref()) {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }

        match last_err {
            Some(source) => Err(NetworkConfigError::AddressAssign {
                attempts: constants::ADDR_ASSIGN_ATTEMPTS,
                source,
            }),
            // Stopped before the first attempt; nothing was assigned
            None => Ok(()),
        }
    }

    /// Apply a custom MTU to the tunnel interface.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkConfigError::Command`] on failure.
    pub fn apply_mtu(&self, iface: &str, mtu: u16) -> Result<(), NetworkConfigError> {
        logger::log(
            LogLevel::Info,
            LOG_CATEGORY,
            format!("Configuring custom MTU = {mtu} ..."),
        );
        self.cmds
            .set_mtu(iface, mtu)
            .map_err(NetworkConfigError::Command)
    }

    /// Program the connection's routes, in order:
    /// host route to the remote endpoint (skipped for loopback), an
    /// interface-scoped copy of the original default, removal of the
    /// plain default, a new default through the tunnel interface, and
    /// the IPv6 half-space pair when IPv6 is enabled.
    ///
    /// Each successful step is recorded so teardown reverses exactly
    /// what was added.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkConfigError`] on the first failing step; steps
    /// already applied stay recorded for teardown.
    pub fn set_routes(
        &mut self,
        iface: &str,
        endpoints: &TunnelEndpoints,
    ) -> Result<(), NetworkConfigError> {
        logger::log(LogLevel::Info, LOG_CATEGORY, "Modifying routing table...");

        let snapshot = self
            .snapshot
            .clone()
            .ok_or(NetworkConfigError::NoDefaultRoute)?;

        // Host route to the remote endpoint via the pre-existing
        // gateway; never for a loopback endpoint
        if endpoints.host != IpAddr::V4(Ipv4Addr::LOCALHOST) {
            self.cmds
                .add_host_route(endpoints.host, snapshot.gateway)
                .map_err(NetworkConfigError::Command)?;
            self.host_route = Some(endpoints.host);
        }

        self.cmds
            .add_scoped_default_route(snapshot.gateway, &snapshot.interface)
            .map_err(NetworkConfigError::Command)?;
        self.scoped_copy = Some(snapshot.clone());

        self.cmds
            .delete_default_route(snapshot.gateway)
            .map_err(NetworkConfigError::Command)?;
        self.removed_default = Some(snapshot.gateway);

        self.cmds
            .add_default_route_via_interface(iface)
            .map_err(NetworkConfigError::Command)?;

        if let Some(peer) = endpoints.host_local_ipv6 {
            for net in constants::IPV6_HALF_ROUTES {
                self.cmds
                    .add_ipv6_half_route(net, peer)
                    .map_err(NetworkConfigError::Command)?;
                self.v6_half_routes.push((net, peer));
            }
        }

        Ok(())
    }

    /// Restore the routing table, reversing exactly the routes this
    /// instance added. Best-effort: each removal/re-add is attempted
    /// independently and failures are logged, because partial
    /// restoration is preferable to none.
    pub fn remove_routes(&mut self) {
        if self.host_route.is_none()
            && self.scoped_copy.is_none()
            && self.removed_default.is_none()
            && self.v6_half_routes.is_empty()
        {
            return;
        }
        logger::log(LogLevel::Info, LOG_CATEGORY, "Restoring routing table...");

        if let Some(dest) = self.host_route.take() {
            if let Err(e) = self.cmds.delete_host_route(dest) {
                logger::log(
                    LogLevel::Warning,
                    LOG_CATEGORY,
                    format!("Failed to delete route to remote server: {e}"),
                );
            }
        }

        if let Some(copy) = self.scoped_copy.take() {
            if let Err(e) = self
                .cmds
                .delete_scoped_default_route(copy.gateway, &copy.interface)
            {
                logger::log(
                    LogLevel::Warning,
                    LOG_CATEGORY,
                    format!("Failed to delete scoped default route: {e}"),
                );
            }
        }

        // The default route through the tunnel interface is not
        // removed manually: it dies with the interface, and removing
        // it while the OS is switching networks can leave the system
        // unable to initialise a new default route.

        if let Some(gateway) = self.removed_default.take() {
            if let Err(e) = self.cmds.add_default_route(gateway) {
                logger::log(
                    LogLevel::Warning,
                    LOG_CATEGORY,
                    format!("Failed to restore default route: {e}"),
                );
            }
        }

        for (net, peer) in std::mem::take(&mut self.v6_half_routes) {
            if let Err(e) = self.cmds.delete_ipv6_half_route(net, peer) {
                logger::log(
                    LogLevel::Warning,
                    LOG_CATEGORY,
                    format!("Failed to delete {net} route: {e}"),
                );
            }
        }
    }

    /// Apply the resolver configuration for this connection.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkConfigError::DnsScript`] on failure.
    pub fn set_dns(&mut self, addr: IpAddr) -> Result<(), NetworkConfigError> {
        logger::log(
            LogLevel::Info,
            LOG_CATEGORY,
            format!("Updating DNS server to {addr}..."),
        );
        self.cmds
            .dns_up(&self.dns_script, addr)
            .map_err(NetworkConfigError::DnsScript)?;
        self.dns_applied = Some(addr);
        Ok(())
    }

    /// Restore the prior resolver. Best-effort; a no-op when DNS was
    /// never applied.
    pub fn remove_dns(&mut self) {
        if let Some(addr) = self.dns_applied.take() {
            logger::log(LogLevel::Info, LOG_CATEGORY, "Restoring DNS server.");
            if let Err(e) = self.cmds.dns_down(&self.dns_script, addr) {
                logger::log(
                    LogLevel::Warning,
                    LOG_CATEGORY,
                    format!("Failed to restore DNS: {e}"),
                );
            }
        }
    }

    /// Reconcile routes after an external default-route change.
    ///
    /// No-op while paused, when detection fails, or when the default
    /// already points at the tunnel's own path; otherwise the
    /// previously programmed routes are removed and reprogrammed
    /// against the new default gateway/interface (handles roaming
    /// between networks without a full reconnect).
    pub fn reconcile(&mut self, iface: &str, endpoints: &TunnelEndpoints, paused: bool) {
        if paused {
            return;
        }

        let Some(new_route) = self.cmds.default_route() else {
            logger::log(
                LogLevel::Warning,
                LOG_CATEGORY,
                "Routing changed: unable to detect default gateway/interface",
            );
            return;
        };

        if new_route.gateway == IpAddr::V4(endpoints.host_local_ip) || new_route.interface == iface
        {
            // The default already goes through the tunnel path
            return;
        }

        let old = self.snapshot.clone();
        logger::log(
            LogLevel::Info,
            LOG_CATEGORY,
            format!(
                "Default gateway changed: {} -> {}({}). Updating routes...",
                old.map_or_else(|| "?".to_string(), |s| format!("{}({})", s.gateway, s.interface)),
                new_route.gateway,
                new_route.interface
            ),
        );

        self.remove_routes();
        self.snapshot = Some(new_route);
        if let Err(e) = self.set_routes(iface, endpoints) {
            logger::log(
                LogLevel::Error,
                LOG_CATEGORY,
                format!("Failed to reprogram routes: {e}"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::str::FromStr;
    use std::sync::Mutex;

    /// Records every command and fails those whose name is listed.
    struct FakeNet {
        log: Mutex<Vec<String>>,
        fail_ops: Vec<&'static str>,
        route: Mutex<Option<RouteSnapshot>>,
    }

    impl FakeNet {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                log: Mutex::new(Vec::new()),
                fail_ops: Vec::new(),
                route: Mutex::new(Some(RouteSnapshot {
                    gateway: IpAddr::from_str("192.168.1.1").unwrap(),
                    interface: "en0".to_string(),
                })),
            })
        }

        fn failing(ops: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                log: Mutex::new(Vec::new()),
                fail_ops: ops,
                route: Mutex::new(Some(RouteSnapshot {
                    gateway: IpAddr::from_str("192.168.1.1").unwrap(),
                    interface: "en0".to_string(),
                })),
            })
        }

        fn record(&self, op: &str, detail: String) -> shell::Result<()> {
            self.log.lock().unwrap().push(format!("{op} {detail}"));
            if self.fail_ops.contains(&op) {
                Err(shell::ExecError::ExitStatus {
                    program: op.to_string(),
                    code: Some(1),
                    stderr: "injected".to_string(),
                })
            } else {
                Ok(())
            }
        }

        fn ops(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn set_route(&self, route: Option<RouteSnapshot>) {
            *self.route.lock().unwrap() = route;
        }
    }

    impl NetCommands for FakeNet {
        fn default_route(&self) -> Option<RouteSnapshot> {
            self.route.lock().unwrap().clone()
        }
        fn list_interfaces(&self) -> shell::Result<Vec<String>> {
            Ok(Vec::new())
        }
        fn interface_is_up(&self, _name: &str) -> Option<bool> {
            Some(true)
        }
        fn assign_ipv4(&self, iface: &str, addr: Ipv4Addr) -> shell::Result<()> {
            self.record("assign_ipv4", format!("{iface} {addr}"))
        }
        fn assign_ipv6(&self, iface: &str, addr: Ipv6Addr) -> shell::Result<()> {
            self.record("assign_ipv6", format!("{iface} {addr}"))
        }
        fn set_mtu(&self, iface: &str, mtu: u16) -> shell::Result<()> {
            self.record("set_mtu", format!("{iface} {mtu}"))
        }
        fn add_host_route(&self, dest: IpAddr, gateway: IpAddr) -> shell::Result<()> {
            self.record("add_host_route", format!("{dest} via {gateway}"))
        }
        fn delete_host_route(&self, dest: IpAddr) -> shell::Result<()> {
            self.record("delete_host_route", dest.to_string())
        }
        fn add_scoped_default_route(&self, gateway: IpAddr, iface: &str) -> shell::Result<()> {
            self.record("add_scoped_default_route", format!("{gateway} {iface}"))
        }
        fn delete_scoped_default_route(&self, gateway: IpAddr, iface: &str) -> shell::Result<()> {
            self.record("delete_scoped_default_route", format!("{gateway} {iface}"))
        }
        fn add_default_route(&self, gateway: IpAddr) -> shell::Result<()> {
            self.record("add_default_route", gateway.to_string())
        }
        fn delete_default_route(&self, gateway: IpAddr) -> shell::Result<()> {
            self.record("delete_default_route", gateway.to_string())
        }
        fn add_default_route_via_interface(&self, iface: &str) -> shell::Result<()> {
            self.record("add_default_route_via_interface", iface.to_string())
        }
        fn add_ipv6_half_route(&self, net: &str, via: Ipv6Addr) -> shell::Result<()> {
            self.record("add_ipv6_half_route", format!("{net} via {via}"))
        }
        fn delete_ipv6_half_route(&self, net: &str, via: Ipv6Addr) -> shell::Result<()> {
            self.record("delete_ipv6_half_route", format!("{net} via {via}"))
        }
        fn dns_up(&self, _script: &Path, addr: IpAddr) -> shell::Result<()> {
            self.record("dns_up", addr.to_string())
        }
        fn dns_init_ipv6_resolver(
            &self,
            _script: &Path,
            addr: Ipv6Addr,
            iface: &str,
        ) -> shell::Result<()> {
            self.record("dns_init_ipv6_resolver", format!("{addr} {iface}"))
        }
        fn dns_down(&self, _script: &Path, addr: IpAddr) -> shell::Result<()> {
            self.record("dns_down", addr.to_string())
        }
    }

    fn endpoints(ipv6: bool) -> TunnelEndpoints {
        TunnelEndpoints {
            host: IpAddr::from_str("145.239.239.55").unwrap(),
            public_key: "pk".to_string(),
            host_local_ip: Ipv4Addr::new(172, 16, 0, 1),
            client_local_ip: Ipv4Addr::new(172, 26, 112, 75),
            client_private_key: "sk".to_string(),
            client_local_ipv6: if ipv6 {
                Some(Ipv6Addr::from_str("fd00::2").unwrap())
            } else {
                None
            },
            host_local_ipv6: if ipv6 {
                Some(Ipv6Addr::from_str("fd00::1").unwrap())
            } else {
                None
            },
        }
    }

    fn configurator(fake: &Arc<FakeNet>) -> NetworkConfigurator {
        let mut cfg = NetworkConfigurator::new(
            Arc::clone(fake) as Arc<dyn NetCommands>,
            PathBuf::from("/tmp/dns.sh"),
        );
        cfg.addr_retry_delay = Duration::from_millis(1);
        cfg
    }

    #[test]
    fn test_set_routes_order() {
        let fake = FakeNet::new();
        let mut cfg = configurator(&fake);
        cfg.capture_snapshot().unwrap();
        cfg.set_routes("utun5", &endpoints(true)).unwrap();

        let ops: Vec<String> = fake
            .ops()
            .iter()
            .map(|op| op.split_whitespace().next().unwrap().to_string())
            .collect();
        assert_eq!(
            ops,
            vec![
                "add_host_route",
                "add_scoped_default_route",
                "delete_default_route",
                "add_default_route_via_interface",
                "add_ipv6_half_route",
                "add_ipv6_half_route",
            ]
        );
    }

    #[test]
    fn test_loopback_endpoint_skips_host_route() {
        let fake = FakeNet::new();
        let mut cfg = configurator(&fake);
        cfg.capture_snapshot().unwrap();

        let mut eps = endpoints(false);
        eps.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        cfg.set_routes("utun5", &eps).unwrap();

        assert!(!fake.ops().iter().any(|op| op.starts_with("add_host_route")));
    }

    #[test]
    fn test_teardown_reverses_exactly_what_was_added() {
        let fake = FakeNet::new();
        let mut cfg = configurator(&fake);
        cfg.capture_snapshot().unwrap();
        cfg.set_routes("utun5", &endpoints(true)).unwrap();
        fake.log.lock().unwrap().clear();

        cfg.remove_routes();
        let ops = fake.ops();
        assert!(ops.iter().any(|op| op.starts_with("delete_host_route 145.239.239.55")));
        assert!(ops
            .iter()
            .any(|op| op.starts_with("delete_scoped_default_route 192.168.1.1 en0")));
        assert!(ops.iter().any(|op| op.starts_with("add_default_route 192.168.1.1")));
        assert_eq!(
            ops.iter()
                .filter(|op| op.starts_with("delete_ipv6_half_route"))
                .count(),
            2
        );
        // The tunnel default route dies with the interface; no
        // teardown op may reference it
        assert!(!ops.iter().any(|op| op.contains("utun5")));
    }

    #[test]
    fn test_teardown_after_injected_failure_removes_only_added_routes() {
        // delete_default_route fails: the plain default was never
        // removed, so teardown must not re-add it
        let fake = FakeNet::failing(vec!["delete_default_route"]);
        let mut cfg = configurator(&fake);
        cfg.capture_snapshot().unwrap();

        let err = cfg.set_routes("utun5", &endpoints(true)).unwrap_err();
        assert!(matches!(err, NetworkConfigError::Command(_)));
        fake.log.lock().unwrap().clear();

        cfg.remove_routes();
        let ops = fake.ops();
        assert!(ops.iter().any(|op| op.starts_with("delete_host_route")));
        assert!(ops.iter().any(|op| op.starts_with("delete_scoped_default_route")));
        assert!(!ops.iter().any(|op| op.starts_with("add_default_route ")));
        assert!(!ops.iter().any(|op| op.starts_with("delete_ipv6_half_route")));
    }

    #[test]
    fn test_remove_routes_is_idempotent() {
        let fake = FakeNet::new();
        let mut cfg = configurator(&fake);
        cfg.capture_snapshot().unwrap();
        cfg.set_routes("utun5", &endpoints(false)).unwrap();

        cfg.remove_routes();
        fake.log.lock().unwrap().clear();
        cfg.remove_routes();
        assert!(fake.ops().is_empty());
    }

    #[test]
    fn test_dns_set_and_restore() {
        let fake = FakeNet::new();
        let mut cfg = configurator(&fake);
        let addr = IpAddr::from_str("10.0.254.2").unwrap();

        cfg.set_dns(addr).unwrap();
        cfg.remove_dns();
        cfg.remove_dns(); // second restore is a no-op

        let ops = fake.ops();
        assert_eq!(ops, vec!["dns_up 10.0.254.2", "dns_down 10.0.254.2"]);
    }

    #[test]
    fn test_assign_addresses_retries_then_fails() {
        let fake = FakeNet::failing(vec!["assign_ipv4"]);
        let cfg = configurator(&fake);
        let stop = AtomicBool::new(false);

        let err = cfg
            .assign_addresses("utun5", &endpoints(false), &stop)
            .unwrap_err();
        assert!(matches!(
            err,
            NetworkConfigError::AddressAssign { attempts: 5, .. }
        ));
        assert_eq!(fake.ops().len(), constants::ADDR_ASSIGN_ATTEMPTS as usize);
    }

    #[test]
    fn test_assign_addresses_stop_skips_attempts() {
        let fake = FakeNet::failing(vec!["assign_ipv4"]);
        let cfg = configurator(&fake);
        let stop = AtomicBool::new(true);

        // Stop already requested: no attempt is made and nothing needs
        // to be unwound, so the call reports success
        assert!(cfg.assign_addresses("utun5", &endpoints(false), &stop).is_ok());
        assert!(fake.ops().is_empty());
    }

    #[test]
    fn test_reconcile_noop_while_paused() {
        let fake = FakeNet::new();
        let mut cfg = configurator(&fake);
        cfg.capture_snapshot().unwrap();
        cfg.set_routes("utun5", &endpoints(false)).unwrap();
        fake.log.lock().unwrap().clear();

        cfg.reconcile("utun5", &endpoints(false), true);
        assert!(fake.ops().is_empty());
    }

    #[test]
    fn test_reconcile_noop_when_default_is_tunnel_path() {
        let fake = FakeNet::new();
        let mut cfg = configurator(&fake);
        cfg.capture_snapshot().unwrap();
        cfg.set_routes("utun5", &endpoints(false)).unwrap();

        fake.set_route(Some(RouteSnapshot {
            gateway: IpAddr::from_str("10.9.9.9").unwrap(),
            interface: "utun5".to_string(),
        }));
        fake.log.lock().unwrap().clear();

        cfg.reconcile("utun5", &endpoints(false), false);
        assert!(fake.ops().is_empty());
    }

    #[test]
    fn test_reconcile_reprograms_against_new_gateway() {
        let fake = FakeNet::new();
        let mut cfg = configurator(&fake);
        cfg.capture_snapshot().unwrap();
        cfg.set_routes("utun5", &endpoints(false)).unwrap();

        // Roamed to a different network
        fake.set_route(Some(RouteSnapshot {
            gateway: IpAddr::from_str("10.0.0.1").unwrap(),
            interface: "en1".to_string(),
        }));
        fake.log.lock().unwrap().clear();

        cfg.reconcile("utun5", &endpoints(false), false);
        let ops = fake.ops();
        // Old routes removed against the old gateway
        assert!(ops
            .iter()
            .any(|op| op.starts_with("delete_scoped_default_route 192.168.1.1 en0")));
        // New routes programmed against the new gateway
        assert!(ops
            .iter()
            .any(|op| op.starts_with("add_scoped_default_route 10.0.0.1 en1")));
        assert!(ops.iter().any(|op| op.starts_with("add_host_route 145.239.239.55 via 10.0.0.1")));
    }
}
