//! macOS network commands via route, ipconfig and ifconfig.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::str::FromStr;

use crate::constants;
use crate::platform::{NetCommands, RouteSnapshot};
use crate::shell;

const LOG_CATEGORY: &str = "NETCMD";

/// macOS implementation of [`NetCommands`].
pub struct MacCommands;

impl NetCommands for MacCommands {
    fn default_route(&self) -> Option<RouteSnapshot> {
        let output = shell::output(constants::ROUTE_BIN, &["-n", "get", "default"])?;
        if !output.status.success() {
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut gateway = None;
        let mut interface = None;
        for line in stdout.lines() {
            let line = line.trim();
            if let Some(v) = line.strip_prefix("gateway:") {
                gateway = IpAddr::from_str(v.trim()).ok();
            }
            if let Some(v) = line.strip_prefix("interface:") {
                interface = Some(v.trim().to_string());
            }
        }

        match (gateway, interface) {
            (Some(gateway), Some(interface)) if !interface.is_empty() => Some(RouteSnapshot {
                gateway,
                interface,
            }),
            _ => None,
        }
    }

    fn list_interfaces(&self) -> shell::Result<Vec<String>> {
        let output = shell::output(constants::IFCONFIG_BIN, &["-l"]).ok_or_else(|| {
            shell::ExecError::Io {
                program: constants::IFCONFIG_BIN.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "spawn failed"),
            }
        })?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .map(ToString::to_string)
            .collect())
    }

    fn interface_is_up(&self, name: &str) -> Option<bool> {
        let output = shell::output(constants::IFCONFIG_BIN, &[name])?;
        if !output.status.success() {
            return None;
        }
        // "utun3: flags=8051<UP,POINTOPOINT,RUNNING,MULTICAST> mtu 1420"
        let stdout = String::from_utf8_lossy(&output.stdout);
        let first = stdout.lines().next()?;
        let flags = first.split("flags=").nth(1)?;
        Some(flags.contains("UP"))
    }

    fn assign_ipv4(&self, iface: &str, addr: Ipv4Addr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            constants::IPCONFIG_BIN,
            &[
                "set",
                iface,
                "MANUAL",
                &addr.to_string(),
                constants::TUNNEL_SUBNET_MASK,
            ],
        )
    }

    fn assign_ipv6(&self, iface: &str, addr: Ipv6Addr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            constants::IPCONFIG_BIN,
            &[
                "set",
                iface,
                "MANUAL-V6",
                &addr.to_string(),
                &constants::TUNNEL_PREFIX_LEN_V6.to_string(),
            ],
        )
    }

    fn set_mtu(&self, iface: &str, mtu: u16) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            constants::IFCONFIG_BIN,
            &[iface, "mtu", &mtu.to_string()],
        )
    }

    fn add_host_route(&self, dest: IpAddr, gateway: IpAddr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            constants::ROUTE_BIN,
            &["-n", "add", "-inet", &dest.to_string(), &gateway.to_string()],
        )
    }

    fn delete_host_route(&self, dest: IpAddr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            constants::ROUTE_BIN,
            &["-n", "delete", "-inet", &dest.to_string()],
        )
    }

    fn add_scoped_default_route(&self, gateway: IpAddr, iface: &str) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            constants::ROUTE_BIN,
            &[
                "-n",
                "add",
                "-inet",
                "default",
                &gateway.to_string(),
                "-ifscope",
                iface,
            ],
        )
    }

    fn delete_scoped_default_route(&self, gateway: IpAddr, iface: &str) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            constants::ROUTE_BIN,
            &[
                "-n",
                "delete",
                "-inet",
                "default",
                &gateway.to_string(),
                "-ifscope",
                iface,
            ],
        )
    }

    fn add_default_route(&self, gateway: IpAddr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            constants::ROUTE_BIN,
            &["-n", "add", "-inet", "default", &gateway.to_string()],
        )
    }

    fn delete_default_route(&self, gateway: IpAddr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            constants::ROUTE_BIN,
            &["-n", "delete", "-inet", "default", &gateway.to_string()],
        )
    }

    fn add_default_route_via_interface(&self, iface: &str) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            constants::ROUTE_BIN,
            &["-n", "add", "-inet", "default", "-interface", iface],
        )
    }

    fn add_ipv6_half_route(&self, net: &str, via: Ipv6Addr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            constants::ROUTE_BIN,
            &["-n", "add", "-inet6", "-net", net, &via.to_string()],
        )
    }

    fn delete_ipv6_half_route(&self, net: &str, via: Ipv6Addr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            constants::ROUTE_BIN,
            &["-n", "delete", "-inet6", "-net", net, &via.to_string()],
        )
    }

    fn dns_up(&self, script: &Path, addr: IpAddr) -> shell::Result<()> {
        shell::exec(
            "DNS",
            &script.to_string_lossy(),
            &["-up_set_dns", &addr.to_string()],
        )
    }

    fn dns_init_ipv6_resolver(
        &self,
        script: &Path,
        addr: Ipv6Addr,
        iface: &str,
    ) -> shell::Result<()> {
        shell::exec(
            "DNS",
            &script.to_string_lossy(),
            &["-up_init_ipv6_resolver", &addr.to_string(), iface],
        )
    }

    fn dns_down(&self, script: &Path, addr: IpAddr) -> shell::Result<()> {
        shell::exec("DNS", &script.to_string_lossy(), &["-down", &addr.to_string()])
    }
}
