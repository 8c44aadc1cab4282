//! Linux network commands via `ip` and `/sys/class/net`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::str::FromStr;

use crate::constants;
use crate::platform::{NetCommands, RouteSnapshot};
use crate::shell;

const LOG_CATEGORY: &str = "NETCMD";

/// Metric of the preserved copy of the original default route. High
/// enough that the tunnel default route always outranks it.
const SCOPED_DEFAULT_METRIC: &str = "512";

/// Linux implementation of [`NetCommands`].
pub struct LinuxCommands;

impl NetCommands for LinuxCommands {
    fn default_route(&self) -> Option<RouteSnapshot> {
        let output = shell::output("ip", &["route", "show", "default"])?;
        if !output.status.success() {
            return None;
        }

        // "default via 192.168.1.1 dev eth0 proto dhcp metric 100"
        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let gateway = parts
                .windows(2)
                .find(|w| w[0] == "via")
                .and_then(|w| IpAddr::from_str(w[1]).ok());
            let interface = parts
                .windows(2)
                .find(|w| w[0] == "dev")
                .map(|w| w[1].to_string());
            if let (Some(gateway), Some(interface)) = (gateway, interface) {
                return Some(RouteSnapshot { gateway, interface });
            }
        }
        None
    }

    fn list_interfaces(&self) -> shell::Result<Vec<String>> {
        let entries =
            std::fs::read_dir(constants::SYS_CLASS_NET_DIR).map_err(|e| shell::ExecError::Io {
                program: constants::SYS_CLASS_NET_DIR.to_string(),
                source: e,
            })?;
        Ok(entries
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect())
    }

    fn interface_is_up(&self, name: &str) -> Option<bool> {
        // IFF_UP is bit 0 of the interface flags
        let path = format!("{}/{name}/flags", constants::SYS_CLASS_NET_DIR);
        let content = std::fs::read_to_string(path).ok()?;
        let flags = u32::from_str_radix(content.trim().trim_start_matches("0x"), 16).ok()?;
        Some(flags & 0x1 != 0)
    }

    fn assign_ipv4(&self, iface: &str, addr: Ipv4Addr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            "ip",
            &[
                "address",
                "replace",
                &format!("{addr}/{}", constants::TUNNEL_PREFIX_LEN),
                "dev",
                iface,
            ],
        )?;
        shell::exec(LOG_CATEGORY, "ip", &["link", "set", iface, "up"])
    }

    fn assign_ipv6(&self, iface: &str, addr: Ipv6Addr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            "ip",
            &[
                "-6",
                "address",
                "replace",
                &format!("{addr}/{}", constants::TUNNEL_PREFIX_LEN_V6),
                "dev",
                iface,
            ],
        )
    }

    fn set_mtu(&self, iface: &str, mtu: u16) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            "ip",
            &["link", "set", iface, "mtu", &mtu.to_string()],
        )
    }

    fn add_host_route(&self, dest: IpAddr, gateway: IpAddr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            "ip",
            &["route", "add", &dest.to_string(), "via", &gateway.to_string()],
        )
    }

    fn delete_host_route(&self, dest: IpAddr) -> shell::Result<()> {
        shell::exec(LOG_CATEGORY, "ip", &["route", "del", &dest.to_string()])
    }

    fn add_scoped_default_route(&self, gateway: IpAddr, iface: &str) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            "ip",
            &[
                "route",
                "add",
                "default",
                "via",
                &gateway.to_string(),
                "dev",
                iface,
                "metric",
                SCOPED_DEFAULT_METRIC,
            ],
        )
    }

    fn delete_scoped_default_route(&self, gateway: IpAddr, iface: &str) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            "ip",
            &[
                "route",
                "del",
                "default",
                "via",
                &gateway.to_string(),
                "dev",
                iface,
                "metric",
                SCOPED_DEFAULT_METRIC,
            ],
        )
    }

    fn add_default_route(&self, gateway: IpAddr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            "ip",
            &["route", "add", "default", "via", &gateway.to_string()],
        )
    }

    fn delete_default_route(&self, gateway: IpAddr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            "ip",
            &["route", "del", "default", "via", &gateway.to_string()],
        )
    }

    fn add_default_route_via_interface(&self, iface: &str) -> shell::Result<()> {
        shell::exec(LOG_CATEGORY, "ip", &["route", "add", "default", "dev", iface])
    }

    fn add_ipv6_half_route(&self, net: &str, via: Ipv6Addr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            "ip",
            &["-6", "route", "add", net, "via", &via.to_string()],
        )
    }

    fn delete_ipv6_half_route(&self, net: &str, via: Ipv6Addr) -> shell::Result<()> {
        shell::exec(
            LOG_CATEGORY,
            "ip",
            &["-6", "route", "del", net, "via", &via.to_string()],
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
