//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Privileged VPN client daemon: tunnel lifecycle, routing and DNS management
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Override config directory (default: /etc/veild)
    #[arg(
        short = 'C',
        long,
        value_name = "DIR",
        env = "VEILD_CONFIG_DIR",
        global = true
    )]
    pub config_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Establish a VPN connection. LOCATION is matched against the
    /// server catalog (see the 'servers' command)
    Connect(ConnectArgs),
    /// List the server catalog snapshot
    Servers {
        /// Only show servers supporting this protocol (WireGuard/OpenVPN, wg/ovpn)
        #[arg(short = 'p', long, value_name = "PROTOCOL")]
        protocol: Option<String>,
    },
}

/// Options of the connect command
#[derive(clap::Args, Debug, Default)]
pub struct ConnectArgs {
    /// Server location mask (gateway id, city, country or country code)
    pub location: Option<String>,

    /// When LOCATION matches more than one server, use the first found
    #[arg(long)]
    pub any: bool,

    /// Probe matching servers and connect to the fastest
    #[arg(long)]
    pub fastest: bool,

    /// Protocol filter: WireGuard/OpenVPN (short names 'wg', 'ovpn')
    #[arg(long = "fp", value_name = "PROTOCOL")]
    pub filter_protocol: Option<String>,

    /// Match LOCATION against the gateway identifier only
    #[arg(long = "fl")]
    pub filter_location: bool,

    /// Match LOCATION against the city name only
    #[arg(long = "fcity")]
    pub filter_city: bool,

    /// Match LOCATION against the country name only
    #[arg(long = "fc")]
    pub filter_country: bool,

    /// Match LOCATION against the country code only
    #[arg(long = "fcc")]
    pub filter_country_code: bool,

    /// Invert the filter
    #[arg(long)]
    pub filter_invert: bool,

    /// Exit server gateway id for a multi-hop connection (OpenVPN only;
    /// filtering does not apply to it)
    #[arg(long = "exit-svr", value_name = "GATEWAY")]
    pub exit_server: Option<String>,

    /// Custom DNS server for this connection (ignored when antitracker
    /// is enabled)
    #[arg(long, value_name = "DNS_IP")]
    pub dns: Option<String>,

    /// Enable antitracker DNS for this connection
    #[arg(long)]
    pub antitracker: bool,

    /// Enable hardened antitracker DNS for this connection
    #[arg(long = "antitracker-hard")]
    pub antitracker_hard: bool,

    /// Keep the firewall up for the duration of the connection
    #[arg(short = 'f', long)]
    pub firewall: bool,

    /// Custom tunnel MTU
    #[arg(long, value_name = "MTU")]
    pub mtu: Option<u16>,

    /// Program IPv6 tunnel addressing and routes
    #[arg(long)]
    pub ipv6: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect_flags() {
        let args = Args::parse_from([
            "veild",
            "connect",
            "new york",
            "--fcity",
            "--any",
            "--dns",
            "1.1.1.1",
            "--mtu",
            "1380",
        ]);
        let Commands::Connect(connect) = args.command else {
            panic!("expected connect command");
        };
        assert_eq!(connect.location.as_deref(), Some("new york"));
        assert!(connect.filter_city);
        assert!(connect.any);
        assert_eq!(connect.dns.as_deref(), Some("1.1.1.1"));
        assert_eq!(connect.mtu, Some(1380));
    }

    #[test]
    fn test_parse_multihop_flags() {
        let args = Args::parse_from([
            "veild",
            "connect",
            "de-fra.ovpn.example.net",
            "--exit-svr",
            "nl-ams.ovpn.example.net",
        ]);
        let Commands::Connect(connect) = args.command else {
            panic!("expected connect command");
        };
        assert_eq!(
            connect.exit_server.as_deref(),
            Some("nl-ams.ovpn.example.net")
        );
    }

    #[test]
    fn test_parse_servers_command() {
        let args = Args::parse_from(["veild", "servers", "-p", "wg"]);
        assert!(matches!(
            args.command,
            Commands::Servers { protocol: Some(p) } if p == "wg"
        ));
    }
}
