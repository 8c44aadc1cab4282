//! Application-wide constants and configuration values.
//!
//! This module defines all static configuration values used throughout veild,
//! including tunnel timing parameters, trigger strings, and platform paths.

// === Application Metadata ===

/// Application name (from Cargo.toml).
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
/// Current application version (from Cargo.toml).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// === Tunnel Process Triggers ===
// BE CAREFUL: constant strings matched against tunnel binary output.
// They can change after a WireGuard update.

/// Output substring signalling the tunnel process finished initialization.
pub const WG_TRIGGER_SUCCESS_INIT: &str = "UAPI listener started";
/// Output substring signalling a transient local-port conflict during
/// configuration application.
pub const WG_TRIGGER_ADDR_IN_USE: &str = "Address already in use";

// === Timing Defaults ===
// Compiled-in defaults; a subset can be overridden via config.toml.
// DaemonConfig::default() references these so there is exactly one
// source of truth.

/// Seconds to wait for the tunnel process to report successful init.
pub const INIT_TIMEOUT_SECS: u64 = 5;
/// Interface liveness monitor poll period, seconds.
pub const LIVENESS_POLL_SECS: u64 = 3;
/// Seconds between connectivity re-checks while waiting for a network.
pub const CONNECTIVITY_RETRY_SECS: u64 = 5;
/// Granularity of stop-flag checks inside timed waits, milliseconds.
pub const STOP_POLL_MS: u64 = 50;
/// Attempts for assigning tunnel interface addresses.
pub const ADDR_ASSIGN_ATTEMPTS: u32 = 5;
/// Spacing between interface address assignment attempts, seconds.
pub const ADDR_ASSIGN_RETRY_SECS: u64 = 1;
/// Total attempts for applying the tunnel configuration when the local
/// port is already in use.
pub const CONFIG_APPLY_ATTEMPTS: u32 = 5;
/// Window during which a repeated identical tunnel log line is
/// suppressed, seconds.
pub const LOG_REPEAT_SUPPRESS_SECS: u64 = 10;
/// Default timeout for latency probe commands (seconds).
pub const DEFAULT_PING_TIMEOUT: u64 = 2;

// === Connection Defaults ===

/// Default remote port for tunnel connections.
pub const DEFAULT_TUNNEL_PORT: u16 = 2049;
/// IPv4 subnet mask for the tunnel interface address.
pub const TUNNEL_SUBNET_MASK: &str = "255.0.0.0";
/// IPv4 prefix length matching [`TUNNEL_SUBNET_MASK`].
pub const TUNNEL_PREFIX_LEN: u8 = 8;
/// IPv6 prefix length for the tunnel interface address.
pub const TUNNEL_PREFIX_LEN_V6: u8 = 64;
/// Complementary IPv6 half-space routes. A more specific pair of halves
/// always outranks any pre-existing `::/0` default without requiring
/// its removal.
pub const IPV6_HALF_ROUTES: [&str; 2] = ["::/1", "8000::/1"];

// === Logging Defaults ===

/// Default maximum number of log entries kept in memory.
pub const DEFAULT_MAX_LOG_ENTRIES: usize = 1000;
/// Log category for relayed tunnel process output.
pub const TUNNEL_OUT_LOG_CATEGORY: &str = "WG_OUT";

// === Path Configuration ===

/// Config file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Server catalog snapshot file name inside the config directory.
pub const SERVERS_FILE_NAME: &str = "servers.json";
/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "VEILD_CONFIG_DIR";
/// Default config directory for the daemon.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/veild";
/// File name of the transient per-attempt tunnel configuration.
pub const WG_CONFIG_FILE_NAME: &str = "wg-tunnel.conf";

// === Platform-Specific Paths ===

/// macOS tunnel interface name prefix.
#[cfg(target_os = "macos")]
pub const TUN_INTERFACE_PREFIX: &str = "utun";
/// Linux tunnel interface name prefix.
#[cfg(target_os = "linux")]
pub const TUN_INTERFACE_PREFIX: &str = "wg";

/// Default path of the userspace tunnel binary.
pub const DEFAULT_WIREGUARD_BINARY: &str = "/usr/local/bin/wireguard-go";
/// Default path of the tunnel configuration tool.
pub const DEFAULT_WG_TOOL: &str = "/usr/local/bin/wg";

/// Default path of the platform DNS configuration script.
#[cfg(target_os = "macos")]
pub const DEFAULT_DNS_SCRIPT: &str = "/usr/local/share/veild/dns.sh";
/// Default path of the platform DNS configuration script.
#[cfg(target_os = "linux")]
pub const DEFAULT_DNS_SCRIPT: &str = "/usr/share/veild/dns.sh";

#[cfg(target_os = "macos")]
pub const ROUTE_BIN: &str = "/sbin/route";
#[cfg(target_os = "macos")]
pub const IPCONFIG_BIN: &str = "/usr/sbin/ipconfig";
#[cfg(target_os = "macos")]
pub const IFCONFIG_BIN: &str = "/sbin/ifconfig";

/// Linux network device listing directory.
#[cfg(target_os = "linux")]
pub const SYS_CLASS_NET_DIR: &str = "/sys/class/net";
