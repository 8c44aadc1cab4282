//! CLI command handlers.

use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::catalog::ServersSnapshot;
use crate::cli::args::{Commands, ConnectArgs};
use crate::config::DaemonConfig;
use crate::core::{self, ConnectOptions, FilterOptions, Hop, PingProber};
use crate::state::Protocol;
use crate::utils;
use crate::vpn::{ConnectError, Tunnel};

/// Dispatch a parsed CLI command.
///
/// # Errors
///
/// Returns an error when the command fails; the caller reports it and
/// sets the exit status.
pub fn handle_command(
    command: &Commands,
    config: &DaemonConfig,
    config_dir: &Path,
) -> Result<()> {
    match command {
        Commands::Servers { protocol } => handle_servers(config, config_dir, protocol.as_deref()),
        Commands::Connect(args) => handle_connect(args, config, config_dir),
    }
}

/// List the server catalog snapshot.
fn handle_servers(
    config: &DaemonConfig,
    config_dir: &Path,
    protocol: Option<&str>,
) -> Result<()> {
    let protocol = match protocol {
        Some(flag) => Some(
            Protocol::parse_flag(flag)
                .ok_or_else(|| eyre!("unknown protocol '{flag}' (use 'wg' or 'ovpn')"))?,
        ),
        None => None,
    };

    let snapshot = ServersSnapshot::load(&config.servers_path(config_dir))?;
    let mut count = 0;
    for record in snapshot.all_servers() {
        if let Some(protocol) = protocol {
            if !record.supports(protocol) {
                continue;
            }
        }
        let protocols: Vec<String> = record.protocols().iter().map(ToString::to_string).collect();
        println!(
            "{:<28} {:<18} {:<4} {}",
            record.gateway,
            record.city,
            record.country_code,
            protocols.join("/")
        );
        count += 1;
    }
    println!("\n{count} servers");
    Ok(())
}

fn connect_options(args: &ConnectArgs, config: &DaemonConfig) -> Result<ConnectOptions> {
    let client_ip = match &config.wg_client_ip {
        Some(s) => Some(
            Ipv4Addr::from_str(s)
                .map_err(|_| eyre!("invalid wg_client_ip '{s}' in config.toml"))?,
        ),
        None => None,
    };

    let filter_protocol = match &args.filter_protocol {
        Some(flag) => Some(
            Protocol::parse_flag(flag)
                .ok_or_else(|| eyre!("unknown protocol '{flag}' (use 'wg' or 'ovpn')"))?,
        ),
        None => None,
    };

    Ok(ConnectOptions {
        location: args.location.clone().unwrap_or_default(),
        any: args.any,
        fastest: args.fastest,
        filter: FilterOptions {
            protocol: filter_protocol,
            location: args.filter_location,
            city: args.filter_city,
            country: args.filter_country,
            country_code: args.filter_country_code,
            invert: args.filter_invert,
        },
        exit_server: args.exit_server.clone().unwrap_or_default(),
        dns: args.dns.clone(),
        antitracker: args.antitracker,
        antitracker_hardcore: args.antitracker_hard,
        firewall_during_connection: args.firewall,
        mtu: args.mtu,
        port: Some(config.tunnel_port),
        client_ip,
        client_private_key: config.wg_private_key.clone(),
        enable_ipv6: args.ipv6 || config.enable_ipv6,
    })
}

/// Resolve the selection, build the plan and run the connection until
/// it terminates (Ctrl-C disconnects).
fn handle_connect(args: &ConnectArgs, config: &DaemonConfig, config_dir: &Path) -> Result<()> {
    if !utils::is_root() {
        return Err(eyre!("establishing a connection requires root privileges"));
    }

    let snapshot = ServersSnapshot::load(&config.servers_path(config_dir))?;
    let opts = connect_options(args, config)?;
    let prober = PingProber {
        timeout_secs: config.ping_timeout,
    };

    let plan = core::build_plan(&snapshot, &opts, &prober).map_err(|e| eyre!("{e}"))?;

    match &plan.hop {
        Hop::Single(server) => println!(
            "[{}] Connecting to: {}, {} ({}) {}...",
            plan.protocol, server.city, server.country_code, server.country, server.gateway
        ),
        Hop::Multi { entry, exit } => {
            println!("[{}] Connecting Multi-Hop...", plan.protocol);
            println!(
                "\tentry server: {}, {} ({}) {}",
                entry.city, entry.country_code, entry.country, entry.gateway
            );
            println!(
                "\texit server : {}, {} ({}) {}",
                exit.city, exit.country_code, exit.country, exit.gateway
            );
        }
    }

    if plan.firewall_during_connection {
        crate::log_info!(
            "CLI",
            "Firewall stays up for the duration of the connection"
        );
    }

    let tunnel = Arc::new(Tunnel::new(
        config.tunnel_paths(config_dir),
        crate::platform::system_commands(),
    ));
    let controller = tunnel.controller();
    let (events_tx, events_rx) = mpsc::sync_channel(0);

    install_sigint_handler();
    std::thread::spawn(move || loop {
        if SIGINT_RECEIVED.swap(false, Ordering::SeqCst) {
            eprintln!("Disconnecting...");
            controller.disconnect();
        }
        std::thread::sleep(Duration::from_millis(100));
    });

    let worker = {
        let tunnel = Arc::clone(&tunnel);
        std::thread::spawn(move || tunnel.connect(&plan, &events_tx))
    };

    for event in events_rx {
        println!("=> {event}");
    }

    match worker.join().map_err(|_| eyre!("connection thread panicked"))? {
        Ok(()) => Ok(()),
        Err(ConnectError::ReconnectionRequired) => {
            println!("Reconnection required; re-issue the connect command.");
            Ok(())
        }
        Err(e) => Err(eyre!("failed to connect: {e}")),
    }
}

static SIGINT_RECEIVED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
#[allow(unsafe_code)]
fn install_sigint_handler() {
    extern "C" fn on_sigint(_sig: libc::c_int) {
        SIGINT_RECEIVED.store(true, Ordering::SeqCst);
    }

    let handler = on_sigint as extern "C" fn(libc::c_int);
    // SAFETY: the handler only stores into a static atomic, which is
    // async-signal-safe. signal(2) itself has no preconditions here.
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_sigint_handler() {}
