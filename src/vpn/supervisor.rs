//! Tunnel subprocess supervision.
//!
//! Spawns the userspace tunnel binary bound to a free tunnel
//! interface, relays its output with content-based rate limiting,
//! detects successful initialization, applies the tunnel configuration
//! with bounded retry on transient port conflicts, and watches
//! interface liveness. Stop is idempotent, and a join barrier
//! guarantees every background reader and monitor has finished before
//! stop completion is signalled.

use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};

use crate::constants;
use crate::core::TunnelEndpoints;
use crate::logger::{self, LogLevel};
use crate::platform::NetCommands;
use crate::shell;
use crate::utils;

use super::TunnelSignal;

const LOG_CATEGORY: &str = "PROC";

/// Subprocess lifecycle failures.
#[derive(Debug)]
pub enum ProcessError {
    /// The tunnel binary could not be spawned.
    Spawn(io::Error),
    /// The tunnel process did not report successful init in time.
    InitTimeout,
    /// The ephemeral configuration file could not be written.
    ConfigWrite(io::Error),
    /// Applying the tunnel configuration failed (not a port conflict).
    ConfigApply(shell::ExecError),
    /// The local port stayed in use through every configuration attempt.
    ConfigRetriesExhausted,
    /// The tunnel process exited without an operator stop request.
    UnexpectedExit(Option<i32>),
    /// The liveness monitor found the tunnel interface down.
    InterfaceDown,
    /// No free tunnel interface name could be determined.
    NoFreeInterface(shell::ExecError),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to start tunnel process: {e}"),
            Self::InitTimeout => write!(f, "tunnel process initialization timeout"),
            Self::ConfigWrite(e) => write!(f, "failed to save tunnel config file: {e}"),
            Self::ConfigApply(e) => write!(f, "failed to apply tunnel configuration: {e}"),
            Self::ConfigRetriesExhausted => {
                write!(f, "failed to apply tunnel configuration: local port stayed in use")
            }
            Self::UnexpectedExit(code) => match code {
                Some(code) => write!(f, "tunnel process exited unexpectedly with status {code}"),
                None => write!(f, "tunnel process exited unexpectedly"),
            },
            Self::InterfaceDown => write!(f, "tunnel interface is down"),
            Self::NoFreeInterface(e) => {
                write!(f, "failed to obtain a free tunnel interface: {e}")
            }
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) | Self::ConfigWrite(e) => Some(e),
            Self::ConfigApply(e) | Self::NoFreeInterface(e) => Some(e),
            _ => None,
        }
    }
}

/// Supervisor lifecycle for one connection attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Initializing,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// Pick an unused tunnel interface name: one past the highest numeric
/// suffix currently present for the platform prefix.
///
/// # Errors
///
/// Returns [`ProcessError::NoFreeInterface`] when interface listing
/// fails.
pub fn acquire_interface_name(cmds: &dyn NetCommands) -> Result<String, ProcessError> {
    let interfaces = cmds
        .list_interfaces()
        .map_err(ProcessError::NoFreeInterface)?;
    Ok(next_interface_name(&interfaces))
}

fn next_interface_name(existing: &[String]) -> String {
    let max_suffix = existing
        .iter()
        .filter_map(|name| name.strip_prefix(constants::TUN_INTERFACE_PREFIX))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{}", constants::TUN_INTERFACE_PREFIX, max_suffix + 1)
}

/// Strip the recognized timestamp prefix from a tunnel log line:
/// `LEVEL: (utunN) yyyy/mm/dd hh:mm:ss `. Lines without the full
/// prefix are returned unchanged.
fn strip_timestamp_prefix(line: &str) -> &str {
    fn eat_while(bytes: &[u8], mut i: usize, pred: impl Fn(u8) -> bool) -> (usize, usize) {
        let start = i;
        while i < bytes.len() && pred(bytes[i]) {
            i += 1;
        }
        (i, i - start)
    }

    fn eat_exact(bytes: &[u8], i: usize, expected: &[u8]) -> Option<usize> {
        (bytes.get(i..i + expected.len())? == expected).then_some(i + expected.len())
    }

    fn eat_digits(bytes: &[u8], i: usize, count: usize) -> Option<usize> {
        let (next, eaten) = eat_while(bytes, i, |b| b.is_ascii_digit());
        (eaten == count).then_some(next)
    }

    fn prefix_len(line: &str) -> Option<usize> {
        let bytes = line.as_bytes();

        // LEVEL
        let (mut i, eaten) = eat_while(bytes, 0, |b| b.is_ascii_uppercase());
        if eaten == 0 {
            return None;
        }
        i = eat_exact(bytes, i, b": (")?;

        // (utunN)
        let (next, eaten) = eat_while(bytes, i, |b| b.is_ascii_lowercase());
        if eaten == 0 {
            return None;
        }
        let (next, eaten) = eat_while(bytes, next, |b| b.is_ascii_digit());
        if eaten == 0 {
            return None;
        }
        i = eat_exact(bytes, next, b") ")?;

        // yyyy/mm/dd
        i = eat_digits(bytes, i, 4)?;
        i = eat_exact(bytes, i, b"/")?;
        i = eat_digits(bytes, i, 2)?;
        i = eat_exact(bytes, i, b"/")?;
        i = eat_digits(bytes, i, 2)?;
        i = eat_exact(bytes, i, b" ")?;

        // hh:mm:ss
        i = eat_digits(bytes, i, 2)?;
        i = eat_exact(bytes, i, b":")?;
        i = eat_digits(bytes, i, 2)?;
        i = eat_exact(bytes, i, b":")?;
        i = eat_digits(bytes, i, 2)?;
        i = eat_exact(bytes, i, b" ")?;

        Some(i)
    }

    prefix_len(line).map_or(line, |len| &line[len..])
}

/// Content-based log rate limiting.
///
/// A line is suppressed iff it is textually identical (ignoring the
/// timestamp prefix) to the previously emitted line and arrived within
/// the suppression window. Any textual change, or the window elapsing,
/// emits the line and restarts the window.
struct LogThrottle {
    last_line: String,
    last_at: Option<Instant>,
}

impl LogThrottle {
    fn new() -> Self {
        Self {
            last_line: String::new(),
            last_at: None,
        }
    }

    fn should_emit(&mut self, line: &str, now: Instant) -> bool {
        let stripped = strip_timestamp_prefix(line);
        let window = Duration::from_secs(constants::LOG_REPEAT_SUPPRESS_SECS);
        let suppress = stripped == self.last_line
            && self
                .last_at
                .is_some_and(|at| now.duration_since(at) < window);
        if !suppress {
            self.last_line = stripped.to_string();
            self.last_at = Some(now);
        }
        !suppress
    }
}

/// Generate one ephemeral tunnel configuration.
///
/// The listen port is re-derived per attempt so a retry after a port
/// conflict binds a different local port.
fn generate_config(endpoints: &TunnelEndpoints, port: u16) -> String {
    let allowed_ips = if endpoints.host_local_ipv6.is_some() {
        // ::/0 included so the tunnel carries the IPv6 half-space routes
        "128.0.0.0/1, 0.0.0.0/1, ::/0"
    } else {
        "128.0.0.0/1, 0.0.0.0/1"
    };

    format!(
        "[Interface]\nPrivateKey = {}\nListenPort = {}\n\n[Peer]\nPublicKey = {}\nAllowedIPs = {}\nEndpoint = {}:{}\n",
        endpoints.client_private_key,
        ephemeral_port(),
        endpoints.public_key,
        allowed_ips,
        endpoints.host,
        port,
    )
}

/// A port from the ephemeral range, derived from the clock.
fn ephemeral_port() -> u16 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.subsec_nanos());
    #[allow(clippy::cast_possible_truncation)]
    let offset = (nanos % 16384) as u16;
    49152 + offset
}

/// Supervises one tunnel subprocess for the duration of a connection
/// attempt.
pub struct Supervisor {
    binary: PathBuf,
    wg_tool: PathBuf,
    /// Directory holding the transient per-attempt configuration file.
    config_dir: PathBuf,
    iface: String,
    /// Operator-initiated termination: distinguishes a requested stop
    /// (silent) from an unexpected process exit (surfaced as error).
    going_to_stop: Arc<AtomicBool>,
    /// Tunnel process id; 0 when no process is running.
    pid: Arc<AtomicU32>,
    signals: mpsc::Sender<TunnelSignal>,
    threads: Vec<JoinHandle<()>>,
    state: SupervisorState,
}

impl Supervisor {
    #[must_use]
    pub fn new(
        binary: PathBuf,
        wg_tool: PathBuf,
        config_dir: PathBuf,
        iface: String,
        signals: mpsc::Sender<TunnelSignal>,
    ) -> Self {
        Self {
            binary,
            wg_tool,
            config_dir,
            iface,
            going_to_stop: Arc::new(AtomicBool::new(false)),
            pid: Arc::new(AtomicU32::new(0)),
            signals,
            threads: Vec::new(),
            state: SupervisorState::Starting,
        }
    }

    #[must_use]
    pub fn interface(&self) -> &str {
        &self.iface
    }

    #[must_use]
    pub const fn state(&self) -> SupervisorState {
        self.state
    }

    /// Spawn the tunnel process and its output/error reader threads.
    ///
    /// [`TunnelSignal::Initialized`] is emitted when the process
    /// reports successful init; [`TunnelSignal::ProcessExited`] when it
    /// exits.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] when the binary cannot be
    /// started.
    pub fn start(&mut self) -> Result<(), ProcessError> {
        logger::log(
            LogLevel::Info,
            LOG_CATEGORY,
            format!("Starting tunnel process on interface {}", self.iface),
        );

        let mut child = Command::new(&self.binary)
            .args(["-f", &self.iface])
            .env("LOG_LEVEL", "verbose")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ProcessError::Spawn)?;

        self.pid.store(child.id(), Ordering::SeqCst);

        if let Some(stdout) = child.stdout.take() {
            let signals = self.signals.clone();
            self.threads.push(std::thread::spawn(move || {
                let mut throttle = LogThrottle::new();
                let mut waiting_to_start = true;
                for line in BufReader::new(stdout).lines().map_while(io::Result::ok) {
                    if throttle.should_emit(&line, Instant::now()) {
                        logger::log(
                            LogLevel::Info,
                            constants::TUNNEL_OUT_LOG_CATEGORY,
                            line.as_str(),
                        );
                    }
                    if waiting_to_start && line.contains(constants::WG_TRIGGER_SUCCESS_INIT) {
                        waiting_to_start = false;
                        let _ = signals.send(TunnelSignal::Initialized);
                    }
                }
            }));
        }

        if let Some(stderr) = child.stderr.take() {
            self.threads.push(std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(io::Result::ok) {
                    logger::log(
                        LogLevel::Info,
                        constants::TUNNEL_OUT_LOG_CATEGORY,
                        format!("[err] {line}"),
                    );
                }
            }));
        }

        // Waiter thread: the exit signal is the only way the control
        // flow learns the process is gone
        let signals = self.signals.clone();
        let pid = Arc::clone(&self.pid);
        self.threads.push(std::thread::spawn(move || {
            let code = child.wait().ok().and_then(|status| status.code());
            pid.store(0, Ordering::SeqCst);
            let _ = signals.send(TunnelSignal::ProcessExited(code));
        }));

        self.state = SupervisorState::Initializing;
        Ok(())
    }

    /// Generate and apply the tunnel configuration.
    ///
    /// On a transient "address already in use" condition the ephemeral
    /// configuration is regenerated and re-applied, up to
    /// [`constants::CONFIG_APPLY_ATTEMPTS`] attempts total; any other
    /// failure aborts immediately. The configuration file is deleted
    /// after every attempt regardless of outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::ConfigRetriesExhausted`] when every
    /// attempt hit the port conflict, or the underlying failure for
    /// anything else.
    pub fn apply_configuration(
        &mut self,
        endpoints: &TunnelEndpoints,
        port: u16,
    ) -> Result<(), ProcessError> {
        let config_path = self.config_dir.join(constants::WG_CONFIG_FILE_NAME);

        for _ in 0..constants::CONFIG_APPLY_ATTEMPTS {
            let config = generate_config(endpoints, port);
            std::fs::write(&config_path, config).map_err(|e| {
                self.state = SupervisorState::Failed;
                ProcessError::ConfigWrite(e)
            })?;

            let mut port_in_use = false;
            let result = shell::exec_with_output(
                LOG_CATEGORY,
                &self.wg_tool.to_string_lossy(),
                &["setconf", &self.iface, &config_path.to_string_lossy()],
                |line, is_err| {
                    let tag = if is_err { "[wgconf error]" } else { "[wgconf out]" };
                    logger::log(LogLevel::Debug, LOG_CATEGORY, format!("{tag} {line}"));
                    if line.contains(constants::WG_TRIGGER_ADDR_IN_USE) {
                        port_in_use = true;
                    }
                },
            );

            // Never leave the ephemeral config file behind
            let _ = std::fs::remove_file(&config_path);

            if !port_in_use {
                return match result {
                    Ok(()) => {
                        self.state = SupervisorState::Running;
                        Ok(())
                    }
                    Err(e) => {
                        self.state = SupervisorState::Failed;
                        Err(ProcessError::ConfigApply(e))
                    }
                };
            }
            logger::log(
                LogLevel::Warning,
                LOG_CATEGORY,
                "Local port already in use; regenerating tunnel configuration",
            );
        }

        self.state = SupervisorState::Failed;
        Err(ProcessError::ConfigRetriesExhausted)
    }

    /// Start the interface liveness monitor.
    ///
    /// Polls the tunnel interface administrative state every
    /// [`constants::LIVENESS_POLL_SECS`] seconds and emits
    /// [`TunnelSignal::InterfaceDown`] when the interface goes down
    /// while the tunnel is supposed to be up. The monitor never mutates
    /// connection state itself; it requests the owning lifecycle to
    /// act.
    pub fn spawn_monitor(&mut self, cmds: Arc<dyn NetCommands>) {
        let iface = self.iface.clone();
        let going_to_stop = Arc::clone(&self.going_to_stop);
        let signals = self.signals.clone();

        self.threads.push(std::thread::spawn(move || {
            logger::log(
                LogLevel::Info,
                LOG_CATEGORY,
                format!("Started: monitoring '{iface}' interface status"),
            );
            loop {
                utils::sleep_cancellable(
                    Duration::from_secs(constants::LIVENESS_POLL_SECS),
                    Duration::from_millis(constants::STOP_POLL_MS),
                    &going_to_stop,
                );
                if going_to_stop.load(Ordering::SeqCst) {
                    break;
                }
                match cmds.interface_is_up(&iface) {
                    // Interface gone entirely: the process exit path
                    // reports the disconnect
                    None => break,
                    Some(false) => {
                        logger::log(
                            LogLevel::Info,
                            LOG_CATEGORY,
                            "Interface is down, terminating tunnel process",
                        );
                        let _ = signals.send(TunnelSignal::InterfaceDown);
                        break;
                    }
                    Some(true) => {}
                }
            }
            logger::log(
                LogLevel::Info,
                LOG_CATEGORY,
                format!("Stopped: monitoring '{iface}' interface status"),
            );
        }));
    }

    /// Whether an operator stop was requested.
    #[must_use]
    pub fn going_to_stop(&self) -> bool {
        self.going_to_stop.load(Ordering::SeqCst)
    }

    /// Request termination of the tunnel process.
    ///
    /// Idempotent: stopping a process that already exited, or was
    /// never started, is a no-op success.
    pub fn stop(&mut self) {
        self.going_to_stop.store(true, Ordering::SeqCst);
        if !matches!(self.state, SupervisorState::Stopped | SupervisorState::Failed) {
            self.state = SupervisorState::Stopping;
        }

        let pid = self.pid.load(Ordering::SeqCst);
        if pid == 0 {
            return; // nothing to stop
        }
        logger::log(LogLevel::Info, LOG_CATEGORY, "Stopping tunnel process");
        let _ = shell::exec(LOG_CATEGORY, "kill", &["-KILL", &pid.to_string()]);
    }

    /// Join barrier: block until every reader and monitor thread has
    /// observably finished, so no log or monitor event can reference a
    /// torn-down interface.
    pub fn join(&mut self) {
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
        if self.state != SupervisorState::Failed {
            self.state = SupervisorState::Stopped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::str::FromStr;

    fn endpoints() -> TunnelEndpoints {
        TunnelEndpoints {
            host: IpAddr::from_str("145.239.239.55").unwrap(),
            public_key: "pubkey".to_string(),
            host_local_ip: Ipv4Addr::new(172, 16, 0, 1),
            client_local_ip: Ipv4Addr::new(172, 26, 112, 75),
            client_private_key: "privkey".to_string(),
            client_local_ipv6: None,
            host_local_ipv6: None,
        }
    }

    #[test]
    fn test_next_interface_name_empty() {
        assert_eq!(
            next_interface_name(&[]),
            format!("{}1", constants::TUN_INTERFACE_PREFIX)
        );
    }

    #[test]
    fn test_next_interface_name_past_highest() {
        let prefix = constants::TUN_INTERFACE_PREFIX;
        let existing = vec![
            "lo0".to_string(),
            format!("{prefix}0"),
            format!("{prefix}4"),
            format!("{prefix}2"),
            "en0".to_string(),
        ];
        assert_eq!(next_interface_name(&existing), format!("{prefix}5"));
    }

    #[test]
    fn test_strip_timestamp_prefix() {
        let line = "ERROR: (utun6) 2023/06/09 14:16:50 Failed to send handshake";
        assert_eq!(strip_timestamp_prefix(line), "Failed to send handshake");
    }

    #[test]
    fn test_strip_timestamp_prefix_unprefixed_line_unchanged() {
        for line in [
            "plain output line",
            "ERROR: not the full pattern",
            "INFO: (utun) 2023/06/09 14:16:50 no interface number",
            "",
        ] {
            assert_eq!(strip_timestamp_prefix(line), line);
        }
    }

    #[test]
    fn test_throttle_suppresses_repeats_within_window() {
        let mut throttle = LogThrottle::new();
        let start = Instant::now();

        assert!(throttle.should_emit("INFO: (utun3) 2023/06/09 14:16:50 keepalive", start));
        // Same content, different timestamp, 2s later: suppressed
        assert!(!throttle.should_emit(
            "INFO: (utun3) 2023/06/09 14:16:52 keepalive",
            start + Duration::from_secs(2)
        ));
        // Different content: emitted
        assert!(throttle.should_emit(
            "INFO: (utun3) 2023/06/09 14:16:53 handshake done",
            start + Duration::from_secs(3)
        ));
    }

    #[test]
    fn test_throttle_emits_after_window_elapsed() {
        let mut throttle = LogThrottle::new();
        let start = Instant::now();

        assert!(throttle.should_emit("keepalive", start));
        assert!(!throttle.should_emit("keepalive", start + Duration::from_secs(9)));
        assert!(throttle.should_emit(
            "keepalive",
            start + Duration::from_secs(constants::LOG_REPEAT_SUPPRESS_SECS)
        ));
    }

    #[test]
    fn test_throttle_window_restarts_on_emit() {
        let mut throttle = LogThrottle::new();
        let start = Instant::now();

        assert!(throttle.should_emit("keepalive", start));
        assert!(throttle.should_emit("keepalive", start + Duration::from_secs(10)));
        // 12s after first line but only 2s after the last emitted one
        assert!(!throttle.should_emit("keepalive", start + Duration::from_secs(12)));
    }

    #[test]
    fn test_generate_config_contents() {
        let config = generate_config(&endpoints(), 2049);
        assert!(config.contains("PrivateKey = privkey"));
        assert!(config.contains("PublicKey = pubkey"));
        assert!(config.contains("AllowedIPs = 128.0.0.0/1, 0.0.0.0/1\n"));
        assert!(config.contains("Endpoint = 145.239.239.55:2049"));
    }

    #[test]
    fn test_generate_config_ipv6_allowed_ips() {
        let mut eps = endpoints();
        eps.host_local_ipv6 = Some("fd00::1".parse().unwrap());
        let config = generate_config(&eps, 2049);
        assert!(config.contains("AllowedIPs = 128.0.0.0/1, 0.0.0.0/1, ::/0"));
    }

    #[test]
    fn test_ephemeral_port_range() {
        for _ in 0..32 {
            let port = ephemeral_port();
            assert!(port >= 49152);
        }
    }

    #[test]
    fn test_spawn_failure() {
        let (tx, _rx) = mpsc::channel();
        let mut supervisor = Supervisor::new(
            PathBuf::from("/nonexistent/veild-no-such-binary"),
            PathBuf::from("wg"),
            std::env::temp_dir(),
            "utun9".to_string(),
            tx,
        );
        assert!(matches!(
            supervisor.start().unwrap_err(),
            ProcessError::Spawn(_)
        ));
    }

    #[test]
    fn test_exit_signal_and_idempotent_stop() {
        let (tx, rx) = mpsc::channel();
        // `true -f utun9` exits immediately with status 0
        let mut supervisor = Supervisor::new(
            PathBuf::from("true"),
            PathBuf::from("wg"),
            std::env::temp_dir(),
            "utun9".to_string(),
            tx,
        );
        supervisor.start().unwrap();

        let signal = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(signal, TunnelSignal::ProcessExited(Some(0))));

        // Stop after exit and a second stop are both no-op successes
        supervisor.stop();
        supervisor.stop();
        supervisor.join();
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
    }

    #[test]
    fn test_config_retries_exhausted_on_port_conflict() {
        let dir = std::env::temp_dir().join("veild-test-conf-retry");
        std::fs::create_dir_all(&dir).unwrap();

        // Stand-in tool that always reports the port conflict and
        // counts its invocations
        let attempts = dir.join("attempts.txt");
        let _ = std::fs::remove_file(&attempts);
        let tool = dir.join("fake-wg.sh");
        std::fs::write(
            &tool,
            format!(
                "#!/bin/sh\necho x >> {}\necho 'Address already in use'\nexit 1\n",
                attempts.display()
            ),
        )
        .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let (tx, _rx) = mpsc::channel();
        let mut supervisor = Supervisor::new(
            PathBuf::from("true"),
            tool.clone(),
            dir.clone(),
            "utun9".to_string(),
            tx,
        );

        let err = supervisor.apply_configuration(&endpoints(), 2049).unwrap_err();
        assert!(matches!(err, ProcessError::ConfigRetriesExhausted));
        assert_eq!(supervisor.state(), SupervisorState::Failed);
        // Exactly 5 attempts, never a 6th
        let recorded = std::fs::read_to_string(&attempts).unwrap();
        assert_eq!(recorded.lines().count(), constants::CONFIG_APPLY_ATTEMPTS as usize);
        // The ephemeral config never outlives an attempt
        assert!(!dir.join(constants::WG_CONFIG_FILE_NAME).exists());

        let _ = std::fs::remove_file(&tool);
        let _ = std::fs::remove_file(&attempts);
        let _ = std::fs::remove_dir(&dir);
    }

    #[test]
    fn test_config_apply_success_single_attempt() {
        let dir = std::env::temp_dir().join("veild-test-conf-ok");
        std::fs::create_dir_all(&dir).unwrap();

        let (tx, _rx) = mpsc::channel();
        // `true` swallows the setconf arguments and succeeds
        let mut supervisor = Supervisor::new(
            PathBuf::from("true"),
            PathBuf::from("true"),
            dir.clone(),
            "utun9".to_string(),
            tx,
        );

        supervisor.apply_configuration(&endpoints(), 2049).unwrap();
        assert_eq!(supervisor.state(), SupervisorState::Running);
        assert!(!dir.join(constants::WG_CONFIG_FILE_NAME).exists());

        let _ = std::fs::remove_dir(&dir);
    }
}
