//! Tunnel connection lifecycle.
//!
//! Orchestrates the process supervisor and the network configurator
//! for one connection at a time: drives the connect sequence, exposes
//! pause/resume/disconnect, and emits an ordered state-event stream to
//! the caller. All OS mutation happens on the connect control flow;
//! background readers and monitors only send requests back through the
//! signal channel.

pub mod netcfg;
pub mod supervisor;

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use crate::constants;
use crate::core::{ConnectionPlan, TunnelEndpoints};
use crate::logger::{self, LogLevel};
use crate::platform::NetCommands;
use crate::state::{Protocol, StateEvent, TunnelState};
use crate::utils;

use netcfg::{NetworkConfigError, NetworkConfigurator};
use supervisor::{ProcessError, Supervisor};

const LOG_CATEGORY: &str = "TUNNEL";

/// Requests and notifications flowing into the connect control flow.
///
/// The supervisor's background threads produce the first three; the
/// [`Controller`] produces the rest. The control flow is the only
/// consumer and the only place that acts on them.
#[derive(Debug)]
pub(crate) enum TunnelSignal {
    /// The tunnel process reported successful initialization.
    Initialized,
    /// The tunnel process exited with the given status code.
    ProcessExited(Option<i32>),
    /// The liveness monitor found the tunnel interface down.
    InterfaceDown,
    /// An operator requested disconnect.
    StopRequested,
    /// An operator requested pause.
    PauseRequested,
    /// The OS default route changed externally.
    RoutingChanged,
}

/// Connection lifecycle failures and outcomes.
#[derive(Debug)]
pub enum ConnectError {
    /// Another connection attempt is already in flight.
    AlreadyActive,
    /// Pause is only valid while connected.
    NotConnected,
    /// Resume is only valid while paused.
    NotPaused,
    /// This lifecycle only drives the given protocol's tunnel process.
    UnsupportedProtocol(Protocol),
    Process(ProcessError),
    Network(NetworkConfigError),
    /// Sentinel outcome, not a failure: the tunnel session state was
    /// discarded and the caller must start a fresh connect sequence.
    ReconnectionRequired,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActive => write!(f, "a connection attempt is already in progress"),
            Self::NotConnected => write!(f, "no established connection to pause"),
            Self::NotPaused => write!(f, "no paused connection to resume"),
            Self::UnsupportedProtocol(p) => {
                write!(f, "{p} connections are driven by the service backend, not this tunnel")
            }
            Self::Process(e) => write!(f, "{e}"),
            Self::Network(e) => write!(f, "{e}"),
            Self::ReconnectionRequired => write!(f, "reconnection required"),
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Process(e) => Some(e),
            Self::Network(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProcessError> for ConnectError {
    fn from(e: ProcessError) -> Self {
        Self::Process(e)
    }
}

impl From<NetworkConfigError> for ConnectError {
    fn from(e: NetworkConfigError) -> Self {
        Self::Network(e)
    }
}

/// Outcome of a resume request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The existing tunnel continues.
    Resumed,
    /// No session state survived the pause; the caller must start a
    /// fresh connect sequence.
    ReconnectionRequired,
}

/// Paths of the external binaries the lifecycle invokes.
#[derive(Clone, Debug)]
pub struct TunnelPaths {
    pub wireguard_binary: PathBuf,
    pub wg_tool: PathBuf,
    pub dns_script: PathBuf,
    /// Directory for the transient per-attempt configuration file.
    pub config_dir: PathBuf,
}

/// State shared between the connect control flow and controllers.
struct Shared {
    active: AtomicBool,
    stop: AtomicBool,
    paused: AtomicBool,
    state: Mutex<TunnelState>,
    signals: Mutex<Option<mpsc::Sender<TunnelSignal>>>,
    /// Single-slot resume handoff: send-if-empty, latest wins.
    resume: Mutex<Option<mpsc::SyncSender<()>>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            state: Mutex::new(TunnelState::Idle),
            signals: Mutex::new(None),
            resume: Mutex::new(None),
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn state(&self) -> TunnelState {
        self.state.lock().map(|s| *s).unwrap_or_default()
    }

    fn send_signal(&self, signal: TunnelSignal) {
        if let Ok(guard) = self.signals.lock() {
            if let Some(sender) = guard.as_ref() {
                let _ = sender.send(signal);
            }
        }
    }

    /// Wake a pending pause-wait; no-op when the slot is already full
    /// or no connection is active.
    fn signal_resume(&self) {
        if let Ok(guard) = self.resume.lock() {
            if let Some(sender) = guard.as_ref() {
                let _ = sender.try_send(());
            }
        }
    }

    fn set_channels(
        &self,
        signals: Option<mpsc::Sender<TunnelSignal>>,
        resume: Option<mpsc::SyncSender<()>>,
    ) {
        if let Ok(mut guard) = self.signals.lock() {
            *guard = signals;
        }
        if let Ok(mut guard) = self.resume.lock() {
            *guard = resume;
        }
    }
}

/// Handle for issuing requests against a running connection.
///
/// Cloneable and thread-safe; all methods are safe to call at any
/// time. Requests against a connection that no longer exists are
/// silent no-ops (disconnect) or state errors (pause/resume).
#[derive(Clone)]
pub struct Controller {
    shared: Arc<Shared>,
}

impl Controller {
    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> TunnelState {
        self.shared.state()
    }

    /// Request disconnect. Idempotent: repeated calls, or disconnecting
    /// an already-stopped connection, succeed silently.
    pub fn disconnect(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        // Wake a pause-wait first so a paused connection unwinds
        self.shared.signal_resume();
        self.shared.send_signal(TunnelSignal::StopRequested);
    }

    /// Request pause: the tunnel process is stopped and routes/DNS are
    /// restored, but the intent to resume is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::NotConnected`] unless the connection is
    /// established.
    pub fn pause(&self) -> Result<(), ConnectError> {
        if self.shared.state() != TunnelState::Connected {
            return Err(ConnectError::NotConnected);
        }
        self.shared.paused.store(true, Ordering::SeqCst);
        self.shared.send_signal(TunnelSignal::PauseRequested);
        Ok(())
    }

    /// Request resume of a paused connection.
    ///
    /// No cryptographic/session state of the tunnel survives a pause,
    /// so this implementation always yields
    /// [`ResumeOutcome::ReconnectionRequired`]: the blocked connect
    /// call unwinds and its caller must start a fresh connect
    /// sequence. Repeated resume requests collapse into one.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::NotPaused`] unless the connection is
    /// paused (or pausing).
    pub fn resume(&self) -> Result<ResumeOutcome, ConnectError> {
        if !self.shared.is_paused() {
            return Err(ConnectError::NotPaused);
        }
        // The paused flag is cleared by the lifecycle once it consumes
        // the signal, so a resume registered before the pause-wait
        // begins is never lost
        self.shared.signal_resume();
        Ok(ResumeOutcome::ReconnectionRequired)
    }

    /// Notify the lifecycle that the OS default route changed.
    ///
    /// Routes are reconciled against the new default gateway unless
    /// the connection is paused. No-op without an active connection.
    pub fn routing_changed(&self) {
        self.shared.send_signal(TunnelSignal::RoutingChanged);
    }
}

/// Emits state events in occurrence order over a rendezvous channel.
///
/// The send is a blocking handoff: a slow consumer backpressures the
/// control flow, and no transition is ever dropped.
struct EventEmitter<'a> {
    events: &'a mpsc::SyncSender<StateEvent>,
    shared: &'a Shared,
}

impl EventEmitter<'_> {
    fn emit(&self, state: TunnelState, reason: impl Into<String>) {
        let reason = reason.into();
        if let Ok(mut guard) = self.shared.state.lock() {
            *guard = state;
        }
        logger::log(LogLevel::Info, LOG_CATEGORY, format!("State: {state} ({reason})"));
        if self.events.send(StateEvent::new(state, reason)).is_err() {
            logger::log(LogLevel::Debug, LOG_CATEGORY, "State event receiver dropped");
        }
    }
}

#[derive(Default)]
struct AttemptOutcome {
    interface_down: bool,
}

/// One tunnel connection lifecycle per daemon instance.
pub struct Tunnel {
    paths: TunnelPaths,
    cmds: Arc<dyn NetCommands>,
    shared: Arc<Shared>,
}

impl Tunnel {
    #[must_use]
    pub fn new(paths: TunnelPaths, cmds: Arc<dyn NetCommands>) -> Self {
        Self {
            paths,
            cmds,
            shared: Arc::new(Shared::new()),
        }
    }

    /// A handle for requesting disconnect/pause/resume against this
    /// lifecycle.
    #[must_use]
    pub fn controller(&self) -> Controller {
        Controller {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Establish a connection and block until it ends.
    ///
    /// State events are delivered over `events` in the exact order
    /// they occur, ending with `Connected` staying live until a
    /// terminal `Disconnected`/`Failed` (or the
    /// [`ConnectError::ReconnectionRequired`] unwind after a pause).
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::AlreadyActive`] when another attempt is
    /// in flight, [`ConnectError::ReconnectionRequired`] after a
    /// pause/resume cycle, or the underlying process/network failure.
    /// Every error path performs full best-effort teardown of whatever
    /// partial state existed before returning.
    pub fn connect(
        &self,
        plan: &ConnectionPlan,
        events: &mpsc::SyncSender<StateEvent>,
    ) -> Result<(), ConnectError> {
        let Some(endpoints) = plan.tunnel.as_ref() else {
            return Err(ConnectError::UnsupportedProtocol(plan.protocol));
        };

        if self.shared.active.swap(true, Ordering::SeqCst) {
            return Err(ConnectError::AlreadyActive);
        }
        self.shared.stop.store(false, Ordering::SeqCst);
        self.shared.paused.store(false, Ordering::SeqCst);

        let (signal_tx, signal_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::sync_channel::<()>(1);
        self.shared.set_channels(Some(signal_tx.clone()), Some(resume_tx));

        let emitter = EventEmitter {
            events,
            shared: &self.shared,
        };

        let result = self.internal_connect(plan, endpoints, &emitter, &signal_rx, &signal_tx);

        let result = match result {
            Ok(outcome) => {
                if self.shared.is_paused() && !self.shared.stop_requested() {
                    // No session state survived the teardown; hold the
                    // attempt until resume (or disconnect) arrives
                    emitter.emit(TunnelState::Paused, "tunnel suspended");
                    let _ = resume_rx.recv();
                    if self.shared.stop_requested() {
                        emitter.emit(TunnelState::Disconnected, "disconnect requested");
                        Ok(())
                    } else {
                        emitter.emit(TunnelState::Reconnecting, "resume requested");
                        Err(ConnectError::ReconnectionRequired)
                    }
                } else {
                    let reason = if outcome.interface_down {
                        "interface down"
                    } else {
                        "disconnect requested"
                    };
                    emitter.emit(TunnelState::Disconnected, reason);
                    Ok(())
                }
            }
            Err(e) => {
                emitter.emit(TunnelState::Failed, e.to_string());
                Err(e)
            }
        };

        self.shared.set_channels(None, None);
        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared.active.store(false, Ordering::SeqCst);
        result
    }

    fn internal_connect(
        &self,
        plan: &ConnectionPlan,
        endpoints: &TunnelEndpoints,
        emitter: &EventEmitter<'_>,
        signals: &mpsc::Receiver<TunnelSignal>,
        signal_tx: &mpsc::Sender<TunnelSignal>,
    ) -> Result<AttemptOutcome, ConnectError> {
        emitter.emit(
            TunnelState::Connecting,
            format!("connecting to {}", plan.hop.entry().gateway),
        );

        let mut netcfg = NetworkConfigurator::new(
            Arc::clone(&self.cmds),
            self.paths.dns_script.clone(),
        );

        // If there is no connectivity (WiFi off?), wait until a
        // network appears, re-checking every 5 seconds
        while !netcfg.has_connectivity() {
            if self.shared.stop_requested() {
                return Ok(AttemptOutcome::default());
            }
            logger::log(
                LogLevel::Info,
                LOG_CATEGORY,
                "No connectivity. Waiting 5 sec to retry...",
            );
            emitter.emit(TunnelState::Reconnecting, "No connectivity");
            utils::sleep_cancellable(
                Duration::from_secs(constants::CONNECTIVITY_RETRY_SECS),
                Duration::from_millis(constants::STOP_POLL_MS),
                &self.shared.stop,
            );
        }
        if self.shared.stop_requested() {
            return Ok(AttemptOutcome::default());
        }

        netcfg.capture_snapshot()?;

        let iface = supervisor::acquire_interface_name(self.cmds.as_ref())?;
        let mut supervisor = Supervisor::new(
            self.paths.wireguard_binary.clone(),
            self.paths.wg_tool.clone(),
            self.paths.config_dir.clone(),
            iface,
            signal_tx.clone(),
        );

        let result = self.run_attempt(plan, endpoints, &mut netcfg, &mut supervisor, emitter, signals);

        // Teardown on every exit path: undo whatever was established,
        // then wait for all background readers and monitors to finish
        netcfg.remove_routes();
        netcfg.remove_dns();
        supervisor.stop();
        supervisor.join();
        logger::log(LogLevel::Info, LOG_CATEGORY, "Stopped");

        result
    }

    #[allow(clippy::too_many_lines)]
    fn run_attempt(
        &self,
        plan: &ConnectionPlan,
        endpoints: &TunnelEndpoints,
        netcfg: &mut NetworkConfigurator,
        supervisor: &mut Supervisor,
        emitter: &EventEmitter<'_>,
        signals: &mpsc::Receiver<TunnelSignal>,
    ) -> Result<AttemptOutcome, ConnectError> {
        supervisor.start()?;

        // Wait for the init trigger, bounded by the init timeout
        let deadline = Instant::now() + Duration::from_secs(constants::INIT_TIMEOUT_SECS);
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(ProcessError::InitTimeout.into());
            }
            match signals.recv_timeout(deadline - now) {
                Ok(TunnelSignal::Initialized) => break,
                Ok(TunnelSignal::ProcessExited(code)) => {
                    return if self.shared.stop_requested() {
                        Ok(AttemptOutcome::default())
                    } else {
                        Err(ProcessError::UnexpectedExit(code).into())
                    };
                }
                Ok(TunnelSignal::StopRequested) => supervisor.stop(),
                Ok(_) => {}
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    return Err(ProcessError::InitTimeout.into());
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(ProcessError::UnexpectedExit(None).into());
                }
            }
        }

        if self.shared.stop_requested() {
            return Ok(AttemptOutcome::default());
        }

        let iface = supervisor.interface().to_string();

        // IPv6 resolver registration must precede interface configuration
        netcfg.init_ipv6_resolver(endpoints, &iface);
        netcfg.assign_addresses(&iface, endpoints, &self.shared.stop)?;
        supervisor.apply_configuration(endpoints, plan.port)?;
        if let Some(mtu) = plan.mtu {
            netcfg.apply_mtu(&iface, mtu)?;
        }

        if self.shared.stop_requested() {
            return Ok(AttemptOutcome::default());
        }

        netcfg.set_routes(&iface, endpoints)?;
        let dns = plan
            .dns
            .unwrap_or(IpAddr::V4(endpoints.host_local_ip));
        netcfg.set_dns(dns)?;

        emitter.emit(
            TunnelState::Connected,
            format!("connected to {}", plan.hop.entry().gateway),
        );
        supervisor.spawn_monitor(Arc::clone(&self.cmds));

        if self.shared.stop_requested() {
            supervisor.stop();
        }

        // Event loop: the connection stays up until the process exits
        let mut outcome = AttemptOutcome::default();
        loop {
            match signals.recv() {
                Ok(TunnelSignal::ProcessExited(code)) => {
                    if supervisor.going_to_stop()
                        || self.shared.stop_requested()
                        || self.shared.is_paused()
                        || outcome.interface_down
                    {
                        break;
                    }
                    return Err(ProcessError::UnexpectedExit(code).into());
                }
                Ok(TunnelSignal::InterfaceDown) => {
                    if !outcome.interface_down {
                        outcome.interface_down = true;
                        emitter.emit(TunnelState::Disconnecting, "interface down");
                        supervisor.stop();
                    }
                }
                Ok(TunnelSignal::StopRequested) => {
                    emitter.emit(TunnelState::Disconnecting, "disconnect requested");
                    supervisor.stop();
                }
                Ok(TunnelSignal::PauseRequested) => {
                    emitter.emit(TunnelState::Pausing, "pause requested");
                    supervisor.stop();
                }
                Ok(TunnelSignal::RoutingChanged) => {
                    netcfg.reconcile(&iface, endpoints, self.shared.is_paused());
                }
                Ok(TunnelSignal::Initialized) => {}
                Err(_) => break,
            }
        }

        Ok(outcome)
    }
}
