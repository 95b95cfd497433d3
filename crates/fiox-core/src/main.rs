//! fiox-core: run fio under supervision and export its periodic terse
//! statistics for Prometheus.
//!
//! The process wires four threads around the main control loop: the driver
//! reads fio stdout, the waiter reaps the subprocess, the sink folds decoded
//! maps into the snapshot store, and the watcher forwards shutdown signals.
//! Every terminal decision, including killing fio, happens here in main.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{debug, error, info, warn};

use fiox_common::{schema, Error, MetricMap};
use fiox_core::collector;
use fiox_core::config::Cli;
use fiox_core::driver::{self, ControlEvent};
use fiox_core::exit_codes::ExitCode;
use fiox_core::logging::{self, LogConfig};
use fiox_core::server::TelemetryServer;
use fiox_core::signal;
use fiox_core::store::SnapshotStore;

/// How long to wait for fio to be reaped after a shutdown signal.
const REAP_TIMEOUT: Duration = Duration::from_secs(10);

fn main() {
    let cli = Cli::parse();

    logging::init_logging(&LogConfig {
        format: cli.log_format,
        level: cli.log_level,
        timestamps: true,
    });

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!(code = err.code(), category = %err.category(), error = %err, "fatal error");
            ExitCode::from_error(&err)
        }
    };
    std::process::exit(exit_code.as_i32());
}

fn run(cli: Cli) -> Result<ExitCode, Error> {
    let config = cli.into_config()?;
    schema::validate()?;

    if let Ok(snapshot) = serde_json::to_string(&config) {
        debug!(config = %snapshot, "resolved configuration");
    }

    // Before any thread spawns, so every thread inherits the mask and the
    // watcher's sigwait is the only signal consumer.
    signal::block_shutdown_signals()
        .map_err(|e| Error::Internal(format!("failed to block shutdown signals: {e}")))?;

    let store = Arc::new(SnapshotStore::new());
    let registry = collector::build_registry(Arc::clone(&store))
        .map_err(|e| Error::Schema(format!("failed to build metric descriptors: {e}")))?;
    let server = TelemetryServer::start(&config.telemetry, registry)?;

    let (control_tx, control_rx) = mpsc::channel::<ControlEvent>();
    let (metrics_tx, metrics_rx) = mpsc::sync_channel::<MetricMap>(0);
    let (pid_tx, pid_rx) = mpsc::channel::<i32>();

    signal::spawn_signal_watcher(control_tx.clone())
        .map_err(|e| Error::Internal(format!("failed to spawn signal watcher: {e}")))?;

    let sink_store = Arc::clone(&store);
    std::thread::Builder::new()
        .name("metric-sink".to_string())
        .spawn(move || {
            for metrics in metrics_rx {
                debug!("updating metrics from fio periodic stats");
                sink_store.update(metrics);
            }
        })
        .map_err(|e| Error::Internal(format!("failed to spawn metric sink: {e}")))?;

    driver::spawn_supervisor(config.driver, metrics_tx, pid_tx, control_tx.clone())
        .map_err(|e| Error::Internal(format!("failed to spawn fio supervisor: {e}")))?;

    // Pid handshake: sent once after a successful spawn. On failure the
    // sender is dropped and the cause arrives on the control channel.
    let pid = pid_rx.recv().ok();

    let outcome = control_loop(pid, &control_rx);
    server.shutdown();
    outcome
}

/// Wait for the first terminal event and decide the process outcome.
fn control_loop(
    pid: Option<i32>,
    control_rx: &mpsc::Receiver<ControlEvent>,
) -> Result<ExitCode, Error> {
    loop {
        let event = control_rx
            .recv()
            .map_err(|_| Error::Internal("control channel closed".to_string()))?;

        match event {
            ControlEvent::Signal(signo) => {
                info!(
                    signal = signal::signal_name(signo),
                    "shutdown signal captured, stopping fio"
                );
                match pid {
                    Some(pid) => return shutdown_by_signal(pid, control_rx),
                    // Signal raced a failed startup; the cause is right behind it.
                    None => continue,
                }
            }
            ControlEvent::StartupFailed(err) => {
                if let Some(pid) = pid {
                    let _ = signal::terminate(pid);
                }
                return Err(err);
            }
            ControlEvent::ToleranceExceeded { faults } => {
                if let Some(pid) = pid {
                    if let Err(e) = signal::terminate(pid) {
                        warn!(pid, error = %e, "could not kill fio, clean it up manually");
                    }
                }
                return Err(Error::ToleranceExceeded { faults });
            }
            ControlEvent::StreamFailed(err) => {
                if let Some(pid) = pid {
                    if let Err(e) = signal::terminate(pid) {
                        warn!(pid, error = %e, "could not kill fio, clean it up manually");
                    }
                }
                return Err(Error::Stream(err));
            }
            ControlEvent::ChildExited(outcome) => {
                return match outcome {
                    Ok(status) if status.success() => Ok(ExitCode::Clean),
                    Ok(status) => Err(Error::SubprocessExit { status }),
                    Err(e) => Err(Error::Wait(e)),
                };
            }
        }
    }
}

/// Stop fio after a shutdown signal and wait for it to be reaped.
///
/// A kill failure here is the run's only remaining obligation, so it turns
/// an otherwise clean shutdown into a cleanup error.
fn shutdown_by_signal(
    pid: i32,
    control_rx: &mpsc::Receiver<ControlEvent>,
) -> Result<ExitCode, Error> {
    if let Err(e) = signal::terminate(pid) {
        return Err(Error::Cleanup {
            pid,
            message: e.to_string(),
        });
    }

    let deadline = Instant::now() + REAP_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            warn!(pid, "timed out waiting for fio to be reaped");
            return Ok(ExitCode::Clean);
        }
        match control_rx.recv_timeout(remaining) {
            Ok(ControlEvent::ChildExited(_)) => {
                debug!(pid, "fio reaped after shutdown signal");
                return Ok(ExitCode::Clean);
            }
            Ok(event) => debug!(event = ?event, "event during shutdown ignored"),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(pid, "timed out waiting for fio to be reaped");
                return Ok(ExitCode::Clean);
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(ExitCode::Clean),
        }
    }
}
