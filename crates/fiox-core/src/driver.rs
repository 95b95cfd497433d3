//! fio subprocess supervisor.
//!
//! Spawns fio with terse periodic output, streams stdout line by line through
//! the decoder, and reports lifecycle events on a control channel. The driver
//! never decides process exit on its own; escalation is reported upward and
//! the top-level control loop owns the terminal outcome.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{Sender, SyncSender};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use fiox_common::{Error, MetricMap, TERSE_VERSION};

use crate::decode;

/// Consecutive-net decode failures tolerated before the supervisor escalates.
///
/// Each failed line raises the fault count by one, each decoded line pays one
/// back down. A failure finding the counter already saturated is the trigger.
pub const DECODE_FAULT_TOLERANCE: u32 = 3;

/// Configuration for the fio subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Path to the fio binary.
    pub fio_path: String,
    /// Path to the fio job file.
    pub job_file: PathBuf,
    /// Seconds between periodic status lines.
    pub interval: u64,
}

/// Lifecycle events reported to the top-level control loop.
#[derive(Debug)]
pub enum ControlEvent {
    /// A shutdown signal was delivered to the process.
    Signal(i32),
    /// fio could not be started; the driver is gone.
    StartupFailed(Error),
    /// The decode fault tolerance was exceeded; fio must be stopped.
    ToleranceExceeded { faults: u32 },
    /// Reading the fio output stream failed with an I/O error.
    StreamFailed(std::io::Error),
    /// fio exited and was reaped.
    ChildExited(std::io::Result<ExitStatus>),
}

/// Outcome of recording a decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    /// Within tolerance; keep reading.
    Tolerate { faults: u32 },
    /// Tolerance exceeded; stop fio and shut down.
    Escalate { faults: u32 },
}

/// Net counter of decode faults on the output stream.
#[derive(Debug)]
pub struct FaultCounter {
    faults: u32,
    tolerance: u32,
}

impl FaultCounter {
    pub fn new(tolerance: u32) -> Self {
        Self {
            faults: 0,
            tolerance,
        }
    }

    /// Record a decode failure.
    pub fn failure(&mut self) -> FaultAction {
        if self.faults >= self.tolerance {
            FaultAction::Escalate {
                faults: self.faults + 1,
            }
        } else {
            self.faults += 1;
            FaultAction::Tolerate {
                faults: self.faults,
            }
        }
    }

    /// Record a successful decode, paying down one accumulated fault.
    pub fn success(&mut self) {
        self.faults = self.faults.saturating_sub(1);
    }

    pub fn faults(&self) -> u32 {
        self.faults
    }
}

/// Build the fio invocation for periodic terse reporting.
pub fn build_command(config: &DriverConfig) -> Command {
    let mut command = Command::new(&config.fio_path);
    command
        .arg(&config.job_file)
        .arg("--group_reporting")
        .arg(format!("--status-interval={}", config.interval))
        .arg("--output-format=terse")
        .arg(format!("--terse-version={}", TERSE_VERSION))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    command
}

/// Spawn the supervisor thread.
///
/// The pid of the started subprocess is sent once on `pid_tx`; if fio fails
/// to start the sender is dropped instead and the cause arrives on
/// `control_tx`. Decoded metric maps flow out on `metrics_tx`.
pub fn spawn_supervisor(
    config: DriverConfig,
    metrics_tx: SyncSender<MetricMap>,
    pid_tx: Sender<i32>,
    control_tx: Sender<ControlEvent>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("fio-driver".to_string())
        .spawn(move || run(config, metrics_tx, pid_tx, control_tx))
}

fn run(
    config: DriverConfig,
    metrics_tx: SyncSender<MetricMap>,
    pid_tx: Sender<i32>,
    control_tx: Sender<ControlEvent>,
) {
    let mut command = build_command(&config);
    debug!(binary = %config.fio_path, job = %config.job_file.display(), "starting fio");

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            error!(binary = %config.fio_path, error = %e, "failed to start fio");
            let _ = control_tx.send(ControlEvent::StartupFailed(Error::Startup {
                binary: config.fio_path.clone(),
                source: e,
            }));
            return;
        }
    };

    let pid = child.id() as i32;
    info!(pid, interval = config.interval, "fio started");
    let _ = pid_tx.send(pid);
    drop(pid_tx);

    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            let _ = control_tx.send(ControlEvent::StartupFailed(Error::Internal(
                "fio stdout pipe missing".to_string(),
            )));
            return;
        }
    };

    // The waiter owns the child handle and reaps it when it exits.
    let waiter_tx = control_tx.clone();
    let waiter = thread::Builder::new()
        .name("fio-waiter".to_string())
        .spawn(move || {
            let outcome = child.wait();
            match &outcome {
                Ok(status) if status.success() => info!(pid, "fio completed"),
                Ok(status) => warn!(pid, %status, "fio exited with failure status"),
                Err(e) => error!(pid, error = %e, "failed to wait on fio"),
            }
            let _ = waiter_tx.send(ControlEvent::ChildExited(outcome));
        });
    if let Err(e) = waiter {
        error!(pid, error = %e, "failed to spawn waiter thread");
        let _ = control_tx.send(ControlEvent::StartupFailed(Error::Internal(format!(
            "failed to spawn waiter thread: {e}"
        ))));
        return;
    }

    let mut counter = FaultCounter::new(DECODE_FAULT_TOLERANCE);
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!(pid, error = %e, "failed to read fio output stream");
                let _ = control_tx.send(ControlEvent::StreamFailed(e));
                return;
            }
        }

        // Raw bytes rather than lines(): a line holding invalid UTF-8 is
        // malformed input for the decoder, not a dead stream.
        let lossy = String::from_utf8_lossy(&buf);
        let line = lossy.strip_suffix('\n').unwrap_or(&lossy);
        let line = line.strip_suffix('\r').unwrap_or(line);

        match decode::decode_line(line) {
            Ok(metrics) => {
                counter.success();
                if metrics_tx.send(metrics).is_err() {
                    debug!(pid, "metric channel closed, stopping reader");
                    return;
                }
            }
            Err(e) => match counter.failure() {
                FaultAction::Tolerate { faults } => {
                    warn!(pid, faults, error = %e, "failed to decode fio output");
                }
                FaultAction::Escalate { faults } => {
                    error!(pid, faults, error = %e, "decode fault tolerance exceeded");
                    let _ = control_tx.send(ControlEvent::ToleranceExceeded { faults });
                    return;
                }
            },
        }
    }

    debug!(pid, "fio output stream ended");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
