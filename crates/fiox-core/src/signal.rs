//! Raw signal delivery and shutdown signal watching.
//!
//! The supervisor stops fio with SIGKILL by published pid, and the program
//! itself shuts down on any of SIGHUP, SIGINT, SIGTERM, SIGQUIT. Those four
//! are blocked process-wide before any thread exists, then consumed by one
//! dedicated watcher thread via `sigwait`.

use std::sync::mpsc::Sender;
use std::thread;
use thiserror::Error;
use tracing::{debug, warn};

use crate::driver::ControlEvent;

/// Signals that trigger a clean shutdown. All four behave identically.
pub const SHUTDOWN_SIGNALS: [i32; 4] =
    [libc::SIGHUP, libc::SIGINT, libc::SIGTERM, libc::SIGQUIT];

/// Errors from raw signal operations.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid signal")]
    InvalidSignal,

    #[error("{0}")]
    Os(std::io::Error),
}

/// Send SIGKILL to `pid`.
///
/// A process that is already gone counts as stopped: ESRCH is success, so
/// both kill sites share one policy and racing a natural exit is harmless.
pub fn terminate(pid: i32) -> Result<(), SignalError> {
    let result = unsafe { libc::kill(pid, libc::SIGKILL) };
    if result == 0 {
        return Ok(());
    }

    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ESRCH) => {
            debug!(pid, "process already gone");
            Ok(())
        }
        Some(libc::EPERM) => Err(SignalError::PermissionDenied),
        Some(libc::EINVAL) => Err(SignalError::InvalidSignal),
        _ => Err(SignalError::Os(err)),
    }
}

/// Check if a process exists.
pub fn process_exists(pid: i32) -> bool {
    let result = unsafe { libc::kill(pid, 0) };
    if result == 0 {
        return true;
    }
    let err = std::io::Error::last_os_error();
    // EPERM means the process exists but we cannot signal it
    err.raw_os_error() == Some(libc::EPERM)
}

fn shutdown_sigset() -> libc::sigset_t {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        for sig in SHUTDOWN_SIGNALS {
            libc::sigaddset(&mut set, sig);
        }
        set
    }
}

/// Block the shutdown signals in the calling thread.
///
/// Must run on the main thread before any other thread is spawned: threads
/// inherit the mask, which keeps `sigwait` in the watcher the only consumer.
pub fn block_shutdown_signals() -> Result<(), SignalError> {
    let set = shutdown_sigset();
    let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(SignalError::Os(std::io::Error::from_raw_os_error(rc)));
    }
    Ok(())
}

fn wait_for_signal() -> Result<i32, SignalError> {
    let set = shutdown_sigset();
    let mut signo: libc::c_int = 0;
    let rc = unsafe { libc::sigwait(&set, &mut signo) };
    if rc != 0 {
        return Err(SignalError::Os(std::io::Error::from_raw_os_error(rc)));
    }
    Ok(signo)
}

/// Spawn the watcher thread forwarding the first shutdown signal.
pub fn spawn_signal_watcher(
    control_tx: Sender<ControlEvent>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("signal-watcher".to_string())
        .spawn(move || match wait_for_signal() {
            Ok(signo) => {
                let _ = control_tx.send(ControlEvent::Signal(signo));
            }
            Err(err) => warn!(error = %err, "signal wait failed"),
        })
}

/// Human-readable name for a shutdown signal.
pub fn signal_name(signo: i32) -> &'static str {
    match signo {
        libc::SIGHUP => "SIGHUP",
        libc::SIGINT => "SIGINT",
        libc::SIGTERM => "SIGTERM",
        libc::SIGQUIT => "SIGQUIT",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::time::Duration;

    #[test]
    fn test_terminate_kills_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id() as i32;
        assert!(process_exists(pid));

        terminate(pid).unwrap();
        let status = child.wait().unwrap();
        assert!(!status.success());
        assert!(!process_exists(pid));
    }

    #[test]
    fn test_terminate_gone_process_is_ok() {
        let mut child = Command::new("sleep").arg("0.01").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();

        // Reaped, so the pid no longer resolves
        terminate(pid).unwrap();
    }

    #[test]
    fn test_process_exists_for_self() {
        assert!(process_exists(std::process::id() as i32));
    }

    #[test]
    fn test_blocked_signal_is_waitable() {
        // Thread-directed: block, raise, then sigwait must retrieve it
        block_shutdown_signals().unwrap();
        unsafe {
            libc::raise(libc::SIGHUP);
        }
        let signo = wait_for_signal().unwrap();
        assert_eq!(signo, libc::SIGHUP);
    }

    #[test]
    fn test_signal_watcher_forwards_signal() {
        use std::os::unix::thread::JoinHandleExt;

        block_shutdown_signals().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = spawn_signal_watcher(tx).unwrap();

        // Thread-directed so concurrent tests with an unblocked mask are
        // never candidates for delivery
        unsafe {
            libc::pthread_kill(handle.as_pthread_t(), libc::SIGTERM);
        }

        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            ControlEvent::Signal(signo) => assert_eq!(signo, libc::SIGTERM),
            other => panic!("unexpected event: {other:?}"),
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(signal_name(libc::SIGTERM), "SIGTERM");
        assert_eq!(signal_name(libc::SIGQUIT), "SIGQUIT");
        assert_eq!(signal_name(libc::SIGWINCH), "unknown");
    }
}
