//! Bounded shutdown of engine child processes.

use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::HOST_TARGET;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Waits up to `grace` for `child` to exit, then kills it.
///
/// Callers close the child's stdin first so a well-behaved engine can exit
/// on its own within the grace period.
pub(super) fn terminate_child(child: &mut Child, grace: Duration) {
    let pid = child.id();
    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(target: HOST_TARGET, pid, ?status, "engine process exited");
                return;
            }
            Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
            Ok(None) => break,
            Err(error) => {
                warn!(
                    target: HOST_TARGET,
                    pid,
                    error = %error,
                    "failed to check engine process status"
                );
                break;
            }
        }
    }

    warn!(
        target: HOST_TARGET,
        pid,
        grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
        "engine did not exit within grace period, killing"
    );
    if let Err(error) = child.kill() {
        debug!(target: HOST_TARGET, pid, error = %error, "kill failed");
    }
    if let Err(error) = child.wait() {
        warn!(target: HOST_TARGET, pid, error = %error, "failed to reap engine process");
    }
}
