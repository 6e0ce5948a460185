//! Shared doubles and helpers for the test suites.

mod host;
mod reporter;

use std::thread;
use std::time::{Duration, Instant};

pub use host::{FakeServiceHost, RecordingDelegate, RecordingEngine, StartCall};
pub use reporter::{LifecycleEvent, RecordingLifecycleReporter};

/// Upper bound for anything a test waits on.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls `condition` until it holds or [`WAIT_TIMEOUT`] elapses.
pub fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}
