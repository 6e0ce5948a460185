//! Engine entry point backed by a child process's standard streams.

use std::io::{BufRead, BufReader, Write};
use std::process::{ChildStdin, ChildStdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use camino::Utf8PathBuf;
use tracing::{debug, warn};

use crate::lifecycle::{EngineDelegate, EngineError, EngineService};

use super::HOST_TARGET;
use super::protocol::{EngineEvent, StartRequest};

/// Service reference for one engine child process.
///
/// `start_engine` sends a single start request down stdin and then relays
/// the engine's stdout events to the delegate on a reader thread.
pub struct ProcessEngine {
    pid: u32,
    stdin: Mutex<Option<ChildStdin>>,
    stdout: Mutex<Option<ChildStdout>>,
    started: AtomicBool,
}

impl ProcessEngine {
    pub(super) fn new(pid: u32, stdin: ChildStdin, stdout: ChildStdout) -> Self {
        Self {
            pid,
            stdin: Mutex::new(Some(stdin)),
            stdout: Mutex::new(Some(stdout)),
            started: AtomicBool::new(false),
        }
    }

    /// Process identifier of the engine.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Closes stdin so the engine observes end of input.
    pub(super) fn close_input(&self) {
        let mut stdin = self
            .stdin
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        stdin.take();
    }

    fn send(&self, request: &StartRequest) -> Result<(), EngineError> {
        let line = request.to_line()?;
        let mut guard = self
            .stdin
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let Some(stdin) = guard.as_mut() else {
            return Err(EngineError::Rejected {
                reason: String::from("engine input already closed"),
            });
        };
        stdin.write_all(&line)?;
        stdin.flush()?;
        Ok(())
    }

    fn spawn_relay(&self, delegate: Arc<dyn EngineDelegate>) -> Result<(), EngineError> {
        let stdout = self
            .stdout
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();
        let Some(stdout) = stdout else {
            return Ok(());
        };
        let pid = self.pid;
        thread::Builder::new()
            .name(format!("stagehand-engine-{pid}"))
            .spawn(move || relay_events(pid, stdout, delegate.as_ref()))?;
        Ok(())
    }
}

impl EngineService for ProcessEngine {
    fn start_engine(
        &self,
        delegate: Arc<dyn EngineDelegate>,
        release: &str,
        config_files: &[Utf8PathBuf],
    ) -> Result<(), EngineError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyStarted);
        }
        let request = StartRequest {
            release: release.to_owned(),
            config_files: config_files.to_vec(),
        };
        debug!(
            target: HOST_TARGET,
            pid = self.pid,
            release,
            config_files = request.config_files.len(),
            "sending start request to engine"
        );
        self.send(&request)?;
        self.spawn_relay(delegate)
    }
}

impl std::fmt::Debug for ProcessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessEngine")
            .field("pid", &self.pid)
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn relay_events(pid: u32, stdout: ChildStdout, delegate: &dyn EngineDelegate) {
    for line in BufReader::new(stdout).lines() {
        let line = match line {
            Ok(line) => line,
            Err(error) => {
                warn!(target: HOST_TARGET, pid, error = %error, "failed to read engine output");
                return;
            }
        };
        match EngineEvent::parse(&line) {
            Ok(Some(event)) => dispatch(delegate, event),
            Ok(None) => {}
            Err(error) => debug!(
                target: HOST_TARGET,
                pid,
                line = %line,
                error = %error,
                "ignoring unrecognised engine output"
            ),
        }
    }
    debug!(target: HOST_TARGET, pid, "engine output closed");
}

fn dispatch(delegate: &dyn EngineDelegate, event: EngineEvent) {
    match event {
        EngineEvent::Started { host, port } => delegate.engine_started(&host, port),
        EngineEvent::Installing { completed, total } => delegate.installing(completed, total),
        EngineEvent::Exited { reason } => delegate.engine_exited(&reason),
    }
}
