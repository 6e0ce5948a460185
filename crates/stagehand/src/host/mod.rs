//! Service host that runs the engine as a child process.
//!
//! Binding spawns the configured executable on a background thread and
//! reports `connected` once the process is running. A monitor on the same
//! thread reports `disconnected` when the process exits. Unbinding only marks
//! the binding; the monitor closes the engine's input and terminates it, so
//! callers never wait out the grace period.

mod engine;
mod protocol;
mod terminate;

use std::collections::HashMap;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use crate::lifecycle::{BindError, BindToken, ServiceCallbacks, ServiceDescriptor, ServiceHost};

pub use engine::ProcessEngine;
pub use protocol::{EngineEvent, StartRequest};

pub(crate) const HOST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::host");

/// Default time an engine is given to exit after its input closes.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);

const MONITOR_INTERVAL: Duration = Duration::from_millis(50);

enum Binding {
    Pending,
    Cancelled,
    Running {
        child: Child,
        engine: Arc<ProcessEngine>,
    },
    Releasing {
        child: Child,
        engine: Arc<ProcessEngine>,
    },
}

type Bindings = Arc<Mutex<HashMap<BindToken, Binding>>>;

fn lock(bindings: &Bindings) -> MutexGuard<'_, HashMap<BindToken, Binding>> {
    bindings
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

/// Launches the engine executable once per binding.
pub struct ProcessServiceHost {
    command: Utf8PathBuf,
    args: Vec<String>,
    grace: Duration,
    next_token: AtomicU64,
    bindings: Bindings,
}

impl ProcessServiceHost {
    /// Builds a host that launches `command` with no arguments.
    #[must_use]
    pub fn new(command: impl Into<Utf8PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            grace: DEFAULT_GRACE_PERIOD,
            next_token: AtomicU64::new(1),
            bindings: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replaces the arguments passed to the engine executable.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides how long an unbound engine may take to exit.
    #[must_use]
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Executable this host launches.
    #[must_use]
    pub fn command(&self) -> &Utf8Path {
        &self.command
    }

    /// Number of bindings not yet released.
    #[must_use]
    pub fn active_bindings(&self) -> usize {
        lock(&self.bindings)
            .values()
            .filter(|binding| matches!(binding, Binding::Pending | Binding::Running { .. }))
            .count()
    }

    /// Number of engine processes still alive, including those being stopped.
    #[must_use]
    pub fn live_processes(&self) -> usize {
        lock(&self.bindings)
            .values()
            .filter(|binding| {
                matches!(binding, Binding::Running { .. } | Binding::Releasing { .. })
            })
            .count()
    }
}

impl ServiceHost for ProcessServiceHost {
    fn bind(
        &self,
        descriptor: &ServiceDescriptor,
        callbacks: ServiceCallbacks,
    ) -> Result<BindToken, BindError> {
        let token = BindToken::new(self.next_token.fetch_add(1, Ordering::Relaxed));
        lock(&self.bindings).insert(token, Binding::Pending);

        let launch = Launch {
            token,
            command: self.command.clone(),
            args: self.args.clone(),
            grace: self.grace,
            bindings: Arc::clone(&self.bindings),
            callbacks,
        };
        let spawned = thread::Builder::new()
            .name(format!("stagehand-{token}"))
            .spawn(move || launch.run());
        if let Err(source) = spawned {
            lock(&self.bindings).remove(&token);
            return Err(BindError::Spawn {
                command: self.command.to_string(),
                source: Arc::new(source),
            });
        }
        debug!(
            target: HOST_TARGET,
            service = %descriptor,
            token = %token,
            command = %self.command,
            "engine launch scheduled"
        );
        Ok(token)
    }

    fn unbind(&self, token: BindToken) {
        let mut bindings = lock(&self.bindings);
        match bindings.remove(&token) {
            Some(Binding::Pending) => {
                bindings.insert(token, Binding::Cancelled);
                debug!(target: HOST_TARGET, token = %token, "cancelling pending launch");
            }
            Some(binding @ (Binding::Cancelled | Binding::Releasing { .. })) => {
                bindings.insert(token, binding);
            }
            Some(Binding::Running { child, engine }) => {
                info!(target: HOST_TARGET, token = %token, pid = engine.pid(), "stopping engine");
                bindings.insert(token, Binding::Releasing { child, engine });
            }
            None => debug!(target: HOST_TARGET, token = %token, "unbind for unknown token ignored"),
        }
    }
}

impl Drop for ProcessServiceHost {
    fn drop(&mut self) {
        let running: Vec<(Child, Arc<ProcessEngine>)> = lock(&self.bindings)
            .drain()
            .filter_map(|(_, binding)| match binding {
                Binding::Running { child, engine } | Binding::Releasing { child, engine } => {
                    Some((child, engine))
                }
                Binding::Pending | Binding::Cancelled => None,
            })
            .collect();
        for (mut child, engine) in running {
            engine.close_input();
            terminate::terminate_child(&mut child, self.grace);
        }
    }
}

impl std::fmt::Debug for ProcessServiceHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessServiceHost")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

/// Work carried by a binding's background thread.
struct Launch {
    token: BindToken,
    command: Utf8PathBuf,
    args: Vec<String>,
    grace: Duration,
    bindings: Bindings,
    callbacks: ServiceCallbacks,
}

impl Launch {
    fn run(self) {
        let mut child = match self.spawn() {
            Ok(child) => child,
            Err(error) => {
                lock(&self.bindings).remove(&self.token);
                warn!(
                    target: HOST_TARGET,
                    token = %self.token,
                    error = %error,
                    "engine launch failed"
                );
                self.callbacks.bind_failed(error);
                return;
            }
        };

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            lock(&self.bindings).remove(&self.token);
            terminate::terminate_child(&mut child, self.grace);
            self.callbacks.bind_failed(BindError::Refused {
                reason: String::from("engine standard streams unavailable"),
            });
            return;
        };
        let engine = Arc::new(ProcessEngine::new(child.id(), stdin, stdout));

        {
            let mut bindings = lock(&self.bindings);
            if !matches!(bindings.get(&self.token), Some(Binding::Pending)) {
                bindings.remove(&self.token);
                drop(bindings);
                debug!(target: HOST_TARGET, token = %self.token, "launch cancelled before connect");
                engine.close_input();
                terminate::terminate_child(&mut child, self.grace);
                self.callbacks.disconnected();
                return;
            }
            bindings.insert(
                self.token,
                Binding::Running {
                    child,
                    engine: Arc::clone(&engine),
                },
            );
        }

        info!(
            target: HOST_TARGET,
            token = %self.token,
            pid = engine.pid(),
            "engine process running"
        );
        self.callbacks.connected(engine);
        self.monitor();
    }

    fn spawn(&self) -> Result<Child, BindError> {
        Command::new(self.command.as_std_path())
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| BindError::Spawn {
                command: self.command.to_string(),
                source: Arc::new(source),
            })
    }

    fn monitor(&self) {
        loop {
            {
                let mut bindings = lock(&self.bindings);
                if matches!(bindings.get(&self.token), Some(Binding::Releasing { .. })) {
                    let released = bindings.remove(&self.token);
                    drop(bindings);
                    if let Some(Binding::Releasing { mut child, engine }) = released {
                        engine.close_input();
                        terminate::terminate_child(&mut child, self.grace);
                    }
                    self.callbacks.disconnected();
                    return;
                }
                let Some(Binding::Running { child, .. }) = bindings.get_mut(&self.token) else {
                    return;
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        bindings.remove(&self.token);
                        drop(bindings);
                        info!(
                            target: HOST_TARGET,
                            token = %self.token,
                            ?status,
                            "engine process exited"
                        );
                        self.callbacks.disconnected();
                        return;
                    }
                    Ok(None) => {}
                    Err(error) => {
                        // The child cannot be observed any more; treat it as gone.
                        if let Some(Binding::Running { mut child, .. }) =
                            bindings.remove(&self.token)
                        {
                            drop(bindings);
                            warn!(
                                target: HOST_TARGET,
                                token = %self.token,
                                error = %error,
                                "failed to poll engine process"
                            );
                            terminate::terminate_child(&mut child, Duration::ZERO);
                        }
                        self.callbacks.disconnected();
                        return;
                    }
                }
            }
            thread::sleep(MONITOR_INTERVAL);
        }
    }
}
