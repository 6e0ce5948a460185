//! Unit tests for the service lifecycle coordinator.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use once_cell::sync::OnceCell;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use crate::bundle::MemoryBundle;
use crate::fs::StdFilesystem;
use crate::health::LifecycleReporter;
use crate::lifecycle::{
    BindError, ConnectionState, Coordinator, CoordinatorDeps, EngineError, LifecycleError,
    ServiceDescriptor, SessionFault,
};
use crate::registry::ConfigRegistry;
use crate::staging::ResourceStager;
use crate::tests::support::{
    FakeServiceHost, LifecycleEvent, RecordingDelegate, RecordingEngine,
    RecordingLifecycleReporter, StartCall, WAIT_TIMEOUT, eventually,
};

const RELEASE: &str = "couchbase-1.0-dp-ebc0925";

/// Generous bound for calls that must not wait on the host or the engine.
const PROMPT: Duration = Duration::from_millis(250);

struct Harness {
    _dir: TempDir,
    root: Utf8PathBuf,
    host: Arc<FakeServiceHost>,
    registry: Arc<ConfigRegistry>,
    delegate: Arc<RecordingDelegate>,
    reporter: Arc<RecordingLifecycleReporter>,
    coordinator: Coordinator,
}

impl Harness {
    fn wait_for_state(&self, state: ConnectionState) -> bool {
        self.coordinator
            .wait_for(WAIT_TIMEOUT, |snapshot| snapshot.state == state)
    }
}

#[fixture]
fn harness() -> Harness {
    let dir = TempDir::new().expect("create temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp path");
    let bundle = MemoryBundle::new()
        .with_resource("a.ini", b"a")
        .with_resource("b.ini", b"b");
    let stager = ResourceStager::new(Arc::new(bundle), Arc::new(StdFilesystem));
    let registry = Arc::new(ConfigRegistry::new(Arc::new(stager)));
    let host = Arc::new(FakeServiceHost::default());
    let delegate = Arc::new(RecordingDelegate::default());
    let reporter = Arc::new(RecordingLifecycleReporter::default());
    let coordinator = Coordinator::new(CoordinatorDeps {
        descriptor: ServiceDescriptor::new("engine"),
        host: Arc::clone(&host) as _,
        registry: Arc::clone(&registry),
        delegate: Arc::clone(&delegate) as _,
        reporter: Arc::clone(&reporter) as _,
    })
    .expect("coordinator");
    Harness {
        _dir: dir,
        root,
        host,
        registry,
        delegate,
        reporter,
        coordinator,
    }
}

#[rstest]
fn start_returns_before_the_bind_completes(harness: Harness) {
    let handle = harness.coordinator.start(RELEASE).expect("start");

    assert_eq!(harness.coordinator.state(), ConnectionState::Connecting);
    assert_eq!(handle.state(), ConnectionState::Connecting);
    assert_eq!(handle.generation(), 1);
    assert_eq!(harness.host.bind_count(), 1);
    assert!(harness.coordinator.service().is_none());
}

#[rstest]
fn connect_starts_engine_with_release_and_ordered_config(harness: Harness) {
    let files = ["b.ini", "a.ini"].map(|name| harness.root.join("user_data").join(name));
    for file in &files {
        harness.registry.register(file).expect("register");
    }
    let engine = Arc::new(RecordingEngine::default());

    harness.coordinator.start(RELEASE).expect("start");
    harness.host.connect(0, Arc::clone(&engine) as _);

    assert!(harness.wait_for_state(ConnectionState::EngineStarted));
    assert_eq!(
        engine.calls(),
        vec![StartCall {
            release: RELEASE.to_owned(),
            config_files: files.to_vec(),
        }]
    );
    assert_eq!(
        harness.delegate.started(),
        vec![(String::from("127.0.0.1"), 5984)]
    );
    assert!(harness.coordinator.service().is_some());
}

#[rstest]
#[case::connecting(false)]
#[case::connected(true)]
fn start_while_active_is_rejected(harness: Harness, #[case] connect: bool) {
    let engine = Arc::new(RecordingEngine::default());
    harness.coordinator.start(RELEASE).expect("start");
    let expected = if connect {
        harness.host.connect(0, Arc::clone(&engine) as _);
        assert!(harness.wait_for_state(ConnectionState::EngineStarted));
        ConnectionState::EngineStarted
    } else {
        ConnectionState::Connecting
    };

    let error = harness
        .coordinator
        .start("other-release")
        .expect_err("second start should be rejected");

    assert!(matches!(error, LifecycleError::AlreadyActive { state } if state == expected));
    assert_eq!(harness.coordinator.state(), expected);
    assert_eq!(harness.host.bind_count(), 1);
    assert!(harness.reporter.saw(&LifecycleEvent::StartRejected(expected)));
}

#[rstest]
fn stale_bind_is_released_without_starting_engine(harness: Harness) {
    let engine = Arc::new(RecordingEngine::default());
    let handle = harness.coordinator.start(RELEASE).expect("start");
    let token = harness.host.token(0);

    handle.stop();
    assert_eq!(harness.coordinator.state(), ConnectionState::Disconnected);
    harness.host.connect(0, Arc::clone(&engine) as _);

    assert!(eventually(|| harness.host.unbinds() == vec![token, token]));
    assert!(engine.calls().is_empty());
    assert_eq!(harness.coordinator.state(), ConnectionState::Disconnected);
    assert!(eventually(|| harness
        .reporter
        .saw(&LifecycleEvent::StaleBindDiscarded(1))));
}

#[rstest]
fn stale_bind_from_earlier_session_does_not_disturb_the_next(harness: Harness) {
    let engine = Arc::new(RecordingEngine::default());
    harness.coordinator.start(RELEASE).expect("first start");
    harness.coordinator.stop();
    harness.coordinator.start(RELEASE).expect("second start");

    harness.host.connect(0, Arc::clone(&engine) as _);
    assert!(eventually(|| harness.host.unbinds().len() == 2));
    assert_eq!(harness.coordinator.state(), ConnectionState::Connecting);

    harness.host.connect(1, Arc::clone(&engine) as _);
    assert!(harness.wait_for_state(ConnectionState::EngineStarted));
    assert_eq!(engine.calls().len(), 1);
}

#[rstest]
fn engine_failure_keeps_the_binding(harness: Harness) {
    let engine = Arc::new(RecordingEngine::failing("unsupported release"));
    let handle = harness.coordinator.start(RELEASE).expect("start");

    harness.host.connect(0, Arc::clone(&engine) as _);

    assert!(handle.wait_for(WAIT_TIMEOUT, |snapshot| snapshot.last_error.is_some()));
    assert_eq!(handle.state(), ConnectionState::Bound);
    assert!(matches!(handle.last_error(), Some(SessionFault::Engine(_))));
    assert!(harness.delegate.started().is_empty());
    assert!(eventually(|| harness
        .reporter
        .saw(&LifecycleEvent::EngineFailed(1))));
}

#[rstest]
fn external_disconnect_clears_the_service(harness: Harness) {
    let engine = Arc::new(RecordingEngine::default());
    harness.coordinator.start(RELEASE).expect("start");
    harness.host.connect(0, Arc::clone(&engine) as _);
    assert!(harness.wait_for_state(ConnectionState::EngineStarted));

    harness.host.disconnect(0);

    assert!(harness.wait_for_state(ConnectionState::Disconnected));
    assert!(harness.coordinator.service().is_none());
    assert!(harness.host.unbinds().is_empty(), "no unbind after host teardown");
    assert_eq!(harness.host.bind_count(), 1, "no automatic reconnect");
}

#[rstest]
fn asynchronous_bind_failure_returns_to_disconnected(harness: Harness) {
    let handle = harness.coordinator.start(RELEASE).expect("start");

    harness.host.fail(0, "service not installed");

    assert!(harness.wait_for_state(ConnectionState::Disconnected));
    assert!(matches!(handle.last_error(), Some(SessionFault::Bind(_))));
    assert!(eventually(|| harness.reporter.saw(&LifecycleEvent::BindFailed(1))));
    harness.coordinator.start(RELEASE).expect("restart after failure");
}

#[rstest]
fn synchronous_bind_failure_is_returned(harness: Harness) {
    harness.host.refuse_binds("no such service");

    let error = harness
        .coordinator
        .start(RELEASE)
        .expect_err("bind should be refused");

    assert!(matches!(error, LifecycleError::BindFailure { .. }));
    assert_eq!(harness.coordinator.state(), ConnectionState::Disconnected);
    assert!(harness.reporter.saw(&LifecycleEvent::BindFailed(1)));
}

#[rstest]
fn stop_releases_an_established_binding(harness: Harness) {
    let engine = Arc::new(RecordingEngine::default());
    let handle = harness.coordinator.start(RELEASE).expect("start");
    harness.host.connect(0, Arc::clone(&engine) as _);
    assert!(harness.wait_for_state(ConnectionState::EngineStarted));

    handle.stop();

    assert_eq!(harness.coordinator.state(), ConnectionState::Disconnected);
    assert_eq!(harness.host.unbinds(), vec![harness.host.token(0)]);
    assert!(harness.reporter.saw(&LifecycleEvent::Stopped(
        1,
        ConnectionState::EngineStarted
    )));
}

#[rstest]
fn superseded_handle_cannot_stop_a_later_session(harness: Harness) {
    let first = harness.coordinator.start(RELEASE).expect("first start");
    first.stop();
    let second = harness.coordinator.start(RELEASE).expect("second start");

    first.stop();

    assert_eq!(second.state(), ConnectionState::Connecting);
    assert_eq!(first.state(), ConnectionState::Disconnected);
    assert_eq!(harness.host.unbinds().len(), 1);
}

#[rstest]
fn stop_when_idle_does_nothing(harness: Harness) {
    harness.coordinator.stop();

    assert!(harness.host.unbinds().is_empty());
    assert!(harness.reporter.events().is_empty());
}

#[rstest]
fn dropping_the_coordinator_releases_the_binding(harness: Harness) {
    let engine = Arc::new(RecordingEngine::default());
    let Harness {
        host, coordinator, ..
    } = harness;
    coordinator.start(RELEASE).expect("start");
    host.connect(0, Arc::clone(&engine) as _);
    assert!(
        coordinator.wait_for(WAIT_TIMEOUT, |snapshot| snapshot.state
            == ConnectionState::EngineStarted)
    );

    drop(coordinator);

    assert_eq!(host.unbinds().len(), 1);
}

#[rstest]
fn stop_while_the_engine_is_starting_is_never_promoted(harness: Harness) {
    let engine = Arc::new(RecordingEngine::held());
    let handle = harness.coordinator.start(RELEASE).expect("start");
    harness.host.connect(0, Arc::clone(&engine) as _);
    assert!(harness.wait_for_state(ConnectionState::Bound));
    assert!(eventually(|| engine.calls().len() == 1));

    let stopping = Instant::now();
    handle.stop();
    assert!(stopping.elapsed() < PROMPT, "stop waited on the engine");
    assert_eq!(harness.coordinator.state(), ConnectionState::Disconnected);

    engine.release();
    // Events are handled in order, so once the next session starts the
    // held start request has been fully processed.
    harness.coordinator.start(RELEASE).expect("restart");
    harness.host.connect(1, Arc::clone(&engine) as _);
    assert!(harness.wait_for_state(ConnectionState::EngineStarted));

    assert!(!harness.reporter.saw(&LifecycleEvent::EngineStarted(1)));
    assert!(eventually(|| harness
        .reporter
        .saw(&LifecycleEvent::EngineStarted(2))));
    assert_eq!(harness.host.unbinds(), vec![harness.host.token(0)]);
}

#[rstest]
fn late_binds_are_released_after_many_silent_sessions(harness: Harness) {
    let engine = Arc::new(RecordingEngine::default());
    for _ in 0..100 {
        harness.coordinator.start(RELEASE).expect("start");
        harness.coordinator.stop();
    }
    let first = harness.host.token(0);
    let last = harness.host.token(99);

    harness.host.connect(0, Arc::clone(&engine) as _);
    harness.host.connect(99, Arc::clone(&engine) as _);

    assert!(eventually(|| {
        let unbinds = harness.host.unbinds();
        unbinds.len() == 102 && unbinds.ends_with(&[first, last])
    }));
    assert!(engine.calls().is_empty());
    assert_eq!(harness.coordinator.state(), ConnectionState::Disconnected);
}

#[rstest]
fn repeated_connect_for_the_live_session_keeps_the_binding(harness: Harness) {
    let engine = Arc::new(RecordingEngine::default());
    harness.coordinator.start(RELEASE).expect("start");
    harness.host.connect(0, Arc::clone(&engine) as _);
    assert!(harness.wait_for_state(ConnectionState::EngineStarted));

    harness.host.connect(0, Arc::clone(&engine) as _);
    harness.host.disconnect(0);
    assert!(harness.wait_for_state(ConnectionState::Disconnected));

    assert!(harness.host.unbinds().is_empty());
    assert_eq!(engine.calls().len(), 1);
}

/// Reporter that reads the coordinator's state from inside each callback.
#[derive(Default)]
struct StateQueryingReporter {
    coordinator: OnceCell<Weak<Coordinator>>,
    observed: Mutex<Vec<ConnectionState>>,
}

impl StateQueryingReporter {
    fn observe(&self) {
        if let Some(coordinator) = self.coordinator.get().and_then(Weak::upgrade) {
            let state = coordinator.state();
            self.observed
                .lock()
                .expect("reporter mutex poisoned")
                .push(state);
        }
    }

    fn observed(&self) -> Vec<ConnectionState> {
        self.observed
            .lock()
            .expect("reporter mutex poisoned")
            .clone()
    }
}

impl LifecycleReporter for StateQueryingReporter {
    fn binding(&self, _descriptor: &ServiceDescriptor, _generation: u64) {
        self.observe();
    }

    fn start_rejected(&self, _state: ConnectionState) {
        self.observe();
    }

    fn bind_failed(&self, _generation: u64, _error: &BindError) {}

    fn bound(&self, _generation: u64) {}

    fn engine_started(&self, _generation: u64) {}

    fn engine_failed(&self, _generation: u64, _error: &EngineError) {}

    fn stale_bind_discarded(&self, _generation: u64) {}

    fn disconnected(&self, _generation: u64) {}

    fn stopped(&self, _generation: u64, _previous: ConnectionState) {}
}

#[rstest]
fn reporter_may_query_the_coordinator_it_observes(harness: Harness) {
    let reporter = Arc::new(StateQueryingReporter::default());
    let coordinator = Arc::new(
        Coordinator::new(CoordinatorDeps {
            descriptor: ServiceDescriptor::new("engine"),
            host: Arc::clone(&harness.host) as _,
            registry: Arc::clone(&harness.registry),
            delegate: Arc::clone(&harness.delegate) as _,
            reporter: Arc::clone(&reporter) as _,
        })
        .expect("coordinator"),
    );
    reporter
        .coordinator
        .set(Arc::downgrade(&coordinator))
        .expect("coordinator set once");

    let (done, finished) = mpsc::channel();
    let caller = Arc::clone(&coordinator);
    thread::spawn(move || {
        let accepted = caller.start(RELEASE).is_ok();
        let rejected = caller.start(RELEASE).is_err();
        done.send(accepted && rejected).expect("test thread listening");
    });

    assert_eq!(finished.recv_timeout(WAIT_TIMEOUT), Ok(true));
    assert_eq!(
        reporter.observed(),
        vec![ConnectionState::Connecting, ConnectionState::Connecting]
    );
}
