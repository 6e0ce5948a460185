//! Layering tests for the shared configuration loader.

use std::ffi::{OsStr, OsString};
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::rstest;
use stagehand_config::{Config, DEFAULT_NAMESPACE, DEFAULT_RELEASE, LogFormat};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct EnvOverride {
    key: &'static str,
    previous: Option<OsString>,
    guard: Option<MutexGuard<'static, ()>>,
}

impl EnvOverride {
    fn set_var(key: &'static str, value: &OsStr) -> Self {
        let guard = ENV_MUTEX
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` on the 2024 edition; the override
        // restores the previous value on drop.
        unsafe { std::env::set_var(key, value) };
        Self {
            key,
            previous,
            guard: Some(guard),
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
        drop(self.guard.take());
    }
}

fn args(values: &[&str]) -> Vec<OsString> {
    values.iter().map(OsString::from).collect()
}

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_MUTEX
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

#[test]
fn empty_invocation_loads_defaults() {
    let _guard = env_lock();
    let config = Config::load_from_iter(args(&["stagehand"])).expect("defaults should load");
    assert_eq!(config.namespace(), DEFAULT_NAMESPACE);
    assert_eq!(config.release(), DEFAULT_RELEASE);
    assert!(config.ini_files.is_empty());
    assert!(config.databases.is_empty());
}

#[test]
fn environment_overrides_defaults() {
    let _override = EnvOverride::set_var("STAGEHAND_NAMESPACE", OsStr::new("com.env.app"));
    let config = Config::load_from_iter(args(&["stagehand"])).expect("config should load");
    assert_eq!(config.namespace(), "com.env.app");
}

#[test]
fn cli_overrides_environment() {
    let _override = EnvOverride::set_var("STAGEHAND_RELEASE", OsStr::new("couchbase-env"));
    let config = Config::load_from_iter(args(&["stagehand", "--release", "couchbase-cli"]))
        .expect("config should load");
    assert_eq!(config.release(), "couchbase-cli");
}

#[rstest]
#[case("json", LogFormat::Json)]
#[case("compact", LogFormat::Compact)]
#[case("COMPACT", LogFormat::Compact)]
fn log_format_parses_case_insensitively(#[case] text: &str, #[case] expected: LogFormat) {
    let parsed: LogFormat = text.parse().expect("log format should parse");
    assert_eq!(parsed, expected);
}

#[test]
fn unknown_log_format_is_rejected() {
    assert!("yaml".parse::<LogFormat>().is_err());
}
