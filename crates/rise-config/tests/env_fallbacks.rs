//! Environment fallbacks for the shared plugin flags.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use clap::Parser;
use once_cell::sync::Lazy;
use rise_config::{LogFormat, PluginArgs};
use tempfile::TempDir;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Parser, Debug)]
struct Harness {
    #[command(flatten)]
    args: PluginArgs,
}

struct EnvOverride {
    vars: Vec<(&'static str, Option<OsString>)>,
    guard: Option<MutexGuard<'static, ()>>,
}

impl EnvOverride {
    fn set(pairs: &[(&'static str, &OsStr)]) -> Self {
        let guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        let mut vars = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            vars.push((*key, std::env::var_os(key)));
            // Environment mutation is unsafe in edition 2024; the mutex keeps
            // tests in this binary from racing.
            unsafe { std::env::set_var(key, value) };
        }
        Self {
            vars,
            guard: Some(guard),
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        for (key, previous) in self.vars.drain(..) {
            match previous {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
        drop(self.guard.take());
    }
}

#[test]
fn environment_supplies_missing_flags() {
    let temp = TempDir::new().expect("create temp dir");
    let _env = EnvOverride::set(&[
        ("RISE_PLUGIN_DIR", temp.path().as_os_str()),
        ("RISE_LOG_FILTER", OsStr::new("warn")),
        ("RISE_LOG_FORMAT", OsStr::new("compact")),
    ]);

    let harness = Harness::try_parse_from(["plugin"]).expect("env should satisfy flags");

    assert_eq!(harness.args.base_dir(), temp.path().to_path_buf());
    assert_eq!(harness.args.log_filter, "warn");
    assert_eq!(harness.args.log_format, LogFormat::Compact);
}

#[test]
fn flags_take_precedence_over_environment() {
    let _env = EnvOverride::set(&[
        ("RISE_PLUGIN_DIR", OsStr::new("/from/env")),
        ("RISE_LOG_FORMAT", OsStr::new("compact")),
    ]);

    let harness =
        Harness::try_parse_from(["plugin", "--plugin-dir", "/from/flag", "--log-format", "json"])
            .expect("flags should parse");

    assert_eq!(harness.args.base_dir(), PathBuf::from("/from/flag"));
    assert_eq!(harness.args.log_format, LogFormat::Json);
}

#[test]
fn plugin_layout_is_created_under_environment_directory() {
    let temp = TempDir::new().expect("create temp dir");
    let _env = EnvOverride::set(&[("RISE_PLUGIN_DIR", temp.path().as_os_str())]);

    let harness = Harness::try_parse_from(["plugin"]).expect("env should satisfy flags");
    let paths = harness.args.paths("weather").expect("paths should derive");
    paths.ensure_dir().expect("plugin dir should be created");

    assert!(temp.path().join("weather").is_dir());
    assert_eq!(paths.log_path(), temp.path().join("weather/weather.log"));
}
