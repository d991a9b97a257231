use crate::{muted_error, weak_error};
use log::error;
use serde::Deserialize;
use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

/// Which managers refresh themselves on every stop and after mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AutoUpdate {
    pub registers: bool,
    pub expressions: bool,
    pub variables: bool,
    pub memory: bool,
}

impl Default for AutoUpdate {
    fn default() -> Self {
        Self {
            registers: true,
            expressions: true,
            variables: true,
            memory: true,
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Debugger executable, resolved through `PATH`.
    pub gdb: String,
    /// Extra arguments passed to the debugger.
    pub gdb_args: Vec<String>,
    /// Reply timeout for a single command in milliseconds.
    pub command_timeout_ms: u64,
    /// Number of frames fetched at once when a caller asks for part of a stack.
    pub stack_depth: u32,
    /// Wake-up interval while waiting for a target to stop, in milliseconds.
    pub suspend_poll_interval_ms: u64,
    /// Keep breakpoints that the debugger can't resolve yet.
    pub deferred_breakpoints: bool,
    pub autoupdate: AutoUpdate,
    /// Capacity of the type resolution cache.
    pub type_cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gdb: "gdb".to_string(),
            gdb_args: vec![],
            command_timeout_ms: 10_000,
            stack_depth: 200,
            suspend_poll_interval_ms: 1_000,
            deferred_breakpoints: true,
            autoupdate: AutoUpdate::default(),
            type_cache_size: 512,
        }
    }
}

impl Config {
    const DEFAULT_PATH: &'static str = ".config/migdb/config.toml";

    /// Load config from file. Return [`None`] on errors.
    pub fn from_file(path: Option<&Path>) -> Option<Self> {
        let data = match path {
            None => {
                let path = home::home_dir()?;
                let path = path.join(Self::DEFAULT_PATH);
                muted_error!(read_to_string(path))?
            }
            Some(path) => match read_to_string(path) {
                Ok(data) => data,
                Err(err) => {
                    error!("Error while load config file: {err}");
                    return None;
                }
            },
        };

        weak_error!(toml::de::from_str(&data), "config:")
    }

    /// Load config from file, fall back to defaults.
    pub fn load(path: Option<&Path>) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn suspend_poll_interval(&self) -> Duration {
        Duration::from_millis(self.suspend_poll_interval_ms.max(1))
    }
}
