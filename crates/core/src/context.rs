//! Per-run execution context
//!
//! Resolved paths, the facts recorded by guard steps, and the verbosity flags.
//! A context is built once per workflow run and handed by mutable reference
//! to every step, so there is exactly one writer at a time.

use crate::errors::{ConfigError, PlaygroundError, Result};
use chrono::Local;
use directories_next::BaseDirs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Name used for the data and state subdirectories
pub const APP_NAME: &str = "topos-playground";

/// File holding the exported secrets, relative to the working directory
pub const SECRETS_FILE: &str = ".env.secrets";

/// File holding the deployed contract addresses, relative to the working directory
pub const ADDRESSES_FILE: &str = ".env.addresses";

/// Environment inputs that determine the resolved paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    pub home: Option<PathBuf>,
    pub data_home: Option<PathBuf>,
    pub state_home: Option<PathBuf>,
}

impl EnvVars {
    /// Read `HOME`, `XDG_DATA_HOME` and `XDG_STATE_HOME` from the process
    /// environment, falling back to the platform home directory.
    pub fn from_process() -> Self {
        let var = |name: &str| {
            std::env::var_os(name)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };
        Self {
            home: var("HOME")
                .or_else(|| BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())),
            data_home: var("XDG_DATA_HOME"),
            state_home: var("XDG_STATE_HOME"),
        }
    }
}

/// Global command-line modifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    pub verbose: bool,
    pub quiet: bool,
    pub no_log: bool,
}

/// A boolean fact a guard can record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fact {
    WorkingDirExists,
    ExecutionPathExists,
    /// A specific path was found present (and populated, for directories)
    PathPresent(PathBuf),
    ContainerRunning(String),
}

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub home_dir: PathBuf,
    pub working_dir: PathBuf,
    pub working_dir_exists: bool,
    /// Checkout of the messaging infrastructure repository
    pub execution_path: PathBuf,
    pub execution_path_exists: bool,
    pub log_dir: PathBuf,
    pub log_file: PathBuf,
    pub verbose: bool,
    pub quiet: bool,
    pub no_log: bool,
    observed_paths: HashMap<PathBuf, bool>,
    running_containers: HashMap<String, bool>,
}

impl ExecutionContext {
    /// Resolve the context from environment inputs.
    ///
    /// The working directory is `<data_home>/topos-playground` and the log
    /// directory `<state_home>/topos-playground/logs`, with the XDG defaults
    /// `~/.local/share` and `~/.local/state`. Relative XDG values are ignored.
    pub fn resolve(env: &EnvVars, infra_repository: &str, flags: RunFlags) -> Result<Self> {
        let home = env.home.clone().ok_or_else(|| {
            PlaygroundError::Config(ConfigError::Validation {
                message: "Unable to determine the home directory; set HOME".to_string(),
            })
        })?;

        let data_home = absolute(env.data_home.as_deref())
            .unwrap_or_else(|| home.join(".local").join("share"));
        let state_home = absolute(env.state_home.as_deref())
            .unwrap_or_else(|| home.join(".local").join("state"));

        Ok(Self::for_dirs(
            &home,
            &data_home.join(APP_NAME),
            &state_home.join(APP_NAME).join("logs"),
            infra_repository,
            flags,
        ))
    }

    /// Build a context from already-resolved directories
    pub fn for_dirs(
        home_dir: &Path,
        working_dir: &Path,
        log_dir: &Path,
        infra_repository: &str,
        flags: RunFlags,
    ) -> Self {
        Self {
            home_dir: home_dir.to_path_buf(),
            working_dir: working_dir.to_path_buf(),
            working_dir_exists: false,
            execution_path: working_dir.join(infra_repository),
            execution_path_exists: false,
            log_dir: log_dir.to_path_buf(),
            log_file: log_dir.join(log_file_name()),
            verbose: flags.verbose,
            quiet: flags.quiet,
            no_log: flags.no_log,
            observed_paths: HashMap::new(),
            running_containers: HashMap::new(),
        }
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.working_dir.join(SECRETS_FILE)
    }

    pub fn addresses_path(&self) -> PathBuf {
        self.working_dir.join(ADDRESSES_FILE)
    }

    /// Checkout directory of a repository inside the working directory
    pub fn repository_dir(&self, name: &str) -> PathBuf {
        self.working_dir.join(name)
    }

    /// Store the outcome of a guard
    pub fn record(&mut self, fact: Fact, value: bool) {
        match fact {
            Fact::WorkingDirExists => self.working_dir_exists = value,
            Fact::ExecutionPathExists => self.execution_path_exists = value,
            Fact::PathPresent(path) => {
                self.observed_paths.insert(path, value);
            }
            Fact::ContainerRunning(name) => {
                self.running_containers.insert(name, value);
            }
        }
    }

    /// Whether a fact was recorded as true; unobserved facts do not hold
    pub fn holds(&self, fact: &Fact) -> bool {
        match fact {
            Fact::WorkingDirExists => self.working_dir_exists,
            Fact::ExecutionPathExists => self.execution_path_exists,
            Fact::PathPresent(path) => self.observed_paths.get(path).copied().unwrap_or(false),
            Fact::ContainerRunning(name) => {
                self.running_containers.get(name).copied().unwrap_or(false)
            }
        }
    }
}

fn absolute(path: Option<&Path>) -> Option<PathBuf> {
    path.filter(|p| p.is_absolute()).map(Path::to_path_buf)
}

fn log_file_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!(
        "log-{}-{}.log",
        Local::now().format("%Y%m%d-%H%M%S"),
        &id[..8]
    )
}
