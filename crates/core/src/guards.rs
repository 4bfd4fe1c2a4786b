//! Idempotency guards
//!
//! A guard inspects existing state, records exactly one [`Fact`] in the
//! [`ExecutionContext`] and completes. The expected negative case (path
//! missing, container stopped) is information, not an error; only abnormal
//! conditions such as a regular file where a directory is expected, or a
//! permissions error, fail the workflow.

use crate::context::{ExecutionContext, Fact};
use crate::errors::{GuardError, Result};
use crate::process::{ProcessInvocation, ProcessRunner};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The working directory exists
    WorkingDirExists,
    /// The working directory exists and is not empty
    WorkingDirPopulated,
    /// The infrastructure checkout exists and is not empty
    ExecutionPathPopulated,
    /// A file or directory exists
    PathExists(PathBuf),
    /// A directory exists and is not empty
    DirectoryPopulated(PathBuf),
    /// A container with this exact name is running
    ContainerRunning(String),
}

impl Guard {
    /// The fact this guard records
    pub fn fact(&self) -> Fact {
        match self {
            Guard::WorkingDirExists | Guard::WorkingDirPopulated => Fact::WorkingDirExists,
            Guard::ExecutionPathPopulated => Fact::ExecutionPathExists,
            Guard::PathExists(path) | Guard::DirectoryPopulated(path) => {
                Fact::PathPresent(path.clone())
            }
            Guard::ContainerRunning(name) => Fact::ContainerRunning(name.clone()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Guard::WorkingDirExists => "working directory exists".to_string(),
            Guard::WorkingDirPopulated => "working directory is populated".to_string(),
            Guard::ExecutionPathPopulated => "execution path is populated".to_string(),
            Guard::PathExists(path) => format!("{} exists", path.display()),
            Guard::DirectoryPopulated(path) => format!("{} is populated", path.display()),
            Guard::ContainerRunning(name) => format!("container {} is running", name),
        }
    }

    /// Inspect, record the outcome in `state`, and return it
    pub async fn check(
        &self,
        state: &mut ExecutionContext,
        runner: &dyn ProcessRunner,
    ) -> Result<bool> {
        let observed = match self {
            Guard::WorkingDirExists => directory_exists(&state.working_dir).await?,
            Guard::WorkingDirPopulated => directory_populated(&state.working_dir).await?,
            Guard::ExecutionPathPopulated => directory_populated(&state.execution_path).await?,
            Guard::PathExists(path) => path_exists(path).await?,
            Guard::DirectoryPopulated(path) => directory_populated(path).await?,
            Guard::ContainerRunning(name) => container_running(runner, name).await?,
        };
        debug!("🔍 {}: {}", self.describe(), observed);
        state.record(self.fact(), observed);
        Ok(observed)
    }
}

/// Whether anything exists at `path`
pub async fn path_exists(path: &Path) -> std::result::Result<bool, GuardError> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(GuardError::Inspect {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Whether `path` is an existing directory; anything else at that path is an error
pub async fn directory_exists(path: &Path) -> std::result::Result<bool, GuardError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Ok(true),
        Ok(_) => Err(GuardError::NotADirectory {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(GuardError::Inspect {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Whether `path` is a directory with at least one entry.
///
/// An empty directory reads the same as a missing one.
pub async fn directory_populated(path: &Path) -> std::result::Result<bool, GuardError> {
    if !directory_exists(path).await? {
        return Ok(false);
    }
    let inspect = |source| GuardError::Inspect {
        path: path.to_path_buf(),
        source,
    };
    let mut entries = tokio::fs::read_dir(path).await.map_err(inspect)?;
    Ok(entries.next_entry().await.map_err(inspect)?.is_some())
}

/// Shell command listing running containers whose name matches `name`.
///
/// The docker filter is a regex, so it is anchored; the output is still
/// checked for an exact line by [`container_running`].
pub fn container_probe_command(name: &str) -> String {
    format!(
        "docker ps --filter {} --format '{{{{.Names}}}}'",
        shell_words::quote(&format!("name=^{}$", name))
    )
}

/// Whether a container named `name` is running.
///
/// The probe's output is not forwarded anywhere. A missing `docker` binary
/// (exit status 127) means nothing can be running; any other failure of the
/// probe, such as an unreachable daemon, is an error.
pub async fn container_running(
    runner: &dyn ProcessRunner,
    name: &str,
) -> std::result::Result<bool, GuardError> {
    let invocation = ProcessInvocation::new(container_probe_command(name));
    match runner.run(&invocation).collect().await {
        Ok(output) => Ok(output.stdout.iter().any(|line| line.trim() == name)),
        Err(e) if e.exit_code() == Some(127) => {
            debug!("docker is not installed, {} cannot be running", name);
            Ok(false)
        }
        Err(e) => Err(GuardError::ContainerProbe {
            name: name.to_string(),
            detail: e.to_string(),
        }),
    }
}
