//! The `clean` workflow
//!
//! `VerifyWorkingDirExists → VerifyExecutionPathExists →
//! ShutdownMessagingInfra → ShutdownCache → RemoveWorkingDirectory`
//!
//! Components that are already gone are skipped with a message. Only genuine
//! failures (an unreadable directory, a teardown command that fails) abort.

use super::quote_path;
use crate::config::PlaygroundConfig;
use crate::context::{ExecutionContext, Fact};
use crate::errors::Result;
use crate::guards::Guard;
use crate::pipeline::{Pipeline, ProcessStep, Step, StepContext};
use crate::process::ProcessInvocation;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info};

/// Assemble the clean workflow for `state`
pub fn clean_workflow(config: &PlaygroundConfig, state: &ExecutionContext) -> Pipeline {
    Pipeline::new("clean")
        .log("Welcome to Topos-Playground!")
        .log("")
        .guarded(
            Guard::WorkingDirExists,
            Pipeline::new("working directory present"),
            Pipeline::new("working directory missing")
                .log("Working directory was not found, nothing to clean!")
                .log(""),
        )
        .guard(Guard::ExecutionPathPopulated)
        .step(shutdown_messaging_infra(state))
        .step(shutdown_cache(config))
        .step(RemoveWorkingDir)
        .log("🧹 Everything is clean! 🧹")
        .log("")
}

fn shutdown_messaging_infra(state: &ExecutionContext) -> Pipeline {
    Pipeline::new("shutdown messaging infra")
        .log("Shutting down the ERC20 messaging infra...")
        .branch(
            Fact::ExecutionPathExists,
            Pipeline::new("infra present").process(
                ProcessInvocation::new("docker compose down -v").in_dir(&state.execution_path),
                "✅ subnets & TCE are down",
            ),
            Pipeline::new("infra absent").log("✅ subnets & TCE are already down"),
        )
        .log("")
}

fn shutdown_cache(config: &PlaygroundConfig) -> Pipeline {
    let container = &config.cache.container;
    Pipeline::new("shutdown cache")
        .log("Shutting down the redis server...")
        .guarded(
            Guard::ContainerRunning(container.clone()),
            Pipeline::new("cache running").process(
                ProcessInvocation::new(format!("docker rm -f {}", shell_words::quote(container))),
                "✅ redis is down",
            ),
            Pipeline::new("cache stopped").log("✅ redis is already down"),
        )
        .log("")
}

/// Removes the working directory when it exists and is safe to delete
#[derive(Debug, Default)]
pub struct RemoveWorkingDir;

#[async_trait]
impl Step for RemoveWorkingDir {
    fn name(&self) -> &str {
        "remove working directory"
    }

    async fn run(&self, cx: &mut StepContext<'_>) -> Result<()> {
        info!("Removing the working directory...");
        let target = cx.state.working_dir.clone();

        if !is_safe_removal_target(&target, &cx.state.home_dir) {
            error!(
                "❌ Working directory ({}) is not safe for removal!",
                target.display()
            );
            info!("");
            return Ok(());
        }
        if !cx.state.working_dir_exists {
            info!("✅ Working directory is already removed");
            info!("");
            return Ok(());
        }
        if !resolves_inside_home(&target, &cx.state.home_dir).await {
            error!(
                "❌ Working directory ({}) resolves outside of the home directory and is not safe for removal!",
                target.display()
            );
            info!("");
            return Ok(());
        }

        let invocation = ProcessInvocation::new(format!("rm -rf {}", quote_path(&target)));
        ProcessStep::new(invocation)
            .with_success("✅ Working directory has been removed")
            .run(cx)
            .await?;
        cx.state.working_dir_exists = false;
        info!("");
        Ok(())
    }
}

/// Resolve `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Whether `target` may be deleted recursively: it must lie strictly inside
/// `home`. Both paths must be absolute.
pub fn is_safe_removal_target(target: &Path, home: &Path) -> bool {
    if !target.is_absolute() || !home.is_absolute() {
        return false;
    }
    let target = normalize(target);
    let home = normalize(home);
    if home.parent().is_none() {
        return false;
    }
    target != home && target.starts_with(&home)
}

/// Whether `target` still lies strictly inside `home` once symlinks are
/// followed. Paths that cannot be resolved are not safe.
async fn resolves_inside_home(target: &Path, home: &Path) -> bool {
    match (
        tokio::fs::canonicalize(target).await,
        tokio::fs::canonicalize(home).await,
    ) {
        (Ok(target), Ok(home)) => is_safe_removal_target(&target, &home),
        (target, home) => {
            debug!(
                "Unable to resolve removal target: {:?} / {:?}",
                target.err(),
                home.err()
            );
            false
        }
    }
}
