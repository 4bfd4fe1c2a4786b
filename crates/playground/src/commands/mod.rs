//! Command implementations
//!
//! `start` and `clean` share one session setup: load the configuration,
//! resolve the execution context, create the log directory and install
//! logging. Workflow failures are reported once, here, and surface to `main`
//! as [`WorkflowAborted`].

pub mod clean;
pub mod start;
pub mod version;

use anyhow::Result;
use playground_core::config::PlaygroundConfig;
use playground_core::context::{EnvVars, ExecutionContext, RunFlags};
use playground_core::logging::{self, LogSettings};
use playground_core::pipeline::Pipeline;
use playground_core::process::{LogSink, ShellRunner};
use std::path::Path;
use tracing::{debug, error, warn};

/// A workflow failed and the failure was already reported
#[derive(Debug)]
pub struct WorkflowAborted;

impl std::fmt::Display for WorkflowAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Workflow aborted")
    }
}

impl std::error::Error for WorkflowAborted {}

/// Everything a workflow command needs for one run
#[derive(Debug)]
pub struct Session {
    pub config: PlaygroundConfig,
    pub context: ExecutionContext,
    pub runner: ShellRunner,
}

impl Session {
    pub fn open(flags: RunFlags, config_path: Option<&Path>) -> Result<Self> {
        let config = PlaygroundConfig::load(config_path)?;
        let mut context =
            ExecutionContext::resolve(&EnvVars::from_process(), &config.infra_repository, flags)?;

        let log_dir_error = if context.no_log {
            None
        } else {
            std::fs::create_dir_all(&context.log_dir).err()
        };
        if log_dir_error.is_some() {
            context.no_log = true;
        }

        logging::init(&LogSettings::from_context(&context))?;

        if let Some(e) = log_dir_error {
            warn!(
                "Could not create log directory {} ({}), logging to the console only",
                context.log_dir.display(),
                e
            );
        }
        debug!("Working directory: {}", context.working_dir.display());

        Ok(Self {
            config,
            context,
            runner: ShellRunner::from_env(),
        })
    }

    /// Run `workflow` to completion, reporting the first failure
    pub async fn run(&mut self, workflow: Pipeline) -> Result<()> {
        let mut sink = LogSink;
        if let Err(err) = workflow
            .execute(&mut self.context, &self.runner, &mut sink)
            .await
        {
            error!("❌ {}", err);
            if !self.context.no_log {
                error!(
                    "👉 Find the full log file in {}",
                    self.context.log_file.display()
                );
            }
            return Err(WorkflowAborted.into());
        }
        Ok(())
    }
}
