//! Required tool verification
//!
//! Each requirement runs the tool's version command, reads the first version
//! number from its stdout and compares it against a minimum. An absent tool
//! (shell exit status 127) and a too-old tool are distinct fatal failures.

use crate::errors::{ConfigError, DependencyError, PlaygroundError, Result};
use crate::pipeline::{Pipeline, Step, StepContext};
use crate::process::ProcessInvocation;
use crate::semver_utils::{extract_version, meets_minimum, parse_version};
use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Shell exit status for "command not found"
const COMMAND_NOT_FOUND: i32 = 127;

/// A tool that must be installed, with its minimum version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolRequirement {
    /// Display name
    pub name: String,
    /// Command printing the version, e.g. `docker --version`
    pub command: String,
    /// Minimum accepted version
    pub minimum: String,
}

impl ToolRequirement {
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        minimum: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            minimum: minimum.into(),
        }
    }

    /// Container runtime, version control and the JavaScript toolchain
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("Docker", "docker --version", "17.6.0"),
            Self::new("Git", "git --version", "2.0.0"),
            Self::new("Node.js", "node --version", "16.0.0"),
        ]
    }

    pub fn minimum_version(&self) -> std::result::Result<Version, ConfigError> {
        parse_version(&self.minimum).ok_or_else(|| ConfigError::Validation {
            message: format!(
                "Invalid minimum version '{}' for {}",
                self.minimum, self.name
            ),
        })
    }

    /// Check version-command output against the minimum
    pub fn check(&self, output: &str) -> Result<Version> {
        let minimum = self.minimum_version()?;
        let found = extract_version(output).ok_or_else(|| DependencyError::UnknownVersion {
            tool: self.name.clone(),
            output: output.trim().to_string(),
        })?;

        if !meets_minimum(&found, &minimum) {
            return Err(DependencyError::VersionTooOld {
                tool: self.name.clone(),
                found: found.to_string(),
                required: minimum.to_string(),
            }
            .into());
        }
        Ok(found)
    }
}

/// Runs one requirement's version command and checks the result
#[derive(Debug, Clone)]
pub struct VerifyTool {
    requirement: ToolRequirement,
}

impl VerifyTool {
    pub fn new(requirement: ToolRequirement) -> Self {
        Self { requirement }
    }
}

#[async_trait]
impl Step for VerifyTool {
    fn name(&self) -> &str {
        &self.requirement.name
    }

    async fn run(&self, cx: &mut StepContext<'_>) -> Result<()> {
        let invocation = ProcessInvocation::new(self.requirement.command.clone());
        let output = match cx.runner.run(&invocation).forward(&mut *cx.events).await {
            Ok(output) => output,
            Err(e) if e.exit_code() == Some(COMMAND_NOT_FOUND) => {
                return Err(DependencyError::NotInstalled {
                    tool: self.requirement.name.clone(),
                }
                .into());
            }
            Err(e) => return Err(PlaygroundError::Process(e)),
        };

        let version = self.requirement.check(&output.stdout.join("\n"))?;
        debug!(
            "{} {} satisfies >= {}",
            self.requirement.name, version, self.requirement.minimum
        );
        info!("✅ {} {}", self.requirement.name, version);
        Ok(())
    }
}

/// The "verify dependency installation" sub-pipeline
pub fn verify_dependencies(requirements: &[ToolRequirement]) -> Pipeline {
    requirements
        .iter()
        .cloned()
        .fold(
            Pipeline::new("verify dependency installation").log("Verifying dependency installation..."),
            |pipeline, requirement| pipeline.step(VerifyTool::new(requirement)),
        )
        .log("")
}
