//! Bundled `.env` templates
//!
//! Templates are compiled into the binary and appended to their destination
//! inside a cloned repository. An existing destination is never touched.

use crate::errors::{PlaygroundError, Result};
use crate::guards::Guard;
use crate::pipeline::{Pipeline, Step, StepContext};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

#[derive(Debug, PartialEq, Eq)]
pub struct EnvTemplate {
    pub name: &'static str,
    pub contents: &'static str,
}

pub const BUNDLED: &[EnvTemplate] = &[
    EnvTemplate {
        name: ".env.dapp-frontend",
        contents: include_str!("../templates/dapp-frontend.env"),
    },
    EnvTemplate {
        name: ".env.dapp-backend",
        contents: include_str!("../templates/dapp-backend.env"),
    },
    EnvTemplate {
        name: ".env.executor-service",
        contents: include_str!("../templates/executor-service.env"),
    },
];

/// Look up a bundled template by name
pub fn find(name: &str) -> Option<&'static EnvTemplate> {
    BUNDLED.iter().find(|template| template.name == name)
}

/// Append a template to its destination, creating missing parent directories
#[derive(Debug)]
pub struct AppendTemplate {
    template: &'static EnvTemplate,
    destination: PathBuf,
}

impl AppendTemplate {
    pub fn new(template: &'static EnvTemplate, destination: impl Into<PathBuf>) -> Self {
        Self {
            template,
            destination: destination.into(),
        }
    }
}

#[async_trait]
impl Step for AppendTemplate {
    fn name(&self) -> &str {
        self.template.name
    }

    async fn run(&self, _cx: &mut StepContext<'_>) -> Result<()> {
        let destination = &self.destination;
        let failed = |e| {
            PlaygroundError::io(format!("Failed to write {}", destination.display()), e)
        };

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(failed)?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(destination)
            .await
            .map_err(failed)?;
        file.write_all(self.template.contents.as_bytes())
            .await
            .map_err(failed)?;
        file.flush().await.map_err(failed)?;

        info!("✅ {} copied", self.template.name);
        Ok(())
    }
}

/// Copy one template unless its destination already exists
pub fn copy_env_file(template: &'static EnvTemplate, destination: &Path) -> Pipeline {
    Pipeline::new(template.name).guarded(
        Guard::PathExists(destination.to_path_buf()),
        Pipeline::new("already copied").log(format!("✅ {} already existing", template.name)),
        Pipeline::new("copy").step(AppendTemplate::new(template, destination)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ExecutionContext, RunFlags};
    use crate::process::mock::MockProcessRunner;
    use crate::process::StreamEvent;
    use tempfile::TempDir;

    fn state(temp_dir: &TempDir) -> ExecutionContext {
        ExecutionContext::for_dirs(
            temp_dir.path(),
            &temp_dir.path().join("work"),
            &temp_dir.path().join("logs"),
            "infra",
            RunFlags::default(),
        )
    }

    #[test]
    fn test_bundled_templates_are_present() {
        for name in [".env.dapp-frontend", ".env.dapp-backend", ".env.executor-service"] {
            let template = find(name).unwrap();
            assert!(!template.contents.trim().is_empty());
        }
        assert!(find(".env.unknown").is_none());
    }

    #[tokio::test]
    async fn test_template_is_copied_once() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir
            .path()
            .join("dapp")
            .join("packages")
            .join("frontend")
            .join(".env");
        let template = find(".env.dapp-frontend").unwrap();
        let runner = MockProcessRunner::new();
        let mut state = state(&temp_dir);

        for _ in 0..2 {
            copy_env_file(template, &destination)
                .execute(&mut state, &runner, &mut Vec::<StreamEvent>::new())
                .await
                .unwrap();
        }

        let written = std::fs::read_to_string(&destination).unwrap();
        assert_eq!(written, template.contents);
    }

    #[tokio::test]
    async fn test_existing_destination_is_never_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join(".env");
        std::fs::write(&destination, "PORT=9999\n").unwrap();

        copy_env_file(find(".env.executor-service").unwrap(), &destination)
            .execute(
                &mut state(&temp_dir),
                &MockProcessRunner::new(),
                &mut Vec::<StreamEvent>::new(),
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "PORT=9999\n");
    }
}
