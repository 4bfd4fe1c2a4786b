//! Shared test helpers for core integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use playground_core::config::PlaygroundConfig;
use playground_core::context::{EnvVars, ExecutionContext, RunFlags};
use playground_core::errors::SecretsError;
use playground_core::process::mock::{MockProcessRunner, MockResponse};
use playground_core::secrets::{AnswerRule, SecretAnswers, SecretQuestion, SecretsProvider};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Answers every question with a valid canned value and counts how often it was asked
#[derive(Debug, Default)]
pub struct FixedAnswers {
    pub asked: AtomicUsize,
}

#[async_trait]
impl SecretsProvider for FixedAnswers {
    async fn ask(&self, questions: &[SecretQuestion]) -> Result<SecretAnswers, SecretsError> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        Ok(questions
            .iter()
            .map(|q| {
                let value = match q.rule {
                    AnswerRule::PrivateKey => format!("0x{}", "1f".repeat(32)),
                    AnswerRule::NonEmpty => format!("{}-test", q.key.to_lowercase()),
                };
                (q.key.to_string(), value)
            })
            .collect())
    }
}

/// A fake home directory plus a scripted runner
pub struct Fixture {
    pub temp_dir: TempDir,
    pub config: PlaygroundConfig,
    pub runner: MockProcessRunner,
    pub secrets: Arc<FixedAnswers>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
            config: PlaygroundConfig::default(),
            runner: MockProcessRunner::new(),
            secrets: Arc::new(FixedAnswers::default()),
        }
    }

    pub fn home(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A fresh context, as a new process would resolve it
    pub fn context(&self) -> ExecutionContext {
        let env = EnvVars {
            home: Some(self.home().to_path_buf()),
            ..EnvVars::default()
        };
        ExecutionContext::resolve(&env, &self.config.infra_repository, RunFlags::default())
            .unwrap()
    }

    /// Script supported versions for every required tool
    pub fn script_tools(&self) {
        self.runner.respond(
            "docker --version",
            MockResponse::success().with_stdout("Docker version 24.0.7, build afdd53b"),
        );
        self.runner.respond(
            "git --version",
            MockResponse::success().with_stdout("git version 2.39.2"),
        );
        self.runner.respond(
            "node --version",
            MockResponse::success().with_stdout("v18.17.0"),
        );
    }

    /// Make every clone populate its destination like git would
    pub fn script_clones(&self) {
        let context = self.context();
        for repo in &self.config.repositories {
            self.runner.respond(
                format!("{}.git", repo.name),
                MockResponse::success()
                    .with_stderr(format!("Cloning into '{}'...", repo.name))
                    .creating(context.repository_dir(&repo.name).join("package.json")),
            );
        }
    }

    /// Tools, clones and defaults for every other command
    pub fn script_happy_path(&self) {
        self.script_tools();
        self.script_clones();
    }
}
