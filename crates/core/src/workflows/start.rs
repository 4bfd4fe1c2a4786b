//! The `start` workflow
//!
//! `VerifyDependencies → EnsureWorkingDirExists → CloneRepositories →
//! CopyEnvFiles → CollectSecrets → StartMessagingInfra →
//! RetrieveContractAddresses → StartCache → StartExecutorService →
//! StartFrontendService`
//!
//! Every expensive or destructive action sits behind a guard, so re-running
//! the workflow on an already provisioned machine only re-verifies. The two
//! dev servers are started in the background and outlive the pipeline.

use super::{quote_path, with_env_files};
use crate::config::{PlaygroundConfig, Repository};
use crate::context::ExecutionContext;
use crate::dependencies::verify_dependencies;
use crate::errors::{ConfigError, PlaygroundError, Result};
use crate::guards::Guard;
use crate::pipeline::{Pipeline, Step, StepContext};
use crate::process::ProcessInvocation;
use crate::secrets::{verify_secrets, SecretsProvider};
use crate::templates;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Assemble the start workflow for `state`
pub fn start_workflow(
    config: &PlaygroundConfig,
    state: &ExecutionContext,
    secrets: Arc<dyn SecretsProvider>,
) -> Result<Pipeline> {
    let env_files = service_env_files(config, state);

    let mut pipeline = Pipeline::new("start")
        .log("Welcome to Topos-Playground!")
        .log("")
        .step(verify_dependencies(&config.requirements))
        .step(ensure_working_dir(state))
        .step(clone_repositories(config, state))
        .step(copy_env_files(config, state)?)
        .step(verify_secrets(&state.secrets_path(), secrets))
        .step(start_messaging_infra(state));

    if config.contracts.enabled {
        pipeline = pipeline.step(retrieve_contract_addresses(config, state));
    }

    Ok(pipeline
        .step(start_cache(config))
        .step(start_executor_service(config, state, &env_files))
        .step(start_frontend(config, state, &env_files))
        .log("🔥 Everything is done! 🔥")
        .log(""))
}

/// Files sourced before running the services
fn service_env_files(config: &PlaygroundConfig, state: &ExecutionContext) -> Vec<PathBuf> {
    let mut files = vec![state.secrets_path()];
    if config.contracts.enabled {
        files.push(state.addresses_path());
    }
    files
}

/// Creates the working directory and records that it now exists
#[derive(Debug, Default)]
pub struct CreateWorkingDir;

#[async_trait]
impl Step for CreateWorkingDir {
    fn name(&self) -> &str {
        "create working directory"
    }

    async fn run(&self, cx: &mut StepContext<'_>) -> Result<()> {
        let working_dir = &cx.state.working_dir;
        tokio::fs::create_dir_all(working_dir).await.map_err(|e| {
            PlaygroundError::io(
                format!("Could not create working directory ({})", working_dir.display()),
                e,
            )
        })?;
        cx.state.working_dir_exists = true;
        info!("✅ Working directory was successfully created");
        Ok(())
    }
}

fn ensure_working_dir(state: &ExecutionContext) -> Pipeline {
    Pipeline::new("ensure working directory")
        .log(format!(
            "Verifying working directory: [{}]...",
            state.working_dir.display()
        ))
        .guarded(
            Guard::WorkingDirExists,
            Pipeline::new("working directory present").log("✅ Working directory exists"),
            Pipeline::new("working directory missing").step(CreateWorkingDir),
        )
        .log("")
}

fn clone_command(repo: &Repository, destination: &std::path::Path) -> String {
    format!(
        "git clone --depth 1 --branch {} {} {}",
        shell_words::quote(&repo.reference),
        shell_words::quote(&repo.url()),
        quote_path(destination)
    )
}

fn clone_repositories(config: &PlaygroundConfig, state: &ExecutionContext) -> Pipeline {
    config
        .repositories
        .iter()
        .fold(
            Pipeline::new("clone repositories").log("Cloning repositories..."),
            |pipeline, repo| {
                let destination = state.repository_dir(&repo.name);
                let label = format!("{} | {}", repo.name, repo.reference);
                pipeline.guarded(
                    Guard::DirectoryPopulated(destination.clone()),
                    Pipeline::new("already cloned").log(format!("✅ {} already cloned", label)),
                    Pipeline::new("clone").process(
                        ProcessInvocation::new(clone_command(repo, &destination)),
                        format!("✅ {} successfully cloned", label),
                    ),
                )
            },
        )
        .log("")
}

fn copy_env_files(config: &PlaygroundConfig, state: &ExecutionContext) -> Result<Pipeline> {
    let mut pipeline = Pipeline::new("copy env files").log("Copying .env files across repositories...");
    for repo in &config.repositories {
        let checkout = state.repository_dir(&repo.name);
        for target in &repo.env_files {
            let template = templates::find(&target.template).ok_or_else(|| {
                PlaygroundError::Config(ConfigError::Validation {
                    message: format!("Unknown env template '{}'", target.template),
                })
            })?;
            pipeline = pipeline.step(templates::copy_env_file(
                template,
                &checkout.join(&target.destination),
            ));
        }
    }
    Ok(pipeline.log(""))
}

fn start_messaging_infra(state: &ExecutionContext) -> Pipeline {
    let command = with_env_files(&[state.secrets_path()], "docker compose up -d");
    Pipeline::new("start messaging infra")
        .log("Running the ERC20 messaging infra...")
        .process(
            ProcessInvocation::new(command).in_dir(&state.execution_path),
            "✅ Subnets & TCE are running",
        )
        .log("")
}

fn retrieve_contract_addresses(config: &PlaygroundConfig, state: &ExecutionContext) -> Pipeline {
    let source = format!("{}:{}", config.contracts.container, config.contracts.path);
    let command = format!(
        "docker cp {} {}",
        shell_words::quote(&source),
        quote_path(&state.addresses_path())
    );
    Pipeline::new("retrieve contract addresses")
        .log("Retrieving contract addresses...")
        .process(
            ProcessInvocation::new(command),
            "✅ Contract addresses were retrieved",
        )
        .log("")
}

fn start_cache(config: &PlaygroundConfig) -> Pipeline {
    let name = shell_words::quote(&config.cache.container);
    let command = format!(
        "docker start {name} 2>/dev/null || docker run -d --name {name} -p {port}:6379 {image}",
        name = name,
        port = config.cache.port,
        image = shell_words::quote(&config.cache.image),
    );
    Pipeline::new("start cache")
        .log("Running the redis server...")
        .process(ProcessInvocation::new(command), "✅ redis is running")
        .log("")
}

fn start_executor_service(
    config: &PlaygroundConfig,
    state: &ExecutionContext,
    env_files: &[PathBuf],
) -> Pipeline {
    let checkout = state.repository_dir(&config.executor_repository);
    Pipeline::new("start executor service")
        .log("Running the Executor Service...")
        .process(
            ProcessInvocation::new("npm install").in_dir(&checkout),
            "✅ Deps are installed",
        )
        .process(
            ProcessInvocation::new(with_env_files(env_files, "npm start"))
                .in_dir(&checkout)
                .in_background(),
            "✅ Web server is running",
        )
        .log("")
}

fn start_frontend(
    config: &PlaygroundConfig,
    state: &ExecutionContext,
    env_files: &[PathBuf],
) -> Pipeline {
    let checkout = state.repository_dir(&config.frontend_repository);
    Pipeline::new("start dapp frontend")
        .log("Running the dApp Frontend...")
        .process(
            ProcessInvocation::new("npm install").in_dir(&checkout),
            "✅ Deps are installed",
        )
        .process(
            ProcessInvocation::new(with_env_files(env_files, "npm run frontend:build"))
                .in_dir(&checkout),
            "✅ Static files are built",
        )
        .process(
            ProcessInvocation::new(with_env_files(env_files, "npm run backend:start"))
                .in_dir(&checkout)
                .in_background(),
            "✅ Web server is running",
        )
        .log("")
}
