//! Integration tests for the clean workflow against the mock process runner

mod common;

use common::Fixture;
use playground_core::context::{ExecutionContext, RunFlags};
use playground_core::errors::{GuardError, PlaygroundError};
use playground_core::process::mock::MockResponse;
use playground_core::process::StreamEvent;
use playground_core::workflows::clean_workflow;

async fn run_clean(
    fixture: &Fixture,
    mut state: ExecutionContext,
) -> Result<ExecutionContext, PlaygroundError> {
    let workflow = clean_workflow(&fixture.config, &state);
    let mut events: Vec<StreamEvent> = Vec::new();
    workflow
        .execute(&mut state, &fixture.runner, &mut events)
        .await?;
    Ok(state)
}

fn provision(state: &ExecutionContext) {
    std::fs::create_dir_all(&state.execution_path).unwrap();
    std::fs::write(state.execution_path.join("docker-compose.yml"), "services: {}\n").unwrap();
}

fn cache_running(fixture: &Fixture) {
    fixture.runner.respond(
        "docker ps",
        MockResponse::success().with_stdout("redis-stack-server"),
    );
}

#[tokio::test]
async fn test_clean_tears_everything_down() {
    let fixture = Fixture::new();
    cache_running(&fixture);
    let state = fixture.context();
    provision(&state);

    let state = run_clean(&fixture, state).await.unwrap();

    let calls = fixture.runner.calls();
    let compose = calls
        .iter()
        .find(|c| c.invocation.command == "docker compose down -v")
        .expect("compose down was run");
    assert_eq!(
        compose.invocation.working_dir.as_deref(),
        Some(state.execution_path.as_path())
    );
    assert_eq!(fixture.runner.count_matching("docker rm -f redis-stack-server"), 1);
    assert_eq!(fixture.runner.count_matching("rm -rf"), 1);
    assert!(!state.working_dir_exists);

    let commands = fixture.runner.commands();
    let compose_at = commands.iter().position(|c| c.contains("compose down")).unwrap();
    let remove_at = commands.iter().position(|c| c.starts_with("rm -rf")).unwrap();
    assert!(compose_at < remove_at);
}

#[tokio::test]
async fn test_missing_working_dir_is_not_an_error() {
    let fixture = Fixture::new();
    let state = fixture.context();

    run_clean(&fixture, state).await.unwrap();

    assert_eq!(fixture.runner.count_matching("compose down"), 0);
    assert_eq!(fixture.runner.count_matching("rm -rf"), 0);
}

#[tokio::test]
async fn test_stopped_cache_is_skipped() {
    let fixture = Fixture::new();
    fixture.runner.respond("docker ps", MockResponse::success());
    let state = fixture.context();
    provision(&state);

    run_clean(&fixture, state).await.unwrap();

    assert_eq!(fixture.runner.count_matching("docker rm"), 0);
    assert_eq!(fixture.runner.count_matching("rm -rf"), 1);
}

#[tokio::test]
async fn test_unreachable_docker_daemon_aborts() {
    let fixture = Fixture::new();
    fixture.runner.respond(
        "docker ps",
        MockResponse::failure(1).with_stderr("Cannot connect to the Docker daemon"),
    );
    let state = fixture.context();
    provision(&state);

    let error = run_clean(&fixture, state).await.unwrap_err();

    assert!(matches!(
        error,
        PlaygroundError::Guard(GuardError::ContainerProbe { .. })
    ));
    assert_eq!(fixture.runner.count_matching("docker rm"), 0);
    assert_eq!(fixture.runner.count_matching("rm -rf"), 0);
}

#[tokio::test]
async fn test_failed_cache_removal_aborts() {
    let fixture = Fixture::new();
    cache_running(&fixture);
    fixture.runner.respond(
        "docker rm -f redis-stack-server",
        MockResponse::failure(1)
            .with_stderr("Error response from daemon: removal of container is already in progress"),
    );
    let state = fixture.context();
    let working_dir = state.working_dir.clone();
    provision(&state);

    let error = run_clean(&fixture, state).await.unwrap_err();

    assert_eq!(
        error.to_string(),
        "Error response from daemon: removal of container is already in progress"
    );
    assert_eq!(fixture.runner.count_matching("compose down"), 1);
    assert_eq!(fixture.runner.count_matching("rm -rf"), 0);
    assert!(working_dir.is_dir());
}

#[tokio::test]
async fn test_home_directory_is_never_removed() {
    let fixture = Fixture::new();
    let home = fixture.home().to_path_buf();
    let state = ExecutionContext::for_dirs(
        &home,
        &home,
        &home.join(".local/state/topos-playground/logs"),
        &fixture.config.infra_repository,
        RunFlags::default(),
    );
    provision(&state);

    let state = run_clean(&fixture, state).await.unwrap();

    assert_eq!(fixture.runner.count_matching("rm -rf"), 0);
    assert!(state.working_dir_exists);
    assert!(home.join(&fixture.config.infra_repository).is_dir());
}

#[tokio::test]
async fn test_failed_teardown_keeps_working_dir() {
    let fixture = Fixture::new();
    fixture.runner.respond(
        "docker compose down",
        MockResponse::failure(1).with_stderr("no configuration file provided: not found"),
    );
    let state = fixture.context();
    provision(&state);

    let error = run_clean(&fixture, state).await.unwrap_err();

    assert_eq!(error.to_string(), "no configuration file provided: not found");
    assert_eq!(fixture.runner.count_matching("docker rm"), 0);
    assert_eq!(fixture.runner.count_matching("rm -rf"), 0);
}
