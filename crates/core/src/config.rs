//! Playground configuration
//!
//! Built-in defaults describe the released playground: which repositories to
//! clone and at which tag, where their `.env` templates go, the cache
//! container, the contract-address source and the minimum tool versions. An
//! optional TOML file overrides any of them; unknown keys are rejected.
//!
//! ## Example
//!
//! ```toml
//! frontend_url = "http://localhost:3001"
//!
//! [cache]
//! port = 6380
//!
//! [contracts]
//! enabled = false
//!
//! [[repositories]]
//! organization = "topos-protocol"
//! name = "executor-service"
//! reference = "v1.1.0"
//! env_files = [{ template = ".env.executor-service", destination = ".env" }]
//! ```

use crate::dependencies::ToolRequirement;
use crate::errors::{ConfigError, PlaygroundError, Result};
use crate::templates;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, instrument};

/// Where a bundled template is copied inside a repository checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvFileTarget {
    /// Bundled template name, e.g. `.env.executor-service`
    pub template: String,
    /// Destination relative to the checkout
    pub destination: PathBuf,
}

impl EnvFileTarget {
    fn new(template: &str, destination: &str) -> Self {
        Self {
            template: template.to_string(),
            destination: PathBuf::from(destination),
        }
    }
}

/// A repository cloned into the working directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Repository {
    pub organization: String,
    pub name: String,
    /// Tag or branch to pin the shallow clone to
    pub reference: String,
    #[serde(default)]
    pub env_files: Vec<EnvFileTarget>,
}

impl Repository {
    fn new(name: &str, reference: &str, env_files: Vec<EnvFileTarget>) -> Self {
        Self {
            organization: "topos-protocol".to_string(),
            name: name.to_string(),
            reference: reference.to_string(),
            env_files,
        }
    }

    pub fn url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.organization, self.name)
    }
}

/// The cache server container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub container: String,
    pub image: String,
    pub port: u16,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            container: "redis-stack-server".to_string(),
            image: "redis/redis-stack-server:latest".to_string(),
            port: 6379,
        }
    }
}

/// Container file holding the deployed contract addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContractsSource {
    /// Copy the addresses out of the container after the infra is up
    pub enabled: bool,
    pub container: String,
    pub path: String,
}

impl Default for ContractsSource {
    fn default() -> Self {
        Self {
            enabled: true,
            container: "contracts-topos".to_string(),
            path: "/contracts/.env".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaygroundConfig {
    pub repositories: Vec<Repository>,
    /// Repository holding the compose file of the messaging infrastructure
    pub infra_repository: String,
    pub executor_repository: String,
    pub frontend_repository: String,
    pub cache: CacheConfig,
    pub contracts: ContractsSource,
    pub requirements: Vec<ToolRequirement>,
    pub frontend_url: String,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            repositories: vec![
                Repository::new("local-erc20-messaging-infra", "v0.1.7", Vec::new()),
                Repository::new(
                    "dapp-frontend-erc20-messaging",
                    "v1.0.0",
                    vec![
                        EnvFileTarget::new(".env.dapp-frontend", "packages/frontend/.env"),
                        EnvFileTarget::new(".env.dapp-backend", "packages/backend/.env"),
                    ],
                ),
                Repository::new(
                    "executor-service",
                    "v1.1.0",
                    vec![EnvFileTarget::new(".env.executor-service", ".env")],
                ),
            ],
            infra_repository: "local-erc20-messaging-infra".to_string(),
            executor_repository: "executor-service".to_string(),
            frontend_repository: "dapp-frontend-erc20-messaging".to_string(),
            cache: CacheConfig::default(),
            contracts: ContractsSource::default(),
            requirements: ToolRequirement::defaults(),
            frontend_url: "http://localhost:3001".to_string(),
        }
    }
}

impl PlaygroundConfig {
    /// Load the configuration from `path`, or the built-in defaults when no
    /// path is given
    #[instrument(skip_all)]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        debug!("Loading playground configuration from {}", path.display());

        if !path.exists() {
            return Err(PlaygroundError::Config(ConfigError::NotFound {
                path: path.display().to_string(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse a TOML document; absent keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            PlaygroundError::Config(ConfigError::Parsing {
                message: e.to_string(),
            })
        })
    }

    pub fn repository(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|repo| repo.name == name)
    }

    /// Check cross-references between sections
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| PlaygroundError::Config(ConfigError::Validation { message });

        for (role, name) in [
            ("infra_repository", &self.infra_repository),
            ("executor_repository", &self.executor_repository),
            ("frontend_repository", &self.frontend_repository),
        ] {
            if self.repository(name).is_none() {
                return Err(invalid(format!(
                    "{} '{}' is not one of the configured repositories",
                    role, name
                )));
            }
        }

        for repo in &self.repositories {
            if !is_plain_name(&repo.name) {
                return Err(invalid(format!(
                    "Repository name '{}' must be a single path component",
                    repo.name
                )));
            }
            for target in &repo.env_files {
                if templates::find(&target.template).is_none() {
                    return Err(invalid(format!(
                        "Unknown env template '{}' for repository {}",
                        target.template, repo.name
                    )));
                }
                if !stays_inside(&target.destination) {
                    return Err(invalid(format!(
                        "Env file destination '{}' must be relative to the {} checkout",
                        target.destination.display(),
                        repo.name
                    )));
                }
            }
        }

        for requirement in &self.requirements {
            requirement.minimum_version()?;
        }
        Ok(())
    }
}

fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn stays_inside(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && path.components().any(|c| matches!(c, Component::Normal(_)))
}
