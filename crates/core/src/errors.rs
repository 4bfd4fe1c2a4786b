//! Error types and handling
//!
//! One error enum per domain (process invocation, guards, dependency
//! verification, configuration, secrets), wrapped in the top-level
//! [`PlaygroundError`] that every workflow step returns.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while running an external command
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The shell could not be launched at all
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command exited with a non-zero status.
    ///
    /// Displays as the buffered stderr lines joined by newline, which is the
    /// detail surfaced to the user.
    #[error("{}", failure_detail(.command, .code, .stderr))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Waiting for the child to exit failed
    #[error("Failed to wait for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The producer side of a stream went away without reporting an outcome
    #[error("Process stream for `{command}` ended without an exit status")]
    Abandoned { command: String },
}

fn failure_detail(command: &str, code: &Option<i32>, stderr: &str) -> String {
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    match code {
        Some(code) => format!("`{}` exited with code {}", command, code),
        None => format!("`{}` was terminated by a signal", command),
    }
}

impl ProcessError {
    /// Exit code of a command that ran to completion and failed
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::Failed { code, .. } => *code,
            _ => None,
        }
    }
}

/// Unexpected conditions observed by guard steps
#[derive(Error, Debug)]
pub enum GuardError {
    /// A path that must be a directory is something else
    #[error("{} exists but is not a directory", .path.display())]
    NotADirectory { path: PathBuf },

    /// The path could not be inspected for a reason other than absence
    #[error("Unable to inspect {}: {source}", .path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The container probe itself failed
    #[error("Unable to determine whether container {name} is running: {detail}")]
    ContainerProbe { name: String, detail: String },
}

/// Required tool verification errors
#[derive(Error, Debug)]
pub enum DependencyError {
    /// The tool is not on the PATH
    #[error("{tool} is not installed or not accessible")]
    NotInstalled { tool: String },

    /// The tool is installed but too old
    #[error("{tool} {found} is installed, but version {required} or higher is required")]
    VersionTooOld {
        tool: String,
        found: String,
        required: String,
    },

    /// No version number could be read from the tool's output
    #[error("Could not determine the {tool} version from: {output}")]
    UnknownVersion { tool: String, output: String },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file parsing error
    #[error("Failed to parse configuration file: {message}")]
    Parsing { message: String },

    /// Configuration validation error
    #[error("Configuration validation error: {message}")]
    Validation { message: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: String },

    /// Configuration file I/O error
    #[error("Failed to read configuration file")]
    Io(#[from] std::io::Error),
}

/// Secrets collection errors
#[derive(Error, Debug)]
pub enum SecretsError {
    /// Secrets are missing and there is nobody to ask
    #[error("No secrets file found and no interactive terminal is available to ask for secrets")]
    NoTerminal,

    /// Reading an answer failed
    #[error("Failed to read answer: {0}")]
    Prompt(#[source] std::io::Error),

    /// A question was left unanswered
    #[error("No answer was given for {key}")]
    MissingAnswer { key: String },

    /// An answer was rejected by its question's rule
    #[error("Invalid answer for {key}: {message}")]
    InvalidAnswer { key: String, message: String },

    /// Persisting the answers failed
    #[error("Failed to write secrets file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Main error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum PlaygroundError {
    /// External command failures, surfaced unmodified
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Guard failures
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// Dependency verification failures
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Secrets errors
    #[error(transparent)]
    Secrets(#[from] SecretsError),

    /// Filesystem errors raised by native steps
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PlaygroundError {
    /// Wrap an I/O error with a short description of what was being done
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PlaygroundError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results with PlaygroundError
pub type Result<T> = std::result::Result<T, PlaygroundError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_process_failure_displays_buffered_stderr() {
        let error = ProcessError::Failed {
            command: "docker compose up -d".to_string(),
            code: Some(1),
            stderr: "first line\nsecond line".to_string(),
        };
        assert_eq!(format!("{}", error), "first line\nsecond line");
        assert_eq!(error.exit_code(), Some(1));
    }

    #[test]
    fn test_process_failure_without_stderr() {
        let error = ProcessError::Failed {
            command: "false".to_string(),
            code: Some(1),
            stderr: String::new(),
        };
        assert_eq!(format!("{}", error), "`false` exited with code 1");

        let error = ProcessError::Failed {
            command: "sleep 10".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert_eq!(format!("{}", error), "`sleep 10` was terminated by a signal");
    }

    #[test]
    fn test_process_error_is_transparent_at_top_level() {
        let error: PlaygroundError = ProcessError::Failed {
            command: "git clone".to_string(),
            code: Some(128),
            stderr: "fatal: repository not found".to_string(),
        }
        .into();
        assert_eq!(error.to_string(), "fatal: repository not found");
    }

    #[test]
    fn test_dependency_error_display() {
        let error = DependencyError::VersionTooOld {
            tool: "Docker".to_string(),
            found: "17.5.0".to_string(),
            required: "17.6.0".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Docker 17.5.0 is installed, but version 17.6.0 or higher is required"
        );

        let error = DependencyError::NotInstalled {
            tool: "Git".to_string(),
        };
        assert_eq!(error.to_string(), "Git is not installed or not accessible");
    }

    #[test]
    fn test_guard_error_display() {
        let error = GuardError::NotADirectory {
            path: PathBuf::from("/home/me/.local/share/topos-playground"),
        };
        assert_eq!(
            error.to_string(),
            "/home/me/.local/share/topos-playground exists but is not a directory"
        );
    }

    #[test]
    fn test_error_source_chain() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: PlaygroundError = GuardError::Inspect {
            path: PathBuf::from("/root"),
            source: io_error,
        }
        .into();

        // transparent wrapping forwards source() to the inner error's source
        assert!(error.source().is_some());
    }

    #[test]
    fn test_anyhow_conversions() {
        let error = PlaygroundError::Config(ConfigError::NotFound {
            path: "playground.toml".to_string(),
        });
        let anyhow_error = anyhow::Error::from(error);
        assert!(anyhow_error
            .to_string()
            .contains("Configuration file not found"));
    }
}
