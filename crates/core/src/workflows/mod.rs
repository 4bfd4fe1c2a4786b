//! The `start` and `clean` workflows
//!
//! Both are plain [`Pipeline`](crate::pipeline::Pipeline)s assembled from the
//! configuration and the resolved paths of an
//! [`ExecutionContext`](crate::context::ExecutionContext), then executed
//! against that same context.

pub mod clean;
pub mod start;

pub use clean::{clean_workflow, is_safe_removal_target};
pub use start::start_workflow;

use std::path::{Path, PathBuf};

/// Shell-quote a path for use in a command line
pub(crate) fn quote_path(path: &Path) -> String {
    shell_words::quote(&path.to_string_lossy()).into_owned()
}

/// Wrap `command` so it runs with the variables of `env_files` exported.
///
/// Sourcing is POSIX syntax, so the wrapped command always goes through
/// `sh -c` whatever the user's `$SHELL` is.
pub(crate) fn with_env_files(env_files: &[PathBuf], command: &str) -> String {
    if env_files.is_empty() {
        return command.to_string();
    }
    let sourced: Vec<String> = env_files
        .iter()
        .map(|file| format!(". {}", quote_path(file)))
        .collect();
    let script = format!("set -a && {} && set +a && {}", sourced.join(" && "), command);
    format!("sh -c {}", shell_words::quote(&script))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_path() {
        assert_eq!(quote_path(Path::new("/home/me/work")), "/home/me/work");
        assert_eq!(
            quote_path(Path::new("/home/me/my work")),
            "'/home/me/my work'"
        );
    }

    #[test]
    fn test_with_env_files() {
        assert_eq!(with_env_files(&[], "npm start"), "npm start");
        assert_eq!(
            with_env_files(
                &[
                    PathBuf::from("/w/.env.secrets"),
                    PathBuf::from("/w/.env.addresses")
                ],
                "npm start"
            ),
            "sh -c 'set -a && . /w/.env.secrets && . /w/.env.addresses && set +a && npm start'"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_files_are_exported_under_any_shell() {
        use crate::process::{ProcessInvocation, ProcessRunner, ShellRunner};

        let temp_dir = tempfile::TempDir::new().unwrap();
        let env_file = temp_dir.path().join("my env");
        std::fs::write(&env_file, "export GREETING='hello there'\nPLAIN=1\n").unwrap();

        let command = with_env_files(&[env_file], "echo \"$GREETING\" && env | grep -c ^PLAIN=");
        let output = ShellRunner::new("/bin/sh")
            .run(&ProcessInvocation::new(command))
            .collect()
            .await
            .unwrap();

        assert_eq!(output.stdout, vec!["hello there", "1"]);
    }
}
