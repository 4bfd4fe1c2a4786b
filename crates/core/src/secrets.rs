//! Secrets collection
//!
//! The services need a funded account key, the deployment salts of the
//! messaging contracts and an OAuth client. When the secrets file is missing
//! the answers are collected from a [`SecretsProvider`] and persisted as a
//! shell-sourceable file that later commands `.`-source.
//!
//! ## File Format
//!
//! ```text
//! export PRIVATE_KEY='0x…'
//! export TOKEN_DEPLOYER_SALT='…'
//! ```
//!
//! Values are shell-quoted, and the file is readable by its owner only.

use crate::errors::{Result, SecretsError};
use crate::guards::Guard;
use crate::pipeline::{Pipeline, Step, StepContext};
use async_trait::async_trait;
use console::{style, Term};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Answers keyed by environment variable name, in question order
pub type SecretAnswers = IndexMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerRule {
    /// A 0x-prefixed 32-byte hex string
    PrivateKey,
    NonEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretQuestion {
    /// Exported variable name
    pub key: &'static str,
    pub prompt: &'static str,
    /// Read without echo
    pub hidden: bool,
    pub rule: AnswerRule,
}

impl SecretQuestion {
    /// Check an answer, returning the message to show when it is rejected
    pub fn validate(&self, answer: &str) -> std::result::Result<(), &'static str> {
        match self.rule {
            AnswerRule::PrivateKey if !is_private_key(answer) => {
                Err("Please provide a valid 32-byte 0x-prefixed hex string!")
            }
            AnswerRule::NonEmpty if answer.trim().is_empty() => Err("A value is required"),
            _ => Ok(()),
        }
    }
}

fn is_private_key(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .map(|hex| hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

pub const QUESTIONS: &[SecretQuestion] = &[
    SecretQuestion {
        key: "PRIVATE_KEY",
        prompt: "Please provide the private key of the account which will pay fees",
        hidden: true,
        rule: AnswerRule::PrivateKey,
    },
    SecretQuestion {
        key: "TOKEN_DEPLOYER_SALT",
        prompt: "Please provide the salt of the deployment of the TokenDeployer contract",
        hidden: false,
        rule: AnswerRule::NonEmpty,
    },
    SecretQuestion {
        key: "TOPOS_CORE_SALT",
        prompt: "Please provide the salt of the deployment of the ToposCore contract",
        hidden: false,
        rule: AnswerRule::NonEmpty,
    },
    SecretQuestion {
        key: "TOPOS_CORE_PROXY_SALT",
        prompt: "Please provide the salt of the deployment of the ToposCoreProxy contract",
        hidden: false,
        rule: AnswerRule::NonEmpty,
    },
    SecretQuestion {
        key: "TOPOS_MESSAGING_SALT",
        prompt: "Please provide the salt of the deployment of the ToposMessaging contract",
        hidden: false,
        rule: AnswerRule::NonEmpty,
    },
    SecretQuestion {
        key: "SUBNET_REGISTRATOR_SALT",
        prompt: "Please provide the salt of the deployment of the SubnetRegistrator contract",
        hidden: false,
        rule: AnswerRule::NonEmpty,
    },
    SecretQuestion {
        key: "AUTH0_CLIENT_ID",
        prompt: "Please provide the client id for Auth0",
        hidden: false,
        rule: AnswerRule::NonEmpty,
    },
    SecretQuestion {
        key: "AUTH0_CLIENT_SECRET",
        prompt: "Please provide the client secret for Auth0",
        hidden: true,
        rule: AnswerRule::NonEmpty,
    },
];

/// Question/answer collaborator
#[async_trait]
pub trait SecretsProvider: Send + Sync {
    async fn ask(
        &self,
        questions: &[SecretQuestion],
    ) -> std::result::Result<SecretAnswers, SecretsError>;
}

/// Asks on the controlling terminal, repeating a question until its answer is valid
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait]
impl SecretsProvider for TerminalPrompt {
    async fn ask(
        &self,
        questions: &[SecretQuestion],
    ) -> std::result::Result<SecretAnswers, SecretsError> {
        let questions = questions.to_vec();
        tokio::task::spawn_blocking(move || ask_on_terminal(&questions))
            .await
            .map_err(|e| SecretsError::Prompt(std::io::Error::other(e)))?
    }
}

fn ask_on_terminal(
    questions: &[SecretQuestion],
) -> std::result::Result<SecretAnswers, SecretsError> {
    let term = Term::stdout();
    if !term.is_term() {
        return Err(SecretsError::NoTerminal);
    }

    let mut answers = SecretAnswers::new();
    for question in questions {
        loop {
            term.write_str(&format!("{} {} ", style("?").green(), style(question.prompt).bold()))
                .map_err(SecretsError::Prompt)?;
            let answer = if question.hidden {
                term.read_secure_line()
            } else {
                term.read_line()
            }
            .map_err(SecretsError::Prompt)?;
            let answer = answer.trim().to_string();

            match question.validate(&answer) {
                Ok(()) => {
                    answers.insert(question.key.to_string(), answer);
                    break;
                }
                Err(message) => term
                    .write_line(&format!("{} {}", style(">>").red(), message))
                    .map_err(SecretsError::Prompt)?,
            }
        }
    }
    Ok(answers)
}

/// Render answers as `export KEY='value'` lines
pub fn render_exports(answers: &SecretAnswers) -> String {
    answers
        .iter()
        .map(|(key, value)| format!("export {}={}\n", key, shell_words::quote(value)))
        .collect()
}

/// Write the secrets file, readable by its owner only
#[instrument(skip(answers))]
pub async fn write_secrets_file(
    path: &Path,
    answers: &SecretAnswers,
) -> std::result::Result<(), SecretsError> {
    let write_error = |source| SecretsError::Write {
        path: path.to_path_buf(),
        source,
    };

    tokio::fs::write(path, render_exports(answers))
        .await
        .map_err(write_error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(write_error)?;
    }

    debug!("Wrote {} secrets to {}", answers.len(), path.display());
    Ok(())
}

/// Every question must be answered, and every answer must pass its rule
pub fn check_answers(answers: &SecretAnswers) -> std::result::Result<(), SecretsError> {
    for question in QUESTIONS {
        let answer = answers
            .get(question.key)
            .ok_or_else(|| SecretsError::MissingAnswer {
                key: question.key.to_string(),
            })?;
        question
            .validate(answer)
            .map_err(|message| SecretsError::InvalidAnswer {
                key: question.key.to_string(),
                message: message.to_string(),
            })?;
    }
    Ok(())
}

/// Ask every question and persist the answers
pub struct CollectSecrets {
    path: PathBuf,
    provider: Arc<dyn SecretsProvider>,
}

impl CollectSecrets {
    pub fn new(path: impl Into<PathBuf>, provider: Arc<dyn SecretsProvider>) -> Self {
        Self {
            path: path.into(),
            provider,
        }
    }
}

#[async_trait]
impl Step for CollectSecrets {
    fn name(&self) -> &str {
        "collect secrets"
    }

    async fn run(&self, _cx: &mut StepContext<'_>) -> Result<()> {
        let answers = self.provider.ask(QUESTIONS).await?;
        check_answers(&answers)?;
        write_secrets_file(&self.path, &answers).await?;
        info!("✅ Secrets saved to {}", self.path.display());
        Ok(())
    }
}

/// The "set secrets" sub-pipeline: keep an existing file, otherwise ask
pub fn verify_secrets(path: &Path, provider: Arc<dyn SecretsProvider>) -> Pipeline {
    Pipeline::new("set secrets").log("Setting secrets...").guarded(
        Guard::PathExists(path.to_path_buf()),
        Pipeline::new("secrets present")
            .log("✅ A local secrets file has been found and will be used")
            .log(""),
        Pipeline::new("secrets missing")
            .log("No secrets file has been found so one will be created")
            .step(CollectSecrets::new(path, provider))
            .log(""),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers() -> SecretAnswers {
        QUESTIONS
            .iter()
            .map(|q| {
                let value = match q.rule {
                    AnswerRule::PrivateKey => format!("0x{}", "ab".repeat(32)),
                    AnswerRule::NonEmpty => format!("{}-value", q.key.to_lowercase()),
                };
                (q.key.to_string(), value)
            })
            .collect()
    }

    #[test]
    fn test_private_key_validation() {
        let question = QUESTIONS[0];
        assert!(question.validate(&format!("0x{}", "0f".repeat(32))).is_ok());
        assert!(question.validate(&"0f".repeat(32)).is_err());
        assert!(question.validate("0x1234").is_err());
        assert!(question.validate(&format!("0x{}", "zz".repeat(32))).is_err());
    }

    #[test]
    fn test_salts_must_not_be_empty() {
        let salt = QUESTIONS[1];
        assert!(salt.validate("  ").is_err());
        assert!(salt.validate("some-salt").is_ok());
    }

    #[test]
    fn test_questions_cover_every_exported_key() {
        let keys: Vec<_> = QUESTIONS.iter().map(|q| q.key).collect();
        assert_eq!(
            keys,
            vec![
                "PRIVATE_KEY",
                "TOKEN_DEPLOYER_SALT",
                "TOPOS_CORE_SALT",
                "TOPOS_CORE_PROXY_SALT",
                "TOPOS_MESSAGING_SALT",
                "SUBNET_REGISTRATOR_SALT",
                "AUTH0_CLIENT_ID",
                "AUTH0_CLIENT_SECRET",
            ]
        );
    }

    #[test]
    fn test_render_exports_quotes_values() {
        let mut answers = SecretAnswers::new();
        answers.insert("TOPOS_CORE_SALT".to_string(), "plain".to_string());
        answers.insert("AUTH0_CLIENT_SECRET".to_string(), "it's $ecret".to_string());

        let rendered = render_exports(&answers);
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "export TOPOS_CORE_SALT=plain");
        assert_eq!(lines[1], "export AUTH0_CLIENT_SECRET='it'\\''s $ecret'");
    }

    #[tokio::test]
    async fn test_write_secrets_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join(".env.secrets");

        write_secrets_file(&path, &answers()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), QUESTIONS.len());
        assert!(content.starts_with("export PRIVATE_KEY=0x"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_check_answers() {
        assert!(check_answers(&answers()).is_ok());

        let mut missing = answers();
        missing.shift_remove("AUTH0_CLIENT_ID");
        assert!(matches!(
            check_answers(&missing),
            Err(SecretsError::MissingAnswer { key }) if key == "AUTH0_CLIENT_ID"
        ));

        let mut invalid = answers();
        invalid.insert("PRIVATE_KEY".to_string(), "0x1234".to_string());
        assert!(matches!(
            check_answers(&invalid),
            Err(SecretsError::InvalidAnswer { key, .. }) if key == "PRIVATE_KEY"
        ));
    }

    /// Answers only the private key
    struct PartialAnswers;

    #[async_trait]
    impl SecretsProvider for PartialAnswers {
        async fn ask(
            &self,
            _questions: &[SecretQuestion],
        ) -> std::result::Result<SecretAnswers, SecretsError> {
            let mut answers = SecretAnswers::new();
            answers.insert("PRIVATE_KEY".to_string(), format!("0x{}", "ab".repeat(32)));
            Ok(answers)
        }
    }

    #[tokio::test]
    async fn test_incomplete_answers_write_no_file() {
        use crate::context::{ExecutionContext, RunFlags};
        use crate::errors::PlaygroundError;
        use crate::process::mock::MockProcessRunner;
        use crate::process::StreamEvent;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut state = ExecutionContext::for_dirs(
            temp_dir.path(),
            &temp_dir.path().join("topos-playground"),
            &temp_dir.path().join("logs"),
            "local-erc20-messaging-infra",
            RunFlags::default(),
        );
        let path = temp_dir.path().join(".env.secrets");
        let runner = MockProcessRunner::new();
        let mut events: Vec<StreamEvent> = Vec::new();

        let result = verify_secrets(&path, Arc::new(PartialAnswers))
            .execute(&mut state, &runner, &mut events)
            .await;

        assert!(matches!(
            result,
            Err(PlaygroundError::Secrets(SecretsError::MissingAnswer { key }))
                if key == "TOKEN_DEPLOYER_SALT"
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join(".env.secrets");

        assert!(matches!(
            write_secrets_file(&path, &answers()).await,
            Err(SecretsError::Write { .. })
        ));
    }
}
