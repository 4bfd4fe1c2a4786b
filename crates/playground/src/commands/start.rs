//! Start command implementation
//!
//! Runs the start workflow through the user's shell, prints the completion
//! banner and stays attached to the dev servers until Ctrl-C or until they
//! all exit.

use super::Session;
use anyhow::Result;
use playground_core::secrets::{SecretsProvider, TerminalPrompt};
use playground_core::workflows::start_workflow;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[instrument(skip_all)]
pub async fn execute_start(mut session: Session) -> Result<()> {
    let secrets: Arc<dyn SecretsProvider> = Arc::new(TerminalPrompt);
    let workflow = start_workflow(&session.config, &session.context, secrets)?;
    debug!("Start workflow steps: {:?}", workflow.step_names());

    session.run(workflow).await?;

    info!(
        "🚀 Start sending ERC20 tokens across subnet by accessing the dApp Frontend at {}",
        session.config.frontend_url
    );
    info!("");
    info!(
        "ℹ️  Ctrl/cmd-c will shut down the dApp Frontend and the Executor Service BUT will keep subnets and the TCE running (use the clean command to shut them down)"
    );
    if !session.context.no_log {
        info!(
            "ℹ️  Logs were written to {}",
            session.context.log_file.display()
        );
    }

    tokio::select! {
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Shutting down the dApp Frontend and the Executor Service..."),
            Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
        },
        _ = session.runner.wait_for_background() => {
            debug!("Every background service has exited");
        }
    }

    Ok(())
}
