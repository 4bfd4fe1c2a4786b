//! Clean command implementation

use super::Session;
use anyhow::Result;
use playground_core::workflows::clean_workflow;
use tracing::instrument;

/// Shut the playground down and remove its working directory
#[instrument(skip_all)]
pub async fn execute_clean(mut session: Session) -> Result<()> {
    let workflow = clean_workflow(&session.config, &session.context);
    session.run(workflow).await
}
