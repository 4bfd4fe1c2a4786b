use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    // Variables from a local .env file behave as if exported
    let _ = dotenvy::dotenv();

    let parsed = cli::Cli::parse();

    match parsed.dispatch().await {
        Ok(()) => Ok(()),
        Err(err) => {
            // The failure banner has already been logged
            if err.downcast_ref::<commands::WorkflowAborted>().is_some() {
                std::process::exit(1);
            }
            Err(err)
        }
    }
}
