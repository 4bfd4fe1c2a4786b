use crate::commands::{self, Session};
use anyhow::Result;
use clap::{Parser, Subcommand};
use playground_core::context::RunFlags;
use std::path::PathBuf;

const LONG_ABOUT: &str = "\
Bootstrap and tear down a local Topos development environment: subnets, TCE, \
executor service and the ERC20 messaging dApp frontend.

Example Usage

  $ topos-playground start
    Start the Topos-Playground. This command will output the status of the \
playground creation to the terminal as it runs, and will log a more detailed \
status to a log file.

  $ topos-playground start --verbose
    This will also start the topos playground, but the terminal output as well \
as the log file output will contain more information. This is useful for \
debugging if there are errors starting the playground.

  $ topos-playground start -q
    This will start the topos playground quietly. Most output will be suppressed.

  $ topos-playground clean
    This will clean the topos playground. It will shut down all containers, and \
remove all filesystem artifacts except for log files.

  $ topos-playground version
    This will print the version of the topos playground.

  $ topos-playground version -q
    This will print only the numbers of the topos-playground version, with no \
other output.

Configuration

  topos-playground follows the XDG Base Directory Specification, which means \
that data files for use during runs of the playground are stored in \
$XDG_DATA_HOME/topos-playground, which defaults to \
$HOME/.local/share/topos-playground and log files are stored in \
$XDG_STATE_HOME/topos-playground/logs, which defaults to \
$HOME/.local/state/topos-playground/logs.

  These locations can be overridden by setting the environment variables HOME, \
XDG_DATA_HOME, and XDG_STATE_HOME.";

/// Topos-Playground subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run everything
    Start,
    /// Shut down all containers and remove the working directory
    Clean,
    /// Show topos-playground version
    Version,
}

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "CLI to run a local Topos development environment",
    long_about = LONG_ABOUT,
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    /// Show more information about the execution of a command
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Show minimal onscreen information about the execution of a command
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Do not write a log file
    #[arg(short = 'n', long, global = true)]
    pub no_log: bool,

    /// Playground configuration file (TOML) overriding the built-in defaults
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    fn flags(&self) -> RunFlags {
        RunFlags {
            verbose: self.verbose,
            quiet: self.quiet,
            no_log: self.no_log,
        }
    }

    pub async fn dispatch(self) -> Result<()> {
        match self.command {
            Commands::Version => {
                commands::version::execute_version(self.quiet);
                Ok(())
            }
            Commands::Start => {
                let session = Session::open(self.flags(), self.config.as_deref())?;
                commands::start::execute_start(session).await
            }
            Commands::Clean => {
                let session = Session::open(self.flags(), self.config.as_deref())?;
                commands::clean::execute_clean(session).await
            }
        }
    }
}
