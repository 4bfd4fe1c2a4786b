//! Core library for the Topos playground
//!
//! This crate contains the orchestration engine (process streams, execution
//! context, guards, pipeline sequencer), dependency verification, secrets
//! collection, bundled env templates, configuration, logging, error handling,
//! and the `start` / `clean` workflow definitions.

pub mod config;
pub mod context;
pub mod dependencies;
pub mod errors;
pub mod guards;
pub mod logging;
pub mod pipeline;
pub mod process;
pub mod secrets;
pub mod semver_utils;
pub mod templates;
pub mod workflows;

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
