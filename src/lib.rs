//! Library root for `checkin-bot`.
//!
//! Checkin-bot is a Microsoft Teams bot that collects daily work-location check-ins:
//! - Prompts everyone on working days and reminds those who have not answered
//! - Understands short aliases, commands and free text, with an optional AI fallback
//! - Confirms anything it infers before recording it
//! - Answers status, history, team, colleague and holiday questions
//!
//! The bot integrates with Teams for chat, SurrealDB for storage,
//! and OpenAI for intent classification. The architecture is built around
//! extensible traits that allow for different implementations of each service.

#[deny(missing_docs)]
pub mod base;
pub mod intent;
pub mod interaction;
pub mod runtime;
pub mod schedule;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the checkin-bot runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with database, chat and scheduler
/// - Serves the messaging and admin routes and runs the scheduled triggers
pub async fn start(config: Config) -> Void {
    info!("Starting checkin-bot ...");

    // Start the crypto provider.
    crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("A crypto provider was already installed."))?;

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
