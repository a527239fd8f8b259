// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `convoflow serve` command implementation.
//!
//! Builds the memory, completion and room adapters from config, joins the
//! room, and runs the agent loop until a shutdown signal arrives or the room
//! connection ends.

use std::sync::Arc;

use convoflow_agent::{AgentLoop, install_signal_handler};
use convoflow_config::{ConvoflowConfig, Credentials};
use convoflow_core::ConvoflowError;
use convoflow_core::traits::{CompletionAdapter, MemoryAdapter, TransportAdapter};
use convoflow_gemini::GeminiCompletion;
use convoflow_memory::RemoteMemory;
use convoflow_room::RoomTransport;
use secrecy::ExposeSecret;
use tracing::info;

/// Runs the agent in the configured room.
pub async fn run_serve(
    config: ConvoflowConfig,
    credentials: Credentials,
) -> Result<(), ConvoflowError> {
    init_tracing(&config.agent.log_level);

    info!(
        name = config.agent.name.as_str(),
        identity = config.agent.identity.as_str(),
        room = config.transport.room.as_str(),
        "starting convoflow"
    );

    let memory: Arc<dyn MemoryAdapter + Send + Sync> = Arc::new(RemoteMemory::new(
        &config.memory,
        credentials.memory_api_key.expose_secret(),
    )?);
    let completion: Arc<dyn CompletionAdapter + Send + Sync> = Arc::new(GeminiCompletion::new(
        &config.completion,
        credentials.completion_api_key.expose_secret(),
    )?);

    let mut room = RoomTransport::new(&config.transport, &config.agent.identity, &credentials)?;
    room.connect().await?;
    let transport: Arc<dyn TransportAdapter + Send + Sync> = Arc::new(room);

    let cancel = install_signal_handler();
    let mut agent = AgentLoop::new(transport, memory, completion, &config);
    agent.run(cancel).await?;

    info!("convoflow stopped");
    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

fn default_directives(log_level: &str) -> String {
    format!("convoflow={log_level},warn")
}
