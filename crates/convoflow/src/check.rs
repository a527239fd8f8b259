// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `convoflow check` command implementation.
//!
//! Pings the memory service and the completion model, and mints a room
//! access token, without joining the room.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use convoflow_config::{ConvoflowConfig, Credentials};
use convoflow_core::ConvoflowError;
use convoflow_core::traits::PluginAdapter;
use convoflow_core::types::HealthStatus;
use convoflow_gemini::GeminiCompletion;
use convoflow_memory::RemoteMemory;
use convoflow_room::RoomTransport;
use secrecy::ExposeSecret;

/// Status of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

/// Runs every check, prints a report and returns the number of failures.
pub async fn run_check(config: &ConvoflowConfig, credentials: &Credentials, plain: bool) -> usize {
    let use_color = !plain && std::io::stdout().is_terminal();

    let results = vec![
        check_memory(config, credentials).await,
        check_completion(config, credentials).await,
        check_transport(config, credentials),
    ];

    println!();
    println!("  convoflow check");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", format_line(result, use_color));
    }
    println!();

    let failures = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .count();
    let warnings = results
        .iter()
        .filter(|r| r.status == CheckStatus::Warn)
        .count();

    if failures + warnings == 0 {
        println!("  All checks passed.");
    } else {
        let issues = failures + warnings;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    }
    println!();

    failures
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green().to_string(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow().to_string(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red().to_string(), result.message.red()),
        };
        format!("    {symbol} {:<12} {message} ({duration_ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<12} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

/// Maps an adapter health report onto a check result.
fn from_health(
    name: &str,
    started: Instant,
    health: Result<HealthStatus, ConvoflowError>,
    healthy_message: String,
) -> CheckResult {
    let (status, message) = match health {
        Ok(HealthStatus::Healthy) => (CheckStatus::Pass, healthy_message),
        Ok(HealthStatus::Degraded(reason)) => (CheckStatus::Warn, reason),
        Ok(HealthStatus::Unhealthy(reason)) => (CheckStatus::Fail, reason),
        Err(e) => (CheckStatus::Fail, e.to_string()),
    };
    CheckResult {
        name: name.to_string(),
        status,
        message,
        duration: started.elapsed(),
    }
}

fn failed(name: &str, started: Instant, error: ConvoflowError) -> CheckResult {
    from_health(name, started, Err(error), String::new())
}

async fn check_memory(config: &ConvoflowConfig, credentials: &Credentials) -> CheckResult {
    let started = Instant::now();
    match RemoteMemory::new(&config.memory, credentials.memory_api_key.expose_secret()) {
        Ok(memory) => from_health(
            "memory",
            started,
            memory.health_check().await,
            format!("reachable at {}", config.memory.base_url),
        ),
        Err(e) => failed("memory", started, e),
    }
}

async fn check_completion(config: &ConvoflowConfig, credentials: &Credentials) -> CheckResult {
    let started = Instant::now();
    let api_key = credentials.completion_api_key.expose_secret();
    match GeminiCompletion::new(&config.completion, api_key) {
        Ok(completion) => from_health(
            "completion",
            started,
            completion.health_check().await,
            format!("model {} available", config.completion.model),
        ),
        Err(e) => failed("completion", started, e),
    }
}

fn check_transport(config: &ConvoflowConfig, credentials: &Credentials) -> CheckResult {
    let started = Instant::now();
    let minted = RoomTransport::new(&config.transport, &config.agent.identity, credentials)
        .and_then(|room| room.access_token());
    match minted {
        Ok(_) => CheckResult {
            name: "transport".to_string(),
            status: CheckStatus::Pass,
            message: format!(
                "token minted for {} in room {}",
                config.agent.identity, config.transport.room
            ),
            duration: started.elapsed(),
        },
        Err(e) => failed("transport", started, e),
    }
}
