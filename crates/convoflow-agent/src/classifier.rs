// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-band command recognition.

/// What an inbound utterance asks the agent to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ordinary chat; carries the original text verbatim.
    NormalMessage(String),
    DumpMemories,
    ClearMemory,
}

const DUMP_ALIASES: &[&str] = &["dump memories", "show all", "list memories"];
const CLEAR_ALIASES: &[&str] = &["clear memory"];

/// Classifies raw text into a [`Command`].
///
/// Matching is case-insensitive and ignores surrounding and repeated
/// whitespace. An alias anywhere in the text selects its command; dump
/// aliases are checked before clear aliases.
pub fn classify(text: &str) -> Command {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if DUMP_ALIASES.iter().any(|alias| normalized.contains(alias)) {
        Command::DumpMemories
    } else if CLEAR_ALIASES.iter().any(|alias| normalized.contains(alias)) {
        Command::ClearMemory
    } else {
        Command::NormalMessage(text.to_string())
    }
}
