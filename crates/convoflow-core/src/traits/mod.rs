// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod completion;
pub mod memory;
pub mod transport;

pub use adapter::PluginAdapter;
pub use completion::CompletionAdapter;
pub use memory::MemoryAdapter;
pub use transport::TransportAdapter;
