// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Convoflow integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without a room server, a memory
//! service, or a completion API.
//!
//! # Components
//!
//! - [`MockTransport`] - Mock room with event injection and publish capture
//! - [`MockMemory`] - In-memory store with keyword search, failure injection and a call log
//! - [`MockCompletion`] - Mock completion service with queued replies
//! - [`TestHarness`] - A running agent loop wired over the three mocks

pub mod harness;
pub mod mock_completion;
pub mod mock_memory;
pub mod mock_transport;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_completion::MockCompletion;
pub use mock_memory::{MemoryCall, MockMemory};
pub use mock_transport::MockTransport;
