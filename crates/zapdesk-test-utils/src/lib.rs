// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for zapdesk integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without a real gateway or flow service.
//!
//! # Components
//!
//! - [`MockFlowTrigger`] - Records flow-service calls, optionally failing them
//! - [`MockGatewayClient`] - Scriptable provider management API
//! - [`TestHarness`] - Temp SQLite store, temp blob root and a wired [`zapdesk_engine::Engine`]

pub mod harness;
pub mod mock_flow;
pub mod mock_gateway;

pub use harness::{TestHarness, temp_store};
pub use mock_flow::MockFlowTrigger;
pub use mock_gateway::MockGatewayClient;
