// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Long-lived backends extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod automation;
pub mod blob;
pub mod gateway;
pub mod store;
pub mod webhook;

pub use adapter::PluginAdapter;
pub use automation::{FlowTrigger, FlowTriggerRequest, NoopFlowTrigger};
pub use blob::BlobStore;
pub use gateway::{GatewayClient, InstanceState, LiveContact, RemoteInstance};
pub use store::{CrmStore, MergeSummary, ReceiptOutcome};
pub use webhook::WebhookAdapter;
