// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp gateway integrations for zapdesk.
//!
//! [`webhook`] holds one stateless decoder per provider (Baileys, Evolution,
//! WAHA, WPPConnect, Meta Cloud API) turning raw webhook bodies into
//! canonical envelopes. [`client`] holds the management REST clients used
//! to create, inspect, and tear down provider sessions.

pub mod client;
pub mod webhook;

pub use client::{
    BaileysClient, EvolutionClient, WahaClient, WppConnectClient, gateway_client,
};
pub use webhook::meta::{verify_signature, verify_subscription};
pub use webhook::{
    BaileysWebhook, EvolutionWebhook, MetaWebhook, WahaWebhook, WppConnectWebhook, adapter_for,
};
