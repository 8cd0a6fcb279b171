// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for zapdesk.
//!
//! Provider webhooks are public and always answered quickly; instance
//! management and maintenance routes sit behind a bearer token.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, HealthState, build_router, start_server};
