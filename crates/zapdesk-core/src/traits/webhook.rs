// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait: raw webhook body in, canonical envelopes out.

use crate::error::ZapdeskError;
use crate::event::Envelope;
use crate::types::Provider;

/// Stateless decoder for one gateway's webhook wire format.
///
/// Implementations must not perform I/O. An empty result means the payload
/// was understood but carries nothing actionable.
pub trait WebhookAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    fn parse(&self, body: &[u8]) -> Result<Vec<Envelope>, ZapdeskError>;
}
