// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection status and QR transitions.
//!
//! Three states only: `disconnected`, `connecting`, `connected`. A QR code is
//! kept only while connecting, and a fresh QR code always means connecting.

use std::sync::Arc;

use tracing::info;

use zapdesk_core::types::{Connection, ConnectionStatus, now_timestamp};
use zapdesk_core::traits::InstanceState;
use zapdesk_core::{CrmStore, ZapdeskError};

/// Apply a status change to an in-memory connection.
pub fn apply_status(connection: &mut Connection, status: ConnectionStatus, phone: Option<String>) {
    connection.status = status;
    if status != ConnectionStatus::Connecting {
        connection.qr_code = None;
    }
    if status == ConnectionStatus::Connected && phone.is_some() {
        connection.phone_number = phone;
    }
}

/// Store a new QR code; always forces `connecting`.
pub fn apply_qr(connection: &mut Connection, qr_code: String) {
    connection.status = ConnectionStatus::Connecting;
    connection.qr_code = Some(qr_code);
}

/// Operator logout or delete: back to a blank disconnected row.
pub fn force_disconnected(connection: &mut Connection) {
    connection.status = ConnectionStatus::Disconnected;
    connection.qr_code = None;
    connection.phone_number = None;
}

/// Fold a provider status probe into the row. A QR code only sticks while
/// the session is not connected.
pub fn apply_instance_state(connection: &mut Connection, state: &InstanceState) {
    match (&state.qr_code, state.status) {
        (Some(qr), status) if status != ConnectionStatus::Connected => apply_qr(connection, qr.clone()),
        _ => apply_status(connection, state.status, state.phone_number.clone()),
    }
}

/// Persists connection transitions.
pub struct ConnectionSynchronizer {
    store: Arc<dyn CrmStore>,
}

impl ConnectionSynchronizer {
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self { store }
    }

    pub async fn status_changed(
        &self,
        connection: &mut Connection,
        status: ConnectionStatus,
        phone: Option<String>,
    ) -> Result<(), ZapdeskError> {
        let previous = connection.status;
        apply_status(connection, status, phone);
        if previous != connection.status {
            info!(
                connection_id = %connection.id,
                from = %previous,
                to = %connection.status,
                "connection status changed"
            );
        }
        self.save(connection).await
    }

    pub async fn qr_updated(&self, connection: &mut Connection, qr_code: String) -> Result<(), ZapdeskError> {
        apply_qr(connection, qr_code);
        self.save(connection).await
    }

    pub async fn disconnected(&self, connection: &mut Connection) -> Result<(), ZapdeskError> {
        force_disconnected(connection);
        self.save(connection).await
    }

    pub async fn instance_state(
        &self,
        connection: &mut Connection,
        state: &InstanceState,
    ) -> Result<(), ZapdeskError> {
        apply_instance_state(connection, state);
        self.save(connection).await
    }

    async fn save(&self, connection: &mut Connection) -> Result<(), ZapdeskError> {
        connection.updated_at = now_timestamp();
        self.store.update_connection(connection).await
    }
}
