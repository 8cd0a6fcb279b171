// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable gateway management API.
//!
//! QR codes are popped from a FIFO queue; an empty queue yields `None`.
//! Every call that matters for assertions is recorded.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use zapdesk_core::traits::{InstanceState, LiveContact, RemoteInstance};
use zapdesk_core::types::Connection;
use zapdesk_core::{ConnectionStatus, GatewayClient, Provider, ZapdeskError};

#[derive(Default)]
struct State {
    create_state: Option<InstanceState>,
    status: InstanceState,
    qr_queue: VecDeque<Option<String>>,
    contacts: Vec<LiveContact>,
    webhook_urls: Vec<String>,
    logouts: usize,
    deletes: usize,
    fail_deletes: bool,
    fail_contacts: bool,
}

pub struct MockGatewayClient {
    provider: Provider,
    state: Mutex<State>,
}

impl MockGatewayClient {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("mock lock poisoned")
    }

    /// What `create_instance` answers. Defaults to `connecting` without a QR.
    pub fn set_create_state(&self, state: InstanceState) {
        self.state().create_state = Some(state);
    }

    /// What `status` answers.
    pub fn set_status(&self, state: InstanceState) {
        self.state().status = state;
    }

    /// Queue the answer for the next `qr_code` call.
    pub fn queue_qr(&self, qr: Option<&str>) {
        self.state().qr_queue.push_back(qr.map(str::to_string));
    }

    pub fn set_contacts(&self, contacts: Vec<LiveContact>) {
        self.state().contacts = contacts;
    }

    pub fn fail_deletes(&self) {
        self.state().fail_deletes = true;
    }

    pub fn fail_contacts(&self) {
        self.state().fail_contacts = true;
    }

    /// Webhook URLs passed to `create_instance`.
    pub fn webhook_urls(&self) -> Vec<String> {
        self.state().webhook_urls.clone()
    }

    pub fn logouts(&self) -> usize {
        self.state().logouts
    }

    pub fn deletes(&self) -> usize {
        self.state().deletes
    }
}

#[async_trait]
impl GatewayClient for MockGatewayClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn create_instance(
        &self,
        _connection: &Connection,
        webhook_url: &str,
    ) -> Result<InstanceState, ZapdeskError> {
        let mut state = self.state();
        state.webhook_urls.push(webhook_url.to_string());
        Ok(state.create_state.clone().unwrap_or(InstanceState {
            status: ConnectionStatus::Connecting,
            ..Default::default()
        }))
    }

    async fn qr_code(&self, _connection: &Connection) -> Result<Option<String>, ZapdeskError> {
        Ok(self.state().qr_queue.pop_front().flatten())
    }

    async fn status(&self, _connection: &Connection) -> Result<InstanceState, ZapdeskError> {
        Ok(self.state().status.clone())
    }

    async fn logout(&self, _connection: &Connection) -> Result<(), ZapdeskError> {
        self.state().logouts += 1;
        Ok(())
    }

    async fn delete_instance(&self, _connection: &Connection) -> Result<(), ZapdeskError> {
        let mut state = self.state();
        state.deletes += 1;
        if state.fail_deletes {
            return Err(ZapdeskError::provider(self.provider, "HTTP 500: mock delete failure"));
        }
        Ok(())
    }

    async fn server_health(&self) -> Result<serde_json::Value, ZapdeskError> {
        Ok(serde_json::json!({ "status": "ok", "provider": self.provider.to_string() }))
    }

    async fn fetch_instances(&self) -> Result<Vec<RemoteInstance>, ZapdeskError> {
        Ok(Vec::new())
    }

    async fn fetch_contacts(&self, _connection: &Connection) -> Result<Vec<LiveContact>, ZapdeskError> {
        let state = self.state();
        if state.fail_contacts {
            return Err(ZapdeskError::provider(self.provider, "HTTP 502: mock contacts failure"));
        }
        Ok(state.contacts.clone())
    }
}
