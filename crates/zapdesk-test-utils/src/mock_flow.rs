// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock flow-execution service.

use std::sync::Mutex;

use async_trait::async_trait;

use zapdesk_core::{FlowTrigger, FlowTriggerRequest, ZapdeskError};

/// Captures every trigger request. A failing mock still records the call.
pub struct MockFlowTrigger {
    calls: Mutex<Vec<FlowTriggerRequest>>,
    fail: bool,
}

impl MockFlowTrigger {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// A trigger whose every call returns an automation error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Requests received so far, oldest first.
    pub fn calls(&self) -> Vec<FlowTriggerRequest> {
        self.calls.lock().expect("mock lock poisoned").clone()
    }
}

impl Default for MockFlowTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlowTrigger for MockFlowTrigger {
    async fn trigger(&self, request: FlowTriggerRequest) -> Result<(), ZapdeskError> {
        self.calls.lock().expect("mock lock poisoned").push(request);
        if self.fail {
            return Err(ZapdeskError::Automation {
                message: "mock flow service unavailable".into(),
            });
        }
        Ok(())
    }
}
