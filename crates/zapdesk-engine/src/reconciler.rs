// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch repair of contacts created before LIDs were understood.
//!
//! Re-runnable: a clean database yields an empty report. Each contact is
//! handled on its own and a failure only bumps the `failed` counter.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use zapdesk_core::identity::{looks_like_lid, normalize_phone, strip_address};
use zapdesk_core::types::{Contact, NameQuality, now_timestamp};
use zapdesk_core::{ConnectionStatus, CrmStore, ZapdeskError};
use zapdesk_prometheus::record_reconcile;

use crate::manager::GatewayClients;

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub merged: usize,
    pub updated: usize,
    pub failed: usize,
    pub details: Vec<String>,
}

/// What the live gateways know, keyed for lookup.
#[derive(Debug, Default)]
struct LiveDirectory {
    phone_by_lid: HashMap<String, String>,
    name_by_phone: HashMap<String, String>,
    name_by_lid: HashMap<String, String>,
}

impl LiveDirectory {
    fn name_for(&self, phone: Option<&str>, lid: Option<&str>) -> Option<&str> {
        phone
            .and_then(|p| self.name_by_phone.get(p))
            .or_else(|| lid.and_then(|l| self.name_by_lid.get(l)))
            .map(String::as_str)
    }
}

enum Action {
    Merged(String),
    Updated(String),
    Unchanged,
}

/// Merges LID duplicates into their phone-number twins.
pub struct DuplicateContactReconciler {
    store: Arc<dyn CrmStore>,
    clients: GatewayClients,
}

impl DuplicateContactReconciler {
    pub fn new(store: Arc<dyn CrmStore>, clients: GatewayClients) -> Self {
        Self { store, clients }
    }

    pub async fn run(&self) -> Result<ReconcileReport, ZapdeskError> {
        let mut report = ReconcileReport::default();
        let candidates = self.store.list_reconciliation_candidates().await?;
        if candidates.is_empty() {
            info!("no contacts need reconciliation");
            return Ok(report);
        }

        let directory = self.live_directory(&mut report).await?;
        info!(
            candidates = candidates.len(),
            known_lids = directory.phone_by_lid.len(),
            "reconciling contacts"
        );

        for contact in candidates {
            match self.reconcile(contact.clone(), &directory).await {
                Ok(Action::Merged(detail)) => {
                    report.merged += 1;
                    report.details.push(detail);
                }
                Ok(Action::Updated(detail)) => {
                    report.updated += 1;
                    report.details.push(detail);
                }
                Ok(Action::Unchanged) => {}
                Err(e) => {
                    warn!(contact_id = %contact.id, error = %e, "contact reconciliation failed");
                    report.failed += 1;
                    report.details.push(format!("failed {}: {e}", contact.id));
                }
            }
        }

        record_reconcile("merged", report.merged as u64);
        record_reconcile("updated", report.updated as u64);
        record_reconcile("failed", report.failed as u64);
        info!(
            merged = report.merged,
            updated = report.updated,
            failed = report.failed,
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Pull contact listings from every connected session with a client.
    async fn live_directory(&self, report: &mut ReconcileReport) -> Result<LiveDirectory, ZapdeskError> {
        let mut directory = LiveDirectory::default();
        for connection in self.store.list_connections().await? {
            if connection.status != ConnectionStatus::Connected {
                continue;
            }
            let Some(client) = self.clients.get(&connection.provider) else {
                continue;
            };
            let contacts = match client.fetch_contacts(&connection).await {
                Ok(contacts) => contacts,
                Err(e) => {
                    warn!(connection_id = %connection.id, error = %e, "could not list gateway contacts");
                    report
                        .details
                        .push(format!("skipped connection {}: {e}", connection.name));
                    continue;
                }
            };
            for live in contacts {
                let phone = live.phone.as_deref().and_then(normalize_phone);
                let lid = live.lid.as_deref().map(strip_address).filter(|l| !l.is_empty());
                if let (Some(phone), Some(lid)) = (&phone, &lid)
                    && phone != lid
                {
                    directory.phone_by_lid.insert(lid.clone(), phone.clone());
                }
                let Some(name) = live.push_name.map(|n| n.trim().to_string()) else {
                    continue;
                };
                if NameQuality::classify(&name, &[phone.as_deref(), lid.as_deref()]) != NameQuality::Verified {
                    continue;
                }
                if let Some(phone) = phone {
                    directory.name_by_phone.insert(phone, name.clone());
                }
                if let Some(lid) = lid {
                    directory.name_by_lid.insert(lid, name);
                }
            }
        }
        Ok(directory)
    }

    async fn reconcile(&self, mut contact: Contact, directory: &LiveDirectory) -> Result<Action, ZapdeskError> {
        let lid = contact
            .whatsapp_lid
            .clone()
            .or_else(|| contact.phone.clone().filter(|p| looks_like_lid(p)));
        let phone_is_bogus = match contact.phone.as_deref() {
            None => true,
            Some(p) => looks_like_lid(p) || lid.as_deref() == Some(p),
        };

        let mut changes = Vec::new();

        if phone_is_bogus {
            let real_phone = lid.as_ref().and_then(|l| directory.phone_by_lid.get(l)).cloned();
            match real_phone {
                Some(real) => {
                    if let Some(owner) = self
                        .store
                        .find_contact_by_phone(contact.tenant_id.as_deref(), &real)
                        .await?
                        && owner.id != contact.id
                    {
                        let summary = self.store.merge_contacts(&contact.id, &owner.id).await?;
                        return Ok(Action::Merged(format!(
                            "merged {} into {} ({real}, {} conversations moved)",
                            contact.id, owner.id, summary.conversations_moved
                        )));
                    }
                    contact.phone = Some(real.clone());
                    contact.whatsapp_lid = lid.clone();
                    changes.push(format!("phone set to {real}"));
                }
                None if contact.phone.is_some() => {
                    contact.whatsapp_lid = lid.clone();
                    contact.phone = None;
                    changes.push("LID moved out of phone".to_string());
                }
                None => {}
            }
        }

        let identifiers = [contact.phone.as_deref(), contact.whatsapp_lid.as_deref()];
        let graded = NameQuality::classify(&contact.name, &identifiers);
        if contact.name_quality.is_replaceable() && graded == NameQuality::Placeholder {
            match directory.name_for(identifiers[0], identifiers[1]) {
                Some(name) => {
                    changes.push(format!("name '{}' -> '{name}'", contact.name));
                    contact.name = name.to_string();
                    contact.name_quality = NameQuality::Unknown;
                }
                None if contact.name_quality != NameQuality::Placeholder => {
                    contact.name_quality = NameQuality::Placeholder;
                    changes.push("name graded as placeholder".to_string());
                }
                None => {}
            }
        }

        if changes.is_empty() {
            return Ok(Action::Unchanged);
        }
        contact.updated_at = now_timestamp();
        self.store.update_contact(&contact).await?;
        Ok(Action::Updated(format!("updated {}: {}", contact.id, changes.join(", "))))
    }
}
