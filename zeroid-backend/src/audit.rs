//! The append-only audit log (§3, §4, §5): every escrow and credential and
//! proof-verification action leaves an entry. Entries carry no PII, only
//! flat string metadata (§3 invariant).

use std::collections::BTreeMap;

use zeroid_common::model::{AuditAction, AuditLogEntry};

use crate::stores::{EventStore, StoreError};

pub struct AuditLog {
    store: EventStore,
}

impl AuditLog {
    pub fn new(store: EventStore) -> Self {
        Self { store }
    }

    pub fn record(
        &self,
        action: AuditAction,
        resource_id: impl Into<String>,
        actor: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> Result<u64, StoreError> {
        let entry = AuditLogEntry {
            action,
            resource_id: resource_id.into(),
            actor: actor.into(),
            timestamp: crate::time::now_ms(),
            metadata,
        };
        let seq = self.store.append(&entry)?;
        tracing::info!(
            seq,
            action = ?entry.action,
            resource_id = %entry.resource_id,
            actor = %entry.actor,
            "audit entry recorded"
        );
        Ok(seq)
    }

    /// Total number of entries ever appended, exposed for the property in
    /// §8: "count(audit entries with action=escrow_create) =
    /// count(successful `put_escrow` calls)".
    pub fn count_with_action(&self, action: AuditAction) -> usize {
        self.store
            .iter::<AuditLogEntry>()
            .filter_map(|r| r.ok())
            .filter(|(_, entry)| entry.action == action)
            .count()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }
}
