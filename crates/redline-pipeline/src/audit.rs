//! # Audit Trail
//!
//! Append-only record of operator-visible pipeline actions, scoped by
//! owner. Entries are never modified or removed, including when the
//! target they mention is deleted.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use redline_core::{EditTargetId, OwnerContext, OwnerId, SourceFileId, Timestamp};

/// Kind of audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ResolutionStarted,
    TargetsCreated,
    ApplicationStarted,
    TargetApplied,
    TargetFailed,
    TargetRebound,
    TargetAdded,
    TargetDeleted,
    TargetRetried,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    pub owner: OwnerId,
    pub action: AuditAction,
    pub source_file: Option<SourceFileId>,
    pub target_id: Option<EditTargetId>,
    pub detail: String,
    pub timestamp: Timestamp,
}

/// Shared, append-only audit log.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        ctx: &OwnerContext,
        action: AuditAction,
        source_file: Option<SourceFileId>,
        target_id: Option<EditTargetId>,
        detail: impl Into<String>,
    ) {
        let mut entries = self.entries.write();
        let sequence = entries.len() as u64;
        entries.push(AuditEntry {
            sequence,
            owner: ctx.owner,
            action,
            source_file,
            target_id,
            detail: detail.into(),
            timestamp: Timestamp::now(),
        });
    }

    /// Entries of the caller's owner, in order.
    pub fn entries(&self, ctx: &OwnerContext) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.owner == ctx.owner)
            .cloned()
            .collect()
    }

    /// Entries of the caller's owner concerning one source file.
    pub fn entries_for_source(&self, ctx: &OwnerContext, source_file: SourceFileId) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.owner == ctx.owner && e.source_file == Some(source_file))
            .cloned()
            .collect()
    }
}
