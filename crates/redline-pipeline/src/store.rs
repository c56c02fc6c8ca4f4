//! # Pipeline Store
//!
//! In-memory persistence for source files, edit targets, and patched
//! fragments, plus the per-target application claims.
//!
//! All operations are synchronous (the locks are `parking_lot`, not
//! `tokio::sync`) because no lock is ever held across an `.await`.
//!
//! ## Atomicity
//!
//! - The targets of one resolution are inserted in one write-locked batch,
//!   and only if the source file was not resolved before. Readers see
//!   either none or all of them.
//! - A claim and an operator mutation of the same target are serialized by
//!   the claim lock, so an operator cannot change or delete a target while
//!   a worker is applying it.
//!
//! Lock order is claims, then sources, then targets, then fragments.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use redline_core::{EditTargetId, FragmentId, OwnerId, SourceFileId, Timestamp};
use redline_state::{EditTarget, PatchedFragment};

// ─── Generic In-Memory Store ─────────────────────────────────────────

/// Thread-safe, cloneable key-value store.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// Records matching `pred`, in unspecified order.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// Atomically read-validate-update a record.
    ///
    /// Returns `None` if the record does not exist, otherwise the closure's
    /// result. The closure runs under the write lock.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    pub fn remove(&self, id: &Uuid) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Run `f` with exclusive access to the whole map.
    pub fn with_write<R>(&self, f: impl FnOnce(&mut HashMap<Uuid, T>) -> R) -> R {
        f(&mut self.data.write())
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── Records ─────────────────────────────────────────────────────────

/// An uploaded edit-instructions document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: SourceFileId,
    pub owner: OwnerId,
    pub filename: Option<String>,
    pub raw_text: String,
    pub created_at: Timestamp,
    /// When resolution persisted the file's targets.
    pub resolved_at: Option<Timestamp>,
}

impl SourceFile {
    pub fn new(owner: OwnerId, raw_text: impl Into<String>, filename: Option<String>) -> Self {
        Self {
            id: SourceFileId::new(),
            owner,
            filename,
            raw_text: raw_text.into(),
            created_at: Timestamp::now(),
            resolved_at: None,
        }
    }
}

// ─── Claims ──────────────────────────────────────────────────────────

/// Exclusive right to apply one target. Released on drop.
#[derive(Debug)]
pub struct ClaimGuard {
    claims: Arc<Mutex<HashSet<EditTargetId>>>,
    target: EditTargetId,
}

impl ClaimGuard {
    pub fn target(&self) -> EditTargetId {
        self.target
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.claims.lock().remove(&self.target);
    }
}

// ─── Pipeline Store ──────────────────────────────────────────────────

/// Storage shared by the coordinator and its workers.
#[derive(Debug, Clone, Default)]
pub struct PipelineStore {
    sources: Store<SourceFile>,
    targets: Store<EditTarget>,
    /// Fragment history per target, oldest first.
    fragments: Store<Vec<PatchedFragment>>,
    claims: Arc<Mutex<HashSet<EditTargetId>>>,
}

impl PipelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Source files ─────────────────────────────────────────────────

    pub fn insert_source(&self, source: SourceFile) {
        self.sources.insert(*source.id.as_uuid(), source);
    }

    pub fn source(&self, id: SourceFileId) -> Option<SourceFile> {
        self.sources.get(id.as_uuid())
    }

    // ── Targets ──────────────────────────────────────────────────────

    /// Persist the resolved `targets` of `source_file`, once.
    ///
    /// The first call marks the file resolved and inserts all targets,
    /// numbered after any operator-added targets. Later calls insert
    /// nothing. Returns the file's targets in ordinal order and whether
    /// this call inserted them, or `None` if the file does not exist.
    pub fn insert_targets_once(
        &self,
        source_file: SourceFileId,
        targets: Vec<EditTarget>,
    ) -> Option<(Vec<EditTarget>, bool)> {
        self.sources.with_write(|sources| {
            let source = sources.get_mut(source_file.as_uuid())?;
            if source.resolved_at.is_some() {
                return Some((self.targets_of(source_file), false));
            }
            self.targets.with_write(|map| {
                let base = map
                    .values()
                    .filter(|t| t.source_file == source_file)
                    .map(|t| t.ordinal + 1)
                    .max()
                    .unwrap_or(0);
                for mut target in targets {
                    target.ordinal += base;
                    map.insert(*target.id.as_uuid(), target);
                }
            });
            source.resolved_at = Some(Timestamp::now());
            Some((self.targets_of(source_file), true))
        })
    }

    /// Insert one target with the next free ordinal of its source file.
    pub fn insert_target_last(&self, mut target: EditTarget) -> EditTarget {
        self.targets.with_write(|map| {
            target.ordinal = map
                .values()
                .filter(|t| t.source_file == target.source_file)
                .map(|t| t.ordinal + 1)
                .max()
                .unwrap_or(0);
            map.insert(*target.id.as_uuid(), target.clone());
            target
        })
    }

    pub fn target(&self, id: EditTargetId) -> Option<EditTarget> {
        self.targets.get(id.as_uuid())
    }

    /// Targets of a source file in ordinal order.
    pub fn targets_of(&self, source_file: SourceFileId) -> Vec<EditTarget> {
        let mut targets = self.targets.filter(|t| t.source_file == source_file);
        targets.sort_by_key(|t| t.ordinal);
        targets
    }

    /// Update a target under the write lock. `None` if it does not exist.
    pub fn update_target<R, E>(
        &self,
        id: EditTargetId,
        f: impl FnOnce(&mut EditTarget) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.targets.try_update(id.as_uuid(), f)
    }

    /// Remove a target and all its fragments.
    pub fn remove_target(&self, id: EditTargetId) -> Option<EditTarget> {
        let removed = self.targets.remove(id.as_uuid())?;
        self.fragments.remove(id.as_uuid());
        Some(removed)
    }

    // ── Fragments ────────────────────────────────────────────────────

    pub fn push_fragment(&self, fragment: PatchedFragment) {
        let key = *fragment.target_id.as_uuid();
        self.fragments
            .with_write(|map| map.entry(key).or_default().push(fragment));
    }

    /// Every fragment of a target, oldest first.
    pub fn fragment_history(&self, target: EditTargetId) -> Vec<PatchedFragment> {
        self.fragments.get(target.as_uuid()).unwrap_or_default()
    }

    /// The fragment no later fragment supersedes.
    pub fn current_fragment(&self, target: EditTargetId) -> Option<PatchedFragment> {
        self.fragments
            .get(target.as_uuid())
            .and_then(|history| history.last().cloned())
    }

    pub fn fragment(&self, id: FragmentId) -> Option<PatchedFragment> {
        self.fragments
            .filter(|history| history.iter().any(|f| f.id == id))
            .into_iter()
            .flatten()
            .find(|f| f.id == id)
    }

    // ── Claims ───────────────────────────────────────────────────────

    /// Take the exclusive application claim on `target`. `None` if another
    /// worker holds it.
    pub fn claim(&self, target: EditTargetId) -> Option<ClaimGuard> {
        let mut claims = self.claims.lock();
        if !claims.insert(target) {
            return None;
        }
        Some(ClaimGuard {
            claims: Arc::clone(&self.claims),
            target,
        })
    }

    pub fn is_claimed(&self, target: EditTargetId) -> bool {
        self.claims.lock().contains(&target)
    }

    /// Run `f` while no claim on `target` can be taken. `None` if the
    /// target is claimed right now.
    pub fn with_unclaimed<R>(&self, target: EditTargetId, f: impl FnOnce() -> R) -> Option<R> {
        let claims = self.claims.lock();
        if claims.contains(&target) {
            return None;
        }
        Some(f())
    }
}
