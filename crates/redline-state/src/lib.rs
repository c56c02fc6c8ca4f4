//! # redline-state — Edit Target Lifecycle
//!
//! The records the pipeline tracks for each instructions file:
//!
//! - **Edit target** (`target.rs`): `Review` / `Pending` / `Completed` /
//!   `Failed` with an ordered transition log. Invalid transitions are
//!   rejected with [`TargetError::InvalidTransition`] and never coerced.
//!
//! - **Patched fragment** (`fragment.rs`): immutable before/after pair with
//!   change classification and content digests.
//!
//! ## Design
//!
//! Status is a runtime enum rather than a typestate because targets live in
//! a shared store and are loaded, inspected and mutated by id. The status
//! field is private, so every change goes through a transition method that
//! checks the current state and appends a transition record.

pub mod fragment;
pub mod target;

pub use fragment::{ChangeKind, FragmentDraft, PatchedFragment};
pub use target::{EditTarget, InconsistentTarget, TargetError, TargetStatus, TargetTransitionRecord};
