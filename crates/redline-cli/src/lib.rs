//! # redline-cli — Redline Command-Line Interface
//!
//! ## Subcommands
//!
//! - `diff`: line diff of two files as a unified patch, a side-by-side
//!   table, or JSON
//! - `resolve`: group an instructions file by article and print the
//!   resulting edit targets
//! - `apply`: resolve, then apply every pending target through an external
//!   transform command and print the report and diffs
//!
//! ## Exit Codes
//!
//! `diff` follows diff(1): 0 when the files are identical, 1 when they
//! differ. `apply` exits 1 when any target failed. Errors exit 2.
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in the subcommand modules; handlers return an
//!   exit code and delegate to the library crates.
//! - Handlers use `anyhow` with context on every I/O boundary.

pub mod articles;
pub mod diff;
pub mod logging;
pub mod pipeline;
pub mod settings;
pub mod transform;
