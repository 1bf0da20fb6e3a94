//! # Declarative
//!
//! Desired-state reconciliation for user-environment resources.
//!
//! ## Core Concepts
//!
//! - **Item**: a named, stateful thing (a package or a dotfile)
//! - **Reconciliation**: diffing desired items against observed items into
//!   managed, missing, untracked and error sets
//! - **Deadline**: cooperative timeout/cancellation shared by a chain of
//!   operations
//! - **apply_changes**: sequential apply loop that records one outcome per
//!   item and never stops on a single failure
//!
//! ## Example
//!
//! ```
//! use declarative::{Domain, Item, reconcile};
//!
//! let desired = vec![Item::package("brew", "jq"), Item::package("npm", "typescript")];
//! let actual = vec![Item::package("brew", "jq")];
//!
//! let result = reconcile(Domain::Package, desired, actual);
//! assert_eq!(result.managed[0].name, "jq");
//! assert_eq!(result.missing[0].name, "typescript");
//! ```
//!
//! ## Provider Traits
//!
//! - [`ProgressCallback`]: receives progress updates while changes apply
//!
//! This allows the crate to be used without a hard dependency on any
//! terminal UI.

pub mod context;
pub mod executor;
pub mod reconcile;
pub mod types;

pub use context::{Deadline, Interrupted, NoProgress, ProgressCallback};
pub use executor::{
    Applied, ApplySummary, Change, OperationResult, Outcome, PlannedChange, apply_changes,
};
pub use reconcile::{reconcile, reconcile_by, reconcile_failed};
pub use types::{Domain, Item, ItemState, Metadata, ReconciliationResult};
