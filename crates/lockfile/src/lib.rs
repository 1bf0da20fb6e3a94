//! # Lockfile
//!
//! Durable, versioned record of the packages plonk manages, plus the
//! resolution of user-typed package references against it.
//!
//! ```yaml
//! version: 2
//! resources:
//!   - type: package
//!     id: "brew:jq"
//!     metadata: { manager: brew, name: jq, version: "1.6" }
//!     installed_at: 2025-01-02T03:04:05Z
//! ```

pub mod error;
pub mod resolve;
pub mod store;

pub use error::{Error, ResolveError, Result};
pub use resolve::{Selection, Target, all_targets, group_by_manager, resolve, resolve_token};
pub use store::{LOCK_FILE_NAME, LOCK_VERSION, Lock, LockStore, ResourceEntry, parse, read, write};
