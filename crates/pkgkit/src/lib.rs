//! # pkgkit
//!
//! A uniform capability contract over system package managers.
//!
//! This crate provides:
//! - The [`PackageManager`] trait: availability, list, install, uninstall,
//!   version lookup, and optional search/info/upgrade
//! - A name-keyed [`Registry`] so callers select backends by string
//! - Backends for Homebrew, npm, `cargo install` and `go install`
//! - A deadline-aware command runner that kills overdue processes
//!
//! ## Example
//!
//! ```no_run
//! use declarative::Deadline;
//! use pkgkit::Registry;
//! use std::time::Duration;
//!
//! let registry = Registry::with_defaults();
//! let deadline = Deadline::after(Duration::from_secs(180));
//!
//! let brew = registry.require("brew").unwrap();
//! if brew.is_available(&deadline).unwrap() {
//!     for name in brew.list_installed(&deadline).unwrap() {
//!         println!("{name}");
//!     }
//! }
//! ```

#![warn(missing_docs)]

pub mod backends;
pub mod error;
pub mod manager;
pub mod registry;
pub mod runner;

pub use error::{Error, ErrorCategory, Result};
pub use manager::{PackageIdentity, PackageInfo, PackageManager};
pub use registry::Registry;
