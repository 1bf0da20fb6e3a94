//! Built-in package manager backends.
//!
//! Each backend shells out to its manager through [`crate::runner`] and
//! keeps its output parsing in free functions so it can be tested
//! without the manager installed.

pub mod brew;
pub mod cargo;
pub mod go;
pub mod npm;

pub use brew::BrewManager;
pub use cargo::CargoManager;
pub use go::GoManager;
pub use npm::NpmManager;
