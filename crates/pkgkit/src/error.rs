//! Error types for package manager operations.
//!
//! Errors are categorized from the manager's stderr so callers can tell
//! an ignorable "already installed" apart from a real failure and give
//! the user useful feedback.

use declarative::Interrupted;
use thiserror::Error;

/// Categories of package manager errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors
    Network,
    /// Package not found in the manager's registry
    NotFound,
    /// Version or dependency conflict
    Conflict,
    /// Permission denied
    Permission,
    /// Package is already installed
    AlreadyInstalled,
    /// The operation ran out of time or was cancelled
    Interrupted,
    /// The manager binary is missing or the operation is not offered
    Unavailable,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error can be safely ignored (operation already done).
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::AlreadyInstalled)
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and try again",
            Self::NotFound => "Verify the package name",
            Self::Conflict => "Resolve the conflict by removing conflicting packages",
            Self::Permission => "Check directory permissions or run with appropriate access",
            Self::AlreadyInstalled => "No action needed - package is already installed",
            Self::Interrupted => "Raise the timeout in plonk.yaml or retry",
            Self::Unavailable => "Install the package manager first",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur during package manager operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network-related error (connection, DNS, TLS, download)
    #[error("network error: {message}")]
    Network {
        /// Detailed error message
        message: String,
    },

    /// Package not found
    #[error("package not found: {name}")]
    NotFound {
        /// Name of the package that could not be found
        name: String,
    },

    /// Version or dependency conflict
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflict
        message: String,
    },

    /// Permission denied
    #[error("permission denied: {message}")]
    Permission {
        /// Details about what permission was denied
        message: String,
    },

    /// Package is already installed
    #[error("already installed: {name}")]
    AlreadyInstalled {
        /// Name of the already-installed package
        name: String,
    },

    /// The executable could not be started because it is not installed
    #[error("command not found: {program}")]
    CommandNotFound {
        /// Program that was looked up
        program: String,
    },

    /// Command execution failed
    #[error("{message}: {stderr}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// The command was killed because its deadline passed or was cancelled
    #[error("`{command}`: {source}")]
    Interrupted {
        /// Command line that was running
        command: String,
        /// Timeout or cancellation
        #[source]
        source: Interrupted,
    },

    /// The manager does not offer this operation
    #[error("{manager} does not support {operation}")]
    Unsupported {
        /// Manager name
        manager: &'static str,
        /// Operation name
        operation: &'static str,
    },

    /// No manager is registered under this name
    #[error("unknown package manager '{0}'")]
    UnknownManager(String),

    /// Output from the manager did not have the expected shape
    #[error("unexpected {manager} output: {message}")]
    Parse {
        /// Manager name
        manager: &'static str,
        /// What was wrong
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Network { .. } => ErrorCategory::Network,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Conflict { .. } => ErrorCategory::Conflict,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::AlreadyInstalled { .. } => ErrorCategory::AlreadyInstalled,
            Error::Interrupted { .. } => ErrorCategory::Interrupted,
            Error::CommandNotFound { .. }
            | Error::Unsupported { .. }
            | Error::UnknownManager(_) => ErrorCategory::Unavailable,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error can be safely ignored.
    pub fn is_ignorable(&self) -> bool {
        self.category().is_ignorable()
    }

    /// Create an error from a failed command's stderr.
    ///
    /// Analyzes stderr to categorize the error appropriately.
    pub fn from_output(manager: &str, stderr: &str, package_name: Option<&str>) -> Self {
        let stderr_lower = stderr.to_lowercase();
        let name = || package_name.unwrap_or("unknown").to_string();

        // Not found first: npm 404s mention the registry URL
        if stderr_lower.contains("no available formula")
            || stderr_lower.contains("no formulae found")
            || stderr_lower.contains("no cask with this name")
            || stderr_lower.contains("no such keg")
            || stderr_lower.contains("404 not found")
            || stderr_lower.contains("e404")
            || stderr_lower.contains("could not find")
            || stderr_lower.contains("couldn't find")
            || stderr_lower.contains("cannot find module")
            || stderr_lower.contains("is not installed")
        {
            return Error::NotFound { name: name() };
        }

        if stderr_lower.contains("could not resolve")
            || stderr_lower.contains("connection refused")
            || stderr_lower.contains("timed out")
            || stderr_lower.contains("network")
            || stderr_lower.contains("ssl")
            || stderr_lower.contains("certificate")
            || stderr_lower.contains("failed to download")
            || stderr_lower.contains("econnreset")
        {
            return Error::Network {
                message: stderr.trim().to_string(),
            };
        }

        if stderr_lower.contains("already installed")
            || stderr_lower.contains("is already an installed")
        {
            return Error::AlreadyInstalled { name: name() };
        }

        if stderr_lower.contains("conflict") || stderr_lower.contains("eresolve") {
            return Error::Conflict {
                message: stderr.trim().to_string(),
            };
        }

        if stderr_lower.contains("permission denied")
            || stderr_lower.contains("operation not permitted")
            || stderr_lower.contains("eacces")
        {
            return Error::Permission {
                message: stderr.trim().to_string(),
            };
        }

        Error::CommandFailed {
            message: format!(
                "{manager} command failed{}",
                package_name
                    .map(|n| format!(" for {n}"))
                    .unwrap_or_default()
            ),
            stderr: stderr.trim().to_string(),
        }
    }
}

/// Result type for package manager operations.
pub type Result<T> = std::result::Result<T, Error>;
