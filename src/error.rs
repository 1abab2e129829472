//! Error types for hybrid-strassen operations.
//!
//! Every public entry point validates its inputs and returns [`Result`].
//! Kernels below that boundary are infallible and assert their shape
//! preconditions instead.

use std::fmt;

/// Errors that can occur while planning or running a multiplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrassenError {
    /// Invalid configuration: wrong worker count, zero threshold, bad thread count.
    Configuration {
        /// Human-readable error message.
        message: String,
    },
    /// Operand dimensions do not agree.
    DimensionMismatch {
        /// Side length of the left operand.
        left: usize,
        /// Side length of the right operand.
        right: usize,
        /// What was being checked when the mismatch was found.
        context: String,
    },
    /// A scratch arena could not provide the requested slice.
    Workspace {
        /// Number of elements requested.
        requested: usize,
        /// Number of elements still available.
        available: usize,
    },
    /// A message could not be sent or received.
    Communication {
        /// Rank that observed the failure.
        rank: usize,
        /// Human-readable error message.
        message: String,
    },
    /// A unit of fork-join work failed or panicked.
    Task {
        /// Human-readable error message.
        message: String,
    },
}

impl fmt::Display for StrassenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrassenError::Configuration { message } => {
                write!(f, "Configuration error: {message}")
            }
            StrassenError::DimensionMismatch {
                left,
                right,
                context,
            } => write!(
                f,
                "Dimension mismatch: {left} vs {right} ({context})"
            ),
            StrassenError::Workspace {
                requested,
                available,
            } => write!(
                f,
                "Workspace exhausted: requested {requested} elements, {available} available"
            ),
            StrassenError::Communication { rank, message } => {
                write!(f, "Communication error on rank {rank}: {message}")
            }
            StrassenError::Task { message } => write!(f, "Task failed: {message}"),
        }
    }
}

impl std::error::Error for StrassenError {}

/// Result type alias for hybrid-strassen operations.
pub type Result<T> = std::result::Result<T, StrassenError>;

/// Creates a configuration error.
pub fn configuration_error(message: impl Into<String>) -> StrassenError {
    StrassenError::Configuration {
        message: message.into(),
    }
}

/// Creates a dimension mismatch error.
pub fn dimension_mismatch(left: usize, right: usize, context: impl Into<String>) -> StrassenError {
    StrassenError::DimensionMismatch {
        left,
        right,
        context: context.into(),
    }
}

/// Creates a workspace error.
pub fn workspace_error(requested: usize, available: usize) -> StrassenError {
    StrassenError::Workspace {
        requested,
        available,
    }
}

/// Creates a communication error attributed to `rank`.
pub fn communication_error(rank: usize, message: impl Into<String>) -> StrassenError {
    StrassenError::Communication {
        rank,
        message: message.into(),
    }
}

/// Creates a task error.
pub fn task_error(message: impl Into<String>) -> StrassenError {
    StrassenError::Task {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let error = configuration_error("requires exactly 7 processes, got 4");
        let display = format!("{}", error);
        assert!(display.contains("Configuration error"));
        assert!(display.contains("exactly 7 processes"));
    }

    #[test]
    fn test_dimension_mismatch_display() {
        let error = dimension_mismatch(64, 32, "inner dimensions");
        let display = format!("{}", error);
        assert!(display.contains("Dimension mismatch"));
        assert!(display.contains("64 vs 32"));
        assert!(display.contains("inner dimensions"));
    }

    #[test]
    fn test_workspace_error_display() {
        let error = workspace_error(1024, 512);
        let display = format!("{}", error);
        assert!(display.contains("requested 1024 elements"));
        assert!(display.contains("512 available"));
    }

    #[test]
    fn test_communication_error_display() {
        let error = communication_error(3, "peer disconnected");
        let display = format!("{}", error);
        assert!(display.contains("rank 3"));
        assert!(display.contains("peer disconnected"));
    }

    #[test]
    fn test_error_equality() {
        let error1 = workspace_error(1024, 32);
        let error2 = workspace_error(1024, 32);
        let error3 = workspace_error(2048, 32);

        assert_eq!(error1, error2);
        assert_ne!(error1, error3);
    }

    #[test]
    fn test_error_trait_implementation() {
        let error = task_error("worker panicked");
        let _: &dyn std::error::Error = &error;
        assert!(std::error::Error::source(&error).is_none());
    }
}
