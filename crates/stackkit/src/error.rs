//! Error types for stack operations.
//!
//! Remote failures arrive as [`Error::Validation`] carrying the message the
//! control plane returned. The stack layer turns those into domain errors
//! with [`classify_validation`], the only place that inspects message text.

use thiserror::Error;

/// Categories of stack errors.
///
/// Categories decide whether a read may be retried and how the CLI reports
/// the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Remote API rejected the request
    Validation,
    /// Stack does not exist remotely
    NotFound,
    /// Nothing to update
    UpToDate,
    /// Blocked by a stack policy or the destructive-change veto
    Policy,
    /// Parameter could not be resolved or is missing
    Resolution,
    /// Remote API unreachable or throttled (transient, retryable)
    Transport,
    /// Wait loop was cancelled or ran out of time
    Interrupted,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Request rejected by CloudFormation",
            Self::NotFound => "Stack not found",
            Self::UpToDate => "Stack is up to date",
            Self::Policy => "Change blocked by policy",
            Self::Resolution => "Parameter resolution failed",
            Self::Transport => "Could not reach CloudFormation",
            Self::Interrupted => "Wait interrupted",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Check the template and parameters against the error message",
            Self::NotFound => "Create the stack first",
            Self::UpToDate => "No action needed - the stack already matches",
            Self::Policy => "Review the stack policy or re-run with --allow-destructive",
            Self::Resolution => "Supply the missing value or fix the parameter dependency",
            Self::Transport => "Check credentials and connectivity, then try again",
            Self::Interrupted => "Inspect the stack status; the remote operation may still be running",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// The remote mutation a validation failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Direct stack creation
    Create,
    /// Change set creation or execution
    Update,
}

/// Errors that can occur during stack operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Required template parameters have no local value
    #[error("Required parameters missing: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    /// Update targeted a stack that does not exist
    #[error("{0}")]
    DoesNotExist(String),

    /// Update requested but there is nothing to change
    #[error("{0}")]
    UpToDate(String),

    /// Rollback was blocked by a stack policy
    #[error("{0}")]
    StackPolicy(String),

    /// A parameter dependency could not be resolved
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// A parameter dependency names a resolver type that does not exist
    #[error("unknown resolver type: {0}")]
    UnknownResolver(String),

    /// The change set removes or replaces resources
    #[error("change set contains destructive changes: {}", .0.join(", "))]
    DestructiveChanges(Vec<String>),

    /// Generic failure carrying the remote message
    #[error("{0}")]
    Failed(String),

    /// Remote validation failure, not yet classified
    #[error("validation error: {0}")]
    Validation(String),

    /// Remote API could not be reached or throttled the request
    #[error("transport error: {0}")]
    Transport(String),

    /// External command execution failed
    #[error("command failed: {message}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// The wait loop was cancelled
    #[error("wait for {stack} cancelled")]
    Cancelled {
        /// Stack being waited on
        stack: String,
    },

    /// The wait loop ran past its deadline
    #[error("timed out waiting for {stack} (last status {status})")]
    DeadlineExceeded {
        /// Stack being waited on
        stack: String,
        /// Last status observed
        status: String,
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
            Error::Validation(_) | Error::Failed(_) => ErrorCategory::Validation,
            Error::DoesNotExist(_) => ErrorCategory::NotFound,
            Error::UpToDate(_) => ErrorCategory::UpToDate,
            Error::StackPolicy(_) | Error::DestructiveChanges(_) => ErrorCategory::Policy,
            Error::MissingParameters(_) | Error::Resolution(_) | Error::UnknownResolver(_) => {
                ErrorCategory::Resolution
            }
            Error::Transport(_) => ErrorCategory::Transport,
            Error::Cancelled { .. } | Error::DeadlineExceeded { .. } => ErrorCategory::Interrupted,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether callers should treat this as a normal outcome.
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, Error::UpToDate(_))
    }

    /// Classify a raw validation failure raised during `operation`.
    ///
    /// Every other variant passes through untouched.
    pub fn classify(self, operation: Operation) -> Self {
        match self {
            Error::Validation(message) => classify_validation(operation, &message),
            other => other,
        }
    }
}

/// Map a remote validation message to a domain error.
///
/// Matching is by substring on CloudFormation's wording. Replace this
/// function if the API ever exposes structured error codes.
pub fn classify_validation(operation: Operation, message: &str) -> Error {
    match operation {
        Operation::Create => Error::Failed(message.to_string()),
        Operation::Update => {
            if message.contains("does not exist") {
                Error::DoesNotExist(message.to_string())
            } else if message.contains("No updates") || message.contains("didn't contain changes")
            {
                Error::UpToDate(message.to_string())
            } else {
                Error::Failed(message.to_string())
            }
        }
    }
}

/// Whether a resource failure reason is a stack policy denial.
pub fn is_stack_policy_denial(reason: &str) -> bool {
    reason.contains("stack policy")
}

/// Result type for stack operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_update_does_not_exist() {
        let err = classify_validation(Operation::Update, "Stack [web] does not exist");
        assert!(matches!(err, Error::DoesNotExist(ref m) if m == "Stack [web] does not exist"));
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_classify_update_no_updates() {
        let err = classify_validation(Operation::Update, "No updates are to be performed.");
        assert!(err.is_up_to_date());

        let err = classify_validation(
            Operation::Update,
            "The submitted information didn't contain changes.",
        );
        assert!(err.is_up_to_date());
    }

    #[test]
    fn test_classify_update_other_keeps_message() {
        let message = "Template format error: Unresolved resource dependencies [Vpc]";
        let err = classify_validation(Operation::Update, message);
        assert!(matches!(err, Error::Failed(ref m) if m == message));
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn test_classify_create_is_always_generic() {
        let err = classify_validation(Operation::Create, "Stack [web] does not exist");
        assert!(matches!(err, Error::Failed(_)));
    }

    #[test]
    fn test_classify_passes_through_other_variants() {
        let err = Error::Transport("connection reset".to_string()).classify(Operation::Update);
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_missing_parameters_message() {
        let err = Error::MissingParameters(vec!["VpcId".to_string(), "Subnet".to_string()]);
        assert_eq!(err.to_string(), "Required parameters missing: VpcId, Subnet");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_stack_policy_denial() {
        assert!(is_stack_policy_denial(
            "Action denied by stack policy: Statement [#1] does not allow [Update:Replace]"
        ));
        assert!(!is_stack_policy_denial("Resource creation cancelled"));
    }
}
