//! Error types for the call-center rules engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate.
//! Business refusals (not found, invalid state, policy, permission) are kept
//! apart from infrastructure failures so callers can turn the former into a
//! user message and propagate the latter.

use thiserror::Error;

/// The main error type for the rules engine.
///
/// # Example
///
/// ```
/// use callcenter_engine::error::{EngineError, ErrorKind};
///
/// let error = EngineError::NotFound {
///     entity: "promotion",
///     id: 42,
/// };
/// assert_eq!(error.kind(), ErrorKind::NotFound);
/// assert!(error.is_refusal());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// A referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// The kind of record that was looked up.
        entity: &'static str,
        /// The identifier that was not found.
        id: u64,
    },

    /// An action was attempted outside its valid source state.
    #[error("{message}")]
    InvalidState {
        /// A human-readable description of the refusal.
        message: String,
    },

    /// A business rule refused the action.
    #[error("{message}")]
    PolicyViolation {
        /// A human-readable description of the refusal.
        message: String,
    },

    /// The actor is not allowed to act on the target record.
    #[error("{message}")]
    PermissionScope {
        /// A human-readable description of the refusal.
        message: String,
    },

    /// The caller supplied an unusable argument.
    #[error("{message}")]
    InvalidInput {
        /// A human-readable description of the problem.
        message: String,
    },

    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// The backing store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// A description of the storage failure.
        message: String,
    },

    /// An external collaborator (audit log, notification sink) failed.
    #[error("Collaborator '{name}' failed: {message}")]
    Collaborator {
        /// The collaborator that failed.
        name: &'static str,
        /// A description of the failure.
        message: String,
    },

    /// A summary could not be serialised.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The referenced record does not exist.
    NotFound,
    /// The record is not in a state that allows the action.
    InvalidState,
    /// A business constraint refused the action.
    PolicyViolation,
    /// The actor is outside the allowed scope.
    PermissionScope,
    /// The request itself was malformed.
    InvalidInput,
    /// Configuration could not be loaded.
    Config,
    /// Storage, collaborator or serialization failure.
    Infrastructure,
}

impl EngineError {
    /// Builds an [`EngineError::InvalidState`] from any message.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Builds an [`EngineError::PolicyViolation`] from any message.
    pub fn policy(message: impl Into<String>) -> Self {
        Self::PolicyViolation {
            message: message.into(),
        }
    }

    /// Builds an [`EngineError::PermissionScope`] from any message.
    pub fn permission(message: impl Into<String>) -> Self {
        Self::PermissionScope {
            message: message.into(),
        }
    }

    /// Builds an [`EngineError::InvalidInput`] from any message.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::InvalidState { .. } => ErrorKind::InvalidState,
            EngineError::PolicyViolation { .. } => ErrorKind::PolicyViolation,
            EngineError::PermissionScope { .. } => ErrorKind::PermissionScope,
            EngineError::InvalidInput { .. } => ErrorKind::InvalidInput,
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => {
                ErrorKind::Config
            }
            EngineError::Storage { .. }
            | EngineError::Collaborator { .. }
            | EngineError::Serialization(_) => ErrorKind::Infrastructure,
        }
    }

    /// Returns true for business refusals that should be rendered to the user.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound
                | ErrorKind::InvalidState
                | ErrorKind::PolicyViolation
                | ErrorKind::PermissionScope
                | ErrorKind::InvalidInput
        )
    }

    /// The message shown to a user at the interface boundary.
    ///
    /// Infrastructure failures collapse to a generic message so that no
    /// internal detail leaks out.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::NotFound { entity, .. } => format!("{}不存在", entity_label(entity)),
            EngineError::InvalidState { message }
            | EngineError::PolicyViolation { message }
            | EngineError::PermissionScope { message }
            | EngineError::InvalidInput { message } => message.clone(),
            _ => "系统错误，请稍后重试".to_string(),
        }
    }
}

fn entity_label(entity: &str) -> &'static str {
    match entity {
        "employee" => "员工",
        "promotion" => "晋级记录",
        "challenge" => "挑战记录",
        "payroll" => "工资单",
        "archive" => "归档记录",
        _ => "记录",
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_displays_entity_and_id() {
        let error = EngineError::NotFound {
            entity: "payroll",
            id: 7,
        };
        assert_eq!(error.to_string(), "payroll 7 not found");
        assert_eq!(error.user_message(), "工资单不存在");
    }

    #[test]
    fn test_config_not_found_displays_path() {
        let error = EngineError::ConfigNotFound {
            path: "/missing/file.yaml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found: /missing/file.yaml"
        );
        assert_eq!(error.kind(), ErrorKind::Config);
        assert!(!error.is_refusal());
    }

    #[test]
    fn test_refusal_kinds() {
        assert_eq!(
            EngineError::invalid_state("x").kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(EngineError::policy("x").kind(), ErrorKind::PolicyViolation);
        assert_eq!(
            EngineError::permission("x").kind(),
            ErrorKind::PermissionScope
        );
        assert!(EngineError::policy("x").is_refusal());
    }

    #[test]
    fn test_storage_error_hides_detail_from_user() {
        let error = EngineError::Storage {
            message: "disk full at /var/lib/db".to_string(),
        };
        assert_eq!(error.kind(), ErrorKind::Infrastructure);
        assert!(!error.user_message().contains("/var/lib"));
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn refuses() -> EngineResult<()> {
            Err(EngineError::policy("本月已达到保级挑战次数上限"))
        }

        fn propagates() -> EngineResult<()> {
            refuses()?;
            Ok(())
        }

        assert!(propagates().is_err());
    }
}
