//! The boundary result shape handed to callers.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::EngineResult;

/// A success flag plus a human-readable message.
///
/// Built from any [`EngineResult`]: refusals keep their message,
/// infrastructure failures collapse to a generic one. No internal identifier
/// or debug output ever ends up in `message`.
///
/// # Example
///
/// ```
/// use callcenter_engine::error::{EngineError, EngineResult};
/// use callcenter_engine::models::ActionOutcome;
///
/// let refused: EngineResult<()> = Err(EngineError::policy("未通过培训考核"));
/// let outcome = ActionOutcome::from_result(refused, |_| String::new());
/// assert!(!outcome.success);
/// assert_eq!(outcome.message, "未通过培训考核");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Whether the action went through.
    pub success: bool,
    /// What to show the user.
    pub message: String,
}

impl ActionOutcome {
    /// A successful outcome.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A refused outcome.
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    /// Converts a result, describing the success value with `describe`.
    pub fn from_result<T>(result: EngineResult<T>, describe: impl FnOnce(&T) -> String) -> Self {
        match result {
            Ok(value) => Self::ok(describe(&value)),
            Err(err) => {
                if !err.is_refusal() {
                    error!(error = %err, "action failed");
                }
                Self::refused(err.user_message())
            }
        }
    }
}
