use thiserror::Error;

/// Low-level failures raised while talking to the browser page.
///
/// These never cross a workflow boundary as-is: components convert them into a
/// [`Failure`](crate::outcome::Failure) with a severity chosen by the caller.
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Browser session is closed: {0}")]
    SessionClosed(String),

    #[error("Script error: {0}")]
    ScriptError(String),

    #[error("Browser error: {0}")]
    PlatformError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Element is not visible: {0}")]
    ElementNotVisible(String),

    #[error("Element is not enabled: {0}")]
    ElementNotEnabled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AutomationError {
    /// True when the error means the browser (or its window) is gone for good.
    pub fn is_session_lost(&self) -> bool {
        matches!(self, AutomationError::SessionClosed(_))
    }
}

impl From<serde_json::Error> for AutomationError {
    fn from(e: serde_json::Error) -> Self {
        AutomationError::ScriptError(format!("unexpected script payload: {e}"))
    }
}
