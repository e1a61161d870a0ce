//! The browser boundary.
//!
//! Everything the crate does to a page goes through [`Session`]. Workflows receive an
//! `Arc<dyn Session>` in their constructors; nothing reaches for a global driver.

use crate::errors::AutomationError;
use crate::outcome::{Failure, OperationResult, Severity};
use crate::selector::Selector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[cfg(feature = "chrome")]
pub mod chrome;
pub mod mock;

#[cfg(feature = "chrome")]
pub use chrome::{ChromeOptions, ChromeSession};
pub use mock::{MockDropDown, MockElement, MockSession, PageEffect};

/// Snapshot of a located element at the moment it was queried.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub enabled: bool,
}

#[async_trait]
pub trait Session: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    async fn current_url(&self) -> Result<String, AutomationError>;

    async fn title(&self) -> Result<String, AutomationError>;

    /// First element matching the selector, `ElementNotFound` when there is none.
    async fn find_element(&self, selector: &Selector) -> Result<ElementInfo, AutomationError>;

    async fn find_elements(&self, selector: &Selector) -> Result<Vec<ElementInfo>, AutomationError>;

    async fn click(&self, selector: &Selector) -> Result<(), AutomationError>;

    /// Types text into an input. Existing content is kept; call [`Session::clear`] first.
    async fn fill(&self, selector: &Selector, text: &str) -> Result<(), AutomationError>;

    async fn clear(&self, selector: &Selector) -> Result<(), AutomationError>;

    /// Runs `script` as a function body; `args` are visible as `arguments`.
    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value, AutomationError>;

    /// Cheap liveness probe. Never errors, a broken session is simply not alive.
    async fn is_alive(&self) -> bool;

    async fn close(&self) -> Result<(), AutomationError>;
}

/// Capability shared by every workflow component that owns a session handle.
#[async_trait]
pub trait SessionAware: Send + Sync {
    fn session(&self) -> &Arc<dyn Session>;

    /// Terminal failure when the browser is no longer reachable.
    async fn ensure_alive(&self, step: &str) -> OperationResult {
        if self.session().is_alive().await {
            Ok(())
        } else {
            Err(Failure::terminal(
                step,
                "browser session is no longer available",
            ))
        }
    }

    /// Classify a step error, upgrading it to terminal when the session died underneath it.
    async fn classify(
        &self,
        step: &str,
        err: &AutomationError,
        severity: Severity,
    ) -> Failure {
        let failure = Failure::from_error(step, err, severity);
        if !failure.is_terminal() && !self.session().is_alive().await {
            return failure.escalate(Severity::Terminal);
        }
        failure
    }
}
