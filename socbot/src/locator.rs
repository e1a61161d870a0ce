use tracing::{debug, instrument};

use crate::errors::AutomationError;
use crate::selector::Selector;
use crate::session::{ElementInfo, Session};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// Default timeout if none is specified on the locator itself
const DEFAULT_LOCATOR_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Polls `probe` until it yields a value or `timeout` elapses.
///
/// The probe runs at least once. A lost session aborts the wait immediately; any
/// other probe error counts as "not yet" and is quoted in the timeout message.
pub async fn wait_for<T, F, Fut>(
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut probe: F,
) -> Result<T, AutomationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, AutomationError>>,
{
    let deadline = Instant::now() + timeout;
    let mut last_error: Option<AutomationError> = None;
    loop {
        match probe().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) if e.is_session_lost() => return Err(e),
            Err(e) => last_error = Some(e),
        }

        let now = Instant::now();
        if now >= deadline {
            let detail = last_error
                .map(|e| format!(". Last error: {e}"))
                .unwrap_or_default();
            return Err(AutomationError::Timeout(format!(
                "Timed out after {timeout:?} waiting for {what}{detail}"
            )));
        }
        tokio::time::sleep(poll.min(deadline - now)).await;
    }
}

/// [`wait_for`] for probes that only answer yes or no.
pub async fn wait_until<F, Fut>(
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut probe: F,
) -> Result<(), AutomationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, AutomationError>>,
{
    wait_for(what, timeout, poll, || {
        let fut = probe();
        async move { fut.await.map(|ready| ready.then_some(())) }
    })
    .await
}

/// A high-level handle for finding and interacting with one page element
#[derive(Clone)]
pub struct Locator {
    session: Arc<dyn Session>,
    selector: Selector,
    timeout: Duration, // Default timeout for this locator instance
    poll: Duration,
}

impl Locator {
    pub fn new(session: Arc<dyn Session>, selector: impl Into<Selector>) -> Self {
        Self {
            session,
            selector: selector.into(),
            timeout: DEFAULT_LOCATOR_TIMEOUT,
            poll: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set a default timeout for waiting operations on this locator instance.
    pub fn set_default_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Current state of the element, `None` when it is not on the page right now.
    pub async fn probe(&self) -> Result<Option<ElementInfo>, AutomationError> {
        if let Selector::Invalid(reason) = &self.selector {
            return Err(AutomationError::InvalidSelector(reason.clone()));
        }
        match self.session.find_element(&self.selector).await {
            Ok(info) => Ok(Some(info)),
            Err(AutomationError::ElementNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn exists(&self) -> Result<bool, AutomationError> {
        Ok(self.probe().await?.is_some())
    }

    /// Wait for the element to be attached to the page.
    #[instrument(level = "debug", skip(self, timeout), fields(selector = %self.selector))]
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<ElementInfo, AutomationError> {
        self.wait_matching(timeout, "present", |_| true).await
    }

    /// Wait for the element to be attached and rendered.
    #[instrument(level = "debug", skip(self, timeout), fields(selector = %self.selector))]
    pub async fn wait_visible(&self, timeout: Option<Duration>) -> Result<ElementInfo, AutomationError> {
        self.wait_matching(timeout, "visible", |info| info.visible)
            .await
            .map_err(|e| match e {
                AutomationError::Timeout(msg) => AutomationError::ElementNotVisible(msg),
                other => other,
            })
    }

    /// Wait for the element to be visible and accept input.
    pub async fn wait_enabled(&self, timeout: Option<Duration>) -> Result<ElementInfo, AutomationError> {
        self.wait_matching(timeout, "enabled", |info| info.visible && info.enabled)
            .await
            .map_err(|e| match e {
                AutomationError::Timeout(msg) => AutomationError::ElementNotEnabled(msg),
                other => other,
            })
    }

    async fn wait_matching(
        &self,
        timeout: Option<Duration>,
        condition: &str,
        accept: impl Fn(&ElementInfo) -> bool,
    ) -> Result<ElementInfo, AutomationError> {
        let effective_timeout = timeout.unwrap_or(self.timeout);
        debug!("Waiting for {} to be {}", self.selector, condition);
        let what = format!("{} to be {condition}", self.selector);
        let accept = &accept;
        wait_for(&what, effective_timeout, self.poll, || async move {
            Ok(self.probe().await?.filter(|info| accept(info)))
        })
        .await
    }

    pub async fn click(&self) -> Result<(), AutomationError> {
        self.wait_enabled(None).await?;
        self.session.click(&self.selector).await
    }

    /// Replace the element's content with `text`.
    pub async fn fill(&self, text: &str) -> Result<(), AutomationError> {
        self.wait_enabled(None).await?;
        self.session.clear(&self.selector).await?;
        self.session.fill(&self.selector, text).await
    }

    pub async fn clear(&self) -> Result<(), AutomationError> {
        self.wait(None).await?;
        self.session.clear(&self.selector).await
    }

    pub async fn text(&self) -> Result<String, AutomationError> {
        Ok(self.wait(None).await?.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn wait_for_returns_first_ready_value() {
        let calls = AtomicUsize::new(0);
        let value = wait_for("counter", Duration::from_secs(5), Duration::from_millis(100), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, AutomationError>((n >= 3).then_some(n)) }
        })
        .await
        .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_times_out_with_last_error() {
        let err = wait_until("widget", Duration::from_secs(1), Duration::from_millis(200), || async {
            Err::<bool, _>(AutomationError::ScriptError("kendo not loaded".into()))
        })
        .await
        .unwrap_err();
        match err {
            AutomationError::Timeout(msg) => {
                assert!(msg.contains("widget"));
                assert!(msg.contains("kendo not loaded"));
            }
            e => panic!("Expected a Timeout error, but got {e:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn session_loss_aborts_wait() {
        let calls = AtomicUsize::new(0);
        let err = wait_until("anything", Duration::from_secs(30), Duration::from_millis(100), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<bool, _>(AutomationError::SessionClosed("window closed".into())) }
        })
        .await
        .unwrap_err();
        assert!(err.is_session_lost());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_still_probes_once() {
        let ok = wait_until("instant", Duration::ZERO, Duration::from_millis(100), || async {
            Ok::<_, AutomationError>(true)
        })
        .await;
        assert!(ok.is_ok());
    }
}
