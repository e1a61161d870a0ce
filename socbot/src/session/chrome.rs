//! Chrome over the DevTools protocol.

use super::{ElementInfo, Session};
use crate::browser_script::{check_script_result, wrap_function};
use crate::errors::AutomationError;
use crate::selector::Selector;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

const LIVENESS_TIMEOUT: Duration = Duration::from_secs(3);

/// Locates elements for any [`Selector`] and performs simple DOM actions on them.
const ELEMENT_SCRIPT: &str = r#"
const req = arguments[0];
const sel = req.selector;
const all = () => {
  switch (sel.by) {
    case 'id': { const el = document.getElementById(sel.value); return el ? [el] : []; }
    case 'css': return Array.from(document.querySelectorAll(sel.value));
    case 'xpath': {
      const r = document.evaluate(sel.value, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
      const out = [];
      for (let i = 0; i < r.snapshotLength; i++) {
        const n = r.snapshotItem(i);
        out.push(n.nodeType === 1 ? n : n.parentElement);
      }
      return out.filter(Boolean);
    }
    case 'text': return Array.from(document.querySelectorAll('body *')).filter((el) =>
      (el.textContent || '').includes(sel.value)
      && !Array.from(el.children).some((c) => (c.textContent || '').includes(sel.value)));
    default: return [];
  }
};
const info = (el) => ({
  tag: el.tagName.toLowerCase(),
  text: String(el.innerText ?? el.textContent ?? '').trim(),
  value: ('value' in el) ? String(el.value) : null,
  visible: !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length)
    && getComputedStyle(el).visibility !== 'hidden',
  enabled: !el.disabled,
});
const fire = (el) => {
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
};
const found = all();
if (req.action === 'infoAll') return found.map(info);
const el = found[0];
if (!el) return { found: false };
switch (req.action) {
  case 'info': return { found: true, info: info(el) };
  case 'click': el.scrollIntoView({ block: 'center' }); el.click(); return { found: true };
  case 'clear': el.value = ''; fire(el); return { found: true };
  case 'append': el.focus(); el.value = (el.value || '') + req.text; fire(el); return { found: true };
  default: return { success: false, message: 'unknown element action ' + req.action };
}
"#;

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub executable: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            headless: false,
            window_size: (1400, 1000),
            executable: None,
            extra_args: Vec::new(),
        }
    }
}

/// A single Chrome tab driven through chromiumoxide.
pub struct ChromeSession {
    browser: Mutex<Browser>,
    page: Page,
    _handler: JoinHandle<()>,
}

fn map_cdp(context: &str, e: CdpError) -> AutomationError {
    let message = format!("{context}: {e}");
    match e {
        CdpError::NotFound => AutomationError::ElementNotFound(message),
        CdpError::Timeout => AutomationError::Timeout(message),
        CdpError::JavascriptException(_) => AutomationError::ScriptError(message),
        _ => {
            let lowered = message.to_lowercase();
            if lowered.contains("closed")
                || lowered.contains("channel")
                || lowered.contains("websocket")
                || lowered.contains("no such window")
                || lowered.contains("target")
            {
                AutomationError::SessionClosed(message)
            } else {
                AutomationError::PlatformError(message)
            }
        }
    }
}

impl ChromeSession {
    #[instrument(skip(options))]
    pub async fn launch(options: ChromeOptions) -> Result<Self, AutomationError> {
        info!(headless = options.headless, "🚀 Launching Chrome");
        let mut builder = BrowserConfig::builder()
            .window_size(options.window_size.0, options.window_size.1)
            .arg("--disable-extensions")
            .arg("--disable-dev-shm-usage");
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        for arg in &options.extra_args {
            builder = builder.arg(arg.as_str());
        }
        let config = builder.build().map_err(|e| {
            AutomationError::InvalidArgument(format!("Failed to build browser config: {e}"))
        })?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AutomationError::PlatformError(format!("Failed to launch browser: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("CDP handler event loop ended");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| map_cdp("Failed to create browser page", e))?;

        info!("✅ Chrome is ready");
        Ok(Self {
            browser: Mutex::new(browser),
            page,
            _handler: handler,
        })
    }

    async fn evaluate(&self, expression: String) -> Result<Value, AutomationError> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(AutomationError::InvalidArgument)?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| map_cdp("Script evaluation failed", e))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn element_action(
        &self,
        selector: &Selector,
        action: &str,
        text: Option<&str>,
    ) -> Result<Value, AutomationError> {
        if let Selector::Invalid(reason) = selector {
            return Err(AutomationError::InvalidSelector(reason.clone()));
        }
        let request = json!({ "selector": selector, "action": action, "text": text });
        let result = self.execute_script(ELEMENT_SCRIPT, vec![request]).await?;
        if result.get("found") == Some(&Value::Bool(false)) {
            return Err(AutomationError::ElementNotFound(selector.to_string()));
        }
        Ok(result)
    }
}

#[async_trait]
impl Session for ChromeSession {
    #[instrument(level = "debug", skip(self))]
    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| map_cdp(&format!("Navigation to {url} failed"), e))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| map_cdp("Failed to read current URL", e))?;
        Ok(url.unwrap_or_default())
    }

    async fn title(&self) -> Result<String, AutomationError> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| map_cdp("Failed to read page title", e))?;
        Ok(title.unwrap_or_default())
    }

    async fn find_element(&self, selector: &Selector) -> Result<ElementInfo, AutomationError> {
        let result = self.element_action(selector, "info", None).await?;
        let info = result.get("info").cloned().unwrap_or(Value::Null);
        Ok(serde_json::from_value(info)?)
    }

    async fn find_elements(&self, selector: &Selector) -> Result<Vec<ElementInfo>, AutomationError> {
        let result = self.element_action(selector, "infoAll", None).await?;
        Ok(serde_json::from_value(result)?)
    }

    #[instrument(level = "debug", skip(self), fields(selector = %selector))]
    async fn click(&self, selector: &Selector) -> Result<(), AutomationError> {
        match selector.as_css() {
            Some(css) => {
                let element = self
                    .page
                    .find_element(css.as_str())
                    .await
                    .map_err(|e| map_cdp(&format!("Element {selector} not found"), e))?;
                element
                    .click()
                    .await
                    .map_err(|e| map_cdp(&format!("Click on {selector} failed"), e))?;
            }
            None => {
                self.element_action(selector, "click", None).await?;
            }
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self, text), fields(selector = %selector))]
    async fn fill(&self, selector: &Selector, text: &str) -> Result<(), AutomationError> {
        match selector.as_css() {
            Some(css) => {
                let element = self
                    .page
                    .find_element(css.as_str())
                    .await
                    .map_err(|e| map_cdp(&format!("Element {selector} not found"), e))?;
                element
                    .click()
                    .await
                    .map_err(|e| map_cdp(&format!("Focus on {selector} failed"), e))?;
                element
                    .type_str(text)
                    .await
                    .map_err(|e| map_cdp(&format!("Typing into {selector} failed"), e))?;
            }
            None => {
                self.element_action(selector, "append", Some(text)).await?;
            }
        }
        Ok(())
    }

    async fn clear(&self, selector: &Selector) -> Result<(), AutomationError> {
        self.element_action(selector, "clear", None).await?;
        Ok(())
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value, AutomationError> {
        let expression = wrap_function(script, &args)?;
        let result = self.evaluate(expression).await?;
        check_script_result(result)
    }

    async fn is_alive(&self) -> bool {
        match tokio::time::timeout(LIVENESS_TIMEOUT, self.page.url()).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Liveness probe failed: {e}");
                false
            }
            Err(_) => {
                warn!("Liveness probe timed out after {:?}", LIVENESS_TIMEOUT);
                false
            }
        }
    }

    async fn close(&self) -> Result<(), AutomationError> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("Failed to close browser cleanly: {e}");
        }
        let _ = browser.wait().await;
        info!("👋 Browser closed");
        Ok(())
    }
}
