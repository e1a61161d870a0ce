//! Page-level operations on the permit portal: sign-in, navigation, guard checks,
//! operator banners and the hand-over back to the operator.

use crate::config::Settings;
use crate::errors::AutomationError;
use crate::kendo::{KendoBridge, NoticeLevel};
use crate::locator::{wait_until, Locator};
use crate::outcome::{Failure, OperationResult, Severity};
use crate::selector::Selector;
use crate::session::{Session, SessionAware};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

pub const USER_NAME_FIELD: &str = "UserName";
pub const PASSWORD_FIELD: &str = "Password";
pub const ROLE_WIDGET: &str = "CurrentRoleName";
pub const ROLE_CONFIRM_BUTTON: &str = "ConfirmHeader";
pub const ACTIONS_WIDGET: &str = "ActionsList";
pub const APPLY_ACTION_BUTTON: &str = "ApplyActionButton";
pub const LOGIN_ERRORS_XPATH: &str = "//div[contains(@class, 'text-danger')]//li[text()]";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Error pages the portal shows instead of the requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCheck {
    Locked,
    AccessDenied,
    NotFound,
}

impl PageCheck {
    pub const ALL: [PageCheck; 3] = [PageCheck::Locked, PageCheck::AccessDenied, PageCheck::NotFound];

    pub fn xpath(self) -> &'static str {
        match self {
            PageCheck::Locked => "//li[contains(text(), 'Locked')]",
            PageCheck::AccessDenied => "//h1[contains(text(), 'Access Denied')]",
            PageCheck::NotFound => "//h1[contains(@class, 'text-danger') and contains(text(), '404')]",
        }
    }

    fn describe(self, soc: &str, found: &str) -> String {
        match self {
            PageCheck::Locked => format!("SOC {soc} is locked: {found}"),
            PageCheck::AccessDenied => {
                format!("Access denied, SOC {soc} is probably archived or in an improper state")
            }
            PageCheck::NotFound => format!("Error 404, SOC {soc} probably does not exist"),
        }
    }
}

pub struct Portal {
    session: Arc<dyn Session>,
    bridge: KendoBridge,
    settings: Settings,
}

impl SessionAware for Portal {
    fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }
}

impl Portal {
    pub fn new(session: Arc<dyn Session>, settings: Settings) -> Self {
        let bridge = KendoBridge::new(session.clone());
        Self {
            session,
            bridge,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn bridge(&self) -> &KendoBridge {
        &self.bridge
    }

    fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.session.clone(), selector)
            .set_default_timeout(self.settings.page_load_timeout())
            .poll_interval(POLL_INTERVAL)
    }

    async fn fail(&self, step: &str, err: &AutomationError, severity: Severity) -> Failure {
        self.classify(step, err, severity).await
    }

    /// Loads `path` relative to the portal root and waits for the document to finish.
    pub async fn open(&self, step: &str, path: &str) -> OperationResult {
        let url = self.settings.url(path);
        info!("🌐 Opening {}", url);
        if let Err(e) = self.session.navigate(&url).await {
            return Err(self.fail(step, &e, Severity::Fatal).await);
        }
        self.wait_page_loaded(step).await
    }

    pub async fn wait_page_loaded(&self, step: &str) -> OperationResult {
        let bridge = &self.bridge;
        let loaded = wait_until(
            "document to finish loading",
            self.settings.page_load_timeout(),
            POLL_INTERVAL,
            || async move { Ok(bridge.page_state().await?.is_complete()) },
        )
        .await;
        match loaded {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(step, &e, Severity::Fatal).await),
        }
    }

    pub async fn navigate_to_base(&self) -> OperationResult {
        self.open("navigate_to_base", "").await
    }

    /// Signs in unless the start page has no login form, i.e. a session already exists.
    #[instrument(skip(self, password))]
    pub async fn login(&self, user_name: &str, password: &str) -> OperationResult {
        self.navigate_to_base().await?;

        let user_field = self.locator(Selector::id(USER_NAME_FIELD));
        match user_field.exists().await {
            Ok(true) => {}
            Ok(false) => {
                info!("Already signed in");
                return Ok(());
            }
            Err(e) => return Err(self.fail("login", &e, Severity::Fatal).await),
        }

        if let Err(e) = user_field.fill(user_name).await {
            return Err(self.fail("login", &e, Severity::Fatal).await);
        }
        if let Err(e) = self.locator(Selector::id(PASSWORD_FIELD)).fill(password).await {
            return Err(self.fail("login", &e, Severity::Fatal).await);
        }
        if let Err(e) = self.bridge.submit_form(USER_NAME_FIELD).await {
            return Err(self.fail("login", &e, Severity::Fatal).await);
        }
        self.wait_page_loaded("login").await?;
        self.login_failed_check().await?;
        info!("✅ Signed in as {}", user_name);
        Ok(())
    }

    pub async fn login_failed_check(&self) -> OperationResult {
        match self
            .session
            .find_elements(&Selector::xpath(LOGIN_ERRORS_XPATH))
            .await
        {
            Ok(found) if found.is_empty() => Ok(()),
            Ok(found) => {
                let detail: Vec<&str> = found.iter().map(|e| e.text.trim()).collect();
                error!("❌ Login rejected: {}", detail.join("; "));
                Err(Failure::fatal(
                    "login",
                    "Login failed, check user_name and password in the configuration",
                ))
            }
            Err(e) => Err(self.fail("login", &e, Severity::Fatal).await),
        }
    }

    /// Fails when the portal shows a locked, access-denied or missing-SOC page, or
    /// when the address does not contain `expected_path`.
    pub async fn check_page(&self, soc: &str, expected_path: Option<&str>) -> OperationResult {
        for check in PageCheck::ALL {
            match self.session.find_elements(&Selector::xpath(check.xpath())).await {
                Ok(found) if found.is_empty() => {}
                Ok(found) => {
                    let text = found.first().map(|e| e.text.trim()).unwrap_or_default();
                    return Err(Failure::fatal("page_check", check.describe(soc, text)));
                }
                Err(e) => return Err(self.fail("page_check", &e, Severity::Fatal).await),
            }
        }
        if let Some(expected) = expected_path {
            let url = match self.session.current_url().await {
                Ok(url) => url,
                Err(e) => return Err(self.fail("page_check", &e, Severity::Fatal).await),
            };
            if !url.contains(expected) {
                return Err(Failure::fatal(
                    "page_check",
                    format!("Wrong page loaded: {url}, expected {expected}"),
                ));
            }
        }
        Ok(())
    }

    /// Opens the add-override form and waits until its first dropdown is on the page.
    pub async fn open_edit_overrides(&self, soc: &str, type_widget: &str) -> OperationResult {
        self.open("open_edit_overrides", &format!("Soc/EditOverrides/{soc}"))
            .await?;
        self.check_page(soc, Some("/Soc/EditOverrides/")).await?;
        if let Err(e) = self.locator(Selector::id(type_widget)).wait(None).await {
            let failure = self.fail("open_edit_overrides", &e, Severity::Fatal).await;
            return Err(Failure::new(
                "open_edit_overrides",
                format!("override form did not appear: {}", failure.message),
                failure.severity,
            ));
        }
        Ok(())
    }

    pub async fn open_details(&self, soc: &str) -> OperationResult {
        self.open("open_details", &format!("Soc/Details/{soc}")).await?;
        self.check_page(soc, Some("/Soc/Details/")).await
    }

    pub async fn open_update_override(&self, soc: &str) -> OperationResult {
        self.open("open_update_override", &format!("Soc/UpdateOverride/{soc}"))
            .await?;
        self.check_page(soc, Some("/Soc/UpdateOverride/")).await
    }

    /// Text shown next to the `label` caption on the current page.
    pub async fn read_label(&self, step: &str, label: &str) -> OperationResult<String> {
        match self.bridge.label_text(label).await {
            Ok(Some(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(_) => Err(Failure::fatal(step, format!("'{label}' is not shown on the page"))),
            Err(e) => Err(self.fail(step, &e, Severity::Fatal).await),
        }
    }

    /// Selects `value` in a dropdown, fires its change handler and presses `button`.
    async fn choose_and_press(&self, step: &str, widget: &str, value: &str, button: &str) -> OperationResult {
        let bridge = &self.bridge;
        let ready = wait_until(
            &format!("{widget} to be ready"),
            self.settings.page_load_timeout(),
            POLL_INTERVAL,
            || async move { Ok(bridge.widget_state(widget).await?.is_ready()) },
        )
        .await;
        if let Err(e) = ready {
            return Err(self.fail(step, &e, Severity::Fatal).await);
        }

        let echoed = match self.bridge.set_value(widget, value).await {
            Ok(v) => v,
            Err(e) => return Err(self.fail(step, &e, Severity::Fatal).await),
        };
        if echoed != value {
            return Err(Failure::fatal(step, format!("{widget} does not offer '{value}'")));
        }
        if let Err(e) = self.bridge.trigger_change(widget).await {
            return Err(self.fail(step, &e, Severity::Fatal).await);
        }
        if let Err(e) = self.locator(Selector::id(button)).click().await {
            return Err(self.fail(step, &e, Severity::Fatal).await);
        }
        Ok(())
    }

    /// Switches the signed-in user to another portal role.
    #[instrument(skip(self))]
    pub async fn change_role(&self, role: &str) -> OperationResult {
        self.open("change_role", "User/ChangeRole").await?;
        self.choose_and_press("change_role", ROLE_WIDGET, role, ROLE_CONFIRM_BUTTON)
            .await?;
        self.wait_page_loaded("change_role").await?;
        info!("✅ Role switched to {}", role);
        Ok(())
    }

    /// Runs the AcceptForApply workflow action on the open details page.
    #[instrument(skip(self))]
    pub async fn accept_for_apply(&self, soc: &str) -> OperationResult {
        let action = format!("/Soc/TriggerChangeWorkflowState/{soc}?trigger=AcceptForApply");
        self.choose_and_press("accept_for_apply", ACTIONS_WIDGET, &action, APPLY_ACTION_BUTTON)
            .await?;
        self.wait_page_loaded("accept_for_apply").await?;
        info!("✅ SOC {} accepted for apply", soc);
        Ok(())
    }

    /// Shows a banner to the operator. Failing to draw it is never more than recoverable.
    pub async fn notify(&self, level: NoticeLevel, text: &str) -> OperationResult {
        match level {
            NoticeLevel::Error => error!("❌ {}", text),
            NoticeLevel::Warning => warn!("⚠️ {}", text),
            _ => info!("💬 {}", text),
        }
        match self.bridge.notice(level, text).await {
            Ok(()) => Ok(()),
            Err(e) => Err(Failure::from_error("notify", &e, Severity::Recoverable)),
        }
    }

    /// Asks the operator to review and press Confirm, then waits for the home page.
    pub async fn wait_for_user_confirmation(&self) -> OperationResult {
        crate::outcome::tolerate(
            self.notify(
                NoticeLevel::Info,
                "⚠️ Скрипт ожидает нажатия кнопки \"Подтвердить\".",
            )
            .await,
        )?;

        let session = &self.session;
        let home = self.settings.home_page_title.as_str();
        let confirmed = wait_until(
            "the operator to press Confirm",
            self.settings.user_input_timeout(),
            POLL_INTERVAL,
            || async move { Ok(session.title().await? == home) },
        )
        .await;
        match confirmed {
            Ok(()) => {
                info!("🏁 Confirm pressed, home page loaded");
                Ok(())
            }
            Err(e) if e.is_session_lost() => {
                warn!("⚠️ Browser closed while waiting for confirmation");
                Err(Failure::terminal(
                    "wait_for_user_confirmation",
                    "browser closed while waiting for confirmation",
                ))
            }
            Err(e) => {
                let failure = self
                    .fail("wait_for_user_confirmation", &e, Severity::Recoverable)
                    .await;
                if !failure.is_terminal() {
                    let _ = self
                        .notify(NoticeLevel::Error, "❌ Failed to wait for the 'Confirm' button")
                        .await;
                }
                Err(failure)
            }
        }
    }

    /// Keeps the browser open until the operator closes it or `timeout` passes.
    /// Returns whether it was closed.
    pub async fn wait_for_browser_close(&self, timeout: Duration) -> bool {
        let session = &self.session;
        let closed = wait_until("the browser to close", timeout, Duration::from_secs(1), || async move {
            Ok(!session.is_alive().await)
        })
        .await
        .is_ok();
        if closed {
            info!("Browser closed by the operator");
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MockElement, MockSession, PageEffect};

    fn settings() -> Settings {
        Settings {
            base_link: "http://portal.test/".into(),
            max_wait_page_load_secs: 2,
            max_wait_user_input_secs: 10,
            ..Settings::default()
        }
    }

    fn portal(mock: &Arc<MockSession>) -> Portal {
        Portal::new(mock.clone(), settings())
    }

    #[tokio::test(start_paused = true)]
    async fn locked_soc_is_fatal() {
        let mock = Arc::new(MockSession::new());
        mock.route(
            "Soc/Details/1234567",
            vec![PageEffect::AddElement {
                selector: Selector::xpath(PageCheck::Locked.xpath()),
                element: MockElement::label("li", "Locked by someone"),
            }],
        );
        let failure = portal(&mock).open_details("1234567").await.unwrap_err();
        assert_eq!(failure.severity, Severity::Fatal);
        assert!(failure.message.contains("locked"));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_page_is_detected() {
        let mock = Arc::new(MockSession::new());
        mock.route(
            "Soc/Details",
            vec![PageEffect::SetUrl("http://portal.test/Account/Login".into())],
        );
        let failure = portal(&mock).open_details("1234567").await.unwrap_err();
        assert!(failure.message.contains("Wrong page"));
    }

    #[tokio::test(start_paused = true)]
    async fn login_fills_credentials_and_submits() {
        let mock = Arc::new(MockSession::new());
        mock.add_element(Selector::id(USER_NAME_FIELD), MockElement::input());
        mock.add_element(Selector::id(PASSWORD_FIELD), MockElement::input());
        mock.on_submit(USER_NAME_FIELD, vec![PageEffect::SetTitle("home".into())]);
        portal(&mock).login("operator", "s3cr3t").await.unwrap();
        assert_eq!(mock.element_value(PASSWORD_FIELD).as_deref(), Some("s3cr3t"));
        assert_eq!(mock.navigations(), vec!["http://portal.test/".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_login_is_fatal() {
        let mock = Arc::new(MockSession::new());
        mock.add_element(Selector::id(USER_NAME_FIELD), MockElement::input());
        mock.add_element(Selector::id(PASSWORD_FIELD), MockElement::input());
        mock.on_submit(
            USER_NAME_FIELD,
            vec![PageEffect::AddElement {
                selector: Selector::xpath(LOGIN_ERRORS_XPATH),
                element: MockElement::label("li", "Invalid password"),
            }],
        );
        let failure = portal(&mock).login("operator", "bad").await.unwrap_err();
        assert_eq!(failure.step, "login");
        assert_eq!(failure.severity, Severity::Fatal);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_waits_for_home_title() {
        let mock = Arc::new(MockSession::new());
        mock.title_after_reads(5, "СНД - Домашняя страница");
        portal(&mock).wait_for_user_confirmation().await.unwrap();
        assert_eq!(mock.notices().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_timeout_is_recoverable_and_closed_browser_terminal() {
        let mock = Arc::new(MockSession::new());
        let failure = portal(&mock).wait_for_user_confirmation().await.unwrap_err();
        assert_eq!(failure.severity, Severity::Recoverable);

        mock.set_alive(false);
        let failure = portal(&mock).wait_for_user_confirmation().await.unwrap_err();
        assert!(failure.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn role_change_requires_known_role() {
        let mock = Arc::new(MockSession::new());
        mock.add_dropdown(
            ROLE_WIDGET,
            crate::session::MockDropDown::with_items(&[("Исполняющий форсирование", "OAC")]),
        );
        mock.add_element(Selector::id(ROLE_CONFIRM_BUTTON), MockElement::button("OK"));
        portal(&mock).change_role("OAC").await.unwrap();
        assert_eq!(mock.dropdown_value(ROLE_WIDGET).as_deref(), Some("OAC"));

        let failure = portal(&mock).change_role("XYZ").await.unwrap_err();
        assert!(failure.message.contains("does not offer"));
    }
}
