//! In-memory page used by tests and dry runs.
//!
//! It understands the widget bridge protocol ([`BridgeCall`]) instead of evaluating
//! JavaScript, and simulates what matters for the override form: dropdowns that
//! repopulate some polls after their parent changes, fields that appear for
//! specific state values, a submit button that records what was posted, server
//! validation rejections, and a browser that can disappear.

use super::{ElementInfo, Session};
use crate::errors::AutomationError;
use crate::kendo::{BridgeCall, GridRecord, NoticeLevel, WidgetItem};
use crate::selector::Selector;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockElement {
    pub tag: String,
    pub text: String,
    pub value: Option<String>,
    pub visible: bool,
    pub enabled: bool,
}

impl MockElement {
    /// Empty, visible, editable text input.
    pub fn input() -> Self {
        Self {
            tag: "input".into(),
            value: Some(String::new()),
            visible: true,
            enabled: true,
            ..Default::default()
        }
    }

    pub fn button(text: &str) -> Self {
        Self {
            tag: "button".into(),
            text: text.into(),
            visible: true,
            enabled: true,
            ..Default::default()
        }
    }

    /// Visible static element carrying text, e.g. an error heading.
    pub fn label(tag: &str, text: &str) -> Self {
        Self {
            tag: tag.into(),
            text: text.into(),
            visible: true,
            enabled: true,
            ..Default::default()
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn info(&self) -> ElementInfo {
        ElementInfo {
            tag: self.tag.clone(),
            text: self.text.clone(),
            value: self.value.clone(),
            visible: self.visible,
            enabled: self.enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDropDown {
    pub items: Vec<WidgetItem>,
    pub value: String,
    pub enabled: bool,
    pub visible: bool,
    pub initialized: bool,
}

impl MockDropDown {
    pub fn with_items(items: &[(&str, &str)]) -> Self {
        Self {
            items: to_items(items),
            value: String::new(),
            enabled: true,
            visible: true,
            initialized: true,
        }
    }

    /// Initialized but empty and disabled, the way dependent dropdowns start out.
    pub fn empty() -> Self {
        Self {
            enabled: false,
            ..Self::with_items(&[])
        }
    }

    /// Markup present, widget never initialized.
    pub fn uninitialized() -> Self {
        Self {
            initialized: false,
            ..Self::empty()
        }
    }

    fn fingerprint(&self) -> String {
        self.items
            .iter()
            .map(|it| format!("{}:{}", it.id.as_deref().unwrap_or("null"), it.text))
            .collect::<Vec<_>>()
            .join("|")
    }
}

fn to_items(items: &[(&str, &str)]) -> Vec<WidgetItem> {
    items
        .iter()
        .map(|(text, id)| WidgetItem {
            text: (*text).to_string(),
            id: Some((*id).to_string()),
        })
        .collect()
}

/// Side effect of clicking an element or submitting a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEffect {
    SetTitle(String),
    SetUrl(String),
    SetLabel { label: String, text: String },
    AddElement { selector: Selector, element: MockElement },
    RemoveElement(Selector),
}

#[derive(Debug)]
struct Pending {
    items: Option<Vec<WidgetItem>>,
    stale_left: usize,
    polls_left: usize,
}

#[derive(Debug, Default)]
struct MockPage {
    alive: bool,
    url: String,
    title: String,
    elements: HashMap<Selector, MockElement>,
    dropdowns: BTreeMap<String, MockDropDown>,
    pending: HashMap<String, Pending>,
    cascades: HashMap<String, Vec<String>>,
    child_options: HashMap<(String, String), Vec<WidgetItem>>,
    reveals: HashMap<(String, String), Vec<String>>,
    latency_polls: usize,
    stale_polls: usize,
    submit_button: Option<String>,
    tag_field: Option<String>,
    submissions: Vec<BTreeMap<String, String>>,
    rejections: HashMap<String, String>,
    validation_errors: Vec<String>,
    close_after_submissions: Option<usize>,
    close_pending: bool,
    grids: HashMap<String, Vec<GridRecord>>,
    labels: HashMap<String, String>,
    point_selects: usize,
    points_changed: usize,
    ready_state: String,
    kendo_loaded: bool,
    notices: Vec<(NoticeLevel, String)>,
    navigations: Vec<String>,
    routes: Vec<(String, Vec<PageEffect>)>,
    on_click: HashMap<Selector, Vec<PageEffect>>,
    on_submit: HashMap<String, Vec<PageEffect>>,
    title_script: VecDeque<(usize, String)>,
    title_reads: usize,
    writes: Vec<String>,
    bridge_log: Vec<BridgeCall>,
}

impl MockPage {
    fn check_alive(&self) -> Result<(), AutomationError> {
        if self.alive {
            Ok(())
        } else {
            Err(AutomationError::SessionClosed(
                "no such window: target window already closed".into(),
            ))
        }
    }

    fn apply(&mut self, effects: Vec<PageEffect>) {
        for effect in effects {
            match effect {
                PageEffect::SetTitle(title) => self.title = title,
                PageEffect::SetUrl(url) => self.url = url,
                PageEffect::SetLabel { label, text } => {
                    self.labels.insert(label, text);
                }
                PageEffect::AddElement { selector, element } => {
                    self.elements.insert(selector, element);
                }
                PageEffect::RemoveElement(selector) => {
                    self.elements.remove(&selector);
                }
            }
        }
    }

    fn dropdown_info(&self, id: &str) -> Option<ElementInfo> {
        self.dropdowns.get(id).map(|d| ElementInfo {
            tag: "select".into(),
            text: String::new(),
            value: Some(d.value.clone()),
            visible: d.visible,
            enabled: d.enabled,
        })
    }

    fn lookup(&self, selector: &Selector) -> Option<ElementInfo> {
        if let Some(el) = self.elements.get(selector) {
            return Some(el.info());
        }
        match selector {
            Selector::Id(id) => self.dropdown_info(id),
            _ => None,
        }
    }

    fn element_mut(&mut self, selector: &Selector) -> Result<&mut MockElement, AutomationError> {
        self.elements
            .get_mut(selector)
            .ok_or_else(|| AutomationError::ElementNotFound(selector.to_string()))
    }

    fn record_write(&mut self, selector: &Selector) {
        let key = match selector {
            Selector::Id(id) => id.clone(),
            other => other.to_string(),
        };
        self.writes.push(key);
    }

    fn submit(&mut self) {
        let mut snapshot = BTreeMap::new();
        for (selector, el) in &self.elements {
            if let (Selector::Id(id), Some(value)) = (selector, &el.value) {
                if !value.is_empty() {
                    snapshot.insert(id.clone(), value.clone());
                }
            }
        }
        for (id, d) in &self.dropdowns {
            if !d.value.is_empty() {
                snapshot.insert(id.clone(), d.value.clone());
            }
        }

        let tag = self
            .tag_field
            .as_ref()
            .and_then(|f| snapshot.get(f))
            .cloned()
            .unwrap_or_default();
        if let Some(message) = self.rejections.get(&tag) {
            self.validation_errors = vec![message.clone()];
            return;
        }

        self.validation_errors.clear();
        self.submissions.push(snapshot);
        for el in self.elements.values_mut() {
            if el.tag == "input" {
                el.value = Some(String::new());
            }
        }
        if let Some(limit) = self.close_after_submissions {
            if self.submissions.len() >= limit {
                self.close_pending = true;
            }
        }
    }

    fn set_dropdown(&mut self, widget: &str, value: &str) -> Result<String, AutomationError> {
        let dropdown = self
            .dropdowns
            .get_mut(widget)
            .filter(|d| d.initialized)
            .ok_or_else(|| {
                AutomationError::ScriptError(format!("setValue: widget {widget} is not initialized"))
            })?;
        let known = dropdown.items.iter().any(|it| it.id.as_deref() == Some(value));
        dropdown.value = if known || value.is_empty() {
            value.to_string()
        } else {
            String::new()
        };
        let current = dropdown.value.clone();
        self.writes.push(widget.to_string());

        let mut shown = Vec::new();
        for ((w, v), ids) in &self.reveals {
            if w == widget {
                for id in ids {
                    shown.push((id.clone(), *v == current));
                }
            }
        }
        for (id, visible) in shown {
            if let Some(el) = self.elements.get_mut(&Selector::Id(id)) {
                el.visible = visible;
            }
        }
        Ok(current)
    }

    fn change(&mut self, widget: &str) -> Result<bool, AutomationError> {
        let value = self
            .dropdowns
            .get(widget)
            .filter(|d| d.initialized)
            .map(|d| d.value.clone())
            .ok_or_else(|| {
                AutomationError::ScriptError(format!(
                    "triggerChange: widget {widget} is not initialized"
                ))
            })?;
        let children = self.cascades.get(widget).cloned().unwrap_or_default();
        for child in children {
            if self.stale_polls == 0 {
                self.reset_dropdown(&child);
            }
            let items = self
                .child_options
                .get(&(child.clone(), value.clone()))
                .cloned();
            self.pending.insert(
                child,
                Pending {
                    items,
                    stale_left: self.stale_polls,
                    polls_left: self.latency_polls,
                },
            );
        }
        Ok(true)
    }

    fn reset_dropdown(&mut self, widget: &str) {
        if let Some(d) = self.dropdowns.get_mut(widget) {
            d.items.clear();
            d.value.clear();
            d.enabled = false;
        }
    }

    /// Advances a dependent widget's reload by one readiness poll.
    fn poll_pending(&mut self, widget: &str) {
        let Some(p) = self.pending.get_mut(widget) else {
            return;
        };
        if p.stale_left > 0 {
            p.stale_left -= 1;
            if p.stale_left == 0 {
                self.reset_dropdown(widget);
            }
            return;
        }
        if p.polls_left > 0 {
            p.polls_left -= 1;
            return;
        }
        if let Some(p) = self.pending.remove(widget) {
            if let (Some(items), Some(d)) = (p.items, self.dropdowns.get_mut(widget)) {
                d.items = items;
                d.enabled = true;
            }
        }
    }

    fn bridge(&mut self, call: BridgeCall) -> Value {
        self.bridge_log.push(call.clone());
        let result: Result<Value, String> = match call {
            BridgeCall::WidgetState { widget } => {
                self.poll_pending(&widget);
                Ok(match self.dropdowns.get(&widget) {
                    None => json!({ "exists": false }),
                    Some(d) if !d.initialized => json!({ "exists": true }),
                    Some(d) => json!({
                        "exists": true,
                        "initialized": true,
                        "count": d.items.len(),
                        "enabled": d.enabled,
                        "visible": d.visible,
                        "value": d.value,
                        "fingerprint": d.fingerprint(),
                    }),
                })
            }
            BridgeCall::DataItems { widget } => match self.dropdowns.get(&widget) {
                Some(d) if d.initialized => Ok(json!(d.items)),
                _ => Err(format!("widget {widget} is not initialized")),
            },
            BridgeCall::SetValue { widget, value } => self
                .set_dropdown(&widget, &value)
                .map(Value::String)
                .map_err(|e| e.to_string()),
            BridgeCall::TriggerChange { widget } => {
                self.change(&widget).map(Value::Bool).map_err(|e| e.to_string())
            }
            BridgeCall::ValidationErrors => Ok(json!(self.validation_errors)),
            BridgeCall::Notice { text, level } => {
                self.notices.push((level, text));
                Ok(Value::Null)
            }
            BridgeCall::GridRecords { grid } => Ok(match self.grids.get(&grid) {
                Some(rows) => json!(rows),
                None => Value::Null,
            }),
            BridgeCall::LabelText { label } => Ok(json!(self.labels.get(&label))),
            BridgeCall::PointSelects { index } => {
                let changed = match index {
                    Some(_) => self.point_selects,
                    None => 0,
                };
                self.points_changed += changed;
                Ok(json!({ "total": self.point_selects, "changed": changed }))
            }
            BridgeCall::PageState => Ok(json!({
                "readyState": self.ready_state,
                "kendo": self.kendo_loaded,
            })),
            BridgeCall::SubmitForm { field } => {
                if self.elements.contains_key(&Selector::Id(field.clone())) {
                    let effects = self.on_submit.get(&field).cloned().unwrap_or_default();
                    self.apply(effects);
                    Ok(Value::Null)
                } else {
                    Err(format!("no form owns #{field}"))
                }
            }
        };
        match result {
            Ok(data) => json!({ "ok": true, "data": data }),
            Err(error) => json!({ "ok": false, "error": error }),
        }
    }
}

/// Scriptable stand-in for a browser tab.
pub struct MockSession {
    page: Mutex<MockPage>,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    pub const TYPE_WIDGET: &'static str = "OverrideTypeId";
    pub const METHOD_WIDGET: &'static str = "OverrideMethodId";
    pub const APPLIED_WIDGET: &'static str = "OverrideAppliedStateId";
    pub const REMOVED_WIDGET: &'static str = "OverrideRemovedStateId";

    /// Blank, live page.
    pub fn new() -> Self {
        Self {
            page: Mutex::new(MockPage {
                alive: true,
                url: "about:blank".into(),
                ready_state: "complete".into(),
                kendo_loaded: true,
                ..Default::default()
            }),
        }
    }

    /// The add-override form with its five override types and empty dependent dropdowns.
    pub fn override_form() -> Self {
        let session = Self::new();
        for id in ["TagNumber", "Description", "Comment"] {
            session.add_element(Selector::id(id), MockElement::input());
        }
        for id in ["AdditionalValueAppliedState", "AdditionalValueRemovedState"] {
            session.add_element(Selector::id(id), MockElement::input().hidden());
        }
        session.add_element(Selector::id("AddOverrideBtn"), MockElement::button("Добавить"));
        session.add_dropdown(
            Self::TYPE_WIDGET,
            MockDropDown::with_items(&[
                ("Байпас", "1"),
                ("Блокировка", "2"),
                ("Форсировка", "3"),
                ("Логики", "4"),
                ("Сигнализации", "5"),
            ]),
        );
        for id in [Self::METHOD_WIDGET, Self::APPLIED_WIDGET, Self::REMOVED_WIDGET] {
            session.add_dropdown(id, MockDropDown::empty());
        }
        session.cascade(Self::TYPE_WIDGET, &[Self::METHOD_WIDGET]);
        session.cascade(Self::METHOD_WIDGET, &[Self::APPLIED_WIDGET, Self::REMOVED_WIDGET]);
        {
            let mut page = session.lock();
            page.submit_button = Some("AddOverrideBtn".into());
            page.tag_field = Some("TagNumber".into());
            page.url = "http://portal.test/Soc/EditOverrides/1234567".into();
        }
        session
    }

    fn lock(&self) -> MutexGuard<'_, MockPage> {
        self.page.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_element(&self, selector: impl Into<Selector>, element: MockElement) {
        self.lock().elements.insert(selector.into(), element);
    }

    pub fn remove_element(&self, selector: impl Into<Selector>) {
        self.lock().elements.remove(&selector.into());
    }

    pub fn add_dropdown(&self, id: &str, dropdown: MockDropDown) {
        self.lock().dropdowns.insert(id.to_string(), dropdown);
    }

    /// Changing `parent` empties and disables `children` until they repopulate.
    pub fn cascade(&self, parent: &str, children: &[&str]) {
        self.lock().cascades.insert(
            parent.to_string(),
            children.iter().map(|c| c.to_string()).collect(),
        );
    }

    /// Items `child` receives once `parent_value` has been selected in its parent.
    pub fn child_options(&self, child: &str, parent_value: &str, items: &[(&str, &str)]) {
        self.lock()
            .child_options
            .insert((child.to_string(), parent_value.to_string()), to_items(items));
    }

    /// Methods offered for an override type id.
    pub fn methods_for(&self, type_id: &str, items: &[(&str, &str)]) {
        self.child_options(Self::METHOD_WIDGET, type_id, items);
    }

    /// Applied and removed states offered for a method id.
    pub fn states_for(&self, method_id: &str, applied: &[(&str, &str)], removed: &[(&str, &str)]) {
        self.child_options(Self::APPLIED_WIDGET, method_id, applied);
        self.child_options(Self::REMOVED_WIDGET, method_id, removed);
    }

    /// Selecting `value` in `widget` shows `element_id`; any other value hides it.
    pub fn reveal_on(&self, widget: &str, value: &str, element_id: &str) {
        self.lock()
            .reveals
            .entry((widget.to_string(), value.to_string()))
            .or_default()
            .push(element_id.to_string());
    }

    /// Number of readiness polls a dependent widget stays empty after its parent changes.
    pub fn set_latency(&self, polls: usize) {
        self.lock().latency_polls = polls;
    }

    /// Number of readiness polls a dependent widget keeps showing its previous list
    /// after its parent changes, before it empties and starts reloading.
    pub fn set_stale_polls(&self, polls: usize) {
        self.lock().stale_polls = polls;
    }

    pub fn set_alive(&self, alive: bool) {
        self.lock().alive = alive;
    }

    /// The browser is gone at the first liveness probe after the n-th accepted submission.
    pub fn close_after_submissions(&self, n: usize) {
        self.lock().close_after_submissions = Some(n);
    }

    /// Server-side validation rejects submissions carrying this tag.
    pub fn reject_tag(&self, tag: &str, message: &str) {
        self.lock()
            .rejections
            .insert(tag.to_string(), message.to_string());
    }

    pub fn set_grid(&self, grid: &str, rows: Vec<GridRecord>) {
        self.lock().grids.insert(grid.to_string(), rows);
    }

    pub fn set_label(&self, label: &str, text: &str) {
        self.lock()
            .labels
            .insert(label.to_string(), text.to_string());
    }

    pub fn set_point_selects(&self, count: usize) {
        self.lock().point_selects = count;
    }

    pub fn set_page_state(&self, ready_state: &str, kendo_loaded: bool) {
        let mut page = self.lock();
        page.ready_state = ready_state.to_string();
        page.kendo_loaded = kendo_loaded;
    }

    pub fn set_title(&self, title: &str) {
        self.lock().title = title.to_string();
    }

    /// Navigating to a URL containing `fragment` applies `effects`.
    pub fn route(&self, fragment: &str, effects: Vec<PageEffect>) {
        self.lock().routes.push((fragment.to_string(), effects));
    }

    pub fn on_click(&self, selector: impl Into<Selector>, effects: Vec<PageEffect>) {
        self.lock().on_click.insert(selector.into(), effects);
    }

    /// Submitting the form owning `field` applies `effects`.
    pub fn on_submit(&self, field: &str, effects: Vec<PageEffect>) {
        self.lock().on_submit.insert(field.to_string(), effects);
    }

    /// After `reads` more title reads the page title becomes `title`.
    pub fn title_after_reads(&self, reads: usize, title: &str) {
        let mut page = self.lock();
        let at = page.title_reads + reads;
        page.title_script.push_back((at, title.to_string()));
    }

    pub fn submissions(&self) -> Vec<BTreeMap<String, String>> {
        self.lock().submissions.clone()
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.lock().notices.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    /// Ids of fields and widgets written since the last [`MockSession::clear_writes`].
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    pub fn bridge_calls(&self) -> Vec<BridgeCall> {
        self.lock().bridge_log.clone()
    }

    pub fn dropdown_value(&self, id: &str) -> Option<String> {
        self.lock().dropdowns.get(id).map(|d| d.value.clone())
    }

    pub fn element_value(&self, id: &str) -> Option<String> {
        self.lock()
            .elements
            .get(&Selector::id(id))
            .and_then(|e| e.value.clone())
    }

    pub fn points_changed(&self) -> usize {
        self.lock().points_changed
    }

    pub fn label(&self, label: &str) -> Option<String> {
        self.lock().labels.get(label).cloned()
    }
}

#[async_trait]
impl Session for MockSession {
    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        let mut page = self.lock();
        page.check_alive()?;
        trace!(url, "mock navigate");
        page.url = url.to_string();
        page.navigations.push(url.to_string());
        let effects: Vec<PageEffect> = page
            .routes
            .iter()
            .filter(|(fragment, _)| url.contains(fragment.as_str()))
            .flat_map(|(_, effects)| effects.clone())
            .collect();
        page.apply(effects);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        let page = self.lock();
        page.check_alive()?;
        Ok(page.url.clone())
    }

    async fn title(&self) -> Result<String, AutomationError> {
        let mut page = self.lock();
        page.check_alive()?;
        page.title_reads += 1;
        while let Some((at, _)) = page.title_script.front() {
            if *at > page.title_reads {
                break;
            }
            if let Some((_, title)) = page.title_script.pop_front() {
                page.title = title;
            }
        }
        Ok(page.title.clone())
    }

    async fn find_element(&self, selector: &Selector) -> Result<ElementInfo, AutomationError> {
        let page = self.lock();
        page.check_alive()?;
        page.lookup(selector)
            .ok_or_else(|| AutomationError::ElementNotFound(selector.to_string()))
    }

    async fn find_elements(&self, selector: &Selector) -> Result<Vec<ElementInfo>, AutomationError> {
        let page = self.lock();
        page.check_alive()?;
        Ok(page.lookup(selector).into_iter().collect())
    }

    async fn click(&self, selector: &Selector) -> Result<(), AutomationError> {
        let mut page = self.lock();
        page.check_alive()?;
        let info = page
            .lookup(selector)
            .ok_or_else(|| AutomationError::ElementNotFound(selector.to_string()))?;
        if !info.visible || !info.enabled {
            return Err(AutomationError::ElementNotEnabled(selector.to_string()));
        }
        let is_submit = matches!(
            (selector, &page.submit_button),
            (Selector::Id(id), Some(submit)) if id == submit
        );
        if is_submit {
            page.submit();
        }
        if let Some(effects) = page.on_click.get(selector).cloned() {
            page.apply(effects);
        }
        Ok(())
    }

    async fn fill(&self, selector: &Selector, text: &str) -> Result<(), AutomationError> {
        let mut page = self.lock();
        page.check_alive()?;
        let el = page.element_mut(selector)?;
        if !el.visible {
            return Err(AutomationError::ElementNotVisible(selector.to_string()));
        }
        if !el.enabled {
            return Err(AutomationError::ElementNotEnabled(selector.to_string()));
        }
        el.value.get_or_insert_with(String::new).push_str(text);
        page.record_write(selector);
        Ok(())
    }

    async fn clear(&self, selector: &Selector) -> Result<(), AutomationError> {
        let mut page = self.lock();
        page.check_alive()?;
        let el = page.element_mut(selector)?;
        if !el.enabled {
            return Err(AutomationError::ElementNotEnabled(selector.to_string()));
        }
        el.value = Some(String::new());
        page.record_write(selector);
        Ok(())
    }

    async fn execute_script(&self, _script: &str, args: Vec<Value>) -> Result<Value, AutomationError> {
        let mut page = self.lock();
        page.check_alive()?;
        let call = args
            .into_iter()
            .next()
            .map(serde_json::from_value::<BridgeCall>)
            .transpose()?
            .ok_or_else(|| {
                AutomationError::ScriptError("mock page only evaluates widget bridge calls".into())
            })?;
        Ok(page.bridge(call))
    }

    async fn is_alive(&self) -> bool {
        let mut page = self.lock();
        if page.close_pending {
            page.close_pending = false;
            page.alive = false;
        }
        page.alive
    }

    async fn close(&self) -> Result<(), AutomationError> {
        self.lock().alive = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kendo::KendoBridge;
    use std::sync::Arc;

    #[tokio::test]
    async fn dependent_widget_repopulates_after_latency() {
        let mock = Arc::new(MockSession::override_form());
        mock.methods_for("3", &[("Программная", "31"), ("Аппаратная", "32")]);
        mock.set_latency(2);
        let bridge = KendoBridge::new(mock.clone());

        assert_eq!(bridge.set_value("OverrideTypeId", "3").await.unwrap(), "3");
        assert!(bridge.trigger_change("OverrideTypeId").await.unwrap());

        let first = bridge.widget_state("OverrideMethodId").await.unwrap();
        assert_eq!(first.count, 0);
        assert!(!first.enabled);
        let _ = bridge.widget_state("OverrideMethodId").await.unwrap();
        let ready = bridge.widget_state("OverrideMethodId").await.unwrap();
        assert!(ready.is_ready());
        assert_eq!(ready.count, 2);
    }

    #[tokio::test]
    async fn unknown_value_reads_back_empty() {
        let mock = Arc::new(MockSession::override_form());
        let bridge = KendoBridge::new(mock);
        assert_eq!(bridge.set_value("OverrideTypeId", "99").await.unwrap(), "");
    }

    #[tokio::test]
    async fn submit_records_form_and_resets_inputs() {
        let mock = MockSession::override_form();
        mock.fill(&Selector::id("TagNumber"), "PV-101").await.unwrap();
        mock.click(&Selector::id("AddOverrideBtn")).await.unwrap();
        let posted = mock.submissions();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].get("TagNumber").map(String::as_str), Some("PV-101"));
        assert_eq!(mock.element_value("TagNumber").as_deref(), Some(""));
    }

    #[tokio::test]
    async fn closed_session_rejects_everything() {
        let mock = MockSession::override_form();
        mock.close().await.unwrap();
        assert!(!mock.is_alive().await);
        let err = mock.current_url().await.unwrap_err();
        assert!(err.is_session_lost());
    }

    #[tokio::test]
    async fn hidden_fields_refuse_input_until_revealed() {
        let mock = Arc::new(MockSession::override_form());
        mock.add_dropdown("OverrideAppliedStateId", MockDropDown::with_items(&[("Значение", "7")]));
        mock.reveal_on("OverrideAppliedStateId", "7", "AdditionalValueAppliedState");
        let field = Selector::id("AdditionalValueAppliedState");
        assert!(mock.fill(&field, "42").await.is_err());

        KendoBridge::new(mock.clone())
            .set_value("OverrideAppliedStateId", "7")
            .await
            .unwrap();
        mock.fill(&field, "42").await.unwrap();
        assert_eq!(mock.element_value("AdditionalValueAppliedState").as_deref(), Some("42"));
    }
}
