//! Page-side bridge to the Kendo UI widgets of the override forms.
//!
//! All DOM and jQuery probing lives in [`BRIDGE_SCRIPT`]. The script is fixed; the
//! operation to run is passed as its first argument, a serialized [`BridgeCall`].
//! Every call answers with an envelope `{ok, data}` or `{ok: false, error}` which
//! [`crate::browser_script::interpret_envelope`] unwraps.

use crate::browser_script::interpret_envelope;
use crate::errors::AutomationError;
use crate::session::Session;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

pub const BRIDGE_SCRIPT: &str = r#"
const call = arguments[0] || {};
const $ = window.jQuery;
const widget = (id) => {
  if (!$) return null;
  const el = $('#' + id);
  if (!el.length) return null;
  return el.data('kendoDropDownList') || el.data('kendoComboBox') || null;
};
const itemText = (it) => it == null ? '' : String(it.Text ?? it.Title ?? it.Name ?? it.text ?? '');
const itemId = (it) => {
  if (it == null) return null;
  const v = it.Value ?? it.Id ?? it.value ?? it.id;
  return v == null ? null : String(v);
};
const shown = (el) => !!el && !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length)
  && getComputedStyle(el).visibility !== 'hidden';
const pick = (v) => {
  if (v == null || v === '') return null;
  if (typeof v === 'object') return v.ShortForm || v.Title || v.Text || v.Name || null;
  return String(v);
};
const byXPath = (xp) => document.evaluate(xp, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
const required = (id) => {
  const w = widget(id);
  if (!w) throw new Error('widget ' + id + ' is not initialized');
  return w;
};
try {
  switch (call.op) {
    case 'widgetState': {
      const el = document.getElementById(call.widget);
      if (!el) return { ok: true, data: { exists: false } };
      const w = widget(call.widget);
      if (!w) return { ok: true, data: { exists: true } };
      const items = Array.from(w.dataItems() || []);
      const wrapper = w.wrapper ? w.wrapper[0] : el;
      const disabled = el.disabled || (w.wrapper && (w.wrapper.hasClass('k-state-disabled') || w.wrapper.hasClass('k-disabled')));
      return { ok: true, data: {
        exists: true, initialized: true, count: items.length,
        enabled: !disabled, visible: shown(wrapper),
        value: String(w.value() ?? ''),
        fingerprint: items.map((it) => itemId(it) + ':' + itemText(it)).join('|'),
      } };
    }
    case 'dataItems': {
      const w = required(call.widget);
      return { ok: true, data: Array.from(w.dataItems() || []).map((it) => ({ text: itemText(it), id: itemId(it) })) };
    }
    case 'setValue': {
      const w = required(call.widget);
      w.value(String(call.value));
      return { ok: true, data: String(w.value() ?? '') };
    }
    case 'triggerChange': {
      const w = required(call.widget);
      const el = document.getElementById(call.widget);
      const events = $._data ? $._data(el, 'events') : null;
      const handlers = events && events.change ? events.change : [];
      if (handlers.length) {
        const evt = $.Event('change');
        evt.target = el;
        evt.currentTarget = el;
        evt.sender = w;
        evt.value = w.value();
        handlers.forEach((h) => h.handler.call(el, evt));
        return { ok: true, data: true };
      }
      w.trigger('change');
      return { ok: true, data: false };
    }
    case 'validationErrors': {
      const nodes = document.querySelectorAll('.field-validation-error, .validation-summary-errors');
      return { ok: true, data: Array.from(nodes).map((n) => n.textContent.trim()).filter((t) => t.length) };
    }
    case 'notice': {
      const colors = { info: '#1f6feb', success: '#2da44e', warning: '#bf8700', error: '#cf222e' };
      let box = document.getElementById('socbot-notice');
      if (!box) {
        box = document.createElement('div');
        box.id = 'socbot-notice';
        const host = document.querySelector('#bottomWindowButtons > div');
        (host || document.body).prepend(box);
      }
      box.style.cssText = 'padding:8px 12px;margin:4px 0;font-weight:bold;color:#fff;background:' + (colors[call.level] || colors.info);
      box.textContent = call.text;
      return { ok: true, data: null };
    }
    case 'gridRecords': {
      const g = $ ? $('#' + call.grid).data('kendoGrid') : null;
      if (!g || !g.dataSource) return { ok: true, data: null };
      return { ok: true, data: Array.from(g.dataSource.data()).map((it) => ({
        tag: pick(it.TagNumber), description: pick(it.Description),
        overrideType: pick(it.OverrideType), overrideMethod: pick(it.OverrideMethod),
        comment: pick(it.Comment),
        appliedState: pick(it.OverrideAppliedState), appliedExtra: pick(it.AdditionalValueAppliedState),
        removedState: pick(it.OverrideRemovedState), removedExtra: pick(it.AdditionalValueRemovedState),
        currentState: pick(it.CurrentState),
      })) };
    }
    case 'labelText': {
      const node = byXPath("//label[normalize-space()='" + call.label + "']/following-sibling::text()[1]");
      return { ok: true, data: node ? node.textContent.trim() : null };
    }
    case 'pointSelects': {
      const selects = Array.from(document.querySelectorAll('select#CurrentStateSelect:not([disabled])'));
      let changed = 0;
      if (call.index != null) {
        selects.forEach((s) => {
          if (s.options.length > call.index) {
            s.selectedIndex = call.index;
            s.dispatchEvent(new Event('change', { bubbles: true }));
            changed += 1;
          }
        });
      }
      return { ok: true, data: { total: selects.length, changed } };
    }
    case 'pageState': {
      return { ok: true, data: { readyState: document.readyState, kendo: typeof window.kendo !== 'undefined' && !!$ } };
    }
    case 'submitForm': {
      const el = document.getElementById(call.field);
      const form = el ? el.form : null;
      if (!form) throw new Error('no form owns #' + call.field);
      if (form.requestSubmit) form.requestSubmit(); else form.submit();
      return { ok: true, data: null };
    }
    default:
      return { ok: false, error: 'unknown bridge op: ' + call.op };
  }
} catch (e) {
  return { ok: false, error: String((e && e.message) || e) };
}
"#;

/// One operation understood by [`BRIDGE_SCRIPT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum BridgeCall {
    WidgetState { widget: String },
    DataItems { widget: String },
    SetValue { widget: String, value: String },
    TriggerChange { widget: String },
    ValidationErrors,
    Notice { text: String, level: NoticeLevel },
    GridRecords { grid: String },
    LabelText { label: String },
    /// Counts enabled point-state selects; selects `index` in each when given.
    PointSelects { index: Option<usize> },
    PageState,
    SubmitForm { field: String },
}

impl BridgeCall {
    pub fn op_name(&self) -> &'static str {
        match self {
            BridgeCall::WidgetState { .. } => "widgetState",
            BridgeCall::DataItems { .. } => "dataItems",
            BridgeCall::SetValue { .. } => "setValue",
            BridgeCall::TriggerChange { .. } => "triggerChange",
            BridgeCall::ValidationErrors => "validationErrors",
            BridgeCall::Notice { .. } => "notice",
            BridgeCall::GridRecords { .. } => "gridRecords",
            BridgeCall::LabelText { .. } => "labelText",
            BridgeCall::PointSelects { .. } => "pointSelects",
            BridgeCall::PageState => "pageState",
            BridgeCall::SubmitForm { .. } => "submitForm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Readiness snapshot of a dropdown widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetState {
    pub exists: bool,
    pub initialized: bool,
    pub count: usize,
    pub enabled: bool,
    pub visible: bool,
    pub value: String,
    pub fingerprint: String,
}

impl WidgetState {
    /// Initialized, populated and interactive.
    pub fn is_ready(&self) -> bool {
        self.exists && self.initialized && self.count > 0 && self.enabled && self.visible
    }
}

/// One entry of a widget's data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetItem {
    pub text: String,
    pub id: Option<String>,
}

/// An override row as the details grid reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridRecord {
    pub tag: Option<String>,
    pub description: Option<String>,
    pub override_type: Option<String>,
    pub override_method: Option<String>,
    pub comment: Option<String>,
    pub applied_state: Option<String>,
    pub applied_extra: Option<String>,
    pub removed_state: Option<String>,
    pub removed_extra: Option<String>,
    pub current_state: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointSelectReport {
    pub total: usize,
    pub changed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageState {
    pub ready_state: String,
    pub kendo: bool,
}

impl PageState {
    pub fn is_complete(&self) -> bool {
        self.ready_state == "complete"
    }
}

/// Typed access to [`BRIDGE_SCRIPT`] over any [`Session`].
#[derive(Clone)]
pub struct KendoBridge {
    session: Arc<dyn Session>,
}

impl KendoBridge {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    #[instrument(level = "trace", skip(self), fields(op = call.op_name()))]
    pub async fn call<T: DeserializeOwned>(&self, call: &BridgeCall) -> Result<T, AutomationError> {
        let payload = serde_json::to_value(call)?;
        let raw = self
            .session
            .execute_script(BRIDGE_SCRIPT, vec![payload])
            .await?;
        let data = interpret_envelope(call.op_name(), raw)?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn widget_state(&self, widget: &str) -> Result<WidgetState, AutomationError> {
        self.call(&BridgeCall::WidgetState {
            widget: widget.to_string(),
        })
        .await
    }

    pub async fn data_items(&self, widget: &str) -> Result<Vec<WidgetItem>, AutomationError> {
        self.call(&BridgeCall::DataItems {
            widget: widget.to_string(),
        })
        .await
    }

    /// Writes a value and returns what the widget reports back.
    pub async fn set_value(&self, widget: &str, value: &str) -> Result<String, AutomationError> {
        self.call(&BridgeCall::SetValue {
            widget: widget.to_string(),
            value: value.to_string(),
        })
        .await
    }

    /// Dispatches the widget's change notification. `true` when bound handlers ran
    /// directly, `false` when it fell back to the widget's own trigger.
    pub async fn trigger_change(&self, widget: &str) -> Result<bool, AutomationError> {
        let direct: bool = self
            .call(&BridgeCall::TriggerChange {
                widget: widget.to_string(),
            })
            .await?;
        if !direct {
            debug!(widget, "No bound change handler, used widget trigger");
        }
        Ok(direct)
    }

    pub async fn validation_errors(&self) -> Result<Vec<String>, AutomationError> {
        self.call(&BridgeCall::ValidationErrors).await
    }

    pub async fn notice(&self, level: NoticeLevel, text: &str) -> Result<(), AutomationError> {
        let _: serde_json::Value = self
            .call(&BridgeCall::Notice {
                text: text.to_string(),
                level,
            })
            .await?;
        Ok(())
    }

    /// Rows of a Kendo grid, `None` when the grid is missing or not initialized.
    pub async fn grid_records(&self, grid: &str) -> Result<Option<Vec<GridRecord>>, AutomationError> {
        self.call(&BridgeCall::GridRecords {
            grid: grid.to_string(),
        })
        .await
    }

    /// Text node following a `<label>` with the given caption.
    pub async fn label_text(&self, label: &str) -> Result<Option<String>, AutomationError> {
        self.call(&BridgeCall::LabelText {
            label: label.to_string(),
        })
        .await
    }

    pub async fn point_selects(&self, index: Option<usize>) -> Result<PointSelectReport, AutomationError> {
        self.call(&BridgeCall::PointSelects { index }).await
    }

    pub async fn page_state(&self) -> Result<PageState, AutomationError> {
        self.call(&BridgeCall::PageState).await
    }

    /// Submits the form that owns the given field.
    pub async fn submit_form(&self, field: &str) -> Result<(), AutomationError> {
        let _: serde_json::Value = self
            .call(&BridgeCall::SubmitForm {
                field: field.to_string(),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn calls_serialize_with_op_tag() {
        let call = BridgeCall::SetValue {
            widget: "OverrideTypeId".into(),
            value: "3".into(),
        };
        assert_eq!(
            serde_json::to_value(&call).unwrap(),
            json!({"op": "setValue", "widget": "OverrideTypeId", "value": "3"})
        );
        assert_eq!(
            serde_json::to_value(BridgeCall::PageState).unwrap(),
            json!({"op": "pageState"})
        );
    }

    #[test]
    fn op_names_match_serialized_tags() {
        let calls = vec![
            BridgeCall::WidgetState { widget: "a".into() },
            BridgeCall::DataItems { widget: "a".into() },
            BridgeCall::TriggerChange { widget: "a".into() },
            BridgeCall::ValidationErrors,
            BridgeCall::Notice { text: "t".into(), level: NoticeLevel::Error },
            BridgeCall::GridRecords { grid: "Overrides".into() },
            BridgeCall::LabelText { label: "Состояние".into() },
            BridgeCall::PointSelects { index: Some(1) },
            BridgeCall::SubmitForm { field: "UserName".into() },
        ];
        for call in calls {
            let value = serde_json::to_value(&call).unwrap();
            assert_eq!(value["op"], call.op_name());
            assert!(BRIDGE_SCRIPT.contains(&format!("case '{}'", call.op_name())));
        }
    }

    #[test]
    fn widget_state_readiness() {
        let mut state: WidgetState = serde_json::from_value(json!({"exists": true})).unwrap();
        assert!(!state.is_ready());
        state.initialized = true;
        state.enabled = true;
        state.visible = true;
        assert!(!state.is_ready(), "empty list is not ready");
        state.count = 2;
        assert!(state.is_ready());
    }
}
