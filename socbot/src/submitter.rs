//! Fills and submits the add-override form for one record.

use crate::cascade::{CascadeDriver, CascadeRun};
use crate::kendo::KendoBridge;
use crate::locator::Locator;
use crate::outcome::{tolerate, Failure, OperationResult, Severity};
use crate::record::OverrideRecord;
use crate::resolver::OptionResolver;
use crate::selector::Selector;
use crate::session::{Session, SessionAware};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Element ids of the add-override form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormLayout {
    pub tag: String,
    pub description: String,
    pub comment: String,
    pub type_widget: String,
    pub method_widget: String,
    pub applied_widget: String,
    pub applied_extra: String,
    pub removed_widget: String,
    pub removed_extra: String,
    pub submit_button: String,
}

impl Default for FormLayout {
    fn default() -> Self {
        Self {
            tag: "TagNumber".into(),
            description: "Description".into(),
            comment: "Comment".into(),
            type_widget: "OverrideTypeId".into(),
            method_widget: "OverrideMethodId".into(),
            applied_widget: "OverrideAppliedStateId".into(),
            applied_extra: "AdditionalValueAppliedState".into(),
            removed_widget: "OverrideRemovedStateId".into(),
            removed_extra: "AdditionalValueRemovedState".into(),
            submit_button: "AddOverrideBtn".into(),
        }
    }
}

impl FormLayout {
    fn text_fields(&self) -> [&str; 5] {
        [
            self.tag.as_str(),
            self.description.as_str(),
            self.comment.as_str(),
            self.applied_extra.as_str(),
            self.removed_extra.as_str(),
        ]
    }

    /// Dependent dropdowns, parents before children.
    fn cascade_widgets(&self) -> [&str; 4] {
        [
            self.type_widget.as_str(),
            self.method_widget.as_str(),
            self.applied_widget.as_str(),
            self.removed_widget.as_str(),
        ]
    }
}

/// What was selected for an accepted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub tag: String,
    pub selections: Vec<CascadeRun>,
}

pub struct FormSubmitter {
    session: Arc<dyn Session>,
    bridge: KendoBridge,
    resolver: OptionResolver,
    cascade: CascadeDriver,
    layout: FormLayout,
}

impl SessionAware for FormSubmitter {
    fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }
}

impl FormSubmitter {
    pub fn new(
        session: Arc<dyn Session>,
        resolver: OptionResolver,
        cascade: CascadeDriver,
        layout: FormLayout,
    ) -> Self {
        let bridge = KendoBridge::new(session.clone());
        Self {
            session,
            bridge,
            resolver,
            cascade,
            layout,
        }
    }

    pub fn layout(&self) -> &FormLayout {
        &self.layout
    }

    /// Enters one record and submits it. The submit click happens at most once.
    #[instrument(skip(self, record), fields(tag = %record.tag))]
    pub async fn submit(&self, record: &OverrideRecord) -> OperationResult<SubmissionReceipt> {
        info!("📝 Adding override {}", record.tag);
        let layout = &self.layout;
        let mut selections = Vec::new();

        tolerate(self.clear_form().await)?;

        self.fill_text("fill_tag", &layout.tag, Some(&record.tag)).await?;
        self.fill_text("fill_description", &layout.description, record.description.as_deref())
            .await?;
        self.fill_text("fill_comment", &layout.comment, record.comment.as_deref())
            .await?;

        if let Some(label) = record.override_type.as_deref() {
            if let Err(e) = self.cascade.wait_ready(&layout.type_widget).await {
                return Err(self.classify("select_type", &e, Severity::Fatal).await);
            }
            let method_widget = [layout.method_widget.as_str()];
            let dependents: &[&str] = if record.override_method.is_some() {
                &method_widget
            } else {
                &[]
            };
            let run = self
                .select("select_type", &layout.type_widget, label, dependents)
                .await?;
            selections.push(run);
        } else {
            debug!("No override type, skipping type cascade");
        }

        if let Some(label) = record.override_method.as_deref() {
            if record.override_type.is_none() {
                return Err(Failure::fatal(
                    "select_method",
                    format!("method '{label}' given without an override type"),
                ));
            }
            let mut dependents = Vec::with_capacity(2);
            if record.applied_state.is_some() {
                dependents.push(layout.applied_widget.as_str());
            }
            if record.removed_state.is_some() {
                dependents.push(layout.removed_widget.as_str());
            }
            let run = self
                .select("select_method", &layout.method_widget, label, &dependents)
                .await?;
            selections.push(run);
        } else {
            debug!("No override method, skipping method cascade");
        }

        if let Some(label) = record.applied_state.as_deref() {
            let run = self
                .select("select_applied_state", &layout.applied_widget, label, &[])
                .await?;
            selections.push(run);
        }
        if let Some(extra) = record.applied_extra.as_deref() {
            self.fill_conditional("fill_applied_extra", &layout.applied_extra, extra)
                .await?;
        }

        if let Some(label) = record.removed_state.as_deref() {
            let run = self
                .select("select_removed_state", &layout.removed_widget, label, &[])
                .await?;
            selections.push(run);
        }
        if let Some(extra) = record.removed_extra.as_deref() {
            self.fill_conditional("fill_removed_extra", &layout.removed_extra, extra)
                .await?;
        }

        self.press_submit().await?;
        info!("✅ Added override {}", record.tag);
        Ok(SubmissionReceipt {
            tag: record.tag.clone(),
            selections,
        })
    }

    /// Returns the form to a blank state: dropdowns first, parent before child, then
    /// the text fields. A dropdown that keeps its value is fatal for the record; a
    /// text field that cannot be emptied is recoverable unless the session is gone.
    pub async fn clear_form(&self) -> OperationResult {
        self.reset_widgets().await?;

        let mut problems = Vec::new();
        for field in self.layout.text_fields() {
            if let Err(e) = self.session.clear(&Selector::id(field)).await {
                if e.is_session_lost() {
                    return Err(Failure::from_error("clear_form", &e, Severity::Recoverable));
                }
                debug!(field, "Could not clear field: {e}");
                problems.push(format!("{field}: {e}"));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Failure::recoverable("clear_form", problems.join("; ")))
        }
    }

    async fn reset_widgets(&self) -> OperationResult {
        for widget in self.layout.cascade_widgets() {
            let state = match self.bridge.widget_state(widget).await {
                Ok(state) => state,
                Err(e) => return Err(self.classify("reset_form", &e, Severity::Fatal).await),
            };
            if !state.exists || !state.initialized || state.value.is_empty() {
                continue;
            }
            debug!(widget, previous = %state.value, "Resetting dropdown");
            let echoed = match self.bridge.set_value(widget, "").await {
                Ok(echoed) => echoed,
                Err(e) => return Err(self.classify("reset_form", &e, Severity::Fatal).await),
            };
            if !echoed.is_empty() {
                return Err(Failure::fatal(
                    "reset_form",
                    format!("{widget} still holds '{echoed}' after reset"),
                ));
            }
            if let Err(e) = self.bridge.trigger_change(widget).await {
                return Err(self.classify("reset_form", &e, Severity::Fatal).await);
            }
        }
        Ok(())
    }

    async fn fill_text(&self, step: &str, field: &str, value: Option<&str>) -> OperationResult {
        let Some(value) = value else {
            return Ok(());
        };
        let locator = Locator::new(self.session.clone(), Selector::id(field))
            .set_default_timeout(self.cascade.timing().visibility_timeout)
            .poll_interval(self.cascade.timing().poll_interval);
        match locator.fill(value).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.classify(step, &e, Severity::Fatal).await),
        }
    }

    /// Fills a field that only appears for some state values.
    async fn fill_conditional(&self, step: &str, field: &str, value: &str) -> OperationResult {
        let timing = self.cascade.timing();
        let locator = Locator::new(self.session.clone(), Selector::id(field))
            .poll_interval(timing.poll_interval);
        if let Err(e) = locator.wait_visible(Some(timing.visibility_timeout)).await {
            let failure = self.classify(step, &e, Severity::Fatal).await;
            if failure.is_terminal() {
                return Err(failure);
            }
            return Err(Failure::fatal(
                step,
                format!(
                    "{field} did not become visible within {:?}; the selected state does not take an extra value",
                    timing.visibility_timeout
                ),
            ));
        }
        self.fill_text(step, field, Some(value)).await
    }

    async fn select(
        &self,
        step: &str,
        widget: &str,
        label: &str,
        dependents: &[&str],
    ) -> OperationResult<CascadeRun> {
        let option = self
            .resolver
            .resolve(widget, label)
            .await
            .map_err(|e| e.into_failure(step))?;
        self.cascade
            .apply(widget, &option, dependents)
            .await
            .map_err(|f| Failure::new(step, format!("{} ({})", f.message, f.step), f.severity))
    }

    async fn press_submit(&self) -> OperationResult {
        let timing = self.cascade.timing();
        let button = Locator::new(self.session.clone(), Selector::id(&self.layout.submit_button))
            .set_default_timeout(timing.visibility_timeout)
            .poll_interval(timing.poll_interval);
        if let Err(e) = button.click().await {
            return Err(self.classify("submit", &e, Severity::Fatal).await);
        }
        tokio::time::sleep(timing.post_submit).await;

        match self.bridge.validation_errors().await {
            Ok(errors) if errors.is_empty() => Ok(()),
            Ok(errors) => {
                warn!("⚠️ Server rejected the override: {}", errors.join("; "));
                Err(Failure::fatal(
                    "validate",
                    format!("validation failed: {}", errors.join("; ")),
                ))
            }
            Err(e) => {
                let failure = self.classify("validate", &e, Severity::Fatal).await;
                Err(Failure::new(
                    "validate",
                    format!("submitted, but the validation state could not be read: {}", failure.message),
                    failure.severity,
                ))
            }
        }
    }
}
