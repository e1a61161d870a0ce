//! Driving dependent dropdowns: set a parent, fire its change handler, and wait
//! until every dependent widget has reloaded its options for the new value.
//!
//! A run moves `Idle → ParentSet → WaitingForChild → ChildReady`, or ends in
//! `Failed`. Every link (Type → Method, Method → states) is its own run.

use crate::errors::AutomationError;
use crate::kendo::{KendoBridge, WidgetState};
use crate::locator::wait_until;
use crate::outcome::{Failure, OperationResult, Severity};
use crate::resolver::CascadeOption;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CascadeState {
    Idle,
    ParentSet,
    WaitingForChild,
    ChildReady,
    Failed,
}

impl CascadeState {
    fn can_move_to(self, next: CascadeState) -> bool {
        use CascadeState::*;
        matches!(
            (self, next),
            (Idle, ParentSet)
                | (ParentSet, WaitingForChild)
                | (WaitingForChild, ChildReady)
                | (Idle | ParentSet | WaitingForChild, Failed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeTiming {
    /// Upper bound for dependent widgets to become ready after a parent change.
    pub widget_timeout: Duration,
    pub poll_interval: Duration,
    /// Minimum time before an unchanged option list is trusted as the new one.
    pub settle: Duration,
    /// How long conditionally-shown fields get to appear.
    pub visibility_timeout: Duration,
    /// Pause between clicking submit and reading validation messages.
    pub post_submit: Duration,
}

impl Default for CascadeTiming {
    fn default() -> Self {
        Self {
            widget_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            settle: Duration::from_millis(800),
            visibility_timeout: Duration::from_secs(5),
            post_submit: Duration::from_secs(1),
        }
    }
}

/// Trace of one cascade run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeRun {
    pub parent: String,
    pub option: CascadeOption,
    pub history: Vec<CascadeState>,
}

impl CascadeRun {
    fn new(parent: &str, option: &CascadeOption) -> Self {
        Self {
            parent: parent.to_string(),
            option: option.clone(),
            history: vec![CascadeState::Idle],
        }
    }

    pub fn state(&self) -> CascadeState {
        self.history
            .last()
            .copied()
            .unwrap_or(CascadeState::Idle)
    }

    fn advance(&mut self, next: CascadeState) {
        let current = self.state();
        if !current.can_move_to(next) {
            warn!(parent = %self.parent, ?current, ?next, "Unexpected cascade transition");
        }
        debug!(parent = %self.parent, ?current, ?next, "Cascade transition");
        self.history.push(next);
    }
}

#[derive(Clone)]
pub struct CascadeDriver {
    bridge: KendoBridge,
    timing: CascadeTiming,
}

impl CascadeDriver {
    pub fn new(bridge: KendoBridge, timing: CascadeTiming) -> Self {
        Self { bridge, timing }
    }

    pub fn timing(&self) -> &CascadeTiming {
        &self.timing
    }

    /// Waits until a widget is initialized, populated and interactive.
    pub async fn wait_ready(&self, widget: &str) -> Result<WidgetState, AutomationError> {
        let what = format!("{widget} to be ready");
        wait_until(&what, self.timing.widget_timeout, self.timing.poll_interval, || async move {
            Ok(self.bridge.widget_state(widget).await?.is_ready())
        })
        .await?;
        self.bridge.widget_state(widget).await
    }

    /// Selects `option` in `parent` and waits for every widget in `dependents`.
    ///
    /// With no dependents this is a plain selection that still goes through the
    /// change handler, which is what shows or hides the state-specific fields.
    #[instrument(skip(self, option), fields(option = %option.label))]
    pub async fn apply(
        &self,
        parent: &str,
        option: &CascadeOption,
        dependents: &[&str],
    ) -> OperationResult<CascadeRun> {
        let step = format!("cascade:{parent}");
        let mut run = CascadeRun::new(parent, option);

        let before = match self.bridge.widget_state(parent).await {
            Ok(state) => state,
            Err(e) => {
                run.advance(CascadeState::Failed);
                return Err(Failure::from_error(&step, &e, Severity::Fatal));
            }
        };
        let changed = before.value != option.id;

        let mut fingerprints = Vec::with_capacity(dependents.len());
        for child in dependents {
            match self.bridge.widget_state(child).await {
                Ok(state) => fingerprints.push(Some(state.fingerprint)),
                Err(e) if e.is_session_lost() => {
                    run.advance(CascadeState::Failed);
                    return Err(Failure::from_error(&step, &e, Severity::Fatal));
                }
                Err(_) => fingerprints.push(None),
            }
        }

        let echoed = match self.bridge.set_value(parent, &option.id).await {
            Ok(echoed) => echoed,
            Err(e) => {
                run.advance(CascadeState::Failed);
                return Err(Failure::from_error(&step, &e, Severity::Fatal));
            }
        };
        if echoed != option.id {
            run.advance(CascadeState::Failed);
            return Err(Failure::fatal(
                &step,
                format!(
                    "{parent} did not accept '{}' (id {}), it reports '{echoed}'",
                    option.label, option.id
                ),
            ));
        }
        run.advance(CascadeState::ParentSet);

        if let Err(e) = self.bridge.trigger_change(parent).await {
            run.advance(CascadeState::Failed);
            return Err(Failure::from_error(&step, &e, Severity::Fatal));
        }
        run.advance(CascadeState::WaitingForChild);

        let started = Instant::now();
        let deadline = started + self.timing.widget_timeout;
        for (child, previous) in dependents.iter().zip(fingerprints) {
            let what = format!("{child} to reload after {parent} changed");
            let remaining = deadline.saturating_duration_since(Instant::now());
            let previous = previous.as_deref();
            let waited = wait_until(&what, remaining, self.timing.poll_interval, || async move {
                let state = self.bridge.widget_state(child).await?;
                if !state.is_ready() {
                    return Ok(false);
                }
                let unchanged = previous == Some(state.fingerprint.as_str());
                Ok(!(changed && unchanged && started.elapsed() < self.timing.settle))
            })
            .await;

            if let Err(e) = waited {
                run.advance(CascadeState::Failed);
                let failure = Failure::from_error(&step, &e, Severity::Fatal);
                return Err(if failure.is_terminal() {
                    failure
                } else {
                    Failure::fatal(
                        &step,
                        format!(
                            "{child} did not populate within {:?} after {parent} was set to '{}'",
                            self.timing.widget_timeout, option.label
                        ),
                    )
                });
            }
        }
        run.advance(CascadeState::ChildReady);

        if dependents.is_empty() {
            debug!(parent, "Selected '{}'", option.label);
        } else {
            info!(
                parent,
                dependents = ?dependents,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "✅ Cascade complete"
            );
        }
        Ok(run)
    }
}
