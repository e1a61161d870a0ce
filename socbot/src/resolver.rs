//! Maps human-entered option labels to the ids the live widgets currently offer.

use crate::errors::AutomationError;
use crate::kendo::{KendoBridge, WidgetItem};
use crate::outcome::{Failure, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// A selectable entry of a dropdown, valid only for the page state it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeOption {
    pub label: String,
    pub id: String,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Item '{label}' not found in {widget}. Available: [{}]", available.join(", "))]
    NotFound {
        widget: String,
        label: String,
        available: Vec<String>,
    },

    #[error("Blank label given for {0}")]
    EmptyLabel(String),

    #[error(transparent)]
    Automation(#[from] AutomationError),
}

impl ResolveError {
    /// An unknown label aborts the record; a lost session ends everything.
    pub fn into_failure(self, step: &str) -> Failure {
        match self {
            ResolveError::Automation(e) => Failure::from_error(step, &e, Severity::Fatal),
            other => Failure::fatal(step, other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackEntry {
    pub label: String,
    pub id: i64,
}

/// Static label tables per widget, consulted only when the live list is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionFallbacks(BTreeMap<String, Vec<FallbackEntry>>);

impl Default for OptionFallbacks {
    fn default() -> Self {
        let types = [
            ("Байпас", 1),
            ("Блокировка", 2),
            ("Форсировка", 3),
            ("Логики", 4),
            ("Сигнализации", 5),
        ]
        .into_iter()
        .map(|(label, id)| FallbackEntry {
            label: label.to_string(),
            id,
        })
        .collect();
        let mut tables = BTreeMap::new();
        tables.insert("OverrideTypeId".to_string(), types);
        Self(tables)
    }
}

impl OptionFallbacks {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, widget: &str, entries: Vec<FallbackEntry>) {
        self.0.insert(widget.to_string(), entries);
    }

    pub fn lookup(&self, widget: &str, label: &str) -> Option<CascadeOption> {
        let items: Vec<WidgetItem> = self
            .0
            .get(widget)?
            .iter()
            .map(|e| WidgetItem {
                text: e.label.clone(),
                id: Some(e.id.to_string()),
            })
            .collect();
        match_label(label, &items)
    }
}

/// Exact case-insensitive match first, otherwise the first item containing the label.
pub fn match_label(label: &str, items: &[WidgetItem]) -> Option<CascadeOption> {
    let wanted = label.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    let candidates = || {
        items
            .iter()
            .filter_map(|it| it.id.as_ref().map(|id| (it.text.trim(), id)))
    };
    candidates()
        .find(|(text, _)| text.to_lowercase() == wanted)
        .or_else(|| candidates().find(|(text, _)| text.to_lowercase().contains(&wanted)))
        .map(|(text, id)| CascadeOption {
            label: text.to_string(),
            id: id.clone(),
        })
}

#[derive(Clone)]
pub struct OptionResolver {
    bridge: KendoBridge,
    fallbacks: OptionFallbacks,
}

impl OptionResolver {
    pub fn new(bridge: KendoBridge, fallbacks: OptionFallbacks) -> Self {
        Self { bridge, fallbacks }
    }

    /// Re-reads the widget's options on every call; nothing is cached.
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, widget: &str, label: &str) -> Result<CascadeOption, ResolveError> {
        if label.trim().is_empty() {
            return Err(ResolveError::EmptyLabel(widget.to_string()));
        }

        let items = match self.bridge.data_items(widget).await {
            Ok(items) => items,
            Err(e) if e.is_session_lost() => return Err(e.into()),
            Err(e) => {
                warn!(widget, "⚠️ Could not read live options: {e}");
                return self.fallback(widget, label).ok_or(ResolveError::Automation(e));
            }
        };

        if items.iter().all(|it| it.id.is_none()) {
            debug!(widget, "Live option list is empty, trying static table");
            if let Some(option) = self.fallback(widget, label) {
                return Ok(option);
            }
        }

        match match_label(label, &items) {
            Some(option) => {
                debug!(widget, label, id = %option.id, "Resolved option");
                Ok(option)
            }
            None => Err(ResolveError::NotFound {
                widget: widget.to_string(),
                label: label.trim().to_string(),
                available: items.iter().map(|it| it.text.clone()).collect(),
            }),
        }
    }

    fn fallback(&self, widget: &str, label: &str) -> Option<CascadeOption> {
        let option = self.fallbacks.lookup(widget, label)?;
        warn!(widget, label, id = %option.id, "Using static option table");
        Some(option)
    }
}
