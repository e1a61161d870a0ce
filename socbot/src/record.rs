use crate::kendo::GridRecord;
use serde::{Deserialize, Serialize};

/// One override as it is entered on the add-override form.
///
/// Blank optional values are `None`, never empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub tag: String,
    pub description: Option<String>,
    pub override_type: Option<String>,
    pub override_method: Option<String>,
    pub comment: Option<String>,
    pub applied_state: Option<String>,
    pub applied_extra: Option<String>,
    pub removed_state: Option<String>,
    pub removed_extra: Option<String>,
}

/// Trims a cell value, mapping blanks to `None`.
pub fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl OverrideRecord {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().trim().to_string(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, value: &str) -> Self {
        self.description = normalize(Some(value));
        self
    }

    pub fn with_type(mut self, value: &str) -> Self {
        self.override_type = normalize(Some(value));
        self
    }

    pub fn with_method(mut self, value: &str) -> Self {
        self.override_method = normalize(Some(value));
        self
    }

    pub fn with_comment(mut self, value: &str) -> Self {
        self.comment = normalize(Some(value));
        self
    }

    pub fn with_applied(mut self, state: &str, extra: Option<&str>) -> Self {
        self.applied_state = normalize(Some(state));
        self.applied_extra = normalize(extra);
        self
    }

    pub fn with_removed(mut self, state: &str, extra: Option<&str>) -> Self {
        self.removed_state = normalize(Some(state));
        self.removed_extra = normalize(extra);
        self
    }

    /// Cell values in workbook column order.
    pub fn columns(&self) -> [Option<&str>; 9] {
        [
            Some(self.tag.as_str()),
            self.description.as_deref(),
            self.override_type.as_deref(),
            self.override_method.as_deref(),
            self.comment.as_deref(),
            self.applied_state.as_deref(),
            self.applied_extra.as_deref(),
            self.removed_state.as_deref(),
            self.removed_extra.as_deref(),
        ]
    }
}

impl From<&GridRecord> for OverrideRecord {
    fn from(row: &GridRecord) -> Self {
        Self {
            tag: row.tag.as_deref().map(str::trim).unwrap_or_default().to_string(),
            description: normalize(row.description.as_deref()),
            override_type: normalize(row.override_type.as_deref()),
            override_method: normalize(row.override_method.as_deref()),
            comment: normalize(row.comment.as_deref()),
            applied_state: normalize(row.applied_state.as_deref()),
            applied_extra: normalize(row.applied_extra.as_deref()),
            removed_state: normalize(row.removed_state.as_deref()),
            removed_extra: normalize(row.removed_extra.as_deref()),
        }
    }
}
