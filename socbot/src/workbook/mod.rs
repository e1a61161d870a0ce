//! Override workbooks: the sheet layout shared by import and export.
//!
//! ```text
//! row 1   SOC Overrides Export
//! row 2   SOC ID: <id>
//! row 3   Export Date: <yyyy-mm-dd hh:mm:ss>
//! row 4   Total Overrides: <n>
//! row 6   header
//! row 7+  one override per row, columns A..I
//! ```

mod export;
mod import;

pub use export::{default_export_name, write_overrides, ExportRow, ExportSheet};
pub use import::{load_overrides, LoadedWorkbook};

use thiserror::Error;

pub const TITLE: &str = "SOC Overrides Export";
pub const SOC_ID_PREFIX: &str = "SOC ID:";
pub const EXPORT_DATE_PREFIX: &str = "Export Date:";
pub const TOTAL_PREFIX: &str = "Total Overrides:";
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Zero-based row of the column header.
pub const HEADER_ROW: u32 = 5;
/// Zero-based row of the first override.
pub const FIRST_DATA_ROW: u32 = 6;

pub const COLUMNS: [&str; 9] = [
    "TagNumber",
    "Description",
    "OverrideType",
    "OverrideMethod",
    "Comment",
    "AppliedState",
    "AdditionalValueAppliedState",
    "RemovedState",
    "AdditionalValueRemovedState",
];

/// Extra column written on export only.
pub const CURRENT_STATE_COLUMN: &str = "CurrentState";

pub const MAX_COLUMN_WIDTH: usize = 50;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("Failed to open workbook {path}: {message}")]
    Open { path: String, message: String },

    #[error("Workbook {0} has no worksheets")]
    NoSheets(String),

    #[error("Failed to read worksheet '{sheet}': {message}")]
    Sheet { sheet: String, message: String },

    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Values stamped into the first rows of a sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetMetadata {
    pub soc_id: Option<String>,
    pub exported_at: Option<String>,
    pub total: Option<usize>,
}

impl SheetMetadata {
    /// Reads a `Prefix: value` metadata line into the matching field.
    fn absorb(&mut self, line: &str) {
        let line = line.trim();
        let value = |prefix: &str| {
            line.strip_prefix(prefix)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        if let Some(v) = value(SOC_ID_PREFIX) {
            self.soc_id = Some(v);
        } else if let Some(v) = value(EXPORT_DATE_PREFIX) {
            self.exported_at = Some(v);
        } else if let Some(v) = value(TOTAL_PREFIX) {
            self.total = v.parse().ok();
        }
    }
}
