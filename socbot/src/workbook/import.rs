use super::{SheetMetadata, WorkbookError, COLUMNS, FIRST_DATA_ROW};
use crate::record::{normalize, OverrideRecord};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{debug, info};

/// Records and metadata read from the first sheet of a workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedWorkbook {
    pub sheet: String,
    pub metadata: SheetMetadata,
    pub records: Vec<OverrideRecord>,
    /// One-based row numbers skipped for having no tag.
    pub skipped_rows: Vec<u32>,
}

fn cell_string(cell: Option<&Data>) -> Option<String> {
    match cell? {
        Data::Empty => None,
        Data::String(s) => normalize(Some(s.as_str())),
        Data::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => Some(format!("{}", *v as i64)),
        Data::Float(v) => Some(format!("{v}")),
        Data::Int(v) => Some(format!("{v}")),
        Data::Bool(v) => Some(v.to_string()),
        other => normalize(Some(other.to_string().as_str())),
    }
}

pub fn load_overrides(path: impl AsRef<Path>) -> Result<LoadedWorkbook, WorkbookError> {
    let path = path.as_ref();
    let path_text = path.display().to_string();
    info!("📂 Loading overrides from {}", path_text);

    let mut workbook = open_workbook_auto(path).map_err(|e| WorkbookError::Open {
        path: path_text.clone(),
        message: e.to_string(),
    })?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| WorkbookError::NoSheets(path_text.clone()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| WorkbookError::Sheet {
            sheet: sheet.clone(),
            message: e.to_string(),
        })?;

    let mut loaded = LoadedWorkbook {
        sheet: sheet.clone(),
        ..Default::default()
    };

    for row in 0..FIRST_DATA_ROW.saturating_sub(2) {
        if let Some(line) = cell_string(range.get_value((row, 0))) {
            loaded.metadata.absorb(&line);
        }
    }

    let last_row = range.end().map(|(row, _)| row).unwrap_or(0);
    for row in FIRST_DATA_ROW..=last_row {
        let cells: Vec<Option<String>> = (0..COLUMNS.len() as u32)
            .map(|col| cell_string(range.get_value((row, col))))
            .collect();
        let Some(tag) = cells[0].clone() else {
            if cells.iter().any(Option::is_some) {
                debug!(row = row + 1, "Row without tag skipped");
                loaded.skipped_rows.push(row + 1);
            }
            continue;
        };
        let mut cells = cells.into_iter().skip(1);
        let mut next = || cells.next().flatten();
        loaded.records.push(OverrideRecord {
            tag,
            description: next(),
            override_type: next(),
            override_method: next(),
            comment: next(),
            applied_state: next(),
            applied_extra: next(),
            removed_state: next(),
            removed_extra: next(),
        });
    }

    info!(
        sheet = %sheet,
        soc_id = ?loaded.metadata.soc_id,
        "✅ Loaded {} overrides",
        loaded.records.len()
    );
    Ok(loaded)
}
