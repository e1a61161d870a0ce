use super::{
    WorkbookError, COLUMNS, CURRENT_STATE_COLUMN, DATE_FORMAT, EXPORT_DATE_PREFIX, FIRST_DATA_ROW,
    HEADER_ROW, MAX_COLUMN_WIDTH, SOC_ID_PREFIX, TITLE, TOTAL_PREFIX,
};
use crate::record::OverrideRecord;
use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportRow {
    pub record: OverrideRecord,
    pub current_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSheet {
    pub soc_id: String,
    pub exported_at: NaiveDateTime,
    pub rows: Vec<ExportRow>,
}

/// `SOC_<id>_overrides_<yyyymmdd_hhmmss>.xlsx`
pub fn default_export_name(soc_id: &str, at: NaiveDateTime) -> String {
    format!("SOC_{soc_id}_overrides_{}.xlsx", at.format("%Y%m%d_%H%M%S"))
}

pub fn write_overrides(path: impl AsRef<Path>, sheet: &ExportSheet) -> Result<(), WorkbookError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(format!("SOC_{}", sheet.soc_id))?;

    worksheet.write_string_with_format(0, 0, TITLE, &bold)?;
    worksheet.write_string(1, 0, format!("{SOC_ID_PREFIX} {}", sheet.soc_id))?;
    worksheet.write_string(
        2,
        0,
        format!("{EXPORT_DATE_PREFIX} {}", sheet.exported_at.format(DATE_FORMAT)),
    )?;
    worksheet.write_string(3, 0, format!("{TOTAL_PREFIX} {}", sheet.rows.len()))?;

    let headers: Vec<&str> = COLUMNS
        .iter()
        .copied()
        .chain(std::iter::once(CURRENT_STATE_COLUMN))
        .collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(HEADER_ROW, col as u16, *header, &bold)?;
    }

    for (i, row) in sheet.rows.iter().enumerate() {
        let r = FIRST_DATA_ROW + i as u32;
        let values = row
            .record
            .columns()
            .into_iter()
            .chain(std::iter::once(row.current_state.as_deref()));
        for (col, value) in values.enumerate() {
            let Some(value) = value else {
                continue;
            };
            worksheet.write_string(r, col as u16, value)?;
            widths[col] = widths[col].max(value.chars().count());
        }
    }

    for (col, width) in widths.iter().enumerate() {
        let width = (width + 2).min(MAX_COLUMN_WIDTH);
        worksheet.set_column_width(col as u16, width as f64)?;
    }

    workbook.save(path)?;
    info!(
        "✅ Wrote {} overrides to {}",
        sheet.rows.len(),
        path.display()
    );
    Ok(())
}
