use chrono::NaiveDate;
use rust_xlsxwriter::Workbook;
use socbot::workbook::{
    load_overrides, write_overrides, ExportRow, ExportSheet, COLUMNS, FIRST_DATA_ROW, HEADER_ROW,
};
use socbot::{OverrideRecord, WorkbookError};

fn exported_at() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
        .and_then(|d| d.and_hms_opt(8, 30, 0))
        .unwrap()
}

#[test]
fn exported_workbook_loads_back_as_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("SOC_1234567.xlsx");
    let rows = vec![
        ExportRow {
            record: OverrideRecord::new("PV-101")
                .with_description("Клапан")
                .with_type("Форсировка")
                .with_method("Программная")
                .with_applied("Значение", Some("12.5"))
                .with_removed("Нормальное", None),
            current_state: Some("Установлено".into()),
        },
        ExportRow {
            record: OverrideRecord::new("HS-7").with_type("Байпас"),
            current_state: None,
        },
    ];
    let sheet = ExportSheet {
        soc_id: "1234567".into(),
        exported_at: exported_at(),
        rows: rows.clone(),
    };
    write_overrides(&path, &sheet).unwrap();

    let loaded = load_overrides(&path).unwrap();
    assert_eq!(loaded.sheet, "SOC_1234567");
    assert_eq!(loaded.metadata.soc_id.as_deref(), Some("1234567"));
    assert_eq!(loaded.metadata.exported_at.as_deref(), Some("2026-10-19 08:30:00"));
    assert_eq!(loaded.metadata.total, Some(2));
    let records: Vec<OverrideRecord> = rows.into_iter().map(|r| r.record).collect();
    assert_eq!(loaded.records, records);
    assert!(loaded.skipped_rows.is_empty());
}

#[test]
fn hand_made_sheet_with_numbers_and_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(1, 0, "SOC ID: 7654321").unwrap();
    for (col, header) in COLUMNS.iter().enumerate() {
        sheet.write_string(HEADER_ROW, col as u16, *header).unwrap();
    }
    // numeric tag and extra value
    sheet.write_number(FIRST_DATA_ROW, 0, 4711.0).unwrap();
    sheet.write_string(FIRST_DATA_ROW, 2, "Байпас").unwrap();
    sheet.write_number(FIRST_DATA_ROW, 6, 0.5).unwrap();
    // empty row, then a row with data but no tag
    sheet.write_string(FIRST_DATA_ROW + 2, 1, "осиротевшее описание").unwrap();
    sheet.write_string(FIRST_DATA_ROW + 3, 0, "  FT-9  ").unwrap();
    sheet.write_string(FIRST_DATA_ROW + 3, 4, "   ").unwrap();
    workbook.save(&path).unwrap();

    let loaded = load_overrides(&path).unwrap();
    assert_eq!(loaded.metadata.soc_id.as_deref(), Some("7654321"));
    assert_eq!(loaded.records.len(), 2);
    assert_eq!(loaded.records[0].tag, "4711");
    assert_eq!(loaded.records[0].override_type.as_deref(), Some("Байпас"));
    assert_eq!(loaded.records[0].applied_extra.as_deref(), Some("0.5"));
    assert_eq!(loaded.records[1].tag, "FT-9");
    assert_eq!(loaded.records[1].comment, None);
    assert_eq!(loaded.skipped_rows, vec![FIRST_DATA_ROW + 3]);
}

#[test]
fn header_only_sheet_has_no_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in COLUMNS.iter().enumerate() {
        sheet.write_string(HEADER_ROW, col as u16, *header).unwrap();
    }
    workbook.save(&path).unwrap();

    let loaded = load_overrides(&path).unwrap();
    assert!(loaded.records.is_empty());
    assert_eq!(loaded.metadata.soc_id, None);
}

#[test]
fn missing_file_is_an_open_error() {
    let err = load_overrides("/no/such/dir/overrides.xlsx").unwrap_err();
    assert!(matches!(err, WorkbookError::Open { .. }));
}
