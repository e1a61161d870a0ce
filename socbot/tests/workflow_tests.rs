mod common;

use chrono::Local;
use common::{config, init_tracing, override_form};
use socbot::kendo::{GridRecord, NoticeLevel};
use socbot::session::{MockDropDown, MockElement, MockSession, PageEffect};
use socbot::workbook::{load_overrides, write_overrides, ExportRow, ExportSheet};
use socbot::workflow::{ControlWorkflow, ExportWorkflow, ImportWorkflow};
use socbot::{OverrideRecord, Selector, Severity};
use std::sync::Arc;

const HOME_TITLE: &str = "СНД - Домашняя страница";

fn with_login_form(mock: &MockSession) {
    mock.add_element(Selector::id("UserName"), MockElement::input());
    mock.add_element(Selector::id("Password"), MockElement::input());
}

fn input_workbook(dir: &std::path::Path, records: Vec<OverrideRecord>) -> std::path::PathBuf {
    let path = dir.join("input.xlsx");
    let sheet = ExportSheet {
        soc_id: "1234567".into(),
        exported_at: Local::now().naive_local(),
        rows: records
            .into_iter()
            .map(|record| ExportRow {
                record,
                current_state: None,
            })
            .collect(),
    };
    write_overrides(&path, &sheet).unwrap();
    path
}

#[tokio::test(start_paused = true)]
async fn import_enters_workbook_into_the_soc() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let input = input_workbook(
        dir.path(),
        vec![
            OverrideRecord::new("PV-101").with_type("Байпас"),
            OverrideRecord::new("PV-102")
                .with_type("Форсировка")
                .with_method("Программная")
                .with_applied("Включено", None),
            OverrideRecord::new("PV-103").with_description("только описание"),
        ],
    );
    let mock = override_form();
    with_login_form(&mock);
    mock.title_after_reads(3, HOME_TITLE);

    let report = ImportWorkflow::new(mock.clone(), config())
        .run(&input, None)
        .await
        .unwrap();

    assert_eq!(report.soc_id, "1234567");
    assert_eq!(report.summary.succeeded, 3);
    assert!(report.summary.outcome().is_ok());
    assert_eq!(
        mock.navigations(),
        vec![
            "http://portal.test/".to_string(),
            "http://portal.test/Soc/EditOverrides/1234567".to_string()
        ]
    );
    let notices = mock.notices();
    assert!(notices
        .iter()
        .any(|(level, text)| *level == NoticeLevel::Success && text.contains("3 added")));
}

#[tokio::test(start_paused = true)]
async fn import_reports_failed_records_on_the_page() {
    let dir = tempfile::tempdir().unwrap();
    let input = input_workbook(
        dir.path(),
        vec![
            OverrideRecord::new("PV-101").with_type("Перемычка"),
            OverrideRecord::new("PV-102").with_type("Байпас"),
        ],
    );
    let mock = override_form();
    with_login_form(&mock);
    mock.title_after_reads(1, HOME_TITLE);

    let report = ImportWorkflow::new(mock.clone(), config())
        .run(&input, Some("01234567"))
        .await
        .unwrap();
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.succeeded, 1);
    assert!(mock
        .notices()
        .iter()
        .any(|(level, text)| *level == NoticeLevel::Error && text.contains("PV-101")));
}

#[tokio::test(start_paused = true)]
async fn import_keeps_the_summary_when_the_browser_is_lost() {
    let dir = tempfile::tempdir().unwrap();
    let input = input_workbook(
        dir.path(),
        vec![
            OverrideRecord::new("PV-101").with_type("Байпас"),
            OverrideRecord::new("PV-102").with_type("Форсировка"),
            OverrideRecord::new("PV-103").with_type("Байпас"),
            OverrideRecord::new("PV-104"),
        ],
    );
    let mock = override_form();
    with_login_form(&mock);
    mock.close_after_submissions(2);

    let report = ImportWorkflow::new(mock.clone(), config())
        .run(&input, None)
        .await
        .unwrap();

    let summary = &report.summary;
    assert_eq!(summary.total, 4);
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.remaining(), 2);
    assert!(summary.stopped_early());
    assert_eq!(summary.outcome().unwrap_err().severity, Severity::Terminal);
    assert!(mock
        .notices()
        .iter()
        .all(|(level, _)| *level != NoticeLevel::Success));
}

#[tokio::test(start_paused = true)]
async fn import_into_locked_soc_submits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = input_workbook(dir.path(), vec![OverrideRecord::new("PV-101")]);
    let mock = override_form();
    with_login_form(&mock);
    mock.route(
        "Soc/EditOverrides",
        vec![PageEffect::AddElement {
            selector: Selector::xpath("//li[contains(text(), 'Locked')]"),
            element: MockElement::label("li", "Locked by another user"),
        }],
    );

    let failure = ImportWorkflow::new(mock.clone(), config())
        .run(&input, None)
        .await
        .unwrap_err();
    assert_eq!(failure.severity, Severity::Fatal);
    assert!(mock.submissions().is_empty());
    assert!(mock
        .notices()
        .iter()
        .any(|(level, _)| *level == NoticeLevel::Error));
}

#[tokio::test(start_paused = true)]
async fn import_rejects_a_bad_soc_id_before_opening_anything() {
    let dir = tempfile::tempdir().unwrap();
    let input = input_workbook(dir.path(), vec![OverrideRecord::new("PV-101")]);
    let mock = override_form();
    let failure = ImportWorkflow::new(mock.clone(), config())
        .run(&input, Some("12ab"))
        .await
        .unwrap_err();
    assert_eq!(failure.step, "soc_id");
    assert!(mock.navigations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn export_writes_grid_rows_to_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("export.xlsx");
    let mock = Arc::new(MockSession::new());
    with_login_form(&mock);
    mock.set_grid(
        "Overrides",
        vec![
            GridRecord {
                tag: Some("PV-101".into()),
                override_type: Some("Байпас".into()),
                current_state: Some("Установлено".into()),
                ..Default::default()
            },
            GridRecord {
                tag: Some("PV-102".into()),
                override_type: Some("Форсировка".into()),
                override_method: Some("Программная".into()),
                applied_state: Some("Включено".into()),
                ..Default::default()
            },
        ],
    );

    let report = ExportWorkflow::new(mock.clone(), config())
        .run("01234567", Some(&output))
        .await
        .unwrap();
    assert_eq!(report.soc_id, "1234567");
    assert_eq!(report.rows, 2);
    assert_eq!(report.path.as_deref(), Some(output.as_path()));
    assert!(mock
        .navigations()
        .contains(&"http://portal.test/Soc/Details/1234567".to_string()));

    let loaded = load_overrides(&output).unwrap();
    assert_eq!(loaded.metadata.soc_id.as_deref(), Some("1234567"));
    assert_eq!(loaded.records.len(), 2);
    assert_eq!(loaded.records[1].override_method.as_deref(), Some("Программная"));
}

#[tokio::test(start_paused = true)]
async fn export_without_grid_data_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("export.xlsx");
    let mock = Arc::new(MockSession::new());
    with_login_form(&mock);

    let report = ExportWorkflow::new(mock.clone(), config())
        .run("1234567", Some(&output))
        .await
        .unwrap();
    assert_eq!(report.rows, 0);
    assert_eq!(report.path, None);
    assert!(!output.exists());
    assert!(mock
        .notices()
        .iter()
        .any(|(level, _)| *level == NoticeLevel::Warning));
}

fn control_portal(status: &str) -> Arc<MockSession> {
    let mock = Arc::new(MockSession::new());
    with_login_form(&mock);
    mock.set_label("Состояние", status);
    mock.add_dropdown(
        "CurrentRoleName",
        MockDropDown::with_items(&[
            ("Исполняющий форсирование", "OAC"),
            ("Проверяющий форсирование", "OAV"),
        ]),
    );
    mock.add_element(Selector::id("ConfirmHeader"), MockElement::button("OK"));
    mock.add_dropdown(
        "ActionsList",
        MockDropDown::with_items(&[(
            "Принять для установки",
            "/Soc/TriggerChangeWorkflowState/1234567?trigger=AcceptForApply",
        )]),
    );
    mock.add_element(Selector::id("ApplyActionButton"), MockElement::button("Применить"));
    mock.on_click(
        Selector::id("ApplyActionButton"),
        vec![PageEffect::SetLabel {
            label: "Состояние".into(),
            text: "Принято для установки".into(),
        }],
    );
    mock.set_point_selects(3);
    mock.title_after_reads(2, HOME_TITLE);
    mock
}

#[tokio::test(start_paused = true)]
async fn control_accepts_approved_soc_and_updates_points_per_role() {
    let mock = control_portal("Одобрено для установки");
    let report = ControlWorkflow::new(mock.clone(), config())
        .run("1234567")
        .await
        .unwrap();

    assert!(report.accepted);
    assert_eq!(report.final_status, "Принято для установки");
    assert_eq!(report.roles.len(), 2);
    assert!(report
        .roles
        .iter()
        .all(|r| r.points.map(|p| p.changed) == Some(3)));
    assert_eq!(mock.points_changed(), 6);
    assert_eq!(mock.dropdown_value("CurrentRoleName").as_deref(), Some("OAV"));
    assert!(mock
        .navigations()
        .contains(&"http://portal.test/Soc/UpdateOverride/1234567".to_string()));
}

#[tokio::test(start_paused = true)]
async fn control_skips_acceptance_for_good_status() {
    let mock = control_portal("Установлено, не подтверждено");
    let report = ControlWorkflow::new(mock.clone(), config())
        .run("1234567")
        .await
        .unwrap();
    assert!(!report.accepted);
    assert_eq!(mock.dropdown_value("ActionsList").as_deref(), Some(""));
}

#[tokio::test(start_paused = true)]
async fn control_refuses_soc_in_wrong_status() {
    let mock = control_portal("Черновик");
    let failure = ControlWorkflow::new(mock.clone(), config())
        .run("1234567")
        .await
        .unwrap_err();
    assert_eq!(failure.step, "check_status");
    assert_eq!(failure.severity, Severity::Fatal);
    assert_eq!(mock.points_changed(), 0);
}
