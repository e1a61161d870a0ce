//! Entering whole records through the dependent dropdowns of the override form.

use super::{init_tracing, populated_form};
use crate::cascade::{CascadeDriver, CascadeState, CascadeTiming};
use crate::kendo::{BridgeCall, KendoBridge};
use crate::outcome::Severity;
use crate::record::OverrideRecord;
use crate::resolver::{OptionFallbacks, OptionResolver};
use crate::session::{MockSession, Session};
use crate::submitter::{FormLayout, FormSubmitter};
use std::sync::Arc;

fn submitter(mock: &Arc<MockSession>) -> FormSubmitter {
    let session: Arc<dyn Session> = mock.clone();
    let bridge = KendoBridge::new(session.clone());
    FormSubmitter::new(
        session,
        OptionResolver::new(bridge.clone(), OptionFallbacks::default()),
        CascadeDriver::new(bridge, CascadeTiming::default()),
        FormLayout::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn full_record_is_posted_with_resolved_ids() {
    init_tracing();
    let mock = populated_form();
    let record = OverrideRecord::new("PV-101")
        .with_description("Клапан подачи")
        .with_type("Форсировка")
        .with_method("Программная")
        .with_comment("на время пусконаладки")
        .with_applied("Включено", None)
        .with_removed("Нормальное", None);

    let receipt = submitter(&mock).submit(&record).await.unwrap();
    assert_eq!(receipt.selections.len(), 4);
    assert!(receipt
        .selections
        .iter()
        .all(|run| run.state() == CascadeState::ChildReady));

    let posted = mock.submissions();
    assert_eq!(posted.len(), 1);
    let form = &posted[0];
    assert_eq!(form.get("TagNumber").map(String::as_str), Some("PV-101"));
    assert_eq!(form.get("OverrideTypeId").map(String::as_str), Some("3"));
    assert_eq!(form.get("OverrideMethodId").map(String::as_str), Some("31"));
    assert_eq!(form.get("OverrideAppliedStateId").map(String::as_str), Some("301"));
    assert_eq!(form.get("OverrideRemovedStateId").map(String::as_str), Some("303"));
    assert_eq!(form.get("Comment").map(String::as_str), Some("на время пусконаладки"));
}

#[tokio::test(start_paused = true)]
async fn widgets_are_written_parent_first() {
    let mock = populated_form();
    let record = OverrideRecord::new("PV-102")
        .with_type("Форсировка")
        .with_method("Аппаратная")
        .with_applied("Включено", None)
        .with_removed("Нормальное", None);
    submitter(&mock).submit(&record).await.unwrap();

    let order: Vec<String> = mock
        .writes()
        .into_iter()
        .filter(|w| w.starts_with("Override"))
        .collect();
    assert_eq!(
        order,
        vec![
            "OverrideTypeId",
            "OverrideMethodId",
            "OverrideAppliedStateId",
            "OverrideRemovedStateId"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn each_change_waits_for_the_reload_before_the_next_write() {
    let mock = populated_form();
    let record = OverrideRecord::new("PV-103")
        .with_type("Форсировка")
        .with_method("Программная");
    submitter(&mock).submit(&record).await.unwrap();

    let calls = mock.bridge_calls();
    let change = calls
        .iter()
        .position(|c| matches!(c, BridgeCall::TriggerChange { widget } if widget == "OverrideTypeId"))
        .unwrap();
    let method_write = calls
        .iter()
        .position(|c| matches!(c, BridgeCall::SetValue { widget, .. } if widget == "OverrideMethodId"))
        .unwrap();
    let polls = calls[change..method_write]
        .iter()
        .filter(|c| matches!(c, BridgeCall::WidgetState { widget } if widget == "OverrideMethodId"))
        .count();
    // three empty polls, then the ready one
    assert!(polls >= 4, "only {polls} readiness polls between change and write");
}

#[tokio::test(start_paused = true)]
async fn extra_values_go_into_revealed_fields() {
    let mock = populated_form();
    let record = OverrideRecord::new("HS-7")
        .with_type("Байпас")
        .with_method("Перемычка")
        .with_applied("Значение", Some("12.5"))
        .with_removed("Значение", Some("0"));
    submitter(&mock).submit(&record).await.unwrap();

    let form = &mock.submissions()[0];
    assert_eq!(form.get("AdditionalValueAppliedState").map(String::as_str), Some("12.5"));
    assert_eq!(form.get("AdditionalValueRemovedState").map(String::as_str), Some("0"));
}

#[tokio::test(start_paused = true)]
async fn type_only_record_is_submitted() {
    let mock = populated_form();
    submitter(&mock)
        .submit(&OverrideRecord::new("PV-101").with_type("Байпас"))
        .await
        .unwrap();
    let form = &mock.submissions()[0];
    assert_eq!(form.get("OverrideTypeId").map(String::as_str), Some("1"));
    assert!(!form.contains_key("OverrideMethodId"));
}

#[tokio::test(start_paused = true)]
async fn type_without_methods_does_not_wait_for_the_method_list() {
    let mock = populated_form();
    // Блокировка offers no methods at all
    submitter(&mock)
        .submit(&OverrideRecord::new("PV-106").with_type("Блокировка"))
        .await
        .unwrap();
    let form = &mock.submissions()[0];
    assert_eq!(form.get("OverrideTypeId").map(String::as_str), Some("2"));
    assert!(!form.contains_key("OverrideMethodId"));
    let calls = mock.bridge_calls();
    let change = calls
        .iter()
        .position(|c| matches!(c, BridgeCall::TriggerChange { widget } if widget == "OverrideTypeId"))
        .unwrap();
    assert!(!calls[change..]
        .iter()
        .any(|c| matches!(c, BridgeCall::WidgetState { widget } if widget == "OverrideMethodId")));
}

#[tokio::test(start_paused = true)]
async fn unknown_method_is_fatal_and_lists_choices() {
    let mock = populated_form();
    let record = OverrideRecord::new("PV-104")
        .with_type("Форсировка")
        .with_method("Перемычка");
    let failure = submitter(&mock).submit(&record).await.unwrap_err();
    assert_eq!(failure.step, "select_method");
    assert_eq!(failure.severity, Severity::Fatal);
    assert!(failure.message.contains("Программная"));
    assert!(mock.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn server_rejection_is_fatal_for_the_record() {
    let mock = populated_form();
    mock.reject_tag("PV-105", "Tag already exists");
    let failure = submitter(&mock)
        .submit(&OverrideRecord::new("PV-105").with_type("Байпас"))
        .await
        .unwrap_err();
    assert_eq!(failure.step, "validate");
    assert!(failure.message.contains("Tag already exists"));
}

#[tokio::test(start_paused = true)]
async fn second_record_starts_from_a_clean_form() {
    let mock = populated_form();
    let submitter = submitter(&mock);
    submitter
        .submit(&OverrideRecord::new("A-1").with_description("first"))
        .await
        .unwrap();
    submitter.submit(&OverrideRecord::new("B-2")).await.unwrap();

    let posted = mock.submissions();
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[1].get("TagNumber").map(String::as_str), Some("B-2"));
    assert!(!posted[1].contains_key("Description"));
}

#[tokio::test(start_paused = true)]
async fn failed_record_leaves_no_selection_behind() {
    let mock = populated_form();
    let submitter = submitter(&mock);
    let failure = submitter
        .submit(
            &OverrideRecord::new("PV-1")
                .with_type("Форсировка")
                .with_method("Нет такого"),
        )
        .await
        .unwrap_err();
    assert_eq!(failure.step, "select_method");
    assert_eq!(mock.dropdown_value("OverrideTypeId").as_deref(), Some("3"));

    submitter
        .submit(&OverrideRecord::new("PV-2").with_description("без типа"))
        .await
        .unwrap();
    let posted = mock.submissions();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].get("TagNumber").map(String::as_str), Some("PV-2"));
    assert!(!posted[0].contains_key("OverrideTypeId"));
    assert!(!posted[0].contains_key("OverrideMethodId"));
}
