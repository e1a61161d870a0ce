mod cascade_form_tests;

use crate::session::MockSession;
use std::sync::Arc;

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_test_writer()
        .try_init();
}

/// The add-override form with one complete Форсировка → Программная chain and one
/// Байпас → Перемычка chain whose applied state takes an extra value.
pub fn populated_form() -> Arc<MockSession> {
    let mock = Arc::new(MockSession::override_form());
    mock.methods_for("3", &[("Программная", "31"), ("Аппаратная", "32")]);
    mock.methods_for("1", &[("Перемычка", "11")]);
    mock.states_for(
        "31",
        &[("Включено", "301"), ("Выключено", "302")],
        &[("Нормальное", "303")],
    );
    mock.states_for("32", &[("Включено", "321")], &[("Нормальное", "323")]);
    mock.states_for("11", &[("Значение", "111")], &[("Значение", "112")]);
    mock.reveal_on(MockSession::APPLIED_WIDGET, "111", "AdditionalValueAppliedState");
    mock.reveal_on(MockSession::REMOVED_WIDGET, "112", "AdditionalValueRemovedState");
    mock.set_latency(3);
    mock
}
