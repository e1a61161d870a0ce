#![allow(dead_code)]

use socbot::config::Config;
use socbot::session::MockSession;
use socbot::{
    BatchOrchestrator, CascadeDriver, CascadeTiming, FormLayout, FormSubmitter, KendoBridge,
    OptionFallbacks, OptionResolver, Session,
};
use std::sync::Arc;
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The add-override form with methods and states for Байпас and Форсировка.
pub fn override_form() -> Arc<MockSession> {
    let mock = Arc::new(MockSession::override_form());
    mock.methods_for("1", &[("Перемычка", "11")]);
    mock.methods_for("3", &[("Программная", "31"), ("Аппаратная", "32")]);
    mock.states_for("11", &[("Включено", "111")], &[("Отключено", "112")]);
    mock.states_for("31", &[("Включено", "301")], &[("Нормальное", "303")]);
    mock.states_for("32", &[("Включено", "321")], &[("Нормальное", "323")]);
    mock.set_latency(2);
    mock
}

pub fn orchestrator(mock: &Arc<MockSession>) -> BatchOrchestrator {
    let session: Arc<dyn Session> = mock.clone();
    let bridge = KendoBridge::new(session.clone());
    let submitter = FormSubmitter::new(
        session.clone(),
        OptionResolver::new(bridge.clone(), OptionFallbacks::default()),
        CascadeDriver::new(bridge, CascadeTiming::default()),
        FormLayout::default(),
    );
    BatchOrchestrator::new(session, submitter).record_pause(Duration::from_millis(500))
}

/// Configuration pointing at the mock portal with short waits.
pub fn config() -> Config {
    Config::from_yaml(
        r#"
settings:
  user_name: operator
  password: czNjcjN0
  base_link: http://portal.test/
  max_wait_page_load_secs: 3
  max_wait_user_input_secs: 20
"#,
    )
    .expect("test configuration parses")
}
