//! YAML configuration.
//!
//! `settings` is required. Every other section is optional: when it is missing the
//! defaults apply, when it is malformed the defaults apply and a warning is kept in
//! [`Config::warnings`] so the caller can surface it.

use crate::cascade::CascadeTiming;
use crate::resolver::OptionFallbacks;
use crate::submitter::FormLayout;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "socbot.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration is missing the required '{0}' section")]
    MissingSection(&'static str),

    #[error("Password is invalid: it decodes to more than one line")]
    InvalidPassword,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub user_name: String,
    /// Base64-encoded, or plain text when it does not decode.
    pub password: String,
    pub base_link: String,
    pub home_page_title: String,
    pub max_wait_page_load_secs: u64,
    pub max_wait_user_input_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            user_name: String::new(),
            password: String::new(),
            base_link: "http://eptw.sakhalinenergy.ru/".into(),
            home_page_title: "СНД - Домашняя страница".into(),
            max_wait_page_load_secs: 30,
            max_wait_user_input_secs: 300,
        }
    }
}

impl Settings {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.max_wait_page_load_secs)
    }

    pub fn user_input_timeout(&self) -> Duration {
        Duration::from_secs(self.max_wait_user_input_secs)
    }

    /// `base_link` joined with a relative path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_link.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// The configured password, base64-decoded when it is valid base64 of UTF-8 text.
    pub fn decoded_password(&self) -> Result<String, ConfigError> {
        decode_password(&self.password)
    }
}

pub fn decode_password(raw: &str) -> Result<String, ConfigError> {
    let raw = raw.trim();
    let password = base64::engine::general_purpose::STANDARD
        .decode(raw)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| raw.to_string());
    if password.contains('\n') {
        return Err(ConfigError::InvalidPassword);
    }
    Ok(password)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeSection {
    pub widget_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub settle_ms: u64,
    pub visibility_timeout_ms: u64,
    pub post_submit_ms: u64,
    pub record_pause_ms: u64,
}

impl Default for CascadeSection {
    fn default() -> Self {
        Self {
            widget_timeout_ms: 10_000,
            poll_interval_ms: 250,
            settle_ms: 800,
            visibility_timeout_ms: 5_000,
            post_submit_ms: 1_000,
            record_pause_ms: 500,
        }
    }
}

impl CascadeSection {
    pub fn timing(&self) -> CascadeTiming {
        CascadeTiming {
            widget_timeout: Duration::from_millis(self.widget_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(10)),
            settle: Duration::from_millis(self.settle_ms),
            visibility_timeout: Duration::from_millis(self.visibility_timeout_ms),
            post_submit: Duration::from_millis(self.post_submit_ms),
        }
    }

    pub fn record_pause(&self) -> Duration {
        Duration::from_millis(self.record_pause_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolesSection {
    /// Role codes to walk through, in order.
    pub soc_roles: Vec<String>,
    /// Role code to the name shown in the role selector.
    pub names: BTreeMap<String, String>,
    /// Role that accepts an approved SOC for apply.
    pub acceptor: String,
}

impl Default for RolesSection {
    fn default() -> Self {
        let names = [
            ("OAC", "Исполняющий форсирование"),
            ("OAV", "Проверяющий форсирование"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            soc_roles: vec!["OAC".into(), "OAV".into()],
            names,
            acceptor: "OAC".into(),
        }
    }
}

impl RolesSection {
    pub fn display_name(&self, code: &str) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusesSection {
    /// Statuses in which working with points is allowed.
    pub good: Vec<String>,
    pub approved_for_apply: String,
}

impl Default for StatusesSection {
    fn default() -> Self {
        Self {
            good: [
                "принято для установки",
                "запрошено для удаления",
                "установлено, не подтверждено",
                "удалено, не подтверждено",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            approved_for_apply: "одобрено для установки".into(),
        }
    }
}

impl StatusesSection {
    pub fn is_good(&self, status: &str) -> bool {
        let status = status.trim().to_lowercase();
        self.good.iter().any(|g| g.trim().to_lowercase() == status)
    }

    pub fn is_approved_for_apply(&self, status: &str) -> bool {
        status.trim().to_lowercase() == self.approved_for_apply.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Allow short SOC ids and expand them through a lookup.
    pub connect_for_partial_soc_id: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    pub settings: Settings,
    pub cascade: CascadeSection,
    pub roles: RolesSection,
    pub statuses: StatusesSection,
    pub database: DatabaseSection,
    pub form: FormLayout,
    pub option_fallbacks: OptionFallbacks,
    /// Problems in optional sections that were replaced by defaults.
    pub warnings: Vec<String>,
}

fn optional_section<T: DeserializeOwned + Default>(
    root: &serde_yaml::Value,
    name: &str,
    warnings: &mut Vec<String>,
) -> T {
    match root.get(name) {
        None | Some(serde_yaml::Value::Null) => T::default(),
        Some(value) => match serde_yaml::from_value(value.clone()) {
            Ok(section) => section,
            Err(e) => {
                let message = format!("section '{name}' ignored, using defaults: {e}");
                warn!("⚠️ {}", message);
                warnings.push(message);
                T::default()
            }
        },
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&text)?;
        info!("✅ Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let root: serde_yaml::Value = serde_yaml::from_str(text)?;
        let settings_value = root
            .get("settings")
            .filter(|v| !v.is_null())
            .ok_or(ConfigError::MissingSection("settings"))?;
        let settings: Settings = serde_yaml::from_value(settings_value.clone())?;
        if settings.base_link.trim().is_empty() {
            return Err(ConfigError::Invalid("settings.base_link is empty".into()));
        }

        let mut warnings = Vec::new();
        let cascade = optional_section(&root, "cascade", &mut warnings);
        let roles = optional_section(&root, "roles", &mut warnings);
        let statuses = optional_section(&root, "statuses", &mut warnings);
        let database = optional_section::<DatabaseSection>(&root, "database", &mut warnings);
        let form = optional_section(&root, "form", &mut warnings);
        let option_fallbacks = optional_section(&root, "option_fallbacks", &mut warnings);

        Ok(Self {
            settings,
            cascade,
            roles,
            statuses,
            database,
            form,
            option_fallbacks,
            warnings,
        })
    }

    /// `SOCBOT_USER_NAME`, `SOCBOT_PASSWORD` and `SOCBOT_BASE_LINK` override the file.
    pub fn apply_env(&mut self) {
        if let Ok(user) = std::env::var("SOCBOT_USER_NAME") {
            self.settings.user_name = user;
        }
        if let Ok(password) = std::env::var("SOCBOT_PASSWORD") {
            self.settings.password = password;
        }
        if let Ok(base) = std::env::var("SOCBOT_BASE_LINK") {
            self.settings.base_link = base;
        }
    }
}
