//! End-to-end runs against one SOC: import overrides from a workbook, export them to
//! one, or walk the SOC through acceptance and point confirmation.

pub mod control;
pub mod export;
pub mod import;

pub use control::{ControlReport, ControlWorkflow, RoleReport};
pub use export::{ExportReport, ExportWorkflow};
pub use import::{ImportPlan, ImportReport, ImportWorkflow};

use crate::config::Config;
use crate::identifier::{resolve_soc_id, SocIdLookup};
use crate::kendo::NoticeLevel;
use crate::outcome::{Failure, OperationResult};
use crate::portal::Portal;
use std::sync::Arc;

/// Shows a failure to the operator unless the browser is already gone.
pub(crate) async fn surface<T>(portal: &Portal, result: OperationResult<T>) -> OperationResult<T> {
    if let Err(failure) = &result {
        if !failure.is_terminal() {
            let _ = portal
                .notify(NoticeLevel::Error, &format!("❌ {}", failure.message))
                .await;
        }
    }
    result
}

/// Validates a SOC id, expanding short ids only when partial lookups are enabled.
pub async fn soc_id_for(
    config: &Config,
    raw: &str,
    lookup: Option<&Arc<dyn SocIdLookup>>,
) -> OperationResult<String> {
    let lookup = lookup
        .filter(|_| config.database.connect_for_partial_soc_id)
        .map(|l| l.as_ref());
    resolve_soc_id(raw, lookup).await
}

/// Signs in with the configured credentials.
pub(crate) async fn sign_in(portal: &Portal, config: &Config) -> OperationResult {
    let password = config
        .settings
        .decoded_password()
        .map_err(|e| Failure::fatal("login", e.to_string()))?;
    portal.login(&config.settings.user_name, &password).await
}
