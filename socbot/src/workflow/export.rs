use super::{sign_in, soc_id_for, surface};
use crate::config::Config;
use crate::identifier::SocIdLookup;
use crate::kendo::{GridRecord, NoticeLevel};
use crate::locator::wait_for;
use crate::outcome::{tolerate, Failure, OperationResult, Severity};
use crate::portal::Portal;
use crate::record::OverrideRecord;
use crate::session::{Session, SessionAware};
use crate::workbook::{default_export_name, write_overrides, ExportRow, ExportSheet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const OVERRIDES_GRID: &str = "Overrides";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub soc_id: String,
    /// Written workbook, `None` when the SOC has no overrides.
    pub path: Option<PathBuf>,
    pub rows: usize,
}

pub struct ExportWorkflow {
    session: Arc<dyn Session>,
    config: Config,
    lookup: Option<Arc<dyn SocIdLookup>>,
}

impl ExportWorkflow {
    pub fn new(session: Arc<dyn Session>, config: Config) -> Self {
        Self {
            session,
            config,
            lookup: None,
        }
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn SocIdLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Reads the overrides grid of a SOC into a workbook at `output`, or a
    /// timestamped file in the working directory.
    #[instrument(skip(self, output))]
    pub async fn run(&self, soc_id: &str, output: Option<&Path>) -> OperationResult<ExportReport> {
        let soc_id = soc_id_for(&self.config, soc_id, self.lookup.as_ref()).await?;
        let portal = Portal::new(self.session.clone(), self.config.settings.clone());
        surface(&portal, self.export(&portal, &soc_id, output).await).await
    }

    async fn export(
        &self,
        portal: &Portal,
        soc_id: &str,
        output: Option<&Path>,
    ) -> OperationResult<ExportReport> {
        sign_in(portal, &self.config).await?;
        portal.open_details(soc_id).await?;

        let rows = match self.grid_rows(portal).await {
            Ok(rows) => rows,
            Err(failure) if failure.is_recoverable() => {
                warn!(step = %failure.step, "⚠️ {}", failure.message);
                let message = format!("ℹ️ No overrides found for SOC {soc_id}");
                tolerate(portal.notify(NoticeLevel::Warning, &message).await)?;
                return Ok(ExportReport {
                    soc_id: soc_id.to_string(),
                    path: None,
                    rows: 0,
                });
            }
            Err(failure) => return Err(failure),
        };

        let exported_at = chrono::Local::now().naive_local();
        let path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(default_export_name(soc_id, exported_at)));
        let sheet = ExportSheet {
            soc_id: soc_id.to_string(),
            exported_at,
            rows: rows
                .iter()
                .map(|row| ExportRow {
                    record: OverrideRecord::from(row),
                    current_state: row.current_state.clone(),
                })
                .collect(),
        };
        write_overrides(&path, &sheet).map_err(|e| Failure::fatal("write_workbook", e.to_string()))?;

        info!("💾 Exported {} overrides to {}", sheet.rows.len(), path.display());
        tolerate(
            portal
                .notify(
                    NoticeLevel::Success,
                    &format!("✅ SOC {soc_id} overrides exported to {}", path.display()),
                )
                .await,
        )?;
        Ok(ExportReport {
            soc_id: soc_id.to_string(),
            path: Some(path),
            rows: sheet.rows.len(),
        })
    }

    /// Waits for the grid to bind data. An empty or absent grid is recoverable.
    async fn grid_rows(&self, portal: &Portal) -> OperationResult<Vec<GridRecord>> {
        let bridge = portal.bridge();
        let timeout = self.config.settings.page_load_timeout();
        let rows = wait_for(
            "overrides grid data",
            timeout,
            Duration::from_millis(250),
            || async move {
                if !bridge.page_state().await?.kendo {
                    return Ok(None);
                }
                Ok(bridge
                    .grid_records(OVERRIDES_GRID)
                    .await?
                    .filter(|rows| !rows.is_empty()))
            },
        )
        .await;
        match rows {
            Ok(rows) => Ok(rows),
            Err(e) => {
                let failure = portal.classify("read_grid", &e, Severity::Recoverable).await;
                Err(if failure.is_terminal() {
                    failure
                } else {
                    Failure::recoverable("read_grid", format!("no data: {}", failure.message))
                })
            }
        }
    }
}
