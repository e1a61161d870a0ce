use super::{sign_in, soc_id_for, surface};
use crate::batch::{BatchOrchestrator, BatchSummary};
use crate::cascade::CascadeDriver;
use crate::config::Config;
use crate::identifier::SocIdLookup;
use crate::kendo::{KendoBridge, NoticeLevel};
use crate::outcome::{tolerate, Failure, OperationResult};
use crate::portal::Portal;
use crate::resolver::OptionResolver;
use crate::session::Session;
use crate::submitter::FormSubmitter;
use crate::workbook::{load_overrides, LoadedWorkbook};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// What an import would do, worked out without a browser.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub soc_id: String,
    pub workbook: LoadedWorkbook,
}

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub soc_id: String,
    pub summary: BatchSummary,
    pub skipped_rows: Vec<u32>,
}

pub struct ImportWorkflow {
    session: Arc<dyn Session>,
    config: Config,
    lookup: Option<Arc<dyn SocIdLookup>>,
}

impl ImportWorkflow {
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

    /// Loads the workbook and settles the SOC id: `soc_id` wins over the sheet's own.
    pub async fn plan(
        config: &Config,
        input: &Path,
        soc_id: Option<&str>,
        lookup: Option<&Arc<dyn SocIdLookup>>,
    ) -> OperationResult<ImportPlan> {
        let workbook =
            load_overrides(input).map_err(|e| Failure::fatal("load_workbook", e.to_string()))?;
        if !workbook.skipped_rows.is_empty() {
            warn!(
                "⚠️ Rows without a tag were skipped: {:?}",
                workbook.skipped_rows
            );
        }
        let raw = soc_id
            .map(str::to_string)
            .or_else(|| workbook.metadata.soc_id.clone())
            .ok_or_else(|| {
                Failure::fatal(
                    "soc_id",
                    format!("no SOC id given and none found in {}", input.display()),
                )
            })?;
        let soc_id = soc_id_for(config, &raw, lookup).await?;
        Ok(ImportPlan { soc_id, workbook })
    }

    fn orchestrator(&self) -> BatchOrchestrator {
        let bridge = KendoBridge::new(self.session.clone());
        let resolver = OptionResolver::new(bridge.clone(), self.config.option_fallbacks.clone());
        let cascade = CascadeDriver::new(bridge, self.config.cascade.timing());
        let submitter = FormSubmitter::new(
            self.session.clone(),
            resolver,
            cascade,
            self.config.form.clone(),
        );
        BatchOrchestrator::new(self.session.clone(), submitter)
            .record_pause(self.config.cascade.record_pause())
    }

    /// Enters every record of `input` into the SOC's add-override form.
    ///
    /// Per-record failures end up in the report, and so does a browser lost mid-batch
    /// (`summary.terminal`). Only failures that prevent the batch from starting are
    /// returned as errors.
    #[instrument(skip(self, input), fields(input = %input.display()))]
    pub async fn run(&self, input: &Path, soc_id: Option<&str>) -> OperationResult<ImportReport> {
        let plan = Self::plan(&self.config, input, soc_id, self.lookup.as_ref()).await?;
        let portal = Portal::new(self.session.clone(), self.config.settings.clone());

        surface(&portal, self.prepare(&portal, &plan.soc_id).await).await?;

        let summary = self.orchestrator().run(&plan.workbook.records).await;
        if let Some(terminal) = &summary.terminal {
            error!(step = %terminal.step, "❌ Import into SOC {} stopped: {}", plan.soc_id, summary.describe());
            return Ok(ImportReport {
                soc_id: plan.soc_id,
                summary,
                skipped_rows: plan.workbook.skipped_rows,
            });
        }

        let banner = format!("SOC {}: {}", plan.soc_id, summary.describe());
        if summary.failed == 0 {
            tolerate(portal.notify(NoticeLevel::Success, &format!("✅ {banner}")).await)?;
        } else {
            let tags: Vec<&str> = summary.failures.iter().map(|f| f.tag.as_str()).collect();
            tolerate(
                portal
                    .notify(
                        NoticeLevel::Error,
                        &format!("❌ {banner}. Failed: {}", tags.join(", ")),
                    )
                    .await,
            )?;
        }

        tolerate(portal.wait_for_user_confirmation().await)?;
        info!("🏁 Import into SOC {} finished", plan.soc_id);
        Ok(ImportReport {
            soc_id: plan.soc_id,
            summary,
            skipped_rows: plan.workbook.skipped_rows,
        })
    }

    async fn prepare(&self, portal: &Portal, soc_id: &str) -> OperationResult {
        sign_in(portal, &self.config).await?;
        portal
            .open_edit_overrides(soc_id, &self.config.form.type_widget)
            .await
    }
}
