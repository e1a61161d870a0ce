use super::{sign_in, soc_id_for, surface};
use crate::config::Config;
use crate::identifier::SocIdLookup;
use crate::kendo::{NoticeLevel, PointSelectReport};
use crate::locator::wait_for;
use crate::outcome::{tolerate, Failure, OperationResult, Severity};
use crate::portal::Portal;
use crate::session::{Session, SessionAware};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const STATUS_LABEL: &str = "Состояние";

/// Index of the state every point is moved to on the update page.
const CONFIRMED_STATE_INDEX: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleReport {
    pub role: String,
    /// `None` when no editable points showed up for this role.
    pub points: Option<PointSelectReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlReport {
    pub soc_id: String,
    pub initial_status: String,
    pub final_status: String,
    pub accepted: bool,
    pub roles: Vec<RoleReport>,
}

pub struct ControlWorkflow {
    session: Arc<dyn Session>,
    config: Config,
    lookup: Option<Arc<dyn SocIdLookup>>,
}

impl ControlWorkflow {
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

    /// Accepts an approved SOC for apply, then confirms the current state of its
    /// points under every configured role.
    #[instrument(skip(self))]
    pub async fn run(&self, soc_id: &str) -> OperationResult<ControlReport> {
        let soc_id = soc_id_for(&self.config, soc_id, self.lookup.as_ref()).await?;
        let portal = Portal::new(self.session.clone(), self.config.settings.clone());
        surface(&portal, self.control(&portal, &soc_id).await).await
    }

    async fn control(&self, portal: &Portal, soc_id: &str) -> OperationResult<ControlReport> {
        if self.config.roles.soc_roles.is_empty() {
            return Err(Failure::fatal("roles", "no SOC roles configured"));
        }
        sign_in(portal, &self.config).await?;
        portal.open_details(soc_id).await?;

        let initial_status = portal.read_label("read_status", STATUS_LABEL).await?;
        info!("📄 SOC {} status: {}", soc_id, initial_status);

        let statuses = &self.config.statuses;
        let mut accepted = false;
        let final_status = if statuses.is_approved_for_apply(&initial_status) {
            let status = self.accept(portal, soc_id, &initial_status).await?;
            accepted = true;
            status
        } else {
            initial_status.clone()
        };

        if !statuses.is_good(&final_status) {
            return Err(Failure::fatal(
                "check_status",
                format!("SOC {soc_id} status is \"{final_status}\", the script cannot proceed"),
            ));
        }

        let mut roles = Vec::with_capacity(self.config.roles.soc_roles.len());
        for role in &self.config.roles.soc_roles {
            let points = self.update_points(portal, soc_id, role).await?;
            roles.push(RoleReport {
                role: role.clone(),
                points,
            });
            tolerate(portal.wait_for_user_confirmation().await)?;
        }

        Ok(ControlReport {
            soc_id: soc_id.to_string(),
            initial_status,
            final_status,
            accepted,
            roles,
        })
    }

    /// Accepts the SOC for apply under the acceptor role and returns the new status.
    async fn accept(&self, portal: &Portal, soc_id: &str, previous: &str) -> OperationResult<String> {
        portal.change_role(&self.config.roles.acceptor).await?;
        portal.open_details(soc_id).await?;
        portal.accept_for_apply(soc_id).await?;

        let bridge = portal.bridge();
        let changed = wait_for(
            "the SOC status to change",
            self.config.settings.page_load_timeout(),
            Duration::from_millis(250),
            || async move {
                Ok(bridge
                    .label_text(STATUS_LABEL)
                    .await?
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty() && s != previous))
            },
        )
        .await;
        match changed {
            Ok(status) => {
                info!("🔁 SOC {} status changed to {}", soc_id, status);
                Ok(status)
            }
            Err(e) => {
                let failure = portal.classify("accept_for_apply", &e, Severity::Fatal).await;
                Err(Failure::new(
                    "accept_for_apply",
                    format!("status stayed \"{previous}\": {}", failure.message),
                    failure.severity,
                ))
            }
        }
    }

    async fn update_points(
        &self,
        portal: &Portal,
        soc_id: &str,
        role: &str,
    ) -> OperationResult<Option<PointSelectReport>> {
        let role_name = self.config.roles.display_name(role).unwrap_or(role);
        info!("🔄 Processing role {} ({})", role, role_name);
        portal.change_role(role).await?;
        portal.open_update_override(soc_id).await?;

        let bridge = portal.bridge();
        let available = wait_for(
            "editable points",
            self.config.settings.page_load_timeout(),
            Duration::from_millis(250),
            || async move {
                let report = bridge.point_selects(None).await?;
                Ok((report.total > 0).then_some(report))
            },
        )
        .await;
        if let Err(e) = available {
            let failure = portal.classify("update_points", &e, Severity::Recoverable).await;
            if failure.is_terminal() {
                return Err(failure);
            }
            warn!("⚠️ No editable points for role {}: {}", role, failure.message);
            return Ok(None);
        }

        match bridge.point_selects(Some(CONFIRMED_STATE_INDEX)).await {
            Ok(report) => {
                info!("✅ {} of {} points updated for role {}", report.changed, report.total, role);
                tolerate(
                    portal
                        .notify(
                            NoticeLevel::Info,
                            &format!("{} points updated for role {role_name}", report.changed),
                        )
                        .await,
                )?;
                Ok(Some(report))
            }
            Err(e) => Err(portal.classify("update_points", &e, Severity::Fatal).await),
        }
    }
}
