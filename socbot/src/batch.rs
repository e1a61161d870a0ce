//! Submitting a list of records one after another.

use crate::outcome::{Failure, OperationResult, Severity};
use crate::record::OverrideRecord;
use crate::session::{Session, SessionAware};
use crate::submitter::FormSubmitter;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    /// Position of the record in the input, starting at 1.
    pub index: usize,
    pub tag: String,
    pub failure: Failure,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Duplicate tags that were not submitted again.
    pub skipped: usize,
    pub failures: Vec<RecordFailure>,
    /// Set when the batch stopped early because the session was lost.
    pub terminal: Option<Failure>,
}

impl BatchSummary {
    pub fn stopped_early(&self) -> bool {
        self.terminal.is_some()
    }

    /// Records never reached because the batch stopped.
    pub fn remaining(&self) -> usize {
        self.total
            .saturating_sub(self.attempted)
            .saturating_sub(self.skipped)
    }

    /// Collapses the summary into a single outcome for the caller.
    pub fn outcome(&self) -> OperationResult {
        if let Some(terminal) = &self.terminal {
            return Err(terminal.clone());
        }
        if self.failed > 0 {
            let tags: Vec<&str> = self.failures.iter().map(|f| f.tag.as_str()).collect();
            return Err(Failure::fatal(
                "batch",
                format!(
                    "{} of {} overrides failed: {}",
                    self.failed,
                    self.attempted,
                    tags.join(", ")
                ),
            ));
        }
        Ok(())
    }

    pub fn describe(&self) -> String {
        let mut text = format!(
            "{} added, {} failed, {} skipped of {}",
            self.succeeded, self.failed, self.skipped, self.total
        );
        if self.stopped_early() {
            text.push_str(&format!(", stopped with {} not processed", self.remaining()));
        }
        text
    }
}

pub struct BatchOrchestrator {
    session: Arc<dyn Session>,
    submitter: FormSubmitter,
    record_pause: Duration,
}

impl SessionAware for BatchOrchestrator {
    fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }
}

impl BatchOrchestrator {
    pub fn new(session: Arc<dyn Session>, submitter: FormSubmitter) -> Self {
        Self {
            session,
            submitter,
            record_pause: Duration::from_millis(500),
        }
    }

    /// Pause between two records.
    pub fn record_pause(mut self, pause: Duration) -> Self {
        self.record_pause = pause;
        self
    }

    /// Submits `records` in order. A failed record never stops the batch; a lost
    /// session does, before anything else is touched.
    pub async fn run(&self, records: &[OverrideRecord]) -> BatchSummary {
        let mut summary = BatchSummary {
            total: records.len(),
            ..Default::default()
        };
        info!("📋 Processing {} overrides", records.len());
        let mut seen = HashSet::new();

        for (i, record) in records.iter().enumerate() {
            let index = i + 1;
            if !seen.insert(record.tag.to_lowercase()) {
                warn!(index, tag = %record.tag, "⚠️ Duplicate tag, not submitting it again");
                summary.skipped += 1;
                continue;
            }

            if summary.attempted > 0 && !self.record_pause.is_zero() {
                tokio::time::sleep(self.record_pause).await;
            }

            if let Err(failure) = self.ensure_alive("liveness_probe").await {
                error!(index, "❌ Browser is gone, stopping batch");
                summary.terminal = Some(failure);
                break;
            }

            info!("🔄 {}/{}: {}", index, records.len(), record.tag);
            summary.attempted += 1;
            match self.submitter.submit(record).await {
                Ok(_) => summary.succeeded += 1,
                Err(failure) => {
                    error!(index, tag = %record.tag, step = %failure.step, "❌ {}", failure.message);
                    summary.failed += 1;
                    let terminal = failure.severity == Severity::Terminal;
                    summary.failures.push(RecordFailure {
                        index,
                        tag: record.tag.clone(),
                        failure: failure.clone(),
                    });
                    if terminal {
                        summary.terminal = Some(failure);
                        break;
                    }
                }
            }
        }

        info!("🎉 Completed: {}", summary.describe());
        summary
    }
}
