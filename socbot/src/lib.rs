//! Browser automation for the override sheets of a permit-to-work portal.
//!
//! The heart of the crate is entering override records into a form whose dropdowns
//! depend on each other (Type → Method → Applied/Removed State): each selection
//! reloads the next dropdown asynchronously, and the next value may only be chosen
//! once that reload has finished. Around it sit the workflows that load records
//! from workbooks, export them back, and walk a SOC through its approval states.

pub mod batch;
pub mod browser_script;
pub mod cascade;
pub mod config;
pub mod errors;
pub mod identifier;
pub mod kendo;
pub mod locator;
pub mod outcome;
pub mod portal;
pub mod record;
pub mod resolver;
pub mod selector;
pub mod session;
pub mod submitter;
#[cfg(test)]
mod tests;
pub mod workbook;
pub mod workflow;

pub use batch::{BatchOrchestrator, BatchSummary, RecordFailure};
pub use cascade::{CascadeDriver, CascadeRun, CascadeState, CascadeTiming};
pub use config::{Config, ConfigError};
pub use errors::AutomationError;
pub use identifier::SocIdLookup;
pub use kendo::{KendoBridge, NoticeLevel};
pub use locator::Locator;
pub use outcome::{Failure, OperationResult, Severity};
pub use portal::Portal;
pub use record::OverrideRecord;
pub use resolver::{CascadeOption, OptionFallbacks, OptionResolver, ResolveError};
pub use selector::Selector;
#[cfg(feature = "chrome")]
pub use session::{ChromeOptions, ChromeSession};
pub use session::{MockSession, Session, SessionAware};
pub use submitter::{FormLayout, FormSubmitter, SubmissionReceipt};
pub use workbook::WorkbookError;
pub use workflow::{ControlWorkflow, ExportWorkflow, ImportWorkflow};
