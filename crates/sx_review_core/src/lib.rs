//! Core review-and-materialize engine for scheduled transaction instances.
//! This crate is the single source of truth for review invariants.

pub mod collection;
pub mod db;
pub mod logging;
pub mod model;
pub mod projection;
pub mod repo;
pub mod service;

pub use collection::events::{CollectionEvent, CollectionListener, EventKind, Subscription};
pub use collection::instance_model::InstanceModel;
pub use collection::{
    CollectionError, CreationError, EffectChangeOutcome, InstanceCollection, InstanceSummary,
};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::amount::{Amount, AmountParseError};
pub use model::instance::{
    Instance, InstanceGroup, InstanceKey, InstanceState, ScheduledTransaction, SplitAmount,
    SxId, TemplateSplit, Variable, VariableNeeded, VariableValue,
};
pub use model::preferences::{ReviewPreferences, SortColumn, SortOrder};
pub use model::transaction::{TransactionDraft, TransactionId};
pub use projection::sort::{compare_by_occurrence, compare_by_status, SortProxy};
pub use projection::tree::{CellValue, Column, RowId, TreeDataSource, TreePath};
pub use projection::{ReviewProjection, RowTarget, VariableTarget};
pub use repo::ledger_repo::{Ledger, LedgerError, LedgerResult, SqliteLedger};
pub use repo::preference_repo::{
    load_review_preferences, save_review_preferences, save_session_preferences, PreferenceError,
    PreferenceRepository, SqlitePreferenceRepository,
};
pub use service::review_service::{
    CommitOutcome, ResponseOutcome, ReviewError, ReviewResponse, ReviewResult, ReviewSession,
};
pub use service::startup::{run_since_last_run, StartupAction, StartupOutcome};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
