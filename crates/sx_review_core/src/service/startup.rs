//! Since-last-run pass executed when a book is opened.
//!
//! # Responsibility
//! - Create auto-create instances without user interaction.
//! - Decide whether the review dialog or a short notice should follow.
//!
//! # Invariants
//! - Disabled or read-only runs leave the collection untouched.

use crate::collection::{EffectChangeOutcome, InstanceCollection, InstanceSummary};
use crate::model::preferences::ReviewPreferences;
use log::{info, warn};
use std::time::{Duration, Instant};

/// Follow-up the caller should present after the startup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupAction {
    /// `run_at_open` is off.
    Disabled,
    /// Book refuses modifications.
    ReadOnly,
    /// Some instances need review; open a `ReviewSession`.
    OpenReview,
    /// Nothing to review; tell the user how many were auto-created.
    NotifyAutoCreated(usize),
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupOutcome {
    pub action: StartupAction,
    pub summary: InstanceSummary,
    /// Auto-created transactions and per-instance failures.
    pub changes: EffectChangeOutcome,
    pub elapsed: Duration,
}

impl StartupOutcome {
    fn skipped(action: StartupAction, started_at: Instant) -> Self {
        Self {
            action,
            summary: InstanceSummary::default(),
            changes: EffectChangeOutcome::default(),
            elapsed: started_at.elapsed(),
        }
    }
}

/// Runs the auto-create pass over `collection`.
pub fn run_since_last_run<C: InstanceCollection>(
    collection: &mut C,
    prefs: &ReviewPreferences,
) -> StartupOutcome {
    let started_at = Instant::now();
    if !prefs.run_at_open {
        info!("event=since_last_run module=startup status=skipped reason=disabled");
        return StartupOutcome::skipped(StartupAction::Disabled, started_at);
    }
    if collection.is_read_only() {
        info!("event=since_last_run module=startup status=skipped reason=read_only");
        return StartupOutcome::skipped(StartupAction::ReadOnly, started_at);
    }

    let summary = collection.summarize();
    info!(
        "event=since_last_run module=startup status=summary need_dialog={} instances={} to_create={} auto_create={} auto_create_no_notify={}",
        summary.need_dialog,
        summary.num_instances,
        summary.num_to_create_instances,
        summary.num_auto_create_instances,
        summary.num_auto_create_no_notify_instances
    );

    let changes = collection.effect_change(true);
    let action = if summary.need_dialog {
        StartupAction::OpenReview
    } else if summary.num_auto_create_no_notify_instances != 0 && prefs.show_at_open {
        StartupAction::NotifyAutoCreated(summary.num_auto_create_no_notify_instances)
    } else {
        StartupAction::Nothing
    };

    let elapsed = started_at.elapsed();
    if !changes.errors.is_empty() {
        warn!(
            "event=since_last_run module=startup status=partial failed={}",
            changes.errors.len()
        );
    }
    info!(
        "event=since_last_run module=startup status=ok action={:?} created={} duration_us={}",
        action,
        changes.created.len(),
        elapsed.as_micros()
    );

    StartupOutcome {
        action,
        summary,
        changes,
        elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::{run_since_last_run, StartupAction};
    use crate::collection::instance_model::InstanceModel;
    use crate::collection::InstanceCollection;
    use crate::model::instance::{Instance, InstanceGroup, InstanceState, ScheduledTransaction};
    use crate::model::preferences::ReviewPreferences;
    use crate::model::transaction::TransactionId;
    use crate::repo::ledger_repo::{Ledger, LedgerError, LedgerResult};
    use chrono::NaiveDate;
    use uuid::Uuid;

    struct FlagLedger {
        read_only: bool,
    }

    impl Ledger for FlagLedger {
        fn is_read_only(&self) -> bool {
            self.read_only
        }

        fn create_transaction(
            &mut self,
            _sx: &ScheduledTransaction,
            _instance: &Instance,
        ) -> LedgerResult<TransactionId> {
            if self.read_only {
                return Err(LedgerError::ReadOnly);
            }
            Ok(Uuid::new_v4())
        }
    }

    fn silent_auto_group() -> InstanceGroup {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        InstanceGroup::new(ScheduledTransaction::new("Salary").auto_create(false))
            .with_instance(Instance::new(date, InstanceState::ToCreate))
            .with_instance(Instance::new(date, InstanceState::ToCreate))
    }

    #[test]
    fn silent_auto_create_only_notifies() {
        let mut model = InstanceModel::with_groups(
            FlagLedger { read_only: false },
            vec![silent_auto_group()],
        );
        let outcome = run_since_last_run(&mut model, &ReviewPreferences::default());

        assert_eq!(outcome.action, StartupAction::NotifyAutoCreated(2));
        assert_eq!(outcome.changes.created.len(), 2);
        assert!(model.groups()[0]
            .instances
            .iter()
            .all(|instance| instance.state == InstanceState::Created));
    }

    #[test]
    fn manual_instances_open_review() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let manual = InstanceGroup::new(ScheduledTransaction::new("Rent"))
            .with_instance(Instance::new(date, InstanceState::ToCreate));
        let mut model = InstanceModel::with_groups(
            FlagLedger { read_only: false },
            vec![silent_auto_group(), manual],
        );
        let outcome = run_since_last_run(&mut model, &ReviewPreferences::default());

        assert_eq!(outcome.action, StartupAction::OpenReview);
        assert_eq!(outcome.changes.created.len(), 2);
        assert_eq!(model.groups()[1].instances[0].state, InstanceState::ToCreate);
    }

    #[test]
    fn disabled_and_read_only_runs_change_nothing() {
        let prefs = ReviewPreferences {
            run_at_open: false,
            ..ReviewPreferences::default()
        };
        let mut model = InstanceModel::with_groups(
            FlagLedger { read_only: false },
            vec![silent_auto_group()],
        );
        assert_eq!(
            run_since_last_run(&mut model, &prefs).action,
            StartupAction::Disabled
        );

        let mut read_only = InstanceModel::with_groups(
            FlagLedger { read_only: true },
            vec![silent_auto_group()],
        );
        let outcome = run_since_last_run(&mut read_only, &ReviewPreferences::default());
        assert_eq!(outcome.action, StartupAction::ReadOnly);
        assert!(outcome.changes.is_empty());
        assert_eq!(read_only.groups()[0].instances[0].state, InstanceState::ToCreate);
        assert_eq!(model.groups()[0].instances[0].state, InstanceState::ToCreate);
    }
}
