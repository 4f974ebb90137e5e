//! In-memory instance collection backed by a `Ledger`.
//!
//! # Responsibility
//! - Hold the scheduler's output (groups of due instances).
//! - Apply review decisions and materialize accepted instances.
//! - Notify listeners synchronously after every change.
//!
//! # Invariants
//! - `Removing` is emitted while the group is still present.
//! - Failed instances keep their pre-materialization state.

use crate::collection::events::{
    CollectionEvent, CollectionListener, ListenerId, ListenerRegistry, Subscription,
};
use crate::collection::{
    CollectionError, CollectionResult, CreationError, EffectChangeOutcome, InstanceCollection,
};
use crate::model::instance::{
    Instance, InstanceGroup, InstanceKey, InstanceState, SxId, VariableValue,
};
use crate::repo::ledger_repo::Ledger;
use log::{debug, info, warn};
use std::rc::Weak;
use std::time::Instant;

/// Instance collection for one review session.
pub struct InstanceModel<L: Ledger> {
    groups: Vec<InstanceGroup>,
    ledger: L,
    listeners: ListenerRegistry,
}

impl<L: Ledger> InstanceModel<L> {
    pub fn new(ledger: L) -> Self {
        Self {
            groups: Vec::new(),
            ledger,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Creates a model pre-populated with scheduler output, without events.
    pub fn with_groups(ledger: L, groups: Vec<InstanceGroup>) -> Self {
        Self {
            groups,
            ledger,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Appends a group and emits `Added`.
    pub fn add_group(&mut self, group: InstanceGroup) {
        let id = group.sx.id;
        self.groups.push(group);
        self.emit(CollectionEvent::Added(id));
    }

    /// Replaces the instances of one group and emits `Updated`.
    pub fn replace_instances(
        &mut self,
        sx_id: SxId,
        instances: Vec<Instance>,
    ) -> CollectionResult<()> {
        let index = self
            .group_index(sx_id)
            .ok_or(CollectionError::GroupNotFound(sx_id))?;
        self.groups[index].instances = instances;
        self.emit(CollectionEvent::Updated(sx_id));
        Ok(())
    }

    /// Emits `Removing`, then drops the group.
    pub fn remove_group(&mut self, sx_id: SxId) -> CollectionResult<InstanceGroup> {
        let index = self
            .group_index(sx_id)
            .ok_or(CollectionError::GroupNotFound(sx_id))?;
        self.emit(CollectionEvent::Removing(sx_id));
        Ok(self.groups.remove(index))
    }

    /// Number of live subscribers.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn group_index(&self, sx_id: SxId) -> Option<usize> {
        self.groups.iter().position(|group| group.sx.id == sx_id)
    }

    fn emit(&mut self, event: CollectionEvent) {
        self.listeners.emit(&event, &self.groups);
    }

    fn instance_mut(&mut self, key: InstanceKey) -> CollectionResult<&mut Instance> {
        self.groups
            .get_mut(key.group_index)
            .and_then(|group| group.instances.get_mut(key.instance_index))
            .ok_or(CollectionError::InstanceNotFound(key))
    }

    fn is_eligible(group: &InstanceGroup, instance: &Instance, auto_create_only: bool) -> bool {
        if auto_create_only {
            group.sx.auto_create && instance.state != InstanceState::Created
        } else {
            instance.state == InstanceState::ToCreate
        }
    }
}

impl<L: Ledger> InstanceCollection for InstanceModel<L> {
    fn groups(&self) -> &[InstanceGroup] {
        &self.groups
    }

    fn is_read_only(&self) -> bool {
        self.ledger.is_read_only()
    }

    fn subscribe(&mut self, listener: Weak<dyn CollectionListener>) -> Subscription {
        self.listeners.subscribe(listener)
    }

    fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn change_state(&mut self, key: InstanceKey, state: InstanceState) -> CollectionResult<()> {
        if state == InstanceState::Created {
            return Err(CollectionError::CreatedNotSelectable);
        }
        let instance = self.instance_mut(key)?;
        if instance.state == InstanceState::Created {
            return Err(CollectionError::InstanceAlreadyCreated(key));
        }
        let previous = instance.state;
        instance.state = state;
        debug!(
            "event=instance_state module=collection status=ok group={} instance={} from={:?} to={:?}",
            key.group_index, key.instance_index, previous, state
        );

        let sx_id = self.groups[key.group_index].sx.id;
        self.emit(CollectionEvent::Updated(sx_id));
        Ok(())
    }

    fn set_variable(
        &mut self,
        key: InstanceKey,
        name: &str,
        value: VariableValue,
    ) -> CollectionResult<()> {
        let instance = self.instance_mut(key)?;
        let variable =
            instance
                .editable_variable_mut(name)
                .ok_or_else(|| CollectionError::VariableNotFound {
                    instance: key,
                    name: name.to_string(),
                })?;
        variable.value = value;

        let sx_id = self.groups[key.group_index].sx.id;
        self.emit(CollectionEvent::Updated(sx_id));
        Ok(())
    }

    fn effect_change(&mut self, auto_create_only: bool) -> EffectChangeOutcome {
        let mut outcome = EffectChangeOutcome::default();
        if self.ledger.is_read_only() {
            info!("event=effect_change module=collection status=skipped reason=read_only");
            return outcome;
        }

        let started_at = Instant::now();
        for group_index in 0..self.groups.len() {
            for instance_index in 0..self.groups[group_index].instances.len() {
                let group = &self.groups[group_index];
                let instance = &group.instances[instance_index];
                if !Self::is_eligible(group, instance, auto_create_only) {
                    continue;
                }

                match self.ledger.create_transaction(&group.sx, instance) {
                    Ok(txn_id) => {
                        outcome.created.push(txn_id);
                        let sx_id = group.sx.id;
                        self.groups[group_index].instances[instance_index].state =
                            InstanceState::Created;
                        self.emit(CollectionEvent::Updated(sx_id));
                    }
                    Err(err) => {
                        warn!(
                            "event=effect_change module=collection status=instance_failed group={} instance={} error={}",
                            group_index, instance_index, err
                        );
                        outcome.errors.push(CreationError {
                            sx_name: group.sx.name.clone(),
                            date: instance.date,
                            message: err.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            "event=effect_change module=collection status=ok auto_create_only={} created={} failed={} duration_ms={}",
            auto_create_only,
            outcome.created.len(),
            outcome.errors.len(),
            started_at.elapsed().as_millis()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::InstanceModel;
    use crate::collection::{CollectionError, InstanceCollection};
    use crate::model::amount::Amount;
    use crate::model::instance::{
        Instance, InstanceGroup, InstanceKey, InstanceState, ScheduledTransaction, Variable,
        VariableValue,
    };
    use crate::model::transaction::TransactionId;
    use crate::repo::ledger_repo::{Ledger, LedgerError, LedgerResult};
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[derive(Default)]
    struct CountingLedger {
        created: usize,
    }

    impl Ledger for CountingLedger {
        fn is_read_only(&self) -> bool {
            false
        }

        fn create_transaction(
            &mut self,
            _sx: &ScheduledTransaction,
            instance: &Instance,
        ) -> LedgerResult<TransactionId> {
            if instance.variables.iter().any(|v| !v.value.is_bound()) {
                return Err(LedgerError::InvalidData("unbound".to_string()));
            }
            self.created += 1;
            Ok(Uuid::new_v4())
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn model() -> InstanceModel<CountingLedger> {
        let manual = InstanceGroup::new(ScheduledTransaction::new("Manual"))
            .with_instance(Instance::new(day(1), InstanceState::ToCreate))
            .with_instance(Instance::new(day(2), InstanceState::Reminder));
        let auto = InstanceGroup::new(ScheduledTransaction::new("Auto").auto_create(false))
            .with_instance(Instance::new(day(3), InstanceState::Postponed));
        InstanceModel::with_groups(CountingLedger::default(), vec![manual, auto])
    }

    #[test]
    fn created_state_is_never_user_selectable() {
        let mut model = model();
        let key = InstanceKey::new(0, 0);
        assert_eq!(
            model.change_state(key, InstanceState::Created).unwrap_err(),
            CollectionError::CreatedNotSelectable
        );

        model.effect_change(false);
        assert_eq!(
            model.change_state(key, InstanceState::Ignored).unwrap_err(),
            CollectionError::InstanceAlreadyCreated(key)
        );
    }

    #[test]
    fn auto_create_only_touches_auto_create_groups() {
        let mut model = model();
        let outcome = model.effect_change(true);

        assert_eq!(outcome.created.len(), 1);
        assert_eq!(model.groups()[0].instances[0].state, InstanceState::ToCreate);
        assert_eq!(model.groups()[1].instances[0].state, InstanceState::Created);
    }

    #[test]
    fn set_variable_requires_editable_name() {
        let mut model = model();
        let key = InstanceKey::new(0, 1);
        model
            .replace_instances(
                model.groups()[0].sx.id,
                vec![
                    Instance::new(day(1), InstanceState::ToCreate),
                    Instance::new(day(2), InstanceState::Reminder)
                        .with_variable(Variable::internal("i", Amount::ZERO))
                        .with_variable(Variable::unbound("amount")),
                ],
            )
            .unwrap();

        assert!(matches!(
            model.set_variable(key, "i", VariableValue::Bound(Amount::ZERO)),
            Err(CollectionError::VariableNotFound { .. })
        ));
        model
            .set_variable(key, "amount", VariableValue::Bound(Amount::from_units(4)))
            .unwrap();
        assert!(model.check_variables().is_empty());
        // Binding alone never changes the state; the controller owns that rule.
        assert_eq!(model.groups()[0].instances[1].state, InstanceState::Reminder);
    }

    #[test]
    fn summary_counts_auto_create_instances() {
        let summary = model().summarize();
        assert_eq!(summary.num_instances, 3);
        assert_eq!(summary.num_to_create_instances, 1);
        assert_eq!(summary.num_auto_create_no_notify_instances, 1);
        assert!(summary.need_dialog);
    }
}
