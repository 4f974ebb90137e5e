//! Instance collection contract consumed by the review engine.
//!
//! # Responsibility
//! - Define the ordered group/instance/variable view and the mutations the
//!   review engine feeds back (`change_state`, `set_variable`,
//!   `effect_change`).
//! - Provide the validator and summary as default trait logic so every
//!   implementation scans in the same order.
//!
//! # Invariants
//! - Every mutation that changes a group emits `Updated` for that group.
//! - Materialization never aborts on a single failed instance.

pub mod events;
pub mod instance_model;

use crate::model::instance::{
    Instance, InstanceGroup, InstanceKey, InstanceState, SxId, VariableNeeded, VariableValue,
};
use crate::model::transaction::TransactionId;
use chrono::NaiveDate;
use events::{CollectionListener, ListenerId, Subscription};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Weak;

pub type CollectionResult<T> = Result<T, CollectionError>;

/// Errors from collection mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// Key does not address a live instance.
    InstanceNotFound(InstanceKey),
    /// Instance has no editable variable with this name.
    VariableNotFound { instance: InstanceKey, name: String },
    /// `Created` is reached only through materialization.
    CreatedNotSelectable,
    /// Created instances are frozen.
    InstanceAlreadyCreated(InstanceKey),
    /// Group id is not part of the collection.
    GroupNotFound(SxId),
}

impl Display for CollectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InstanceNotFound(key) => write!(
                f,
                "instance not found: group {} instance {}",
                key.group_index, key.instance_index
            ),
            Self::VariableNotFound { instance, name } => write!(
                f,
                "editable variable `{name}` not found on group {} instance {}",
                instance.group_index, instance.instance_index
            ),
            Self::CreatedNotSelectable => {
                write!(f, "instances cannot be set to created directly")
            }
            Self::InstanceAlreadyCreated(key) => write!(
                f,
                "instance already created: group {} instance {}",
                key.group_index, key.instance_index
            ),
            Self::GroupNotFound(id) => write!(f, "scheduled transaction not found: {id}"),
        }
    }
}

impl Error for CollectionError {}

/// Why one instance failed to materialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationError {
    pub sx_name: String,
    pub date: NaiveDate,
    pub message: String,
}

impl Display for CreationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\"{}\" on {}: {}",
            self.sx_name,
            self.date.format("%Y-%m-%d"),
            self.message
        )
    }
}

/// Result of one materialization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectChangeOutcome {
    pub created: Vec<TransactionId>,
    pub errors: Vec<CreationError>,
}

impl EffectChangeOutcome {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.errors.is_empty()
    }

    /// All creation errors as one report, one line per failed instance.
    pub fn error_report(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

/// Counts used by the startup pass to decide whether review is needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceSummary {
    pub need_dialog: bool,
    pub num_instances: usize,
    pub num_to_create_instances: usize,
    pub num_auto_create_instances: usize,
    pub num_auto_create_no_notify_instances: usize,
}

/// Ordered collection of scheduled transaction instance groups.
pub trait InstanceCollection {
    /// Groups in collection order.
    fn groups(&self) -> &[InstanceGroup];

    /// Whether the backing book refuses modifications.
    fn is_read_only(&self) -> bool;

    /// Registers a change listener.
    fn subscribe(&mut self, listener: Weak<dyn CollectionListener>) -> Subscription;

    /// Removes a change listener. Returns `false` when unknown.
    fn unsubscribe(&mut self, id: ListenerId) -> bool;

    /// Sets a user-selectable state on one instance.
    fn change_state(&mut self, key: InstanceKey, state: InstanceState) -> CollectionResult<()>;

    /// Binds or clears one editable variable.
    fn set_variable(
        &mut self,
        key: InstanceKey,
        name: &str,
        value: VariableValue,
    ) -> CollectionResult<()>;

    /// Materializes eligible instances, collecting per-instance failures.
    fn effect_change(&mut self, auto_create_only: bool) -> EffectChangeOutcome;

    /// Returns every editable variable without a value.
    ///
    /// Order is group, then instance, then editable variable.
    fn check_variables(&self) -> Vec<VariableNeeded> {
        let mut needed = Vec::new();
        for (group_index, group) in self.groups().iter().enumerate() {
            for (instance_index, instance) in group.instances.iter().enumerate() {
                for (editable_index, variable) in instance.editable_variables().enumerate() {
                    if variable.value.is_bound() {
                        continue;
                    }
                    needed.push(VariableNeeded {
                        instance: InstanceKey::new(group_index, instance_index),
                        editable_index,
                        name: variable.name.clone(),
                    });
                }
            }
        }
        needed
    }

    /// Summarizes instances for the startup pass.
    fn summarize(&self) -> InstanceSummary {
        let mut summary = InstanceSummary::default();
        for group in self.groups() {
            for instance in &group.instances {
                summary.num_instances += 1;
                if group.sx.auto_create {
                    if group.sx.notify {
                        summary.num_auto_create_instances += 1;
                    } else {
                        summary.num_auto_create_no_notify_instances += 1;
                    }
                } else if instance.state == InstanceState::ToCreate {
                    summary.num_to_create_instances += 1;
                }
            }
        }
        summary.need_dialog =
            summary.num_instances != summary.num_auto_create_no_notify_instances;
        summary
    }

    /// Returns the instance addressed by `key`.
    fn instance(&self, key: InstanceKey) -> Option<&Instance> {
        self.groups()
            .get(key.group_index)?
            .instances
            .get(key.instance_index)
    }
}
