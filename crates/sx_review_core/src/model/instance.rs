//! Scheduled transaction instance domain model.
//!
//! # Responsibility
//! - Define scheduled transactions, their due instances and variables.
//! - Own the instance state vocabulary shared by projection and controller.
//!
//! # Invariants
//! - `Created` is terminal and never user-selectable.
//! - Only `editable` variables are addressable from review callers; every
//!   index exposed by this module counts editable variables only.

use crate::model::amount::Amount;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one scheduled transaction definition.
pub type SxId = Uuid;

/// Disposition of one due instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Skipped for good; nothing will be created.
    Ignored,
    /// Deferred to a later review session.
    Postponed,
    /// Accepted; will be created on commit.
    ToCreate,
    /// Shown in advance; not created unless promoted.
    Reminder,
    /// Materialized into a ledger transaction.
    Created,
}

impl InstanceState {
    /// States a user may pick from the status control, in display order.
    pub const USER_SELECTABLE: [InstanceState; 4] = [
        InstanceState::Ignored,
        InstanceState::Postponed,
        InstanceState::ToCreate,
        InstanceState::Reminder,
    ];

    /// Returns the user-facing status label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ignored => "Ignored",
            Self::Postponed => "Postponed",
            Self::ToCreate => "To-Create",
            Self::Reminder => "Reminder",
            Self::Created => "Created",
        }
    }

    /// Maps a status label back to a user-selectable state.
    ///
    /// `Created` is deliberately not reachable from a label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::USER_SELECTABLE
            .into_iter()
            .find(|state| state.label() == label.trim())
    }

    /// Whether the status control accepts edits for this state.
    pub fn is_user_editable(self) -> bool {
        self != Self::Created
    }
}

/// Binding of one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "amount")]
pub enum VariableValue {
    Bound(Amount),
    /// No valid value; must be supplied before the instance can be created.
    Unbound,
}

impl VariableValue {
    pub fn is_bound(self) -> bool {
        matches!(self, Self::Bound(_))
    }

    pub fn amount(self) -> Option<Amount> {
        match self {
            Self::Bound(amount) => Some(amount),
            Self::Unbound => None,
        }
    }
}

/// Named numeric slot of a scheduled transaction template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: VariableValue,
    /// `false` for formula-engine internals that are never surfaced.
    pub editable: bool,
}

impl Variable {
    /// Creates a user-bindable variable with no value yet.
    pub fn unbound(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: VariableValue::Unbound,
            editable: true,
        }
    }

    /// Creates a user-bindable variable with an initial value.
    pub fn bound(name: impl Into<String>, amount: Amount) -> Self {
        Self {
            name: name.into(),
            value: VariableValue::Bound(amount),
            editable: true,
        }
    }

    /// Creates a formula-internal variable.
    pub fn internal(name: impl Into<String>, amount: Amount) -> Self {
        Self {
            name: name.into(),
            value: VariableValue::Bound(amount),
            editable: false,
        }
    }
}

/// One due occurrence of a scheduled transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub date: NaiveDate,
    pub state: InstanceState,
    pub variables: Vec<Variable>,
}

impl Instance {
    pub fn new(date: NaiveDate, state: InstanceState) -> Self {
        Self {
            date,
            state,
            variables: Vec::new(),
        }
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    /// Iterates editable variables in declaration order.
    pub fn editable_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|variable| variable.editable)
    }

    /// Returns the `index`-th editable variable.
    pub fn editable_variable(&self, index: usize) -> Option<&Variable> {
        self.editable_variables().nth(index)
    }

    /// Returns the editable index of the named variable.
    pub fn editable_index_of(&self, name: &str) -> Option<usize> {
        self.editable_variables()
            .position(|variable| variable.name == name)
    }

    /// Returns any variable, editable or internal, by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    pub(crate) fn editable_variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables
            .iter_mut()
            .find(|variable| variable.editable && variable.name == name)
    }
}

/// Amount source of one template split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitAmount {
    Literal(Amount),
    Variable(String),
    NegatedVariable(String),
}

impl SplitAmount {
    /// Variable name referenced by this split, if any.
    pub fn variable_name(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Variable(name) | Self::NegatedVariable(name) => Some(name.as_str()),
        }
    }
}

/// One posting line of a scheduled transaction template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSplit {
    pub account: String,
    pub amount: SplitAmount,
}

impl TemplateSplit {
    pub fn new(account: impl Into<String>, amount: SplitAmount) -> Self {
        Self {
            account: account.into(),
            amount,
        }
    }
}

/// Scheduled transaction definition as produced by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTransaction {
    pub id: SxId,
    pub name: String,
    /// Instances are created without review when set.
    pub auto_create: bool,
    /// Auto-created instances are announced to the user when set.
    pub notify: bool,
    pub template: Vec<TemplateSplit>,
}

impl ScheduledTransaction {
    /// Creates a manual (non auto-create) definition with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            auto_create: false,
            notify: false,
            template: Vec::new(),
        }
    }

    pub fn auto_create(mut self, notify: bool) -> Self {
        self.auto_create = true;
        self.notify = notify;
        self
    }

    pub fn with_split(mut self, split: TemplateSplit) -> Self {
        self.template.push(split);
        self
    }
}

/// Scheduled transaction plus its due instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub sx: ScheduledTransaction,
    pub instances: Vec<Instance>,
}

impl InstanceGroup {
    pub fn new(sx: ScheduledTransaction) -> Self {
        Self {
            sx,
            instances: Vec::new(),
        }
    }

    pub fn with_instance(mut self, instance: Instance) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Positional address of one instance in the live collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey {
    pub group_index: usize,
    pub instance_index: usize,
}

impl InstanceKey {
    pub fn new(group_index: usize, instance_index: usize) -> Self {
        Self {
            group_index,
            instance_index,
        }
    }
}

/// Editable variable that still holds no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableNeeded {
    pub instance: InstanceKey,
    /// Index among the instance's editable variables.
    pub editable_index: usize,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::{Instance, InstanceState, Variable};
    use crate::model::amount::Amount;
    use chrono::NaiveDate;

    #[test]
    fn labels_round_trip_for_user_states_only() {
        for state in InstanceState::USER_SELECTABLE {
            assert_eq!(InstanceState::from_label(state.label()), Some(state));
        }
        assert_eq!(InstanceState::from_label("Created"), None);
        assert_eq!(InstanceState::from_label("Unknown"), None);
        assert!(!InstanceState::Created.is_user_editable());
    }

    #[test]
    fn editable_indices_skip_internal_variables() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let instance = Instance::new(date, InstanceState::ToCreate)
            .with_variable(Variable::internal("i", Amount::from_units(1)))
            .with_variable(Variable::unbound("rent"))
            .with_variable(Variable::internal("j", Amount::ZERO))
            .with_variable(Variable::unbound("fee"));

        assert_eq!(instance.editable_index_of("rent"), Some(0));
        assert_eq!(instance.editable_index_of("fee"), Some(1));
        assert_eq!(instance.editable_index_of("i"), None);
        assert_eq!(
            instance.editable_variable(1).map(|v| v.name.as_str()),
            Some("fee")
        );
        assert!(instance.editable_variable(2).is_none());
    }
}
