//! Ledger transaction drafts built from scheduled transaction instances.
//!
//! # Responsibility
//! - Resolve template split amounts against instance variable bindings.
//! - Reject drafts that cannot become valid ledger transactions.
//!
//! # Invariants
//! - A draft always has at least one posting.
//! - Posting amounts of a draft sum to zero.

use crate::model::amount::Amount;
use crate::model::instance::{Instance, ScheduledTransaction, SplitAmount, SxId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a materialized ledger transaction.
pub type TransactionId = Uuid;

/// One resolved posting line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub account: String,
    pub amount: Amount,
}

/// Validated, balanced transaction ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub sx_id: SxId,
    pub description: String,
    pub post_date: NaiveDate,
    pub postings: Vec<Posting>,
}

/// Reasons an instance cannot be turned into a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    /// Template has no splits.
    EmptyTemplate,
    /// Split references a variable the instance does not carry.
    UnknownVariable(String),
    /// Split references a variable without a value.
    UnboundVariable(String),
    /// Postings do not sum to zero.
    Unbalanced { imbalance: Amount },
    /// An amount or the posting total leaves the representable range.
    Overflow,
}

impl Display for DraftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTemplate => write!(f, "template has no splits"),
            Self::UnknownVariable(name) => write!(f, "unknown variable `{name}`"),
            Self::UnboundVariable(name) => write!(f, "variable `{name}` has no value"),
            Self::Unbalanced { imbalance } => {
                write!(f, "transaction is unbalanced by {imbalance}")
            }
            Self::Overflow => write!(f, "transaction amount is out of range"),
        }
    }
}

impl Error for DraftError {}

impl TransactionDraft {
    /// Builds a balanced draft for `instance` of `sx`.
    pub fn from_instance(
        sx: &ScheduledTransaction,
        instance: &Instance,
    ) -> Result<Self, DraftError> {
        if sx.template.is_empty() {
            return Err(DraftError::EmptyTemplate);
        }

        let postings = sx
            .template
            .iter()
            .map(|split| {
                let amount = resolve_amount(&split.amount, instance)?;
                Ok(Posting {
                    account: split.account.clone(),
                    amount,
                })
            })
            .collect::<Result<Vec<_>, DraftError>>()?;

        let imbalance = Amount::checked_sum(postings.iter().map(|posting| posting.amount))
            .ok_or(DraftError::Overflow)?;
        if !imbalance.is_zero() {
            return Err(DraftError::Unbalanced { imbalance });
        }

        Ok(Self {
            sx_id: sx.id,
            description: sx.name.clone(),
            post_date: instance.date,
            postings,
        })
    }
}

fn resolve_amount(amount: &SplitAmount, instance: &Instance) -> Result<Amount, DraftError> {
    let (name, negate) = match amount {
        SplitAmount::Literal(value) => return Ok(*value),
        SplitAmount::Variable(name) => (name, false),
        SplitAmount::NegatedVariable(name) => (name, true),
    };

    let variable = instance
        .variable(name)
        .ok_or_else(|| DraftError::UnknownVariable(name.clone()))?;
    let value = variable
        .value
        .amount()
        .ok_or_else(|| DraftError::UnboundVariable(name.clone()))?;
    if negate {
        value.checked_neg().ok_or(DraftError::Overflow)
    } else {
        Ok(value)
    }
}
