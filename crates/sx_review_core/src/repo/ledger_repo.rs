//! Ledger contract and SQLite implementation.
//!
//! # Responsibility
//! - Turn one scheduled transaction instance into a recorded transaction.
//! - Expose the book's read-only flag to the review engine.
//!
//! # Invariants
//! - A transaction and all of its splits are written atomically.
//! - Read-only ledgers never write.

use crate::db::DbError;
use crate::model::amount::Amount;
use crate::model::instance::{Instance, ScheduledTransaction};
use crate::model::transaction::{DraftError, Posting, TransactionDraft, TransactionId};
use chrono::NaiveDate;
use rusqlite::{params, Connection, DatabaseName};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors from ledger transaction creation.
#[derive(Debug)]
pub enum LedgerError {
    /// Book is read-only; nothing may be recorded.
    ReadOnly,
    /// Instance could not be resolved into a balanced transaction.
    Draft(DraftError),
    /// Underlying storage failure.
    Db(DbError),
    /// Persisted data cannot be converted back into a transaction.
    InvalidData(String),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "book is read-only"),
            Self::Draft(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid ledger data: {message}"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Draft(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::ReadOnly | Self::InvalidData(_) => None,
        }
    }
}

impl From<DraftError> for LedgerError {
    fn from(value: DraftError) -> Self {
        Self::Draft(value)
    }
}

impl From<DbError> for LedgerError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Book that scheduled transaction instances are materialized into.
pub trait Ledger {
    /// Whether the book refuses all modifications.
    fn is_read_only(&self) -> bool;
    /// Records a transaction for `instance` and returns its id.
    fn create_transaction(
        &mut self,
        sx: &ScheduledTransaction,
        instance: &Instance,
    ) -> LedgerResult<TransactionId>;
}

/// Recorded transaction read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTransaction {
    pub id: TransactionId,
    pub sx_id: Uuid,
    pub description: String,
    pub post_date: NaiveDate,
    pub postings: Vec<Posting>,
}

/// SQLite-backed ledger.
pub struct SqliteLedger<'conn> {
    conn: &'conn Connection,
    read_only: bool,
}

impl<'conn> SqliteLedger<'conn> {
    /// Creates a ledger over a migrated connection.
    ///
    /// Connections opened read-only at the SQLite level are reported as
    /// read-only books.
    pub fn new(conn: &'conn Connection) -> Self {
        let read_only = conn.is_readonly(DatabaseName::Main).unwrap_or(false);
        Self { conn, read_only }
    }

    /// Marks the book read-only regardless of connection mode.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = self.read_only || read_only;
        self
    }

    /// Loads one recorded transaction with its splits.
    pub fn get_transaction(
        &self,
        id: TransactionId,
    ) -> LedgerResult<Option<RecordedTransaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT sx_uuid, description, post_date
             FROM transactions
             WHERE txn_uuid = ?1;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let sx_raw: String = row.get(0)?;
        let description: String = row.get(1)?;
        let date_raw: String = row.get(2)?;
        let sx_id = Uuid::parse_str(&sx_raw)
            .map_err(|err| LedgerError::InvalidData(format!("sx_uuid `{sx_raw}`: {err}")))?;
        let post_date = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d")
            .map_err(|err| LedgerError::InvalidData(format!("post_date `{date_raw}`: {err}")))?;

        Ok(Some(RecordedTransaction {
            id,
            sx_id,
            description,
            post_date,
            postings: self.load_postings(id)?,
        }))
    }

    /// Counts recorded transactions.
    pub fn transaction_count(&self) -> LedgerResult<u64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM transactions;", [], |row| {
                row.get::<_, i64>(0)
            })?;
        u64::try_from(count).map_err(|_| LedgerError::InvalidData(format!("count {count}")))
    }

    fn load_postings(&self, id: TransactionId) -> LedgerResult<Vec<Posting>> {
        let mut stmt = self.conn.prepare(
            "SELECT account, amount_hundredths
             FROM splits
             WHERE txn_uuid = ?1
             ORDER BY position ASC;",
        )?;
        let postings = stmt
            .query_map([id.to_string()], |row| {
                Ok(Posting {
                    account: row.get(0)?,
                    amount: Amount::from_hundredths(row.get(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(postings)
    }

    fn insert_draft(&self, draft: &TransactionDraft) -> LedgerResult<TransactionId> {
        let id = Uuid::new_v4();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO transactions (txn_uuid, sx_uuid, description, post_date)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                id.to_string(),
                draft.sx_id.to_string(),
                draft.description,
                draft.post_date.format("%Y-%m-%d").to_string(),
            ],
        )?;
        for (position, posting) in draft.postings.iter().enumerate() {
            tx.execute(
                "INSERT INTO splits (txn_uuid, position, account, amount_hundredths)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    id.to_string(),
                    i64::try_from(position).unwrap_or(i64::MAX),
                    posting.account,
                    posting.amount.hundredths(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(id)
    }
}

impl Ledger for SqliteLedger<'_> {
    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn create_transaction(
        &mut self,
        sx: &ScheduledTransaction,
        instance: &Instance,
    ) -> LedgerResult<TransactionId> {
        if self.read_only {
            return Err(LedgerError::ReadOnly);
        }
        let draft = TransactionDraft::from_instance(sx, instance)?;
        self.insert_draft(&draft)
    }
}
