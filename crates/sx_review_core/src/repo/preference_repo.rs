//! Preference store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist opaque review configuration between sessions.
//! - Decode stored values into `ReviewPreferences`, falling back to defaults
//!   for keys that were never written.
//!
//! # Invariants
//! - Values are stored JSON-encoded, one row per `(group, key)`.

use crate::db::DbError;
use crate::model::preferences::{
    ReviewPreferences, PREFS_GROUP_STARTUP, PREF_REVIEW_CREATED, PREF_RUN_AT_OPEN,
    PREF_SHOW_AT_OPEN, PREF_SORT_ASCENDING, PREF_SORT_COLUMN,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PreferenceResult<T> = Result<T, PreferenceError>;

#[derive(Debug)]
pub enum PreferenceError {
    Db(DbError),
    /// Stored value does not decode into the expected type.
    InvalidValue {
        group: String,
        key: String,
        message: String,
    },
}

impl Display for PreferenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidValue {
                group,
                key,
                message,
            } => write!(f, "invalid preference {group}/{key}: {message}"),
        }
    }
}

impl Error for PreferenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for PreferenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Raw key/value preference storage.
pub trait PreferenceRepository {
    /// Loads the JSON-encoded value of one key.
    fn get_raw(&self, group: &str, key: &str) -> PreferenceResult<Option<String>>;
    /// Stores the JSON-encoded value of one key.
    fn set_raw(&self, group: &str, key: &str, value_json: &str) -> PreferenceResult<()>;
}

/// Loads and decodes one typed preference.
pub fn get_pref<T: DeserializeOwned>(
    repo: &impl PreferenceRepository,
    group: &str,
    key: &str,
) -> PreferenceResult<Option<T>> {
    let Some(raw) = repo.get_raw(group, key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| PreferenceError::InvalidValue {
            group: group.to_string(),
            key: key.to_string(),
            message: err.to_string(),
        })
}

/// Encodes and stores one typed preference.
pub fn set_pref<T: Serialize>(
    repo: &impl PreferenceRepository,
    group: &str,
    key: &str,
    value: &T,
) -> PreferenceResult<()> {
    let encoded = serde_json::to_string(value).map_err(|err| PreferenceError::InvalidValue {
        group: group.to_string(),
        key: key.to_string(),
        message: err.to_string(),
    })?;
    repo.set_raw(group, key, &encoded)
}

/// Reads review preferences; absent keys keep their defaults.
pub fn load_review_preferences(
    repo: &impl PreferenceRepository,
) -> PreferenceResult<ReviewPreferences> {
    let defaults = ReviewPreferences::default();
    let group = PREFS_GROUP_STARTUP;
    Ok(ReviewPreferences {
        run_at_open: get_pref(repo, group, PREF_RUN_AT_OPEN)?.unwrap_or(defaults.run_at_open),
        show_at_open: get_pref(repo, group, PREF_SHOW_AT_OPEN)?.unwrap_or(defaults.show_at_open),
        review_created: get_pref(repo, group, PREF_REVIEW_CREATED)?
            .unwrap_or(defaults.review_created),
        sort_column: get_pref(repo, group, PREF_SORT_COLUMN)?.unwrap_or(defaults.sort_column),
        sort_ascending: get_pref(repo, group, PREF_SORT_ASCENDING)?
            .unwrap_or(defaults.sort_ascending),
    })
}

/// Writes every review preference key.
pub fn save_review_preferences(
    repo: &impl PreferenceRepository,
    prefs: &ReviewPreferences,
) -> PreferenceResult<()> {
    let group = PREFS_GROUP_STARTUP;
    set_pref(repo, group, PREF_RUN_AT_OPEN, &prefs.run_at_open)?;
    set_pref(repo, group, PREF_SHOW_AT_OPEN, &prefs.show_at_open)?;
    set_pref(repo, group, PREF_REVIEW_CREATED, &prefs.review_created)?;
    set_pref(repo, group, PREF_SORT_COLUMN, &prefs.sort_column)?;
    set_pref(repo, group, PREF_SORT_ASCENDING, &prefs.sort_ascending)?;
    Ok(())
}

/// Writes only the keys a review session edits: sort and review toggle.
pub fn save_session_preferences(
    repo: &impl PreferenceRepository,
    prefs: &ReviewPreferences,
) -> PreferenceResult<()> {
    let group = PREFS_GROUP_STARTUP;
    set_pref(repo, group, PREF_REVIEW_CREATED, &prefs.review_created)?;
    set_pref(repo, group, PREF_SORT_COLUMN, &prefs.sort_column)?;
    set_pref(repo, group, PREF_SORT_ASCENDING, &prefs.sort_ascending)?;
    Ok(())
}

/// SQLite-backed preference repository.
pub struct SqlitePreferenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePreferenceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PreferenceRepository for SqlitePreferenceRepository<'_> {
    fn get_raw(&self, group: &str, key: &str) -> PreferenceResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value_json FROM preferences WHERE pref_group = ?1 AND pref_key = ?2;",
                params![group, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_raw(&self, group: &str, key: &str, value_json: &str) -> PreferenceResult<()> {
        self.conn.execute(
            "INSERT INTO preferences (pref_group, pref_key, value_json)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (pref_group, pref_key) DO UPDATE SET
                value_json = excluded.value_json,
                updated_at = CAST(strftime('%s', 'now') AS INTEGER) * 1000;",
            params![group, key, value_json],
        )?;
        Ok(())
    }
}
