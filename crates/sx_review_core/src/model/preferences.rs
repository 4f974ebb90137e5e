//! Review session preferences.
//!
//! Read once when a review session starts and written once when it ends.

use serde::{Deserialize, Serialize};

/// Preference group for the startup pass.
pub const PREFS_GROUP_STARTUP: &str = "dialogs.sched-xactions.since-last-run";

pub const PREF_RUN_AT_OPEN: &str = "show-at-file-open";
pub const PREF_SHOW_AT_OPEN: &str = "show-notify-window-at-file-open";
pub const PREF_REVIEW_CREATED: &str = "review-transactions";
pub const PREF_SORT_COLUMN: &str = "sort-column";
pub const PREF_SORT_ASCENDING: &str = "sort-ascending";

/// Column the review tree is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    /// Transaction name column, ordered by earliest occurrence.
    #[default]
    Transaction,
    /// Status column, ordered by first instance status label.
    Status,
}

/// Direction applied on top of a sort column comparator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending {
            Self::Ascending
        } else {
            Self::Descending
        }
    }

    pub fn is_ascending(self) -> bool {
        self == Self::Ascending
    }
}

/// Opaque configuration consumed by the review engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPreferences {
    /// Run the since-last-run pass when a book is opened.
    pub run_at_open: bool,
    /// Tell the user about auto-created transactions when no review is needed.
    pub show_at_open: bool,
    /// Open the created transactions for review after commit.
    pub review_created: bool,
    pub sort_column: SortColumn,
    pub sort_ascending: bool,
}

impl Default for ReviewPreferences {
    fn default() -> Self {
        Self {
            run_at_open: true,
            show_at_open: true,
            review_created: false,
            sort_column: SortColumn::Transaction,
            sort_ascending: true,
        }
    }
}

impl ReviewPreferences {
    pub fn sort_order(&self) -> SortOrder {
        SortOrder::from_ascending(self.sort_ascending)
    }
}
