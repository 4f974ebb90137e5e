//! Since-last-run review session.
//!
//! # Responsibility
//! - Translate user edits on the (sorted) review tree into collection
//!   mutations.
//! - Validate variable bindings before commit and focus the first gap.
//! - Materialize accepted instances with `updated` delivery suppressed and
//!   exactly one projection refresh afterwards.
//! - Read review preferences at session start; at the end write back only
//!   the sort and review keys the session edits.
//!
//! # Invariants
//! - A read-only book is never modified and never refreshed by commit.
//! - Binding a well-formed value on a `Reminder` instance promotes it to
//!   `ToCreate`; no other edit changes state implicitly.
//! - Per-instance creation failures are reported, never raised.

use crate::collection::{CollectionError, EffectChangeOutcome, InstanceCollection};
use crate::model::amount::{Amount, AmountParseError};
use crate::model::instance::{InstanceState, VariableNeeded, VariableValue};
use crate::model::preferences::{ReviewPreferences, SortColumn, SortOrder};
use crate::model::transaction::TransactionId;
use crate::projection::sort::SortProxy;
use crate::projection::tree::TreePath;
use crate::projection::ReviewProjection;
use crate::repo::preference_repo::{
    load_review_preferences, save_session_preferences, PreferenceError, PreferenceRepository,
};
use log::{debug, error, info, warn};
use std::cell::{Cell, Ref, RefCell};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type ReviewResult<T> = Result<T, ReviewError>;

/// Errors from review session operations.
#[derive(Debug)]
pub enum ReviewError {
    /// View path does not address a row of the expected kind.
    InvalidPath(TreePath),
    /// Status label is not one of the user-selectable states.
    UnknownStateLabel(String),
    /// Variable input is neither blank nor a valid amount.
    InvalidAmount {
        input: String,
        source: AmountParseError,
    },
    /// Dialog response code outside the known set.
    UnknownResponse(i32),
    /// Session was already closed.
    SessionClosed,
    Collection(CollectionError),
    Preference(PreferenceError),
}

impl Display for ReviewError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPath(path) => write!(f, "invalid review path [{path}]"),
            Self::UnknownStateLabel(label) => write!(f, "unknown instance state [{label}]"),
            Self::InvalidAmount { input, .. } => write!(f, "error parsing value [{input}]"),
            Self::UnknownResponse(code) => write!(f, "unknown response id [{code}]"),
            Self::SessionClosed => write!(f, "review session is closed"),
            Self::Collection(err) => write!(f, "{err}"),
            Self::Preference(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReviewError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidAmount { source, .. } => Some(source),
            Self::Collection(err) => Some(err),
            Self::Preference(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CollectionError> for ReviewError {
    fn from(value: CollectionError) -> Self {
        Self::Collection(value)
    }
}

impl From<PreferenceError> for ReviewError {
    fn from(value: PreferenceError) -> Self {
        Self::Preference(value)
    }
}

/// Result of a commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Commit blocked; editable variables still hold no value.
    NeedsValues {
        /// View path of the first unbound variable.
        focus: Option<TreePath>,
        unbound: Vec<VariableNeeded>,
    },
    /// Materialization ran.
    Committed {
        /// Every transaction created during the session, auto-created first.
        created: Vec<TransactionId>,
        /// One line per failed instance.
        error_report: Option<String>,
        /// Caller should open `created` for review.
        review_created: bool,
    },
}

/// User response to the review dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewResponse {
    Ok,
    Cancel,
    DeleteEvent,
    Help,
    Unknown(i32),
}

impl ReviewResponse {
    pub const CODE_DELETE_EVENT: i32 = -4;
    pub const CODE_OK: i32 = -5;
    pub const CODE_CANCEL: i32 = -6;
    pub const CODE_HELP: i32 = -11;

    /// Maps a raw dialog response code.
    pub fn from_code(code: i32) -> Self {
        match code {
            Self::CODE_OK => Self::Ok,
            Self::CODE_CANCEL => Self::Cancel,
            Self::CODE_DELETE_EVENT => Self::DeleteEvent,
            Self::CODE_HELP => Self::Help,
            other => Self::Unknown(other),
        }
    }
}

/// What the caller should do after a response was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    HelpRequested,
    /// Commit ran or was blocked; the session stays open only when blocked.
    Commit(CommitOutcome),
    Closed,
}

/// One interactive review of a collection.
pub struct ReviewSession<C: InstanceCollection> {
    projection: ReviewProjection<C>,
    sort: RefCell<SortProxy>,
    /// Projection generation the permutation was computed against.
    sorted_generation: Cell<u64>,
    preferences: ReviewPreferences,
    created: Vec<TransactionId>,
    open: bool,
}

impl<C: InstanceCollection> ReviewSession<C> {
    /// Starts a session with already-loaded preferences.
    ///
    /// `auto_created` carries transactions created by the startup pass.
    pub fn new(
        collection: Rc<RefCell<C>>,
        preferences: ReviewPreferences,
        auto_created: Vec<TransactionId>,
    ) -> Self {
        let projection = ReviewProjection::new(collection);
        let sort = SortProxy::new(
            &projection,
            preferences.sort_column,
            preferences.sort_order(),
        );
        info!(
            "event=review_open module=review status=ok groups={} auto_created={}",
            sort.len(),
            auto_created.len()
        );
        Self {
            sorted_generation: Cell::new(projection.generation()),
            projection,
            sort: RefCell::new(sort),
            preferences,
            created: auto_created,
            open: true,
        }
    }

    /// Starts a session reading preferences from `prefs`.
    pub fn open(
        collection: Rc<RefCell<C>>,
        prefs: &impl PreferenceRepository,
        auto_created: Vec<TransactionId>,
    ) -> ReviewResult<Self> {
        let preferences = load_review_preferences(prefs)?;
        Ok(Self::new(collection, preferences, auto_created))
    }

    pub fn projection(&self) -> &ReviewProjection<C> {
        &self.projection
    }

    /// Top-level permutation, re-sorted first if the projection changed.
    pub fn sort_proxy(&self) -> Ref<'_, SortProxy> {
        self.synced_sort()
    }

    pub fn preferences(&self) -> &ReviewPreferences {
        &self.preferences
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Transactions created so far in this session.
    pub fn created_transactions(&self) -> &[TransactionId] {
        &self.created
    }

    pub fn set_review_created(&mut self, review_created: bool) {
        self.preferences.review_created = review_created;
    }

    /// Changes the presentation order of top-level rows.
    pub fn set_sort(&mut self, column: SortColumn, order: SortOrder) {
        self.sort
            .borrow_mut()
            .set_sort(&self.projection, column, order);
        self.sorted_generation.set(self.projection.generation());
        self.preferences.sort_column = column;
        self.preferences.sort_ascending = order.is_ascending();
    }

    /// Maps a sorted-view path to the projection path.
    pub fn model_path(&self, view_path: &TreePath) -> ReviewResult<TreePath> {
        self.synced_sort()
            .view_to_child(view_path)
            .ok_or_else(|| invalid_path(view_path))
    }

    /// Applies a status-control edit to the instance row at `view_path`.
    pub fn change_instance_state(&mut self, view_path: &TreePath, label: &str) -> ReviewResult<()> {
        self.ensure_open()?;
        let Some(state) = InstanceState::from_label(label) else {
            warn!("event=state_change module=review status=error reason=unknown_label label={label}");
            return Err(ReviewError::UnknownStateLabel(label.to_string()));
        };
        let model_path = self.model_path(view_path)?;
        let key = self
            .projection
            .instance_at(&model_path)
            .ok_or_else(|| invalid_path(view_path))?;

        self.projection
            .collection()
            .borrow_mut()
            .change_state(key, state)?;
        Ok(())
    }

    /// Applies a value edit to the variable row at `view_path`.
    ///
    /// Blank input clears the binding. Malformed input also clears it and is
    /// reported as `InvalidAmount`.
    pub fn set_variable_value(&mut self, view_path: &TreePath, input: &str) -> ReviewResult<()> {
        self.ensure_open()?;
        let model_path = self.model_path(view_path)?;
        let target = self
            .projection
            .instance_and_variable_at(&model_path)
            .ok_or_else(|| {
                error!("event=variable_edit module=review status=error reason=not_a_variable path={view_path}");
                invalid_path(view_path)
            })?;
        debug!(
            "event=variable_edit module=review status=start path={view_path} variable={}",
            target.name
        );

        let parsed = if input.trim().is_empty() {
            None
        } else {
            match input.parse::<Amount>() {
                Ok(amount) => Some(amount),
                Err(err) => {
                    warn!("event=variable_edit module=review status=error reason=parse input={input}");
                    self.projection.collection().borrow_mut().set_variable(
                        target.instance,
                        &target.name,
                        VariableValue::Unbound,
                    )?;
                    return Err(ReviewError::InvalidAmount {
                        input: input.to_string(),
                        source: err,
                    });
                }
            }
        };

        let mut collection = self.projection.collection().borrow_mut();
        match parsed {
            None => collection.set_variable(target.instance, &target.name, VariableValue::Unbound)?,
            Some(amount) => {
                let is_reminder = collection
                    .instance(target.instance)
                    .is_some_and(|instance| instance.state == InstanceState::Reminder);
                if is_reminder {
                    collection.change_state(target.instance, InstanceState::ToCreate)?;
                }
                collection.set_variable(
                    target.instance,
                    &target.name,
                    VariableValue::Bound(amount),
                )?;
            }
        }
        Ok(())
    }

    /// Validates bindings and, when complete, materializes `ToCreate`
    /// instances.
    pub fn commit(&mut self) -> ReviewResult<CommitOutcome> {
        self.ensure_open()?;
        let unbound = self.projection.collection().borrow().check_variables();
        info!(
            "event=review_commit module=review status=validated unbound={}",
            unbound.len()
        );
        if let Some(first) = unbound.first() {
            let focus = self
                .projection
                .path_for_variable(first)
                .and_then(|path| self.synced_sort().child_to_view(&path));
            return Ok(CommitOutcome::NeedsValues { focus, unbound });
        }

        let outcome = self.effect_change(false);
        let error_report = outcome.error_report();
        self.created.extend(outcome.created);
        Ok(CommitOutcome::Committed {
            created: self.created.clone(),
            error_report,
            review_created: self.preferences.review_created && !self.created.is_empty(),
        })
    }

    /// Materializes eligible instances as one batch.
    ///
    /// `updated` events are held back for the whole batch and the projection
    /// is refreshed once at the end.
    pub fn effect_change(&mut self, auto_create_only: bool) -> EffectChangeOutcome {
        if self.projection.collection().borrow().is_read_only() {
            info!("event=review_effect_change module=review status=skipped reason=read_only");
            return EffectChangeOutcome::default();
        }

        let outcome = {
            let _suppressed = self.projection.suppress_updates();
            self.projection
                .collection()
                .borrow_mut()
                .effect_change(auto_create_only)
        };
        self.projection.refresh();
        outcome
    }

    /// Handles one dialog response.
    pub fn respond(&mut self, response: ReviewResponse) -> ReviewResult<ResponseOutcome> {
        match response {
            ReviewResponse::Help => Ok(ResponseOutcome::HelpRequested),
            ReviewResponse::Ok => {
                let outcome = self.commit()?;
                if matches!(outcome, CommitOutcome::Committed { .. }) {
                    self.close();
                }
                Ok(ResponseOutcome::Commit(outcome))
            }
            ReviewResponse::Cancel | ReviewResponse::DeleteEvent => {
                self.close();
                Ok(ResponseOutcome::Closed)
            }
            ReviewResponse::Unknown(code) => {
                error!("event=review_response module=review status=error code={code}");
                Err(ReviewError::UnknownResponse(code))
            }
        }
    }

    /// Closes the session, dropping the created-transaction list.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.created.clear();
        info!("event=review_close module=review status=ok");
    }

    /// Persists the sort and review keys and ends the session.
    ///
    /// Startup keys are left as stored.
    pub fn finish(mut self, prefs: &impl PreferenceRepository) -> ReviewResult<()> {
        let (column, order) = {
            let sort = self.sort.borrow();
            (sort.column(), sort.order())
        };
        self.preferences.sort_column = column;
        self.preferences.sort_ascending = order.is_ascending();
        save_session_preferences(prefs, &self.preferences)?;
        self.close();
        Ok(())
    }

    /// Rows may have moved through events the session did not trigger.
    fn synced_sort(&self) -> Ref<'_, SortProxy> {
        let generation = self.projection.generation();
        if self.sorted_generation.get() != generation {
            if let Ok(mut sort) = self.sort.try_borrow_mut() {
                sort.resort(&self.projection);
                self.sorted_generation.set(generation);
                debug!("event=review_resort module=review status=ok generation={generation}");
            }
        }
        self.sort.borrow()
    }

    fn ensure_open(&self) -> ReviewResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(ReviewError::SessionClosed)
        }
    }
}

fn invalid_path(path: &TreePath) -> ReviewError {
    warn!("event=review_path module=review status=error path={path}");
    ReviewError::InvalidPath(path.clone())
}
