use chrono::NaiveDate;
use rusqlite::Connection;
use std::cell::RefCell;
use std::rc::Rc;
use sx_review_core::{
    open_db_in_memory, Amount, Column, CommitOutcome, Instance, InstanceCollection, InstanceGroup,
    InstanceModel, InstanceState, ResponseOutcome, ReviewPreferences, ReviewResponse,
    ReviewSession, ScheduledTransaction, SplitAmount, SqliteLedger, TemplateSplit, TreeDataSource,
    TreePath, Variable,
};
use uuid::Uuid;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
}

/// `amount` against a fixed 50.00 counter-posting.
fn fixed_counter_sx(name: &str) -> ScheduledTransaction {
    ScheduledTransaction::new(name)
        .with_split(TemplateSplit::new(
            "Expenses:Utilities",
            SplitAmount::Variable("amount".to_string()),
        ))
        .with_split(TemplateSplit::new(
            "Assets:Checking",
            SplitAmount::Literal(Amount::from_units(-50)),
        ))
}

fn with_amount(date: NaiveDate, state: InstanceState, units: i64) -> Instance {
    Instance::new(date, state).with_variable(Variable::bound("amount", Amount::from_units(units)))
}

type Session<'conn> = ReviewSession<InstanceModel<SqliteLedger<'conn>>>;

fn session<'conn>(
    conn: &'conn Connection,
    read_only: bool,
    groups: Vec<InstanceGroup>,
) -> (Rc<RefCell<InstanceModel<SqliteLedger<'conn>>>>, Session<'conn>) {
    let ledger = SqliteLedger::new(conn).read_only(read_only);
    let model = Rc::new(RefCell::new(InstanceModel::with_groups(ledger, groups)));
    let session = ReviewSession::new(Rc::clone(&model), ReviewPreferences::default(), Vec::new());
    (model, session)
}

fn states(model: &Rc<RefCell<InstanceModel<SqliteLedger<'_>>>>, group: usize) -> Vec<InstanceState> {
    model.borrow().groups()[group]
        .instances
        .iter()
        .map(|instance| instance.state)
        .collect()
}

#[test]
fn failing_middle_instance_does_not_abort_batch() {
    let conn = open_db_in_memory().unwrap();
    let group = InstanceGroup::new(fixed_counter_sx("Electricity"))
        .with_instance(with_amount(day(1), InstanceState::ToCreate, 50))
        .with_instance(with_amount(day(2), InstanceState::ToCreate, 60))
        .with_instance(with_amount(day(3), InstanceState::ToCreate, 50));
    let (model, mut session) = session(&conn, false, vec![group]);

    let outcome = session.commit().unwrap();
    let CommitOutcome::Committed {
        created,
        error_report,
        review_created,
    } = outcome
    else {
        panic!("expected committed outcome");
    };

    assert_eq!(created.len(), 2);
    assert!(!review_created);
    let report = error_report.unwrap();
    assert_eq!(report.lines().count(), 1);
    assert!(report.contains("\"Electricity\" on 2024-07-02"));
    assert!(report.contains("unbalanced by 10.00"));
    assert_eq!(
        states(&model, 0),
        vec![
            InstanceState::Created,
            InstanceState::ToCreate,
            InstanceState::Created
        ]
    );
    assert_eq!(SqliteLedger::new(&conn).transaction_count().unwrap(), 2);
}

#[test]
fn overflowing_instance_is_reported_and_batch_continues() {
    let conn = open_db_in_memory().unwrap();
    let group = InstanceGroup::new(fixed_counter_sx("Mortgage"))
        .with_instance(with_amount(day(1), InstanceState::ToCreate, 50))
        .with_instance(
            Instance::new(day(2), InstanceState::ToCreate)
                .with_variable(Variable::bound("amount", Amount::from_hundredths(i64::MIN))),
        )
        .with_instance(with_amount(day(3), InstanceState::ToCreate, 50));
    let (model, mut session) = session(&conn, false, vec![group]);

    let outcome = session.effect_change(false);

    assert_eq!(outcome.created.len(), 2);
    assert_eq!(outcome.errors.len(), 1);
    let report = outcome.error_report().unwrap();
    assert!(report.contains("\"Mortgage\" on 2024-07-02"));
    assert!(report.contains("out of range"));
    assert_eq!(
        states(&model, 0),
        vec![
            InstanceState::Created,
            InstanceState::ToCreate,
            InstanceState::Created
        ]
    );
}

#[test]
fn batch_triggers_exactly_one_refresh() {
    let conn = open_db_in_memory().unwrap();
    let group = InstanceGroup::new(fixed_counter_sx("Water"))
        .with_instance(with_amount(day(1), InstanceState::ToCreate, 50))
        .with_instance(with_amount(day(2), InstanceState::ToCreate, 50))
        .with_instance(with_amount(day(3), InstanceState::ToCreate, 50))
        .with_instance(with_amount(day(4), InstanceState::Reminder, 50));
    let (_model, mut session) = session(&conn, false, vec![group]);

    let before = session.projection().refresh_count();
    let outcome = session.effect_change(false);
    assert_eq!(outcome.created.len(), 3);
    assert_eq!(session.projection().refresh_count(), before + 1);
    assert_eq!(
        session
            .projection()
            .text(&TreePath::new(vec![0, 2]), Column::InstanceState)
            .as_deref(),
        Some("Created")
    );

    // Suppression ends with the batch.
    session
        .change_instance_state(&TreePath::new(vec![0, 3]), "Ignored")
        .unwrap();
    assert_eq!(session.projection().refresh_count(), before + 2);
    assert_eq!(
        session
            .projection()
            .text(&TreePath::new(vec![0, 3]), Column::InstanceState)
            .as_deref(),
        Some("Ignored")
    );
}

#[test]
fn read_only_book_is_left_untouched() {
    let conn = open_db_in_memory().unwrap();
    let group = InstanceGroup::new(fixed_counter_sx("Internet"))
        .with_instance(with_amount(day(1), InstanceState::ToCreate, 50));
    let (model, mut session) = session(&conn, true, vec![group]);

    let before = session.projection().refresh_count();
    let outcome = session.commit().unwrap();

    assert_eq!(
        outcome,
        CommitOutcome::Committed {
            created: Vec::new(),
            error_report: None,
            review_created: false,
        }
    );
    assert_eq!(session.projection().refresh_count(), before);
    assert_eq!(states(&model, 0), vec![InstanceState::ToCreate]);
    assert_eq!(SqliteLedger::new(&conn).transaction_count().unwrap(), 0);
}

#[test]
fn only_to_create_instances_are_materialized() {
    let conn = open_db_in_memory().unwrap();
    let group = InstanceGroup::new(fixed_counter_sx("Heating"))
        .with_instance(with_amount(day(1), InstanceState::Ignored, 50))
        .with_instance(with_amount(day(2), InstanceState::Postponed, 50))
        .with_instance(with_amount(day(3), InstanceState::Reminder, 50))
        .with_instance(with_amount(day(4), InstanceState::ToCreate, 50));
    let (model, mut session) = session(&conn, false, vec![group]);

    session.commit().unwrap();
    assert_eq!(
        states(&model, 0),
        vec![
            InstanceState::Ignored,
            InstanceState::Postponed,
            InstanceState::Reminder,
            InstanceState::Created
        ]
    );
}

#[test]
fn binding_promotes_reminders_only() {
    let conn = open_db_in_memory().unwrap();
    let group = InstanceGroup::new(fixed_counter_sx("Phone"))
        .with_instance(Instance::new(day(1), InstanceState::Reminder).with_variable(Variable::unbound("amount")))
        .with_instance(Instance::new(day(2), InstanceState::Postponed).with_variable(Variable::unbound("amount")))
        .with_instance(Instance::new(day(3), InstanceState::Ignored).with_variable(Variable::unbound("amount")));
    let (model, mut session) = session(&conn, false, vec![group]);

    for instance in 0..3 {
        session
            .set_variable_value(&TreePath::new(vec![0, instance, 0]), "50")
            .unwrap();
    }
    assert_eq!(
        states(&model, 0),
        vec![
            InstanceState::ToCreate,
            InstanceState::Postponed,
            InstanceState::Ignored
        ]
    );
    assert_eq!(
        session
            .projection()
            .text(&TreePath::new(vec![0, 0, 0]), Column::VariableValue)
            .as_deref(),
        Some("50.00")
    );
}

#[test]
fn commit_focuses_first_unbound_variable_in_collection_order() {
    let conn = open_db_in_memory().unwrap();
    let zeta = InstanceGroup::new(fixed_counter_sx("Zeta"))
        .with_instance(Instance::new(day(9), InstanceState::Ignored).with_variable(Variable::unbound("amount")));
    let alpha = InstanceGroup::new(fixed_counter_sx("Alpha"))
        .with_instance(with_amount(day(1), InstanceState::ToCreate, 50))
        .with_instance(Instance::new(day(2), InstanceState::ToCreate).with_variable(Variable::unbound("amount")));
    let (model, mut session) = session(&conn, false, vec![zeta, alpha]);

    let outcome = session.commit().unwrap();
    let CommitOutcome::NeedsValues { focus, unbound } = outcome else {
        panic!("expected unbound variables");
    };

    // Ignored instances still block commit; the scan is state-agnostic.
    assert_eq!(unbound.len(), 2);
    assert_eq!(unbound[0].instance.group_index, 0);
    assert_eq!(unbound[1].instance.group_index, 1);
    assert_eq!(unbound[1].instance.instance_index, 1);

    // "Alpha" sorts before "Zeta" by first occurrence, so Zeta is view row 1.
    assert_eq!(focus, Some(TreePath::new(vec![1, 0, 0])));
    assert_eq!(SqliteLedger::new(&conn).transaction_count().unwrap(), 0);
    assert_eq!(states(&model, 1)[0], InstanceState::ToCreate);
}

#[test]
fn ok_response_keeps_session_open_until_values_are_bound() {
    let conn = open_db_in_memory().unwrap();
    let auto_created = vec![Uuid::new_v4()];
    let group = InstanceGroup::new(fixed_counter_sx("Garden")).with_instance(
        Instance::new(day(5), InstanceState::ToCreate).with_variable(Variable::unbound("amount")),
    );
    let model = Rc::new(RefCell::new(InstanceModel::with_groups(
        SqliteLedger::new(&conn),
        vec![group],
    )));
    let prefs = ReviewPreferences {
        review_created: true,
        ..ReviewPreferences::default()
    };
    let mut session = ReviewSession::new(Rc::clone(&model), prefs, auto_created.clone());

    let first = session.respond(ReviewResponse::Ok).unwrap();
    assert!(matches!(
        first,
        ResponseOutcome::Commit(CommitOutcome::NeedsValues { .. })
    ));
    assert!(session.is_open());

    session
        .set_variable_value(&TreePath::new(vec![0, 0, 0]), "50")
        .unwrap();
    let second = session.respond(ReviewResponse::Ok).unwrap();
    let ResponseOutcome::Commit(CommitOutcome::Committed {
        created,
        error_report,
        review_created,
    }) = second
    else {
        panic!("expected committed outcome");
    };
    assert_eq!(created.len(), 2);
    assert_eq!(created[0], auto_created[0]);
    assert_eq!(error_report, None);
    assert!(review_created);
    assert!(!session.is_open());
    assert!(session.created_transactions().is_empty());
}
