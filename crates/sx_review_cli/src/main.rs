//! CLI smoke entry point.
//!
//! # Responsibility
//! - Run the startup pass and one review session against a SQLite book.
//! - Print the review tree in sorted order before and after commit.
//!
//! Usage: `sx_review_cli [DB_PATH]` (in-memory book when omitted).

use chrono::NaiveDate;
use log::info;
use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;
use sx_review_core::{
    init_logging, load_review_preferences, open_db, open_db_in_memory, run_since_last_run,
    Column, CommitOutcome, Instance, InstanceCollection, InstanceGroup, InstanceModel,
    InstanceState, LoggingConfig, ResponseOutcome, ReviewResponse, ReviewSession,
    ScheduledTransaction, SortProxy, SplitAmount, SqliteLedger, SqlitePreferenceRepository,
    StartupAction, TemplateSplit, TreeDataSource, TreePath, Variable,
};

fn main() {
    if let Err(err) = run() {
        eprintln!("sx_review_cli error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    init_logging(&LoggingConfig::default())?;
    info!(
        "event=cli_start module=cli status=ok version={}",
        sx_review_core::core_version()
    );

    let conn = match std::env::args().nth(1) {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let prefs_repo = SqlitePreferenceRepository::new(&conn);
    let prefs = load_review_preferences(&prefs_repo)?;

    let mut model = InstanceModel::with_groups(SqliteLedger::new(&conn), demo_groups()?);
    let startup = run_since_last_run(&mut model, &prefs);
    println!("startup action: {:?}", startup.action);
    if let Some(report) = startup.changes.error_report() {
        println!("startup errors:\n{report}");
    }
    if startup.action != StartupAction::OpenReview {
        return Ok(());
    }

    let collection = Rc::new(RefCell::new(model));
    let mut session = ReviewSession::new(Rc::clone(&collection), prefs, startup.changes.created);
    print_tree(session.projection(), &session.sort_proxy());

    loop {
        match session.respond(ReviewResponse::Ok)? {
            ResponseOutcome::Commit(CommitOutcome::NeedsValues { focus, unbound }) => {
                let Some(focus) = focus else {
                    return Err("unbound variable has no visible row".into());
                };
                println!(
                    "{} variable(s) unbound; binding `{}` at [{focus}] to 100",
                    unbound.len(),
                    unbound[0].name
                );
                session.set_variable_value(&focus, "100")?;
            }
            ResponseOutcome::Commit(CommitOutcome::Committed {
                created,
                error_report,
                review_created,
            }) => {
                println!("created {} transaction(s)", created.len());
                if let Some(report) = error_report {
                    println!("creation errors:\n{report}");
                }
                if review_created {
                    println!("review requested for created transactions");
                }
                break;
            }
            other => {
                println!("review ended: {other:?}");
                break;
            }
        }
    }

    print_tree(session.projection(), &session.sort_proxy());
    let summary = collection.borrow().summarize();
    println!("instances: {}", summary.num_instances);
    session.finish(&prefs_repo)?;
    Ok(())
}

fn print_tree(source: &impl TreeDataSource, sort: &SortProxy) {
    for view_index in 0..sort.len() {
        let Some(group) = sort.view_to_child(&TreePath::root(view_index)) else {
            continue;
        };
        println!("{}", source.text(&group, Column::Name).unwrap_or_default());
        for instance_index in 0..source.n_children(Some(&group)) {
            let instance = group.child(instance_index);
            println!(
                "  {} [{}]",
                source.text(&instance, Column::Name).unwrap_or_default(),
                source
                    .text(&instance, Column::InstanceState)
                    .unwrap_or_default()
            );
            for variable_index in 0..source.n_children(Some(&instance)) {
                let variable = instance.child(variable_index);
                println!(
                    "    {} = {}",
                    source.text(&variable, Column::Name).unwrap_or_default(),
                    source
                        .text(&variable, Column::VariableValue)
                        .unwrap_or_default()
                );
            }
        }
    }
}

fn demo_groups() -> Result<Vec<InstanceGroup>, Box<dyn Error>> {
    let date = |day: u32| {
        NaiveDate::from_ymd_opt(2024, 6, day).ok_or_else(|| format!("invalid day {day}"))
    };
    let balanced = |name: &str, expense: &str| {
        ScheduledTransaction::new(name)
            .with_split(TemplateSplit::new(
                expense,
                SplitAmount::Variable("amount".to_string()),
            ))
            .with_split(TemplateSplit::new(
                "Assets:Checking",
                SplitAmount::NegatedVariable("amount".to_string()),
            ))
    };

    let salary = InstanceGroup::new(balanced("Salary", "Income:Salary").auto_create(false))
        .with_instance(
            Instance::new(date(1)?, InstanceState::ToCreate)
                .with_variable(Variable::bound("amount", "-2500".parse()?)),
        );
    let rent = InstanceGroup::new(balanced("Rent", "Expenses:Rent"))
        .with_instance(
            Instance::new(date(3)?, InstanceState::ToCreate)
                .with_variable(Variable::unbound("amount")),
        );
    let gym = InstanceGroup::new(balanced("Gym", "Expenses:Sport"))
        .with_instance(
            Instance::new(date(5)?, InstanceState::Reminder)
                .with_variable(Variable::bound("amount", "35.00".parse()?)),
        );
    Ok(vec![salary, rent, gym])
}
