use std::fmt::Write as _;

use chrono::Local;
use engine::{Expense, ExpenseUpdate, NewExpense, Tracker, normalize_optional_text};

use crate::{
    cli::{AddArgs, Command, EditArgs},
    error::{AppError, Result},
    validate,
};

/// Run `command` and return what should be printed.
pub async fn execute(tracker: &Tracker, command: Command) -> Result<String> {
    match command {
        Command::Summary => Ok(summary(tracker)),
        Command::List => Ok(list(&tracker.expenses().list())),
        Command::Add(args) => add(tracker, args).await,
        Command::Edit(args) => edit(tracker, args).await,
        Command::Delete { id } => {
            tracker.expenses().delete(&id).await?;
            Ok(format!("Deleted expense {id}."))
        }
        Command::SetBudget { amount } => {
            let amount = validate::budget(&amount)?;
            tracker.profile().update_budget(amount).await?;
            Ok(format!("Monthly budget set to {amount}."))
        }
    }
}

async fn add(tracker: &Tracker, args: AddArgs) -> Result<String> {
    let title = validate::title(&args.title)?;
    let amount = validate::amount(&args.amount)?;
    let category = validate::category(args.category.as_deref())?;
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());

    let mut expense = NewExpense::new(title, amount, date).with_category(category);
    expense.notes = normalize_optional_text(args.notes.as_deref());

    tracker.expenses().add(expense).await?;
    Ok(format!("Added {amount} on {date}."))
}

async fn edit(tracker: &Tracker, args: EditArgs) -> Result<String> {
    let update = ExpenseUpdate {
        title: args.title.as_deref().map(validate::title).transpose()?,
        amount: args.amount.as_deref().map(validate::amount).transpose()?,
        category: args
            .category
            .as_deref()
            .map(|label| validate::category(Some(label)))
            .transpose()?,
        date: args.date,
        notes: args
            .notes
            .as_deref()
            .map(|notes| normalize_optional_text(Some(notes))),
    };
    if update.is_empty() {
        return Err(AppError::Input("Nothing to change.".to_string()));
    }

    tracker.expenses().update(&args.id, update).await?;
    Ok(format!("Updated expense {}.", args.id))
}

fn summary(tracker: &Tracker) -> String {
    let summary = tracker.summary();
    let mut out = String::new();

    if let Some(name) = tracker.display_name() {
        let _ = writeln!(out, "Hello, {name}");
    }
    if tracker.needs_setup() {
        let _ = writeln!(
            out,
            "No monthly budget yet. Set one with `budgetbuddy set-budget <amount>`."
        );
    }

    let _ = writeln!(out, "Budget:    {:>12}", summary.budget.to_string());
    let _ = writeln!(out, "Spent:     {:>12}", summary.spent.to_string());
    let _ = write!(out, "Remaining: {:>12}", summary.remaining.to_string());
    match summary.used_percent() {
        Some(percent) => {
            let _ = writeln!(out, "  ({percent:.1}% used)");
        }
        None => out.push('\n'),
    }
    if summary.is_overspent() {
        let _ = writeln!(out, "You are over budget.");
    }

    let categories = summary.categories_by_total();
    if !categories.is_empty() {
        let _ = writeln!(out, "By category:");
        for (category, total) in categories {
            let _ = writeln!(out, "  {:<14}{:>12}", category.as_str(), total.to_string());
        }
    }
    out
}

fn list(expenses: &[Expense]) -> String {
    if expenses.is_empty() {
        return "No expenses yet.\n".to_string();
    }
    let mut out = String::new();
    for expense in expenses {
        let _ = writeln!(
            out,
            "{}  {:<14}{:>12}  {}  [{}]",
            expense.date,
            expense.category.as_str(),
            expense.amount.to_string(),
            expense.title,
            expense.id
        );
        if let Some(notes) = &expense.notes {
            let _ = writeln!(out, "            {notes}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use engine::{Amount, Category, MemoryStore, SessionProvider, UserId};

    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    async fn tracker() -> (SessionProvider, Tracker) {
        let provider = SessionProvider::signed_in(UserId::new("alice"));
        let tracker = Tracker::new(Arc::new(MemoryStore::new()), provider.session());
        tracker.profile().provision(Some("Alice")).await.unwrap();
        tracker.sync_session().await;
        (provider, tracker)
    }

    async fn run(tracker: &Tracker, argv: &[&str]) -> Result<String> {
        let mut full = vec!["budgetbuddy"];
        full.extend_from_slice(argv);
        execute(tracker, Args::try_parse_from(full).unwrap().command).await
    }

    #[tokio::test]
    async fn add_validates_before_writing() {
        let (_provider, tracker) = tracker().await;
        let err = run(&tracker, &["add", "--title", " ", "--amount", "5"])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Input(_)));
        let err = run(&tracker, &["add", "--title", "Gym", "--amount", "5", "--category", "Fitness"])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Engine(_)));
        assert!(tracker.expenses().list().is_empty());

        run(
            &tracker,
            &["add", "--title", "Lunch", "--amount", "12.5", "--category", "food", "--notes", "  "],
        )
        .await
        .unwrap();
        let listed = tracker.expenses().list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].category, Category::Food);
        assert_eq!(listed[0].notes, None);
    }

    #[tokio::test]
    async fn summary_prompts_for_budget_until_set() {
        let (_provider, tracker) = tracker().await;
        let out = run(&tracker, &["summary"]).await.unwrap();
        assert!(out.contains("Hello, Alice"));
        assert!(out.contains("No monthly budget yet"));

        run(&tracker, &["set-budget", "50000"]).await.unwrap();
        run(&tracker, &["add", "--title", "Rent", "--amount", "20000", "--category", "Bills"])
            .await
            .unwrap();
        let out = run(&tracker, &["summary"]).await.unwrap();
        assert!(!out.contains("No monthly budget yet"));
        assert!(out.contains("30000.00"));
        assert!(out.contains("(40.0% used)"));
        assert!(out.contains("Bills"));
        assert_eq!(tracker.summary().remaining, Amount::major(30_000));
    }

    #[tokio::test]
    async fn edit_requires_a_change() {
        let (_provider, tracker) = tracker().await;
        run(&tracker, &["add", "--title", "Bus", "--amount", "2"]).await.unwrap();
        let id = tracker.expenses().list()[0].id.clone();

        let err = run(&tracker, &["edit", id.as_str()]).await.unwrap_err();
        assert!(matches!(err, AppError::Input(_)));

        run(&tracker, &["edit", id.as_str(), "--amount", "2.40"]).await.unwrap();
        assert_eq!(tracker.expenses().list()[0].amount, Amount::new(240));
    }
}
