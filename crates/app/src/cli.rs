use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "budgetbuddy",
    version,
    about = "Track expenses against a monthly budget"
)]
pub struct Args {
    /// Optional config file path (TOML).
    #[arg(long, global = true)]
    pub config: Option<String>,
    /// Log level for the workspace crates (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    pub level: Option<String>,
    /// Act as this user.
    #[arg(long, global = true)]
    pub user: Option<String>,
    /// Name stored on a newly created profile.
    #[arg(long, global = true)]
    pub full_name: Option<String>,
    /// Override the configured backend.
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendKind>,
    /// SQLite database file.
    #[arg(long, global = true)]
    pub sqlite_path: Option<String>,
    /// Base URL of the REST backend.
    #[arg(long, global = true)]
    pub base_url: Option<String>,
    /// Public api key of the REST backend.
    #[arg(long, global = true)]
    pub api_key: Option<String>,
    /// Access token of the signed-in user (REST backend).
    #[arg(long, global = true)]
    pub access_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Memory,
    Sqlite,
    Rest,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
            Self::Rest => "rest",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Budget, spending and the per-category breakdown.
    Summary,
    /// Expenses, newest first.
    List,
    /// Record an expense.
    Add(AddArgs),
    /// Change fields of an expense.
    Edit(EditArgs),
    /// Remove an expense.
    Delete { id: String },
    /// Set the monthly budget.
    SetBudget { amount: String },
}

#[derive(Debug, ClapArgs)]
pub struct AddArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub amount: String,
    #[arg(long)]
    pub category: Option<String>,
    /// Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Debug, ClapArgs)]
pub struct EditArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub amount: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// An empty value clears the notes.
    #[arg(long)]
    pub notes: Option<String>,
}
