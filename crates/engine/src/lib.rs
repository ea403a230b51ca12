//! Personal expense tracking core.
//!
//! The crate keeps the signed-in user's expenses and profile in sync with a
//! remote store and derives budget metrics from them. Backends implement
//! [`RemoteStore`]; an in-memory and a SQLite implementation ship here, the
//! hosted REST backend lives in the `rest_client` crate.

pub use budget::BudgetSummary;
pub use categories::Category;
pub use error::EngineError;
pub use expenses::{Expense, ExpenseSnapshot, ExpenseStore, ExpenseUpdate, NewExpense};
pub use memory::MemoryStore;
pub use money::Amount;
pub use profiles::{Profile, ProfileSnapshot, ProfileStore, ProfileUpdate};
pub use remote::{Collection, Filter, Order, RemoteError, RemoteStore, Row};
pub use session::{Session, SessionProvider, UserId};
pub use sqlite::SqliteStore;
pub use tracker::Tracker;
pub use util::normalize_optional_text;

pub mod budget;
mod categories;
mod error;
pub mod expenses;
mod memory;
mod money;
pub mod profiles;
pub mod remote;
mod session;
mod sqlite;
mod tracker;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
