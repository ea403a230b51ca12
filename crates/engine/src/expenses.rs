//! Expense records and the store that owns the signed-in user's expenses.
//!
//! The store keeps a snapshot of the whole collection and republishes it
//! through a watch channel. It never patches the snapshot locally: every
//! successful write is followed by a full re-read, so what is displayed is
//! always what the backend holds.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{
    Amount, Category, EngineError, ResultEngine, budget,
    remote::{Collection, Filter, ID, RemoteStore},
    session::{Session, UserId},
    util::{decode_rows, double_option, lenient_category},
};

/// Column the expense list is ordered by.
pub const DATE: &str = "date";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub user_id: UserId,
    pub title: String,
    pub amount: Amount,
    #[serde(default, deserialize_with = "lenient_category")]
    pub category: Category,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the user when recording an expense.
///
/// Validation (non-empty title, positive amount) is the caller's job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    pub title: String,
    pub amount: Amount,
    #[serde(default)]
    pub category: Category,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewExpense {
    pub fn new(title: impl Into<String>, amount: Amount, date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            amount,
            category: Category::default(),
            date,
            notes: None,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Partial update of an expense. Absent fields are left untouched;
/// `notes: Some(None)` clears the notes.
///
/// There is deliberately no `user_id` field: the owner never changes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub notes: Option<Option<String>>,
}

impl ExpenseUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.date.is_none()
            && self.notes.is_none()
    }
}

#[derive(Serialize)]
struct ExpenseInsert<'a> {
    user_id: &'a UserId,
    #[serde(flatten)]
    expense: &'a NewExpense,
}

/// What the store currently publishes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpenseSnapshot {
    /// User the expenses were loaded for.
    pub owner: Option<UserId>,
    /// Newest first.
    pub expenses: Vec<Expense>,
    pub loading: bool,
}

impl ExpenseSnapshot {
    fn loading(owner: Option<UserId>) -> Self {
        Self {
            owner,
            expenses: Vec::new(),
            loading: true,
        }
    }

    pub fn total_spent(&self) -> Amount {
        budget::spent(&self.expenses)
    }
}

pub struct ExpenseStore {
    remote: Arc<dyn RemoteStore>,
    session: Session,
    snapshot: watch::Sender<ExpenseSnapshot>,
}

impl ExpenseStore {
    pub fn new(remote: Arc<dyn RemoteStore>, session: Session) -> Self {
        let (snapshot, _) = watch::channel(ExpenseSnapshot::loading(None));
        Self {
            remote,
            session,
            snapshot,
        }
    }

    pub fn snapshot(&self) -> ExpenseSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ExpenseSnapshot> {
        self.snapshot.subscribe()
    }

    /// The signed-in user's expenses, newest first. Empty without a session
    /// or before anything was loaded for the current user.
    pub fn list(&self) -> Vec<Expense> {
        let snapshot = self.snapshot.borrow();
        if !self.owns(&snapshot) {
            return Vec::new();
        }
        snapshot.expenses.clone()
    }

    /// Sum of the listed amounts, recomputed on every call.
    pub fn total_spent(&self) -> Amount {
        let snapshot = self.snapshot.borrow();
        if !self.owns(&snapshot) {
            return Amount::ZERO;
        }
        snapshot.total_spent()
    }

    fn owns(&self, snapshot: &ExpenseSnapshot) -> bool {
        snapshot
            .owner
            .as_ref()
            .is_some_and(|owner| self.session.is_current(owner))
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.borrow().loading
    }

    pub async fn add(&self, expense: NewExpense) -> ResultEngine<()> {
        let user = self.session.require_user()?;
        let row = serde_json::to_value(ExpenseInsert {
            user_id: &user,
            expense: &expense,
        })?;

        self.remote
            .insert(Collection::Expenses, row)
            .await
            .inspect_err(|err| tracing::warn!("failed to add expense: {err}"))?;

        self.fetch_for(&user).await;
        Ok(())
    }

    pub async fn update(&self, id: &str, fields: ExpenseUpdate) -> ResultEngine<()> {
        let user = self.session.require_user()?;
        let filter = Filter::owned_by(&user).eq(ID, id);
        let fields = serde_json::to_value(&fields)?;

        self.remote
            .update(Collection::Expenses, &filter, fields)
            .await
            .inspect_err(|err| tracing::warn!("failed to update expense {id}: {err}"))?;

        self.fetch_for(&user).await;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> ResultEngine<()> {
        let user = self.session.require_user()?;
        let filter = Filter::owned_by(&user).eq(ID, id);

        self.remote
            .delete(Collection::Expenses, &filter)
            .await
            .inspect_err(|err| tracing::warn!("failed to delete expense {id}: {err}"))?;

        self.fetch_for(&user).await;
        Ok(())
    }

    /// Re-read the collection for the signed-in user; no-op without a session.
    pub async fn refetch(&self) {
        if let Some(user) = self.session.current_user() {
            self.fetch_for(&user).await;
        }
    }

    /// Align the snapshot with the current session: clear it when nobody is
    /// signed in, fetch otherwise.
    pub async fn sync_session(&self) {
        match self.session.current_user() {
            Some(user) => self.fetch_for(&user).await,
            None => self.clear(),
        }
    }

    /// Drive the store from session changes until the provider is dropped.
    ///
    /// A fetch still in flight when the session changes is abandoned.
    pub async fn follow_session(&self) {
        let mut current = self.session.watch();
        loop {
            let user = current.borrow_and_update().clone();
            if let Some(user) = user {
                let interrupted = tokio::select! {
                    () = self.fetch_for(&user) => None,
                    changed = current.changed() => Some(changed.is_ok()),
                };
                match interrupted {
                    Some(true) => continue,
                    Some(false) => return,
                    None => {}
                }
            } else {
                self.clear();
            }

            if current.changed().await.is_err() {
                return;
            }
        }
    }

    /// Empty, not loading. Never waits on the backend.
    pub fn clear(&self) {
        self.snapshot.send_replace(ExpenseSnapshot::default());
    }

    async fn fetch_for(&self, user: &UserId) {
        if !self.session.is_current(user) {
            return;
        }
        self.snapshot.send_modify(|snapshot| {
            // Another user's rows must not survive a failed fetch.
            if snapshot.owner.as_ref() != Some(user) {
                *snapshot = ExpenseSnapshot::loading(Some(user.clone()));
            }
            snapshot.loading = true;
        });
        tracing::debug!("fetching expenses for {user}");

        let filter = Filter::owned_by(user).order_desc(DATE);
        let result = self
            .remote
            .select(Collection::Expenses, &filter)
            .await
            .map_err(EngineError::from)
            .and_then(decode_rows::<Expense>);

        // The session may have moved on while the request was in flight.
        if !self.session.is_current(user) {
            tracing::warn!("discarding expenses fetched for {user}: session changed");
            return;
        }

        match result {
            Ok(expenses) => {
                self.snapshot.send_replace(ExpenseSnapshot {
                    owner: Some(user.clone()),
                    expenses,
                    loading: false,
                });
            }
            Err(err) => {
                tracing::error!("error fetching expenses: {err}");
                self.snapshot.send_modify(|snapshot| snapshot.loading = false);
            }
        }
    }
}
