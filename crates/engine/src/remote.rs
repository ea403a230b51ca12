//! Capability surface of the remote store.
//!
//! Every backend (in-memory, SQLite, HTTP) exposes the same four operations
//! over two collections. Rows are JSON objects keyed by the persisted column
//! names, so a backend never needs to know the engine's record types.
//!
//! Writes are always scoped by a [`Filter`]; the stores put the owner
//! (`user_id`) in every filter, and a backend must refuse to touch rows that
//! the filter does not match.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::session::UserId;

/// Column holding the record id.
pub const ID: &str = "id";
/// Column holding the owning user id.
pub const USER_ID: &str = "user_id";

/// A row as exchanged with a backend.
pub type Row = Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Expenses,
    Profiles,
}

impl Collection {
    /// Table / endpoint name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expenses => "expenses",
            Self::Profiles => "profiles",
        }
    }
}

/// Errors reported by a backend. Backends return them instead of panicking.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("\"{0}\" not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// Equality predicates plus an optional ordering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<(String, Value)>,
    order: Option<Order>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the owning user, the base of every store query.
    pub fn owned_by(user: &UserId) -> Self {
        Self::new().eq(USER_ID, user.as_str())
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push((column.into(), value.into()));
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            descending: true,
        });
        self
    }

    pub fn predicates(&self) -> &[(String, Value)] {
        &self.predicates
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// Value of the first predicate on `column`, if any.
    pub fn value_of(&self, column: &str) -> Option<&Value> {
        self.predicates
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Same filter with every predicate on `column` dropped.
    pub fn without(&self, column: &str) -> Filter {
        Filter {
            predicates: self
                .predicates
                .iter()
                .filter(|(name, _)| name != column)
                .cloned()
                .collect(),
            order: self.order.clone(),
        }
    }

    /// `true` when every predicate holds for `row`.
    pub fn matches(&self, row: &Row) -> bool {
        self.predicates
            .iter()
            .all(|(column, expected)| row.get(column) == Some(expected))
    }

    /// Sorts rows in place following the filter ordering. The sort is stable.
    pub fn sort(&self, rows: &mut [Row]) {
        let Some(order) = &self.order else {
            return;
        };
        rows.sort_by(|a, b| {
            let ordering = compare_values(a.get(&order.column), b.get(&order.column));
            if order.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// CRUD capability over the `expenses` and `profiles` collections.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Rows of `collection` matching `filter`, in the filter's order.
    async fn select(&self, collection: Collection, filter: &Filter)
    -> Result<Vec<Row>, RemoteError>;

    /// Persists a new row. Ids and timestamps are assigned by the backend.
    async fn insert(&self, collection: Collection, row: Row) -> Result<(), RemoteError>;

    /// Applies `fields` to every row matching `filter`.
    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: Row,
    ) -> Result<(), RemoteError>;

    /// Removes every row matching `filter`.
    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<(), RemoteError>;
}
