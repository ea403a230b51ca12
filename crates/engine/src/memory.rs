//! In-process backend.
//!
//! Behaves like the hosted store as far as the engine can tell: it assigns
//! ids and timestamps, keeps one profile per user, and refuses writes whose
//! owner predicate does not match the targeted row.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::remote::{Collection, Filter, ID, RemoteError, RemoteStore, Row, USER_ID};

const EXPENSE_REQUIRED: [&str; 4] = ["user_id", "title", "amount", "date"];
const PROFILE_REQUIRED: [&str; 1] = ["user_id"];

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Collection, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row of `collection`, regardless of owner.
    pub async fn rows(&self, collection: Collection) -> Vec<Row> {
        let tables = self.tables.lock().await;
        tables.get(&collection).cloned().unwrap_or_default()
    }
}

fn as_object(row: Row, label: &str) -> Result<Map<String, Value>, RemoteError> {
    match row {
        Value::Object(map) => Ok(map),
        _ => Err(RemoteError::Validation(format!("{label} must be an object"))),
    }
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

/// Zero matches is fine, unless the rows exist but belong to somebody else.
fn check_owner(rows: &[Row], filter: &Filter, collection: Collection) -> Result<(), RemoteError> {
    let relaxed = filter.without(USER_ID);
    if relaxed.predicates().is_empty() || relaxed.predicates().len() == filter.predicates().len() {
        return Ok(());
    }
    if rows.iter().any(|row| relaxed.matches(row)) {
        return Err(RemoteError::Forbidden(format!(
            "row of {} is not owned by the caller",
            collection.as_str()
        )));
    }
    Ok(())
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Row>, RemoteError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Row> = tables
            .get(&collection)
            .map(|rows| rows.iter().filter(|row| filter.matches(row)).cloned().collect())
            .unwrap_or_default();
        filter.sort(&mut rows);
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, row: Row) -> Result<(), RemoteError> {
        let mut row = as_object(row, "row")?;

        let required: &[&str] = match collection {
            Collection::Expenses => &EXPENSE_REQUIRED,
            Collection::Profiles => &PROFILE_REQUIRED,
        };
        if let Some(missing) = required
            .iter()
            .find(|column| row.get(**column).is_none_or(Value::is_null))
        {
            return Err(RemoteError::Validation(format!(
                "null value in column \"{missing}\""
            )));
        }

        let mut tables = self.tables.lock().await;
        let table = tables.entry(collection).or_default();

        if collection == Collection::Profiles {
            let owner = row.get(USER_ID);
            if table.iter().any(|existing| existing.get(USER_ID) == owner) {
                return Err(RemoteError::Conflict(
                    "profile already exists for user".to_string(),
                ));
            }
        }

        row.insert(ID.to_string(), Value::String(Uuid::new_v4().to_string()));
        let stamp = now();
        row.insert("created_at".to_string(), stamp.clone());
        row.insert("updated_at".to_string(), stamp);
        table.push(Value::Object(row));
        Ok(())
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: Row,
    ) -> Result<(), RemoteError> {
        let fields = as_object(fields, "fields")?;
        if fields.contains_key(ID) || fields.contains_key(USER_ID) {
            return Err(RemoteError::Validation(
                "id and user_id cannot be changed".to_string(),
            ));
        }

        let mut tables = self.tables.lock().await;
        let table = tables.entry(collection).or_default();
        check_owner(table, filter, collection)?;

        let stamp = now();
        for row in table.iter_mut().filter(|row| filter.matches(row)) {
            if let Value::Object(map) = row {
                for (column, value) in &fields {
                    map.insert(column.clone(), value.clone());
                }
                map.insert("updated_at".to_string(), stamp.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<(), RemoteError> {
        let mut tables = self.tables.lock().await;
        let table = tables.entry(collection).or_default();
        check_owner(table, filter, collection)?;
        table.retain(|row| !filter.matches(row));
        Ok(())
    }
}
