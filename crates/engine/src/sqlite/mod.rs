//! SQLite backend built on sea-orm.
//!
//! Tables are created by the `migration` crate. Amounts are stored as integer
//! minor units; rows are converted to and from the wire shape at this
//! boundary so the stores see exactly what the hosted backend would return.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Select,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{
    Amount,
    expenses::{Expense, ExpenseUpdate, NewExpense},
    profiles::{Profile, ProfileUpdate},
    remote::{Collection, Filter, ID, RemoteError, RemoteStore, Row, USER_ID},
    session::UserId,
};

mod expenses;
mod profiles;

impl From<DbErr> for RemoteError {
    fn from(err: DbErr) -> Self {
        tracing::error!("database error: {err}");
        RemoteError::Server(err.to_string())
    }
}

#[derive(Deserialize)]
struct ExpenseRow {
    user_id: UserId,
    #[serde(flatten)]
    expense: NewExpense,
}

#[derive(Deserialize)]
struct ProfileRow {
    user_id: UserId,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    monthly_salary: Amount,
}

#[derive(Clone, Debug)]
pub struct SqliteStore {
    database: DatabaseConnection,
}

impl SqliteStore {
    /// Wrap an already migrated connection.
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    /// Rows matching `filter`. When nothing matches but the rows exist under
    /// another owner, the caller is refused.
    async fn find_owned<E: EntityTrait>(
        &self,
        collection: Collection,
        filter: &Filter,
        column: fn(&str) -> Option<E::Column>,
    ) -> Result<Vec<E::Model>, RemoteError> {
        let rows = E::find()
            .filter(condition(filter, column)?)
            .all(&self.database)
            .await?;
        if !rows.is_empty() {
            return Ok(rows);
        }

        let relaxed = filter.without(USER_ID);
        if relaxed.predicates().is_empty() || relaxed.predicates().len() == filter.predicates().len()
        {
            return Ok(rows);
        }
        let foreign = E::find()
            .filter(condition(&relaxed, column)?)
            .one(&self.database)
            .await?;
        if foreign.is_some() {
            return Err(RemoteError::Forbidden(format!(
                "row of {} is not owned by the caller",
                collection.as_str()
            )));
        }
        Ok(rows)
    }

    async fn insert_expense(&self, row: Row) -> Result<(), RemoteError> {
        let ExpenseRow { user_id, expense } = parse(row)?;
        let now = Utc::now();
        let active = expenses::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            user_id: ActiveValue::Set(user_id.as_str().to_string()),
            title: ActiveValue::Set(expense.title),
            amount: ActiveValue::Set(expense.amount.minor()),
            category: ActiveValue::Set(expense.category.as_str().to_string()),
            date: ActiveValue::Set(expense.date),
            notes: ActiveValue::Set(expense.notes),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };
        active.insert(&self.database).await?;
        Ok(())
    }

    async fn insert_profile(&self, row: Row) -> Result<(), RemoteError> {
        let ProfileRow {
            user_id,
            full_name,
            monthly_salary,
        } = parse(row)?;

        let existing = profiles::Entity::find()
            .filter(profiles::Column::UserId.eq(user_id.as_str()))
            .one(&self.database)
            .await?;
        if existing.is_some() {
            return Err(RemoteError::Conflict(
                "profile already exists for user".to_string(),
            ));
        }

        let now = Utc::now();
        let active = profiles::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            user_id: ActiveValue::Set(user_id.as_str().to_string()),
            full_name: ActiveValue::Set(full_name),
            monthly_salary: ActiveValue::Set(monthly_salary.minor()),
            salary_set_at: ActiveValue::Set(monthly_salary.is_positive().then_some(now)),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };
        active.insert(&self.database).await?;
        Ok(())
    }

    async fn update_expenses(&self, filter: &Filter, fields: Row) -> Result<(), RemoteError> {
        let patch: ExpenseUpdate = parse(fields)?;
        let rows = self
            .find_owned::<expenses::Entity>(Collection::Expenses, filter, expenses::column)
            .await?;

        let now = Utc::now();
        for model in rows {
            let mut active: expenses::ActiveModel = model.into();
            if let Some(title) = &patch.title {
                active.title = ActiveValue::Set(title.clone());
            }
            if let Some(amount) = patch.amount {
                active.amount = ActiveValue::Set(amount.minor());
            }
            if let Some(category) = patch.category {
                active.category = ActiveValue::Set(category.as_str().to_string());
            }
            if let Some(date) = patch.date {
                active.date = ActiveValue::Set(date);
            }
            if let Some(notes) = &patch.notes {
                active.notes = ActiveValue::Set(notes.clone());
            }
            active.updated_at = ActiveValue::Set(now);
            active.update(&self.database).await?;
        }
        Ok(())
    }

    async fn update_profiles(&self, filter: &Filter, fields: Row) -> Result<(), RemoteError> {
        let patch: ProfileUpdate = parse(fields)?;
        let rows = self
            .find_owned::<profiles::Entity>(Collection::Profiles, filter, profiles::column)
            .await?;

        let now = Utc::now();
        for model in rows {
            let mut active: profiles::ActiveModel = model.into();
            if let Some(full_name) = &patch.full_name {
                active.full_name = ActiveValue::Set(full_name.clone());
            }
            if let Some(amount) = patch.monthly_salary {
                active.monthly_salary = ActiveValue::Set(amount.minor());
            }
            if let Some(stamp) = patch.salary_set_at {
                active.salary_set_at = ActiveValue::Set(stamp);
            }
            active.updated_at = ActiveValue::Set(now);
            active.update(&self.database).await?;
        }
        Ok(())
    }
}

fn parse<T: DeserializeOwned>(row: Row) -> Result<T, RemoteError> {
    serde_json::from_value(row).map_err(|err| RemoteError::Validation(err.to_string()))
}

fn to_row<T: Serialize>(record: T) -> Result<Row, RemoteError> {
    serde_json::to_value(record).map_err(|err| RemoteError::Server(err.to_string()))
}

fn reject_owner_change(fields: &Row) -> Result<(), RemoteError> {
    if fields.get(ID).is_some() || fields.get(USER_ID).is_some() {
        return Err(RemoteError::Validation(
            "id and user_id cannot be changed".to_string(),
        ));
    }
    Ok(())
}

fn condition<C: ColumnTrait>(
    filter: &Filter,
    column: fn(&str) -> Option<C>,
) -> Result<Condition, RemoteError> {
    filter
        .predicates()
        .iter()
        .try_fold(Condition::all(), |condition, (name, value)| {
            let col = column(name).ok_or_else(|| {
                RemoteError::Validation(format!("unsupported filter column: {name}"))
            })?;
            let value = value.as_str().ok_or_else(|| {
                RemoteError::Validation(format!("filter on {name} must be a string"))
            })?;
            Ok(condition.add(col.eq(value)))
        })
}

fn ordered<E: EntityTrait>(
    query: Select<E>,
    filter: &Filter,
    column: fn(&str) -> Option<E::Column>,
) -> Result<Select<E>, RemoteError> {
    let Some(order) = filter.order() else {
        return Ok(query);
    };
    let col = column(&order.column).ok_or_else(|| {
        RemoteError::Validation(format!("unsupported order column: {}", order.column))
    })?;
    let query = if order.descending {
        query.order_by_desc(col)
    } else {
        query.order_by_asc(col)
    };
    // Insertion order breaks ties.
    Ok(match column("created_at") {
        Some(created_at) => query.order_by_asc(created_at),
        None => query,
    })
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn select(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Row>, RemoteError> {
        match collection {
            Collection::Expenses => {
                let query = expenses::Entity::find().filter(condition(filter, expenses::column)?);
                ordered(query, filter, expenses::column)?
                    .all(&self.database)
                    .await?
                    .into_iter()
                    .map(|model| to_row(Expense::from(model)))
                    .collect()
            }
            Collection::Profiles => {
                let query = profiles::Entity::find().filter(condition(filter, profiles::column)?);
                ordered(query, filter, profiles::column)?
                    .all(&self.database)
                    .await?
                    .into_iter()
                    .map(|model| to_row(Profile::from(model)))
                    .collect()
            }
        }
    }

    async fn insert(&self, collection: Collection, row: Row) -> Result<(), RemoteError> {
        match collection {
            Collection::Expenses => self.insert_expense(row).await,
            Collection::Profiles => self.insert_profile(row).await,
        }
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: Row,
    ) -> Result<(), RemoteError> {
        reject_owner_change(&fields)?;
        match collection {
            Collection::Expenses => self.update_expenses(filter, fields).await,
            Collection::Profiles => self.update_profiles(filter, fields).await,
        }
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<(), RemoteError> {
        match collection {
            Collection::Expenses => {
                self.find_owned::<expenses::Entity>(collection, filter, expenses::column)
                    .await?;
                expenses::Entity::delete_many()
                    .filter(condition(filter, expenses::column)?)
                    .exec(&self.database)
                    .await?;
            }
            Collection::Profiles => {
                self.find_owned::<profiles::Entity>(collection, filter, profiles::column)
                    .await?;
                profiles::Entity::delete_many()
                    .filter(condition(filter, profiles::column)?)
                    .exec(&self.database)
                    .await?;
            }
        }
        Ok(())
    }
}
