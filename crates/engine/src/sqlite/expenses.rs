//! `expenses` table.

use sea_orm::entity::prelude::*;

use crate::{Amount, expenses::Expense, session::UserId};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// Minor units.
    pub amount: i64,
    pub category: String,
    pub date: Date,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Expense {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: UserId::new(model.user_id),
            title: model.title,
            amount: Amount::new(model.amount),
            category: model.category.parse().unwrap_or_default(),
            date: model.date,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub(super) fn column(name: &str) -> Option<Column> {
    match name {
        "id" => Some(Column::Id),
        "user_id" => Some(Column::UserId),
        "category" => Some(Column::Category),
        "date" => Some(Column::Date),
        "created_at" => Some(Column::CreatedAt),
        _ => None,
    }
}
