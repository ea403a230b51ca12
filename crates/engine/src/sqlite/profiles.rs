//! `profiles` table. One row per `user_id`.

use sea_orm::entity::prelude::*;

use crate::{Amount, profiles::Profile, session::UserId};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub user_id: String,
    pub full_name: Option<String>,
    /// Minor units, 0 when unset.
    pub monthly_salary: i64,
    pub salary_set_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Profile {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: UserId::new(model.user_id),
            full_name: model.full_name,
            monthly_salary: Amount::new(model.monthly_salary),
            salary_set_at: model.salary_set_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub(super) fn column(name: &str) -> Option<Column> {
    match name {
        "id" => Some(Column::Id),
        "user_id" => Some(Column::UserId),
        "created_at" => Some(Column::CreatedAt),
        _ => None,
    }
}
