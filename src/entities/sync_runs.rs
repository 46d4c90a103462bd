//! `SeaORM` Entity for sync_runs table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_runs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: String,
    pub status: String,
    pub mode: String,
    pub period_start: Option<Date>,
    pub period_end: Option<Date>,
    pub modules: Json,
    pub module_index: i32,
    pub cursor: Option<Json>,
    pub progress: Json,
    pub is_processing: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime,
    pub started_at: Option<DateTime>,
    pub finished_at: Option<DateTime>,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
