//! `SeaORM` Entity for ledger_entries table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{ServiceCategory, TransactionKind};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub transaction_kind: TransactionKind,
    pub service_category: ServiceCategory,
    #[sea_orm(column_type = "Decimal(Some((20, 2)))")]
    pub transaction_amount: Decimal,
    pub booking_id: Option<i64>,
    pub organization_id: Option<i64>,
    pub inventory_owner_organization_id: Option<i64>,
    pub branch_id: Option<i64>,
    pub agency_id: Option<i64>,
    pub area_agency_id: Option<i64>,
    #[sea_orm(column_type = "JsonBinary")]
    pub payment_ids: Json,
    #[sea_orm(column_type = "Text")]
    pub narration: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub remarks: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub notes: Json,
    pub reversed: bool,
    #[sea_orm(unique)]
    pub reversed_of: Option<Uuid>,
    pub reversed_at: Option<DateTimeWithTimeZone>,
    pub reversed_by: Option<i64>,
    pub created_by: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ledger_lines::Entity")]
    LedgerLines,
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ReversedOf",
        to = "Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    ReversedOf,
}

impl Related<super::ledger_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
