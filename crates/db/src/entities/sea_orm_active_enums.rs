//! Postgres enum types used by the ledger tables.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "account_kind")]
pub enum AccountKind {
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "bank")]
    Bank,
    #[sea_orm(string_value = "receivable")]
    Receivable,
    #[sea_orm(string_value = "payable")]
    Payable,
    #[sea_orm(string_value = "agent")]
    Agent,
    #[sea_orm(string_value = "sales")]
    Sales,
    #[sea_orm(string_value = "commission")]
    Commission,
    #[sea_orm(string_value = "suspense")]
    Suspense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "transaction_kind")]
pub enum TransactionKind {
    #[sea_orm(string_value = "debit")]
    Debit,
    #[sea_orm(string_value = "credit")]
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "service_category")]
pub enum ServiceCategory {
    #[sea_orm(string_value = "ticket")]
    Ticket,
    #[sea_orm(string_value = "hotel")]
    Hotel,
    #[sea_orm(string_value = "transport")]
    Transport,
    #[sea_orm(string_value = "package")]
    Package,
    #[sea_orm(string_value = "payment")]
    Payment,
    #[sea_orm(string_value = "commission")]
    Commission,
    #[sea_orm(string_value = "refund")]
    Refund,
    #[sea_orm(string_value = "other")]
    Other,
}
