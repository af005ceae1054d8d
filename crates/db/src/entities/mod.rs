//! `SeaORM` entities for the ledger schema.

pub mod prelude;

pub mod accounts;
pub mod ledger_entries;
pub mod ledger_lines;
pub mod sea_orm_active_enums;
