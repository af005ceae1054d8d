//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod account;
pub mod balance;
pub mod entry;
mod ledger_write;
mod mapping;
pub mod posting;
pub mod reversal;

pub use account::{AccountFilter, AccountRepository};
pub use balance::BalanceRepository;
pub use entry::{EntryFilter, EntryRepository};
pub use posting::PostingRepository;
pub use reversal::ReversalRepository;
