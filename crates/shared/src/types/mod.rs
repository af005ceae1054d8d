//! Common types used across the workspace.

pub mod id;
pub mod money;
pub mod pagination;

pub use id::*;
pub use money::{AMOUNT_SCALE, Currency, MAX_AMOUNT, Money, round_amount};
pub use pagination::{PageMeta, PageRequest, PageResponse};
