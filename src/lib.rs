//! Per-user expense persistence and weekly/monthly spending summaries.
//!
//! Records are stored through [`storage::KeyValueStore`] by
//! [`store::ExpenseStore`]; [`summary::summarize`] turns a record list into the
//! figures a dashboard shows.

pub mod models;
pub mod storage;
pub mod store;
pub mod summary;

pub use models::{Expense, NewExpense};
pub use store::{ExpenseStore, StoreError};
pub use summary::{summarize, Summary};
