mod expense;

pub use expense::{parse_timestamp, Expense, NewExpense};
