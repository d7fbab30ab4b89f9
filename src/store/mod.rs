//! Owner-partitioned persistence of expense records.
//!
//! Every owner's records live under one key, `expenses_<owner>`, as a JSON
//! array. `list`, `add` and `delete` all go through [`partition_key`].

use std::collections::HashSet;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{Expense, NewExpense};
use crate::storage::{KeyValueStore, StorageError};

const KEY_PREFIX: &str = "expenses_";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read stored expenses: {0}")]
    Read(#[source] StorageError),

    #[error("failed to persist expenses: {0}")]
    Write(#[source] StorageError),

    #[error("failed to encode expenses: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The stored value for an owner could not be read as a record array.
/// Never leaves this module: callers see an empty set.
#[derive(Debug, Error)]
#[error("malformed expense data under {key}: {reason}")]
struct MalformedData {
    key: String,
    reason: String,
}

pub fn partition_key(owner: &str) -> String {
    format!("{KEY_PREFIX}{owner}")
}

pub struct ExpenseStore<S> {
    storage: S,
    writes: Mutex<()>,
}

impl<S: KeyValueStore> ExpenseStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            writes: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// All of `owner`'s expenses, most recent `date` first.
    ///
    /// Unreadable or malformed data is logged and reported as no data.
    pub fn list(&self, owner: &str) -> Vec<Expense> {
        match self.load(owner) {
            Ok(expenses) => expenses,
            Err(e) => {
                tracing::error!(owner, error = %e, "could not read expenses");
                Vec::new()
            }
        }
    }

    /// The first `limit` entries of [`list`](Self::list).
    pub fn recent(&self, owner: &str, limit: usize) -> Vec<Expense> {
        let mut expenses = self.list(owner);
        expenses.truncate(limit);
        expenses
    }

    /// Record a new expense for `owner` and return it with its assigned id.
    pub async fn add(&self, owner: &str, data: NewExpense) -> Result<Expense, StoreError> {
        let _guard = self.writes.lock().await;
        let current = self.load(owner).map_err(StoreError::Read)?;

        let expense = data.into_expense(Uuid::new_v4().to_string(), Utc::now());
        let mut updated = Vec::with_capacity(current.len() + 1);
        updated.push(expense.clone());
        updated.extend(current);

        self.persist(owner, &updated)?;
        tracing::debug!(owner, id = %expense.id, "expense added");
        Ok(expense)
    }

    /// Remove the expense with `id`. An unknown id leaves storage untouched.
    pub async fn delete(&self, owner: &str, id: &str) -> Result<(), StoreError> {
        let _guard = self.writes.lock().await;
        let mut expenses = self.load(owner).map_err(StoreError::Read)?;

        let before = expenses.len();
        expenses.retain(|e| e.id != id);
        if expenses.len() == before {
            tracing::debug!(owner, id, "delete of unknown expense ignored");
            return Ok(());
        }

        self.persist(owner, &expenses)?;
        tracing::debug!(owner, id, "expense deleted");
        Ok(())
    }

    fn load(&self, owner: &str) -> Result<Vec<Expense>, StorageError> {
        let key = partition_key(owner);
        let Some(raw) = self.storage.get(&key)? else {
            return Ok(Vec::new());
        };
        match decode(&key, &raw) {
            Ok(mut expenses) => {
                // Stable: equal dates keep stored (newest-added first) order.
                expenses.sort_by(|a, b| b.date.cmp(&a.date));
                Ok(expenses)
            }
            Err(e) => {
                tracing::warn!(error = %e, "treating stored expenses as empty");
                Ok(Vec::new())
            }
        }
    }

    fn persist(&self, owner: &str, expenses: &[Expense]) -> Result<(), StoreError> {
        let json = serde_json::to_string(expenses)?;
        self.storage
            .set(&partition_key(owner), &json)
            .map_err(StoreError::Write)
    }
}

/// Decode a stored array, dropping entries that are not valid expenses and
/// repeated ids.
fn decode(key: &str, raw: &str) -> Result<Vec<Expense>, MalformedData> {
    let malformed = |reason: String| MalformedData {
        key: key.to_string(),
        reason,
    };
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;
    let serde_json::Value::Array(entries) = value else {
        return Err(malformed("expected a JSON array".into()));
    };

    let mut seen = HashSet::new();
    let mut expenses = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Expense>(entry) {
            Ok(expense) if seen.insert(expense.id.clone()) => expenses.push(expense),
            Ok(expense) => {
                tracing::warn!(key, index, id = %expense.id, "skipping duplicate expense id");
            }
            Err(e) => {
                tracing::warn!(key, index, error = %e, "skipping malformed expense entry");
            }
        }
    }
    Ok(expenses)
}

#[cfg(test)]
mod tests;
