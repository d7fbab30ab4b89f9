use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A stored expense. Records are never edited in place; an edit is a delete
/// followed by a fresh add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Decimal,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "iso8601")]
    pub date: DateTime<Utc>,
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
}

/// The caller-supplied part of an expense; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub amount: Decimal,
    pub category: String,
    pub description: String,
    pub date: DateTime<Utc>,
}

impl NewExpense {
    pub fn new(
        amount: Decimal,
        category: impl Into<String>,
        description: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            amount,
            category: category.into(),
            description: description.into(),
            date,
        }
    }

    pub(crate) fn into_expense(self, id: String, created_at: DateTime<Utc>) -> Expense {
        Expense {
            id,
            amount: self.amount,
            category: self.category,
            description: self.description,
            date: self.date,
            created_at,
        }
    }
}

/// Parse a timestamp the way stored records are read: RFC 3339 with any
/// offset, or a bare `YYYY-MM-DD` taken as UTC midnight.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    iso8601::parse(raw)
}

/// Timestamps in the stored JSON.
///
/// Written in the `toISOString` shape (`2024-01-10T12:00:00.000Z`). Read
/// leniently: any RFC 3339 offset, or a bare `YYYY-MM-DD` taken as UTC midnight.
pub(crate) mod iso8601 {
    use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid ISO-8601 date: {raw:?}")))
    }

    pub(crate) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}
