use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::io::Write;
use std::str::FromStr;

use expense_tracker::models::parse_timestamp;
use expense_tracker::storage::KeyValueStore;
use expense_tracker::{summarize, ExpenseStore, NewExpense};

use super::format::{format_amount, transactions, truncate};

/// Flags that take the next argument as their value.
const VALUE_FLAGS: &[&str] = &["--user", "--db", "--date", "--limit"];

#[derive(Debug, Default, PartialEq)]
pub(crate) struct CliArgs {
    positional: Vec<String>,
    flags: Vec<(String, String)>,
}

impl CliArgs {
    pub(crate) fn parse<I, A>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let mut parsed = Self::default();
        let mut iter = args.into_iter().map(Into::into);
        while let Some(arg) = iter.next() {
            if VALUE_FLAGS.contains(&arg.as_str()) {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("{arg} needs a value"))?;
                parsed.flags.push((arg, value));
            } else {
                parsed.positional.push(arg);
            }
        }
        Ok(parsed)
    }

    /// Last value given for `name`.
    pub(crate) fn flag(&self, name: &str) -> Option<&str> {
        self.flags
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn command(&self) -> Option<&str> {
        self.positional.first().map(String::as_str)
    }

    pub(crate) fn operands(&self) -> &[String] {
        self.positional.get(1..).unwrap_or(&[])
    }
}

pub(crate) async fn as_cli<S: KeyValueStore>(
    args: &CliArgs,
    store: &ExpenseStore<S>,
    out: &mut impl Write,
) -> Result<()> {
    match args.command().unwrap_or("help") {
        "add" | "a" => cli_add(args, store, out).await,
        "list" | "ls" => cli_list(args, store, out),
        "delete" | "rm" => cli_delete(args, store, out).await,
        "summary" | "s" => cli_summary(args, store, out),
        "--help" | "-h" | "help" => print_usage(out),
        "--version" | "-V" | "version" => {
            writeln!(out, "expense-tracker {}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => {
            print_usage(out)?;
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage(out: &mut impl Write) -> Result<()> {
    writeln!(out, "expense-tracker — local-only personal expense tracker")?;
    writeln!(out)?;
    writeln!(out, "Usage: expense-tracker --user <name> <command>")?;
    writeln!(out)?;
    writeln!(out, "Commands:")?;
    writeln!(out, "  add <amount> <category> [description]   Record an expense")?;
    writeln!(out, "    --date <YYYY-MM-DD>                   When it happened (default: now)")?;
    writeln!(out, "  list                                    List expenses, newest first")?;
    writeln!(out, "    --limit <N>                           Show at most N expenses")?;
    writeln!(out, "  delete <id>                             Delete an expense")?;
    writeln!(out, "  summary                                 Weekly and monthly totals")?;
    writeln!(out, "  --help, -h                              Show this help")?;
    writeln!(out, "  --version, -V                           Show version")?;
    writeln!(out)?;
    writeln!(out, "Options:")?;
    writeln!(out, "  --db <path>                             Database file (default: data directory)")?;
    Ok(())
}

pub(super) fn require_user(args: &CliArgs) -> Result<&str> {
    let user = args
        .flag("--user")
        .map(str::trim)
        .ok_or_else(|| anyhow::anyhow!("Missing --user <name>"))?;
    if user.is_empty() {
        anyhow::bail!("User name must not be empty");
    }
    Ok(user)
}

/// Parse an amount as typed into a form: optional `$`, optional thousands commas.
pub(super) fn parse_amount(raw: &str) -> Result<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let amount = Decimal::from_str(&cleaned)
        .with_context(|| format!("Invalid amount: {raw}"))?;
    if amount < Decimal::ZERO {
        anyhow::bail!("Amount must not be negative: {raw}");
    }
    Ok(amount)
}

/// A bare date is local midnight; anything else must be an RFC 3339 timestamp.
pub(super) fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        let midnight = date.and_time(NaiveTime::MIN);
        let local = Local
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc());
        return Ok(local);
    }
    parse_timestamp(raw).ok_or_else(|| anyhow::anyhow!("Invalid date: {raw} (expected YYYY-MM-DD)"))
}

async fn cli_add<S: KeyValueStore>(
    args: &CliArgs,
    store: &ExpenseStore<S>,
    out: &mut impl Write,
) -> Result<()> {
    let user = require_user(args)?;
    let operands = args.operands();
    if operands.len() < 2 {
        anyhow::bail!(
            "Usage: expense-tracker --user <name> add <amount> <category> [description] [--date YYYY-MM-DD]"
        );
    }

    let amount = parse_amount(&operands[0])?;
    let category = operands[1].trim();
    if category.is_empty() {
        anyhow::bail!("Category must not be empty");
    }
    let description = operands[2..].join(" ");
    let date = match args.flag("--date") {
        Some(raw) => parse_date(raw)?,
        None => Utc::now(),
    };

    let expense = store
        .add(user, NewExpense::new(amount, category, description, date))
        .await
        .context("Failed to save expense")?;
    writeln!(
        out,
        "Added {} {} on {} (id {})",
        format_amount(expense.amount),
        expense.category,
        expense.date.with_timezone(&Local).format("%Y-%m-%d"),
        expense.id
    )?;
    Ok(())
}

fn cli_list<S: KeyValueStore>(
    args: &CliArgs,
    store: &ExpenseStore<S>,
    out: &mut impl Write,
) -> Result<()> {
    let user = require_user(args)?;
    let expenses = match args.flag("--limit") {
        Some(raw) => {
            let limit: usize = raw
                .parse()
                .with_context(|| format!("Invalid --limit: {raw}"))?;
            store.recent(user, limit)
        }
        None => store.list(user),
    };

    if expenses.is_empty() {
        writeln!(out, "No expenses recorded yet. Add your first expense with `add`.")?;
        return Ok(());
    }

    writeln!(
        out,
        "{:<10} {:<16} {:>12}  {:<24} ID",
        "Date", "Category", "Amount", "Description"
    )?;
    writeln!(out, "{}", "─".repeat(100))?;
    for e in &expenses {
        writeln!(
            out,
            "{:<10} {:<16} {:>12}  {:<24} {}",
            e.date.with_timezone(&Local).format("%Y-%m-%d"),
            truncate(&e.category, 16),
            format_amount(e.amount),
            truncate(&e.description, 24),
            e.id,
        )?;
    }
    Ok(())
}

async fn cli_delete<S: KeyValueStore>(
    args: &CliArgs,
    store: &ExpenseStore<S>,
    out: &mut impl Write,
) -> Result<()> {
    let user = require_user(args)?;
    let Some(id) = args.operands().first() else {
        anyhow::bail!("Usage: expense-tracker --user <name> delete <id>");
    };

    let existed = store.list(user).iter().any(|e| &e.id == id);
    store
        .delete(user, id)
        .await
        .context("Failed to delete expense")?;
    if existed {
        writeln!(out, "Deleted {id}")?;
    } else {
        writeln!(out, "No expense with id {id}")?;
    }
    Ok(())
}

fn cli_summary<S: KeyValueStore>(
    args: &CliArgs,
    store: &ExpenseStore<S>,
    out: &mut impl Write,
) -> Result<()> {
    let user = require_user(args)?;
    let expenses = store.list(user);
    let summary = summarize(&expenses, &Local::now());

    writeln!(out, "Expenses for {user}")?;
    writeln!(out, "{}", "─".repeat(40))?;
    writeln!(
        out,
        "  This Week:   {:>12}  {}",
        format_amount(summary.weekly_total),
        transactions(summary.weekly_count)
    )?;
    writeln!(
        out,
        "  This Month:  {:>12}  {}",
        format_amount(summary.monthly_total),
        transactions(summary.monthly_count)
    )?;

    if summary.is_empty() {
        writeln!(out)?;
        writeln!(out, "No expenses this week or month.")?;
        return Ok(());
    }

    print_breakdown(
        out,
        "Categories (This Week)",
        summary.weekly_by_category.iter().map(|(k, v)| (k.as_str(), *v)),
        true,
    )?;
    print_breakdown(
        out,
        "Categories (This Month)",
        summary.monthly_by_category.iter().map(|(k, v)| (k.as_str(), *v)),
        true,
    )?;
    print_breakdown(
        out,
        "Daily (This Week)",
        summary.weekly_by_weekday.iter().copied(),
        false,
    )
}

pub(super) fn print_breakdown<'a>(
    out: &mut impl Write,
    title: &str,
    rows: impl IntoIterator<Item = (&'a str, Decimal)>,
    largest_first: bool,
) -> Result<()> {
    let mut rows: Vec<(&str, Decimal)> = rows.into_iter().collect();
    if largest_first {
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    }

    writeln!(out)?;
    writeln!(out, "{title}:")?;
    if rows.is_empty() {
        writeln!(out, "  No expenses")?;
        return Ok(());
    }
    for (name, amount) in rows {
        writeln!(out, "  {:<24} {:>12}", truncate(name, 24), format_amount(amount))?;
    }
    Ok(())
}

pub(crate) fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        format!("{home}/{rest}")
    } else {
        path.to_string()
    }
}
