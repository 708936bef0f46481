//! Per-contributor recurrence statistics.
//!
//! Contributions are grouped by (contributor name, ZIP code). The pair is a
//! heuristic stand-in for identity: two people sharing both collapse into one
//! group. Within a group records are ordered by transaction date and every record
//! receives the group's full date/amount history, total and mean gap.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use tracing::debug;

use crate::constants::{
    COL_AVERAGE_PERIODICITY, COL_FORMATTED_TRANSACTION_DT, COL_NAME, COL_PERIODICITY,
    COL_RECURRING_CONTRIBUTIONS, COL_TOTAL_TRANSACTION_AMT, COL_TRANSACTION_AMOUNTS,
    COL_TRANSACTION_AMT, COL_TRANSACTION_DATES, COL_ZIP_CODE, EMPTY_SEQUENCE,
};
use crate::pipeline::processing::batch::{Batch, Cell};
use crate::pipeline::processing::diagnostics::NormalizeDiagnostics;

/// Date stamped on every record in [`RecurrenceMode::Placeholder`]
pub const PLACEHOLDER_DATE: &str = "2020-01-01";

const DATE_FORMAT: &str = "%Y-%m-%d";
const NULL_ELEMENT: &str = "NULL";

/// How recurrence columns are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceMode {
    /// Group, order and aggregate for real
    #[default]
    Aggregate,
    /// Fixed values for fixtures: constant date, zero gaps and totals, empty sequences
    Placeholder,
}

impl FromStr for RecurrenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggregate" => Ok(RecurrenceMode::Aggregate),
            "placeholder" => Ok(RecurrenceMode::Placeholder),
            other => Err(format!("unknown recurrence mode '{other}'")),
        }
    }
}

/// Aggregates shared by every record of one (name, ZIP) group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    /// Ascending; unparsable dates last
    pub dates: Vec<Option<NaiveDate>>,
    /// Aligned with `dates`
    pub amounts: Vec<Option<f64>>,
    pub total: f64,
    pub average_periodicity: Option<f64>,
}

impl GroupSummary {
    /// `{2024-01-01,2024-01-11}`
    pub fn dates_literal(&self) -> String {
        array_literal(self.dates.iter().map(|d| match d {
            Some(date) => date.format(DATE_FORMAT).to_string(),
            None => NULL_ELEMENT.to_string(),
        }))
    }

    /// `{100,200.5}`
    pub fn amounts_literal(&self) -> String {
        array_literal(self.amounts.iter().map(|a| match a {
            Some(amount) => format_number(*amount),
            None => NULL_ELEMENT.to_string(),
        }))
    }

    /// More than one observed transaction date
    pub fn is_recurring(&self) -> bool {
        self.dates.iter().filter(|d| d.is_some()).count() > 1
    }
}

fn array_literal(items: impl Iterator<Item = String>) -> String {
    let joined: Vec<String> = items.collect();
    format!("{{{}}}", joined.join(","))
}

/// Integers print without a fractional part, everything else in shortest form
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Serialized date sequence for a record; records without a group get `{}`.
pub fn dates_literal_for(summary: Option<&GroupSummary>) -> String {
    summary
        .map(GroupSummary::dates_literal)
        .unwrap_or_else(|| EMPTY_SEQUENCE.to_string())
}

/// Serialized amount sequence for a record; records without a group get `{}`.
pub fn amounts_literal_for(summary: Option<&GroupSummary>) -> String {
    summary
        .map(GroupSummary::amounts_literal)
        .unwrap_or_else(|| EMPTY_SEQUENCE.to_string())
}

pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok())
}

/// Fill the recurrence columns of a contribution batch according to `mode`.
pub fn apply(batch: &mut Batch, mode: RecurrenceMode, diagnostics: &mut NormalizeDiagnostics) {
    match mode {
        RecurrenceMode::Aggregate => aggregate(batch, diagnostics),
        RecurrenceMode::Placeholder => stamp_placeholders(batch),
    }
}

/// Deterministic fixture values; the batch order is left untouched.
pub fn stamp_placeholders(batch: &mut Batch) {
    batch.fill_column(COL_FORMATTED_TRANSACTION_DT, PLACEHOLDER_DATE);
    batch.fill_column(COL_PERIODICITY, "0");
    batch.fill_column(COL_TOTAL_TRANSACTION_AMT, "0.0");
    batch.fill_column(COL_AVERAGE_PERIODICITY, "0.0");
    batch.fill_column(COL_TRANSACTION_DATES, EMPTY_SEQUENCE);
    batch.fill_column(COL_TRANSACTION_AMOUNTS, EMPTY_SEQUENCE);
    batch.fill_column(COL_RECURRING_CONTRIBUTIONS, "false");
}

/// One record's sort/group inputs
struct Contribution<'a> {
    row: usize,
    name: Option<&'a str>,
    zip: Option<&'a str>,
    date: Option<NaiveDate>,
    amount: Option<f64>,
}

impl Contribution<'_> {
    fn group_key(&self) -> Option<(&str, &str)> {
        Some((self.name?, self.zip?))
    }
}

/// Nulls sort after every value
fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Group, order and aggregate a contribution batch in place.
///
/// Expects `formatted_transaction_dt` to be populated already. The batch comes
/// back sorted by (name, ZIP, date) with `periodicity`, `transaction_dates`,
/// `transaction_amounts`, `total_transaction_amt`, `average_periodicity` and
/// `recurring_contributions` filled. Records whose name or ZIP is null belong
/// to no group and receive empty sequences and null aggregates.
pub fn aggregate(batch: &mut Batch, diagnostics: &mut NormalizeDiagnostics) {
    let n = batch.len();
    let names = batch.column(COL_NAME).unwrap_or_else(|| vec![None; n]);
    let zips = batch.column(COL_ZIP_CODE).unwrap_or_else(|| vec![None; n]);
    let raw_dates = batch
        .column(COL_FORMATTED_TRANSACTION_DT)
        .unwrap_or_else(|| vec![None; n]);
    let raw_amounts = batch.column(COL_TRANSACTION_AMT).unwrap_or_else(|| vec![None; n]);

    let mut contributions: Vec<Contribution<'_>> = (0..n)
        .map(|row| {
            let date = parse_date(raw_dates[row]);
            if date.is_none() {
                diagnostics.unparsable_date();
            }
            let amount = raw_amounts[row].and_then(|a| a.trim().parse::<f64>().ok());
            if amount.is_none() {
                diagnostics.unparsable_amount();
            }
            Contribution {
                row,
                name: names[row],
                zip: zips[row],
                date,
                amount,
            }
        })
        .collect();

    // Stable, so same-day contributions keep file order
    contributions.sort_by(|a, b| {
        nulls_last(&a.name, &b.name)
            .then_with(|| nulls_last(&a.zip, &b.zip))
            .then_with(|| nulls_last(&a.date, &b.date))
    });

    let mut periodicity: Vec<Option<i64>> = vec![None; n];
    let mut summaries: Vec<Option<GroupSummary>> = Vec::with_capacity(n);
    let mut groups = 0usize;

    let mut start = 0;
    while start < contributions.len() {
        let key = contributions[start].group_key();
        let mut end = start + 1;
        if key.is_some() {
            while end < contributions.len() && contributions[end].group_key() == key {
                end += 1;
            }
        }
        let group = &contributions[start..end];

        if key.is_none() {
            diagnostics.ungrouped_record();
            summaries.push(None);
            start = end;
            continue;
        }
        groups += 1;

        let mut gaps = Vec::new();
        for pair in group.windows(2) {
            let gap = match (pair[0].date, pair[1].date) {
                (Some(prev), Some(cur)) => Some((cur - prev).num_days()),
                _ => None,
            };
            periodicity[pair[1].row] = gap;
            gaps.extend(gap);
        }

        let summary = GroupSummary {
            dates: group.iter().map(|c| c.date).collect(),
            amounts: group.iter().map(|c| c.amount).collect(),
            total: group.iter().filter_map(|c| c.amount).sum(),
            average_periodicity: (!gaps.is_empty())
                .then(|| gaps.iter().sum::<i64>() as f64 / gaps.len() as f64),
        };
        summaries.extend(std::iter::repeat(Some(summary)).take(group.len()));
        start = end;
    }

    debug!(records = n, groups, "recurrence aggregated");

    // Materialize every derived column in sorted order
    let order: Vec<usize> = contributions.iter().map(|c| c.row).collect();
    let formatted: Vec<Cell> = contributions
        .iter()
        .map(|c| c.date.map(|d| d.format(DATE_FORMAT).to_string()))
        .collect();
    let periodicity: Vec<Cell> = order
        .iter()
        .map(|&row| Some(periodicity[row].unwrap_or(0).to_string()))
        .collect();
    let dates: Vec<Cell> = summaries.iter().map(|s| Some(dates_literal_for(s.as_ref()))).collect();
    let amounts: Vec<Cell> = summaries.iter().map(|s| Some(amounts_literal_for(s.as_ref()))).collect();
    let totals: Vec<Cell> = summaries
        .iter()
        .map(|s| s.as_ref().map(|s| format_number(s.total)))
        .collect();
    let averages: Vec<Cell> = summaries
        .iter()
        .map(|s| s.as_ref().and_then(|s| s.average_periodicity).map(format_number))
        .collect();
    let recurring: Vec<Cell> = summaries
        .iter()
        .map(|s| Some(s.as_ref().is_some_and(GroupSummary::is_recurring).to_string()))
        .collect();

    batch.reorder(&order);
    batch.set_column(COL_FORMATTED_TRANSACTION_DT, formatted);
    batch.set_column(COL_PERIODICITY, periodicity);
    batch.set_column(COL_TRANSACTION_DATES, dates);
    batch.set_column(COL_TRANSACTION_AMOUNTS, amounts);
    batch.set_column(COL_TOTAL_TRANSACTION_AMT, totals);
    batch.set_column(COL_AVERAGE_PERIODICITY, averages);
    batch.set_column(COL_RECURRING_CONTRIBUTIONS, recurring);
}
