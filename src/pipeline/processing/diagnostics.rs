use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::metrics;
use crate::pipeline::processing::dates::MalformedDate;

/// Counts every safe default the normalizer substituted during one run.
///
/// None of these conditions stop ingestion; they are tallied so that data quality
/// can be measured after the fact.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeDiagnostics {
    pub files_processed: usize,
    pub rows_processed: usize,
    /// Keyed by [`MalformedDate::as_str`]
    pub date_fallbacks: BTreeMap<&'static str, usize>,
    pub geocode_lookups: usize,
    pub geocode_unresolved: usize,
    pub truncated_cells: usize,
    pub schema_fallbacks: usize,
    pub unparsable_dates: usize,
    pub unparsable_amounts: usize,
    pub ungrouped_records: usize,
}

impl NormalizeDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_processed(&mut self, table: &str, rows: usize) {
        self.files_processed += 1;
        self.rows_processed += rows;
        metrics::normalize::file_processed(table, rows);
    }

    pub fn date_fallback(&mut self, reason: MalformedDate) {
        *self.date_fallbacks.entry(reason.as_str()).or_default() += 1;
        metrics::normalize::date_fallback(reason.as_str());
    }

    pub fn geocode_lookup(&mut self) {
        self.geocode_lookups += 1;
        metrics::normalize::geocode_lookup();
    }

    pub fn geocode_unresolved(&mut self) {
        self.geocode_unresolved += 1;
        metrics::normalize::geocode_unresolved();
    }

    pub fn cells_truncated(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.truncated_cells += count;
        metrics::normalize::cells_truncated(count);
    }

    pub fn schema_fallback(&mut self, table: &str) {
        self.schema_fallbacks += 1;
        metrics::normalize::schema_fallback(table);
    }

    pub fn unparsable_date(&mut self) {
        self.unparsable_dates += 1;
        metrics::normalize::unparsable_date();
    }

    pub fn unparsable_amount(&mut self) {
        self.unparsable_amounts += 1;
        metrics::normalize::unparsable_amount();
    }

    pub fn ungrouped_record(&mut self) {
        self.ungrouped_records += 1;
        metrics::normalize::ungrouped_record();
    }

    pub fn total_date_fallbacks(&self) -> usize {
        self.date_fallbacks.values().sum()
    }
}

impl fmt::Display for NormalizeDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "files processed:      {}", self.files_processed)?;
        writeln!(f, "rows processed:       {}", self.rows_processed)?;
        writeln!(f, "date fallbacks:       {}", self.total_date_fallbacks())?;
        for (reason, count) in &self.date_fallbacks {
            writeln!(f, "  {reason}: {count}")?;
        }
        writeln!(f, "geocode lookups:      {}", self.geocode_lookups)?;
        writeln!(f, "geocode unresolved:   {}", self.geocode_unresolved)?;
        writeln!(f, "truncated cells:      {}", self.truncated_cells)?;
        writeln!(f, "schema fallbacks:     {}", self.schema_fallbacks)?;
        writeln!(f, "unparsable dates:     {}", self.unparsable_dates)?;
        writeln!(f, "unparsable amounts:   {}", self.unparsable_amounts)?;
        write!(f, "ungrouped records:    {}", self.ungrouped_records)
    }
}
