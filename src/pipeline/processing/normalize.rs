use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};
use walkdir::WalkDir;

use crate::constants::{
    self, ADMINISTRATIVE_COLUMNS, COL_CANDIDATE_LATITUDE, COL_CANDIDATE_LONGITUDE, COL_CAND_ZIP,
    COL_DONOR_LATITUDE, COL_DONOR_LONGITUDE, COL_FILE_YEAR, COL_FORMATTED_TRANSACTION_DT,
    COL_TRANSACTION_DT, COL_ZIP_CODE,
};
use crate::error::Result;
use crate::pipeline::ingestion::delimited::{read_raw_file, write_batch_file};
use crate::pipeline::processing::batch::{Batch, Cell};
use crate::pipeline::processing::dates::{try_normalize_date, FALLBACK_DATE};
use crate::pipeline::processing::diagnostics::NormalizeDiagnostics;
use crate::pipeline::processing::geocode::{GeocodeCache, PostalLookup};
use crate::pipeline::processing::recurrence::{self, RecurrenceMode};
use crate::pipeline::processing::schema::SchemaCatalog;

/// Which postal column feeds which coordinate pair
struct GeocodeTarget {
    source: &'static str,
    latitude: &'static str,
    longitude: &'static str,
}

const GEOCODE_TARGETS: [GeocodeTarget; 2] = [
    GeocodeTarget {
        source: COL_CAND_ZIP,
        latitude: COL_CANDIDATE_LATITUDE,
        longitude: COL_CANDIDATE_LONGITUDE,
    },
    GeocodeTarget {
        source: COL_ZIP_CODE,
        latitude: COL_DONOR_LATITUDE,
        longitude: COL_DONOR_LONGITUDE,
    },
];

/// Normalizes one source file at a time, sharing the geocode cache and the
/// diagnostics across every file of a run.
pub struct RecordNormalizer<L> {
    geocoder: GeocodeCache<L>,
    mode: RecurrenceMode,
    diagnostics: NormalizeDiagnostics,
}

impl<L: PostalLookup> RecordNormalizer<L> {
    pub fn new(lookup: L, mode: RecurrenceMode) -> Self {
        Self {
            geocoder: GeocodeCache::new(lookup),
            mode,
            diagnostics: NormalizeDiagnostics::new(),
        }
    }

    pub fn diagnostics(&self) -> &NormalizeDiagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> NormalizeDiagnostics {
        self.diagnostics
    }

    pub fn geocoder(&self) -> &GeocodeCache<L> {
        &self.geocoder
    }

    /// Column list for a batch: the schema's, plus the administrative columns
    /// when the schema does not already declare `file_year`.
    pub fn effective_columns(columns: &[String]) -> Vec<String> {
        let mut columns = columns.to_vec();
        if !columns.iter().any(|c| c == COL_FILE_YEAR) {
            columns.extend(ADMINISTRATIVE_COLUMNS.iter().map(|c| c.to_string()));
        }
        columns
    }

    /// Normalize a batch in memory.
    ///
    /// `source_name` is the file name the batch came from; only
    /// `individual_contributions.txt` gets date normalization and recurrence
    /// columns. A batch whose columns are already assigned is realigned against
    /// `columns` only if it has none yet.
    pub fn normalize_batch(
        &mut self,
        batch: &mut Batch,
        columns: &[String],
        year: &str,
        source_name: &str,
    ) -> Result<()> {
        if batch.columns().is_empty() {
            let names = Self::effective_columns(columns);
            let dropped = batch.assign_columns(&names) + batch.drop_unnamed_columns();
            self.diagnostics.cells_truncated(dropped);
        }

        for target in &GEOCODE_TARGETS {
            self.geocode_column(batch, target)?;
        }

        if source_name == constants::INDIVIDUAL_CONTRIBUTIONS_FILE {
            self.format_transaction_dates(batch);
            recurrence::apply(batch, self.mode, &mut self.diagnostics);
        }

        batch.fill_column(COL_FILE_YEAR, year);
        Ok(())
    }

    fn geocode_column(&mut self, batch: &mut Batch, target: &GeocodeTarget) -> Result<()> {
        let Some(codes) = batch.column(target.source) else {
            return Ok(());
        };
        let mut latitudes: Vec<Cell> = Vec::with_capacity(codes.len());
        let mut longitudes: Vec<Cell> = Vec::with_capacity(codes.len());
        for code in codes {
            let (lat, lon) = self.geocoder.resolve(code, &mut self.diagnostics)?;
            latitudes.push(Some(lat.to_string()));
            longitudes.push(Some(lon.to_string()));
        }
        batch.set_column(target.latitude, latitudes);
        batch.set_column(target.longitude, longitudes);
        Ok(())
    }

    fn format_transaction_dates(&mut self, batch: &mut Batch) {
        let raw = batch
            .column(COL_TRANSACTION_DT)
            .unwrap_or_else(|| vec![None; batch.len()]);
        let formatted: Vec<Cell> = raw
            .into_iter()
            .map(|value| {
                let date = try_normalize_date(value).unwrap_or_else(|reason| {
                    self.diagnostics.date_fallback(reason);
                    FALLBACK_DATE
                });
                Some(date.to_string())
            })
            .collect();
        batch.set_column(COL_FORMATTED_TRANSACTION_DT, formatted);
    }

    /// Normalize one file in place: read, normalize, rewrite with a header row.
    pub fn normalize_file(&mut self, data_path: &Path, columns: &[String], year: &str) -> Result<()> {
        let source_name = data_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let mut batch = read_raw_file(data_path)?;
        self.normalize_batch(&mut batch, columns, year, &source_name)?;
        write_batch_file(data_path, &batch)?;

        let table = data_path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        self.diagnostics.file_processed(table, batch.len());
        info!(file = %data_path.display(), rows = batch.len(), columns = batch.columns().len(), "File normalized");
        Ok(())
    }

    /// Normalize every `*.txt` file under `data_dir`, at any depth.
    ///
    /// Each file uses the schema named after its stem; files are handled one at a
    /// time in path order. Returns the paths that were rewritten.
    pub fn normalize_directory(
        &mut self,
        data_dir: &Path,
        catalog: &SchemaCatalog,
        year: &str,
    ) -> Result<Vec<PathBuf>> {
        let span = info_span!("normalize_directory", dir = %data_dir.display(), year);
        let _enter = span.enter();

        let mut processed = Vec::new();
        for entry in WalkDir::new(data_dir).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(constants::DATA_FILE_EXTENSION)
            {
                continue;
            }
            let Some(table) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let (columns, fallback) = catalog.columns_for(table);
            if fallback {
                warn!(table, columns = columns.len(), "schema incomplete; using fallback layout");
                self.diagnostics.schema_fallback(table);
            }
            if columns.is_empty() {
                warn!(file = %path.display(), "no columns known for file; skipping");
                continue;
            }
            debug!(file = %path.display(), table, "normalizing");
            self.normalize_file(path, &columns, year)?;
            processed.push(path.to_path_buf());
        }
        Ok(processed)
    }
}
