use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::constants::FIELD_DELIMITER;
use crate::error::Result;
use crate::pipeline::processing::batch::{Batch, Cell};

fn cell(value: &str) -> Cell {
    let value = value.trim_end_matches(['\r', '\n']);
    (!value.is_empty()).then(|| value.to_string())
}

/// Read a raw bulk file: pipe-delimited, no header, no quoting, ragged rows allowed.
pub fn read_raw_file(path: &Path) -> Result<Batch> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(FIELD_DELIMITER)
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(cell).collect());
    }
    Ok(Batch::from_raw_rows(rows))
}

/// Read a file produced by [`write_batch_file`]: header row first.
pub fn read_normalized_file(path: &Path) -> Result<Batch> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(FIELD_DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let mut row: Vec<Cell> = record.iter().map(cell).collect();
        row.resize(columns.len(), None);
        rows.push(row);
    }
    Ok(Batch::new(columns, rows))
}

/// Write a batch with a header row, replacing whatever is at `path`.
///
/// The batch is written to a sibling temp file first and renamed over the
/// original, so a failed write leaves the previous content in place.
pub fn write_batch_file(path: &Path, batch: &Batch) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let file = BufWriter::new(File::create(&tmp)?);
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(FIELD_DELIMITER)
            .from_writer(file);
        wtr.write_record(batch.columns())?;
        for row in batch.rows() {
            wtr.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        let mut file = wtr.into_inner().map_err(|e| e.into_error())?;
        file.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}
