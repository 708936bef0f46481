//! SQLite-backed relational store for normalized bulk files and grid summaries.

pub mod queries;

use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::constants::{self, is_numeric_column};
use crate::error::Result;
use crate::pipeline::ingestion::delimited::read_normalized_file;
use crate::pipeline::processing::batch::Batch;

/// Quote an identifier for interpolation into SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self { conn })
    }

    /// Open an existing database without creating it; used by the query layer so a
    /// missing database reports as unavailable instead of silently appearing empty.
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        Ok(stmt.exists([table])?)
    }

    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Create `table` for `columns`, or add whichever columns it is missing.
    fn ensure_table(&self, table: &str, columns: &[String]) -> Result<()> {
        let decl = |c: &String| {
            let affinity = if is_numeric_column(c) { "NUMERIC" } else { "TEXT" };
            format!("{} {}", quote_ident(c), affinity)
        };
        if !self.table_exists(table)? {
            let cols: Vec<String> = columns.iter().map(decl).collect();
            self.conn.execute_batch(&format!(
                "CREATE TABLE {} ({});",
                quote_ident(table),
                cols.join(", ")
            ))?;
            debug!(table, columns = columns.len(), "table created");
            return Ok(());
        }
        let existing = self.table_columns(table)?;
        for column in columns.iter().filter(|c| !existing.contains(c)) {
            self.conn.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {};",
                quote_ident(table),
                decl(column)
            ))?;
            debug!(table, column = %column, "column added");
        }
        Ok(())
    }

    /// Append every row of a batch to `table` in one transaction.
    pub fn load_batch(&mut self, table: &str, batch: &Batch) -> Result<usize> {
        self.ensure_table(table, batch.columns())?;
        let cols: Vec<String> = batch.columns().iter().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            cols.join(", "),
            placeholders.join(", ")
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in batch.rows() {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        Ok(batch.len())
    }

    /// Load a normalized file into the table named after its stem.
    pub fn load_normalized_file(&mut self, path: &Path) -> Result<usize> {
        let table = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let batch = read_normalized_file(path)?;
        let rows = self.load_batch(&table, &batch)?;
        info!(file = %path.display(), table = %table, rows, "File loaded");
        Ok(rows)
    }

    /// Load every normalized `*.txt` file under `dir`, at any depth.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize> {
        let mut total = 0;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            let is_data = entry.file_type().is_file()
                && entry.path().extension().and_then(|e| e.to_str())
                    == Some(constants::DATA_FILE_EXTENSION);
            if is_data {
                total += self.load_normalized_file(entry.path())?;
            }
        }
        Ok(total)
    }

    pub fn drop_table(&self, table: &str) -> Result<()> {
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(table)))?;
        info!(table, "Table dropped");
        Ok(())
    }

    /// Set `candidate_committee_linkages.committee_total` to the summed
    /// committee-to-candidate contribution amount of each linked committee.
    pub fn refresh_committee_totals(&self) -> Result<usize> {
        let linkages = constants::CANDIDATE_COMMITTEE_LINKAGES;
        if !self.table_columns(linkages)?.iter().any(|c| c == "committee_total") {
            self.conn.execute_batch(&format!(
                "ALTER TABLE {linkages} ADD COLUMN committee_total NUMERIC;"
            ))?;
        }
        let updated = self.conn.execute(
            &format!(
                "UPDATE {linkages} SET committee_total = (
                     SELECT SUM(ct.transaction_amt) FROM {contributions} ct
                     WHERE ct.cmte_id = {linkages}.cmte_id
                 )
                 WHERE cmte_id IN (SELECT cmte_id FROM {contributions})",
                contributions = constants::COMMITTEE_CANDIDATE_CONTRIBUTIONS,
            ),
            [],
        )?;
        info!(updated, "Committee totals refreshed");
        Ok(updated)
    }
}
