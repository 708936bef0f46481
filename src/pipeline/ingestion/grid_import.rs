//! Download and import of the FEC committee and candidate summary grids.
//!
//! Each grid is published as a zip archive whose first entry is an XML
//! document of flat records. The grid tables are rebuilt from scratch on
//! every import.

use rusqlite::types::Value as SqlValue;
use rusqlite::params_from_iter;
use std::io::{Cursor, Read};
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::GridsConfig;
use crate::constants;
use crate::error::{PipelineError, Result};
use crate::pipeline::storage::{quote_ident, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridKind {
    Committee,
    Candidate,
}

#[derive(Debug, Clone, Copy)]
struct GridField {
    name: &'static str,
    sql_type: &'static str,
    numeric: bool,
}

const fn text(name: &'static str) -> GridField {
    GridField { name, sql_type: "TEXT", numeric: false }
}

const fn amount(name: &'static str) -> GridField {
    GridField { name, sql_type: "NUMERIC", numeric: true }
}

const COMMITTEE_FIELDS: &[GridField] = &[
    text("com_nam"),
    GridField { name: "com_id", sql_type: "TEXT PRIMARY KEY", numeric: false },
    text("com_typ"),
    text("com_des"),
    text("org_tp"),
    amount("tot_rec"),
    amount("tot_dis"),
    amount("cas_on_han_clo_of_per"),
    text("cov_end_dat"),
];

const CANDIDATE_FIELDS: &[GridField] = &[
    text("can_nam"),
    text("lin_ima"),
    text("can_off"),
    text("can_off_sta"),
    text("can_off_dis"),
    text("can_par_aff"),
    text("can_inc_cha_ope_sea"),
    amount("tot_rec"),
    amount("tot_dis"),
    amount("cas_on_han_clo_of_per"),
    amount("deb_owe_by_com"),
    text("cov_end_dat"),
];

impl GridKind {
    pub fn table(self) -> &'static str {
        match self {
            GridKind::Committee => constants::COMMITTEE_GRID,
            GridKind::Candidate => constants::CANDIDATE_GRID,
        }
    }

    fn fields(self) -> &'static [GridField] {
        match self {
            GridKind::Committee => COMMITTEE_FIELDS,
            GridKind::Candidate => CANDIDATE_FIELDS,
        }
    }

    pub fn url(self, config: &GridsConfig, year: u16) -> String {
        let template = match self {
            GridKind::Committee => &config.committee_url,
            GridKind::Candidate => &config.candidate_url,
        };
        template.replace("{year}", &year.to_string())
    }

    fn create_table_sql(self) -> String {
        let columns: Vec<String> = self
            .fields()
            .iter()
            .map(|f| format!("{} {}", quote_ident(f.name), f.sql_type))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({});",
            quote_ident(self.table()),
            columns.join(", ")
        )
    }
}

impl std::fmt::Display for GridKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridKind::Committee => write!(f, "committee"),
            GridKind::Candidate => write!(f, "candidate"),
        }
    }
}

/// One grid record: `(field, text)` pairs in document order. An element with
/// no text content maps to `None`.
pub type GridRecord = Vec<(String, Option<String>)>;

fn parse_record(node: roxmltree::Node<'_, '_>) -> GridRecord {
    node.children()
        .filter(|child| child.is_element())
        .map(|child| {
            let value = child
                .text()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from);
            (child.tag_name().name().to_string(), value)
        })
        .collect()
}

/// Split a grid document into its records.
pub fn parse_grid_document(kind: GridKind, xml: &str) -> Result<Vec<GridRecord>> {
    let record_tag = match kind {
        GridKind::Committee => "com_sum",
        GridKind::Candidate => "candidate",
    };
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| PipelineError::GridDocument(format!("{kind} grid is not valid XML: {e}")))?;
    Ok(doc
        .descendants()
        .filter(|node| node.has_tag_name(record_tag))
        .map(parse_record)
        .collect())
}

fn field_value(record: &GridRecord, field: &GridField) -> Result<SqlValue> {
    let text = record
        .iter()
        .find(|(name, _)| name == field.name)
        .and_then(|(_, v)| v.as_deref());

    if !field.numeric {
        return Ok(text.map_or(SqlValue::Null, |t| SqlValue::Text(t.to_string())));
    }
    match text {
        None => Ok(SqlValue::Real(0.0)),
        Some(t) => t.parse::<f64>().map(SqlValue::Real).map_err(|_| {
            PipelineError::GridDocument(format!("{} is not numeric: {t:?}", field.name))
        }),
    }
}

/// Pull the first entry out of a zip archive held in memory.
pub fn extract_first_entry(archive: &[u8]) -> Result<String> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
    if zip.len() == 0 {
        return Err(PipelineError::GridDocument("archive has no entries".into()));
    }
    let mut entry = zip.by_index(0)?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Fetch the archive bytes for `url`; any non-success status is an error.
pub fn download_archive(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::Fetch {
            url: url.to_string(),
            message: format!("HTTP {status}"),
        });
    }
    Ok(response.bytes()?.to_vec())
}

/// Drop, recreate and fill the grid table for `kind` from an XML document.
pub fn import_grid_document(store: &mut Store, kind: GridKind, xml: &str) -> Result<usize> {
    let records = parse_grid_document(kind, xml)?;
    let fields = kind.fields();

    store.drop_table(kind.table())?;
    store.connection().execute_batch(&kind.create_table_sql())?;

    let columns: Vec<String> = fields.iter().map(|f| quote_ident(f.name)).collect();
    let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
        quote_ident(kind.table()),
        columns.join(", "),
        placeholders.join(", ")
    );

    let tx = store.connection_mut().transaction()?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(&sql)?;
        for record in &records {
            let values = fields
                .iter()
                .map(|f| field_value(record, f))
                .collect::<Result<Vec<_>>>()?;
            inserted += stmt.execute(params_from_iter(values))?;
        }
    }
    tx.commit()?;

    info!(grid = %kind, records = records.len(), inserted, "Grid imported");
    Ok(inserted)
}

/// Download the `year` grid for `kind` and import it.
#[instrument(skip(store, config))]
pub fn import_grid(store: &mut Store, config: &GridsConfig, kind: GridKind, year: u16) -> Result<usize> {
    let url = kind.url(config, year);
    info!(url = %url, "Downloading grid archive");
    let archive = download_archive(&url, Duration::from_secs(config.timeout_seconds))?;
    let xml = extract_first_entry(&archive)?;
    import_grid_document(store, kind, &xml)
}
