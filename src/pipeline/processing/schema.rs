use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::constants;
use crate::error::Result;

/// The bulk source files this pipeline knows the layout of.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKind {
    IndividualContributions,
    CommitteeMaster,
    CandidateMaster,
    CandidateCommitteeLinkages,
    CommitteeCandidateContributions,
    Other(String),
}

impl SourceKind {
    /// Classify by table name or file stem (`committee_master`, `committee_master.txt`)
    pub fn from_name(name: &str) -> Self {
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name);
        match stem {
            constants::INDIVIDUAL_CONTRIBUTIONS => SourceKind::IndividualContributions,
            constants::COMMITTEE_MASTER => SourceKind::CommitteeMaster,
            constants::CANDIDATE_MASTER => SourceKind::CandidateMaster,
            constants::CANDIDATE_COMMITTEE_LINKAGES => SourceKind::CandidateCommitteeLinkages,
            constants::COMMITTEE_CANDIDATE_CONTRIBUTIONS => {
                SourceKind::CommitteeCandidateContributions
            }
            other => SourceKind::Other(other.to_string()),
        }
    }

    pub fn table_name(&self) -> &str {
        match self {
            SourceKind::IndividualContributions => constants::INDIVIDUAL_CONTRIBUTIONS,
            SourceKind::CommitteeMaster => constants::COMMITTEE_MASTER,
            SourceKind::CandidateMaster => constants::CANDIDATE_MASTER,
            SourceKind::CandidateCommitteeLinkages => constants::CANDIDATE_COMMITTEE_LINKAGES,
            SourceKind::CommitteeCandidateContributions => {
                constants::COMMITTEE_CANDIDATE_CONTRIBUTIONS
            }
            SourceKind::Other(name) => name,
        }
    }

    /// Published bulk-file layout, used when the schema file yields nothing.
    pub fn fallback_columns(&self) -> &'static [&'static str] {
        match self {
            SourceKind::IndividualContributions => &[
                "cmte_id", "amndt_ind", "rpt_tp", "transaction_pgi", "image_num",
                "transaction_tp", "entity_tp", "name", "city", "state", "zip_code",
                "employer", "occupation", "transaction_dt", "transaction_amt", "other_id",
                "tran_id", "file_num", "memo_cd", "memo_text", "sub_id",
            ],
            SourceKind::CommitteeMaster => &[
                "cmte_id", "cmte_nm", "tres_nm", "cmte_st1", "cmte_st2", "cmte_city",
                "cmte_st", "cmte_zip", "cmte_dsgn", "cmte_tp", "cmte_pty_affiliation",
                "cmte_filing_freq", "org_tp", "connected_org_nm", "cand_id",
            ],
            SourceKind::CandidateMaster => &[
                "cand_id", "cand_name", "cand_pty_affiliation", "cand_election_yr",
                "cand_office_st", "cand_office", "cand_office_district", "cand_ici",
                "cand_status", "cand_pcc", "cand_st1", "cand_st2", "cand_city", "cand_st",
                "cand_zip",
            ],
            SourceKind::CandidateCommitteeLinkages => &[
                "cand_id", "cand_election_yr", "fec_election_yr", "cmte_id", "cmte_tp",
                "cmte_dsgn", "linkage_id",
            ],
            SourceKind::CommitteeCandidateContributions => &[
                "cmte_id", "amndt_ind", "rpt_tp", "transaction_pgi", "image_num",
                "transaction_tp", "entity_tp", "name", "city", "state", "zip_code",
                "employer", "occupation", "transaction_dt", "transaction_amt", "other_id",
                "cand_id", "tran_id", "file_num", "memo_cd", "memo_text", "sub_id",
            ],
            SourceKind::Other(_) => &[],
        }
    }
}

/// Extract the ordered column names from the first `CREATE TABLE` block of a schema text.
///
/// Every line inside the block holds one position, so a blank line yields an
/// empty name. Text without a block yields an empty list. A block that never
/// closes yields everything after its opening line.
pub fn parse_column_names(schema: &str) -> Vec<String> {
    let mut columns = Vec::new();
    let mut in_block = false;
    for line in schema.lines() {
        let line = line.trim();
        if line.to_lowercase().starts_with("create table") {
            in_block = true;
        } else if in_block && line.starts_with(");") {
            break;
        } else if in_block {
            let token = line.split_whitespace().next().unwrap_or_default();
            columns.push(token.replace(['`', ','], ""));
        }
    }
    columns
}

/// Read a schema file; a missing file is treated like one without a block.
pub fn read_column_names(path: &Path) -> Result<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(parse_column_names(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "schema file not found");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Column lists for every table, resolved once from a schema directory.
#[derive(Debug, Default, Clone)]
pub struct SchemaCatalog {
    tables: HashMap<String, Vec<String>>,
}

impl SchemaCatalog {
    /// Read every `*.sql` file directly inside `sql_dir`; the file stem names the table.
    pub fn load(sql_dir: &Path) -> Result<Self> {
        let mut tables = HashMap::new();
        if !sql_dir.is_dir() {
            warn!(dir = %sql_dir.display(), "schema directory missing; using fallback layouts");
            return Ok(Self { tables });
        }
        for entry in fs::read_dir(sql_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(constants::SCHEMA_FILE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let columns = read_column_names(&path)?;
            debug!(table = stem, columns = columns.len(), "schema resolved");
            tables.insert(stem.to_string(), columns);
        }
        info!(dir = %sql_dir.display(), tables = tables.len(), "Schema catalog loaded");
        Ok(Self { tables })
    }

    pub fn insert(&mut self, table: &str, columns: Vec<String>) {
        self.tables.insert(table.to_string(), columns);
    }

    /// Columns declared for `table`, or the source kind's fallback layout.
    /// The flag is true when the fallback was used.
    pub fn columns_for(&self, table: &str) -> (Vec<String>, bool) {
        match self.tables.get(table) {
            Some(columns) if !columns.is_empty() => (columns.clone(), false),
            _ => {
                let fallback = SourceKind::from_name(table).fallback_columns();
                (fallback.iter().map(|c| c.to_string()).collect(), true)
            }
        }
    }
}
