/// Table and column name constants shared by the normalizer, the store and the query layer.

// Source files / tables
pub const INDIVIDUAL_CONTRIBUTIONS: &str = "individual_contributions";
pub const COMMITTEE_MASTER: &str = "committee_master";
pub const CANDIDATE_MASTER: &str = "candidate_master";
pub const CANDIDATE_COMMITTEE_LINKAGES: &str = "candidate_committee_linkages";
pub const COMMITTEE_CANDIDATE_CONTRIBUTIONS: &str = "committee_candidate_contributions";

// Grid tables built from the bulk XML summaries
pub const COMMITTEE_GRID: &str = "committee_grid";
pub const CANDIDATE_GRID: &str = "candidate_grid";

/// Only this file gets date normalization and recurrence derivation
pub const INDIVIDUAL_CONTRIBUTIONS_FILE: &str = "individual_contributions.txt";

pub const DATA_FILE_EXTENSION: &str = "txt";
pub const SCHEMA_FILE_EXTENSION: &str = "sql";
pub const FIELD_DELIMITER: u8 = b'|';

// Raw columns read by the normalizer
pub const COL_NAME: &str = "name";
pub const COL_ZIP_CODE: &str = "zip_code";
pub const COL_CAND_ZIP: &str = "cand_zip";
pub const COL_TRANSACTION_DT: &str = "transaction_dt";
pub const COL_TRANSACTION_AMT: &str = "transaction_amt";

// Derived columns
pub const COL_FILE_YEAR: &str = "file_year";
pub const COL_RECURRING_CONTRIBUTIONS: &str = "recurring_contributions";
pub const COL_PERIODICITY: &str = "periodicity";
pub const COL_FORMATTED_TRANSACTION_DT: &str = "formatted_transaction_dt";
pub const COL_CANDIDATE_LATITUDE: &str = "candidate_latitude";
pub const COL_CANDIDATE_LONGITUDE: &str = "candidate_longitude";
pub const COL_DONOR_LATITUDE: &str = "donor_latitude";
pub const COL_DONOR_LONGITUDE: &str = "donor_longitude";
pub const COL_TRANSACTION_DATES: &str = "transaction_dates";
pub const COL_TRANSACTION_AMOUNTS: &str = "transaction_amounts";
pub const COL_TOTAL_TRANSACTION_AMT: &str = "total_transaction_amt";
pub const COL_AVERAGE_PERIODICITY: &str = "average_periodicity";

/// Appended when a schema does not pre-declare the derived columns
pub const ADMINISTRATIVE_COLUMNS: [&str; 4] = [
    COL_FILE_YEAR,
    COL_RECURRING_CONTRIBUTIONS,
    COL_PERIODICITY,
    COL_FORMATTED_TRANSACTION_DT,
];

/// Empty array literal stored for sequences that cannot be derived
pub const EMPTY_SEQUENCE: &str = "{}";

/// Columns whose values are summed or compared numerically once loaded
pub const NUMERIC_COLUMNS: [&str; 11] = [
    COL_TRANSACTION_AMT,
    COL_FILE_YEAR,
    COL_PERIODICITY,
    COL_CANDIDATE_LATITUDE,
    COL_CANDIDATE_LONGITUDE,
    COL_DONOR_LATITUDE,
    COL_DONOR_LONGITUDE,
    COL_TOTAL_TRANSACTION_AMT,
    COL_AVERAGE_PERIODICITY,
    "cand_election_yr",
    "fec_election_yr",
];

pub fn is_numeric_column(column: &str) -> bool {
    NUMERIC_COLUMNS.contains(&column)
}
