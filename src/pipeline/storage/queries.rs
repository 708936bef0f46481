//! Read-only lookups behind the HTTP query surface.
//!
//! Every function returns rows as JSON objects keyed by column name, ready to
//! be serialized as-is.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, Params, Statement};
use serde_json::{Map, Number, Value};

use crate::error::Result;

pub type JsonRow = Map<String, Value>;

pub const DEFAULT_LISTING_LIMIT: u32 = 1000;
pub const MAX_LISTING_LIMIT: u32 = 10_000;
const RANKING_LIMIT: u32 = 100;

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

fn collect_rows<P: Params>(stmt: &mut Statement<'_>, params: P) -> Result<Vec<JsonRow>> {
    let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut obj = Map::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            obj.insert(name.clone(), value_to_json(row.get_ref(idx)?));
        }
        out.push(obj);
    }
    Ok(out)
}

/// Committee-to-candidate totals for independent expenditures (24A/24N), largest first.
pub fn committee_contributions(conn: &Connection) -> Result<Vec<JsonRow>> {
    let mut stmt = conn.prepare(
        "SELECT
             SUM(ccc.transaction_amt) AS transaction_total,
             cm.cmte_nm AS committee_name,
             cm.file_year,
             cand.cand_name AS candidate_name
         FROM committee_candidate_contributions ccc
         JOIN committee_master cm ON cm.cmte_id = ccc.cmte_id AND cm.file_year = ccc.file_year
         JOIN candidate_master cand ON cand.cand_id = ccc.cand_id AND cand.file_year = ccc.file_year
         WHERE ccc.transaction_tp IN ('24A', '24N')
         GROUP BY cm.file_year, ccc.cand_id, cand.cand_name, cm.cmte_nm
         ORDER BY transaction_total DESC
         LIMIT ?1",
    )?;
    collect_rows(&mut stmt, [RANKING_LIMIT])
}

/// Full candidate roster ordered by name.
pub fn candidate_names(conn: &Connection) -> Result<Vec<JsonRow>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT cand_name, cand_id, cand_pty_affiliation, cand_election_yr,
             cand_office_st, cand_office, cand_office_district, cand_ici, cand_status,
             cand_pcc, cand_st1, cand_st2, cand_city, cand_st, cand_zip,
             candidate_latitude, candidate_longitude, file_year
         FROM candidate_master
         ORDER BY cand_name ASC",
    )?;
    collect_rows(&mut stmt, [])
}

/// Contributions joined to committee and candidate, newest first.
pub fn individual_contributions(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<JsonRow>> {
    let limit = limit.clamp(1, MAX_LISTING_LIMIT);
    let mut stmt = conn.prepare(
        "SELECT
             ci.zip_code AS zipcode,
             ci.name,
             ci.transaction_dt,
             ci.formatted_transaction_dt,
             ci.transaction_amt,
             cm.cmte_nm,
             cm.tres_nm,
             ccl.cand_id,
             cand.cand_name,
             cand.cand_pty_affiliation,
             cand.cand_zip
         FROM individual_contributions ci
         JOIN committee_master cm ON ci.cmte_id = cm.cmte_id
         JOIN candidate_committee_linkages ccl ON ci.cmte_id = ccl.cmte_id
         JOIN candidate_master cand ON ccl.cand_id = cand.cand_id
         ORDER BY ci.formatted_transaction_dt DESC
         LIMIT ?1 OFFSET ?2",
    )?;
    collect_rows(&mut stmt, [limit, offset])
}

/// Number of contributions per employer and file year, most first.
pub fn employer_contribution_counts(conn: &Connection) -> Result<Vec<JsonRow>> {
    let mut stmt = conn.prepare(
        "SELECT ci.employer, ci.file_year, COUNT(*) AS distinct_contributions
         FROM individual_contributions ci
         JOIN committee_master cm ON cm.cmte_id = ci.cmte_id AND cm.file_year = ci.file_year
         GROUP BY ci.employer, ci.file_year
         ORDER BY distinct_contributions DESC
         LIMIT ?1",
    )?;
    collect_rows(&mut stmt, [RANKING_LIMIT])
}

/// Every contribution to a candidate whose name contains `name` (case-insensitive),
/// each row carrying that candidate's running total.
pub fn contributions_by_candidate(conn: &Connection, name: &str) -> Result<Vec<JsonRow>> {
    let mut stmt = conn.prepare(
        "WITH candidate_ids AS (
             SELECT cand_id, cand_name, cand_zip, candidate_latitude, candidate_longitude
             FROM candidate_master
             WHERE cand_name LIKE '%' || ?1 || '%'
         ),
         committee_ids AS (
             SELECT ccl.cand_id, ccl.cmte_id
             FROM candidate_committee_linkages ccl
             JOIN candidate_ids ON candidate_ids.cand_id = ccl.cand_id
         ),
         candidate_transaction_sums AS (
             SELECT committee_ids.cand_id, SUM(ci.transaction_amt) AS total_candidate_amt
             FROM individual_contributions ci
             JOIN committee_ids ON ci.cmte_id = committee_ids.cmte_id
             GROUP BY committee_ids.cand_id
         )
         SELECT
             ci.*,
             cm.cand_name,
             cm.cand_zip,
             cm.candidate_latitude,
             cm.candidate_longitude,
             cts.total_candidate_amt
         FROM individual_contributions ci
         JOIN committee_ids ON ci.cmte_id = committee_ids.cmte_id
         JOIN candidate_ids cm ON committee_ids.cand_id = cm.cand_id
         JOIN candidate_transaction_sums cts ON cm.cand_id = cts.cand_id
         ORDER BY ci.formatted_transaction_dt DESC",
    )?;
    collect_rows(&mut stmt, [name])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversion() {
        assert_eq!(value_to_json(ValueRef::Null), Value::Null);
        assert_eq!(value_to_json(ValueRef::Integer(7)), Value::from(7));
        assert_eq!(value_to_json(ValueRef::Real(1.5)), Value::from(1.5));
        assert_eq!(value_to_json(ValueRef::Real(f64::NAN)), Value::Null);
        assert_eq!(value_to_json(ValueRef::Text(b"abc")), Value::from("abc"));
    }

    #[test]
    fn test_collect_rows_uses_column_names() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT 1 AS one, 'x' AS letter, NULL AS empty").unwrap();
        let rows = collect_rows(&mut stmt, []).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["one"], Value::from(1));
        assert_eq!(rows[0]["letter"], Value::from("x"));
        assert_eq!(rows[0]["empty"], Value::Null);
    }
}
