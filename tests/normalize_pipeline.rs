use anyhow::Result;
use fec_pipeline::pipeline::ingestion::delimited::read_normalized_file;
use fec_pipeline::pipeline::processing::geocode::GeoNamesTable;
use fec_pipeline::pipeline::processing::normalize::RecordNormalizer;
use fec_pipeline::pipeline::processing::recurrence::RecurrenceMode;
use fec_pipeline::pipeline::processing::schema::SchemaCatalog;
use fec_pipeline::pipeline::storage::{queries, Store};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const SCHEMAS: &[(&str, &str)] = &[
    (
        "individual_contributions",
        "CREATE TABLE individual_contributions (\n    cmte_id VARCHAR(9),\n    name TEXT,\n    zip_code TEXT,\n    employer TEXT,\n    transaction_dt TEXT,\n    transaction_amt NUMERIC\n);\n",
    ),
    (
        "committee_master",
        "create table committee_master (\n  `cmte_id` varchar(9),\n  `cmte_nm` text,\n  `tres_nm` text\n);\n",
    ),
    (
        "candidate_committee_linkages",
        "CREATE TABLE candidate_committee_linkages (\n    cand_id TEXT,\n    cmte_id TEXT\n);\n",
    ),
];

const GEONAMES: &str = "US\t98101\tSeattle\tWashington\tWA\tKing\t033\t\t\t47.61\t-122.33\t4\n\
US\t10001\tNew York\tNew York\tNY\tNew York\t061\t\t\t40.75\t-73.99\t4\n";

fn write_fixture(root: &Path) -> Result<()> {
    let sql = root.join("sql");
    let data = root.join("data");
    fs::create_dir_all(&sql)?;
    fs::create_dir_all(data.join("2024"))?;

    for (table, ddl) in SCHEMAS {
        fs::write(sql.join(format!("{table}.sql")), ddl)?;
    }

    fs::write(
        data.join("2024").join("individual_contributions.txt"),
        "C001|DOE, JANE|98101|ACME|2102024|300\n\
         C001|DOE, JANE|98101|ACME|1012024|100\n\
         C002|ROE, AL|99999|GLOBEX|3152024|50\n\
         C001|DOE, JANE|98101|ACME|1112024|200\n",
    )?;
    fs::write(
        data.join("committee_master.txt"),
        "C001|FRIENDS OF SMITH|TREASURER A\nC002|ROE PAC|TREASURER B\n",
    )?;
    // No schema file: the published candidate layout applies
    fs::write(
        data.join("candidate_master.txt"),
        "P001|SMITH, JO|DEM|2024|NY|H|12|C|C|C001|1 MAIN ST||NEW YORK|NY|10001\n",
    )?;
    fs::write(
        data.join("candidate_committee_linkages.txt"),
        "P001|C001\nP001|C002\n",
    )?;
    fs::write(root.join("US.txt"), GEONAMES)?;
    Ok(())
}

fn normalize(root: &Path, mode: RecurrenceMode) -> Result<RecordNormalizer<GeoNamesTable>> {
    let catalog = SchemaCatalog::load(&root.join("sql"))?;
    let geonames = GeoNamesTable::load(&root.join("US.txt"))?;
    let mut normalizer = RecordNormalizer::new(geonames, mode);
    let processed = normalizer.normalize_directory(&root.join("data"), &catalog, "2024")?;
    assert_eq!(processed.len(), 4);
    Ok(normalizer)
}

#[test]
fn test_directory_normalization_rewrites_files() -> Result<()> {
    let dir = tempdir()?;
    write_fixture(dir.path())?;
    let normalizer = normalize(dir.path(), RecurrenceMode::Aggregate)?;

    let contributions =
        read_normalized_file(&dir.path().join("data/2024/individual_contributions.txt"))?;
    assert_eq!(contributions.len(), 4);
    for column in [
        "file_year",
        "formatted_transaction_dt",
        "donor_latitude",
        "transaction_dates",
        "average_periodicity",
    ] {
        assert!(contributions.has_column(column), "missing {column}");
    }

    // Sorted by name, ZIP, then date
    assert_eq!(
        contributions.column("formatted_transaction_dt").unwrap(),
        vec![
            Some("2024-01-01"),
            Some("2024-01-11"),
            Some("2024-02-10"),
            Some("2024-03-15")
        ]
    );
    assert_eq!(
        contributions.get(0, "transaction_dates"),
        Some("{2024-01-01,2024-01-11,2024-02-10}")
    );
    assert_eq!(contributions.get(2, "transaction_amounts"), Some("{100,200,300}"));
    assert_eq!(contributions.get(1, "total_transaction_amt"), Some("600"));
    assert_eq!(contributions.get(1, "average_periodicity"), Some("20"));
    assert_eq!(contributions.get(2, "periodicity"), Some("30"));
    assert_eq!(contributions.get(0, "recurring_contributions"), Some("true"));
    assert_eq!(contributions.get(3, "recurring_contributions"), Some("false"));
    assert_eq!(contributions.get(0, "donor_latitude"), Some("47.61"));
    assert_eq!(contributions.get(3, "donor_latitude"), Some("0"));

    let candidates = read_normalized_file(&dir.path().join("data/candidate_master.txt"))?;
    assert_eq!(candidates.get(0, "candidate_longitude"), Some("-73.99"));
    assert_eq!(candidates.get(0, "file_year"), Some("2024"));
    assert_eq!(candidates.get(0, "formatted_transaction_dt"), None);

    let diagnostics = normalizer.diagnostics();
    assert_eq!(diagnostics.files_processed, 4);
    assert_eq!(diagnostics.geocode_unresolved, 1);
    assert_eq!(diagnostics.schema_fallbacks, 1);
    assert_eq!(diagnostics.total_date_fallbacks(), 0);
    Ok(())
}

#[test]
fn test_placeholder_mode_writes_fixed_values() -> Result<()> {
    let dir = tempdir()?;
    write_fixture(dir.path())?;
    normalize(dir.path(), RecurrenceMode::Placeholder)?;

    let contributions =
        read_normalized_file(&dir.path().join("data/2024/individual_contributions.txt"))?;
    for row in 0..contributions.len() {
        assert_eq!(contributions.get(row, "formatted_transaction_dt"), Some("2020-01-01"));
        assert_eq!(contributions.get(row, "transaction_dates"), Some("{}"));
        assert_eq!(contributions.get(row, "recurring_contributions"), Some("false"));
    }
    Ok(())
}

#[test]
fn test_loaded_store_answers_queries() -> Result<()> {
    let dir = tempdir()?;
    write_fixture(dir.path())?;
    normalize(dir.path(), RecurrenceMode::Aggregate)?;

    let mut store = Store::open(dir.path().join("db").join("fec.db"))?;
    assert_eq!(store.load_directory(&dir.path().join("data"))?, 9);

    let by_candidate = queries::contributions_by_candidate(store.connection(), "smith")?;
    assert_eq!(by_candidate.len(), 4);
    assert_eq!(by_candidate[0]["formatted_transaction_dt"], Value::from("2024-03-15"));
    for row in &by_candidate {
        assert_eq!(row["total_candidate_amt"].as_f64(), Some(650.0));
        assert_eq!(row["cand_name"], Value::from("SMITH, JO"));
    }
    assert!(queries::contributions_by_candidate(store.connection(), "nobody")?.is_empty());

    let page = queries::individual_contributions(store.connection(), 2, 1)?;
    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["formatted_transaction_dt"], Value::from("2024-02-10"));

    let employers = queries::employer_contribution_counts(store.connection())?;
    assert_eq!(employers[0]["employer"], Value::from("ACME"));
    assert_eq!(employers[0]["distinct_contributions"], Value::from(3));

    let roster = queries::candidate_names(store.connection())?;
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0]["cand_id"], Value::from("P001"));
    Ok(())
}
