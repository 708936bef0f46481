use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use fec_pipeline::pipeline::processing::batch::Batch;
use fec_pipeline::pipeline::storage::Store;
use fec_pipeline::server::create_server;
use serde_json::Value;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

fn batch(columns: &[&str], rows: &[&[&str]]) -> Batch {
    Batch::new(
        columns.iter().map(|c| c.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|v| (!v.is_empty()).then(|| v.to_string())).collect())
            .collect(),
    )
}

fn seed(path: &Path) -> Result<()> {
    let mut store = Store::open(path)?;
    store.load_batch(
        "committee_master",
        &batch(
            &["cmte_id", "cmte_nm", "tres_nm", "file_year"],
            &[&["C001", "FRIENDS OF SMITH", "A", "2024"], &["C002", "ROE PAC", "B", "2024"]],
        ),
    )?;
    store.load_batch(
        "candidate_master",
        &batch(
            &["cand_id", "cand_name", "cand_pty_affiliation", "cand_zip", "file_year"],
            &[&["P001", "SMITH, JO", "DEM", "10001", "2024"], &["P002", "ADAMS, LEE", "REP", "", "2024"]],
        ),
    )?;
    store.load_batch(
        "committee_candidate_contributions",
        &batch(
            &["cmte_id", "cand_id", "transaction_tp", "transaction_amt", "file_year"],
            &[
                &["C001", "P001", "24A", "500", "2024"],
                &["C001", "P001", "24N", "250", "2024"],
                &["C002", "P002", "24E", "9000", "2024"],
                &["C002", "P002", "24A", "100", "2024"],
            ],
        ),
    )?;
    Ok(())
}

async fn get(app: axum::Router, uri: &str) -> Result<(StatusCode, Value)> {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let dir = tempdir()?;
    let (status, body) = get(create_server(dir.path().join("absent.db")), "/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn test_missing_database_answers_503() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("absent.db");
    let (status, body) = get(create_server(&db), "/candidates/names").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "database unavailable");
    assert!(!db.exists());
    Ok(())
}

#[tokio::test]
async fn test_committee_contributions_ranking() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("fec.db");
    seed(&db)?;

    let (status, body) = get(create_server(&db), "/committee-contributions").await?;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().expect("array body");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["committee_name"], "FRIENDS OF SMITH");
    assert_eq!(rows[0]["transaction_total"].as_f64(), Some(750.0));
    assert_eq!(rows[1]["candidate_name"], "ADAMS, LEE");
    assert_eq!(rows[1]["transaction_total"].as_f64(), Some(100.0));
    Ok(())
}

#[tokio::test]
async fn test_candidate_roster_is_sorted() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("fec.db");
    seed(&db)?;
    {
        let store = Store::open(&db)?;
        for column in [
            "cand_election_yr", "cand_office_st", "cand_office", "cand_office_district",
            "cand_ici", "cand_status", "cand_pcc", "cand_st1", "cand_st2", "cand_city",
            "cand_st", "candidate_latitude", "candidate_longitude",
        ] {
            store
                .connection()
                .execute_batch(&format!("ALTER TABLE candidate_master ADD COLUMN {column} TEXT;"))?;
        }
    }

    let (status, body) = get(create_server(&db), "/candidates/names").await?;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .expect("array body")
        .iter()
        .filter_map(|row| row["cand_name"].as_str())
        .collect();
    assert_eq!(names, vec!["ADAMS, LEE", "SMITH, JO"]);
    Ok(())
}

#[tokio::test]
async fn test_by_candidate_requires_name() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("fec.db");
    seed(&db)?;
    let (status, body) = get(create_server(&db), "/contributions/by-candidate").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad request");
    Ok(())
}

#[tokio::test]
async fn test_query_against_missing_table_is_500() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("fec.db");
    seed(&db)?;
    let (status, body) = get(create_server(&db), "/individual-contributions").await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "query failed");
    Ok(())
}
