use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use hyper::Server;
use rusqlite::Connection;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::metrics;
use crate::pipeline::storage::queries::{self, JsonRow, DEFAULT_LISTING_LIMIT};
use crate::pipeline::storage::Store;

/// Shared handler state. Each request opens its own connection.
#[derive(Clone)]
pub struct AppState {
    db_path: Arc<PathBuf>,
}

enum QueryError {
    Unavailable(String),
    Failed(String),
    BadRequest(&'static str),
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            QueryError::Unavailable(detail) => (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({ "error": "database unavailable", "detail": detail }),
            ),
            QueryError::Failed(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": "query failed", "detail": detail }),
            ),
            QueryError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": "bad request", "detail": detail }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Run a read query on a blocking thread against a fresh connection.
async fn run_query<F>(
    state: &AppState,
    endpoint: &'static str,
    query: F,
) -> std::result::Result<Json<Vec<JsonRow>>, QueryError>
where
    F: FnOnce(&Connection) -> Result<Vec<JsonRow>> + Send + 'static,
{
    metrics::query::request(endpoint);
    let db_path = state.db_path.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let store = match Store::open_existing(db_path.as_path()) {
            Ok(store) => store,
            Err(e) => return Err(QueryError::Unavailable(e.to_string())),
        };
        query(store.connection()).map_err(|e| QueryError::Failed(e.to_string()))
    })
    .await;

    match joined {
        Ok(Ok(rows)) => Ok(Json(rows)),
        Ok(Err(err)) => {
            match &err {
                QueryError::Unavailable(detail) => {
                    metrics::query::database_unavailable(endpoint);
                    warn!(endpoint, detail = %detail, "Database unavailable");
                }
                QueryError::Failed(detail) => error!(endpoint, detail = %detail, "Query failed"),
                QueryError::BadRequest(_) => {}
            }
            Err(err)
        }
        Err(join_err) => {
            error!(endpoint, "Query task panicked: {}", join_err);
            Err(QueryError::Failed(join_err.to_string()))
        }
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "fec-pipeline",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn committee_contributions(State(state): State<AppState>) -> impl IntoResponse {
    run_query(&state, "committee_contributions", queries::committee_contributions).await
}

async fn candidate_names(State(state): State<AppState>) -> impl IntoResponse {
    run_query(&state, "candidate_names", queries::candidate_names).await
}

#[derive(Debug, Deserialize)]
struct Page {
    limit: Option<u32>,
    offset: Option<u32>,
}

async fn individual_contributions(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> impl IntoResponse {
    let limit = page.limit.unwrap_or(DEFAULT_LISTING_LIMIT);
    let offset = page.offset.unwrap_or(0);
    run_query(&state, "individual_contributions", move |conn| {
        queries::individual_contributions(conn, limit, offset)
    })
    .await
}

async fn employer_counts(State(state): State<AppState>) -> impl IntoResponse {
    run_query(&state, "employer_counts", queries::employer_contribution_counts).await
}

#[derive(Debug, Deserialize)]
struct CandidateFilter {
    name: Option<String>,
}

async fn contributions_by_candidate(
    State(state): State<AppState>,
    Query(filter): Query<CandidateFilter>,
) -> std::result::Result<Json<Vec<JsonRow>>, QueryError> {
    let name = match filter.name.map(|n| n.trim().to_string()) {
        Some(name) if !name.is_empty() => name,
        _ => return Err(QueryError::BadRequest("missing `name` query parameter")),
    };
    run_query(&state, "contributions_by_candidate", move |conn| {
        queries::contributions_by_candidate(conn, &name)
    })
    .await
}

/// Create the HTTP router over the database at `db_path`
pub fn create_server(db_path: impl Into<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    let state = AppState {
        db_path: Arc::new(db_path.into()),
    };

    Router::new()
        .route("/health", get(health))
        .route("/committee-contributions", get(committee_contributions))
        .route("/candidates/names", get(candidate_names))
        .route("/individual-contributions/all", get(individual_contributions))
        .route("/individual-contributions", get(employer_counts))
        .route("/contributions/by-candidate", get(contributions_by_candidate))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(db_path: PathBuf, port: u16) -> anyhow::Result<()> {
    let app = create_server(db_path.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, db = %db_path.display(), "Query service listening");
    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");

    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
