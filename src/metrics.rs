//! Prometheus counters for ingestion quality.
//!
//! Every data-quality fallback taken by the normalizer is counted here as well as in
//! the per-run [`NormalizeDiagnostics`](crate::pipeline::processing::diagnostics::NormalizeDiagnostics),
//! so a long-running deployment can scrape the same numbers the CLI prints.

use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Install the Prometheus recorder with an HTTP listener. Idempotent.
pub fn init_metrics(addr: &str) {
    INIT.call_once(|| {
        let addr: SocketAddr = match addr.parse() {
            Ok(addr) => addr,
            Err(_) => {
                warn!("Invalid metrics addr '{}', using default 127.0.0.1:9898", addr);
                SocketAddr::from(([127, 0, 0, 1], 9898))
            }
        };
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
        match builder.install() {
            Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
            Err(e) => warn!("Prometheus exporter install failed (possibly already installed): {}", e),
        }
    });
}

pub mod normalize {
    pub fn file_processed(table: &str, rows: usize) {
        ::metrics::counter!("fec_normalize_files_processed_total", "table" => table.to_string())
            .increment(1);
        ::metrics::histogram!("fec_normalize_batch_rows").record(rows as f64);
    }

    pub fn date_fallback(reason: &'static str) {
        ::metrics::counter!("fec_normalize_date_fallbacks_total", "reason" => reason).increment(1);
    }

    pub fn geocode_unresolved() {
        ::metrics::counter!("fec_normalize_geocode_unresolved_total").increment(1);
    }

    pub fn geocode_lookup() {
        ::metrics::counter!("fec_normalize_geocode_lookups_total").increment(1);
    }

    pub fn cells_truncated(count: usize) {
        ::metrics::counter!("fec_normalize_truncated_cells_total").increment(count as u64);
    }

    pub fn schema_fallback(table: &str) {
        ::metrics::counter!("fec_normalize_schema_fallbacks_total", "table" => table.to_string())
            .increment(1);
    }

    pub fn unparsable_date() {
        ::metrics::counter!("fec_normalize_unparsable_dates_total").increment(1);
    }

    pub fn unparsable_amount() {
        ::metrics::counter!("fec_normalize_unparsable_amounts_total").increment(1);
    }

    pub fn ungrouped_record() {
        ::metrics::counter!("fec_normalize_ungrouped_records_total").increment(1);
    }
}

pub mod query {
    pub fn request(endpoint: &'static str) {
        ::metrics::counter!("fec_query_requests_total", "endpoint" => endpoint).increment(1);
    }

    pub fn database_unavailable(endpoint: &'static str) {
        ::metrics::counter!("fec_query_database_unavailable_total", "endpoint" => endpoint)
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_normalize_counters_render() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, || {
            normalize::geocode_lookup();
            normalize::geocode_lookup();
            normalize::unparsable_date();
            normalize::date_fallback("too_short");
        });

        let rendered = handle.render();
        assert!(rendered.contains("fec_normalize_geocode_lookups_total 2"), "{rendered}");
        assert!(rendered.contains("fec_normalize_unparsable_dates_total 1"), "{rendered}");
        assert!(rendered.contains(r#"fec_normalize_date_fallbacks_total{reason="too_short"} 1"#));
    }

    #[test]
    fn test_query_counters_render() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, || query::request("health"));
        assert!(handle
            .render()
            .contains(r#"fec_query_requests_total{endpoint="health"} 1"#));
    }
}
