// DANS : src/monitoring/metrics.rs

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, TextEncoder, register_histogram,
    register_histogram_vec, register_int_counter, register_int_counter_vec,
};
use tracing::{error, info};
use warp::Filter;

lazy_static! {
    // --- Stream de logs ---
    pub static ref LOG_MESSAGES_RECEIVED: IntCounter = register_int_counter!(
        "sentinel_log_messages_received_total", "Messages reçus sur l'abonnement aux logs"
    ).unwrap();
    pub static ref CANDIDATES_EMITTED: IntCounter = register_int_counter!(
        "sentinel_candidates_total", "Signatures candidates (marqueur d'initialisation de pool trouvé)"
    ).unwrap();
    pub static ref STREAM_DIAGNOSTICS: IntCounter = register_int_counter!(
        "sentinel_stream_diagnostics_total", "Messages d'erreur/avertissement remontés par le stream"
    ).unwrap();
    pub static ref STREAM_RECONNECTS: IntCounter = register_int_counter!(
        "sentinel_stream_reconnects_total", "Reconnexions de l'abonnement aux logs"
    ).unwrap();

    // --- Pipeline ---
    pub static ref EVENTS_DROPPED: IntCounterVec = register_int_counter_vec!(
        "sentinel_events_dropped_total",
        "Signatures abandonnées, par étape en échec",
        &["stage"] // Labels: "resolve", "decode", "valuation", ...
    ).unwrap();
    pub static ref ALERTS_EMITTED: IntCounter = register_int_counter!(
        "sentinel_alerts_emitted_total", "Alertes remises au sink"
    ).unwrap();
    pub static ref ALERT_DELIVERY_FAILURES: IntCounter = register_int_counter!(
        "sentinel_alert_delivery_failures_total", "Échecs de livraison d'alerte"
    ).unwrap();
    pub static ref PIPELINE_LATENCY: Histogram = register_histogram!(
        "sentinel_pipeline_latency_seconds", "Durée du traitement complet d'une signature"
    ).unwrap();

    // --- RPC ---
    pub static ref RPC_REQUEST_LATENCY: HistogramVec = register_histogram_vec!(
        "sentinel_rpc_request_latency_seconds",
        "Latence des appels RPC vers le nœud Solana",
        &["method"] // Labels: "getTransaction", "getAccountInfo", ...
    ).unwrap();
}

fn render_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "[Monitoring] Encodage des métriques impossible.");
    }
    buffer
}

pub async fn start_metrics_server(port: u16) {
    let metrics_route = warp::path!("metrics").map(|| {
        warp::reply::with_header(render_metrics(), "content-type", "text/plain; version=0.0.4")
    });
    info!(port, "[Monitoring] Serveur de métriques exposé sur /metrics");
    warp::serve(metrics_route).run(([0, 0, 0, 0], port)).await;
}
