// src/monitoring/logging.rs

use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Filtre utilisé quand `RUST_LOG` est absent : le client pub/sub est très bavard en `info`.
const DEFAULT_DIRECTIVES: &str = "info,solana_client=warn,tungstenite=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Une ligne JSON par événement, pour l'agrégateur de logs.
    #[default]
    Json,
    /// Lisible en terminal, pour le développement.
    Pretty,
}

pub fn setup_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true);

    match format {
        LogFormat::Json => builder.json().flatten_event(true).init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}
