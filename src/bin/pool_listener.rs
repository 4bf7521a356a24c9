#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use arc_swap::ArcSwap;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{error, info};

use pool_sentinel::{
    alerts::{AlertSink, LogSink, TelegramSink},
    config::Config,
    data_pipeline::api_connectors::{CoinGeckoPriceFeed, HttpMetadataFeed, OffChainMetadataFeed, PriceFeed},
    listener::{LogStreamSubscriber, LogSubscription, PubsubLogTransport, StreamStatus, SubscriberSettings},
    monitoring::{logging, metrics},
    pipeline::{CoordinatorSettings, PipelineCoordinator},
    rpc::{ChainRpc, ResilientRpcClient},
};

const CANDIDATE_BUFFER: usize = 256;
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    logging::setup_logging(config.log_format);
    info!("--- Démarrage du Pool Listener ---");

    if let Some(port) = config.metrics_port {
        tokio::spawn(metrics::start_metrics_server(port));
    }

    // --- Clients partagés, créés une seule fois ---
    let rpc: Arc<dyn ChainRpc> = Arc::new(ResilientRpcClient::new(
        config.solana_rpc_url.clone(),
        config.rpc_commitment()?,
        config.rpc_max_retries,
        config.rpc_retry_delay_ms,
        config.rpc_timeout(),
    ));
    let prices: Arc<dyn PriceFeed> = Arc::new(CoinGeckoPriceFeed::new(
        config.coingecko_api_url.clone(),
        config.fiat_currency.clone(),
        config.rpc_timeout(),
    )?);
    let descriptions: Arc<dyn OffChainMetadataFeed> = Arc::new(HttpMetadataFeed::new(config.rpc_timeout())?);
    let sink: Arc<dyn AlertSink> = match config.telegram() {
        Some((token, channel)) => {
            info!(channel, "[Main] Alertes envoyées sur Telegram.");
            Arc::new(TelegramSink::new(
                token,
                channel.to_string(),
                config.telegram_button_url.clone(),
                config.rpc_timeout(),
            )?)
        }
        None => {
            info!("[Main] Telegram non configuré, alertes écrites dans les logs.");
            Arc::new(LogSink)
        }
    };

    let coordinator = Arc::new(PipelineCoordinator::new(
        rpc,
        prices,
        descriptions,
        sink,
        CoordinatorSettings {
            quote_mint: config.quote_mint()?,
            quote_price_id: config.quote_price_id.clone(),
            top_holders: config.top_holders,
            resolve_attempts: config.resolve_attempts,
            resolve_retry_delay: Duration::from_millis(config.resolve_retry_delay_ms),
            max_in_flight: config.max_in_flight,
        },
    ));

    let subscriber = LogStreamSubscriber::new(
        PubsubLogTransport::new(config.ws_url(), config.rpc_timeout()),
        SubscriberSettings {
            subscription: LogSubscription {
                mentions: config.pool_authority()?,
                commitment: config.stream_commitment()?,
            },
            marker: config.pool_init_marker.clone(),
            reconnect_base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
            reconnect_max_delay: Duration::from_millis(config.reconnect_max_delay_ms),
            idle_timeout: config.stream_idle_timeout(),
        },
    );
    tokio::spawn(log_status_periodically(subscriber.status_handle()));

    let (candidates_tx, candidates_rx) = mpsc::channel(CANDIDATE_BUFFER);

    tokio::select! {
        _ = subscriber.run(candidates_tx) => {
            error!("[Main] Le subscriber s'est arrêté.");
        }
        _ = coordinator.run(candidates_rx) => {
            error!("[Main] Le coordinateur s'est arrêté.");
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("[Main] Ctrl-C reçu, arrêt."),
                Err(e) => error!(error = %e, "[Main] Écoute du signal d'arrêt impossible."),
            }
        }
    }
    Ok(())
}

async fn log_status_periodically(status: Arc<ArcSwap<StreamStatus>>) {
    let mut interval = tokio::time::interval(STATUS_LOG_INTERVAL);
    loop {
        interval.tick().await;
        let snapshot = status.load();
        info!(
            state = ?snapshot.state,
            reconnects = snapshot.reconnects,
            last_error = snapshot.last_error.as_deref().unwrap_or("-"),
            "[Main] État du flux de logs."
        );
    }
}
