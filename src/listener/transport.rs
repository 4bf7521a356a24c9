// src/listener/transport.rs

use super::{InboundMessage, LogEvent, LogSubscription, StreamError};
use async_trait::async_trait;
use futures_util::StreamExt;
use solana_client::{
    nonblocking::pubsub_client::PubsubClient,
    rpc_config::{RpcTransactionLogsConfig, RpcTransactionLogsFilter},
    rpc_response::RpcLogsResponse,
};
use std::time::Duration;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::debug;

const FRAME_BUFFER: usize = 1024;

/// Une session d'abonnement ouverte. La fin du canal signifie que le stream est fermé.
pub struct LogSession {
    frames: mpsc::Receiver<Result<InboundMessage, StreamError>>,
    task: Option<JoinHandle<()>>,
}

impl LogSession {
    pub fn new(frames: mpsc::Receiver<Result<InboundMessage, StreamError>>) -> Self {
        Self { frames, task: None }
    }

    /// Session dont les trames sont produites par une tâche de fond, arrêtée avec la session.
    pub fn with_task(frames: mpsc::Receiver<Result<InboundMessage, StreamError>>, task: JoinHandle<()>) -> Self {
        Self { frames, task: Some(task) }
    }

    pub async fn next(&mut self) -> Option<Result<InboundMessage, StreamError>> {
        self.frames.recv().await
    }
}

impl Drop for LogSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Transport bidirectionnel capable d'ouvrir un abonnement "mentions".
#[async_trait]
pub trait LogTransport: Send + Sync {
    async fn subscribe(&self, request: &LogSubscription) -> Result<LogSession, StreamError>;
}

impl From<RpcLogsResponse> for InboundMessage {
    fn from(response: RpcLogsResponse) -> Self {
        match response.err {
            Some(err) => InboundMessage::Diagnostic {
                signature: Some(response.signature),
                reason: format!("transaction en échec : {err:?}"),
            },
            None => InboundMessage::Value(LogEvent {
                signature: response.signature,
                log_lines: response.logs,
            }),
        }
    }
}

/// `logsSubscribe` sur le WebSocket pub/sub du nœud.
pub struct PubsubLogTransport {
    ws_url: String,
    connect_timeout: Duration,
}

impl PubsubLogTransport {
    pub fn new(ws_url: String, connect_timeout: Duration) -> Self {
        Self { ws_url, connect_timeout }
    }
}

#[async_trait]
impl LogTransport for PubsubLogTransport {
    async fn subscribe(&self, request: &LogSubscription) -> Result<LogSession, StreamError> {
        let client = tokio::time::timeout(self.connect_timeout, PubsubClient::new(&self.ws_url))
            .await
            .map_err(|_| StreamError::Connect { reason: format!("délai de {:?} dépassé", self.connect_timeout) })?
            .map_err(|e| StreamError::Connect { reason: e.to_string() })?;

        let filter = RpcTransactionLogsFilter::Mentions(vec![request.mentions.to_string()]);
        let config = RpcTransactionLogsConfig { commitment: Some(request.commitment) };
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel();

        // Le stream emprunte le client : les deux vivent dans la même tâche.
        let task = tokio::spawn(async move {
            let (mut stream, unsubscribe) = match client.logs_subscribe(filter, config).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    let _ = ready_tx.send(Err(StreamError::Subscribe { reason: e.to_string() }));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            while let Some(response) = stream.next().await {
                if frames_tx.send(Ok(InboundMessage::from(response.value))).await.is_err() {
                    break;
                }
            }

            drop(stream);
            unsubscribe().await;
            if let Err(e) = client.shutdown().await {
                debug!(error = %e, "[Listener] Fermeture du client pub/sub.");
            }
        });

        match await_subscription(ready_rx, self.connect_timeout).await {
            Ok(()) => Ok(LogSession::with_task(frames_rx, task)),
            Err(e) => {
                task.abort();
                Err(e)
            }
        }
    }
}

/// Attend l'accusé de `logsSubscribe`. Un nœud qui accepte le WebSocket sans
/// jamais confirmer l'abonnement est traité comme un refus.
async fn await_subscription(
    ready: oneshot::Receiver<Result<(), StreamError>>,
    limit: Duration,
) -> Result<(), StreamError> {
    match tokio::time::timeout(limit, ready).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => Err(StreamError::Subscribe { reason: "tâche d'abonnement interrompue".to_string() }),
        Err(_) => Err(StreamError::Subscribe { reason: format!("aucune confirmation après {limit:?}") }),
    }
}
