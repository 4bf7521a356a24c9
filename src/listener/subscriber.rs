// src/listener/subscriber.rs

use super::{
    InboundMessage, LogEvent, LogSession, LogSubscription, LogTransport, StreamError, StreamState,
    StreamStatus, is_pool_initialization,
};
use crate::monitoring::metrics;
use arc_swap::ArcSwap;
use solana_sdk::signature::Signature;
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::{sync::mpsc, time::sleep};
use tracing::{error, info, warn};

/// Délai de reconnexion exponentiel, plafonné. Remis à la base après un abonnement réussi.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max: max.max(base), next: base }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.base;
    }
}

#[derive(Debug, Clone)]
pub struct SubscriberSettings {
    pub subscription: LogSubscription,
    pub marker: String,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Silence toléré sur une session ouverte avant de la considérer morte. `None` désactive.
    pub idle_timeout: Option<Duration>,
}

/// Garde un abonnement de logs ouvert en permanence et pousse la signature
/// de chaque initialisation de pool vers le pipeline.
pub struct LogStreamSubscriber<T> {
    transport: T,
    settings: SubscriberSettings,
    status: Arc<ArcSwap<StreamStatus>>,
}

impl<T: LogTransport> LogStreamSubscriber<T> {
    pub fn new(transport: T, settings: SubscriberSettings) -> Self {
        Self {
            transport,
            settings,
            status: Arc::new(ArcSwap::from_pointee(StreamStatus::default())),
        }
    }

    pub fn status(&self) -> Arc<StreamStatus> {
        self.status.load_full()
    }

    pub fn status_handle(&self) -> Arc<ArcSwap<StreamStatus>> {
        self.status.clone()
    }

    fn publish(&self, state: StreamState, error: Option<String>) {
        let previous = self.status.load();
        let reconnects = match (state, &error) {
            (StreamState::Disconnected, Some(_)) => previous.reconnects + 1,
            _ => previous.reconnects,
        };
        let last_error = error.or_else(|| previous.last_error.clone());
        self.status.store(Arc::new(StreamStatus { state, reconnects, last_error }));
    }

    /// Boucle infinie de connexion / abonnement / lecture. Ne rend la main que
    /// lorsque le récepteur des candidats a été fermé.
    pub async fn run(&self, candidates: mpsc::Sender<Signature>) {
        let mut backoff = Backoff::new(self.settings.reconnect_base_delay, self.settings.reconnect_max_delay);

        loop {
            if candidates.is_closed() {
                info!("[Listener] Plus de consommateur, arrêt du flux de logs.");
                self.publish(StreamState::Disconnected, None);
                return;
            }

            self.publish(StreamState::Connecting, None);
            info!(mentions = %self.settings.subscription.mentions, "[Listener] Ouverture de l'abonnement aux logs...");

            let failure = match self.transport.subscribe(&self.settings.subscription).await {
                Ok(mut session) => {
                    self.publish(StreamState::Subscribed, None);
                    backoff.reset();
                    info!("[Listener] Abonnement actif.");
                    match self.pump(&mut session, &candidates).await {
                        Ok(()) => {
                            self.publish(StreamState::Disconnected, None);
                            return;
                        }
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            metrics::STREAM_RECONNECTS.inc();
            self.publish(StreamState::Disconnected, Some(failure.to_string()));
            let delay = backoff.next_delay();
            error!(error = %failure, delay_ms = delay.as_millis() as u64, "[Listener] Flux interrompu, reconnexion programmée.");
            sleep(delay).await;
        }
    }

    /// Lit la session jusqu'à sa fin. `Ok(())` signifie que le pipeline ne consomme plus.
    async fn pump(
        &self,
        session: &mut LogSession,
        candidates: &mpsc::Sender<Signature>,
    ) -> Result<(), StreamError> {
        loop {
            let message = tokio::select! {
                _ = candidates.closed() => return Ok(()),
                frame = self.next_frame(session) => frame?,
            };

            match message {
                InboundMessage::Value(event) => {
                    metrics::LOG_MESSAGES_RECEIVED.inc();
                    if let Some(signature) = self.candidate(&event) {
                        if candidates.send(signature).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                InboundMessage::Diagnostic { signature, reason } => {
                    metrics::STREAM_DIAGNOSTICS.inc();
                    warn!(signature = signature.as_deref().unwrap_or("-"), reason = %reason, "[Listener] Diagnostic reçu.");
                }
            }
        }
    }

    async fn next_frame(&self, session: &mut LogSession) -> Result<InboundMessage, StreamError> {
        let frame = match self.settings.idle_timeout {
            Some(after) => tokio::time::timeout(after, session.next())
                .await
                .map_err(|_| StreamError::Idle { after })?,
            None => session.next().await,
        };
        frame.unwrap_or(Err(StreamError::Closed))
    }

    fn candidate(&self, event: &LogEvent) -> Option<Signature> {
        if !is_pool_initialization(event, &self.settings.marker) {
            return None;
        }
        match Signature::from_str(&event.signature) {
            Ok(signature) => {
                metrics::CANDIDATES_EMITTED.inc();
                info!(%signature, "[Listener] Nouvelle pool détectée.");
                Some(signature)
            }
            Err(e) => {
                metrics::STREAM_DIAGNOSTICS.inc();
                warn!(raw = %event.signature, error = %e, "[Listener] Signature illisible, événement ignoré.");
                None
            }
        }
    }
}
