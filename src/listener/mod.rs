// src/listener/mod.rs

use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::time::Duration;
use thiserror::Error;

pub mod subscriber;
pub mod transport;

pub use subscriber::{Backoff, LogStreamSubscriber, SubscriberSettings};
pub use transport::{LogSession, LogTransport, PubsubLogTransport};

/// Une notification de logs : signature de la transaction et ses lignes de log, dans l'ordre.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub signature: String,
    pub log_lines: Vec<String>,
}

/// Message entrant sur l'abonnement, vérifié exhaustivement par le subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Charge utile exploitable.
    Value(LogEvent),
    /// Erreur ou avertissement : remonté en diagnostic, le stream continue.
    Diagnostic { signature: Option<String>, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("connexion impossible : {reason}")]
    Connect { reason: String },

    #[error("abonnement refusé : {reason}")]
    Subscribe { reason: String },

    #[error("stream fermé")]
    Closed,

    #[error("trame invalide : {reason}")]
    MalformedFrame { reason: String },

    #[error("aucune trame depuis {after:?}")]
    Idle { after: Duration },
}

/// Filtre "mentions" + commitment envoyés à l'ouverture de l'abonnement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSubscription {
    pub mentions: Pubkey,
    pub commitment: CommitmentConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Subscribed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStatus {
    pub state: StreamState,
    pub reconnects: u64,
    pub last_error: Option<String>,
}

impl Default for StreamStatus {
    fn default() -> Self {
        Self { state: StreamState::Disconnected, reconnects: 0, last_error: None }
    }
}

/// `true` si une des lignes contient le marqueur d'initialisation de pool.
pub fn is_pool_initialization(event: &LogEvent, marker: &str) -> bool {
    event.log_lines.iter().any(|line| line.contains(marker))
}
