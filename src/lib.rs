// src/lib.rs

// On déclare tous nos modules principaux pour les rendre publics et
// utilisables par le binaire (pool_listener.rs) et les tests d'intégration.
pub mod alerts;
pub mod config;
pub mod data_pipeline;
pub mod decoders;
pub mod listener;
pub mod math;
pub mod monitoring;
pub mod pipeline;
pub mod rpc;
