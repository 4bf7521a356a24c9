// src/data_pipeline/mod.rs

// Sources de données hors chaîne consommées par le pipeline.
pub mod api_connectors;
