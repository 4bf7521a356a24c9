// src/decoders/mod.rs

// Décodeurs purs : octets d'un compte → structure. Aucune I/O ici.
pub mod metadata;
pub mod spl_token_decoders;

pub use metadata::{DecodeError, MetadataRecord, decode_metadata, metadata_address};
pub use spl_token_decoders::mint::{DecodedMint, decode_mint};
