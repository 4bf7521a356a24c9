// src/decoders/metadata.rs

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Programme Token Metadata (Metaplex), propriétaire des comptes de métadonnées.
pub const METADATA_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// Discriminant `Key::MetadataV1` : premier octet d'un compte de métadonnées initialisé.
pub const METADATA_V1_KEY: u8 = 4;

const METADATA_SEED: &[u8] = b"metadata";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("discriminant invalide : attendu {expected}, reçu {found}")]
    BadDiscriminant { expected: u8, found: u8 },

    #[error("buffer tronqué à l'offset {offset} : {needed} octet(s) requis, {remaining} restant(s)")]
    Truncated { offset: usize, needed: usize, remaining: usize },

    #[error("champ `{field}` non UTF-8")]
    InvalidUtf8 { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub address: Pubkey,
    pub verified: bool,
    /// Part en pourcentage. La somme n'est pas validée.
    pub share: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub update_authority: Pubkey,
    pub mint: Pubkey,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: i16,
    pub creators: Vec<Creator>,
    pub primary_sale_happened: bool,
    pub is_mutable: bool,
}

/// Adresse (PDA) du compte de métadonnées d'un mint :
/// seeds = ["metadata", programme metadata, mint].
pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    let (address, _bump) = Pubkey::find_program_address(
        &[METADATA_SEED, METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
        &METADATA_PROGRAM_ID,
    );
    address
}

/// Curseur de lecture borné sur un buffer de compte. Chaque lecture vérifie
/// la longueur restante et ne lit jamais au-delà de la fin.
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.offset,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_pubkey(&mut self) -> Result<Pubkey, DecodeError> {
        Ok(Pubkey::new_from_array(self.read_array()?))
    }

    /// Chaîne préfixée par sa longueur (u32 LE), débarrassée du padding NUL final.
    pub fn read_string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { field })?;
        Ok(text.trim_end_matches('\0').to_string())
    }
}

/// Décode un compte de métadonnées `MetadataV1`.
/// Les octets après `is_mutable` (edition nonce, token standard, collection...) sont ignorés.
pub fn decode_metadata(data: &[u8]) -> Result<MetadataRecord, DecodeError> {
    let mut cursor = ByteCursor::new(data);

    let key = cursor.read_u8()?;
    if key != METADATA_V1_KEY {
        return Err(DecodeError::BadDiscriminant { expected: METADATA_V1_KEY, found: key });
    }

    let update_authority = cursor.read_pubkey()?;
    let mint = cursor.read_pubkey()?;
    let name = cursor.read_string("name")?;
    let symbol = cursor.read_string("symbol")?;
    let uri = cursor.read_string("uri")?;
    let seller_fee_basis_points = cursor.read_i16()?;

    let mut creators = Vec::new();
    if cursor.read_bool()? {
        let count = cursor.read_u32()? as usize;
        // Un créateur occupe 34 octets : on ne réserve jamais plus que ce que le buffer peut contenir.
        creators.reserve(count.min(cursor.remaining() / 34));
        for _ in 0..count {
            creators.push(Creator {
                address: cursor.read_pubkey()?,
                verified: cursor.read_bool()?,
                share: cursor.read_u8()?,
            });
        }
    }

    let primary_sale_happened = cursor.read_bool()?;
    let is_mutable = cursor.read_bool()?;

    Ok(MetadataRecord {
        update_authority,
        mint,
        name,
        symbol,
        uri,
        seller_fee_basis_points,
        creators,
        primary_sale_happened,
        is_mutable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_string(buf: &mut Vec<u8>, value: &str, padded_len: usize) {
        let mut bytes = value.as_bytes().to_vec();
        bytes.resize(padded_len.max(bytes.len()), 0);
        buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(&bytes);
    }

    fn encode(record: &MetadataRecord, pad: usize) -> Vec<u8> {
        let mut buf = vec![METADATA_V1_KEY];
        buf.extend_from_slice(record.update_authority.as_ref());
        buf.extend_from_slice(record.mint.as_ref());
        push_string(&mut buf, &record.name, pad);
        push_string(&mut buf, &record.symbol, pad);
        push_string(&mut buf, &record.uri, pad);
        buf.extend_from_slice(&record.seller_fee_basis_points.to_le_bytes());
        if record.creators.is_empty() {
            buf.push(0);
        } else {
            buf.push(1);
            buf.extend_from_slice(&(record.creators.len() as u32).to_le_bytes());
            for creator in &record.creators {
                buf.extend_from_slice(creator.address.as_ref());
                buf.push(u8::from(creator.verified));
                buf.push(creator.share);
            }
        }
        buf.push(u8::from(record.primary_sale_happened));
        buf.push(u8::from(record.is_mutable));
        buf
    }

    fn sample_record() -> MetadataRecord {
        MetadataRecord {
            update_authority: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            name: "Foo Token".to_string(),
            symbol: "FOO".to_string(),
            uri: "https://example.org/foo.json".to_string(),
            seller_fee_basis_points: 250,
            creators: vec![
                Creator { address: Pubkey::new_unique(), verified: true, share: 70 },
                Creator { address: Pubkey::new_unique(), verified: false, share: 40 },
            ],
            primary_sale_happened: false,
            is_mutable: true,
        }
    }

    #[test]
    fn decodes_nul_padded_record_back_to_input_values() {
        let record = sample_record();
        // Les noms on-chain sont paddés à taille fixe avec des NUL.
        let buf = encode(&record, 32);
        assert_eq!(decode_metadata(&buf).unwrap(), record);
    }

    #[test]
    fn decodes_record_without_creators() {
        let record = MetadataRecord { creators: vec![], uri: String::new(), ..sample_record() };
        let decoded = decode_metadata(&encode(&record, 0)).unwrap();
        assert!(decoded.creators.is_empty());
        assert_eq!(decoded.uri, "");
        assert!(decoded.is_mutable);
    }

    #[test]
    fn trailing_bytes_after_is_mutable_are_ignored() {
        let record = sample_record();
        let mut buf = encode(&record, 10);
        buf.extend_from_slice(&[1, 255, 0, 0, 0, 0]);
        assert_eq!(decode_metadata(&buf).unwrap(), record);
    }

    #[test]
    fn every_strict_prefix_is_truncated() {
        let buf = encode(&sample_record(), 32);
        for len in 0..buf.len() {
            match decode_metadata(&buf[..len]) {
                Err(DecodeError::Truncated { .. }) => {}
                other => panic!("prefix of {len} bytes: expected Truncated, got {other:?}"),
            }
        }
    }

    #[test]
    fn wrong_first_byte_is_bad_discriminant() {
        let mut buf = encode(&sample_record(), 0);
        for key in [0u8, 1, 3, 5, 255] {
            buf[0] = key;
            assert_eq!(
                decode_metadata(&buf),
                Err(DecodeError::BadDiscriminant { expected: METADATA_V1_KEY, found: key })
            );
        }
        // Un seul octet suffit : rien n'est lu après le discriminant.
        assert!(matches!(decode_metadata(&[7]), Err(DecodeError::BadDiscriminant { found: 7, .. })));
    }

    #[test]
    fn oversized_length_prefix_is_truncated() {
        let mut buf = vec![METADATA_V1_KEY];
        buf.extend_from_slice(&[0u8; 64]);
        buf.extend_from_slice(&u32::MAX.to_le_bytes());
        buf.extend_from_slice(b"abc");
        assert!(matches!(
            decode_metadata(&buf),
            Err(DecodeError::Truncated { offset: 69, needed, remaining: 3 }) if needed == u32::MAX as usize
        ));
    }

    #[test]
    fn huge_creator_count_fails_without_allocating() {
        let record = MetadataRecord { creators: vec![], ..sample_record() };
        let mut buf = encode(&record, 0);
        let flag_at = buf.len() - 3;
        buf.truncate(flag_at);
        buf.push(1);
        buf.extend_from_slice(&u32::MAX.to_le_bytes());
        buf.extend_from_slice(&[0u8; 40]);
        assert!(matches!(decode_metadata(&buf), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn invalid_utf8_in_symbol_is_reported() {
        let mut buf = vec![METADATA_V1_KEY];
        buf.extend_from_slice(&[0u8; 64]);
        push_string(&mut buf, "ok", 0);
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&[0xff, 0xfe]);
        assert_eq!(decode_metadata(&buf), Err(DecodeError::InvalidUtf8 { field: "symbol" }));
    }

    #[test]
    fn cursor_reads_little_endian() {
        let data = [0x01, 0x00, 0x00, 0x00, 0xfe, 0xff];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u32().unwrap(), 1);
        assert_eq!(cursor.read_i16().unwrap(), -2);
        assert_eq!(cursor.remaining(), 0);
        assert!(cursor.read_u8().is_err());
    }

    #[test]
    fn metadata_address_is_deterministic_per_mint() {
        let mint = Pubkey::new_unique();
        assert_eq!(metadata_address(&mint), metadata_address(&mint));
        assert_ne!(metadata_address(&mint), metadata_address(&Pubkey::new_unique()));
    }
}
