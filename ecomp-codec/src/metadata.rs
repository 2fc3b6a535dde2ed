use crate::error::EcompError;
use crate::prelude::*;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

pub const METADATA_MAGIC: &[u8; 4] = b"ECMZ";
pub const METADATA_VERSION: u8 = 0x01;

pub const FORMAT_VERSION: &str = "1.0.0";
pub const CODEC_NAME: &str = "ecomp";

/// How the encoded row order is transported. `encoding = "payload"` points
/// at an ECPE chunk; the inline form carries the order directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencePermutation {
    pub encoding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fallback {
    #[serde(rename = "type")]
    pub kind: String,
    pub format: String,
}

/// The sidecar document accompanying an archive. Serialized as UTF-8 JSON
/// with sorted keys; unknown keys survive a decode/encode cycle through the
/// flattened `extra` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub format_version: String,
    pub codec: String,
    pub num_sequences: usize,
    pub alignment_length: usize,
    /// The global alphabet as a string of sorted symbols.
    pub alphabet: String,
    /// One of raw, zlib, zstd, xz, gzip.
    pub payload_encoding: String,
    pub bits_per_symbol: u8,
    pub bitmask_bytes: usize,
    pub sequence_id_codec: String,
    pub ordering_strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_permutation: Option<SequencePermutation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Fallback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_length_blocks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_run_length: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns_with_deviations: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_encoded_bytes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_raw_bytes: Option<usize>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Metadata {
    /// Serialize to JSON, wrapped in `ECMZ` + version + zlib when that form
    /// is smaller. Key order is sorted because `serde_json::Map` is
    /// BTree-backed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let value = serde_json::to_value(self)?;
        let json = serde_json::to_string(&value)?.into_bytes();

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        let compressed = encoder.finish()?;

        if compressed.len() + METADATA_MAGIC.len() + 1 < json.len() {
            let mut packed = Vec::with_capacity(compressed.len() + 5);
            packed.extend_from_slice(METADATA_MAGIC);
            packed.push(METADATA_VERSION);
            packed.extend_from_slice(&compressed);
            Ok(packed)
        } else {
            Ok(json)
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Metadata> {
        if data.starts_with(METADATA_MAGIC) {
            let version = *data
                .get(4)
                .ok_or(EcompError::Truncated("metadata document"))?;
            if version != METADATA_VERSION {
                return Err(EcompError::UnsupportedVersion {
                    what: "metadata document",
                    version,
                });
            }
            let mut decoder = ZlibDecoder::new(&data[5..]);
            let mut json = Vec::new();
            decoder
                .read_to_end(&mut json)
                .map_err(|e| EcompError::CorruptPayload {
                    encoding: "zlib",
                    detail: e.to_string(),
                })?;
            Ok(serde_json::from_slice(&json)?)
        } else {
            Ok(serde_json::from_slice(data)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metadata {
        Metadata {
            format_version: FORMAT_VERSION.into(),
            codec: CODEC_NAME.into(),
            num_sequences: 3,
            alignment_length: 4,
            alphabet: "ACGT".into(),
            payload_encoding: "raw".into(),
            bits_per_symbol: 2,
            bitmask_bytes: 1,
            sequence_id_codec: "inline".into(),
            ordering_strategy: "input".into(),
            checksum_sha256: None,
            sequence_permutation: None,
            sequence_ids: None,
            fallback: None,
            run_length_blocks: Some(2),
            max_run_length: Some(3),
            columns_with_deviations: Some(1),
            payload_encoded_bytes: None,
            payload_raw_bytes: None,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn keys_are_sorted() {
        let value = serde_json::to_value(sample()).unwrap();
        let text = serde_json::to_string(&value).unwrap();
        let keys: Vec<usize> = [
            "\"alignment_length\"",
            "\"alphabet\"",
            "\"bitmask_bytes\"",
            "\"bits_per_symbol\"",
            "\"codec\"",
            "\"format_version\"",
        ]
        .iter()
        .map(|k| text.find(k).unwrap())
        .collect();
        assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn unknown_keys_survive() {
        let mut metadata = sample();
        metadata
            .extra
            .insert("x_pipeline".into(), serde_json::json!({"stage": 3}));
        let bytes = metadata.to_bytes().unwrap();
        let decoded = Metadata::from_bytes(&bytes).unwrap();
        assert_eq!(
            decoded.extra.get("x_pipeline"),
            Some(&serde_json::json!({"stage": 3}))
        );
    }

    #[test]
    fn large_documents_take_the_zlib_wrapper() {
        let mut metadata = sample();
        metadata.sequence_ids = Some((0..500).map(|i| format!("accession_{i}")).collect());
        let bytes = metadata.to_bytes().unwrap();
        assert!(bytes.starts_with(METADATA_MAGIC));
        let decoded = Metadata::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.sequence_ids.unwrap().len(), 500);
    }

    #[test]
    fn fallback_sub_object_round_trips() {
        let mut metadata = sample();
        metadata.fallback = Some(Fallback {
            kind: "gzip".into(),
            format: "fasta".into(),
        });
        metadata.payload_encoding = "gzip".into();
        let decoded = Metadata::from_bytes(&metadata.to_bytes().unwrap()).unwrap();
        let fallback = decoded.fallback.unwrap();
        assert_eq!(fallback.kind, "gzip");
        assert_eq!(fallback.format, "fasta");
    }
}
