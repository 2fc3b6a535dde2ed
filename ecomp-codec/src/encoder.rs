use crate::block::aggregate_columns;
use crate::chunks::{validate_permutation, IdentifierChunk, PermutationChunk};
use crate::container;
use crate::dictionary::Dictionary;
use crate::fasta;
use crate::frame::AlignmentFrame;
use crate::metadata::{
    Fallback, Metadata, SequencePermutation, CODEC_NAME, FORMAT_VERSION,
};
use crate::model::{bits_per_symbol, ModelSet};
use crate::outer;
use crate::payload;
use crate::prelude::*;
use crate::profile::ColumnProfiles;

/// Knobs for one encode invocation. The defaults reproduce [`encode`].
pub struct EncodeOptions {
    /// Row order to encode under: `permutation[k]` is the original index of
    /// the row stored at position k. The decoder restores the input order.
    pub permutation: Option<Vec<u32>>,
    /// Label recorded as `ordering_strategy`; callers that reorder rows name
    /// their heuristic here.
    pub ordering_strategy: Option<String>,
    pub with_checksum: bool,
    pub with_dictionary: bool,
    /// Whether the gzip-of-FASTA fallback may replace the structural
    /// payload when it is smaller.
    pub with_fallback: bool,
}

impl Default for EncodeOptions {
    fn default() -> EncodeOptions {
        EncodeOptions {
            permutation: None,
            ordering_strategy: None,
            with_checksum: true,
            with_dictionary: true,
            with_fallback: true,
        }
    }
}

/// The two owned blobs an encode produces: the archive file bytes and the
/// metadata sidecar document.
pub struct EncodedArchive {
    pub archive: Vec<u8>,
    pub metadata: Vec<u8>,
}

pub fn encode(frame: &AlignmentFrame) -> Result<EncodedArchive> {
    encode_with_options(frame, &EncodeOptions::default())
}

pub fn encode_with_options(
    frame: &AlignmentFrame,
    options: &EncodeOptions,
) -> Result<EncodedArchive> {
    let checksum = options.with_checksum.then(|| frame.checksum());

    // Work on the permuted row order when a hint is given; the checksum
    // above is always over the input order.
    let (ids, rows) = match &options.permutation {
        Some(order) => {
            validate_permutation(order, frame.num_sequences())?;
            let ids = order
                .iter()
                .map(|&i| frame.ids()[i as usize].clone())
                .collect();
            let rows = order
                .iter()
                .map(|&i| frame.rows()[i as usize].clone())
                .collect();
            (ids, rows)
        }
        None => (frame.ids().to_vec(), frame.rows().to_vec()),
    };

    let blocks = aggregate_columns(ColumnProfiles::new(&rows));
    let models = ModelSet::from_blocks(&blocks)?;
    let dictionary = if options.with_dictionary {
        Dictionary::build(&blocks, &models)?
    } else {
        Dictionary::empty()
    };
    log::debug!(
        "profiled {} columns into {} blocks, {} models, {} dictionary entries",
        frame.alignment_length(),
        blocks.len(),
        models.len(),
        dictionary.len()
    );

    let structural = payload::encode_blocks(&blocks, &models, &dictionary)?;

    let mut raw_payload = Vec::new();
    if let Some(order) = &options.permutation {
        PermutationChunk::new(order.clone()).write_to(&mut raw_payload)?;
    }
    IdentifierChunk::new(ids).write_to(&mut raw_payload)?;
    raw_payload.extend_from_slice(&structural);

    let payload_raw_bytes = raw_payload.len();
    let (encoding, encoded) = outer::compress_smallest(&raw_payload)?;
    log::debug!(
        "outer coding picked {} ({} -> {} bytes)",
        encoding.as_str(),
        payload_raw_bytes,
        encoded.len()
    );

    if options.with_fallback {
        let gzip = outer::gzip_compress(&fasta::render(frame.ids(), frame.rows()))?;
        if gzip.len() < encoded.len() {
            log::debug!(
                "structural payload ({} bytes) lost to gzip fallback ({} bytes)",
                encoded.len(),
                gzip.len()
            );
            let metadata = Metadata {
                payload_encoding: outer::PayloadEncoding::Gzip.as_str().into(),
                fallback: Some(Fallback {
                    kind: "gzip".into(),
                    format: "fasta".into(),
                }),
                ..base_metadata(frame, checksum, options)
            };
            return Ok(EncodedArchive {
                archive: container::write_archive(&gzip)?,
                metadata: metadata.to_bytes()?,
            });
        }
    }

    let columns_with_deviations = blocks
        .iter()
        .filter(|block| !block.mask.is_empty())
        .map(|block| block.run_length as usize)
        .sum();
    let metadata = Metadata {
        payload_encoding: encoding.as_str().into(),
        sequence_permutation: options.permutation.as_ref().map(|_| SequencePermutation {
            encoding: "payload".into(),
            order: None,
        }),
        run_length_blocks: Some(blocks.len()),
        max_run_length: Some(blocks.iter().map(|block| block.run_length).max().unwrap_or(0)),
        columns_with_deviations: Some(columns_with_deviations),
        payload_raw_bytes: Some(payload_raw_bytes),
        payload_encoded_bytes: Some(encoded.len()),
        ..base_metadata(frame, checksum, options)
    };

    Ok(EncodedArchive {
        archive: container::write_archive(&encoded)?,
        metadata: metadata.to_bytes()?,
    })
}

fn base_metadata(
    frame: &AlignmentFrame,
    checksum: Option<String>,
    options: &EncodeOptions,
) -> Metadata {
    Metadata {
        format_version: FORMAT_VERSION.into(),
        codec: CODEC_NAME.into(),
        num_sequences: frame.num_sequences(),
        alignment_length: frame.alignment_length(),
        alphabet: String::from_utf8(frame.alphabet().to_vec()).unwrap_or_default(),
        payload_encoding: outer::PayloadEncoding::Raw.as_str().into(),
        bits_per_symbol: bits_per_symbol(frame.alphabet().len()),
        bitmask_bytes: frame.num_sequences().div_ceil(8),
        sequence_id_codec: "inline".into(),
        ordering_strategy: options
            .ordering_strategy
            .clone()
            .unwrap_or_else(|| "input".into()),
        checksum_sha256: checksum,
        sequence_permutation: None,
        sequence_ids: None,
        fallback: None,
        run_length_blocks: None,
        max_run_length: None,
        columns_with_deviations: None,
        payload_encoded_bytes: None,
        payload_raw_bytes: None,
        extra: serde_json::Map::new(),
    }
}
