use crate::chunks::{validate_permutation, IdentifierChunk, PermutationChunk};
use crate::container;
use crate::error::EcompError;
use crate::fasta;
use crate::frame::AlignmentFrame;
use crate::metadata::Metadata;
use crate::outer::{self, PayloadEncoding};
use crate::payload;
use crate::prelude::*;

/// Reconstruct a frame from archive bytes and the metadata document.
///
/// The decoder is a linear pass: header, metadata fallback check, outer
/// decoding, optional permutation chunk, identifier chunk, consensus models,
/// dictionary, block stream, column emission. Output rows are only
/// allocated once the block stream has fully validated.
pub fn decode(archive: &[u8], metadata: &[u8]) -> Result<AlignmentFrame> {
    let metadata = Metadata::from_bytes(metadata)?;
    let stored = container::read_archive(archive)?;

    if let Some(fallback) = &metadata.fallback {
        if fallback.kind != "gzip" || fallback.format != "fasta" {
            return Err(EcompError::UnsupportedFallback(format!(
                "{}/{}",
                fallback.kind, fallback.format
            )));
        }
        return decode_fallback(stored, &metadata);
    }

    let encoding = PayloadEncoding::from_name(&metadata.payload_encoding)?;
    let payload = outer::decompress(encoding, stored)?;
    log::debug!(
        "decoded {} payload: {} -> {} bytes",
        encoding.as_str(),
        stored.len(),
        payload.len()
    );

    let num_rows = metadata.num_sequences;
    let mut reader = payload.as_slice();

    let permutation = match &metadata.sequence_permutation {
        Some(hint) if hint.encoding == "payload" => {
            Some(PermutationChunk::from_reader(&mut reader, num_rows)?.order)
        }
        Some(hint) if hint.encoding == "inline" => {
            let order = hint
                .order
                .clone()
                .ok_or(EcompError::InvalidPermutation("missing inline order"))?;
            validate_permutation(&order, num_rows)?;
            Some(order)
        }
        Some(_) => {
            return Err(EcompError::InvalidPermutation("unknown encoding"));
        }
        None => None,
    };

    let ids = IdentifierChunk::from_reader(&mut reader)?.ids;
    if ids.len() != num_rows {
        return Err(EcompError::SequenceCountMismatch {
            expected: num_rows,
            got: ids.len(),
        });
    }

    let blocks = payload::decode_blocks(&mut reader, num_rows)?;
    if !reader.is_empty() {
        return Err(EcompError::TrailingData("block stream"));
    }
    let total: usize = blocks.iter().map(|block| block.run_length as usize).sum();
    if total != metadata.alignment_length {
        return Err(EcompError::AlignmentLengthMismatch {
            expected: metadata.alignment_length,
            got: total,
        });
    }

    // The stream is fully validated; emit columns.
    let mut rows = vec![vec![0u8; total]; num_rows];
    let mut column = 0usize;
    for block in blocks.iter() {
        let end = column + block.run_length as usize;
        for row in rows.iter_mut() {
            row[column..end].fill(block.consensus);
        }
        for (deviation, row) in block.mask.set_rows().into_iter().enumerate() {
            rows[row as usize][column..end].fill(block.residues[deviation]);
        }
        column = end;
    }

    let (ids, rows) = match permutation {
        Some(order) => {
            let mut restored_ids = vec![String::new(); num_rows];
            let mut restored_rows = vec![Vec::new(); num_rows];
            for ((position, id), row) in order.iter().zip(ids).zip(rows) {
                restored_ids[*position as usize] = id;
                restored_rows[*position as usize] = row;
            }
            (restored_ids, restored_rows)
        }
        None => (ids, rows),
    };

    let frame = AlignmentFrame::new(ids, rows)?;
    verify_checksum(&frame, &metadata)?;
    Ok(frame)
}

fn decode_fallback(stored: &[u8], metadata: &Metadata) -> Result<AlignmentFrame> {
    let fasta = outer::gzip_decompress(stored).map_err(|_| EcompError::FallbackInconsistency)?;
    let (ids, rows) = fasta::parse(&fasta)?;
    if ids.len() != metadata.num_sequences {
        return Err(EcompError::SequenceCountMismatch {
            expected: metadata.num_sequences,
            got: ids.len(),
        });
    }
    let frame = AlignmentFrame::new(ids, rows)?;
    if frame.alignment_length() != metadata.alignment_length {
        return Err(EcompError::AlignmentLengthMismatch {
            expected: metadata.alignment_length,
            got: frame.alignment_length(),
        });
    }
    verify_checksum(&frame, metadata)?;
    Ok(frame)
}

fn verify_checksum(frame: &AlignmentFrame, metadata: &Metadata) -> Result<()> {
    if let Some(expected) = &metadata.checksum_sha256 {
        let got = frame.checksum();
        if *expected != got {
            return Err(EcompError::ChecksumMismatch {
                expected: expected.clone(),
                got,
            });
        }
    }
    Ok(())
}
