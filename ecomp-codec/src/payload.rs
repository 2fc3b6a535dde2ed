use crate::bitmask::{Bitmask, BitmaskMode};
use crate::block::{Block, BlockPattern};
use crate::dictionary::Dictionary;
use crate::error::EcompError;
use crate::model::ModelSet;
use crate::prelude::*;
use crate::utils::{read_varint_usize, take, write_varint};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

const MARKER_LITERAL: u8 = 0;
const MARKER_REFERENCE: u8 = 1;

/// Serialize a block pattern body: consensus byte, bitmask mode byte, varint
/// deviation count, varint mask length, mask bytes, two-byte big-endian
/// residue length, residue bytes. Literal records and dictionary entries
/// share this layout.
pub(crate) fn write_pattern<W: Write>(
    consensus: u8,
    mask: &Bitmask,
    residues: &[u8],
    models: &ModelSet,
    writer: &mut W,
) -> Result<()> {
    writer.write_u8(consensus)?;
    let (mode, mask_payload) = mask.encode()?;
    writer.write_u8(mode.as_byte())?;
    write_varint(writer, residues.len() as u64)?;
    write_varint(writer, mask_payload.len() as u64)?;
    writer.write_all(&mask_payload)?;

    let residue_payload = if residues.is_empty() {
        Vec::new()
    } else {
        let model = models
            .get(consensus)
            .ok_or(EcompError::MissingConsensusModel(consensus))?;
        model.encode_residues(residues)?
    };
    if residue_payload.len() > u16::MAX as usize {
        return Err(EcompError::BlockTooLarge(
            "residue payload exceeds 65535 bytes",
        ));
    }
    writer.write_u16::<BigEndian>(residue_payload.len() as u16)?;
    writer.write_all(&residue_payload)?;
    Ok(())
}

pub(crate) fn read_pattern<R: Read>(
    reader: &mut R,
    models: &ModelSet,
    num_rows: usize,
) -> Result<BlockPattern> {
    let consensus = reader.read_u8()?;
    let mode = BitmaskMode::from_byte(reader.read_u8()?)?;
    let count = read_varint_usize(reader)?;
    if count > num_rows {
        return Err(EcompError::DeviationCountMismatch {
            expected: num_rows,
            got: count,
        });
    }
    let mask_length = read_varint_usize(reader)?;
    let mask_bytes = take(reader, mask_length)?;
    let mask = Bitmask::decode(mode, &mask_bytes, num_rows)?;
    if mask.popcount() != count {
        return Err(EcompError::DeviationCountMismatch {
            expected: count,
            got: mask.popcount(),
        });
    }

    let residue_length = reader.read_u16::<BigEndian>()? as usize;
    let residue_bytes = take(reader, residue_length)?;
    let residues = if count == 0 {
        Vec::new()
    } else {
        let model = models
            .get(consensus)
            .ok_or(EcompError::MissingConsensusModel(consensus))?;
        model.decode_residues(&residue_bytes, count)?
    };

    Ok(BlockPattern {
        consensus,
        mask,
        residues,
    })
}

/// Serialize the structural payload: consensus model table, dictionary
/// section, then the marker-discriminated block stream.
pub fn encode_blocks(
    blocks: &[Block],
    models: &ModelSet,
    dictionary: &Dictionary,
) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    models.write_to(&mut payload)?;
    dictionary.write_to(&mut payload)?;

    if blocks.len() > u32::MAX as usize {
        return Err(EcompError::BlockTooLarge("block count exceeds u32"));
    }
    payload.write_u32::<BigEndian>(blocks.len() as u32)?;

    for block in blocks {
        match dictionary.id_of(block) {
            Some(id) => {
                payload.write_u8(MARKER_REFERENCE)?;
                payload.write_u8(id)?;
                payload.write_u8(block.run_length)?;
            }
            None => {
                payload.write_u8(MARKER_LITERAL)?;
                payload.write_u8(block.run_length)?;
                write_pattern(
                    block.consensus,
                    &block.mask,
                    &block.residues,
                    models,
                    &mut payload,
                )?;
            }
        }
    }
    Ok(payload)
}

pub fn decode_blocks<R: Read>(reader: &mut R, num_rows: usize) -> Result<Vec<Block>> {
    let models = ModelSet::from_reader(reader)?;
    let dictionary = Dictionary::from_reader(reader, &models, num_rows)?;

    let count = reader.read_u32::<BigEndian>()? as usize;
    let mut blocks = Vec::with_capacity(count.min(1 << 20));
    for index in 0..count {
        let marker = reader.read_u8()?;
        let block = match marker {
            MARKER_REFERENCE => {
                let id = reader.read_u8()?;
                let run_length = reader.read_u8()?;
                let pattern =
                    dictionary
                        .get(id)
                        .ok_or(EcompError::DictionaryIdOutOfRange {
                            id,
                            size: dictionary.len(),
                        })?;
                Block {
                    run_length,
                    consensus: pattern.consensus,
                    mask: pattern.mask.clone(),
                    residues: pattern.residues.clone(),
                }
            }
            MARKER_LITERAL => {
                let run_length = reader.read_u8()?;
                let pattern = read_pattern(reader, &models, num_rows)?;
                Block {
                    run_length,
                    consensus: pattern.consensus,
                    mask: pattern.mask,
                    residues: pattern.residues,
                }
            }
            mode => {
                return Err(EcompError::UnknownMode {
                    kind: "block marker",
                    mode,
                })
            }
        };
        if block.run_length == 0 {
            return Err(EcompError::InvalidBlock {
                block: index,
                detail: "zero run length",
            });
        }
        blocks.push(block);
    }
    Ok(blocks)
}
