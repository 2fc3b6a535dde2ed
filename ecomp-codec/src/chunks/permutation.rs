use crate::error::EcompError;
use crate::prelude::*;
use crate::utils::{read_varint_usize, take, token, write_varint};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

pub const PERMUTATION_MAGIC: &[u8; 4] = b"ECPE";
pub const PERMUTATION_VERSION: u8 = 0x01;

const FLAG_ZLIB: u8 = 0b0000_0001;

/// Row-order chunk at the head of the decompressed payload. `order[k]` is
/// the original row index stored at encoded position k; the decoder inverts
/// it to restore the input order.
///
/// Layout: magic, version, flag byte (bit 0 = zlib, bits 1-2 = index width,
/// 0 = u8 / 1 = u16 BE / 2 = u32 BE), varint index count, varint payload
/// length, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationChunk {
    pub order: Vec<u32>,
}

/// A permutation must touch every row exactly once.
pub(crate) fn validate_permutation(order: &[u32], num_rows: usize) -> Result<()> {
    if order.len() != num_rows {
        return Err(EcompError::InvalidPermutation(
            "length does not match row count",
        ));
    }
    let mut seen = vec![false; num_rows];
    for &index in order {
        let slot = seen
            .get_mut(index as usize)
            .ok_or(EcompError::InvalidPermutation("index out of range"))?;
        if *slot {
            return Err(EcompError::InvalidPermutation("repeated index"));
        }
        *slot = true;
    }
    Ok(())
}

impl PermutationChunk {
    pub fn new(order: Vec<u32>) -> PermutationChunk {
        PermutationChunk { order }
    }

    fn width_code(&self) -> u8 {
        let max = self.order.iter().copied().max().unwrap_or(0);
        if max <= u8::MAX as u32 {
            0
        } else if max <= u16::MAX as u32 {
            1
        } else {
            2
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let width_code = self.width_code();
        let mut raw = Vec::new();
        for &index in self.order.iter() {
            match width_code {
                0 => raw.write_u8(index as u8)?,
                1 => raw.write_u16::<BigEndian>(index as u16)?,
                _ => raw.write_u32::<BigEndian>(index)?,
            }
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        let compressed = encoder.finish()?;

        let (flags, payload) = if compressed.len() < raw.len() {
            (FLAG_ZLIB | (width_code << 1), compressed)
        } else {
            (width_code << 1, raw)
        };

        writer.write_all(PERMUTATION_MAGIC)?;
        writer.write_u8(PERMUTATION_VERSION)?;
        writer.write_u8(flags)?;
        write_varint(writer, self.order.len() as u64)?;
        write_varint(writer, payload.len() as u64)?;
        writer.write_all(&payload)?;
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: &mut R, num_rows: usize) -> Result<PermutationChunk> {
        token(reader, PERMUTATION_MAGIC, "permutation chunk")?;
        let version = reader.read_u8()?;
        if version != PERMUTATION_VERSION {
            return Err(EcompError::UnsupportedVersion {
                what: "permutation chunk",
                version,
            });
        }
        let flags = reader.read_u8()?;
        let width_code = (flags >> 1) & 0b11;
        let count = read_varint_usize(reader)?;
        if count != num_rows {
            return Err(EcompError::InvalidPermutation(
                "length does not match row count",
            ));
        }
        let length = read_varint_usize(reader)?;
        let payload = take(reader, length)?;

        let raw = if flags & FLAG_ZLIB != 0 {
            let mut decoder = ZlibDecoder::new(payload.as_slice());
            let mut raw = Vec::new();
            decoder
                .read_to_end(&mut raw)
                .map_err(|e| EcompError::CorruptPayload {
                    encoding: "zlib",
                    detail: e.to_string(),
                })?;
            raw
        } else {
            payload
        };

        let width = match width_code {
            0 => 1,
            1 => 2,
            2 => 4,
            code => {
                return Err(EcompError::UnknownMode {
                    kind: "permutation index width",
                    mode: code,
                })
            }
        };
        if raw.len() != count * width {
            return Err(EcompError::Truncated("permutation index payload"));
        }

        let mut indices = raw.as_slice();
        let mut order = Vec::with_capacity(count);
        for _ in 0..count {
            let index = match width {
                1 => u32::from(indices.read_u8()?),
                2 => u32::from(indices.read_u16::<BigEndian>()?),
                _ => indices.read_u32::<BigEndian>()?,
            };
            order.push(index);
        }
        validate_permutation(&order, num_rows)?;
        Ok(PermutationChunk { order })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_at_each_width() {
        for count in [3usize, 300, 70_000] {
            let order: Vec<u32> = (0..count as u32).rev().collect();
            let chunk = PermutationChunk::new(order);
            let mut buf = Vec::new();
            chunk.write_to(&mut buf).unwrap();
            let mut reader = buf.as_slice();
            let decoded = PermutationChunk::from_reader(&mut reader, count).unwrap();
            assert!(reader.is_empty());
            assert_eq!(decoded, chunk);
        }
    }

    #[test]
    fn rejects_non_bijective_order() {
        let chunk = PermutationChunk::new(vec![0, 0, 1]);
        let mut buf = Vec::new();
        chunk.write_to(&mut buf).unwrap();
        let mut reader = buf.as_slice();
        assert!(matches!(
            PermutationChunk::from_reader(&mut reader, 3),
            Err(EcompError::InvalidPermutation(_))
        ));
    }
}
