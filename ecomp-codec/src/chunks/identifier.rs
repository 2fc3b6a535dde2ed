use crate::error::EcompError;
use crate::prelude::*;
use crate::utils::{read_varint_usize, take, take_string, token, write_varint};
use byteorder::{ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

pub const IDENTIFIER_MAGIC: &[u8; 4] = b"ECID";
/// Emitted version. Version 1 carried the same inner layout and is still
/// accepted on read.
pub const IDENTIFIER_VERSION: u8 = 0x02;

const MODE_RAW: u8 = 0;
const MODE_ZSTD: u8 = 1;
const MODE_ZLIB: u8 = 2;

/// Sequence identifiers, stored inline in the payload.
///
/// Layout: magic, version, varint block length, mode byte, then the encoded
/// block. The decoded block is a varint id count followed by one varint
/// length + UTF-8 bytes per identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierChunk {
    pub ids: Vec<String>,
}

impl IdentifierChunk {
    pub fn new(ids: Vec<String>) -> IdentifierChunk {
        IdentifierChunk { ids }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut block = Vec::new();
        write_varint(&mut block, self.ids.len() as u64)?;
        for id in self.ids.iter() {
            write_varint(&mut block, id.len() as u64)?;
            block.extend_from_slice(id.as_bytes());
        }

        let mut mode = MODE_RAW;
        let mut encoded = block.clone();

        let compressed = zstd::encode_all(block.as_slice(), 0)?;
        if compressed.len() < encoded.len() {
            mode = MODE_ZSTD;
            encoded = compressed;
        }

        let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
        zlib.write_all(&block)?;
        let compressed = zlib.finish()?;
        if compressed.len() < encoded.len() {
            mode = MODE_ZLIB;
            encoded = compressed;
        }

        writer.write_all(IDENTIFIER_MAGIC)?;
        writer.write_u8(IDENTIFIER_VERSION)?;
        write_varint(writer, encoded.len() as u64)?;
        writer.write_u8(mode)?;
        writer.write_all(&encoded)?;
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: &mut R) -> Result<IdentifierChunk> {
        token(reader, IDENTIFIER_MAGIC, "identifier chunk")?;
        let version = reader.read_u8()?;
        if version == 0 || version > IDENTIFIER_VERSION {
            return Err(EcompError::UnsupportedVersion {
                what: "identifier chunk",
                version,
            });
        }
        let length = read_varint_usize(reader)?;
        let mode = reader.read_u8()?;
        let encoded = take(reader, length)?;

        let block = match mode {
            MODE_RAW => encoded,
            MODE_ZSTD => {
                zstd::decode_all(encoded.as_slice()).map_err(|e| EcompError::CorruptPayload {
                    encoding: "zstd",
                    detail: e.to_string(),
                })?
            }
            MODE_ZLIB => {
                let mut decoder = ZlibDecoder::new(encoded.as_slice());
                let mut block = Vec::new();
                decoder
                    .read_to_end(&mut block)
                    .map_err(|e| EcompError::CorruptPayload {
                        encoding: "zlib",
                        detail: e.to_string(),
                    })?;
                block
            }
            mode => {
                return Err(EcompError::UnknownMode {
                    kind: "identifier chunk",
                    mode,
                })
            }
        };

        let mut reader = block.as_slice();
        let count = read_varint_usize(&mut reader)?;
        let mut ids = Vec::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            let length = read_varint_usize(&mut reader)?;
            ids.push(take_string(&mut reader, length)?);
        }
        if !reader.is_empty() {
            return Err(EcompError::TrailingData("identifier block"));
        }
        Ok(IdentifierChunk { ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let ids: Vec<String> = vec!["seq_1".into(), "seq_2".into(), "栄養".into(), "".into()];
        let chunk = IdentifierChunk::new(ids);
        let mut buf = Vec::new();
        chunk.write_to(&mut buf).unwrap();
        let mut reader = buf.as_slice();
        let decoded = IdentifierChunk::from_reader(&mut reader).unwrap();
        assert!(reader.is_empty());
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn repetitive_ids_get_compressed() {
        let ids: Vec<String> = (0..2000).map(|i| format!("sample_accession_{i}")).collect();
        let chunk = IdentifierChunk::new(ids);
        let mut buf = Vec::new();
        chunk.write_to(&mut buf).unwrap();
        // The mode byte sits after the magic, version and block length.
        let mut reader = &buf[5..];
        let length = read_varint_usize(&mut reader).unwrap();
        assert_ne!(reader[0], MODE_RAW);
        assert_eq!(reader.len(), length + 1);

        let mut reader = buf.as_slice();
        assert_eq!(IdentifierChunk::from_reader(&mut reader).unwrap(), chunk);
    }

    #[test]
    fn accepts_version_one() {
        let chunk = IdentifierChunk::new(vec!["a".into()]);
        let mut buf = Vec::new();
        chunk.write_to(&mut buf).unwrap();
        buf[4] = 0x01;
        let mut reader = buf.as_slice();
        assert_eq!(IdentifierChunk::from_reader(&mut reader).unwrap(), chunk);
    }
}
