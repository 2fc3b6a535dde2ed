use crate::error::EcompError;
use crate::prelude::*;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::io::{Cursor, Read, Write};

/// Outer coder applied to the whole payload, named by
/// `payload_encoding` in the metadata document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    Raw,
    Zlib,
    Zstd,
    Xz,
    /// Only produced by the FASTA fallback path.
    Gzip,
}

impl PayloadEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadEncoding::Raw => "raw",
            PayloadEncoding::Zlib => "zlib",
            PayloadEncoding::Zstd => "zstd",
            PayloadEncoding::Xz => "xz",
            PayloadEncoding::Gzip => "gzip",
        }
    }

    pub fn from_name(name: &str) -> Result<PayloadEncoding> {
        match name {
            "raw" => Ok(PayloadEncoding::Raw),
            "zlib" => Ok(PayloadEncoding::Zlib),
            "zstd" => Ok(PayloadEncoding::Zstd),
            "xz" => Ok(PayloadEncoding::Xz),
            "gzip" => Ok(PayloadEncoding::Gzip),
            name => Err(EcompError::UnsupportedPayloadEncoding(name.to_string())),
        }
    }
}

/// Try every outer coder and keep the smallest result. Ties keep the
/// earlier candidate, identity first.
pub fn compress_smallest(data: &[u8]) -> Result<(PayloadEncoding, Vec<u8>)> {
    let mut best = (PayloadEncoding::Raw, data.to_vec());

    let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
    zlib.write_all(data)?;
    let candidate = zlib.finish()?;
    if candidate.len() < best.1.len() {
        best = (PayloadEncoding::Zlib, candidate);
    }

    let candidate = zstd::encode_all(data, 0)?;
    if candidate.len() < best.1.len() {
        best = (PayloadEncoding::Zstd, candidate);
    }

    let mut candidate = Vec::new();
    lzma_rs::xz_compress(&mut Cursor::new(data), &mut candidate)?;
    if candidate.len() < best.1.len() {
        best = (PayloadEncoding::Xz, candidate);
    }

    Ok(best)
}

pub fn decompress(encoding: PayloadEncoding, data: &[u8]) -> Result<Vec<u8>> {
    match encoding {
        PayloadEncoding::Raw => Ok(data.to_vec()),
        PayloadEncoding::Zlib => {
            let mut decoder = ZlibDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| EcompError::CorruptPayload {
                    encoding: "zlib",
                    detail: e.to_string(),
                })?;
            Ok(out)
        }
        PayloadEncoding::Zstd => {
            zstd::decode_all(data).map_err(|e| EcompError::CorruptPayload {
                encoding: "zstd",
                detail: e.to_string(),
            })
        }
        PayloadEncoding::Xz => {
            let mut out = Vec::new();
            lzma_rs::xz_decompress(&mut Cursor::new(data), &mut out).map_err(|e| {
                EcompError::CorruptPayload {
                    encoding: "xz",
                    detail: e.to_string(),
                }
            })?;
            Ok(out)
        }
        PayloadEncoding::Gzip => gzip_decompress(data),
    }
}

pub fn gzip_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| EcompError::CorruptPayload {
            encoding: "gzip",
            detail: e.to_string(),
        })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_encoding_round_trips() {
        let data: Vec<u8> = b"the quick brown fox ".repeat(64);
        for encoding in [
            PayloadEncoding::Raw,
            PayloadEncoding::Zlib,
            PayloadEncoding::Zstd,
            PayloadEncoding::Xz,
        ] {
            let encoded = match encoding {
                PayloadEncoding::Raw => data.clone(),
                PayloadEncoding::Zlib => {
                    let mut z = ZlibEncoder::new(Vec::new(), Compression::default());
                    z.write_all(&data).unwrap();
                    z.finish().unwrap()
                }
                PayloadEncoding::Zstd => zstd::encode_all(data.as_slice(), 0).unwrap(),
                PayloadEncoding::Xz => {
                    let mut out = Vec::new();
                    lzma_rs::xz_compress(&mut Cursor::new(&data), &mut out).unwrap();
                    out
                }
                PayloadEncoding::Gzip => unreachable!(),
            };
            assert_eq!(decompress(encoding, &encoded).unwrap(), data);
        }
    }

    #[test]
    fn smallest_encoding_wins() {
        let data: Vec<u8> = b"ACGT".repeat(4096);
        let (encoding, encoded) = compress_smallest(&data).unwrap();
        assert_ne!(encoding, PayloadEncoding::Raw);
        assert!(encoded.len() < data.len());
        assert_eq!(decompress(encoding, &encoded).unwrap(), data);
    }

    #[test]
    fn incompressible_data_stays_raw() {
        // A short high-entropy buffer: every compressor pays framing
        // overhead it cannot win back.
        let data: Vec<u8> = (0u16..64).map(|i| (i * 151 % 251) as u8).collect();
        let (encoding, encoded) = compress_smallest(&data).unwrap();
        assert_eq!(encoding, PayloadEncoding::Raw);
        assert_eq!(encoded, data);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            PayloadEncoding::from_name("lz4"),
            Err(EcompError::UnsupportedPayloadEncoding(_))
        ));
    }
}
