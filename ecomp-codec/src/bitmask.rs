use crate::error::EcompError;
use crate::prelude::*;
use crate::utils::{read_varint_usize, write_varint};

/// Per-row deviation mask. Bit i of the raw form is set iff row i deviates
/// from the block consensus; the LSB of byte 0 is row 0. Trailing zero bytes
/// are trimmed, and bits at or beyond the row count are always zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bitmask {
    bytes: Vec<u8>,
}

/// Wire encodings of a mask. The mode byte precedes the payload; the
/// smallest candidate wins, ties preferring Raw, then DeltaVarint, then
/// ByteRle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmaskMode {
    /// The trimmed raw bytes.
    Raw = 0,
    /// Set-bit count, then the first set index, then successive gaps, all
    /// varints.
    DeltaVarint = 1,
    /// (byte value, repeat count in 1..=255) pairs over the raw bytes.
    ByteRle = 2,
}

impl BitmaskMode {
    pub fn from_byte(byte: u8) -> Result<BitmaskMode> {
        match byte {
            0 => Ok(BitmaskMode::Raw),
            1 => Ok(BitmaskMode::DeltaVarint),
            2 => Ok(BitmaskMode::ByteRle),
            mode => Err(EcompError::UnknownMode {
                kind: "bitmask",
                mode,
            }),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl Bitmask {
    pub fn from_rows(rows: &[u32]) -> Bitmask {
        let mut bytes = Vec::new();
        for &row in rows {
            let byte = (row / 8) as usize;
            if byte >= bytes.len() {
                bytes.resize(byte + 1, 0);
            }
            bytes[byte] |= 1 << (row % 8);
        }
        Bitmask { bytes }
    }

    /// Set row indices in ascending order.
    pub fn set_rows(&self) -> Vec<u32> {
        let mut rows = Vec::with_capacity(self.popcount());
        for (byte, &value) in self.bytes.iter().enumerate() {
            for bit in 0..8 {
                if value & (1 << bit) != 0 {
                    rows.push((byte * 8 + bit) as u32);
                }
            }
        }
        rows
    }

    pub fn popcount(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encode under every mode and keep the shortest payload.
    pub fn encode(&self) -> Result<(BitmaskMode, Vec<u8>)> {
        let mut best = (BitmaskMode::Raw, self.encode_mode(BitmaskMode::Raw)?);
        for mode in [BitmaskMode::DeltaVarint, BitmaskMode::ByteRle] {
            let candidate = self.encode_mode(mode)?;
            if candidate.len() < best.1.len() {
                best = (mode, candidate);
            }
        }
        Ok(best)
    }

    pub fn encode_mode(&self, mode: BitmaskMode) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        match mode {
            BitmaskMode::Raw => payload.extend_from_slice(&self.bytes),
            BitmaskMode::DeltaVarint => {
                let rows = self.set_rows();
                write_varint(&mut payload, rows.len() as u64)?;
                let mut previous = 0u32;
                for (i, &row) in rows.iter().enumerate() {
                    let delta = if i == 0 { row } else { row - previous };
                    write_varint(&mut payload, u64::from(delta))?;
                    previous = row;
                }
            }
            BitmaskMode::ByteRle => {
                let mut i = 0;
                while i < self.bytes.len() {
                    let value = self.bytes[i];
                    let mut run = 1usize;
                    while run < 255 && i + run < self.bytes.len() && self.bytes[i + run] == value
                    {
                        run += 1;
                    }
                    payload.push(value);
                    payload.push(run as u8);
                    i += run;
                }
            }
        }
        Ok(payload)
    }

    pub fn decode(mode: BitmaskMode, payload: &[u8], num_rows: usize) -> Result<Bitmask> {
        let mut bytes = match mode {
            BitmaskMode::Raw => payload.to_vec(),
            BitmaskMode::DeltaVarint => {
                let mut reader = payload;
                let count = read_varint_usize(&mut reader)?;
                if count > num_rows {
                    return Err(EcompError::DeviationCountMismatch {
                        expected: num_rows,
                        got: count,
                    });
                }
                let mut rows = Vec::with_capacity(count);
                let mut position = 0u64;
                for i in 0..count {
                    let delta = crate::utils::read_varint(&mut reader)?;
                    if i > 0 && delta == 0 {
                        return Err(EcompError::CorruptPayload {
                            encoding: "bitmask",
                            detail: "zero gap in delta stream".into(),
                        });
                    }
                    position = position.checked_add(delta).ok_or(EcompError::CorruptPayload {
                        encoding: "bitmask",
                        detail: "delta overflows the row range".into(),
                    })?;
                    if position >= num_rows as u64 {
                        return Err(EcompError::RowOutOfRange {
                            row: position.min(u64::from(u32::MAX)) as u32,
                            rows: num_rows,
                        });
                    }
                    rows.push(position as u32);
                }
                if !reader.is_empty() {
                    return Err(EcompError::TrailingData("bitmask delta payload"));
                }
                return Ok(Bitmask::from_rows(&rows));
            }
            BitmaskMode::ByteRle => {
                if payload.len() % 2 != 0 {
                    return Err(EcompError::Truncated("bitmask rle payload"));
                }
                let mut bytes = Vec::new();
                for pair in payload.chunks_exact(2) {
                    let (value, run) = (pair[0], pair[1]);
                    if run == 0 {
                        return Err(EcompError::CorruptPayload {
                            encoding: "bitmask",
                            detail: "zero repeat count".into(),
                        });
                    }
                    bytes.extend(std::iter::repeat(value).take(run as usize));
                }
                bytes
            }
        };

        // Every set bit must name a valid row.
        for (byte, &value) in bytes.iter().enumerate() {
            for bit in 0..8 {
                let row = byte * 8 + bit;
                if value & (1 << bit) != 0 && row >= num_rows {
                    return Err(EcompError::RowOutOfRange {
                        row: row as u32,
                        rows: num_rows,
                    });
                }
            }
        }
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        Ok(Bitmask { bytes })
    }
}
