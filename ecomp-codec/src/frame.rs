use crate::error::EcompError;
use crate::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// A rectangular alignment: N rows of L single-byte ASCII symbols, each row
/// carrying a UTF-8 identifier. Row and identifier order are significant.
///
/// Construction validates the codec input contract: equal row lengths,
/// ASCII-only symbols and unique identifiers. Gap (`-`) and ambiguity
/// symbols (`N`, `X`) are ordinary alphabet members here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentFrame {
    ids: Vec<String>,
    rows: Vec<Vec<u8>>,
    alphabet: Vec<u8>,
}

impl AlignmentFrame {
    pub fn new(ids: Vec<String>, rows: Vec<Vec<u8>>) -> Result<AlignmentFrame> {
        if ids.len() != rows.len() {
            return Err(EcompError::SequenceCountMismatch {
                expected: ids.len(),
                got: rows.len(),
            });
        }

        let length = rows.first().map_or(0, |row| row.len());
        for (row, sequence) in rows.iter().enumerate() {
            if sequence.len() != length {
                return Err(EcompError::RowLengthMismatch {
                    row,
                    expected: length,
                    got: sequence.len(),
                });
            }
            for (column, &symbol) in sequence.iter().enumerate() {
                if !symbol.is_ascii() {
                    return Err(EcompError::NonAsciiSymbol {
                        row,
                        column,
                        symbol,
                    });
                }
            }
        }

        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids.iter() {
            if !seen.insert(id.as_str()) {
                return Err(EcompError::DuplicateSequenceId(id.clone()));
            }
        }

        let mut present = [false; 128];
        for sequence in rows.iter() {
            for &symbol in sequence.iter() {
                present[symbol as usize] = true;
            }
        }
        let alphabet = (0u8..128).filter(|&s| present[s as usize]).collect();

        Ok(AlignmentFrame {
            ids,
            rows,
            alphabet,
        })
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    /// Sorted unique symbol set observed in the rows.
    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    pub fn num_sequences(&self) -> usize {
        self.rows.len()
    }

    pub fn alignment_length(&self) -> usize {
        self.rows.first().map_or(0, |row| row.len())
    }

    /// SHA-256 over the concatenation of all row sequences in frame order,
    /// as a lowercase hex string.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        for sequence in self.rows.iter() {
            hasher.update(sequence);
        }
        hex::encode(hasher.finalize())
    }
}
