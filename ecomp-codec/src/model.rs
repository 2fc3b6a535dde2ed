use crate::bits::{BitReader, BitWriter};
use crate::block::Block;
use crate::error::EcompError;
use crate::huffman::HuffmanTable;
use crate::prelude::*;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{Read, Write};

const MODE_FIXED: u8 = 0;
const MODE_HUFFMAN: u8 = 1;

/// ceil(log2(n)) clamped to [1, 8].
pub fn bits_per_symbol(n: usize) -> u8 {
    let bits = (usize::BITS - n.saturating_sub(1).leading_zeros()) as u8;
    bits.clamp(1, 8)
}

/// How the residues of one consensus are coded.
pub enum SymbolCoder {
    /// Alphabet indices packed at a fixed width, MSB first.
    Fixed { bits: u8 },
    /// Canonical Huffman codes, MSB first.
    Huffman(HuffmanTable),
}

/// The symbol model of a single consensus byte: its local alphabet (every
/// residue ever paired with this consensus, sorted) plus the cheaper of the
/// two coders for the observed residue stream.
pub struct ConsensusModel {
    pub consensus: u8,
    alphabet: Vec<u8>,
    coder: SymbolCoder,
}

impl ConsensusModel {
    fn build(consensus: u8, frequencies: &BTreeMap<u8, u64>) -> Result<ConsensusModel> {
        let alphabet: Vec<u8> = frequencies.keys().copied().collect();
        let counts: Vec<u64> = frequencies.values().copied().collect();
        let total: u64 = counts.iter().sum();

        let fixed_bits = bits_per_symbol(alphabet.len());
        let fixed_cost = total * u64::from(fixed_bits);

        let table = HuffmanTable::from_frequencies(&counts)?;
        // The Huffman side also pays for shipping one length byte per symbol.
        let huffman_cost = table.encoded_bits(&counts) + 8 * alphabet.len() as u64;

        let coder = if huffman_cost < fixed_cost {
            SymbolCoder::Huffman(table)
        } else {
            SymbolCoder::Fixed { bits: fixed_bits }
        };
        Ok(ConsensusModel {
            consensus,
            alphabet,
            coder,
        })
    }

    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    pub fn is_huffman(&self) -> bool {
        matches!(self.coder, SymbolCoder::Huffman(_))
    }

    fn symbol_index(&self, residue: u8) -> Result<usize> {
        self.alphabet
            .binary_search(&residue)
            .map_err(|_| EcompError::ResidueOutsideAlphabet(self.consensus))
    }

    pub fn encode_residues(&self, residues: &[u8]) -> Result<Vec<u8>> {
        let mut writer = BitWriter::new();
        for &residue in residues {
            let symbol = self.symbol_index(residue)?;
            match &self.coder {
                SymbolCoder::Fixed { bits } => writer.write_bits(symbol as u32, *bits),
                SymbolCoder::Huffman(table) => table.write_symbol(symbol, &mut writer),
            }
        }
        Ok(writer.into_bytes())
    }

    pub fn decode_residues(&self, payload: &[u8], count: usize) -> Result<Vec<u8>> {
        let mut reader = BitReader::new(payload);
        let mut residues = Vec::with_capacity(count);
        for _ in 0..count {
            let symbol = match &self.coder {
                SymbolCoder::Fixed { bits } => reader.read_bits(*bits)? as usize,
                SymbolCoder::Huffman(table) => table.read_symbol(&mut reader)?,
            };
            let residue = *self
                .alphabet
                .get(symbol)
                .ok_or(EcompError::ResidueOutsideAlphabet(self.consensus))?;
            residues.push(residue);
        }
        Ok(residues)
    }
}

impl Encode for ConsensusModel {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.consensus)?;
        match &self.coder {
            SymbolCoder::Fixed { bits } => {
                writer.write_u8(MODE_FIXED)?;
                writer.write_u8(self.alphabet.len() as u8)?;
                writer.write_all(&self.alphabet)?;
                writer.write_u8(*bits)?;
            }
            SymbolCoder::Huffman(table) => {
                writer.write_u8(MODE_HUFFMAN)?;
                writer.write_u8(self.alphabet.len() as u8)?;
                writer.write_all(&self.alphabet)?;
                writer.write_all(table.lengths())?;
            }
        }
        Ok(())
    }
}

impl Decode for ConsensusModel {
    fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let consensus = reader.read_u8()?;
        let mode = reader.read_u8()?;
        let size = reader.read_u8()? as usize;
        if size == 0 {
            return Err(EcompError::InvalidModel {
                consensus,
                detail: "empty local alphabet",
            });
        }
        let mut alphabet = vec![0u8; size];
        reader.read_exact(&mut alphabet)?;
        if !alphabet.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(EcompError::InvalidModel {
                consensus,
                detail: "local alphabet is not sorted",
            });
        }

        let coder = match mode {
            MODE_FIXED => {
                let bits = reader.read_u8()?;
                if bits == 0 || bits > 8 {
                    return Err(EcompError::InvalidModel {
                        consensus,
                        detail: "bits per symbol out of range",
                    });
                }
                SymbolCoder::Fixed { bits }
            }
            MODE_HUFFMAN => {
                let mut lengths = vec![0u8; size];
                reader.read_exact(&mut lengths)?;
                SymbolCoder::Huffman(HuffmanTable::from_lengths(lengths)?)
            }
            mode => {
                return Err(EcompError::UnknownMode {
                    kind: "consensus model",
                    mode,
                })
            }
        };

        Ok(ConsensusModel {
            consensus,
            alphabet,
            coder,
        })
    }
}

/// Every consensus model of one alignment, ascending by consensus byte.
#[derive(Default)]
pub struct ModelSet {
    models: Vec<ConsensusModel>,
}

impl ModelSet {
    /// Tally the block-level residue stream and pick a coder per consensus.
    /// A block contributes its residue array once, which is exactly what the
    /// payload serializes.
    pub fn from_blocks(blocks: &[Block]) -> Result<ModelSet> {
        let mut frequencies: BTreeMap<u8, BTreeMap<u8, u64>> = BTreeMap::new();
        for block in blocks {
            for &residue in block.residues.iter() {
                *frequencies
                    .entry(block.consensus)
                    .or_default()
                    .entry(residue)
                    .or_insert(0) += 1;
            }
        }

        let models = frequencies
            .iter()
            .map(|(&consensus, counts)| ConsensusModel::build(consensus, counts))
            .collect::<Result<Vec<_>>>()?;
        Ok(ModelSet { models })
    }

    pub fn get(&self, consensus: u8) -> Option<&ConsensusModel> {
        self.models
            .binary_search_by_key(&consensus, |model| model.consensus)
            .ok()
            .map(|index| &self.models[index])
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn models(&self) -> &[ConsensusModel] {
        &self.models
    }
}

impl Encode for ModelSet {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.models.len() as u8)?;
        for model in self.models.iter() {
            model.write_to(writer)?;
        }
        Ok(())
    }
}

impl Decode for ModelSet {
    fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let count = reader.read_u8()? as usize;
        let mut models: Vec<ConsensusModel> = Vec::with_capacity(count);
        for _ in 0..count {
            let model = ConsensusModel::from_reader(reader)?;
            if let Some(last) = models.last() {
                if last.consensus >= model.consensus {
                    return Err(EcompError::InvalidModel {
                        consensus: model.consensus,
                        detail: "model table is not sorted by consensus",
                    });
                }
            }
            models.push(model);
        }
        Ok(ModelSet { models })
    }
}
