use crate::bits::{BitReader, BitWriter};
use crate::error::EcompError;
use crate::prelude::*;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Codes longer than this are never emitted and rejected at decode.
pub const MAX_CODE_LENGTH: u8 = 15;

/// A canonical prefix code over the indices of a local alphabet.
///
/// Symbols are ordered by (code length ascending, alphabet index ascending)
/// and assigned consecutive codewords, so the whole table is reconstructible
/// from the code lengths alone.
pub struct HuffmanTable {
    lengths: Vec<u8>,
    codes: Vec<u16>,
    /// Symbol indices sorted by (length, index); decode looks symbols up here.
    order: Vec<usize>,
    first_code: [u32; MAX_CODE_LENGTH as usize + 1],
    first_index: [usize; MAX_CODE_LENGTH as usize + 1],
    count: [usize; MAX_CODE_LENGTH as usize + 1],
    max_length: u8,
}

impl HuffmanTable {
    /// Build a table from symbol frequencies. Frequencies are rescaled until
    /// the longest code fits [`MAX_CODE_LENGTH`].
    pub fn from_frequencies(frequencies: &[u64]) -> Result<HuffmanTable> {
        HuffmanTable::from_lengths(code_lengths(frequencies))
    }

    /// Rebuild a table from transmitted code lengths.
    pub fn from_lengths(lengths: Vec<u8>) -> Result<HuffmanTable> {
        if lengths.is_empty() {
            return Err(EcompError::InvalidCodeLengths("empty code length table"));
        }
        for &length in lengths.iter() {
            if length == 0 {
                return Err(EcompError::InvalidCodeLengths("zero code length"));
            }
            if length > MAX_CODE_LENGTH {
                return Err(EcompError::InvalidCodeLengths(
                    "code length exceeds 15 bits",
                ));
            }
        }

        let mut order: Vec<usize> = (0..lengths.len()).collect();
        order.sort_by_key(|&symbol| (lengths[symbol], symbol));

        let mut codes = vec![0u16; lengths.len()];
        let mut first_code = [0u32; MAX_CODE_LENGTH as usize + 1];
        let mut first_index = [0usize; MAX_CODE_LENGTH as usize + 1];
        let mut count = [0usize; MAX_CODE_LENGTH as usize + 1];

        let mut code = 0u32;
        let mut previous = 0u8;
        for (position, &symbol) in order.iter().enumerate() {
            let length = lengths[symbol];
            code <<= length - previous;
            previous = length;
            if code >> length != 0 {
                return Err(EcompError::InvalidCodeLengths(
                    "over-subscribed code lengths",
                ));
            }
            if count[length as usize] == 0 {
                first_code[length as usize] = code;
                first_index[length as usize] = position;
            }
            codes[symbol] = code as u16;
            count[length as usize] += 1;
            code += 1;
        }

        let max_length = *lengths.iter().max().unwrap();
        Ok(HuffmanTable {
            lengths,
            codes,
            order,
            first_code,
            first_index,
            count,
            max_length,
        })
    }

    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }

    /// Total bits the table needs for a stream with the given frequencies.
    pub fn encoded_bits(&self, frequencies: &[u64]) -> u64 {
        self.lengths
            .iter()
            .zip(frequencies.iter())
            .map(|(&length, &frequency)| u64::from(length) * frequency)
            .sum()
    }

    pub fn write_symbol(&self, symbol: usize, writer: &mut BitWriter) {
        writer.write_bits(u32::from(self.codes[symbol]), self.lengths[symbol]);
    }

    pub fn read_symbol(&self, reader: &mut BitReader<'_>) -> Result<usize> {
        let mut code = 0u32;
        for length in 1..=self.max_length as usize {
            code = (code << 1) | u32::from(reader.read_bit()?);
            let offset = code.wrapping_sub(self.first_code[length]) as usize;
            if offset < self.count[length] {
                return Ok(self.order[self.first_index[length] + offset]);
            }
        }
        Err(EcompError::CorruptPayload {
            encoding: "huffman",
            detail: "code exceeds maximum length".into(),
        })
    }
}

fn code_lengths(frequencies: &[u64]) -> Vec<u8> {
    if frequencies.len() < 2 {
        return vec![1; frequencies.len()];
    }
    let mut scaling = 1u64;
    loop {
        let lengths = tree_lengths(frequencies, scaling);
        if *lengths.iter().max().unwrap() <= MAX_CODE_LENGTH {
            return lengths;
        }
        // Halving the dynamic range flattens the tree.
        scaling <<= 1;
    }
}

fn tree_lengths(frequencies: &[u64], scaling: u64) -> Vec<u8> {
    let leaves = frequencies.len();
    let mut parent: Vec<usize> = vec![usize::MAX; leaves];

    // Min-heap on (frequency, subtree depth, node id); the depth tie-break
    // keeps the tree as shallow as the frequencies allow.
    let mut heap: BinaryHeap<Reverse<(u64, u8, usize)>> = frequencies
        .iter()
        .enumerate()
        .map(|(id, &frequency)| Reverse((frequency / scaling + 1, 0u8, id)))
        .collect();

    while heap.len() > 1 {
        let Reverse((freq_a, depth_a, id_a)) = heap.pop().unwrap();
        let Reverse((freq_b, depth_b, id_b)) = heap.pop().unwrap();
        let id = parent.len();
        parent[id_a] = id;
        parent[id_b] = id;
        parent.push(usize::MAX);
        heap.push(Reverse((
            freq_a + freq_b,
            depth_a.max(depth_b) + 1,
            id,
        )));
    }

    (0..leaves)
        .map(|leaf| {
            let mut length = 0u8;
            let mut node = leaf;
            while parent[node] != usize::MAX {
                length += 1;
                node = parent[node];
            }
            length
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_assignment_is_deterministic() {
        // Lengths [2, 1, 3, 3] assign b=0, a=10, c=110, d=111.
        let table = HuffmanTable::from_lengths(vec![2, 1, 3, 3]).unwrap();
        assert_eq!(table.codes, vec![0b10, 0b0, 0b110, 0b111]);
    }

    #[test]
    fn symbols_round_trip() {
        let frequencies = [90u64, 5, 3, 1, 1];
        let table = HuffmanTable::from_frequencies(&frequencies).unwrap();
        let symbols = [0usize, 1, 0, 4, 2, 0, 3, 0, 0, 1];

        let mut writer = BitWriter::new();
        for &symbol in symbols.iter() {
            table.write_symbol(symbol, &mut writer);
        }
        let bytes = writer.into_bytes();

        let rebuilt = HuffmanTable::from_lengths(table.lengths().to_vec()).unwrap();
        let mut reader = BitReader::new(&bytes);
        for &symbol in symbols.iter() {
            assert_eq!(rebuilt.read_symbol(&mut reader).unwrap(), symbol);
        }
    }

    #[test]
    fn single_symbol_uses_one_bit() {
        let table = HuffmanTable::from_frequencies(&[42]).unwrap();
        assert_eq!(table.lengths(), &[1]);
    }

    #[test]
    fn skewed_frequencies_stay_within_cap() {
        // Fibonacci-ish frequencies would want codes longer than 15 bits.
        let mut frequencies = vec![1u64; 2];
        while frequencies.len() < 40 {
            let next = frequencies[frequencies.len() - 1] + frequencies[frequencies.len() - 2];
            frequencies.push(next);
        }
        let table = HuffmanTable::from_frequencies(&frequencies).unwrap();
        assert!(*table.lengths().iter().max().unwrap() <= MAX_CODE_LENGTH);
    }

    #[test]
    fn rejects_over_subscribed_lengths() {
        assert!(matches!(
            HuffmanTable::from_lengths(vec![1, 1, 1]),
            Err(EcompError::InvalidCodeLengths(_))
        ));
    }
}
