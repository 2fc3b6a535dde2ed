use crate::block::{Block, BlockPattern};
use crate::model::ModelSet;
use crate::payload::write_pattern;
use crate::prelude::*;
use byteorder::WriteBytesExt;
use std::collections::HashMap;
use std::io::Write;

/// The serialized entry count is one byte, so ids run 0..=254.
pub const MAX_DICTIONARY_ENTRIES: usize = 255;

struct DictionaryEntry {
    pattern: BlockPattern,
    /// Serialized pattern body, cached from the scoring pass.
    body: Vec<u8>,
}

/// Shared block patterns referenced by a one-byte id. Built once from a
/// frequency scan before the block stream is written, read-only afterwards.
#[derive(Default)]
pub struct Dictionary {
    entries: Vec<DictionaryEntry>,
    index: HashMap<BlockPattern, u8>,
}

impl Dictionary {
    pub fn empty() -> Dictionary {
        Dictionary::default()
    }

    /// Admit the patterns whose estimated net saving is positive, best
    /// first. A reference record costs two bytes more than its marker and
    /// run length, and the dictionary itself stores one serialized copy.
    pub fn build(blocks: &[Block], models: &ModelSet) -> Result<Dictionary> {
        let mut stats: HashMap<BlockPattern, (i64, usize)> = HashMap::new();
        for (index, block) in blocks.iter().enumerate() {
            let entry = stats.entry(block.pattern()).or_insert((0, index));
            entry.0 += 1;
        }

        let mut candidates = Vec::new();
        for (pattern, (occurrences, first_seen)) in stats {
            if occurrences < 2 {
                continue;
            }
            let mut body = Vec::new();
            write_pattern(
                pattern.consensus,
                &pattern.mask,
                &pattern.residues,
                models,
                &mut body,
            )?;
            let score = body.len() as i64 * (occurrences - 1) - 2 * occurrences;
            if score > 0 {
                candidates.push((score, first_seen, pattern, body));
            }
        }

        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        candidates.truncate(MAX_DICTIONARY_ENTRIES);

        let mut dictionary = Dictionary::default();
        for (id, (_, _, pattern, body)) in candidates.into_iter().enumerate() {
            dictionary.index.insert(pattern.clone(), id as u8);
            dictionary.entries.push(DictionaryEntry { pattern, body });
        }
        Ok(dictionary)
    }

    pub fn id_of(&self, block: &Block) -> Option<u8> {
        if self.index.is_empty() {
            return None;
        }
        self.index.get(&block.pattern()).copied()
    }

    pub fn get(&self, id: u8) -> Option<&BlockPattern> {
        self.entries.get(id as usize).map(|entry| &entry.pattern)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.entries.len() as u8)?;
        for entry in self.entries.iter() {
            writer.write_all(&entry.body)?;
        }
        Ok(())
    }

    pub fn from_reader<R: std::io::Read>(
        reader: &mut R,
        models: &ModelSet,
        num_rows: usize,
    ) -> Result<Dictionary> {
        let count = byteorder::ReadBytesExt::read_u8(reader)? as usize;
        let mut dictionary = Dictionary::default();
        for _ in 0..count {
            let pattern = crate::payload::read_pattern(reader, models, num_rows)?;
            dictionary.entries.push(DictionaryEntry {
                pattern,
                body: Vec::new(),
            });
        }
        Ok(dictionary)
    }
}
