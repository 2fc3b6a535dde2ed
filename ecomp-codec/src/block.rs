use crate::bitmask::Bitmask;
use crate::profile::ColumnProfile;

/// Longest run a single block record can describe.
pub const MAX_RUN_LENGTH: u8 = 255;

/// A maximal run of adjacent columns sharing one (consensus,
/// deviation-pattern). `residues` holds the deviating symbols in ascending
/// row order; its length always equals the mask popcount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub run_length: u8,
    pub consensus: u8,
    pub mask: Bitmask,
    pub residues: Vec<u8>,
}

/// The pattern part of a block, i.e. everything except the run length. Used
/// as the dictionary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockPattern {
    pub consensus: u8,
    pub mask: Bitmask,
    pub residues: Vec<u8>,
}

impl Block {
    pub fn from_profile(profile: &ColumnProfile, run_length: u8) -> Block {
        let rows: Vec<u32> = profile.deviations.iter().map(|d| d.row).collect();
        let residues = profile.deviations.iter().map(|d| d.residue).collect();
        Block {
            run_length,
            consensus: profile.consensus,
            mask: Bitmask::from_rows(&rows),
            residues,
        }
    }

    pub fn pattern(&self) -> BlockPattern {
        BlockPattern {
            consensus: self.consensus,
            mask: self.mask.clone(),
            residues: self.residues.clone(),
        }
    }
}

/// Collapse adjacent equivalent columns into blocks. Runs longer than 255
/// columns split into full blocks plus a remainder.
pub fn aggregate_columns<I>(profiles: I) -> Vec<Block>
where
    I: Iterator<Item = ColumnProfile>,
{
    let mut blocks = Vec::new();
    let mut current: Option<(ColumnProfile, u8)> = None;

    for profile in profiles {
        current = match current.take() {
            Some((head, run))
                if run < MAX_RUN_LENGTH
                    && head.consensus == profile.consensus
                    && head.deviations == profile.deviations =>
            {
                Some((head, run + 1))
            }
            Some((head, run)) => {
                blocks.push(Block::from_profile(&head, run));
                Some((profile, 1))
            }
            None => Some((profile, 1)),
        };
    }
    if let Some((head, run)) = current {
        blocks.push(Block::from_profile(&head, run));
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ColumnProfiles;

    fn blocks_of(rows: &[&str]) -> Vec<Block> {
        let rows: Vec<Vec<u8>> = rows.iter().map(|r| r.as_bytes().to_vec()).collect();
        aggregate_columns(ColumnProfiles::new(&rows))
    }

    #[test]
    fn constant_alignment_is_one_block() {
        let blocks = blocks_of(&["AAAA", "AAAA", "AAAA"]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].run_length, 4);
        assert_eq!(blocks[0].consensus, b'A');
        assert!(blocks[0].mask.is_empty());
        assert!(blocks[0].residues.is_empty());
    }

    #[test]
    fn deviation_change_splits_runs() {
        let blocks = blocks_of(&["AAAA", "AACA"]);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].run_length, 2);
        assert_eq!(blocks[1].run_length, 1);
        assert_eq!(blocks[1].residues, b"C");
        assert_eq!(blocks[2].run_length, 1);
    }

    #[test]
    fn long_runs_split_at_255() {
        let row = "A".repeat(600);
        let blocks = blocks_of(&[&row]);
        let runs: Vec<u8> = blocks.iter().map(|b| b.run_length).collect();
        assert_eq!(runs, vec![255, 255, 90]);
    }
}
