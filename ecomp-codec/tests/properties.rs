use ecomp_codec::bitmask::{Bitmask, BitmaskMode};
use ecomp_codec::block::Block;
use ecomp_codec::huffman::HuffmanTable;
use ecomp_codec::metadata::Metadata;
use ecomp_codec::model::{bits_per_symbol, ModelSet};
use ecomp_codec::{decode, encode_with_options, AlignmentFrame, EncodeOptions};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

#[test]
fn selected_bitmask_mode_is_minimal() {
    let mut rng = StdRng::seed_from_u64(41);
    for _ in 0..500 {
        let num_rows = rng.gen_range(1..=2000);
        let density = rng.gen_range(0.0..1.0f64);
        let rows: Vec<u32> = (0..num_rows as u32)
            .filter(|_| rng.gen_bool(density))
            .collect();
        let mask = Bitmask::from_rows(&rows);

        let (mode, payload) = mask.encode().unwrap();
        for candidate in [
            BitmaskMode::Raw,
            BitmaskMode::DeltaVarint,
            BitmaskMode::ByteRle,
        ] {
            let alternative = mask.encode_mode(candidate).unwrap();
            assert!(
                payload.len() <= alternative.len(),
                "{mode:?} ({}) beaten by {candidate:?} ({}) for {} rows",
                payload.len(),
                alternative.len(),
                num_rows
            );
            // Every mode must decode back to the same mask.
            assert_eq!(
                Bitmask::decode(candidate, &alternative, num_rows).unwrap(),
                mask
            );
        }
    }
}

#[test]
fn selected_consensus_model_is_minimal() {
    let mut rng = StdRng::seed_from_u64(43);
    for _ in 0..100 {
        // A residue stream with a random alphabet size and skew.
        let alphabet_size = rng.gen_range(2..=20usize);
        let skew = rng.gen_range(1..=40u64);
        let mut frequencies: BTreeMap<u8, u64> = BTreeMap::new();
        for symbol in 0..alphabet_size {
            let base = rng.gen_range(1..=10u64);
            let count = if symbol == 0 { base * skew } else { base };
            frequencies.insert(b'a' + symbol as u8, count);
        }

        let mut residues = Vec::new();
        for (&residue, &count) in frequencies.iter() {
            residues.extend(std::iter::repeat(residue).take(count as usize));
        }
        let rows: Vec<u32> = (0..residues.len() as u32).collect();
        let blocks = vec![Block {
            run_length: 1,
            consensus: b'Z',
            mask: Bitmask::from_rows(&rows),
            residues,
        }];

        let models = ModelSet::from_blocks(&blocks).unwrap();
        let model = models.get(b'Z').unwrap();

        let counts: Vec<u64> = frequencies.values().copied().collect();
        let total: u64 = counts.iter().sum();
        let fixed_cost = total * u64::from(bits_per_symbol(alphabet_size));
        let table = HuffmanTable::from_frequencies(&counts).unwrap();
        let huffman_cost = table.encoded_bits(&counts) + 8 * alphabet_size as u64;

        assert_eq!(
            model.is_huffman(),
            huffman_cost < fixed_cost,
            "alphabet {alphabet_size}, skew {skew}"
        );
    }
}

#[test]
fn dictionary_never_hurts() {
    // Periodic column patterns repeat block-for-block, the dictionary's
    // best case. Compare raw structural payload sizes with and without it.
    let mut rng = StdRng::seed_from_u64(47);
    let period = 7usize;
    let num_rows = 24usize;
    let columns = 420usize;
    let patterns: Vec<(u8, usize, u8)> = (0..period)
        .map(|_| {
            (
                b"ACGT"[rng.gen_range(0..4)],
                rng.gen_range(0..num_rows),
                b'X',
            )
        })
        .collect();
    let rows: Vec<Vec<u8>> = (0..num_rows)
        .map(|row| {
            (0..columns)
                .map(|column| {
                    let (consensus, deviant, residue) = patterns[column % period];
                    if row == deviant && residue != consensus {
                        residue
                    } else {
                        consensus
                    }
                })
                .collect()
        })
        .collect();
    let ids = (0..num_rows).map(|i| format!("r{i}")).collect();
    let frame = AlignmentFrame::new(ids, rows).unwrap();

    let sizes: Vec<usize> = [true, false]
        .into_iter()
        .map(|with_dictionary| {
            let options = EncodeOptions {
                with_dictionary,
                with_fallback: false,
                ..EncodeOptions::default()
            };
            let encoded = encode_with_options(&frame, &options).unwrap();
            assert_eq!(decode(&encoded.archive, &encoded.metadata).unwrap(), frame);
            Metadata::from_bytes(&encoded.metadata)
                .unwrap()
                .payload_raw_bytes
                .unwrap()
        })
        .collect();
    assert!(
        sizes[0] <= sizes[1],
        "dictionary grew the payload: {} > {}",
        sizes[0],
        sizes[1]
    );
}

#[test]
fn fallback_dominates_when_chosen() {
    let mut rng = StdRng::seed_from_u64(53);
    let ids = (0..200).map(|i| format!("r{i}")).collect();
    let rows = (0..200)
        .map(|_| (0..300).map(|_| b'0' + rng.gen_range(0..64u8)).collect())
        .collect();
    let frame = AlignmentFrame::new(ids, rows).unwrap();

    let with_fallback = encode_with_options(&frame, &EncodeOptions::default()).unwrap();
    let metadata = Metadata::from_bytes(&with_fallback.metadata).unwrap();
    assert!(metadata.fallback.is_some(), "noise should trigger fallback");

    let structural = encode_with_options(
        &frame,
        &EncodeOptions {
            with_fallback: false,
            ..EncodeOptions::default()
        },
    )
    .unwrap();
    assert!(with_fallback.archive.len() < structural.archive.len());
}
