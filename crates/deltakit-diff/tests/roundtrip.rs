//! End-to-end differencing invariants shared by all three algorithms.
//!
//! The central property: for all R, V, and parameters,
//! `apply(R, diff(R, V)) == V`. Scenarios below pin the concrete shapes the
//! algorithms were designed around (paper example, self-diff, transposition,
//! scattered edits) plus the binary-codec path.

use deltakit_core::{apply, place_commands, Algorithm, Command, DiffOptions, Summary};
use deltakit_diff::diff;
use deltakit_hash::content_digest;
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

const ALGOS: [Algorithm; 3] = [Algorithm::Greedy, Algorithm::OnePass, Algorithm::Correcting];

fn opts(p: usize) -> DiffOptions {
    DiffOptions {
        seed_len: p,
        table_size: 1021,
        ..DiffOptions::default()
    }
}

fn repeat(base: &[u8], count: usize) -> Vec<u8> {
    base.iter().copied().cycle().take(base.len() * count).collect()
}

fn reconstruct(algo: Algorithm, r: &[u8], v: &[u8], o: &DiffOptions) -> (Vec<Command>, Vec<u8>) {
    let cmds = diff(algo, r, v, o).unwrap();
    let total: usize = cmds.iter().map(Command::output_len).sum();
    assert_eq!(total, v.len(), "{algo:?}: command lengths must sum to |V|");
    let out = apply(r, &place_commands(&cmds), v.len()).unwrap();
    (cmds, out)
}

#[test]
fn paper_example_all_algorithms() {
    let r = b"ABCDEFGHIJKLMNOP";
    let v = b"QWIJKLMNOBCDEFGHZDEFGHIJKL";
    for algo in ALGOS {
        let (cmds, out) = reconstruct(algo, r, v, &opts(2));
        assert_eq!(out, v, "{algo:?}");
        let s = Summary::from_commands(&cmds);
        assert!(s.num_copies >= 1, "{algo:?} found no copies");
        assert!(s.num_adds >= 1, "{algo:?} found no adds");
    }
}

#[test]
fn identical_strings_produce_only_copies() {
    let data = repeat(b"The quick brown fox jumps over the lazy dog.", 10);
    for algo in ALGOS {
        let (cmds, out) = reconstruct(algo, &data, &data, &opts(2));
        assert_eq!(out, data, "{algo:?}");
        assert_eq!(
            cmds,
            vec![Command::Copy {
                offset: 0,
                length: 440
            }],
            "{algo:?} should cover V with one copy"
        );
    }
}

#[test]
fn empty_version_yields_no_commands() {
    for algo in ALGOS {
        let cmds = diff(algo, b"hello", b"", &opts(2)).unwrap();
        assert!(cmds.is_empty(), "{algo:?}");
    }
}

#[test]
fn empty_reference_yields_single_add() {
    for algo in ALGOS {
        let (cmds, out) = reconstruct(algo, b"", b"hello world", &opts(2));
        assert_eq!(out, b"hello world");
        assert_eq!(
            cmds,
            vec![Command::Add {
                data: b"hello world".to_vec()
            }],
            "{algo:?}"
        );
    }
}

#[test]
fn self_diff_of_random_bytes_is_all_copy() {
    let mut rng = StdRng::seed_from_u64(42);
    let r: Vec<u8> = (0..2000).map(|_| rng.random()).collect();
    for algo in ALGOS {
        let (cmds, out) = reconstruct(algo, &r, &r, &opts(16));
        assert_eq!(out, r, "{algo:?}");
        let s = Summary::from_commands(&cmds);
        assert_eq!(s.num_adds, 0, "{algo:?} emitted adds for V == R");
        assert_eq!(s.copy_bytes, 2000, "{algo:?}");
    }
}

#[test]
fn completely_different_strings() {
    let r: Vec<u8> = (0..=255u8).cycle().take(512).collect();
    let v: Vec<u8> = r.iter().rev().copied().collect();
    for algo in ALGOS {
        let (_, out) = reconstruct(algo, &r, &v, &opts(2));
        assert_eq!(out, v, "{algo:?}");
    }
}

#[test]
fn scattered_modifications() {
    let mut rng = StdRng::seed_from_u64(7);
    let r: Vec<u8> = (0..2000).map(|_| rng.random()).collect();
    let mut v = r.clone();
    for _ in 0..100 {
        let i = rng.random_range(0..v.len());
        v[i] = rng.random();
    }
    for algo in ALGOS {
        let (_, out) = reconstruct(algo, &r, &v, &opts(4));
        assert_eq!(out, v, "{algo:?}");
    }
}

#[test]
fn transposition_of_repeated_blocks() {
    let x = repeat(b"FIRST_BLOCK_DATA_", 10);
    let y = repeat(b"SECOND_BLOCK_DATA", 10);
    let r: Vec<u8> = x.iter().chain(y.iter()).copied().collect();
    let v: Vec<u8> = y.iter().chain(x.iter()).copied().collect();
    for algo in ALGOS {
        let (_, out) = reconstruct(algo, &r, &v, &opts(4));
        assert_eq!(out, v, "{algo:?}");
    }
}

#[test]
fn through_the_binary_codec() {
    let r = repeat(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ", 100);
    let v = repeat(b"0123EFGHIJKLMNOPQRS456ABCDEFGHIJKL789", 100);
    for algo in ALGOS {
        let cmds = diff(algo, &r, &v, &opts(4)).unwrap();
        let placed = place_commands(&cmds);
        let bytes =
            deltakit_codec::encode(&placed, false, v.len(), content_digest(&r), content_digest(&v))
                .unwrap();
        let df = deltakit_codec::decode(&bytes).unwrap();
        assert!(!df.inplace);
        df.check_reference(&r).unwrap();
        let out = apply(&r, &df.commands, df.version_size).unwrap();
        df.check_output(&out).unwrap();
        assert_eq!(out, v, "{algo:?}");
    }
}

#[test]
fn splay_indexing_roundtrips_for_every_algorithm() {
    let r = repeat(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ", 40);
    let mut v = r.clone();
    v.rotate_left(333);
    let o = DiffOptions {
        use_splay: true,
        ..opts(8)
    };
    for algo in ALGOS {
        let (_, out) = reconstruct(algo, &r, &v, &o);
        assert_eq!(out, v, "{algo:?}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    #[test]
    fn apply_of_diff_reconstructs_version(
        r in proptest::collection::vec(any::<u8>(), 0..300),
        v in proptest::collection::vec(any::<u8>(), 0..300),
        p in prop_oneof![Just(1usize), Just(2), Just(4), Just(8)],
    ) {
        for algo in ALGOS {
            let (_, out) = reconstruct(algo, &r, &v, &opts(p));
            prop_assert_eq!(&out, &v, "{:?} p={}", algo, p);
        }
    }

    #[test]
    fn low_entropy_inputs_reconstruct(
        r in proptest::collection::vec(0u8..4, 0..300),
        v in proptest::collection::vec(0u8..4, 0..300),
    ) {
        // Tiny alphabet: heavy fingerprint collisions and duplicate seeds.
        for algo in ALGOS {
            let (_, out) = reconstruct(algo, &r, &v, &opts(3));
            prop_assert_eq!(&out, &v, "{:?}", algo);
        }
    }
}
