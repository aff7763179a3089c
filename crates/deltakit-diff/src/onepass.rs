// crates/deltakit-diff/src/onepass.rs

//! One-pass differencing (Ajtai et al., Section 4.1).
//!
//! R and V are scanned together. Each side's seed fingerprints land in its
//! own table, and each step cross-looks the other table for a byte-verified
//! seed match. A monotonically increasing version counter gives a *logical
//! flush* after every emitted copy without ever clearing slots: a slot is
//! live iff its version equals the current one. O(np + q) time, O(q) space.

use crate::stats::log_command_stats;
use crate::{extend_forward, seed_count};
use deltakit_core::{Command, DeltaError, DiffOptions};
use deltakit_hash::{next_prime, SeedCursor};
use deltakit_splay::SplayTree;
use tracing::debug;

/// Open-addressed slot: one record per `fp mod q` index, no probing.
#[derive(Clone, Copy, Default)]
struct Slot {
    fp: u64,
    offset: usize,
    version: u64,
    occupied: bool,
}

/// Splay value: offset plus the version that wrote it.
#[derive(Clone, Copy)]
struct TreeEntry {
    offset: usize,
    version: u64,
}

/// One side's seed table (`H_V` or `H_R`).
enum SideTable {
    Table { slots: Vec<Slot> },
    Splay(SplayTree<TreeEntry>),
}

impl SideTable {
    fn new(use_splay: bool, q: usize) -> Self {
        if use_splay {
            Self::Splay(SplayTree::new())
        } else {
            Self::Table {
                slots: vec![Slot::default(); q],
            }
        }
    }

    /// Store `(fp, offset)` unless the slot already holds a live entry
    /// (retain-existing within the current version).
    fn store(&mut self, fp: u64, offset: usize, version: u64) {
        match self {
            Self::Table { slots } => {
                let idx = (fp % slots.len() as u64) as usize;
                let slot = &mut slots[idx];
                if slot.occupied && slot.version == version {
                    return;
                }
                *slot = Slot {
                    fp,
                    offset,
                    version,
                    occupied: true,
                };
            }
            Self::Splay(tree) => {
                let fresh = TreeEntry { offset, version };
                let entry = tree.insert_or_get(fp, fresh);
                if entry.version != version {
                    *entry = fresh;
                }
            }
        }
    }

    /// Live entry for `fp` in the current version, if any.
    fn lookup(&mut self, fp: u64, version: u64) -> Option<usize> {
        match self {
            Self::Table { slots } => {
                let idx = (fp % slots.len() as u64) as usize;
                let slot = &slots[idx];
                (slot.occupied && slot.version == version && slot.fp == fp).then_some(slot.offset)
            }
            Self::Splay(tree) => tree
                .find(fp)
                .filter(|e| e.version == version)
                .map(|e| e.offset),
        }
    }
}

/// One-pass differencing of `v` against `r`.
///
/// # Errors
/// [`DeltaError::InvalidArgument`] for unusable options.
pub fn diff_onepass(r: &[u8], v: &[u8], opts: &DiffOptions) -> Result<Vec<Command>, DeltaError> {
    opts.validate()?;
    let p = opts.seed_len;
    let min_copy = opts.effective_min_copy();

    let mut commands = Vec::new();
    if v.is_empty() {
        return Ok(commands);
    }

    // Auto-size: one slot per p-byte chunk of R, never below the configured
    // floor, clamped by --max-table before prime rounding.
    let num_seeds = seed_count(r.len(), p);
    let q = next_prime(opts.table_size.max(num_seeds / p).min(opts.max_table) as u64) as usize;

    debug!(
        splay = opts.use_splay,
        q,
        r_len = r.len(),
        v_len = v.len(),
        seed_len = p,
        "onepass: starting interleaved scan"
    );

    let mut h_v = SideTable::new(opts.use_splay, q);
    let mut h_r = SideTable::new(opts.use_splay, q);

    let mut version = 0u64;
    let mut r_c = 0usize;
    let mut v_c = 0usize;
    let mut v_s = 0usize;
    let mut v_cursor = SeedCursor::new(p);
    let mut r_cursor = SeedCursor::new(p);

    let mut dbg_positions = 0usize;
    let mut dbg_lookups = 0usize;
    let mut dbg_matches = 0usize;

    loop {
        let can_v = v_c + p <= v.len();
        let can_r = r_c + p <= r.len();
        if !can_v && !can_r {
            break;
        }
        dbg_positions += 1;

        let fp_v = can_v.then(|| v_cursor.fingerprint_at(v, v_c));
        let fp_r = can_r.then(|| r_cursor.fingerprint_at(r, r_c));

        // Store before looking up, so a seed can match its own step.
        if let Some(fp) = fp_v {
            h_v.store(fp, v_c, version);
        }
        if let Some(fp) = fp_r {
            h_r.store(fp, r_c, version);
        }

        // Cross-lookup: R's seed against V's table first, then the converse.
        let mut found: Option<(usize, usize)> = None; // (r_m, v_m)
        if let Some(fp) = fp_r {
            if let Some(v_off) = counted_lookup(&mut h_v, fp, version, &mut dbg_lookups) {
                if r[r_c..r_c + p] == v[v_off..v_off + p] {
                    found = Some((r_c, v_off));
                }
            }
        }
        if found.is_none() {
            if let Some(fp) = fp_v {
                if let Some(r_off) = counted_lookup(&mut h_r, fp, version, &mut dbg_lookups) {
                    if v[v_c..v_c + p] == r[r_off..r_off + p] {
                        found = Some((r_off, v_c));
                    }
                }
            }
        }

        let Some((r_m, v_m)) = found else {
            v_c += 1;
            r_c += 1;
            continue;
        };

        let ml = extend_forward(r, v, r_m, v_m);
        if ml < min_copy {
            v_c += 1;
            r_c += 1;
            continue;
        }
        dbg_matches += 1;

        if v_s < v_m {
            commands.push(Command::Add {
                data: v[v_s..v_m].to_vec(),
            });
        }
        commands.push(Command::Copy {
            offset: r_m,
            length: ml,
        });
        v_s = v_m + ml;

        // Jump both pointers past the match; bumping the version logically
        // flushes both tables.
        v_c = v_m + ml;
        r_c = r_m + ml;
        version += 1;
    }

    if v_s < v.len() {
        commands.push(Command::Add {
            data: v[v_s..].to_vec(),
        });
    }

    let hit_pct = if dbg_lookups > 0 {
        dbg_matches as f64 / dbg_lookups as f64 * 100.0
    } else {
        0.0
    };
    debug!(
        positions = dbg_positions,
        lookups = dbg_lookups,
        matches = dbg_matches,
        hit_pct,
        "onepass: scan finished"
    );
    log_command_stats(&commands);

    Ok(commands)
}

/// Counted table probe shared by both cross-lookups.
fn counted_lookup(
    table: &mut SideTable,
    fp: u64,
    version: u64,
    dbg_lookups: &mut usize,
) -> Option<usize> {
    let hit = table.lookup(fp, version);
    if hit.is_some() {
        *dbg_lookups += 1;
    }
    hit
}

#[cfg(test)]
mod tests {
    use super::*;
    use deltakit_core::{apply, place_commands, Summary};

    fn opts(p: usize) -> DiffOptions {
        DiffOptions {
            seed_len: p,
            table_size: 1021,
            ..DiffOptions::default()
        }
    }

    fn check_roundtrip(r: &[u8], v: &[u8], o: &DiffOptions) -> Vec<Command> {
        let cmds = diff_onepass(r, v, o).unwrap();
        let out = apply(r, &place_commands(&cmds), v.len()).unwrap();
        assert_eq!(out, v, "reconstruction mismatch");
        cmds
    }

    #[test]
    fn paper_example() {
        let r = b"ABCDEFGHIJKLMNOP";
        let v = b"QWIJKLMNOBCDEFGHZDEFGHIJKL";
        let cmds = check_roundtrip(r, v, &opts(2));
        let s = Summary::from_commands(&cmds);
        assert!(s.num_copies >= 1);
        assert!(s.num_adds >= 1);
    }

    #[test]
    fn identical_input_single_copy() {
        let data: Vec<u8> = b"The quick brown fox jumps over the lazy dog."
            .iter()
            .copied()
            .cycle()
            .take(440)
            .collect();
        let cmds = check_roundtrip(&data, &data, &opts(2));
        assert_eq!(
            cmds,
            vec![Command::Copy {
                offset: 0,
                length: 440
            }]
        );
    }

    #[test]
    fn empty_version_no_commands() {
        assert!(diff_onepass(b"hello", b"", &opts(2)).unwrap().is_empty());
    }

    #[test]
    fn empty_reference_single_add() {
        let cmds = check_roundtrip(b"", b"hello world", &opts(2));
        assert_eq!(
            cmds,
            vec![Command::Add {
                data: b"hello world".to_vec()
            }]
        );
    }

    #[test]
    fn aligned_edit_roundtrip() {
        // In-band edits at matching offsets, the one-pass sweet spot.
        let r: Vec<u8> = (0..200u8).collect();
        let mut v = r.clone();
        v[40] = 0xEE;
        v[140] = 0xFF;
        let cmds = check_roundtrip(&r, &v, &opts(4));
        let s = Summary::from_commands(&cmds);
        assert!(s.num_copies >= 2);
        assert!(s.add_bytes < v.len());
    }

    #[test]
    fn transposition_roundtrip() {
        let x: Vec<u8> = b"FIRST_BLOCK_DATA_"
            .iter()
            .copied()
            .cycle()
            .take(170)
            .collect();
        let y: Vec<u8> = b"SECOND_BLOCK_DATA"
            .iter()
            .copied()
            .cycle()
            .take(170)
            .collect();
        let r: Vec<u8> = x.iter().chain(y.iter()).copied().collect();
        let v: Vec<u8> = y.iter().chain(x.iter()).copied().collect();
        check_roundtrip(&r, &v, &opts(4));
    }

    #[test]
    fn splay_variant_roundtrip() {
        let r: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let mut v = r.clone();
        v.rotate_left(97);
        let o = DiffOptions {
            use_splay: true,
            ..opts(8)
        };
        check_roundtrip(&r, &v, &o);
    }

    #[test]
    fn huge_min_copy_suppresses_copies() {
        let data = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        let o = DiffOptions {
            min_copy: Some(1000),
            ..opts(2)
        };
        let cmds = check_roundtrip(data, data, &o);
        assert!(cmds.iter().all(|c| matches!(c, Command::Add { .. })));
    }
}
