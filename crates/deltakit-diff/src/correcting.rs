// crates/deltakit-diff/src/correcting.rs

//! Correcting 1.5-pass differencing with fingerprint checkpointing
//! (Ajtai et al., Sections 7 and 8).
//!
//! The build phase indexes only *checkpointed* seeds of R (those whose
//! footprint `(fp mod |F|) mod m` equals the biased selector `k`), so the
//! table fits any reference size. The scan phase extends matches both
//! forward and **backward**; a match reaching into the already-encoded prefix
//! triggers *tail correction* on the lookback buffer: wholly-covered tail
//! entries are absorbed, a straddling add is trimmed, and one combined copy
//! replaces them.

use crate::checkpoint::{biased_k, plan_checkpoints, CheckpointPlan};
use crate::lookback::{LookbackBuffer, LookbackEntry};
use crate::stats::log_command_stats;
use crate::{extend_forward, seed_count};
use deltakit_core::{Command, DeltaError, DiffOptions};
use deltakit_hash::{RollingHash, SeedCursor};
use deltakit_splay::SplayTree;
use tracing::debug;

/// First-found slot: written at most once per run.
#[derive(Clone, Copy, Default)]
struct Slot {
    fp: u64,
    offset: usize,
    occupied: bool,
}

/// Checkpointed-seed index over R.
enum SeedIndex {
    Table { slots: Vec<Slot> },
    Splay(SplayTree<(u64, usize)>),
}

/// Probe outcome, distinguished for the scan diagnostics.
enum Probe {
    Hit(usize),
    FingerprintMismatch,
    Empty,
}

impl SeedIndex {
    fn new(use_splay: bool, cap: usize) -> Self {
        if use_splay {
            Self::Splay(SplayTree::new())
        } else {
            Self::Table {
                slots: vec![Slot::default(); cap],
            }
        }
    }

    /// Insert `(fp, offset)` under first-found policy. Returns `true` when
    /// the entry was stored, `false` when an earlier seed kept the slot.
    fn insert_first(&mut self, plan: &CheckpointPlan, fp: u64, f: u64, offset: usize) -> bool {
        match self {
            Self::Table { slots } => {
                let i = plan.slot(f);
                if i >= slots.len() {
                    return false;
                }
                if slots[i].occupied {
                    return false;
                }
                slots[i] = Slot {
                    fp,
                    offset,
                    occupied: true,
                };
                true
            }
            Self::Splay(tree) => tree.insert_or_get(fp, (fp, offset)).1 == offset,
        }
    }

    /// Probe for a stored seed whose full fingerprint equals `fp`.
    fn probe(&mut self, plan: &CheckpointPlan, fp: u64, f: u64) -> Probe {
        match self {
            Self::Table { slots } => {
                let i = plan.slot(f);
                if i >= slots.len() || !slots[i].occupied {
                    return Probe::Empty;
                }
                if slots[i].fp == fp {
                    Probe::Hit(slots[i].offset)
                } else {
                    Probe::FingerprintMismatch
                }
            }
            Self::Splay(tree) => match tree.find(fp) {
                Some(&mut (_, offset)) => Probe::Hit(offset),
                None => Probe::Empty,
            },
        }
    }
}

/// Correcting differencing of `v` against `r`.
///
/// # Errors
/// [`DeltaError::InvalidArgument`] for unusable options.
pub fn diff_correcting(r: &[u8], v: &[u8], opts: &DiffOptions) -> Result<Vec<Command>, DeltaError> {
    opts.validate()?;
    let p = opts.seed_len;
    let min_copy = opts.effective_min_copy();

    let mut commands = Vec::new();
    if v.is_empty() {
        return Ok(commands);
    }

    let num_seeds = seed_count(r.len(), p);
    let plan = plan_checkpoints(num_seeds, p, opts.table_size, opts.max_table);
    let k = biased_k(v, p, &plan);

    let expected_fill = num_seeds as u64 / plan.m;
    debug!(
        splay = opts.use_splay,
        cap = plan.cap,
        f_size = plan.f_size,
        m = plan.m,
        k,
        expected_fill,
        "correcting: checkpoint parameters"
    );

    // Build phase: index R's checkpointed seeds, first-found.
    let mut index = SeedIndex::new(opts.use_splay, plan.cap);
    let mut dbg_passed = 0usize;
    let mut dbg_stored = 0usize;
    if num_seeds > 0 {
        let mut rh = RollingHash::new(r, 0, p);
        for a in 0..num_seeds {
            if a > 0 {
                rh.roll(r[a - 1], r[a + p - 1]);
            }
            let fp = rh.value();
            let f = plan.footprint(fp);
            if !plan.passes(f, k) {
                continue;
            }
            dbg_passed += 1;
            if index.insert_first(&plan, fp, f, a) {
                dbg_stored += 1;
            }
        }
    }
    let occupancy_pct = if plan.cap > 0 {
        dbg_stored as f64 / plan.cap as f64 * 100.0
    } else {
        0.0
    };
    debug!(
        seeds = num_seeds,
        passed = dbg_passed,
        stored = dbg_stored,
        collisions = dbg_passed - dbg_stored,
        occupancy_pct,
        "correcting: build finished"
    );

    // Scan phase with tail correction.
    let mut buf = LookbackBuffer::new(opts.buf_cap);
    let mut v_c = 0usize;
    let mut v_s = 0usize;
    let mut cursor = SeedCursor::new(p);

    let mut dbg_checkpoints = 0usize;
    let mut dbg_matches = 0usize;
    let mut dbg_fp_mismatch = 0usize;
    let mut dbg_byte_mismatch = 0usize;

    // Displaced heads commit to the output stream; dummies just vanish.
    macro_rules! push_buffered {
        ($entry:expr) => {
            if let Some(old) = buf.push_back($entry) {
                if !old.dummy {
                    commands.push(old.cmd);
                }
            }
        };
    }

    while v_c + p <= v.len() {
        let fp_v = cursor.fingerprint_at(v, v_c);
        let f_v = plan.footprint(fp_v);
        if !plan.passes(f_v, k) {
            v_c += 1;
            continue;
        }
        dbg_checkpoints += 1;

        let r_offset = match index.probe(&plan, fp_v, f_v) {
            Probe::Hit(offset) => {
                if r[offset..offset + p] == v[v_c..v_c + p] {
                    offset
                } else {
                    dbg_byte_mismatch += 1;
                    v_c += 1;
                    continue;
                }
            }
            Probe::FingerprintMismatch => {
                dbg_fp_mismatch += 1;
                v_c += 1;
                continue;
            }
            Probe::Empty => {
                v_c += 1;
                continue;
            }
        };
        dbg_matches += 1;

        // Extend forward past the seed and backward before it; backward
        // extension may cross v_s into the already-encoded prefix.
        let fwd = p + extend_forward(r, v, r_offset + p, v_c + p);
        let mut bwd = 0usize;
        while v_c > bwd && r_offset > bwd && v[v_c - bwd - 1] == r[r_offset - bwd - 1] {
            bwd += 1;
        }

        let v_m = v_c - bwd;
        let r_m = r_offset - bwd;
        let ml = bwd + fwd;
        let match_end = v_m + ml;

        if ml < min_copy {
            v_c += 1;
            continue;
        }

        if v_s <= v_m {
            // (a) The match lies entirely in the unencoded suffix.
            if v_s < v_m {
                push_buffered!(LookbackEntry::new(
                    v_s,
                    v_m,
                    Command::Add {
                        data: v[v_s..v_m].to_vec(),
                    },
                ));
            }
            push_buffered!(LookbackEntry::new(
                v_m,
                match_end,
                Command::Copy {
                    offset: r_m,
                    length: ml,
                },
            ));
            v_s = match_end;
        } else {
            // (b) Tail correction: the match reaches back into the encoded
            // prefix. Absorb wholly-covered tail entries, trim a straddling
            // add, then emit one combined copy.
            let mut effective_start = v_s;
            loop {
                let Some(tail) = buf.back() else { break };
                if tail.dummy {
                    buf.pop_back();
                    continue;
                }
                if tail.v_start >= v_m && tail.v_end <= match_end {
                    effective_start = effective_start.min(tail.v_start);
                    buf.pop_back();
                    continue;
                }
                if tail.v_end > v_m && tail.v_start < v_m {
                    if matches!(tail.cmd, Command::Add { .. }) {
                        let keep = v_m - tail.v_start;
                        if let Some(t) = buf.back_mut() {
                            if let Command::Add { data } = &mut t.cmd {
                                data.truncate(keep);
                            }
                            t.v_end = v_m;
                        }
                        effective_start = effective_start.min(v_m);
                    }
                    // A straddling copy is not reclaimed.
                    break;
                }
                break;
            }

            let adj = effective_start - v_m;
            let new_len = match_end - effective_start;
            if new_len > 0 {
                push_buffered!(LookbackEntry::new(
                    effective_start,
                    match_end,
                    Command::Copy {
                        offset: r_m + adj,
                        length: new_len,
                    },
                ));
            }
            v_s = match_end;
        }

        v_c = match_end;
    }

    // Flush: commit surviving buffer entries, then the trailing add.
    for entry in buf.drain() {
        if !entry.dummy {
            commands.push(entry.cmd);
        }
    }
    if v_s < v.len() {
        commands.push(Command::Add {
            data: v[v_s..].to_vec(),
        });
    }

    let v_seeds = seed_count(v.len(), p);
    debug!(
        v_positions = v_seeds,
        checkpoints = dbg_checkpoints,
        matches = dbg_matches,
        fp_collisions = dbg_fp_mismatch,
        byte_mismatches = dbg_byte_mismatch,
        "correcting: scan finished"
    );
    log_command_stats(&commands);

    Ok(commands)
}
