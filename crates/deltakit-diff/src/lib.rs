// crates/deltakit-diff/src/lib.rs

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! The three differencing algorithms of Ajtai, Burns, Fagin & Long
//! (JACM 2002), sharing the Karp-Rabin fingerprint, the hash-table / splay
//! indexing structures, and (for correcting) the lookback encoding buffer.
//!
//! Shared loop invariants: `v_c` is the current seed position being
//! fingerprinted in V and `v_s <= v_c` is the start of the not-yet-emitted V
//! suffix. A fingerprint match is never sufficient on its own; every emitted
//! `Copy(r_m, ml)` has been byte-verified (`V[v_m..v_m+ml] == R[r_m..r_m+ml]`).

pub mod checkpoint;
pub mod correcting;
pub mod greedy;
pub mod lookback;
pub mod onepass;
mod stats;

pub use checkpoint::{biased_k, plan_checkpoints, CheckpointPlan};
pub use correcting::diff_correcting;
pub use greedy::diff_greedy;
pub use lookback::{LookbackBuffer, LookbackEntry};
pub use onepass::diff_onepass;

use deltakit_core::{Algorithm, Command, DeltaError, DiffOptions};

/// Run the selected differencing algorithm.
///
/// The output is a deterministic function of `(r, v, opts, algo)`; correcting
/// additionally derives its checkpoint selector from V's midpoint
/// fingerprint, itself a pure function of V.
///
/// # Errors
/// [`DeltaError::InvalidArgument`] for unusable options (see
/// [`DiffOptions::validate`]).
pub fn diff(
    algo: Algorithm,
    r: &[u8],
    v: &[u8],
    opts: &DiffOptions,
) -> Result<Vec<Command>, DeltaError> {
    match algo {
        Algorithm::Greedy => diff_greedy(r, v, opts),
        Algorithm::OnePass => diff_onepass(r, v, opts),
        Algorithm::Correcting => diff_correcting(r, v, opts),
    }
}

/// Number of `p`-byte seeds in `data` (`L = len - p + 1`, or 0).
#[inline]
#[must_use]
pub(crate) fn seed_count(len: usize, p: usize) -> usize {
    if len >= p {
        len - p + 1
    } else {
        0
    }
}

/// Longest common prefix of `v[v_m..]` and `r[r_m..]`.
#[inline]
#[must_use]
pub(crate) fn extend_forward(r: &[u8], v: &[u8], r_m: usize, v_m: usize) -> usize {
    let mut ml = 0;
    while v_m + ml < v.len() && r_m + ml < r.len() && v[v_m + ml] == r[r_m + ml] {
        ml += 1;
    }
    ml
}
