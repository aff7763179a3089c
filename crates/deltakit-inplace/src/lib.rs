// crates/deltakit-inplace/src/lib.rs

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! In-place delta conversion (Burns, Long & Stockmeyer, IEEE TKDE 2003).
//!
//! A standard delta assumes the output buffer is distinct from R. To let V
//! overwrite R in a single buffer, the copy commands must run in an order
//! where no copy reads a region an earlier copy already overwrote. That
//! dependency is the **CRWI digraph**: edge `i -> j` iff copy i's read
//! interval intersects copy j's write interval. An acyclic graph schedules
//! by topological order; cycles are broken by materialising a victim copy as
//! a literal add whose bytes are read from R up front.

mod graph;

use deltakit_core::{Command, CyclePolicy, DeltaError, PlacedCommand};
use graph::{tarjan_sccs, CycleFinder};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::debug;

/// A copy with its assigned destination, the vertex payload of the CRWI graph.
#[derive(Clone, Copy, Debug)]
struct CopyInfo {
    src: usize,
    dst: usize,
    length: usize,
}

/// Convert a V-sequential command list into an in-place executable schedule:
/// copies in dependency order, then every add (original and materialised).
///
/// # Errors
/// [`DeltaError::MalformedDelta`] if a copy reads outside `r` while being
/// materialised (possible only for deltas not produced against `r`).
pub fn make_inplace(
    r: &[u8],
    cmds: &[Command],
    policy: CyclePolicy,
) -> Result<Vec<PlacedCommand>, DeltaError> {
    if cmds.is_empty() {
        return Ok(Vec::new());
    }

    // Step 1: split copies from adds, assigning destinations by prefix sum.
    let mut copies: Vec<CopyInfo> = Vec::new();
    let mut adds: Vec<(usize, Vec<u8>)> = Vec::new();
    let mut write_pos = 0usize;
    for cmd in cmds {
        match cmd {
            Command::Copy { offset, length } => {
                copies.push(CopyInfo {
                    src: *offset,
                    dst: write_pos,
                    length: *length,
                });
                write_pos += length;
            }
            Command::Add { data } => {
                adds.push((write_pos, data.clone()));
                write_pos += data.len();
            }
        }
    }

    let n = copies.len();
    if n == 0 {
        return Ok(adds
            .into_iter()
            .map(|(dst, data)| PlacedCommand::Add { dst, data })
            .collect());
    }

    // Step 2: CRWI edges.
    let (adj, mut in_deg) = build_edges(&copies);

    // Step 3: Kahn's algorithm on a (length, index) min-heap. The composite
    // key makes the schedule deterministic; when the heap runs dry with
    // vertices left, a cycle exists and the policy picks a victim.
    let mut removed = vec![false; n];
    let mut topo_order: Vec<u32> = Vec::with_capacity(n);
    let mut heap: BinaryHeap<Reverse<(usize, u32)>> = BinaryHeap::with_capacity(n);
    for (i, deg) in in_deg.iter().enumerate() {
        if *deg == 0 {
            heap.push(Reverse((copies[i].length, i as u32)));
        }
    }

    let mut processed = 0usize;
    let mut victims = 0usize;
    let mut finder = CycleFinder::new(n);

    while processed < n {
        while let Some(Reverse((_, i))) = heap.pop() {
            let iu = i as usize;
            if removed[iu] {
                continue;
            }
            removed[iu] = true;
            topo_order.push(i);
            processed += 1;
            release_successors(&adj, iu, &copies, &removed, &mut in_deg, &mut heap);
        }
        if processed >= n {
            break;
        }

        // Stalled: every remaining vertex sits on or behind a cycle.
        let victim = pick_victim(policy, &adj, &copies, &removed, &mut finder);
        let ci = copies[victim];
        let src_end = match ci.src.checked_add(ci.length) {
            Some(end) if end <= r.len() => end,
            _ => {
                return Err(DeltaError::MalformedDelta(format!(
                    "copy source {} (+{}) exceeds reference of {} bytes",
                    ci.src,
                    ci.length,
                    r.len()
                )))
            }
        };

        // Materialise the victim as a literal add, reading its bytes from R
        // before any buffer mutation can touch them.
        adds.push((ci.dst, r[ci.src..src_end].to_vec()));
        removed[victim] = true;
        processed += 1;
        victims += 1;
        release_successors(&adj, victim, &copies, &removed, &mut in_deg, &mut heap);
    }

    debug!(
        copies = topo_order.len(),
        adds = adds.len(),
        victims,
        "in-place schedule complete"
    );

    // Step 4: copies in topological order, then all adds.
    let mut result = Vec::with_capacity(topo_order.len() + adds.len());
    for &i in &topo_order {
        let ci = copies[i as usize];
        result.push(PlacedCommand::Copy {
            src: ci.src,
            dst: ci.dst,
            length: ci.length,
        });
    }
    for (dst, data) in adds {
        result.push(PlacedCommand::Add { dst, data });
    }
    Ok(result)
}

/// Build CRWI adjacency and in-degrees with a sweep over the writes.
///
/// Write intervals are disjoint, so for copy i's read interval
/// `[src, src+len)` the overlapping writes are exactly those starting inside
/// it, plus at most one starting below `src` that extends past it. Two
/// binary searches bound the range: O(n log n + E) total.
fn build_edges(copies: &[CopyInfo]) -> (Vec<Vec<u32>>, Vec<usize>) {
    let n = copies.len();
    let mut order: Vec<u32> = (0..n as u32).collect();
    order.sort_by_key(|&i| copies[i as usize].dst);
    let starts: Vec<usize> = order.iter().map(|&i| copies[i as usize].dst).collect();

    let mut adj: Vec<Vec<u32>> = vec![Vec::new(); n];
    let mut in_deg = vec![0usize; n];
    for (i, ci) in copies.iter().enumerate() {
        let read_end = ci.src + ci.length;
        let lo = starts.partition_point(|&s| s < ci.src);
        let hi = starts.partition_point(|&s| s < read_end);
        for &j in &order[lo..hi] {
            if j as usize != i {
                adj[i].push(j);
                in_deg[j as usize] += 1;
            }
        }
        if lo > 0 {
            let j = order[lo - 1];
            let cj = &copies[j as usize];
            if j as usize != i && cj.dst + cj.length > ci.src {
                adj[i].push(j);
                in_deg[j as usize] += 1;
            }
        }
    }
    (adj, in_deg)
}

/// Decrement in-degrees of `v`'s surviving successors, pushing freed ones.
fn release_successors(
    adj: &[Vec<u32>],
    v: usize,
    copies: &[CopyInfo],
    removed: &[bool],
    in_deg: &mut [usize],
    heap: &mut BinaryHeap<Reverse<(usize, u32)>>,
) {
    for &w in &adj[v] {
        let wu = w as usize;
        if !removed[wu] {
            in_deg[wu] -= 1;
            if in_deg[wu] == 0 {
                heap.push(Reverse((copies[wu].length, w)));
            }
        }
    }
}

/// Choose the copy to materialise when the schedule stalls.
///
/// `localmin` decomposes the remaining subgraph into SCCs, walks them
/// source-first, finds a concrete cycle in the first non-trivial one, and
/// picks its `(length, index)`-minimal vertex. `constant` takes the first
/// still-present vertex.
fn pick_victim(
    policy: CyclePolicy,
    adj: &[Vec<u32>],
    copies: &[CopyInfo],
    removed: &[bool],
    finder: &mut CycleFinder,
) -> usize {
    let first_remaining = || {
        removed
            .iter()
            .position(|r| !r)
            .unwrap_or_default()
    };
    match policy {
        CyclePolicy::Constant => first_remaining(),
        CyclePolicy::LocalMin => {
            let sccs = tarjan_sccs(adj, removed);
            let cycle = sccs
                .iter()
                .rev()
                .filter(|scc| scc.len() > 1)
                .find_map(|scc| finder.find_cycle(adj, removed, scc));
            cycle
                .and_then(|cyc| {
                    cyc.into_iter()
                        .min_by_key(|&c| (copies[c as usize].length, c))
                })
                .map_or_else(first_remaining, |c| c as usize)
        }
    }
}
