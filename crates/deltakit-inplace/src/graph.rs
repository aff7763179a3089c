// crates/deltakit-inplace/src/graph.rs

//! Graph machinery for cycle breaking: strongly connected components and a
//! cycle finder over the remaining (non-removed) CRWI subgraph.

/// Iterative Tarjan SCC decomposition restricted to non-removed vertices.
///
/// Components are emitted in reverse topological order of the condensation
/// (every component before the components that can reach it); callers wanting
/// source-first order iterate the result backwards.
pub(crate) fn tarjan_sccs(adj: &[Vec<u32>], removed: &[bool]) -> Vec<Vec<u32>> {
    const UNVISITED: usize = usize::MAX;
    let n = adj.len();
    let mut index = vec![UNVISITED; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<u32> = Vec::new();
    let mut frames: Vec<(u32, usize)> = Vec::new();
    let mut sccs: Vec<Vec<u32>> = Vec::new();
    let mut next_index = 0usize;

    for start in 0..n {
        if removed[start] || index[start] != UNVISITED {
            continue;
        }
        index[start] = next_index;
        low[start] = next_index;
        next_index += 1;
        stack.push(start as u32);
        on_stack[start] = true;
        frames.push((start as u32, 0));

        while let Some(frame) = frames.last_mut() {
            let v = frame.0 as usize;
            if frame.1 < adj[v].len() {
                let w = adj[v][frame.1] as usize;
                frame.1 += 1;
                if removed[w] {
                    continue;
                }
                if index[w] == UNVISITED {
                    index[w] = next_index;
                    low[w] = next_index;
                    next_index += 1;
                    stack.push(w as u32);
                    on_stack[w] = true;
                    frames.push((w as u32, 0));
                } else if on_stack[w] {
                    low[v] = low[v].min(index[w]);
                }
            } else {
                frames.pop();
                if let Some(parent) = frames.last() {
                    let p = parent.0 as usize;
                    low[p] = low[p].min(low[v]);
                }
                if low[v] == index[v] {
                    let mut comp = Vec::new();
                    loop {
                        let Some(w) = stack.pop() else { break };
                        on_stack[w as usize] = false;
                        comp.push(w);
                        if w as usize == v {
                            break;
                        }
                    }
                    sccs.push(comp);
                }
            }
        }
    }
    sccs
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Done,
}

/// Three-colour iterative DFS cycle finder.
///
/// `Done` marks persist across calls: a vertex fully explored without a
/// cycle stays cycle-free as victims are removed, since removal only deletes
/// edges. `Grey` marks are transient and reset before every return.
pub(crate) struct CycleFinder {
    colour: Vec<Colour>,
}

impl CycleFinder {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            colour: vec![Colour::White; n],
        }
    }

    /// Search for a cycle reachable from `starts`, skipping removed and done
    /// vertices. Returns the cycle's vertices in path order.
    pub(crate) fn find_cycle(
        &mut self,
        adj: &[Vec<u32>],
        removed: &[bool],
        starts: &[u32],
    ) -> Option<Vec<u32>> {
        for &s in starts {
            let su = s as usize;
            if removed[su] || self.colour[su] != Colour::White {
                continue;
            }

            // Parallel stacks: `path` holds the grey vertices in DFS order,
            // `frames` the per-vertex edge progress.
            let mut path: Vec<u32> = vec![s];
            let mut frames: Vec<(u32, usize)> = vec![(s, 0)];
            self.colour[su] = Colour::Grey;

            while let Some(frame) = frames.last_mut() {
                let v = frame.0 as usize;
                if frame.1 < adj[v].len() {
                    let w = adj[v][frame.1] as usize;
                    frame.1 += 1;
                    if removed[w] {
                        continue;
                    }
                    match self.colour[w] {
                        Colour::Done => {}
                        Colour::Grey => {
                            // Back edge: the cycle is the path suffix from w.
                            let pos = path
                                .iter()
                                .position(|&x| x as usize == w)
                                .unwrap_or_default();
                            let cycle = path[pos..].to_vec();
                            for &x in &path {
                                if self.colour[x as usize] == Colour::Grey {
                                    self.colour[x as usize] = Colour::White;
                                }
                            }
                            return Some(cycle);
                        }
                        Colour::White => {
                            self.colour[w] = Colour::Grey;
                            path.push(w as u32);
                            frames.push((w as u32, 0));
                        }
                    }
                } else {
                    self.colour[v] = Colour::Done;
                    frames.pop();
                    path.pop();
                }
            }
        }
        None
    }
}
