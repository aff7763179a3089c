// crates/deltakit-diff/src/stats.rs

//! Shared command-statistics logging for the verbose diagnostics path.

use deltakit_core::{Command, Summary};
use tracing::debug;

/// Emit command statistics at debug level: totals, coverage, and the
/// distribution of copy lengths.
pub(crate) fn log_command_stats(cmds: &[Command]) {
    let s = Summary::from_commands(cmds);
    let copy_pct = if s.total_output_bytes > 0 {
        s.copy_bytes as f64 / s.total_output_bytes as f64 * 100.0
    } else {
        0.0
    };
    debug!(
        copies = s.num_copies,
        copy_bytes = s.copy_bytes,
        adds = s.num_adds,
        add_bytes = s.add_bytes,
        copy_pct,
        output_bytes = s.total_output_bytes,
        "command stats"
    );

    let mut lens: Vec<usize> = cmds
        .iter()
        .filter_map(|c| match c {
            Command::Copy { length, .. } => Some(*length),
            Command::Add { .. } => None,
        })
        .collect();
    if lens.is_empty() {
        return;
    }
    lens.sort_unstable();
    let mean = s.copy_bytes as f64 / lens.len() as f64;
    debug!(
        regions = lens.len(),
        min = lens[0],
        max = lens[lens.len() - 1],
        mean,
        median = lens[lens.len() / 2],
        "copy length distribution"
    );
}
