// crates/deltakit-core/src/types.rs

//! Canonical types used across the deltakit workspace.
//!
//! These live in `deltakit-core` and are re-exported at the crate root so
//! other crates import via `deltakit_core::Command`, `deltakit_core::Summary`,
//! etc.

use crate::error::DeltaError;
use serde::{Deserialize, Serialize};

/// Default seed (window) length in bytes.
pub const DEFAULT_SEED_LEN: usize = 16;

/// Default hash-table size floor: the largest prime below `2^20`.
pub const DEFAULT_TABLE_SIZE: usize = 1_048_573;

/// Default upper clamp on auto-sized tables: the largest prime below `2^24`.
pub const DEFAULT_MAX_TABLE_SIZE: usize = 16_777_213;

/// Default lookback-buffer capacity for the correcting algorithm.
pub const DEFAULT_BUF_CAP: usize = 256;

/// Which differencing algorithm to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Optimal greedy matching, O(|V|·|R|) worst case.
    Greedy,
    /// Linear-time interleaved scan with dual tables.
    OnePass,
    /// 1.5-pass scan with checkpointing and tail correction.
    Correcting,
}

/// Victim-selection policy when the in-place converter must break a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Materialise the cycle vertex with the smallest `(length, index)`.
    LocalMin,
    /// Materialise the first still-present vertex.
    Constant,
}

/// A delta command in V-sequential order.
///
/// Concatenating command outputs in order yields V; the sum of output lengths
/// equals `|V|`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Copy `length` bytes from the reference at `offset`.
    Copy {
        /// Byte offset into R.
        offset: usize,
        /// Number of bytes to copy.
        length: usize,
    },
    /// Append literal bytes. The command owns its payload.
    Add {
        /// Literal bytes to emit.
        data: Vec<u8>,
    },
}

impl Command {
    /// Bytes this command contributes to the output.
    #[inline]
    #[must_use]
    pub fn output_len(&self) -> usize {
        match self {
            Self::Copy { length, .. } => *length,
            Self::Add { data } => data.len(),
        }
    }
}

/// A [`Command`] with its explicit destination offset in the output buffer.
///
/// Destinations of a placed command list partition `[0, |V|)` with no
/// overlap; `unplace_commands` recovers V-sequential order by sorting on
/// `dst`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacedCommand {
    /// Copy `length` bytes from `src` in the reference to `dst` in the output.
    Copy {
        /// Byte offset into R.
        src: usize,
        /// Byte offset into the output buffer.
        dst: usize,
        /// Number of bytes to copy.
        length: usize,
    },
    /// Write literal bytes at `dst`.
    Add {
        /// Byte offset into the output buffer.
        dst: usize,
        /// Literal bytes to emit.
        data: Vec<u8>,
    },
}

impl PlacedCommand {
    /// Destination offset of this command.
    #[inline]
    #[must_use]
    pub fn dst(&self) -> usize {
        match self {
            Self::Copy { dst, .. } | Self::Add { dst, .. } => *dst,
        }
    }

    /// Bytes this command writes.
    #[inline]
    #[must_use]
    pub fn output_len(&self) -> usize {
        match self {
            Self::Copy { length, .. } => *length,
            Self::Add { data, .. } => data.len(),
        }
    }
}

/// Tuning parameters for the differencing algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffOptions {
    /// Seed length `p` in bytes.
    pub seed_len: usize,
    /// Hash-table size floor `q`; auto-sizing never goes below this.
    pub table_size: usize,
    /// Upper clamp applied to every auto-sized table.
    pub max_table: usize,
    /// Lookback-buffer capacity for the correcting algorithm.
    pub buf_cap: usize,
    /// Index with the splay tree instead of a fixed-size hash table.
    pub use_splay: bool,
    /// Minimum accepted copy length; `None` means the seed length.
    pub min_copy: Option<usize>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            seed_len: DEFAULT_SEED_LEN,
            table_size: DEFAULT_TABLE_SIZE,
            max_table: DEFAULT_MAX_TABLE_SIZE,
            buf_cap: DEFAULT_BUF_CAP,
            use_splay: false,
            min_copy: None,
        }
    }
}

impl DiffOptions {
    /// Shortest copy the algorithms may emit: the explicit `min_copy` when
    /// configured, otherwise the seed length.
    #[inline]
    #[must_use]
    pub fn effective_min_copy(&self) -> usize {
        self.min_copy.map_or(self.seed_len, |m| m.max(self.seed_len))
    }

    /// Reject unusable parameter combinations.
    ///
    /// # Errors
    /// [`DeltaError::InvalidArgument`] when the seed length, table floor, or
    /// buffer capacity is zero.
    pub fn validate(&self) -> Result<(), DeltaError> {
        if self.seed_len == 0 {
            return Err(DeltaError::InvalidArgument(
                "seed length must be >= 1".into(),
            ));
        }
        if self.table_size == 0 {
            return Err(DeltaError::InvalidArgument(
                "table size must be >= 1".into(),
            ));
        }
        if self.buf_cap == 0 {
            return Err(DeltaError::InvalidArgument(
                "lookback buffer capacity must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// Aggregate statistics over a command list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Total commands.
    pub num_commands: usize,
    /// Copy commands.
    pub num_copies: usize,
    /// Add commands.
    pub num_adds: usize,
    /// Bytes produced by copies.
    pub copy_bytes: usize,
    /// Bytes produced by adds (literal payload).
    pub add_bytes: usize,
    /// Total output bytes (`copy_bytes + add_bytes`).
    pub total_output_bytes: usize,
}

impl Summary {
    /// Summarise a V-sequential command list.
    #[must_use]
    pub fn from_commands(cmds: &[Command]) -> Self {
        let mut s = Self {
            num_commands: cmds.len(),
            ..Self::default()
        };
        for cmd in cmds {
            match cmd {
                Command::Copy { length, .. } => {
                    s.num_copies += 1;
                    s.copy_bytes += length;
                }
                Command::Add { data } => {
                    s.num_adds += 1;
                    s.add_bytes += data.len();
                }
            }
        }
        s.total_output_bytes = s.copy_bytes + s.add_bytes;
        s
    }

    /// Summarise a placed command list.
    #[must_use]
    pub fn from_placed(cmds: &[PlacedCommand]) -> Self {
        let mut s = Self {
            num_commands: cmds.len(),
            ..Self::default()
        };
        for cmd in cmds {
            match cmd {
                PlacedCommand::Copy { length, .. } => {
                    s.num_copies += 1;
                    s.copy_bytes += length;
                }
                PlacedCommand::Add { data, .. } => {
                    s.num_adds += 1;
                    s.add_bytes += data.len();
                }
            }
        }
        s.total_output_bytes = s.copy_bytes + s.add_bytes;
        s
    }
}
