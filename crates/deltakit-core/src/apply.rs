// crates/deltakit-core/src/apply.rs

//! The two interpreters for placed commands.
//!
//! * [`apply`] writes into a fresh output buffer; copies read only from R.
//! * [`apply_inplace`] executes against a single buffer pre-loaded with R,
//!   using `copy_within` so overlapping copy ranges behave like `memmove`.
//!   Schedule validity (no stale reads) is the in-place converter's job.
//!
//! Both validate every command against the buffer bounds before touching it;
//! an out-of-range command means the delta is malformed, never a panic.

use crate::error::DeltaError;
use crate::types::PlacedCommand;

/// Bounds-check `start + len` against `limit`, naming the failing command.
#[inline]
fn span(start: usize, len: usize, limit: usize, what: &str) -> Result<usize, DeltaError> {
    let end = start
        .checked_add(len)
        .ok_or_else(|| DeltaError::MalformedDelta(format!("{what} range overflows")))?;
    if end > limit {
        return Err(DeltaError::MalformedDelta(format!(
            "{what} range {start}..{end} exceeds buffer of {limit} bytes"
        )));
    }
    Ok(end)
}

/// Allocate a zeroed buffer of `size` bytes, surfacing allocation failure.
fn alloc_buffer(size: usize) -> Result<Vec<u8>, DeltaError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| DeltaError::ResourceExhausted(size))?;
    buf.resize(size, 0);
    Ok(buf)
}

/// Reconstruct the version into a fresh buffer of `version_size` bytes.
///
/// # Errors
/// [`DeltaError::MalformedDelta`] if any command reads outside R or writes
/// outside the output buffer; [`DeltaError::ResourceExhausted`] if the output
/// buffer cannot be allocated.
pub fn apply(
    r: &[u8],
    cmds: &[PlacedCommand],
    version_size: usize,
) -> Result<Vec<u8>, DeltaError> {
    let mut out = alloc_buffer(version_size)?;
    for cmd in cmds {
        match cmd {
            PlacedCommand::Copy { src, dst, length } => {
                let s_end = span(*src, *length, r.len(), "copy source")?;
                let d_end = span(*dst, *length, out.len(), "copy destination")?;
                out[*dst..d_end].copy_from_slice(&r[*src..s_end]);
            }
            PlacedCommand::Add { dst, data } => {
                let d_end = span(*dst, data.len(), out.len(), "add destination")?;
                out[*dst..d_end].copy_from_slice(data);
            }
        }
    }
    Ok(out)
}

/// Reconstruct the version in a single buffer seeded with R.
///
/// The working buffer is `max(|R|, version_size)` bytes; commands execute in
/// order with `memmove` semantics for copies, and the result is truncated to
/// `version_size`.
///
/// # Errors
/// [`DeltaError::MalformedDelta`] on any out-of-range command;
/// [`DeltaError::ResourceExhausted`] if the buffer cannot be allocated.
pub fn apply_inplace(
    r: &[u8],
    cmds: &[PlacedCommand],
    version_size: usize,
) -> Result<Vec<u8>, DeltaError> {
    let buf_size = r.len().max(version_size);
    let mut buf = alloc_buffer(buf_size)?;
    buf[..r.len()].copy_from_slice(r);

    for cmd in cmds {
        match cmd {
            PlacedCommand::Copy { src, dst, length } => {
                let s_end = span(*src, *length, buf.len(), "copy source")?;
                span(*dst, *length, buf.len(), "copy destination")?;
                buf.copy_within(*src..s_end, *dst);
            }
            PlacedCommand::Add { dst, data } => {
                let d_end = span(*dst, data.len(), buf.len(), "add destination")?;
                buf[*dst..d_end].copy_from_slice(data);
            }
        }
    }

    buf.truncate(version_size);
    Ok(buf)
}
