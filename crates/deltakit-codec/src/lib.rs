// crates/deltakit-codec/src/lib.rs

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Binary delta format.
//!
//! Layout (multi-byte integers big-endian):
//!
//! ```text
//! magic[4]       = { 'D', 'L', 'T', 0x01 }
//! flags[1]       = bit0: in-place; other bits reserved (must be 0)
//! version_size   : u32
//! ref_digest[16] : SHAKE128-16 of R
//! out_digest[16] : SHAKE128-16 of V
//! commands:
//!   COPY: 0x01, src:u32, dst:u32, len:u32
//!   ADD : 0x02, dst:u32, len:u32, bytes[len]
//! END : 0x00
//! ```
//!
//! The decoder validates bounds at every record boundary, rejects unknown
//! command types and reserved flag bits, and requires the END marker. The
//! digests let [`DeltaFile::check_reference`] and
//! [`DeltaFile::check_output`] refuse a delta applied against the wrong
//! inputs.

use deltakit_core::{DeltaError, PlacedCommand, Summary};
use deltakit_hash::{content_digest, ContentDigest, DIGEST_LEN};

/// File magic: `DLT` plus a format version byte.
pub const MAGIC: [u8; 4] = [b'D', b'L', b'T', 0x01];

/// Flag bit: the command stream is an in-place schedule.
pub const FLAG_INPLACE: u8 = 0x01;

/// Fixed header length: magic + flags + version size + two digests.
pub const HEADER_LEN: usize = 4 + 1 + 4 + 2 * DIGEST_LEN;

const CMD_END: u8 = 0x00;
const CMD_COPY: u8 = 0x01;
const CMD_ADD: u8 = 0x02;

const U32_LEN: usize = 4;
const COPY_PAYLOAD: usize = 3 * U32_LEN;
const ADD_HEADER: usize = 2 * U32_LEN;

/// A parsed delta file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaFile {
    /// Placed commands in stored order.
    pub commands: Vec<PlacedCommand>,
    /// Whether the command stream is an in-place schedule.
    pub inplace: bool,
    /// Size of the reconstructed version in bytes.
    pub version_size: usize,
    /// Digest of the reference the delta was computed against.
    pub ref_digest: ContentDigest,
    /// Digest of the version the delta reconstructs.
    pub out_digest: ContentDigest,
}

impl DeltaFile {
    /// Command statistics for reporting.
    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary::from_placed(&self.commands)
    }

    /// Verify that `r` is the reference this delta was computed against.
    ///
    /// # Errors
    /// [`DeltaError::IntegrityMismatch`] when the digests differ.
    pub fn check_reference(&self, r: &[u8]) -> Result<(), DeltaError> {
        let actual = content_digest(r);
        if actual != self.ref_digest {
            return Err(DeltaError::integrity("reference", &self.ref_digest, &actual));
        }
        Ok(())
    }

    /// Verify a reconstructed output against the embedded digest.
    ///
    /// # Errors
    /// [`DeltaError::IntegrityMismatch`] when the digests differ.
    pub fn check_output(&self, out: &[u8]) -> Result<(), DeltaError> {
        self.check_output_digest(content_digest(out))
    }

    /// Like [`DeltaFile::check_output`] for a digest computed elsewhere
    /// (e.g. while streaming the output to disk).
    ///
    /// # Errors
    /// [`DeltaError::IntegrityMismatch`] when the digests differ.
    pub fn check_output_digest(&self, actual: ContentDigest) -> Result<(), DeltaError> {
        if actual != self.out_digest {
            return Err(DeltaError::integrity("output", &self.out_digest, &actual));
        }
        Ok(())
    }
}

/// Fit a length into the u32 wire width.
fn wire_u32(value: usize, what: &str) -> Result<u32, DeltaError> {
    u32::try_from(value)
        .map_err(|_| DeltaError::InvalidArgument(format!("{what} {value} exceeds the u32 format limit")))
}

#[inline]
fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

#[inline]
fn get_u32(data: &[u8], pos: usize) -> usize {
    let mut raw = [0u8; U32_LEN];
    raw.copy_from_slice(&data[pos..pos + U32_LEN]);
    u32::from_be_bytes(raw) as usize
}

/// Serialise a placed command stream.
///
/// # Errors
/// [`DeltaError::InvalidArgument`] if any offset or length exceeds the u32
/// wire width; [`DeltaError::ResourceExhausted`] if the output buffer cannot
/// be allocated.
pub fn encode(
    commands: &[PlacedCommand],
    inplace: bool,
    version_size: usize,
    ref_digest: ContentDigest,
    out_digest: ContentDigest,
) -> Result<Vec<u8>, DeltaError> {
    let add_total: usize = commands
        .iter()
        .map(|c| match c {
            PlacedCommand::Add { data, .. } => data.len(),
            PlacedCommand::Copy { .. } => 0,
        })
        .sum();
    let estimate = HEADER_LEN + commands.len() * 14 + add_total + 1;

    let mut out = Vec::new();
    out.try_reserve(estimate)
        .map_err(|_| DeltaError::ResourceExhausted(estimate))?;

    out.extend_from_slice(&MAGIC);
    out.push(if inplace { FLAG_INPLACE } else { 0 });
    put_u32(&mut out, wire_u32(version_size, "version size")?);
    out.extend_from_slice(&ref_digest);
    out.extend_from_slice(&out_digest);

    for cmd in commands {
        match cmd {
            PlacedCommand::Copy { src, dst, length } => {
                out.push(CMD_COPY);
                put_u32(&mut out, wire_u32(*src, "copy source")?);
                put_u32(&mut out, wire_u32(*dst, "copy destination")?);
                put_u32(&mut out, wire_u32(*length, "copy length")?);
            }
            PlacedCommand::Add { dst, data } => {
                out.push(CMD_ADD);
                put_u32(&mut out, wire_u32(*dst, "add destination")?);
                put_u32(&mut out, wire_u32(data.len(), "add length")?);
                out.extend_from_slice(data);
            }
        }
    }
    out.push(CMD_END);
    Ok(out)
}

/// Parse a delta byte stream.
///
/// # Errors
/// [`DeltaError::MalformedDelta`] on bad magic, reserved flag bits, a
/// truncated record, an unknown command type, or a missing END marker.
pub fn decode(data: &[u8]) -> Result<DeltaFile, DeltaError> {
    if data.len() < HEADER_LEN || data[..4] != MAGIC {
        return Err(DeltaError::MalformedDelta("not a delta file".into()));
    }
    let flags = data[4];
    if flags & !FLAG_INPLACE != 0 {
        return Err(DeltaError::MalformedDelta(format!(
            "reserved flag bits set: {flags:#04x}"
        )));
    }
    let inplace = flags & FLAG_INPLACE != 0;
    let version_size = get_u32(data, 5);

    let mut ref_digest = [0u8; DIGEST_LEN];
    ref_digest.copy_from_slice(&data[9..9 + DIGEST_LEN]);
    let mut out_digest = [0u8; DIGEST_LEN];
    out_digest.copy_from_slice(&data[9 + DIGEST_LEN..HEADER_LEN]);

    let mut commands = Vec::new();
    let mut pos = HEADER_LEN;
    while pos < data.len() {
        let tag = data[pos];
        pos += 1;
        match tag {
            CMD_END => {
                return Ok(DeltaFile {
                    commands,
                    inplace,
                    version_size,
                    ref_digest,
                    out_digest,
                });
            }
            CMD_COPY => {
                if pos + COPY_PAYLOAD > data.len() {
                    return Err(DeltaError::MalformedDelta("truncated COPY record".into()));
                }
                let src = get_u32(data, pos);
                let dst = get_u32(data, pos + U32_LEN);
                let length = get_u32(data, pos + 2 * U32_LEN);
                pos += COPY_PAYLOAD;
                commands.push(PlacedCommand::Copy { src, dst, length });
            }
            CMD_ADD => {
                if pos + ADD_HEADER > data.len() {
                    return Err(DeltaError::MalformedDelta("truncated ADD record".into()));
                }
                let dst = get_u32(data, pos);
                let length = get_u32(data, pos + U32_LEN);
                pos += ADD_HEADER;
                if pos + length > data.len() {
                    return Err(DeltaError::MalformedDelta("truncated ADD payload".into()));
                }
                commands.push(PlacedCommand::Add {
                    dst,
                    data: data[pos..pos + length].to_vec(),
                });
                pos += length;
            }
            other => {
                return Err(DeltaError::MalformedDelta(format!(
                    "unknown command type {other:#04x}"
                )));
            }
        }
    }
    Err(DeltaError::MalformedDelta("missing END marker".into()))
}

/// Cheap header probe: is this byte stream an in-place delta?
#[must_use]
pub fn is_inplace(data: &[u8]) -> bool {
    data.len() >= 5 && data[..4] == MAGIC && data[4] & FLAG_INPLACE != 0
}
