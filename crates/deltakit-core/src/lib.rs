// crates/deltakit-core/src/lib.rs

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Core data types for differential compression: delta commands, placed
//! commands, placement, the two apply engines, and the crate-wide error type.
//!
//! A delta is a V-sequential list of [`Command`]s: concatenating their
//! outputs reproduces the version V from the reference R. Placement assigns
//! each command its explicit destination offset, turning it into a
//! [`PlacedCommand`] ready for the binary codec or the in-place converter.

pub mod apply;
pub mod error;
pub mod place;
pub mod types;

pub use apply::{apply, apply_inplace};
pub use error::DeltaError;
pub use place::{output_size, place_commands, unplace_commands};
pub use types::{
    Algorithm, Command, CyclePolicy, DiffOptions, PlacedCommand, Summary, DEFAULT_BUF_CAP,
    DEFAULT_MAX_TABLE_SIZE, DEFAULT_SEED_LEN, DEFAULT_TABLE_SIZE,
};
