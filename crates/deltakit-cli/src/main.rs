// crates/deltakit-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

//! Command-line interface for deltakit differential compression.
//!
//! Subcommands: `encode` (compute a delta), `decode` (reconstruct a version),
//! `info` (inspect a delta header), and `inplace` (convert a standard delta
//! to an in-place delta against the same reference).

use anyhow::{Context, Result};
use clap::{error::ErrorKind, Parser, Subcommand, ValueEnum};
use deltakit_codec::DeltaFile;
use deltakit_core::{
    Algorithm, CyclePolicy, DiffOptions, Summary, DEFAULT_SEED_LEN, DEFAULT_TABLE_SIZE,
};
use deltakit_hash::{content_digest, ContentDigest, ContentHasher};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "deltakit",
    about = "Differential compression: compute and apply binary deltas",
    long_about = "Differential compression between two byte strings.\n\n\
        Computes a compact delta from a reference and a version using the \
        greedy, one-pass, or correcting algorithm, optionally converts it to \
        an in-place delta, and reconstructs the version from reference plus \
        delta.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    /// Print per-phase diagnostics to stderr.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compute a delta that reconstructs <VERSION> from <REFERENCE>.
    Encode {
        /// Differencing algorithm.
        #[arg(value_enum)]
        algorithm: AlgorithmOpt,

        /// Reference file (the old bytes).
        reference: PathBuf,

        /// Version file (the new bytes).
        version: PathBuf,

        /// Output delta file.
        delta: PathBuf,

        /// Seed (fingerprint window) length in bytes.
        #[arg(long, default_value_t = DEFAULT_SEED_LEN)]
        seed_len: usize,

        /// Hash table size floor.
        #[arg(long, default_value_t = DEFAULT_TABLE_SIZE)]
        table_size: usize,

        /// Upper clamp on auto-sized tables; k/M/B suffixes accepted.
        #[arg(long, value_parser = parse_size_spec, default_value = "16777213")]
        max_table: usize,

        /// Produce an in-place delta.
        #[arg(long)]
        inplace: bool,

        /// Cycle-breaking policy for --inplace.
        #[arg(long, value_enum, default_value_t = PolicyOpt::Localmin)]
        policy: PolicyOpt,

        /// Index with a splay tree instead of a hash table.
        #[arg(long)]
        splay: bool,

        /// Minimum copy length worth emitting (defaults to the seed length).
        #[arg(long)]
        min_copy: Option<usize>,
    },

    /// Reconstruct a version from a reference and a delta.
    Decode {
        /// Reference file the delta was computed against.
        reference: PathBuf,

        /// Delta file.
        delta: PathBuf,

        /// Output file for the reconstructed version.
        output: PathBuf,

        /// Downgrade integrity-check failures to warnings.
        #[arg(long)]
        ignore_hash: bool,
    },

    /// Print a delta file's header and command statistics.
    Info {
        /// Delta file.
        delta: PathBuf,

        /// Emit the report as JSON on stdout.
        #[arg(long)]
        json: bool,
    },

    /// Convert a standard delta to an in-place delta for the same reference.
    Inplace {
        /// Reference file the delta was computed against.
        reference: PathBuf,

        /// Input (standard) delta file.
        delta_in: PathBuf,

        /// Output (in-place) delta file.
        delta_out: PathBuf,

        /// Cycle-breaking policy.
        #[arg(long, value_enum, default_value_t = PolicyOpt::Localmin)]
        policy: PolicyOpt,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum AlgorithmOpt {
    /// Optimal matching, quadratic worst case.
    Greedy,
    /// Linear interleaved scan.
    Onepass,
    /// Checkpointed 1.5-pass scan with tail correction.
    Correcting,
}

impl From<AlgorithmOpt> for Algorithm {
    fn from(opt: AlgorithmOpt) -> Self {
        match opt {
            AlgorithmOpt::Greedy => Self::Greedy,
            AlgorithmOpt::Onepass => Self::OnePass,
            AlgorithmOpt::Correcting => Self::Correcting,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum PolicyOpt {
    Localmin,
    Constant,
}

impl From<PolicyOpt> for CyclePolicy {
    fn from(opt: PolicyOpt) -> Self {
        match opt {
            PolicyOpt::Localmin => Self::LocalMin,
            PolicyOpt::Constant => Self::Constant,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version are successful exits; everything else is a
            // user-visible argument error.
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
            let _ = e.print();
            return code;
        }
    };

    init_tracing(cli.verbose);

    let result = match cli.cmd {
        Cmd::Encode {
            algorithm,
            reference,
            version,
            delta,
            seed_len,
            table_size,
            max_table,
            inplace,
            policy,
            splay,
            min_copy,
        } => encode(
            algorithm,
            &reference,
            &version,
            &delta,
            &DiffOptions {
                seed_len,
                table_size,
                max_table,
                use_splay: splay,
                min_copy,
                ..DiffOptions::default()
            },
            inplace,
            policy,
        ),
        Cmd::Decode {
            reference,
            delta,
            output,
            ignore_hash,
        } => decode(&reference, &delta, &output, ignore_hash),
        Cmd::Info { delta, json } => print_info(&delta, json),
        Cmd::Inplace {
            reference,
            delta_in,
            delta_out,
            policy,
        } => convert_inplace(&reference, &delta_in, &delta_out, policy),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing: env-driven filter, bumped to debug by `--verbose`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Accept a decimal size with an optional k / M / B suffix.
fn parse_size_spec(s: &str) -> Result<usize, String> {
    let (digits, mult) = match s.char_indices().last() {
        Some((i, 'k' | 'K')) => (&s[..i], 1_000usize),
        Some((i, 'm' | 'M')) => (&s[..i], 1_000_000),
        Some((i, 'b' | 'B')) => (&s[..i], 1_000_000_000),
        _ => (s, 1),
    };
    let n: usize = digits
        .parse()
        .map_err(|_| format!("invalid size: {s:?}"))?;
    n.checked_mul(mult)
        .ok_or_else(|| format!("size out of range: {s:?}"))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).with_context(|| format!("writing {}", path.display()))
}

/// Write a file while digesting it in the same pass.
fn write_file_hashed(path: &Path, data: &[u8]) -> Result<ContentDigest> {
    let f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(f);
    let mut hasher = ContentHasher::new();
    for chunk in data.chunks(64 * 1024) {
        w.write_all(chunk)
            .with_context(|| format!("writing {}", path.display()))?;
        hasher.update(chunk);
    }
    w.flush().with_context(|| format!("flushing {}", path.display()))?;
    Ok(hasher.finalize())
}

#[allow(clippy::too_many_arguments)]
fn encode(
    algorithm: AlgorithmOpt,
    reference: &Path,
    version: &Path,
    delta_path: &Path,
    opts: &DiffOptions,
    inplace: bool,
    policy: PolicyOpt,
) -> Result<()> {
    let r = read_file(reference)?;
    let v = read_file(version)?;

    let ref_digest = content_digest(&r);
    let out_digest = content_digest(&v);

    info!(
        algorithm = ?algorithm,
        r_len = r.len(),
        v_len = v.len(),
        inplace,
        "encoding delta"
    );

    let t0 = Instant::now();
    let cmds = deltakit_diff::diff(algorithm.into(), &r, &v, opts)?;
    let placed = if inplace {
        deltakit_inplace::make_inplace(&r, &cmds, policy.into())?
    } else {
        deltakit_core::place_commands(&cmds)
    };
    let elapsed = t0.elapsed();

    let delta_bytes = deltakit_codec::encode(&placed, inplace, v.len(), ref_digest, out_digest)?;
    write_file(delta_path, &delta_bytes)?;

    let stats = Summary::from_placed(&placed);
    let ratio = if v.is_empty() {
        0.0
    } else {
        delta_bytes.len() as f64 / v.len() as f64
    };
    let algo_label = format!(
        "{}{}",
        algorithm
            .to_possible_value()
            .map(|p| p.get_name().to_owned())
            .unwrap_or_default(),
        if opts.use_splay { " [splay]" } else { "" }
    );
    if inplace {
        let policy_name = match policy {
            PolicyOpt::Localmin => "localmin",
            PolicyOpt::Constant => "constant",
        };
        println!("Algorithm:    {algo_label} + in-place ({policy_name})");
    } else {
        println!("Algorithm:    {algo_label}");
    }
    println!("Reference:    {} ({} bytes)", reference.display(), r.len());
    println!("Version:      {} ({} bytes)", version.display(), v.len());
    println!(
        "Delta:        {} ({} bytes)",
        delta_path.display(),
        delta_bytes.len()
    );
    println!("Compression:  {ratio:.4} (delta/version)");
    println!(
        "Commands:     {} copies, {} adds",
        stats.num_copies, stats.num_adds
    );
    println!("Copy bytes:   {}", stats.copy_bytes);
    println!("Add bytes:    {}", stats.add_bytes);
    println!("Src hash:     {}", hex::encode(ref_digest));
    println!("Dst hash:     {}", hex::encode(out_digest));
    println!("Time:         {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn decode(reference: &Path, delta_path: &Path, output: &Path, ignore_hash: bool) -> Result<()> {
    let r = read_file(reference)?;
    let delta_bytes = read_file(delta_path)?;

    let df = deltakit_codec::decode(&delta_bytes)
        .with_context(|| format!("parsing {}", delta_path.display()))?;

    // Pre-check: the reference must be the one the delta was computed from.
    if let Err(e) = df.check_reference(&r) {
        if ignore_hash {
            warn!("skipping reference integrity check: {e}");
        } else {
            return Err(e).with_context(|| format!("verifying {}", reference.display()));
        }
    }

    let t0 = Instant::now();
    let out = if df.inplace {
        deltakit_core::apply_inplace(&r, &df.commands, df.version_size)?
    } else {
        deltakit_core::apply(&r, &df.commands, df.version_size)?
    };
    let elapsed = t0.elapsed();

    // Post-check against the digest computed while writing.
    let out_digest = write_file_hashed(output, &out)?;
    if let Err(e) = df.check_output_digest(out_digest) {
        if ignore_hash {
            warn!("skipping output integrity check: {e}");
        } else {
            return Err(e).with_context(|| format!("verifying {}", output.display()));
        }
    }

    println!(
        "Format:       {}",
        if df.inplace { "in-place" } else { "standard" }
    );
    println!("Reference:    {} ({} bytes)", reference.display(), r.len());
    println!(
        "Delta:        {} ({} bytes)",
        delta_path.display(),
        delta_bytes.len()
    );
    println!(
        "Output:       {} ({} bytes)",
        output.display(),
        df.version_size
    );
    if !ignore_hash {
        println!("Src hash:     {}  OK", hex::encode(df.ref_digest));
        println!("Dst hash:     {}  OK", hex::encode(df.out_digest));
    }
    println!("Time:         {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

/// JSON shape for `info --json`.
#[derive(Serialize)]
struct InfoReport {
    delta_file: String,
    delta_bytes: usize,
    format: &'static str,
    version_size: usize,
    src_hash: String,
    dst_hash: String,
    summary: Summary,
}

fn print_info(delta_path: &Path, json: bool) -> Result<()> {
    let delta_bytes = read_file(delta_path)?;
    let df: DeltaFile = deltakit_codec::decode(&delta_bytes)
        .with_context(|| format!("parsing {}", delta_path.display()))?;
    let stats = df.summary();
    let format = if df.inplace { "in-place" } else { "standard" };

    if json {
        let report = InfoReport {
            delta_file: delta_path.display().to_string(),
            delta_bytes: delta_bytes.len(),
            format,
            version_size: df.version_size,
            src_hash: hex::encode(df.ref_digest),
            dst_hash: hex::encode(df.out_digest),
            summary: stats,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Delta file:   {} ({} bytes)",
        delta_path.display(),
        delta_bytes.len()
    );
    println!("Format:       {format}");
    println!("Version size: {} bytes", df.version_size);
    println!("Src hash:     {}", hex::encode(df.ref_digest));
    println!("Dst hash:     {}", hex::encode(df.out_digest));
    println!("Commands:     {}", stats.num_commands);
    println!(
        "  Copies:     {} ({} bytes)",
        stats.num_copies, stats.copy_bytes
    );
    println!("  Adds:       {} ({} bytes)", stats.num_adds, stats.add_bytes);
    println!("Output size:  {} bytes", stats.total_output_bytes);
    Ok(())
}

fn convert_inplace(
    reference: &Path,
    delta_in: &Path,
    delta_out: &Path,
    policy: PolicyOpt,
) -> Result<()> {
    let r = read_file(reference)?;
    let delta_bytes = read_file(delta_in)?;

    let df = deltakit_codec::decode(&delta_bytes)
        .with_context(|| format!("parsing {}", delta_in.display()))?;

    if df.inplace {
        write_file(delta_out, &delta_bytes)?;
        println!("Delta is already in-place format; copied unchanged.");
        return Ok(());
    }

    let t0 = Instant::now();
    let cmds = deltakit_core::unplace_commands(&df.commands);
    let placed = deltakit_inplace::make_inplace(&r, &cmds, policy.into())?;
    let elapsed = t0.elapsed();

    let out_bytes = deltakit_codec::encode(
        &placed,
        true,
        df.version_size,
        df.ref_digest,
        df.out_digest,
    )?;
    write_file(delta_out, &out_bytes)?;

    let stats = Summary::from_placed(&placed);
    let policy_name = match policy {
        PolicyOpt::Localmin => "localmin",
        PolicyOpt::Constant => "constant",
    };
    println!("Reference:    {} ({} bytes)", reference.display(), r.len());
    println!(
        "Input delta:  {} ({} bytes)",
        delta_in.display(),
        delta_bytes.len()
    );
    println!(
        "Output delta: {} ({} bytes)",
        delta_out.display(),
        out_bytes.len()
    );
    println!("Format:       in-place ({policy_name})");
    println!(
        "Commands:     {} copies, {} adds",
        stats.num_copies, stats.num_adds
    );
    println!("Copy bytes:   {}", stats.copy_bytes);
    println!("Add bytes:    {}", stats.add_bytes);
    println!("Time:         {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn size_spec_plain_and_suffixed() {
        assert_eq!(parse_size_spec("1234").unwrap(), 1234);
        assert_eq!(parse_size_spec("16k").unwrap(), 16_000);
        assert_eq!(parse_size_spec("2M").unwrap(), 2_000_000);
        assert_eq!(parse_size_spec("1B").unwrap(), 1_000_000_000);
    }

    #[test]
    fn size_spec_rejects_garbage() {
        assert!(parse_size_spec("").is_err());
        assert!(parse_size_spec("k").is_err());
        assert!(parse_size_spec("12q").is_err());
        assert!(parse_size_spec("-5").is_err());
    }

    #[test]
    fn cli_parses_encode_with_options() {
        let cli = Cli::try_parse_from([
            "deltakit",
            "encode",
            "correcting",
            "ref.bin",
            "ver.bin",
            "out.delta",
            "--seed-len",
            "8",
            "--max-table",
            "4M",
            "--inplace",
            "--policy",
            "constant",
        ])
        .unwrap();
        match cli.cmd {
            Cmd::Encode {
                algorithm,
                seed_len,
                max_table,
                inplace,
                policy,
                ..
            } => {
                assert_eq!(algorithm, AlgorithmOpt::Correcting);
                assert_eq!(seed_len, 8);
                assert_eq!(max_table, 4_000_000);
                assert!(inplace);
                assert_eq!(policy, PolicyOpt::Constant);
            }
            other => panic!("parsed wrong subcommand: {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_unknown_algorithm() {
        assert!(Cli::try_parse_from([
            "deltakit", "encode", "fastest", "r", "v", "d",
        ])
        .is_err());
    }
}
