mod progress;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pmap_codecs::codec_by_name;
use pmap_core::{inspect, Config, Decoder, Encoder, EntryPolicy, Progress, DEFAULT_BLOCK_SIZE};

use crate::progress::TerminalProgress;

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "pmap",
    about = "Presence-map codec: encode, decode, and inspect presence-map containers",
    long_about = "Presence-map codec: encode, decode, and inspect presence-map containers.\n\n\
                  Containers record neither the block size nor the codec. Decode with the \
                  same --block-size and --codec that were used to encode.",
    version
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CodecArgs {
    /// Raw bytes per block; must be a positive multiple of 8
    #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,
    /// Compressor: zlib | zstd | lz4 | passthrough
    #[arg(short, long, default_value = "zlib")]
    codec: String,
    /// Compression level (zlib 0–9, zstd 1–22); codec default when omitted
    #[arg(long)]
    level: Option<i32>,
    /// Worker threads for per-block work
    #[arg(short, long, default_value_t = 1)]
    workers: usize,
    /// Do not draw a progress bar
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a file into a presence-map container
    Encode {
        /// Source file
        input: PathBuf,
        /// Destination container
        output: PathBuf,
        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Decode a presence-map container back to the original bytes
    Decode {
        /// Source container
        input: PathBuf,
        /// Destination file
        output: PathBuf,
        #[command(flatten)]
        codec: CodecArgs,
        /// Ignore a trailing partial presence entry instead of failing
        #[arg(long)]
        lenient: bool,
        /// Re-encode every block and compare it with the stored frame
        #[arg(long)]
        verify: bool,
    },
    /// Print header and frame statistics without decompressing
    Inspect {
        /// Container to inspect
        file: PathBuf,
        /// Block size the container was encoded with
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
        /// Print per-frame details
        #[arg(long)]
        frames: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn progress_for(label: &'static str, quiet: bool) -> Option<Arc<TerminalProgress>> {
    (!quiet).then(|| Arc::new(TerminalProgress::new(label)))
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_encode(input: PathBuf, output: PathBuf, args: CodecArgs) -> anyhow::Result<()> {
    let codec = codec_by_name(&args.codec, args.level)?;
    let codec_display = codec.name();
    let config = Config::new(args.block_size)?.with_workers(args.workers);

    let mut encoder = Encoder::new(codec, config)?;
    if let Some(progress) = progress_for("Encoding", args.quiet) {
        encoder = encoder.with_progress(progress as Arc<dyn Progress>);
    }

    let t0 = Instant::now();
    let summary = encoder
        .encode_file(&input, &output)
        .with_context(|| format!("encoding {:?} into {:?}", input, output))?;
    let elapsed = t0.elapsed();

    let ratio = if summary.container_len == 0 {
        1.0
    } else {
        summary.original_size as f64 / summary.container_len as f64
    };
    eprintln!("Encoded {:?} -> {:?}", input, output);
    eprintln!("  codec       : {}", codec_display);
    eprintln!(
        "  block size  : {}",
        human_bytes(encoder.config().layout.block_size() as u64)
    );
    eprintln!("  frames      : {}", summary.frames);
    eprintln!("  raw size    : {}", human_bytes(summary.original_size));
    eprintln!("  container   : {}", human_bytes(summary.container_len));
    eprintln!("  ratio       : {:.2}x", ratio);
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decode(input: PathBuf, output: PathBuf, args: CodecArgs, lenient: bool, verify: bool) -> anyhow::Result<()> {
    let codec = codec_by_name(&args.codec, args.level)?;
    let policy = if lenient {
        EntryPolicy::Lenient
    } else {
        EntryPolicy::Strict
    };
    let config = Config::new(args.block_size)?
        .with_workers(args.workers)
        .with_entry_policy(policy)
        .with_verify(verify);

    let mut decoder = Decoder::new(codec, config)?;
    if let Some(progress) = progress_for("Decoding", args.quiet) {
        decoder = decoder.with_progress(progress as Arc<dyn Progress>);
    }

    let t0 = Instant::now();
    let summary = decoder
        .decode_file(&input, &output)
        .with_context(|| format!("decoding {:?} into {:?}", input, output))?;
    let elapsed = t0.elapsed();

    eprintln!("Decoded {:?} -> {:?}", input, output);
    eprintln!(
        "  block size  : {}",
        human_bytes(decoder.config().layout.block_size() as u64)
    );
    eprintln!("  frames      : {}", summary.frames);
    eprintln!("  raw size    : {}", human_bytes(summary.original_size));
    if verify {
        eprintln!("  verified    : all frames re-encode identically");
    }
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(file: PathBuf, block_size: usize, show_frames: bool) -> anyhow::Result<()> {
    let layout = Config::new(block_size)?.layout;
    let src = File::open(&file).with_context(|| format!("opening container {:?}", file))?;
    let info = inspect(BufReader::new(src)).with_context(|| format!("reading container {:?}", file))?;
    let expected_frames = layout.blocks_for(info.header.original_size);

    println!("=== Presence-map container: {:?} ===", file);
    println!();
    println!("  original size  : {}", human_bytes(info.header.original_size));
    println!("  frames         : {}", info.frame_count());
    println!("  expected frames: {} (at block size {})", expected_frames, block_size);
    println!("  payload        : {}", human_bytes(info.payload_len()));
    println!("  container      : {}", human_bytes(info.container_len()));
    println!("  ratio          : {:.2}x", info.ratio());
    if info.frame_count() != expected_frames {
        println!("  warning        : frame count does not match the block size; wrong --block-size?");
    }

    if show_frames {
        println!();
        println!("  {:>8}  {:>14}  {:>12}", "frame", "file offset", "payload");
        println!("  {}", "-".repeat(38));
        for f in &info.frames {
            println!("  {:>8}  {:>14}  {:>12}", f.index, f.offset, human_bytes(f.len as u64));
        }
    }
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Encode {
            input,
            output,
            codec,
        } => run_encode(input, output, codec),
        Commands::Decode {
            input,
            output,
            codec,
            lenient,
            verify,
        } => run_decode(input, output, codec, lenient, verify),
        Commands::Inspect {
            file,
            block_size,
            frames,
        } => run_inspect(file, block_size, frames),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_encode_defaults() {
        let cli = Cli::try_parse_from(["pmap", "encode", "in.bin", "out.pmap"]).unwrap();
        match cli.command {
            Commands::Encode { codec, .. } => {
                assert_eq!(codec.block_size, 1024);
                assert_eq!(codec.codec, "zlib");
                assert_eq!(codec.workers, 1);
                assert!(codec.level.is_none());
            }
            _ => panic!("expected encode"),
        }
    }

    #[test]
    fn test_mode_is_required() {
        assert!(Cli::try_parse_from(["pmap", "in.bin", "out.pmap"]).is_err());
        assert!(Cli::try_parse_from(["pmap", "decode", "in.pmap"]).is_err());
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.00 KB");
    }

    #[test]
    fn test_encode_then_decode_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bin");
        let container = dir.path().join("out.pmap");
        let restored = dir.path().join("restored.bin");
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 13) as u8).collect();
        std::fs::write(&input, &data).unwrap();

        let args = || CodecArgs {
            block_size: 1024,
            codec: "zlib".to_string(),
            level: None,
            workers: 2,
            quiet: true,
        };
        run_encode(input.clone(), container.clone(), args()).unwrap();
        run_decode(container.clone(), restored.clone(), args(), false, true).unwrap();
        assert_eq!(std::fs::read(&restored).unwrap(), data);
        run_inspect(container, 1024, true).unwrap();
    }

    #[test]
    fn test_encode_rejects_bad_block_size() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bin");
        std::fs::write(&input, b"abc").unwrap();
        let args = CodecArgs {
            block_size: 12,
            codec: "zlib".to_string(),
            level: None,
            workers: 1,
            quiet: true,
        };
        let err = run_encode(input, dir.path().join("out.pmap"), args).unwrap_err();
        assert!(err.to_string().contains("multiple of 8"), "got: {err}");
    }
}
