use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use hashfs_codec::ObjectCodec;
use hashfs_fs::FsConfig;
use hashfs_store::{block_count_for, block_range};
use hashfs_types::{HashAlgorithm, StoredObject};
use serde::Serialize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Ranges(args) => cmd_ranges(args, format),
        Command::Pack(args) => cmd_pack(args, format),
        Command::Unpack(args) => cmd_unpack(args, format),
        Command::Config(args) => cmd_config(args, format),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---- ranges ----

#[derive(Debug, PartialEq, Eq, Serialize)]
struct RangeRow {
    index: u64,
    start: u64,
    end: u64,
    length: u64,
    header: String,
}

fn range_rows(size: u64, block_size: u64, index: Option<u64>) -> anyhow::Result<Vec<RangeRow>> {
    if size == 0 {
        bail!("an empty object has no blocks");
    }
    let count = block_count_for(size, block_size)?;
    let indices: Vec<u64> = match index {
        Some(i) => vec![i],
        None => (1..=count).collect(),
    };
    indices
        .into_iter()
        .map(|i| {
            let range = block_range(size, block_size, count, i)?;
            Ok(RangeRow {
                index: i,
                start: range.start,
                end: range.end,
                length: range.len(),
                header: range.header_value(size),
            })
        })
        .collect()
}

fn cmd_ranges(args: RangesArgs, format: OutputFormat) -> anyhow::Result<()> {
    let rows = range_rows(args.size, args.block_size, args.index)?;
    if format == OutputFormat::Json {
        return print_json(&rows);
    }
    for row in &rows {
        println!(
            "{:>6}  {:>12}-{:<12} {:>10} bytes  {}",
            format!("#{}", row.index).yellow(),
            row.start,
            row.end,
            row.length,
            row.header.cyan()
        );
    }
    Ok(())
}

// ---- pack / unpack ----

#[derive(Debug, Serialize)]
struct PackSummary {
    name: String,
    blocks: usize,
    size: u64,
    block_size: u64,
    payload_bytes: usize,
    out: PathBuf,
}

fn default_payload_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(".hfs");
    PathBuf::from(name)
}

fn pack_file(args: &PackArgs) -> anyhow::Result<PackSummary> {
    let algorithm: HashAlgorithm = args.algorithm.parse()?;
    let data = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let object = StoredObject::from_bytes(name, args.block_size, algorithm, &data)?;
    let payload = ObjectCodec::for_algorithm(algorithm).serialize(&object)?;
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| default_payload_path(&args.file));
    std::fs::write(&out, &payload).with_context(|| format!("writing {}", out.display()))?;
    tracing::debug!(out = %out.display(), bytes = payload.len(), "payload written");

    Ok(PackSummary {
        name: object.name.clone(),
        blocks: object.block_count(),
        size: object.total_size(),
        block_size: object.block_size,
        payload_bytes: payload.len(),
        out,
    })
}

fn cmd_pack(args: PackArgs, format: OutputFormat) -> anyhow::Result<()> {
    let summary = pack_file(&args)?;
    if format == OutputFormat::Json {
        return print_json(&summary);
    }
    println!(
        "{} Packed {} ({} bytes, {} blocks of {})",
        "✓".green().bold(),
        summary.name.bold(),
        summary.size,
        summary.blocks,
        summary.block_size
    );
    println!("  Payload: {} ({} bytes)", summary.out.display(), summary.payload_bytes);
    Ok(())
}

#[derive(Debug, Serialize)]
struct UnpackSummary {
    name: Option<String>,
    blocks: usize,
    size: u64,
    block_size: u64,
    hashes: Vec<String>,
    out: Option<PathBuf>,
}

fn unpack_file(args: &UnpackArgs) -> anyhow::Result<UnpackSummary> {
    let algorithm: HashAlgorithm = args.algorithm.parse()?;
    let payload = std::fs::read(&args.payload)
        .with_context(|| format!("reading {}", args.payload.display()))?;
    let decoded = ObjectCodec::for_algorithm(algorithm).deserialize(Some(&payload))?;

    let Some(object) = decoded else {
        if let Some(out) = &args.out {
            std::fs::write(out, b"")?;
        }
        return Ok(UnpackSummary {
            name: None,
            blocks: 0,
            size: 0,
            block_size: 0,
            hashes: Vec::new(),
            out: args.out.clone(),
        });
    };

    for (i, block) in object.blocks.iter().enumerate() {
        if !block.verify(algorithm) {
            bail!(
                "block {} ({}) does not match its {} digest",
                i + 1,
                block.hash().short(),
                algorithm
            );
        }
    }
    object.check_layout()?;

    if let Some(out) = &args.out {
        std::fs::write(out, object.content())
            .with_context(|| format!("writing {}", out.display()))?;
    }
    Ok(UnpackSummary {
        name: Some(object.name.clone()),
        blocks: object.block_count(),
        size: object.total_size(),
        block_size: object.block_size,
        hashes: object.block_hashes().iter().map(|h| h.to_string()).collect(),
        out: args.out.clone(),
    })
}

fn cmd_unpack(args: UnpackArgs, format: OutputFormat) -> anyhow::Result<()> {
    let summary = unpack_file(&args)?;
    if format == OutputFormat::Json {
        return print_json(&summary);
    }
    match &summary.name {
        None => println!("Empty payload."),
        Some(name) => {
            println!(
                "{} {} ({} bytes, {} blocks, all digests verified)",
                "✓".green().bold(),
                name.bold(),
                summary.size,
                summary.blocks
            );
            for (i, hash) in summary.hashes.iter().enumerate() {
                println!("  {:>4}  {}", i + 1, hash.dimmed());
            }
        }
    }
    if let Some(out) = &summary.out {
        println!("  Content: {}", out.display());
    }
    Ok(())
}

// ---- config ----

fn cmd_config(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = FsConfig::load(&args.file)
        .with_context(|| format!("loading {}", args.file.display()))?;
    if format == OutputFormat::Json {
        return print_json(&config);
    }
    println!("{} {} is valid", "✓".green().bold(), args.file.display());
    print!("{}", config.to_toml_string()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_for_remainder_layout() {
        let rows = range_rows(10, 4, None).unwrap();
        let headers: Vec<&str> = rows.iter().map(|r| r.header.as_str()).collect();
        assert_eq!(headers, vec!["bytes=0-3", "bytes=4-7", "bytes=8-"]);
        assert_eq!(rows[2].length, 2);
    }

    #[test]
    fn single_range_and_bad_input() {
        let rows = range_rows(12, 4, Some(2)).unwrap();
        assert_eq!(rows, vec![RangeRow {
            index: 2,
            start: 4,
            end: 7,
            length: 4,
            header: "bytes=4-7".into(),
        }]);
        assert!(range_rows(12, 4, Some(4)).is_err());
        assert!(range_rows(12, 0, None).is_err());
        assert!(range_rows(0, 4, None).is_err());
    }

    fn pack_args(file: PathBuf, out: PathBuf) -> PackArgs {
        PackArgs {
            file,
            name: Some("data/sample.bin".into()),
            block_size: 5,
            algorithm: "sha256".into(),
            out: Some(out),
        }
    }

    #[test]
    fn pack_then_unpack() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sample.bin");
        std::fs::write(&input, b"the quick brown fox").unwrap();
        let payload = dir.path().join("sample.hfs");

        let packed = pack_file(&pack_args(input, payload.clone())).unwrap();
        assert_eq!(packed.blocks, 4);
        assert_eq!(packed.size, 19);

        let restored = dir.path().join("restored.bin");
        let unpacked = unpack_file(&UnpackArgs {
            payload,
            algorithm: "SHA-256".into(),
            out: Some(restored.clone()),
        })
        .unwrap();
        assert_eq!(unpacked.name.as_deref(), Some("data/sample.bin"));
        assert_eq!(unpacked.block_size, 5);
        assert_eq!(std::fs::read(restored).unwrap(), b"the quick brown fox");
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::write(&input, b"0123456789").unwrap();
        let payload = dir.path().join("in.hfs");
        pack_file(&pack_args(input, payload.clone())).unwrap();

        let mut bytes = std::fs::read(&payload).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(&payload, bytes).unwrap();

        let err = unpack_file(&UnpackArgs {
            payload,
            algorithm: "sha256".into(),
            out: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn default_payload_name() {
        assert_eq!(
            default_payload_path(Path::new("dir/file.txt")),
            PathBuf::from("dir/file.txt.hfs")
        );
    }
}
