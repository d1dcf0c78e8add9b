use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hashfs",
    about = "Inspect block layouts and object payloads of a content-hashed store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the byte range and range header of each block
    Ranges(RangesArgs),
    /// Encode a local file as an object payload
    Pack(PackArgs),
    /// Decode an object payload and verify its blocks
    Unpack(UnpackArgs),
    /// Validate a configuration file
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct RangesArgs {
    /// Object size in bytes
    #[arg(long)]
    pub size: u64,
    #[arg(long)]
    pub block_size: u64,
    /// Show only this block (1-based)
    #[arg(long)]
    pub index: Option<u64>,
}

#[derive(Args)]
pub struct PackArgs {
    pub file: PathBuf,
    /// Object name written into the payload; defaults to the file name
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, default_value_t = 4 * 1024 * 1024)]
    pub block_size: u64,
    #[arg(long, default_value = "sha256")]
    pub algorithm: String,
    /// Payload path; defaults to `<file>.hfs`
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct UnpackArgs {
    pub payload: PathBuf,
    #[arg(long, default_value = "sha256")]
    pub algorithm: String,
    /// Write the decoded content here
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct ConfigArgs {
    pub file: PathBuf,
}
