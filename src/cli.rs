use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tonalis", about = "Note, key and color analysis of audio files")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Samples between analyser ticks
    #[arg(long, default_value_t = 1024)]
    pub hop: usize,

    /// Write every frame result as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep only frames that moved enough to be worth drawing
    #[arg(long)]
    pub significant_only: bool,

    /// Engine config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
