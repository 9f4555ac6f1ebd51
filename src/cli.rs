use clap::Parser;
use std::path::PathBuf;

/// Animated preview wall for numbered image sequences
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Root directory to scan for image sequences (PNG, JPEG, BMP, TIFF)
    #[arg(value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Animation rate in ticks per second
    #[arg(long = "fps", value_name = "N", default_value_t = 12)]
    pub fps: u32,

    /// Grid column count
    #[arg(long = "columns", value_name = "N", default_value_t = 6)]
    pub columns: usize,

    /// Tile edge length in pixels
    #[arg(short = 's', long = "tile-size", value_name = "PX", default_value_t = 192)]
    pub tile_size: u32,

    /// Frames advanced per tick
    #[arg(long = "step", value_name = "N", default_value_t = 1)]
    pub step: usize,

    /// Start with animation running
    #[arg(short = 'a', long = "autoplay")]
    pub autoplay: bool,

    /// Worker threads for thumbnail rendering (default: half the CPUs, min 2)
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Enable logging to file (default: seqwall.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}
