// imgcrunch/src/cli.rs
use crate::core::{JobConfig, OutputFormat, OutputMode, DEFAULT_MAX_SIZE, DEFAULT_QUALITY};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum FormatArg {
    Jpeg,
    Heic,
    Avif,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Jpeg => OutputFormat::Jpeg,
            FormatArg::Heic => OutputFormat::Heic,
            FormatArg::Avif => OutputFormat::Avif,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "imgcrunch", version, about = "Batch convert and resize images, keeping EXIF metadata")]
#[command(after_help = "Examples:\n  imgcrunch ~/Pictures/trip\n  imgcrunch ~/Pictures/trip --format avif --quality 80\n  imgcrunch ~/Pictures/trip -o ~/Export --max-size 2000 --rename trip")]
pub struct Cli {
    /// Folder containing the images
    pub input: PathBuf,

    /// Output folder (default: <INPUT>/converted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = FormatArg::Jpeg)]
    pub format: FormatArg,

    /// Quality 1-100
    #[arg(short, long, default_value_t = DEFAULT_QUALITY)]
    pub quality: u8,

    /// Longest side in pixels; larger images are shrunk, 0 disables resizing
    #[arg(short, long, default_value_t = DEFAULT_MAX_SIZE)]
    pub max_size: u32,

    /// Leave originals where they are instead of moving them to "originals"
    #[arg(long)]
    pub no_move: bool,

    /// Overwrite the originals in place (destructive)
    #[arg(long, conflicts_with = "output")]
    pub replace: bool,

    /// Name outputs NAME_001, NAME_002, ... in file name order
    #[arg(long, value_name = "NAME")]
    pub rename: Option<String>,

    /// Worker threads (0 = one per CPU core)
    #[arg(short = 'j', long, default_value_t = 0)]
    pub threads: usize,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn to_config(&self) -> JobConfig {
        JobConfig {
            format: self.format.into(),
            quality: self.quality,
            max_size: self.max_size,
            mode: if self.replace {
                OutputMode::Replace
            } else {
                OutputMode::Keep
            },
            move_originals: !self.no_move,
            rename: self.rename.clone(),
            output_dir: self.output.clone(),
            threads: self.threads,
        }
    }
}
