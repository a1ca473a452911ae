// imgcrunch/src/core/types.rs
use super::{CrunchError, ErrorKind};
use std::path::{Path, PathBuf};

/// Input formats recognized by extension. Everything else in the folder is ignored.
pub const SUPPORTED_EXTENSIONS: [&str; 11] = [
    "jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp", "gif", "heic", "heif", "avif",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
    Bmp,
    Tiff,
    WebP,
    Gif,
    Heif,
    Avif,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = crate::utils::get_file_extension(path)?;
        let format = match ext.as_str() {
            "jpg" | "jpeg" => SourceFormat::Jpeg,
            "png" => SourceFormat::Png,
            "bmp" => SourceFormat::Bmp,
            "tiff" | "tif" => SourceFormat::Tiff,
            "webp" => SourceFormat::WebP,
            "gif" => SourceFormat::Gif,
            "heic" | "heif" => SourceFormat::Heif,
            "avif" => SourceFormat::Avif,
            _ => return None,
        };
        Some(format)
    }

    /// HEIF-family containers need libheif; without it they are not inputs.
    pub fn is_decodable(self) -> bool {
        match self {
            SourceFormat::Heif | SourceFormat::Avif => cfg!(feature = "heic"),
            _ => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the input folder, used to mirror subfolders.
    pub relative: PathBuf,
    pub format: SourceFormat,
    /// 1-based position in name order.
    pub ordinal: usize,
}

#[derive(Debug, Clone)]
pub struct WorkItem {
    pub source: SourceFile,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginalDisposition {
    Moved(PathBuf),
    Kept,
    Replaced,
}

#[derive(Debug, Clone)]
pub struct Placement {
    pub final_path: PathBuf,
    pub bytes_written: u64,
    pub input_bytes: u64,
    pub original_dimensions: (u32, u32),
    pub dimensions: (u32, u32),
    pub original: OriginalDisposition,
}

impl Placement {
    pub fn resized(&self) -> bool {
        self.original_dimensions != self.dimensions
    }
}

#[derive(Debug, Clone)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CrunchError> for Failure {
    fn from(err: &CrunchError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum WorkOutcome {
    Placed(Placement),
    Failed(Failure),
    /// Never started because the run was cancelled.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct WorkResult {
    pub source: PathBuf,
    pub ordinal: usize,
    pub outcome: WorkOutcome,
}

impl WorkResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, WorkOutcome::Placed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}
