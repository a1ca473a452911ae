// imgcrunch/src/core/mod.rs
pub mod processor;
pub mod report;
pub mod types;

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_QUALITY: u8 = 85;
pub const DEFAULT_MAX_SIZE: u32 = 3000;
pub const MAX_DIMENSION_LIMIT: u32 = 100_000;
pub const OUTPUT_FOLDER_NAME: &str = "converted";
pub const ORIGINALS_FOLDER_NAME: &str = "originals";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Heic,
    Avif,
}

/// What the running binary can do for one output format.
#[derive(Debug, Clone, Copy)]
pub struct FormatCapability {
    pub format: OutputFormat,
    pub extension: &'static str,
    pub encoder_available: bool,
    pub carries_exif: bool,
}

const CAPABILITIES: [FormatCapability; 3] = [
    FormatCapability {
        format: OutputFormat::Jpeg,
        extension: "jpg",
        encoder_available: true,
        carries_exif: true,
    },
    FormatCapability {
        format: OutputFormat::Heic,
        extension: "heic",
        encoder_available: cfg!(feature = "heic"),
        carries_exif: true,
    },
    FormatCapability {
        format: OutputFormat::Avif,
        extension: "avif",
        encoder_available: true,
        // image's AV1 encoder has no metadata hook; libheif does.
        carries_exif: cfg!(feature = "heic"),
    },
];

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Jpeg, OutputFormat::Heic, OutputFormat::Avif];

    pub fn capability(self) -> &'static FormatCapability {
        match self {
            OutputFormat::Jpeg => &CAPABILITIES[0],
            OutputFormat::Heic => &CAPABILITIES[1],
            OutputFormat::Avif => &CAPABILITIES[2],
        }
    }

    pub fn extension(self) -> &'static str {
        self.capability().extension
    }

    pub fn is_available(self) -> bool {
        self.capability().encoder_available
    }

    pub fn supports_exif(self) -> bool {
        self.capability().carries_exif
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Heic => "HEIC",
            OutputFormat::Avif => "AVIF",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Converted files go to a separate folder; originals are never overwritten.
    Keep,
    /// Converted files take the place of the originals.
    Replace,
}

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub format: OutputFormat,
    pub quality: u8,
    /// Longest allowed side in pixels. 0 disables resizing.
    pub max_size: u32,
    pub mode: OutputMode,
    pub move_originals: bool,
    pub rename: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub threads: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: DEFAULT_QUALITY,
            max_size: DEFAULT_MAX_SIZE,
            mode: OutputMode::Keep,
            move_originals: true,
            rename: None,
            output_dir: None,
            threads: 0,
        }
    }
}

impl JobConfig {
    /// Checks every field once, before any file is touched. The rename base is
    /// normalized in place so later stages only ever see the sanitized form.
    pub fn validate(&mut self) -> Result<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(CrunchError::Config(
                "Quality must be between 1 and 100".to_string(),
            ));
        }

        if self.max_size > MAX_DIMENSION_LIMIT {
            return Err(CrunchError::Config(format!(
                "Max size too large (max {} pixels)",
                MAX_DIMENSION_LIMIT
            )));
        }

        if !self.format.is_available() {
            return Err(CrunchError::Config(format!(
                "{} output is not available in this build (enable the '{}' feature)",
                self.format,
                self.format.extension()
            )));
        }

        if let Some(raw) = self.rename.take() {
            let sanitized = crate::utils::sanitize_rename_base(&raw);
            if sanitized.is_empty() {
                return Err(CrunchError::Config(format!(
                    "Rename base '{}' has no usable characters",
                    raw
                )));
            }
            self.rename = Some(sanitized);
        }

        Ok(())
    }

    pub fn output_dir_for(&self, input_dir: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => input_dir.join(OUTPUT_FOLDER_NAME),
        }
    }

    pub fn originals_dir_for(&self, input_dir: &Path) -> PathBuf {
        input_dir.join(ORIGINALS_FOLDER_NAME)
    }

    pub fn moves_originals(&self) -> bool {
        self.mode == OutputMode::Keep && self.move_originals
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    EmptyInput,
    Decode,
    UnsupportedFormat,
    Encode,
    Write,
    Panic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "config",
            ErrorKind::EmptyInput => "empty input",
            ErrorKind::Decode => "decode",
            ErrorKind::UnsupportedFormat => "unsupported format",
            ErrorKind::Encode => "encode",
            ErrorKind::Write => "write",
            ErrorKind::Panic => "panic",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum CrunchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No images found in {}", .0.display())]
    EmptyInput(PathBuf),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrunchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrunchError::Config(_) => ErrorKind::Config,
            CrunchError::EmptyInput(_) => ErrorKind::EmptyInput,
            CrunchError::Decode(_) => ErrorKind::Decode,
            CrunchError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            CrunchError::Encode(_) => ErrorKind::Encode,
            CrunchError::Write(_) | CrunchError::Io(_) => ErrorKind::Write,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, CrunchError::Config(_))
    }

    pub(crate) fn write(path: &Path, err: impl fmt::Display) -> Self {
        CrunchError::Write(format!("{}: {}", path.display(), err))
    }
}

pub type Result<T> = std::result::Result<T, CrunchError>;
