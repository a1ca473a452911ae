mod cli;
mod core;
mod processors;
mod utils;

pub use cli::{Cli, FormatArg};
pub use crate::core::processor::{ImageProcessor, Transformed};
pub use crate::core::report::{FailureEntry, RunReport};
pub use crate::core::types::{
    Failure, OriginalDisposition, Placement, Progress, SourceFile, SourceFormat, WorkItem,
    WorkOutcome, WorkResult, SUPPORTED_EXTENSIONS,
};
pub use crate::core::{
    CrunchError, ErrorKind, FormatCapability, JobConfig, OutputFormat, OutputMode, Result,
    DEFAULT_MAX_SIZE, DEFAULT_QUALITY, ORIGINALS_FOLDER_NAME, OUTPUT_FOLDER_NAME,
};
pub use processors::{
    BatchProcessor, Compressor, Dispatcher, Encoded, FilePlanner, Loader, MetadataProcessor,
    OutputManager, Plan, Resizer,
};
pub use utils::{format_file_size, is_supported_format, sanitize_rename_base};

pub mod prelude {
    pub use crate::{
        BatchProcessor, ImageProcessor, JobConfig, OutputFormat, OutputMode, RunReport,
    };
}
