// imgcrunch/src/core/processor.rs
use super::{CrunchError, JobConfig, OutputFormat, Result};
use crate::processors::{Compressor, Loader, MetadataProcessor, Resizer};
use image::GenericImageView;
use std::path::Path;

/// Encoded output of one image, not yet placed on disk.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub bytes: Vec<u8>,
    pub input_bytes: u64,
    pub original_dimensions: (u32, u32),
    pub dimensions: (u32, u32),
    pub exif_embedded: bool,
}

impl Transformed {
    pub fn resized(&self) -> bool {
        self.original_dimensions != self.dimensions
    }
}

pub struct ImageProcessor {
    format: OutputFormat,
    loader: Loader,
    resizer: Resizer,
    compressor: Compressor,
    metadata_processor: MetadataProcessor,
}

impl ImageProcessor {
    pub fn new(config: &JobConfig) -> Self {
        Self {
            format: config.format,
            loader: Loader::new(),
            resizer: Resizer::new(config.max_size),
            compressor: Compressor::new(config.quality),
            metadata_processor: MetadataProcessor::new(),
        }
    }

    pub fn with_compressor(mut self, compressor: Compressor) -> Self {
        self.compressor = compressor;
        self
    }

    /// Decode, shrink to the longest-side limit, re-encode and carry the EXIF
    /// block over. Touches nothing on disk besides reading `input_path`.
    pub fn transform(&self, input_path: &Path) -> Result<Transformed> {
        if !self.format.is_available() {
            return Err(CrunchError::UnsupportedFormat(format!(
                "no {} encoder in this build",
                self.format
            )));
        }

        let input_bytes = std::fs::metadata(input_path)
            .map_err(|e| CrunchError::Decode(format!("{}: {}", input_path.display(), e)))?
            .len();

        let image = self.loader.load(input_path)?;
        let original_dimensions = image.dimensions();

        let exif = self.metadata_processor.read_metadata(input_path);
        if let Some((make, model)) = exif
            .as_ref()
            .and_then(|exif| self.metadata_processor.get_camera_info(exif))
        {
            log::debug!("{}: shot on {} {}", input_path.display(), make, model);
        }

        let image = self.resizer.resize(image);
        let dimensions = image.dimensions();
        let resized = dimensions != original_dimensions;

        let exif_block = match (&exif, self.format.supports_exif()) {
            (Some(exif), true) => self
                .metadata_processor
                .translate(exif, resized.then_some(dimensions)),
            (Some(_), false) => {
                log::debug!(
                    "{} cannot carry EXIF, skipping metadata for {}",
                    self.format,
                    input_path.display()
                );
                None
            }
            (None, _) => None,
        };

        let encoded = self
            .compressor
            .encode(&image, self.format, exif_block.as_deref())?;

        Ok(Transformed {
            bytes: encoded.bytes,
            input_bytes,
            original_dimensions,
            dimensions,
            exif_embedded: encoded.exif_embedded,
        })
    }
}
