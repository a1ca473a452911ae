// imgcrunch/src/processors/loader.rs
use crate::core::types::SourceFormat;
use crate::core::{CrunchError, Result, MAX_DIMENSION_LIMIT};
use image::{DynamicImage, GenericImageView, ImageReader};
use std::path::Path;

#[derive(Clone)]
pub struct Loader {
    max_dimensions: Option<(u32, u32)>,
}

impl Loader {
    pub fn new() -> Self {
        Self {
            max_dimensions: Some((MAX_DIMENSION_LIMIT, MAX_DIMENSION_LIMIT)),
        }
    }

    pub fn load(&self, path: &Path) -> Result<DynamicImage> {
        log::debug!("Loading image from: {}", path.display());

        self.validate_path(path)?;

        let image = match SourceFormat::from_path(path) {
            Some(SourceFormat::Heif | SourceFormat::Avif) => self.load_heif(path)?,
            _ => self.load_raster(path)?,
        };

        let (width, height) = image.dimensions();
        if let Some((max_w, max_h)) = self.max_dimensions {
            if width > max_w || height > max_h {
                return Err(CrunchError::Decode(format!(
                    "Image dimensions {}x{} exceed maximum {}x{}",
                    width, height, max_w, max_h
                )));
            }
        }

        log::debug!(
            "Loaded image: {}x{} pixels, color: {:?}",
            width,
            height,
            image.color()
        );

        Ok(image)
    }

    fn load_raster(&self, path: &Path) -> Result<DynamicImage> {
        let decode_err = |e: &dyn std::fmt::Display| {
            CrunchError::Decode(format!("{}: {}", path.display(), e))
        };

        ImageReader::open(path)
            .map_err(|e| decode_err(&e))?
            .with_guessed_format()
            .map_err(|e| decode_err(&e))?
            .decode()
            .map_err(|e| decode_err(&e))
    }

    #[cfg(feature = "heic")]
    fn load_heif(&self, path: &Path) -> Result<DynamicImage> {
        use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

        let decode_err = |e: libheif_rs::HeifError| {
            CrunchError::Decode(format!("{}: {}", path.display(), e))
        };

        let path_str = path
            .to_str()
            .ok_or_else(|| CrunchError::Decode(format!("Non UTF-8 path: {}", path.display())))?;
        let lib_heif = LibHeif::new();
        let context = HeifContext::read_from_file(path_str).map_err(decode_err)?;
        let handle = context.primary_image_handle().map_err(decode_err)?;
        let decoded = lib_heif
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .map_err(decode_err)?;

        let planes = decoded.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| CrunchError::Decode(format!("{}: no RGB plane", path.display())))?;

        let width = plane.width;
        let height = plane.height;
        let row_bytes = width as usize * 3;
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in plane.data.chunks(plane.stride).take(height as usize) {
            pixels.extend_from_slice(&row[..row_bytes]);
        }

        image::RgbImage::from_raw(width, height, pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| CrunchError::Decode(format!("{}: truncated HEIF plane", path.display())))
    }

    #[cfg(not(feature = "heic"))]
    fn load_heif(&self, path: &Path) -> Result<DynamicImage> {
        Err(CrunchError::Decode(format!(
            "{}: HEIC/HEIF/AVIF decoding requires the 'heic' feature",
            path.display()
        )))
    }

    fn validate_path(&self, path: &Path) -> Result<()> {
        let metadata = path.metadata().map_err(|e| {
            CrunchError::Decode(format!("{}: {}", path.display(), e))
        })?;

        if metadata.len() == 0 {
            return Err(CrunchError::Decode(format!(
                "File is empty: {}",
                path.display()
            )));
        }

        Ok(())
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
