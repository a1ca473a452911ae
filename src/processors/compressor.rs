// imgcrunch/src/processors/compressor.rs
use crate::core::{CrunchError, OutputFormat, Result};
use crate::processors::MetadataProcessor;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbImage};

const AVIF_SPEED: u8 = 6;

/// Encoded output plus whether the EXIF block actually made it in.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub exif_embedded: bool,
}

pub struct Compressor {
    quality: u8,
    avif_speed: u8,
}

impl Compressor {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            avif_speed: AVIF_SPEED,
        }
    }

    pub fn with_avif_speed(mut self, speed: u8) -> Self {
        self.avif_speed = speed.clamp(1, 10);
        self
    }

    /// Encodes `image` in `format` and embeds `exif` (a raw TIFF-structured
    /// EXIF block) when the container can carry one.
    pub fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        exif: Option<&[u8]>,
    ) -> Result<Encoded> {
        log::debug!(
            "Encoding {}x{} image as {} with quality {}",
            image.width(),
            image.height(),
            format,
            self.quality
        );

        let rgb = flatten_to_rgb(image);

        match format {
            OutputFormat::Jpeg => {
                let encoded = self.encode_jpeg(&rgb)?;
                match exif {
                    Some(block) => {
                        let bytes = MetadataProcessor::embed_in_jpeg(&encoded, block)?;
                        // Oversized blocks come back unchanged.
                        let exif_embedded = bytes.len() > encoded.len();
                        Ok(Encoded {
                            bytes,
                            exif_embedded,
                        })
                    }
                    None => Ok(Encoded {
                        bytes: encoded,
                        exif_embedded: false,
                    }),
                }
            }
            OutputFormat::Avif => self.encode_avif(&rgb, exif),
            OutputFormat::Heic => self.encode_heic(&rgb, exif),
        }
    }

    fn encode_jpeg(&self, rgb: &RgbImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
        encoder
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
            .map_err(|e| CrunchError::Encode(format!("JPEG: {}", e)))?;
        Ok(buffer)
    }

    #[cfg(feature = "heic")]
    fn encode_avif(&self, rgb: &RgbImage, exif: Option<&[u8]>) -> Result<Encoded> {
        match self.encode_heif(rgb, exif, libheif_rs::CompressionFormat::Av1, "AVIF") {
            Err(CrunchError::UnsupportedFormat(reason)) => {
                log::debug!("{}, falling back to the built-in AVIF encoder", reason);
                self.encode_avif_plain(rgb)
            }
            other => other,
        }
    }

    #[cfg(not(feature = "heic"))]
    fn encode_avif(&self, rgb: &RgbImage, exif: Option<&[u8]>) -> Result<Encoded> {
        if exif.is_some() {
            log::debug!("AVIF output carries no EXIF without the 'heic' feature, dropping metadata");
        }
        self.encode_avif_plain(rgb)
    }

    fn encode_avif_plain(&self, rgb: &RgbImage) -> Result<Encoded> {
        let mut buffer = Vec::new();
        let encoder = AvifEncoder::new_with_speed_quality(&mut buffer, self.avif_speed, self.quality);
        encoder
            .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
            .map_err(|e| CrunchError::Encode(format!("AVIF: {}", e)))?;
        Ok(Encoded {
            bytes: buffer,
            exif_embedded: false,
        })
    }

    #[cfg(feature = "heic")]
    fn encode_heic(&self, rgb: &RgbImage, exif: Option<&[u8]>) -> Result<Encoded> {
        self.encode_heif(rgb, exif, libheif_rs::CompressionFormat::Hevc, "HEIC")
    }

    #[cfg(not(feature = "heic"))]
    fn encode_heic(&self, _rgb: &RgbImage, _exif: Option<&[u8]>) -> Result<Encoded> {
        Err(CrunchError::UnsupportedFormat(
            "HEIC encoding requires the 'heic' feature".to_string(),
        ))
    }

    /// HEIC and AVIF share libheif's container writer, including its EXIF item.
    #[cfg(feature = "heic")]
    fn encode_heif(
        &self,
        rgb: &RgbImage,
        exif: Option<&[u8]>,
        compression: libheif_rs::CompressionFormat,
        label: &str,
    ) -> Result<Encoded> {
        use libheif_rs::{Channel, ColorSpace, EncoderQuality, HeifContext, Image, LibHeif, RgbChroma};

        let encode_err = |e: libheif_rs::HeifError| CrunchError::Encode(format!("{}: {}", label, e));

        let (width, height) = rgb.dimensions();
        let row_bytes = width as usize * 3;

        let mut heif_image =
            Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgb)).map_err(encode_err)?;
        heif_image
            .create_plane(Channel::Interleaved, width, height, 8)
            .map_err(encode_err)?;

        {
            let planes = heif_image.planes_mut();
            let mut plane = planes.interleaved.ok_or_else(|| {
                CrunchError::Encode(format!("{}: missing interleaved plane", label))
            })?;
            let stride = plane.stride;
            for (y, row) in rgb.as_raw().chunks(row_bytes).enumerate() {
                let start = y * stride;
                plane.data[start..start + row_bytes].copy_from_slice(row);
            }
        }

        let lib_heif = LibHeif::new();
        let mut context = HeifContext::new().map_err(encode_err)?;
        let mut encoder = lib_heif.encoder_for_format(compression).map_err(|e| {
            CrunchError::UnsupportedFormat(format!("no libheif {} encoder: {}", label, e))
        })?;
        encoder
            .set_quality(EncoderQuality::Lossy(self.quality))
            .map_err(encode_err)?;

        let handle = context
            .encode_image(&heif_image, &mut encoder, None)
            .map_err(encode_err)?;

        let exif_embedded = match exif {
            Some(block) => match context.add_exif_metadata(&handle, block) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Could not attach EXIF to {} output: {}", label, e);
                    false
                }
            },
            None => false,
        };

        let bytes = context.write_to_bytes().map_err(encode_err)?;
        Ok(Encoded {
            bytes,
            exif_embedded,
        })
    }
}

/// Composites transparent pixels onto white; opaque images are just converted.
pub fn flatten_to_rgb(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in rgb.pixels_mut().zip(rgba.pixels()) {
        let alpha = src[3] as u32;
        for c in 0..3 {
            let blended = (src[c] as u32 * alpha + 255 * (255 - alpha) + 127) / 255;
            dst[c] = blended as u8;
        }
    }
    rgb
}
