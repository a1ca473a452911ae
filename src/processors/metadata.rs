// imgcrunch/src/processors/metadata.rs
use crate::core::{CrunchError, Result};
use exif::experimental::Writer;
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const MARKER_SOI: u8 = 0xD8;
const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;
// Segment length field counts itself, so the payload tops out at 65533 bytes.
const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

// Tags describing the pixel layout of the source container. They are
// meaningless once the pixels are re-encoded.
const LAYOUT_TAGS: [Tag; 7] = [
    Tag::ImageWidth,
    Tag::ImageLength,
    Tag::BitsPerSample,
    Tag::Compression,
    Tag::PhotometricInterpretation,
    Tag::SamplesPerPixel,
    Tag::PlanarConfiguration,
];

pub struct MetadataProcessor;

impl MetadataProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Reads the EXIF block from any container kamadak-exif understands.
    /// Unreadable metadata is logged and treated as absent.
    pub fn read_metadata(&self, path: &Path) -> Option<Exif> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("Failed to open {} for EXIF: {}", path.display(), e);
                return None;
            }
        };
        let mut bufreader = BufReader::new(file);

        match Reader::new().read_from_container(&mut bufreader) {
            Ok(exif) => {
                log::debug!("Found EXIF data in {}", path.display());
                Some(exif)
            }
            Err(exif::Error::NotFound(_)) => {
                log::debug!("No EXIF data found in {}", path.display());
                None
            }
            Err(e) => {
                log::warn!("Ignoring unreadable EXIF in {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Re-serializes the primary IFD fields as a standalone TIFF-structured
    /// block. `dimensions` rewrites PixelXDimension/PixelYDimension when the
    /// image was resized. Falls back to the source bytes if rewriting fails.
    pub fn translate(&self, exif: &Exif, dimensions: Option<(u32, u32)>) -> Option<Vec<u8>> {
        let fields: Vec<Field> = exif
            .fields()
            .filter(|field| field.ifd_num == In::PRIMARY)
            .filter(|field| !LAYOUT_TAGS.contains(&field.tag))
            .map(|field| match (field.tag, dimensions) {
                (Tag::PixelXDimension, Some((width, _))) => Field {
                    tag: field.tag,
                    ifd_num: field.ifd_num,
                    value: Value::Long(vec![width]),
                },
                (Tag::PixelYDimension, Some((_, height))) => Field {
                    tag: field.tag,
                    ifd_num: field.ifd_num,
                    value: Value::Long(vec![height]),
                },
                _ => field.clone(),
            })
            .collect();

        if fields.is_empty() {
            return None;
        }

        let mut writer = Writer::new();
        for field in &fields {
            writer.push_field(field);
        }

        let mut buffer = Cursor::new(Vec::new());
        match writer.write(&mut buffer, exif.little_endian()) {
            Ok(()) => Some(buffer.into_inner()),
            Err(e) => {
                log::debug!("EXIF rewrite failed ({}), keeping source block", e);
                let raw = exif.buf();
                (raw.len() <= MAX_SEGMENT_PAYLOAD - EXIF_HEADER.len()).then(|| raw.to_vec())
            }
        }
    }

    /// Inserts `tiff` as an APP1 Exif segment into an encoded JPEG, after the
    /// SOI marker and the JFIF APP0 segment if one is present. Blocks too
    /// large for a single segment are dropped with a warning.
    pub fn embed_in_jpeg(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>> {
        if jpeg.len() < 4 || jpeg[0] != 0xFF || jpeg[1] != MARKER_SOI {
            return Err(CrunchError::Encode(
                "encoder produced data without a JPEG SOI marker".to_string(),
            ));
        }

        let payload_len = EXIF_HEADER.len() + tiff.len();
        if payload_len > MAX_SEGMENT_PAYLOAD {
            log::warn!(
                "EXIF block of {} bytes does not fit a JPEG segment, dropping it",
                tiff.len()
            );
            return Ok(jpeg.to_vec());
        }

        let mut insert_at = 2;
        if jpeg[2] == 0xFF && jpeg[3] == MARKER_APP0 && jpeg.len() >= 6 {
            let app0_len = u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
            insert_at = (2 + 2 + app0_len).min(jpeg.len());
        }

        let segment_len = (payload_len + 2) as u16;
        let mut output = Vec::with_capacity(jpeg.len() + payload_len + 4);
        output.extend_from_slice(&jpeg[..insert_at]);
        output.extend_from_slice(&[0xFF, MARKER_APP1]);
        output.extend_from_slice(&segment_len.to_be_bytes());
        output.extend_from_slice(EXIF_HEADER);
        output.extend_from_slice(tiff);
        output.extend_from_slice(&jpeg[insert_at..]);

        Ok(output)
    }

    pub fn get_camera_info(&self, exif: &Exif) -> Option<(String, String)> {
        let make = exif
            .get_field(Tag::Make, In::PRIMARY)
            .map(|f| f.display_value().to_string());
        let model = exif
            .get_field(Tag::Model, In::PRIMARY)
            .map(|f| f.display_value().to_string());

        match (make, model) {
            (Some(m), Some(modl)) => Some((m, modl)),
            _ => None,
        }
    }
}

impl Default for MetadataProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A small EXIF block with camera, orientation and pixel-size fields.
    pub fn sample_exif_block(width: u32, height: u32) -> Vec<u8> {
        let make = Field {
            tag: Tag::Make,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![b"Acme".to_vec()]),
        };
        let model = Field {
            tag: Tag::Model,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![b"Shooter 9".to_vec()]),
        };
        let orientation = Field {
            tag: Tag::Orientation,
            ifd_num: In::PRIMARY,
            value: Value::Short(vec![6]),
        };
        let pixel_x = Field {
            tag: Tag::PixelXDimension,
            ifd_num: In::PRIMARY,
            value: Value::Long(vec![width]),
        };
        let pixel_y = Field {
            tag: Tag::PixelYDimension,
            ifd_num: In::PRIMARY,
            value: Value::Long(vec![height]),
        };

        let mut writer = Writer::new();
        writer.push_field(&make);
        writer.push_field(&model);
        writer.push_field(&orientation);
        writer.push_field(&pixel_x);
        writer.push_field(&pixel_y);

        let mut buffer = Cursor::new(Vec::new());
        writer.write(&mut buffer, false).unwrap();
        buffer.into_inner()
    }

    /// Writes a JPEG of the given size carrying `sample_exif_block`.
    pub fn write_jpeg_with_exif(path: &Path, width: u32, height: u32) {
        let image = image::RgbImage::from_pixel(width, height, image::Rgb([120, 80, 40]));
        let mut encoded = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut encoded, 90)
            .encode(image.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        let with_exif =
            MetadataProcessor::embed_in_jpeg(&encoded, &sample_exif_block(width, height)).unwrap();
        std::fs::write(path, with_exif).unwrap();
    }
}
