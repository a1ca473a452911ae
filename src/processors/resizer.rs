// imgcrunch/src/processors/resizer.rs
use image::{imageops::FilterType, DynamicImage, GenericImageView};

pub struct Resizer {
    max_size: u32,
}

impl Resizer {
    pub fn new(max_size: u32) -> Self {
        Self { max_size }
    }

    pub fn needs_resize(&self, width: u32, height: u32) -> bool {
        self.max_size > 0 && width.max(height) > self.max_size
    }

    /// Shrinks `image` so its longest side equals the limit. Images already
    /// within the limit come back untouched.
    pub fn resize(&self, image: DynamicImage) -> DynamicImage {
        let (orig_width, orig_height) = image.dimensions();
        if !self.needs_resize(orig_width, orig_height) {
            log::debug!("Image dimensions within limit, skipping resize");
            return image;
        }

        let (width, height) = self.calculate_dimensions(orig_width, orig_height);

        log::debug!(
            "Resizing image from {}x{} to {}x{}",
            orig_width,
            orig_height,
            width,
            height
        );

        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    pub fn calculate_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if !self.needs_resize(width, height) {
            return (width, height);
        }

        let target = self.max_size;
        if width >= height {
            (target, scale_side(height, target, width))
        } else {
            (scale_side(width, target, height), target)
        }
    }
}

// side * target / longest, rounded half up, never below one pixel.
fn scale_side(side: u32, target: u32, longest: u32) -> u32 {
    let numerator = side as u64 * target as u64 * 2 + longest as u64;
    let scaled = numerator / (longest as u64 * 2);
    (scaled as u32).max(1)
}
