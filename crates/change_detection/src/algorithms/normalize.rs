use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageReader, imageops::FilterType};

use crate::{
    error::{ChangeDetectionError, Result},
    traits::ImageNormalizer,
    types::{ImageRole, NormalizedPair},
};

/// Grid used when the "before" image header cannot be read
pub const FALLBACK_SIZE: (u32, u32) = (512, 512);

/// Resizes both snapshots to the "before" image's size and converts to luma
#[derive(Debug, Clone)]
pub struct GrayscaleNormalizer {
    pub filter: FilterType,
}

impl Default for GrayscaleNormalizer {
    fn default() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }
}

impl ImageNormalizer for GrayscaleNormalizer {
    fn normalize(&self, before: &[u8], after: &[u8]) -> Result<NormalizedPair> {
        let (width, height) = canonical_size(before);

        let before = decode(before, ImageRole::Before)?;
        let after = decode(after, ImageRole::After)?;

        Ok(NormalizedPair {
            before: to_grid(before, width, height, self.filter),
            after: to_grid(after, width, height, self.filter),
        })
    }
}

/// Dimensions from the image header, or [`FALLBACK_SIZE`] if unreadable
pub fn canonical_size(bytes: &[u8]) -> (u32, u32) {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok())
        .filter(|&(width, height)| width > 0 && height > 0)
        .unwrap_or(FALLBACK_SIZE)
}

fn decode(bytes: &[u8], role: ImageRole) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|source| ChangeDetectionError::Decode { role, source })
}

fn to_grid(image: DynamicImage, width: u32, height: u32, filter: FilterType) -> GrayImage {
    if image.width() == width && image.height() == height {
        image.to_luma8()
    } else {
        image.resize_exact(width, height, filter).to_luma8()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn encode_png(image: DynamicImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .expect("Should encode PNG");
        buffer.into_inner()
    }

    #[test]
    fn test_sizes_follow_before_image() {
        let before = encode_png(DynamicImage::ImageRgb8(RgbImage::new(40, 30)));
        let after = encode_png(DynamicImage::ImageRgb8(RgbImage::new(80, 90)));

        let pair = GrayscaleNormalizer::default()
            .normalize(&before, &after)
            .expect("Should normalize");
        assert_eq!(pair.before.dimensions(), (40, 30));
        assert_eq!(pair.after.dimensions(), (40, 30));
    }

    #[test]
    fn test_color_converted_to_single_channel() {
        let white = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let bytes = encode_png(DynamicImage::ImageRgb8(white));

        let pair = GrayscaleNormalizer::default()
            .normalize(&bytes, &bytes)
            .expect("Should normalize");
        assert_eq!(pair.before.as_raw().len(), 16);
        assert!(pair.before.as_raw().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_unreadable_header_falls_back() {
        assert_eq!(canonical_size(b"not an image"), FALLBACK_SIZE);
        assert_eq!(canonical_size(&[]), FALLBACK_SIZE);
    }

    #[test]
    fn test_decode_failure_names_the_image() {
        let good = encode_png(DynamicImage::ImageLuma8(GrayImage::new(2, 2)));

        let err = GrayscaleNormalizer::default()
            .normalize(&good, b"garbage")
            .unwrap_err();
        assert!(matches!(
            err,
            ChangeDetectionError::Decode { role: ImageRole::After, .. }
        ));

        let err = GrayscaleNormalizer::default()
            .normalize(b"garbage", &good)
            .unwrap_err();
        assert!(matches!(
            err,
            ChangeDetectionError::Decode { role: ImageRole::Before, .. }
        ));
    }
}
