use chrono::{DateTime, Utc};
use geo_common::PixelBounds;
use image::{GrayImage, ImageEncoder, codecs::png::PngEncoder};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use ts_rs::TS;

use crate::error::{ChangeDetectionError, Result};

/// Mask value of a changed pixel
pub const CHANGED: u8 = 255;

/// Which of the two snapshots an image belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ImageRole {
    Before,
    After,
}

/// One connected group of changed pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChangedRegion {
    /// Inclusive pixel rectangle `[minX, minY, maxX, maxY]`
    #[ts(type = "[number, number, number, number]")]
    pub bounds: PixelBounds,
    /// `min(pixel_count / 100, 1.0)`; a size proxy, not a probability
    pub confidence: f64,
}

/// Output of one detection run, and the unit stored in the result cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChangeDetectionResult {
    pub change_percentage: f64,
    pub changed_areas: Vec<ChangedRegion>,
    /// Raw "before" imagery as returned by the provider
    #[serde(with = "base64_bytes")]
    #[ts(type = "string")]
    pub before_image: Vec<u8>,
    #[serde(with = "base64_bytes")]
    #[ts(type = "string")]
    pub after_image: Vec<u8>,
    /// PNG rendering of the change mask
    #[serde(with = "base64_bytes")]
    #[ts(type = "string")]
    pub difference_image: Vec<u8>,
    /// When the result was computed (not when it was served)
    pub timestamp: DateTime<Utc>,
}

impl ChangeDetectionResult {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// The two snapshots after alignment: identical dimensions, one byte per pixel
#[derive(Debug, Clone)]
pub struct NormalizedPair {
    pub before: GrayImage,
    pub after: GrayImage,
}

/// Binary image marking changed (255) and unchanged (0) pixels
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeMask {
    image: GrayImage,
}

impl ChangeMask {
    /// Build a mask from a per-pixel predicate
    pub fn from_fn(width: u32, height: u32, changed: impl Fn(u32, u32) -> bool) -> Self {
        let image = GrayImage::from_fn(width, height, |x, y| {
            image::Luma([if changed(x, y) { CHANGED } else { 0 }])
        });
        Self { image }
    }

    /// Wrap raw mask bytes; any value other than 255 counts as unchanged
    pub fn from_raw(width: u32, height: u32, mut data: Vec<u8>) -> Result<Self> {
        for value in data.iter_mut() {
            if *value != CHANGED {
                *value = 0;
            }
        }
        let len = data.len();
        let image = GrayImage::from_raw(width, height, data).ok_or_else(|| {
            ChangeDetectionError::ImageProcessing(format!(
                "mask of {len} bytes does not fit {width}x{height}"
            ))
        })?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Row-major mask bytes
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Encode the mask as a single-channel PNG
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        PngEncoder::new(&mut buffer).write_image(
            self.image.as_raw(),
            self.image.width(),
            self.image.height(),
            image::ExtendedColorType::L8,
        )?;
        Ok(buffer)
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }
}

/// Thresholded difference of two snapshots
#[derive(Debug, Clone)]
pub struct DifferenceOutput {
    pub mask: ChangeMask,
    pub changed_pixel_count: u64,
    /// `changed_pixel_count / total_pixels * 100`
    pub change_percentage: f64,
}

/// Everything the pipeline derives from one pair of images
#[derive(Debug, Clone)]
pub struct ChangeAnalysis {
    pub width: u32,
    pub height: u32,
    pub changed_pixel_count: u64,
    pub change_percentage: f64,
    pub changed_areas: Vec<ChangedRegion>,
    /// PNG rendering of the change mask
    pub difference_image: Vec<u8>,
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
