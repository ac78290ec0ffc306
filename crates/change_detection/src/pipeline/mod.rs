pub mod builder;

use image::GrayImage;
use crate::{
    error::Result,
    types::ChangeAnalysis,
    traits::{ImageNormalizer, ChangeDifferencer, RegionSegmenter},
};

/// The CPU-bound part of change detection: normalize, difference, segment
pub struct Pipeline {
    normalizer: Box<dyn ImageNormalizer>,
    differencer: Box<dyn ChangeDifferencer>,
    segmenter: Box<dyn RegionSegmenter>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    /// Create a new pipeline with the given components
    pub fn new(
        normalizer: Box<dyn ImageNormalizer>,
        differencer: Box<dyn ChangeDifferencer>,
        segmenter: Box<dyn RegionSegmenter>,
    ) -> Self {
        Self {
            normalizer,
            differencer,
            segmenter,
        }
    }

    /// Analyze two encoded snapshots of the same extent
    pub fn analyze(&self, before: &[u8], after: &[u8]) -> Result<ChangeAnalysis> {
        let pair = self.normalizer.normalize(before, after)?;
        self.compare(&pair.before, &pair.after)
    }

    /// Analyze two already-normalized images.
    ///
    /// The grid is taken from `before`; if `after` holds fewer samples the
    /// missing ones compare as black.
    pub fn compare(&self, before: &GrayImage, after: &GrayImage) -> Result<ChangeAnalysis> {
        let (width, height) = before.dimensions();

        // Step 1: Threshold the per-pixel difference
        let difference = self
            .differencer
            .difference(before.as_raw(), after.as_raw(), width, height)?;

        // Step 2: Group changed pixels into regions
        let changed_areas = self.segmenter.segment(&difference.mask)?;

        // Step 3: Render the mask for display
        let difference_image = difference.mask.to_png()?;

        Ok(ChangeAnalysis {
            width,
            height,
            changed_pixel_count: difference.changed_pixel_count,
            change_percentage: difference.change_percentage,
            changed_areas,
            difference_image,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        builder::PipelineBuilder::new().build()
    }
}
