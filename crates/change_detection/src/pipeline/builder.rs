use crate::{
    pipeline::Pipeline,
    traits::{ImageNormalizer, ChangeDifferencer, RegionSegmenter},
    algorithms::{GrayscaleNormalizer, AbsoluteDifference, FloodFillSegmenter},
};

/// Builder for creating processing pipelines with a fluent API
pub struct PipelineBuilder {
    normalizer: Option<Box<dyn ImageNormalizer>>,
    differencer: Option<Box<dyn ChangeDifferencer>>,
    segmenter: Option<Box<dyn RegionSegmenter>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            normalizer: None,
            differencer: None,
            segmenter: None,
        }
    }

    /// Set the normalizer (replaces any existing one)
    pub fn set_normalizer<N>(mut self, normalizer: N) -> Self
    where
        N: ImageNormalizer + 'static,
    {
        self.normalizer = Some(Box::new(normalizer));
        self
    }

    /// Set the difference engine (replaces any existing one)
    pub fn set_differencer<D>(mut self, differencer: D) -> Self
    where
        D: ChangeDifferencer + 'static,
    {
        self.differencer = Some(Box::new(differencer));
        self
    }

    /// Set the region segmenter (replaces any existing one)
    pub fn set_segmenter<S>(mut self, segmenter: S) -> Self
    where
        S: RegionSegmenter + 'static,
    {
        self.segmenter = Some(Box::new(segmenter));
        self
    }

    /// Build the pipeline with default components if not specified
    pub fn build(self) -> Pipeline {
        let normalizer = self.normalizer
            .unwrap_or_else(|| Box::new(GrayscaleNormalizer::default()));

        let differencer = self.differencer
            .unwrap_or_else(|| Box::new(AbsoluteDifference));

        let segmenter = self.segmenter
            .unwrap_or_else(|| Box::new(FloodFillSegmenter));

        Pipeline::new(normalizer, differencer, segmenter)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
