use geo_common::PixelBounds;

use crate::{
    error::Result,
    traits::RegionSegmenter,
    types::{CHANGED, ChangeMask, ChangedRegion},
};

/// Components smaller than this many pixels are treated as noise
pub const MIN_AREA_SIZE: usize = 10;

/// Pixel count at which confidence saturates at 1.0
pub const FULL_CONFIDENCE_PIXELS: f64 = 100.0;

/// 4-connected component labelling by iterative flood fill
#[derive(Debug, Clone, Default)]
pub struct FloodFillSegmenter;

impl RegionSegmenter for FloodFillSegmenter {
    fn segment(&self, mask: &ChangeMask) -> Result<Vec<ChangedRegion>> {
        let width = mask.width() as usize;
        let height = mask.height() as usize;
        let pixels = mask.as_raw();

        let mut visited = vec![false; width * height];
        let mut stack = Vec::new();
        let mut regions = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let index = y * width + x;
                if visited[index] || pixels[index] != CHANGED {
                    continue;
                }

                let component = flood_fill(pixels, width, height, (x, y), &mut visited, &mut stack);
                if component.pixel_count >= MIN_AREA_SIZE {
                    regions.push(component.into_region()?);
                }
            }
        }

        Ok(regions)
    }
}

/// Extent and size of one connected component
#[derive(Debug, Clone, Copy)]
struct Component {
    pixel_count: usize,
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

impl Component {
    fn seed(x: usize, y: usize) -> Self {
        Self {
            pixel_count: 0,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn add(&mut self, x: usize, y: usize) {
        self.pixel_count += 1;
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    fn into_region(self) -> Result<ChangedRegion> {
        let bounds = PixelBounds::new(
            self.min_x as u32,
            self.min_y as u32,
            self.max_x as u32,
            self.max_y as u32,
        )?;
        Ok(ChangedRegion {
            bounds,
            confidence: confidence(self.pixel_count),
        })
    }
}

/// Size-derived score: `min(pixel_count / 100, 1.0)`
pub fn confidence(pixel_count: usize) -> f64 {
    (pixel_count as f64 / FULL_CONFIDENCE_PIXELS).min(1.0)
}

/// Visit every changed pixel 4-connected to `seed`.
///
/// Uses an explicit stack so large regions cannot overflow the call stack.
/// Pixels are marked when pushed, so each one enters the stack at most once.
fn flood_fill(
    pixels: &[u8],
    width: usize,
    height: usize,
    seed: (usize, usize),
    visited: &mut [bool],
    stack: &mut Vec<(usize, usize)>,
) -> Component {
    let mut component = Component::seed(seed.0, seed.1);

    visited[seed.1 * width + seed.0] = true;
    stack.push(seed);

    while let Some((x, y)) = stack.pop() {
        component.add(x, y);

        let mut visit = |nx: usize, ny: usize| {
            let index = ny * width + nx;
            if !visited[index] && pixels[index] == CHANGED {
                visited[index] = true;
                stack.push((nx, ny));
            }
        };

        if x + 1 < width {
            visit(x + 1, y);
        }
        if x > 0 {
            visit(x - 1, y);
        }
        if y + 1 < height {
            visit(x, y + 1);
        }
        if y > 0 {
            visit(x, y - 1);
        }
    }

    component
}
