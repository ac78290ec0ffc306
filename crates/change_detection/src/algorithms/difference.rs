use crate::{
    error::Result,
    traits::ChangeDifferencer,
    types::{CHANGED, ChangeMask, DifferenceOutput},
};

/// Intensity difference above which a pixel counts as changed
pub const CHANGE_THRESHOLD: u8 = 30;

/// Absolute grayscale difference against [`CHANGE_THRESHOLD`]
#[derive(Debug, Clone, Default)]
pub struct AbsoluteDifference;

impl ChangeDifferencer for AbsoluteDifference {
    fn difference(
        &self,
        before: &[u8],
        after: &[u8],
        width: u32,
        height: u32,
    ) -> Result<DifferenceOutput> {
        let total_pixels = width as usize * height as usize;
        let mut mask = vec![0u8; total_pixels];
        let mut changed_pixel_count = 0u64;

        for (i, value) in mask.iter_mut().enumerate() {
            // A sample missing from a short buffer reads as black
            let before_pixel = before.get(i).copied().unwrap_or(0);
            let after_pixel = after.get(i).copied().unwrap_or(0);

            if before_pixel.abs_diff(after_pixel) > CHANGE_THRESHOLD {
                *value = CHANGED;
                changed_pixel_count += 1;
            }
        }

        let change_percentage = if total_pixels == 0 {
            0.0
        } else {
            changed_pixel_count as f64 / total_pixels as f64 * 100.0
        };

        Ok(DifferenceOutput {
            mask: ChangeMask::from_raw(width, height, mask)?,
            changed_pixel_count,
            change_percentage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_buffers_have_no_change() {
        let pixels: Vec<u8> = (0..=255).collect();
        let output = AbsoluteDifference
            .difference(&pixels, &pixels, 16, 16)
            .unwrap();
        assert_eq!(output.changed_pixel_count, 0);
        assert_eq!(output.change_percentage, 0.0);
        assert!(output.mask.as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_threshold_is_strict() {
        let before = [100u8, 100, 100, 100];
        let after = [130u8, 131, 70, 69];
        let output = AbsoluteDifference.difference(&before, &after, 2, 2).unwrap();

        // |30| stays unchanged, |31| flips
        assert_eq!(output.mask.as_raw(), &[0, 255, 0, 255]);
        assert_eq!(output.changed_pixel_count, 2);
        assert_eq!(output.change_percentage, 50.0);
    }

    #[test]
    fn test_short_buffer_reads_as_zero() {
        let before = [200u8; 4];
        let after = [200u8, 200];
        let output = AbsoluteDifference.difference(&before, &after, 2, 2).unwrap();

        assert_eq!(output.mask.as_raw(), &[0, 0, 255, 255]);
        assert_eq!(output.changed_pixel_count, 2);

        // Both short: the missing tail is 0 vs 0, i.e. unchanged
        let output = AbsoluteDifference.difference(&[10], &[], 3, 1).unwrap();
        assert_eq!(output.mask.as_raw(), &[0, 0, 0]);
    }

    #[test]
    fn test_dark_missing_samples_do_not_count() {
        let before = [5u8; 4];
        let output = AbsoluteDifference.difference(&before, &[], 2, 2).unwrap();
        assert_eq!(output.changed_pixel_count, 0);
    }

    #[test]
    fn test_empty_grid() {
        let output = AbsoluteDifference.difference(&[], &[], 0, 0).unwrap();
        assert_eq!(output.changed_pixel_count, 0);
        assert_eq!(output.change_percentage, 0.0);
    }
}
