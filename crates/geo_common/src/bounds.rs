use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Result, ValidationError};

/// Axis-aligned rectangle `[min_x, min_y, max_x, max_y]`.
///
/// The same shape describes a geographic query extent and a pixel-space
/// region, so the coordinate space is carried in the type parameter: see
/// [`GeoBounds`] and [`PixelBounds`]. Serializes as a 4-element array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox<T> {
    pub min_x: T,
    pub min_y: T,
    pub max_x: T,
    pub max_y: T,
}

/// Query extent in the reference system of the imagery service
pub type GeoBounds = BoundingBox<f64>;

/// Inclusive pixel rectangle inside a normalized image
pub type PixelBounds = BoundingBox<u32>;

impl<T: PartialOrd + Copy> BoundingBox<T> {
    /// Create a new bounding box, rejecting inverted (or unordered) axes
    pub fn new(min_x: T, min_y: T, max_x: T, max_y: T) -> Result<Self> {
        // `!(a <= b)` so that NaN coordinates are rejected as well
        if !(min_x <= max_x) {
            return Err(ValidationError::InvertedBounds { axis: "X" });
        }
        if !(min_y <= max_y) {
            return Err(ValidationError::InvertedBounds { axis: "Y" });
        }
        Ok(Self { min_x, min_y, max_x, max_y })
    }

    pub fn to_array(&self) -> [T; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

impl GeoBounds {
    /// Build from a loosely-typed slice, as received at the request boundary
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let [min_x, min_y, max_x, max_y] = <[f64; 4]>::try_from(values)
            .map_err(|_| ValidationError::BoundsLength(values.len()))?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::NonFiniteBounds);
        }
        Self::new(min_x, min_y, max_x, max_y)
    }
}

/// Comma-joined coordinates in ECMAScript number notation, e.g. `0,0,100,100`.
///
/// This text is both the `BBOX` query value and part of the cache key, so it
/// must match what a JavaScript client produces with `bounds.join(",")`.
impl fmt::Display for GeoBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            JsNumber(self.min_x),
            JsNumber(self.min_y),
            JsNumber(self.max_x),
            JsNumber(self.max_y)
        )
    }
}

/// Comma-joined pixel coordinates, e.g. `10,10,13,13`
impl fmt::Display for PixelBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// `Number.prototype.toString` for finite values.
///
/// Both notations use the shortest round-trip digits; exponent form applies
/// outside `[1e-6, 1e21)` and always carries a sign.
struct JsNumber(f64);

impl fmt::Display for JsNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0;
        if value == 0.0 {
            // Covers -0.0 too
            return f.write_str("0");
        }

        let magnitude = value.abs();
        if !(1e-6..1e21).contains(&magnitude) && magnitude.is_finite() {
            let exponential = format!("{value:e}");
            return match exponential.split_once('e') {
                Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                    write!(f, "{mantissa}e+{exponent}")
                }
                _ => f.write_str(&exponential),
            };
        }

        write!(f, "{value}")
    }
}

impl<T: Serialize> Serialize for BoundingBox<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        [&self.min_x, &self.min_y, &self.max_x, &self.max_y].serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for BoundingBox<T>
where
    T: Deserialize<'de> + PartialOrd + Copy,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let [min_x, min_y, max_x, max_y] = <[T; 4]>::deserialize(deserializer)?;
        Self::new(min_x, min_y, max_x, max_y).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_join() {
        let bounds = GeoBounds::new(0.0, 0.0, 100.0, 100.0).unwrap();
        assert_eq!(bounds.to_string(), "0,0,100,100");

        let bounds = GeoBounds::new(7.5, -3.25, 8.0, 1.0).unwrap();
        assert_eq!(bounds.to_string(), "7.5,-3.25,8,1");

        let bounds = PixelBounds::new(10, 10, 13, 13).unwrap();
        assert_eq!(bounds.to_string(), "10,10,13,13");
    }

    #[test]
    fn test_display_uses_ecmascript_notation() {
        let bounds = GeoBounds::new(-0.0, 0.0, 1.0, 1.0).unwrap();
        assert_eq!(bounds.to_string(), "0,0,1,1");

        let bounds = GeoBounds::new(1e-7, 0.0, 1e21, 1.0).unwrap();
        assert_eq!(bounds.to_string(), "1e-7,0,1e+21,1");

        let bounds = GeoBounds::new(-1.5e-7, 0.000001, 123456789012345680000.0, 2.5e22).unwrap();
        assert_eq!(bounds.to_string(), "-1.5e-7,0.000001,123456789012345680000,2.5e+22");
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        assert_eq!(
            GeoBounds::new(10.0, 0.0, 5.0, 1.0),
            Err(ValidationError::InvertedBounds { axis: "X" })
        );
        assert_eq!(
            PixelBounds::new(0, 9, 1, 3),
            Err(ValidationError::InvertedBounds { axis: "Y" })
        );
        assert!(GeoBounds::new(f64::NAN, 0.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_from_slice() {
        assert_eq!(
            GeoBounds::from_slice(&[1.0, 2.0, 3.0]),
            Err(ValidationError::BoundsLength(3))
        );
        assert_eq!(
            GeoBounds::from_slice(&[0.0, 0.0, f64::INFINITY, 1.0]),
            Err(ValidationError::NonFiniteBounds)
        );
        let bounds = GeoBounds::from_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(bounds.to_array(), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_serde_as_array() {
        let bounds = PixelBounds::new(1, 2, 3, 4).unwrap();
        let json = serde_json::to_string(&bounds).unwrap();
        assert_eq!(json, "[1,2,3,4]");

        let parsed: PixelBounds = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bounds);

        assert!(serde_json::from_str::<PixelBounds>("[5,0,1,1]").is_err());
        assert!(serde_json::from_str::<GeoBounds>("[0,0,1]").is_err());
    }
}
