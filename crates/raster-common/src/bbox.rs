//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::error::{GeoError, GeoResult};

/// An axis-aligned bounding box in the raster's coordinate space.
///
/// Ordered `(min_x, min_y, max_x, max_y)`, the same order STAC `proj:bbox`
/// and rasterio use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Build from a `(min_x, min_y, max_x, max_y)` tuple.
    pub fn from_tuple(t: (f64, f64, f64, f64)) -> Self {
        Self::new(t.0, t.1, t.2, t.3)
    }

    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Reject non-finite coordinates and inverted extents.
    ///
    /// Zero-area boxes are allowed; they simply never overlap anything.
    pub fn validate(&self) -> GeoResult<()> {
        let t = self.as_tuple();
        if ![t.0, t.1, t.2, t.3].iter().all(|v| v.is_finite()) {
            return Err(GeoError::invalid_bounds(t, "non-finite coordinate"));
        }
        if self.min_x > self.max_x || self.min_y > self.max_y {
            return Err(GeoError::invalid_bounds(t, "min exceeds max"));
        }
        Ok(())
    }

    /// Check if this bbox intersects another (touching edges do not count).
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Compute the intersection of two bounding boxes.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }

        Some(BoundingBox {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Feed the exact bit patterns into a hasher (used for graph tokens).
    pub fn hash_bits<H: std::hash::Hasher>(&self, state: &mut H) {
        use std::hash::Hash;
        for v in [self.min_x, self.min_y, self.max_x, self.max_y] {
            v.to_bits().hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersection() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));

        let intersection = a.intersection(&b).unwrap();
        assert_eq!(intersection.as_tuple(), (5.0, 5.0, 10.0, 10.0));
    }

    #[test]
    fn test_validate() {
        assert!(BoundingBox::new(0.0, 0.0, 10.0, 10.0).validate().is_ok());
        assert!(BoundingBox::new(0.0, 0.0, 0.0, 0.0).validate().is_ok());
        assert!(BoundingBox::new(10.0, 0.0, 5.0, 10.0).validate().is_err());
        assert!(BoundingBox::new(f64::NAN, 0.0, 5.0, 10.0).validate().is_err());
        assert!(BoundingBox::new(0.0, 0.0, f64::INFINITY, 10.0)
            .validate()
            .is_err());
    }
}
