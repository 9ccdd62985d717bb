//! Affine pixel-to-coordinate transforms.

use serde::{Deserialize, Serialize};

use crate::error::{GeoError, GeoResult};

/// A 2-D affine transform from pixel space `(col, row)` to coordinate space
/// `(x, y)`:
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
///
/// Coefficients follow the rasterio/`affine` ordering, not GDAL's
/// geotransform ordering (see [`Affine::from_gdal`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// North-up transform anchored at the top-left corner `(west, north)`.
    pub fn north_up(west: f64, north: f64, res_x: f64, res_y: f64) -> Self {
        Self::new(res_x, 0.0, west, 0.0, -res_y, north)
    }

    /// Convert from a GDAL geotransform `(c, a, b, f, d, e)`.
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self::new(gt[1], gt[2], gt[0], gt[4], gt[5], gt[3])
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// True when the transform has no rotation or shear terms.
    pub fn is_rectilinear(&self) -> bool {
        self.b == 0.0 && self.d == 0.0
    }

    /// Map a pixel-space point to coordinate space.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// The inverse transform (coordinate space to pixel space).
    pub fn inverse(&self) -> GeoResult<Affine> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(GeoError::NonInvertibleTransform(det));
        }
        let ra = self.e / det;
        let rb = -self.b / det;
        let rd = -self.d / det;
        let re = self.a / det;
        Ok(Affine::new(
            ra,
            rb,
            -self.c * ra - self.f * rb,
            rd,
            re,
            -self.c * rd - self.f * re,
        ))
    }

    /// Fractional `(row, col)` of a coordinate, with no rounding applied.
    pub fn rowcol(&self, x: f64, y: f64) -> GeoResult<(f64, f64)> {
        let (col, row) = self.inverse()?.apply(x, y);
        Ok((row, col))
    }

    /// Feed the exact bit patterns into a hasher (used for graph tokens).
    pub fn hash_bits<H: std::hash::Hasher>(&self, state: &mut H) {
        use std::hash::Hash;
        for v in [self.a, self.b, self.c, self.d, self.e, self.f] {
            v.to_bits().hash(state);
        }
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}
