//! Geospatial records and the mapping from data coordinates to scene space.
//!
//! All positional data is re-centred on the midpoint of the session bounds
//! and stretched horizontally by [`HORIZONTAL_STRETCH`]. The scene is Z-up:
//! x/y span the ground plane, z is height.

use serde::{Deserialize, Serialize};

/// Horizontal stretch applied to re-centred x/y coordinates.
pub const HORIZONTAL_STRETCH: f64 = 2.0;

/// One geospatial sample: a coordinate plus a scalar magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Record {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl Record {
    pub const fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }
}

impl From<[f64; 3]> for Record {
    fn from([x, y, value]: [f64; 3]) -> Self {
        Self { x, y, value }
    }
}

impl From<Record> for [f64; 3] {
    fn from(r: Record) -> Self {
        [r.x, r.y, r.value]
    }
}

/// Axis-aligned data extent `(xmin, ymin, xmax, ymax)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Bounds {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Default for Bounds {
    /// Whole-world longitude/latitude extent.
    fn default() -> Self {
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }
}

impl From<[f64; 4]> for Bounds {
    fn from([xmin, ymin, xmax, ymax]: [f64; 4]) -> Self {
        Self::new(xmin, ymin, xmax, ymax)
    }
}

impl From<Bounds> for [f64; 4] {
    fn from(b: Bounds) -> Self {
        [b.xmin, b.ymin, b.xmax, b.ymax]
    }
}

impl Bounds {
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Arithmetic mean of min/max on each axis.
    pub fn midpoint(&self) -> (f64, f64) {
        ((self.xmin + self.xmax) / 2.0, (self.ymin + self.ymax) / 2.0)
    }

    /// Scene-space transform centred on this extent's midpoint.
    pub fn scene_transform(&self) -> SceneTransform {
        SceneTransform::new(self.midpoint())
    }
}

/// Maps data coordinates into scene space.
///
/// `scene = (data - midpoint) * HORIZONTAL_STRETCH` on x and y. Heights
/// pass through untouched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneTransform {
    pub midpoint: (f64, f64),
}

impl SceneTransform {
    pub const fn new(midpoint: (f64, f64)) -> Self {
        Self { midpoint }
    }

    /// Scene-space x/y of a data coordinate, computed in f64 then narrowed.
    #[inline]
    pub fn ground(&self, x: f64, y: f64) -> [f32; 2] {
        [
            ((x - self.midpoint.0) * HORIZONTAL_STRETCH) as f32,
            ((y - self.midpoint.1) * HORIZONTAL_STRETCH) as f32,
        ]
    }

    /// Scene-space point for a data coordinate at height `z`.
    pub fn point(&self, x: f64, y: f64, z: f64) -> [f32; 3] {
        let [sx, sy] = self.ground(x, y);
        [sx, sy, z as f32]
    }

    /// Scene-space rectangle covering `bounds` grown by `margin` (0.1 = 10%)
    /// around the midpoint. Returned as `(min, max)` corners.
    pub fn padded_rect(&self, bounds: &Bounds, margin: f64) -> ([f32; 2], [f32; 2]) {
        let grow = 1.0 + margin;
        let (mx, my) = self.midpoint;
        let min = self.ground(
            mx + (bounds.xmin - mx) * grow,
            my + (bounds.ymin - my) * grow,
        );
        let max = self.ground(
            mx + (bounds.xmax - mx) * grow,
            my + (bounds.ymax - my) * grow,
        );
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_is_mean_of_extents() {
        let bounds = Bounds::new(-5.14803401, 41.32679241, 9.56688994, 51.09477395);
        let (mx, my) = bounds.midpoint();
        assert!((mx - (-5.14803401 + 9.56688994) / 2.0).abs() < 1e-12);
        assert!((my - (41.32679241 + 51.09477395) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric_bounds_centre_on_origin() {
        assert_eq!(Bounds::new(-1.0, -1.0, 1.0, 1.0).midpoint(), (0.0, 0.0));
    }

    #[test]
    fn test_ground_applies_stretch() {
        let t = SceneTransform::new((1.0, 2.0));
        assert_eq!(t.ground(2.0, 0.0), [2.0, -4.0]);
        assert_eq!(t.point(1.0, 2.0, 7.5), [0.0, 0.0, 7.5]);
    }

    #[test]
    fn test_padded_rect_grows_around_midpoint() {
        let bounds = Bounds::new(-1.0, -2.0, 1.0, 2.0);
        let (min, max) = bounds.scene_transform().padded_rect(&bounds, 0.1);
        assert!((min[0] + 2.2).abs() < 1e-6);
        assert!((min[1] + 4.4).abs() < 1e-6);
        assert!((max[0] - 2.2).abs() < 1e-6);
        assert!((max[1] - 4.4).abs() < 1e-6);
    }

    #[test]
    fn test_record_deserializes_from_triple() {
        let r: Record = serde_json::from_str("[1.5, -2.0, 300.0]").unwrap();
        assert_eq!(r, Record::new(1.5, -2.0, 300.0));
    }
}
