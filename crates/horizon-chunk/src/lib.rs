//! Height-field storage for terrain chunks, border borrowing, and corner sampling.
#![forbid(unsafe_code)]

mod io;
mod neighborhood;
pub mod sampler;

use std::fmt;
use std::sync::Arc;

pub use io::{read_corners, write_corners};
pub use neighborhood::Neighborhood;
pub use sampler::CellHeights;

/// One height sample at a grid-cell vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Corner {
    /// Height in `height_step` units.
    pub height: u16,
    /// Terrain type; selects the material and undergrowth rules.
    pub terrain: u8,
}

impl Corner {
    #[inline]
    pub const fn new(height: u16, terrain: u8) -> Self {
        Self { height, terrain }
    }
}

pub type Corners = Vec<Corner>;

#[derive(Debug)]
pub enum HeightFieldError {
    SizeMismatch { width: usize, len: usize },
    Io(std::io::Error),
}

impl fmt::Display for HeightFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeightFieldError::SizeMismatch { width, len } => write!(
                f,
                "corner buffer holds {} corners, expected {}x{}",
                len, width, width
            ),
            HeightFieldError::Io(e) => write!(f, "corner i/o failed: {}", e),
        }
    }
}

impl std::error::Error for HeightFieldError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeightFieldError::Io(e) => Some(e),
            HeightFieldError::SizeMismatch { .. } => None,
        }
    }
}

impl From<std::io::Error> for HeightFieldError {
    fn from(e: std::io::Error) -> Self {
        HeightFieldError::Io(e)
    }
}

/// Dense `width x width` grid of corners owned by one chunk.
///
/// Immutable once built; chunks share it with background jobs through an
/// `Arc`, and edits replace the whole field.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    width: usize,
    corners: Corners,
    lowest: u16,
}

impl HeightField {
    /// Takes ownership of `corners`; the buffer is moved, not copied.
    pub fn new(width: usize, corners: Corners) -> Result<Self, HeightFieldError> {
        if width == 0 || corners.len() != width * width {
            return Err(HeightFieldError::SizeMismatch {
                width,
                len: corners.len(),
            });
        }
        let lowest = corners.iter().map(|c| c.height).min().unwrap_or(0);
        Ok(Self {
            width,
            corners,
            lowest,
        })
    }

    pub fn flat(width: usize, height: u16, terrain: u8) -> Self {
        Self {
            width,
            corners: vec![Corner::new(height, terrain); width * width],
            lowest: height,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn corners(&self) -> &[Corner] {
        &self.corners
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        x + y * self.width
    }

    #[inline]
    pub fn corner(&self, x: usize, y: usize) -> Corner {
        self.corners[self.idx(x, y)]
    }

    #[inline]
    pub fn height(&self, x: usize, y: usize) -> u16 {
        self.corner(x, y).height
    }

    /// Lowest corner height, kept in sync with the corners.
    #[inline]
    pub fn lowest_height(&self) -> u16 {
        self.lowest
    }

    /// Height at `(x, y)` where either coordinate may equal `width`; those
    /// coordinates are read from the north, north-east or east neighbor.
    pub fn height_with_neighbors(
        &self,
        x: usize,
        y: usize,
        ngb_n: &HeightField,
        ngb_ne: &HeightField,
        ngb_e: &HeightField,
    ) -> u16 {
        let w = self.width;
        debug_assert!(x <= w && y <= w);
        match (x < w, y < w) {
            (true, true) => self.height(x, y),
            (true, false) => ngb_n.height(x, 0),
            (false, true) => ngb_e.height(0, y),
            (false, false) => ngb_ne.height(0, 0),
        }
    }

    /// Heights of the four corners of cell `(x, y)` in world units, relative
    /// to `base_height`.
    #[allow(clippy::too_many_arguments)]
    pub fn cell_heights(
        &self,
        x: usize,
        y: usize,
        ngb_n: &HeightField,
        ngb_ne: &HeightField,
        ngb_e: &HeightField,
        base_height: i32,
        height_step: f32,
    ) -> CellHeights {
        let h = |cx: usize, cy: usize| {
            let raw = i32::from(self.height_with_neighbors(cx, cy, ngb_n, ngb_ne, ngb_e));
            (raw - base_height) as f32 * height_step
        };
        CellHeights {
            sw: h(x, y),
            se: h(x + 1, y),
            ne: h(x + 1, y + 1),
            nw: h(x, y + 1),
        }
    }

    /// Appends `count` corners of row `y` starting at column `x`.
    pub fn copy_corner_row(&self, dest: &mut Corners, x: usize, y: usize, count: usize) {
        debug_assert!(x + count <= self.width && y < self.width);
        let start = self.idx(x, y);
        dest.extend_from_slice(&self.corners[start..start + count]);
    }

    /// Most common terrain type; ties resolve to the lowest id.
    pub fn dominant_terrain(&self) -> u8 {
        let mut counts = [0u32; 256];
        for c in &self.corners {
            counts[c.terrain as usize] += 1;
        }
        let mut best = 0usize;
        for (i, n) in counts.iter().enumerate() {
            if *n > counts[best] {
                best = i;
            }
        }
        best as u8
    }

    /// Writes the raw corner sequence.
    pub fn write<W: std::io::Write>(&self, sink: &mut W) -> Result<(), HeightFieldError> {
        write_corners(sink, &self.corners)
    }

    pub fn into_shared(self) -> Arc<HeightField> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, base: u16) -> HeightField {
        let corners = (0..width * width)
            .map(|i| Corner::new(base + i as u16, (i % 3) as u8))
            .collect();
        HeightField::new(width, corners).unwrap()
    }

    #[test]
    fn new_rejects_wrong_size() {
        let err = HeightField::new(4, vec![Corner::default(); 15]).unwrap_err();
        assert!(matches!(
            err,
            HeightFieldError::SizeMismatch { width: 4, len: 15 }
        ));
        assert!(HeightField::new(0, Vec::new()).is_err());
    }

    #[test]
    fn lowest_height_tracks_corners() {
        let mut corners = vec![Corner::new(50, 0); 9];
        corners[4].height = 7;
        let f = HeightField::new(3, corners).unwrap();
        assert_eq!(f.lowest_height(), 7);
        assert_eq!(HeightField::flat(2, 12, 0).lowest_height(), 12);
    }

    #[test]
    fn border_coordinates_borrow_from_neighbors() {
        let c = ramp(4, 0);
        let n = ramp(4, 100);
        let ne = ramp(4, 200);
        let e = ramp(4, 300);
        assert_eq!(c.height_with_neighbors(2, 3, &n, &ne, &e), c.height(2, 3));
        assert_eq!(c.height_with_neighbors(2, 4, &n, &ne, &e), n.height(2, 0));
        assert_eq!(c.height_with_neighbors(4, 1, &n, &ne, &e), e.height(0, 1));
        assert_eq!(c.height_with_neighbors(4, 4, &n, &ne, &e), ne.height(0, 0));
    }

    #[test]
    fn copy_corner_row_appends() {
        let f = ramp(4, 0);
        let mut out = vec![Corner::new(999, 9)];
        f.copy_corner_row(&mut out, 1, 2, 3);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].height, 999);
        assert_eq!(out[1], f.corner(1, 2));
        assert_eq!(out[3], f.corner(3, 2));
    }

    #[test]
    fn dominant_terrain_prefers_majority() {
        let mut corners = vec![Corner::new(0, 4); 9];
        corners[0].terrain = 1;
        corners[1].terrain = 1;
        let f = HeightField::new(3, corners).unwrap();
        assert_eq!(f.dominant_terrain(), 4);
    }
}
