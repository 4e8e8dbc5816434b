use std::sync::Arc;

use horizon_geom::ChunkPos;

use crate::{Corner, Corners, HeightField};

/// Shared snapshots of a chunk's height field and the eight fields around it.
///
/// Cloning the `Arc`s is all a background job needs to read border rows;
/// it never touches the live chunk map.
#[derive(Clone, Debug)]
pub struct Neighborhood {
    pub center: Arc<HeightField>,
    pub s: Arc<HeightField>,
    pub se: Arc<HeightField>,
    pub e: Arc<HeightField>,
    pub ne: Arc<HeightField>,
    pub n: Arc<HeightField>,
    pub nw: Arc<HeightField>,
    pub w: Arc<HeightField>,
    pub sw: Arc<HeightField>,
}

impl Neighborhood {
    /// Collects the nine fields around `pos`; `None` if any is missing.
    pub fn gather<F>(pos: ChunkPos, mut lookup: F) -> Option<Self>
    where
        F: FnMut(ChunkPos) -> Option<Arc<HeightField>>,
    {
        Some(Self {
            center: lookup(pos)?,
            s: lookup(pos.offset(0, -1))?,
            se: lookup(pos.offset(1, -1))?,
            e: lookup(pos.offset(1, 0))?,
            ne: lookup(pos.offset(1, 1))?,
            n: lookup(pos.offset(0, 1))?,
            nw: lookup(pos.offset(-1, 1))?,
            w: lookup(pos.offset(-1, 0))?,
            sw: lookup(pos.offset(-1, -1))?,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.center.width()
    }

    /// Padded `(width + 3)^2` window. Window coordinate `(wx, wy)` holds the
    /// corner at chunk-local `(wx - 1, wy - 1)`: one row/column from the
    /// south/west for normals, the north/east border row for positions, and
    /// one more north/east row for normals. The south-west cell is unused.
    pub fn padded_window(&self) -> Corners {
        let mut result = Vec::new();
        self.fill_padded_window(&mut result);
        result
    }

    /// Same as [`padded_window`](Self::padded_window) but reuses `result`'s
    /// allocation. Existing contents are discarded.
    pub fn fill_padded_window(&self, result: &mut Corners) {
        let w = self.width();
        let result_w = w + 3;
        result.clear();
        result.reserve(result_w * result_w);

        // South edge
        result.push(Corner::default());
        self.s.copy_corner_row(result, 0, w - 1, w);
        self.se.copy_corner_row(result, 0, w - 1, 2.min(w));

        for y in 0..w {
            self.w.copy_corner_row(result, w - 1, y, 1);
            self.center.copy_corner_row(result, 0, y, w);
            self.e.copy_corner_row(result, 0, y, 2.min(w));
        }

        // Two northern rows
        for y in 0..2.min(w) {
            self.nw.copy_corner_row(result, w - 1, y, 1);
            self.n.copy_corner_row(result, 0, y, w);
            self.ne.copy_corner_row(result, 0, y, 2.min(w));
        }

        // A one-wide field cannot lend a second row or column; repeat the
        // outermost one so the window stays square.
        if w == 1 {
            pad_single_width(result, result_w);
        }

        debug_assert_eq!(result.len(), result_w * result_w);
    }
}

fn pad_single_width(rows: &mut Corners, result_w: usize) {
    // Rows so far are 3 wide (w + 2); widen each to 4 and add a fourth row.
    let narrow = result_w - 1;
    let mut out = Vec::with_capacity(result_w * result_w);
    for row in rows.chunks(narrow) {
        out.extend_from_slice(row);
        out.push(row[narrow - 1]);
    }
    let last = out[out.len() - result_w..].to_vec();
    out.extend(last);
    *rows = out;
}
