use horizon_geom::{Aabb, Vec3};

/// CPU-side triangle mesh with interleaved-by-array vertex attributes.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct MeshBuild {
    pub pos: Vec<f32>,
    pub norm: Vec<f32>,
    pub uv: Vec<f32>,
    pub idx: Vec<u32>,
}

impl MeshBuild {
    /// Pre-reserve capacity for `n_verts` vertices and `n_tris` triangles.
    #[inline]
    pub fn reserve(&mut self, n_verts: usize, n_tris: usize) {
        self.pos.reserve(n_verts * 3);
        self.norm.reserve(n_verts * 3);
        self.uv.reserve(n_verts * 2);
        self.idx.reserve(n_tris * 3);
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.idx.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    /// Appends a vertex and returns its index.
    pub fn push_vertex(&mut self, p: Vec3, n: Vec3, uv: (f32, f32)) -> u32 {
        let i = self.vertex_count() as u32;
        self.pos.extend_from_slice(&[p.x, p.y, p.z]);
        self.norm.extend_from_slice(&[n.x, n.y, n.z]);
        self.uv.extend_from_slice(&[uv.0, uv.1]);
        i
    }

    #[inline]
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.idx.extend_from_slice(&[a, b, c]);
    }

    #[inline]
    pub fn position(&self, i: u32) -> Vec3 {
        let o = i as usize * 3;
        Vec3::new(self.pos[o], self.pos[o + 1], self.pos[o + 2])
    }

    #[inline]
    pub fn normal(&self, i: u32) -> Vec3 {
        let o = i as usize * 3;
        Vec3::new(self.norm[o], self.norm[o + 1], self.norm[o + 2])
    }

    /// Appends a triangle over existing vertices, swapping the winding when
    /// the geometric normal of `a, b, c` points away from `facing`.
    pub fn push_triangle_facing(&mut self, a: u32, b: u32, c: u32, facing: Vec3) {
        let pa = self.position(a);
        let n = (self.position(b) - pa).cross(self.position(c) - pa);
        if n.dot(facing) < 0.0 {
            self.push_triangle(a, c, b);
        } else {
            self.push_triangle(a, b, c);
        }
    }

    /// Appends `other` with every position and normal passed through
    /// `transform`; indices are rebased onto this mesh.
    pub fn append_transformed<F>(&mut self, other: &MeshBuild, mut transform: F)
    where
        F: FnMut(Vec3, Vec3) -> (Vec3, Vec3),
    {
        let base = self.vertex_count() as u32;
        self.reserve(other.vertex_count(), other.triangle_count());
        for i in 0..other.vertex_count() as u32 {
            let (p, n) = transform(other.position(i), other.normal(i));
            let o = i as usize * 2;
            self.push_vertex(p, n, (other.uv[o], other.uv[o + 1]));
        }
        self.idx.extend(other.idx.iter().map(|i| i + base));
    }

    pub fn bbox(&self) -> Aabb {
        let mut bb = Aabb::EMPTY;
        for p in self.pos.chunks_exact(3) {
            bb.include(Vec3::new(p[0], p[1], p[2]));
        }
        bb
    }

    /// Returns a slice of interleaved vertex positions (x,y,z per vertex).
    pub fn positions(&self) -> &[f32] {
        &self.pos
    }

    /// Returns a slice of interleaved vertex normals (x,y,z per vertex).
    pub fn normals(&self) -> &[f32] {
        &self.norm
    }
}
