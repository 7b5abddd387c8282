//! Flat triangle mesh shared by every reader and writer.

/// Indexed triangle list. `indices.len()` is always a multiple of three.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriMesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl TriMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Push a vertex and return its index.
    pub fn push_vertex(&mut self, p: [f32; 3]) -> u32 {
        self.positions.push(p);
        (self.positions.len() - 1) as u32
    }

    /// Triangulate a convex polygon as a fan around its first vertex.
    ///
    /// Polygons with fewer than three corners are ignored.
    pub fn push_polygon(&mut self, corners: &[u32]) {
        if corners.len() < 3 {
            return;
        }
        for t in 1..corners.len() - 1 {
            self.indices
                .extend_from_slice(&[corners[0], corners[t], corners[t + 1]]);
        }
    }

    /// Append `other`, rebasing its indices past our vertices.
    pub fn append(&mut self, other: &TriMesh) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Multiply every vertex component-wise. Unit scale is a no-op.
    pub fn apply_scale(&mut self, scale: [f64; 3]) {
        if scale == [1.0, 1.0, 1.0] {
            return;
        }
        let s = scale.map(|v| v as f32);
        for p in &mut self.positions {
            p[0] *= s[0];
            p[1] *= s[1];
            p[2] *= s[2];
        }
    }

    /// Axis-aligned bounds `(min, max)`, or `None` for a mesh without vertices.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = *self.positions.first()?;
        let mut min = first;
        let mut max = first;
        for p in &self.positions[1..] {
            for k in 0..3 {
                min[k] = min[k].min(p[k]);
                max[k] = max[k].max(p[k]);
            }
        }
        Some((min, max))
    }

    /// Check every index points at an existing vertex.
    pub fn validate(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            ));
        }
        let n = self.positions.len() as u32;
        if let Some(bad) = self.indices.iter().find(|&&i| i >= n) {
            return Err(format!("index {bad} out of range ({n} vertices)"));
        }
        Ok(())
    }
}
