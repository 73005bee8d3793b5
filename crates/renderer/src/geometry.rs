/// Static vertex data for the single quad every instance draws.
///
/// The quad sits in the z=0 plane, one unit in front of the fixed camera. The
/// camera mirrors x, so U runs opposite to vertex x; together they put UV
/// (0, 0) at the bottom-left of the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadGeometry {
    pub vertices: [f32; 12],
    pub uvs: [f32; 8],
    pub indices: [u16; 4],
}

impl QuadGeometry {
    /// Quad that covers the whole surface under the fixed camera.
    pub const FULL_VIEWPORT: QuadGeometry = QuadGeometry {
        vertices: [
            1.0, 1.0, 0.0, //
            0.0, 1.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 0.0, 0.0,
        ],
        uvs: [
            0.0, 1.0, //
            1.0, 1.0, //
            0.0, 0.0, //
            1.0, 0.0,
        ],
        indices: [0, 1, 2, 3],
    };

    pub const VERTEX_COMPONENTS: i32 = 3;
    pub const UV_COMPONENTS: i32 = 2;

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / Self::VERTEX_COMPONENTS as usize
    }

    pub fn index_count(&self) -> i32 {
        self.indices.len() as i32
    }

    pub fn vertex(&self, index: usize) -> [f32; 3] {
        let at = index * 3;
        [self.vertices[at], self.vertices[at + 1], self.vertices[at + 2]]
    }

    pub fn uv(&self, index: usize) -> [f32; 2] {
        let at = index * 2;
        [self.uvs[at], self.uvs[at + 1]]
    }
}

impl Default for QuadGeometry {
    fn default() -> Self {
        Self::FULL_VIEWPORT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_lengths() {
        let quad = QuadGeometry::default();
        assert_eq!(quad.vertices.len(), 12);
        assert_eq!(quad.uvs.len(), 8);
        assert_eq!(quad.indices.len(), 4);
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.index_count(), 4);
    }

    #[test]
    fn strip_indices_cover_every_vertex() {
        assert_eq!(QuadGeometry::FULL_VIEWPORT.indices, [0, 1, 2, 3]);
    }

    #[test]
    fn uvs_span_unit_square_with_flipped_u() {
        let quad = QuadGeometry::FULL_VIEWPORT;
        for index in 0..quad.vertex_count() {
            let [x, y, z] = quad.vertex(index);
            let [u, v] = quad.uv(index);
            assert_eq!(z, 0.0);
            assert_eq!(u, 1.0 - x, "u mirrors vertex x at {index}");
            assert_eq!(v, y, "v follows vertex y at {index}");
        }
    }
}
