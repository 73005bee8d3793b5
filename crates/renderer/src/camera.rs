use glam::{Mat4, Vec3};

const NEAR: f32 = 0.01;
const FAR: f32 = 200.0;

/// Fixed projection and model-view pair used for every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub projection: Mat4,
    pub model_view: Mat4,
}

impl Camera {
    /// Orthographic view of the unit square, looking down +z from one unit away.
    ///
    /// The model-view is built as `identity * translate(1, 0, 0) * look_at`,
    /// so the look-at mirrors x and the translation shifts the result back
    /// into the `[0, 1]` view volume.
    pub fn fixed() -> Self {
        let projection = Mat4::orthographic_rh_gl(0.0, 1.0, 0.0, 1.0, NEAR, FAR);
        let look_at = Mat4::look_at_rh(Vec3::new(0.0, 0.0, -1.0), Vec3::ZERO, Vec3::Y);
        let model_view = Mat4::IDENTITY * Mat4::from_translation(Vec3::X) * look_at;
        Self {
            projection,
            model_view,
        }
    }

    pub fn projection_array(&self) -> [f32; 16] {
        self.projection.to_cols_array()
    }

    pub fn model_view_array(&self) -> [f32; 16] {
        self.model_view.to_cols_array()
    }

    /// Clip-space position of a model-space point, after perspective divide.
    pub fn project(&self, point: [f32; 3]) -> Vec3 {
        let clip = self.projection * self.model_view * Vec3::from(point).extend(1.0);
        clip.truncate() / clip.w
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::fixed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::QuadGeometry;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn quad_covers_entire_viewport() {
        let camera = Camera::fixed();
        let quad = QuadGeometry::FULL_VIEWPORT;
        let mut corners = Vec::new();
        for index in 0..quad.vertex_count() {
            let ndc = camera.project(quad.vertex(index));
            assert!(ndc.z > -1.0 && ndc.z < 1.0, "vertex {index} clipped: {ndc}");
            corners.push((ndc.x.round() as i32, ndc.y.round() as i32));
            assert!(approx(ndc.x.abs(), 1.0) && approx(ndc.y.abs(), 1.0));
        }
        corners.sort_unstable();
        assert_eq!(corners, vec![(-1, -1), (-1, 1), (1, -1), (1, 1)]);
    }

    #[test]
    fn frag_coord_origin_is_bottom_left() {
        let camera = Camera::fixed();
        let quad = QuadGeometry::FULL_VIEWPORT;
        for index in 0..quad.vertex_count() {
            let ndc = camera.project(quad.vertex(index));
            let [u, v] = quad.uv(index);
            // NDC -1 is the left/bottom edge of the framebuffer.
            assert!(approx(u, (ndc.x + 1.0) * 0.5), "u at vertex {index}");
            assert!(approx(v, (ndc.y + 1.0) * 0.5), "v at vertex {index}");
        }
    }

    #[test]
    fn fixed_camera_is_stable() {
        assert_eq!(Camera::fixed(), Camera::fixed());
        assert_eq!(Camera::fixed().projection_array().len(), 16);
    }
}
