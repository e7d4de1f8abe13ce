//! Light-space matrices for the shadow stage
//!
//! Directional lights use one light view centred on the camera and four
//! orthographic cascade projections. Each cascade is fitted to the bounding
//! sphere of its camera frustum slice; splits follow the practical scheme
//! (`lambda` blends logarithmic and uniform). Without a usable camera every
//! cascade falls back to a fixed half-extent around the origin.
//!
//! Spot lights use a perspective frustum from the outer cutoff, point lights a
//! 90 degree frustum per cube face.

use crate::config::ShadowConfig;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3, Vec4};
use crate::render::camera::Camera;
use crate::render::resources::{Light, LightKind};

/// Number of directional cascades
pub const CASCADE_COUNT: usize = 4;

/// Number of point light cube faces
pub const CUBE_FACE_COUNT: usize = 6;

/// Matrices computed for one light this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightMatrices {
    /// Projection slots (non-directional lights fill slot 0 only)
    pub projections: [Mat4; 4],
    /// Light view
    pub view: Mat4,
    /// View-space far distance of each cascade (directional only)
    pub splits: [f32; 4],
}

/// View direction and up vector of cube face `face` (+X, -X, +Y, -Y, +Z, -Z)
pub fn cube_face_axes(face: usize) -> (Vec3, Vec3) {
    match face {
        0 => (Vec3::x(), -Vec3::y()),
        1 => (-Vec3::x(), -Vec3::y()),
        2 => (Vec3::y(), Vec3::z()),
        3 => (-Vec3::y(), -Vec3::z()),
        4 => (Vec3::z(), -Vec3::y()),
        _ => (-Vec3::z(), -Vec3::y()),
    }
}

/// Rotation into cube face `face`, applied after the point light's translation
pub fn cube_face_rotation(face: usize) -> Mat4 {
    let (dir, up) = cube_face_axes(face);
    Mat4::look_at(Vec3::zeros(), dir, up)
}

/// Practical split distances for `CASCADE_COUNT` cascades over `[near, far]`
pub fn cascade_splits(near: f32, far: f32, lambda: f32) -> [f32; 4] {
    let near = near.max(1e-3);
    let far = far.max(near + 1e-3);
    let lambda = lambda.clamp(0.0, 1.0);
    let mut splits = [far; 4];
    for (i, split) in splits.iter_mut().enumerate() {
        let p = (i + 1) as f32 / CASCADE_COUNT as f32;
        let log = near * (far / near).powf(p);
        let uniform = utils::lerp(near, far, p);
        *split = lambda * log + (1.0 - lambda) * uniform;
    }
    splits[CASCADE_COUNT - 1] = far;
    splits
}

/// Compute this frame's matrices for `light`
pub fn light_matrices(light: &Light, camera: Option<&Camera>, config: &ShadowConfig) -> LightMatrices {
    match light.kind {
        LightKind::Directional => directional(light, camera, config),
        LightKind::Spot => spot(light, config),
        LightKind::Point | LightKind::Ambient => point(light, config),
    }
}

fn usable(camera: Option<&Camera>) -> Option<&Camera> {
    camera.filter(|c| c.near > 0.0 && c.far > c.near && c.fov > 0.0)
}

fn directional(light: &Light, camera: Option<&Camera>, config: &ShadowConfig) -> LightMatrices {
    let near = light.shadow_near.unwrap_or(config.directional_near);
    let far = light.shadow_far.unwrap_or(config.directional_far);
    let dir = light.direction();
    let center = usable(camera).map_or_else(Vec3::zeros, |c| c.position);
    let eye = center - dir * (far * 0.5);
    let view = Mat4::look_at(eye, center, Vec3::y());

    let Some(camera) = usable(camera) else {
        let h = config.fallback_half_extent;
        let projection = Mat4::orthographic(-h, h, -h, h, near, far);
        let splits = std::array::from_fn(|i| far * (i + 1) as f32 / CASCADE_COUNT as f32);
        return LightMatrices { projections: [projection; 4], view, splits };
    };

    let max_distance = camera.far.min(far);
    let splits = cascade_splits(camera.near, max_distance, config.cascade_lambda);
    let mut projections = [Mat4::identity(); 4];
    let mut slice_near = camera.near;
    for (projection, &slice_far) in projections.iter_mut().zip(splits.iter()) {
        let corners = camera.frustum_slice_corners(slice_near, slice_far);
        let sphere_center = corners.iter().fold(Vec3::zeros(), |acc, c| acc + c) / corners.len() as f32;
        let radius = corners
            .iter()
            .map(|c| (c - sphere_center).norm())
            .fold(0.0_f32, f32::max)
            .max(1e-3);
        let c = view * Vec4::new(sphere_center.x, sphere_center.y, sphere_center.z, 1.0);
        *projection = Mat4::orthographic(c.x - radius, c.x + radius, c.y - radius, c.y + radius, near, far);
        slice_near = slice_far;
    }
    LightMatrices { projections, view, splits }
}

fn spot(light: &Light, config: &ShadowConfig) -> LightMatrices {
    let near = light.shadow_near.unwrap_or(config.local_light_near);
    let far = light.shadow_far.unwrap_or(light.range).max(near + 1e-3);
    let fov = (light.outer_cutoff * 2.0).clamp(utils::deg_to_rad(1.0), utils::deg_to_rad(179.0));
    let position = light.position();
    let projection = Mat4::perspective(fov, 1.0, near, far);
    let view = Mat4::look_at(position, position + light.direction(), Vec3::y());
    LightMatrices { projections: slot_zero(projection), view, splits: [far; 4] }
}

fn point(light: &Light, config: &ShadowConfig) -> LightMatrices {
    let near = light.shadow_near.unwrap_or(config.local_light_near);
    let far = light.shadow_far.unwrap_or(light.range).max(near + 1e-3);
    let projection = Mat4::perspective(utils::deg_to_rad(90.0), 1.0, near, far);
    let view = Mat4::new_translation(&-light.position());
    LightMatrices { projections: slot_zero(projection), view, splits: [far; 4] }
}

fn slot_zero(projection: Mat4) -> [Mat4; 4] {
    let mut projections = [Mat4::identity(); 4];
    projections[0] = projection;
    projections
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cascade_splits_are_increasing_and_end_at_far() {
        let splits = cascade_splits(0.1, 100.0, 0.5);
        for pair in splits.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_relative_eq!(splits[3], 100.0);
    }

    #[test]
    fn test_uniform_splits_with_zero_lambda() {
        let splits = cascade_splits(1.0, 9.0, 0.0);
        assert_relative_eq!(splits[0], 3.0, epsilon = 1e-5);
        assert_relative_eq!(splits[1], 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_directional_fallback_uses_fixed_extent() {
        let light = Light::directional(Vec3::new(0.0, -1.0, -0.2), Vec3::new(1.0, 1.0, 1.0));
        let config = ShadowConfig::default();
        let matrices = light_matrices(&light, None, &config);
        let expected = Mat4::orthographic(-50.0, 50.0, -50.0, 50.0, 1.0, 512.0);
        assert_eq!(matrices.projections, [expected; 4]);
        assert_relative_eq!(matrices.splits[0], 128.0);
        assert_relative_eq!(matrices.splits[3], 512.0);
    }

    #[test]
    fn test_directional_cascades_contain_camera_slices() {
        let light = Light::directional(Vec3::new(0.3, -1.0, -0.2), Vec3::new(1.0, 1.0, 1.0));
        let camera = Camera::default();
        let config = ShadowConfig::default();
        let matrices = light_matrices(&light, Some(&camera), &config);

        let mut slice_near = camera.near;
        for (cascade, &slice_far) in matrices.splits.iter().enumerate() {
            let clip = matrices.projections[cascade] * matrices.view;
            for corner in camera.frustum_slice_corners(slice_near, slice_far) {
                let p = clip * Vec4::new(corner.x, corner.y, corner.z, 1.0);
                assert!(p.x.abs() <= p.w + 1e-3, "cascade {cascade} misses x");
                assert!(p.y.abs() <= p.w + 1e-3, "cascade {cascade} misses y");
            }
            slice_near = slice_far;
        }
    }

    #[test]
    fn test_point_faces_see_their_axis() {
        let light = Light::point(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 1.0, 1.0), 20.0);
        let config = ShadowConfig::default();
        let matrices = light_matrices(&light, None, &config);
        for face in 0..CUBE_FACE_COUNT {
            let (dir, _) = cube_face_axes(face);
            let target = light.position() + dir * 5.0;
            let eye = cube_face_rotation(face) * matrices.view * Vec4::new(target.x, target.y, target.z, 1.0);
            assert_relative_eq!(eye.x, 0.0, epsilon = 1e-4);
            assert_relative_eq!(eye.y, 0.0, epsilon = 1e-4);
            assert_relative_eq!(eye.z, -5.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_spot_uses_outer_cutoff_and_range() {
        let light = Light::spot(
            Vec3::zeros(),
            -Vec3::z(),
            Vec3::new(1.0, 1.0, 1.0),
            30.0,
            0.3,
            0.5,
        );
        let config = ShadowConfig::default();
        let matrices = light_matrices(&light, None, &config);
        assert_eq!(matrices.projections[0], Mat4::perspective(1.0, 1.0, 0.1, 30.0));
        assert_eq!(matrices.projections[1], Mat4::identity());
    }
}
