//! Per-object draw sequence shared by every stage
//!
//! For each renderable: program, material, lights, shadow atlas and
//! light-space matrices, skinning matrices, vertex/index buffers, camera
//! uniforms, draw. Everything is bound through a nested [`BindScope`] so the
//! object's binds are released before the next object starts.

use std::rc::Rc;

use crate::foundation::math::{Mat4, Mat4Ext, Vec2, Vec3, Vec4};
use crate::render::device::{BindScope, ProgramId, TextureId};
use crate::render::program::ProgramRegistry;
use crate::render::queue::Renderable;
use crate::render::resources::{Light, ViewportRect};
use crate::render::{RenderError, RenderResult};

use super::FrameStats;

/// Sampler unit the shadow atlas is bound to
pub const SHADOW_ATLAS_UNIT: u32 = 8;

/// One light packed into this frame's atlas
#[derive(Debug, Clone)]
pub struct ShadowEntry {
    /// Shadowed light
    pub light: Rc<Light>,
    /// Uniform slot of the light this frame, if it was queued
    pub slot: Option<usize>,
}

/// Shadow stage result handed to the lit stages of the same frame
#[derive(Debug, Clone)]
pub struct ShadowOutput {
    /// Depth attachment of the atlas
    pub atlas: TextureId,
    /// Packed lights in cell order
    pub entries: Vec<ShadowEntry>,
}

/// Where the program of an object comes from
#[derive(Debug, Clone, Copy)]
pub(crate) enum ProgramSource<'a> {
    /// The material's program, or `fallback` when it has none
    Material {
        registry: &'a ProgramRegistry,
        fallback: &'a str,
    },
    /// One program for every object of the stage
    Fixed(ProgramId),
}

/// Stage-wide inputs of the per-object draw
#[derive(Debug, Clone, Copy)]
pub(crate) struct DrawContext<'a> {
    pub program: ProgramSource<'a>,
    pub bind_material: bool,
    pub skip_skybox: bool,
    pub lights: &'a [Rc<Light>],
    pub shadows: Option<&'a ShadowOutput>,
    pub projection: Mat4,
    pub view: Mat4,
}

impl<'a> DrawContext<'a> {
    /// Material-driven lit draw
    pub fn lit(registry: &'a ProgramRegistry, fallback: &'a str, lights: &'a [Rc<Light>], projection: Mat4, view: Mat4) -> Self {
        Self {
            program: ProgramSource::Material { registry, fallback },
            bind_material: true,
            skip_skybox: false,
            lights,
            shadows: None,
            projection,
            view,
        }
    }

    /// Single-program draw without lights
    pub fn fixed(program: ProgramId, projection: Mat4, view: Mat4) -> Self {
        Self {
            program: ProgramSource::Fixed(program),
            bind_material: true,
            skip_skybox: false,
            lights: &[],
            shadows: None,
            projection,
            view,
        }
    }

    pub fn with_shadows(mut self, shadows: Option<&'a ShadowOutput>) -> Self {
        self.shadows = shadows;
        self
    }
}

fn missing_program(key: &str) -> RenderError {
    RenderError::MissingResource(format!("program '{}' is not registered", key))
}

/// Draw one renderable; per-object problems are logged and counted, not returned
pub(crate) fn draw_renderable(
    scope: &mut BindScope<'_>,
    ctx: &DrawContext<'_>,
    renderable: &Renderable,
    stats: &mut FrameStats,
) -> RenderResult<()> {
    let program = match ctx.program {
        ProgramSource::Fixed(program) => program,
        ProgramSource::Material { registry, fallback } => {
            let key = renderable.material.program().unwrap_or(fallback);
            match registry.get(key) {
                Some(program) => program,
                None => {
                    let err = missing_program(key);
                    log::warn!(
                        "Skipping {:?}: {}",
                        renderable.material.name.as_deref().unwrap_or("<unnamed>"),
                        err
                    );
                    stats.skipped_objects += 1;
                    return Ok(());
                }
            }
        }
    };

    let Some(geometry) = renderable.geometry() else {
        log::trace!("Skipping renderable: {}", RenderError::MissingResource("geometry was dropped".into()));
        stats.skipped_objects += 1;
        return Ok(());
    };
    if ctx.skip_skybox && geometry.is_skybox() {
        return Ok(());
    }

    let mut scope = scope.nested();
    if let Err(err) = scope.program(program) {
        log::warn!("Skipping '{}': {}", geometry.name, err);
        stats.skipped_objects += 1;
        return Ok(());
    }
    if ctx.bind_material {
        scope.material(&renderable.material);
    }
    if !ctx.lights.is_empty() {
        upload_lights(&mut scope, ctx.lights);
    }
    if let Some(shadows) = ctx.shadows {
        upload_shadows(&mut scope, shadows);
    }
    if let Some(joints) = &geometry.skin {
        scope.uniform("u_bone_count", joints.len() as i32);
        for (i, joint) in joints.iter().enumerate() {
            scope.uniform(&format!("u_bones[{i}]"), *joint);
        }
    }
    scope.primitive_buffers(&renderable.primitive);
    scope.uniform("u_projection", ctx.projection);
    scope.uniform("u_view", ctx.view);
    scope.uniform("u_model", renderable.world);
    scope.uniform("u_normal_matrix", renderable.world.normal_matrix());
    scope.draw(&renderable.primitive)?;
    stats.draw_calls += 1;
    Ok(())
}

/// Upload the frame's lights in slot order
pub(crate) fn upload_lights(scope: &mut BindScope<'_>, lights: &[Rc<Light>]) {
    scope.uniform("u_light_count", lights.len() as i32);
    for (i, light) in lights.iter().enumerate() {
        let a = &light.attenuation;
        scope.uniform(&format!("u_lights[{i}].kind"), light.kind.shader_tag());
        scope.uniform(&format!("u_lights[{i}].color"), light.color * light.intensity);
        scope.uniform(&format!("u_lights[{i}].position"), light.position());
        scope.uniform(&format!("u_lights[{i}].direction"), light.direction());
        scope.uniform(&format!("u_lights[{i}].attenuation"), Vec3::new(a.constant, a.linear, a.quadratic));
        scope.uniform(
            &format!("u_lights[{i}].cutoff"),
            Vec2::new(light.inner_cutoff.cos(), light.outer_cutoff.cos()),
        );
    }
}

fn rect(viewport: ViewportRect) -> Vec4 {
    Vec4::new(viewport.x, viewport.y, viewport.width, viewport.height)
}

/// Bind the atlas and upload every packed light's sampling data
pub(crate) fn upload_shadows(scope: &mut BindScope<'_>, shadows: &ShadowOutput) {
    scope.texture(SHADOW_ATLAS_UNIT, shadows.atlas);
    scope.uniform("u_shadow_atlas", SHADOW_ATLAS_UNIT as i32);
    scope.uniform("u_shadow_count", shadows.entries.len() as i32);
    for (k, entry) in shadows.entries.iter().enumerate() {
        let map = entry.light.shadow_map();
        let Some(map) = map.as_ref() else { continue };
        let slot = entry.slot.map_or(-1, |s| s as i32);
        scope.uniform(&format!("u_shadows[{k}].light_index"), slot);
        scope.uniform(&format!("u_shadows[{k}].cell"), rect(map.cell()));
        scope.uniform(&format!("u_shadows[{k}].splits"), Vec4::from(map.cascade_splits()));
        let bias = map.bias();
        scope.uniform(&format!("u_shadows[{k}].bias"), Vec2::new(bias.constant, bias.slope));
        for (i, viewport) in map.shader_viewports().iter().enumerate() {
            scope.uniform(&format!("u_shadows[{k}].viewports[{i}]"), rect(*viewport));
            scope.uniform(&format!("u_shadows[{k}].light_space[{i}]"), map.light_space(i));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::{RecordingDevice, UniformValue};
    use crate::render::program::keys;
    use crate::render::resources::{Geometry, Material, Primitive, Topology};
    use crate::render::device::BufferId;

    fn renderable(material: Material, geometry: &Rc<Geometry>) -> Renderable {
        Renderable {
            material: Rc::new(material),
            primitive: Rc::new(Primitive::indexed(BufferId(1), BufferId(2), 36)),
            geometry: Rc::downgrade(geometry),
            world: Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0)),
        }
    }

    #[test]
    fn test_draw_sequence_is_balanced() {
        let registry = ProgramRegistry::with_builtin_programs();
        let geometry = Rc::new(Geometry::new("cube").with_skin(vec![Mat4::identity(); 3]));
        let lights = vec![Rc::new(Light::point(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 5.0))];
        let item = renderable(Material::new(), &geometry);
        let ctx = DrawContext::lit(&registry, keys::FORWARD, &lights, Mat4::identity(), Mat4::identity());

        let mut device = RecordingDevice::new();
        let mut stats = FrameStats::default();
        {
            let mut scope = BindScope::new(&mut device);
            draw_renderable(&mut scope, &ctx, &item, &mut stats).unwrap();
        }
        assert_eq!(stats.draw_calls, 1);
        assert!(device.is_balanced());
        assert_eq!(device.last_uniform("u_light_count"), Some(UniformValue::Int(1)));
        assert_eq!(device.last_uniform("u_bone_count"), Some(UniformValue::Int(3)));
        assert_eq!(device.last_uniform("u_model"), Some(UniformValue::Mat4(item.world)));
        assert_eq!(device.draws()[0].program, registry.get(keys::FORWARD));
    }

    #[test]
    fn test_missing_program_skips_object() {
        let registry = ProgramRegistry::with_builtin_programs();
        let geometry = Rc::new(Geometry::new("water"));
        let item = renderable(Material::new().with_program("shaders/missing"), &geometry);
        let ctx = DrawContext::lit(&registry, keys::FORWARD, &[], Mat4::identity(), Mat4::identity());

        let mut device = RecordingDevice::new();
        let mut stats = FrameStats::default();
        {
            let mut scope = BindScope::new(&mut device);
            draw_renderable(&mut scope, &ctx, &item, &mut stats).unwrap();
        }
        assert_eq!(stats.skipped_objects, 1);
        assert_eq!(device.draw_count(), 0);
        assert!(device.calls().is_empty());
    }

    #[test]
    fn test_missing_program_reason_names_key() {
        let err = missing_program("shaders/missing");
        assert!(matches!(err, RenderError::MissingResource(_)));
        assert_eq!(err.to_string(), "Missing resource: program 'shaders/missing' is not registered");
    }

    #[test]
    fn test_dead_geometry_is_skipped() {
        let registry = ProgramRegistry::with_builtin_programs();
        let geometry = Rc::new(Geometry::new("gone"));
        let item = renderable(Material::new(), &geometry);
        drop(geometry);
        let ctx = DrawContext::lit(&registry, keys::FORWARD, &[], Mat4::identity(), Mat4::identity());

        let mut device = RecordingDevice::new();
        let mut stats = FrameStats::default();
        {
            let mut scope = BindScope::new(&mut device);
            draw_renderable(&mut scope, &ctx, &item, &mut stats).unwrap();
        }
        assert_eq!(stats.skipped_objects, 1);
        assert_eq!(device.draw_count(), 0);
    }

    #[test]
    fn test_failed_program_bind_skips_object() {
        let registry = ProgramRegistry::with_builtin_programs();
        let geometry = Rc::new(Geometry::new("cube"));
        let item = renderable(Material::new(), &geometry);
        let program = registry.get(keys::FORWARD).unwrap();
        let ctx = DrawContext::fixed(program, Mat4::identity(), Mat4::identity());

        let mut device = RecordingDevice::new();
        device.fail_program(program);
        let mut stats = FrameStats::default();
        {
            let mut scope = BindScope::new(&mut device);
            draw_renderable(&mut scope, &ctx, &item, &mut stats).unwrap();
        }
        assert_eq!(stats.skipped_objects, 1);
        assert!(device.is_balanced());
    }

    #[test]
    fn test_unskinned_geometry_uploads_no_bones() {
        let geometry = Rc::new(Geometry::new("cube"));
        let item = renderable(Material::new(), &geometry);
        let ctx = DrawContext::fixed(ProgramId(1), Mat4::identity(), Mat4::identity());

        let mut device = RecordingDevice::new();
        let mut stats = FrameStats::default();
        {
            let mut scope = BindScope::new(&mut device);
            draw_renderable(&mut scope, &ctx, &item, &mut stats).unwrap();
        }
        assert_eq!(device.last_uniform("u_bone_count"), None);
        assert_eq!(item.primitive.topology, Topology::Triangles);
    }
}
