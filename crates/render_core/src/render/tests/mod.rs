//! Whole-frame scenarios run against the recording device

use std::rc::Rc;

use crate::config::RendererConfig;
use crate::foundation::math::{Mat4, Vec3};
use crate::render::device::{BufferId, DeviceCall, ProgramId, RecordingDevice, ResourceKey, UniformValue};
use crate::render::pass::{ImageEffect, PassKind, RenderPass, ScenePass, Stage};
use crate::render::pipeline::RenderPipeline;
use crate::render::program::{keys, ProgramRegistry};
use crate::render::queue::{Bucket, RenderQueue};
use crate::render::resources::{Geometry, Light, LightKind, Material, Primitive, RenderLayer, TargetPurpose};
use crate::render::Camera;

fn white() -> Vec3 {
    Vec3::new(1.0, 1.0, 1.0)
}

struct Scene {
    queue: RenderQueue,
    geometry: Vec<Rc<Geometry>>,
}

impl Scene {
    fn new() -> Self {
        Self {
            queue: RenderQueue::new(),
            geometry: Vec::new(),
        }
    }

    fn object(&mut self, name: &str, material: Material, world: Mat4) -> &mut Self {
        self.object_with(Geometry::new(name), material, world, false)
    }

    fn object_with(&mut self, geometry: Geometry, material: Material, world: Mat4, on_screen: bool) -> &mut Self {
        let geometry = Rc::new(geometry);
        self.queue.push(
            Some(Rc::new(material)),
            Some(Rc::new(Primitive::indexed(BufferId(1), BufferId(2), 36))),
            &geometry,
            world,
            on_screen,
        );
        self.geometry.push(geometry);
        self
    }

    fn light(&mut self, light: &Rc<Light>) -> &mut Self {
        self.queue.push_light(Rc::clone(light));
        self
    }
}

fn at(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::new_translation(&Vec3::new(x, y, z))
}

fn programs() -> Rc<ProgramRegistry> {
    Rc::new(ProgramRegistry::with_builtin_programs())
}

fn material_binds(device: &RecordingDevice) -> Vec<crate::render::resources::MaterialId> {
    device
        .calls()
        .iter()
        .filter_map(|call| match call {
            DeviceCall::BindMaterial(id) => Some(*id),
            _ => None,
        })
        .collect()
}

#[test]
fn test_forward_frame_with_one_casting_light() {
    let glass = Material::new().with_alpha(0.3).with_name("glass");
    let glass_id = glass.id();
    let caster = Rc::new(Light::spot(Vec3::new(0.0, 6.0, 0.0), -Vec3::y(), white(), 20.0, 0.3, 0.5).with_shadows(true));
    let fill = Rc::new(Light::point(Vec3::new(3.0, 2.0, 0.0), white(), 8.0));

    let mut scene = Scene::new();
    scene
        .object("a", Material::new(), at(-2.0, 0.0, 0.0))
        .object("b", Material::new(), at(0.0, 0.0, 0.0))
        .object("c", Material::new().with_receives_shadows(false), at(2.0, 0.0, 0.0))
        .object("window", glass, at(0.0, 0.0, 2.0))
        .light(&caster)
        .light(&fill);

    let registry = programs();
    let forward = registry.get(keys::FORWARD).unwrap();
    let shadow_depth = registry.get(keys::SHADOW_DEPTH).unwrap();
    let mut pass = ScenePass::forward(RendererConfig::default(), Rc::clone(&registry));
    let mut device = RecordingDevice::new();
    let stats = pass.render(&mut device, &scene.queue, &Camera::default()).unwrap();

    assert_eq!(
        stats.stages,
        vec![Stage::ShadowMapCompute, Stage::OpaqueShaded, Stage::Translucent]
    );
    assert_eq!(stats.shadowed_lights, 1);
    // three opaque objects plus the glass share the forward fallback
    assert_eq!(device.bind_count(ResourceKey::Program(forward)), 4);
    assert_eq!(device.unbind_count(ResourceKey::Program(forward)), 4);
    // one spot face, three opaque casters
    assert_eq!(device.bind_count(ResourceKey::Program(shadow_depth)), 3);
    assert_eq!(stats.draw_calls, 7);

    let materials = material_binds(&device);
    assert_eq!(materials.len(), 4);
    assert_eq!(materials.last(), Some(&glass_id));

    assert!(caster.shadow_map().as_ref().unwrap().is_active());
    assert!(!fill.has_shadow_map());
    assert_eq!(device.last_uniform("u_shadow_count"), Some(UniformValue::Int(1)));
    assert!(device.is_balanced(), "imbalances: {:?}", device.imbalances());
}

#[test]
fn test_no_casting_lights_leaves_atlas_unallocated() {
    let mut scene = Scene::new();
    scene
        .object("a", Material::new(), Mat4::identity())
        .light(&Rc::new(Light::directional(-Vec3::y(), white())))
        .light(&Rc::new(Light::ambient(Vec3::new(0.1, 0.1, 0.1))));

    let mut pass = ScenePass::forward(RendererConfig::default(), programs());
    let mut device = RecordingDevice::new();
    let stats = pass.render(&mut device, &scene.queue, &Camera::default()).unwrap();

    assert!(stats.ran(Stage::ShadowMapCompute));
    assert_eq!(stats.shadowed_lights, 0);
    assert_eq!(device.frame_targets_created(), 0);
    assert!(pass.shadow_pass().targets().get(PassKind::Shadow, TargetPurpose::ShadowAtlas).is_none());
    assert_eq!(stats.draw_calls, 1);
}

#[test]
fn test_point_light_faces_stay_inside_cell() {
    let lamp = Rc::new(Light::point(Vec3::new(0.0, 3.0, 0.0), white(), 15.0).with_shadows(true));
    let sun = Rc::new(Light::directional(Vec3::new(-1.0, -1.0, 0.0), white()).with_shadows(true));
    let mut scene = Scene::new();
    scene.object("floor", Material::new(), Mat4::identity()).light(&lamp).light(&sun);

    let mut pass = ScenePass::forward(RendererConfig::default(), programs());
    let mut device = RecordingDevice::new();
    let stats = pass.render(&mut device, &scene.queue, &Camera::default()).unwrap();
    assert_eq!(stats.shadowed_lights, 2);

    let map = lamp.shadow_map();
    let map = map.as_ref().unwrap();
    let cell = map.cell();
    let faces = map.render_viewports();
    assert_eq!(faces.len(), 6);
    for (i, face) in faces.iter().enumerate() {
        assert!(cell.contains(face, 1e-5), "face {i} leaves its cell");
        for other in &faces[i + 1..] {
            assert!(face.intersection_area(other) < 1e-6);
        }
    }
    // directional packs before point
    assert_eq!(map.cell_index(), 1);
}

#[test]
fn test_five_casters_drop_the_lowest_priority() {
    let lights = [
        Rc::new(Light::point(Vec3::new(0.0, 2.0, 0.0), white(), 10.0).with_shadows(true)),
        Rc::new(Light::spot(Vec3::new(0.0, 5.0, 0.0), -Vec3::y(), white(), 10.0, 0.2, 0.4).with_shadows(true)),
        Rc::new(Light::point(Vec3::new(4.0, 2.0, 0.0), white(), 10.0).with_shadows(true)),
        Rc::new(Light::directional(-Vec3::y(), white()).with_shadows(true)),
        Rc::new(Light::spot(Vec3::new(3.0, 5.0, 0.0), -Vec3::y(), white(), 10.0, 0.2, 0.4).with_shadows(true)),
    ];
    let mut scene = Scene::new();
    scene.object("floor", Material::new(), Mat4::identity());
    for light in &lights {
        scene.light(light);
    }

    let mut pass = ScenePass::forward(RendererConfig::default(), programs());
    let mut device = RecordingDevice::new();
    let stats = pass.render(&mut device, &scene.queue, &Camera::default()).unwrap();

    assert_eq!(stats.shadowed_lights, 4);
    assert_eq!(stats.dropped_lights, 1);
    let active: Vec<LightKind> = lights
        .iter()
        .filter(|light| light.shadow_map().as_ref().is_some_and(|map| map.is_active()))
        .map(|light| light.kind)
        .collect();
    assert_eq!(active.iter().filter(|kind| **kind == LightKind::Point).count(), 1);
    // the later point light loses its cell
    assert!(!lights[2].shadow_map().as_ref().is_some_and(|map| map.is_active()));
    assert!(device.is_balanced());
}

#[test]
fn test_single_directional_cascades_tile_the_atlas() {
    let sun = Rc::new(Light::directional(Vec3::new(0.3, -1.0, 0.2), white()).with_shadows(true));
    let mut scene = Scene::new();
    scene.object("floor", Material::new(), Mat4::identity()).light(&sun);

    let mut pass = ScenePass::forward(RendererConfig::default(), programs());
    let mut device = RecordingDevice::new();
    pass.render(&mut device, &scene.queue, &Camera::default()).unwrap();

    let map = sun.shadow_map();
    let map = map.as_ref().unwrap();
    let cell = map.cell();
    assert!((cell.area() - 1.0).abs() < 1e-6);
    let cascades = map.render_viewports();
    assert_eq!(cascades.len(), 4);
    let covered: f32 = cascades.iter().map(|c| c.area()).sum();
    assert!((covered - cell.area()).abs() < 1e-5);
    for (i, cascade) in cascades.iter().enumerate() {
        for other in &cascades[i + 1..] {
            assert!(cascade.intersection_area(other) < 1e-6);
        }
    }
    let splits = map.cascade_splits();
    assert!(splits.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_every_pass_kind_stays_balanced_across_frames() {
    let lamp = Rc::new(Light::point(Vec3::new(0.0, 3.0, 0.0), white(), 15.0).with_shadows(true));
    let sun = Rc::new(Light::directional(-Vec3::y(), white()).with_shadows(true));
    let mut scene = Scene::new();
    scene
        .object("a", Material::new(), at(-1.0, 0.0, 0.0))
        .object("wall", Material::new().with_occluder(true), at(0.0, 0.0, -4.0))
        .object("glass", Material::new().with_alpha(0.5), at(0.0, 0.0, 1.0))
        .object("broken", Material::new().with_program("shaders/custom/broken"), at(1.0, 0.0, 0.0))
        .object_with(Geometry::new("sky").with_layer(RenderLayer::Skybox), Material::new(), Mat4::identity(), false)
        .object_with(Geometry::new("hud"), Material::new(), Mat4::identity(), true)
        .light(&lamp)
        .light(&sun);

    let mut registry = ProgramRegistry::with_builtin_programs();
    registry.register("shaders/custom/broken", ProgramId(77));
    registry.register("shaders/effects/grain", ProgramId(78));
    let registry = Rc::new(registry);
    let config = RendererConfig::default().with_depth_prepass(true);

    let mut forward = ScenePass::forward(config.clone(), Rc::clone(&registry));
    forward.add_effect(ImageEffect::new("grain", "shaders/effects/grain"));
    let mut pipelines = vec![
        RenderPipeline::new(Box::new(forward)),
        RenderPipeline::standard(config.clone(), Rc::clone(&registry)),
        RenderPipeline::deferred(config, Rc::clone(&registry)),
    ];

    for pipeline in &mut pipelines {
        let mut device = RecordingDevice::new();
        device.fail_program(ProgramId(77));
        for _ in 0..3 {
            pipeline.render_frame(&mut device, &scene.queue, &Camera::default()).unwrap();
        }
        assert!(
            device.is_balanced(),
            "{:?} left binds open: {:?}",
            pipeline.kind(),
            device.imbalances()
        );
        assert_eq!(pipeline.frames(), 3);
    }
    assert_eq!(scene.queue.len(Bucket::Screen), 1);
    assert_eq!(scene.geometry.len(), 6);
}

#[test]
fn test_dropped_geometry_is_skipped() {
    let mut scene = Scene::new();
    scene.object("kept", Material::new(), Mat4::identity());
    scene.object("gone", Material::new(), at(1.0, 0.0, 0.0));
    scene.geometry.pop();

    let mut pass = ScenePass::standard(RendererConfig::default(), programs());
    let mut device = RecordingDevice::new();
    let stats = pass.render(&mut device, &scene.queue, &Camera::default()).unwrap();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.skipped_objects, 1);
    assert!(device.is_balanced());
}
