//! Pipeline demo
//!
//! Builds a small scene, renders it through the forward, standard and
//! deferred pipelines on the recording device and reports what each frame
//! did. Pass a `.toml` or `.ron` renderer config path to override the
//! defaults.

use std::rc::Rc;

use render_core::foundation::logging;
use render_core::prelude::*;
use render_core::render::ImageEffect;
use thiserror::Error;

const FRAMES: usize = 3;

#[derive(Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("{0:?} pipeline left {1} bindings open")]
    Unbalanced(PassKind, usize),
}

struct DemoScene {
    queue: RenderQueue,
    _geometry: Vec<Rc<Geometry>>,
}

fn build_scene() -> DemoScene {
    let mut queue = RenderQueue::new();
    let mut geometry = Vec::new();
    let cube = Rc::new(Primitive::indexed(BufferId(1), BufferId(2), 36));

    let mut add = |name: &str, material: Material, world: Mat4, on_screen: bool| {
        let geo = Rc::new(Geometry::new(name));
        queue.push(Some(Rc::new(material)), Some(Rc::clone(&cube)), &geo, world, on_screen);
        geometry.push(geo);
    };

    add("floor", Material::new().with_name("stone"), Mat4::new_scaling(10.0), false);
    add(
        "crate",
        Material::new().with_name("wood").with_diffuse(0.6, 0.4, 0.2),
        Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0)),
        false,
    );
    add(
        "pillar",
        Material::new().with_name("marble").with_occluder(true),
        Mat4::new_translation(&Vec3::new(-3.0, 2.0, -2.0)),
        false,
    );
    add(
        "window",
        Material::new().with_name("glass").with_alpha(0.35),
        Mat4::new_translation(&Vec3::new(2.0, 1.5, 1.0)),
        false,
    );
    add("crosshair", Material::new().with_name("hud"), Mat4::identity(), true);

    queue.push_light(Rc::new(Light::ambient(Vec3::new(0.05, 0.05, 0.08))));
    queue.push_light(Rc::new(
        Light::directional(Vec3::new(-0.4, -1.0, -0.3), Vec3::new(1.0, 0.95, 0.9)).with_shadows(true),
    ));
    queue.push_light(Rc::new(
        Light::point(Vec3::new(2.0, 3.0, 2.0), Vec3::new(1.0, 0.6, 0.3), 12.0).with_shadows(true),
    ));

    DemoScene { queue, _geometry: geometry }
}

fn load_config() -> Result<RendererConfig, DemoError> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading renderer config from {}", path);
            RendererConfig::load_from_file(path)?
        }
        None => RendererConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn run(mut pipeline: RenderPipeline, scene: &DemoScene, camera: &Camera) -> Result<(), DemoError> {
    let kind = pipeline.kind();
    let mut device = RecordingDevice::new();
    for frame in 0..FRAMES {
        let stats = pipeline.render_frame(&mut device, &scene.queue, camera)?;
        log::info!(
            "{} frame {}: {} draws, {} skipped, {} shadowed, stages {:?}",
            kind.name(),
            frame,
            stats.draw_calls,
            stats.skipped_objects,
            stats.shadowed_lights,
            stats.stages
        );
    }
    let open = device.imbalances().len();
    if open > 0 {
        return Err(DemoError::Unbalanced(kind, open));
    }
    log::info!(
        "{} pipeline: {} device calls, {} frame targets",
        kind.name(),
        device.calls().len(),
        device.frame_targets_created()
    );
    Ok(())
}

fn main() {
    logging::init_with_level("info");

    let result = load_config().and_then(|config| {
        let scene = build_scene();
        let mut camera = Camera::perspective(Vec3::new(4.0, 4.0, 8.0), 60.0, (1280, 720), 0.1, 100.0);
        camera.look_at(Vec3::zeros(), Vec3::y());

        let mut registry = ProgramRegistry::with_builtin_programs();
        registry.register("shaders/effects/tonemap", ProgramId(100));
        let programs = Rc::new(registry);

        let mut forward = render_core::render::ScenePass::forward(config.clone(), Rc::clone(&programs));
        forward.add_effect(ImageEffect::new("tonemap", "shaders/effects/tonemap").with_uniform("u_exposure", 1.2_f32));

        run(RenderPipeline::new(Box::new(forward)), &scene, &camera)?;
        run(RenderPipeline::standard(config.clone(), Rc::clone(&programs)), &scene, &camera)?;
        run(
            RenderPipeline::deferred(config, programs).with_policy(RecoveryPolicy::SkipFrame),
            &scene,
            &camera,
        )
    });

    if let Err(err) = result {
        log::error!("Pipeline demo failed: {}", err);
        std::process::exit(1);
    }
}
