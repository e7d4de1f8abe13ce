//! # Render Queue
//!
//! Per-frame classification of the traversed scene into draw buckets.
//!
//! The scene traversal calls [`RenderQueue::reset`], then [`push`] for every
//! visible geometry and [`push_light`] for every light; the passes then walk
//! the buckets. Nothing survives a reset: the queue never owns geometry, it
//! only holds the frame's material/primitive handles and a weak geometry
//! reference.
//!
//! ## Classification
//!
//! 1. `on_screen` → [`Bucket::Screen`]
//! 2. alpha or custom program → [`Bucket::Translucent`]
//! 3. otherwise the opaque family: [`Bucket::ShadedObjects`] when the
//!    material receives shadows, [`Bucket::Opaque`] when it does not
//!
//! Opaque-family renderables are additionally added to
//! [`Bucket::ShadowCaster`] when the material casts shadows and to
//! [`Bucket::Occluder`] when it is flagged as an occluder.
//!
//! Inside a bucket renderables are grouped by [`BatchKey`] in first-insertion
//! order.
//!
//! [`push`]: RenderQueue::push
//! [`push_light`]: RenderQueue::push_light

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::foundation::math::Mat4;
use crate::render::camera::Camera;
use crate::render::resources::{Geometry, Light, Material, MaterialId, Primitive, PrimitiveId};

/// Named partition of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Opaque, not receiving shadows
    Opaque,
    /// Alpha-blended or custom-program geometry, drawn after the opaque family
    Translucent,
    /// Drawn into shadow maps (additive)
    ShadowCaster,
    /// Opaque, lit and shadowed
    ShadedObjects,
    /// Drawn depth-only before the lit stages (additive)
    Occluder,
    /// Screen-space overlays
    Screen,
}

impl Bucket {
    /// Every bucket
    pub const ALL: [Self; 6] = [
        Self::Opaque,
        Self::Translucent,
        Self::ShadowCaster,
        Self::ShadedObjects,
        Self::Occluder,
        Self::Screen,
    ];

    const fn index(self) -> usize {
        match self {
            Self::Opaque => 0,
            Self::Translucent => 1,
            Self::ShadowCaster => 2,
            Self::ShadedObjects => 3,
            Self::Occluder => 4,
            Self::Screen => 5,
        }
    }
}

/// Grouping key inside a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchKey {
    /// Material of the batch
    pub material: MaterialId,
    /// Primitive of the batch
    pub primitive: PrimitiveId,
}

/// One queued draw
#[derive(Debug, Clone)]
pub struct Renderable {
    /// Material, read-only
    pub material: Rc<Material>,
    /// Device buffers to draw
    pub primitive: Rc<Primitive>,
    /// Owning geometry; dead references are skipped at draw time
    pub geometry: Weak<Geometry>,
    /// World transform
    pub world: Mat4,
}

impl Renderable {
    /// Batch key of this renderable
    pub fn key(&self) -> BatchKey {
        BatchKey {
            material: self.material.id(),
            primitive: self.primitive.id(),
        }
    }

    /// Geometry, if it is still alive
    pub fn geometry(&self) -> Option<Rc<Geometry>> {
        self.geometry.upgrade()
    }
}

#[derive(Debug, Default)]
struct BucketStore {
    batches: Vec<(BatchKey, Vec<Renderable>)>,
    index: HashMap<BatchKey, usize>,
    len: usize,
}

impl BucketStore {
    fn insert(&mut self, renderable: Renderable) {
        let key = renderable.key();
        let slot = *self.index.entry(key).or_insert_with(|| {
            self.batches.push((key, Vec::new()));
            self.batches.len() - 1
        });
        self.batches[slot].1.push(renderable);
        self.len += 1;
    }

    fn clear(&mut self) {
        self.batches.clear();
        self.index.clear();
        self.len = 0;
    }
}

/// Per-frame draw classification
#[derive(Debug)]
pub struct RenderQueue {
    buckets: [BucketStore; 6],
    lights: Vec<Rc<Light>>,
    view: Mat4,
    projection: Mat4,
}

impl Default for RenderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderQueue {
    /// Empty queue with identity camera matrices
    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            lights: Vec::new(),
            view: Mat4::identity(),
            projection: Mat4::identity(),
        }
    }

    /// Drop every renderable, light and the camera matrices
    pub fn reset(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.lights.clear();
        self.view = Mat4::identity();
        self.projection = Mat4::identity();
    }

    /// Cache the camera's matrices; `None` resets them to identity
    pub fn set_camera(&mut self, camera: Option<&Camera>) {
        match camera {
            Some(camera) => {
                self.view = camera.view_matrix();
                self.projection = camera.projection_matrix();
            }
            None => {
                self.view = Mat4::identity();
                self.projection = Mat4::identity();
            }
        }
    }

    /// Cached view matrix
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// Cached projection matrix
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Classify and queue one geometry
    ///
    /// A missing material or primitive drops the entry.
    pub fn push(
        &mut self,
        material: Option<Rc<Material>>,
        primitive: Option<Rc<Primitive>>,
        geometry: &Rc<Geometry>,
        world: Mat4,
        on_screen: bool,
    ) {
        let (Some(material), Some(primitive)) = (material, primitive) else {
            log::trace!("Dropping '{}': no material or primitive", geometry.name);
            return;
        };

        let renderable = Renderable {
            material,
            primitive,
            geometry: Rc::downgrade(geometry),
            world,
        };
        let material = &renderable.material;

        if on_screen {
            self.insert(Bucket::Screen, renderable);
            return;
        }
        if material.has_alpha() || material.has_custom_program() {
            self.insert(Bucket::Translucent, renderable);
            return;
        }

        if material.casts_shadows() {
            self.insert(Bucket::ShadowCaster, renderable.clone());
        }
        if material.is_occluder() {
            self.insert(Bucket::Occluder, renderable.clone());
        }
        if material.receives_shadows() {
            self.insert(Bucket::ShadedObjects, renderable);
        } else {
            self.insert(Bucket::Opaque, renderable);
        }
    }

    /// Queue a light; its index is its uniform slot for this frame
    ///
    /// Slots are not pinned to light identity. When the light set or its
    /// order changes between frames, a slot can show the previous frame's
    /// light for one frame.
    pub fn push_light(&mut self, light: Rc<Light>) {
        self.lights.push(light);
    }

    fn insert(&mut self, bucket: Bucket, renderable: Renderable) {
        self.buckets[bucket.index()].insert(renderable);
    }

    /// Visit every renderable of a bucket in batch order
    pub fn each(&self, bucket: Bucket, mut f: impl FnMut(&Renderable)) {
        for (_, batch) in &self.buckets[bucket.index()].batches {
            batch.iter().for_each(&mut f);
        }
    }

    /// Visit every batch of a bucket in first-insertion order
    pub fn each_batch(&self, bucket: Bucket, mut f: impl FnMut(BatchKey, &[Renderable])) {
        for (key, batch) in &self.buckets[bucket.index()].batches {
            f(*key, batch);
        }
    }

    /// Renderables of a bucket in batch order
    pub fn renderables(&self, bucket: Bucket) -> impl Iterator<Item = &Renderable> + '_ {
        self.buckets[bucket.index()]
            .batches
            .iter()
            .flat_map(|(_, batch)| batch.iter())
    }

    /// Visit every light with its slot
    pub fn each_light(&self, mut f: impl FnMut(usize, &Rc<Light>)) {
        for (slot, light) in self.lights.iter().enumerate() {
            f(slot, light);
        }
    }

    /// Lights in slot order
    pub fn lights(&self) -> &[Rc<Light>] {
        &self.lights
    }

    /// Slot of `light` this frame
    pub fn light_slot(&self, light: &Rc<Light>) -> Option<usize> {
        self.lights.iter().position(|l| Rc::ptr_eq(l, light))
    }

    /// Distinct shadow-casting lights in queue order
    pub fn casting_lights(&self) -> Vec<Rc<Light>> {
        let mut casting: Vec<Rc<Light>> = Vec::new();
        for light in self.lights.iter().filter(|l| l.casts_shadow()) {
            if !casting.iter().any(|seen| Rc::ptr_eq(seen, light)) {
                casting.push(Rc::clone(light));
            }
        }
        casting
    }

    /// Renderables in a bucket
    pub fn len(&self, bucket: Bucket) -> usize {
        self.buckets[bucket.index()].len
    }

    /// Batches in a bucket
    pub fn batch_count(&self, bucket: Bucket) -> usize {
        self.buckets[bucket.index()].batches.len()
    }

    /// Queued lights
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// True when no renderable and no light is queued
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty() && self.buckets.iter().all(|b| b.len == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::device::BufferId;
    use crate::render::resources::{LightKind, Topology};

    fn primitive() -> Rc<Primitive> {
        Rc::new(Primitive::non_indexed(BufferId(1), 3, Topology::Triangles))
    }

    fn geometry() -> Rc<Geometry> {
        Rc::new(Geometry::new("test"))
    }

    fn buckets_of(queue: &RenderQueue) -> Vec<Bucket> {
        Bucket::ALL.into_iter().filter(|b| queue.len(*b) > 0).collect()
    }

    #[test]
    fn test_render_queue_creation() {
        let queue = RenderQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.view(), Mat4::identity());
    }

    #[test]
    fn test_opaque_family_is_exclusive() {
        let geo = geometry();
        let flag_sets = [
            (true, true),
            (true, false),
            (false, true),
            (false, false),
        ];
        for (casts, receives) in flag_sets {
            let mut queue = RenderQueue::new();
            let material = Rc::new(
                Material::new()
                    .with_casts_shadows(casts)
                    .with_receives_shadows(receives),
            );
            queue.push(Some(material), Some(primitive()), &geo, Mat4::identity(), false);

            let primary = queue.len(Bucket::Opaque) + queue.len(Bucket::ShadedObjects);
            assert_eq!(primary, 1);
            assert_eq!(queue.len(Bucket::Translucent), 0);
            assert_eq!(queue.len(Bucket::Screen), 0);
            assert_eq!(queue.len(Bucket::ShadedObjects), usize::from(receives));
            assert_eq!(queue.len(Bucket::ShadowCaster), usize::from(casts));
        }
    }

    #[test]
    fn test_alpha_goes_translucent() {
        let mut queue = RenderQueue::new();
        let material = Rc::new(Material::new().with_alpha(0.5));
        queue.push(Some(material), Some(primitive()), &geometry(), Mat4::identity(), false);
        assert_eq!(buckets_of(&queue), vec![Bucket::Translucent]);
    }

    #[test]
    fn test_custom_program_goes_translucent() {
        let mut queue = RenderQueue::new();
        let material = Rc::new(Material::new().with_program("shaders/water"));
        queue.push(Some(material), Some(primitive()), &geometry(), Mat4::identity(), false);
        assert_eq!(buckets_of(&queue), vec![Bucket::Translucent]);
    }

    #[test]
    fn test_on_screen_wins_over_everything() {
        let mut queue = RenderQueue::new();
        let material = Rc::new(Material::new().with_alpha(0.5).with_occluder(true));
        queue.push(Some(material), Some(primitive()), &geometry(), Mat4::identity(), true);
        assert_eq!(buckets_of(&queue), vec![Bucket::Screen]);
    }

    #[test]
    fn test_occluder_is_additive() {
        let mut queue = RenderQueue::new();
        let material = Rc::new(Material::new().with_occluder(true));
        queue.push(Some(material), Some(primitive()), &geometry(), Mat4::identity(), false);
        assert_eq!(queue.len(Bucket::Occluder), 1);
        assert_eq!(queue.len(Bucket::ShadedObjects), 1);
        assert_eq!(queue.len(Bucket::ShadowCaster), 1);
    }

    #[test]
    fn test_missing_material_or_primitive_is_dropped() {
        let mut queue = RenderQueue::new();
        let geo = geometry();
        queue.push(None, Some(primitive()), &geo, Mat4::identity(), false);
        queue.push(Some(Rc::new(Material::new())), None, &geo, Mat4::identity(), false);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_batches_group_by_material_and_primitive() {
        let mut queue = RenderQueue::new();
        let geo = geometry();
        let red = Rc::new(Material::new().with_casts_shadows(false));
        let blue = Rc::new(Material::new().with_casts_shadows(false));
        let mesh = primitive();

        queue.push(Some(Rc::clone(&red)), Some(Rc::clone(&mesh)), &geo, Mat4::identity(), false);
        queue.push(Some(Rc::clone(&blue)), Some(Rc::clone(&mesh)), &geo, Mat4::identity(), false);
        queue.push(Some(Rc::clone(&red)), Some(Rc::clone(&mesh)), &geo, Mat4::identity(), false);

        assert_eq!(queue.len(Bucket::ShadedObjects), 3);
        assert_eq!(queue.batch_count(Bucket::ShadedObjects), 2);

        let mut seen = Vec::new();
        queue.each_batch(Bucket::ShadedObjects, |key, batch| seen.push((key.material, batch.len())));
        assert_eq!(seen, vec![(red.id(), 2), (blue.id(), 1)]);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut queue = RenderQueue::new();
        let geo = geometry();
        let material = Rc::new(Material::new());
        for _ in 0..5 {
            queue.push(Some(Rc::clone(&material)), Some(primitive()), &geo, Mat4::identity(), false);
        }
        queue.push_light(Rc::new(Light::ambient(Vec3::new(0.1, 0.1, 0.1))));

        queue.reset();
        queue.reset();
        assert!(queue.is_empty());

        for _ in 0..3 {
            queue.push(Some(Rc::clone(&material)), Some(primitive()), &geo, Mat4::identity(), false);
        }
        assert_eq!(queue.len(Bucket::ShadedObjects), 3);
        assert_eq!(queue.len(Bucket::ShadowCaster), 3);
        assert_eq!(queue.light_count(), 0);
    }

    #[test]
    fn test_set_camera_none_resets_matrices() {
        let mut queue = RenderQueue::new();
        let camera = Camera::default();
        queue.set_camera(Some(&camera));
        assert_ne!(queue.view(), Mat4::identity());
        queue.set_camera(None);
        assert_eq!(queue.view(), Mat4::identity());
        assert_eq!(queue.projection(), Mat4::identity());
    }

    #[test]
    fn test_casting_lights_are_distinct_and_ordered() {
        let mut queue = RenderQueue::new();
        let sun = Rc::new(Light::directional(-Vec3::y(), Vec3::new(1.0, 1.0, 1.0)).with_shadows(true));
        let lamp = Rc::new(Light::point(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 10.0));
        queue.push_light(Rc::clone(&sun));
        queue.push_light(Rc::clone(&lamp));
        queue.push_light(Rc::clone(&sun));

        let casting = queue.casting_lights();
        assert_eq!(casting.len(), 1);
        assert!(Rc::ptr_eq(&casting[0], &sun));
        assert_eq!(queue.light_slot(&lamp), Some(1));
    }

    #[test]
    fn test_each_visits_batches_and_lights_in_order() {
        let mut queue = RenderQueue::new();
        let geo = geometry();
        let red = Rc::new(Material::new());
        let blue = Rc::new(Material::new());
        let mesh = primitive();
        for material in [&red, &blue, &red] {
            queue.push(Some(Rc::clone(material)), Some(Rc::clone(&mesh)), &geo, Mat4::identity(), false);
        }
        let mut materials = Vec::new();
        queue.each(Bucket::ShadowCaster, |r| materials.push(r.material.id()));
        assert_eq!(materials, vec![red.id(), red.id(), blue.id()]);

        let ambient = Rc::new(Light::ambient(Vec3::new(0.1, 0.1, 0.1)));
        let lamp = Rc::new(Light::point(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 5.0));
        queue.push_light(Rc::clone(&lamp));
        queue.push_light(Rc::clone(&ambient));
        let mut slots = Vec::new();
        queue.each_light(|slot, light| slots.push((slot, light.kind)));
        assert_eq!(slots, vec![(0, LightKind::Point), (1, LightKind::Ambient)]);
    }
}
