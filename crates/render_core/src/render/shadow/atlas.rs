//! Shadow atlas packing
//!
//! All casting lights of a frame share one square atlas target. The atlas is
//! either one full cell (exactly one caster) or four quadrant cells, so at
//! most four lights are shadowed per frame. Cells are handed out by light
//! type, directional first, then spot, then point; the rest cast no shadow.
//!
//! Inside its cell a directional light gets one quadrant per cascade, a point
//! light six face rectangles in three columns and two rows, and a spot light
//! the whole cell.

use std::rc::Rc;

use crate::render::resources::{Light, LightKind, ViewportRect};

/// Maximum number of shadowed lights per frame
pub const ATLAS_CAPACITY: usize = 4;

/// Quadrants in order UL, UR, LL, LR
fn quadrants() -> [ViewportRect; 4] {
    [
        ViewportRect::relative(0.0, 0.0, 0.5, 0.5),
        ViewportRect::relative(0.5, 0.0, 1.0, 0.5),
        ViewportRect::relative(0.0, 0.5, 0.5, 1.0),
        ViewportRect::relative(0.5, 0.5, 1.0, 1.0),
    ]
}

/// Cube face rectangles, three columns by two rows
fn cube_faces() -> [ViewportRect; 6] {
    std::array::from_fn(|face| {
        let (col, row) = ((face % 3) as f32, (face / 3) as f32);
        ViewportRect::relative(col / 3.0, row / 2.0, (col + 1.0) / 3.0, (row + 1.0) / 2.0)
    })
}

/// Sub-viewports of a light inside its cell, relative to the cell
pub fn cell_subdivision(kind: LightKind) -> Vec<ViewportRect> {
    match kind {
        LightKind::Directional => quadrants().to_vec(),
        LightKind::Point => cube_faces().to_vec(),
        LightKind::Spot | LightKind::Ambient => vec![ViewportRect::full()],
    }
}

fn priority(kind: LightKind) -> u8 {
    match kind {
        LightKind::Directional => 0,
        LightKind::Spot => 1,
        LightKind::Point => 2,
        LightKind::Ambient => 3,
    }
}

/// One light's place in the atlas
#[derive(Debug, Clone)]
pub struct AtlasAssignment {
    /// Shadowed light
    pub light: Rc<Light>,
    /// Index of the top-level cell
    pub cell_index: usize,
    /// Top-level cell, atlas-relative
    pub cell: ViewportRect,
    /// Sub-viewports relative to the cell
    pub shader_viewports: Vec<ViewportRect>,
    /// Sub-viewports relative to the atlas
    pub render_viewports: Vec<ViewportRect>,
}

/// Result of one packing run
#[derive(Debug, Clone, Default)]
pub struct AtlasLayout {
    /// Lights that got a cell, in cell order
    pub assignments: Vec<AtlasAssignment>,
    /// Lights left unshadowed this frame
    pub dropped: Vec<Rc<Light>>,
}

impl AtlasLayout {
    /// True when no light was packed
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Write the assignments into the lights' shadow maps
    ///
    /// Maps of dropped lights are deactivated so the lit stages ignore them.
    pub fn apply(&self) {
        for assignment in &self.assignments {
            assignment.light.shadow_map_mut().assign(
                assignment.cell_index,
                assignment.cell,
                assignment.shader_viewports.clone(),
                assignment.render_viewports.clone(),
            );
        }
        for light in &self.dropped {
            if light.has_shadow_map() {
                light.shadow_map_mut().deactivate();
            }
        }
    }
}

/// Packs casting lights into atlas cells
#[derive(Debug, Clone, Copy)]
pub struct ShadowAtlasPacker {
    capacity: usize,
}

impl Default for ShadowAtlasPacker {
    fn default() -> Self {
        Self { capacity: ATLAS_CAPACITY }
    }
}

impl ShadowAtlasPacker {
    /// Packer with the standard four-cell capacity
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells available per frame
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Assign cells to the distinct casting lights in `lights`
    pub fn pack(&self, lights: &[Rc<Light>]) -> AtlasLayout {
        let mut casting: Vec<Rc<Light>> = Vec::new();
        for light in lights.iter().filter(|l| l.casts_shadow()) {
            if !casting.iter().any(|seen| Rc::ptr_eq(seen, light)) {
                casting.push(Rc::clone(light));
            }
        }
        // stable: queue order is kept within a type
        casting.sort_by_key(|light| priority(light.kind));

        let cells: Vec<ViewportRect> = if casting.len() == 1 {
            vec![ViewportRect::full()]
        } else {
            quadrants().to_vec()
        };

        let mut layout = AtlasLayout::default();
        for (index, light) in casting.into_iter().enumerate() {
            let Some(cell) = cells.get(index).copied().filter(|_| index < self.capacity) else {
                layout.dropped.push(light);
                continue;
            };
            let shader_viewports = cell_subdivision(light.kind);
            let render_viewports = shader_viewports.iter().map(|sub| cell.sub_rect(sub)).collect();
            layout.assignments.push(AtlasAssignment {
                light,
                cell_index: index,
                cell,
                shader_viewports,
                render_viewports,
            });
        }

        if !layout.dropped.is_empty() {
            log::warn!(
                "Shadow atlas full: {} of {} casting lights left unshadowed this frame",
                layout.dropped.len(),
                layout.dropped.len() + layout.assignments.len()
            );
        }
        layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    fn white() -> Vec3 {
        Vec3::new(1.0, 1.0, 1.0)
    }

    fn point() -> Rc<Light> {
        Rc::new(Light::point(Vec3::zeros(), white(), 10.0).with_shadows(true))
    }

    fn spot() -> Rc<Light> {
        Rc::new(Light::spot(Vec3::zeros(), -Vec3::z(), white(), 10.0, 0.2, 0.4).with_shadows(true))
    }

    fn sun() -> Rc<Light> {
        Rc::new(Light::directional(Vec3::new(0.0, -1.0, -1.0), white()).with_shadows(true))
    }

    fn assert_tiles(cell: ViewportRect, subs: &[ViewportRect]) {
        let union: f32 = subs.iter().map(ViewportRect::area).sum();
        assert_relative_eq!(union, cell.area(), epsilon = 1e-6);
        for (i, a) in subs.iter().enumerate() {
            assert!(cell.contains(a, 1e-6));
            for b in &subs[i + 1..] {
                assert!(a.intersection_area(b) < 1e-6);
            }
        }
    }

    #[test]
    fn test_single_caster_gets_full_atlas() {
        let layout = ShadowAtlasPacker::new().pack(&[spot()]);
        assert_eq!(layout.assignments.len(), 1);
        assert_eq!(layout.assignments[0].cell, ViewportRect::full());
        assert_eq!(layout.assignments[0].render_viewports, vec![ViewportRect::full()]);
    }

    #[test]
    fn test_non_casting_lights_are_ignored() {
        let quiet = Rc::new(Light::point(Vec3::zeros(), white(), 10.0));
        let layout = ShadowAtlasPacker::new().pack(&[quiet]);
        assert!(layout.is_empty());
        assert!(layout.dropped.is_empty());
    }

    #[test]
    fn test_priority_order_directional_spot_point() {
        let (p, s, d) = (point(), spot(), sun());
        let layout = ShadowAtlasPacker::new().pack(&[Rc::clone(&p), Rc::clone(&s), Rc::clone(&d)]);
        let kinds: Vec<_> = layout.assignments.iter().map(|a| a.light.kind).collect();
        assert_eq!(kinds, vec![LightKind::Directional, LightKind::Spot, LightKind::Point]);
        assert_eq!(layout.assignments[0].cell, ViewportRect::relative(0.0, 0.0, 0.5, 0.5));
    }

    #[test]
    fn test_five_casters_drop_one() {
        let lights: Vec<_> = vec![point(), point(), spot(), sun(), point()];
        let layout = ShadowAtlasPacker::new().pack(&lights);
        assert_eq!(layout.assignments.len(), 4);
        assert_eq!(layout.dropped.len(), 1);
        assert_eq!(layout.dropped[0].kind, LightKind::Point);
        assert!(Rc::ptr_eq(&layout.dropped[0], &lights[4]));
        for assignment in &layout.assignments {
            assert!(assignment.render_viewports.iter().all(|r| !r.is_degenerate()));
        }
    }

    #[test]
    fn test_duplicate_lights_pack_once() {
        let s = spot();
        let layout = ShadowAtlasPacker::new().pack(&[Rc::clone(&s), Rc::clone(&s)]);
        assert_eq!(layout.assignments.len(), 1);
        assert_eq!(layout.assignments[0].cell, ViewportRect::full());
    }

    #[test]
    fn test_directional_cascades_tile_cell() {
        let layout = ShadowAtlasPacker::new().pack(&[sun(), spot()]);
        let assignment = &layout.assignments[0];
        assert_eq!(assignment.render_viewports.len(), 4);
        assert_tiles(assignment.cell, &assignment.render_viewports);
        assert_tiles(ViewportRect::full(), &assignment.shader_viewports);
    }

    #[test]
    fn test_point_faces_tile_cell() {
        let layout = ShadowAtlasPacker::new().pack(&[spot(), point()]);
        let assignment = &layout.assignments[1];
        assert_eq!(assignment.light.kind, LightKind::Point);
        assert_eq!(assignment.render_viewports.len(), 6);
        assert_tiles(assignment.cell, &assignment.render_viewports);
    }

    #[test]
    fn test_apply_writes_and_deactivates() {
        let lights: Vec<_> = (0..5).map(|_| point()).collect();
        lights[4].shadow_map_mut().assign(0, ViewportRect::full(), Vec::new(), Vec::new());

        let layout = ShadowAtlasPacker::new().pack(&lights);
        layout.apply();

        for light in &lights[..4] {
            let map = light.shadow_map();
            let map = map.as_ref().unwrap();
            assert!(map.is_active());
            assert_eq!(map.render_viewports().len(), 6);
        }
        assert!(!lights[4].shadow_map().as_ref().unwrap().is_active());
    }
}
