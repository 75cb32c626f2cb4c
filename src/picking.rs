//! Pointer picking: surface coordinates to camera ray to object hit.

use glam::{Vec2, Vec3};

use crate::camera::PerspectiveCamera;
use crate::core::window::SurfaceRect;
use crate::math::{intersect_aabb, moller_trumbore_intersect, Ray};
use crate::scene::{ObjectId, RenderableObject, Scene};

/// Pointer position in normalized device coordinates relative to `rect`.
/// `None` for an empty rect.
pub fn pointer_to_ndc(client: Vec2, rect: &SurfaceRect) -> Option<Vec2> {
    if rect.is_empty() {
        return None;
    }
    Some(Vec2::new(
        (client.x - rect.left) / rect.width as f32 * 2.0 - 1.0,
        -(client.y - rect.top) / rect.height as f32 * 2.0 + 1.0,
    ))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub object: ObjectId,
    /// World-space distance from the ray origin
    pub distance: f32,
    pub point: Vec3,
    /// Material group of the hit triangle (cube face index for a dice)
    pub group: Option<usize>,
}

/// Result of one picking pass, recomputed for every pointer event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickState {
    pub ndc: Vec2,
    pub ray: Ray,
    pub hit: Option<PickHit>,
}

/// What a successful click asks the page to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickAction {
    Navigate(String),
    ShowMessage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverTransition {
    Entered,
    Left,
}

/// Tests pointer rays against one designated object and tracks hover state
#[derive(Debug, Default)]
pub struct PointerPicker {
    hovered: bool,
}

impl PointerPicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    pub fn pick(
        &self,
        client: Vec2,
        rect: &SurfaceRect,
        camera: &PerspectiveCamera,
        scene: &Scene,
        target: Option<ObjectId>,
    ) -> Option<PickState> {
        let ndc = pointer_to_ndc(client, rect)?;
        let ray = camera.ray_from_ndc(ndc);
        let hit = target.and_then(|id| {
            let object = scene.get(id)?;
            intersect_object(&ray, id, object)
        });
        Some(PickState { ndc, ray, hit })
    }

    /// Record whether the pointer is over the target; returns the transition, if any
    pub fn update_hover(&mut self, hit: bool) -> Option<HoverTransition> {
        if hit == self.hovered {
            return None;
        }
        self.hovered = hit;
        Some(if hit {
            HoverTransition::Entered
        } else {
            HoverTransition::Left
        })
    }
}

/// Nearest intersection of `ray` with an object's triangles.
///
/// The ray is moved into object space so the local AABB serves as the broad
/// phase and triangles are tested untransformed.
pub fn intersect_object(ray: &Ray, id: ObjectId, object: &RenderableObject) -> Option<PickHit> {
    let data = object.model_data()?;
    let bounds = data.bounds()?;
    let world = object.transform.matrix();
    let inverse = world.inverse();
    if !inverse.is_finite() {
        return None;
    }
    let local = ray.transformed(&inverse);

    // Broad phase; the local direction is unnormalized, which the slab test tolerates
    if intersect_aabb(local.origin, local.direction, bounds.min, bounds.max) < 0.0 {
        return None;
    }

    let (t, group) = data
        .meshes
        .iter()
        .flat_map(|mesh| mesh.triangles())
        .filter_map(|(group, [a, b, c])| {
            moller_trumbore_intersect(local.origin, local.direction, a, b, c).map(|hit| (hit.t, group))
        })
        .min_by(|x, y| x.0.total_cmp(&y.0))?;

    // Same parameter in both spaces since the direction was not renormalized
    let point = ray.at(t);
    Some(PickHit {
        object: id,
        distance: (point - ray.origin).length(),
        point,
        group,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraConfig;
    use crate::scene::{Material, Renderable, TexturedCube, Transform};

    #[test]
    fn ndc_is_relative_to_rect() {
        let rect = SurfaceRect::new(100.0, 50.0, 200, 100);
        assert_eq!(pointer_to_ndc(Vec2::new(200.0, 100.0), &rect), Some(Vec2::ZERO));
        assert_eq!(pointer_to_ndc(Vec2::new(100.0, 50.0), &rect), Some(Vec2::new(-1.0, 1.0)));
        assert_eq!(pointer_to_ndc(Vec2::new(300.0, 150.0), &rect), Some(Vec2::new(1.0, -1.0)));
        assert_eq!(pointer_to_ndc(Vec2::ZERO, &SurfaceRect::new(0.0, 0.0, 0, 10)), None);
    }

    #[test]
    fn hover_reports_only_transitions() {
        let mut picker = PointerPicker::new();
        assert_eq!(picker.update_hover(false), None);
        assert_eq!(picker.update_hover(true), Some(HoverTransition::Entered));
        assert_eq!(picker.update_hover(true), None);
        assert_eq!(picker.update_hover(false), Some(HoverTransition::Left));
        assert!(!picker.is_hovered());
    }

    #[test]
    fn scaled_object_hit_distance_is_world_space() {
        let camera = PerspectiveCamera::new(&CameraConfig::at(50.0, [0.0, 0.0, 10.0]), 1.0);
        let cube = TexturedCube::new(2.0, vec![Material::default(); 6], Vec::new());
        let object = RenderableObject::new("cube", Renderable::Cube(cube))
            .with_transform(Transform::uniform_scale(2.0));
        let mut scene = Scene::new(camera.clone());
        let id = scene.insert(object);

        let ray = camera.ray_from_ndc(Vec2::ZERO);
        let hit = intersect_object(&ray, id, scene.get(id).unwrap()).expect("centre ray hits");
        // Front face at z = 2, camera near plane origin just in front of z = 10
        assert!((hit.point.z - 2.0).abs() < 1e-3, "hit at {:?}", hit.point);
        assert_eq!(hit.group, Some(4));
    }
}
