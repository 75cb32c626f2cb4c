pub mod geometry;
pub mod lights;
pub mod object;

use std::collections::BTreeMap;

pub use geometry::{cube_model, Material, MeshData, MeshGroup, ModelData, TextureData, CUBE_FACES};
pub use lights::{Light, LightAnchor, LightId, LightKind, LightRig};
pub use object::{
    Footprint, ModelInstance, ObjectId, PointsMaterial, ProceduralPointCloud, Renderable,
    RenderableObject, TexturedCube, Transform,
};

use crate::camera::PerspectiveCamera;

/// Clear behaviour for a host's viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    /// Whatever was drawn underneath shows through
    Transparent,
    Color([f32; 3]),
}

/// Linear distance fog
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: [f32; 3],
    pub near: f32,
    pub far: f32,
}

/// Everything one host renders
pub struct Scene {
    pub camera: PerspectiveCamera,
    pub lights: LightRig,
    pub background: Background,
    pub fog: Option<Fog>,
    objects: BTreeMap<ObjectId, RenderableObject>,
    next_id: u64,
}

impl Scene {
    pub fn new(camera: PerspectiveCamera) -> Self {
        Self {
            camera,
            lights: LightRig::new(),
            background: Background::Transparent,
            fog: None,
            objects: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn insert(&mut self, object: RenderableObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<RenderableObject> {
        self.objects.remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&RenderableObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut RenderableObject> {
        self.objects.get_mut(&id)
    }

    /// Objects in insertion order
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &RenderableObject)> {
        self.objects.iter().map(|(id, o)| (*id, o))
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
