use glam::{EulerRot, Mat4, Quat, Vec3};

use super::geometry::{cube_model, Material, ModelData, TextureData};
use crate::math::AABB;

/// Key of an object within its scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u64);

/// Translation, XYZ Euler rotation in radians, and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn uniform_scale(scale: f32) -> Self {
        Self {
            scale: Vec3::splat(scale),
            ..Self::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z);
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.translation)
    }
}

/// A loaded glTF model
#[derive(Debug, Clone)]
pub struct ModelInstance {
    pub source: String,
    pub data: ModelData,
}

/// Material for point sprites
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointsMaterial {
    /// World-space sprite size
    pub size: f32,
    pub opacity: f32,
    /// Additive blending, depth writes off
    pub additive: bool,
}

impl Default for PointsMaterial {
    fn default() -> Self {
        Self {
            size: 0.5,
            opacity: 0.8,
            additive: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProceduralPointCloud {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 3]>,
    pub material: PointsMaterial,
}

impl ProceduralPointCloud {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn bounds(&self) -> Option<AABB> {
        let points: Vec<Vec3> = self.positions.iter().map(|p| Vec3::from_array(*p)).collect();
        AABB::from_points(&points)
    }
}

/// Box with a material per face
#[derive(Debug, Clone)]
pub struct TexturedCube {
    pub size: f32,
    pub data: ModelData,
}

impl TexturedCube {
    pub fn new(size: f32, faces: Vec<Material>, textures: Vec<TextureData>) -> Self {
        Self {
            size,
            data: cube_model(size, faces, textures),
        }
    }

    pub fn face_materials_mut(&mut self) -> &mut [Material] {
        &mut self.data.materials
    }

    pub fn set_emissive_intensity(&mut self, intensity: f32) {
        for material in &mut self.data.materials {
            material.emissive_intensity = intensity;
        }
    }
}

#[derive(Debug, Clone)]
pub enum Renderable {
    Model(ModelInstance),
    PointCloud(ProceduralPointCloud),
    Cube(TexturedCube),
}

/// Number of geometry buffers and textures a renderable needs on the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Footprint {
    pub geometries: usize,
    pub textures: usize,
}

#[derive(Debug, Clone)]
pub struct RenderableObject {
    pub name: String,
    pub renderable: Renderable,
    pub transform: Transform,
    pub pickable: bool,
}

impl RenderableObject {
    pub fn new(name: impl Into<String>, renderable: Renderable) -> Self {
        Self {
            name: name.into(),
            renderable,
            transform: Transform::default(),
            pickable: false,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn pickable(mut self) -> Self {
        self.pickable = true;
        self
    }

    /// Triangle geometry, if this renderable has any
    pub fn model_data(&self) -> Option<&ModelData> {
        match &self.renderable {
            Renderable::Model(model) => Some(&model.data),
            Renderable::Cube(cube) => Some(&cube.data),
            Renderable::PointCloud(_) => None,
        }
    }

    pub fn local_bounds(&self) -> Option<AABB> {
        match &self.renderable {
            Renderable::Model(model) => model.data.bounds(),
            Renderable::Cube(cube) => cube.data.bounds(),
            Renderable::PointCloud(cloud) => cloud.bounds(),
        }
    }

    pub fn world_bounds(&self) -> Option<AABB> {
        self.local_bounds().map(|b| b.transformed(&self.transform.matrix()))
    }

    pub fn footprint(&self) -> Footprint {
        match &self.renderable {
            Renderable::Model(model) => Footprint {
                geometries: model.data.meshes.len(),
                textures: model.data.textures.len(),
            },
            Renderable::Cube(cube) => Footprint {
                geometries: 1,
                textures: cube.data.textures.len(),
            },
            Renderable::PointCloud(_) => Footprint {
                geometries: 1,
                textures: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_scale_matrix() {
        let m = Transform::uniform_scale(0.7).matrix();
        let p = m.transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert!((p - Vec3::new(0.7, 1.4, 2.1)).length() < 1e-6);
    }

    #[test]
    fn world_bounds_follow_scale() {
        let cube = TexturedCube::new(2.0, vec![Material::default(); 6], Vec::new());
        let object = RenderableObject::new("cube", Renderable::Cube(cube))
            .with_transform(Transform::uniform_scale(3.0));
        let bounds = object.world_bounds().unwrap();
        assert_eq!(bounds.max, Vec3::splat(3.0));
    }

    #[test]
    fn cube_footprint_counts_face_textures() {
        let textures = vec![TextureData::solid([255, 0, 0, 255]); 6];
        let cube = TexturedCube::new(4.0, vec![Material::default(); 6], textures);
        let object = RenderableObject::new("dice", Renderable::Cube(cube));
        assert_eq!(object.footprint(), Footprint { geometries: 1, textures: 6 });
    }

    #[test]
    fn emissive_applies_to_every_face() {
        let mut cube = TexturedCube::new(4.0, vec![Material::default(); 6], Vec::new());
        cube.set_emissive_intensity(0.25);
        assert!(cube.face_materials_mut().iter().all(|m| m.emissive_intensity == 0.25));
    }
}
