use glam::Vec3;

use crate::math::AABB;

/// Decoded RGBA8 texture
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl TextureData {
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            data: rgba.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGBA; alpha is opacity
    pub base_color: [f32; 4],
    /// Index into the owning model's texture list
    pub texture: Option<usize>,
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            texture: None,
            emissive: [0.0, 0.0, 0.0],
            emissive_intensity: 1.0,
        }
    }
}

/// A run of indices drawn with one material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshGroup {
    pub start: u32,
    pub count: u32,
    pub material: usize,
}

/// Indexed triangle mesh. Normals and uvs are either empty or one per position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub groups: Vec<MeshGroup>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Option<AABB> {
        let points: Vec<Vec3> = self.positions.iter().map(|p| Vec3::from_array(*p)).collect();
        AABB::from_points(&points)
    }

    /// Every triangle with the index of the group it belongs to.
    /// Triangles outside any group report `None`; out-of-range indices are skipped.
    pub fn triangles(&self) -> impl Iterator<Item = (Option<usize>, [Vec3; 3])> + '_ {
        self.indices.chunks_exact(3).enumerate().filter_map(move |(tri, idx)| {
            let vertex = |i: u32| self.positions.get(i as usize).map(|p| Vec3::from_array(*p));
            let corners = [vertex(idx[0])?, vertex(idx[1])?, vertex(idx[2])?];
            let first_index = (tri * 3) as u32;
            let group = self
                .groups
                .iter()
                .position(|g| first_index >= g.start && first_index < g.start + g.count);
            Some((group, corners))
        })
    }

    /// Flat per-face normals for meshes that came without any
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for idx in self.indices.chunks_exact(3) {
            let [a, b, c] = [idx[0], idx[1], idx[2]].map(|i| i as usize);
            if a >= normals.len() || b >= normals.len() || c >= normals.len() {
                continue;
            }
            let [pa, pb, pc] = [a, b, c].map(|i| Vec3::from_array(self.positions[i]));
            let n = (pb - pa).cross(pc - pa);
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
        self.normals = normals
            .into_iter()
            .map(|n| n.normalize_or(Vec3::Y).to_array())
            .collect();
    }
}

/// Geometry, materials and textures for one renderable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
    pub materials: Vec<Material>,
    pub textures: Vec<TextureData>,
}

impl ModelData {
    pub fn bounds(&self) -> Option<AABB> {
        self.meshes
            .iter()
            .filter_map(MeshData::bounds)
            .reduce(|a, b| a.union(&b))
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(MeshData::triangle_count).sum()
    }
}

/// Face order of [`cube_model`] groups
pub const CUBE_FACES: [&str; 6] = ["+x", "-x", "+y", "-y", "+z", "-z"];

/// Box of edge `size` centred at the origin, one group per face in the
/// order +X, -X, +Y, -Y, +Z, -Z. Group `i` uses material `i`.
pub fn cube_model(size: f32, materials: Vec<Material>, textures: Vec<TextureData>) -> ModelData {
    let h = size * 0.5;
    // (normal, u axis, v axis) with u x v == normal
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut mesh = MeshData::default();
    for (face, (normal, u_axis, v_axis)) in faces.into_iter().enumerate() {
        let base = mesh.positions.len() as u32;
        for (u, v) in [(-1.0, 1.0), (1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)] {
            let p = (normal + u_axis * u + v_axis * v) * h;
            mesh.positions.push(p.to_array());
            mesh.normals.push(normal.to_array());
            // Image rows run top to bottom
            mesh.uvs.push([(u + 1.0) * 0.5, (1.0 - v) * 0.5]);
        }
        let start = mesh.indices.len() as u32;
        mesh.indices
            .extend([0, 2, 1, 2, 3, 1].into_iter().map(|i| base + i));
        mesh.groups.push(MeshGroup {
            start,
            count: 6,
            material: face,
        });
    }

    ModelData {
        meshes: vec![mesh],
        materials,
        textures,
    }
}
