use anyhow::{Context, Result};
use glam::{Mat3, Mat4, Vec3};
use log::{debug, info, warn};
use std::path::Path;

use crate::scene::{Material, MeshData, MeshGroup, ModelData, TextureData};

/// Loads a glTF file into scene geometry.
///
/// Node transforms are baked into vertex positions, so the returned model is
/// in scene space. Each primitive becomes one mesh with a single group.
pub fn load_model(path: impl AsRef<Path>) -> Result<ModelData> {
    let path = path.as_ref();
    info!("Loading glTF model: {:?}", path);

    let (gltf, buffers, images) =
        gltf::import(path).with_context(|| format!("Failed to load glTF file: {:?}", path))?;

    debug!(
        "glTF {:?}: {} scenes, {} nodes, {} meshes, {} materials, {} images",
        path,
        gltf.scenes().count(),
        gltf.nodes().count(),
        gltf.meshes().count(),
        gltf.materials().count(),
        images.len()
    );

    let mut materials: Vec<Material> = gltf
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            Material {
                name: material.name().unwrap_or_default().to_string(),
                base_color: pbr.base_color_factor(),
                texture: pbr
                    .base_color_texture()
                    .map(|info| info.texture().source().index()),
                emissive: material.emissive_factor(),
                emissive_intensity: 1.0,
            }
        })
        .collect();

    // Primitives without a material use the last slot
    let default_material = materials.len();
    materials.push(Material {
        name: "default".to_string(),
        base_color: [0.7, 0.7, 0.7, 1.0],
        ..Material::default()
    });

    let textures = images
        .iter()
        .enumerate()
        .map(|(index, image)| {
            debug!("  texture {}: {}x{} ({:?})", index, image.width, image.height, image.format);
            TextureData {
                width: image.width,
                height: image.height,
                data: to_rgba(image.format, &image.pixels, image.width, image.height),
            }
        })
        .collect();

    let mut meshes = Vec::new();
    let scene = gltf.default_scene().or_else(|| gltf.scenes().next());
    if let Some(scene) = scene {
        for node in scene.nodes() {
            process_node(&node, &buffers, &Mat4::IDENTITY, default_material, &mut meshes)?;
        }
    }

    if meshes.is_empty() {
        warn!("No geometry found in glTF file {:?}", path);
    }

    let model = ModelData {
        meshes,
        materials,
        textures,
    };
    info!(
        "Loaded {:?}: {} meshes, {} triangles, {} textures",
        path,
        model.meshes.len(),
        model.triangle_count(),
        model.textures.len()
    );
    Ok(model)
}

/// Decode an image file (dice faces) into RGBA8
pub fn load_texture(path: impl AsRef<Path>) -> Result<TextureData> {
    let path = path.as_ref();
    let image = image::open(path)
        .with_context(|| format!("Failed to load texture: {:?}", path))?
        .to_rgba8();
    Ok(TextureData {
        width: image.width(),
        height: image.height(),
        data: image.into_raw(),
    })
}

/// Recursively processes glTF nodes
fn process_node(
    node: &gltf::Node,
    buffers: &[gltf::buffer::Data],
    parent_transform: &Mat4,
    default_material: usize,
    meshes: &mut Vec<MeshData>,
) -> Result<()> {
    let local_transform = Mat4::from_cols_array_2d(&node.transform().matrix());
    let global_transform = *parent_transform * local_transform;

    if let Some(mesh) = node.mesh() {
        process_mesh(&mesh, buffers, &global_transform, default_material, meshes)?;
    }

    for child in node.children() {
        process_node(&child, buffers, &global_transform, default_material, meshes)?;
    }

    Ok(())
}

fn process_mesh(
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
    transform: &Mat4,
    default_material: usize,
    meshes: &mut Vec<MeshData>,
) -> Result<()> {
    let normal_matrix = Mat3::from_mat4(*transform).inverse().transpose();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            debug!("Skipping non-triangle primitive in mesh {:?}", mesh.name());
            continue;
        }
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .context("Mesh primitive has no positions")?
            .map(|p| transform.transform_point3(Vec3::from_array(p)).to_array())
            .collect();
        if positions.is_empty() {
            continue;
        }

        let normals: Vec<[f32; 3]> = reader
            .read_normals()
            .map(|normals| {
                normals
                    .map(|n| (normal_matrix * Vec3::from_array(n)).normalize_or(Vec3::Y).to_array())
                    .collect()
            })
            .unwrap_or_default();

        let uvs: Vec<[f32; 2]> = reader
            .read_tex_coords(0)
            .map(|uvs| uvs.into_f32().collect())
            .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        let mut data = MeshData {
            groups: vec![MeshGroup {
                start: 0,
                count: indices.len() as u32,
                material: primitive.material().index().unwrap_or(default_material),
            }],
            positions,
            normals,
            uvs,
            indices,
        };
        if data.normals.len() != data.positions.len() {
            data.compute_normals();
        }
        meshes.push(data);
    }

    Ok(())
}

/// Expand 8-bit glTF image data to RGBA8. Unsupported formats become white.
fn to_rgba(format: gltf::image::Format, pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
    use gltf::image::Format;

    match format {
        Format::R8G8B8A8 => pixels.to_vec(),
        Format::R8G8B8 => pixels
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
            .collect(),
        Format::R8G8 => pixels
            .chunks_exact(2)
            .flat_map(|rg| [rg[0], rg[1], 0, 255])
            .collect(),
        Format::R8 => pixels.iter().flat_map(|&r| [r, r, r, 255]).collect(),
        other => {
            warn!("Unsupported texture format {:?}, using white", other);
            vec![255; (width * height * 4) as usize]
        }
    }
}
