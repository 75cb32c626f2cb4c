use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ops::Range;
use std::rc::Rc;
use std::sync::Arc;

use glam::Mat4;
use log::{debug, info, warn};
use wgpu::util::DeviceExt;
use wgpu::{BindGroup, BindGroupLayout, Buffer, Device, RenderPipeline, Surface, SurfaceConfiguration, TextureView};
use winit::window::Window;

use super::backend::{BackendFactory, RenderBackend};
use super::gpu_context::GpuContext;
use super::resources::{ResourceKind, ResourceTracker, Tracked};
use super::window::{Container, ContainerRef, SurfaceRect};
use crate::error::{Result, SceneError};
use crate::scene::{
    Background, Light, LightKind, Material, ModelData, ObjectId, ProceduralPointCloud, Renderable,
    RenderableObject, Scene, TextureData,
};

pub const MAX_LIGHTS: usize = 8;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// === GPU Data Structures ===

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    /// xyz position or direction, w light kind
    pub position: [f32; 4],
    /// rgb colour, a intensity
    pub color: [f32; 4],
    /// Spot direction, or hemisphere ground colour
    pub direction: [f32; 4],
    /// x range, y cosine of the spot half-angle
    pub params: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameUniform {
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    background: [f32; 4],
    fog_color: [f32; 4],
    fog_range: [f32; 4],
    lights: [LightUniform; MAX_LIGHTS],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ObjectUniform {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
    params: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct MaterialUniform {
    base_color: [f32; 4],
    emissive: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct MeshVertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct PointInstance {
    center: [f32; 3],
    color: [f32; 3],
}

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
const POINT_ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

/// Pack scene lights for the shader. Lights past [`MAX_LIGHTS`] are dropped.
pub fn pack_lights(lights: &[Light]) -> ([LightUniform; MAX_LIGHTS], u32) {
    let mut packed = [LightUniform::default(); MAX_LIGHTS];
    for (slot, light) in packed.iter_mut().zip(lights) {
        let [r, g, b] = light.color;
        slot.color = [r, g, b, light.intensity];
        match light.kind {
            LightKind::Ambient => slot.position[3] = 0.0,
            LightKind::Directional { position } => {
                slot.position = [position.x, position.y, position.z, 1.0];
            }
            LightKind::Point { position, range } => {
                slot.position = [position.x, position.y, position.z, 2.0];
                slot.params = [range, 0.0, 0.0, 0.0];
            }
            LightKind::Spot {
                position,
                target,
                range,
                angle,
            } => {
                let direction = (target - position).normalize_or_zero();
                slot.position = [position.x, position.y, position.z, 3.0];
                slot.direction = [direction.x, direction.y, direction.z, 0.0];
                slot.params = [range, angle.cos(), 0.0, 0.0];
            }
            LightKind::Hemisphere { ground } => {
                slot.position[3] = 4.0;
                slot.direction = [ground[0], ground[1], ground[2], 0.0];
            }
        }
    }
    let count = lights.len().min(MAX_LIGHTS);
    if lights.len() > MAX_LIGHTS {
        debug!("{} lights, only {} are shaded", lights.len(), MAX_LIGHTS);
    }
    (packed, count as u32)
}

/// Viewport and scissor for a container on a surface of the given size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub scissor: [u32; 4],
}

impl Viewport {
    /// `None` when the rect does not overlap the surface
    pub fn for_rect(rect: &SurfaceRect, surface_width: u32, surface_height: u32) -> Option<Self> {
        let left = rect.left.max(0.0);
        let top = rect.top.max(0.0);
        let right = (rect.left + rect.width as f32).min(surface_width as f32);
        let bottom = (rect.top + rect.height as f32).min(surface_height as f32);
        if right <= left || bottom <= top {
            return None;
        }
        let sx = left.floor() as u32;
        let sy = top.floor() as u32;
        Some(Self {
            x: rect.left,
            y: rect.top,
            width: rect.width as f32,
            height: rect.height as f32,
            scissor: [sx, sy, right.ceil() as u32 - sx, bottom.ceil() as u32 - sy],
        })
    }
}

/// Bind group layouts, pipelines and shared fallbacks for every backend on
/// one surface
struct ScenePipelines {
    frame_layout: BindGroupLayout,
    object_layout: BindGroupLayout,
    material_layout: BindGroupLayout,
    mesh: RenderPipeline,
    points: RenderPipeline,
    background: RenderPipeline,
    sampler: wgpu::Sampler,
    _white: wgpu::Texture,
    white_view: TextureView,
}

impl ScenePipelines {
    fn new(device: &Device, queue: &wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/scene.wgsl").into()),
        });

        let uniform_entry = |binding: u32, visibility: wgpu::ShaderStages| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Object Bind Group Layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &object_layout, &material_layout],
            push_constant_ranges: &[],
        });
        let points_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Points Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &object_layout],
            push_constant_ranges: &[],
        });
        let background_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Background Pipeline Layout"),
            bind_group_layouts: &[&frame_layout],
            push_constant_ranges: &[],
        });

        let depth = |write: bool, compare: wgpu::CompareFunction| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: write,
            depth_compare: compare,
            stencil: Default::default(),
            bias: Default::default(),
        };

        let mesh = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&mesh_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_mesh"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &MESH_ATTRIBUTES,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_mesh"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(depth(true, wgpu::CompareFunction::Less)),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Zero,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };
        let points = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Points Pipeline"),
            layout: Some(&points_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_points"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<PointInstance>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &POINT_ATTRIBUTES,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_points"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(additive),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(depth(false, wgpu::CompareFunction::Less)),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let background = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Background Pipeline"),
            layout: Some(&background_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_background"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_background"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(depth(false, wgpu::CompareFunction::Always)),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let white = create_texture(device, queue, &TextureData::solid([255; 4]), "White Texture");
        let white_view = white.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            frame_layout,
            object_layout,
            material_layout,
            mesh,
            points,
            background,
            sampler,
            _white: white,
            white_view,
        }
    }
}

fn create_texture(device: &Device, queue: &wgpu::Queue, data: &TextureData, label: &str) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: data.width,
        height: data.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        &data.data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * data.width),
            rows_per_image: Some(data.height),
        },
        size,
    );
    texture
}

fn create_depth_view(device: &Device, width: u32, height: u32) -> TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

struct ActiveFrame {
    texture: wgpu::SurfaceTexture,
    view: TextureView,
    /// Set once the first host of the frame has cleared it
    cleared: bool,
}

/// The window's swapchain, shared by every host on the page.
///
/// Each frame is acquired once, every host draws into its container's
/// viewport, and the frame is presented once.
pub struct SharedSurface {
    gpu: Arc<GpuContext>,
    surface: Surface<'static>,
    config: RefCell<SurfaceConfiguration>,
    depth: RefCell<TextureView>,
    frame: RefCell<Option<ActiveFrame>>,
    pipelines: ScenePipelines,
    tracker: Rc<ResourceTracker>,
    presented: Cell<u64>,
}

impl SharedSurface {
    pub fn new(window: Arc<Window>) -> Result<Rc<Self>> {
        let (gpu, surface, config) = pollster::block_on(GpuContext::for_window(window))?;
        let pipelines = ScenePipelines::new(gpu.device(), gpu.queue(), config.format);
        let depth = create_depth_view(gpu.device(), config.width, config.height);
        Ok(Rc::new(Self {
            gpu: Arc::new(gpu),
            surface,
            config: RefCell::new(config),
            depth: RefCell::new(depth),
            frame: RefCell::new(None),
            pipelines,
            tracker: ResourceTracker::new(),
            presented: Cell::new(0),
        }))
    }

    pub fn tracker(&self) -> Rc<ResourceTracker> {
        self.tracker.clone()
    }

    /// Get current surface dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        let config = self.config.borrow();
        (config.width, config.height)
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented.get()
    }

    /// Resize the surface
    pub fn resize(&self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        // A frame acquired at the old size cannot be presented
        self.frame.borrow_mut().take();
        let mut config = self.config.borrow_mut();
        config.width = width;
        config.height = height;
        self.surface.configure(self.gpu.device(), &config);
        *self.depth.borrow_mut() = create_depth_view(self.gpu.device(), width, height);
    }

    /// Acquire the next swapchain image
    pub fn begin_frame(&self) -> Result<()> {
        if self.frame.borrow().is_some() {
            return Ok(());
        }
        match self.surface.get_current_texture() {
            Ok(texture) => {
                let view = texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
                *self.frame.borrow_mut() = Some(ActiveFrame {
                    texture,
                    view,
                    cleared: false,
                });
                Ok(())
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (width, height) = self.dimensions();
                self.resize(width, height);
                Err(SceneError::Surface("surface reconfigured, frame skipped".into()))
            }
            Err(e) => Err(SceneError::Surface(e.to_string())),
        }
    }

    /// Present the current frame, clearing it first if no host drew
    pub fn present(&self) {
        let Some(frame) = self.frame.borrow_mut().take() else {
            return;
        };
        if !frame.cleared {
            let mut encoder = self
                .gpu
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Clear Encoder"),
                });
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.gpu.queue().submit(Some(encoder.finish()));
        }
        frame.texture.present();
        self.presented.set(self.presented.get() + 1);
    }
}

struct GpuMaterial {
    buffer: Buffer,
    bind_group: BindGroup,
}

struct GpuMesh {
    vertices: Tracked<Buffer>,
    indices: Buffer,
    /// Index range and material slot per group
    groups: Vec<(Range<u32>, usize)>,
}

enum GpuGeometry {
    Meshes {
        meshes: Vec<GpuMesh>,
        materials: Vec<GpuMaterial>,
        _textures: Vec<Tracked<wgpu::Texture>>,
    },
    Points {
        instances: Tracked<Buffer>,
        count: u32,
    },
}

struct GpuObject {
    buffer: Buffer,
    bind_group: BindGroup,
    geometry: GpuGeometry,
}

fn material_uniform(material: &Material, textured: bool) -> MaterialUniform {
    let [r, g, b] = material.emissive;
    let k = material.emissive_intensity;
    MaterialUniform {
        base_color: material.base_color,
        emissive: [r * k, g * k, b * k, if textured { 1.0 } else { 0.0 }],
    }
}

/// Draws one host's scene into its container's viewport of the shared
/// surface
pub struct WgpuBackend {
    surface: Rc<SharedSurface>,
    container: ContainerRef,
    frame_buffer: Buffer,
    frame_bind_group: BindGroup,
    objects: HashMap<ObjectId, GpuObject>,
    context: Option<Tracked<()>>,
    size: (u32, u32),
}

impl WgpuBackend {
    pub fn new(surface: Rc<SharedSurface>, container: &Container) -> Self {
        let device = surface.gpu.device();
        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &surface.pipelines.frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });
        let rect = container.rect();
        let context = surface.tracker.track(ResourceKind::Context, ());
        Self {
            container: container.downgrade(),
            frame_buffer,
            frame_bind_group,
            objects: HashMap::new(),
            context: Some(context),
            size: (rect.width, rect.height),
            surface,
        }
    }

    fn upload_model(&self, data: &ModelData, name: &str) -> GpuGeometry {
        let device = self.surface.gpu.device();
        let queue = self.surface.gpu.queue();
        let pipelines = &self.surface.pipelines;

        let textures: Vec<Option<Tracked<wgpu::Texture>>> = data
            .textures
            .iter()
            .enumerate()
            .map(|(i, texture)| {
                let expected = (texture.width * texture.height * 4) as usize;
                if texture.width == 0 || texture.height == 0 || texture.data.len() != expected {
                    warn!("{}: texture {} has a bad size, using white", name, i);
                    return None;
                }
                let gpu_texture = create_texture(device, queue, texture, name);
                Some(self.surface.tracker.track(ResourceKind::Texture, gpu_texture))
            })
            .collect();
        let views: Vec<Option<TextureView>> = textures
            .iter()
            .map(|t| t.as_ref().map(|t| t.create_view(&wgpu::TextureViewDescriptor::default())))
            .collect();

        let fallback = Material::default();
        let slots = data.materials.len().max(1);
        let materials = (0..slots)
            .map(|i| {
                let material = data.materials.get(i).unwrap_or(&fallback);
                let view = material.texture.and_then(|t| views.get(t)).and_then(Option::as_ref);
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Material Uniforms"),
                    contents: bytemuck::cast_slice(&[material_uniform(material, view.is_some())]),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Material Bind Group"),
                    layout: &pipelines.material_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(view.unwrap_or(&pipelines.white_view)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::Sampler(&pipelines.sampler),
                        },
                    ],
                });
                GpuMaterial { buffer, bind_group }
            })
            .collect();

        let meshes = data
            .meshes
            .iter()
            .map(|mesh| {
                let vertices: Vec<MeshVertex> = (0..mesh.positions.len())
                    .map(|i| MeshVertex {
                        position: mesh.positions[i],
                        normal: mesh.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                        uv: mesh.uvs.get(i).copied().unwrap_or([0.0, 0.0]),
                    })
                    .collect();
                let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Indices"),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                let groups = if mesh.groups.is_empty() {
                    vec![(0..mesh.indices.len() as u32, 0)]
                } else {
                    mesh.groups
                        .iter()
                        .map(|g| (g.start..g.start + g.count, g.material.min(slots - 1)))
                        .collect()
                };
                GpuMesh {
                    vertices: self.surface.tracker.track(ResourceKind::Geometry, vertex_buffer),
                    indices,
                    groups,
                }
            })
            .collect();

        GpuGeometry::Meshes {
            meshes,
            materials,
            _textures: textures.into_iter().flatten().collect(),
        }
    }

    fn upload_points(&self, cloud: &ProceduralPointCloud) -> GpuGeometry {
        let instances: Vec<PointInstance> = cloud
            .positions
            .iter()
            .zip(cloud.colors.iter().chain(std::iter::repeat(&[1.0, 1.0, 1.0])))
            .map(|(&center, &color)| PointInstance { center, color })
            .collect();
        let buffer = self
            .surface
            .gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Point Instances"),
                contents: bytemuck::cast_slice(&instances),
                usage: wgpu::BufferUsages::VERTEX,
            });
        GpuGeometry::Points {
            instances: self.surface.tracker.track(ResourceKind::Geometry, buffer),
            count: instances.len() as u32,
        }
    }

    fn write_uniforms(&self, scene: &Scene) {
        let queue = self.surface.gpu.queue();
        let camera = &scene.camera;
        let (lights, count) = pack_lights(&scene.lights.resolve(camera));
        let (background, fog_color, fog_range) = {
            let background = match scene.background {
                Background::Transparent => [0.0; 4],
                Background::Color([r, g, b]) => [r, g, b, 1.0],
            };
            match scene.fog {
                Some(fog) => (
                    background,
                    [fog.color[0], fog.color[1], fog.color[2], 1.0],
                    [fog.near, fog.far, count as f32, 0.0],
                ),
                None => (background, [0.0; 4], [0.0, 0.0, count as f32, 0.0]),
            }
        };
        let frame = FrameUniform {
            view: camera.view_matrix().to_cols_array_2d(),
            proj: camera.projection_matrix().to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).to_array(),
            background,
            fog_color,
            fog_range,
            lights,
        };
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::cast_slice(&[frame]));

        for (id, object) in scene.objects() {
            let Some(gpu) = self.objects.get(&id) else {
                continue;
            };
            let model = object.transform.matrix();
            let params = match &object.renderable {
                Renderable::PointCloud(cloud) => [cloud.material.size, cloud.material.opacity, 0.0, 0.0],
                _ => [0.0; 4],
            };
            let uniform = ObjectUniform {
                model: model.to_cols_array_2d(),
                normal: normal_matrix(model).to_cols_array_2d(),
                params,
            };
            queue.write_buffer(&gpu.buffer, 0, bytemuck::cast_slice(&[uniform]));

            // Material parameters animate (dice glow), so they are rewritten each frame
            if let (Some(data), GpuGeometry::Meshes { materials, .. }) = (object.model_data(), &gpu.geometry) {
                for (material, slot) in data.materials.iter().zip(materials) {
                    let textured = material
                        .texture
                        .is_some_and(|t| t < data.textures.len());
                    queue.write_buffer(
                        &slot.buffer,
                        0,
                        bytemuck::cast_slice(&[material_uniform(material, textured)]),
                    );
                }
            }
        }
    }
}

fn normal_matrix(model: Mat4) -> Mat4 {
    if model.determinant().abs() <= f32::EPSILON {
        return Mat4::IDENTITY;
    }
    model.inverse().transpose()
}

impl RenderBackend for WgpuBackend {
    fn upload(&mut self, id: ObjectId, object: &RenderableObject) -> Result<()> {
        if self.context.is_none() {
            return Err(SceneError::Gpu("upload after release".into()));
        }
        let device = self.surface.gpu.device();
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Object Uniforms"),
            size: std::mem::size_of::<ObjectUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Object Bind Group"),
            layout: &self.surface.pipelines.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        let geometry = match &object.renderable {
            Renderable::Model(model) => self.upload_model(&model.data, &object.name),
            Renderable::Cube(cube) => self.upload_model(&cube.data, &object.name),
            Renderable::PointCloud(cloud) => self.upload_points(cloud),
        };
        debug!("uploaded {} ({:?})", object.name, object.footprint());
        // Replacing drops the previous GPU resources
        self.objects.insert(
            id,
            GpuObject {
                buffer,
                bind_group,
                geometry,
            },
        );
        Ok(())
    }

    fn release_object(&mut self, id: ObjectId) -> bool {
        self.objects.remove(&id).is_some()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn render(&mut self, scene: &Scene) -> Result<()> {
        if self.context.is_none() {
            return Err(SceneError::Surface("backend released".into()));
        }
        let container = self
            .container
            .upgrade()
            .ok_or_else(|| SceneError::Surface("container dropped".into()))?;
        let (surface_width, surface_height) = self.surface.dimensions();
        let Some(viewport) = Viewport::for_rect(&container.rect(), surface_width, surface_height) else {
            return Ok(());
        };

        self.write_uniforms(scene);

        let mut frame = self.surface.frame.borrow_mut();
        let active = frame
            .as_mut()
            .ok_or_else(|| SceneError::Surface("no frame in progress".into()))?;
        let load = if active.cleared {
            wgpu::LoadOp::Load
        } else {
            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
        };
        active.cleared = true;

        let depth = self.surface.depth.borrow();
        let pipelines = &self.surface.pipelines;
        let mut encoder = self
            .surface
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Render Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &active.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_viewport(viewport.x, viewport.y, viewport.width, viewport.height, 0.0, 1.0);
            let [sx, sy, sw, sh] = viewport.scissor;
            pass.set_scissor_rect(sx, sy, sw, sh);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);

            if let Background::Color(_) = scene.background {
                pass.set_pipeline(&pipelines.background);
                pass.draw(0..3, 0..1);
            }

            pass.set_pipeline(&pipelines.mesh);
            for (id, _) in scene.objects() {
                let Some(GpuObject {
                    bind_group,
                    geometry: GpuGeometry::Meshes { meshes, materials, .. },
                    ..
                }) = self.objects.get(&id)
                else {
                    continue;
                };
                pass.set_bind_group(1, bind_group, &[]);
                for mesh in meshes {
                    pass.set_vertex_buffer(0, mesh.vertices.slice(..));
                    pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                    for (range, material) in &mesh.groups {
                        pass.set_bind_group(2, &materials[*material].bind_group, &[]);
                        pass.draw_indexed(range.clone(), 0, 0..1);
                    }
                }
            }

            pass.set_pipeline(&pipelines.points);
            for (id, _) in scene.objects() {
                let Some(GpuObject {
                    bind_group,
                    geometry: GpuGeometry::Points { instances, count },
                    ..
                }) = self.objects.get(&id)
                else {
                    continue;
                };
                pass.set_bind_group(1, bind_group, &[]);
                pass.set_vertex_buffer(0, instances.slice(..));
                pass.draw(0..6, 0..*count);
            }
        }
        self.surface.gpu.queue().submit(Some(encoder.finish()));
        Ok(())
    }

    fn release(&mut self) {
        if self.context.is_some() {
            info!("releasing GPU backend with {} objects", self.objects.len());
        }
        self.objects.clear();
        self.context.take();
    }

    fn is_released(&self) -> bool {
        self.context.is_none()
    }
}

/// Creates [`WgpuBackend`]s drawing into one shared window surface
pub struct WgpuBackendFactory {
    surface: Rc<SharedSurface>,
}

impl WgpuBackendFactory {
    pub fn new(surface: Rc<SharedSurface>) -> Self {
        Self { surface }
    }
}

impl BackendFactory for WgpuBackendFactory {
    fn create(&self, container: &Container) -> Result<Box<dyn RenderBackend>> {
        Ok(Box::new(WgpuBackend::new(self.surface.clone(), container)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn uniform_sizes_are_sixteen_byte_aligned() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 64);
        assert_eq!(std::mem::size_of::<FrameUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<ObjectUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 32);
    }

    #[test]
    fn spot_light_points_at_its_target() {
        let spot = Light::spot([1.0, 0.6, 0.0], 3.0, Vec3::new(10.0, 10.0, 10.0), 20.0, std::f32::consts::FRAC_PI_4);
        let (packed, count) = pack_lights(&[spot]);
        assert_eq!(count, 1);
        let d = Vec3::from_slice(&packed[0].direction[..3]);
        assert!((d + Vec3::splat(1.0).normalize()).length() < 1e-5);
        assert_eq!(packed[0].color[3], 3.0);
        assert!((packed[0].params[1] - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
    }

    #[test]
    fn extra_lights_are_dropped() {
        let lights = vec![Light::ambient([1.0; 3], 0.1); MAX_LIGHTS + 3];
        let (_, count) = pack_lights(&lights);
        assert_eq!(count as usize, MAX_LIGHTS);
    }

    #[test]
    fn viewport_clips_scissor_to_surface() {
        let rect = SurfaceRect::new(0.0, 600.0, 800, 400);
        let viewport = Viewport::for_rect(&rect, 800, 800).unwrap();
        assert_eq!(viewport.height, 400.0);
        assert_eq!(viewport.scissor, [0, 600, 800, 200]);
        assert!(Viewport::for_rect(&SurfaceRect::new(0.0, 900.0, 10, 10), 800, 800).is_none());
    }
}
