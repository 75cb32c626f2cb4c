use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use scene_host::camera::{CameraConfig, PerspectiveCamera};
use scene_host::core::window::SurfaceRect;
use scene_host::math::intersect_aabb;
use scene_host::picking::{intersect_object, PointerPicker};
use scene_host::scene::{
    cube_model, Material, MeshData, ModelData, ModelInstance, PointsMaterial, Renderable, RenderableObject, Scene,
    Transform,
};
use scene_host::scenes::generate_point_cloud;

/// A `cells` x `cells` grid of quads facing +Z, two triangles per cell
fn grid_model(cells: u32) -> ModelData {
    let mut mesh = MeshData::default();
    let step = 2.0 / cells as f32;
    for y in 0..=cells {
        for x in 0..=cells {
            mesh.positions.push([-1.0 + x as f32 * step, -1.0 + y as f32 * step, 0.0]);
            mesh.normals.push([0.0, 0.0, 1.0]);
            mesh.uvs.push([x as f32 / cells as f32, y as f32 / cells as f32]);
        }
    }
    let row = cells + 1;
    for y in 0..cells {
        for x in 0..cells {
            let i = y * row + x;
            mesh.indices.extend([i, i + 1, i + row, i + 1, i + row + 1, i + row]);
        }
    }
    ModelData {
        meshes: vec![mesh],
        materials: vec![Material::default()],
        textures: Vec::new(),
    }
}

fn model_object(data: ModelData) -> RenderableObject {
    RenderableObject::new(
        "bench",
        Renderable::Model(ModelInstance {
            source: "bench".into(),
            data,
        }),
    )
    .with_transform(Transform::uniform_scale(0.7))
    .pickable()
}

fn camera() -> PerspectiveCamera {
    PerspectiveCamera::new(&CameraConfig::at(50.0, [0.0, 0.0, 5.0]), 2.0)
}

fn bench_pick_cube_hit(c: &mut Criterion) {
    let rect = SurfaceRect::new(0.0, 200.0, 800, 400);
    let mut scene = Scene::new(camera());
    let id = scene.insert(model_object(cube_model(2.0, vec![Material::default(); 6], Vec::new())));
    let picker = PointerPicker::new();

    c.bench_function("pick_cube_hit", |b| {
        b.iter(|| {
            picker.pick(
                black_box(Vec2::new(400.0, 400.0)),
                &rect,
                &scene.camera,
                &scene,
                Some(id),
            )
        })
    });
}

fn bench_pick_cube_miss(c: &mut Criterion) {
    let rect = SurfaceRect::new(0.0, 200.0, 800, 400);
    let mut scene = Scene::new(camera());
    let id = scene.insert(model_object(cube_model(2.0, vec![Material::default(); 6], Vec::new())));
    let picker = PointerPicker::new();

    // Rejected by the bounding box before any triangle is tested
    c.bench_function("pick_cube_miss", |b| {
        b.iter(|| picker.pick(black_box(Vec2::new(5.0, 205.0)), &rect, &scene.camera, &scene, Some(id)))
    });
}

fn bench_pick_triangle_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("pick_model");
    let ray = camera().ray_from_ndc(Vec2::ZERO);

    for cells in [8u32, 32, 128].iter() {
        let mut scene = Scene::new(camera());
        let id = scene.insert(model_object(grid_model(*cells)));
        let triangles = cells * cells * 2;
        group.bench_with_input(BenchmarkId::new("triangles", triangles), &scene, |b, scene| {
            let object = scene.get(id).unwrap();
            b.iter(|| intersect_object(black_box(&ray), id, object))
        });
    }

    group.finish();
}

fn bench_aabb_broad_phase(c: &mut Criterion) {
    let origin = Vec3::new(0.0, 0.0, 5.0);
    let direction = Vec3::new(0.1, 0.05, -1.0).normalize();

    c.bench_function("aabb_broad_phase", |b| {
        b.iter(|| intersect_aabb(black_box(origin), black_box(direction), Vec3::splat(-0.7), Vec3::splat(0.7)))
    });
}

fn bench_starfield_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("starfield");

    for count in [1_000usize, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("generate", count), count, |b, &count| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(42);
                generate_point_cloud(&mut rng, count, 200.0, PointsMaterial::default())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_pick_cube_hit,
    bench_pick_cube_miss,
    bench_pick_triangle_count,
    bench_aabb_broad_phase,
    bench_starfield_generation,
);
criterion_main!(benches);
