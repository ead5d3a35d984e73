//! Benchmarks for chunk meshing and frame rasterization.
//!
//! Run with: cargo bench --package scanvox-render --bench render_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use glam::Vec3;
use scanvox_core::coords::ChunkPos;
use scanvox_render::{
    fill_triangle, BlendMode, CameraPose, FrameBuffer, MeshBuilder, MeshCache, RenderConfig,
    Renderer, ScreenVertex,
};
use scanvox_world::lighting::relight_area;
use scanvox_world::{ChunkManager, LightEngine, RelightStrategy, TerrainGenerator};

fn terrain(radius: i32) -> (ChunkManager, Vec<ChunkPos>) {
    let generator = TerrainGenerator::with_seed(42);
    let positions: Vec<ChunkPos> = (-radius..=radius)
        .flat_map(|z| (-radius..=radius).map(move |x| ChunkPos::new(x, z)))
        .collect();
    let manager = ChunkManager::new(positions.len());
    for chunk in generator.generate_chunks_parallel(&positions) {
        manager.insert(chunk);
    }
    relight_area(&LightEngine::new(), &manager, &positions, RelightStrategy::default());
    (manager, positions)
}

fn benchmark_mesh_chunk(c: &mut Criterion) {
    let (manager, _) = terrain(1);
    let builder = MeshBuilder::new();

    c.bench_function("mesh_single_chunk", |b| {
        b.iter(|| {
            manager.with_neighborhood(ChunkPos::new(0, 0), |hood| black_box(builder.build(hood)))
        });
    });
}

fn benchmark_mesh_area(c: &mut Criterion) {
    let (manager, positions) = terrain(2);

    let mut group = c.benchmark_group("mesh_area");
    group.throughput(Throughput::Elements(positions.len() as u64));
    group.sample_size(20);
    group.bench_function("5x5_chunks_parallel", |b| {
        b.iter(|| {
            let mut cache = MeshCache::new();
            black_box(cache.rebuild(&manager, &positions))
        });
    });
    group.finish();
}

fn benchmark_fill_triangle(c: &mut Criterion) {
    let mut frame = FrameBuffer::new(640, 360);
    let tri = [
        ScreenVertex::new(10.5, 20.5, 3.0, 1.0),
        ScreenVertex::new(600.5, 40.5, 5.0, 0.75),
        ScreenVertex::new(200.5, 340.5, 9.0, 0.5),
    ];

    c.bench_function("fill_large_triangle", |b| {
        b.iter(|| {
            frame.clear(0);
            black_box(fill_triangle(&mut frame, black_box(&tri), Vec3::ONE, BlendMode::Opaque))
        });
    });
}

fn benchmark_render_frame(c: &mut Criterion) {
    let (manager, positions) = terrain(2);
    let mut meshes = MeshCache::new();
    meshes.rebuild(&manager, &positions);
    let mut renderer = Renderer::new(RenderConfig::default().with_render_distance(2));

    let mut group = c.benchmark_group("render_frame");
    group.sample_size(20);
    group.bench_function("640x360_terrain", |b| {
        let mut yaw = 0.0_f32;
        b.iter(|| {
            // Turn a little each frame so visibility is rebuilt.
            yaw += 0.1;
            let camera = CameraPose::new(Vec3::new(8.0, 90.0, 8.0), yaw, 0.5);
            black_box(renderer.render_frame(&meshes, &camera, 0.25).color().len())
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_mesh_chunk,
    benchmark_mesh_area,
    benchmark_fill_triangle,
    benchmark_render_frame
);
criterion_main!(benches);
