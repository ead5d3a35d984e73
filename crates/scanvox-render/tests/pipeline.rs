//! End-to-end tests: streamed terrain through lighting, meshing and
//! rendering, plus edits flowing back into the frame.

use std::sync::Arc;

use approx::assert_relative_eq;
use glam::Vec3;
use scanvox_core::coords::WorldPos;
use scanvox_core::types::{BlockId, Fluid, Voxel};
use scanvox_render::{sky_color, CameraPose, MeshCache, RenderConfig, Renderer};
use scanvox_world::{
    ChunkManager, ChunkStreamer, FluidSimulator, LightEngine, StreamingConfig, TerrainGenerator,
    World,
};

const STONE: BlockId = BlockId::from_rgb(0x70, 0x70, 0x70);

/// A 3x3 chunk world around the origin, lit and meshed.
fn terrain() -> (World, MeshCache) {
    let world = World::new(Arc::new(ChunkManager::default()), Arc::new(LightEngine::new()));
    let mut streamer = ChunkStreamer::new(
        StreamingConfig::default().with_load_radius(1),
        Arc::new(TerrainGenerator::with_seed(42)),
        None,
    );

    for _ in 0..10 {
        streamer.update(Vec3::new(8.0, 100.0, 8.0), &world);
        if world.chunks().len() == 9 {
            break;
        }
    }
    assert_eq!(world.chunks().len(), 9);

    world.process_lighting();
    let mut meshes = MeshCache::new();
    while meshes.update(&world, 4) > 0 {}
    assert_eq!(meshes.len(), 9);
    (world, meshes)
}

fn renderer() -> Renderer {
    Renderer::new(
        RenderConfig::default()
            .with_size(64, 48)
            .with_fov(1.2)
            .with_render_distance(1),
    )
}

#[test]
fn looking_down_sees_the_ground() {
    let (_world, meshes) = terrain();
    let mut renderer = renderer();
    let camera = CameraPose::new(Vec3::new(8.5, 100.0, 8.5), 0.0, 1.4);

    let frame = renderer.render_frame(&meshes, &camera, 0.25);
    assert_ne!(frame.pixel(32, 24), Some(sky_color(0.25)));

    let stats = *renderer.stats();
    assert!(stats.visible_segments > 0);
    assert!(stats.rasterized > 0);
    assert!(stats.pixels > 0);
}

#[test]
fn placed_block_shows_up_in_front_of_the_camera() {
    let (world, mut meshes) = terrain();
    let mut renderer = renderer();
    let camera = CameraPose::new(Vec3::new(8.5, 100.5, 8.5), 0.0, 0.0);

    renderer.render_frame(&meshes, &camera, 0.25);
    assert!(renderer.frame().depth_at(32, 24).unwrap().is_infinite());

    world.set_block(WorldPos::new(8, 100, 12), STONE);
    world.process_lighting();
    while meshes.update(&world, 4) > 0 {}

    let frame = renderer.render_frame(&meshes, &camera, 0.25);
    assert_relative_eq!(frame.depth_at(32, 24).unwrap(), 3.5, epsilon = 1e-3);
}

#[test]
fn removed_block_opens_the_view_again() {
    let (world, mut meshes) = terrain();
    let mut renderer = renderer();
    let camera = CameraPose::new(Vec3::new(8.5, 100.5, 8.5), 0.0, 0.0);

    world.set_block(WorldPos::new(8, 100, 12), STONE);
    while meshes.update(&world, 4) > 0 {}
    renderer.render_frame(&meshes, &camera, 0.25);
    assert!(renderer.frame().depth_at(32, 24).unwrap().is_finite());

    world.set_block(WorldPos::new(8, 100, 12), BlockId::AIR);
    while meshes.update(&world, 4) > 0 {}
    renderer.render_frame(&meshes, &camera, 0.25);
    assert!(renderer.frame().depth_at(32, 24).unwrap().is_infinite());
}

#[test]
fn lamp_lights_its_surroundings() {
    let (world, _meshes) = terrain();
    let lamp = WorldPos::new(8, 110, 8);
    let beside = WorldPos::new(11, 110, 8);
    assert_eq!(world.light_at(beside).block(), 0);

    world.set_block(lamp, BlockId::LAMP);
    world.process_lighting();

    assert_eq!(world.light_at(beside).block(), 12);
    // The seam at x = 16 is crossed.
    assert_eq!(world.light_at(WorldPos::new(17, 110, 8)).block(), 6);
}

#[test]
fn falling_water_is_drawn_translucent() {
    let (world, mut meshes) = terrain();
    let sim = FluidSimulator::attach(&world);
    world.set_voxel(WorldPos::new(8, 110, 12), Voxel::fluid_source(Fluid::Water));
    for _ in 0..200 {
        sim.tick(&world);
    }
    world.process_lighting();
    while meshes.update(&world, 4) > 0 {}

    let below = world.voxel_at(WorldPos::new(8, 105, 12));
    assert_eq!(below.block, BlockId::WATER);

    let mut renderer = renderer();
    let camera = CameraPose::new(Vec3::new(8.5, 108.5, 8.5), 0.0, 0.0);
    renderer.render_frame(&meshes, &camera, 0.25);
    let stats = *renderer.stats();
    assert!(stats.transparent > 0);
    // Translucent geometry never writes depth.
    assert!(renderer.frame().depth_at(32, 24).unwrap().is_infinite());
    assert_ne!(renderer.frame().pixel(32, 24), Some(sky_color(0.25)));
}
