//! Whole-system invariants checked on generated terrain and hand-built rooms.

use std::sync::Arc;

use approx::assert_relative_eq;
use glam::Vec3;
use scanvox_core::coords::{ChunkPos, Direction, SegmentPos, WorldPos};
use scanvox_core::types::{BlockId, Voxel};
use scanvox_render::{
    CameraPose, MeshCache, RenderConfig, Renderer, VisibilityConfig, VisibilityIndex,
};
use scanvox_world::lighting::relight_area;
use scanvox_world::{Chunk, ChunkManager, LightEngine, RelightStrategy, TerrainGenerator};

const STONE: BlockId = BlockId::from_rgb(0x66, 0x66, 0x66);

fn generated_area() -> (ChunkManager, Vec<ChunkPos>) {
    let generator = TerrainGenerator::with_seed(1234);
    let positions: Vec<ChunkPos> = (-1..=1)
        .flat_map(|z| (-1..=1).map(move |x| ChunkPos::new(x, z)))
        .collect();
    let manager = ChunkManager::new(positions.len());
    for chunk in generator.generate_chunks_parallel(&positions) {
        manager.insert(chunk);
    }
    (manager, positions)
}

#[test]
fn relighting_converges_and_is_idempotent() {
    let (manager, positions) = generated_area();
    let engine = LightEngine::new();

    let first = relight_area(
        &engine,
        &manager,
        &positions,
        RelightStrategy::UntilStable { max_passes: 32 },
    );
    assert!(first.passes < 32, "light did not converge");

    let again = relight_area(&engine, &manager, &positions, RelightStrategy::FixedPasses(1));
    assert!(again.changed.is_empty());
}

#[test]
fn mesher_never_emits_faces_into_opaque_cells() {
    let (manager, positions) = generated_area();
    let mut meshes = MeshCache::new();
    meshes.rebuild(&manager, &positions);

    let opaque_at = |p: WorldPos| {
        let Some((chunk, local)) = p.split() else {
            return false;
        };
        manager
            .with_chunk(chunk, |c| c.block(local).is_opaque())
            .unwrap_or(false)
    };

    let mut checked = 0;
    for pos in &positions {
        let mesh = meshes.get(*pos).unwrap();
        for segment in mesh.segments() {
            for tri in segment.opaque.iter().chain(&segment.transparent) {
                let centroid = (tri.verts[0].pos + tri.verts[1].pos + tri.verts[2].pos) / 3.0;
                let outward = tri.face.offset().as_vec3() * 0.5;
                let facing = WorldPos::from(centroid + outward);
                assert!(
                    !opaque_at(facing),
                    "face {:?} at {centroid} points into a solid",
                    tri.face
                );
                checked += 1;
            }
        }
    }
    assert!(checked > 1000);
}

/// A solid stone chunk with one hollow 4x4x4 segment.
fn sealed_room() -> (MeshCache, SegmentPos) {
    let room = SegmentPos::new(1, 16, 1);
    let mut chunk = Chunk::new(ChunkPos::new(0, 0));
    chunk.fill((0, 0, 0), (15, 127, 15), Voxel::new(STONE));
    chunk.fill((4, 64, 4), (7, 67, 7), Voxel::AIR);
    LightEngine::new().light_isolated(&mut chunk);

    let manager = ChunkManager::new(1);
    manager.insert(chunk);
    let mut meshes = MeshCache::new();
    meshes.rebuild(&manager, &[ChunkPos::new(0, 0)]);
    (meshes, room)
}

#[test]
fn sealed_room_sees_exactly_its_walls() {
    let (meshes, room) = sealed_room();
    let camera = CameraPose::new(Vec3::new(6.0, 66.0, 6.0), 0.3, 0.2);
    let config = RenderConfig::default().with_size(64, 48);
    let mut index = VisibilityIndex::new(VisibilityConfig::default().with_render_distance(2));

    let visible = index.rebuild(&camera, &config.projection(), &meshes);
    assert_eq!(visible.len(), 7);
    assert!(visible.contains(&room));
    for dir in Direction::ALL {
        assert!(visible.contains(&room.step(dir)));
    }
}

#[test]
fn sealed_room_renders_its_far_wall() {
    let (meshes, _room) = sealed_room();
    let camera = CameraPose::new(Vec3::new(6.0, 66.0, 6.0), 0.0, 0.0);
    let mut renderer = Renderer::new(
        RenderConfig::default()
            .with_size(64, 48)
            .with_fov(1.2)
            .with_render_distance(2),
    );

    let frame = renderer.render_frame(&meshes, &camera, 0.25);
    assert_relative_eq!(frame.depth_at(32, 24).unwrap(), 2.0, epsilon = 1e-3);
    assert!(frame.depth().iter().all(|d| d.is_finite()));
    assert_eq!(renderer.stats().visible_segments, 7);
}
