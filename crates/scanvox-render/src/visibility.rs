//! Segment visibility search.
//!
//! A breadth-first walk over 4x4x4 segments starting at the camera. Fully
//! opaque segment faces stop the walk: a segment is never left through an
//! opaque face (except the one holding the camera) and a segment entered
//! through an opaque face is drawn but not walked through. Segments outside
//! a slightly widened view frustum are dropped. The result is cached until
//! the camera changes segment, turns past a threshold, or the occlusion data
//! changes.

use std::collections::VecDeque;

use scanvox_core::constants::SEGMENTS_Y;
use scanvox_core::coords::{Direction, FaceMask, SegmentPos};
use scanvox_core::math::Aabb;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace_span};

use crate::camera::{CameraPose, Frustum, Projection};

/// Per-segment occlusion data consumed by the search.
pub trait OcclusionSource {
    /// Opaque faces of a segment, or `None` if it has not been meshed.
    fn occlusion(&self, pos: SegmentPos) -> Option<FaceMask>;
}

/// Token tagging scratch entries as belonging to the current search, so
/// the scratch arrays never need clearing between searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Generation(u32);

impl Generation {
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Move to the next token. Returns `true` when the counter wrapped and
    /// stale tokens must be cleared.
    pub fn advance(&mut self) -> bool {
        self.0 = self.0.wrapping_add(1);
        if self.0 == 0 {
            self.0 = 1;
            true
        } else {
            false
        }
    }
}

/// Visibility search settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibilityConfig {
    /// Horizontal reach in chunks.
    pub render_distance: u32,
    /// Camera rotation in radians that forces a new search.
    pub angle_threshold: f32,
    /// Scale applied to the frustum's side planes.
    pub frustum_margin: f32,
    /// Ignore occlusion and walk through everything.
    pub noclip: bool,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            render_distance: 6,
            angle_threshold: 0.05,
            frustum_margin: 1.15,
            noclip: false,
        }
    }
}

impl VisibilityConfig {
    #[must_use]
    pub const fn with_render_distance(mut self, chunks: u32) -> Self {
        self.render_distance = chunks;
        self
    }

    #[must_use]
    pub const fn with_noclip(mut self, noclip: bool) -> Self {
        self.noclip = noclip;
        self
    }

    /// Search radius in segments.
    pub const fn radius(&self) -> i32 {
        (self.render_distance * 4) as i32
    }
}

/// Camera state the cached result was computed for.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SearchKey {
    segment: SegmentPos,
    yaw: f32,
    pitch: f32,
    projection: Projection,
}

/// Cached visible segment list with reusable search scratch.
pub struct VisibilityIndex {
    config: VisibilityConfig,
    side: usize,
    visited: Vec<u32>,
    rendered: Vec<u32>,
    generation: Generation,
    queue: VecDeque<SegmentPos>,
    visible: Vec<SegmentPos>,
    last: Option<SearchKey>,
    stale: bool,
    searches: u64,
}

impl VisibilityIndex {
    pub fn new(config: VisibilityConfig) -> Self {
        let side = (2 * config.radius() + 1) as usize;
        let slots = side * side * SEGMENTS_Y;
        Self {
            config,
            side,
            visited: vec![0; slots],
            rendered: vec![0; slots],
            generation: Generation::default(),
            queue: VecDeque::new(),
            visible: Vec::new(),
            last: None,
            stale: true,
            searches: 0,
        }
    }

    pub const fn config(&self) -> &VisibilityConfig {
        &self.config
    }

    /// Change settings; the next refresh searches again.
    pub fn set_config(&mut self, config: VisibilityConfig) {
        if config == self.config {
            return;
        }
        if config.radius() == self.config.radius() {
            self.config = config;
            self.stale = true;
        } else {
            *self = Self::new(config);
        }
    }

    /// Force a new search, e.g. after occlusion data changed.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Segments found by the last search, nearest first.
    pub fn visible(&self) -> &[SegmentPos] {
        &self.visible
    }

    /// Number of searches run so far.
    pub const fn searches(&self) -> u64 {
        self.searches
    }

    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether the cached result is out of date for this camera.
    pub fn needs_rebuild(&self, camera: &CameraPose, projection: &Projection) -> bool {
        let Some(last) = self.last else {
            return true;
        };
        let threshold = self.config.angle_threshold;
        self.stale
            || last.segment != start_segment(camera)
            || last.projection != *projection
            || angle_delta(last.yaw, camera.yaw) > threshold
            || angle_delta(last.pitch, camera.pitch) > threshold
    }

    /// Search again only if [`Self::needs_rebuild`] says so.
    pub fn refresh<O>(
        &mut self,
        camera: &CameraPose,
        projection: &Projection,
        occlusion: &O,
    ) -> &[SegmentPos]
    where
        O: OcclusionSource + ?Sized,
    {
        if self.needs_rebuild(camera, projection) {
            self.rebuild(camera, projection, occlusion)
        } else {
            &self.visible
        }
    }

    /// Run the search from the camera's segment.
    pub fn rebuild<O>(
        &mut self,
        camera: &CameraPose,
        projection: &Projection,
        occlusion: &O,
    ) -> &[SegmentPos]
    where
        O: OcclusionSource + ?Sized,
    {
        let _span = trace_span!("visibility_search").entered();

        if self.generation.advance() {
            self.visited.fill(0);
            self.rendered.fill(0);
        }
        let token = self.generation.get();
        let noclip = self.config.noclip;
        let frustum = Frustum::new(camera, projection, self.config.frustum_margin);
        let start = start_segment(camera);

        self.visible.clear();
        self.queue.clear();
        if let Some(slot) = self.slot(start, start) {
            self.visited[slot] = token;
            self.rendered[slot] = token;
            self.visible.push(start);
            self.queue.push_back(start);
        }

        while let Some(current) = self.queue.pop_front() {
            let exits = if noclip || current == start {
                FaceMask::empty()
            } else {
                occlusion.occlusion(current).unwrap_or_default()
            };

            for dir in Direction::ALL {
                if exits.has(dir) {
                    continue;
                }
                let next = current.step(dir);
                let Some(slot) = self.slot(start, next) else {
                    continue;
                };
                if self.visited[slot] == token {
                    continue;
                }
                if current != start && !frustum.intersects(&Aabb::of_segment(next)) {
                    continue;
                }

                if self.rendered[slot] != token {
                    self.rendered[slot] = token;
                    self.visible.push(next);
                }
                let blocked = !noclip
                    && occlusion
                        .occlusion(next)
                        .is_some_and(|mask| mask.has(dir.opposite()));
                if !blocked {
                    self.visited[slot] = token;
                    self.queue.push_back(next);
                }
            }
        }

        self.last = Some(SearchKey {
            segment: start,
            yaw: camera.yaw,
            pitch: camera.pitch,
            projection: *projection,
        });
        self.stale = false;
        self.searches += 1;
        debug!(
            visible = self.visible.len(),
            x = start.x,
            y = start.y,
            z = start.z,
            "Visibility rebuilt"
        );
        &self.visible
    }

    /// Scratch slot of a segment inside the search window around `start`.
    fn slot(&self, start: SegmentPos, pos: SegmentPos) -> Option<usize> {
        if !pos.in_world() {
            return None;
        }
        let radius = self.config.radius();
        let dx = pos.x - start.x + radius;
        let dz = pos.z - start.z + radius;
        let side = self.side as i32;
        if dx < 0 || dz < 0 || dx >= side || dz >= side {
            return None;
        }
        Some((pos.y as usize * self.side + dz as usize) * self.side + dx as usize)
    }
}

/// Segment holding the camera, clamped into the world's vertical range.
fn start_segment(camera: &CameraPose) -> SegmentPos {
    let mut segment = SegmentPos::containing(camera.position);
    segment.y = segment.y.clamp(0, SEGMENTS_Y as i32 - 1);
    segment
}

/// Absolute difference between two angles, wrapped into `[0, PI]`.
fn angle_delta(a: f32, b: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let d = (a - b).rem_euclid(TAU);
    if d > PI {
        TAU - d
    } else {
        d
    }
}
