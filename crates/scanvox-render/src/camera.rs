//! Camera pose, view transform and projection.
//!
//! View space has the camera at the origin looking along +Z with +Y up.
//! Screen space has +X to the right and +Y down.

use glam::{Mat3, Vec3};
use scanvox_core::math::Aabb;
use serde::{Deserialize, Serialize};

/// Camera position and orientation.
///
/// `yaw` turns around +Y (0 looks along +Z, `PI / 2` along +X). `pitch`
/// tilts around the camera's X axis; positive pitch looks down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 80.0, 0.0),
            yaw: 0.0,
            pitch: 0.0,
        }
    }
}

impl CameraPose {
    /// Create a new pose.
    pub const fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch,
        }
    }

    /// Pose at `position` looking at `target`.
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let dir = (target - position).normalize_or_zero();
        if dir == Vec3::ZERO {
            return Self::new(position, 0.0, 0.0);
        }
        let yaw = dir.x.atan2(dir.z);
        let pitch = (-dir.y).clamp(-1.0, 1.0).asin();
        Self::new(position, yaw, pitch)
    }

    /// Camera-to-world rotation.
    fn orientation(&self) -> Mat3 {
        Mat3::from_rotation_y(self.yaw) * Mat3::from_rotation_x(self.pitch)
    }

    /// World-space viewing direction.
    pub fn forward(&self) -> Vec3 {
        self.orientation() * Vec3::Z
    }

    /// World-to-view transform: translate by `-position`, rotate by `-yaw`
    /// then by `-pitch`.
    pub fn view(&self) -> ViewTransform {
        ViewTransform {
            rotation: Mat3::from_rotation_x(-self.pitch) * Mat3::from_rotation_y(-self.yaw),
            position: self.position,
        }
    }
}

/// Precomputed world-to-view transform.
#[derive(Debug, Clone, Copy)]
pub struct ViewTransform {
    rotation: Mat3,
    position: Vec3,
}

impl ViewTransform {
    /// Transform a world-space point into view space.
    #[inline]
    pub fn to_view(&self, point: Vec3) -> Vec3 {
        self.rotation * (point - self.position)
    }
}

/// Perspective projection onto a pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub width: u32,
    pub height: u32,
    /// Focal length in pixels.
    pub focal: f32,
    /// Near clip plane distance.
    pub near: f32,
}

impl Projection {
    /// Projection with a vertical field of view in radians.
    pub fn from_fov(width: u32, height: u32, fov_y: f32, near: f32) -> Self {
        let focal = (height as f32 * 0.5) / (fov_y * 0.5).tan();
        Self {
            width,
            height,
            focal,
            near,
        }
    }

    /// Project a view-space point with `z > 0` to `(sx, sy)` pixel coordinates.
    #[inline]
    pub fn project(&self, view: Vec3) -> (f32, f32) {
        let inv_z = 1.0 / view.z;
        (
            view.x * inv_z * self.focal + self.width as f32 * 0.5,
            -view.y * inv_z * self.focal + self.height as f32 * 0.5,
        )
    }

    /// Half extents of the view cone per unit depth.
    fn half_slopes(&self) -> (f32, f32) {
        (
            self.width as f32 * 0.5 / self.focal,
            self.height as f32 * 0.5 / self.focal,
        )
    }
}

/// View frustum used to prune segments, widened by a factor.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    view: ViewTransform,
    slope_x: f32,
    slope_y: f32,
    near: f32,
}

impl Frustum {
    /// Build a frustum for a camera; `widen` scales the side planes outwards.
    pub fn new(camera: &CameraPose, projection: &Projection, widen: f32) -> Self {
        let (sx, sy) = projection.half_slopes();
        Self {
            view: camera.view(),
            slope_x: sx * widen,
            slope_y: sy * widen,
            near: projection.near,
        }
    }

    /// Conservative box test: false only if all corners lie outside one plane.
    pub fn intersects(&self, aabb: &Aabb) -> bool {
        let corners = aabb.corners().map(|c| self.view.to_view(c));
        let all = |f: &dyn Fn(Vec3) -> bool| corners.iter().all(|&c| f(c));

        !(all(&|c| c.z < self.near)
            || all(&|c| c.x > c.z * self.slope_x)
            || all(&|c| c.x < -c.z * self.slope_x)
            || all(&|c| c.y > c.z * self.slope_y)
            || all(&|c| c.y < -c.z * self.slope_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scanvox_core::coords::SegmentPos;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn default_orientation_looks_along_z() {
        let pose = CameraPose::new(Vec3::new(1.0, 2.0, 3.0), 0.0, 0.0);
        let view = pose.view().to_view(Vec3::new(1.0, 2.0, 13.0));
        assert_relative_eq!(view.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(view.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(view.z, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn yaw_turns_towards_x() {
        let pose = CameraPose::new(Vec3::ZERO, FRAC_PI_2, 0.0);
        let view = pose.view().to_view(Vec3::new(5.0, 0.0, 0.0));
        assert_relative_eq!(view.z, 5.0, epsilon = 1e-5);
        assert_relative_eq!(pose.forward().x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn looking_at_round_trips_through_view() {
        let eye = Vec3::new(10.0, 90.0, -4.0);
        let target = Vec3::new(30.0, 60.0, 25.0);
        let pose = CameraPose::looking_at(eye, target);
        let view = pose.view().to_view(target);
        assert_relative_eq!(view.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(view.y, 0.0, epsilon = 1e-3);
        assert_relative_eq!(view.z, (target - eye).length(), epsilon = 1e-3);
    }

    #[test]
    fn projection_centers_the_optical_axis() {
        let proj = Projection::from_fov(320, 200, 1.2, 0.05);
        let (sx, sy) = proj.project(Vec3::new(0.0, 0.0, 7.0));
        assert_relative_eq!(sx, 160.0);
        assert_relative_eq!(sy, 100.0);

        // Up in view space is up on screen.
        let (_, up) = proj.project(Vec3::new(0.0, 1.0, 7.0));
        assert!(up < 100.0);
    }

    #[test]
    fn frustum_rejects_boxes_behind_and_beside() {
        let pose = CameraPose::new(Vec3::new(0.0, 64.0, 0.0), 0.0, 0.0);
        let proj = Projection::from_fov(320, 240, 1.2, 0.05);
        let frustum = Frustum::new(&pose, &proj, 1.1);

        let ahead = Aabb::of_segment(SegmentPos::new(0, 16, 5));
        let behind = Aabb::of_segment(SegmentPos::new(0, 16, -5));
        let far_left = Aabb::of_segment(SegmentPos::new(-40, 16, 2));

        assert!(frustum.intersects(&ahead));
        assert!(!frustum.intersects(&behind));
        assert!(!frustum.intersects(&far_left));
    }
}
