/// Update stage: per-object kinematics and the GPU instance records built from them

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec2, Vec3};
use crate::error::Result;
use crate::frame::stage_ring::StageRing;

// ===== KINEMATICS =====

/// Position, heading and linear velocity of a moving object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematic {
    pub position: Vec3,
    pub orientation: Quat,
    pub velocity: Vec3,
}

impl Default for Kinematic {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
        }
    }
}

impl Kinematic {
    pub fn new(position: Vec3, orientation: Quat, velocity: Vec3) -> Self {
        Self { position, orientation, velocity }
    }

    /// Advance the position by `dt` seconds
    pub fn integrate(&mut self, dt: f32) {
        self.position += self.velocity * dt;
    }

    /// World transform `dt` seconds past the last update
    ///
    /// The render stage runs between updates and uses this to avoid visible
    /// stepping.
    pub fn extrapolate(&self, dt: f32) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position + self.velocity * dt)
    }
}

/// Moving object as simulated by the update stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicObject {
    pub kinematic: Kinematic,
    pub type_id: u32,
    pub material_variant: u32,
    pub brightness: f32,
}

impl DynamicObject {
    pub fn new(kinematic: Kinematic, type_id: u32, material_variant: u32, brightness: f32) -> Self {
        Self { kinematic, type_id, material_variant, brightness }
    }

    /// Clamp to the XY rectangle and bounce off the crossed borders
    ///
    /// The heading (rotation around Z) is mirrored on each crossed axis and
    /// the velocity is re-aimed along it at unchanged speed. Returns whether
    /// the object was outside.
    pub fn keep_inside(&mut self, min: Vec2, max: Vec2) -> bool {
        let k = &mut self.kinematic;
        let outside_x = k.position.x < min.x || k.position.x > max.x;
        let outside_y = k.position.y < min.y || k.position.y > max.y;
        if !outside_x && !outside_y {
            return false;
        }

        k.position.x = k.position.x.clamp(min.x, max.x);
        k.position.y = k.position.y.clamp(min.y, max.y);

        let mut heading = k.orientation * Vec3::X;
        if outside_x {
            heading.x = -heading.x;
        }
        if outside_y {
            heading.y = -heading.y;
        }
        let speed = k.velocity.length();
        k.orientation = Quat::from_rotation_z(heading.y.atan2(heading.x));
        k.velocity = k.orientation * Vec3::X * speed;
        true
    }
}

/// Run `f` over `objects` in `workers` chunks and wait for all of them
pub fn parallel_update<T, F>(objects: &mut [T], workers: usize, f: F)
where
    T: Send,
    F: Fn(&mut T) + Sync,
{
    if objects.is_empty() {
        return;
    }
    let chunk = objects.len().div_ceil(workers.max(1));
    std::thread::scope(|scope| {
        for part in objects.chunks_mut(chunk) {
            let f = &f;
            scope.spawn(move || part.iter_mut().for_each(f));
        }
    });
}

/// Copy the updated objects into the ring's update slot and publish it
///
/// Runs after `parallel_update` has joined, on the update thread.
pub fn publish_objects<T: Clone>(ring: &StageRing<Vec<T>>, objects: &[T]) -> Result<()> {
    {
        let mut slot = ring.update_slot()?;
        slot.clear();
        slot.extend_from_slice(objects);
    }
    ring.publish()
}

// ===== INSTANCE RECORDS =====

/// Per-instance data of a static object as read by the culling and render shaders
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct StaticInstance {
    pub position: Mat4,
    pub type_id: u32,
    pub material_variant: u32,
    pub brightness: f32,
    pub waving_amplitude: f32,
    pub waving_frequency: f32,
    pub waving_offset: f32,
    pub std430_pad0: u32,
    pub std430_pad1: u32,
}

impl StaticInstance {
    pub fn new(position: Mat4, type_id: u32, material_variant: u32, brightness: f32) -> Self {
        Self {
            position,
            type_id,
            material_variant,
            brightness,
            waving_amplitude: 0.0,
            waving_frequency: 1.0,
            waving_offset: 0.0,
            std430_pad0: 0,
            std430_pad1: 0,
        }
    }

    pub fn with_waving(mut self, amplitude: f32, frequency: f32, offset: f32) -> Self {
        self.waving_amplitude = amplitude;
        self.waving_frequency = frequency;
        self.waving_offset = offset;
        self
    }
}

/// Maximum number of animated bones per dynamic instance
pub const MAX_BONES: usize = 9;

/// Per-instance data of a dynamic object, with its animated bone transforms
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DynamicInstance {
    pub position: Mat4,
    pub bones: [Mat4; MAX_BONES],
    pub type_id: u32,
    pub material_variant: u32,
    pub brightness: f32,
    pub std430_pad0: u32,
}

impl DynamicInstance {
    /// Instance at the object's extrapolated transform, bones at identity
    pub fn from_object(object: &DynamicObject, dt: f32) -> Self {
        Self {
            position: object.kinematic.extrapolate(dt),
            bones: [Mat4::IDENTITY; MAX_BONES],
            type_id: object.type_id,
            material_variant: object.material_variant,
            brightness: object.brightness,
            std430_pad0: 0,
        }
    }
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod tests;
