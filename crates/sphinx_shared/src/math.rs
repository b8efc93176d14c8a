//! Mathematical types shared between client and server.
//!
//! These are the canonical representations used in replicated component fields.

use bytemuck::{Pod, Zeroable};

use crate::constants::CHUNK_SIZE;

/// 3D Vector - position, velocity, direction
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// All-ones vector
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    /// Right (+X)
    pub const RIGHT: Self = Self::new(1.0, 0.0, 0.0);

    /// Up (+Y)
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);

    /// Forward (-Z)
    pub const FORWARD: Self = Self::new(0.0, 0.0, -1.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Unit-length copy, or zero for the zero vector.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            return Self::ZERO;
        }
        self * (1.0 / len)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Integer 3D vector - chunk and block coordinates
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Vec3Int {
    /// X component
    pub x: i32,
    /// Y component
    pub y: i32,
    /// Z component
    pub z: i32,
}

impl Vec3Int {
    /// Creates a new Vec3Int
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Lossy conversion to floating point.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f32(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

/// Quaternion for rotations
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Quaternion {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W component
    pub w: f32,
}

impl Quaternion {
    /// Creates a new quaternion
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Identity rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Rotation of `radians` around `axis`.
    #[must_use]
    pub fn from_axis_angle(axis: Vec3, radians: f32) -> Self {
        let axis = axis.normalized();
        let (sin, cos) = (radians * 0.5).sin_cos();
        Self::new(axis.x * sin, axis.y * sin, axis.z * sin, cos)
    }

    /// Hamilton product `self * rhs`.
    #[must_use]
    pub fn product(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }

    /// Applies `self` first, then `then`.
    #[must_use]
    pub fn concat(self, then: Self) -> Self {
        then.product(self)
    }

    /// Rotates a vector by this quaternion.
    #[must_use]
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let q = Vec3::new(self.x, self.y, self.z);
        let t = q.cross(v) * 2.0;
        v + t * self.w + q.cross(t)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A position in the voxel world.
///
/// Stored as chunk + block-in-chunk + sub-block offset so precision does not
/// degrade far from the origin.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Coordinate {
    /// Chunk coordinate
    pub chunk: Vec3Int,
    /// Block within the chunk, each axis in `0..CHUNK_SIZE`
    pub local: Vec3Int,
    /// Offset within the block
    pub offset: Vec3,
}

impl Coordinate {
    /// Creates a coordinate from its parts.
    #[must_use]
    pub const fn new(chunk: Vec3Int, local: Vec3Int, offset: Vec3) -> Self {
        Self { chunk, local, offset }
    }

    /// Origin of chunk (0,0,0).
    pub const ORIGIN: Self = Self::new(Vec3Int::ZERO, Vec3Int::ZERO, Vec3::ZERO);

    /// Position relative to the owning chunk's origin.
    #[must_use]
    pub fn local_position(&self) -> Vec3 {
        self.local.to_f32() + self.offset
    }

    /// Converts to a single floating-point position in world space.
    #[must_use]
    pub fn to_world(&self) -> Vec3 {
        let size = Vec3Int::new(CHUNK_SIZE, CHUNK_SIZE, CHUNK_SIZE).to_f32();
        let chunk = self.chunk.to_f32();
        Vec3::new(chunk.x * size.x, chunk.y * size.y, chunk.z * size.z) + self.local_position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        let sum = a + b;
        assert_eq!(sum.x, 5.0);
        assert_eq!(sum.y, 7.0);
        assert_eq!(sum.z, 9.0);

        let dot = a.dot(b);
        assert_eq!(dot, 32.0); // 1*4 + 2*5 + 3*6
    }

    #[test]
    fn test_field_types_are_packed() {
        assert_eq!(bytemuck::bytes_of(&Vec3::ZERO).len(), 12);
        assert_eq!(bytemuck::bytes_of(&Quaternion::IDENTITY).len(), 16);
        assert_eq!(bytemuck::bytes_of(&Coordinate::ORIGIN).len(), 36);
    }

    #[test]
    fn test_quaternion_rotate() {
        let quarter = Quaternion::from_axis_angle(Vec3::UP, std::f32::consts::FRAC_PI_2);
        // Forward (-Z) turned 90 degrees left around +Y points at -X
        assert!(approx(quarter.rotate(Vec3::FORWARD), Vec3::new(-1.0, 0.0, 0.0)));
        assert!(approx(Quaternion::IDENTITY.rotate(Vec3::RIGHT), Vec3::RIGHT));
    }

    #[test]
    fn test_quaternion_concat() {
        let quarter = Quaternion::from_axis_angle(Vec3::UP, std::f32::consts::FRAC_PI_2);
        let half = quarter.concat(quarter);
        assert!(approx(half.rotate(Vec3::FORWARD), Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_coordinate_world_position() {
        let coord = Coordinate::new(Vec3Int::new(1, 0, -1), Vec3Int::new(2, 3, 4), Vec3::new(0.5, 0.0, 0.0));
        assert!(approx(coord.local_position(), Vec3::new(2.5, 3.0, 4.0)));
        assert!(approx(coord.to_world(), Vec3::new(18.5, 3.0, -12.0)));
    }
}
