//! Small math types shared by the node tree and the draw list.
//!
//! `Vec2`, `Vtx` and `VtxData` are `#[repr(C)]` and `Pod` so draw-list
//! buffers can be handed to a GPU (or across the C ABI) without conversion.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// 2D vector.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    pub const ONE: Vec2 = Vec2 { x: 1.0, y: 1.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    #[inline]
    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        Vec2::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, o: Vec2) -> Vec2 {
        Vec2::new(self.x + o.x, self.y + o.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, o: Vec2) -> Vec2 {
        Vec2::new(self.x - o.x, self.y - o.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, s: f32) -> Vec2 {
        Vec2::new(self.x * s, self.y * s)
    }
}

impl From<[f32; 2]> for Vec2 {
    fn from(v: [f32; 2]) -> Self {
        Vec2::new(v[0], v[1])
    }
}

/// Vertex position. Carries `z` only with the `vec3-position` feature.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vtx {
    pub x: f32,
    pub y: f32,
    #[cfg(feature = "vec3-position")]
    pub z: f32,
}

impl Vtx {
    #[inline]
    pub fn from_xy(p: Vec2) -> Self {
        Self {
            x: p.x,
            y: p.y,
            #[cfg(feature = "vec3-position")]
            z: 0.0,
        }
    }
}

/// A single vertex as laid out in the draw list.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VtxData {
    pub vtx: Vtx,
    pub uv: Vec2,
}

/// 2D affine matrix, column-major: `[a c tx; b d ty]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Translate * Rotate(z) * Scale.
    pub fn from_trs(t: Vec2, rot_z: f32, s: Vec2) -> Affine {
        let (sin, cos) = rot_z.sin_cos();
        Affine {
            a: cos * s.x,
            b: sin * s.x,
            c: -sin * s.y,
            d: cos * s.y,
            tx: t.x,
            ty: t.y,
        }
    }

    /// `self * rhs`: applies `rhs` first.
    pub fn then(&self, rhs: &Affine) -> Affine {
        Affine {
            a: self.a * rhs.a + self.c * rhs.b,
            b: self.b * rhs.a + self.d * rhs.b,
            c: self.a * rhs.c + self.c * rhs.d,
            d: self.b * rhs.c + self.d * rhs.d,
            tx: self.a * rhs.tx + self.c * rhs.ty + self.tx,
            ty: self.b * rhs.tx + self.d * rhs.ty + self.ty,
        }
    }

    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    #[inline]
    pub fn translation(&self) -> Vec2 {
        Vec2::new(self.tx, self.ty)
    }
}

impl Default for Affine {
    fn default() -> Self {
        Affine::IDENTITY
    }
}

/// Local node transform as authored.
/// Only the z rotation is meaningful for a 2D puppet; x/y are kept for round trips.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(rename = "trans", default)]
    pub translation: [f32; 3],
    #[serde(rename = "rot", default)]
    pub rotation: [f32; 3],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 2],
}

fn unit_scale() -> [f32; 2] {
    [1.0, 1.0]
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [0.0; 3],
            scale: unit_scale(),
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Affine {
        Affine::from_trs(
            Vec2::new(self.translation[0], self.translation[1]),
            self.rotation[2],
            Vec2::from(self.scale),
        )
    }
}
