//! Scale-rotate-translate transforms for drawing groups.
//!
//! A `Transform` is stored as separate components so that keyframes can
//! interpolate each one independently. The affine form applies scale and
//! rotation about the pivot, then translates:
//!
//! ```text
//! T(translation + pivot) · R(rotation) · S(scale) · T(-pivot)
//! ```

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Scales smaller than this are treated as collapsed when decomposing.
const SCALE_EPSILON: f64 = 1e-12;

/// Local transform of a drawing group, relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec2,
    /// Radians, counter-clockwise.
    pub rotation: f64,
    pub scale: Vec2,
    /// Fixed point for scale and rotation, in the group's content coordinates.
    pub pivot: Point,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec2::ZERO,
        rotation: 0.0,
        scale: Vec2::new(1.0, 1.0),
        pivot: Point::ORIGIN,
    };

    /// Identity transform that scales and rotates about `pivot`.
    pub fn with_pivot(pivot: Point) -> Self {
        Self {
            pivot,
            ..Self::IDENTITY
        }
    }

    pub fn translated(mut self, offset: Vec2) -> Self {
        self.translation += offset;
        self
    }

    pub fn to_affine(&self) -> Affine {
        let pivot = self.pivot.to_vec2();
        Affine::translate(self.translation + pivot)
            * Affine::rotate(self.rotation)
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
            * Affine::translate(-pivot)
    }

    /// Decompose an affine matrix into components, keeping `pivot` as the
    /// fixed point. Shear cannot be represented and is dropped.
    pub fn from_affine(m: Affine, pivot: Point) -> Self {
        let [a, b, c, d, e, f] = m.as_coeffs();
        let sx = a.hypot(b);
        let (rotation, scale) = if sx < SCALE_EPSILON {
            (0.0, Vec2::new(0.0, c.hypot(d)))
        } else {
            let det = a * d - b * c;
            (b.atan2(a), Vec2::new(sx, det / sx))
        };

        // Linear part applied to the pivot, so the pivot stays fixed.
        let moved_pivot = Vec2::new(a * pivot.x + c * pivot.y, b * pivot.x + d * pivot.y);
        let translation = Vec2::new(e, f) - pivot.to_vec2() + moved_pivot;

        Self {
            translation,
            rotation,
            scale,
            pivot,
        }
    }

    /// Interpolate component-wise: translation, scale and pivot linearly,
    /// rotation along the shortest angular path.
    pub fn lerp(&self, other: &Transform, t: f64) -> Transform {
        Transform {
            translation: self.translation.lerp(other.translation, t),
            rotation: self.rotation + shortest_angle(self.rotation, other.rotation) * t,
            scale: self.scale.lerp(other.scale, t),
            pivot: self.pivot.lerp(other.pivot, t),
        }
    }

    /// World-space position of the pivot under a parent transform.
    pub fn pivot_in(&self, parent: Affine) -> Point {
        parent * (self.pivot + self.translation)
    }

    pub fn is_identity(&self) -> bool {
        self.translation == Vec2::ZERO && self.rotation == 0.0 && self.scale == Vec2::new(1.0, 1.0)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Signed angle from `from` to `to`, wrapped into `(-π, π]`.
pub fn shortest_angle(from: f64, to: f64) -> f64 {
    let delta = (to - from).rem_euclid(TAU);
    if delta > PI { delta - TAU } else { delta }
}

/// Rotation angle of an affine's linear part.
pub fn affine_rotation(m: Affine) -> f64 {
    let [a, b, ..] = m.as_coeffs();
    b.atan2(a)
}
