//! Pixel coordinate system for the engine.
//!
//! This module provides the scalar, position, size and rectangle types used
//! by layout, paint and hit testing, plus the 2-D affine transform consumed
//! by the compositor.
//!
//! # Coordinate System
//!
//! - Origin (0, 0) at the top-left corner
//! - X-axis increases to the right
//! - Y-axis increases downward
//! - Negative coordinates are supported for scrolling and off-screen
//!   positioning
//!
//! # Example
//!
//! ```
//! use pictor::px::{Px, PxPosition, PxSize, PxRect};
//!
//! let position = PxPosition::new(Px(10.0), Px(20.0));
//! let size = PxSize::new(Px(300.0), Px(200.0));
//! let rect = PxRect::from_pos_size(position, size);
//! assert!(rect.contains(PxPosition::new(Px(100.0), Px(100.0))));
//! ```

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// A pixel coordinate value.
///
/// Supports negative values for scrolling and off-screen positioning.
/// Values are logical pixels; the platform surface carries the
/// device-pixel-ratio needed to map them to physical pixels.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
pub struct Px(pub f32);

impl Px {
    /// A constant representing zero pixels.
    pub const ZERO: Self = Self(0.0);

    /// Creates a new `Px` value.
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Returns the raw f32 value.
    pub const fn raw(self) -> f32 {
        self.0
    }

    /// Returns the larger of two pixel values.
    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }

    /// Returns the smaller of two pixel values.
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// Returns the absolute value.
    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }
}

impl From<f32> for Px {
    fn from(value: f32) -> Self {
        Self(value)
    }
}

impl Add for Px {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Px {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Px {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Px {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul<f32> for Px {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<f32> for Px {
    type Output = Self;
    fn div(self, rhs: f32) -> Self {
        Self(self.0 / rhs)
    }
}

impl Neg for Px {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

/// A 2-D position in pixel space.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PxPosition {
    /// Horizontal coordinate.
    pub x: Px,
    /// Vertical coordinate.
    pub y: Px,
}

impl PxPosition {
    /// The origin position.
    pub const ZERO: Self = Self {
        x: Px::ZERO,
        y: Px::ZERO,
    };

    /// Creates a new position.
    pub const fn new(x: Px, y: Px) -> Self {
        Self { x, y }
    }

    /// Returns this position offset by the given deltas.
    pub fn offset(self, dx: Px, dy: Px) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl Add for PxPosition {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for PxPosition {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// A 2-D size in pixel space.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PxSize {
    /// Horizontal extent.
    pub width: Px,
    /// Vertical extent.
    pub height: Px,
}

impl PxSize {
    /// The zero size.
    pub const ZERO: Self = Self {
        width: Px::ZERO,
        height: Px::ZERO,
    };

    /// Creates a new size.
    pub const fn new(width: Px, height: Px) -> Self {
        Self { width, height }
    }

    /// Returns true if either dimension is zero or negative.
    pub fn is_empty(self) -> bool {
        self.width.0 <= 0.0 || self.height.0 <= 0.0
    }
}

/// An axis-aligned rectangle in pixel space.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PxRect {
    /// Left edge.
    pub x: Px,
    /// Top edge.
    pub y: Px,
    /// Horizontal extent.
    pub width: Px,
    /// Vertical extent.
    pub height: Px,
}

impl PxRect {
    /// The zero rectangle.
    pub const ZERO: Self = Self {
        x: Px::ZERO,
        y: Px::ZERO,
        width: Px::ZERO,
        height: Px::ZERO,
    };

    /// Creates a rectangle from an origin and a size.
    pub const fn from_pos_size(pos: PxPosition, size: PxSize) -> Self {
        Self {
            x: pos.x,
            y: pos.y,
            width: size.width,
            height: size.height,
        }
    }

    /// Returns the origin of the rectangle.
    pub const fn origin(self) -> PxPosition {
        PxPosition {
            x: self.x,
            y: self.y,
        }
    }

    /// Returns the size of the rectangle.
    pub const fn size(self) -> PxSize {
        PxSize {
            width: self.width,
            height: self.height,
        }
    }

    /// Returns true if the point lies within the rectangle.
    ///
    /// The left and top edges are inclusive, the right and bottom edges are
    /// exclusive, so adjacent rectangles do not both claim their shared edge.
    pub fn contains(self, point: PxPosition) -> bool {
        point.x.0 >= self.x.0
            && point.x.0 < self.x.0 + self.width.0
            && point.y.0 >= self.y.0
            && point.y.0 < self.y.0 + self.height.0
    }

    /// Returns the intersection of two rectangles, if any.
    pub fn intersection(self, other: Self) -> Option<Self> {
        let left = self.x.0.max(other.x.0);
        let top = self.y.0.max(other.y.0);
        let right = (self.x.0 + self.width.0).min(other.x.0 + other.width.0);
        let bottom = (self.y.0 + self.height.0).min(other.y.0 + other.height.0);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self {
            x: Px(left),
            y: Px(top),
            width: Px(right - left),
            height: Px(bottom - top),
        })
    }
}

/// A 2-D affine transform in row-major `[a b tx; c d ty]` form.
///
/// Used by the compositor to place repaint-boundary pictures. The raster
/// cache keys on the transform with its translation zeroed, so two
/// transforms differing only by translation share a cache entry while a
/// scale or rotation change produces a distinct one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    /// X-axis scale component.
    pub a: f32,
    /// X skew component.
    pub b: f32,
    /// Y skew component.
    pub c: f32,
    /// Y-axis scale component.
    pub d: f32,
    /// Horizontal translation.
    pub tx: f32,
    /// Vertical translation.
    pub ty: f32,
}

impl Transform2D {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Creates a pure translation.
    pub const fn translation(tx: f32, ty: f32) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            tx,
            ty,
        }
    }

    /// Creates a rotation about the origin, in radians.
    pub fn rotation(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            a: cos,
            b: -sin,
            c: sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Creates a scale about the origin.
    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Returns `self` followed by `other` (`other * self` in matrix terms).
    pub fn then(self, other: Self) -> Self {
        Self {
            a: other.a * self.a + other.b * self.c,
            b: other.a * self.b + other.b * self.d,
            c: other.c * self.a + other.d * self.c,
            d: other.c * self.b + other.d * self.d,
            tx: other.a * self.tx + other.b * self.ty + other.tx,
            ty: other.c * self.tx + other.d * self.ty + other.ty,
        }
    }

    /// Returns this transform translated by the given deltas.
    pub fn then_translate(self, dx: f32, dy: f32) -> Self {
        Self {
            tx: self.tx + dx,
            ty: self.ty + dy,
            ..self
        }
    }

    /// Applies the transform to a point.
    pub fn apply(self, point: PxPosition) -> PxPosition {
        PxPosition {
            x: Px(self.a * point.x.0 + self.b * point.y.0 + self.tx),
            y: Px(self.c * point.x.0 + self.d * point.y.0 + self.ty),
        }
    }

    /// Returns a copy with the translation components zeroed.
    pub const fn without_translation(self) -> Self {
        Self {
            a: self.a,
            b: self.b,
            c: self.c,
            d: self.d,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Deterministic string form of the translation-free part, used to build
    /// raster cache keys.
    pub fn translation_invariant_key(self) -> String {
        let m = self.without_translation();
        format!("[{:.4},{:.4},{:.4},{:.4}]", m.a, m.b, m.c, m.d)
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_is_half_open() {
        let rect = PxRect::from_pos_size(
            PxPosition::new(Px(10.0), Px(10.0)),
            PxSize::new(Px(20.0), Px(20.0)),
        );
        assert!(rect.contains(PxPosition::new(Px(10.0), Px(10.0))));
        assert!(rect.contains(PxPosition::new(Px(29.9), Px(29.9))));
        assert!(!rect.contains(PxPosition::new(Px(30.0), Px(10.0))));
        assert!(!rect.contains(PxPosition::new(Px(9.9), Px(10.0))));
    }

    #[test]
    fn rect_intersection_clips_to_overlap() {
        let a = PxRect::from_pos_size(PxPosition::ZERO, PxSize::new(Px(10.0), Px(10.0)));
        let b = PxRect::from_pos_size(
            PxPosition::new(Px(5.0), Px(5.0)),
            PxSize::new(Px(10.0), Px(10.0)),
        );
        let overlap = a.intersection(b).expect("rects overlap");
        assert_eq!(overlap.x, Px(5.0));
        assert_eq!(overlap.width, Px(5.0));
        assert!(
            a.intersection(PxRect::from_pos_size(
                PxPosition::new(Px(20.0), Px(0.0)),
                PxSize::new(Px(5.0), Px(5.0)),
            ))
            .is_none()
        );
    }

    #[test]
    fn transform_key_ignores_translation() {
        let m = Transform2D::rotation(0.5).then_translate(100.0, -40.0);
        let n = Transform2D::rotation(0.5).then_translate(-3.0, 7.5);
        assert_eq!(
            m.translation_invariant_key(),
            n.translation_invariant_key()
        );
        let scaled = Transform2D::scale(2.0, 2.0);
        assert_ne!(
            m.translation_invariant_key(),
            scaled.translation_invariant_key()
        );
    }

    #[test]
    fn transform_then_composes_translation_through_rotation() {
        use std::f32::consts::FRAC_PI_2;
        // Translate, then rotate 90 degrees: the translation is rotated too.
        let m = Transform2D::translation(10.0, 0.0).then(Transform2D::rotation(FRAC_PI_2));
        let p = m.apply(PxPosition::ZERO);
        assert!(p.x.0.abs() < 1e-4);
        assert!((p.y.0 - 10.0).abs() < 1e-4);
    }
}
