use std::fmt;

use crate::foundation::error::{BatError, BatResult};

/// Three-component vector in host world units (location) or radians (Euler XYZ rotation).
pub type Vec3 = [f64; 3];

/// Generational handle to a host scene object.
///
/// This is the crate's weak reference: the host owns the object, and a handle only names a slot
/// plus the generation that slot had when the handle was issued. Layout: low 32 bits = index
/// (0 = nil), high 32 bits = generation. Reusing a slot bumps its generation, so a stale handle
/// never aliases the object that later claims the slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(u64);

impl ObjectHandle {
    /// Build a handle from its slot index and generation.
    #[inline]
    pub const fn from_parts(index: u32, generation: u32) -> Self {
        Self((index as u64) | ((generation as u64) << 32))
    }

    /// The nil handle (never refers to a live object).
    #[inline]
    pub const fn nil() -> Self {
        Self(0)
    }

    /// Slot index.
    #[inline]
    pub const fn index(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    /// Slot generation.
    #[inline]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw packed value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether this is the nil handle.
    #[inline]
    pub const fn is_nil(self) -> bool {
        self.index() == 0
    }
}

impl Default for ObjectHandle {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHandle({}:{})", self.index(), self.generation())
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index(), self.generation())
    }
}

/// Linear RGB display color with components in `0.0..=1.0`.
///
/// Visualization only: colors never reach the saved ID channels.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rgb {
    /// Red component.
    pub r: f32,
    /// Green component.
    pub g: f32,
    /// Blue component.
    pub b: f32,
}

impl Rgb {
    /// Black, the Background class color.
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// White, the default color of new classes.
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    /// Build a color, rejecting components outside `0.0..=1.0`.
    pub fn new(r: f32, g: f32, b: f32) -> BatResult<Self> {
        for (name, v) in [("r", r), ("g", g), ("b", b)] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(BatError::validation(
                    format!("color.{name}"),
                    "must be finite and within 0.0..=1.0",
                ));
            }
        }
        Ok(Self { r, g, b })
    }

    /// Quantize to opaque RGBA8.
    pub fn to_rgba8(self) -> [u8; 4] {
        fn q(v: f32) -> u8 {
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        [q(self.r), q(self.g), q(self.b), 255]
    }
}

/// Render resolution in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Build a resolution; both dimensions must be non-zero.
    pub fn new(width: u32, height: u32) -> BatResult<Self> {
        if width == 0 || height == 0 {
            return Err(BatError::validation(
                "resolution",
                "width and height must be > 0",
            ));
        }
        Ok(Self { width, height })
    }

    /// Number of pixels.
    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Object location and Euler XYZ rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pose {
    /// Location in host world units.
    pub location: Vec3,
    /// Euler XYZ rotation in radians.
    pub rotation: Vec3,
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
