//! Saturating fixed-point arithmetic for pitch and modulation math
//!
//! Pitch values travel through the engine as fixed-point semitones so that
//! glide and fine-tune modulation stay precise without floating point in the
//! per-block update path. The type is parameterized over fractional and
//! integral bit counts; when the two together use fewer than 32 bits, all
//! arithmetic saturates at the narrowed bounds instead of wrapping.

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Fixed-point number stored in an `i32`.
///
/// `FRAC` low bits hold the fraction, the next `INT` bits the integer part
/// (sign included). Intermediate math is widened to `i64` and clamped back,
/// so a 24-bit type like [`S816`] behaves like a saturating 24-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FixedPoint<const FRAC: u32, const INT: u32> {
    raw: i32,
}

/// Pitch type: 8 integral bits, 16 fractional bits, saturating at 24 bits.
///
/// One unit is one semitone; the fractional part resolves 1/65536th of a
/// semitone, far below audibility.
pub type S816 = FixedPoint<16, 8>;

/// 16.16 fixed point using the full 32-bit width (no narrowing).
pub type S1616 = FixedPoint<16, 16>;

impl<const FRAC: u32, const INT: u32> FixedPoint<FRAC, INT> {
    const TOTAL: u32 = FRAC + INT;
    const FRAC_MASK: i32 = (1 << FRAC) - 1;

    /// Smallest representable raw value.
    pub const MIN_RAW: i32 = if Self::TOTAL >= 32 {
        i32::MIN
    } else {
        i32::MIN >> (32 - Self::TOTAL)
    };
    /// Largest representable raw value.
    pub const MAX_RAW: i32 = if Self::TOTAL >= 32 {
        i32::MAX
    } else {
        i32::MAX >> (32 - Self::TOTAL)
    };

    #[inline]
    const fn saturate(wide: i64) -> i32 {
        if wide > Self::MAX_RAW as i64 {
            Self::MAX_RAW
        } else if wide < Self::MIN_RAW as i64 {
            Self::MIN_RAW
        } else {
            wide as i32
        }
    }

    /// Create from a raw bit pattern, clamped to the type's bounds.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self {
            raw: Self::saturate(raw as i64),
        }
    }

    /// Create from an integer value.
    #[inline]
    pub const fn from_int(value: i32) -> Self {
        Self {
            raw: Self::saturate((value as i64) << FRAC),
        }
    }

    /// Create from a float, saturating at the type's bounds.
    #[inline]
    pub fn from_float(value: f32) -> Self {
        let wide = (value * (1i64 << FRAC) as f32) as i64;
        Self {
            raw: Self::saturate(wide),
        }
    }

    /// Raw bit pattern.
    #[inline]
    pub const fn raw(self) -> i32 {
        self.raw
    }

    /// Integer part (arithmetic shift, rounds toward negative infinity).
    #[inline]
    pub const fn integral(self) -> i32 {
        self.raw >> FRAC
    }

    /// Fractional bits, `0..(1 << FRAC)`.
    #[inline]
    pub const fn fractional(self) -> i32 {
        self.raw & Self::FRAC_MASK
    }

    /// Convert to float.
    #[inline]
    pub fn to_float(self) -> f32 {
        self.raw as f32 / (1i64 << FRAC) as f32
    }

    /// Multiply by a raw fixed-point factor with the same fractional width.
    ///
    /// Used for glide: increment = delta.scale(rate_factor).
    #[inline]
    pub const fn scale(self, factor: i32) -> Self {
        Self {
            raw: Self::saturate((self.raw as i64 * factor as i64) >> FRAC),
        }
    }

    /// Add whole units to the integer part.
    #[inline]
    pub fn add_integral(&mut self, value: i32) {
        self.raw = Self::saturate(self.raw as i64 + ((value as i64) << FRAC));
    }

    /// Add a raw amount in fractional units (`1 / (1 << FRAC)` each).
    #[inline]
    pub fn add_fractional(&mut self, raw: i32) {
        self.raw = Self::saturate(self.raw as i64 + raw as i64);
    }

    /// True when the value is exactly zero.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.raw == 0
    }
}

impl<const FRAC: u32, const INT: u32> Add for FixedPoint<FRAC, INT> {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            raw: Self::saturate(self.raw as i64 + other.raw as i64),
        }
    }
}

impl<const FRAC: u32, const INT: u32> AddAssign for FixedPoint<FRAC, INT> {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl<const FRAC: u32, const INT: u32> Sub for FixedPoint<FRAC, INT> {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            raw: Self::saturate(self.raw as i64 - other.raw as i64),
        }
    }
}

impl<const FRAC: u32, const INT: u32> SubAssign for FixedPoint<FRAC, INT> {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl<const FRAC: u32, const INT: u32> Neg for FixedPoint<FRAC, INT> {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            raw: Self::saturate(-(self.raw as i64)),
        }
    }
}
