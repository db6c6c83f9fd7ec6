//! Shared table types and fixed-point numerics.

pub mod variable_fonts;

use std::borrow::Cow;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::binary::read::{ReadBinary, ReadCtxt, ReadFrom};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::{I16Be, I32Be, U16Be};
use crate::error::{ParseError, WriteError};
use crate::size;

/// 32-bit signed fixed-point number (16.16)
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Fixed(i32);

/// 16-bit signed fixed-point number (2.14)
///
/// Values are in the range [-2.0, 1.99993896484375]. Normalized variation
/// coordinates use the sub-range [-1.0, 1.0].
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct F2Dot14(i16);

/// Source of font table data, keyed by 4-byte table tag.
pub trait FontTableProvider {
    /// Return data for the specified table if present
    fn table_data(&self, tag: u32) -> Result<Option<Cow<'_, [u8]>>, ParseError>;

    fn has_table(&self, tag: u32) -> bool;

    fn read_table_data(&self, tag: u32) -> Result<Cow<'_, [u8]>, ParseError> {
        self.table_data(tag)?.ok_or(ParseError::MissingTable(tag))
    }
}

impl<T: FontTableProvider> FontTableProvider for Box<T> {
    fn table_data(&self, tag: u32) -> Result<Option<Cow<'_, [u8]>>, ParseError> {
        self.as_ref().table_data(tag)
    }

    fn has_table(&self, tag: u32) -> bool {
        self.as_ref().has_table(tag)
    }
}

/// `hhea` horizontal header table.
///
/// Also used to represent the `vhea` table, which shares its layout. For
/// `vhea` the fields hold the corresponding vertical measures and
/// `num_metrics` is `numOfLongVerMetrics`.
///
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/hhea>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HheaTable {
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub advance_max: u16,
    pub min_leading_bearing: i16,
    pub min_trailing_bearing: i16,
    pub max_extent: i16,
    pub caret_slope_rise: i16,
    pub caret_slope_run: i16,
    pub caret_offset: i16,
    pub num_metrics: u16,
}

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    /// 1.0 in 16.16 fixed-point.
    pub const ONE: Fixed = Fixed(0x0001_0000);
    pub const MINUS_ONE: Fixed = Fixed(-0x0001_0000);

    /// The number of bytes a Fixed value occupies on the wire.
    pub const SIZE: usize = size::I32;

    /// Wrap a raw 16.16 bit pattern.
    pub fn from_raw(value: i32) -> Fixed {
        Fixed(value)
    }

    /// The raw 16.16 bit pattern of this value.
    pub fn raw_value(self) -> i32 {
        self.0
    }

    /// Round to the nearest integer, ties rounding up.
    ///
    /// This is the rounding every encoded delta passes through. Do not change
    /// the bit pattern: serialized stores must be reproducible.
    pub fn round_to_i32(self) -> i32 {
        self.0.wrapping_add(0x8000) >> 16
    }

    pub fn abs(self) -> Fixed {
        Fixed(self.0.abs())
    }
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_sub(rhs.0))
    }
}

impl Neg for Fixed {
    type Output = Fixed;

    fn neg(self) -> Fixed {
        Fixed(self.0.wrapping_neg())
    }
}

impl Mul for Fixed {
    type Output = Fixed;

    /// Fixed-point multiply, rounded to the nearest 16.16 value.
    fn mul(self, rhs: Fixed) -> Fixed {
        let product = i64::from(self.0) * i64::from(rhs.0);
        Fixed(((product + 0x8000) >> 16) as i32)
    }
}

impl Div for Fixed {
    type Output = Fixed;

    /// Fixed-point divide, rounded to the nearest 16.16 value, ties away
    /// from zero.
    fn div(self, rhs: Fixed) -> Fixed {
        let numerator = i64::from(self.0) << 16;
        let denominator = i64::from(rhs.0);
        let magnitude = (numerator.abs() + denominator.abs() / 2) / denominator.abs();
        let quotient = if (numerator < 0) == (denominator < 0) {
            magnitude
        } else {
            -magnitude
        };
        Fixed(quotient as i32)
    }
}

impl From<i32> for Fixed {
    fn from(value: i32) -> Self {
        Fixed(value << 16)
    }
}

impl From<f32> for Fixed {
    fn from(value: f32) -> Self {
        Fixed((f64::from(value) * 65536.0).round() as i32)
    }
}

impl From<Fixed> for f32 {
    fn from(value: Fixed) -> f32 {
        (f64::from(value.0) / 65536.0) as f32
    }
}

impl From<F2Dot14> for Fixed {
    fn from(value: F2Dot14) -> Self {
        Fixed(i32::from(value.0) << 2)
    }
}

impl ReadFrom for Fixed {
    type ReadType = I32Be;

    fn read_from(value: i32) -> Self {
        Fixed(value)
    }
}

impl WriteBinary for Fixed {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, val: Self) -> Result<(), WriteError> {
        I32Be::write(ctxt, val.0)
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({})", f32::from(*self))
    }
}

impl F2Dot14 {
    pub const ZERO: F2Dot14 = F2Dot14(0);
    /// 1.0 in 2.14 fixed-point.
    pub const ONE: F2Dot14 = F2Dot14(0x4000);
    pub const MINUS_ONE: F2Dot14 = F2Dot14(-0x4000);

    /// The number of bytes an F2Dot14 value occupies on the wire.
    pub const SIZE: usize = size::I16;

    /// Wrap a raw 2.14 bit pattern.
    pub fn from_raw(value: i16) -> Self {
        F2Dot14(value)
    }

    /// The raw 2.14 bit pattern of this value.
    pub fn raw_value(self) -> i16 {
        self.0
    }

    pub fn abs(self) -> F2Dot14 {
        F2Dot14(self.0.abs())
    }
}

impl From<f32> for F2Dot14 {
    fn from(value: f32) -> Self {
        F2Dot14((f64::from(value) * 16384.0).round() as i16)
    }
}

impl From<F2Dot14> for f32 {
    fn from(value: F2Dot14) -> Self {
        f32::from(value.0) / 16384.
    }
}

impl From<Fixed> for F2Dot14 {
    /// Convert 16.16 to 2.14, rounding to the nearest representable value.
    fn from(value: Fixed) -> Self {
        F2Dot14((value.0.wrapping_add(2) >> 2) as i16)
    }
}

impl Neg for F2Dot14 {
    type Output = F2Dot14;

    fn neg(self) -> F2Dot14 {
        F2Dot14(-self.0)
    }
}

impl ReadFrom for F2Dot14 {
    type ReadType = I16Be;

    fn read_from(value: i16) -> Self {
        F2Dot14(value)
    }
}

impl WriteBinary for F2Dot14 {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, val: Self) -> Result<(), WriteError> {
        I16Be::write(ctxt, val.0)
    }
}

impl fmt::Debug for F2Dot14 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F2Dot14({})", f32::from(*self))
    }
}

impl ReadBinary for HheaTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let major_version = ctxt.read_u16be()?;
        // vhea uses minor version 0x1000 for version 1.1, so only the major
        // version is checked.
        ctxt.check_version(major_version == 1)?;
        let _minor_version = ctxt.read_u16be()?;
        let ascender = ctxt.read_i16be()?;
        let descender = ctxt.read_i16be()?;
        let line_gap = ctxt.read_i16be()?;
        let advance_max = ctxt.read_u16be()?;
        let min_leading_bearing = ctxt.read_i16be()?;
        let min_trailing_bearing = ctxt.read_i16be()?;
        let max_extent = ctxt.read_i16be()?;
        let caret_slope_rise = ctxt.read_i16be()?;
        let caret_slope_run = ctxt.read_i16be()?;
        let caret_offset = ctxt.read_i16be()?;
        let _reserved1 = ctxt.read_i16be()?;
        let _reserved2 = ctxt.read_i16be()?;
        let _reserved3 = ctxt.read_i16be()?;
        let _reserved4 = ctxt.read_i16be()?;
        let _metric_data_format = ctxt.read_i16be()?;
        let num_metrics = ctxt.read_u16be()?;

        Ok(HheaTable {
            ascender,
            descender,
            line_gap,
            advance_max,
            min_leading_bearing,
            min_trailing_bearing,
            max_extent,
            caret_slope_rise,
            caret_slope_run,
            caret_offset,
            num_metrics,
        })
    }
}

impl WriteBinary<&Self> for HheaTable {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &HheaTable) -> Result<(), WriteError> {
        U16Be::write(ctxt, 1u16)?; // major_version
        U16Be::write(ctxt, 0u16)?; // minor_version
        I16Be::write(ctxt, table.ascender)?;
        I16Be::write(ctxt, table.descender)?;
        I16Be::write(ctxt, table.line_gap)?;
        U16Be::write(ctxt, table.advance_max)?;
        I16Be::write(ctxt, table.min_leading_bearing)?;
        I16Be::write(ctxt, table.min_trailing_bearing)?;
        I16Be::write(ctxt, table.max_extent)?;
        I16Be::write(ctxt, table.caret_slope_rise)?;
        I16Be::write(ctxt, table.caret_slope_run)?;
        I16Be::write(ctxt, table.caret_offset)?;
        ctxt.write_zeros(4 * size::I16)?; // reserved
        I16Be::write(ctxt, 0i16)?; // metric_data_format
        U16Be::write(ctxt, table.num_metrics)?;

        Ok(())
    }
}
