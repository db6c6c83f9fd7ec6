#![deny(missing_docs)]

//! `fvar` Font Variations Table
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/fvar>

use bitflags::bitflags;
use log::warn;
use tinyvec::TinyVec;

use crate::binary::read::{ReadBinary, ReadBinaryDep, ReadCtxt, ReadFrom};
use crate::binary::{U16Be, U32Be};
use crate::error::ParseError;
use crate::tables::variable_fonts::avar::AvarTable;
use crate::tables::variable_fonts::OwnedTuple;
use crate::tables::{F2Dot14, Fixed};

/// Minimum value of the offset to the axes array.
const OFFSET_TO_AXES_ARRAY: u16 = 16;
/// Minimum number of count/size pairs in the header.
const COUNT_SIZE_PAIRS: u16 = 2;
/// Minimum size of a variation axis record.
const AXIS_SIZE: u16 = 20;
/// Size of an instance record before its coordinates array.
const INSTANCE_SIZE: usize = 4;
/// Size of an instance record before its coordinates array when it carries a
/// PostScript name ID.
const INSTANCE_WITH_NAME_SIZE: usize = 6;

bitflags! {
    /// Axis qualifiers.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct AxisFlags: u16 {
        /// The axis should not be exposed directly in user interfaces.
        const HIDDEN_AXIS = 0x0001;
    }
}

/// `fvar` Font Variations Table.
///
/// Holds the variation axes of the font and its named instances.
#[derive(Debug, Clone, PartialEq)]
pub struct FvarTable {
    axes: Vec<VariationAxisRecord>,
    instances: Vec<VariationInstance>,
}

/// Variation axis record.
///
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/fvar#variationaxisrecord>
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VariationAxisRecord {
    /// Tag identifying the design variation for the axis.
    pub axis_tag: u32,
    /// The minimum coordinate value for the axis.
    pub min_value: Fixed,
    /// The default coordinate value for the axis.
    pub default_value: Fixed,
    /// The maximum coordinate value for the axis.
    pub max_value: Fixed,
    /// Axis qualifiers.
    pub flags: AxisFlags,
    /// The name ID for entries in the `name` table that provide a display
    /// name for this axis.
    pub axis_name_id: u16,
}

/// A named instance: preset user coordinates for every axis.
///
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/fvar#instancerecord>
#[derive(Debug, Clone, PartialEq)]
pub struct VariationInstance {
    /// The name ID for entries in the `name` table that provide subfamily
    /// names for this instance.
    pub subfamily_name_id: u16,
    /// Reserved instance flags.
    pub flags: u16,
    /// The user coordinates of this instance, one per axis.
    pub coordinates: Vec<f32>,
    /// The name ID for entries in the `name` table that provide PostScript
    /// names for this instance. Zero when unspecified.
    pub post_script_name_id: u16,
}

impl FvarTable {
    /// The variation axes of the font.
    pub fn axes(&self) -> &[VariationAxisRecord] {
        &self.axes
    }

    /// The number of variation axes in the font.
    pub fn axis_count(&self) -> u16 {
        // NOTE(cast): valid as the axes are constructed from a u16 length
        self.axes.len() as u16
    }

    /// The axis at the given index.
    pub fn axis(&self, index: u16) -> Option<&VariationAxisRecord> {
        self.axes.get(usize::from(index))
    }

    /// The index of the axis with the given tag.
    pub fn axis_index(&self, axis_tag: u32) -> Option<u16> {
        self.axes
            .iter()
            .position(|axis| axis.axis_tag == axis_tag)
            .map(|index| index as u16)
    }

    /// The named instances defined in the font.
    pub fn instances(&self) -> &[VariationInstance] {
        &self.instances
    }

    /// Find the named instance whose coordinates exactly equal `user_coords`.
    pub fn find_instance(&self, user_coords: &[f32]) -> Option<&VariationInstance> {
        if user_coords.len() != usize::from(self.axis_count()) {
            return None;
        }
        self.instances
            .iter()
            .find(|instance| instance.coordinates == user_coords)
    }

    /// Turn a user tuple into a tuple normalized over the range -1..1.
    ///
    /// Applies the default piecewise-linear normalization through each axis's
    /// minimum, default, and maximum, then remaps through the `avar` segment
    /// maps when present. An `avar` table whose axis count disagrees with
    /// this table is ignored with a diagnostic.
    pub fn normalize(
        &self,
        user_tuple: impl ExactSizeIterator<Item = Fixed>,
        mut avar: Option<&AvarTable>,
    ) -> Result<OwnedTuple, ParseError> {
        if self.axes.is_empty() {
            return Err(ParseError::MissingValue);
        }
        if user_tuple.len() != usize::from(self.axis_count()) {
            return Err(ParseError::BadValue);
        }

        if let Some(table) = avar {
            if table.axis_count() != self.axis_count() {
                warn!("mismatching axis counts in fvar and avar");
                avar = None;
            }
        }

        let mut tuple = TinyVec::with_capacity(user_tuple.len());
        for (index, (axis, user_value)) in self.axes.iter().zip(user_tuple).enumerate() {
            let mut normalized = default_normalize(axis, user_value);

            if let Some(segment_map) = avar.and_then(|avar| avar.segment_map(index)) {
                normalized = segment_map.apply(normalized);
            }

            // Clamp to ensure the value remains in range after remapping
            normalized = normalized.clamp(Fixed::MINUS_ONE, Fixed::ONE);
            tuple.push(F2Dot14::from(normalized));
        }
        Ok(OwnedTuple::from_inner(tuple))
    }
}

/// Normalize a user coordinate through `(min, -1)`, `(default, 0)`,
/// `(max, +1)`, clamping to the axis range.
fn default_normalize(axis: &VariationAxisRecord, user_value: Fixed) -> Fixed {
    if user_value < axis.default_value {
        if user_value < axis.min_value {
            return Fixed::MINUS_ONE;
        }
        -(axis.default_value - user_value) / (axis.default_value - axis.min_value)
    } else if user_value > axis.default_value {
        if user_value > axis.max_value {
            return Fixed::ONE;
        }
        (user_value - axis.default_value) / (axis.max_value - axis.default_value)
    } else {
        Fixed::ZERO
    }
}

impl ReadBinary for FvarTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let table_length = scope.data().len();
        let version = ctxt.read_u32be()?;
        ctxt.check_version(version == 0x0001_0000)?;
        let axes_array_offset = ctxt.read_u16be()?;
        let count_size_pairs = ctxt.read_u16be()?;
        let axis_count = ctxt.read_u16be()?;
        let axis_size = ctxt.read_u16be()?;
        let instance_count = ctxt.read_u16be()?;
        let instance_size = ctxt.read_u16be()?;

        ctxt.check(
            axes_array_offset >= OFFSET_TO_AXES_ARRAY
                && count_size_pairs >= COUNT_SIZE_PAIRS
                && axis_size >= AXIS_SIZE,
        )?;

        let axes_length = usize::from(axis_size) * usize::from(axis_count);
        let instances_length = usize::from(instance_size) * usize::from(instance_count);
        ctxt.check(
            usize::from(axes_array_offset) + axes_length + instances_length <= table_length,
        )?;
        ctxt.check(
            usize::from(instance_size) >= INSTANCE_SIZE + Fixed::SIZE * usize::from(axis_count),
        )?;

        let mut data_ctxt = scope.offset(usize::from(axes_array_offset)).ctxt();
        let axes = data_ctxt
            .read_array_stride::<VariationAxisRecord>(
                usize::from(axis_count),
                usize::from(axis_size),
            )?
            .to_vec();
        for axis in &axes {
            ctxt.check(axis.min_value <= axis.default_value && axis.default_value <= axis.max_value)?;
        }

        let mut instances = Vec::with_capacity(usize::from(instance_count));
        for _ in 0..instance_count {
            let record_scope = data_ctxt.read_scope(usize::from(instance_size))?;
            let instance = record_scope
                .read_dep::<VariationInstance>((usize::from(instance_size), usize::from(axis_count)))?;
            instances.push(instance);
        }

        Ok(FvarTable { axes, instances })
    }
}

impl ReadFrom for VariationAxisRecord {
    type ReadType = ((U32Be, Fixed, Fixed), (Fixed, U16Be, U16Be));

    fn read_from(
        ((axis_tag, min_value, default_value), (max_value, flags, axis_name_id)): (
            (u32, Fixed, Fixed),
            (Fixed, u16, u16),
        ),
    ) -> Self {
        VariationAxisRecord {
            axis_tag,
            min_value,
            default_value,
            max_value,
            flags: AxisFlags::from_bits_retain(flags),
            axis_name_id,
        }
    }
}

impl ReadBinaryDep for VariationInstance {
    type Args<'a> = (usize, usize); // (instance_size, axis_count)
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (instance_size, axis_count): (usize, usize),
    ) -> Result<Self, ParseError> {
        let subfamily_name_id = ctxt.read_u16be()?;
        let flags = ctxt.read_u16be()?;
        let mut coordinates = Vec::with_capacity(axis_count);
        for _ in 0..axis_count {
            coordinates.push(f32::from(ctxt.read::<Fixed>()?));
        }
        // The PostScript name ID is optional; zero indicates it is unspecified
        let post_script_name_id = if instance_size >= INSTANCE_WITH_NAME_SIZE + Fixed::SIZE * axis_count
        {
            ctxt.read_u16be()?
        } else {
            0
        };

        Ok(VariationInstance {
            subfamily_name_id,
            flags,
            coordinates,
            post_script_name_id,
        })
    }
}
