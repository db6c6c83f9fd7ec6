#![deny(missing_docs)]

//! `avar` Axis Variations Table
//!
//! The axis variations table (`avar`) is an optional table used in variable
//! fonts. It allows modification of the coordinate normalization that is used
//! when processing variation data for a particular variation instance.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/avar>

use crate::binary::read::{ReadBinary, ReadCtxt};
use crate::error::ParseError;
use crate::tables::{F2Dot14, Fixed};

/// `avar` Axis Variations Table.
///
/// Holds one segment map per axis, in axis order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvarTable {
    axis_count: u16,
    segment_maps: Vec<SegmentMap>,
}

/// Piecewise-linear remapping of one axis's normalized coordinate.
///
/// A segment map must contain at least three mappings: one for -1, one for 0,
/// and one for 1, with the endpoints mapping to themselves. A map that does
/// not satisfy this parses as empty and leaves coordinates untouched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SegmentMap {
    value_maps: Vec<AxisValueMap>,
}

/// A mapping from a normalized coordinate value to a modified value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AxisValueMap {
    /// A normalized coordinate value obtained using default normalization.
    pub from_coord: Fixed,
    /// The modified, normalized coordinate value.
    pub to_coord: Fixed,
}

impl AvarTable {
    /// The number of axes covered by this table.
    ///
    /// Must match the axis count of the `fvar` table for the segment maps to
    /// be used.
    pub fn axis_count(&self) -> u16 {
        self.axis_count
    }

    /// The segment map for the axis at `index`.
    pub fn segment_map(&self, index: usize) -> Option<&SegmentMap> {
        self.segment_maps.get(index)
    }

    /// Iterate over the segment maps, in axis order.
    pub fn segment_maps(&self) -> impl Iterator<Item = &SegmentMap> {
        self.segment_maps.iter()
    }
}

impl SegmentMap {
    /// `true` if this map remaps nothing (coordinates pass through).
    pub fn is_empty(&self) -> bool {
        self.value_maps.is_empty()
    }

    /// Iterate over the axis value mappings.
    pub fn axis_value_mappings(&self) -> impl Iterator<Item = AxisValueMap> + '_ {
        self.value_maps.iter().copied()
    }

    /// Remap a value that has already been default normalized.
    ///
    /// `value` should be in the range [-1, +1]. An empty map returns the
    /// value unchanged.
    pub fn apply(&self, value: Fixed) -> Fixed {
        if self.value_maps.is_empty() {
            return value;
        }

        let index = self
            .value_maps
            .iter()
            .position(|map| value < map.from_coord)
            .unwrap_or(self.value_maps.len());

        if index == 0 {
            // value is at the minimum axis value
            return self.value_maps[0].to_coord;
        }
        if index >= self.value_maps.len() {
            // value is at the maximum axis value
            return self.value_maps[self.value_maps.len() - 1].to_coord;
        }

        let end = self.value_maps[index];
        if value == end.from_coord {
            return end.to_coord;
        }
        let start = self.value_maps[index - 1];

        start.to_coord
            + (end.to_coord - start.to_coord)
                * ((value - start.from_coord) / (end.from_coord - start.from_coord))
    }
}

impl ReadBinary for AvarTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let version = ctxt.read_u32be()?;
        ctxt.check_version(version == 0x0001_0000)?;
        let _reserved = ctxt.read_u16be()?;
        let axis_count = ctxt.read_u16be()?;

        let mut segment_maps = Vec::with_capacity(usize::from(axis_count));
        for _ in 0..axis_count {
            segment_maps.push(ctxt.read::<SegmentMap>()?);
        }

        Ok(AvarTable {
            axis_count,
            segment_maps,
        })
    }
}

impl ReadBinary for SegmentMap {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let position_map_count = ctxt.read_u16be()?;
        let mut value_maps = Vec::with_capacity(usize::from(position_map_count));
        let mut has_zero_map = false;
        for index in 0..position_map_count {
            let from_coord = Fixed::from(ctxt.read::<F2Dot14>()?);
            let to_coord = Fixed::from(ctxt.read::<F2Dot14>()?);
            if index > 0
                && index + 1 < position_map_count
                && from_coord == Fixed::ZERO
                && to_coord == Fixed::ZERO
            {
                has_zero_map = true;
            }
            value_maps.push(AxisValueMap {
                from_coord,
                to_coord,
            });
        }

        // Incomplete value maps invalidate the mapping entirely for this
        // axis: the -1, 0, and 1 mappings must all be present with the
        // endpoints mapping to themselves.
        let endpoints_valid = value_maps.first().map_or(false, |first| {
            first.from_coord == Fixed::MINUS_ONE && first.to_coord == Fixed::MINUS_ONE
        }) && value_maps.last().map_or(false, |last| {
            last.from_coord == Fixed::ONE && last.to_coord == Fixed::ONE
        });
        if position_map_count < 3 || !endpoints_valid || !has_zero_map {
            value_maps.clear();
        }

        Ok(SegmentMap { value_maps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::binary::write::{WriteBinary, WriteBuffer};
    use crate::binary::U16Be;
    use crate::tests::assert_fixed_close;

    pub(crate) fn write_segment_map(buffer: &mut WriteBuffer, mappings: &[(f32, f32)]) {
        U16Be::write(buffer, mappings.len() as u16).unwrap();
        for &(from_coord, to_coord) in mappings {
            F2Dot14::write(buffer, F2Dot14::from(from_coord)).unwrap();
            F2Dot14::write(buffer, F2Dot14::from(to_coord)).unwrap();
        }
    }

    fn segment_map(mappings: &[(f32, f32)]) -> SegmentMap {
        let mut buffer = WriteBuffer::new();
        write_segment_map(&mut buffer, mappings);
        let data = buffer.into_inner();
        ReadScope::new(&data).read::<SegmentMap>().unwrap()
    }

    #[test]
    fn apply_interpolates_between_mappings() {
        let map = segment_map(&[(-1., -1.), (0., 0.), (0.5, 0.25), (1., 1.)]);
        assert!(!map.is_empty());
        assert_fixed_close(map.apply(Fixed::from(0.25f32)), 0.125);
        assert_fixed_close(map.apply(Fixed::from(0.75f32)), 0.625);
        // on a knot
        assert_fixed_close(map.apply(Fixed::from(0.5f32)), 0.25);
        // at and beyond the endpoints
        assert_fixed_close(map.apply(Fixed::MINUS_ONE), -1.);
        assert_fixed_close(map.apply(Fixed::ONE), 1.);
    }

    #[test]
    fn apply_spec_example() {
        // https://learn.microsoft.com/en-us/typography/opentype/spec/otvaroverview#avar-normalization-example
        let map = segment_map(&[
            (-1., -1.),
            (-0.75, -0.5),
            (0., 0.),
            (0.4, 0.4),
            (0.6, 0.9),
            (1., 1.),
        ]);
        for (input, expected) in [
            (-1., -1.),
            (-0.75, -0.5),
            (-0.5, -0.3333),
            (-0.25, -0.1667),
            (0., 0.),
            (0.25, 0.25),
            (0.5, 0.65),
            (0.75, 0.9375),
            (1., 1.),
        ] {
            assert_fixed_close(map.apply(Fixed::from(input)), expected);
        }
    }

    #[test]
    fn apply_is_monotonic() {
        let map = segment_map(&[
            (-1., -1.),
            (-0.75, -0.5),
            (0., 0.),
            (0.4, 0.4),
            (0.6, 0.9),
            (1., 1.),
        ]);
        let mut previous = map.apply(Fixed::MINUS_ONE);
        for step in -63..=64 {
            let value = Fixed::from(step as f32 / 64.);
            let mapped = map.apply(value);
            assert!(mapped >= previous, "not monotonic at {:?}", value);
            previous = mapped;
        }
    }

    #[test]
    fn too_few_mappings_are_discarded() {
        let map = segment_map(&[(-1., -1.), (1., 1.)]);
        assert!(map.is_empty());
        assert_eq!(map.apply(Fixed::from(0.25f32)), Fixed::from(0.25f32));
    }

    #[test]
    fn missing_zero_mapping_is_discarded() {
        let map = segment_map(&[(-1., -1.), (0.5, 0.25), (1., 1.)]);
        assert!(map.is_empty());
    }

    #[test]
    fn bad_endpoints_are_discarded() {
        let map = segment_map(&[(-1., -0.5), (0., 0.), (1., 1.)]);
        assert!(map.is_empty());
        let map = segment_map(&[(-1., -1.), (0., 0.), (1., 0.5)]);
        assert!(map.is_empty());
    }

    #[test]
    fn parse_avar_table() {
        let mut buffer = WriteBuffer::new();
        crate::binary::U32Be::write(&mut buffer, 0x0001_0000u32).unwrap();
        U16Be::write(&mut buffer, 0u16).unwrap(); // reserved
        U16Be::write(&mut buffer, 2u16).unwrap(); // axis count
        write_segment_map(&mut buffer, &[(-1., -1.), (0., 0.), (0.5, 0.25), (1., 1.)]);
        write_segment_map(&mut buffer, &[(-1., -1.), (0., 0.), (1., 1.)]);

        let data = buffer.into_inner();
        let avar = ReadScope::new(&data).read::<AvarTable>().unwrap();
        assert_eq!(avar.axis_count(), 2);
        assert_eq!(avar.segment_maps().count(), 2);
        assert_eq!(avar.segment_map(0).unwrap().axis_value_mappings().count(), 4);
        assert!(avar.segment_map(2).is_none());
    }

    #[test]
    fn truncated_avar_fails() {
        let mut buffer = WriteBuffer::new();
        crate::binary::U32Be::write(&mut buffer, 0x0001_0000u32).unwrap();
        U16Be::write(&mut buffer, 0u16).unwrap();
        U16Be::write(&mut buffer, 2u16).unwrap(); // axis count of 2, one map present
        write_segment_map(&mut buffer, &[(-1., -1.), (0., 0.), (1., 1.)]);
        let data = buffer.into_inner();
        assert!(ReadScope::new(&data).read::<AvarTable>().is_err());
    }
}
