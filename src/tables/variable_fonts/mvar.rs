//! `MVAR` Metrics Variations Table
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/mvar>

use log::warn;

use crate::binary::read::{ReadBinary, ReadCtxt, ReadFrom};
use crate::binary::{U16Be, U32Be};
use crate::error::ParseError;
use crate::tables::variable_fonts::{
    read_item_variation_store, DeltaSetIndexMapEntry, ItemVariationStore, OwnedTuple,
};

/// Size of an MVAR value record.
const VALUE_RECORD_SIZE: usize = 8;

/// `MVAR` Metrics Variations Table.
///
/// Maps four-byte value tags (`hasc`, `xhgt`, …) to delta-set index pairs in
/// its item variation store.
#[derive(Debug)]
pub struct MvarTable {
    axis_count: u16,
    /// `None` when the table declares no item variation store.
    item_variation_store: Option<ItemVariationStore>,
    /// Must be sorted by `value_tag` ascending.
    value_records: Vec<ValueRecord>,
}

/// Identifies a target item by tag and its associated delta-set index pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    /// Four-byte tag identifying a font-wide measure.
    pub value_tag: u32,
    /// The delta-set index pair for the item.
    pub pair: DeltaSetIndexMapEntry,
}

impl MvarTable {
    /// The number of axes declared by the table.
    pub fn axis_count(&self) -> u16 {
        self.axis_count
    }

    /// The value records, in tag order.
    pub fn value_records(&self) -> &[ValueRecord] {
        &self.value_records
    }

    /// The delta for the supplied
    /// [value tag](https://learn.microsoft.com/en-us/typography/opentype/spec/mvar#value-tags)
    /// at the given normalized instance.
    ///
    /// Returns `None` when the tag is not present, leaving the caller's
    /// default value in force.
    pub fn lookup(&self, tag: u32, instance: &OwnedTuple) -> Option<f32> {
        let store = self.item_variation_store.as_ref()?;
        let index = self
            .value_records
            .binary_search_by(|record| record.value_tag.cmp(&tag))
            .ok()?;
        let record = self.value_records[index];

        let scalars = store.calc_region_scalars(instance);
        Some(store.apply_deltas_for_index_pair(record.pair, &scalars, store.region_count()))
    }
}

impl ReadBinary for MvarTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u32be()?;
        ctxt.check_version(version == 0x0001_0000)?;
        let axis_count = ctxt.read_u16be()?;
        let value_record_size = ctxt.read_u16be()?;
        let value_record_count = ctxt.read_u16be()?;
        let item_variation_store_offset = u32::from(ctxt.read_u16be()?);

        if item_variation_store_offset == 0 {
            // No variation data; lookups find nothing.
            warn!("item variation store offset in MVAR is null");
            return Ok(MvarTable {
                axis_count,
                item_variation_store: None,
                value_records: Vec::new(),
            });
        }

        let value_records = if value_record_count > 0 {
            // A zero record size is accepted when there are no records.
            ctxt.check(usize::from(value_record_size) >= VALUE_RECORD_SIZE)?;
            ctxt.read_array_stride::<ValueRecord>(
                usize::from(value_record_count),
                usize::from(value_record_size),
            )?
            .to_vec()
        } else {
            Vec::new()
        };

        let item_variation_store =
            read_item_variation_store(scope, item_variation_store_offset);

        Ok(MvarTable {
            axis_count,
            item_variation_store: Some(item_variation_store),
            value_records,
        })
    }
}

impl ReadFrom for ValueRecord {
    type ReadType = (U32Be, U16Be, U16Be);

    fn read_from((value_tag, outer_index, inner_index): (u32, u16, u16)) -> Self {
        ValueRecord {
            value_tag,
            pair: DeltaSetIndexMapEntry {
                outer_index,
                inner_index,
            },
        }
    }
}
