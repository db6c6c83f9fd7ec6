//! `HVAR` — Horizontal Metrics Variations Table
//!
//! Optional table in variable fonts providing horizontal metrics variations.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/hvar>

use log::warn;

use crate::binary::read::{ReadBinary, ReadCtxt};
use crate::error::ParseError;
use crate::tables::variable_fonts::{
    read_item_variation_store, read_optional_index_map, DeltaSetIndexMap, ItemVariationStore,
};

/// `HVAR` — Horizontal Metrics Variations Table.
#[derive(Debug)]
pub struct HvarTable {
    item_variation_store: ItemVariationStore,
    advance_width_mapping: Option<DeltaSetIndexMap>,
    lsb_mapping: Option<DeltaSetIndexMap>,
    rsb_mapping: Option<DeltaSetIndexMap>,
}

impl HvarTable {
    /// The item variation store holding the delta data.
    pub fn item_variation_store(&self) -> &ItemVariationStore {
        &self.item_variation_store
    }

    /// The delta applied to the advance width of `glyph_id`.
    ///
    /// `scalars` are the per-region scalars for the target instance, from
    /// [ItemVariationStore::calc_region_scalars].
    pub fn advance_delta(&self, scalars: &[f32], glyph_id: u16) -> f32 {
        self.item_variation_store.apply_deltas_for_gid(
            self.advance_width_mapping.as_ref(),
            glyph_id,
            scalars,
            self.item_variation_store.region_count(),
        )
    }

    /// The delta applied to the left side bearing of `glyph_id`, or `None`
    /// if the font provides no side-bearing variation data.
    pub fn left_side_bearing_delta(&self, scalars: &[f32], glyph_id: u16) -> Option<f32> {
        self.lsb_mapping.as_ref().map(|mapping| {
            self.item_variation_store.apply_deltas_for_gid(
                Some(mapping),
                glyph_id,
                scalars,
                self.item_variation_store.region_count(),
            )
        })
    }

    /// The delta applied to the right side bearing of `glyph_id`, or `None`
    /// if the font provides no right-side-bearing variation data.
    pub fn right_side_bearing_delta(&self, scalars: &[f32], glyph_id: u16) -> Option<f32> {
        self.rsb_mapping.as_ref().map(|mapping| {
            self.item_variation_store.apply_deltas_for_gid(
                Some(mapping),
                glyph_id,
                scalars,
                self.item_variation_store.region_count(),
            )
        })
    }
}

impl ReadBinary for HvarTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u32be()?;
        ctxt.check_version(version == 0x0001_0000)?;
        let item_variation_store_offset = ctxt.read_u32be()?;
        let advance_width_mapping_offset = ctxt.read_u32be()?;
        let lsb_mapping_offset = ctxt.read_u32be()?;
        let rsb_mapping_offset = ctxt.read_u32be()?;

        if item_variation_store_offset == 0 {
            warn!("item variation store offset in HVAR is null");
            return Err(ParseError::BadOffset);
        }
        let item_variation_store =
            read_item_variation_store(scope.clone(), item_variation_store_offset);
        let advance_width_mapping = read_optional_index_map(&scope, advance_width_mapping_offset)?;
        let lsb_mapping = read_optional_index_map(&scope, lsb_mapping_offset)?;
        let rsb_mapping = read_optional_index_map(&scope, rsb_mapping_offset)?;

        Ok(HvarTable {
            item_variation_store,
            advance_width_mapping,
            lsb_mapping,
            rsb_mapping,
        })
    }
}
