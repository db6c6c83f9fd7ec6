//! `VVAR` — Vertical Metrics Variations Table
//!
//! Optional table in variable fonts providing vertical metrics variations.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/vvar>

use log::warn;

use crate::binary::read::{ReadBinary, ReadCtxt};
use crate::error::ParseError;
use crate::tables::variable_fonts::{
    read_item_variation_store, read_optional_index_map, DeltaSetIndexMap, ItemVariationStore,
};

/// `VVAR` — Vertical Metrics Variations Table.
#[derive(Debug)]
pub struct VvarTable {
    item_variation_store: ItemVariationStore,
    advance_height_mapping: Option<DeltaSetIndexMap>,
    tsb_mapping: Option<DeltaSetIndexMap>,
    bsb_mapping: Option<DeltaSetIndexMap>,
    vorg_mapping: Option<DeltaSetIndexMap>,
}

impl VvarTable {
    /// The item variation store holding the delta data.
    pub fn item_variation_store(&self) -> &ItemVariationStore {
        &self.item_variation_store
    }

    /// The delta applied to the advance height of `glyph_id`.
    ///
    /// `scalars` are the per-region scalars for the target instance, from
    /// [ItemVariationStore::calc_region_scalars].
    pub fn advance_delta(&self, scalars: &[f32], glyph_id: u16) -> f32 {
        self.item_variation_store.apply_deltas_for_gid(
            self.advance_height_mapping.as_ref(),
            glyph_id,
            scalars,
            self.item_variation_store.region_count(),
        )
    }

    /// The delta applied to the top side bearing of `glyph_id`, or `None` if
    /// the font provides no side-bearing variation data.
    pub fn top_side_bearing_delta(&self, scalars: &[f32], glyph_id: u16) -> Option<f32> {
        self.mapped_delta(self.tsb_mapping.as_ref(), scalars, glyph_id)
    }

    /// The delta applied to the bottom side bearing of `glyph_id`, or `None`
    /// if the font provides no bottom-side-bearing variation data.
    pub fn bottom_side_bearing_delta(&self, scalars: &[f32], glyph_id: u16) -> Option<f32> {
        self.mapped_delta(self.bsb_mapping.as_ref(), scalars, glyph_id)
    }

    /// The delta applied to the vertical origin of `glyph_id`, or `None` if
    /// the font provides no vertical-origin variation data.
    pub fn vert_origin_delta(&self, scalars: &[f32], glyph_id: u16) -> Option<f32> {
        self.mapped_delta(self.vorg_mapping.as_ref(), scalars, glyph_id)
    }

    fn mapped_delta(
        &self,
        mapping: Option<&DeltaSetIndexMap>,
        scalars: &[f32],
        glyph_id: u16,
    ) -> Option<f32> {
        mapping.map(|mapping| {
            self.item_variation_store.apply_deltas_for_gid(
                Some(mapping),
                glyph_id,
                scalars,
                self.item_variation_store.region_count(),
            )
        })
    }
}

impl ReadBinary for VvarTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u32be()?;
        ctxt.check_version(version == 0x0001_0000)?;
        let item_variation_store_offset = ctxt.read_u32be()?;
        let advance_height_mapping_offset = ctxt.read_u32be()?;
        let tsb_mapping_offset = ctxt.read_u32be()?;
        let bsb_mapping_offset = ctxt.read_u32be()?;
        let vorg_mapping_offset = ctxt.read_u32be()?;

        if item_variation_store_offset == 0 {
            warn!("item variation store offset in VVAR is null");
            return Err(ParseError::BadOffset);
        }
        let item_variation_store =
            read_item_variation_store(scope.clone(), item_variation_store_offset);
        let advance_height_mapping =
            read_optional_index_map(&scope, advance_height_mapping_offset)?;
        let tsb_mapping = read_optional_index_map(&scope, tsb_mapping_offset)?;
        let bsb_mapping = read_optional_index_map(&scope, bsb_mapping_offset)?;
        let vorg_mapping = read_optional_index_map(&scope, vorg_mapping_offset)?;

        Ok(VvarTable {
            item_variation_store,
            advance_height_mapping,
            tsb_mapping,
            bsb_mapping,
            vorg_mapping,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::binary::write::{WriteBinary, WriteBuffer};
    use crate::binary::{I16Be, U16Be, U32Be, U8};
    use crate::tables::variable_fonts::OwnedTuple;
    use crate::tables::F2Dot14;
    use crate::tests::assert_close;

    // VVAR with one region, two delta-set rows, and an advance height index
    // map that maps both glyphs to row 1.
    fn vvar_data() -> Vec<u8> {
        let mut buffer = WriteBuffer::new();
        U32Be::write(&mut buffer, 0x0001_0000u32).unwrap(); // version
        U32Be::write(&mut buffer, 24u32).unwrap(); // item variation store offset
        U32Be::write(&mut buffer, 58u32).unwrap(); // advance height mapping offset
        U32Be::write(&mut buffer, 0u32).unwrap(); // tsb mapping offset
        U32Be::write(&mut buffer, 0u32).unwrap(); // bsb mapping offset
        U32Be::write(&mut buffer, 0u32).unwrap(); // vorg mapping offset
        // item variation store (at 24)
        U16Be::write(&mut buffer, 1u16).unwrap(); // format
        U32Be::write(&mut buffer, 12u32).unwrap(); // region list offset
        U16Be::write(&mut buffer, 1u16).unwrap(); // subtable count
        U32Be::write(&mut buffer, 22u32).unwrap(); // subtable offset
        U16Be::write(&mut buffer, 1u16).unwrap(); // axis count
        U16Be::write(&mut buffer, 1u16).unwrap(); // region count
        for value in [0.0f32, 1., 1.] {
            F2Dot14::write(&mut buffer, F2Dot14::from(value)).unwrap();
        }
        U16Be::write(&mut buffer, 2u16).unwrap(); // item count
        U16Be::write(&mut buffer, 1u16).unwrap(); // short delta count
        U16Be::write(&mut buffer, 1u16).unwrap(); // region count
        U16Be::write(&mut buffer, 0u16).unwrap(); // region index
        I16Be::write(&mut buffer, -80i16).unwrap(); // row 0
        I16Be::write(&mut buffer, -20i16).unwrap(); // row 1
        // advance height index map (at 58): 1-byte entries, 4 inner bits
        U16Be::write(&mut buffer, 0x0003u16).unwrap(); // entry format
        U16Be::write(&mut buffer, 2u16).unwrap(); // map count
        U8::write(&mut buffer, 0x01u8).unwrap(); // (0, 1)
        U8::write(&mut buffer, 0x01u8).unwrap(); // (0, 1)
        buffer.into_inner()
    }

    #[test]
    fn advance_deltas_through_index_map() {
        let data = vvar_data();
        let vvar = ReadScope::new(&data).read::<VvarTable>().unwrap();
        let store = vvar.item_variation_store();

        let instance = OwnedTuple::from_slice(&[F2Dot14::ONE]);
        let scalars = store.calc_region_scalars(&instance);
        // both glyphs map to delta-set row 1
        assert_close(vvar.advance_delta(&scalars, 0), -20.);
        assert_close(vvar.advance_delta(&scalars, 1), -20.);
        // clamp to the last entry for out of range glyph ids
        assert_close(vvar.advance_delta(&scalars, 17), -20.);
        assert!(vvar.top_side_bearing_delta(&scalars, 0).is_none());
        assert!(vvar.vert_origin_delta(&scalars, 0).is_none());
    }
}
