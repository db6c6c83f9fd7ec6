#![deny(missing_docs)]

//! Variable glyph metrics.
//!
//! Combines the default metrics from `hmtx`/`vmtx` (and vertical origins
//! from `VORG`) with the variation data in `HVAR`/`VVAR` to produce metrics
//! adjusted for a variation instance. Fonts without the variation tables
//! yield their default metrics unchanged.

use log::warn;

use crate::binary::read::{ReadBinaryDep, ReadCtxt, ReadScope};
use crate::error::ParseError;
use crate::tables::variable_fonts::hvar::HvarTable;
use crate::tables::variable_fonts::vvar::VvarTable;
use crate::tables::variable_fonts::OwnedTuple;
use crate::tables::{FontTableProvider, HheaTable};
use crate::tag;

const VORG_TABLE_VERSION: u32 = 0x0001_0000;

/// Default advance and side bearing of one glyph.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct LongMetric {
    /// Advance width (or height) in font units.
    pub advance: u16,
    /// Leading side bearing in font units.
    pub side_bearing: i16,
}

/// Glyph metrics adjusted for a variation instance.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlyphMetrics {
    /// Advance width (or height).
    pub advance: f32,
    /// Leading side bearing.
    pub side_bearing: f32,
}

/// Per-glyph long metrics parsed from an `hmtx` or `vmtx` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongMetrics(Vec<LongMetric>);

/// Horizontal glyph metrics with optional `HVAR` variation data.
#[derive(Debug)]
pub struct VariableHmtx {
    header: HheaTable,
    metrics: LongMetrics,
    hvar: Option<HvarTable>,
}

/// Vertical glyph metrics with optional `VORG` origins and `VVAR` variation
/// data.
#[derive(Debug)]
pub struct VariableVmtx {
    header: HheaTable,
    metrics: LongMetrics,
    vert_origin_y: Vec<i16>,
    vvar: Option<VvarTable>,
}

impl LongMetrics {
    /// The number of glyphs covered.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if no metrics are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The default metrics of `glyph_id`.
    pub fn get(&self, glyph_id: u16) -> Option<LongMetric> {
        self.0.get(usize::from(glyph_id)).copied()
    }
}

impl ReadBinaryDep for LongMetrics {
    type Args<'a> = u16; // the number of long metric records
    type HostType<'a> = Self;

    /// Read long metric records followed by bare side bearings.
    ///
    /// The number of glyphs is estimated from the table size. Glyphs past
    /// the long records reuse the advance of the last long record.
    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, num_metrics: u16) -> Result<Self, ParseError> {
        let table_length = ctxt.scope().data().len();
        let num_glyphs = (table_length / 2).saturating_sub(usize::from(num_metrics));
        if num_glyphs < usize::from(num_metrics) || num_glyphs > usize::from(u16::MAX) {
            return Err(ParseError::BadValue);
        }

        let mut metrics = Vec::with_capacity(num_glyphs);
        let mut metric = LongMetric::default();
        for _ in 0..num_metrics {
            metric.advance = ctxt.read_u16be()?;
            metric.side_bearing = ctxt.read_i16be()?;
            metrics.push(metric);
        }
        // metric still holds the advance of the last long record
        for _ in usize::from(num_metrics)..num_glyphs {
            metric.side_bearing = ctxt.read_i16be()?;
            metrics.push(metric);
        }

        Ok(LongMetrics(metrics))
    }
}

impl VariableHmtx {
    /// Read the `hhea`, `hmtx`, and optional `HVAR` tables from `provider`.
    pub fn new(provider: &impl FontTableProvider) -> Result<VariableHmtx, ParseError> {
        let hhea_data = provider.read_table_data(tag::HHEA)?;
        let header = ReadScope::new(&hhea_data).read::<HheaTable>()?;
        if header.num_metrics == 0 {
            warn!("invalid number of metrics in hhea table");
            return Err(ParseError::BadValue);
        }

        let hmtx_data = provider.read_table_data(tag::HMTX)?;
        let metrics = ReadScope::new(&hmtx_data).read_dep::<LongMetrics>(header.num_metrics)?;

        let hvar = match provider.table_data(tag::HVAR)? {
            Some(data) => match ReadScope::new(&data).read::<HvarTable>() {
                Ok(table) => Some(table),
                Err(err) => {
                    warn!("discarding malformed HVAR table: {}", err);
                    None
                }
            },
            None => None,
        };

        Ok(VariableHmtx {
            header,
            metrics,
            hvar,
        })
    }

    /// The `hhea` header.
    pub fn header(&self) -> &HheaTable {
        &self.header
    }

    /// The default (unvaried) metrics.
    pub fn default_metrics(&self) -> &LongMetrics {
        &self.metrics
    }

    /// The `HVAR` table, when the font has one.
    pub fn hvar(&self) -> Option<&HvarTable> {
        self.hvar.as_ref()
    }

    /// Look up the metrics of `glyph_id`, adjusted for `instance` when the
    /// font carries variation data.
    pub fn lookup(
        &self,
        glyph_id: u16,
        instance: Option<&OwnedTuple>,
    ) -> Result<GlyphMetrics, ParseError> {
        let default = self.metrics.get(glyph_id).ok_or_else(|| {
            warn!("invalid glyph id in hmtx lookup");
            ParseError::BadIndex
        })?;
        let mut metrics = GlyphMetrics {
            advance: f32::from(default.advance),
            side_bearing: f32::from(default.side_bearing),
        };

        if let (Some(instance), Some(hvar)) = (instance, &self.hvar) {
            if !instance.is_empty() {
                let store = hvar.item_variation_store();
                let scalars = store.calc_region_scalars(instance);
                metrics.advance += hvar.advance_delta(&scalars, glyph_id);
                if let Some(delta) = hvar.left_side_bearing_delta(&scalars, glyph_id) {
                    metrics.side_bearing += delta;
                }
            }
        }

        Ok(metrics)
    }
}

impl VariableVmtx {
    /// Read the `vhea`, `vmtx`, and optional `VORG` and `VVAR` tables from
    /// `provider`.
    pub fn new(provider: &impl FontTableProvider) -> Result<VariableVmtx, ParseError> {
        let vhea_data = provider.read_table_data(tag::VHEA)?;
        let header = ReadScope::new(&vhea_data).read::<HheaTable>()?;
        if header.num_metrics == 0 {
            warn!("invalid number of metrics in vhea table");
            return Err(ParseError::BadValue);
        }

        let vmtx_data = provider.read_table_data(tag::VMTX)?;
        let metrics = ReadScope::new(&vmtx_data).read_dep::<LongMetrics>(header.num_metrics)?;

        let vert_origin_y = match provider.table_data(tag::VORG)? {
            Some(data) => match read_vorg(ReadScope::new(&data), metrics.len()) {
                Ok(origins) => origins,
                Err(err) => {
                    warn!("discarding malformed VORG table: {}", err);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let vvar = match provider.table_data(tag::VVAR)? {
            Some(data) => match ReadScope::new(&data).read::<VvarTable>() {
                Ok(table) => Some(table),
                Err(err) => {
                    warn!("discarding malformed VVAR table: {}", err);
                    None
                }
            },
            None => None,
        };

        Ok(VariableVmtx {
            header,
            metrics,
            vert_origin_y,
            vvar,
        })
    }

    /// The `vhea` header.
    pub fn header(&self) -> &HheaTable {
        &self.header
    }

    /// The default (unvaried) metrics.
    pub fn default_metrics(&self) -> &LongMetrics {
        &self.metrics
    }

    /// The `VVAR` table, when the font has one.
    pub fn vvar(&self) -> Option<&VvarTable> {
        self.vvar.as_ref()
    }

    /// Look up the metrics of `glyph_id`, adjusted for `instance` when the
    /// font carries variation data.
    pub fn lookup(
        &self,
        glyph_id: u16,
        instance: Option<&OwnedTuple>,
    ) -> Result<GlyphMetrics, ParseError> {
        let default = self.metrics.get(glyph_id).ok_or_else(|| {
            warn!("invalid glyph id in vmtx lookup");
            ParseError::BadIndex
        })?;
        let mut metrics = GlyphMetrics {
            advance: f32::from(default.advance),
            side_bearing: f32::from(default.side_bearing),
        };

        if let (Some(instance), Some(vvar)) = (instance, &self.vvar) {
            if !instance.is_empty() {
                let store = vvar.item_variation_store();
                let scalars = store.calc_region_scalars(instance);
                metrics.advance += vvar.advance_delta(&scalars, glyph_id);
                if let Some(delta) = vvar.top_side_bearing_delta(&scalars, glyph_id) {
                    metrics.side_bearing += delta;
                }
            }
        }

        Ok(metrics)
    }

    /// The vertical origin of `glyph_id`, adjusted for `instance`.
    ///
    /// `None` when the font has no `VORG` table.
    pub fn vertical_origin(&self, glyph_id: u16, instance: Option<&OwnedTuple>) -> Option<f32> {
        let default = self.vert_origin_y.get(usize::from(glyph_id)).copied()?;
        let mut origin = f32::from(default);

        if let (Some(instance), Some(vvar)) = (instance, &self.vvar) {
            if !instance.is_empty() {
                let store = vvar.item_variation_store();
                let scalars = store.calc_region_scalars(instance);
                if let Some(delta) = vvar.vert_origin_delta(&scalars, glyph_id) {
                    origin += delta;
                }
            }
        }

        Some(origin)
    }
}

/// Read a `VORG` table into per-glyph vertical origins.
fn read_vorg(scope: ReadScope<'_>, num_glyphs: usize) -> Result<Vec<i16>, ParseError> {
    let mut ctxt = scope.ctxt();
    let version = ctxt.read_u32be()?;
    ctxt.check_version(version == VORG_TABLE_VERSION)?;
    let default_vert_origin_y = ctxt.read_i16be()?;
    let num_vert_origin_y_metrics = ctxt.read_u16be()?;

    let mut origins = vec![default_vert_origin_y; num_glyphs];
    for _ in 0..num_vert_origin_y_metrics {
        let glyph_index = ctxt.read_u16be()?;
        let vert_origin_y = ctxt.read_i16be()?;
        if usize::from(glyph_index) >= num_glyphs {
            warn!("invalid glyph index in VORG table");
            return Err(ParseError::BadIndex);
        }
        origins[usize::from(glyph_index)] = vert_origin_y;
    }

    Ok(origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::{WriteBinary, WriteBuffer};
    use crate::binary::{I16Be, U16Be, U32Be};
    use crate::tables::F2Dot14;
    use crate::tests::assert_close;
    use std::borrow::Cow;
    use std::collections::HashMap;

    struct TestProvider(HashMap<u32, Vec<u8>>);

    impl FontTableProvider for TestProvider {
        fn table_data(&self, tag: u32) -> Result<Option<Cow<'_, [u8]>>, ParseError> {
            Ok(self.0.get(&tag).map(|data| Cow::from(data.as_slice())))
        }

        fn has_table(&self, tag: u32) -> bool {
            self.0.contains_key(&tag)
        }
    }

    fn hea_table(num_metrics: u16) -> Vec<u8> {
        let table = HheaTable {
            ascender: 800,
            descender: -200,
            line_gap: 90,
            advance_max: 1000,
            min_leading_bearing: -50,
            min_trailing_bearing: -60,
            max_extent: 990,
            caret_slope_rise: 1,
            caret_slope_run: 0,
            caret_offset: 0,
            num_metrics,
        };
        let mut buffer = WriteBuffer::new();
        HheaTable::write(&mut buffer, &table).unwrap();
        buffer.into_inner()
    }

    // Two long records and one bare side bearing
    fn mtx_table() -> Vec<u8> {
        let mut buffer = WriteBuffer::new();
        for (advance, side_bearing) in [(500u16, 10i16), (600, 20)] {
            U16Be::write(&mut buffer, advance).unwrap();
            I16Be::write(&mut buffer, side_bearing).unwrap();
        }
        I16Be::write(&mut buffer, 30i16).unwrap();
        buffer.into_inner()
    }

    // HVAR/VVAR with one region (0, 1, 1) and three delta-set rows addressed
    // directly by glyph id
    fn var_table(vertical: bool) -> Vec<u8> {
        let mut buffer = WriteBuffer::new();
        U32Be::write(&mut buffer, 0x0001_0000u32).unwrap(); // version
        let header_size: u32 = if vertical { 24 } else { 20 };
        U32Be::write(&mut buffer, header_size).unwrap(); // item variation store offset
        U32Be::write(&mut buffer, 0u32).unwrap(); // advance mapping offset
        U32Be::write(&mut buffer, 0u32).unwrap(); // lsb/tsb mapping offset
        U32Be::write(&mut buffer, 0u32).unwrap(); // rsb/bsb mapping offset
        if vertical {
            U32Be::write(&mut buffer, 0u32).unwrap(); // vorg mapping offset
        }
        U16Be::write(&mut buffer, 1u16).unwrap(); // format
        U32Be::write(&mut buffer, 12u32).unwrap(); // region list offset
        U16Be::write(&mut buffer, 1u16).unwrap(); // subtable count
        U32Be::write(&mut buffer, 22u32).unwrap(); // subtable offset
        U16Be::write(&mut buffer, 1u16).unwrap(); // axis count
        U16Be::write(&mut buffer, 1u16).unwrap(); // region count
        for value in [0.0f32, 1., 1.] {
            F2Dot14::write(&mut buffer, F2Dot14::from(value)).unwrap();
        }
        U16Be::write(&mut buffer, 3u16).unwrap(); // item count
        U16Be::write(&mut buffer, 1u16).unwrap(); // short delta count
        U16Be::write(&mut buffer, 1u16).unwrap(); // region count
        U16Be::write(&mut buffer, 0u16).unwrap(); // region index
        I16Be::write(&mut buffer, 100i16).unwrap();
        I16Be::write(&mut buffer, 60i16).unwrap();
        I16Be::write(&mut buffer, -40i16).unwrap();
        buffer.into_inner()
    }

    fn vorg_table() -> Vec<u8> {
        let mut buffer = WriteBuffer::new();
        U32Be::write(&mut buffer, 0x0001_0000u32).unwrap();
        I16Be::write(&mut buffer, 700i16).unwrap(); // default origin
        U16Be::write(&mut buffer, 1u16).unwrap(); // record count
        U16Be::write(&mut buffer, 1u16).unwrap(); // glyph index
        I16Be::write(&mut buffer, 650i16).unwrap();
        buffer.into_inner()
    }

    fn instance(loc: f32) -> OwnedTuple {
        OwnedTuple::from_slice(&[F2Dot14::from(loc)])
    }

    #[test]
    fn hmtx_short_records_reuse_last_advance() {
        let provider = TestProvider(HashMap::from([
            (tag::HHEA, hea_table(2)),
            (tag::HMTX, mtx_table()),
        ]));
        let hmtx = VariableHmtx::new(&provider).unwrap();
        assert_eq!(hmtx.default_metrics().len(), 3);
        assert_eq!(
            hmtx.default_metrics().get(2),
            Some(LongMetric { advance: 600, side_bearing: 30 })
        );
    }

    #[test]
    fn hmtx_lookup_without_variation_data() {
        let provider = TestProvider(HashMap::from([
            (tag::HHEA, hea_table(2)),
            (tag::HMTX, mtx_table()),
        ]));
        let hmtx = VariableHmtx::new(&provider).unwrap();
        assert!(hmtx.hvar().is_none());
        let metrics = hmtx.lookup(0, Some(&instance(1.))).unwrap();
        assert_close(metrics.advance, 500.);
        assert_close(metrics.side_bearing, 10.);
    }

    #[test]
    fn hmtx_lookup_applies_hvar_deltas() {
        let provider = TestProvider(HashMap::from([
            (tag::HHEA, hea_table(2)),
            (tag::HMTX, mtx_table()),
            (tag::HVAR, var_table(false)),
        ]));
        let hmtx = VariableHmtx::new(&provider).unwrap();
        assert!(hmtx.hvar().is_some());

        let metrics = hmtx.lookup(1, Some(&instance(1.))).unwrap();
        assert_close(metrics.advance, 660.);
        assert_close(metrics.side_bearing, 20.); // no side-bearing map

        let halfway = hmtx.lookup(1, Some(&instance(0.5))).unwrap();
        assert_close(halfway.advance, 630.);

        // no instance coordinates: defaults
        let metrics = hmtx.lookup(1, None).unwrap();
        assert_close(metrics.advance, 600.);
    }

    #[test]
    fn hmtx_lookup_bad_glyph_id() {
        let provider = TestProvider(HashMap::from([
            (tag::HHEA, hea_table(2)),
            (tag::HMTX, mtx_table()),
        ]));
        let hmtx = VariableHmtx::new(&provider).unwrap();
        assert_eq!(hmtx.lookup(3, None), Err(ParseError::BadIndex));
    }

    #[test]
    fn missing_hmtx_is_an_error() {
        let provider = TestProvider(HashMap::from([(tag::HHEA, hea_table(2))]));
        assert_eq!(
            VariableHmtx::new(&provider).unwrap_err(),
            ParseError::MissingTable(tag::HMTX)
        );
    }

    #[test]
    fn vmtx_with_vorg_and_vvar() {
        let provider = TestProvider(HashMap::from([
            (tag::VHEA, hea_table(2)),
            (tag::VMTX, mtx_table()),
            (tag::VORG, vorg_table()),
            (tag::VVAR, var_table(true)),
        ]));
        let vmtx = VariableVmtx::new(&provider).unwrap();
        assert!(vmtx.vvar().is_some());

        let metrics = vmtx.lookup(0, Some(&instance(1.))).unwrap();
        assert_close(metrics.advance, 600.);
        let origin = vmtx.vertical_origin(0, Some(&instance(1.))).unwrap();
        assert_close(origin, 700.); // no vorg mapping in VVAR
        let origin = vmtx.vertical_origin(1, None).unwrap();
        assert_close(origin, 650.);
    }

    #[test]
    fn vmtx_without_vorg_has_no_origins() {
        let provider = TestProvider(HashMap::from([
            (tag::VHEA, hea_table(2)),
            (tag::VMTX, mtx_table()),
        ]));
        let vmtx = VariableVmtx::new(&provider).unwrap();
        assert!(vmtx.vertical_origin(0, None).is_none());
    }
}
