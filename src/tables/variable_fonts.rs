#![deny(missing_docs)]

//! Common structures for variable font support.
//!
//! The central structure is the [ItemVariationStore], the factored storage
//! that `HVAR`, `VVAR`, `MVAR`, and CFF2 use to map `(outer, inner)` delta-set
//! indices to per-region integer deltas.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/otvarcommonformats>

use std::ops::Deref;

use log::warn;
use rustc_hash::FxHashMap;
use tinyvec::TinyVec;

use crate::binary::read::{ReadBinary, ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::{I16Be, U16Be, U32Be};
use crate::error::{ParseError, WriteError};
use crate::tables::{F2Dot14, Fixed};
use crate::SafeFrom;

pub mod avar;
pub mod fvar;
pub mod hvar;
pub mod model;
pub mod mvar;
pub mod vvar;

use model::{VarLocationMap, VarModel, VarValueRecord};

/// The most axes a variation region may span.
///
/// CFF2 reserves fixed-size room for axis coordinates, so region lists
/// declaring more axes than this are rejected outright.
pub const MAX_AXES: u16 = 15;

/// The most regions an item variation store or any of its subtables may use.
///
/// Matches the number of blend operands a CFF2 interpreter must accommodate.
pub const MAX_MASTERS: u16 = 64;

/// Item variation store format number.
const ITEM_VARIATION_STORE_FORMAT: u16 = 1;
/// Size of the item variation store header and region list header.
const ITEM_VARIATION_STORE_HEADER_SIZE: usize = 8;
const VARIATION_REGION_LIST_HEADER_SIZE: usize = 4;
/// Size of one per-axis `(start, peak, end)` coordinate record.
const REGION_AXIS_COORDINATES_SIZE: usize = 3 * F2Dot14::SIZE;
/// Size of an item variation data subtable header.
const ITEM_VARIATION_DATA_HEADER_SIZE: usize = 6;

/// Mask for the bits of a delta-set index map entry format holding the inner
/// index bit count, minus one.
const INNER_INDEX_BIT_COUNT_MASK: u16 = 0x000F;
/// Mask for the bits of a delta-set index map entry format holding the entry
/// size in bytes, minus one.
const MAP_ENTRY_SIZE_MASK: u16 = 0x0030;
const MAP_ENTRY_SIZE_SHIFT: u16 = 4;

/// A normalized position in design space: one `F2Dot14` per axis.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct OwnedTuple(TinyVec<[F2Dot14; 4]>);

/// Per-axis `(start, peak, end)` coordinates of a variation region.
///
/// Describes an axis-wise tent function: weight 0 outside `[start, end]`,
/// 1 at `peak`, linear ramps between.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RegionAxisCoordinates {
    /// Start of the region along this axis.
    pub start: F2Dot14,
    /// Peak of the region along this axis.
    pub peak: F2Dot14,
    /// End of the region along this axis.
    pub end: F2Dot14,
}

/// A variation region: `(start, peak, end)` coordinates for every axis.
pub type VariationRegion = Vec<RegionAxisCoordinates>;

/// A delta-set `(outer, inner)` index pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeltaSetIndexMapEntry {
    /// Index of an item variation data subtable.
    pub outer_index: u16,
    /// Index of a delta-set row within the subtable.
    pub inner_index: u16,
}

/// Mapping from a glyph or item index to a delta-set index pair.
///
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/otvarcommonformats#associating-target-items-to-variation-data>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaSetIndexMap {
    map: Vec<DeltaSetIndexMapEntry>,
}

/// An item variation data subtable: delta-set rows over a subset of the
/// store's regions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ItemVariationData {
    region_indices: Vec<u16>,
    delta_values: Vec<Vec<i16>>,
}

/// Build-side record of a value added to the store.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ValueEntry {
    /// The value at the default location.
    pub default: i32,
    /// Where the value's deltas landed, or [DeltaSetIndexMapEntry::NO_VARIATION].
    pub pair: DeltaSetIndexMapEntry,
}

/// Item variation store: a region list plus item variation data subtables.
///
/// Owns all of its storage. A store can be parsed from binary data, queried
/// for delta adjustments, or built up from [VarValueRecord]s and serialized.
#[derive(Debug, PartialEq)]
pub struct ItemVariationStore {
    axis_count: u16,
    regions: Vec<VariationRegion>,
    region_map: FxHashMap<VariationRegion, u16>,
    subtables: Vec<ItemVariationData>,
    // build side
    values: Vec<ValueEntry>,
    models: Vec<VarModel>,
    location_set_map: FxHashMap<Vec<u32>, usize>,
}

impl OwnedTuple {
    /// Construct a tuple from a slice of per-axis coordinates.
    pub fn from_slice(coords: &[F2Dot14]) -> OwnedTuple {
        OwnedTuple(TinyVec::from(coords))
    }

    /// Construct the all-zero (default location) tuple for `axis_count` axes.
    pub fn zeros(axis_count: u16) -> OwnedTuple {
        let mut tuple = TinyVec::new();
        tuple.resize(usize::from(axis_count), F2Dot14::ZERO);
        OwnedTuple(tuple)
    }

    pub(crate) fn from_inner(inner: TinyVec<[F2Dot14; 4]>) -> OwnedTuple {
        OwnedTuple(inner)
    }
}

impl Deref for OwnedTuple {
    type Target = [F2Dot14];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DeltaSetIndexMapEntry {
    /// Marker pair indicating a value with no variation data.
    pub const NO_VARIATION: DeltaSetIndexMapEntry = DeltaSetIndexMapEntry {
        outer_index: 0xFFFF,
        inner_index: 0xFFFF,
    };

    /// `true` if this is the no-variation marker pair.
    pub fn is_no_variation(self) -> bool {
        self == Self::NO_VARIATION
    }
}

impl DeltaSetIndexMap {
    /// Look up the delta-set index pair for `gid`.
    ///
    /// An empty map yields `(0, gid)`; indices past the end of the map yield
    /// the last entry.
    pub fn entry(&self, gid: u16) -> DeltaSetIndexMapEntry {
        match self.map.get(usize::from(gid)) {
            Some(entry) => *entry,
            None => match self.map.last() {
                Some(entry) => *entry,
                None => DeltaSetIndexMapEntry {
                    outer_index: 0,
                    inner_index: gid,
                },
            },
        }
    }

    /// The number of entries in the map.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl ReadBinary for DeltaSetIndexMap {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let entry_format = ctxt.read_u16be()?;
        let map_count = ctxt.read_u16be()?;
        let entry_size = ((entry_format & MAP_ENTRY_SIZE_MASK) >> MAP_ENTRY_SIZE_SHIFT) + 1;
        let inner_bits = u32::from((entry_format & INNER_INDEX_BIT_COUNT_MASK) + 1);
        let inner_mask = (1u32 << inner_bits) - 1;

        let mut map = Vec::with_capacity(usize::from(map_count));
        for _ in 0..map_count {
            let mut entry = 0u32;
            for _ in 0..entry_size {
                entry = (entry << 8) | u32::from(ctxt.read_u8()?);
            }
            map.push(DeltaSetIndexMapEntry {
                outer_index: (entry >> inner_bits) as u16,
                inner_index: (entry & inner_mask) as u16,
            });
        }

        Ok(DeltaSetIndexMap { map })
    }
}

impl ItemVariationData {
    /// Indices into the store's region list of the regions this subtable uses.
    pub fn region_indices(&self) -> &[u16] {
        &self.region_indices
    }

    /// The delta-set rows of this subtable.
    ///
    /// Each row holds one delta per entry in [region_indices](Self::region_indices).
    pub fn delta_values(&self) -> &[Vec<i16>] {
        &self.delta_values
    }

    /// The serialized size of this subtable in bytes.
    fn size(&self) -> usize {
        let columns = self.region_indices.len();
        ITEM_VARIATION_DATA_HEADER_SIZE + 2 * columns + 2 * columns * self.delta_values.len()
    }
}

impl ReadBinaryDep for ItemVariationData {
    type Args<'a> = u16; // region list count
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, region_count: u16) -> Result<Self, ParseError> {
        let item_count = ctxt.read_u16be()?;
        let short_delta_count = ctxt.read_u16be()?;
        let subtable_region_count = ctxt.read_u16be()?;
        if subtable_region_count > MAX_MASTERS {
            warn!("item variation data: too many regions");
            return Err(ParseError::LimitExceeded);
        }

        let region_indices = ctxt
            .read_array::<U16Be>(usize::from(subtable_region_count))?
            .to_vec();
        if region_indices.iter().any(|&index| index >= region_count) {
            warn!("item variation data: region index out of range");
            return Err(ParseError::BadIndex);
        }

        let mut delta_values = Vec::with_capacity(usize::from(item_count));
        for _ in 0..item_count {
            let mut row = Vec::with_capacity(usize::from(subtable_region_count));
            for r in 0..subtable_region_count {
                let delta = if r < short_delta_count {
                    ctxt.read_i16be()?
                } else {
                    i16::from(ctxt.read_i8()?)
                };
                row.push(delta);
            }
            delta_values.push(row);
        }

        Ok(ItemVariationData {
            region_indices,
            delta_values,
        })
    }
}

impl WriteBinary<&Self> for ItemVariationData {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, subtable: &ItemVariationData) -> Result<(), WriteError> {
        let region_count = u16::try_from(subtable.region_indices.len())?;
        U16Be::write(ctxt, u16::try_from(subtable.delta_values.len())?)?;
        // Every delta is written as a 16-bit word, so the short delta count
        // equals the region count.
        U16Be::write(ctxt, region_count)?;
        U16Be::write(ctxt, region_count)?;
        ctxt.write_iter::<U16Be, _>(subtable.region_indices.iter().copied())?;
        for row in &subtable.delta_values {
            ctxt.write_iter::<I16Be, _>(row.iter().copied())?;
        }

        Ok(())
    }
}

impl ItemVariationStore {
    /// Create an empty store over `axis_count` axes.
    pub fn new(axis_count: u16) -> ItemVariationStore {
        ItemVariationStore {
            axis_count,
            regions: Vec::new(),
            region_map: FxHashMap::default(),
            subtables: Vec::new(),
            values: Vec::new(),
            models: Vec::new(),
            location_set_map: FxHashMap::default(),
        }
    }

    /// The number of axes the store's regions span.
    pub fn axis_count(&self) -> u16 {
        self.axis_count
    }

    /// The store's region list.
    pub fn regions(&self) -> &[VariationRegion] {
        &self.regions
    }

    /// The number of regions in the store's region list.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// The store's item variation data subtables.
    pub fn subtables(&self) -> &[ItemVariationData] {
        &self.subtables
    }

    /// Build-side record for a value previously added with
    /// [add_value](Self::add_value).
    pub fn value_entry(&self, index: u32) -> Option<&ValueEntry> {
        self.values.get(usize::safe_from(index))
    }

    /// Copy out the region indices of a subtable.
    ///
    /// Refuses (returns `None`) when the subtable index is out of range, when
    /// `region_list_count` is smaller than the subtable's region count, or
    /// when any region index is not below `region_list_count`.
    pub fn region_indices(&self, subtable_index: u16, region_list_count: usize) -> Option<&[u16]> {
        let subtable = self.subtables.get(usize::from(subtable_index))?;
        if region_list_count < subtable.region_indices.len() {
            return None;
        }
        if subtable
            .region_indices
            .iter()
            .any(|&index| usize::from(index) >= region_list_count)
        {
            return None;
        }
        Some(&subtable.region_indices)
    }

    /// Calculate the scalar contribution of every region at the supplied
    /// normalized instance coordinates.
    ///
    /// If the instance's axis count does not match the store's region list the
    /// store contributes nothing: all scalars are zero.
    pub fn calc_region_scalars(&self, instance: &OwnedTuple) -> Vec<f32> {
        if instance.len() != usize::from(self.axis_count) {
            warn!("axis count in variation font region list does not match axis count in fvar table");
            return vec![0.; self.regions.len()];
        }

        self.regions
            .iter()
            .map(|region| {
                region
                    .iter()
                    .zip(instance.iter())
                    .map(|(coords, &loc)| axis_scalar(*coords, loc))
                    .product()
            })
            .collect()
    }

    /// Calculate the scalar of the region `ref_region_index` evaluated at the
    /// peak of the region `loc_region_index`, in fixed-point.
    ///
    /// This is the reference form of the region scalar used when deriving
    /// master delta weights.
    pub fn calc_region_scalar(&self, ref_region_index: u16, loc_region_index: u16) -> Fixed {
        let ref_region = &self.regions[usize::from(ref_region_index)];
        let loc_region = &self.regions[usize::from(loc_region_index)];

        let mut scalar = Fixed::ONE;
        for (coords, loc_coords) in ref_region.iter().zip(loc_region.iter()) {
            let loc = loc_coords.peak;
            let axis_scalar = if coords.start > coords.peak || coords.peak > coords.end {
                Fixed::ONE
            } else if coords.start < F2Dot14::ZERO
                && coords.end > F2Dot14::ZERO
                && coords.peak != F2Dot14::ZERO
            {
                Fixed::ONE
            } else if coords.peak == F2Dot14::ZERO {
                Fixed::ONE
            } else if loc < coords.start || loc > coords.end {
                Fixed::ZERO
            } else if loc == coords.peak {
                Fixed::ONE
            } else if loc < coords.peak {
                (Fixed::from(loc) - Fixed::from(coords.start))
                    / (Fixed::from(coords.peak) - Fixed::from(coords.start))
            } else {
                (Fixed::from(coords.end) - Fixed::from(loc))
                    / (Fixed::from(coords.end) - Fixed::from(coords.peak))
            };
            scalar = scalar * axis_scalar;
        }
        scalar
    }

    /// Apply the deltas selected by `pair`, weighted by `scalars`, and return
    /// the net adjustment.
    ///
    /// Index or region-count anomalies contribute a zero adjustment and log a
    /// diagnostic; they never fail the caller.
    pub fn apply_deltas_for_index_pair(
        &self,
        pair: DeltaSetIndexMapEntry,
        scalars: &[f32],
        region_list_count: usize,
    ) -> f32 {
        let net_adjustment = 0.;

        let subtable = match self.subtables.get(usize::from(pair.outer_index)) {
            Some(subtable) => subtable,
            None => {
                warn!("invalid outer index in index map");
                return net_adjustment;
            }
        };

        // Items without any variation may be referenced by a subtable with a
        // region count of 0. This is valid.
        if subtable.region_indices.is_empty() {
            return net_adjustment;
        }

        if subtable.region_indices.len() > region_list_count {
            warn!("out of range region count in item variation store subtable");
            return net_adjustment;
        }

        let deltas = match subtable.delta_values.get(usize::from(pair.inner_index)) {
            Some(deltas) => deltas,
            None => {
                warn!("invalid inner index in index map");
                return net_adjustment;
            }
        };

        subtable
            .region_indices
            .iter()
            .zip(deltas.iter())
            .filter_map(|(&region_index, &delta)| {
                let scalar = *scalars.get(usize::from(region_index))?;
                (scalar != 0.).then(|| scalar * f32::from(delta))
            })
            .sum()
    }

    /// Apply the deltas for `gid`, resolving the delta-set index pair through
    /// `map`.
    ///
    /// A missing index map selects `(0, gid)`.
    pub fn apply_deltas_for_gid(
        &self,
        map: Option<&DeltaSetIndexMap>,
        gid: u16,
        scalars: &[f32],
        region_list_count: usize,
    ) -> f32 {
        let pair = match map {
            Some(map) => map.entry(gid),
            None => DeltaSetIndexMapEntry {
                outer_index: 0,
                inner_index: gid,
            },
        };
        self.apply_deltas_for_index_pair(pair, scalars, region_list_count)
    }

    /// Append a new subtable over the given regions and return its index.
    ///
    /// Regions are interned against the store's region list, so regions shared
    /// between subtables are stored once.
    pub fn new_subtable(&mut self, regions: Vec<VariationRegion>) -> u16 {
        let mut subtable = ItemVariationData::default();
        for region in regions {
            let region_index = match self.region_map.get(&region) {
                Some(&index) => index,
                None => {
                    let index = self.regions.len() as u16;
                    self.region_map.insert(region.clone(), index);
                    self.regions.push(region);
                    index
                }
            };
            subtable.region_indices.push(region_index);
        }
        let subtable_index = self.subtables.len() as u16;
        self.subtables.push(subtable);
        subtable_index
    }

    /// Add a value to the store, returning its value index.
    ///
    /// A non-variable value stores only its default, marked with
    /// [DeltaSetIndexMapEntry::NO_VARIATION]. A variable value is routed to
    /// the model for its location set, building the model (and its subtable)
    /// on first use.
    pub fn add_value(&mut self, vlm: &VarLocationMap, vvr: &VarValueRecord) -> u32 {
        let index = self.values.len() as u32;
        let mut pair = DeltaSetIndexMapEntry::NO_VARIATION;
        if vvr.is_variable() {
            let locations = vvr.locations();
            let model_index = match self.location_set_map.get(&locations) {
                Some(&model_index) => model_index,
                None => {
                    let model = VarModel::new(self, vlm, &locations);
                    let model_index = self.models.len();
                    self.models.push(model);
                    self.location_set_map.insert(locations, model_index);
                    model_index
                }
            };
            let model = &self.models[model_index];
            let subtable_index = model.subtable_index();
            let deltas = model.encode_deltas(vvr);
            let subtable = &mut self.subtables[usize::from(subtable_index)];
            pair = DeltaSetIndexMapEntry {
                outer_index: subtable_index,
                inner_index: subtable.delta_values.len() as u16,
            };
            subtable
                .delta_values
                .push(deltas.iter().map(|delta| delta.round_to_i32() as i16).collect());
        }
        self.values.push(ValueEntry {
            default: vvr.default_value(),
            pair,
        });
        index
    }

    /// The serialized size of the region list in bytes.
    fn region_list_size(&self) -> usize {
        VARIATION_REGION_LIST_HEADER_SIZE
            + self.regions.len() * usize::from(self.axis_count) * REGION_AXIS_COORDINATES_SIZE
    }
}

/// Scalar contribution of one axis of a region at the location `loc`.
fn axis_scalar(coords: RegionAxisCoordinates, loc: F2Dot14) -> f32 {
    let RegionAxisCoordinates { start, peak, end } = coords;
    if start > peak || peak > end {
        1.
    } else if start < F2Dot14::ZERO && end > F2Dot14::ZERO && peak != F2Dot14::ZERO {
        // A region that crosses zero with a nonzero peak contributes fully
        // everywhere.
        1.
    } else if peak == F2Dot14::ZERO {
        1.
    } else if loc < start || loc > end {
        0.
    } else if loc == peak {
        1.
    } else if loc < peak {
        (f32::from(loc) - f32::from(start)) / (f32::from(peak) - f32::from(start))
    } else {
        (f32::from(end) - f32::from(loc)) / (f32::from(end) - f32::from(peak))
    }
}

impl ReadBinary for ItemVariationStore {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let format = ctxt.read_u16be()?;
        ctxt.check_version(format == ITEM_VARIATION_STORE_FORMAT)?;
        let region_list_offset = ctxt.read_u32be()?;
        let subtable_count = ctxt.read_u16be()?;
        let subtable_offsets = (0..subtable_count)
            .map(|_| ctxt.read_u32be())
            .collect::<Result<Vec<_>, _>>()?;

        let mut region_ctxt = scope.offset(usize::safe_from(region_list_offset)).ctxt();
        let axis_count = region_ctxt.read_u16be()?;
        if axis_count > MAX_AXES {
            warn!("invalid axis count in item variation region list");
            return Err(ParseError::LimitExceeded);
        }
        let region_count = region_ctxt.read_u16be()?;
        if region_count > MAX_MASTERS {
            warn!("invalid region count in item variation region list");
            return Err(ParseError::LimitExceeded);
        }

        let mut store = ItemVariationStore::new(axis_count);
        for _ in 0..region_count {
            let region = region_ctxt
                .read_array::<RegionAxisCoordinates>(usize::from(axis_count))?
                .to_vec();
            let region_index = store.regions.len() as u16;
            store.region_map.entry(region.clone()).or_insert(region_index);
            store.regions.push(region);
        }

        for offset in subtable_offsets {
            let subtable = scope
                .offset(usize::safe_from(offset))
                .read_dep::<ItemVariationData>(region_count)?;
            store.subtables.push(subtable);
        }

        Ok(store)
    }
}

impl WriteBinary<&Self> for ItemVariationStore {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, store: &ItemVariationStore) -> Result<(), WriteError> {
        U16Be::write(ctxt, ITEM_VARIATION_STORE_FORMAT)?;
        // The region list immediately follows the header and subtable offsets.
        let region_list_offset =
            (ITEM_VARIATION_STORE_HEADER_SIZE + 4 * store.subtables.len()) as u32;
        U32Be::write(ctxt, region_list_offset)?;
        U16Be::write(ctxt, u16::try_from(store.subtables.len())?)?;

        let mut offset = region_list_offset + store.region_list_size() as u32;
        for subtable in &store.subtables {
            U32Be::write(ctxt, offset)?;
            offset += subtable.size() as u32;
        }

        U16Be::write(ctxt, store.axis_count)?;
        U16Be::write(ctxt, u16::try_from(store.regions.len())?)?;
        for region in &store.regions {
            for coords in region {
                F2Dot14::write(ctxt, coords.start)?;
                F2Dot14::write(ctxt, coords.peak)?;
                F2Dot14::write(ctxt, coords.end)?;
            }
        }

        for subtable in &store.subtables {
            ItemVariationData::write(ctxt, subtable)?;
        }

        Ok(())
    }
}

impl ReadFrom for RegionAxisCoordinates {
    type ReadType = (F2Dot14, F2Dot14, F2Dot14);

    fn read_from((start, peak, end): (F2Dot14, F2Dot14, F2Dot14)) -> Self {
        RegionAxisCoordinates { start, peak, end }
    }
}

/// Read the item variation store at `offset` within `scope`.
///
/// A malformed store is discarded: the result is an empty store whose lookups
/// contribute no adjustment, and a diagnostic is logged. The enclosing table
/// remains usable.
pub fn read_item_variation_store(scope: ReadScope<'_>, offset: u32) -> ItemVariationStore {
    match scope.offset(usize::safe_from(offset)).read::<ItemVariationStore>() {
        Ok(store) => store,
        Err(err) => {
            warn!("discarding malformed item variation store: {}", err);
            ItemVariationStore::new(0)
        }
    }
}

/// Read the delta-set index map at `offset` within `scope`, where an offset
/// of zero means the map is absent.
pub(crate) fn read_optional_index_map(
    scope: &ReadScope<'_>,
    offset: u32,
) -> Result<Option<DeltaSetIndexMap>, ParseError> {
    (offset > 0)
        .then(|| {
            scope
                .offset(usize::safe_from(offset))
                .read::<DeltaSetIndexMap>()
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::WriteBuffer;
    use crate::tests::assert_close;

    pub(crate) fn region(coords: &[(f32, f32, f32)]) -> VariationRegion {
        coords
            .iter()
            .map(|&(start, peak, end)| RegionAxisCoordinates {
                start: F2Dot14::from(start),
                peak: F2Dot14::from(peak),
                end: F2Dot14::from(end),
            })
            .collect()
    }

    #[test]
    fn index_map_clamps_to_last_entry() {
        let map = DeltaSetIndexMap {
            map: vec![
                DeltaSetIndexMapEntry { outer_index: 0, inner_index: 0 },
                DeltaSetIndexMapEntry { outer_index: 0, inner_index: 1 },
                DeltaSetIndexMapEntry { outer_index: 1, inner_index: 0 },
            ],
        };
        assert_eq!(
            map.entry(1),
            DeltaSetIndexMapEntry { outer_index: 0, inner_index: 1 }
        );
        assert_eq!(
            map.entry(5),
            DeltaSetIndexMapEntry { outer_index: 1, inner_index: 0 }
        );
    }

    #[test]
    fn index_map_empty_is_identity() {
        let map = DeltaSetIndexMap { map: Vec::new() };
        assert_eq!(
            map.entry(7),
            DeltaSetIndexMapEntry { outer_index: 0, inner_index: 7 }
        );
    }

    #[test]
    fn read_index_map_one_byte_entries() {
        // entry format: inner index uses 4 bits, entry size 1 byte
        let data = [0x00, 0x03, 0x00, 0x03, 0x00, 0x12, 0x21];
        let map = ReadScope::new(&data).read::<DeltaSetIndexMap>().unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(
            map.entry(1),
            DeltaSetIndexMapEntry { outer_index: 1, inner_index: 2 }
        );
        assert_eq!(
            map.entry(2),
            DeltaSetIndexMapEntry { outer_index: 2, inner_index: 1 }
        );
    }

    #[test]
    fn read_index_map_three_byte_entries() {
        // entry size 3 ((format >> 4) + 1), inner index uses 8 bits
        let data = [0x00, 0x27, 0x00, 0x01, 0x01, 0x02, 0x03];
        let map = ReadScope::new(&data).read::<DeltaSetIndexMap>().unwrap();
        assert_eq!(
            map.entry(0),
            DeltaSetIndexMapEntry { outer_index: 0x0102, inner_index: 3 }
        );
    }

    #[test]
    fn region_scalar_tent() {
        let mut store = ItemVariationStore::new(1);
        store.new_subtable(vec![region(&[(0., 0.5, 1.)])]);

        let at = |loc: f32| {
            let tuple = OwnedTuple::from_slice(&[F2Dot14::from(loc)]);
            store.calc_region_scalars(&tuple)[0]
        };
        assert_close(at(0.5), 1.);
        assert_close(at(0.25), 0.5);
        assert_close(at(0.75), 0.5);
        assert_close(at(0.), 0.);
        assert_close(at(-0.5), 0.);
        assert_close(at(1.), 0.);
    }

    #[test]
    fn region_scalar_negative_tent() {
        let mut store = ItemVariationStore::new(1);
        store.new_subtable(vec![region(&[(-1., -0.5, 0.)])]);

        let at = |loc: f32| {
            let tuple = OwnedTuple::from_slice(&[F2Dot14::from(loc)]);
            store.calc_region_scalars(&tuple)[0]
        };
        assert_close(at(-0.5), 1.);
        assert_close(at(-0.25), 0.5);
        assert_close(at(-0.75), 0.5);
        assert_close(at(0.5), 0.);
    }

    #[test]
    fn region_scalar_crossing_zero_is_one() {
        // A region that spans zero with a nonzero peak scores 1 everywhere,
        // even where the tent would be 0.
        let mut store = ItemVariationStore::new(1);
        store.new_subtable(vec![region(&[(-1., 0.5, 1.)])]);

        for loc in [-1., 0., 0.25, 0.5, 0.75, 1.] {
            let tuple = OwnedTuple::from_slice(&[F2Dot14::from(loc)]);
            assert_close(store.calc_region_scalars(&tuple)[0], 1.);
        }
    }

    #[test]
    fn region_scalar_zero_peak_is_one() {
        let mut store = ItemVariationStore::new(1);
        store.new_subtable(vec![region(&[(0., 0., 0.)])]);
        let tuple = OwnedTuple::from_slice(&[F2Dot14::from(0.75f32)]);
        assert_close(store.calc_region_scalars(&tuple)[0], 1.);
    }

    #[test]
    fn region_scalar_axis_count_mismatch_is_zero() {
        let mut store = ItemVariationStore::new(1);
        store.new_subtable(vec![region(&[(0., 0.5, 1.)])]);
        let tuple = OwnedTuple::from_slice(&[F2Dot14::from(0.5f32), F2Dot14::ZERO]);
        assert_eq!(store.calc_region_scalars(&tuple), vec![0.]);
    }

    #[test]
    fn region_interning_deduplicates() {
        let mut store = ItemVariationStore::new(1);
        let first = store.new_subtable(vec![
            region(&[(0., 0., 0.)]),
            region(&[(0., 1., 1.)]),
        ]);
        let second = store.new_subtable(vec![
            region(&[(0., 1., 1.)]),
            region(&[(-1., -1., 0.)]),
        ]);
        assert_eq!((first, second), (0, 1));
        assert_eq!(store.region_count(), 3);
        assert_eq!(store.subtables[0].region_indices, vec![0, 1]);
        assert_eq!(store.subtables[1].region_indices, vec![1, 2]);
        assert!(store
            .subtables
            .iter()
            .flat_map(|subtable| subtable.region_indices.iter())
            .all(|&index| usize::from(index) < store.region_count()));
    }

    #[test]
    fn apply_deltas() {
        let mut store = ItemVariationStore::new(1);
        let subtable_index = store.new_subtable(vec![
            region(&[(0., 0., 0.)]),
            region(&[(0., 1., 1.)]),
        ]);
        store.subtables[usize::from(subtable_index)]
            .delta_values
            .push(vec![0, 200]);

        let tuple = OwnedTuple::from_slice(&[F2Dot14::from(0.5f32)]);
        let scalars = store.calc_region_scalars(&tuple);
        let pair = DeltaSetIndexMapEntry { outer_index: 0, inner_index: 0 };
        let adjustment =
            store.apply_deltas_for_index_pair(pair, &scalars, store.region_count());
        assert_close(adjustment, 100.);
    }

    #[test]
    fn apply_deltas_bad_indices_contribute_nothing() {
        let mut store = ItemVariationStore::new(1);
        let subtable_index = store.new_subtable(vec![region(&[(0., 1., 1.)])]);
        store.subtables[usize::from(subtable_index)]
            .delta_values
            .push(vec![100]);

        let tuple = OwnedTuple::from_slice(&[F2Dot14::ONE]);
        let scalars = store.calc_region_scalars(&tuple);
        let bad_outer = DeltaSetIndexMapEntry { outer_index: 9, inner_index: 0 };
        assert_close(
            store.apply_deltas_for_index_pair(bad_outer, &scalars, store.region_count()),
            0.,
        );
        let bad_inner = DeltaSetIndexMapEntry { outer_index: 0, inner_index: 9 };
        assert_close(
            store.apply_deltas_for_index_pair(bad_inner, &scalars, store.region_count()),
            0.,
        );
        // Region list count smaller than the subtable's region count
        let pair = DeltaSetIndexMapEntry { outer_index: 0, inner_index: 0 };
        assert_close(store.apply_deltas_for_index_pair(pair, &scalars, 0), 0.);
    }

    #[test]
    fn read_store_with_byte_deltas() {
        // One region over one axis, one subtable with shortDeltaCount=1 of 2:
        // each row is one 16-bit delta followed by one 8-bit delta.
        let mut buffer = WriteBuffer::new();
        U16Be::write(&mut buffer, 1u16).unwrap(); // format
        U32Be::write(&mut buffer, 12u32).unwrap(); // region list offset
        U16Be::write(&mut buffer, 1u16).unwrap(); // subtable count
        U32Be::write(&mut buffer, 28u32).unwrap(); // subtable offset
        // region list
        U16Be::write(&mut buffer, 1u16).unwrap(); // axis count
        U16Be::write(&mut buffer, 2u16).unwrap(); // region count
        for value in [0.0f32, 1., 1., -1., -1., 0.] {
            F2Dot14::write(&mut buffer, F2Dot14::from(value)).unwrap();
        }
        // subtable
        U16Be::write(&mut buffer, 1u16).unwrap(); // item count
        U16Be::write(&mut buffer, 1u16).unwrap(); // short delta count
        U16Be::write(&mut buffer, 2u16).unwrap(); // region count
        U16Be::write(&mut buffer, 0u16).unwrap(); // region index 0
        U16Be::write(&mut buffer, 1u16).unwrap(); // region index 1
        I16Be::write(&mut buffer, 300i16).unwrap(); // 16-bit delta
        crate::binary::I8::write(&mut buffer, -5i8).unwrap(); // 8-bit delta

        let data = buffer.into_inner();
        let store = ReadScope::new(&data).read::<ItemVariationStore>().unwrap();
        assert_eq!(store.axis_count(), 1);
        assert_eq!(store.region_count(), 2);
        assert_eq!(store.subtables[0].region_indices, vec![0, 1]);
        assert_eq!(store.subtables[0].delta_values, vec![vec![300, -5]]);
    }

    #[test]
    fn read_store_rejects_region_index_out_of_range() {
        let mut buffer = WriteBuffer::new();
        U16Be::write(&mut buffer, 1u16).unwrap();
        U32Be::write(&mut buffer, 12u32).unwrap();
        U16Be::write(&mut buffer, 1u16).unwrap();
        U32Be::write(&mut buffer, 22u32).unwrap();
        U16Be::write(&mut buffer, 1u16).unwrap(); // axis count
        U16Be::write(&mut buffer, 1u16).unwrap(); // region count
        for value in [0.0f32, 1., 1.] {
            F2Dot14::write(&mut buffer, F2Dot14::from(value)).unwrap();
        }
        U16Be::write(&mut buffer, 0u16).unwrap(); // item count
        U16Be::write(&mut buffer, 1u16).unwrap(); // short delta count
        U16Be::write(&mut buffer, 1u16).unwrap(); // region count
        U16Be::write(&mut buffer, 7u16).unwrap(); // bad region index

        let data = buffer.into_inner();
        assert_eq!(
            ReadScope::new(&data).read::<ItemVariationStore>(),
            Err(ParseError::BadIndex)
        );
        // The lenient reader discards the store instead
        let store = read_item_variation_store(ReadScope::new(&data), 0);
        assert_eq!(store.region_count(), 0);
        assert!(store.subtables().is_empty());
    }

    #[test]
    fn serialize_then_parse_is_identity() {
        let mut store = ItemVariationStore::new(2);
        let first = store.new_subtable(vec![
            region(&[(0., 0., 0.), (0., 0., 0.)]),
            region(&[(0., 1., 1.), (0., 0., 0.)]),
        ]);
        let second = store.new_subtable(vec![region(&[(0., 1., 1.), (0., 0., 0.)])]);
        store.subtables[usize::from(first)].delta_values.push(vec![0, 150]);
        store.subtables[usize::from(first)].delta_values.push(vec![3, -40]);
        store.subtables[usize::from(second)].delta_values.push(vec![12]);

        let mut buffer = WriteBuffer::new();
        ItemVariationStore::write(&mut buffer, &store).unwrap();
        let data = buffer.into_inner();
        let parsed = ReadScope::new(&data).read::<ItemVariationStore>().unwrap();

        assert_eq!(parsed.axis_count(), store.axis_count());
        assert_eq!(parsed.regions(), store.regions());
        assert_eq!(parsed.subtables(), store.subtables());
    }
}
