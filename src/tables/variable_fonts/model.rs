#![deny(missing_docs)]

//! Building item variation stores from design-space samples.
//!
//! A [VarModel] captures a set of master locations: it sorts them, derives
//! the variation regions their deltas are stored against, and precomputes the
//! weight each earlier master contributes at every later master's peak. With
//! that in place, encoding a [VarValueRecord] into delta-set rows is a single
//! pass over the sorted masters.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use log::warn;
use rustc_hash::FxHashMap;

use crate::tables::variable_fonts::{
    ItemVariationStore, OwnedTuple, RegionAxisCoordinates, VariationRegion,
};
use crate::tables::{F2Dot14, Fixed};
use crate::SafeFrom;

/// Interns design-space locations, assigning each distinct location a dense
/// index.
///
/// Index 0 always refers to the default location (all axes at zero).
#[derive(Debug)]
pub struct VarLocationMap {
    axis_count: u16,
    locations: Vec<OwnedTuple>,
    index_map: FxHashMap<OwnedTuple, u32>,
}

/// A value sampled across design space: a default plus per-location values.
///
/// Locations are [VarLocationMap] indices.
#[derive(Debug, Default, Clone)]
pub struct VarValueRecord {
    default: i32,
    per_location: BTreeMap<u32, i32>,
}

/// A delta encoder for one set of master locations.
///
/// Construction appends a subtable to the item variation store; the model
/// then encodes any value sampled at exactly these locations into delta-set
/// rows of that subtable.
#[derive(Debug, PartialEq)]
pub struct VarModel {
    subtable_index: u16,
    sorted_locations: Vec<u32>,
    // Strictly lower-triangular: entry (j, w) in row i records that master j
    // contributes with weight w at master i's peak, for j < i.
    delta_weights: Vec<Vec<(u16, Fixed)>>,
}

impl VarLocationMap {
    /// Create a location map over `axis_count` axes.
    ///
    /// The default location is pre-interned at index 0.
    pub fn new(axis_count: u16) -> VarLocationMap {
        let default = OwnedTuple::zeros(axis_count);
        let mut index_map = FxHashMap::default();
        index_map.insert(default.clone(), 0);
        VarLocationMap {
            axis_count,
            locations: vec![default],
            index_map,
        }
    }

    /// The number of axes locations in this map span.
    pub fn axis_count(&self) -> u16 {
        self.axis_count
    }

    /// The number of distinct locations interned so far.
    pub fn len(&self) -> u32 {
        self.locations.len() as u32
    }

    /// `false`: the default location is always present.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Return the index for `location`, interning it if it is new.
    ///
    /// `location` must have [axis_count](Self::axis_count) coordinates.
    pub fn intern(&mut self, location: OwnedTuple) -> u32 {
        debug_assert_eq!(location.len(), usize::from(self.axis_count));
        match self.index_map.get(&location) {
            Some(&index) => index,
            None => {
                let index = self.locations.len() as u32;
                self.index_map.insert(location.clone(), index);
                self.locations.push(location);
                index
            }
        }
    }

    /// The location interned at `index`.
    pub fn location(&self, index: u32) -> Option<&OwnedTuple> {
        self.locations.get(usize::safe_from(index))
    }
}

impl VarValueRecord {
    /// A value with the given default and no variation.
    pub fn new(default: i32) -> VarValueRecord {
        VarValueRecord {
            default,
            per_location: BTreeMap::new(),
        }
    }

    /// Record the value at a design-space location.
    pub fn add_location_value(&mut self, location: u32, value: i32) {
        self.per_location.insert(location, value);
    }

    /// The value at the default location.
    pub fn default_value(&self) -> i32 {
        self.default
    }

    /// `true` if any per-location values have been recorded.
    pub fn is_variable(&self) -> bool {
        !self.per_location.is_empty()
    }

    /// The locations this value is sampled at, in ascending index order.
    pub fn locations(&self) -> Vec<u32> {
        self.per_location.keys().copied().collect()
    }

    /// The value at `location`, falling back to the default.
    pub fn value_at(&self, location: u32) -> i32 {
        self.per_location
            .get(&location)
            .copied()
            .unwrap_or(self.default)
    }
}

impl VarModel {
    /// Build a model for `locations`, appending its subtable to `ivs`.
    ///
    /// All locations are expected to have been interned into `vlm`; unknown
    /// indices are dropped with a diagnostic.
    pub fn new(
        ivs: &mut ItemVariationStore,
        vlm: &VarLocationMap,
        locations: &[u32],
    ) -> VarModel {
        let mut locations = locations.to_vec();
        let known = |index: &u32| vlm.location(*index).is_some();
        if !locations.iter().all(known) {
            warn!("dropping unknown location indices from variation model");
            locations.retain(|index| known(index));
        }

        let axis_points = axis_points(vlm, &locations);
        let sorted_locations = locations
            .iter()
            .copied()
            .sorted_by(|&a, &b| cmp_locations(vlm, &axis_points, a, b))
            .collect::<Vec<_>>();
        let mut regions = initial_regions(vlm, &sorted_locations);
        narrow_regions(&mut regions);
        let subtable_index = ivs.new_subtable(regions);
        let delta_weights = calc_delta_weights(ivs, subtable_index);

        VarModel {
            subtable_index,
            sorted_locations,
            delta_weights,
        }
    }

    /// Index of the item variation data subtable this model writes into.
    pub fn subtable_index(&self) -> u16 {
        self.subtable_index
    }

    /// The model's master locations in encoding order. The default location
    /// sorts first.
    pub fn sorted_locations(&self) -> &[u32] {
        &self.sorted_locations
    }

    /// Encode a value into one unrounded delta per master.
    ///
    /// Each master's delta is its offset from the default minus the weighted
    /// contributions of all earlier masters, so blending the rounded deltas
    /// reproduces the sampled values.
    pub(crate) fn encode_deltas(&self, vvr: &VarValueRecord) -> Vec<Fixed> {
        let mut deltas: Vec<Fixed> = Vec::with_capacity(self.delta_weights.len());
        for (&location, weights) in self.sorted_locations.iter().zip(self.delta_weights.iter()) {
            let mut delta = Fixed::from(vvr.value_at(location) - vvr.default_value());
            for &(master, weight) in weights {
                let prior = deltas[usize::from(master)];
                if weight == Fixed::ONE {
                    delta = delta - prior;
                } else {
                    delta = delta - prior * weight;
                }
            }
            deltas.push(delta);
        }
        deltas
    }
}

/// For each axis, the set of nonzero coordinates taken by locations that lie
/// on that axis alone, plus zero. Used for tie-breaking the location order.
fn axis_points(vlm: &VarLocationMap, locations: &[u32]) -> Vec<BTreeSet<F2Dot14>> {
    let mut points = vec![BTreeSet::new(); usize::from(vlm.axis_count())];
    for &location in locations {
        let tuple = match vlm.location(location) {
            Some(tuple) => tuple,
            None => continue,
        };
        let mut on_axis = None;
        for (axis, &value) in tuple.iter().enumerate() {
            if value != F2Dot14::ZERO {
                if on_axis.is_some() {
                    on_axis = None;
                    break;
                }
                on_axis = Some((axis, value));
            }
        }
        if let Some((axis, value)) = on_axis {
            let set = &mut points[axis];
            if set.is_empty() {
                set.insert(F2Dot14::ZERO);
            }
            set.insert(value);
        }
    }
    points
}

/// Total order over master locations.
///
/// Keys, in priority order: fewer nonzero coordinates first; more
/// coordinates on an axis point first; at the lowest axis where exactly one
/// location is zero, the zero one first; at the lowest axis where the signs
/// disagree, negative first; at the lowest axis where the magnitudes differ,
/// the smaller first. The default location sorts before everything.
fn cmp_locations(
    vlm: &VarLocationMap,
    axis_points: &[BTreeSet<F2Dot14>],
    a: u32,
    b: u32,
) -> Ordering {
    let loc_a = match vlm.location(a) {
        Some(loc) => loc,
        None => return Ordering::Equal,
    };
    let loc_b = match vlm.location(b) {
        Some(loc) => loc,
        None => return Ordering::Equal,
    };

    let mut non_zero_a = 0u16;
    let mut non_zero_b = 0u16;
    let mut on_point_a = 0u16;
    let mut on_point_b = 0u16;
    let mut first_axis = Ordering::Equal;
    let mut first_sign = Ordering::Equal;
    let mut first_abs = Ordering::Equal;

    for (axis, (&av, &bv)) in loc_a.iter().zip(loc_b.iter()).enumerate() {
        if av != F2Dot14::ZERO {
            non_zero_a += 1;
        }
        if bv != F2Dot14::ZERO {
            non_zero_b += 1;
        }
        if axis_points[axis].contains(&av) {
            on_point_a += 1;
        }
        if axis_points[axis].contains(&bv) {
            on_point_b += 1;
        }
        if first_axis == Ordering::Equal {
            if av == F2Dot14::ZERO && bv != F2Dot14::ZERO {
                first_axis = Ordering::Less;
            } else if av != F2Dot14::ZERO && bv == F2Dot14::ZERO {
                first_axis = Ordering::Greater;
            }
        }
        if first_sign == Ordering::Equal {
            // Only meaningful where both values are nonzero; the first_axis
            // key is consulted before this one, which guarantees that.
            if av < F2Dot14::ZERO && bv > F2Dot14::ZERO {
                first_sign = Ordering::Less;
            } else if av > F2Dot14::ZERO && bv < F2Dot14::ZERO {
                first_sign = Ordering::Greater;
            }
        }
        if first_abs == Ordering::Equal {
            first_abs = av.abs().cmp(&bv.abs());
        }
    }

    non_zero_a
        .cmp(&non_zero_b)
        .then(on_point_b.cmp(&on_point_a))
        .then(first_axis)
        .then(first_sign)
        .then(first_abs)
}

/// One region per location: `(0, v, max)` for positive coordinates,
/// `(min, v, 0)` for negative ones, `(0, 0, 0)` on axes the location does not
/// use. `min`/`max` are taken across the whole location list.
fn initial_regions(vlm: &VarLocationMap, locations: &[u32]) -> Vec<VariationRegion> {
    let axis_count = usize::from(vlm.axis_count());
    let mut mins = vec![F2Dot14::ZERO; axis_count];
    let mut maxes = vec![F2Dot14::ZERO; axis_count];

    for tuple in locations.iter().filter_map(|&location| vlm.location(location)) {
        for (axis, &value) in tuple.iter().enumerate() {
            if mins[axis] > value {
                mins[axis] = value;
            }
            if maxes[axis] < value {
                maxes[axis] = value;
            }
        }
    }

    locations
        .iter()
        .filter_map(|&location| vlm.location(location))
        .map(|tuple| {
            tuple
                .iter()
                .enumerate()
                .map(|(axis, &value)| {
                    if value == F2Dot14::ZERO {
                        RegionAxisCoordinates {
                            start: F2Dot14::ZERO,
                            peak: F2Dot14::ZERO,
                            end: F2Dot14::ZERO,
                        }
                    } else if value > F2Dot14::ZERO {
                        RegionAxisCoordinates {
                            start: F2Dot14::ZERO,
                            peak: value,
                            end: maxes[axis],
                        }
                    } else {
                        RegionAxisCoordinates {
                            start: mins[axis],
                            peak: value,
                            end: F2Dot14::ZERO,
                        }
                    }
                })
                .collect()
        })
        .collect()
}

/// Narrow each region so that every earlier region's peak lands on one of its
/// boundaries.
///
/// For each relevant earlier region, candidate narrowings are computed per
/// axis and only those tied for the greatest relative cut are applied.
fn narrow_regions(regions: &mut [VariationRegion]) {
    for current in 1..regions.len() {
        for prior in 0..current {
            if !narrowing_relevant(&regions[prior], &regions[current]) {
                continue;
            }
            for (axis, coords) in best_narrowings(&regions[prior], &regions[current]) {
                regions[current][axis] = coords;
            }
        }
    }
}

fn narrowing_relevant(prior: &VariationRegion, current: &VariationRegion) -> bool {
    for (pa, ra) in prior.iter().zip(current.iter()) {
        // Skip over pairs that don't use the same axes
        if (ra.peak == F2Dot14::ZERO) != (pa.peak == F2Dot14::ZERO) {
            return false;
        }
        // Skip over pairs that don't intersect ranges
        if !(ra.peak == pa.peak || (ra.start < pa.peak && pa.peak < ra.end)) {
            return false;
        }
    }
    true
}

fn best_narrowings(
    prior: &VariationRegion,
    current: &VariationRegion,
) -> Vec<(usize, RegionAxisCoordinates)> {
    let mut narrowings = Vec::new();
    let mut best_ratio = -1.;
    for (axis, (pa, ra)) in prior.iter().zip(current.iter()).enumerate() {
        let peak_p = pa.peak;
        let RegionAxisCoordinates { start, peak, end } = *ra;
        let (replacement, ratio) = if peak_p < peak {
            (
                RegionAxisCoordinates { start: peak_p, peak, end },
                narrowing_ratio(peak_p, peak, start),
            )
        } else if peak_p > peak {
            (
                RegionAxisCoordinates { start, peak, end: peak_p },
                narrowing_ratio(peak_p, peak, end),
            )
        } else {
            continue;
        };
        if ratio > best_ratio {
            narrowings.clear();
            best_ratio = ratio;
        }
        if ratio == best_ratio {
            narrowings.push((axis, replacement));
        }
    }
    narrowings
}

/// How much of the span from `peak` to `bound` the cut at `peak_p` removes.
fn narrowing_ratio(peak_p: F2Dot14, peak: F2Dot14, bound: F2Dot14) -> f32 {
    let numerator = i32::from(peak_p.raw_value()) - i32::from(peak.raw_value());
    let denominator = i32::from(bound.raw_value()) - i32::from(peak.raw_value());
    numerator as f32 / denominator as f32
}

/// For each master, the nonzero scalars of all earlier masters' regions
/// evaluated at its peak.
fn calc_delta_weights(ivs: &ItemVariationStore, subtable_index: u16) -> Vec<Vec<(u16, Fixed)>> {
    let region_indices = ivs.subtables[usize::from(subtable_index)].region_indices();
    let mut delta_weights = Vec::with_capacity(region_indices.len());
    for i in 0..region_indices.len() {
        let mut weights = Vec::new();
        for j in 0..i {
            let scalar = ivs.calc_region_scalar(region_indices[j], region_indices[i]);
            if scalar != Fixed::ZERO {
                weights.push((j as u16, scalar));
            }
        }
        delta_weights.push(weights);
    }
    delta_weights
}
