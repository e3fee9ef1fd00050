//! Land-cover transition aggregation
//!
//! Given carbon stock and land-cover layers at two epochs, sums the stock
//! change of every cell whose land-cover code changed, grouped by
//! (origin group, destination group).

use crate::landcover::taxonomy::ClassTaxonomy;
use crate::maybe_rayon::*;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use soilcarbon_core::raster::{GridSpec, Raster};
use soilcarbon_core::{BBox, Error, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// The two analysis epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epochs {
    pub before: i32,
    pub after: i32,
}

impl Default for Epochs {
    fn default() -> Self {
        Self {
            before: 2000,
            after: 2018,
        }
    }
}

/// Carbon stock (t C/ha, NaN = no data) and land-cover codes at one epoch.
#[derive(Debug, Clone)]
pub struct EpochLayers {
    pub stock: Raster<f64>,
    pub land_cover: Raster<i32>,
}

impl EpochLayers {
    pub fn new(stock: Raster<f64>, land_cover: Raster<i32>) -> Self {
        Self { stock, land_cover }
    }

    fn clip(&self, bbox: &BBox) -> Self {
        Self {
            stock: self.stock.clip(bbox),
            land_cover: self.land_cover.clip(bbox),
        }
    }
}

/// Co-registered stock and land-cover layers at exactly two epochs.
#[derive(Debug, Clone)]
pub struct RasterPair {
    epochs: Epochs,
    before: EpochLayers,
    after: EpochLayers,
}

impl RasterPair {
    /// Pair two epochs. All four layers must share shape, transform and CRS.
    pub fn new(epochs: Epochs, before: EpochLayers, after: EpochLayers) -> Result<Self> {
        if epochs.before >= epochs.after {
            return Err(Error::InvalidParameter {
                name: "epochs",
                value: format!("{}..{}", epochs.before, epochs.after),
                reason: "first epoch must precede the second".into(),
            });
        }
        let grid = before.stock.grid();
        grid.ensure_aligned(&before.land_cover.grid())?;
        grid.ensure_aligned(&after.stock.grid())?;
        grid.ensure_aligned(&after.land_cover.grid())?;
        Ok(Self {
            epochs,
            before,
            after,
        })
    }

    pub fn epochs(&self) -> Epochs {
        self.epochs
    }

    pub fn before(&self) -> &EpochLayers {
        &self.before
    }

    pub fn after(&self) -> &EpochLayers {
        &self.after
    }

    pub fn grid(&self) -> GridSpec {
        self.before.stock.grid()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.before.stock.shape()
    }

    pub fn is_empty(&self) -> bool {
        self.before.stock.is_empty()
    }

    /// Cells centered inside `bbox`; empty when the box misses the grid
    pub fn clip(&self, bbox: &BBox) -> Self {
        Self {
            epochs: self.epochs,
            before: self.before.clip(bbox),
            after: self.after.clip(bbox),
        }
    }

    /// Per-cell `stock(after) - stock(before)`
    pub fn stock_change(&self) -> Raster<f64> {
        let diff = self.after.stock.data() - self.before.stock.data();
        let mut out = Raster::from_array(diff);
        out.set_transform(*self.before.stock.transform());
        out.set_crs(self.before.stock.crs().cloned());
        out.set_nodata(Some(f64::NAN));
        out
    }
}

/// Net change received by one destination group.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationEntry {
    pub group: String,
    /// Sum over all origins
    pub total: f64,
    /// Origin group and net change, ascending by change
    pub origins: Vec<(String, f64)>,
}

/// Net stock change by destination group, then origin group.
///
/// Destinations are ordered by ascending total, origins by ascending
/// change. Zero-net pairs and pairs within one group are left out of the
/// nested entries; the latter are kept in [`TransitionSummary::within_group`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionSummary {
    entries: Vec<DestinationEntry>,
    within_group: BTreeMap<String, f64>,
    cells: usize,
}

impl TransitionSummary {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of destination groups
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[DestinationEntry] {
        &self.entries
    }

    pub fn destinations(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.group.as_str())
    }

    pub fn get(&self, destination: &str, origin: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.group == destination)?
            .origins
            .iter()
            .find(|(o, _)| o == origin)
            .map(|(_, v)| *v)
    }

    /// Sum of every nested entry
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.total).sum()
    }

    /// Change of cells whose code changed but group did not, by group
    pub fn within_group(&self) -> &BTreeMap<String, f64> {
        &self.within_group
    }

    /// Cells with a code transition and a finite, nonzero change
    pub fn cells(&self) -> usize {
        self.cells
    }
}

impl Serialize for TransitionSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut outer = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            outer.serialize_entry(&entry.group, &OrderedOrigins(&entry.origins))?;
        }
        outer.end()
    }
}

struct OrderedOrigins<'a>(&'a [(String, f64)]);

impl Serialize for OrderedOrigins<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (origin, value) in self.0 {
            map.serialize_entry(origin, value)?;
        }
        map.end()
    }
}

/// Change sum and cell count for one (origin code, destination code) pair
#[derive(Debug, Clone, Copy, Default)]
struct Partial {
    sum: f64,
    cells: usize,
}

type CodePairs = BTreeMap<(i32, i32), Partial>;

/// Aggregate the stock change of land-cover transitions.
///
/// Cells with the same code at both epochs and cells with exactly zero
/// change are skipped. A NaN stock makes the change NaN: the cell's codes
/// are still looked up, but it adds nothing to the sums. Any code missing
/// from `taxonomy` fails the whole call.
pub fn aggregate(pair: &RasterPair, taxonomy: &ClassTaxonomy) -> Result<TransitionSummary> {
    let (rows, cols) = pair.shape();
    let stock_a = pair.before.stock.data();
    let stock_b = pair.after.stock.data();
    let lc_a = pair.before.land_cover.data();
    let lc_b = pair.after.land_cover.data();

    let partials: Vec<CodePairs> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut acc = CodePairs::new();
            for col in 0..cols {
                let (from, to) = (lc_a[(row, col)], lc_b[(row, col)]);
                if from == to {
                    continue;
                }
                let change = stock_b[(row, col)] - stock_a[(row, col)];
                if change == 0.0 {
                    continue;
                }
                let slot = acc.entry((from, to)).or_default();
                if change.is_finite() {
                    slot.sum += change;
                    slot.cells += 1;
                }
            }
            acc
        })
        .collect();

    let mut by_codes = CodePairs::new();
    for partial in partials {
        for (key, p) in partial {
            let slot = by_codes.entry(key).or_default();
            slot.sum += p.sum;
            slot.cells += p.cells;
        }
    }

    let mut by_groups: BTreeMap<(String, String), f64> = BTreeMap::new();
    let mut within_group: BTreeMap<String, f64> = BTreeMap::new();
    let mut cells = 0;
    for ((from, to), p) in by_codes {
        let origin = taxonomy.group_of(from)?;
        let destination = taxonomy.group_of(to)?;
        cells += p.cells;
        if origin == destination {
            *within_group.entry(origin.to_string()).or_default() += p.sum;
        } else {
            *by_groups
                .entry((origin.to_string(), destination.to_string()))
                .or_default() += p.sum;
        }
    }

    let summary = build_summary(by_groups, within_group, cells);
    debug!(
        rows,
        cols,
        cells,
        destinations = summary.len(),
        "aggregated land-cover transitions"
    );
    Ok(summary)
}

fn build_summary(
    by_groups: BTreeMap<(String, String), f64>,
    within_group: BTreeMap<String, f64>,
    cells: usize,
) -> TransitionSummary {
    let mut destinations: BTreeMap<String, Vec<(String, f64)>> = BTreeMap::new();
    for ((origin, destination), value) in by_groups {
        if value == 0.0 {
            continue;
        }
        destinations.entry(destination).or_default().push((origin, value));
    }

    let mut entries: Vec<DestinationEntry> = destinations
        .into_iter()
        .map(|(group, mut origins)| {
            origins.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
            let total = origins.iter().map(|(_, v)| v).sum();
            DestinationEntry {
                group,
                total,
                origins,
            }
        })
        .collect();
    entries.sort_by(|a, b| a.total.total_cmp(&b.total).then_with(|| a.group.cmp(&b.group)));

    TransitionSummary {
        entries,
        within_group,
        cells,
    }
}
