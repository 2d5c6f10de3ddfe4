use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

use super::axis::BinAxis;
use crate::error::{AnalysisError, Result};

/// Weighted sums for one combination of category labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseBins {
    pub sumw: Vec<f64>,
    pub sumw2: Vec<f64>,
}

impl DenseBins {
    fn zeros(size: usize) -> Self {
        Self {
            sumw: vec![0.0; size],
            sumw2: vec![0.0; size],
        }
    }

    fn add(&mut self, other: &DenseBins) {
        for (a, b) in self.sumw.iter_mut().zip(&other.sumw) {
            *a += b;
        }
        for (a, b) in self.sumw2.iter_mut().zip(&other.sumw2) {
            *a += b;
        }
    }
}

/// Histogram with categorical axes (sparse, keyed by label tuple) and binned
/// axes (dense, flow bins included). Filling and merging only ever add, so
/// merged results do not depend on how events were split into chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "HistogramRepr", try_from = "HistogramRepr")]
pub struct Histogram {
    pub name: String,
    pub categories: Vec<String>,
    pub axes: Vec<BinAxis>,
    bins: FnvHashMap<Vec<String>, DenseBins>,
}

impl Histogram {
    pub fn new(name: &str, categories: &[&str], axes: Vec<BinAxis>) -> Self {
        Self {
            name: name.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            axes,
            bins: FnvHashMap::default(),
        }
    }

    fn size(&self) -> usize {
        self.axes.iter().map(BinAxis::extent).product()
    }

    fn flat_index(&self, coords: &[f64]) -> usize {
        self.axes
            .iter()
            .zip(coords)
            .fold(0, |flat, (axis, &x)| flat * axis.extent() + axis.index(x))
    }

    fn check_fill(&self, labels: &[&str], n_coords: usize) -> Result<()> {
        if labels.len() != self.categories.len() || n_coords != self.axes.len() {
            return Err(AnalysisError::Histogram(format!(
                "'{}' takes {} labels and {} values, got {} and {}",
                self.name,
                self.categories.len(),
                self.axes.len(),
                labels.len(),
                n_coords
            )));
        }
        Ok(())
    }

    /// Add one weighted entry.
    pub fn fill(&mut self, labels: &[&str], coords: &[f64], weight: f64) -> Result<()> {
        self.check_fill(labels, coords.len())?;
        let size = self.size();
        let index = self.flat_index(coords);
        let key: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        let bins = self.bins.entry(key).or_insert_with(|| DenseBins::zeros(size));
        bins.sumw[index] += weight;
        bins.sumw2[index] += weight * weight;
        Ok(())
    }

    /// Add many entries sharing the same labels; `columns[a][i]` is entry i's
    /// value on axis a.
    pub fn fill_columns(
        &mut self,
        labels: &[&str],
        columns: &[&[f64]],
        weights: &[f64],
    ) -> Result<()> {
        self.check_fill(labels, columns.len())?;
        if let Some(bad) = columns.iter().find(|c| c.len() != weights.len()) {
            return Err(AnalysisError::Histogram(format!(
                "'{}' got {} values for {} weights",
                self.name,
                bad.len(),
                weights.len()
            )));
        }
        if weights.is_empty() {
            return Ok(());
        }

        let mut coords = vec![0.0; columns.len()];
        for (i, &w) in weights.iter().enumerate() {
            for (c, column) in coords.iter_mut().zip(columns) {
                *c = column[i];
            }
            self.fill(labels, &coords, w)?;
        }
        Ok(())
    }

    pub fn compatible(&self, other: &Histogram) -> bool {
        self.categories == other.categories && self.axes == other.axes
    }

    /// Bin-wise addition of another histogram with identical axes.
    pub fn merge(&mut self, other: &Histogram) -> Result<()> {
        if !self.compatible(other) {
            return Err(AnalysisError::Histogram(format!(
                "cannot merge '{}' into '{}' with different axes",
                other.name, self.name
            )));
        }
        let size = self.size();
        for (key, bins) in &other.bins {
            self.bins
                .entry(key.clone())
                .or_insert_with(|| DenseBins::zeros(size))
                .add(bins);
        }
        Ok(())
    }

    /// Label tuples that have been filled, sorted.
    pub fn keys(&self) -> Vec<Vec<String>> {
        let mut keys: Vec<Vec<String>> = self.bins.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn get(&self, labels: &[&str]) -> Option<&DenseBins> {
        let key: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        self.bins.get(&key)
    }

    /// (Σw, Σw²) of the bin holding `coords`.
    pub fn bin_content(&self, labels: &[&str], coords: &[f64]) -> Option<(f64, f64)> {
        if coords.len() != self.axes.len() {
            return None;
        }
        let index = self.flat_index(coords);
        self.get(labels).map(|b| (b.sumw[index], b.sumw2[index]))
    }

    /// Σw over every bin (flow included) of one label tuple.
    pub fn total(&self, labels: &[&str]) -> f64 {
        self.get(labels).map_or(0.0, |b| b.sumw.iter().sum())
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct HistogramRepr {
    name: String,
    categories: Vec<String>,
    axes: Vec<BinAxis>,
    entries: Vec<HistogramEntry>,
}

#[derive(Serialize, Deserialize)]
struct HistogramEntry {
    labels: Vec<String>,
    sumw: Vec<f64>,
    sumw2: Vec<f64>,
}

impl From<Histogram> for HistogramRepr {
    fn from(hist: Histogram) -> Self {
        let mut entries: Vec<HistogramEntry> = hist
            .bins
            .into_iter()
            .map(|(labels, bins)| HistogramEntry {
                labels,
                sumw: bins.sumw,
                sumw2: bins.sumw2,
            })
            .collect();
        entries.sort_by(|a, b| a.labels.cmp(&b.labels));
        HistogramRepr {
            name: hist.name,
            categories: hist.categories,
            axes: hist.axes,
            entries,
        }
    }
}

impl TryFrom<HistogramRepr> for Histogram {
    type Error = AnalysisError;

    fn try_from(repr: HistogramRepr) -> Result<Self> {
        let mut hist = Histogram {
            name: repr.name,
            categories: repr.categories,
            axes: repr.axes,
            bins: FnvHashMap::default(),
        };
        let size = hist.size();
        for entry in repr.entries {
            if entry.labels.len() != hist.categories.len()
                || entry.sumw.len() != size
                || entry.sumw2.len() != size
            {
                return Err(AnalysisError::Histogram(format!(
                    "stored entry {:?} of '{}' does not match its axes",
                    entry.labels, hist.name
                )));
            }
            hist.bins.insert(
                entry.labels,
                DenseBins {
                    sumw: entry.sumw,
                    sumw2: entry.sumw2,
                },
            );
        }
        Ok(hist)
    }
}
