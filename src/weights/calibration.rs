//! Lookups the weight engine needs from the outside world, and a serde-backed
//! table implementation of them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Nominal value with its up and down shifts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Variations {
    pub nominal: f64,
    pub up: f64,
    pub down: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LeptonSf {
    ElectronId,
    ElectronReco,
    MuonId,
    MuonIso,
    MuonTrigger,
}

/// Everything the processor reads from calibration files. Implementations
/// must be shareable across chunk workers.
pub trait Calibration: Send + Sync {
    /// Pileup reweighting for a dataset at the true number of interactions.
    fn pileup_weight(&self, dataset: &str, n_true: f64) -> Result<Variations>;

    /// Simulated b-tag efficiency for a jet of the given hadron flavour.
    fn btag_efficiency(&self, dataset: &str, flavour: i32, pt: f64, eta: f64) -> Result<f64>;

    /// Data/simulation b-tag scale factor, keyed like `1_comb_central_0`.
    fn btag_scale_factor(&self, key: &str, eta: f64, pt: f64, discriminant: f64) -> Result<f64>;

    /// Lepton efficiency scale factor and its uncertainty.
    fn lepton_scale_factor(&self, kind: LeptonSf, eta: f64, pt: f64) -> Result<(f64, f64)>;

    fn mc_event_yield(&self, dataset: &str) -> Result<f64>;

    fn cross_section(&self, dataset: &str) -> Result<f64>;

    fn luminosity(&self, year: u32) -> Result<f64>;
}

/// N-dimensional binned lookup. Values are row-major over the edge lists;
/// coordinates outside the edges use the first or last bin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DenseLookup {
    pub edges: Vec<Vec<f64>>,
    pub values: Vec<f64>,
}

impl DenseLookup {
    pub fn new(edges: Vec<Vec<f64>>, values: Vec<f64>) -> Result<Self> {
        let lookup = DenseLookup { edges, values };
        lookup.check()?;
        Ok(lookup)
    }

    pub fn constant(value: f64) -> Self {
        DenseLookup {
            edges: Vec::new(),
            values: vec![value],
        }
    }

    pub fn dims(&self) -> usize {
        self.edges.len()
    }

    fn check(&self) -> Result<()> {
        let mut expected = 1usize;
        for (dim, edges) in self.edges.iter().enumerate() {
            if edges.len() < 2 || edges.windows(2).any(|w| w[0] >= w[1]) {
                return Err(AnalysisError::Calibration(format!(
                    "dimension {dim} needs at least two increasing edges"
                )));
            }
            expected *= edges.len() - 1;
        }
        if expected != self.values.len() {
            return Err(AnalysisError::Calibration(format!(
                "{} values for {expected} bins",
                self.values.len()
            )));
        }
        Ok(())
    }

    pub fn evaluate(&self, coords: &[f64]) -> Result<f64> {
        if coords.len() != self.dims() {
            return Err(AnalysisError::Calibration(format!(
                "lookup has {} dimensions but got {} coordinates",
                self.dims(),
                coords.len()
            )));
        }

        let mut flat = 0usize;
        for (edges, &x) in self.edges.iter().zip(coords) {
            let Some(last_bin) = edges.len().checked_sub(2) else {
                return Err(AnalysisError::Calibration(format!(
                    "lookup axis needs at least two edges, got {}",
                    edges.len()
                )));
            };
            let bin = edges.partition_point(|e| *e <= x).saturating_sub(1).min(last_bin);
            flat = flat * (last_bin + 1) + bin;
        }

        self.values.get(flat).copied().ok_or_else(|| {
            AnalysisError::Calibration(format!("bin {flat} outside {} values", self.values.len()))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueWithError {
    pub value: DenseLookup,
    pub error: DenseLookup,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PileupTable {
    pub nominal: DenseLookup,
    pub up: DenseLookup,
    pub down: DenseLookup,
}

/// Calibration content loadable from YAML, JSON or RON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationTables {
    /// Full dataset name -> pileup weights over nTrueInt.
    pub pileup: BTreeMap<String, PileupTable>,
    /// Full dataset name -> hadron flavour -> efficiency over (pt, eta).
    pub btag_efficiency: BTreeMap<String, BTreeMap<i32, DenseLookup>>,
    /// Scale factor key -> lookup over (eta, pt) or (eta, pt, discriminant).
    pub btag_scale_factors: BTreeMap<String, DenseLookup>,
    /// Lepton scale factors over (eta, pt), or eta alone, or a constant;
    /// the muon trigger table uses |eta|.
    pub lepton: BTreeMap<LeptonSf, ValueWithError>,
    /// Full dataset name -> number of generated events.
    pub mc_event_yields: BTreeMap<String, f64>,
    /// Dataset name without year suffix -> cross section in pb.
    pub cross_sections: BTreeMap<String, f64>,
    /// Year -> integrated luminosity in 1/pb.
    pub luminosity: BTreeMap<u32, f64>,
}

impl CalibrationTables {
    /// Check every table's binning once, before any chunk is processed.
    pub fn validate(&self) -> Result<()> {
        for table in self.pileup.values() {
            table.nominal.check()?;
            table.up.check()?;
            table.down.check()?;
        }
        for lookup in self.btag_efficiency.values().flat_map(|m| m.values()) {
            lookup.check()?;
        }
        for lookup in self.btag_scale_factors.values() {
            lookup.check()?;
        }
        for sf in self.lepton.values() {
            sf.value.check()?;
            sf.error.check()?;
        }
        Ok(())
    }
}

fn missing(what: &str, key: &str) -> AnalysisError {
    AnalysisError::Calibration(format!("no {what} entry for '{key}'"))
}

impl Calibration for CalibrationTables {
    fn pileup_weight(&self, dataset: &str, n_true: f64) -> Result<Variations> {
        let table = self
            .pileup
            .get(dataset)
            .ok_or_else(|| AnalysisError::UnknownDataset(dataset.to_string()))?;
        Ok(Variations {
            nominal: table.nominal.evaluate(&[n_true])?,
            up: table.up.evaluate(&[n_true])?,
            down: table.down.evaluate(&[n_true])?,
        })
    }

    fn btag_efficiency(&self, dataset: &str, flavour: i32, pt: f64, eta: f64) -> Result<f64> {
        let per_flavour = self
            .btag_efficiency
            .get(dataset)
            .ok_or_else(|| AnalysisError::UnknownDataset(dataset.to_string()))?;
        per_flavour
            .get(&flavour)
            .ok_or_else(|| missing("b-tag efficiency flavour", &flavour.to_string()))?
            .evaluate(&[pt, eta])
    }

    fn btag_scale_factor(&self, key: &str, eta: f64, pt: f64, discriminant: f64) -> Result<f64> {
        let lookup = self
            .btag_scale_factors
            .get(key)
            .ok_or_else(|| missing("b-tag scale factor", key))?;
        let coords = [eta, pt, discriminant];
        match lookup.dims() {
            dims @ 0..=3 => lookup.evaluate(&coords[..dims]),
            dims => Err(AnalysisError::Calibration(format!(
                "b-tag scale factor '{key}' has {dims} dimensions"
            ))),
        }
    }

    fn lepton_scale_factor(&self, kind: LeptonSf, eta: f64, pt: f64) -> Result<(f64, f64)> {
        let sf = self
            .lepton
            .get(&kind)
            .ok_or_else(|| missing("lepton scale factor", &format!("{kind:?}")))?;
        let coords = [eta, pt];
        let at = |lookup: &DenseLookup| match lookup.dims() {
            dims @ 0..=2 => lookup.evaluate(&coords[..dims]),
            dims => Err(AnalysisError::Calibration(format!(
                "{kind:?} scale factor has {dims} dimensions"
            ))),
        };
        Ok((at(&sf.value)?, at(&sf.error)?))
    }

    fn mc_event_yield(&self, dataset: &str) -> Result<f64> {
        self.mc_event_yields
            .get(dataset)
            .copied()
            .ok_or_else(|| AnalysisError::UnknownDataset(dataset.to_string()))
    }

    fn cross_section(&self, dataset: &str) -> Result<f64> {
        self.cross_sections
            .get(dataset)
            .copied()
            .ok_or_else(|| AnalysisError::UnknownDataset(dataset.to_string()))
    }

    fn luminosity(&self, year: u32) -> Result<f64> {
        self.luminosity
            .get(&year)
            .copied()
            .ok_or_else(|| missing("luminosity", &year.to_string()))
    }
}
