use serde::{Deserialize, Serialize};

use super::ragged::Ragged;
use crate::kinematics::PtEtaPhiM;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Muon {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    pub charge: i32,
    pub rel_iso: f64, // pfRelIso04_all
    pub tight_id: bool,
    pub is_pf: bool,
    pub is_tracker: bool,
    pub is_global: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Electron {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    pub charge: i32,
    pub cut_based: i32, // 0 fail, 1 veto, 2 loose, 3 medium, 4 tight
    pub dxy: f64,
    pub dz: f64,
}

/// Jet pt and mass after one jet energy variation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JetMomentum {
    pub pt: f64,
    pub mass: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JetVariant {
    Nominal,
    JesUp,
    JesDown,
    JerUp,
    JerDown,
}

impl JetVariant {
    pub const ALL: [JetVariant; 5] = [
        JetVariant::Nominal,
        JetVariant::JesUp,
        JetVariant::JesDown,
        JetVariant::JerUp,
        JetVariant::JerDown,
    ];

    /// Suffix used in selection names, empty for the nominal jets.
    pub fn suffix(&self) -> &'static str {
        match self {
            JetVariant::Nominal => "",
            JetVariant::JesUp => "_JESUp",
            JetVariant::JesDown => "_JESDown",
            JetVariant::JerUp => "_JERUp",
            JetVariant::JerDown => "_JERDown",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Jet {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    pub jet_id: i32,
    pub btag: f64, // btagDeepB
    pub hadron_flavour: i32,
    pub jes_up: JetMomentum,
    pub jes_down: JetMomentum,
    pub jer_up: JetMomentum,
    pub jer_down: JetMomentum,
}

impl Jet {
    pub fn momentum(&self, variant: JetVariant) -> JetMomentum {
        match variant {
            JetVariant::Nominal => JetMomentum {
                pt: self.pt,
                mass: self.mass,
            },
            JetVariant::JesUp => self.jes_up,
            JetVariant::JesDown => self.jes_down,
            JetVariant::JerUp => self.jer_up,
            JetVariant::JerDown => self.jer_down,
        }
    }

    pub fn p4(&self, variant: JetVariant) -> PtEtaPhiM {
        let JetMomentum { pt, mass } = self.momentum(variant);
        PtEtaPhiM::new(pt, self.eta, self.phi, mass)
    }

    /// Jet with every energy variant equal to the nominal one (collision data).
    pub fn without_variations(mut self) -> Self {
        let nominal = self.momentum(JetVariant::Nominal);
        self.jes_up = nominal;
        self.jes_down = nominal;
        self.jer_up = nominal;
        self.jer_down = nominal;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Photon {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub is_ee: bool,
    pub is_eb: bool,
    pub electron_veto: bool,
    pub pixel_seed: bool,
    pub rel_iso_chg: f64, // pfRelIso03_chg
    pub vid_bitmap: i32,
    pub gen_part_idx: i32,
}

impl Photon {
    pub fn charged_isolation(&self) -> f64 {
        self.rel_iso_chg * self.pt
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenParticle {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    pub pdg_id: i32,
    pub mother_idx: i32,
    pub status: i32,
}

pub trait HasP4 {
    fn p4(&self) -> PtEtaPhiM;
}

impl HasP4 for Muon {
    fn p4(&self) -> PtEtaPhiM {
        PtEtaPhiM::new(self.pt, self.eta, self.phi, self.mass)
    }
}

impl HasP4 for Electron {
    fn p4(&self) -> PtEtaPhiM {
        PtEtaPhiM::new(self.pt, self.eta, self.phi, self.mass)
    }
}

impl HasP4 for Photon {
    fn p4(&self) -> PtEtaPhiM {
        PtEtaPhiM::new(self.pt, self.eta, self.phi, 0.0)
    }
}

impl HasP4 for GenParticle {
    fn p4(&self) -> PtEtaPhiM {
        PtEtaPhiM::new(self.pt, self.eta, self.phi, self.mass)
    }
}

impl HasP4 for Jet {
    fn p4(&self) -> PtEtaPhiM {
        Jet::p4(self, JetVariant::Nominal)
    }
}

pub type Muons = Ragged<Muon>;
pub type Electrons = Ragged<Electron>;
pub type Jets = Ragged<Jet>;
pub type Photons = Ragged<Photon>;
pub type GenParticles = Ragged<GenParticle>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triggers {
    pub iso_mu24: Vec<bool>,
    pub iso_tk_mu24: Vec<bool>,
    pub ele27_wptight_gsf: Vec<bool>,
}

/// Generator-level weight branches. Each is `None` when the chunk lacks it.
/// Ragged branches that are not rectangular are rejected later, when the
/// factors that need them are derived.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorWeights {
    pub generator_weight: Option<Vec<f64>>,
    pub lhe_original: Option<Vec<f64>>,
    pub ps: Option<Ragged<f64>>,
    pub lhe_scale: Option<Ragged<f64>>,
    pub lhe_pdf: Option<Ragged<f64>>,
}

/// Simulation-only content of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct GenInfo {
    pub particles: GenParticles,
    pub n_true_interactions: Vec<f64>,
    pub weights: GeneratorWeights,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventBatch {
    pub dataset: String,
    pub is_data: bool,
    pub n_events: usize,
    pub triggers: Triggers,
    pub muons: Muons,
    pub electrons: Electrons,
    pub jets: Jets,
    pub photons: Photons,
    pub generator: Option<GenInfo>,
}

impl EventBatch {
    /// Check that every per-event array and collection has `n_events` entries,
    /// and that simulation content is present exactly when the batch is MC.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::AnalysisError;

        let n = self.n_events;
        let mut sizes = vec![
            ("HLT_IsoMu24", self.triggers.iso_mu24.len()),
            ("HLT_IsoTkMu24", self.triggers.iso_tk_mu24.len()),
            ("HLT_Ele27_WPTight_Gsf", self.triggers.ele27_wptight_gsf.len()),
            ("Muon", self.muons.n_events()),
            ("Electron", self.electrons.n_events()),
            ("Jet", self.jets.n_events()),
            ("Photon", self.photons.n_events()),
        ];

        match (&self.generator, self.is_data) {
            (Some(gen_info), false) => {
                sizes.push(("GenPart", gen_info.particles.n_events()));
                sizes.push(("Pileup_nTrueInt", gen_info.n_true_interactions.len()));
                let w = &gen_info.weights;
                if let Some(v) = &w.generator_weight {
                    sizes.push(("Generator_weight", v.len()));
                }
                if let Some(v) = &w.lhe_original {
                    sizes.push(("LHEWeight_originalXWGTUP", v.len()));
                }
                if let Some(v) = &w.ps {
                    sizes.push(("PSWeight", v.n_events()));
                }
                if let Some(v) = &w.lhe_scale {
                    sizes.push(("LHEScaleWeight", v.n_events()));
                }
                if let Some(v) = &w.lhe_pdf {
                    sizes.push(("LHEPdfWeight", v.n_events()));
                }
            }
            (None, true) => {}
            (Some(_), true) => {
                return Err(AnalysisError::Shape(format!(
                    "dataset '{}' is data but carries generator content",
                    self.dataset
                )));
            }
            (None, false) => {
                return Err(AnalysisError::Shape(format!(
                    "simulated dataset '{}' has no generator content",
                    self.dataset
                )));
            }
        }

        for (name, size) in sizes {
            if size != n {
                return Err(AnalysisError::Shape(format!(
                    "{name} has {size} events, expected {n}"
                )));
            }
        }
        Ok(())
    }
}
