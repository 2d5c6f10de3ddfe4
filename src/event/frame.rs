//! Reads NanoAOD-style columns out of a polars `DataFrame`.
//!
//! Per-object branches are list columns (one list per event); per-event
//! branches are flat columns. Every field of a collection must have the same
//! per-event lengths as the collection's `pt` branch.

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use super::collections::{
    Electron, Electrons, EventBatch, GenInfo, GenParticle, GenParticles, GeneratorWeights, Jet,
    JetMomentum, Jets, Muon, Muons, Photon, Photons, Triggers,
};
use super::ragged::Ragged;
use crate::error::{AnalysisError, Result};

pub fn read_parquet(path: &Path) -> Result<DataFrame> {
    let df = ParquetReader::new(File::open(path)?).finish()?;
    log::debug!("Read {} rows from {}", df.height(), path.display());
    Ok(df)
}

fn non_null<T>(name: &str, values: impl Iterator<Item = Option<T>>) -> Result<Vec<T>> {
    values
        .map(|v| v.ok_or_else(|| AnalysisError::Shape(format!("null entry in {name}"))))
        .collect()
}

fn list_f64(name: &str, series: &Series) -> Result<Vec<f64>> {
    non_null(name, series.f64()?.into_iter())
}

fn list_i32(name: &str, series: &Series) -> Result<Vec<i32>> {
    non_null(name, series.i32()?.into_iter())
}

fn list_bool(name: &str, series: &Series) -> Result<Vec<bool>> {
    non_null(name, series.bool()?.into_iter())
}

fn aligned<T>(name: &str, counts: &[usize], read: (Vec<usize>, Vec<T>)) -> Result<Vec<T>> {
    let (field_counts, values) = read;
    if field_counts != counts {
        return Err(AnalysisError::Shape(format!(
            "{name} does not have the same per-event lengths as its collection"
        )));
    }
    Ok(values)
}

pub struct FrameReader<'a> {
    df: &'a DataFrame,
}

impl<'a> FrameReader<'a> {
    pub fn new(df: &'a DataFrame) -> Self {
        Self { df }
    }

    pub fn n_events(&self) -> usize {
        self.df.height()
    }

    pub fn has(&self, name: &str) -> bool {
        self.df.get_column_index(name).is_some()
    }

    fn column(&self, name: &str) -> Result<&'a Column> {
        if !self.has(name) {
            return Err(AnalysisError::MissingColumn(name.to_string()));
        }
        Ok(self.df.column(name)?)
    }

    pub fn flat_f64(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.column(name)?.cast(&DataType::Float64)?;
        non_null(name, column.f64()?.into_iter())
    }

    pub fn flat_bool(&self, name: &str) -> Result<Vec<bool>> {
        let column = self.column(name)?.cast(&DataType::Boolean)?;
        non_null(name, column.bool()?.into_iter())
    }

    pub fn optional_flat_f64(&self, name: &str) -> Result<Option<Vec<f64>>> {
        if self.has(name) {
            self.flat_f64(name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Per-event counts and flattened values of a list column.
    pub fn jagged<T>(
        &self,
        name: &str,
        inner: DataType,
        values_of: impl Fn(&str, &Series) -> Result<Vec<T>>,
    ) -> Result<(Vec<usize>, Vec<T>)> {
        let column = self.column(name)?.cast(&DataType::List(Box::new(inner)))?;
        let list = column.list()?;

        let mut counts = Vec::with_capacity(list.len());
        let mut values = Vec::new();
        for event in list.into_iter() {
            match event {
                Some(series) => {
                    let event_values = values_of(name, &series)?;
                    counts.push(event_values.len());
                    values.extend(event_values);
                }
                None => counts.push(0),
            }
        }
        Ok((counts, values))
    }

    pub fn jagged_f64(&self, name: &str) -> Result<(Vec<usize>, Vec<f64>)> {
        self.jagged(name, DataType::Float64, list_f64)
    }

    pub fn optional_ragged_f64(&self, name: &str) -> Result<Option<Ragged<f64>>> {
        if !self.has(name) {
            return Ok(None);
        }
        let (counts, values) = self.jagged_f64(name)?;
        Ragged::from_counts(&counts, values).map(Some)
    }

    fn field_f64(&self, name: &str, counts: &[usize]) -> Result<Vec<f64>> {
        aligned(name, counts, self.jagged_f64(name)?)
    }

    fn field_i32(&self, name: &str, counts: &[usize]) -> Result<Vec<i32>> {
        aligned(name, counts, self.jagged(name, DataType::Int32, list_i32)?)
    }

    fn field_bool(&self, name: &str, counts: &[usize]) -> Result<Vec<bool>> {
        aligned(name, counts, self.jagged(name, DataType::Boolean, list_bool)?)
    }

    pub fn muons(&self) -> Result<Muons> {
        let (counts, pt) = self.jagged_f64("Muon_pt")?;
        let eta = self.field_f64("Muon_eta", &counts)?;
        let phi = self.field_f64("Muon_phi", &counts)?;
        let mass = self.field_f64("Muon_mass", &counts)?;
        let charge = self.field_i32("Muon_charge", &counts)?;
        let rel_iso = self.field_f64("Muon_pfRelIso04_all", &counts)?;
        let tight_id = self.field_bool("Muon_tightId", &counts)?;
        let is_pf = self.field_bool("Muon_isPFcand", &counts)?;
        let is_tracker = self.field_bool("Muon_isTracker", &counts)?;
        let is_global = self.field_bool("Muon_isGlobal", &counts)?;

        let values = (0..pt.len())
            .map(|i| Muon {
                pt: pt[i],
                eta: eta[i],
                phi: phi[i],
                mass: mass[i],
                charge: charge[i],
                rel_iso: rel_iso[i],
                tight_id: tight_id[i],
                is_pf: is_pf[i],
                is_tracker: is_tracker[i],
                is_global: is_global[i],
            })
            .collect();
        Ragged::from_counts(&counts, values)
    }

    pub fn electrons(&self) -> Result<Electrons> {
        let (counts, pt) = self.jagged_f64("Electron_pt")?;
        let eta = self.field_f64("Electron_eta", &counts)?;
        let phi = self.field_f64("Electron_phi", &counts)?;
        let mass = self.field_f64("Electron_mass", &counts)?;
        let charge = self.field_i32("Electron_charge", &counts)?;
        let cut_based = self.field_i32("Electron_cutBased", &counts)?;
        let dxy = self.field_f64("Electron_dxy", &counts)?;
        let dz = self.field_f64("Electron_dz", &counts)?;

        let values = (0..pt.len())
            .map(|i| Electron {
                pt: pt[i],
                eta: eta[i],
                phi: phi[i],
                mass: mass[i],
                charge: charge[i],
                cut_based: cut_based[i],
                dxy: dxy[i],
                dz: dz[i],
            })
            .collect();
        Ragged::from_counts(&counts, values)
    }

    /// Collision data has neither hadron flavour nor energy variants.
    pub fn jets(&self, is_data: bool) -> Result<Jets> {
        let (counts, pt) = self.jagged_f64("Jet_pt")?;
        let eta = self.field_f64("Jet_eta", &counts)?;
        let phi = self.field_f64("Jet_phi", &counts)?;
        let mass = self.field_f64("Jet_mass", &counts)?;
        let jet_id = self.field_i32("Jet_jetId", &counts)?;
        let btag = self.field_f64("Jet_btagDeepB", &counts)?;

        let mut jets: Vec<Jet> = (0..pt.len())
            .map(|i| Jet {
                pt: pt[i],
                eta: eta[i],
                phi: phi[i],
                mass: mass[i],
                jet_id: jet_id[i],
                btag: btag[i],
                ..Default::default()
            })
            .collect();

        if is_data {
            jets = jets.into_iter().map(Jet::without_variations).collect();
            return Ragged::from_counts(&counts, jets);
        }

        let flavour = self.field_i32("Jet_hadronFlavour", &counts)?;
        let variant = |suffix: &str| -> Result<Vec<JetMomentum>> {
            let pt = self.field_f64(&format!("Jet_pt_{suffix}"), &counts)?;
            let mass = self.field_f64(&format!("Jet_mass_{suffix}"), &counts)?;
            Ok(pt
                .into_iter()
                .zip(mass)
                .map(|(pt, mass)| JetMomentum { pt, mass })
                .collect())
        };
        let jes_up = variant("jesUp")?;
        let jes_down = variant("jesDown")?;
        let jer_up = variant("jerUp")?;
        let jer_down = variant("jerDown")?;

        for (i, jet) in jets.iter_mut().enumerate() {
            jet.hadron_flavour = flavour[i];
            jet.jes_up = jes_up[i];
            jet.jes_down = jes_down[i];
            jet.jer_up = jer_up[i];
            jet.jer_down = jer_down[i];
        }
        Ragged::from_counts(&counts, jets)
    }

    pub fn photons(&self, is_data: bool) -> Result<Photons> {
        let (counts, pt) = self.jagged_f64("Photon_pt")?;
        let eta = self.field_f64("Photon_eta", &counts)?;
        let phi = self.field_f64("Photon_phi", &counts)?;
        let is_ee = self.field_bool("Photon_isScEtaEE", &counts)?;
        let is_eb = self.field_bool("Photon_isScEtaEB", &counts)?;
        let electron_veto = self.field_bool("Photon_electronVeto", &counts)?;
        let pixel_seed = self.field_bool("Photon_pixelSeed", &counts)?;
        let rel_iso_chg = self.field_f64("Photon_pfRelIso03_chg", &counts)?;
        let vid_bitmap = self.field_i32("Photon_vidNestedWPBitmap", &counts)?;
        let gen_part_idx = if is_data {
            vec![-1; pt.len()]
        } else {
            self.field_i32("Photon_genPartIdx", &counts)?
        };

        let values = (0..pt.len())
            .map(|i| Photon {
                pt: pt[i],
                eta: eta[i],
                phi: phi[i],
                is_ee: is_ee[i],
                is_eb: is_eb[i],
                electron_veto: electron_veto[i],
                pixel_seed: pixel_seed[i],
                rel_iso_chg: rel_iso_chg[i],
                vid_bitmap: vid_bitmap[i],
                gen_part_idx: gen_part_idx[i],
            })
            .collect();
        Ragged::from_counts(&counts, values)
    }

    pub fn gen_particles(&self) -> Result<GenParticles> {
        let (counts, pt) = self.jagged_f64("GenPart_pt")?;
        let eta = self.field_f64("GenPart_eta", &counts)?;
        let phi = self.field_f64("GenPart_phi", &counts)?;
        let mass = self.field_f64("GenPart_mass", &counts)?;
        let pdg_id = self.field_i32("GenPart_pdgId", &counts)?;
        let mother_idx = self.field_i32("GenPart_genPartIdxMother", &counts)?;
        let status = self.field_i32("GenPart_status", &counts)?;

        let values = (0..pt.len())
            .map(|i| GenParticle {
                pt: pt[i],
                eta: eta[i],
                phi: phi[i],
                mass: mass[i],
                pdg_id: pdg_id[i],
                mother_idx: mother_idx[i],
                status: status[i],
            })
            .collect();
        Ragged::from_counts(&counts, values)
    }

    pub fn triggers(&self) -> Result<Triggers> {
        Ok(Triggers {
            iso_mu24: self.flat_bool("HLT_IsoMu24")?,
            iso_tk_mu24: self.flat_bool("HLT_IsoTkMu24")?,
            ele27_wptight_gsf: self.flat_bool("HLT_Ele27_WPTight_Gsf")?,
        })
    }

    /// Generator weight branches are optional; missing ones leave the
    /// matching weight factors neutral.
    pub fn generator_weights(&self) -> Result<GeneratorWeights> {
        Ok(GeneratorWeights {
            generator_weight: self.optional_flat_f64("Generator_weight")?,
            lhe_original: self.optional_flat_f64("LHEWeight_originalXWGTUP")?,
            ps: self.optional_ragged_f64("PSWeight")?,
            lhe_scale: self.optional_ragged_f64("LHEScaleWeight")?,
            lhe_pdf: self.optional_ragged_f64("LHEPdfWeight")?,
        })
    }

    pub fn batch(&self, dataset: &str, is_data: bool) -> Result<EventBatch> {
        let generator = if is_data {
            None
        } else {
            Some(GenInfo {
                particles: self.gen_particles()?,
                n_true_interactions: self.flat_f64("Pileup_nTrueInt")?,
                weights: self.generator_weights()?,
            })
        };

        let batch = EventBatch {
            dataset: dataset.to_string(),
            is_data,
            n_events: self.n_events(),
            triggers: self.triggers()?,
            muons: self.muons()?,
            electrons: self.electrons()?,
            jets: self.jets(is_data)?,
            photons: self.photons(is_data)?,
            generator,
        };
        batch.validate()?;
        Ok(batch)
    }
}
