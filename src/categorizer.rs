use serde::{Deserialize, Serialize};

use crate::ancestry::max_history_pdg_id;
use crate::error::{AnalysisError, Result};
use crate::event::collections::{GenParticles, Photon};
use crate::event::ragged::Ragged;

// parents above this |pdgId| are hadrons
const HADRONIC_PARENT_MIN: i32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhotonCategory {
    Genuine = 1,
    MisIdElectron = 2,
    HadronicPhoton = 3,
    HadronicFake = 4,
}

impl PhotonCategory {
    /// Coordinate on the category axis.
    pub fn value(&self) -> f64 {
        *self as i32 as f64
    }

    /// Category from the generator particle the photon is matched to (if
    /// any) and the largest |PDG ID| in its ancestry.
    pub fn classify(matched_pdg: Option<i32>, max_parent: i32) -> PhotonCategory {
        let matched_photon = matched_pdg == Some(22);
        let matched_electron = matched_pdg.is_some_and(|pdg| pdg.abs() == 11);
        let hadronic_parent = max_parent > HADRONIC_PARENT_MIN;

        if matched_photon && !hadronic_parent {
            PhotonCategory::Genuine
        } else if matched_electron {
            PhotonCategory::MisIdElectron
        } else if matched_photon {
            PhotonCategory::HadronicPhoton
        } else {
            PhotonCategory::HadronicFake
        }
    }
}

/// Category of each event's leading photon. Events without a leading photon
/// get `None`; collision data has no generator record and every event is
/// genuine.
pub fn categorize(
    leading: &[Option<Photon>],
    particles: Option<&GenParticles>,
) -> Result<Vec<Option<PhotonCategory>>> {
    let Some(particles) = particles else {
        return Ok(vec![Some(PhotonCategory::Genuine); leading.len()]);
    };
    if leading.len() != particles.n_events() {
        return Err(AnalysisError::Shape(format!(
            "{} leading photons for {} generator events",
            leading.len(),
            particles.n_events()
        )));
    }

    let seeds = Ragged::from_events(
        leading
            .iter()
            .map(|photon| photon.map(|p| vec![p.gen_part_idx]).unwrap_or_default())
            .collect(),
    );
    let pdg = particles.map(|p| p.pdg_id);
    let mothers = particles.map(|p| p.mother_idx);

    let matched_pdg = seeds.gather(&pdg)?.first();
    let max_parent = max_history_pdg_id(&seeds, &pdg, &mothers)?;

    Ok(leading
        .iter()
        .enumerate()
        .map(|(event, photon)| {
            photon.map(|_| {
                PhotonCategory::classify(matched_pdg[event].flatten(), max_parent[event])
            })
        })
        .collect())
}
