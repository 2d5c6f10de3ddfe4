//! Generator-level photon overlap removal between inclusive samples and the
//! dedicated radiative samples.

use std::sync::LazyLock;

use regex::Regex;

use crate::ancestry::max_history_pdg_id;
use crate::error::{AnalysisError, Result};
use crate::event::collections::{GenParticle, GenParticles, HasP4};
use crate::event::ragged::Ragged;

static W_JETS: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^W[1234]jets$"));

// |pdgId| at or below this is a parton, lepton or boson, above it a hadron
const PROMPT_PARENT_MAX: i32 = 37;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapPolicy {
    pub pt: f64,
    pub abs_eta: f64,
    pub delta_r: f64,
}

impl OverlapPolicy {
    /// Thresholds for a dataset, `None` when no removal applies. Later
    /// matching rules override earlier ones.
    pub fn for_dataset(dataset: &str) -> Result<Option<Self>> {
        let w_jets = W_JETS
            .as_ref()
            .map_err(|e| AnalysisError::Selection(format!("bad overlap pattern: {e}")))?;

        let mut policy = None;
        if dataset.contains("TTbar") {
            policy = Some(OverlapPolicy {
                pt: 10.0,
                abs_eta: 5.0,
                delta_r: 0.1,
            });
        }
        if w_jets.is_match(dataset) {
            policy = Some(OverlapPolicy {
                pt: 10.0,
                abs_eta: 2.5,
                delta_r: 0.05,
            });
        }
        if dataset.contains("DYjetsM") {
            policy = Some(OverlapPolicy {
                pt: 15.0,
                abs_eta: 2.6,
                delta_r: 0.05,
            });
        }

        match &policy {
            Some(p) => log::debug!("Overlap removal for '{}': {:?}", dataset, p),
            None => log::debug!("No overlap removal for '{}'", dataset),
        }
        Ok(policy)
    }

    fn qualifies(&self, p: &GenParticle) -> bool {
        p.pdg_id == 22 && p.status == 1 && p.pt >= self.pt && p.eta.abs() < self.abs_eta
    }

    /// Per-event pass flag: false when the event holds an isolated prompt
    /// photon that the radiative sample already covers.
    pub fn pass(&self, particles: &GenParticles) -> Result<Vec<bool>> {
        let pdg = particles.map(|p| p.pdg_id);
        let mothers = particles.map(|p| p.mother_idx);
        let candidates: Vec<Vec<i32>> = particles
            .iter()
            .map(|record| self.isolated_photon_mothers(record))
            .collect();

        // the ancestry walk takes one seed per event, so walk rank by rank
        let ranks = candidates.iter().map(Vec::len).max().unwrap_or(0);
        let mut pass = vec![true; particles.n_events()];
        for rank in 0..ranks {
            let seeds = Ragged::from_events(
                candidates
                    .iter()
                    .map(|event| event.get(rank).map(|&m| vec![m]).unwrap_or_default())
                    .collect(),
            );
            let max_parent = max_history_pdg_id(&seeds, &pdg, &mothers)?;
            for (event, parent) in max_parent.into_iter().enumerate() {
                if !seeds.event(event).is_empty() && parent <= PROMPT_PARENT_MAX {
                    pass[event] = false;
                }
            }
        }
        Ok(pass)
    }

    /// Mother index of every qualifying photon with no other final-state
    /// particle within `delta_r`.
    fn isolated_photon_mothers(&self, record: &[GenParticle]) -> Vec<i32> {
        let final_state: Vec<usize> = (0..record.len())
            .filter(|&i| is_final_state(&record[i]))
            .collect();

        record
            .iter()
            .enumerate()
            .filter(|(_, p)| self.qualifies(p))
            .filter(|(i, photon)| {
                final_state
                    .iter()
                    .filter(|&j| j != i)
                    .map(|&j| photon.p4().delta_r(&record[j].p4()))
                    .all(|dr| dr > self.delta_r)
            })
            .map(|(_, photon)| photon.mother_idx)
            .collect()
    }
}

fn is_final_state(p: &GenParticle) -> bool {
    (p.status == 1 || p.status == 71) && !matches!(p.pdg_id.abs(), 12 | 14 | 16)
}

/// Overlap pass flags for a whole batch; every event passes for data and
/// for datasets without a removal rule.
pub fn overlap_pass(
    dataset: &str,
    is_data: bool,
    particles: Option<&GenParticles>,
    n_events: usize,
) -> Result<Vec<bool>> {
    if is_data {
        return Ok(vec![true; n_events]);
    }
    match (OverlapPolicy::for_dataset(dataset)?, particles) {
        (Some(policy), Some(particles)) => policy.pass(particles),
        _ => Ok(vec![true; n_events]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(
        pdg_id: i32,
        mother_idx: i32,
        status: i32,
        pt: f64,
        eta: f64,
        phi: f64,
    ) -> GenParticle {
        GenParticle {
            pt,
            eta,
            phi,
            mass: 0.0,
            pdg_id,
            mother_idx,
            status,
        }
    }

    #[test]
    fn dataset_rules() {
        let tt = OverlapPolicy::for_dataset("TTbarPowheg_Semilept").unwrap().unwrap();
        assert_eq!(tt.delta_r, 0.1);
        let w = OverlapPolicy::for_dataset("W3jets").unwrap().unwrap();
        assert_eq!(w.abs_eta, 2.5);
        assert!(OverlapPolicy::for_dataset("W3jets_ext").unwrap().is_none());
        let dy = OverlapPolicy::for_dataset("DYjetsM50").unwrap().unwrap();
        assert_eq!(dy.pt, 15.0);
        assert!(OverlapPolicy::for_dataset("TTGamma_SingleLept").unwrap().is_none());
    }

    #[test]
    fn later_rule_overrides() {
        let p = OverlapPolicy::for_dataset("TTbar_DYjetsM").unwrap().unwrap();
        assert_eq!(p.pt, 15.0);
    }

    #[test]
    fn isolated_photon_from_b_quark_is_vetoed() {
        // top(6) -> b(5) -> photon; the b shower (status 71) is far away
        let event = vec![
            particle(6, -1, 62, 100.0, 0.0, 0.0),
            particle(5, 0, 23, 50.0, 0.0, 0.0),
            particle(22, 1, 1, 20.0, 0.0, 0.0),
            particle(211, 1, 71, 10.0, 2.0, 2.0),
        ];
        let policy = OverlapPolicy::for_dataset("TTbarPowheg_Semilept").unwrap().unwrap();
        assert_eq!(policy.pass(&Ragged::from_events(vec![event])).unwrap(), vec![false]);
    }

    #[test]
    fn photon_from_hadron_decay_is_kept() {
        let event = vec![
            particle(5, -1, 23, 50.0, 0.0, 0.0),
            particle(511, 0, 2, 40.0, 0.0, 0.0),
            particle(22, 1, 1, 20.0, 0.0, 0.0),
        ];
        let policy = OverlapPolicy::for_dataset("TTbarPowheg_Semilept").unwrap().unwrap();
        assert_eq!(policy.pass(&Ragged::from_events(vec![event])).unwrap(), vec![true]);
    }

    #[test]
    fn photon_near_final_state_particle_is_kept() {
        let event = vec![
            particle(11, -1, 1, 30.0, 0.0, 0.0),
            particle(22, 0, 1, 20.0, 0.02, 0.02),
        ];
        let policy = OverlapPolicy::for_dataset("TTbarPowheg_Semilept").unwrap().unwrap();
        assert_eq!(policy.pass(&Ragged::from_events(vec![event])).unwrap(), vec![true]);
    }

    #[test]
    fn neutrinos_do_not_spoil_isolation() {
        let event = vec![
            particle(24, -1, 22, 80.0, 0.0, 0.0),
            particle(22, 0, 1, 20.0, 0.0, 0.0),
            particle(14, 0, 1, 20.0, 0.01, 0.0),
        ];
        let policy = OverlapPolicy::for_dataset("W2jets").unwrap().unwrap();
        assert_eq!(policy.pass(&Ragged::from_events(vec![event])).unwrap(), vec![false]);
    }

    #[test]
    fn any_vetoing_photon_fails_the_event() {
        // event 0: first photon from a pion, second from the top
        // event 1: only the pion photon
        let pion_then_top = vec![
            particle(6, -1, 62, 100.0, 0.0, 0.0),
            particle(111, -1, 2, 30.0, -2.0, 0.0),
            particle(22, 1, 1, 20.0, -2.0, 0.0),
            particle(22, 0, 1, 20.0, 2.0, 2.0),
        ];
        let pion_only = pion_then_top[..3].to_vec();
        let policy = OverlapPolicy::for_dataset("TTbarPowheg_Semilept").unwrap().unwrap();
        let particles = Ragged::from_events(vec![pion_then_top, pion_only, vec![]]);
        assert_eq!(policy.pass(&particles).unwrap(), vec![false, true, true]);
    }

    #[test]
    fn data_and_unmatched_datasets_pass() {
        let particles: GenParticles = Ragged::empty(2);
        assert_eq!(
            overlap_pass("TTbarPowheg_Data", true, None, 2).unwrap(),
            vec![true, true]
        );
        assert_eq!(
            overlap_pass("TTGamma_Dilepton", false, Some(&particles), 2).unwrap(),
            vec![true, true]
        );
    }
}
