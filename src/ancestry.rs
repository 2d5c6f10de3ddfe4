//! Walk generator mother chains to find the heaviest ancestor.

use crate::error::{AnalysisError, Result};
use crate::event::ragged::Ragged;

/// Largest |PDG ID| met while following `mother_idx` from `seed` (seed
/// included) within one event's generator record.
///
/// Returns -1 for a negative seed. The walk stops at a -1 mother, at an index
/// outside the record, or after `pdg_id.len()` steps so malformed or cyclic
/// chains always terminate.
pub fn max_history_pdg_id_from(seed: i32, pdg_id: &[i32], mother_idx: &[i32]) -> i32 {
    let mut max_pdg = -1;
    let mut idx = seed;
    let mut steps = 0;

    while steps < pdg_id.len() {
        let Ok(i) = usize::try_from(idx) else {
            break;
        };
        let Some(pdg) = pdg_id.get(i) else {
            break;
        };
        max_pdg = max_pdg.max(pdg.abs());
        idx = mother_idx.get(i).copied().unwrap_or(-1);
        steps += 1;
    }

    max_pdg
}

/// One result per event, seeded from the first entry of that event's seed
/// list (-1 when the list is empty).
pub fn max_history_pdg_id(
    seeds: &Ragged<i32>,
    pdg_id: &Ragged<i32>,
    mother_idx: &Ragged<i32>,
) -> Result<Vec<i32>> {
    if !pdg_id.same_shape(mother_idx) {
        return Err(AnalysisError::Shape(
            "pdgId and genPartIdxMother are not aligned".to_string(),
        ));
    }
    if seeds.n_events() != pdg_id.n_events() {
        return Err(AnalysisError::Shape(format!(
            "{} seed events for {} generator events",
            seeds.n_events(),
            pdg_id.n_events()
        )));
    }

    let offsets = pdg_id.offsets();
    let pdg = pdg_id.values();
    let mothers = mother_idx.values();

    let mut out = Vec::with_capacity(seeds.n_events());
    for (i, event_seeds) in seeds.iter().enumerate() {
        let (start, stop) = (offsets[i], offsets[i + 1]);
        let result = match event_seeds.first() {
            Some(&seed) => max_history_pdg_id_from(seed, &pdg[start..stop], &mothers[start..stop]),
            None => -1,
        };
        out.push(result);
    }
    Ok(out)
}
