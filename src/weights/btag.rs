//! b-tag event reweighting from per-jet efficiencies and scale factors.
//!
//! The probability of the observed tag pattern is the product of `eff` over
//! tagged jets and `1 - eff` over untagged jets. In data the efficiency is
//! `eff * SF`. The event weight is `P(data) / P(MC)`; the heavy and light
//! variations are reported relative to the nominal `P(data)`.

use std::fmt::Display;

use super::calibration::Calibration;
use crate::error::Result;
use crate::event::collections::{Jet, Jets};
use crate::event::ragged::Ragged;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SfVariation {
    Central,
    Up,
    Down,
}

impl Display for SfVariation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SfVariation::Central => write!(f, "central"),
            SfVariation::Up => write!(f, "up"),
            SfVariation::Down => write!(f, "down"),
        }
    }
}

/// Scale factor key `<wp>_<measurement>_<variation>_<flavour class>`, or
/// `None` for hadron flavours without a measurement.
pub fn scale_factor_key(hadron_flavour: i32, variation: SfVariation) -> Option<String> {
    // medium working point
    let (measurement, class) = match hadron_flavour {
        5 => ("comb", 0),
        4 => ("comb", 1),
        0 => ("incl", 2),
        _ => return None,
    };
    Some(format!("1_{measurement}_{variation}_{class}"))
}

fn is_heavy(hadron_flavour: i32) -> bool {
    hadron_flavour == 5 || hadron_flavour == 4
}

#[derive(Debug, Clone, PartialEq)]
pub struct BtagWeights {
    pub nominal: Vec<f64>,
    pub heavy_up: Vec<f64>,
    pub heavy_down: Vec<f64>,
    pub light_up: Vec<f64>,
    pub light_down: Vec<f64>,
}

/// Scale factors for every jet with one class of jets shifted.
#[derive(Debug, Clone, Copy)]
enum SfSet {
    Nominal,
    Heavy(SfVariation),
    Light(SfVariation),
}

fn jet_scale_factor(jet: &Jet, set: SfSet, calibration: &dyn Calibration) -> Result<f64> {
    let variation = match set {
        SfSet::Heavy(v) if is_heavy(jet.hadron_flavour) => v,
        SfSet::Light(v) if jet.hadron_flavour == 0 => v,
        _ => SfVariation::Central,
    };
    match scale_factor_key(jet.hadron_flavour, variation) {
        Some(key) => calibration.btag_scale_factor(&key, jet.eta, jet.pt, jet.btag),
        None => Ok(1.0),
    }
}

fn tag_probability(eff: &Ragged<f64>, tagged: &Ragged<bool>) -> Vec<f64> {
    eff.zip_map(tagged, |e, t| if *t { *e } else { 1.0 - e }).prod()
}

pub fn btag_weights(
    jets: &Jets,
    dataset: &str,
    working_point: f64,
    calibration: &dyn Calibration,
) -> Result<BtagWeights> {
    let tagged = jets.map(|j| j.btag > working_point);
    let eff =
        jets.try_map(|j| calibration.btag_efficiency(dataset, j.hadron_flavour, j.pt, j.eta))?;

    let data_probability = |set: SfSet| -> Result<Vec<f64>> {
        let sf = jets.try_map(|j| jet_scale_factor(j, set, calibration))?;
        Ok(tag_probability(&eff.zip_map(&sf, |e, s| e * s), &tagged))
    };

    let mut p_mc = tag_probability(&eff, &tagged);
    let mut p_data = data_probability(SfSet::Nominal)?;

    for p in p_mc.iter_mut().filter(|p| **p == 0.0) {
        *p = 1.0;
    }
    let nominal = p_data.iter().zip(&p_mc).map(|(d, m)| d / m).collect();

    for p in p_data.iter_mut().filter(|p| **p == 0.0) {
        *p = 1.0;
    }
    let relative = |shifted: Vec<f64>| -> Vec<f64> {
        shifted.iter().zip(&p_data).map(|(s, d)| s / d).collect()
    };

    Ok(BtagWeights {
        nominal,
        heavy_up: relative(data_probability(SfSet::Heavy(SfVariation::Up))?),
        heavy_down: relative(data_probability(SfSet::Heavy(SfVariation::Down))?),
        light_up: relative(data_probability(SfSet::Light(SfVariation::Up))?),
        light_down: relative(data_probability(SfSet::Light(SfVariation::Down))?),
    })
}
