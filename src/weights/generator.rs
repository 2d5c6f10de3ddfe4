//! Parton-shower, PDF and renormalization/factorization scale variations
//! from the generator weight branches.

use crate::event::collections::GeneratorWeights;
use crate::event::ragged::Ragged;

/// Up/down per-event shifts of a factor whose nominal is one.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftPair {
    pub up: Vec<f64>,
    pub down: Vec<f64>,
}

/// `None` means the inputs were unusable and the factor stays neutral.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorFactors {
    pub isr: Option<ShiftPair>,
    pub fsr: Option<ShiftPair>,
    pub pdf: Option<ShiftPair>,
    pub q2_scale: Option<ShiftPair>,
}

// Common width of every event's weight list, or None when ragged or narrower
// than `min_width`.
fn rectangular_width(weights: &Ragged<f64>, min_width: usize) -> Option<usize> {
    let counts = weights.counts();
    let width = counts.first().copied().unwrap_or(min_width);
    if width < min_width || counts.iter().any(|&c| c != width) {
        return None;
    }
    Some(width)
}

fn q2_selector(width: usize) -> Option<&'static [usize]> {
    match width {
        9 => Some(&[0, 1, 3, 5, 7, 8]),
        44 => Some(&[0, 5, 15, 24, 34, 39]),
        _ => None,
    }
}

fn extremes(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::NEG_INFINITY, f64::INFINITY), |(hi, lo), v| (hi.max(v), lo.min(v)))
}

impl GeneratorFactors {
    pub fn derive(weights: &GeneratorWeights) -> Self {
        let (isr, fsr) = match Self::parton_shower(weights) {
            Some((isr, fsr)) => (Some(isr), Some(fsr)),
            None => {
                log::warn!("PSWeight unusable, ISR and FSR weights are disabled");
                (None, None)
            }
        };

        let pdf = Self::pdf(weights);
        if pdf.is_none() {
            log::warn!("LHEPdfWeight unusable, PDF weight is disabled");
        }

        let q2_scale = Self::q2_scale(weights);
        if q2_scale.is_none() {
            log::warn!("LHEScaleWeight unusable, Q2Scale weight is disabled");
        }

        GeneratorFactors {
            isr,
            fsr,
            pdf,
            q2_scale,
        }
    }

    fn parton_shower(weights: &GeneratorWeights) -> Option<(ShiftPair, ShiftPair)> {
        let ps = weights.ps.as_ref()?;
        rectangular_width(ps, 4)?;

        // PS weights are relative to the generator weight; bring them onto the
        // LHE normalization when the two disagree
        let rescale: Option<Vec<f64>> = match (&weights.generator_weight, &weights.lhe_original) {
            (Some(generator), Some(lhe)) if generator != lhe => Some(
                generator
                    .iter()
                    .zip(lhe)
                    .map(|(g, l)| if *g == 0.0 { 1.0 } else { l / g })
                    .collect(),
            ),
            _ => None,
        };

        let column = |i: usize| -> Vec<f64> {
            ps.iter()
                .enumerate()
                .map(|(event, row)| {
                    let factor = rescale.as_ref().map_or(1.0, |r| r[event]);
                    row[i] * factor
                })
                .collect()
        };

        let isr = ShiftPair {
            up: column(2),
            down: column(0),
        };
        let fsr = ShiftPair {
            up: column(3),
            down: column(1),
        };
        Some((isr, fsr))
    }

    fn pdf(weights: &GeneratorWeights) -> Option<ShiftPair> {
        let pdf = weights.lhe_pdf.as_ref()?;
        rectangular_width(pdf, 1)?;

        let (up, down) = pdf
            .iter()
            .map(|row| {
                let first = if row[0] == 0.0 { 1.0 } else { row[0] };
                // the first entry is the reference and always contributes 1
                extremes(std::iter::once(1.0).chain(row[1..].iter().map(|w| w / first)))
            })
            .unzip();
        Some(ShiftPair { up, down })
    }

    fn q2_scale(weights: &GeneratorWeights) -> Option<ShiftPair> {
        let scale = weights.lhe_scale.as_ref()?;
        let width = rectangular_width(scale, 1)?;
        let selector = q2_selector(width)?;

        let (up, down) = scale
            .iter()
            .map(|row| extremes(selector.iter().map(|&i| row[i])))
            .unzip();
        Some(ShiftPair { up, down })
    }
}
