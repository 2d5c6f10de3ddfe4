//! Named per-event weight factors with up/down variations.
//!
//! The default event weight is the product of every factor's nominal value.
//! Querying `"<name>Up"` or `"<name>Down"` swaps exactly that factor for its
//! shifted value and leaves every other factor nominal, so systematics are
//! never stacked.

pub mod btag;
pub mod calibration;
pub mod generator;

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, PartialEq)]
struct Factor {
    name: String,
    nominal: Vec<f64>,
    up: Option<Vec<f64>>,
    down: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Up,
    Down,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Weights {
    n_events: usize,
    factors: Vec<Factor>,
}

impl Weights {
    pub fn new(n_events: usize) -> Self {
        Self {
            n_events,
            factors: Vec::new(),
        }
    }

    pub fn n_events(&self) -> usize {
        self.n_events
    }

    pub fn add(
        &mut self,
        name: &str,
        nominal: Vec<f64>,
        up: Option<Vec<f64>>,
        down: Option<Vec<f64>>,
    ) -> Result<()> {
        for (label, len) in [
            ("nominal", Some(nominal.len())),
            ("up", up.as_ref().map(Vec::len)),
            ("down", down.as_ref().map(Vec::len)),
        ] {
            if let Some(len) = len
                && len != self.n_events
            {
                return Err(AnalysisError::Shape(format!(
                    "weight '{name}' {label} has {len} entries for {} events",
                    self.n_events
                )));
            }
        }
        if self.factors.iter().any(|f| f.name == name) {
            return Err(AnalysisError::UnknownSystematic(format!(
                "weight '{name}' registered twice"
            )));
        }

        self.factors.push(Factor {
            name: name.to_string(),
            nominal,
            up,
            down,
        });
        Ok(())
    }

    /// A factor that is identically one, with one-valued shifts.
    pub fn add_neutral(&mut self, name: &str) -> Result<()> {
        let ones = vec![1.0; self.n_events];
        self.add(name, ones.clone(), Some(ones.clone()), Some(ones))
    }

    /// A factor whose nominal is one and whose shifts carry the variation.
    pub fn add_shift_only(&mut self, name: &str, up: Vec<f64>, down: Vec<f64>) -> Result<()> {
        self.add(name, vec![1.0; self.n_events], Some(up), Some(down))
    }

    /// Product of nominal factors, or the product with one factor shifted.
    pub fn weight(&self, modifier: Option<&str>) -> Result<Vec<f64>> {
        let shifted = match modifier {
            None => None,
            Some(m) => Some(self.resolve(m)?),
        };

        let mut total = vec![1.0; self.n_events];
        for (i, factor) in self.factors.iter().enumerate() {
            let values = match shifted {
                Some((idx, Shift::Up)) if idx == i => factor.up.as_deref(),
                Some((idx, Shift::Down)) if idx == i => factor.down.as_deref(),
                _ => Some(factor.nominal.as_slice()),
            }
            .ok_or_else(|| AnalysisError::UnknownSystematic(modifier.unwrap_or("").to_string()))?;

            for (t, v) in total.iter_mut().zip(values) {
                *t *= v;
            }
        }
        Ok(total)
    }

    fn resolve(&self, modifier: &str) -> Result<(usize, Shift)> {
        let (name, shift) = if let Some(name) = modifier.strip_suffix("Up") {
            (name, Shift::Up)
        } else if let Some(name) = modifier.strip_suffix("Down") {
            (name, Shift::Down)
        } else {
            return Err(AnalysisError::UnknownSystematic(modifier.to_string()));
        };

        self.factors
            .iter()
            .position(|f| f.name == name)
            .map(|idx| (idx, shift))
            .ok_or_else(|| AnalysisError::UnknownSystematic(modifier.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Weights {
        let mut w = Weights::new(2);
        w.add("lumiWeight", vec![2.0, 2.0], None, None).unwrap();
        w.add("puWeight", vec![0.5, 4.0], Some(vec![1.0, 8.0]), Some(vec![0.25, 2.0]))
            .unwrap();
        w.add_shift_only("ISR", vec![1.5, 0.5], vec![0.75, 1.25]).unwrap();
        w
    }

    #[test]
    fn nominal_is_product_of_factors() {
        assert_eq!(engine().weight(None).unwrap(), vec![1.0, 8.0]);
    }

    #[test]
    fn shift_replaces_one_factor() {
        let w = engine();
        assert_eq!(w.weight(Some("puWeightUp")).unwrap(), vec![2.0, 16.0]);
        assert_eq!(w.weight(Some("puWeightDown")).unwrap(), vec![0.5, 4.0]);
        assert_eq!(w.weight(Some("ISRUp")).unwrap(), vec![1.5, 4.0]);
        assert_eq!(w.weight(Some("ISRDown")).unwrap(), vec![0.75, 10.0]);
    }

    #[test]
    fn unknown_or_unshiftable_names_fail() {
        let w = engine();
        assert!(w.weight(Some("PDFUp")).is_err());
        assert!(w.weight(Some("puWeight")).is_err());
        assert!(w.weight(Some("lumiWeightUp")).is_err());
    }

    #[test]
    fn neutral_factor_changes_nothing() {
        let mut w = engine();
        w.add_neutral("Q2Scale").unwrap();
        assert_eq!(w.weight(Some("Q2ScaleUp")).unwrap(), w.weight(None).unwrap());
    }

    #[test]
    fn wrong_length_and_duplicates_rejected() {
        let mut w = Weights::new(3);
        assert!(w.add("x", vec![1.0], None, None).is_err());
        w.add_neutral("x").unwrap();
        assert!(w.add_neutral("x").is_err());
    }
}
