use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::histogram::Histogram;
use crate::error::{AnalysisError, Result};

/// Everything a chunk contributes to the final result.
///
/// `Accumulator::default()` is the merge identity. Merging is bin-wise
/// addition of same-named histograms plus the event counter, so any
/// partition of the input merged in any order gives the same result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Accumulator {
    pub histograms: BTreeMap<String, Histogram>,
    pub event_count: u64,
}

impl Accumulator {
    pub fn with_histograms(histograms: Vec<Histogram>) -> Self {
        Self {
            histograms: histograms.into_iter().map(|h| (h.name.clone(), h)).collect(),
            event_count: 0,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Histogram> {
        self.histograms.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Histogram> {
        self.histograms.get_mut(name)
    }

    /// Adds `other` into `self`. Nothing changes when any same-named pair of
    /// histograms is incompatible.
    pub fn merge(&mut self, other: &Accumulator) -> Result<()> {
        let incompatible = other.histograms.iter().find(|(name, hist)| {
            self.histograms
                .get(*name)
                .is_some_and(|existing| !existing.compatible(hist))
        });
        if let Some((name, _)) = incompatible {
            return Err(AnalysisError::Histogram(format!(
                "cannot merge accumulators: '{name}' has different axes"
            )));
        }

        for (name, hist) in &other.histograms {
            match self.histograms.get_mut(name) {
                Some(existing) => existing.merge(hist)?,
                None => {
                    self.histograms.insert(name.clone(), hist.clone());
                }
            }
        }
        self.event_count += other.event_count;
        Ok(())
    }

    /// Consuming merge for fold/reduce chains.
    pub fn merged(mut self, other: Accumulator) -> Result<Accumulator> {
        self.merge(&other)?;
        Ok(self)
    }

    /// Final pass once every chunk has been merged.
    pub fn finalize(self) -> Accumulator {
        log::info!(
            "Accumulated {} events into {} histograms",
            self.event_count,
            self.histograms.len()
        );
        self
    }
}
