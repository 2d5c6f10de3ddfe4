use crate::error::{AnalysisError, Result};
use crate::event::collections::JetVariant;
use crate::weights::Weights;

pub const MC_SYSTEMATICS: [&str; 24] = [
    "noweight",
    "nominal",
    "puWeightUp",
    "puWeightDown",
    "muEffWeightUp",
    "muEffWeightDown",
    "eleEffWeightUp",
    "eleEffWeightDown",
    "btagWeight_lightUp",
    "btagWeight_lightDown",
    "btagWeight_heavyUp",
    "btagWeight_heavyDown",
    "ISRUp",
    "ISRDown",
    "FSRUp",
    "FSRDown",
    "PDFUp",
    "PDFDown",
    "Q2ScaleUp",
    "Q2ScaleDown",
    "JERUp",
    "JERDown",
    "JESUp",
    "JESDown",
];

pub const DATA_SYSTEMATICS: [&str; 1] = ["noweight"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightQuery {
    Unit,
    Nominal,
    Shifted(&'static str),
}

/// How one systematic variation is filled: which jets (selection and M3)
/// and which event weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystematicPlan {
    pub name: &'static str,
    pub jets: JetVariant,
    pub weight: WeightQuery,
}

impl SystematicPlan {
    pub fn for_name(name: &str) -> Result<Self> {
        let name = MC_SYSTEMATICS
            .iter()
            .copied()
            .find(|s| *s == name)
            .ok_or_else(|| AnalysisError::UnknownSystematic(name.to_string()))?;

        let (jets, weight) = match name {
            "noweight" => (JetVariant::Nominal, WeightQuery::Unit),
            "nominal" => (JetVariant::Nominal, WeightQuery::Nominal),
            "JESUp" => (JetVariant::JesUp, WeightQuery::Nominal),
            "JESDown" => (JetVariant::JesDown, WeightQuery::Nominal),
            "JERUp" => (JetVariant::JerUp, WeightQuery::Nominal),
            "JERDown" => (JetVariant::JerDown, WeightQuery::Nominal),
            shifted => (JetVariant::Nominal, WeightQuery::Shifted(shifted)),
        };
        Ok(SystematicPlan { name, jets, weight })
    }

    /// Plans for every systematic filled for this kind of dataset.
    pub fn all(is_data: bool) -> Result<Vec<SystematicPlan>> {
        let names: &[&str] = if is_data {
            &DATA_SYSTEMATICS
        } else {
            &MC_SYSTEMATICS
        };
        names.iter().map(|n| SystematicPlan::for_name(n)).collect()
    }

    pub fn jet_selection(&self) -> String {
        format!("jetSel{}", self.jets.suffix())
    }

    pub fn jet_selection_3j0t(&self) -> String {
        format!("jetSel{}_3j0t", self.jets.suffix())
    }

    pub fn event_weight(&self, weights: &Weights) -> Result<Vec<f64>> {
        match self.weight {
            WeightQuery::Unit => Ok(vec![1.0; weights.n_events()]),
            WeightQuery::Nominal => weights.weight(None),
            WeightQuery::Shifted(name) => weights.weight(Some(name)),
        }
    }
}
