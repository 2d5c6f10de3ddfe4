//! Per-chunk event processing: object selection, event selection, weights and
//! histogram filling for every systematic variation.

use std::sync::Arc;
use std::time::Instant;

use crate::categorizer::{PhotonCategory, categorize};
use crate::config::ProcessorSettings;
use crate::error::Result;
use crate::event::collections::{EventBatch, HasP4, JetVariant};
use crate::event::ragged::Ragged;
use crate::histoer::accumulator::Accumulator;
use crate::histoer::axis::BinAxis;
use crate::histoer::histogram::Histogram;
use crate::kinematics::{leading_pair_mass, m3_per_event};
use crate::selection::objects::SelectedObjects;
use crate::selection::overlap::overlap_pass;
use crate::selection::registry::SelectionRegistry;
use crate::systematics::SystematicPlan;
use crate::weights::Weights;
use crate::weights::btag::btag_weights;
use crate::weights::calibration::{Calibration, LeptonSf, Variations};
use crate::weights::generator::GeneratorFactors;

pub const PHOTON_PT: &str = "photon_pt";
pub const PHOTON_ETA: &str = "photon_eta";
pub const PHOTON_CHISO: &str = "photon_chIso";
pub const PHOTON_LEPTON_MASS: &str = "photon_lepton_mass";
pub const PHOTON_LEPTON_MASS_3J0T: &str = "photon_lepton_mass_3j0t";
pub const M3: &str = "M3";
pub const M3_PRESEL: &str = "M3Presel";

const CATEGORICAL: [&str; 3] = ["dataset", "lepFlavor", "systematic"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lepton {
    Electron,
    Muon,
}

impl Lepton {
    const ALL: [Lepton; 2] = [Lepton::Electron, Lepton::Muon];

    fn flavor(&self) -> &'static str {
        match self {
            Lepton::Electron => "electron",
            Lepton::Muon => "muon",
        }
    }

    fn selection(&self) -> &'static str {
        match self {
            Lepton::Electron => "eleSel",
            Lepton::Muon => "muSel",
        }
    }
}

fn category_axis() -> Result<BinAxis> {
    BinAxis::variable("category", vec![1.0, 2.0, 3.0, 4.0, 5.0])
}

/// Empty histograms with the analysis binning.
pub fn book_histograms() -> Result<Vec<Histogram>> {
    let with_category = |name: &str, value: BinAxis| -> Result<Histogram> {
        Ok(Histogram::new(name, &CATEGORICAL, vec![value, category_axis()?]))
    };

    Ok(vec![
        with_category(PHOTON_PT, BinAxis::regular("pt", 200, (0.0, 1000.0))?)?,
        with_category(PHOTON_ETA, BinAxis::regular("eta", 300, (-1.5, 1.5))?)?,
        with_category(PHOTON_CHISO, BinAxis::regular("chIso", 402, (-0.1, 20.0))?)?,
        with_category(PHOTON_LEPTON_MASS, BinAxis::regular("mass", 400, (0.0, 400.0))?)?,
        with_category(PHOTON_LEPTON_MASS_3J0T, BinAxis::regular("mass", 400, (0.0, 400.0))?)?,
        with_category(M3, BinAxis::regular("M3", 200, (0.0, 1000.0))?)?,
        Histogram::new(
            M3_PRESEL,
            &CATEGORICAL,
            vec![BinAxis::regular("M3", 200, (0.0, 1000.0))?],
        ),
    ])
}

/// Fill `hist` with the events passing `mask` that have a value (and a
/// category, when a category axis is present).
fn fill_selected(
    hist: &mut Histogram,
    labels: &[&str],
    mask: &[bool],
    values: &[Option<f64>],
    categories: Option<&[Option<PhotonCategory>]>,
    weights: &[f64],
) -> Result<()> {
    let mut value_column = Vec::new();
    let mut category_column = Vec::new();
    let mut weight_column = Vec::new();

    for i in 0..mask.len() {
        if !mask[i] {
            continue;
        }
        let Some(value) = values[i] else {
            continue;
        };
        if let Some(categories) = categories {
            let Some(category) = categories[i] else {
                continue;
            };
            category_column.push(category.value());
        }
        value_column.push(value);
        weight_column.push(weights[i]);
    }

    if categories.is_some() {
        hist.fill_columns(labels, &[&value_column, &category_column], &weight_column)
    } else {
        hist.fill_columns(labels, &[&value_column], &weight_column)
    }
}

fn split_variations(per_object: &Ragged<Variations>) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    (
        per_object.map(|v| v.nominal).prod(),
        per_object.map(|v| v.up).prod(),
        per_object.map(|v| v.down).prod(),
    )
}

pub struct TTGammaProcessor {
    settings: ProcessorSettings,
    calibration: Arc<dyn Calibration>,
}

impl TTGammaProcessor {
    pub fn new(settings: ProcessorSettings, calibration: Arc<dyn Calibration>) -> Self {
        Self {
            settings,
            calibration,
        }
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// An accumulator holding every analysis histogram, all empty.
    pub fn accumulator(&self) -> Result<Accumulator> {
        Ok(Accumulator::with_histograms(book_histograms()?))
    }

    pub fn process(&self, batch: &EventBatch) -> Result<Accumulator> {
        let start = Instant::now();
        batch.validate()?;

        let dataset = self.settings.short_dataset(&batch.dataset).into_owned();
        log::debug!(
            "Processing {} events of '{}' (data: {})",
            batch.n_events,
            batch.dataset,
            batch.is_data
        );

        let particles = batch.generator.as_ref().map(|g| &g.particles);
        let objects = SelectedObjects::select(batch, self.settings.btag_working_point);

        let leading_photon = objects.tight_photons.first();
        let leading_loose_photon = objects.loose_photons.first();
        let category = categorize(&leading_photon, particles)?;
        let category_loose = categorize(&leading_loose_photon, particles)?;

        let photon_p4: Vec<_> = leading_photon.iter().map(|p| p.map(|p| p.p4())).collect();
        let electron_p4: Vec<_> = objects
            .tight_electrons
            .first()
            .iter()
            .map(|e| e.map(|e| e.p4()))
            .collect();
        let muon_p4: Vec<_> = objects
            .tight_muons
            .first()
            .iter()
            .map(|m| m.map(|m| m.p4()))
            .collect();
        let egamma_mass = leading_pair_mass(&electron_p4, &photon_p4);
        let mugamma_mass = leading_pair_mass(&muon_p4, &photon_p4);

        let photon_pt: Vec<Option<f64>> = leading_photon.iter().map(|p| p.map(|p| p.pt)).collect();
        let photon_eta: Vec<Option<f64>> =
            leading_photon.iter().map(|p| p.map(|p| p.eta)).collect();
        let photon_chiso: Vec<Option<f64>> = leading_loose_photon
            .iter()
            .map(|p| p.map(|p| p.charged_isolation()))
            .collect();

        let selections = self.register_selections(batch, &dataset, &objects)?;
        let weights = if batch.is_data {
            Weights::new(batch.n_events)
        } else {
            self.build_weights(batch, &dataset, &objects)?
        };

        let mut output = self.accumulator()?;
        for plan in SystematicPlan::all(batch.is_data)? {
            let event_weight = plan.event_weight(&weights)?;
            let jet_selection = plan.jet_selection();
            let m3 = match objects.jets.get(&plan.jets) {
                Some(jets) => m3_per_event(jets, plan.jets),
                None => vec![None; batch.n_events],
            };

            for lepton in Lepton::ALL {
                let labels = [dataset.as_str(), lepton.flavor(), plan.name];
                let lep = lepton.selection();
                let one_photon = selections.all(&[lep, jet_selection.as_str(), "onePho"])?;
                let loose_photon = selections.all(&[lep, jet_selection.as_str(), "loosePho"])?;
                let zero_photon = selections.all(&[lep, jet_selection.as_str(), "zeroPho"])?;

                for (name, values) in [(PHOTON_PT, &photon_pt), (PHOTON_ETA, &photon_eta)] {
                    if let Some(hist) = output.get_mut(name) {
                        fill_selected(
                            hist,
                            &labels,
                            &one_photon,
                            values,
                            Some(category.as_slice()),
                            &event_weight,
                        )?;
                    }
                }
                if let Some(hist) = output.get_mut(PHOTON_CHISO) {
                    fill_selected(
                        hist,
                        &labels,
                        &loose_photon,
                        &photon_chiso,
                        Some(category_loose.as_slice()),
                        &event_weight,
                    )?;
                }
                if let Some(hist) = output.get_mut(M3) {
                    // categorised by the tight photon, like the other one-photon fills
                    fill_selected(
                        hist,
                        &labels,
                        &one_photon,
                        &m3,
                        Some(category.as_slice()),
                        &event_weight,
                    )?;
                }
                if let Some(hist) = output.get_mut(M3_PRESEL) {
                    fill_selected(hist, &labels, &zero_photon, &m3, None, &event_weight)?;
                }
            }

            let jet_selection_3j0t = plan.jet_selection_3j0t();
            let masses = [(Lepton::Electron, &egamma_mass), (Lepton::Muon, &mugamma_mass)];
            for (lepton, mass) in masses {
                let labels = [dataset.as_str(), lepton.flavor(), plan.name];
                let signal =
                    selections.all(&[lepton.selection(), jet_selection.as_str(), "onePho"])?;
                let control =
                    selections.all(&[lepton.selection(), jet_selection_3j0t.as_str(), "onePho"])?;

                let masks = [(PHOTON_LEPTON_MASS, &signal), (PHOTON_LEPTON_MASS_3J0T, &control)];
                for (name, mask) in masks {
                    if let Some(hist) = output.get_mut(name) {
                        fill_selected(
                            hist,
                            &labels,
                            mask,
                            mass,
                            Some(category.as_slice()),
                            &event_weight,
                        )?;
                    }
                }
            }
        }

        output.event_count = batch.n_events as u64;
        log::info!(
            "Processed {} events of '{}' in {:?}",
            batch.n_events,
            batch.dataset,
            start.elapsed()
        );
        Ok(output)
    }

    fn register_selections(
        &self,
        batch: &EventBatch,
        dataset: &str,
        objects: &SelectedObjects,
    ) -> Result<SelectionRegistry> {
        let n = batch.n_events;
        let overlap = overlap_pass(
            dataset,
            batch.is_data,
            batch.generator.as_ref().map(|g| &g.particles),
            n,
        )?;

        let n_tight_mu = objects.tight_muons.counts();
        let n_loose_mu = objects.loose_muons.counts();
        let n_tight_e = objects.tight_electrons.counts();
        let n_loose_e = objects.loose_electrons.counts();
        let triggers = &batch.triggers;

        let mut registry = SelectionRegistry::new(n);
        registry.add(
            "muSel",
            (0..n)
                .map(|i| {
                    (triggers.iso_mu24[i] || triggers.iso_tk_mu24[i])
                        && overlap[i]
                        && n_tight_mu[i] == 1
                        && n_tight_e[i] == 0
                        && n_loose_mu[i] == 0
                        && n_loose_e[i] == 0
                })
                .collect(),
        )?;
        registry.add(
            "eleSel",
            (0..n)
                .map(|i| {
                    triggers.ele27_wptight_gsf[i]
                        && overlap[i]
                        && n_tight_e[i] == 1
                        && n_tight_mu[i] == 0
                        && n_loose_mu[i] == 0
                        && n_loose_e[i] == 0
                })
                .collect(),
        )?;

        for (variant, jets) in &objects.jets {
            let n_jets = jets.counts();
            let n_btag = objects
                .btagged_jets
                .get(variant)
                .map(|b| b.counts())
                .unwrap_or_else(|| vec![0; n]);
            let suffix = variant.suffix();

            registry.add(
                &format!("jetSel{suffix}"),
                (0..n)
                    .map(|i| n_jets[i] >= self.settings.min_jets && n_btag[i] >= 1)
                    .collect(),
            )?;
            registry.add(
                &format!("jetSel{suffix}_3j0t"),
                (0..n).map(|i| n_jets[i] >= 3 && n_btag[i] == 0).collect(),
            )?;
        }

        let n_photons = objects.tight_photons.counts();
        let n_loose_photons = objects.loose_photons.counts();
        registry.add("zeroPho", n_photons.iter().map(|&c| c == 0).collect())?;
        registry.add("onePho", n_photons.iter().map(|&c| c == 1).collect())?;
        registry.add("loosePho", n_loose_photons.iter().map(|&c| c == 1).collect())?;

        Ok(registry)
    }

    fn build_weights(
        &self,
        batch: &EventBatch,
        dataset: &str,
        objects: &SelectedObjects,
    ) -> Result<Weights> {
        let n = batch.n_events;
        let calibration = self.calibration.as_ref();
        let mut weights = Weights::new(n);

        let lumi = calibration.cross_section(dataset)? * calibration.luminosity(self.settings.year)?
            / calibration.mc_event_yield(&batch.dataset)?;
        weights.add("lumiWeight", vec![lumi; n], None, None)?;

        if let Some(generator) = &batch.generator {
            let pileup = generator
                .n_true_interactions
                .iter()
                .map(|&n_true| calibration.pileup_weight(&batch.dataset, n_true))
                .collect::<Result<Vec<Variations>>>()?;
            weights.add(
                "puWeight",
                pileup.iter().map(|v| v.nominal).collect(),
                Some(pileup.iter().map(|v| v.up).collect()),
                Some(pileup.iter().map(|v| v.down).collect()),
            )?;
        } else {
            weights.add_neutral("puWeight")?;
        }

        match objects.jets.get(&JetVariant::Nominal) {
            Some(jets) => {
                let btag = btag_weights(
                    jets,
                    &batch.dataset,
                    self.settings.btag_working_point,
                    calibration,
                )?;
                weights.add("btagWeight", btag.nominal, None, None)?;
                weights.add_shift_only("btagWeight_heavy", btag.heavy_up, btag.heavy_down)?;
                weights.add_shift_only("btagWeight_light", btag.light_up, btag.light_down)?;
            }
            None => {
                weights.add_neutral("btagWeight")?;
                weights.add_neutral("btagWeight_heavy")?;
                weights.add_neutral("btagWeight_light")?;
            }
        }

        let electron_sf = objects.tight_electrons.try_map(|e| -> Result<Variations> {
            let (id, id_err) = calibration.lepton_scale_factor(LeptonSf::ElectronId, e.eta, e.pt)?;
            let (reco, reco_err) =
                calibration.lepton_scale_factor(LeptonSf::ElectronReco, e.eta, e.pt)?;
            Ok(Variations {
                nominal: id * reco,
                up: (id + id_err) * (reco + reco_err),
                down: (id - id_err) * (reco - reco_err),
            })
        })?;
        let (nominal, up, down) = split_variations(&electron_sf);
        weights.add("eleEffWeight", nominal, Some(up), Some(down))?;

        let muon_sf = objects.tight_muons.try_map(|m| -> Result<Variations> {
            let (id, id_err) = calibration.lepton_scale_factor(LeptonSf::MuonId, m.eta, m.pt)?;
            let (iso, iso_err) = calibration.lepton_scale_factor(LeptonSf::MuonIso, m.eta, m.pt)?;
            let (trig, trig_err) =
                calibration.lepton_scale_factor(LeptonSf::MuonTrigger, m.eta.abs(), m.pt)?;
            Ok(Variations {
                nominal: id * iso * trig,
                up: (id + id_err) * (iso + iso_err) * (trig + trig_err),
                down: (id - id_err) * (iso - iso_err) * (trig - trig_err),
            })
        })?;
        let (nominal, up, down) = split_variations(&muon_sf);
        weights.add("muEffWeight", nominal, Some(up), Some(down))?;

        let factors = match &batch.generator {
            Some(generator) => GeneratorFactors::derive(&generator.weights),
            None => GeneratorFactors::default(),
        };
        for (name, shift) in [
            ("ISR", factors.isr),
            ("FSR", factors.fsr),
            ("PDF", factors.pdf),
            ("Q2Scale", factors.q2_scale),
        ] {
            match shift {
                Some(shift) => weights.add_shift_only(name, shift.up, shift.down)?,
                None => weights.add_neutral(name)?,
            }
        }

        Ok(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::collections::{
        Electron, GenInfo, GenParticle, GeneratorWeights, Jet, JetMomentum, Muon, Photon,
        Triggers,
    };
    use crate::weights::calibration::{CalibrationTables, DenseLookup, PileupTable, ValueWithError};
    use std::collections::BTreeMap;

    const DATASET: &str = "TTGamma_SingleLept_2016";
    const SHORT: &str = "TTGamma_SingleLept";

    fn flat2(value: f64) -> DenseLookup {
        DenseLookup::new(vec![vec![-10.0, 10.0], vec![0.0, 1e4]], vec![value]).unwrap()
    }

    fn flat1(value: f64) -> DenseLookup {
        DenseLookup::new(vec![vec![0.0, 100.0]], vec![value]).unwrap()
    }

    fn calibration() -> CalibrationTables {
        let mut tables = CalibrationTables::default();
        tables.pileup.insert(
            DATASET.to_string(),
            PileupTable {
                nominal: flat1(2.0),
                up: flat1(4.0),
                down: flat1(1.0),
            },
        );
        let mut eff = BTreeMap::new();
        for flavour in [0, 4, 5] {
            eff.insert(flavour, flat2(0.5));
        }
        tables.btag_efficiency.insert(DATASET.to_string(), eff);
        for variation in ["central", "up", "down"] {
            for key in [
                format!("1_comb_{variation}_0"),
                format!("1_comb_{variation}_1"),
                format!("1_incl_{variation}_2"),
            ] {
                tables.btag_scale_factors.insert(key, DenseLookup::constant(1.0));
            }
        }
        for kind in [
            LeptonSf::ElectronId,
            LeptonSf::ElectronReco,
            LeptonSf::MuonId,
            LeptonSf::MuonIso,
            LeptonSf::MuonTrigger,
        ] {
            tables.lepton.insert(
                kind,
                ValueWithError {
                    value: flat2(1.0),
                    error: flat2(0.5),
                },
            );
        }
        tables.mc_event_yields.insert(DATASET.to_string(), 4.0);
        tables.cross_sections.insert(SHORT.to_string(), 2.0);
        tables.luminosity.insert(2016, 2.0);
        tables
    }

    fn jet(phi: f64, btag: f64, hadron_flavour: i32) -> Jet {
        Jet {
            pt: 60.0,
            eta: 0.2,
            phi,
            mass: 10.0,
            jet_id: 6,
            btag,
            hadron_flavour,
            ..Default::default()
        }
        .without_variations()
    }

    fn muon_photon_event() -> (Muon, Photon, Vec<Jet>, Vec<GenParticle>) {
        let muon = Muon {
            pt: 50.0,
            eta: 0.1,
            phi: 0.0,
            mass: 0.105,
            charge: -1,
            rel_iso: 0.05,
            tight_id: true,
            is_pf: true,
            is_tracker: true,
            is_global: true,
        };
        let photon = Photon {
            pt: 40.0,
            eta: 0.5,
            phi: 2.0,
            is_eb: true,
            electron_veto: true,
            rel_iso_chg: 0.01,
            vid_bitmap: 0x3fff,
            gen_part_idx: 1,
            ..Default::default()
        };
        let jets = vec![
            jet(-2.5, 0.9, 5),
            jet(1.0, 0.1, 0),
            jet(-1.0, 0.1, 0),
            jet(3.0, 0.1, 0),
        ];
        let gen_particles = vec![
            GenParticle {
                pdg_id: 6,
                mother_idx: -1,
                status: 62,
                pt: 200.0,
                ..Default::default()
            },
            GenParticle {
                pdg_id: 22,
                mother_idx: 0,
                status: 1,
                pt: 40.0,
                eta: 0.5,
                phi: 2.0,
                ..Default::default()
            },
        ];
        (muon, photon, jets, gen_particles)
    }

    fn batch(is_data: bool, electrons: Vec<Electron>) -> EventBatch {
        let (muon, photon, jets, gen_particles) = muon_photon_event();
        EventBatch {
            dataset: if is_data {
                "Data_SingleMu_b_2016".to_string()
            } else {
                DATASET.to_string()
            },
            is_data,
            n_events: 1,
            triggers: Triggers {
                iso_mu24: vec![true],
                iso_tk_mu24: vec![false],
                ele27_wptight_gsf: vec![false],
            },
            muons: Ragged::from_events(vec![vec![muon]]),
            electrons: Ragged::from_events(vec![electrons]),
            jets: Ragged::from_events(vec![jets]),
            photons: Ragged::from_events(vec![vec![photon]]),
            generator: if is_data {
                None
            } else {
                Some(GenInfo {
                    particles: Ragged::from_events(vec![gen_particles]),
                    n_true_interactions: vec![20.0],
                    weights: GeneratorWeights::default(),
                })
            },
        }
    }

    fn processor() -> TTGammaProcessor {
        TTGammaProcessor::new(ProcessorSettings::default(), Arc::new(calibration()))
    }

    #[test]
    fn booked_histograms_have_expected_binning() {
        let acc = processor().accumulator().unwrap();
        assert_eq!(acc.histograms.len(), 7);
        let chiso = acc.get(PHOTON_CHISO).unwrap();
        assert_eq!(chiso.axes[0].bins(), 402);
        assert_eq!(acc.get(M3_PRESEL).unwrap().axes.len(), 1);
    }

    #[test]
    fn single_muon_photon_event() {
        let out = processor().process(&batch(false, vec![])).unwrap();
        assert_eq!(out.event_count, 1);

        // lumi = 2 * 2 / 4 = 1, pileup nominal 2, everything else 1
        let pt = out.get(PHOTON_PT).unwrap();
        assert_eq!(pt.bin_content(&[SHORT, "muon", "nominal"], &[40.0, 1.0]), Some((2.0, 4.0)));
        assert_eq!(pt.total(&[SHORT, "muon", "noweight"]), 1.0);
        assert_eq!(pt.total(&[SHORT, "muon", "puWeightUp"]), 4.0);
        assert_eq!(pt.total(&[SHORT, "muon", "puWeightDown"]), 1.0);
        // lepton SF error 0.5 on each of three factors
        assert_eq!(pt.total(&[SHORT, "muon", "muEffWeightUp"]), 2.0 * 1.5 * 1.5 * 1.5);
        assert_eq!(pt.total(&[SHORT, "muon", "JESUp"]), 2.0);
        assert!(pt.get(&[SHORT, "electron", "nominal"]).is_none());
        assert_eq!(pt.keys().len(), 24);

        let eta = out.get(PHOTON_ETA).unwrap();
        assert_eq!(eta.bin_content(&[SHORT, "muon", "nominal"], &[0.5, 1.0]), Some((2.0, 4.0)));
        assert_eq!(eta.total(&[SHORT, "muon", "noweight"]), 1.0);

        let m3 = out.get(M3).unwrap();
        assert_eq!(m3.total(&[SHORT, "muon", "nominal"]), 2.0);
        assert!(out.get(M3_PRESEL).unwrap().is_empty());

        let mass = out.get(PHOTON_LEPTON_MASS).unwrap();
        assert_eq!(mass.total(&[SHORT, "muon", "nominal"]), 2.0);
        assert!(mass.get(&[SHORT, "electron", "nominal"]).is_none());
        assert!(out.get(PHOTON_LEPTON_MASS_3J0T).unwrap().is_empty());
        // tight photon is never loose
        assert!(out.get(PHOTON_CHISO).unwrap().is_empty());
    }

    #[test]
    fn untagged_event_fills_3j0t_control_region() {
        let mut untagged = batch(false, vec![]);
        untagged.jets = untagged.jets.map(|j| Jet { btag: 0.1, ..*j });
        let out = processor().process(&untagged).unwrap();

        // all efficiencies and scale factors match, so the b-tag weight is 1
        let control = out.get(PHOTON_LEPTON_MASS_3J0T).unwrap();
        assert_eq!(control.total(&[SHORT, "muon", "nominal"]), 2.0);
        assert!(control.get(&[SHORT, "electron", "nominal"]).is_none());
        assert!(out.get(PHOTON_LEPTON_MASS).unwrap().is_empty());
        assert!(out.get(PHOTON_PT).unwrap().is_empty());
        assert!(out.get(M3).unwrap().is_empty());
    }

    #[test]
    fn photonless_event_fills_m3_preselection() {
        let mut no_photon = batch(false, vec![]);
        no_photon.photons = no_photon.photons.map(|p| Photon { vid_bitmap: 0, ..*p });
        let out = processor().process(&no_photon).unwrap();

        let presel = out.get(M3_PRESEL).unwrap();
        assert_eq!(presel.total(&[SHORT, "muon", "nominal"]), 2.0);
        assert_eq!(presel.total(&[SHORT, "muon", "noweight"]), 1.0);
        assert!(out.get(M3).unwrap().is_empty());
        assert!(out.get(PHOTON_PT).unwrap().is_empty());
        // failing every ID field also fails the loose photon
        assert!(out.get(PHOTON_CHISO).unwrap().is_empty());
    }

    #[test]
    fn jes_down_jets_below_threshold_fail_only_that_variation() {
        let mut soft = batch(false, vec![]);
        soft.jets = soft.jets.map(|j| Jet {
            jes_down: JetMomentum {
                pt: 25.0,
                mass: j.mass,
            },
            ..*j
        });
        let out = processor().process(&soft).unwrap();

        let pt = out.get(PHOTON_PT).unwrap();
        assert!(pt.get(&[SHORT, "muon", "JESDown"]).is_none());
        assert_eq!(pt.total(&[SHORT, "muon", "nominal"]), 2.0);
        assert_eq!(pt.total(&[SHORT, "muon", "JESUp"]), 2.0);
        assert_eq!(pt.keys().len(), 23);
        assert!(out.get(M3).unwrap().get(&[SHORT, "muon", "JESDown"]).is_none());
    }

    #[test]
    fn loose_electron_vetoes_muon_channel() {
        let loose = Electron {
            pt: 20.0,
            eta: -1.0,
            phi: -2.0,
            cut_based: 2,
            ..Default::default()
        };
        let out = processor().process(&batch(false, vec![loose])).unwrap();
        assert_eq!(out.event_count, 1);
        assert!(out.histograms.values().all(|h| h.is_empty()));
    }

    #[test]
    fn data_fills_noweight_with_genuine_category() {
        let out = processor().process(&batch(true, vec![])).unwrap();
        let pt = out.get(PHOTON_PT).unwrap();
        assert_eq!(pt.keys(), vec![vec![
            "Data_SingleMu_b".to_string(),
            "muon".to_string(),
            "noweight".to_string(),
        ]]);
        assert_eq!(
            pt.bin_content(&["Data_SingleMu_b", "muon", "noweight"], &[40.0, 1.0]),
            Some((1.0, 1.0))
        );
    }

    #[test]
    fn missing_calibration_fails_the_chunk() {
        let processor = TTGammaProcessor::new(
            ProcessorSettings::default(),
            Arc::new(CalibrationTables::default()),
        );
        assert!(processor.process(&batch(false, vec![])).is_err());
    }

    fn repeat<T: Clone>(r: &Ragged<T>) -> Ragged<T> {
        Ragged::from_events(vec![r.event(0).to_vec(); 3])
    }

    #[test]
    fn chunking_does_not_change_the_result() {
        let processor = processor();
        let single = batch(false, vec![]);

        let mut sequential = Accumulator::default();
        for _ in 0..3 {
            sequential.merge(&processor.process(&single).unwrap()).unwrap();
        }

        let mut triple = single.clone();
        triple.n_events = 3;
        triple.muons = repeat(&single.muons);
        triple.electrons = Ragged::empty(3);
        triple.jets = repeat(&single.jets);
        triple.photons = repeat(&single.photons);
        triple.triggers = Triggers {
            iso_mu24: vec![true; 3],
            iso_tk_mu24: vec![false; 3],
            ele27_wptight_gsf: vec![false; 3],
        };
        if let Some(generator) = triple.generator.as_mut() {
            let particles = generator.particles.event(0).to_vec();
            generator.particles = Ragged::from_events(vec![particles; 3]);
            generator.n_true_interactions = vec![20.0; 3];
        }

        let combined = processor.process(&triple).unwrap();
        assert_eq!(combined, sequential);
    }
}
