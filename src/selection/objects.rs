use std::collections::BTreeMap;

use crate::event::collections::{
    Electron, Electrons, EventBatch, HasP4, Jet, JetVariant, Jets, Muon, Muons, Photon, Photons,
};
use crate::event::ragged::Ragged;

const EB_EE_GAP: (f64, f64) = (1.4442, 1.566);
const BARREL_EDGE: f64 = 1.479;

/// Two-bit fields of the photon cut-based ID bitmap, valued by bit shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VidCut {
    MinPt = 0,
    ScEta = 2,
    HoverE = 4,
    Sieie = 6,
    ChIso = 8,
    NeuIso = 10,
    PhoIso = 12,
}

impl VidCut {
    pub const ALL: [VidCut; 7] = [
        VidCut::MinPt,
        VidCut::ScEta,
        VidCut::HoverE,
        VidCut::Sieie,
        VidCut::ChIso,
        VidCut::NeuIso,
        VidCut::PhoIso,
    ];

    // field value 2 is medium
    pub fn passes(&self, bitmap: i32) -> bool {
        (bitmap >> (*self as i32)) & 3 >= 2
    }
}

pub fn tight_muon_mask(muons: &Muons) -> Ragged<bool> {
    muons.map(|m| m.pt > 30.0 && m.eta.abs() < 2.4 && m.tight_id && m.rel_iso < 0.15)
}

pub fn loose_muon_mask(muons: &Muons) -> Ragged<bool> {
    let loose = muons.map(|m: &Muon| {
        m.pt > 15.0
            && m.eta.abs() < 2.4
            && m.is_pf
            && (m.is_tracker || m.is_global)
            && m.rel_iso < 0.25
    });
    loose.and(&tight_muon_mask(muons).not())
}

fn outside_gap(eta: f64) -> bool {
    eta.abs() < EB_EE_GAP.0 || eta.abs() > EB_EE_GAP.1
}

// an electron exactly on the barrel edge belongs to neither region
fn passes_impact_parameter(e: &Electron) -> bool {
    let abs_eta = e.eta.abs();
    if abs_eta < BARREL_EDGE {
        e.dxy.abs() < 0.05 && e.dz.abs() < 0.1
    } else if abs_eta > BARREL_EDGE {
        e.dxy.abs() < 0.1 && e.dz.abs() < 0.2
    } else {
        false
    }
}

pub fn tight_electron_mask(electrons: &Electrons) -> Ragged<bool> {
    electrons.map(|e| {
        e.pt > 35.0
            && e.eta.abs() < 2.1
            && outside_gap(e.eta)
            && e.cut_based >= 4
            && passes_impact_parameter(e)
    })
}

pub fn loose_electron_mask(electrons: &Electrons) -> Ragged<bool> {
    let loose = electrons.map(|e| {
        e.pt > 15.0
            && e.eta.abs() < 2.4
            && outside_gap(e.eta)
            && e.cut_based >= 1
            && passes_impact_parameter(e)
    });
    loose.and(&tight_electron_mask(electrons).not())
}

/// Kinematic, pixel and lepton-isolation requirements shared by tight and
/// loose photons.
pub fn photon_base_mask(
    photons: &Photons,
    tight_muons: &Muons,
    tight_electrons: &Electrons,
) -> Ragged<bool> {
    let kinematic = photons.map(|p| {
        p.pt > 20.0
            && p.eta.abs() < EB_EE_GAP.0
            && (p.is_ee || p.is_eb)
            && p.electron_veto
            && !p.pixel_seed
    });
    let away_from_muons =
        photons.all_pairwise(tight_muons, |p, m| p.p4().delta_r(&m.p4()) > 0.4);
    let away_from_electrons = photons
        .min_pairwise(tight_electrons, |p, e| p.p4().delta_r(&e.p4()))
        .map(|dr| dr.is_none_or(|dr| dr > 0.4));

    kinematic.and(&away_from_muons).and(&away_from_electrons)
}

pub fn tight_photon_mask(photons: &Photons, base: &Ragged<bool>) -> Ragged<bool> {
    let id = photons.map(|p: &Photon| VidCut::ALL.iter().all(|cut| cut.passes(p.vid_bitmap)));
    base.and(&id)
}

/// Photons that pass every ID field except charged isolation. Tight photons
/// are removed so the two selections never overlap.
pub fn loose_photon_mask(photons: &Photons, base: &Ragged<bool>) -> Ragged<bool> {
    let id = photons.map(|p: &Photon| {
        VidCut::ALL
            .iter()
            .filter(|cut| **cut != VidCut::ChIso)
            .all(|cut| cut.passes(p.vid_bitmap))
            && VidCut::Sieie.passes(p.vid_bitmap)
    });
    base.and(&id).and(&tight_photon_mask(photons, base).not())
}

/// Jets for one energy variant: identification, lepton and photon cleaning,
/// then pt > 30 on that variant's pt.
pub fn jet_mask(
    jets: &Jets,
    variant: JetVariant,
    tight_muons: &Muons,
    tight_electrons: &Electrons,
    tight_photons: &Photons,
) -> Ragged<bool> {
    let clean = |min_dr: Ragged<Option<f64>>, cone: f64| {
        min_dr.map(|dr| dr.is_none_or(|dr| dr > cone))
    };

    let id = jets.map(|j: &Jet| j.eta.abs() < 2.4 && (j.jet_id & 2) != 0);
    let muon_clean = clean(
        jets.min_pairwise(tight_muons, |j, m| j.p4(variant).delta_r(&m.p4())),
        0.4,
    );
    let electron_clean = clean(
        jets.min_pairwise(tight_electrons, |j, e| j.p4(variant).delta_r(&e.p4())),
        0.4,
    );
    let photon_clean = clean(
        jets.min_pairwise(tight_photons, |j, p| j.p4(variant).delta_r(&p.p4())),
        0.1,
    );
    let pt = jets.map(|j| j.momentum(variant).pt > 30.0);

    id.and(&muon_clean)
        .and(&electron_clean)
        .and(&photon_clean)
        .and(&pt)
}

/// Per-chunk selected objects.
#[derive(Debug, Clone)]
pub struct SelectedObjects {
    pub tight_muons: Muons,
    pub loose_muons: Muons,
    pub tight_electrons: Electrons,
    pub loose_electrons: Electrons,
    pub tight_photons: Photons,
    pub loose_photons: Photons,
    pub jets: BTreeMap<JetVariant, Jets>,
    pub btagged_jets: BTreeMap<JetVariant, Jets>,
}

impl SelectedObjects {
    pub fn select(batch: &EventBatch, btag_working_point: f64) -> Self {
        let tight_muons = batch.muons.select(&tight_muon_mask(&batch.muons));
        let loose_muons = batch.muons.select(&loose_muon_mask(&batch.muons));
        let tight_electrons = batch.electrons.select(&tight_electron_mask(&batch.electrons));
        let loose_electrons = batch.electrons.select(&loose_electron_mask(&batch.electrons));

        let base = photon_base_mask(&batch.photons, &tight_muons, &tight_electrons);
        let tight_photons = batch.photons.select(&tight_photon_mask(&batch.photons, &base));
        let loose_photons = batch.photons.select(&loose_photon_mask(&batch.photons, &base));

        let variants: &[JetVariant] = if batch.is_data {
            &[JetVariant::Nominal]
        } else {
            &JetVariant::ALL
        };

        let mut jets = BTreeMap::new();
        let mut btagged_jets = BTreeMap::new();
        for &variant in variants {
            let mask = jet_mask(
                &batch.jets,
                variant,
                &tight_muons,
                &tight_electrons,
                &tight_photons,
            );
            let selected = batch.jets.select(&mask);
            let tagged = selected.select(&selected.map(|j| j.btag > btag_working_point));
            jets.insert(variant, selected);
            btagged_jets.insert(variant, tagged);
        }

        SelectedObjects {
            tight_muons,
            loose_muons,
            tight_electrons,
            loose_electrons,
            tight_photons,
            loose_photons,
            jets,
            btagged_jets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    // every VID field at value 3
    const ALL_PASS: i32 = 0x3fff;

    fn good_photon() -> Photon {
        Photon {
            pt: 40.0,
            eta: 0.5,
            phi: 1.0,
            is_eb: true,
            electron_veto: true,
            vid_bitmap: ALL_PASS,
            ..Default::default()
        }
    }

    #[test]
    fn vid_fields_decode() {
        assert!(VidCut::ALL.iter().all(|c| c.passes(ALL_PASS)));
        let no_chiso = ALL_PASS & !(3 << 8);
        assert!(!VidCut::ChIso.passes(no_chiso));
        assert!(VidCut::NeuIso.passes(no_chiso));
        // value 1 fails
        assert!(!VidCut::MinPt.passes(1));
        assert!(VidCut::MinPt.passes(2));
    }

    #[test]
    fn tight_and_loose_photons_split_on_charged_isolation() {
        let mut iso_fail = good_photon();
        iso_fail.vid_bitmap = ALL_PASS & !(3 << 8);
        let mut sieie_fail = good_photon();
        sieie_fail.vid_bitmap = ALL_PASS & !(3 << 6);
        let photons = Ragged::from_events(vec![vec![good_photon(), iso_fail, sieie_fail]]);

        let base = photon_base_mask(&photons, &Ragged::empty(1), &Ragged::empty(1));
        assert_eq!(tight_photon_mask(&photons, &base).values(), &[true, false, false]);
        assert_eq!(loose_photon_mask(&photons, &base).values(), &[false, true, false]);
    }

    #[test]
    fn photon_near_tight_muon_is_dropped() {
        let photons = Ragged::from_events(vec![vec![good_photon()]]);
        let near = Muon {
            pt: 35.0,
            eta: 0.6,
            phi: 1.1,
            ..Default::default()
        };
        let muons = Ragged::from_events(vec![vec![near]]);
        let base = photon_base_mask(&photons, &muons, &Ragged::empty(1));
        assert_eq!(base.values(), &[false]);
    }

    #[test]
    fn electron_gap_and_impact_parameter() {
        let tight = Electron {
            pt: 40.0,
            eta: 0.3,
            cut_based: 4,
            dxy: 0.01,
            dz: 0.05,
            ..Default::default()
        };
        let in_gap = Electron { eta: 1.5, ..tight };
        let far_dz = Electron { dz: 0.15, ..tight };
        let endcap_far_dz = Electron { eta: 1.8, dz: 0.15, ..tight };
        let electrons = Ragged::from_events(vec![vec![tight, in_gap, far_dz, endcap_far_dz]]);
        assert_eq!(tight_electron_mask(&electrons).values(), &[true, false, false, true]);
    }

    #[test]
    fn electron_on_barrel_edge_fails_impact_parameter() {
        let barrel = Electron {
            eta: 1.47,
            dxy: 0.01,
            dz: 0.01,
            ..Default::default()
        };
        let edge = Electron { eta: -1.479, ..barrel };
        let endcap = Electron { eta: 1.48, ..barrel };
        assert!(passes_impact_parameter(&barrel));
        assert!(!passes_impact_parameter(&edge));
        assert!(passes_impact_parameter(&endcap));
    }

    #[test]
    fn jet_pt_cut_uses_variant_pt() {
        let jet = Jet {
            pt: 31.0,
            eta: 0.0,
            jet_id: 2,
            jes_down: crate::event::collections::JetMomentum { pt: 29.0, mass: 5.0 },
            ..Default::default()
        };
        let jets = Ragged::from_events(vec![vec![jet]]);
        let none_mu: Muons = Ragged::empty(1);
        let none_e: Electrons = Ragged::empty(1);
        let none_pho: Photons = Ragged::empty(1);
        let nominal = jet_mask(&jets, JetVariant::Nominal, &none_mu, &none_e, &none_pho);
        let down = jet_mask(&jets, JetVariant::JesDown, &none_mu, &none_e, &none_pho);
        assert_eq!(nominal.values(), &[true]);
        assert_eq!(down.values(), &[false]);
    }

    #[test]
    fn jet_requires_id_bit() {
        let jet = Jet {
            pt: 50.0,
            jet_id: 4,
            ..Default::default()
        };
        let jets = Ragged::from_events(vec![vec![jet]]);
        let mask = jet_mask(
            &jets,
            JetVariant::Nominal,
            &Ragged::empty(1),
            &Ragged::empty(1),
            &Ragged::empty(1),
        );
        assert_eq!(mask.values(), &[false]);
    }

    #[test]
    fn tight_never_loose_for_random_objects() {
        let mut rng = SmallRng::seed_from_u64(2016);
        let mut muons = Vec::new();
        let mut electrons = Vec::new();
        let mut photons = Vec::new();
        for _ in 0..2000 {
            muons.push(Muon {
                pt: rng.gen_range(0.0..80.0),
                eta: rng.gen_range(-3.0..3.0),
                tight_id: rng.gen_bool(0.5),
                is_pf: rng.gen_bool(0.8),
                is_tracker: rng.gen_bool(0.5),
                is_global: rng.gen_bool(0.5),
                rel_iso: rng.gen_range(0.0..0.4),
                ..Default::default()
            });
            electrons.push(Electron {
                pt: rng.gen_range(0.0..80.0),
                eta: rng.gen_range(-3.0..3.0),
                cut_based: rng.gen_range(0..5),
                dxy: rng.gen_range(-0.15..0.15),
                dz: rng.gen_range(-0.3..0.3),
                ..Default::default()
            });
            photons.push(Photon {
                pt: rng.gen_range(0.0..80.0),
                eta: rng.gen_range(-2.0..2.0),
                is_eb: rng.gen_bool(0.7),
                electron_veto: rng.gen_bool(0.8),
                pixel_seed: rng.gen_bool(0.2),
                vid_bitmap: rng.gen_range(0..0x4000),
                ..Default::default()
            });
        }
        let muons = Ragged::from_events(vec![muons]);
        let electrons = Ragged::from_events(vec![electrons]);
        let photons = Ragged::from_events(vec![photons]);

        let both = tight_muon_mask(&muons).and(&loose_muon_mask(&muons));
        assert_eq!(both.count_true(), vec![0]);
        let both = tight_electron_mask(&electrons).and(&loose_electron_mask(&electrons));
        assert_eq!(both.count_true(), vec![0]);

        let base = photon_base_mask(&photons, &Ragged::empty(1), &Ragged::empty(1));
        let both = tight_photon_mask(&photons, &base).and(&loose_photon_mask(&photons, &base));
        assert_eq!(both.count_true(), vec![0]);
    }
}
