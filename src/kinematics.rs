use std::f64::consts::{PI, TAU};
use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::event::collections::{Jet, JetVariant};
use crate::event::ragged::Ragged;

/// Momentum in collider coordinates (GeV, rad).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PtEtaPhiM {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
}

impl PtEtaPhiM {
    pub fn new(pt: f64, eta: f64, phi: f64, mass: f64) -> Self {
        Self { pt, eta, phi, mass }
    }

    pub fn to_cartesian(&self) -> FourMomentum {
        let px = self.pt * self.phi.cos();
        let py = self.pt * self.phi.sin();
        let pz = self.pt * self.eta.sinh();
        let p2 = px * px + py * py + pz * pz;
        FourMomentum {
            px,
            py,
            pz,
            e: (p2 + self.mass * self.mass).sqrt(),
        }
    }

    pub fn delta_r(&self, other: &PtEtaPhiM) -> f64 {
        delta_r(self.eta, self.phi, other.eta, other.phi)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FourMomentum {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e: f64,
}

impl FourMomentum {
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    // negative m^2 from rounding clamps to zero
    pub fn mass(&self) -> f64 {
        let m2 = self.e * self.e - self.px * self.px - self.py * self.py - self.pz * self.pz;
        m2.max(0.0).sqrt()
    }
}

impl Add for FourMomentum {
    type Output = FourMomentum;

    fn add(self, rhs: FourMomentum) -> FourMomentum {
        FourMomentum {
            px: self.px + rhs.px,
            py: self.py + rhs.py,
            pz: self.pz + rhs.pz,
            e: self.e + rhs.e,
        }
    }
}

// wraps into [-pi, pi]
pub fn delta_phi(phi1: f64, phi2: f64) -> f64 {
    let mut dphi = (phi1 - phi2) % TAU;
    if dphi > PI {
        dphi -= TAU;
    } else if dphi < -PI {
        dphi += TAU;
    }
    dphi
}

pub fn delta_r(eta1: f64, phi1: f64, eta2: f64, phi2: f64) -> f64 {
    let deta = eta1 - eta2;
    let dphi = delta_phi(phi1, phi2);
    (deta * deta + dphi * dphi).sqrt()
}

pub fn invariant_mass(a: &PtEtaPhiM, b: &PtEtaPhiM) -> f64 {
    (a.to_cartesian() + b.to_cartesian()).mass()
}

/// Mass of the three-jet combination with the largest vector-sum pt.
/// `None` with fewer than three jets. Ties keep the first combination in
/// (i < j < k) order.
pub fn m3(jets: &[PtEtaPhiM]) -> Option<f64> {
    let vectors: Vec<FourMomentum> = jets.iter().map(|j| j.to_cartesian()).collect();
    let n = vectors.len();

    let mut best: Option<(f64, f64)> = None; // (pt, mass)
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let sum = vectors[i] + vectors[j] + vectors[k];
                let pt = sum.pt();
                match best {
                    Some((best_pt, _)) if pt <= best_pt => {}
                    _ => best = Some((pt, sum.mass())),
                }
            }
        }
    }

    best.map(|(_, mass)| mass)
}

/// Per-event M3 of already selected jets using one energy variant.
pub fn m3_per_event(jets: &Ragged<Jet>, variant: JetVariant) -> Vec<Option<f64>> {
    jets.reduce(|event| {
        let p4s: Vec<PtEtaPhiM> = event.iter().map(|j| j.p4(variant)).collect();
        m3(&p4s)
    })
}

/// Per-event invariant mass of the first object of `a` with the first of `b`.
pub fn leading_pair_mass(a: &[Option<PtEtaPhiM>], b: &[Option<PtEtaPhiM>]) -> Vec<Option<f64>> {
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(invariant_mass(x, y)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_phi_wraps() {
        assert!((delta_phi(3.0, -3.0) - (6.0 - TAU)).abs() < 1e-12);
        assert!((delta_phi(-3.0, 3.0) - (TAU - 6.0)).abs() < 1e-12);
        assert!((delta_phi(0.5, 0.2) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn delta_r_matches_hand_value() {
        let dr = delta_r(0.0, 0.0, 0.3, 0.4);
        assert!((dr - 0.5).abs() < 1e-12);
    }

    #[test]
    fn back_to_back_massless_pair() {
        let a = PtEtaPhiM::new(50.0, 0.0, 0.0, 0.0);
        let b = PtEtaPhiM::new(50.0, 0.0, PI, 0.0);
        assert!((invariant_mass(&a, &b) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn m3_needs_three_jets() {
        let two = [PtEtaPhiM::new(40.0, 0.0, 0.0, 0.0), PtEtaPhiM::new(40.0, 0.0, 1.0, 0.0)];
        assert_eq!(m3(&two), None);
        assert_eq!(m3(&[]), None);
    }

    #[test]
    fn m3_picks_highest_pt_triplet() {
        // three collinear jets give the largest vector sum, the fourth points away
        let jets = [
            PtEtaPhiM::new(100.0, 0.0, 0.0, 10.0),
            PtEtaPhiM::new(80.0, 0.0, 0.1, 10.0),
            PtEtaPhiM::new(60.0, 0.0, PI, 10.0),
            PtEtaPhiM::new(70.0, 0.0, -0.1, 10.0),
        ];
        let expected = (jets[0].to_cartesian() + jets[1].to_cartesian() + jets[3].to_cartesian())
            .mass();
        let got = m3(&jets).unwrap();
        assert!((got - expected).abs() < 1e-9);
    }

    #[test]
    fn m3_with_exactly_three_jets_is_their_mass() {
        let jets = [
            PtEtaPhiM::new(30.0, 0.5, 0.0, 5.0),
            PtEtaPhiM::new(40.0, -0.5, 2.0, 5.0),
            PtEtaPhiM::new(50.0, 1.0, -2.0, 5.0),
        ];
        let expected = (jets[0].to_cartesian() + jets[1].to_cartesian() + jets[2].to_cartesian())
            .mass();
        assert!((m3(&jets).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn pair_mass_missing_side_is_none() {
        let p = Some(PtEtaPhiM::new(10.0, 0.0, 0.0, 0.0));
        let masses = leading_pair_mass(&[p, None], &[None, p]);
        assert_eq!(masses, vec![None, None]);
    }
}
