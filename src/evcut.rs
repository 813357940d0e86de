//! Mechanism to apply offline quality cuts to reconstructed objects

use crate::{
    event::{Jet, Muon},
    kinematics::{delta_r_between, Direction},
    numeric::Float,
};

/// Muon identification working point
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MuonId {
    /// Tight identification
    Tight,
    /// Loose identification
    Loose,
}

/// Quality cuts on reconstructed muons
#[derive(Clone, Debug, PartialEq)]
pub struct MuonCut {
    /// Cut on minimum transverse momentum (GeV)
    pub min_pt: Float,

    /// Cut on maximum absolute pseudorapidity
    pub max_abs_eta: Float,

    /// Cut on maximum longitudinal impact parameter (cm)
    pub max_abs_dz: Float,

    /// Cut on maximum transverse impact parameter (cm)
    pub max_abs_dxy: Float,

    /// Required identification working point
    pub id: MuonId,

    /// Whether the muon must be reconstructed as a global muon
    pub require_global: bool,

    /// Cut on maximum relative isolation, if any
    pub max_rel_iso: Option<Float>,
}
//
impl MuonCut {
    /// Isolated, tightly identified muon used by the single-muon selections
    pub const TIGHT_ISOLATED: Self = Self {
        min_pt: 26.,
        max_abs_eta: 2.5,
        max_abs_dz: 0.10,
        max_abs_dxy: 0.05,
        id: MuonId::Tight,
        require_global: false,
        max_rel_iso: Some(0.15),
    };

    /// Loosely identified global muon used to tag the AK8 selection
    pub const LOOSE_GLOBAL: Self = Self {
        min_pt: 26.,
        max_abs_eta: 2.5,
        max_abs_dz: 0.10,
        max_abs_dxy: 0.05,
        id: MuonId::Loose,
        require_global: true,
        max_rel_iso: None,
    };

    /// Decide whether a muon passes the cuts. Missing quality information
    /// fails the corresponding cut.
    pub fn keep(&self, mu: &Muon) -> bool {
        if self.require_global && mu.is_global != Some(true) {
            return false;
        }
        if !(mu.pt >= self.min_pt && mu.eta.abs() <= self.max_abs_eta) {
            return false;
        }

        // Impact parameters w.r.t. the primary vertex
        match (mu.dz, mu.dxy) {
            (Some(dz), Some(dxy)) if dz.abs() <= self.max_abs_dz && dxy.abs() <= self.max_abs_dxy => {}
            _ => return false,
        }

        let id = match self.id {
            MuonId::Tight => mu.tight_id,
            MuonId::Loose => mu.loose_id,
        };
        if id != Some(true) {
            return false;
        }

        match self.max_rel_iso {
            Some(max_iso) => mu.pf_rel_iso03_all.is_some_and(|iso| iso <= max_iso),
            None => true,
        }
    }

    /// Select the muons which pass the cuts, preserving collection order
    pub fn select<'ev>(&self, muons: &'ev [Muon]) -> Vec<&'ev Muon> {
        muons.iter().filter(|mu| self.keep(mu)).collect()
    }
}

/// Quality cuts on AK4 jets entering hadronic energy sums
#[derive(Clone, Debug, PartialEq)]
pub struct JetCut {
    /// Cut on minimum transverse momentum (GeV)
    pub min_pt: Float,

    /// Cut on maximum absolute pseudorapidity (exclusive)
    pub max_abs_eta: Float,

    /// Bits of the jet identification mask, at least one of which must be set
    pub id_mask: u32,
}
//
impl JetCut {
    /// Jets with tight lepton veto identification within the tracker
    pub const HT_JETS: Self = Self {
        min_pt: 30.,
        max_abs_eta: 2.5,
        id_mask: 0b100,
    };

    /// Decide whether a jet passes the cuts
    pub fn keep(&self, jet: &Jet) -> bool {
        jet.pt >= self.min_pt
            && jet.eta.abs() < self.max_abs_eta
            && jet.jet_id.is_some_and(|id| id & self.id_mask != 0)
    }
}

/// Angular-separation based removal of objects overlapping a reference one
#[derive(Clone, Debug, PartialEq)]
pub struct OverlapRemoval {
    /// Objects closer than this in (eta, phi) are considered overlapping
    pub min_delta_r: Float,
}
//
impl OverlapRemoval {
    /// Cone size used between AK4 jets and the selected lepton
    pub const JET_LEPTON: Self = Self { min_delta_r: 0.4 };

    /// Truth that two objects overlap
    pub fn overlaps(&self, a: &impl Direction, b: &impl Direction) -> bool {
        delta_r_between(a, b) < self.min_delta_r
    }
}
