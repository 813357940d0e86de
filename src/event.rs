//! This module defines the properties and storage of input events
//!
//! Events follow the NanoAOD layout: a handful of physics object collections
//! plus the trigger decisions of the HLT paths and L1 seeds. They are read-only
//! once decoded.

use crate::{
    kinematics::Direction,
    numeric::{Float, Real},
};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Decisions of a set of trigger paths, keyed by path name without prefix
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct TriggerBits(BTreeMap<String, bool>);
//
impl TriggerBits {
    /// Decision of one path, if it was recorded
    pub fn get(&self, path: &str) -> Option<bool> {
        self.0.get(path).copied()
    }

    /// Truth that a path fired. Paths missing from the event did not fire.
    pub fn fired(&self, path: &str) -> bool {
        self.get(path).unwrap_or(false)
    }

    /// Truth that at least one of the paths fired
    pub fn any_fired<S: AsRef<str>>(&self, paths: &[S]) -> bool {
        paths.iter().any(|path| self.fired(path.as_ref()))
    }
}
//
impl<S: Into<String>> FromIterator<(S, bool)> for TriggerBits {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Reconstructed muon
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Muon {
    /// Transverse momentum (GeV)
    pub pt: Float,

    /// Pseudorapidity
    pub eta: Float,

    /// Azimuthal angle
    pub phi: Float,

    /// Longitudinal impact parameter w.r.t. the primary vertex (cm)
    #[serde(default)]
    pub dz: Option<Float>,

    /// Transverse impact parameter w.r.t. the primary vertex (cm)
    #[serde(default)]
    pub dxy: Option<Float>,

    /// Relative particle-flow isolation in a cone of 0.3
    #[serde(default, rename = "pfRelIso03_all")]
    pub pf_rel_iso03_all: Option<Float>,

    /// Tight identification working point
    #[serde(default, rename = "tightId")]
    pub tight_id: Option<bool>,

    /// Loose identification working point
    #[serde(default, rename = "looseId")]
    pub loose_id: Option<bool>,

    /// Reconstructed as a global muon
    #[serde(default, rename = "isGlobal")]
    pub is_global: Option<bool>,
}

/// Small-radius (AK4) jet
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Jet {
    /// Transverse momentum (GeV)
    pub pt: Float,

    /// Pseudorapidity
    pub eta: Float,

    /// Azimuthal angle
    pub phi: Float,

    /// Jet identification bitmask
    #[serde(default, rename = "jetId")]
    pub jet_id: Option<u32>,
}

/// Large-radius (AK8) jet
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FatJet {
    /// Transverse momentum (GeV)
    pub pt: Float,

    /// Pseudorapidity
    pub eta: Float,

    /// Azimuthal angle
    pub phi: Float,

    /// Soft-drop groomed mass (GeV)
    pub msoftdrop: Float,

    /// Index of the muon matched to one of the subjets, -1 if none
    #[serde(default = "no_matched_muon", rename = "muonIdx3SJ")]
    pub muon_idx_3sj: i32,
}
//
impl FatJet {
    /// Index of the matched muon in the event's muon collection
    pub fn matched_muon(&self) -> Option<usize> {
        usize::try_from(self.muon_idx_3sj).ok()
    }
}

fn no_matched_muon() -> i32 {
    -1
}

/// Missing transverse momentum
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Met {
    /// Magnitude (GeV)
    pub pt: Float,

    /// Azimuthal angle
    pub phi: Float,
}

/// Primary vertex summary
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PrimaryVertices {
    /// Number of good reconstructed primary vertices
    #[serde(rename = "npvsGood")]
    pub npvs_good: u32,
}

macro_rules! impl_direction {
    ($($ty:ty),*) => {
        $(
            impl Direction for $ty {
                fn eta(&self) -> Float {
                    self.eta
                }

                fn phi(&self) -> Float {
                    self.phi
                }
            }
        )*
    };
}
impl_direction!(Muon, Jet, FatJet);

/// Physics object whose fields can be looked up by NanoAOD branch suffix
pub trait NanoObject {
    /// Branch suffixes which this object provides
    const FIELDS: &'static [&'static str];

    /// Value of one field, if it is set for this object
    fn field(&self, name: &str) -> Option<Real>;
}

fn flag(b: Option<bool>) -> Option<Real> {
    b.map(|b| if b { 1. } else { 0. })
}

impl NanoObject for Muon {
    const FIELDS: &'static [&'static str] = &[
        "pt",
        "eta",
        "phi",
        "dz",
        "dxy",
        "pfRelIso03_all",
        "tightId",
        "looseId",
        "isGlobal",
    ];

    fn field(&self, name: &str) -> Option<Real> {
        match name {
            "pt" => Some(self.pt.into()),
            "eta" => Some(self.eta.into()),
            "phi" => Some(self.phi.into()),
            "dz" => self.dz.map(Real::from),
            "dxy" => self.dxy.map(Real::from),
            "pfRelIso03_all" => self.pf_rel_iso03_all.map(Real::from),
            "tightId" => flag(self.tight_id),
            "looseId" => flag(self.loose_id),
            "isGlobal" => flag(self.is_global),
            _ => None,
        }
    }
}

impl NanoObject for Jet {
    const FIELDS: &'static [&'static str] = &["pt", "eta", "phi", "jetId"];

    fn field(&self, name: &str) -> Option<Real> {
        match name {
            "pt" => Some(self.pt.into()),
            "eta" => Some(self.eta.into()),
            "phi" => Some(self.phi.into()),
            "jetId" => self.jet_id.map(Real::from),
            _ => None,
        }
    }
}

impl NanoObject for FatJet {
    const FIELDS: &'static [&'static str] = &["pt", "eta", "phi", "msoftdrop", "muonIdx3SJ"];

    fn field(&self, name: &str) -> Option<Real> {
        match name {
            "pt" => Some(self.pt.into()),
            "eta" => Some(self.eta.into()),
            "phi" => Some(self.phi.into()),
            "msoftdrop" => Some(self.msoftdrop.into()),
            "muonIdx3SJ" => Some(self.muon_idx_3sj.into()),
            _ => None,
        }
    }
}

/// Object collections of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionKind {
    /// `Muon_*` branches
    Muon,
    /// `Jet_*` branches
    Jet,
    /// `FatJet_*` branches
    FatJet,
}
//
impl CollectionKind {
    /// Every collection, in the order used for branch name resolution
    pub const ALL: [Self; 3] = [Self::Muon, Self::Jet, Self::FatJet];

    /// NanoAOD branch prefix
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Muon => "Muon",
            Self::Jet => "Jet",
            Self::FatJet => "FatJet",
        }
    }

    /// Field names of the objects in this collection
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Muon => Muon::FIELDS,
            Self::Jet => Jet::FIELDS,
            Self::FatJet => FatJet::FIELDS,
        }
    }
}

/// Storage for one input event
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Event {
    /// Muon collection
    #[serde(rename = "Muon")]
    pub muons: Vec<Muon>,

    /// AK4 jet collection
    #[serde(rename = "Jet")]
    pub jets: Vec<Jet>,

    /// AK8 jet collection
    #[serde(rename = "FatJet")]
    pub fat_jets: Vec<FatJet>,

    /// Missing transverse momentum, if reconstructed
    #[serde(rename = "MET")]
    pub met: Option<Met>,

    /// Primary vertex summary, if present
    #[serde(rename = "PV")]
    pub pv: Option<PrimaryVertices>,

    /// HLT path decisions
    #[serde(rename = "HLT")]
    pub hlt: TriggerBits,

    /// L1 seed decisions
    #[serde(rename = "L1")]
    pub l1: TriggerBits,
}
//
impl Event {
    /// Number of objects in a collection
    pub fn collection_len(&self, kind: CollectionKind) -> usize {
        match kind {
            CollectionKind::Muon => self.muons.len(),
            CollectionKind::Jet => self.jets.len(),
            CollectionKind::FatJet => self.fat_jets.len(),
        }
    }

    /// Field of the index-th object in a collection
    pub fn collection_field(&self, kind: CollectionKind, index: usize, field: &str) -> Option<Real> {
        match kind {
            CollectionKind::Muon => self.muons.get(index)?.field(field),
            CollectionKind::Jet => self.jets.get(index)?.field(field),
            CollectionKind::FatJet => self.fat_jets.get(index)?.field(field),
        }
    }
}

/// What the event reader hands over to the analysis for each input record
#[derive(Clone, Debug, PartialEq)]
pub enum EventRecord {
    /// A successfully decoded event
    Valid(Event),

    /// A record which could not be decoded. It still counts as examined.
    Malformed,
}
//
impl EventRecord {
    /// Access the event, if the record could be decoded
    pub fn event(&self) -> Option<&Event> {
        match self {
            Self::Valid(event) => Some(event),
            Self::Malformed => None,
        }
    }
}

/// Helpers for building synthetic events in tests
#[cfg(test)]
pub mod testing {
    use super::*;

    /// Muon passing every quality cut used by the analyses
    pub fn good_muon(pt: Float, eta: Float, phi: Float) -> Muon {
        Muon {
            pt,
            eta,
            phi,
            dz: Some(0.01),
            dxy: Some(0.005),
            pf_rel_iso03_all: Some(0.02),
            tight_id: Some(true),
            loose_id: Some(true),
            is_global: Some(true),
        }
    }

    /// Jet with tight lepton veto identification
    pub fn good_jet(pt: Float, eta: Float, phi: Float) -> Jet {
        Jet {
            pt,
            eta,
            phi,
            jet_id: Some(6),
        }
    }

    /// AK8 jet without a matched muon
    pub fn fat_jet(pt: Float, msoftdrop: Float, eta: Float, phi: Float) -> FatJet {
        FatJet {
            pt,
            eta,
            phi,
            msoftdrop,
            muon_idx_3sj: -1,
        }
    }

    /// Trigger bits with the listed paths fired
    pub fn fired(paths: &[&str]) -> TriggerBits {
        paths.iter().map(|&p| (p, true)).collect()
    }
}
