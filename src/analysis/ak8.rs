//! Efficiency of the large-radius jet triggers in single-muon events
//!
//! The probe is the leading AK8 jet which is not matched to a muon. Its
//! transverse momentum, soft-drop mass and pseudorapidity are histogrammed
//! inclusively and in the plateau regions of the mass and momentum legs of the
//! triggers.

use crate::{
    analysis::{decisions, Named, Outcome, ReferenceTrigger, TriggerAnalysis, TriggerHists},
    config::Configuration,
    evcut::MuonCut,
    event::{EventRecord, FatJet},
    histogram::{Binning, Hist1D, Hist2D, HistogramSet},
    kinematics::delta_r_between,
    numeric::Real,
};

/// A probe jet variable
#[derive(Clone, Copy, Debug)]
pub struct Variable {
    /// Name used in histogram names
    pub name: &'static str,

    /// Axis title
    pub title: &'static str,

    /// Bin edges
    pub edges: &'static [Real],

    /// How the variable is computed
    pub value: fn(&FatJet) -> Real,
}
//
impl Variable {
    /// Binning of this variable
    pub fn binning(&self) -> Binning {
        Binning::variable(self.edges)
    }
}

const PT_EDGES: [Real; 16] = [
    200., 250., 300., 350., 400., 425., 450., 475., 500., 550., 600., 650., 700., 800., 900., 1000.,
];

const MSD_EDGES: [Real; 20] = [
    0., 10., 20., 30., 35., 40., 50., 60., 70., 80., 90., 100., 125., 150., 175., 200., 225., 250.,
    300., 400.,
];

const ETA_EDGES: [Real; 25] = [
    -2.4, -2.2, -2.0, -1.8, -1.6, -1.4, -1.2, -1.0, -0.8, -0.6, -0.4, -0.2, 0.0, 0.2, 0.4, 0.6, 0.8,
    1.0, 1.2, 1.4, 1.6, 1.8, 2.0, 2.2, 2.4,
];

/// Probe jet variables, in histogram booking order
pub const VARIABLES: [Variable; 3] = [
    Variable {
        name: "pt",
        title: "AK8 jet pT [GeV]",
        edges: &PT_EDGES,
        value: |jet| jet.pt.into(),
    },
    Variable {
        name: "mSD",
        title: "AK8 jet mSD [GeV]",
        edges: &MSD_EDGES,
        value: |jet| jet.msoftdrop.into(),
    },
    Variable {
        name: "eta",
        title: "AK8 jet eta",
        edges: &ETA_EDGES,
        value: |jet| jet.eta.into(),
    },
];

/// Soft-drop mass above which the mass leg of the triggers is efficient (GeV)
pub const MSD_PLATEAU: Real = 50.;

/// Transverse momentum above which the jet leg of the triggers is efficient (GeV)
pub const PT_PLATEAU: Real = 480.;

/// Phase space regions with their own set of histograms
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    /// No additional requirement
    Inclusive,
    /// Soft-drop mass on the plateau
    PlateauMsd,
    /// Transverse momentum on the plateau
    PlateauPt,
    /// Both on the plateau
    PlateauMsdPt,
}
//
impl Region {
    /// Every region
    pub const ALL: [Self; 4] = [
        Self::Inclusive,
        Self::PlateauMsd,
        Self::PlateauPt,
        Self::PlateauMsdPt,
    ];

    /// Suffix of the histogram names
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Inclusive => "",
            Self::PlateauMsd => "_plateauMSD",
            Self::PlateauPt => "_plateauPt",
            Self::PlateauMsdPt => "_plateauMSDPt",
        }
    }

    /// Truth that the probe jet lies in this region
    pub fn contains(self, jet: &FatJet) -> bool {
        let msd_ok = Real::from(jet.msoftdrop) > MSD_PLATEAU;
        let pt_ok = Real::from(jet.pt) > PT_PLATEAU;
        match self {
            Self::Inclusive => true,
            Self::PlateauMsd => msd_ok,
            Self::PlateauPt => pt_ok,
            Self::PlateauMsdPt => msd_ok && pt_ok,
        }
    }
}

/// Name of a probe jet histogram, given the variable, what the numerator
/// requires (empty for denominators) and the region
pub fn hist_name(var: &str, requirement: &str, region: Region) -> String {
    format!("h_AK8_{var}{requirement}{}", region.suffix())
}

/// Name of the muon-jet separation histogram
pub const DR_AK8_MU: &str = "h_dR_AK8_mu";

/// Pick the leading non-overlapping jet, first one on ties
fn leading_jet<'ev>(jets: impl Iterator<Item = &'ev FatJet>) -> Option<&'ev FatJet> {
    jets.reduce(|best, jet| if jet.pt > best.pt { jet } else { best })
}

/// AK8 trigger efficiency analysis
#[derive(Clone, Debug, PartialEq)]
pub struct Ak8Analysis {
    /// Reference trigger decision counter
    reference: ReferenceTrigger,

    /// Signal paths
    signal_paths: Vec<String>,

    /// Separation between muon-matched jets and their muon
    dr_jet_muon: Named<Hist1D>,

    /// Probe jet histograms, indexed by region then by variable
    probes: Vec<Vec<TriggerHists>>,

    /// Soft-drop mass vs transverse momentum, all selected events
    msd_vs_pt: Hist2D,

    /// Soft-drop mass vs transverse momentum, events passing the OR
    msd_vs_pt_pass: Hist2D,
}
//
impl TriggerAnalysis for Ak8Analysis {
    fn new(config: &Configuration) -> Self {
        let probes = Region::ALL
            .into_iter()
            .map(|region| {
                VARIABLES
                    .iter()
                    .map(|var| {
                        TriggerHists::new(
                            hist_name(var.name, "", region),
                            hist_name(var.name, "_passTrgOR", region),
                            config
                                .signal_paths
                                .iter()
                                .map(|path| hist_name(var.name, &format!("_pass_HLT_{path}"), region)),
                            var.title,
                            &var.binning(),
                        )
                    })
                    .collect()
            })
            .collect();
        let [pt, msd, _] = &VARIABLES;
        let msd_vs_pt = Hist2D::new(pt.title, pt.binning(), msd.title, msd.binning());
        Self {
            reference: ReferenceTrigger::new(&config.reference_paths),
            signal_paths: config.signal_paths.clone(),
            dr_jet_muon: Named::new_1d(DR_AK8_MU, "dR(AK8, mu)", &Binning::uniform(50, 0., 5.)),
            probes,
            msd_vs_pt_pass: msd_vs_pt.clone(),
            msd_vs_pt,
        }
    }

    fn analyze(&mut self, record: &EventRecord) -> Outcome {
        // Check if event passes the reference trigger(s)
        let Some(event) = self.reference.check(record) else {
            return Outcome::FailedReference;
        };

        // At least one global muon
        if MuonCut::LOOSE_GLOBAL.select(&event.muons).is_empty() {
            return Outcome::Rejected;
        }

        // Discard the jets which contain a muon, recording how close it was
        let mut free_jets = Vec::with_capacity(event.fat_jets.len());
        for jet in &event.fat_jets {
            if jet.muon_idx_3sj == -1 {
                free_jets.push(jet);
                continue;
            }
            if let Some(muon) = jet.matched_muon().and_then(|idx| event.muons.get(idx)) {
                self.dr_jet_muon.hist.fill(delta_r_between(jet, muon).into());
            }
        }
        let Some(probe) = leading_jet(free_jets.into_iter()) else {
            return Outcome::Rejected;
        };

        // Fill every region which the probe belongs to
        let fired = decisions(event, &self.signal_paths);
        let any_fired = fired.contains(&true);
        for (region, hists) in Region::ALL.into_iter().zip(&mut self.probes) {
            if !region.contains(probe) {
                continue;
            }
            for (var, hist) in VARIABLES.iter().zip(hists) {
                hist.fill((var.value)(probe), &fired);
            }
        }
        let (pt, msd) = (Real::from(probe.pt), Real::from(probe.msoftdrop));
        self.msd_vs_pt.fill(pt, msd);
        if any_fired {
            self.msd_vs_pt_pass.fill(pt, msd);
        }
        Outcome::Selected
    }

    fn merge(&mut self, other: Self) {
        self.reference.merge(&other.reference);
        self.dr_jet_muon.merge(&other.dr_jet_muon);
        for (mine, theirs) in self.probes.iter_mut().flatten().zip(other.probes.iter().flatten()) {
            mine.merge(theirs);
        }
        self.msd_vs_pt.merge(&other.msd_vs_pt);
        self.msd_vs_pt_pass.merge(&other.msd_vs_pt_pass);
    }

    fn into_histograms(self) -> HistogramSet {
        let mut set = HistogramSet::new();
        self.reference.store(&mut set);
        self.dr_jet_muon.store(&mut set);
        for hists in self.probes.into_iter().flatten() {
            hists.store(&mut set);
        }
        set.insert_2d("h_AK8_mSD_vs_pt", self.msd_vs_pt);
        set.insert_2d("h_AK8_mSD_vs_pt_passTrgOR", self.msd_vs_pt_pass);
        set
    }
}
