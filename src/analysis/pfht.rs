//! Efficiency of the hadronic energy sum trigger in single-muon events

use crate::{
    analysis::{decisions, Named, Outcome, ReferenceTrigger, TriggerAnalysis},
    config::Configuration,
    evcut::{JetCut, MuonCut, OverlapRemoval},
    event::{Event, EventRecord, Muon},
    histogram::{Binning, Hist1D, Hist2D, HistogramSet},
    numeric::Real,
};

/// HT bin edges (GeV)
pub const HT_EDGES: [Real; 22] = [
    200., 220., 240., 260., 280., 300., 350., 400., 450., 500., 600., 700., 800., 900., 1000.,
    1050., 1100., 1200., 1250., 1300., 1400., 1500.,
];

/// Binning of the number of primary vertices
pub fn pv_binning() -> Binning {
    Binning::uniform(50, 0., 100.)
}

/// Axis title of HT histograms
pub const HT_TITLE: &str = "PF HT [GeV]";

/// Axis title of primary vertex histograms
pub const PV_TITLE: &str = "primary vertices";

/// Scalar sum of the transverse momenta of the quality jets which do not
/// overlap the probe muon
pub fn pf_ht(event: &Event, muon: &Muon) -> Real {
    let cut = JetCut::HT_JETS;
    let removal = OverlapRemoval::JET_LEPTON;
    event
        .jets
        .iter()
        .filter(|jet| cut.keep(jet) && !removal.overlaps(*jet, muon))
        .map(|jet| Real::from(jet.pt))
        .sum()
}

/// Histograms of one variable, before and after the L1 and HLT requirements
#[derive(Clone, Debug, PartialEq)]
struct StageHists {
    all: Named<Hist1D>,
    passed_l1: Named<Hist1D>,
    passed_hlt: Named<Hist1D>,
}
//
impl StageHists {
    fn new(var: &str, x_title: &str, binning: &Binning) -> Self {
        Self {
            all: Named::new_1d(format!("h_{var}_all"), x_title, binning),
            passed_l1: Named::new_1d(format!("h_{var}_passedL1"), x_title, binning),
            passed_hlt: Named::new_1d(format!("h_{var}_passedHLT"), x_title, binning),
        }
    }

    fn fill(&mut self, x: Real, l1: bool, hlt: bool) {
        self.all.hist.fill(x);
        if l1 {
            self.passed_l1.hist.fill(x);
        }
        if hlt {
            self.passed_hlt.hist.fill(x);
        }
    }

    fn merge(&mut self, other: &Self) {
        self.all.merge(&other.all);
        self.passed_l1.merge(&other.passed_l1);
        self.passed_hlt.merge(&other.passed_hlt);
    }

    fn store(self, set: &mut HistogramSet) {
        self.all.store(set);
        self.passed_l1.store(set);
        self.passed_hlt.store(set);
    }
}

/// PF HT trigger efficiency analysis
#[derive(Clone, Debug, PartialEq)]
pub struct PfhtAnalysis {
    /// Reference trigger decision counter
    reference: ReferenceTrigger,

    /// Signal paths
    signal_paths: Vec<String>,

    /// L1 seeds of the signal paths
    l1_seeds: Vec<String>,

    /// HT distributions
    pfht: StageHists,

    /// Primary vertex multiplicity distributions
    pv: StageHists,

    /// HT vs primary vertex multiplicity, all selected events
    pfht_vs_pv_all: Hist2D,

    /// HT vs primary vertex multiplicity, events passing a signal path
    pfht_vs_pv_passed: Hist2D,
}
//
impl TriggerAnalysis for PfhtAnalysis {
    fn new(config: &Configuration) -> Self {
        let ht_binning = Binning::variable(&HT_EDGES);
        let pfht_vs_pv = || Hist2D::new(HT_TITLE, ht_binning.clone(), "PV", pv_binning());
        Self {
            reference: ReferenceTrigger::new(&config.reference_paths),
            signal_paths: config.signal_paths.clone(),
            l1_seeds: config.l1_seeds.clone(),
            pfht: StageHists::new("pfht", HT_TITLE, &ht_binning),
            pv: StageHists::new("pv", PV_TITLE, &pv_binning()),
            pfht_vs_pv_all: pfht_vs_pv(),
            pfht_vs_pv_passed: pfht_vs_pv(),
        }
    }

    fn analyze(&mut self, record: &EventRecord) -> Outcome {
        // Check if event passes the reference trigger(s)
        let Some(event) = self.reference.check(record) else {
            return Outcome::FailedReference;
        };

        // Exactly one isolated muon
        let muons = MuonCut::TIGHT_ISOLATED.select(&event.muons);
        let [muon] = muons.as_slice() else {
            return Outcome::Rejected;
        };
        let Some(pv) = &event.pv else {
            return Outcome::Rejected;
        };
        let npvs = Real::from(pv.npvs_good);
        let ht = pf_ht(event, muon);

        // Fill denominators and numerators
        let l1 = self.l1_seeds.iter().any(|seed| event.l1.fired(seed));
        let hlt = decisions(event, &self.signal_paths).contains(&true);
        self.pfht.fill(ht, l1, hlt);
        self.pv.fill(npvs, l1, hlt);
        self.pfht_vs_pv_all.fill(ht, npvs);
        if hlt {
            self.pfht_vs_pv_passed.fill(ht, npvs);
        }
        Outcome::Selected
    }

    fn merge(&mut self, other: Self) {
        self.reference.merge(&other.reference);
        self.pfht.merge(&other.pfht);
        self.pv.merge(&other.pv);
        self.pfht_vs_pv_all.merge(&other.pfht_vs_pv_all);
        self.pfht_vs_pv_passed.merge(&other.pfht_vs_pv_passed);
    }

    fn into_histograms(self) -> HistogramSet {
        let mut set = HistogramSet::new();
        self.reference.store(&mut set);
        self.pfht.store(&mut set);
        self.pv.store(&mut set);
        set.insert_2d("h_pfht_vs_pv_all", self.pfht_vs_pv_all);
        set.insert_2d("h_pfht_vs_pv_passed", self.pfht_vs_pv_passed);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::PASS_REF_TRIG,
        config::Channel,
        event::{testing::*, PrimaryVertices},
    };

    fn analysis() -> PfhtAnalysis {
        PfhtAnalysis::new(&Configuration::for_channel(Channel::Pfht).unwrap())
    }

    fn two_jet_event(hlt: &[&str]) -> Event {
        Event {
            muons: vec![good_muon(30., 0., 0.)],
            jets: vec![good_jet(40., 1.0, 2.0), good_jet(40., -1.0, -2.0)],
            pv: Some(PrimaryVertices { npvs_good: 31 }),
            hlt: fired(hlt),
            ..Event::default()
        }
    }

    #[test]
    fn ht_excludes_bad_and_overlapping_jets() {
        let mut event = two_jet_event(&[]);
        let muon = event.muons[0].clone();
        assert_eq!(pf_ht(&event, &muon), 80.);
        event.jets.push(good_jet(100., 0.1, 0.1));
        event.jets.push(good_jet(25., 0., 1.5));
        event.jets.push(good_jet(100., 2.7, 1.5));
        assert_eq!(pf_ht(&event, &muon), 80.);
    }

    #[test]
    fn fills_denominator_and_numerator() {
        let mut analysis = analysis();
        assert_eq!(
            analysis.analyze(&EventRecord::Valid(two_jet_event(&["IsoMu24", "PFHT1050"]))),
            Outcome::Selected
        );
        assert_eq!(
            analysis.analyze(&EventRecord::Valid(two_jet_event(&["Mu50"]))),
            Outcome::Selected
        );
        let set = analysis.into_histograms();

        // HT of 80 GeV is below the first edge
        let all = set.get_1d("h_pfht_all").unwrap();
        assert_eq!(all.count(0), 2);
        assert_eq!(all.entries(), 2);
        let hlt = set.get_1d("h_pfht_passedHLT").unwrap();
        assert_eq!(hlt.count(0), 1);
        assert_eq!(set.get_1d("h_pfht_passedL1").unwrap().entries(), 0);

        let pv = set.get_1d("h_pv_all").unwrap();
        assert_eq!(pv.count(pv.binning().find_bin(31.)), 2);
        assert_eq!(set.get_2d("h_pfht_vs_pv_passed").unwrap().entries(), 1);
        assert_eq!(set.get_1d(PASS_REF_TRIG).unwrap().count(2), 2);
    }

    #[test]
    fn reference_failure_fills_nothing_else() {
        let mut analysis = analysis();
        let outcome = analysis.analyze(&EventRecord::Valid(two_jet_event(&["PFHT1050"])));
        assert_eq!(outcome, Outcome::FailedReference);
        assert_eq!(analysis.analyze(&EventRecord::Malformed), Outcome::FailedReference);

        let set = analysis.into_histograms();
        for (name, hist) in set.iter() {
            let entries = match hist {
                crate::histogram::Histogram::OneD(h) => h.entries(),
                crate::histogram::Histogram::TwoD(h) => h.entries(),
            };
            if name == PASS_REF_TRIG {
                assert_eq!(entries, 2);
            } else {
                assert_eq!(entries, 0, "{name} should be empty");
            }
        }
    }

    #[test]
    fn requires_exactly_one_muon() {
        let mut analysis = analysis();
        let mut event = two_jet_event(&["IsoMu24"]);
        event.muons.push(good_muon(50., 1., 1.));
        assert_eq!(analysis.analyze(&EventRecord::Valid(event)), Outcome::Rejected);
        let mut event = two_jet_event(&["IsoMu24"]);
        event.muons.clear();
        assert_eq!(analysis.analyze(&EventRecord::Valid(event)), Outcome::Rejected);
        let mut event = two_jet_event(&["IsoMu24"]);
        event.pv = None;
        assert_eq!(analysis.analyze(&EventRecord::Valid(event)), Outcome::Rejected);
    }

    #[test]
    fn huge_angles_are_analyzed() {
        let mut analysis = analysis();
        let mut event = two_jet_event(&["IsoMu24"]);
        event.muons[0].phi = 1e20;
        assert_eq!(analysis.analyze(&EventRecord::Valid(event)), Outcome::Selected);
    }

    #[test]
    fn l1_seed_fills_l1_numerators() {
        let mut analysis = analysis();
        let mut event = two_jet_event(&["IsoMu24"]);
        event.l1 = fired(&["HTT280er"]);
        event.jets.push(good_jet(300., 0., 2.5));
        analysis.analyze(&EventRecord::Valid(event));
        let set = analysis.into_histograms();
        let l1 = set.get_1d("h_pfht_passedL1").unwrap();
        assert_eq!(l1.count(l1.binning().find_bin(380.)), 1);
        assert_eq!(set.get_1d("h_pv_passedL1").unwrap().entries(), 1);
        assert_eq!(set.get_1d("h_pv_passedHLT").unwrap().entries(), 0);
    }
}
