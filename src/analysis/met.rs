//! Efficiency of the missing transverse momentum triggers in single-muon events

use crate::{
    analysis::{
        decisions,
        pfht::{pv_binning, PV_TITLE},
        Outcome, ReferenceTrigger, TriggerAnalysis, TriggerHists,
    },
    config::Configuration,
    evcut::MuonCut,
    event::EventRecord,
    histogram::{Binning, Hist2D, HistogramSet},
    numeric::Real,
};

/// Missing transverse momentum bin edges (GeV)
pub fn met_binning() -> Binning {
    let mut edges = (0..=15).map(|i| Real::from(20 * i)).collect::<Vec<_>>();
    edges.extend([350., 400., 450., 500., 600., 800., 1000.]);
    Binning::variable(&edges)
}

/// Axis title of missing transverse momentum histograms
pub const MET_TITLE: &str = "PF MET [GeV]";

/// Book the histograms of one variable
fn trigger_hists(var: &str, title: &str, binning: &Binning, paths: &[String]) -> TriggerHists {
    TriggerHists::new(
        format!("h_{var}_all"),
        format!("h_{var}_passed"),
        paths.iter().map(|path| format!("h_{var}_passtrig_HLT_{path}")),
        title,
        binning,
    )
}

/// MET trigger efficiency analysis
#[derive(Clone, Debug, PartialEq)]
pub struct MetAnalysis {
    /// Reference trigger decision counter
    reference: ReferenceTrigger,

    /// Signal paths
    signal_paths: Vec<String>,

    /// Missing transverse momentum distributions
    met_pt: TriggerHists,

    /// Primary vertex multiplicity distributions
    pv: TriggerHists,

    /// MET vs primary vertex multiplicity, all selected events
    met_vs_pv_all: Hist2D,

    /// MET vs primary vertex multiplicity, events passing any signal path
    met_vs_pv_passed: Hist2D,
}
//
impl TriggerAnalysis for MetAnalysis {
    fn new(config: &Configuration) -> Self {
        let paths = &config.signal_paths;
        let met_vs_pv = Hist2D::new(MET_TITLE, met_binning(), "PV", pv_binning());
        Self {
            reference: ReferenceTrigger::new(&config.reference_paths),
            signal_paths: paths.clone(),
            met_pt: trigger_hists("met_pt", MET_TITLE, &met_binning(), paths),
            pv: trigger_hists("pv", PV_TITLE, &pv_binning(), paths),
            met_vs_pv_passed: met_vs_pv.clone(),
            met_vs_pv_all: met_vs_pv,
        }
    }

    fn analyze(&mut self, record: &EventRecord) -> Outcome {
        // Check if event passes the reference trigger(s)
        let Some(event) = self.reference.check(record) else {
            return Outcome::FailedReference;
        };

        // Exactly one isolated muon, and the event-level objects
        if MuonCut::TIGHT_ISOLATED.select(&event.muons).len() != 1 {
            return Outcome::Rejected;
        }
        let (Some(met), Some(pv)) = (&event.met, &event.pv) else {
            return Outcome::Rejected;
        };
        let met_pt = Real::from(met.pt);
        let npvs = Real::from(pv.npvs_good);

        let fired = decisions(event, &self.signal_paths);
        self.met_pt.fill(met_pt, &fired);
        self.pv.fill(npvs, &fired);
        self.met_vs_pv_all.fill(met_pt, npvs);
        if fired.contains(&true) {
            self.met_vs_pv_passed.fill(met_pt, npvs);
        }
        Outcome::Selected
    }

    fn merge(&mut self, other: Self) {
        self.reference.merge(&other.reference);
        self.met_pt.merge(&other.met_pt);
        self.pv.merge(&other.pv);
        self.met_vs_pv_all.merge(&other.met_vs_pv_all);
        self.met_vs_pv_passed.merge(&other.met_vs_pv_passed);
    }

    fn into_histograms(self) -> HistogramSet {
        let mut set = HistogramSet::new();
        self.reference.store(&mut set);
        self.met_pt.store(&mut set);
        self.pv.store(&mut set);
        set.insert_2d("h_met_pt_vs_pv_all", self.met_vs_pv_all);
        set.insert_2d("h_met_pt_vs_pv_passed", self.met_vs_pv_passed);
        set
    }
}
