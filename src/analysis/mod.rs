//! Per-event selection and histogram filling
//!
//! Each channel implements `TriggerAnalysis`, which takes records one by one
//! and accumulates counts. Accumulators of independent inputs can be merged,
//! and since counts are integers merging is exact and order-insensitive.

pub mod ak8;
pub mod met;
pub mod pfht;

use crate::{
    config::Configuration,
    event::{Event, EventRecord},
    histogram::{Binning, Hist1D, HistogramSet},
    numeric::Real,
};

/// What happened to one record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No reference trigger fired, or the record could not be decoded
    FailedReference,
    /// Passed the reference trigger, but not the offline selection
    Rejected,
    /// Filled the denominator histograms
    Selected,
}

/// Interface shared by the trigger efficiency analyses
pub trait TriggerAnalysis: Sized + Send {
    /// Book the histograms of a job
    fn new(config: &Configuration) -> Self;

    /// Process one record
    fn analyze(&mut self, record: &EventRecord) -> Outcome;

    /// Integrate the counts of another accumulator of the same job
    fn merge(&mut self, other: Self);

    /// Hand over the filled histograms, keyed by name
    fn into_histograms(self) -> HistogramSet;
}

/// Event counts at each selection stage
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CutFlow {
    /// Records handed over to the analysis
    pub examined: u64,

    /// Records which passed the reference trigger
    pub passed_reference: u64,

    /// Records which passed the offline selection
    pub selected: u64,
}
//
impl CutFlow {
    /// Account for one record
    pub fn record(&mut self, outcome: Outcome) {
        self.examined += 1;
        match outcome {
            Outcome::FailedReference => {}
            Outcome::Rejected => self.passed_reference += 1,
            Outcome::Selected => {
                self.passed_reference += 1;
                self.selected += 1;
            }
        }
    }

    /// Integrate the counts of another input
    pub fn merge(&mut self, other: Self) {
        self.examined += other.examined;
        self.passed_reference += other.passed_reference;
        self.selected += other.selected;
    }
}

/// Analysis together with its cut flow
pub struct Accumulator<A: TriggerAnalysis> {
    /// Channel-specific histograms
    analysis: A,

    /// Selection bookkeeping
    cut_flow: CutFlow,
}
//
impl<A: TriggerAnalysis> Accumulator<A> {
    /// Set up an empty accumulator
    pub fn new(config: &Configuration) -> Self {
        Self {
            analysis: A::new(config),
            cut_flow: CutFlow::default(),
        }
    }

    /// Integrate one record
    pub fn integrate(&mut self, record: &EventRecord) {
        let outcome = self.analysis.analyze(record);
        self.cut_flow.record(outcome);
    }

    /// Integrate the results of another accumulator
    pub fn merge(&mut self, other: Self) {
        self.analysis.merge(other.analysis);
        self.cut_flow.merge(other.cut_flow);
    }

    /// Selection bookkeeping so far
    pub fn cut_flow(&self) -> CutFlow {
        self.cut_flow
    }

    /// Hand over the filled histograms and the cut flow
    pub fn finalize(self) -> (HistogramSet, CutFlow) {
        (self.analysis.into_histograms(), self.cut_flow)
    }
}

/// Name of the reference trigger counter
pub const PASS_REF_TRIG: &str = "h_passreftrig";

/// Two-bin counter of the reference trigger decision
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceTrigger {
    /// Paths, at least one of which must fire
    paths: Vec<String>,

    /// Bin 1 counts failures, bin 2 counts passes
    counter: Hist1D,
}
//
impl ReferenceTrigger {
    /// Set up the counter for some reference paths
    pub fn new(paths: &[String]) -> Self {
        Self {
            paths: paths.to_vec(),
            counter: Hist1D::new("passed ref trigger", Binning::uniform(2, 0., 2.)),
        }
    }

    /// Record the reference trigger decision, and hand over the event if it
    /// passed. Malformed records count as failures.
    pub fn check<'rec>(&mut self, record: &'rec EventRecord) -> Option<&'rec Event> {
        let passed = record.event().filter(|ev| ev.hlt.any_fired(&self.paths));
        self.counter.fill(if passed.is_some() { 1. } else { 0. });
        passed
    }

    /// Integrate the counts of another counter
    pub fn merge(&mut self, other: &Self) {
        self.counter.merge(&other.counter);
    }

    /// Store the counter into a histogram set
    pub fn store(self, set: &mut HistogramSet) {
        set.insert_1d(PASS_REF_TRIG, self.counter);
    }
}

/// A histogram with its name
#[derive(Clone, Debug, PartialEq)]
pub struct Named<H> {
    /// Name under which the histogram is stored
    pub name: String,

    /// Histogram
    pub hist: H,
}
//
impl Named<Hist1D> {
    /// Book a named 1-D histogram
    pub fn new_1d(name: impl Into<String>, x_title: &str, binning: &Binning) -> Self {
        Self {
            name: name.into(),
            hist: Hist1D::new(x_title, binning.clone()),
        }
    }

    /// Integrate the counts of a histogram with the same name
    pub fn merge(&mut self, other: &Self) {
        assert_eq!(self.name, other.name, "Merging unrelated histograms");
        self.hist.merge(&other.hist);
    }

    /// Store the histogram into a set
    pub fn store(self, set: &mut HistogramSet) {
        set.insert_1d(self.name, self.hist);
    }
}

/// Denominator of one variable, with numerators for the logical OR of a set
/// of trigger paths and for each path separately
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerHists {
    /// Every selected event
    pub all: Named<Hist1D>,

    /// Events where at least one path fired
    pub any: Named<Hist1D>,

    /// Events where a given path fired, in path order
    pub per_path: Vec<Named<Hist1D>>,
}
//
impl TriggerHists {
    /// Book the histograms, given the name of the denominator and the name of
    /// the OR numerator, and how per-path names are derived
    pub fn new(
        all: impl Into<String>,
        any: impl Into<String>,
        per_path: impl IntoIterator<Item = String>,
        x_title: &str,
        binning: &Binning,
    ) -> Self {
        Self {
            all: Named::new_1d(all, x_title, binning),
            any: Named::new_1d(any, x_title, binning),
            per_path: per_path
                .into_iter()
                .map(|name| Named::new_1d(name, x_title, binning))
                .collect(),
        }
    }

    /// Fill a value, given which paths fired
    pub fn fill(&mut self, x: Real, fired: &[bool]) {
        assert_eq!(fired.len(), self.per_path.len(), "One decision per path");
        self.all.hist.fill(x);
        if fired.iter().any(|&f| f) {
            self.any.hist.fill(x);
        }
        for (named, &f) in self.per_path.iter_mut().zip(fired) {
            if f {
                named.hist.fill(x);
            }
        }
    }

    /// Integrate the counts of another set with the same layout
    pub fn merge(&mut self, other: &Self) {
        self.all.merge(&other.all);
        self.any.merge(&other.any);
        for (mine, theirs) in self.per_path.iter_mut().zip(&other.per_path) {
            mine.merge(theirs);
        }
    }

    /// Store the histograms into a set
    pub fn store(self, set: &mut HistogramSet) {
        self.all.store(set);
        self.any.store(set);
        for named in self.per_path {
            named.store(set);
        }
    }
}

/// Decisions of a list of paths, in list order
pub fn decisions(event: &Event, paths: &[String]) -> Vec<bool> {
    paths.iter().map(|path| event.hlt.fired(path)).collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::histogram::Histogram;

    /// Check that no numerator bin exceeds its denominator bin
    pub fn assert_numerators_bounded(set: &HistogramSet, denominator: &str, numerators: &[String]) {
        let all = set.get_1d(denominator).expect("denominator should exist");
        for name in numerators {
            let pass = set.get_1d(name).expect("numerator should exist");
            for (bin, (&k, &n)) in pass.counts().iter().zip(all.counts()).enumerate() {
                assert!(k <= n, "{name} bin {bin}: {k} > {n}");
            }
        }
    }

    /// Sum of all bins of the reference trigger counter
    pub fn reference_total(set: &HistogramSet) -> u64 {
        match set.get(PASS_REF_TRIG) {
            Some(Histogram::OneD(h)) => h.counts().iter().sum(),
            _ => panic!("reference counter should exist"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analysis::testing::*, config::Channel, event::testing::fired};
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn reference_counter() {
        let mut reference = ReferenceTrigger::new(&["Mu50".to_owned(), "IsoMu24".to_owned()]);
        let pass = EventRecord::Valid(Event {
            hlt: fired(&["IsoMu24"]),
            ..Event::default()
        });
        let fail = EventRecord::Valid(Event::default());
        assert!(reference.check(&pass).is_some());
        assert!(reference.check(&fail).is_none());
        assert!(reference.check(&EventRecord::Malformed).is_none());

        let mut set = HistogramSet::new();
        reference.store(&mut set);
        let counter = set.get_1d(PASS_REF_TRIG).unwrap();
        assert_eq!(counter.count(1), 2);
        assert_eq!(counter.count(2), 1);
    }

    #[test]
    fn trigger_hists_fill_or_and_paths() {
        let binning = Binning::uniform(4, 0., 4.);
        let mut hists = TriggerHists::new(
            "all",
            "any",
            ["a".to_owned(), "b".to_owned()],
            "x",
            &binning,
        );
        hists.fill(0.5, &[false, false]);
        hists.fill(1.5, &[true, false]);
        hists.fill(1.5, &[true, true]);
        assert_eq!(hists.all.hist.entries(), 3);
        assert_eq!(hists.any.hist.count(2), 2);
        assert_eq!(hists.per_path[0].hist.count(2), 2);
        assert_eq!(hists.per_path[1].hist.count(2), 1);
        assert_eq!(hists.any.hist.count(1), 0);
    }

    #[test]
    fn cut_flow_counts() {
        let mut flow = CutFlow::default();
        for outcome in [Outcome::FailedReference, Outcome::Rejected, Outcome::Selected] {
            flow.record(outcome);
        }
        flow.merge(flow);
        assert_eq!(
            flow,
            CutFlow {
                examined: 6,
                passed_reference: 4,
                selected: 2,
            }
        );
    }

    /// Random event mixing everything the selections look at
    fn random_record(rng: &mut impl Rng, config: &Configuration) -> EventRecord {
        use crate::event::{testing::*, Met, PrimaryVertices};
        if rng.gen_bool(0.05) {
            return EventRecord::Malformed;
        }
        let bits = config
            .reference_paths
            .iter()
            .chain(&config.signal_paths)
            .chain(&config.l1_seeds)
            .filter(|_| rng.gen_bool(0.5))
            .map(|path| (path.clone(), true))
            .collect::<Vec<_>>();
        let muons = (0..rng.gen_range(0..3))
            .map(|_| good_muon(rng.gen_range(10.0..60.0), rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0)))
            .collect::<Vec<_>>();
        let jets = (0..rng.gen_range(0..6))
            .map(|_| good_jet(rng.gen_range(20.0..600.0), rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0)))
            .collect();
        let fat_jets = (0..rng.gen_range(0..3))
            .map(|_| {
                let mut fj = fat_jet(
                    rng.gen_range(150.0..1200.0),
                    rng.gen_range(0.0..450.0),
                    rng.gen_range(-2.6..2.6),
                    rng.gen_range(-3.0..3.0),
                );
                if !muons.is_empty() && rng.gen_bool(0.2) {
                    fj.muon_idx_3sj = rng.gen_range(0..muons.len()) as i32;
                }
                fj
            })
            .collect();
        let event = Event {
            muons,
            jets,
            fat_jets,
            met: rng.gen_bool(0.9).then(|| Met {
                pt: rng.gen_range(0.0..1200.0),
                phi: rng.gen_range(-3.0..3.0),
            }),
            pv: rng.gen_bool(0.95).then(|| PrimaryVertices {
                npvs_good: rng.gen_range(0..110),
            }),
            hlt: bits.iter().cloned().collect(),
            l1: bits.into_iter().collect(),
        };
        EventRecord::Valid(event)
    }

    fn run<A: TriggerAnalysis>(config: &Configuration, seed: u64) -> (HistogramSet, CutFlow) {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut acc = Accumulator::<A>::new(config);
        for _ in 0..2_000 {
            acc.integrate(&random_record(&mut rng, config));
        }
        acc.finalize()
    }

    fn check_invariants<A: TriggerAnalysis>(channel: Channel, pairs: &[(String, Vec<String>)]) {
        let config = Configuration::for_channel(channel).unwrap();
        let (set, flow) = run::<A>(&config, 42);
        assert_eq!(flow.examined, 2_000);
        assert_eq!(reference_total(&set), flow.examined);
        assert!(flow.selected > 0, "{channel}: random events should pass sometimes");
        for (denominator, numerators) in pairs {
            assert_numerators_bounded(&set, denominator, numerators);
        }

        // Same input, same output
        let (again, _) = run::<A>(&config, 42);
        assert_eq!(set, again);

        // Merging two halves is the same as one pass over everything
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let records = (0..500)
            .map(|_| random_record(&mut rng, &config))
            .collect::<Vec<_>>();
        let mut whole = Accumulator::<A>::new(&config);
        let mut first = Accumulator::<A>::new(&config);
        let mut second = Accumulator::<A>::new(&config);
        for (idx, record) in records.iter().enumerate() {
            whole.integrate(record);
            if idx < 200 {
                first.integrate(record);
            } else {
                second.integrate(record);
            }
        }
        first.merge(second);
        assert_eq!(first.finalize(), whole.finalize());
    }

    #[test]
    fn pfht_invariants() {
        let pairs = [
            (
                "h_pfht_all".to_owned(),
                vec!["h_pfht_passedL1".to_owned(), "h_pfht_passedHLT".to_owned()],
            ),
            (
                "h_pv_all".to_owned(),
                vec!["h_pv_passedL1".to_owned(), "h_pv_passedHLT".to_owned()],
            ),
        ];
        check_invariants::<pfht::PfhtAnalysis>(Channel::Pfht, &pairs);
    }

    #[test]
    fn ak8_invariants() {
        let config = Configuration::for_channel(Channel::Ak8).unwrap();
        let mut pairs = Vec::new();
        for var in ak8::VARIABLES {
            for region in ak8::Region::ALL {
                let mut numerators = vec![ak8::hist_name(var.name, "_passTrgOR", region)];
                numerators.extend(
                    config
                        .signal_paths
                        .iter()
                        .map(|path| ak8::hist_name(var.name, &format!("_pass_HLT_{path}"), region)),
                );
                pairs.push((ak8::hist_name(var.name, "", region), numerators));
            }
        }
        check_invariants::<ak8::Ak8Analysis>(Channel::Ak8, &pairs);
    }

    #[test]
    fn met_invariants() {
        let config = Configuration::for_channel(Channel::Met).unwrap();
        let pairs = ["met_pt", "pv"]
            .into_iter()
            .map(|var| {
                let mut numerators = vec![format!("h_{var}_passed")];
                numerators.extend(
                    config
                        .signal_paths
                        .iter()
                        .map(|path| format!("h_{var}_passtrig_HLT_{path}")),
                );
                (format!("h_{var}_all"), numerators)
            })
            .collect::<Vec<_>>();
        check_invariants::<met::MetAnalysis>(Channel::Met, &pairs);
    }
}
