//! This module takes care of scheduling the analysis work, encapsulating use
//! of multiple threads
//!
//! Every input file is processed into its own accumulator, and accumulators
//! are merged in input order. Whichever backend is compiled in, the merged
//! histograms are therefore the same.

#[cfg(not(feature = "multi-threading"))]
mod sequential;
#[cfg(feature = "multi-threading")]
mod multi_threading;

use crate::{
    analysis::{Accumulator, TriggerAnalysis},
    config::Configuration,
    reader::{EventReader, ReadStats},
    Result,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::debug;

/// Accumulated results of one or more input files
pub struct JobResults<A: TriggerAnalysis> {
    /// Histograms and cut flow
    pub accumulator: Accumulator<A>,

    /// Input bookkeeping
    pub read_stats: ReadStats,
}
//
impl<A: TriggerAnalysis> JobResults<A> {
    /// Integrate the results of inputs which come after ours
    pub fn merge(&mut self, other: Self) {
        self.accumulator.merge(other.accumulator);
        self.read_stats.merge(other.read_stats);
    }
}

/// Run every record of one input file through the analysis
pub fn process_file<A: TriggerAnalysis>(config: &Configuration, path: &Path) -> Result<JobResults<A>> {
    debug!("Processing {}", path.display());
    let mut reader = EventReader::open(path, &config.preselection)?;
    let mut accumulator = Accumulator::<A>::new(config);
    for record in reader.by_ref() {
        accumulator.integrate(&record?);
    }
    let read_stats = reader.stats();
    debug!(
        "Done with {}: {} records, {} selected",
        path.display(),
        read_stats.records,
        accumulator.cut_flow().selected
    );
    Ok(JobResults {
        accumulator,
        read_stats,
    })
}

/// Run the analysis over every input of the job, in the manner that was
/// configured at build time
pub fn run_analysis<A: TriggerAnalysis>(config: &Configuration) -> Result<JobResults<A>> {
    // Should have already been checked at configuration time
    assert!(!config.inputs.is_empty(), "Must process at least one input");

    // Report progress file by file
    let progress = ProgressBar::new(config.inputs.len() as u64);
    progress.set_style(ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} files",
    )?);
    let process = |path: &Path| {
        let result = process_file::<A>(config, path);
        progress.inc(1);
        result
    };

    // Process the inputs...
    let results = {
        // ...in sequential mode
        #[cfg(not(feature = "multi-threading"))]
        {
            sequential::run_analysis_impl(&config.inputs, process)
        }

        // ...in multi-threaded mode
        #[cfg(feature = "multi-threading")]
        {
            multi_threading::run_analysis_impl(&config.inputs, process)
        }
    };
    progress.finish_and_clear();
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{pfht::PfhtAnalysis, PASS_REF_TRIG},
        config::Channel,
    };
    use std::{fs, path::PathBuf};

    const FILE_A: &str = r#"{"HLT": {"IsoMu24": true, "PFHT1050": true}, "PV": {"npvsGood": 20}, "Muon": [{"pt": 30, "eta": 0, "phi": 0, "dz": 0.01, "dxy": 0.01, "tightId": true, "pfRelIso03_all": 0.05}], "Jet": [{"pt": 300, "eta": 1, "phi": 2, "jetId": 6}]}
{"HLT": {"PFHT1050": true}}
"#;

    const FILE_B: &str = r#"{"HLT": {"Mu50": true}}
garbage
{"HLT": {"Mu50": true}, "PV": {"npvsGood": 40}, "Muon": [{"pt": 30, "eta": 0, "phi": 0, "dz": 0.01, "dxy": 0.01, "tightId": true, "pfRelIso03_all": 0.05}], "Jet": [{"pt": 250, "eta": 1, "phi": 2, "jetId": 6}]}
"#;

    fn write_inputs(tag: &str) -> Vec<PathBuf> {
        [FILE_A, FILE_B]
            .iter()
            .enumerate()
            .map(|(idx, contents)| {
                let path = std::env::temp_dir().join(format!(
                    "trigeff-scheduling-{tag}-{}-{idx}.jsonl",
                    std::process::id()
                ));
                fs::write(&path, contents).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn runs_over_every_input() {
        let mut config = Configuration::for_channel(Channel::Pfht).unwrap();
        config.inputs = write_inputs("every");
        let results = run_analysis::<PfhtAnalysis>(&config).unwrap();
        let stats = results.read_stats;
        let (set, flow) = results.accumulator.finalize();

        // The preselection drops the record without reference trigger
        assert_eq!(stats.records, 5);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.malformed, 1);
        assert_eq!(flow.examined, 4);
        assert_eq!(flow.passed_reference, 3);
        assert_eq!(flow.selected, 2);

        let passref = set.get_1d(PASS_REF_TRIG).unwrap();
        assert_eq!(passref.count(1) + passref.count(2), flow.examined);
        assert_eq!(set.get_1d("h_pfht_all").unwrap().entries(), 2);
        assert_eq!(set.get_1d("h_pfht_passedHLT").unwrap().entries(), 1);

        // Running again gives the same histograms
        let again = run_analysis::<PfhtAnalysis>(&config).unwrap();
        assert_eq!(again.accumulator.finalize().0, set);

        for path in &config.inputs {
            let _ = fs::remove_file(path);
        }
    }

    #[test]
    fn missing_input_is_fatal() {
        let mut config = Configuration::for_channel(Channel::Pfht).unwrap();
        config.inputs = vec![std::env::temp_dir().join("trigeff-scheduling-missing.jsonl")];
        assert!(run_analysis::<PfhtAnalysis>(&config).is_err());
    }
}
