//! Sequential back-end of the analysis

use crate::{analysis::TriggerAnalysis, scheduling::JobResults, Result};
use std::path::{Path, PathBuf};

/// Process input files one after another
///
/// Each file still gets its own accumulator, so that results are merged the
/// same way as in multi-threaded runs.
///
pub fn run_analysis_impl<A: TriggerAnalysis>(
    inputs: &[PathBuf],
    process_file: impl Fn(&Path) -> Result<JobResults<A>>,
) -> Result<JobResults<A>> {
    // Some double-checking cannot hurt...
    assert!(!inputs.is_empty(), "Must process at least one input");

    // Initialize the results with the first file, then merge the others
    let mut results = process_file(&inputs[0])?;
    for input in &inputs[1..] {
        results.merge(process_file(input)?);
    }
    Ok(results)
}
