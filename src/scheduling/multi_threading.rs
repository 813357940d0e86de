//! Multi-threaded back-end of the analysis

use crate::{analysis::TriggerAnalysis, scheduling::JobResults, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Process input files in parallel
///
/// Files are processed by independent tasks, and their results are merged in
/// input order once every task is done.
///
pub fn run_analysis_impl<A: TriggerAnalysis>(
    inputs: &[PathBuf],
    process_file: impl Fn(&Path) -> Result<JobResults<A>> + Send + Sync,
) -> Result<JobResults<A>> {
    // Some double-checking cannot hurt...
    assert!(!inputs.is_empty(), "Must process at least one input");

    // Collecting an indexed parallel iterator preserves input order
    let per_file = inputs
        .par_iter()
        .map(|input| process_file(input))
        .collect::<Result<Vec<_>>>()?;

    // Merge the results of the other tasks into those of the first one
    let mut results_iter = per_file.into_iter();
    let first_result = results_iter
        .next()
        .expect("There should be at least one task");
    Ok(results_iter.fold(first_result, |mut r1, r2| {
        r1.merge(r2);
        r1
    }))
}
