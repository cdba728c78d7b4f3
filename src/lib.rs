use std::path::Path;

pub mod acquire;
pub mod centroid;
pub mod config;
pub mod dbscan;
pub mod error;
pub mod logging;
pub mod partitioner;
pub mod process;
pub mod record;
pub mod reproject;

use acquire::LocalDatasets;
use centroid::CentroidOutcome;
use config::Config;
use error::{CentroidError, PipelineError};
use process::{Process, RunSummary};

/// Computes the representative point of a single partition file.
pub fn process_file(path: &Path) -> Result<CentroidOutcome, CentroidError> {
    centroid::compute_centroid(path)
}

/// Runs the whole pipeline over the datasets cached in the working directory.
pub fn process_files(config: Config) -> Result<RunSummary, PipelineError> {
    let source = LocalDatasets::new(config.provinces_dir());
    Process::new(config, source)?.process()
}
