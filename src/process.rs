use fs_err::{create_dir_all, read_dir, File};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::acquire::DatasetSource;
use crate::centroid::{centroid_for_postal_code, CentroidOutcome};
use crate::config::{Config, Province};
use crate::error::{CentroidError, PipelineError};
use crate::partitioner::extract_postcodes;
use crate::record::CentroidRow;
use crate::reproject::Reprojector;

/// Creates a progress bar for a stage with `count` units of work.
pub fn progress_bar_for_count(count: usize) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {human_pos}/{human_len} ({per_sec}, {eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(count as u64).with_style(style)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub datasets: usize,
    pub postcodes: usize,
    pub clustered: usize,
    pub no_cluster: usize,
    pub failed: usize,
    pub output: PathBuf,
}

/// Runs acquisition, partitioning and centroid computation on a bounded pool.
pub struct Process<S> {
    config: Config,
    source: S,
    pool: ThreadPool,
}

impl<S: DatasetSource> Process<S> {
    pub fn new(config: Config, source: S) -> Result<Self, PipelineError> {
        let workers = config.worker_count();
        debug!("Using {} worker threads", workers);
        let pool = ThreadPoolBuilder::new().num_threads(workers).build()?;
        Ok(Self {
            config,
            source,
            pool,
        })
    }

    /// Acquires the dataset of every selected province. Failures are logged
    /// and leave the province out.
    pub fn get_data(&self) -> Vec<(Province, PathBuf)> {
        info!("Getting datasets...");
        let provinces = self.config.provinces();
        let force = self.config.force;

        let datasets: Vec<(Province, PathBuf)> = self.pool.install(|| {
            provinces
                .par_iter()
                .filter_map(|&province| match self.source.acquire(province, force) {
                    Ok(path) => Some((province, path)),
                    Err(e) => {
                        error!("Failed to acquire dataset {}: {}", province, e);
                        None
                    }
                })
                .collect()
        });

        info!("{} of {} datasets ready for processing.", datasets.len(), provinces.len());
        for (province, path) in &datasets {
            info!("\t{}: {}", province, path.display());
        }
        datasets
    }

    /// Partitions every dataset by postal code and returns the postal codes seen.
    pub fn get_points(&self, datasets: &[(Province, PathBuf)]) -> BTreeSet<String> {
        let postcodes_dir = self.config.postcodes_dir();

        let reports: Vec<BTreeSet<String>> = self.pool.install(|| {
            datasets
                .par_iter()
                .progress_with(progress_bar_for_count(datasets.len()))
                .filter_map(|(province, dataset)| {
                    let output_dir = postcodes_dir.join(province.name());
                    info!("Extracting points into {}...", output_dir.display());
                    let reprojector = match Reprojector::new() {
                        Ok(reprojector) => reprojector,
                        Err(e) => {
                            error!("Failed to extract province {}: {}", province, e);
                            return None;
                        }
                    };
                    match extract_postcodes(dataset, &output_dir, &reprojector) {
                        Ok(report) => Some(report.postal_codes),
                        Err(e) => {
                            error!("Failed to extract province {}: {}", province, e);
                            None
                        }
                    }
                })
                .collect()
        });

        let extracted = reports.len();
        let postal_codes: BTreeSet<String> = reports.into_iter().flatten().collect();
        info!(
            "{} of {} datasets processed generating {} CSV postcodes.",
            extracted,
            datasets.len(),
            postal_codes.len()
        );
        postal_codes
    }

    /// Computes one outcome per postal code found on disk or reported by the
    /// partitioner.
    pub fn get_centroids(
        &self,
        reported: &BTreeSet<String>,
    ) -> Result<Vec<CentroidOutcome>, PipelineError> {
        info!("Generating centroids...");
        let partitions = discover_partitions(&self.config.postcodes_dir())?;
        info!("Found {} postcodes to process.", partitions.len());

        let work: Vec<(&String, &Vec<PathBuf>)> = partitions.iter().collect();
        let mut outcomes: Vec<CentroidOutcome> = self.pool.install(|| {
            work.par_iter()
                .progress_with(progress_bar_for_count(work.len()))
                .map(|(postal_code, paths)| centroid_for_postal_code(postal_code, paths))
                .collect()
        });

        let on_disk: BTreeSet<String> = partitions.keys().cloned().collect();
        for postal_code in reported.difference(&on_disk) {
            outcomes.push(CentroidOutcome::Failed {
                postal_code: postal_code.clone(),
                error: CentroidError::NotFound(postal_code.clone()),
            });
        }

        for outcome in &outcomes {
            if let CentroidOutcome::Failed { postal_code, error } = outcome {
                error!("Postcode {} falls back to an empty centroid: {}", postal_code, error);
            }
        }
        Ok(outcomes)
    }

    /// Writes the final table, reprojecting representatives back to lon/lat.
    pub fn write_centroids(
        &self,
        outcomes: Vec<CentroidOutcome>,
    ) -> Result<RunSummary, PipelineError> {
        if outcomes.is_empty() {
            return Err(PipelineError::NoPartitions);
        }

        info!("Writing the centroids to a single CSV file...");
        let output = self.config.centroids_path();
        if let Some(parent) = output.parent() {
            create_dir_all(parent)?;
        }

        let reprojector = Reprojector::new()?;
        let mut summary = RunSummary {
            output: output.clone(),
            ..RunSummary::default()
        };

        let mut rows: Vec<CentroidRow> = outcomes
            .into_iter()
            .map(|outcome| {
                match outcome {
                    CentroidOutcome::Clustered(_) => summary.clustered += 1,
                    CentroidOutcome::NoCluster(_) => summary.no_cluster += 1,
                    CentroidOutcome::Failed { .. } => summary.failed += 1,
                }
                to_row(outcome, &reprojector)
            })
            .collect();
        rows.sort_by(|a, b| a.codigo_postal.cmp(&b.codigo_postal));
        summary.postcodes = rows.len();

        let write_error = |source| PipelineError::Write {
            path: output.clone(),
            source,
        };
        let mut writer = csv::Writer::from_writer(File::create(&output)?);
        for row in &rows {
            writer.serialize(row).map_err(write_error)?;
        }
        writer.flush()?;

        info!("Centroids written to {}", output.display());
        Ok(summary)
    }

    pub fn process(&self) -> Result<RunSummary, PipelineError> {
        info!("===========================");
        info!("[1] Processing datasets...");
        info!("===========================");
        let datasets = self.get_data();
        if datasets.is_empty() {
            return Err(PipelineError::NoDatasets);
        }

        info!("===========================");
        info!("[2] Extracting street number points from datasets...");
        info!("===========================");
        let reported = self.get_points(&datasets);

        info!("===========================");
        info!("[3] Generating centroids...");
        info!("===========================");
        let outcomes = self.get_centroids(&reported)?;
        let mut summary = self.write_centroids(outcomes)?;
        summary.datasets = datasets.len();

        info!(
            "{} postcodes: {} clustered, {} without cluster, {} failed",
            summary.postcodes, summary.clustered, summary.no_cluster, summary.failed
        );
        Ok(summary)
    }
}

fn to_row(outcome: CentroidOutcome, reprojector: &Reprojector) -> CentroidRow {
    let status = outcome.status().to_string();
    let representative = outcome.into_representative();
    let point = representative.point;

    let (lon, lat) = match (point.x, point.y) {
        (Some(x), Some(y)) => match reprojector.to_geographic(x, y) {
            Ok((lon, lat)) => (Some(lon), Some(lat)),
            Err(e) => {
                warn!("Postcode {}: {}", point.codigo_postal, e);
                (None, None)
            }
        },
        _ => (None, None),
    };

    CentroidRow {
        pct: representative.pct,
        num_points: representative.num_points,
        x: point.x,
        y: point.y,
        id_porpk: point.id_porpk,
        codigo_postal: point.codigo_postal,
        tipo_vial: point.tipo_vial,
        poblacion: point.poblacion,
        lon,
        lat,
        status,
    }
}

/// Lists partition files under `postcodes_dir`, grouped by postal code.
///
/// Province directories are scanned one level deep; staging directories
/// (dot-prefixed) are ignored.
pub fn discover_partitions(
    postcodes_dir: &Path,
) -> Result<BTreeMap<String, Vec<PathBuf>>, PipelineError> {
    let mut partitions: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    if !postcodes_dir.is_dir() {
        warn!("Postcodes directory {} does not exist", postcodes_dir.display());
        return Ok(partitions);
    }

    let mut dirs = vec![postcodes_dir.to_path_buf()];
    for entry in read_dir(postcodes_dir)? {
        let path = entry?.path();
        if path.is_dir() && !is_hidden(&path) {
            dirs.push(path);
        }
    }

    for dir in dirs {
        for entry in read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                partitions.entry(stem.to_string()).or_default().push(path.clone());
            }
        }
    }

    for (postal_code, paths) in partitions.iter_mut() {
        paths.sort();
        if paths.len() > 1 {
            debug!("Postcode {} spans {} partition files", postal_code, paths.len());
        }
    }
    Ok(partitions)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| name.starts_with('.'))
}
