use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReprojectError {
    #[error("Failed to create projection {from} -> {to}: {source}")]
    Create {
        from: &'static str,
        to: &'static str,
        #[source]
        source: proj::ProjCreateError,
    },
    #[error("Failed to convert ({0}, {1}): {2}")]
    Convert(f64, f64, #[source] proj::ProjError),
    #[error("Projection of ({0}, {1}) produced a non-finite coordinate")]
    NonFinite(f64, f64),
    #[error("Unsupported geometry type: {0}")]
    UnsupportedGeometry(String),
}

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("Dataset for province '{province}' not found at {}", path.display())]
    Missing { province: String, path: PathBuf },
}

#[derive(Error, Debug)]
pub enum PartitionError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Failed to read GeoJSON dataset {}: {source}", path.display())]
    Dataset {
        path: PathBuf,
        #[source]
        source: geojson::Error,
    },
    #[error("Dataset {} contains no point features", path.display())]
    NoPoints { path: PathBuf },
    #[error("Failed to write partition {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Error, Debug)]
pub enum CentroidError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid partition path: {}. Must be a .csv file", .0.display())]
    NotCsv(PathBuf),
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Missing column '{column}' in {}", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("Partition {} has no rows", .0.display())]
    Empty(PathBuf),
    #[error("No partition file found for postcode {0}")]
    NotFound(String),
    #[error("Invalid {column} value '{value}' on row {row} of {}", path.display())]
    Coordinate {
        path: PathBuf,
        row: usize,
        column: &'static str,
        value: String,
    },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No dataset could be acquired")]
    NoDatasets,
    #[error("No postcode partitions were produced")]
    NoPartitions,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Reproject(#[from] ReprojectError),
    #[error("Failed to write centroid table {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
