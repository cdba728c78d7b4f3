//! Representative point per postal code.
//!
//! The partition's metric points are clustered with DBSCAN. The largest
//! cluster is taken as the town core (equal sizes go to the lowest label) and
//! the real address closest to that cluster's mean position represents the
//! postal code. A partition where every point is noise gets a sentinel with
//! no coordinates.

use fs_err::File;
use geo::{Centroid, EuclideanDistance, MultiPoint, Point};
use log::debug;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::dbscan::{Dbscan, NOISE};
use crate::error::CentroidError;
use crate::record::{non_empty, AddressPoint, RawAddressRow, REQUIRED_COLUMNS};
use crate::reproject::round_to;

/// Neighbourhood radius in meters.
pub const EPS: f64 = 250.0;
pub const MIN_SAMPLES: usize = 20;

pub fn default_clustering() -> Dbscan {
    Dbscan::new(EPS, MIN_SAMPLES)
}

/// The address chosen for a postal code, with the dominant cluster's size.
#[derive(Debug, Clone, PartialEq)]
pub struct Representative {
    /// Dominant cluster size as a percentage of the partition, 2 decimals.
    pub pct: f64,
    pub num_points: usize,
    pub point: AddressPoint,
}

impl Representative {
    /// Zero-valued result for a postal code without clusters.
    pub fn sentinel(codigo_postal: String, poblacion: Option<String>) -> Self {
        Self {
            pct: 0.0,
            num_points: 0,
            point: AddressPoint {
                x: None,
                y: None,
                id_porpk: None,
                codigo_postal,
                tipo_vial: None,
                poblacion,
            },
        }
    }
}

#[derive(Debug)]
pub enum CentroidOutcome {
    Clustered(Representative),
    NoCluster(Representative),
    Failed {
        postal_code: String,
        error: CentroidError,
    },
}

impl CentroidOutcome {
    pub fn postal_code(&self) -> &str {
        match self {
            CentroidOutcome::Clustered(r) | CentroidOutcome::NoCluster(r) => &r.point.codigo_postal,
            CentroidOutcome::Failed { postal_code, .. } => postal_code,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            CentroidOutcome::Clustered(_) => "clustered",
            CentroidOutcome::NoCluster(_) => "no_cluster",
            CentroidOutcome::Failed { .. } => "failed",
        }
    }

    /// The row to publish. Failed partitions fall back to a sentinel.
    pub fn into_representative(self) -> Representative {
        match self {
            CentroidOutcome::Clustered(r) | CentroidOutcome::NoCluster(r) => r,
            CentroidOutcome::Failed { postal_code, .. } => {
                Representative::sentinel(postal_code, None)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
    pub label: i32,
    pub member_count: usize,
    pub centroid: Point<f64>,
}

/// Validated contents of one or more partition files.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub rows: Vec<AddressPoint>,
    pub coords: Vec<[f64; 2]>,
}

impl Partition {
    /// Reads a partition file. Any row without a finite `x`/`y` rejects the whole file.
    pub fn read(path: &Path) -> Result<Self, CentroidError> {
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            return Err(CentroidError::NotCsv(path.to_path_buf()));
        }

        let parse_error = |source| CentroidError::Parse {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::Reader::from_reader(File::open(path)?);
        let headers = reader.headers().map_err(parse_error)?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(CentroidError::MissingColumn {
                    path: path.to_path_buf(),
                    column,
                });
            }
        }

        let mut partition = Partition::default();
        for (index, row) in reader.deserialize::<RawAddressRow>().enumerate() {
            let row = row.map_err(parse_error)?;
            let x = parse_coordinate(path, index + 1, "x", &row.x)?;
            let y = parse_coordinate(path, index + 1, "y", &row.y)?;
            partition.coords.push([x, y]);
            partition.rows.push(AddressPoint {
                x: Some(x),
                y: Some(y),
                id_porpk: non_empty(row.id_porpk),
                codigo_postal: row.codigo_postal,
                tipo_vial: non_empty(row.tipo_vial),
                poblacion: non_empty(row.poblacion),
            });
        }

        if partition.rows.is_empty() {
            return Err(CentroidError::Empty(path.to_path_buf()));
        }
        debug!("Read {} rows from {}", partition.rows.len(), path.display());
        Ok(partition)
    }

    /// Concatenates the files holding one postal code.
    pub fn read_all(paths: &[PathBuf]) -> Result<Self, CentroidError> {
        let mut merged = Partition::default();
        for path in paths {
            let partition = Partition::read(path)?;
            merged.rows.extend(partition.rows);
            merged.coords.extend(partition.coords);
        }
        Ok(merged)
    }
}

fn parse_coordinate(
    path: &Path,
    row: usize,
    column: &'static str,
    value: &str,
) -> Result<f64, CentroidError> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(CentroidError::Coordinate {
            path: path.to_path_buf(),
            row,
            column,
            value: value.to_string(),
        }),
    }
}

/// Member count and mean position of every non-noise cluster, by ascending label.
pub fn summarize_clusters(coords: &[[f64; 2]], labels: &[i32]) -> Vec<ClusterSummary> {
    let mut members: BTreeMap<i32, Vec<Point<f64>>> = BTreeMap::new();
    for (coord, &label) in coords.iter().zip(labels) {
        if label != NOISE {
            members.entry(label).or_default().push(Point::new(coord[0], coord[1]));
        }
    }

    members
        .into_iter()
        .filter_map(|(label, points)| {
            let member_count = points.len();
            MultiPoint::new(points).centroid().map(|centroid| ClusterSummary {
                label,
                member_count,
                centroid,
            })
        })
        .collect()
}

/// Index of the point nearest to `target`; the first one wins on ties.
pub fn closest_point(coords: &[[f64; 2]], target: &Point<f64>) -> Option<usize> {
    coords
        .iter()
        .map(|c| Point::new(c[0], c[1]).euclidean_distance(target))
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

/// Picks the representative address of a partition.
pub fn select_representative(
    partition: &Partition,
    clustering: &Dbscan,
) -> Option<CentroidOutcome> {
    let first = partition.rows.first()?;
    let total_rows = partition.rows.len();

    let labels = clustering.fit_predict(&partition.coords);
    let mut clusters = summarize_clusters(&partition.coords, &labels);
    debug!(
        "Postcode {}: {} clusters over {} points",
        first.codigo_postal,
        clusters.len(),
        total_rows
    );
    // Stable sort keeps the lowest label first among equal sizes
    clusters.sort_by(|a, b| b.member_count.cmp(&a.member_count));

    let dominant = clusters.first().and_then(|cluster| {
        closest_point(&partition.coords, &cluster.centroid).map(|index| (cluster, index))
    });

    let outcome = match dominant {
        Some((cluster, index)) => {
            let pct = round_to(cluster.member_count as f64 / total_rows as f64 * 100.0, 2);
            debug!("Postcode {} centroid on {}% cluster", first.codigo_postal, pct);
            CentroidOutcome::Clustered(Representative {
                pct,
                num_points: cluster.member_count,
                point: partition.rows[index].clone(),
            })
        }
        None => {
            debug!("Postcode {}: no clusters found", first.codigo_postal);
            CentroidOutcome::NoCluster(Representative::sentinel(
                first.codigo_postal.clone(),
                first.poblacion.clone(),
            ))
        }
    };
    Some(outcome)
}

/// Computes the representative of a single partition file.
pub fn compute_centroid(path: &Path) -> Result<CentroidOutcome, CentroidError> {
    let partition = Partition::read(path)?;
    select_representative(&partition, &default_clustering())
        .ok_or_else(|| CentroidError::Empty(path.to_path_buf()))
}

/// Computes the representative of a postal code spread over `paths`.
/// Never fails: errors are carried in [`CentroidOutcome::Failed`].
pub fn centroid_for_postal_code(postal_code: &str, paths: &[PathBuf]) -> CentroidOutcome {
    let result = Partition::read_all(paths).and_then(|partition| {
        select_representative(&partition, &default_clustering())
            .ok_or_else(|| CentroidError::Empty(paths.first().cloned().unwrap_or_default()))
    });
    match result {
        Ok(outcome) => outcome,
        Err(error) => CentroidOutcome::Failed {
            postal_code: postal_code.to_string(),
            error,
        },
    }
}
