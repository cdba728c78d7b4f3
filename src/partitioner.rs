use fs_err::{create_dir_all, remove_dir_all, rename, File};
use geojson::{Feature, FeatureReader};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::PartitionError;
use crate::record::AddressPoint;
use crate::reproject::Reprojector;

/// Counters gathered while streaming a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionReport {
    pub postal_codes: BTreeSet<String>,
    pub features: usize,
    pub points: usize,
    pub unsupported_geometries: usize,
    pub missing_postal_code: usize,
}

/// Street-number points of one dataset, grouped by postal code.
#[derive(Debug, Default)]
pub struct PostcodeGroups {
    pub groups: BTreeMap<String, Vec<AddressPoint>>,
    pub report: PartitionReport,
}

// Function to stream the features of a GeoJSON dataset into postal code groups
pub fn load_postcodes(
    path: &Path,
    reprojector: &Reprojector,
) -> Result<PostcodeGroups, PartitionError> {
    info!("Loading dataset: {}", path.display());
    let reader = BufReader::new(File::open(path)?);
    let mut loaded = PostcodeGroups::default();

    for feature in FeatureReader::from_reader(reader).features() {
        let feature = feature.map_err(|source| PartitionError::Dataset {
            path: path.to_path_buf(),
            source,
        })?;
        loaded.report.features += 1;
        if loaded.report.features % 10_000 == 0 {
            debug!("Processed {} features from {}", loaded.report.features, path.display());
        }

        let coords = project_feature(&feature, reprojector);
        if coords.is_some() {
            loaded.report.points += 1;
        } else {
            loaded.report.unsupported_geometries += 1;
        }

        match AddressPoint::from_properties(coords, feature.properties.as_ref()) {
            Some(point) if is_safe_file_stem(&point.codigo_postal) => {
                loaded.report.postal_codes.insert(point.codigo_postal.clone());
                loaded.groups.entry(point.codigo_postal.clone()).or_default().push(point);
            }
            Some(point) => {
                warn!("Skipping feature with unusable postcode '{}'", point.codigo_postal);
                loaded.report.missing_postal_code += 1;
            }
            None => {
                debug!("Feature without postcode: {:?}", feature.id);
                loaded.report.missing_postal_code += 1;
            }
        }
    }

    if loaded.report.points == 0 {
        return Err(PartitionError::NoPoints {
            path: path.to_path_buf(),
        });
    }

    info!(
        "Loaded {} features from {} ({} postcodes, {} without postcode, {} unsupported geometries)",
        loaded.report.features,
        path.display(),
        loaded.report.postal_codes.len(),
        loaded.report.missing_postal_code,
        loaded.report.unsupported_geometries
    );
    Ok(loaded)
}

fn project_feature(feature: &Feature, reprojector: &Reprojector) -> Option<(f64, f64)> {
    let geometry = feature.geometry.as_ref()?;
    match reprojector.project_geometry(geometry) {
        Ok(coords) => Some(coords),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

fn is_safe_file_stem(postal_code: &str) -> bool {
    !postal_code.is_empty()
        && postal_code != "."
        && postal_code != ".."
        && !postal_code.contains(['/', '\\', '\0'])
}

// Writes one CSV per postal code into `output_dir`
fn write_postcode_files(
    groups: &BTreeMap<String, Vec<AddressPoint>>,
    output_dir: &Path,
) -> Result<(), PartitionError> {
    for (postal_code, points) in groups {
        let output_path = output_dir.join(format!("{}.csv", postal_code));
        let write_error = |source| PartitionError::Write {
            path: output_path.clone(),
            source,
        };

        let mut writer = csv::Writer::from_writer(File::create(&output_path)?);
        for point in points {
            writer.serialize(point).map_err(write_error)?;
        }
        writer.flush()?;
        debug!("Written postcode {} with {} points", postal_code, points.len());
    }
    Ok(())
}

/// Staging directory used while a province is being written.
pub fn staging_dir(output_dir: &Path) -> PathBuf {
    let name = output_dir
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("partition");
    output_dir.with_file_name(format!(".{}.partial", name))
}

/// Partitions a dataset into `<output_dir>/<postal_code>.csv` files.
///
/// Files are written to a staging directory first and replace the previous
/// contents of `output_dir` only once all of them are on disk.
pub fn extract_postcodes(
    dataset: &Path,
    output_dir: &Path,
    reprojector: &Reprojector,
) -> Result<PartitionReport, PartitionError> {
    let loaded = load_postcodes(dataset, reprojector)?;

    let staging = staging_dir(output_dir);
    if staging.exists() {
        remove_dir_all(&staging)?;
    }
    create_dir_all(&staging)?;

    if let Err(e) = write_postcode_files(&loaded.groups, &staging) {
        let _ = remove_dir_all(&staging);
        return Err(e);
    }

    if output_dir.exists() {
        remove_dir_all(output_dir)?;
    }
    rename(&staging, output_dir)?;

    info!(
        "Written {} postcode files into {}",
        loaded.groups.len(),
        output_dir.display()
    );
    Ok(loaded.report)
}
