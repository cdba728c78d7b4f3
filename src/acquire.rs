use log::{debug, warn};
use std::path::PathBuf;

use crate::config::Province;
use crate::error::AcquireError;

/// Supplies the street-number dataset of a province as a local GeoJSON file.
pub trait DatasetSource: Sync {
    fn acquire(&self, province: Province, force: bool) -> Result<PathBuf, AcquireError>;
}

/// Datasets already fetched into `<dir>/<province>.geojson`.
#[derive(Debug, Clone)]
pub struct LocalDatasets {
    dir: PathBuf,
}

impl LocalDatasets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, province: Province) -> PathBuf {
        self.dir.join(format!("{}.geojson", province.name()))
    }
}

impl DatasetSource for LocalDatasets {
    fn acquire(&self, province: Province, force: bool) -> Result<PathBuf, AcquireError> {
        let path = self.path_for(province);
        if !path.is_file() {
            return Err(AcquireError::Missing {
                province: province.name().to_string(),
                path,
            });
        }
        if force {
            warn!(
                "Cannot refresh dataset {} (CNIG id {}) from a local source, reusing {}",
                province,
                province.dataset_id(),
                path.display()
            );
        } else {
            debug!("Dataset {} already exists. Skipping download.", province);
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_cached_dataset() {
        let dir = std::env::temp_dir()
            .join(format!("postcode_centroids_acquire_{}", std::process::id()));
        fs_err::create_dir_all(&dir).unwrap();
        fs_err::write(dir.join("valencia.geojson"), "{}").unwrap();
        let source = LocalDatasets::new(&dir);

        assert_eq!(
            source.acquire(Province::Valencia, false).unwrap(),
            dir.join("valencia.geojson")
        );
        assert_eq!(
            source.acquire(Province::Valencia, true).unwrap(),
            dir.join("valencia.geojson")
        );
        assert!(matches!(
            source.acquire(Province::Alicante, false),
            Err(AcquireError::Missing { .. })
        ));
    }
}
