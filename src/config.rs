use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_THREADS: usize = 3;

/// Provinces with a CartoCiudad street-number dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Province {
    Alicante,
    Castellon,
    Valencia,
}

impl Province {
    pub const ALL: [Province; 3] = [Province::Alicante, Province::Castellon, Province::Valencia];

    pub fn name(self) -> &'static str {
        match self {
            Province::Alicante => "alicante",
            Province::Castellon => "castellon",
            Province::Valencia => "valencia",
        }
    }

    /// Dataset id in the CNIG download centre.
    pub fn dataset_id(self) -> u32 {
        match self {
            Province::Alicante => 9106,
            Province::Castellon => 9088,
            Province::Valencia => 9129,
        }
    }
}

impl fmt::Display for Province {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Province {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Province::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "Invalid province: {}. Valid options are: {}",
                    s,
                    Province::ALL.map(Province::name).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvinceSelection {
    #[default]
    All,
    One(Province),
}

impl FromStr for ProvinceSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(ProvinceSelection::All)
        } else {
            s.parse().map(ProvinceSelection::One)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub working_dir: PathBuf,
    pub province: ProvinceSelection,
    /// Re-acquire datasets even when a cached copy exists.
    pub force: bool,
    pub threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            province: ProvinceSelection::All,
            force: false,
            threads: DEFAULT_THREADS,
        }
    }
}

impl Config {
    pub fn provinces(&self) -> Vec<Province> {
        match self.province {
            ProvinceSelection::All => Province::ALL.to_vec(),
            ProvinceSelection::One(province) => vec![province],
        }
    }

    /// Worker pool size: configured threads capped by available cores.
    pub fn worker_count(&self) -> usize {
        let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
        self.threads.clamp(1, cores.max(1))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.working_dir.join("data")
    }

    pub fn provinces_dir(&self) -> PathBuf {
        self.data_dir().join("provinces")
    }

    pub fn postcodes_dir(&self) -> PathBuf {
        self.data_dir().join("postcodes")
    }

    pub fn centroids_path(&self) -> PathBuf {
        self.data_dir().join("postcodes.csv")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir().join("dcac-postcodes.log")
    }
}
