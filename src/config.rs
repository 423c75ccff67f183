use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{PoldivError, Result};

/// Names accepted for [`Selection`].
pub const DATA_OPTIONS: [&str; 1] = ["all"];

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Which subset of the corpus a configuration builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    All,
}

impl Selection {
    pub fn as_str(self) -> &'static str {
        match self {
            Selection::All => "all",
        }
    }
}

impl FromStr for Selection {
    type Err = PoldivError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Selection::All),
            other => Err(PoldivError::UnknownSelection {
                name: other.to_string(),
                options: DATA_OPTIONS.to_vec(),
            }),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Dataset version, `major.minor.patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub const VERSION: Version = Version::new(3, 0, 0);

/// Newest first.
pub const RELEASE_NOTES: [(Version, &str); 8] = [
    (Version::new(3, 0, 0), "New dataset"),
    (Version::new(2, 4, 0), "Removed builder config for balanced dataset"),
    (Version::new(2, 3, 0), "Builder config for balanced dataset"),
    (Version::new(2, 2, 0), "Genus as separate feature"),
    (Version::new(2, 1, 0), "Builder configs for all-species and all-genus"),
    (Version::new(2, 0, 0), "Additional Urtica samples"),
    (Version::new(1, 0, 0), "Full dataset"),
    (Version::new(0, 1, 0), "Initial release."),
];

// ---------------------------------------------------------------------------
// DatasetConfig
// ---------------------------------------------------------------------------

/// One named build variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetConfig {
    pub name: String,
    pub selection: Selection,
    /// Archive file name expected in the manual download directory.
    pub archive: String,
    pub description: String,
    pub version: Version,
}

impl DatasetConfig {
    pub fn new(name: &str, selection: Selection, archive: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            selection,
            archive: archive.to_string(),
            description: description.to_string(),
            version: VERSION,
        }
    }

    /// Look up a variant of [`builder_configs`] by name.
    pub fn named(name: &str) -> Result<Self> {
        builder_configs()
            .into_iter()
            .find(|config| config.name == name)
            .ok_or_else(|| PoldivError::UnknownSelection {
                name: name.to_string(),
                options: DATA_OPTIONS.to_vec(),
            })
    }

    pub fn release_notes(&self) -> &'static [(Version, &'static str)] {
        &RELEASE_NOTES
    }
}

/// Every variant this dataset can be built as.
pub fn builder_configs() -> Vec<DatasetConfig> {
    vec![DatasetConfig::new(
        "all",
        Selection::All,
        "poldiv-dataset-3.0.0.tar.gz",
        "All samples, channels 1/2/3/4/5/6/9 only",
    )]
}

// ---------------------------------------------------------------------------
// BuildOptions – where things live on disk
// ---------------------------------------------------------------------------

/// Filesystem locations and writer settings for one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory the archive must be placed in by hand.
    pub manual_dir: PathBuf,
    /// Root of the generated dataset tree.
    pub data_dir: PathBuf,
    /// Directory holding the mapping CSV and class-name files.
    pub resources_dir: PathBuf,
    /// Records per Parquet row group.
    pub batch_rows: usize,
}

impl BuildOptions {
    pub fn mapping_file(&self) -> PathBuf {
        self.resources_dir.join("mapping-species-genus.csv")
    }

    pub fn species_names_file(&self, selection: Selection) -> PathBuf {
        self.resources_dir
            .join(format!("classes-{selection}-species.txt"))
    }

    pub fn genus_names_file(&self, selection: Selection) -> PathBuf {
        self.resources_dir.join(format!("classes-{selection}-genus.txt"))
    }

    /// `<data_dir>/poldiv/<config>/<version>`
    pub fn output_dir(&self, config: &DatasetConfig) -> PathBuf {
        self.data_dir
            .join("poldiv")
            .join(&config.name)
            .join(config.version.to_string())
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        let data_dir = PathBuf::from("tensorflow_datasets");
        Self {
            manual_dir: data_dir.join("downloads").join("manual"),
            data_dir,
            resources_dir: PathBuf::from("poldiv"),
            batch_rows: 64,
        }
    }
}
