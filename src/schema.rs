//! Static dataset metadata: features, class vocabularies and `dataset_info.json`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Serialize;

use crate::config::{BuildOptions, DatasetConfig, Version};
use crate::data::loader::load_names;
use crate::data::model::{ChannelId, DatasetSummary};
use crate::error::{PoldivError, Result};

pub const DESCRIPTION: &str = "The poldiv dataset contains IFC-measured pollen samples from 2018 to 2021 \
in 117 species and 57 genera. The images are R3/R4-gated and depict single in-focus, non-cropped cells (R4) \
or cells/multiple cells of the same species of poor quality that are cropped or polluted (R3). The dataset \
yields the individual multispectral channels and their corresponding default masks that are generated by \
the Amnis ImageStream Mk II as separate 16-bit images with varying width and height.";

// TODO: fill in once the dataset paper has a BibTeX entry.
pub const CITATION: &str = "";

pub const HOMEPAGE: &str = "https://github.com/lahr/icyt-tfds";

pub const MANUAL_DOWNLOAD_INSTRUCTIONS: &str =
    "Place the dataset tar.gz file in the manual download directory (--manual-dir).";

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// How a feature is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Feature {
    /// 2-D tensor of variable height and width.
    Tensor {
        dtype: &'static str,
        shape: [Option<usize>; 2],
        encoding: &'static str,
    },
    Text,
    ClassLabel { names_file: String, num_classes: usize },
}

impl Feature {
    fn plane() -> Self {
        Feature::Tensor {
            dtype: "uint16",
            shape: [None, None],
            encoding: "zlib",
        }
    }
}

/// Flat feature dictionary; nested features use `parent/child` keys.
pub fn features(schema: &Schema, options: &BuildOptions, config: &DatasetConfig) -> BTreeMap<String, Feature> {
    let mut features = BTreeMap::new();
    for id in ChannelId::ALL {
        features.insert(format!("channels/{id}"), Feature::plane());
        features.insert(format!("masks/{id}"), Feature::plane());
    }
    features.insert("filename".to_string(), Feature::Text);
    features.insert(
        "species".to_string(),
        Feature::ClassLabel {
            names_file: options
                .species_names_file(config.selection)
                .display()
                .to_string(),
            num_classes: schema.species.num_classes(),
        },
    );
    features.insert(
        "genus".to_string(),
        Feature::ClassLabel {
            names_file: options
                .genus_names_file(config.selection)
                .display()
                .to_string(),
            num_classes: schema.genus.num_classes(),
        },
    );
    features
}

// ---------------------------------------------------------------------------
// ClassLabel – closed, ordered vocabulary
// ---------------------------------------------------------------------------

/// Label ↔ integer encoding backed by an ordered name list.
#[derive(Debug, Clone)]
pub struct ClassLabel {
    feature: String,
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl ClassLabel {
    pub fn new(feature: &str, names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self {
            feature: feature.to_string(),
            names,
            index,
        }
    }

    pub fn from_file(feature: &str, path: &Path) -> Result<Self> {
        Ok(Self::new(feature, load_names(path)?))
    }

    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

    pub fn encode(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| PoldivError::UnknownLabel {
                feature: self.feature.clone(),
                value: name.to_string(),
            })
    }

    pub fn decode(&self, label: usize) -> Option<&str> {
        self.names.get(label).map(String::as_str)
    }
}

/// Both label vocabularies of one configuration.
#[derive(Debug, Clone)]
pub struct Schema {
    pub species: ClassLabel,
    pub genus: ClassLabel,
}

impl Schema {
    pub fn load(options: &BuildOptions, config: &DatasetConfig) -> Result<Self> {
        Ok(Self {
            species: ClassLabel::from_file("species", &options.species_names_file(config.selection))?,
            genus: ClassLabel::from_file("genus", &options.genus_names_file(config.selection))?,
        })
    }
}

// ---------------------------------------------------------------------------
// DatasetInfo – serialized next to the records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseNote {
    pub version: Version,
    pub note: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub name: &'static str,
    pub config: DatasetConfig,
    pub description: &'static str,
    pub citation: &'static str,
    pub homepage: &'static str,
    pub release_notes: Vec<ReleaseNote>,
    pub features: BTreeMap<String, Feature>,
    pub splits: BTreeMap<String, DatasetSummary>,
}

impl DatasetInfo {
    pub fn new(schema: &Schema, options: &BuildOptions, config: &DatasetConfig) -> Self {
        Self {
            name: "poldiv",
            config: config.clone(),
            description: DESCRIPTION,
            citation: CITATION,
            homepage: HOMEPAGE,
            release_notes: config
                .release_notes()
                .iter()
                .map(|(version, note)| ReleaseNote {
                    version: *version,
                    note: *note,
                })
                .collect(),
            features: features(schema, options, config),
            splits: BTreeMap::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema {
            species: ClassLabel::new(
                "species",
                vec!["plantago.lanceolata".into(), "urtica.dioica".into()],
            ),
            genus: ClassLabel::new("genus", vec!["Plantago".into(), "Urtica".into()]),
        }
    }

    #[test]
    fn class_label_encodes_by_position() {
        let s = schema();
        assert_eq!(s.species.encode("urtica.dioica").unwrap(), 1);
        assert_eq!(s.genus.decode(0), Some("Plantago"));
        assert!(matches!(
            s.genus.encode("Betula"),
            Err(PoldivError::UnknownLabel { ref feature, .. }) if feature == "genus"
        ));
    }

    #[test]
    fn features_cover_every_channel_and_mask() {
        let config = DatasetConfig::named("all").unwrap();
        let features = features(&schema(), &BuildOptions::default(), &config);
        assert_eq!(features.len(), 7 + 7 + 3);
        assert_eq!(features["channels/9"], Feature::plane());
        assert_eq!(features["masks/1"], Feature::plane());
        assert_eq!(features["filename"], Feature::Text);
        assert!(matches!(features["species"], Feature::ClassLabel { num_classes: 2, .. }));
    }

    #[test]
    fn info_serializes_version_as_string() {
        let config = DatasetConfig::named("all").unwrap();
        let info = DatasetInfo::new(&schema(), &BuildOptions::default(), &config);
        let json: serde_json::Value = serde_json::from_str(&info.to_json().unwrap()).unwrap();
        assert_eq!(json["config"]["version"], "3.0.0");
        assert_eq!(json["config"]["selection"], "all");
        assert_eq!(json["release_notes"][7]["note"], "Initial release.");
        assert_eq!(json["features"]["channels/1"]["encoding"], "zlib");
    }
}
