use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ChannelId – detector channel label
// ---------------------------------------------------------------------------

/// One of the seven exported detector channels: `1`..`6` and `9`.
///
/// Ordering is numeric, so a [`PlaneMap`] iterates `1, 2, .., 6, 9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(u8);

impl ChannelId {
    /// All channel identifiers, in feature order.
    pub const ALL: [ChannelId; 7] = [
        ChannelId(1),
        ChannelId(2),
        ChannelId(3),
        ChannelId(4),
        ChannelId(5),
        ChannelId(6),
        ChannelId(9),
    ];

    /// The channel number as written by the instrument.
    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChannelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelId::ALL
            .into_iter()
            .find(|id| id.to_string() == s)
            .ok_or_else(|| format!("unknown channel '{s}'"))
    }
}

impl TryFrom<String> for ChannelId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.to_string()
    }
}

// ---------------------------------------------------------------------------
// Planes
// ---------------------------------------------------------------------------

/// A decoded sample: `(height, width, planes)` of raw 16-bit detector values.
pub type SampleImage = Array3<u16>;

/// A single 2-D plane (`height × width`).
pub type Plane = Array2<u16>;

/// Channel identifier → plane. Used for both intensity channels and masks.
pub type PlaneMap = BTreeMap<ChannelId, Plane>;

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

/// One row of the species → genus mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    /// Lowercase dotted binomial, e.g. `urtica.dioica`.
    pub species: String,
    pub genus: String,
}

/// The mapping table, loaded once per run and held read-only.
#[derive(Debug, Clone, Default)]
pub struct TaxonomyTable {
    entries: Vec<TaxonomyEntry>,
}

impl TaxonomyTable {
    pub fn new(entries: Vec<TaxonomyEntry>) -> Self {
        Self { entries }
    }

    /// Genus for `species`; first exact match wins.
    pub fn genus_of(&self, species: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.species == species)
            .map(|entry| entry.genus.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Record – one assembled example
// ---------------------------------------------------------------------------

/// One fully assembled example, keyed by `filename`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub channels: PlaneMap,
    pub masks: PlaneMap,
    pub filename: String,
    pub species: String,
    pub genus: String,
}

impl Record {
    /// `(height, width)` of the sample; all planes share it.
    pub fn shape(&self) -> (usize, usize) {
        self.channels
            .values()
            .next()
            .map(|plane| plane.dim())
            .unwrap_or((0, 0))
    }
}

// ---------------------------------------------------------------------------
// DatasetSummary – split statistics
// ---------------------------------------------------------------------------

/// Example counts for one split, overall and per label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub num_examples: usize,
    pub species: BTreeMap<String, usize>,
    pub genus: BTreeMap<String, usize>,
}

impl DatasetSummary {
    /// Account for one more record.
    pub fn observe(&mut self, record: &Record) {
        self.num_examples += 1;
        *self.species.entry(record.species.clone()).or_default() += 1;
        *self.genus.entry(record.genus.clone()).or_default() += 1;
    }
}
