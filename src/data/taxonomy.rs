use log::debug;
use regex::Regex;

use super::model::TaxonomyTable;
use crate::error::{PoldivError, Result};

/// Optional lowercase directory, then the species token (letters with at most
/// one inner period), then anything.
const FILENAME_PATTERN: &str = r"^(?:([^/\n.A-Z]+)/)?([a-zA-Z]+\.?[a-zA-Z]+).*$";

/// Misspellings found in source filenames, keyed by the lowercased token.
const SPECIES_CORRECTIONS: [(&str, &str); 3] = [
    ("chaenopodium.album", "chenopodium.album"),
    ("galium.mullogo", "galium.mollugo"),
    ("ginkgo.bilboa", "ginkgo.biloba"),
];

/// Apply the fixed correction table to a lowercased species name.
pub fn correct_species(species: &str) -> &str {
    SPECIES_CORRECTIONS
        .iter()
        .find(|(wrong, _)| *wrong == species)
        .map(|(_, right)| *right)
        .unwrap_or(species)
}

// ---------------------------------------------------------------------------
// TaxonomyResolver
// ---------------------------------------------------------------------------

/// Derives `(species, genus)` from a sample filename.
#[derive(Debug, Clone)]
pub struct TaxonomyResolver {
    pattern: Regex,
    table: TaxonomyTable,
}

impl TaxonomyResolver {
    pub fn new(table: TaxonomyTable) -> Result<Self> {
        let pattern = Regex::new(FILENAME_PATTERN)?;
        Ok(Self { pattern, table })
    }

    pub fn table(&self) -> &TaxonomyTable {
        &self.table
    }

    /// Normalized (lowercased, corrected) species token of `filename`.
    pub fn species_of(&self, filename: &str) -> Result<String> {
        let token = self
            .pattern
            .captures(filename)
            .and_then(|caps| caps.get(2))
            .ok_or_else(|| PoldivError::UnmatchedFilename {
                filename: filename.to_string(),
            })?;
        let lowered = token.as_str().to_lowercase();
        Ok(correct_species(&lowered).to_string())
    }

    /// Resolve `filename` to `(species, genus)`.
    pub fn resolve(&self, filename: &str) -> Result<(String, String)> {
        let species = self.species_of(filename)?;
        let genus = self
            .table
            .genus_of(&species)
            .ok_or_else(|| PoldivError::GenusNotFound {
                species: species.clone(),
            })?
            .to_string();
        debug!("{filename}: species={species} genus={genus}");
        Ok((species, genus))
    }
}
