use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{error, info};
use ndarray::Axis;

use super::demux::demux;
use super::loader::read_sample;
use super::model::{Record, SampleImage};
use super::taxonomy::TaxonomyResolver;
use crate::config::DatasetConfig;
use crate::error::{PoldivError, Result};
use crate::schema::MANUAL_DOWNLOAD_INSTRUCTIONS;

// ---------------------------------------------------------------------------
// Split generation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => f.write_str("train"),
        }
    }
}

/// A split and the archive its examples come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitGenerator {
    pub split: Split,
    pub archive: PathBuf,
}

/// Check the manually downloaded archive is present and describe the splits.
pub fn split_generators(config: &DatasetConfig, manual_dir: &Path) -> Result<Vec<SplitGenerator>> {
    let archive = manual_dir.join(&config.archive);
    if !archive.is_file() {
        error!("{} not found. {MANUAL_DOWNLOAD_INSTRUCTIONS}", archive.display());
        return Err(PoldivError::MissingArchive {
            path: archive,
            manual_dir: manual_dir.to_path_buf(),
        });
    }
    info!("config '{}' reads {}", config.name, archive.display());
    Ok(vec![SplitGenerator {
        split: Split::Train,
        archive,
    }])
}

// ---------------------------------------------------------------------------
// Example assembly
// ---------------------------------------------------------------------------

/// Build one [`Record`] from a decoded sample.
pub fn assemble(resolver: &TaxonomyResolver, filename: &str, image: SampleImage) -> Result<Record> {
    let (species, genus) = resolver.resolve(filename)?;

    let planes = image.len_of(Axis(2));
    if planes % 2 != 0 {
        return Err(PoldivError::UnrecognizedLayout {
            filename: filename.to_string(),
            channels: format!("{}", planes as f64 / 2.0),
        });
    }
    let (channels, masks) = demux(filename, image.view(), planes / 2)?;

    Ok(Record {
        channels,
        masks,
        filename: filename.to_string(),
        species,
        genus,
    })
}

/// Lazily turn `(filename, handle)` pairs into records, in input order.
///
/// Yields the first error it meets and then ends.
pub fn generate_examples<'r, I, H>(files: I, resolver: &'r TaxonomyResolver) -> Examples<'r, I>
where
    I: Iterator<Item = Result<(String, H)>>,
    H: Read,
{
    Examples {
        files,
        resolver,
        failed: false,
    }
}

/// Iterator returned by [`generate_examples`].
pub struct Examples<'r, I> {
    files: I,
    resolver: &'r TaxonomyResolver,
    failed: bool,
}

impl<'r, I, H> Iterator for Examples<'r, I>
where
    I: Iterator<Item = Result<(String, H)>>,
    H: Read,
{
    type Item = Result<(String, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = self.files.next()?.and_then(|(filename, handle)| {
            let image = read_sample(&filename, handle)?;
            let record = assemble(self.resolver, &filename, image)?;
            Ok((filename, record))
        });
        if let Err(e) = &result {
            error!("generation aborted: {e}");
            self.failed = true;
        }
        Some(result)
    }
}
