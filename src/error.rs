use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// PoldivError – every fatal condition of a generation run
// ---------------------------------------------------------------------------

/// Errors raised while building the dataset.
///
/// None of them are recoverable: malformed input is a dataset-authoring defect
/// and aborts the run.
#[derive(Debug, Error)]
pub enum PoldivError {
    #[error("You must download the dataset .tar.gz file and place it into {}", manual_dir.display())]
    MissingArchive { path: PathBuf, manual_dir: PathBuf },

    #[error("no species token found in filename '{filename}'")]
    UnmatchedFilename { filename: String },

    #[error("Genus not found for {species}")]
    GenusNotFound { species: String },

    #[error("Unknown number of channels ({channels}) for file {filename}")]
    UnrecognizedLayout { filename: String, channels: String },

    #[error("file {filename}: layout needs plane {index} but image has {planes} planes")]
    PlaneOutOfRange {
        filename: String,
        index: usize,
        planes: usize,
    },

    #[error("file {filename}: page {page} is {got:?}, expected {expected:?} (width, height)")]
    PageSizeMismatch {
        filename: String,
        page: usize,
        expected: (u32, u32),
        got: (u32, u32),
    },

    #[error("file {filename}: unsupported TIFF sample format {detail}")]
    UnsupportedSamples { filename: String, detail: String },

    #[error("failed to decode TIFF {filename}")]
    Decode {
        filename: String,
        #[source]
        source: tiff::TiffError,
    },

    #[error("failed to encode TIFF")]
    Encode(#[source] tiff::TiffError),

    #[error("'{value}' is not a valid {feature} label")]
    UnknownLabel { feature: String, value: String },

    #[error("selection must be one of {options:?}, got '{name}'")]
    UnknownSelection {
        name: String,
        options: Vec<&'static str>,
    },

    #[error("archive entry has a non UTF-8 path: {0}")]
    NonUtf8Path(String),

    #[error(transparent)]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PoldivError>;
