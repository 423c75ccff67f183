/// Data layer: core types, archive/TIFF loading, taxonomy and demultiplexing.
///
/// Architecture:
/// ```text
///  poldiv-dataset-*.tar.gz        mapping-species-genus.csv
///        │                                │
///        ▼                                ▼
///   ┌──────────┐                   ┌────────────┐
///   │  loader   │ (name, handle)   │  taxonomy   │ filename → (species, genus)
///   └──────────┘                   └────────────┘
///        │ decode TIFF                    │
///        ▼                                │
///   ┌──────────┐                          │
///   │  demux    │ planes → channels/masks │
///   └──────────┘                          │
///        │                                │
///        ▼                                ▼
///   ┌──────────────────────────────────────────┐
///   │  generate   one Record per file, in order │
///   └──────────────────────────────────────────┘
/// ```

pub mod demux;
pub mod generate;
pub mod loader;
pub mod model;
pub mod taxonomy;
