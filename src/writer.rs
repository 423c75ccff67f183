//! Parquet sink for assembled records.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, ListBuilder, StringBuilder, UInt16Builder, UInt32Builder};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema, SchemaRef};
use arrow::record_batch::RecordBatch;
use log::{debug, info};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;

use crate::data::generate::Split;
use crate::data::model::{ChannelId, DatasetSummary, Plane, Record};
use crate::error::Result;
use crate::schema::{DatasetInfo, Schema};

// ---------------------------------------------------------------------------
// Arrow layout
// ---------------------------------------------------------------------------

fn plane_type() -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::UInt16, true)))
}

/// Column layout of a records file.
pub fn record_schema() -> SchemaRef {
    let mut fields = vec![
        Field::new("filename", DataType::Utf8, false),
        Field::new("species", DataType::Utf8, false),
        Field::new("species_label", DataType::UInt32, false),
        Field::new("genus", DataType::Utf8, false),
        Field::new("genus_label", DataType::UInt32, false),
        Field::new("height", DataType::UInt32, false),
        Field::new("width", DataType::UInt32, false),
    ];
    for group in ["channels", "masks"] {
        for id in ChannelId::ALL {
            fields.push(Field::new(format!("{group}/{id}"), plane_type(), false));
        }
    }
    Arc::new(ArrowSchema::new(fields))
}

/// Column builders for one pending batch.
struct BatchBuilder {
    filename: StringBuilder,
    species: StringBuilder,
    species_label: UInt32Builder,
    genus: StringBuilder,
    genus_label: UInt32Builder,
    height: UInt32Builder,
    width: UInt32Builder,
    channels: Vec<ListBuilder<UInt16Builder>>,
    masks: Vec<ListBuilder<UInt16Builder>>,
    rows: usize,
}

impl BatchBuilder {
    fn new() -> Self {
        let planes = || -> Vec<ListBuilder<UInt16Builder>> {
            ChannelId::ALL
                .iter()
                .map(|_| ListBuilder::new(UInt16Builder::new()))
                .collect()
        };
        Self {
            filename: StringBuilder::new(),
            species: StringBuilder::new(),
            species_label: UInt32Builder::new(),
            genus: StringBuilder::new(),
            genus_label: UInt32Builder::new(),
            height: UInt32Builder::new(),
            width: UInt32Builder::new(),
            channels: planes(),
            masks: planes(),
            rows: 0,
        }
    }

    fn push(&mut self, record: &Record, species_label: u32, genus_label: u32) {
        let (height, width) = record.shape();
        self.filename.append_value(&record.filename);
        self.species.append_value(&record.species);
        self.species_label.append_value(species_label);
        self.genus.append_value(&record.genus);
        self.genus_label.append_value(genus_label);
        self.height.append_value(height as u32);
        self.width.append_value(width as u32);
        for (i, id) in ChannelId::ALL.iter().enumerate() {
            append_plane(&mut self.channels[i], record.channels.get(id));
            append_plane(&mut self.masks[i], record.masks.get(id));
        }
        self.rows += 1;
    }

    fn finish(&mut self, schema: SchemaRef) -> Result<RecordBatch> {
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(self.filename.finish()),
            Arc::new(self.species.finish()),
            Arc::new(self.species_label.finish()),
            Arc::new(self.genus.finish()),
            Arc::new(self.genus_label.finish()),
            Arc::new(self.height.finish()),
            Arc::new(self.width.finish()),
        ];
        for builder in self.channels.iter_mut().chain(self.masks.iter_mut()) {
            columns.push(Arc::new(builder.finish()));
        }
        self.rows = 0;
        Ok(RecordBatch::try_new(schema, columns)?)
    }
}

/// Row-major plane values; a missing plane is stored as an empty list.
fn append_plane(builder: &mut ListBuilder<UInt16Builder>, plane: Option<&Plane>) {
    if let Some(plane) = plane {
        let values = builder.values();
        for v in plane.iter() {
            values.append_value(*v);
        }
    }
    builder.append(true);
}

// ---------------------------------------------------------------------------
// RecordWriter
// ---------------------------------------------------------------------------

/// Writes one split to `<dir>/poldiv-<split>.parquet`, encoding labels
/// against the schema vocabularies.
pub struct RecordWriter<'s> {
    schema: &'s Schema,
    arrow_schema: SchemaRef,
    writer: ArrowWriter<File>,
    pending: BatchBuilder,
    batch_rows: usize,
    summary: DatasetSummary,
    path: PathBuf,
}

impl<'s> RecordWriter<'s> {
    pub fn create(dir: &Path, split: Split, schema: &'s Schema, batch_rows: usize) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("poldiv-{split}.parquet"));
        let file = File::create(&path)?;
        let arrow_schema = record_schema();
        let props = WriterProperties::builder()
            .set_compression(Compression::GZIP(GzipLevel::default()))
            .build();
        let writer = ArrowWriter::try_new(file, arrow_schema.clone(), Some(props))?;
        info!("writing {split} split to {}", path.display());
        Ok(Self {
            schema,
            arrow_schema,
            writer,
            pending: BatchBuilder::new(),
            batch_rows: batch_rows.max(1),
            summary: DatasetSummary::default(),
            path,
        })
    }

    /// Queue a record; fails if its labels are outside the vocabularies.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        let species_label = self.schema.species.encode(&record.species)? as u32;
        let genus_label = self.schema.genus.encode(&record.genus)? as u32;
        self.pending.push(record, species_label, genus_label);
        self.summary.observe(record);
        if self.pending.rows >= self.batch_rows {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.rows == 0 {
            return Ok(());
        }
        let batch = self.pending.finish(self.arrow_schema.clone())?;
        debug!("flushing {} rows", batch.num_rows());
        self.writer.write(&batch)?;
        Ok(())
    }

    /// Flush outstanding rows and close the file.
    pub fn finish(mut self) -> Result<(PathBuf, DatasetSummary)> {
        self.flush()?;
        self.writer.close()?;
        info!(
            "wrote {} examples to {}",
            self.summary.num_examples,
            self.path.display()
        );
        Ok((self.path, self.summary))
    }
}

/// Write `dataset_info.json` into `dir`.
pub fn write_info(dir: &Path, info: &DatasetInfo) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join("dataset_info.json");
    fs::write(&path, info.to_json()?)?;
    Ok(path)
}
