use log::info;

use crate::config::{BuildOptions, DatasetConfig};
use crate::data::generate::{generate_examples, split_generators};
use crate::data::loader::{load_taxonomy, ArchiveReader};
use crate::data::taxonomy::TaxonomyResolver;
use crate::error::Result;
use crate::schema::{DatasetInfo, Schema};
use crate::writer::{write_info, RecordWriter};

/// Generate every split of `config` and write records plus `dataset_info.json`
/// under [`BuildOptions::output_dir`].
pub fn build(config: &DatasetConfig, options: &BuildOptions) -> Result<DatasetInfo> {
    let splits = split_generators(config, &options.manual_dir)?;

    let schema = Schema::load(options, config)?;
    let resolver = TaxonomyResolver::new(load_taxonomy(&options.mapping_file())?)?;
    info!(
        "{} species, {} genera, {} taxonomy rows",
        schema.species.num_classes(),
        schema.genus.num_classes(),
        resolver.table().len()
    );

    let out_dir = options.output_dir(config);
    let mut dataset_info = DatasetInfo::new(&schema, options, config);

    for split in splits {
        let mut archive = ArchiveReader::open(&split.archive)?;
        let mut writer = RecordWriter::create(&out_dir, split.split, &schema, options.batch_rows)?;
        for example in generate_examples(archive.files()?, &resolver) {
            let (_, record) = example?;
            writer.write(&record)?;
        }
        let (_, summary) = writer.finish()?;
        info!("{}: {} examples", split.split, summary.num_examples);
        dataset_info.splits.insert(split.split.to_string(), summary);
    }

    let info_path = write_info(&out_dir, &dataset_info)?;
    info!("dataset info written to {}", info_path.display());
    Ok(dataset_info)
}
