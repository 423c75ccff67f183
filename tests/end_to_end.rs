use std::fs::{self, File};
use std::io::Cursor;
use std::path::Path;

use arrow::array::{Array, StringArray, UInt32Array};
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::Array3;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use poldiv::config::{BuildOptions, DatasetConfig};
use poldiv::data::loader::{load_taxonomy, write_interleaved_sample, write_sample, ArchiveReader};
use poldiv::{generate_examples, ChannelId, PoldivError, Record, TaxonomyResolver};

/// Plane `k` of sample `tag` holds `tag * 100 + k`.
fn sample(tag: u16, planes: usize) -> Vec<u8> {
    let image = Array3::from_shape_fn((6, 5, planes), |(_, _, k)| tag * 100 + k as u16);
    let mut buf = Cursor::new(Vec::new());
    write_sample(&mut buf, image.view()).unwrap();
    buf.into_inner()
}

fn write_archive(path: &Path, files: &[(&str, Vec<u8>)]) {
    let file = File::create(path).unwrap();
    let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    tar.append_dir("urtica", std::env::temp_dir()).unwrap();
    for (name, bytes) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, name, bytes.as_slice()).unwrap();
    }
    tar.into_inner().unwrap().finish().unwrap();
}

/// Lays out manual dir, resources and output root under `root`.
fn fixture(root: &Path) -> (DatasetConfig, BuildOptions) {
    let config = DatasetConfig::named("all").unwrap();
    let options = BuildOptions {
        manual_dir: root.join("manual"),
        data_dir: root.join("data"),
        resources_dir: root.join("poldiv"),
        batch_rows: 1,
    };
    fs::create_dir_all(&options.manual_dir).unwrap();
    fs::create_dir_all(&options.resources_dir).unwrap();

    write_archive(
        &options.manual_dir.join(&config.archive),
        &[
            ("urtica/urtica.dioica_01.tif", sample(1, 24)),
            ("plantago.lanceolata_02.tif", sample(2, 18)),
        ],
    );
    fs::write(
        options.mapping_file(),
        "urtica.dioica,Urtica\nplantago.lanceolata,Plantago\n",
    )
    .unwrap();
    fs::write(
        options.species_names_file(config.selection),
        "plantago.lanceolata\nurtica.dioica\n",
    )
    .unwrap();
    fs::write(options.genus_names_file(config.selection), "Plantago\nUrtica\n").unwrap();
    (config, options)
}

fn plane_value(record: &Record, masks: bool, key: &str) -> u16 {
    let map = if masks { &record.masks } else { &record.channels };
    let plane = &map[&key.parse::<ChannelId>().unwrap()];
    assert_eq!(plane.dim(), (6, 5));
    plane[[5, 4]]
}

#[test]
fn archive_yields_records_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let (config, options) = fixture(dir.path());

    let resolver = TaxonomyResolver::new(load_taxonomy(&options.mapping_file()).unwrap()).unwrap();
    let mut archive = ArchiveReader::open(&options.manual_dir.join(&config.archive)).unwrap();
    let records: Vec<(String, Record)> = generate_examples(archive.files().unwrap(), &resolver)
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(records.len(), 2);
    let (name, urtica) = &records[0];
    assert_eq!(name, "urtica/urtica.dioica_01.tif");
    assert_eq!(urtica.filename, *name);
    assert_eq!((urtica.species.as_str(), urtica.genus.as_str()), ("urtica.dioica", "Urtica"));
    assert_eq!(plane_value(urtica, false, "1"), 100);
    assert_eq!(plane_value(urtica, false, "9"), 108);
    assert_eq!(plane_value(urtica, true, "1"), 112);
    assert_eq!(plane_value(urtica, true, "9"), 120);

    let (name, plantago) = &records[1];
    assert_eq!(name, "plantago.lanceolata_02.tif");
    assert_eq!(plantago.genus, "Plantago");
    assert_eq!(plantago.channels.len(), 7);
    assert_eq!(plane_value(plantago, false, "9"), 206);
    assert_eq!(plane_value(plantago, true, "6"), 212);
    assert_eq!(plane_value(plantago, true, "9"), 213);
}

#[test]
fn interleaved_exports_flow_through_generation() {
    let dir = tempfile::tempdir().unwrap();
    let (_, options) = fixture(dir.path());

    let interleaved = |tag: u16, planes: usize| {
        let image = Array3::from_shape_fn((6, 5, planes), |(_, _, k)| tag * 100 + k as u16);
        let mut bytes = Vec::new();
        write_interleaved_sample(&mut bytes, image.view()).unwrap();
        bytes
    };
    let archive_path = dir.path().join("interleaved.tar.gz");
    write_archive(
        &archive_path,
        &[
            ("urtica/urtica.dioica_07.tif", interleaved(3, 24)),
            ("plantago.lanceolata_08.tif", interleaved(4, 14)),
        ],
    );

    let resolver = TaxonomyResolver::new(load_taxonomy(&options.mapping_file()).unwrap()).unwrap();
    let mut archive = ArchiveReader::open(&archive_path).unwrap();
    let records: Vec<(String, Record)> = generate_examples(archive.files().unwrap(), &resolver)
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(records.len(), 2);
    let (_, urtica) = &records[0];
    assert_eq!(plane_value(urtica, false, "9"), 308);
    assert_eq!(plane_value(urtica, true, "6"), 317);
    assert_eq!(plane_value(urtica, true, "9"), 320);

    let (_, plantago) = &records[1];
    assert_eq!(plantago.genus, "Plantago");
    assert_eq!(plane_value(plantago, false, "9"), 406);
    assert_eq!(plane_value(plantago, true, "1"), 407);
    assert_eq!(plane_value(plantago, true, "9"), 413);
}

#[test]
fn build_writes_parquet_and_info() {
    let dir = tempfile::tempdir().unwrap();
    let (config, options) = fixture(dir.path());

    let info = poldiv::build(&config, &options).unwrap();
    let train = &info.splits["train"];
    assert_eq!(train.num_examples, 2);
    assert_eq!(train.genus["Urtica"], 1);

    let out_dir = options.output_dir(&config);
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("dataset_info.json")).unwrap()).unwrap();
    assert_eq!(json["splits"]["train"]["num_examples"], 2);
    assert_eq!(json["features"]["species"]["num_classes"], 2);

    let file = File::open(out_dir.join("poldiv-train.parquet")).unwrap();
    let reader = ParquetRecordBatchReaderBuilder::try_new(file).unwrap().build().unwrap();
    let mut filenames = Vec::new();
    let mut species_labels = Vec::new();
    for batch in reader {
        let batch = batch.unwrap();
        let names = batch.column_by_name("filename").unwrap();
        let names = names.as_any().downcast_ref::<StringArray>().unwrap();
        let labels = batch.column_by_name("species_label").unwrap();
        let labels = labels.as_any().downcast_ref::<UInt32Array>().unwrap();
        for i in 0..batch.num_rows() {
            filenames.push(names.value(i).to_string());
            species_labels.push(labels.value(i));
        }
    }
    assert_eq!(filenames, ["urtica/urtica.dioica_01.tif", "plantago.lanceolata_02.tif"]);
    assert_eq!(species_labels, [1, 0]);
}

#[test]
fn missing_archive_fails_before_generation() {
    let dir = tempfile::tempdir().unwrap();
    let (config, options) = fixture(dir.path());
    fs::remove_file(options.manual_dir.join(&config.archive)).unwrap();

    let err = poldiv::build(&config, &options).unwrap_err();
    assert!(matches!(err, PoldivError::MissingArchive { .. }));
    assert!(!options.output_dir(&config).exists());
}

#[test]
fn unknown_species_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let (config, options) = fixture(dir.path());
    fs::write(options.mapping_file(), "urtica.dioica,Urtica\n").unwrap();

    let err = poldiv::build(&config, &options).unwrap_err();
    match err {
        PoldivError::GenusNotFound { species } => assert_eq!(species, "plantago.lanceolata"),
        other => panic!("unexpected error {other:?}"),
    }
}
