use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use ndarray::Array3;

use poldiv::config::{BuildOptions, DatasetConfig, Selection};
use poldiv::data::loader::{write_interleaved_sample, write_sample};

#[derive(Debug, Parser)]
#[command(name = "generate_sample", about = "Write a small synthetic poldiv archive and side tables")]
struct Opt {
    /// Output root; receives downloads/manual/ and poldiv/
    #[arg(short, long, default_value = "sample")]
    output: PathBuf,

    /// Samples per species
    #[arg(short = 'n', long, default_value_t = 4)]
    per_species: usize,

    #[arg(short, long, default_value_t = 42)]
    seed: u64,
}

/// (species as written in filenames, corrected species, genus, channel count)
const SPECIES: [(&str, &str, &str, usize); 5] = [
    ("urtica.dioica", "urtica.dioica", "Urtica", 12),
    ("Plantago.lanceolata", "plantago.lanceolata", "Plantago", 9),
    ("Chaenopodium.album", "chenopodium.album", "Chenopodium", 9),
    ("galium.mullogo", "galium.mollugo", "Galium", 7),
    ("Ginkgo.bilboa", "ginkgo.biloba", "Ginkgo", 12),
];

/// splitmix64; plenty for reproducible toy images.
struct Rng(u64);

impl Rng {
    fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        (z ^ (z >> 31)) as f64 / u64::MAX as f64
    }

    fn range(&mut self, lo: usize, hi: usize) -> usize {
        lo + (self.next_f64() * (hi - lo) as f64) as usize
    }
}

/// One cell: a bright ellipse per channel over a noisy background, masks are
/// the thresholded ellipse.
fn synthetic_cell(channels: usize, rng: &mut Rng) -> Array3<u16> {
    let height = rng.range(24, 48);
    let width = rng.range(24, 48);
    let (cy, cx) = (height as f64 / 2.0, width as f64 / 2.0);
    let (ry, rx) = (cy * 0.7, cx * 0.6);
    let gains: Vec<f64> = (0..channels).map(|_| 200.0 + rng.next_f64() * 3000.0).collect();

    let mut image = Array3::<u16>::zeros((height, width, 2 * channels));
    for r in 0..height {
        for c in 0..width {
            let d = ((r as f64 - cy) / ry).powi(2) + ((c as f64 - cx) / rx).powi(2);
            let inside = d <= 1.0;
            for (k, gain) in gains.iter().enumerate() {
                let signal = if inside { gain * (1.0 - 0.5 * d) } else { 0.0 };
                let noise = rng.next_f64() * 40.0;
                image[[r, c, k]] = (100.0 + signal + noise) as u16;
                image[[r, c, channels + k]] = u16::from(inside);
            }
        }
    }
    image
}

fn main() -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    builder.init();

    let opt = Opt::parse();
    let mut rng = Rng(opt.seed);

    let config = DatasetConfig::named("all")?;
    let options = BuildOptions {
        manual_dir: opt.output.join("downloads").join("manual"),
        data_dir: opt.output.clone(),
        resources_dir: opt.output.join("poldiv"),
        ..BuildOptions::default()
    };
    fs::create_dir_all(&options.manual_dir)?;
    fs::create_dir_all(&options.resources_dir)?;

    // Archive
    let archive_path = options.manual_dir.join(&config.archive);
    let file = File::create(&archive_path)
        .with_context(|| format!("creating {}", archive_path.display()))?;
    let mut tar = tar::Builder::new(GzEncoder::new(BufWriter::new(file), Compression::default()));
    let mut written = 0usize;
    for (raw, _, _, channels) in SPECIES {
        let dir = raw.split('.').next().unwrap_or(raw).to_lowercase();
        for i in 0..opt.per_species {
            let image = synthetic_cell(channels, &mut rng);
            // Alternate between nested/interleaved and flat/page-stack layouts.
            let mut buf = Cursor::new(Vec::new());
            if i % 2 == 0 {
                write_interleaved_sample(&mut buf, image.view())?;
            } else {
                write_sample(&mut buf, image.view())?;
            }
            let bytes = buf.into_inner();

            let name = if i % 2 == 0 {
                format!("{dir}/{raw}_{i:03}.tif")
            } else {
                format!("{raw}_{i:03}.tif")
            };
            let mut header = tar::Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append_data(&mut header, &name, bytes.as_slice())?;
            written += 1;
        }
    }
    tar.into_inner()?.finish()?.flush()?;
    info!("wrote {written} samples to {}", archive_path.display());

    // Side tables
    let mut mapping = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(options.mapping_file())?;
    for (_, species, genus, _) in SPECIES {
        mapping.write_record([species, genus])?;
    }
    mapping.flush()?;

    let mut species: Vec<&str> = SPECIES.iter().map(|(_, s, _, _)| *s).collect();
    let mut genera: Vec<&str> = SPECIES.iter().map(|(_, _, g, _)| *g).collect();
    species.sort_unstable();
    genera.sort_unstable();
    genera.dedup();
    fs::write(options.species_names_file(Selection::All), species.join("\n") + "\n")?;
    fs::write(options.genus_names_file(Selection::All), genera.join("\n") + "\n")?;

    info!(
        "side tables in {}; build with: poldiv build -d {} -r {}",
        options.resources_dir.display(),
        options.data_dir.display(),
        options.resources_dir.display()
    );
    Ok(())
}
