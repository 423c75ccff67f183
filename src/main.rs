use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use log::info;

use poldiv::config::{builder_configs, BuildOptions, DatasetConfig};
use poldiv::schema::{DatasetInfo, Schema};

#[derive(Debug, Parser)]
#[command(name = "poldiv", about = "Build the poldiv IFC pollen dataset from its manual download")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate records and dataset_info.json for one configuration
    Build {
        #[command(flatten)]
        paths: Paths,

        /// Rows per Parquet row group
        #[arg(long, default_value_t = 64)]
        batch_rows: usize,
    },
    /// Print dataset metadata as JSON
    Info {
        #[command(flatten)]
        paths: Paths,
    },
    /// List the available configurations
    Configs,
}

#[derive(Debug, clap::Args)]
struct Paths {
    /// Configuration name
    #[arg(short, long, default_value = "all")]
    config: String,

    /// Directory holding the manually downloaded archive
    /// (default: <data-dir>/downloads/manual)
    #[arg(short, long)]
    manual_dir: Option<PathBuf>,

    /// Output root
    #[arg(short, long, default_value = "tensorflow_datasets")]
    data_dir: PathBuf,

    /// Directory with mapping-species-genus.csv and classes-*.txt
    #[arg(short, long, default_value = "poldiv")]
    resources: PathBuf,
}

impl Paths {
    fn resolve(&self, batch_rows: usize) -> Result<(DatasetConfig, BuildOptions)> {
        let config = DatasetConfig::named(&self.config)?;
        let manual_dir = self
            .manual_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("downloads").join("manual"));
        let options = BuildOptions {
            manual_dir,
            data_dir: self.data_dir.clone(),
            resources_dir: self.resources.clone(),
            batch_rows,
        };
        Ok((config, options))
    }
}

fn main() -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    builder.init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build { paths, batch_rows } => {
            let (config, options) = paths.resolve(batch_rows)?;
            info!("building config '{}' v{}", config.name, config.version);
            let dataset_info = poldiv::build(&config, &options)
                .with_context(|| format!("building config '{}'", config.name))?;
            for (split, summary) in &dataset_info.splits {
                info!(
                    "{split}: {} examples, {} species, {} genera",
                    summary.num_examples,
                    summary.species.len(),
                    summary.genus.len()
                );
            }
        }
        Command::Info { paths } => {
            let (config, options) = paths.resolve(BuildOptions::default().batch_rows)?;
            let schema = Schema::load(&options, &config).context("loading class vocabularies")?;
            println!("{}", DatasetInfo::new(&schema, &options, &config).to_json()?);
        }
        Command::Configs => {
            for config in builder_configs() {
                println!("{}\t{}\t{}", config.name, config.archive, config.description);
            }
        }
    }
    Ok(())
}
