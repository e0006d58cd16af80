//! Patch fold organizer.
//!
//! Reads `<workdir>/manifest.csv`, assigns each patch to a class using the
//! label configuration, splits every class into train/val/test and links
//! the patches into `<workdir>/<expid>/patches/<fold>/<class>/`.
//!
//! # Usage
//!
//! ```text
//! organize-samples -w work -e exp1 -l labels.json -t 2000 -v 1000 -R 7
//! organize-samples -w work -e exp1 -l labels.json -s test_specimens.csv -T 500
//! ```
//!
//! The per-class summary table goes to stdout, logs go to stderr
//! (`RUST_LOG` overrides the level).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ml_folds::{OrganizeConfig, OrganizeOutcome, organize};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Organize manifest patches into train/val/test folds
#[derive(Debug, Parser)]
#[command(name = "organize-samples")]
#[command(about = "Split labeled patches into class-balanced folds", long_about = None)]
#[command(version)]
struct Cli {
    /// Working directory (holds manifest.csv and all_patches/)
    #[arg(short = 'w', long, value_name = "DIR")]
    workdir: PathBuf,

    /// Experiment id (folder created in the working directory)
    #[arg(short = 'e', long, value_name = "ID")]
    expid: String,

    /// JSON file describing the classes and how they map to labels
    #[arg(short = 'l', long, value_name = "FILE")]
    label_info: PathBuf,

    /// Maximum number of samples per class in any fold (0 = no override)
    #[arg(short = 'n', long, default_value_t = 0, value_name = "N")]
    max_samples: usize,

    /// Max samples per class for train (0 = unbounded)
    #[arg(short = 't', long, default_value_t = 2000, value_name = "N")]
    max_train: usize,

    /// Max samples per class for val (0 = unbounded)
    #[arg(short = 'v', long, default_value_t = 1000, value_name = "N")]
    max_val: usize,

    /// Max samples per class for test (0 = unbounded)
    #[arg(short = 'T', long, default_value_t = 0, value_name = "N")]
    max_test: usize,

    /// Random seed
    #[arg(short = 'R', long, default_value_t = 0, value_name = "N")]
    random_seed: u64,

    /// File listing specimen ids reserved for testing
    #[arg(short = 's', long, value_name = "FILE")]
    test_specimens: Option<PathBuf>,

    /// Also write the summary as JSON
    #[arg(long, value_name = "FILE")]
    summary_json: Option<PathBuf>,

    /// Allocate and print the summary without touching the link tree
    #[arg(long)]
    dry_run: bool,

    /// Log progress at info level
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> OrganizeConfig {
        let mut config = OrganizeConfig::new(self.workdir, self.expid, self.label_info)
            .with_max_samples(self.max_samples)
            .with_max_train(self.max_train)
            .with_max_val(self.max_val)
            .with_max_test(self.max_test)
            .with_seed(self.random_seed);
        if let Some(path) = self.test_specimens {
            config = config.with_test_specimens(path);
        }
        if let Some(path) = self.summary_json {
            config = config.with_summary_json(path);
        }
        if self.dry_run {
            config = config.dry_run();
        }
        config
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn log_outcome(config: &OrganizeConfig, outcome: &OrganizeOutcome) {
    let links = outcome.links.unwrap_or_default();
    info!(
        expid = %config.expid,
        retained = outcome.report.retained(),
        dropped = outcome.report.dropped(),
        links_created = links.created,
        links_removed = links.removed,
        dry_run = config.dry_run,
        "samples organized"
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.into_config();
    let outcome = organize(&config).with_context(|| {
        format!(
            "failed to organize samples in {} for experiment {}",
            config.workdir.display(),
            config.expid
        )
    })?;
    log_outcome(&config, &outcome);

    print!("{}", outcome.report.to_table());
    Ok(())
}
