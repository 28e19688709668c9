use appstream_harvester::{HarvestConfig, PolicyConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// appstream-harvester - extract application metadata from packages
///
/// Every package in the packages directory is matched against the built-in
/// analyzers, exploded into a private sandbox and turned into application
/// descriptors. Per-package results land in the log directory.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Show extra debugging information
    #[arg(short, long)]
    verbose: bool,

    /// Set the logging directory
    #[arg(long, value_name = "DIR", default_value = "./logs")]
    log_dir: PathBuf,

    /// Set the packages directory
    #[arg(long, value_name = "DIR", default_value = "./packages")]
    packages_dir: PathBuf,

    /// Set the temporary directory
    #[arg(long, value_name = "DIR", default_value = "./tmp")]
    temp_dir: PathBuf,

    /// Set the icons output directory
    #[arg(long, value_name = "DIR", default_value = "./icons")]
    icons_dir: PathBuf,

    /// Process only this package file
    #[arg(long, value_name = "PATH")]
    buildone: Option<PathBuf>,

    /// Number of packages processed concurrently
    #[arg(long, value_name = "N", default_value_t = 1)]
    workers: usize,

    /// JSON file with blacklists and extra-package rules
    #[arg(long, value_name = "FILE", env = "HARVESTER_POLICY")]
    policy: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<HarvestConfig, appstream_harvester::ConfigError> {
        let policy = match &self.policy {
            Some(path) => PolicyConfig::from_file(path)?,
            None => PolicyConfig::default(),
        };
        Ok(HarvestConfig {
            packages_dir: self.packages_dir,
            temp_dir: self.temp_dir,
            log_dir: self.log_dir,
            icons_dir: self.icons_dir,
            workers: self.workers,
            buildone: self.buildone,
            policy,
        })
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// The exit code is 0 even when the run stops early.
#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return;
        }
    };
    init_tracing(cli.verbose);

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    if let Err(e) = appstream_harvester::run(config).await {
        error!("{}", e);
    }
}
