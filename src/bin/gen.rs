//! geox-gen: CLI tool for generating geosite and geoip databases.

use clap::{Parser, Subcommand};
use geox::fetch::{read_local, GitHubClient};
use geox::pipeline::{generate_geoip, generate_geosite, run_geoip_job, run_geosite_job};
use geox::{Error, GenerateConfig, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "geox-gen")]
#[command(version)]
#[command(about = "Generate geosite and geoip databases from upstream datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML job configuration (built-in jobs when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output directory for generated files
    #[arg(short, long, global = true, default_value = ".")]
    output_dir: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured geosite and geoip job
    All,

    /// Run the geosite jobs
    Geosite {
        /// Local GeoSiteList file, processed with the first geosite job
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Run the geoip jobs
    Geoip {
        /// Local GeoIP database, processed with the first geoip job
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => GenerateConfig::load(path)?,
        None => GenerateConfig::default(),
    };
    fs::create_dir_all(&cli.output_dir)?;

    match &cli.command {
        Commands::All => {
            let client = GitHubClient::new()?;
            geosite_jobs(&client, &config, &cli.output_dir)?;
            geoip_jobs(&client, &config, &cli.output_dir)?;
        }
        Commands::Geosite { input: Some(path) } => {
            let job = config
                .geosite
                .first()
                .ok_or_else(|| Error::Config("no geosite job configured".to_string()))?;
            let data = local_input(path)?;
            let report = generate_geosite(job, data.as_ref(), &cli.output_dir)?;
            log::info!(
                "{}: {} categories, {} rules",
                job.output,
                report.categories,
                report.rules
            );
        }
        Commands::Geosite { input: None } => {
            geosite_jobs(&GitHubClient::new()?, &config, &cli.output_dir)?;
        }
        Commands::Geoip { input: Some(path) } => {
            let job = config
                .geoip
                .first()
                .ok_or_else(|| Error::Config("no geoip job configured".to_string()))?;
            let report = generate_geoip(job, local_input(path)?, &cli.output_dir)?;
            log::info!(
                "{}: {} codes, {} networks",
                job.output,
                report.codes,
                report.networks
            );
        }
        Commands::Geoip { input: None } => {
            geoip_jobs(&GitHubClient::new()?, &config, &cli.output_dir)?;
        }
    }

    println!("Generated files in {}", cli.output_dir.display());
    Ok(())
}

fn local_input(path: &Path) -> Result<geox::fetch::InputData> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    read_local(path)?.decompress_if_gzip(&name)
}

fn geosite_jobs(client: &GitHubClient, config: &GenerateConfig, output_dir: &Path) -> Result<()> {
    for job in &config.geosite {
        let report = run_geosite_job(client, job, output_dir)?;
        log::info!(
            "{}: {} categories, {} rules, {} rule-sets",
            job.output,
            report.categories,
            report.rules,
            report.rule_sets
        );
    }
    Ok(())
}

fn geoip_jobs(client: &GitHubClient, config: &GenerateConfig, output_dir: &Path) -> Result<()> {
    for job in &config.geoip {
        let report = run_geoip_job(client, job, output_dir)?;
        log::info!(
            "{}: {} codes, {} networks, {} databases, {} rule-sets",
            job.output,
            report.codes,
            report.networks,
            report.databases,
            report.rule_sets
        );
    }
    Ok(())
}
