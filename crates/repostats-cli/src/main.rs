// repostats CLI - Artifactory repository statistics reports

mod naming;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use repostats_core::config::DEFAULT_TIMEOUT_SECS;
use repostats_core::{
    bytes_to_gb, fetch_records, transform, AqlQuery, ReportWriter, StatsConfig, Transformed,
};
use tracing_subscriber::EnvFilter;

/// repostats - summarize artifact metadata from Artifactory into an xlsx report
///
/// Every connection option falls back to an environment variable, and a
/// `.env` file in the working directory is loaded first if present.
#[derive(Parser, Debug)]
#[command(name = "repostats")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Artifactory base URL, e.g. https://repo.example.com/artifactory
    #[arg(long, env = "ARTIFACTORY_URL")]
    artifactory_url: Option<String>,

    /// Username for Artifactory
    #[arg(long, env = "USERNAME")]
    username: Option<String>,

    /// Password or API key for Artifactory
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Read the password from the terminal instead of flags or environment
    #[arg(long)]
    prompt_password: bool,

    /// Repositories to report on (REPOSITORY_NAMES is comma-separated)
    #[arg(
        long,
        env = "REPOSITORY_NAMES",
        value_name = "NAME",
        num_args = 1..,
        value_delimiter = ','
    )]
    repository_names: Vec<String>,

    /// Directory the report is written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Timeout for the AQL request, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Fetch results in pages of this many items instead of one request
    #[arg(long, value_name = "ITEMS")]
    page_size: Option<u64>,

    /// Print the AQL query and exit without contacting Artifactory
    #[arg(long)]
    print_query: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    // Must run before parsing so .env values act as env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "repostats=debug,repostats_core=debug"
    } else {
        "repostats=info,repostats_core=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli)?;

    if cli.print_query {
        let query = AqlQuery::for_config(&config)?;
        println!("{}", query);
        return Ok(());
    }

    config.validate()?;
    let path = naming::report_path(
        &cli.output_dir,
        &config.repository_names,
        chrono::Local::now().naive_local(),
    )?;
    tracing::info!(
        repositories = ?config.repository_names,
        report = %path.display(),
        "Starting report run"
    );

    let raw = fetch_records(&config).context("Failed to retrieve artifact metadata")?;
    let Transformed { records, summary } =
        transform(&raw).context("Failed to process AQL results")?;

    ReportWriter::new(&records, &summary)
        .write(&path)
        .with_context(|| format!("Failed to write report '{}'", path.display()))?;

    println!("{} Report created successfully!", "✓".green().bold());
    println!();
    println!("  Output:     {}", path.display());
    println!("  Artifacts:  {}", summary.total_count);
    println!("  Total size: {} GB", bytes_to_gb(summary.total_size));
    println!("  Uploaders:  {}", summary.by_user.len());
    if summary.excluded_from_time > 0 {
        println!(
            "  {}",
            format!(
                "{} artifact(s) without a created date left out of yearly/monthly counts",
                summary.excluded_from_time
            )
            .yellow()
        );
    }

    Ok(())
}

/// Assembles the run configuration from parsed arguments.
///
/// Missing values are left empty here; [`StatsConfig::validate`] reports
/// them all at once.
fn build_config(cli: &Cli) -> anyhow::Result<StatsConfig> {
    let password = if cli.prompt_password {
        rpassword::prompt_password("Artifactory password: ")
            .context("Failed to read password from terminal")?
    } else {
        cli.password.clone().unwrap_or_default()
    };

    let mut config = StatsConfig::new(
        cli.artifactory_url.clone().unwrap_or_default(),
        cli.username.clone().unwrap_or_default(),
        password,
        cli.repository_names.clone(),
    );
    config.timeout_secs = cli.timeout_secs;
    config.page_size = cli.page_size;

    Ok(config)
}
