use clap::{Parser, Subcommand};
use oftalmo_core::config::{
    company_allow_list_from_env_value, detail_categories_from_env_value,
    detail_timeout_from_env_value, path_from_env_value,
};
use oftalmo_core::constants::{
    DEFAULT_INPUT_FILE, DEFAULT_OUTPUT_DIR, ENV_COMPANY_ALLOW_LIST, ENV_DETAIL_CATEGORIES,
    ENV_DETAIL_TIMEOUT_SECS, ENV_INPUT, ENV_OUTPUT_DIR,
};
use oftalmo_core::{
    parse_date, FailurePolicy, JsonExport, MigrationConfig, MigrationService, Pipeline,
    YamlDirectorySink,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "oftalmo")]
#[command(about = "Migrates the clinic's legacy patient store to per-patient YAML records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate every patient of a legacy JSON export
    Migrate {
        /// Export file (overrides OFTALMO_INPUT)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output directory (overrides OFTALMO_OUTPUT_DIR)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Stop at the first rejected patient instead of skipping it
        #[arg(long)]
        halt_on_error: bool,
    },
    /// Parse a single date token and print it as YYYY-MM-DD
    ParseDate {
        /// Date token, e.g. "15 de Enero de 2003" or "15-01-2003"
        token: String,
    },
    /// Segment a clinic notes file into visits and print them as YAML
    Visits {
        /// Text file holding one patient's clinic notes
        file: PathBuf,
    },
}

/// Entry point for the `oftalmo` command.
///
/// # Environment Variables
/// - `OFTALMO_INPUT`: export file (default: "legacy_export.json")
/// - `OFTALMO_OUTPUT_DIR`: output directory (default: "migrated_patients")
/// - `OFTALMO_COMPANY_ALLOW_LIST`: comma-separated accepted companies (default: accept all)
/// - `OFTALMO_DETAIL_TIMEOUT_SECS`: per-lookup timeout (default: none)
/// - `OFTALMO_DETAIL_CATEGORIES`: detail tables to merge (default: all)
/// - `RUST_LOG`: log filter, on top of `oftalmo=info`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("oftalmo=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate {
            input,
            output,
            halt_on_error,
        } => {
            let cfg = Arc::new(resolve_config(input, output, halt_on_error)?);
            tracing::info!("++ Reading legacy export {}", cfg.input_path().display());

            let export = Arc::new(JsonExport::from_path(cfg.input_path())?);
            let mut sink = YamlDirectorySink::create(cfg.output_dir())?;
            let service = MigrationService::new(Arc::clone(&cfg));

            let summary = service.run(&*export, Arc::clone(&export), &mut sink).await?;

            println!(
                "Migrated {} patients into {}",
                summary.migrated,
                sink.dir().display()
            );
            for skipped in &summary.skipped {
                println!(
                    "Skipped {}: {}",
                    skipped.code.as_deref().unwrap_or("<missing code>"),
                    skipped.error
                );
            }
            for failure in &summary.detail_failures {
                let date = failure
                    .date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "unknown visit".into());
                println!(
                    "Missing {} for {} ({}): {}",
                    failure.category, failure.code, date, failure.message
                );
            }
        }
        Commands::ParseDate { token } => {
            let date = parse_date(&token)?;
            println!("{}", date.format("%Y-%m-%d"));
        }
        Commands::Visits { file } => {
            let blob = std::fs::read_to_string(&file)?;
            let visits = Pipeline::default().parse_visits(&blob)?;
            if visits.is_empty() {
                println!("No visits found.");
            } else {
                print!("{}", serde_yaml::to_string(&visits)?);
            }
        }
    }

    Ok(())
}

/// Resolves the migration configuration once, flags taking precedence over the environment.
fn resolve_config(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    halt_on_error: bool,
) -> anyhow::Result<MigrationConfig> {
    let input = input
        .unwrap_or_else(|| path_from_env_value(std::env::var(ENV_INPUT).ok(), DEFAULT_INPUT_FILE));
    let output = output.unwrap_or_else(|| {
        path_from_env_value(std::env::var(ENV_OUTPUT_DIR).ok(), DEFAULT_OUTPUT_DIR)
    });
    let allow_list = company_allow_list_from_env_value(std::env::var(ENV_COMPANY_ALLOW_LIST).ok());
    let timeout = detail_timeout_from_env_value(std::env::var(ENV_DETAIL_TIMEOUT_SECS).ok())?;
    let categories = detail_categories_from_env_value(std::env::var(ENV_DETAIL_CATEGORIES).ok())?;
    let policy = if halt_on_error {
        FailurePolicy::Halt
    } else {
        FailurePolicy::Skip
    };

    Ok(MigrationConfig::new(
        input, output, allow_list, timeout, categories, policy,
    )?)
}
