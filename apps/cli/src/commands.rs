//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use jobatlas_core::pipeline::{ProgressReporter, RunConfig, RunResult};
use jobatlas_core::{export, validate};
use jobatlas_scoring::ScoringMethod;
use jobatlas_shared::{
    AppConfig, country_for_short, country_short, init_config, load_config,
};
use jobatlas_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// JobAtlas — occupational complexity data pipeline.
#[derive(Parser)]
#[command(
    name = "jobatlas",
    version,
    about = "Import occupational data, compute complexity scores, and export visualization views.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline: import, score, validate, export.
    Run {
        /// Data year (defaults to the configured year).
        #[arg(long)]
        year: Option<i32>,

        /// Country code, 3-letter or short form (defaults to config).
        #[arg(long)]
        country: Option<String>,

        /// Drop and recreate all tables before importing.
        #[arg(long)]
        fresh: bool,

        /// Download configured source files before importing.
        #[arg(long)]
        fetch: bool,

        /// Only import and score (skip export).
        #[arg(long)]
        import_only: bool,

        /// Only export from existing data (skip import and scoring).
        #[arg(long)]
        export_only: bool,

        /// Combined CSV to import instead of walking the data directory.
        #[arg(long)]
        combined: Option<String>,

        /// Survey task-ratings CSV for task-derived complexity.
        #[arg(long)]
        task_ratings: Option<String>,

        /// Scoring method: iterative or task-count (defaults to config).
        #[arg(long)]
        method: Option<String>,

        /// Also write the flat research CSVs.
        #[arg(long)]
        export_csv: bool,

        /// SQLite database path (defaults to config).
        #[arg(long)]
        db: Option<String>,

        /// Input data directory (defaults to config).
        #[arg(long)]
        data_dir: Option<String>,

        /// Export output directory (defaults to config).
        #[arg(long)]
        out: Option<String>,
    },

    /// Validate the database and exported files; exits non-zero when
    /// export validation fails.
    Validate {
        /// Data year to validate exports for.
        #[arg(long)]
        year: Option<i32>,

        /// Country code, 3-letter or short form.
        #[arg(long)]
        country: Option<String>,

        /// SQLite database path.
        #[arg(long)]
        db: Option<String>,

        /// Export output directory.
        #[arg(long)]
        out: Option<String>,
    },

    /// Print record counts by country and region type.
    Summary {
        /// SQLite database path.
        #[arg(long)]
        db: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            year,
            country,
            fresh,
            fetch,
            import_only,
            export_only,
            combined,
            task_ratings,
            method,
            export_csv,
            db,
            data_dir,
            out,
        } => {
            cmd_run(RunFlags {
                year,
                country,
                fresh,
                fetch,
                import_only,
                export_only,
                combined,
                task_ratings,
                method,
                export_csv,
                db,
                data_dir,
                out,
            })
            .await
        }
        Command::Validate {
            year,
            country,
            db,
            out,
        } => cmd_validate(year, country.as_deref(), db.as_deref(), out.as_deref()).await,
        Command::Summary { db } => cmd_summary(db.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Raw `run` subcommand flags before merging with config defaults.
struct RunFlags {
    year: Option<i32>,
    country: Option<String>,
    fresh: bool,
    fetch: bool,
    import_only: bool,
    export_only: bool,
    combined: Option<String>,
    task_ratings: Option<String>,
    method: Option<String>,
    export_csv: bool,
    db: Option<String>,
    data_dir: Option<String>,
    out: Option<String>,
}

/// Resolve a CLI country argument ("USA" or "us") to the 3-letter code.
fn resolve_country(arg: Option<&str>, config: &AppConfig) -> String {
    match arg {
        Some(code) if code.len() == 3 => code.to_uppercase(),
        Some(short) => country_for_short(short).to_owned(),
        None => config.pipeline.country.clone(),
    }
}

async fn cmd_run(flags: RunFlags) -> Result<()> {
    let config = load_config()?;

    let year = flags.year.unwrap_or(config.pipeline.year);
    let country = resolve_country(flags.country.as_deref(), &config);
    let db_path = PathBuf::from(flags.db.unwrap_or_else(|| config.paths.database.clone()));
    let data_dir = PathBuf::from(
        flags
            .data_dir
            .unwrap_or_else(|| config.paths.data_dir.clone()),
    );
    let export_dir = PathBuf::from(flags.out.unwrap_or_else(|| config.paths.export_dir.clone()));

    let scoring: ScoringMethod = flags
        .method
        .as_deref()
        .unwrap_or(&config.pipeline.scoring)
        .parse()?;

    let mut combined_csv = flags.combined.map(PathBuf::from);
    let mut task_ratings_csv = flags.task_ratings.map(PathBuf::from);

    // --- Fetch phase (optional) ---
    if flags.fetch {
        let raw_dir = data_dir.join("raw");
        let sources = &config.sources;
        if sources.occupational_data_url.is_empty() && sources.task_ratings_url.is_empty() {
            return Err(eyre!(
                "no source URLs configured; set [sources] in the config file"
            ));
        }
        if !sources.occupational_data_url.is_empty() {
            let path =
                jobatlas_ingest::fetch::download_cached(&sources.occupational_data_url, &raw_dir)
                    .await?;
            combined_csv = Some(path);
        }
        if !sources.task_ratings_url.is_empty() {
            let path =
                jobatlas_ingest::fetch::download_cached(&sources.task_ratings_url, &raw_dir)
                    .await?;
            task_ratings_csv = Some(path);
        }
    }

    info!(year, country = %country, db = %db_path.display(), "starting pipeline");

    let storage = Storage::open(&db_path).await?;
    let run_config = RunConfig {
        year,
        country: country.clone(),
        data_dir,
        export_dir,
        fresh: flags.fresh,
        import_only: flags.import_only,
        export_only: flags.export_only,
        combined_csv,
        task_ratings_csv,
        scoring,
        export_csv: flags.export_csv,
    };

    let reporter = CliProgress::new();
    let result = jobatlas_core::pipeline::run(&storage, &run_config, &reporter).await?;

    println!();
    println!("  Pipeline complete!");
    println!("  Imported:   {} records ({} rejected)", result.imported, result.rejected);
    println!("  Scored:     {} (year, region) partitions", result.partitions_scored);
    if result.task_scored_rows > 0 {
        println!("  Survey:     {} rows overwritten", result.task_scored_rows);
    }
    if !result.findings.is_empty() {
        println!("  Findings:   {}", result.findings.len());
        for finding in &result.findings {
            println!("    - {finding}");
        }
    }
    if !result.completeness_warnings.is_empty() {
        println!("  Warnings:   {} completeness", result.completeness_warnings.len());
    }
    if let Some(stats) = &result.export {
        println!("  Main file:  {} region-records", stats.main_records);
        for (level, count) in &stats.level_records {
            println!("  Level {level}:    {count} region-records");
        }
        println!("  Levels in data: {:?}", stats.levels_in_data);
    }
    println!("  Time:       {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_validate(
    year: Option<i32>,
    country: Option<&str>,
    db: Option<&str>,
    out: Option<&str>,
) -> Result<()> {
    let config = load_config()?;
    let year = year.unwrap_or(config.pipeline.year);
    let country = resolve_country(country, &config);
    let db_path = PathBuf::from(db.unwrap_or(&config.paths.database));
    let export_dir = PathBuf::from(out.unwrap_or(&config.paths.export_dir));

    let storage = Storage::open(&db_path).await?;

    // Database findings are reported but not fatal.
    let findings = validate::validate_storage(&storage).await?;
    if findings.is_empty() {
        println!("  Database validation passed");
    } else {
        println!("  DATABASE FINDINGS:");
        for finding in &findings {
            println!("    - {finding}");
        }
    }

    let records = storage
        .query_records(Some(std::slice::from_ref(&country)))
        .await?;
    let year_records: Vec<_> = records.into_iter().filter(|r| r.year == year).collect();
    let warnings = validate::completeness_warnings(&year_records);
    for warning in &warnings {
        println!("    ~ {warning}");
    }

    // Export validation is the fatal path: the main file and every
    // extension the catalog lists must exist and check out.
    let short = country_short(&country);
    let mut export_findings =
        validate::validate_view_file(&export_dir.join(export::main_file_name(&short, year)));

    let meta_path = export_dir.join(export::META_FILE_NAME);
    match std::fs::read_to_string(&meta_path) {
        Ok(content) => match serde_json::from_str::<jobatlas_core::MetaCatalog>(&content) {
            Ok(meta) => {
                let key = format!("{short}-{year}");
                if let Some(files) = meta.level_files.get(&key) {
                    for file in files.values() {
                        export_findings
                            .extend(validate::validate_view_file(&export_dir.join(file)));
                    }
                }
            }
            Err(e) => export_findings.push(format!("Invalid meta catalog: {e}")),
        },
        Err(_) => export_findings.push(format!("Meta catalog not found: {}", meta_path.display())),
    }

    if export_findings.is_empty() {
        println!("  Export validation passed");
        Ok(())
    } else {
        println!("  EXPORT FINDINGS:");
        for finding in &export_findings {
            println!("    - {finding}");
        }
        Err(eyre!("export validation failed with {} finding(s)", export_findings.len()))
    }
}

async fn cmd_summary(db: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let db_path = PathBuf::from(db.unwrap_or(&config.paths.database));
    let storage = Storage::open(&db_path).await?;

    let total = storage.record_count().await?;
    println!("  {total} occupation records");
    for row in storage.summary().await? {
        println!(
            "  {} {}: {} records",
            row.country_code, row.region_type, row.record_count
        );
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("spinner template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}
