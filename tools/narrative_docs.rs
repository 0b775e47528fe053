/// narrative-docs: validate, generate, score, and cross-check phase documents.
///
/// Usage:
///   narrative-docs validate <config.json>...
///   narrative-docs generate <config.json>... [--output-root <dir>] [--dry-run]
///   narrative-docs score <document.md> [--rubric <file.ron> | --spec]
///   narrative-docs check-alignment [<root>]
///
/// Exit codes: 0 no issues, 1 warnings only, 2 errors.
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use narrative_docs::core::alignment::{self, DocumentSet};
use narrative_docs::core::lifecycle::{LifecycleError, ProjectRun};
use narrative_docs::core::loader::{ConfigLoader, SchemaErrors, Validated};
use narrative_docs::core::report::{self, Format, IssueReport, SchemaReport};
use narrative_docs::core::rubric::Rubric;
use narrative_docs::core::scorer;
use narrative_docs::core::settings::{Overrides, Settings, SETTINGS_FILE};
use narrative_docs::schema::issue::ReportStatus;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "narrative-docs", version, about = "Phase plan generation and document QA")]
struct Cli {
    /// Settings file layered over the built-in defaults.
    #[arg(long, global = true, default_value = SETTINGS_FILE)]
    config: PathBuf,

    /// Output format for reports.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Worker threads for per-phase parallelism.
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Debug-level logging.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check phase configs against the published schema.
    Validate {
        #[arg(required = true)]
        configs: Vec<PathBuf>,
    },
    /// Render WORK_PLAN.md and REVIEW_PLAN.md for each phase config.
    Generate {
        #[arg(required = true)]
        configs: Vec<PathBuf>,
        /// Root holding the existing `phase-N/` directories.
        #[arg(long)]
        output_root: Option<PathBuf>,
        /// Render and score without writing files.
        #[arg(long)]
        dry_run: bool,
    },
    /// Score a document against a rubric.
    Score {
        document: PathBuf,
        /// RON rubric file.
        #[arg(long, conflicts_with = "spec")]
        rubric: Option<PathBuf>,
        /// Use the built-in specification rubric.
        #[arg(long)]
        spec: bool,
    },
    /// Check spec, roadmap, and phase plans for cross-document alignment.
    CheckAlignment {
        /// Directory holding SPEC.md, ROADMAP.md, and phase-*/ plans.
        root: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => Format::Human,
            OutputFormat::Json => Format::Json,
        }
    }
}

fn main() {
    match run() {
        Ok(status) => std::process::exit(status.exit_code()),
        Err(error) => {
            eprintln!("narrative-docs error: {error:#}");
            std::process::exit(ReportStatus::Errors.exit_code());
        }
    }
}

fn run() -> anyhow::Result<ReportStatus> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let overrides = Overrides {
        workers: cli.workers,
        output_root: match &cli.command {
            Command::Generate { output_root, .. } => output_root.clone(),
            _ => None,
        },
    };
    let settings = Settings::load_with(&cli.config, overrides).context("failed to load settings")?;
    if let Some(workers) = settings.workers {
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build_global()
            .context("failed to configure worker pool")?;
    }
    let format = Format::from(cli.format);

    match cli.command {
        Command::Validate { configs } => validate(&settings, &configs, format),
        Command::Generate { configs, dry_run, .. } => generate(&settings, &configs, dry_run, format),
        Command::Score {
            document,
            rubric,
            spec,
        } => {
            let rubric = match (rubric, spec) {
                (Some(path), _) => Rubric::load_from_ron(&path)?,
                (None, true) => Rubric::spec()?,
                (None, false) => settings.rubric()?,
            };
            let report = scorer::score_file(&document, &rubric)?;
            println!("{}", report::render_score(&report, format)?);
            Ok(report::score_status(&report))
        }
        Command::CheckAlignment { root } => {
            let root = root.unwrap_or_else(|| settings.output_root.clone());
            let documents = DocumentSet::from_dir(&root)
                .with_context(|| format!("failed to read documents under {}", root.display()))?;
            let result = alignment::check(&documents);
            let report = IssueReport::new(&result.issues);
            println!("{}", report.render(format)?);
            Ok(report.status)
        }
    }
}

fn validate(settings: &Settings, configs: &[PathBuf], format: Format) -> anyhow::Result<ReportStatus> {
    let loader = ConfigLoader::new()?.mode(settings.run_mode);
    let mut status = ReportStatus::Clean;
    for path in configs {
        let result = loader.load_file(path);
        let report = SchemaReport::from_result(&result);
        println!("{}", report.render(format)?);
        status = status.max(report.status);
    }
    Ok(status)
}

fn generate(
    settings: &Settings,
    configs: &[PathBuf],
    dry_run: bool,
    format: Format,
) -> anyhow::Result<ReportStatus> {
    let run = ProjectRun::from_settings(settings)?;
    let mut status = ReportStatus::Clean;

    for (path, outcome) in run.run_phases(configs) {
        match outcome {
            Ok(phase) => {
                if !phase.validated.warnings.is_empty() {
                    let warnings: Result<Validated, SchemaErrors> = Ok(phase.validated.clone());
                    println!("{}", SchemaReport::from_result(&warnings).render(format)?);
                    status = status.max(ReportStatus::WarningsOnly);
                }
                println!("{}", report::render_score(&phase.score, format)?);
                status = status.max(report::score_status(&phase.score));
                if dry_run {
                    info!(phase = phase.phase(), "dry run, nothing written");
                    continue;
                }
                match phase.write_to(&settings.output_root) {
                    Ok(written) => {
                        for file in written {
                            println!("wrote {}", file.display());
                        }
                    }
                    Err(error) => {
                        eprintln!("{}: {error}", path.display());
                        status = ReportStatus::Errors;
                    }
                }
            }
            Err(LifecycleError::Schema(errors)) => {
                let result: Result<Validated, SchemaErrors> = Err(errors);
                println!("{}", SchemaReport::from_result(&result).render(format)?);
                status = ReportStatus::Errors;
            }
            Err(error) => {
                warn!(config = %path.display(), "phase failed");
                eprintln!("{}: {error}", path.display());
                status = ReportStatus::Errors;
            }
        }
    }
    Ok(status)
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("NARRATIVE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
