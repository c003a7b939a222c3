use std::path::{Path, PathBuf};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_enrichment::app::{App, EnrichmentRequest, ProgressSink};
use kira_enrichment::background::{BackgroundInput, BackgroundStore};
use kira_enrichment::biomart::BiomartHttpClient;
use kira_enrichment::config::{ConfigLoader, ResolvedConfig};
use kira_enrichment::enrichr::EnrichrHttpClient;
use kira_enrichment::error::EnrichError;
use kira_enrichment::genes::GeneListInput;
use kira_enrichment::genesets::GeneSetsInput;
use kira_enrichment::output::{JsonOutput, LogProgress, OutputMode, TextOutput};
use kira_enrichment::remote::RemoteJobClient;
use kira_enrichment::retry::ThreadPacer;

type HttpApp = App<EnrichrHttpClient, ThreadPacer, BiomartHttpClient>;

#[derive(Parser)]
#[command(name = "kira-enrich")]
#[command(about = "Gene-set enrichment analysis with Enrichr libraries and local GMT files")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true, help = "Print machine-readable JSON instead of text")]
    json: bool,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run enrichment for a gene list")]
    Run(RunArgs),
    #[command(about = "List Enrichr libraries available for an organism")]
    Libraries(LibrariesArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(short = 'i', long, help = "Gene list file (one id per line) or comma-separated ids")]
    gene_list: String,

    #[arg(short = 'g', long, help = "Comma-separated Enrichr library names and/or GMT files")]
    gene_sets: String,

    #[arg(long)]
    organism: Option<String>,

    #[arg(short = 'd', long)]
    description: Option<String>,

    #[arg(short = 'o', long, help = "Output directory for reports. An empty value disables writing")]
    outdir: Option<String>,

    #[arg(long, help = "Gene count, gene file, or BioMart dataset name")]
    background: Option<String>,

    #[arg(long)]
    cutoff: Option<f64>,

    #[arg(long)]
    no_plot: bool,

    #[arg(long)]
    top_term: Option<usize>,
}

#[derive(Args)]
struct LibrariesArgs {
    #[arg(long)]
    organism: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<EnrichError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &EnrichError) -> u8 {
    if error.is_configuration() {
        2
    } else if error.is_network() {
        3
    } else {
        1
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let app = build_app(&config)?;

    match cli.command {
        Commands::Run(args) => run_enrichment(args, config, app, output_mode),
        Commands::Libraries(args) => run_libraries(args, &config, app, output_mode),
    }
}

fn build_app(config: &ResolvedConfig) -> miette::Result<HttpApp> {
    let enrichr = EnrichrHttpClient::new(&config.base_url)?;
    let biomart = BiomartHttpClient::new(&config.mart_url)?;
    let remote = RemoteJobClient::new(enrichr, ThreadPacer, config.retries, config.courtesy_delay);
    let store = BackgroundStore::new()?;
    Ok(App::new(remote, biomart, store))
}

fn run_enrichment(
    args: RunArgs,
    mut config: ResolvedConfig,
    app: HttpApp,
    output_mode: OutputMode,
) -> miette::Result<()> {
    apply_overrides(&args, &mut config)?;
    let request = EnrichmentRequest::from_config(
        gene_list_input(&args.gene_list),
        GeneSetsInput::Joined(args.gene_sets),
        &config,
    );

    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Text => &LogProgress,
    };
    let run = app.run(request, sink)?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(&run.summary).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_summary(&run.summary),
    }
    Ok(())
}

fn run_libraries(
    args: LibrariesArgs,
    config: &ResolvedConfig,
    app: HttpApp,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let organism = args.organism.as_deref().unwrap_or(config.organism.as_str());
    let libraries = app.libraries(organism)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_libraries(&libraries).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_libraries(&libraries),
    }
    Ok(())
}

fn apply_overrides(args: &RunArgs, config: &mut ResolvedConfig) -> Result<(), EnrichError> {
    if let Some(organism) = &args.organism {
        config.organism = organism.clone();
    }
    if let Some(description) = &args.description {
        config.description = description.clone();
    }
    if let Some(outdir) = &args.outdir {
        config.outdir = if outdir.trim().is_empty() {
            None
        } else {
            Some(Utf8PathBuf::from(outdir))
        };
    }
    if let Some(background) = &args.background {
        config.background = BackgroundInput::Spec(background.clone());
    }
    if let Some(cutoff) = args.cutoff {
        if !(cutoff > 0.0 && cutoff <= 1.0) {
            return Err(EnrichError::ConfigParse(format!(
                "cutoff must be in (0, 1], got {cutoff}"
            )));
        }
        config.cutoff = cutoff;
    }
    if args.no_plot {
        config.no_plot = true;
    }
    if let Some(top_term) = args.top_term {
        config.top_term = top_term;
    }
    Ok(())
}

fn gene_list_input(value: &str) -> GeneListInput {
    if Path::new(value).is_file() {
        return GeneListInput::File(PathBuf::from(value));
    }
    GeneListInput::Genes(
        value
            .split(',')
            .map(str::trim)
            .filter(|gene| !gene.is_empty())
            .map(str::to_string)
            .collect(),
    )
}
