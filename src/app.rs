use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::background::{BackgroundInput, BackgroundResolver, BackgroundStore};
use crate::biomart::AnnotationClient;
use crate::config::ResolvedConfig;
use crate::domain::{Background, GeneCollection, GeneSetSource, Organism, ResultTable};
use crate::enrichment;
use crate::enrichr::EnrichrApi;
use crate::error::EnrichError;
use crate::genes::{GeneListInput, normalize};
use crate::genesets::{GeneSetsInput, resolve_gene_sets};
use crate::output::{NoPlot, PlotRequest, Plotter, ReportWriter, TsvReportWriter};
use crate::remote::RemoteJobClient;
use crate::retry::Pacer;

#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    pub genes: GeneListInput,
    pub gene_sets: GeneSetsInput,
    pub organism: String,
    pub description: String,
    pub cutoff: f64,
    pub background: BackgroundInput,
    pub outdir: Option<Utf8PathBuf>,
    pub no_plot: bool,
    pub top_term: usize,
    pub plot_format: String,
}

impl EnrichmentRequest {
    pub fn from_config(
        genes: GeneListInput,
        gene_sets: GeneSetsInput,
        config: &ResolvedConfig,
    ) -> Self {
        Self {
            genes,
            gene_sets,
            organism: config.organism.clone(),
            description: config.description.clone(),
            cutoff: config.cutoff,
            background: config.background.clone(),
            outdir: config.outdir.clone(),
            no_plot: config.no_plot,
            top_term: config.top_term,
            plot_format: "svg".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunContext {
    pub organism: Organism,
    pub genes: GeneCollection,
    pub background: BackgroundInput,
    pub description: String,
    pub cutoff: f64,
    pub outdir: Option<Utf8PathBuf>,
    pub no_plot: bool,
    pub top_term: usize,
    pub plot_format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Tested,
    NoHits,
    Fetched,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub gene_set: String,
    pub remote: bool,
    pub status: SourceStatus,
    pub rows: usize,
    pub short_id: Option<String>,
    pub report_path: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub organism: String,
    pub description: String,
    pub genes: usize,
    pub numeric_ids: bool,
    pub sources: Vec<SourceReport>,
    pub total_rows: usize,
    pub significant_rows: usize,
    pub cutoff: f64,
    pub outdir: Option<String>,
    pub finished_at: String,
}

impl RunSummary {
    pub fn failures(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources
            .iter()
            .filter(|source| source.status == SourceStatus::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct EnrichmentRun {
    pub results: ResultTable,
    pub latest: Option<ResultTable>,
    pub summary: RunSummary,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

struct SourceOutcome {
    table: ResultTable,
    short_id: Option<String>,
}

pub struct App<A: EnrichrApi, P: Pacer, C: AnnotationClient> {
    remote: RemoteJobClient<A, P>,
    annotations: C,
    store: BackgroundStore,
    reports: Box<dyn ReportWriter>,
    plotter: Box<dyn Plotter>,
}

impl<A: EnrichrApi, P: Pacer, C: AnnotationClient> App<A, P, C> {
    pub fn new(remote: RemoteJobClient<A, P>, annotations: C, store: BackgroundStore) -> Self {
        Self {
            remote,
            annotations,
            store,
            reports: Box::new(TsvReportWriter),
            plotter: Box::new(NoPlot),
        }
    }

    pub fn with_report_writer(mut self, reports: impl ReportWriter + 'static) -> Self {
        self.reports = Box::new(reports);
        self
    }

    pub fn with_plotter(mut self, plotter: impl Plotter + 'static) -> Self {
        self.plotter = Box::new(plotter);
        self
    }

    pub fn remote(&self) -> &RemoteJobClient<A, P> {
        &self.remote
    }

    pub fn annotations(&self) -> &C {
        &self.annotations
    }

    pub fn libraries(&self, organism: &str) -> Result<Vec<String>, EnrichError> {
        let organism: Organism = organism.parse()?;
        self.remote.libraries(organism)
    }

    pub fn run(
        &self,
        request: EnrichmentRequest,
        sink: &dyn ProgressSink,
    ) -> Result<EnrichmentRun, EnrichError> {
        let organism: Organism = request.organism.parse()?;
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; organism {organism}"),
            elapsed: None,
        });

        let genes = normalize(&request.genes)?;
        let sources = resolve_gene_sets(request.gene_sets, || self.remote.libraries(organism))?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; {} genes, {} gene set sources",
                genes.len(),
                sources.len()
            ),
            elapsed: None,
        });

        let context = RunContext {
            organism,
            genes,
            background: request.background,
            description: request.description,
            cutoff: request.cutoff,
            outdir: request.outdir,
            no_plot: request.no_plot,
            top_term: request.top_term,
            plot_format: request.plot_format,
        };

        let mut results = ResultTable::default();
        let mut latest = None;
        let mut reports = Vec::with_capacity(sources.len());
        let mut background = None;

        for source in &sources {
            let start = Instant::now();
            let name = source.name().to_string();
            let mut report = SourceReport {
                gene_set: name.clone(),
                remote: !source.is_local(),
                status: SourceStatus::Failed,
                rows: 0,
                short_id: None,
                report_path: None,
                error: None,
            };

            match self.process_source(source, &context, &mut background, sink) {
                Ok(outcome) if outcome.table.is_empty() && source.is_local() => {
                    info!("no hits returned for gene set {name}");
                    report.status = SourceStatus::NoHits;
                }
                Ok(outcome) => {
                    report.status = if source.is_local() {
                        SourceStatus::Tested
                    } else {
                        SourceStatus::Fetched
                    };
                    report.rows = outcome.table.len();
                    report.short_id = outcome.short_id;
                    results.append(&outcome.table);
                    report.report_path = self.persist(&name, &outcome.table, &context);
                    latest = Some(outcome.table);
                }
                Err(err) if err.is_configuration() => return Err(err),
                Err(err) => {
                    error!(gene_set = %name, error = %err, "gene set failed");
                    report.error = Some(err.to_string());
                }
            }

            sink.event(ProgressEvent {
                message: format!("phase=Done; {name}"),
                elapsed: Some(start.elapsed()),
            });
            reports.push(report);
        }

        let summary = RunSummary {
            organism: organism.to_string(),
            description: context.description.clone(),
            genes: context.genes.len(),
            numeric_ids: context.genes.is_numeric(),
            total_rows: results.len(),
            significant_rows: results.significant(context.cutoff).count(),
            sources: reports,
            cutoff: context.cutoff,
            outdir: context.outdir.as_ref().map(|dir| dir.to_string()),
            finished_at: chrono::Utc::now().to_rfc3339(),
        };

        Ok(EnrichmentRun {
            results,
            latest,
            summary,
        })
    }

    fn process_source(
        &self,
        source: &GeneSetSource,
        context: &RunContext,
        background: &mut Option<Result<Background, String>>,
        sink: &dyn ProgressSink,
    ) -> Result<SourceOutcome, EnrichError> {
        match source {
            GeneSetSource::Local { name, library } => {
                sink.event(ProgressEvent {
                    message: format!("phase=Test; {name} ({} terms)", library.len()),
                    elapsed: None,
                });
                let background = self.background(background, context)?;
                let table =
                    enrichment::enrich(name, library, &context.genes, background, context.cutoff)?;
                Ok(SourceOutcome {
                    table,
                    short_id: None,
                })
            }
            GeneSetSource::Remote { library } => {
                info!(
                    "analysis name: {}, Enrichr library: {library}",
                    context.description
                );
                sink.event(ProgressEvent {
                    message: format!("phase=Submit; {library}"),
                    elapsed: None,
                });
                let result = self.remote.run(
                    context.organism,
                    &context.genes,
                    library,
                    &context.description,
                )?;
                sink.event(ProgressEvent {
                    message: format!("phase=Fetch; {library} job {}", result.short_id),
                    elapsed: None,
                });
                Ok(SourceOutcome {
                    table: result.table,
                    short_id: Some(result.short_id),
                })
            }
        }
    }

    // Resolved on the first local source and reused. A configuration error
    // aborts the run; any other failure is remembered and fails every local
    // source without another request.
    fn background<'a>(
        &self,
        slot: &'a mut Option<Result<Background, String>>,
        context: &RunContext,
    ) -> Result<&'a Background, EnrichError> {
        let state = match slot.take() {
            Some(state) => state,
            None => {
                let resolver = BackgroundResolver::new(&self.store, &self.annotations);
                match resolver.resolve(&context.background, &context.genes) {
                    Ok(background) => Ok(background),
                    Err(err) if err.is_configuration() => return Err(err),
                    Err(err) => Err(err.to_string()),
                }
            }
        };
        match slot.insert(state) {
            Ok(background) => Ok(&*background),
            Err(message) => Err(EnrichError::BackgroundUnavailable(message.clone())),
        }
    }

    fn persist(&self, name: &str, table: &ResultTable, context: &RunContext) -> Option<String> {
        let outdir = context.outdir.as_ref()?;
        let path = match self
            .reports
            .write_report(outdir, name, &context.description, table)
        {
            Ok(path) => path,
            Err(err) => {
                error!(gene_set = %name, error = %err, "could not write report");
                return None;
            }
        };
        info!("saved enrichment results to {path}");

        if !context.no_plot {
            let request = PlotRequest {
                title: name.to_string(),
                cutoff: context.cutoff,
                top_term: context.top_term,
                output: path.with_extension(&context.plot_format),
            };
            if let Err(err) = self.plotter.plot(table, &request) {
                warn!(gene_set = %name, error = %err, "plot rendering failed");
            }
        }
        Some(path.to_string())
    }
}
