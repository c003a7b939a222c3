use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use csv::WriterBuilder;
use serde::Serialize;
use tracing::info;

use crate::app::{ProgressEvent, ProgressSink, RunSummary, SourceStatus};
use crate::domain::ResultTable;
use crate::error::EnrichError;

pub const REPORT_COLUMNS: [&str; 6] = [
    "Gene_set",
    "Term",
    "Overlap",
    "P-value",
    "Adjusted P-value",
    "Genes",
];

pub trait ReportWriter {
    fn write_report(
        &self,
        outdir: &Utf8Path,
        gene_set: &str,
        description: &str,
        table: &ResultTable,
    ) -> Result<Utf8PathBuf, EnrichError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TsvReportWriter;

impl TsvReportWriter {
    pub fn report_path(outdir: &Utf8Path, gene_set: &str, description: &str) -> Utf8PathBuf {
        let gene_set = gene_set.replace(['/', '\\'], "_");
        outdir.join(format!("{gene_set}.{description}.enrichr.reports.txt"))
    }

    pub fn write_table<W: Write>(table: &ResultTable, writer: W) -> Result<(), EnrichError> {
        let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(writer);
        let fs_err = |err: csv::Error| EnrichError::Filesystem(err.to_string());
        writer.write_record(REPORT_COLUMNS).map_err(fs_err)?;
        for row in table.rows() {
            writer
                .write_record([
                    row.gene_set.clone(),
                    row.term.clone(),
                    row.overlap.to_string(),
                    row.p_value.to_string(),
                    row.adjusted_p_value.to_string(),
                    row.genes.join(";"),
                ])
                .map_err(fs_err)?;
        }
        writer
            .flush()
            .map_err(|err| EnrichError::Filesystem(err.to_string()))
    }
}

impl ReportWriter for TsvReportWriter {
    fn write_report(
        &self,
        outdir: &Utf8Path,
        gene_set: &str,
        description: &str,
        table: &ResultTable,
    ) -> Result<Utf8PathBuf, EnrichError> {
        fs::create_dir_all(outdir.as_std_path())
            .map_err(|err| EnrichError::Filesystem(err.to_string()))?;
        let path = Self::report_path(outdir, gene_set, description);
        let mut temp = tempfile::Builder::new()
            .prefix("kira-enrich-report")
            .tempfile_in(outdir.as_std_path())
            .map_err(|err| EnrichError::Filesystem(err.to_string()))?;
        Self::write_table(table, io::BufWriter::new(temp.as_file_mut()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| EnrichError::Filesystem(format!("persist {path}: {err}")))?;
        Ok(path)
    }
}

#[derive(Debug, Clone)]
pub struct PlotRequest {
    pub title: String,
    pub cutoff: f64,
    pub top_term: usize,
    pub output: Utf8PathBuf,
}

pub trait Plotter {
    fn plot(&self, table: &ResultTable, request: &PlotRequest) -> Result<(), EnrichError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlot;

impl Plotter for NoPlot {
    fn plot(&self, _table: &ResultTable, _request: &PlotRequest) -> Result<(), EnrichError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Json,
    Text,
}

pub struct JsonOutput;

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => info!("{}", event.message),
        }
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn headline(summary: &RunSummary) -> String {
        format!(
            "{} genes ({}), {} rows, {} with adjusted p <= {}",
            summary.genes,
            summary.organism,
            summary.total_rows,
            summary.significant_rows,
            summary.cutoff
        )
    }

    pub fn print_summary(summary: &RunSummary) {
        println!("{}", Self::headline(summary));
        for source in &summary.sources {
            let status = match source.status {
                SourceStatus::Tested => "tested",
                SourceStatus::NoHits => "no hits",
                SourceStatus::Fetched => "fetched",
                SourceStatus::Failed => "failed",
            };
            println!("  {:<40} {:<8} {:>6}", source.gene_set, status, source.rows);
            if let Some(short_id) = &source.short_id {
                println!("    job: {short_id}");
            }
            if let Some(path) = &source.report_path {
                println!("    report: {path}");
            }
            if let Some(error) = &source.error {
                println!("    error: {error}");
            }
        }
    }

    pub fn print_libraries(libraries: &[String]) {
        for library in libraries {
            println!("{library}");
        }
    }
}

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_libraries(libraries: &[String]) -> io::Result<()> {
        Self::print_json(&libraries)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EnrichmentRow, Overlap};

    #[test]
    fn headline_uses_inclusive_cutoff() {
        let summary = RunSummary {
            organism: "human".to_string(),
            description: "run1".to_string(),
            genes: 3,
            numeric_ids: false,
            sources: Vec::new(),
            total_rows: 4,
            significant_rows: 1,
            cutoff: 0.05,
            outdir: None,
            finished_at: "2024-01-01T00:00:00+00:00".to_string(),
        };
        assert_eq!(
            TextOutput::headline(&summary),
            "3 genes (human), 4 rows, 1 with adjusted p <= 0.05"
        );
    }

    #[test]
    fn report_layout() {
        let table = ResultTable::new(vec![EnrichmentRow {
            gene_set: "CUSTOM1".to_string(),
            term: "PathwayA".to_string(),
            overlap: Overlap { hits: 3, size: 57 },
            p_value: 0.001,
            adjusted_p_value: 0.004,
            genes: vec!["TP53".to_string(), "BRCA1".to_string(), "MYC".to_string()],
            odds_ratio: None,
            combined_score: None,
        }]);
        let mut buffer = Vec::new();
        TsvReportWriter::write_table(&table, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Gene_set\tTerm\tOverlap\tP-value\tAdjusted P-value\tGenes"
        );
        assert_eq!(
            lines.next().unwrap(),
            "CUSTOM1\tPathwayA\t3/57\t0.001\t0.004\tTP53;BRCA1;MYC"
        );
    }

    #[test]
    fn report_path_sanitizes_names() {
        let path = TsvReportWriter::report_path(Utf8Path::new("out"), "a/b", "run1");
        assert_eq!(path.as_str(), "out/a_b.run1.enrichr.reports.txt");
    }
}
