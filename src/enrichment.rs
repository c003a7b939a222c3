use crate::domain::{Background, EnrichmentRow, GeneCollection, GeneSetLibrary, Overlap, ResultTable};
use crate::error::EnrichError;
use crate::stats::{self, CorrectionMethod};

pub fn enrich(
    gene_set: &str,
    library: &GeneSetLibrary,
    genes: &GeneCollection,
    background: &Background,
    cutoff: f64,
) -> Result<ResultTable, EnrichError> {
    let outcome = stats::hypergeometric_test(genes, library, background)?;
    if outcome.is_empty() {
        return Ok(ResultTable::default());
    }

    let (adjusted, _rejected) =
        stats::correct(&outcome.p_values, cutoff, CorrectionMethod::BenjaminiHochberg)?;

    let rows = outcome
        .terms
        .into_iter()
        .zip(outcome.p_values)
        .zip(adjusted)
        .zip(outcome.overlap_sizes)
        .zip(outcome.set_sizes)
        .zip(outcome.overlap_genes)
        .map(
            |(((((term, p_value), adjusted_p_value), hits), size), genes)| EnrichmentRow {
                gene_set: gene_set.to_string(),
                term,
                overlap: Overlap { hits, size },
                p_value,
                adjusted_p_value,
                genes,
                odds_ratio: None,
                combined_score: None,
            },
        )
        .collect();
    Ok(ResultTable::new(rows))
}
