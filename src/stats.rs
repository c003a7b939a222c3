use std::cmp::Ordering;
use std::collections::HashSet;

use statrs::distribution::{DiscreteCDF, Hypergeometric};

use crate::domain::{Background, GeneCollection, GeneSetLibrary};
use crate::error::EnrichError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestOutcome {
    pub terms: Vec<String>,
    pub p_values: Vec<f64>,
    pub overlap_sizes: Vec<usize>,
    pub set_sizes: Vec<usize>,
    pub overlap_genes: Vec<Vec<String>>,
}

impl TestOutcome {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

pub fn hypergeometric_test(
    query: &GeneCollection,
    library: &GeneSetLibrary,
    background: &Background,
) -> Result<TestOutcome, EnrichError> {
    let universe = match background {
        Background::GeneSet(genes) => Some(genes),
        Background::Count(_) => None,
    };
    let population = background.universe_size();

    let mut query_set: HashSet<&str> = query.genes().iter().map(String::as_str).collect();
    if let Some(universe) = universe {
        query_set.retain(|gene| universe.contains(*gene));
    }
    let draws = query_set.len() as u64;

    let mut sets: Vec<_> = library.iter().collect();
    sets.sort_by(|a, b| a.term.cmp(&b.term));

    let mut outcome = TestOutcome::default();
    for set in sets {
        let mut members = Vec::new();
        let mut seen = HashSet::new();
        for gene in &set.genes {
            let gene = query.canonicalize(gene);
            if universe.is_some_and(|universe| !universe.contains(&gene)) {
                continue;
            }
            if seen.insert(gene.clone()) {
                members.push(gene);
            }
        }
        let hits: Vec<String> = members
            .iter()
            .filter(|gene| query_set.contains(gene.as_str()))
            .cloned()
            .collect();
        if hits.is_empty() {
            continue;
        }

        let successes = members.len() as u64;
        if successes > population || draws > population {
            return Err(EnrichError::Statistics(format!(
                "background of {population} genes is smaller than term {} ({successes} genes) or the query ({draws} genes)",
                set.term
            )));
        }
        let distribution = Hypergeometric::new(population, successes, draws)
            .map_err(|err| EnrichError::Statistics(err.to_string()))?;
        let p_value = distribution.sf(hits.len() as u64 - 1);

        outcome.terms.push(set.term.clone());
        outcome.p_values.push(p_value.clamp(0.0, 1.0));
        outcome.overlap_sizes.push(hits.len());
        outcome.set_sizes.push(members.len());
        outcome.overlap_genes.push(hits);
    }
    Ok(outcome)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionMethod {
    BenjaminiHochberg,
    Bonferroni,
}

pub fn correct(
    p_values: &[f64],
    alpha: f64,
    method: CorrectionMethod,
) -> Result<(Vec<f64>, Vec<bool>), EnrichError> {
    for (i, &p) in p_values.iter().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(EnrichError::Statistics(format!(
                "invalid p-value at index {i}: {p}"
            )));
        }
    }
    let adjusted = match method {
        CorrectionMethod::BenjaminiHochberg => benjamini_hochberg(p_values),
        CorrectionMethod::Bonferroni => {
            let n = p_values.len() as f64;
            p_values.iter().map(|&p| (p * n).min(1.0)).collect()
        }
    };
    let rejected = adjusted.iter().map(|&q| q <= alpha).collect();
    Ok((adjusted, rejected))
}

fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(Ordering::Equal)
    });

    let mut adjusted = vec![0.0; n];
    let mut running_min = 1.0_f64;
    for rank in (1..=n).rev() {
        let index = order[rank - 1];
        let value = (p_values[index] * n as f64 / rank as f64).min(1.0);
        running_min = running_min.min(value);
        adjusted[index] = running_min;
    }
    adjusted
}
