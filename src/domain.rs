use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EnrichError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Organism {
    Default,
    Fly,
    Yeast,
    Worm,
    Fish,
}

const ORGANISM_ALIASES: &[(Organism, &[&str])] = &[
    (
        Organism::Default,
        &[
            "",
            "hs",
            "mm",
            "human",
            "mouse",
            "homo sapiens",
            "mus musculus",
            "h. sapiens",
            "m. musculus",
        ],
    ),
    (
        Organism::Fly,
        &["fly", "d. melanogaster", "drosophila melanogaster"],
    ),
    (
        Organism::Yeast,
        &["yeast", "s. cerevisiae", "saccharomyces cerevisiae"],
    ),
    (
        Organism::Worm,
        &["worm", "c. elegans", "caenorhabditis elegans", "nematode"],
    ),
    (
        Organism::Fish,
        &["fish", "d. rerio", "danio rerio", "zebrafish"],
    ),
];

impl Organism {
    pub fn prefix(&self) -> &'static str {
        match self {
            Organism::Default => "",
            Organism::Fly => "Fly",
            Organism::Yeast => "Yeast",
            Organism::Worm => "Worm",
            Organism::Fish => "Fish",
        }
    }
}

impl fmt::Display for Organism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Organism::Default => write!(f, "human/mouse"),
            Organism::Fly => write!(f, "fly"),
            Organism::Yeast => write!(f, "yeast"),
            Organism::Worm => write!(f, "worm"),
            Organism::Fish => write!(f, "fish"),
        }
    }
}

impl FromStr for Organism {
    type Err = EnrichError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        ORGANISM_ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&normalized.as_str()))
            .map(|(organism, _)| *organism)
            .ok_or_else(|| EnrichError::UnsupportedOrganism(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneCollection {
    genes: Vec<String>,
    numeric: bool,
}

impl GeneCollection {
    pub fn new(genes: Vec<String>) -> Self {
        let numeric = genes.iter().all(|gene| is_integer(gene));
        let genes = if numeric {
            genes.iter().map(|gene| canonical_integer(gene)).collect()
        } else {
            genes
        };
        Self { genes, numeric }
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn joined(&self) -> String {
        self.genes.join("\n")
    }

    pub fn canonicalize(&self, gene: &str) -> String {
        if self.numeric && is_integer(gene) {
            canonical_integer(gene)
        } else {
            gene.to_string()
        }
    }
}

pub fn is_integer(value: &str) -> bool {
    value.trim().parse::<i64>().is_ok()
}

fn canonical_integer(value: &str) -> String {
    value
        .trim()
        .parse::<i64>()
        .map(|id| id.to_string())
        .unwrap_or_else(|_| value.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneSet {
    pub term: String,
    #[serde(default)]
    pub description: String,
    pub genes: Vec<String>,
}

// Inserting an existing term replaces its genes but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneSetLibrary {
    terms: Vec<GeneSet>,
}

impl GeneSetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, T, G>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, Vec<G>)>,
        T: Into<String>,
        G: Into<String>,
    {
        let mut library = Self::new();
        for (term, genes) in pairs {
            library.insert(term, genes.into_iter().map(Into::into).collect());
        }
        library
    }

    pub fn insert(&mut self, term: impl Into<String>, genes: Vec<String>) {
        self.insert_with_description(term, String::new(), genes);
    }

    pub fn insert_with_description(
        &mut self,
        term: impl Into<String>,
        description: impl Into<String>,
        genes: Vec<String>,
    ) {
        let term = term.into();
        let description = description.into();
        match self.terms.iter_mut().find(|set| set.term == term) {
            Some(existing) => {
                existing.description = description;
                existing.genes = genes;
            }
            None => self.terms.push(GeneSet {
                term,
                description,
                genes,
            }),
        }
    }

    pub fn get(&self, term: &str) -> Option<&[String]> {
        self.terms
            .iter()
            .find(|set| set.term == term)
            .map(|set| set.genes.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneSet> {
        self.terms.iter()
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|set| set.term.as_str())
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeneSetSource {
    Local {
        name: String,
        library: GeneSetLibrary,
    },
    Remote {
        library: String,
    },
}

impl GeneSetSource {
    pub fn name(&self) -> &str {
        match self {
            GeneSetSource::Local { name, .. } => name,
            GeneSetSource::Remote { library } => library,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, GeneSetSource::Local { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Background {
    Count(u64),
    GeneSet(HashSet<String>),
}

impl Background {
    pub fn universe_size(&self) -> u64 {
        match self {
            Background::Count(count) => *count,
            Background::GeneSet(genes) => genes.len() as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    pub hits: usize,
    pub size: usize,
}

impl fmt::Display for Overlap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hits, self.size)
    }
}

impl FromStr for Overlap {
    type Err = EnrichError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || EnrichError::EnrichrParse(format!("invalid overlap: {value}"));
        let (hits, size) = value.trim().split_once('/').ok_or_else(invalid)?;
        let hits = hits.trim().parse().map_err(|_| invalid())?;
        let size = size.trim().parse().map_err(|_| invalid())?;
        if hits > size {
            return Err(invalid());
        }
        Ok(Self { hits, size })
    }
}

impl Serialize for Overlap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentRow {
    pub gene_set: String,
    pub term: String,
    pub overlap: Overlap,
    pub p_value: f64,
    pub adjusted_p_value: f64,
    pub genes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odds_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    rows: Vec<EnrichmentRow>,
}

impl ResultTable {
    pub fn new(rows: Vec<EnrichmentRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[EnrichmentRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn append(&mut self, other: &ResultTable) {
        self.rows.extend(other.rows.iter().cloned());
    }

    pub fn for_gene_set<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a EnrichmentRow> {
        self.rows.iter().filter(move |row| row.gene_set == name)
    }

    pub fn gene_sets(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.gene_set.as_str()) {
                seen.push(row.gene_set.as_str());
            }
        }
        seen
    }

    pub fn significant(&self, cutoff: f64) -> impl Iterator<Item = &EnrichmentRow> {
        self.rows
            .iter()
            .filter(move |row| row.adjusted_p_value <= cutoff)
    }
}
