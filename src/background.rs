use std::collections::HashSet;
use std::path::Path;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use regex::Regex;
use tracing::{info, warn};

use crate::biomart::{AnnotationClient, AnnotationRow, read_annotation_table, write_annotation_table};
use crate::domain::{Background, GeneCollection, is_integer};
use crate::error::EnrichError;
use crate::genes::read_gene_file;

pub const DATA_DIR_ENV: &str = "KIRA_ENRICH_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundInput {
    Count(u64),
    Genes(HashSet<String>),
    Spec(String),
}

impl Default for BackgroundInput {
    fn default() -> Self {
        BackgroundInput::Spec("hsapiens_gene_ensembl".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct BackgroundStore {
    cache_root: Utf8PathBuf,
    data_root: Utf8PathBuf,
}

impl BackgroundStore {
    pub fn new() -> Result<Self, EnrichError> {
        let cache_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("kira-enrichment"))
                    .ok()
            })
            .ok_or_else(|| {
                EnrichError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        let data_root = std::env::var(DATA_DIR_ENV)
            .map(Utf8PathBuf::from)
            .unwrap_or_else(|_| Utf8PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/data")));
        Ok(Self {
            cache_root,
            data_root,
        })
    }

    pub fn new_with_paths(cache_root: Utf8PathBuf, data_root: Utf8PathBuf) -> Self {
        Self {
            cache_root,
            data_root,
        }
    }

    pub fn cache_path(&self, name: &str) -> Utf8PathBuf {
        self.cache_root.join(background_file_name(name))
    }

    pub fn bundled_path(&self, name: &str) -> Utf8PathBuf {
        self.data_root.join(background_file_name(name))
    }
}

pub fn background_file_name(name: &str) -> String {
    format!("{name}.background.genes.txt")
}

pub struct BackgroundResolver<'a, C: AnnotationClient> {
    store: &'a BackgroundStore,
    annotations: &'a C,
}

impl<'a, C: AnnotationClient> BackgroundResolver<'a, C> {
    pub fn new(store: &'a BackgroundStore, annotations: &'a C) -> Self {
        Self { store, annotations }
    }

    pub fn resolve(
        &self,
        input: &BackgroundInput,
        genes: &GeneCollection,
    ) -> Result<Background, EnrichError> {
        match input {
            BackgroundInput::Count(0) => Err(EnrichError::InvalidBackground(
                "background size must be positive".to_string(),
            )),
            BackgroundInput::Count(count) => Ok(Background::Count(*count)),
            BackgroundInput::Genes(set) => type_matched(
                set.iter().map(|gene| genes.canonicalize(gene)).collect(),
                genes,
                "explicit gene set",
            ),
            BackgroundInput::Spec(value) => self.resolve_spec(value.trim(), genes),
        }
    }

    fn resolve_spec(&self, value: &str, genes: &GeneCollection) -> Result<Background, EnrichError> {
        if !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit()) {
            let count = value
                .parse::<u64>()
                .map_err(|_| EnrichError::InvalidBackground(value.to_string()))?;
            return self.resolve(&BackgroundInput::Count(count), genes);
        }
        if Path::new(value).is_file() {
            let set = read_gene_file(Path::new(value))?
                .iter()
                .map(|gene| genes.canonicalize(gene))
                .collect();
            return type_matched(set, genes, value);
        }
        if is_dataset_name(value) {
            return self.resolve_named(value, genes);
        }
        Err(EnrichError::InvalidBackground(value.to_string()))
    }

    fn resolve_named(&self, name: &str, genes: &GeneCollection) -> Result<Background, EnrichError> {
        let cached = self.store.cache_path(name);
        let bundled = self.store.bundled_path(name);
        let rows = if cached.as_std_path().is_file() {
            read_annotation_table(cached.as_std_path())?
        } else if bundled.as_std_path().is_file() {
            read_annotation_table(bundled.as_std_path())?
        } else {
            warn!("downloading {name} for the first time, this might take a couple of minutes");
            let rows: Vec<AnnotationRow> = self
                .annotations
                .query_dataset(name)?
                .into_iter()
                .filter(AnnotationRow::has_go)
                .collect();
            if let Err(err) = write_annotation_table(cached.as_std_path(), &rows) {
                warn!(error = %err, path = %cached, "could not cache background annotations");
            }
            rows
        };
        info!("using all annotated genes with GO_ID as background genes");

        let set: HashSet<String> = rows
            .iter()
            .filter_map(|row| {
                let entrez = row.entrez()?;
                if genes.is_numeric() {
                    Some(entrez)
                } else {
                    row.external_gene_name
                        .as_deref()
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                }
            })
            .collect();
        let background = type_matched(set, genes, name)?;
        info!("background: found {} genes", background.universe_size());
        Ok(background)
    }
}

// Numeric queries need Entrez ids in the universe and symbol queries need
// symbols, otherwise nothing can overlap.
fn type_matched(
    set: HashSet<String>,
    genes: &GeneCollection,
    origin: &str,
) -> Result<Background, EnrichError> {
    if set.is_empty() {
        return Err(EnrichError::InvalidBackground(format!(
            "{origin} contains no genes"
        )));
    }
    let is_entrez = |gene: &String| is_integer(gene);
    if genes.is_numeric() && !set.iter().any(is_entrez) {
        return Err(EnrichError::InvalidBackground(format!(
            "{origin} has no Entrez ids to match the numeric gene list"
        )));
    }
    if !genes.is_numeric() && set.iter().all(is_entrez) {
        return Err(EnrichError::InvalidBackground(format!(
            "{origin} holds only Entrez ids but the gene list uses symbols"
        )));
    }
    Ok(Background::GeneSet(set))
}

fn is_dataset_name(value: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_]+$")
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}
