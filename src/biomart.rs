use std::fs;
use std::path::Path;
use std::time::Duration;

use csv::{ReaderBuilder, WriterBuilder};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::error::EnrichError;

pub const DEFAULT_MART_URL: &str = "https://www.ensembl.org/biomart/martservice";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRow {
    #[serde(default)]
    pub ensembl_gene_id: Option<String>,
    #[serde(default)]
    pub external_gene_name: Option<String>,
    #[serde(default, alias = "entrezgene")]
    pub entrezgene_id: Option<String>,
    #[serde(default)]
    pub go_id: Option<String>,
}

impl AnnotationRow {
    pub fn entrez(&self) -> Option<String> {
        let value = self.entrezgene_id.as_deref()?.trim();
        if value.is_empty() {
            return None;
        }
        if let Ok(id) = value.parse::<i64>() {
            return Some(id.to_string());
        }
        value
            .parse::<f64>()
            .ok()
            .filter(|id| id.fract() == 0.0 && id.is_finite())
            .map(|id| (id as i64).to_string())
    }

    pub fn has_go(&self) -> bool {
        self.go_id
            .as_deref()
            .is_some_and(|go| !go.trim().is_empty())
    }
}

pub trait AnnotationClient: Send + Sync {
    fn query_dataset(&self, dataset: &str) -> Result<Vec<AnnotationRow>, EnrichError>;
}

#[derive(Clone)]
pub struct BiomartHttpClient {
    client: Client,
    base_url: String,
}

impl BiomartHttpClient {
    pub fn new(base_url: &str) -> Result<Self, EnrichError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-enrich/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| EnrichError::BiomartHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|err| EnrichError::BiomartHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn query_xml(dataset: &str) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?><!DOCTYPE Query>"#,
                r#"<Query virtualSchemaName="default" formatter="TSV" header="0" uniqueRows="1" datasetConfigVersion="0.6">"#,
                r#"<Dataset name="{}" interface="default">"#,
                r#"<Attribute name="ensembl_gene_id"/>"#,
                r#"<Attribute name="external_gene_name"/>"#,
                r#"<Attribute name="entrezgene_id"/>"#,
                r#"<Attribute name="go_id"/>"#,
                r#"</Dataset></Query>"#
            ),
            dataset
        )
    }
}

impl AnnotationClient for BiomartHttpClient {
    fn query_dataset(&self, dataset: &str) -> Result<Vec<AnnotationRow>, EnrichError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("query", Self::query_xml(dataset))])
            .send()
            .map_err(|err| EnrichError::BiomartHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "BioMart request failed".to_string());
            return Err(EnrichError::BiomartStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| EnrichError::BiomartHttp(err.to_string()))?;
        if body.trim_start().starts_with("Query ERROR") {
            return Err(EnrichError::BiomartStatus {
                status: 400,
                message: body.trim().to_string(),
            });
        }
        parse_mart_tsv(&body)
    }
}

pub fn parse_mart_tsv(body: &str) -> Result<Vec<AnnotationRow>, EnrichError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| EnrichError::BiomartHttp(err.to_string()))?;
        let field = |index: usize| {
            record
                .get(index)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        rows.push(AnnotationRow {
            ensembl_gene_id: field(0),
            external_gene_name: field(1),
            entrezgene_id: field(2),
            go_id: field(3),
        });
    }
    Ok(rows)
}

pub fn read_annotation_table(path: &Path) -> Result<Vec<AnnotationRow>, EnrichError> {
    let read_err = |message: String| EnrichError::Read {
        path: path.to_path_buf(),
        message,
    };
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|err| read_err(err.to_string()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<AnnotationRow>, _>>()
        .map_err(|err| read_err(err.to_string()))
}

pub fn write_annotation_table(path: &Path, rows: &[AnnotationRow]) -> Result<(), EnrichError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| EnrichError::Filesystem(err.to_string()))?;
    }
    let tmp_path = path.with_extension("txt.tmp");
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(&tmp_path)
        .map_err(|err| EnrichError::Filesystem(err.to_string()))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| EnrichError::Filesystem(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| EnrichError::Filesystem(err.to_string()))?;
    drop(writer);
    fs::rename(&tmp_path, path).map_err(|err| EnrichError::Filesystem(err.to_string()))?;
    Ok(())
}
