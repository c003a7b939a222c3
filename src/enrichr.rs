use std::time::Duration;

use csv::ReaderBuilder;
use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{EnrichmentRow, Organism, Overlap, ResultTable};
use crate::error::EnrichError;

pub const DEFAULT_BASE_URL: &str = "https://maayanlab.cloud";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteJob {
    #[serde(rename = "userListId")]
    pub user_list_id: u64,
    #[serde(rename = "shortId")]
    pub short_id: String,
}

pub trait EnrichrApi: Send + Sync {
    fn add_list(
        &self,
        organism: Organism,
        genes: &str,
        description: &str,
    ) -> Result<RemoteJob, EnrichError>;
    fn view(&self, organism: Organism, user_list_id: u64) -> Result<Vec<String>, EnrichError>;
    fn export(
        &self,
        organism: Organism,
        user_list_id: u64,
        filename: &str,
        library: &str,
    ) -> Result<String, EnrichError>;
    fn dataset_statistics(&self, organism: Organism) -> Result<Vec<String>, EnrichError>;
}

#[derive(Clone)]
pub struct EnrichrHttpClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ViewResponse {
    genes: Vec<String>,
}

#[derive(Deserialize)]
struct StatisticsResponse {
    statistics: Vec<LibraryStatistics>,
}

#[derive(Deserialize)]
struct LibraryStatistics {
    #[serde(rename = "libraryName")]
    library_name: String,
}

impl EnrichrHttpClient {
    pub fn new(base_url: &str) -> Result<Self, EnrichError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-enrich/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| EnrichError::EnrichrHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| EnrichError::EnrichrHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint_url(&self, organism: Organism, endpoint: &str) -> String {
        format!("{}/{}Enrichr/{endpoint}", self.base_url, organism.prefix())
    }

    fn handle_status(response: Response) -> Result<Response, EnrichError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "Enrichr request failed".to_string());
        Err(EnrichError::EnrichrStatus { status, message })
    }
}

impl EnrichrApi for EnrichrHttpClient {
    fn add_list(
        &self,
        organism: Organism,
        genes: &str,
        description: &str,
    ) -> Result<RemoteJob, EnrichError> {
        let url = self.endpoint_url(organism, "addList");
        debug!(%url, "submitting gene list");
        let form = Form::new()
            .text("list", genes.to_string())
            .text("description", description.to_string());
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|err| EnrichError::EnrichrHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        response
            .json()
            .map_err(|err| EnrichError::EnrichrParse(err.to_string()))
    }

    fn view(&self, organism: Organism, user_list_id: u64) -> Result<Vec<String>, EnrichError> {
        let url = self.endpoint_url(organism, "view");
        let response = self
            .client
            .get(&url)
            .query(&[("userListId", user_list_id.to_string())])
            .send()
            .map_err(|err| EnrichError::EnrichrHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let view: ViewResponse = response
            .json()
            .map_err(|err| EnrichError::EnrichrParse(err.to_string()))?;
        Ok(view.genes)
    }

    fn export(
        &self,
        organism: Organism,
        user_list_id: u64,
        filename: &str,
        library: &str,
    ) -> Result<String, EnrichError> {
        let url = self.endpoint_url(organism, "export");
        debug!(%url, library, "exporting enrichment table");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("userListId", user_list_id.to_string()),
                ("filename", filename.to_string()),
                ("backgroundType", library.to_string()),
            ])
            .send()
            .map_err(|err| EnrichError::EnrichrHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        response
            .text()
            .map_err(|err| EnrichError::EnrichrHttp(err.to_string()))
    }

    fn dataset_statistics(&self, organism: Organism) -> Result<Vec<String>, EnrichError> {
        let url = self.endpoint_url(organism, "datasetStatistics");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| EnrichError::EnrichrHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let stats: StatisticsResponse = response
            .json()
            .map_err(|err| EnrichError::EnrichrParse(err.to_string()))?;
        let mut names: Vec<String> = stats
            .statistics
            .into_iter()
            .map(|lib| lib.library_name)
            .collect();
        names.sort();
        Ok(names)
    }
}

pub fn parse_export(payload: &str, gene_set: &str) -> Result<ResultTable, EnrichError> {
    if payload.trim().is_empty() {
        return Ok(ResultTable::default());
    }
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(payload.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| EnrichError::EnrichrParse(err.to_string()))?
        .clone();
    let column = |name: &str| headers.iter().position(|header| header.trim() == name);
    let required = |name: &str| {
        column(name)
            .ok_or_else(|| EnrichError::EnrichrParse(format!("export is missing column {name}")))
    };
    let term_col = required("Term")?;
    let overlap_col = required("Overlap")?;
    let p_col = required("P-value")?;
    let adj_col = required("Adjusted P-value")?;
    let genes_col = required("Genes")?;
    let odds_col = column("Odds Ratio");
    let score_col = column("Combined Score");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| EnrichError::EnrichrParse(err.to_string()))?;
        let field = |index: usize| record.get(index).unwrap_or_default().trim();
        let float = |index: usize| {
            field(index).parse::<f64>().map_err(|_| {
                EnrichError::EnrichrParse(format!("invalid number: {}", field(index)))
            })
        };
        rows.push(EnrichmentRow {
            gene_set: gene_set.to_string(),
            term: field(term_col).to_string(),
            overlap: field(overlap_col).parse::<Overlap>()?,
            p_value: float(p_col)?,
            adjusted_p_value: float(adj_col)?,
            genes: field(genes_col)
                .split(';')
                .map(str::trim)
                .filter(|gene| !gene.is_empty())
                .map(str::to_string)
                .collect(),
            odds_ratio: odds_col.and_then(|index| field(index).parse().ok()),
            combined_score: score_col.and_then(|index| field(index).parse().ok()),
        });
    }
    Ok(ResultTable::new(rows))
}
