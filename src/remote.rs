use std::collections::HashSet;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::{GeneCollection, Organism, ResultTable};
use crate::enrichr::{EnrichrApi, RemoteJob, parse_export};
use crate::error::EnrichError;
use crate::retry::{Pacer, RetryPolicies, is_retryable, with_retries};

#[derive(Debug, Clone)]
pub struct RemoteResult {
    pub short_id: String,
    pub table: ResultTable,
}

pub struct RemoteJobClient<A: EnrichrApi, P: Pacer> {
    api: A,
    pacer: P,
    retries: RetryPolicies,
    courtesy_delay: Duration,
}

impl<A: EnrichrApi, P: Pacer> RemoteJobClient<A, P> {
    pub fn new(api: A, pacer: P, retries: RetryPolicies, courtesy_delay: Duration) -> Self {
        Self {
            api,
            pacer,
            retries,
            courtesy_delay,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn libraries(&self, organism: Organism) -> Result<Vec<String>, EnrichError> {
        self.api.dataset_statistics(organism)
    }

    pub fn run(
        &self,
        organism: Organism,
        genes: &GeneCollection,
        library: &str,
        description: &str,
    ) -> Result<RemoteResult, EnrichError> {
        let job = self.submit(organism, genes, description)?;
        if let Err(err) = self.verify(organism, &job, genes) {
            warn!(error = %err, "could not verify recognised genes");
        }
        let table = self.fetch(organism, &job, library, description)?;
        Ok(RemoteResult {
            short_id: job.short_id,
            table,
        })
    }

    pub fn submit(
        &self,
        organism: Organism,
        genes: &GeneCollection,
        description: &str,
    ) -> Result<RemoteJob, EnrichError> {
        let payload = genes.joined();
        let job = with_retries(self.retries.submit, &self.pacer, |_| {
            self.api.add_list(organism, &payload, description)
        })
        .map_err(|(err, _)| err)?;
        self.pacer.pause(self.courtesy_delay);
        Ok(job)
    }

    pub fn verify(
        &self,
        organism: Organism,
        job: &RemoteJob,
        genes: &GeneCollection,
    ) -> Result<usize, EnrichError> {
        let returned = with_retries(self.retries.verify, &self.pacer, |_| {
            self.api.view(organism, job.user_list_id)
        })
        .map_err(|(err, _)| err)?;
        let returned: HashSet<&str> = returned.iter().map(String::as_str).collect();
        let recognised = genes
            .genes()
            .iter()
            .filter(|gene| returned.contains(gene.as_str()))
            .count();
        info!("{recognised} genes successfully recognized by Enrichr");
        Ok(recognised)
    }

    pub fn fetch(
        &self,
        organism: Organism,
        job: &RemoteJob,
        library: &str,
        description: &str,
    ) -> Result<ResultTable, EnrichError> {
        let filename = format!("{library}.{description}.reports");
        let policy = self.retries.fetch;
        let payload = with_retries(policy, &self.pacer, |_| {
            self.api
                .export(organism, job.user_list_id, &filename, library)
        })
        .map_err(|(err, attempts)| {
            if attempts >= policy.max_attempts.max(1) && is_retryable(&err) {
                EnrichError::RetriesExhausted {
                    library: library.to_string(),
                    attempts,
                    message: err.to_string(),
                }
            } else {
                err
            }
        })?;
        self.pacer.pause(self.courtesy_delay);
        parse_export(&payload, library)
    }
}
