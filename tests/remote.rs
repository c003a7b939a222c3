use std::sync::Mutex;
use std::time::Duration;

use assert_matches::assert_matches;

use kira_enrichment::domain::{GeneCollection, Organism};
use kira_enrichment::enrichr::{EnrichrApi, RemoteJob};
use kira_enrichment::error::EnrichError;
use kira_enrichment::remote::RemoteJobClient;
use kira_enrichment::retry::{Pacer, RetryPolicies, RetryPolicy};

const EXPORT: &str = "Term\tOverlap\tP-value\tAdjusted P-value\tOdds Ratio\tCombined Score\tGenes\n\
p53 signaling pathway\t2/57\t0.0001\t0.002\t30.5\t280.9\tTP53;MDM2\n";

struct FlakyEnrichr {
    export_failures: usize,
    export_status: u16,
    fail_view: bool,
    exports: Mutex<usize>,
    urls: Mutex<Vec<String>>,
}

impl FlakyEnrichr {
    fn failing(export_failures: usize) -> Self {
        Self {
            export_failures,
            export_status: 502,
            fail_view: false,
            exports: Mutex::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, organism: Organism, endpoint: &str) {
        self.urls
            .lock()
            .unwrap()
            .push(format!("{}Enrichr/{endpoint}", organism.prefix()));
    }
}

impl EnrichrApi for FlakyEnrichr {
    fn add_list(
        &self,
        organism: Organism,
        genes: &str,
        _description: &str,
    ) -> Result<RemoteJob, EnrichError> {
        self.record(organism, "addList");
        assert_eq!(genes, "TP53\nMDM2\nEGFR");
        Ok(RemoteJob {
            user_list_id: 42,
            short_id: "abc123".to_string(),
        })
    }

    fn view(&self, organism: Organism, user_list_id: u64) -> Result<Vec<String>, EnrichError> {
        self.record(organism, "view");
        assert_eq!(user_list_id, 42);
        if self.fail_view {
            return Err(EnrichError::EnrichrHttp("connection reset".to_string()));
        }
        Ok(vec!["TP53".to_string(), "MDM2".to_string()])
    }

    fn export(
        &self,
        organism: Organism,
        _user_list_id: u64,
        filename: &str,
        library: &str,
    ) -> Result<String, EnrichError> {
        self.record(organism, "export");
        assert_eq!(filename, format!("{library}.run1.reports"));
        let mut calls = self.exports.lock().unwrap();
        *calls += 1;
        if *calls <= self.export_failures {
            return Err(EnrichError::EnrichrStatus {
                status: self.export_status,
                message: "export failed".to_string(),
            });
        }
        Ok(EXPORT.to_string())
    }

    fn dataset_statistics(&self, organism: Organism) -> Result<Vec<String>, EnrichError> {
        self.record(organism, "datasetStatistics");
        Ok(vec!["KEGG_2016".to_string()])
    }
}

#[derive(Default)]
struct CountingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl Pacer for CountingPacer {
    fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

fn genes() -> GeneCollection {
    GeneCollection::new(vec![
        "TP53".to_string(),
        "MDM2".to_string(),
        "EGFR".to_string(),
    ])
}

fn client(api: FlakyEnrichr) -> RemoteJobClient<FlakyEnrichr, CountingPacer> {
    RemoteJobClient::new(
        api,
        CountingPacer::default(),
        RetryPolicies::default(),
        Duration::from_millis(1000),
    )
}

#[test]
fn export_succeeds_on_fifth_attempt() {
    let client = client(FlakyEnrichr::failing(4));
    let result = client
        .run(Organism::Default, &genes(), "KEGG_2016", "run1")
        .unwrap();

    assert_eq!(result.short_id, "abc123");
    assert_eq!(result.table.len(), 1);
    assert_eq!(result.table.rows()[0].gene_set, "KEGG_2016");
    assert_eq!(*client.api().exports.lock().unwrap(), 5);
}

#[test]
fn retries_back_off_between_courtesy_pauses() {
    let api = FlakyEnrichr::failing(2);
    let pacer = CountingPacer::default();
    let client = RemoteJobClient::new(
        api,
        &pacer,
        RetryPolicies::default(),
        Duration::from_millis(1000),
    );
    client
        .run(Organism::Default, &genes(), "KEGG_2016", "run1")
        .unwrap();

    let millis: Vec<u128> = pacer
        .pauses
        .lock()
        .unwrap()
        .iter()
        .map(Duration::as_millis)
        .collect();
    assert_eq!(millis, vec![1000, 500, 1000, 1000]);
}

#[test]
fn export_gives_up_after_five_attempts() {
    let client = client(FlakyEnrichr::failing(usize::MAX));
    let err = client
        .run(Organism::Default, &genes(), "KEGG_2016", "run1")
        .unwrap_err();

    assert_matches!(
        err,
        EnrichError::RetriesExhausted { ref library, attempts: 5, .. } if library == "KEGG_2016"
    );
    assert!(err.is_network());
    assert_eq!(*client.api().exports.lock().unwrap(), 5);
}

#[test]
fn submit_verify_fetch_use_organism_prefix() {
    let client = client(FlakyEnrichr::failing(0));
    client
        .run(Organism::Fly, &genes(), "KEGG_2016", "run1")
        .unwrap();

    let urls = client.api().urls.lock().unwrap().clone();
    assert_eq!(
        urls,
        vec!["FlyEnrichr/addList", "FlyEnrichr/view", "FlyEnrichr/export"]
    );
}

#[test]
fn verify_counts_recognised_genes() {
    let client = client(FlakyEnrichr::failing(0));
    let job = client.submit(Organism::Default, &genes(), "run1").unwrap();
    assert_eq!(client.verify(Organism::Default, &job, &genes()).unwrap(), 2);
}

#[test]
fn view_failure_only_warns() {
    let mut api = FlakyEnrichr::failing(0);
    api.fail_view = true;
    let client = client(api);
    let result = client
        .run(Organism::Default, &genes(), "KEGG_2016", "run1")
        .unwrap();

    assert_eq!(result.table.len(), 1);
    let urls = client.api().urls.lock().unwrap().clone();
    assert_eq!(
        urls,
        vec!["Enrichr/addList", "Enrichr/view", "Enrichr/export"]
    );
}

#[test]
fn client_error_on_export_keeps_its_status() {
    let mut api = FlakyEnrichr::failing(usize::MAX);
    api.export_status = 404;
    let retries = RetryPolicies {
        fetch: RetryPolicy::once(),
        ..RetryPolicies::default()
    };
    let client = RemoteJobClient::new(api, CountingPacer::default(), retries, Duration::ZERO);

    let err = client
        .run(Organism::Default, &genes(), "KEGG_2016", "run1")
        .unwrap_err();

    assert_matches!(err, EnrichError::EnrichrStatus { status: 404, .. });
    assert_eq!(*client.api().exports.lock().unwrap(), 1);
}

#[test]
fn single_attempt_fetch_still_reports_exhaustion() {
    let api = FlakyEnrichr::failing(usize::MAX);
    let retries = RetryPolicies {
        fetch: RetryPolicy::once(),
        ..RetryPolicies::default()
    };
    let client = RemoteJobClient::new(api, CountingPacer::default(), retries, Duration::ZERO);

    let err = client
        .run(Organism::Default, &genes(), "KEGG_2016", "run1")
        .unwrap_err();

    assert_matches!(err, EnrichError::RetriesExhausted { attempts: 1, .. });
}
