use std::fs;
use std::time::Duration;

use kira_enrichment::background::BackgroundInput;
use kira_enrichment::config::{BackgroundEntry, Config, ConfigLoader};
use kira_enrichment::retry::{RetryPolicies, RetryPolicy};

#[test]
fn parse_full_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kira-enrich.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "organism": "Yeast",
            "description": "screen",
            "cutoff": 0.1,
            "background": "scerevisiae_gene_ensembl",
            "outdir": "results",
            "no_plot": true,
            "top_term": 25,
            "base_url": "http://localhost:8080/",
            "courtesy_delay_ms": 0,
            "retries": {
                "submit": {"max_attempts": 2, "base_delay_ms": 100},
                "verify": {"max_attempts": 1, "base_delay_ms": 0},
                "fetch": {"max_attempts": 3, "base_delay_ms": 250}
            }
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.organism, "Yeast");
    assert_eq!(resolved.description, "screen");
    assert_eq!(resolved.cutoff, 0.1);
    assert_eq!(
        resolved.background,
        BackgroundInput::Spec("scerevisiae_gene_ensembl".to_string())
    );
    assert_eq!(resolved.outdir.as_ref().map(|dir| dir.as_str()), Some("results"));
    assert!(resolved.no_plot);
    assert_eq!(resolved.top_term, 25);
    assert_eq!(resolved.courtesy_delay, Duration::ZERO);
    assert_eq!(resolved.retries.submit, RetryPolicy::with_attempts(2, 100));
    assert_eq!(resolved.retries.fetch.max_attempts, 3);
}

#[test]
fn zero_fetch_attempts_rejected() {
    let config = Config {
        retries: Some(RetryPolicies {
            fetch: RetryPolicy::with_attempts(0, 0),
            ..RetryPolicies::default()
        }),
        ..Config::default()
    };
    let err = ConfigLoader::resolve_config(config).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn gene_list_background_converts_to_set() {
    let entry = BackgroundEntry::Genes(vec!["TP53".to_string(), "TP53".to_string()]);
    match BackgroundInput::from(entry) {
        BackgroundInput::Genes(genes) => assert_eq!(genes.len(), 1),
        other => panic!("unexpected background {other:?}"),
    }
}

#[test]
fn malformed_json_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ organism: ").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert!(err.to_string().starts_with("failed to parse JSON config"));
}
