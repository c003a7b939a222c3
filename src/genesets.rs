use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use crate::domain::{GeneSetLibrary, GeneSetSource};
use crate::error::EnrichError;
use crate::gmt::{is_gmt_path, read_gmt};

#[derive(Debug, Clone, PartialEq)]
pub enum GeneSetEntry {
    Name(String),
    Mapping {
        name: Option<String>,
        library: GeneSetLibrary,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeneSetsInput {
    Joined(String),
    List(Vec<GeneSetEntry>),
    Mapping(GeneSetLibrary),
}

impl GeneSetsInput {
    fn into_entries(self) -> Vec<GeneSetEntry> {
        match self {
            GeneSetsInput::Joined(value) => value
                .trim()
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(|token| GeneSetEntry::Name(token.to_string()))
                .collect(),
            GeneSetsInput::List(entries) => entries,
            GeneSetsInput::Mapping(library) => vec![GeneSetEntry::Mapping {
                name: None,
                library,
            }],
        }
    }
}

pub fn resolve_gene_sets<F>(
    input: GeneSetsInput,
    fetch_catalog: F,
) -> Result<Vec<GeneSetSource>, EnrichError>
where
    F: FnOnce() -> Result<Vec<String>, EnrichError>,
{
    let entries = input.into_entries();
    let needs_catalog = entries
        .iter()
        .any(|entry| matches!(entry, GeneSetEntry::Name(_)));
    let catalog: HashSet<String> = if needs_catalog {
        info!("connecting to Enrichr server to get latest library names");
        match fetch_catalog() {
            Ok(names) => names.into_iter().collect(),
            Err(err) => {
                warn!(error = %err, "could not retrieve Enrichr library names");
                HashSet::new()
            }
        }
    } else {
        HashSet::new()
    };

    let mut sources = Vec::new();
    let mut custom = 0usize;
    for entry in entries {
        match entry {
            GeneSetEntry::Name(token) => {
                if catalog.contains(&token) {
                    sources.push(GeneSetSource::Remote { library: token });
                } else if is_gmt_path(&token) {
                    info!("user defined gene sets given: {token}");
                    let library = read_gmt(Path::new(&token))?;
                    if library.is_empty() {
                        warn!("gene set file {token} contains no terms, skipping");
                        continue;
                    }
                    sources.push(GeneSetSource::Local {
                        name: gmt_name(&token),
                        library,
                    });
                } else {
                    warn!("{token} is neither an Enrichr library nor a GMT file, skipping");
                }
            }
            GeneSetEntry::Mapping { name, library } => {
                let name = name.unwrap_or_else(|| {
                    custom += 1;
                    format!("CUSTOM{custom}")
                });
                if library.is_empty() {
                    warn!("gene set mapping {name} has no terms, skipping");
                    continue;
                }
                sources.push(GeneSetSource::Local { name, library });
            }
        }
    }

    if sources.is_empty() {
        return Err(EnrichError::NoGeneSets);
    }
    Ok(sources)
}

fn gmt_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use assert_matches::assert_matches;

    use super::*;

    fn catalog() -> Result<Vec<String>, EnrichError> {
        Ok(vec!["GO_Biological_Process_2021".to_string(), "KEGG_2016".to_string()])
    }

    #[test]
    fn joined_names_resolve_against_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let gmt = dir.path().join("hallmark.gmt");
        std::fs::write(&gmt, "HALLMARK_P53\t\tTP53\tMDM2\n").unwrap();
        let input = GeneSetsInput::Joined(format!(
            " KEGG_2016 , Unknown_Library,{}",
            gmt.display()
        ));

        let sources = resolve_gene_sets(input, catalog).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(
            sources[0],
            GeneSetSource::Remote {
                library: "KEGG_2016".to_string()
            }
        );
        assert_eq!(sources[1].name(), "hallmark");
        assert!(sources[1].is_local());
    }

    #[test]
    fn mappings_get_custom_names_without_catalog() {
        let fetched = Cell::new(false);
        let library = GeneSetLibrary::from_pairs(vec![("PathwayA", vec!["TP53"])]);
        let input = GeneSetsInput::List(vec![
            GeneSetEntry::Mapping {
                name: None,
                library: library.clone(),
            },
            GeneSetEntry::Mapping {
                name: Some("mine".to_string()),
                library: library.clone(),
            },
            GeneSetEntry::Mapping {
                name: None,
                library,
            },
        ]);
        let sources = resolve_gene_sets(input, || {
            fetched.set(true);
            catalog()
        })
        .unwrap();
        let names: Vec<_> = sources.iter().map(GeneSetSource::name).collect();
        assert_eq!(names, vec!["CUSTOM1", "mine", "CUSTOM2"]);
        assert!(!fetched.get());
    }

    #[test]
    fn nothing_resolved_is_an_error() {
        let err = resolve_gene_sets(GeneSetsInput::Joined("Nope".to_string()), catalog)
            .unwrap_err();
        assert_matches!(err, EnrichError::NoGeneSets);
        assert!(err.is_configuration());
    }

    #[test]
    fn catalog_failure_still_resolves_local_sources() {
        let dir = tempfile::tempdir().unwrap();
        let gmt = dir.path().join("local.gmt");
        std::fs::write(&gmt, "T\t\tG\n").unwrap();
        let input = GeneSetsInput::List(vec![
            GeneSetEntry::Name("KEGG_2016".to_string()),
            GeneSetEntry::Name(gmt.display().to_string()),
        ]);
        let sources = resolve_gene_sets(input, || {
            Err(EnrichError::EnrichrHttp("offline".to_string()))
        })
        .unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name(), "local");
    }

    #[test]
    fn empty_mapping_is_dropped() {
        let input = GeneSetsInput::Mapping(GeneSetLibrary::new());
        assert_matches!(
            resolve_gene_sets(input, catalog),
            Err(EnrichError::NoGeneSets)
        );
    }
}
