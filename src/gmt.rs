use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::domain::GeneSetLibrary;
use crate::error::EnrichError;

pub fn parse_gmt(content: &str) -> GeneSetLibrary {
    let mut library = GeneSetLibrary::new();
    for line in content.lines() {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.split('\t');
        let term = match fields.next().map(str::trim) {
            Some(term) if !term.is_empty() => term,
            _ => continue,
        };
        let description = fields.next().unwrap_or_default().trim();
        let genes = fields
            .map(str::trim)
            .filter(|gene| !gene.is_empty())
            .map(str::to_string)
            .collect();
        library.insert_with_description(term, description, genes);
    }
    library
}

pub fn read_gmt(path: &Path) -> Result<GeneSetLibrary, EnrichError> {
    let content = fs::read_to_string(path).map_err(|err| EnrichError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(parse_gmt(&content))
}

pub fn write_gmt<W: Write>(library: &GeneSetLibrary, mut writer: W) -> io::Result<()> {
    for set in library.iter() {
        write!(writer, "{}\t{}", set.term, set.description)?;
        for gene in &set.genes {
            write!(writer, "\t{gene}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

pub fn is_gmt_path(value: &str) -> bool {
    value.to_lowercase().ends_with(".gmt") && Path::new(value).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ignores_description_column() {
        let library = parse_gmt("PathwayA\thttp://x\tTP53\tBRCA1\nPathwayB\t\tEGFR\n");
        assert_eq!(library.len(), 2);
        assert_eq!(
            library.get("PathwayA").unwrap(),
            &["TP53".to_string(), "BRCA1".to_string()]
        );
        assert_eq!(library.get("PathwayB").unwrap(), &["EGFR".to_string()]);
    }

    #[test]
    fn round_trip_preserves_order() {
        let library = GeneSetLibrary::from_pairs(vec![
            ("Zeta", vec!["MYC", "TP53", "AKT1"]),
            ("Alpha", vec!["EGFR"]),
            ("Mid", vec!["KRAS", "BRAF"]),
        ]);
        let mut buffer = Vec::new();
        write_gmt(&library, &mut buffer).unwrap();
        let parsed = parse_gmt(std::str::from_utf8(&buffer).unwrap());
        assert_eq!(parsed, library);
        assert_eq!(
            parsed.terms().collect::<Vec<_>>(),
            vec!["Zeta", "Alpha", "Mid"]
        );
    }

    #[test]
    fn blank_and_crlf_lines() {
        let library = parse_gmt("\r\nA\tdesc\tG1\tG2\r\n\n");
        assert_eq!(library.len(), 1);
        assert_eq!(library.get("A").unwrap(), &["G1".to_string(), "G2".to_string()]);
    }

    #[test]
    fn gmt_path_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sets.GMT");
        std::fs::write(&path, "A\t\tG1\n").unwrap();
        assert!(is_gmt_path(path.to_str().unwrap()));
        assert!(!is_gmt_path(dir.path().join("missing.gmt").to_str().unwrap()));
        assert!(!is_gmt_path("KEGG_2016"));
    }
}
