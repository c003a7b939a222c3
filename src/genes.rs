use std::fs;
use std::path::PathBuf;

use crate::domain::GeneCollection;
use crate::error::EnrichError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneListInput {
    Genes(Vec<String>),
    Table(Vec<Vec<String>>),
    File(PathBuf),
}

pub fn normalize(input: &GeneListInput) -> Result<GeneCollection, EnrichError> {
    let genes = match input {
        GeneListInput::Genes(genes) => genes.clone(),
        GeneListInput::Table(rows) => normalize_table(rows)?,
        GeneListInput::File(path) => read_gene_file(path)?,
    };
    if genes.is_empty() {
        return Err(EnrichError::EmptyGeneList);
    }
    Ok(GeneCollection::new(genes))
}

fn normalize_table(rows: &[Vec<String>]) -> Result<Vec<String>, EnrichError> {
    let Some(width) = rows.first().map(Vec::len) else {
        return Ok(Vec::new());
    };
    if let Some(index) = rows.iter().position(|row| row.len() != width) {
        return Err(EnrichError::InvalidGeneList(format!(
            "row {} has {} columns, expected {width}",
            index + 1,
            rows[index].len()
        )));
    }
    let genes = match width {
        0 => Vec::new(),
        1 => rows.iter().map(|row| row[0].clone()).collect(),
        2 => rows.iter().map(|row| row.join(",")).collect(),
        _ => rows.iter().map(|row| row[..3].join("\t")).collect(),
    };
    Ok(genes)
}

pub(crate) fn read_gene_file(path: &std::path::Path) -> Result<Vec<String>, EnrichError> {
    let content = fs::read_to_string(path).map_err(|err| EnrichError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;

    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn bed_rows_keep_first_three_columns() {
        let input = GeneListInput::Table(vec![
            row(&["chr1", "100", "200", "peak1"]),
            row(&["chr2", "300", "400", "peak2"]),
        ]);
        let genes = normalize(&input).unwrap();
        assert_eq!(genes.genes(), &["chr1\t100\t200", "chr2\t300\t400"]);
        assert!(!genes.is_numeric());
    }

    #[test]
    fn weighted_rows_are_comma_joined() {
        let input = GeneListInput::Table(vec![row(&["TP53", "1.5"]), row(&["EGFR", "0.2"])]);
        let genes = normalize(&input).unwrap();
        assert_eq!(genes.genes(), &["TP53,1.5", "EGFR,0.2"]);
    }

    #[test]
    fn single_column_is_squeezed() {
        let input = GeneListInput::Table(vec![row(&["7157"]), row(&["672"])]);
        let genes = normalize(&input).unwrap();
        assert_eq!(genes.genes(), &["7157", "672"]);
        assert!(genes.is_numeric());
    }

    #[test]
    fn ragged_table_is_rejected() {
        let input = GeneListInput::Table(vec![row(&["TP53", "1"]), row(&["EGFR"])]);
        assert_matches!(normalize(&input), Err(EnrichError::InvalidGeneList(_)));
    }

    #[test]
    fn file_input_reads_one_gene_per_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "TP53\n BRCA1 \n\nEGFR").unwrap();
        let genes = normalize(&GeneListInput::File(file.path().to_path_buf())).unwrap();
        assert_eq!(genes.genes(), &["TP53", "BRCA1", "EGFR"]);
    }

    #[test]
    fn missing_file_propagates_read_error() {
        let input = GeneListInput::File(PathBuf::from("/nonexistent/genes.txt"));
        assert_matches!(normalize(&input), Err(EnrichError::Read { .. }));
    }

    #[test]
    fn empty_list_is_rejected() {
        assert_matches!(
            normalize(&GeneListInput::Genes(Vec::new())),
            Err(EnrichError::EmptyGeneList)
        );
    }
}
