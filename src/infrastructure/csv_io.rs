//! CSV interchange for single sheets.

use std::fs::File;
use std::path::Path;

use crate::domain::{CellData, Sheet};
use super::errors::{InfrastructureError, InfrastructureResult};

pub struct CsvExporter;

impl CsvExporter {
    /// Writes the displayed values of the sheet's used area.
    ///
    /// Formulas are not exported, only what they evaluated to.
    pub fn export_sheet(sheet: &Sheet, path: impl AsRef<Path>) -> InfrastructureResult<String> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| InfrastructureError::io(path, e))?;
        let mut writer = csv::WriterBuilder::new().flexible(false).from_writer(file);

        if let Some((rows, cols)) = sheet.used_extent() {
            for row in 0..rows {
                let record: Vec<String> = (0..cols).map(|col| sheet.get_cell(row, col).value).collect();
                writer.write_record(&record)?;
            }
        }
        writer.flush().map_err(|e| InfrastructureError::io(path, e))?;

        tracing::info!("Exported sheet {} to {}", sheet.name, path.display());
        Ok(path.display().to_string())
    }

    /// Builds a sheet from a CSV file. Each field is taken as typed input,
    /// so fields starting with `=` become formulas; callers recalculate.
    pub fn import_sheet(
        path: impl AsRef<Path>,
        name: &str,
        min_rows: usize,
        min_cols: usize,
        default_column_width: usize,
    ) -> InfrastructureResult<Sheet> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| InfrastructureError::io(path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut sheet = Sheet::new(name, min_rows, min_cols, default_column_width);
        let mut imported = 0usize;
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            for (col, field) in record.iter().enumerate() {
                if field.is_empty() {
                    continue;
                }
                let data = if field.starts_with('=') {
                    CellData { value: String::new(), formula: Some(field.to_string()) }
                } else {
                    CellData { value: field.to_string(), formula: None }
                };
                sheet.set_cell(row, col, data);
                imported += 1;
            }
        }

        tracing::info!("Imported {} cells from {}", imported, path.display());
        Ok(sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CellRef, FormulaEvaluator, Workbook};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_export_writes_display_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let evaluator = FormulaEvaluator::new();

        let mut book = Workbook::default();
        evaluator.set_cell_input(&mut book, &CellRef::new("Sheet1", 0, 0), "2").unwrap();
        evaluator.set_cell_input(&mut book, &CellRef::new("Sheet1", 0, 1), "=A1 / 4").unwrap();
        evaluator.set_cell_input(&mut book, &CellRef::new("Sheet1", 1, 0), "a, b").unwrap();

        CsvExporter::export_sheet(&book.sheets[0], &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "2,0.5\n\"a, b\",\n");
    }

    #[test]
    fn test_export_empty_sheet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        CsvExporter::export_sheet(&Sheet::new("S", 5, 5, 8), &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_import_keeps_formulas() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.csv");
        std::fs::write(&path, "1,2,=A1+B1\nname,,\"x,y\"\n").unwrap();

        let sheet = CsvExporter::import_sheet(&path, "Imported", 100, 26, 8).unwrap();
        assert_eq!(sheet.get_cell(0, 0).value, "1");
        assert_eq!(sheet.get_cell(0, 2).formula.as_deref(), Some("=A1+B1"));
        assert_eq!(sheet.get_cell(1, 2).value, "x,y");
        assert!(sheet.get_cell(1, 1).is_empty());

        let mut book = Workbook::with_sheet(sheet);
        FormulaEvaluator::new().recalculate_all(&mut book);
        assert_eq!(book.sheets[0].get_cell(0, 2).value, "3");
    }

    #[test]
    fn test_import_missing_file() {
        let dir = tempdir().unwrap();
        let result = CsvExporter::import_sheet(dir.path().join("nope.csv"), "S", 10, 10, 8);
        assert!(matches!(result, Err(InfrastructureError::Io { .. })));
    }
}
