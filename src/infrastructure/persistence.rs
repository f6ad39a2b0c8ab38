use crate::domain::{FormulaEvaluator, Workbook};
use super::errors::{InfrastructureError, InfrastructureResult};
use std::fs;
use std::path::Path;

pub struct FileRepository;

impl FileRepository {
    pub fn save_workbook(workbook: &Workbook, path: impl AsRef<Path>) -> InfrastructureResult<String> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(workbook)?;
        fs::write(path, json).map_err(|e| InfrastructureError::io(path, e))?;

        tracing::info!("Saved {} sheets to {}", workbook.sheets.len(), path.display());
        Ok(path.display().to_string())
    }

    /// Reads a workbook and recomputes its formulas, since computed values
    /// are not stored in the file. Sheet names go through the same checks as
    /// sheets added interactively.
    pub fn load_workbook(path: impl AsRef<Path>, evaluator: &FormulaEvaluator) -> InfrastructureResult<(Workbook, String)> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| InfrastructureError::io(path, e))?;
        let stored: Workbook = serde_json::from_str(&content)?;
        let mut workbook = Workbook::from_sheets(stored.sheets)?;
        evaluator.recalculate_all(&mut workbook);

        tracing::info!("Loaded {} sheets from {}", workbook.sheets.len(), path.display());
        Ok((workbook, path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CellRef, DomainError, Sheet};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_recomputes_formulas() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.json");
        let evaluator = FormulaEvaluator::new();

        let mut book = Workbook::default();
        book.add_sheet(Sheet::new("Rates", 10, 5, 8)).unwrap();
        evaluator.set_cell_input(&mut book, &CellRef::new("Rates", 0, 0), "0.07").unwrap();
        evaluator.set_cell_input(&mut book, &CellRef::new("Sheet1", 0, 0), "200").unwrap();
        evaluator
            .set_cell_input(&mut book, &CellRef::new("Sheet1", 0, 1), "=A1 * Rates!A1")
            .unwrap();

        FileRepository::save_workbook(&book, &path).unwrap();
        let (loaded, name) = FileRepository::load_workbook(&path, &evaluator).unwrap();

        assert_eq!(name, path.display().to_string());
        assert_eq!(loaded.sheet_names(), vec!["Sheet1", "Rates"]);
        let b1 = loaded.sheets[0].get_cell(0, 1);
        assert_eq!(b1.formula.as_deref(), Some("=A1 * Rates!A1"));
        assert_eq!(b1.value, "14");
        assert_eq!(
            loaded.value_at(&CellRef::new("Sheet1", 0, 1)),
            crate::domain::Value::from_input("14")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = FileRepository::load_workbook(dir.path().join("missing.json"), &FormulaEvaluator::new());
        assert!(matches!(result, Err(InfrastructureError::Io { .. })));
    }

    #[test]
    fn test_load_rejects_duplicate_sheet_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dupes.json");

        let mut book = Workbook::default();
        book.add_sheet(Sheet::new("Data", 10, 5, 8)).unwrap();
        book.sheets.push(Sheet::new("Data", 10, 5, 8));
        FileRepository::save_workbook(&book, &path).unwrap();

        let result = FileRepository::load_workbook(&path, &FormulaEvaluator::new());
        assert!(matches!(
            result,
            Err(InfrastructureError::Domain(DomainError::InvalidSheetName(_)))
        ));
    }

    #[test]
    fn test_load_rejects_invalid_sheet_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("names.json");
        let mut book = Workbook::default();
        book.sheets[0].name = "a!b".to_string();
        FileRepository::save_workbook(&book, &path).unwrap();

        let result = FileRepository::load_workbook(&path, &FormulaEvaluator::new());
        assert!(matches!(result, Err(InfrastructureError::Domain(_))));
    }

    #[test]
    fn test_load_without_sheets_gives_default_workbook() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, r#"{ "sheets": [] }"#).unwrap();

        let (loaded, _) = FileRepository::load_workbook(&path, &FormulaEvaluator::new()).unwrap();
        assert_eq!(loaded.sheet_names(), vec!["Sheet1"]);
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = FileRepository::load_workbook(&path, &FormulaEvaluator::new());
        assert!(matches!(result, Err(InfrastructureError::Json(_))));
    }
}
