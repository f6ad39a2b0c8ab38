//! Formula evaluation services for the workbook.
//!
//! [`FormulaEvaluator`] ties the parser, the tree walkers and the dependency
//! graph together: it evaluates formula text, reports the references a
//! formula makes, rejects edits that would create a circular reference and
//! keeps computed values current after each edit.

use std::collections::BTreeSet;

use super::dependencies::{formula_precedents, DependencyGraph};
use super::errors::{DomainError, DomainResult};
use super::evaluator::ExpressionEvaluator;
use super::functions::FunctionRegistry;
use super::models::{CellData, CellRef, Workbook};
use super::parser::parse_expression;
use super::references::find_references;
use super::value::{CellError, Value};
use super::visit::Interpreter;

/// Decimal places shown for numbers unless configured otherwise.
pub const DEFAULT_DISPLAY_PLACES: i64 = 10;

/// Returns the expression part of formula input, or `None` for plain input.
pub fn formula_body(input: &str) -> Option<&str> {
    input.strip_prefix('=')
}

/// A formula evaluation engine over a [`Workbook`].
///
/// # Examples
///
/// ```
/// use sheetwalk::domain::{CellRef, FormulaEvaluator, Workbook};
///
/// let mut book = Workbook::default();
/// let evaluator = FormulaEvaluator::new();
///
/// evaluator.set_cell_input(&mut book, &CellRef::new("Sheet1", 0, 0), "0.1").unwrap();
/// evaluator.set_cell_input(&mut book, &CellRef::new("Sheet1", 0, 1), "=A1 + 0.2").unwrap();
///
/// assert_eq!(book.sheets[0].get_cell(0, 1).value, "0.3");
/// ```
#[derive(Debug, Clone)]
pub struct FormulaEvaluator {
    functions: FunctionRegistry,
    display_places: i64,
}

impl Default for FormulaEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaEvaluator {
    pub fn new() -> Self {
        Self::with_display_places(DEFAULT_DISPLAY_PLACES)
    }

    pub fn with_display_places(display_places: i64) -> Self {
        Self {
            functions: FunctionRegistry::new(),
            display_places,
        }
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn display_places(&self) -> i64 {
        self.display_places
    }

    /// Evaluates cell input as if it were typed into `sheet`.
    ///
    /// Plain input is classified as a literal. A formula that fails to parse
    /// evaluates to `#ERROR`.
    pub fn evaluate_formula(&self, workbook: &Workbook, sheet: &str, input: &str) -> Value {
        let Some(body) = formula_body(input) else {
            return Value::from_input(input);
        };

        let result = parse_expression(body).and_then(|tree| {
            ExpressionEvaluator::new(workbook, &self.functions, sheet).visit(&tree)
        });

        match result {
            Ok(Value::Number(n)) => Value::bounded(n),
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Formula {:?} on {} failed: {}", input, sheet, e);
                CellError::Parse.into()
            }
        }
    }

    /// References made by formula input, as `Sheet!A1` strings.
    pub fn references(&self, sheet: &str, input: &str) -> DomainResult<BTreeSet<String>> {
        let Some(body) = formula_body(input) else {
            return Ok(BTreeSet::new());
        };
        let tree = parse_expression(body)?;
        Ok(find_references(&tree, sheet)?.into_refs())
    }

    /// Checks whether placing `input` at `target` would make a cell depend on
    /// itself. Input that does not parse is never circular.
    pub fn would_create_circular_reference(&self, workbook: &Workbook, target: &CellRef, input: &str) -> bool {
        let precedents = formula_precedents(input, &target.sheet);
        if precedents.is_empty() {
            return false;
        }
        DependencyGraph::build(workbook).would_create_cycle(target, &precedents)
    }

    /// Stores `input` at `target` and recalculates what depends on it.
    ///
    /// Empty input clears the cell. Returns the previous cell contents.
    pub fn set_cell_input(&self, workbook: &mut Workbook, target: &CellRef, input: &str) -> DomainResult<CellData> {
        if workbook.sheet(&target.sheet).is_none() {
            return Err(DomainError::UnknownSheet(target.sheet.clone()));
        }

        let mut graph = DependencyGraph::build(workbook);
        let precedents = formula_precedents(input, &target.sheet);
        if graph.would_create_cycle(target, &precedents) {
            tracing::info!("Rejected circular formula {:?} at {}", input, target);
            return Err(DomainError::CircularReference(target.to_string()));
        }

        let sheet = workbook
            .sheet_mut(&target.sheet)
            .ok_or_else(|| DomainError::UnknownSheet(target.sheet.clone()))?;
        let (row, col) = (target.address.row, target.address.col);
        let previous = sheet.get_cell(row, col);

        if input.is_empty() {
            sheet.clear_cell(row, col);
            graph.remove(target);
        } else if formula_body(input).is_some() {
            sheet.set_cell(row, col, CellData { value: String::new(), formula: Some(input.to_string()) });
            graph.insert(target.clone(), precedents);
        } else {
            sheet.clear_cell(row, col);
            sheet.set_cell(row, col, CellData { value: input.to_string(), formula: None });
            graph.remove(target);
        }

        let affected = graph.dependents_closure(target);
        self.recalculate_cells(workbook, &graph, &affected);
        Ok(previous)
    }

    /// Recomputes every formula in the workbook.
    pub fn recalculate_all(&self, workbook: &mut Workbook) {
        let graph = DependencyGraph::build(workbook);
        let cells = graph.formula_cells();
        self.recalculate_cells(workbook, &graph, &cells);
    }

    fn recalculate_cells(&self, workbook: &mut Workbook, graph: &DependencyGraph, cells: &BTreeSet<CellRef>) {
        let (order, cyclic) = graph.evaluation_order(cells);

        for cell in &order {
            let input = workbook.get_cell(cell).map(|c| c.input().to_string()).unwrap_or_default();
            let value = self.evaluate_formula(workbook, &cell.sheet, &input);
            if let Some(sheet) = workbook.sheet_mut(&cell.sheet) {
                sheet.store_computed(cell.address.row, cell.address.col, value, self.display_places);
            }
        }

        if !cyclic.is_empty() {
            tracing::warn!("{} cells are on or behind a reference cycle", cyclic.len());
        }
        for cell in &cyclic {
            if let Some(sheet) = workbook.sheet_mut(&cell.sheet) {
                sheet.store_computed(cell.address.row, cell.address.col, CellError::Cycle.into(), self.display_places);
            }
        }

        tracing::debug!("Recalculated {} cells", order.len() + cyclic.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Sheet;
    use pretty_assertions::assert_eq;

    fn cell(text: &str) -> CellRef {
        text.parse().unwrap()
    }

    fn workbook() -> Workbook {
        let mut book = Workbook::with_sheet(Sheet::new("Main", 100, 26, 8));
        book.add_sheet(Sheet::new("Data", 100, 26, 8)).unwrap();
        book
    }

    fn shown(book: &Workbook, reference: &str) -> String {
        book.get_cell(&cell(reference)).unwrap().value
    }

    #[test]
    fn test_non_formula_passthrough() {
        let book = workbook();
        let evaluator = FormulaEvaluator::new();

        assert_eq!(evaluator.evaluate_formula(&book, "Main", "hello"), Value::text("hello"));
        assert_eq!(evaluator.evaluate_formula(&book, "Main", "12.5"), Value::from_input("12.5"));
        assert_eq!(evaluator.evaluate_formula(&book, "Main", ""), Value::Empty);
    }

    #[test]
    fn test_evaluate_formula() {
        let book = workbook();
        let evaluator = FormulaEvaluator::new();

        assert_eq!(evaluator.evaluate_formula(&book, "Main", "=2+3*4").display(10), "14");
        assert_eq!(evaluator.evaluate_formula(&book, "Main", "=\"a\"").display(10), "a");
        assert_eq!(evaluator.evaluate_formula(&book, "Main", "=2+"), CellError::Parse.into());
        assert_eq!(evaluator.evaluate_formula(&book, "Main", "=1/3").display(4), "0.3333");
    }

    #[test]
    fn test_long_operator_chains() {
        let book = workbook();
        let evaluator = FormulaEvaluator::new();

        let sum = format!("=1{}", "+1".repeat(100_000));
        assert_eq!(evaluator.evaluate_formula(&book, "Main", &sum).display(10), "100001");

        let product = format!("=2{}", "*1".repeat(100_000));
        assert_eq!(evaluator.evaluate_formula(&book, "Main", &product).display(10), "2");

        let mixed = format!("=(1{}) * 2", "-1+1".repeat(50_000));
        assert_eq!(evaluator.evaluate_formula(&book, "Main", &mixed).display(10), "2");
    }

    #[test]
    fn test_long_chain_in_a_cell() {
        let mut book = workbook();
        let evaluator = FormulaEvaluator::new();
        let chain = format!("=A1{}", "+A1".repeat(99_999));

        evaluator.set_cell_input(&mut book, &cell("Main!A1"), "2").unwrap();
        evaluator.set_cell_input(&mut book, &cell("Main!B1"), &chain).unwrap();
        assert_eq!(shown(&book, "Main!B1"), "200000");
    }

    #[test]
    fn test_oversized_ranges() {
        let mut book = workbook();
        let evaluator = FormulaEvaluator::new();
        let set = |book: &mut Workbook, at: &str, input: &str| {
            evaluator.set_cell_input(book, &cell(at), input).unwrap();
        };

        set(&mut book, "Main!A1", "5");
        set(&mut book, "Main!B1", "=SUM(A1:A18446744073709551615)");
        set(&mut book, "Main!B2", "=SUM(A1:ZZZ1000000)");
        set(&mut book, "Main!B3", "=SUM(A1:A60000, A1:A60000)");
        set(&mut book, "Main!B4", "=SUM(A1:A60000) + 1");

        assert_eq!(shown(&book, "Main!B1"), "#ERROR");
        assert_eq!(shown(&book, "Main!B2"), "#REF!");
        assert_eq!(shown(&book, "Main!B3"), "#REF!");
        assert_eq!(shown(&book, "Main!B4"), "6");
    }

    #[test]
    fn test_numbers_stay_in_range() {
        let mut book = workbook();
        let evaluator = FormulaEvaluator::new();
        let set = |book: &mut Workbook, at: &str, input: &str| {
            evaluator.set_cell_input(book, &cell(at), input).unwrap();
        };

        set(&mut book, "Main!A1", "1e2000000");
        set(&mut book, "Main!B1", "=A1");
        set(&mut book, "Main!C1", "=A1 * 2");
        set(&mut book, "Main!A2", "1e300");
        set(&mut book, "Main!B2", "=A2 * A2");
        set(&mut book, "Main!D2", "=ROUND(A2, -1000000000000000)");

        assert_eq!(shown(&book, "Main!B1"), "1e2000000");
        assert_eq!(shown(&book, "Main!C1"), "#VALUE!");
        assert_eq!(shown(&book, "Main!B2"), "#VALUE!");
        assert_eq!(shown(&book, "Main!D2"), "0");
    }

    #[test]
    fn test_custom_function() {
        fn double(args: &[Value]) -> Value {
            match args {
                [value] => match value.as_number() {
                    Ok(n) => Value::number(&n + &n),
                    Err(e) => e.into(),
                },
                _ => CellError::Value.into(),
            }
        }

        let book = workbook();
        let mut evaluator = FormulaEvaluator::new();
        evaluator.functions_mut().register_function("DOUBLE", double);

        assert_eq!(evaluator.evaluate_formula(&book, "Main", "=double(21)").display(10), "42");
        assert_eq!(evaluator.evaluate_formula(&book, "Main", "=DOUBLE(1, 2)"), CellError::Value.into());
    }

    #[test]
    fn test_references() {
        let evaluator = FormulaEvaluator::new();
        let refs = evaluator.references("Main", "=A1 + Data!B2 + A1").unwrap();
        assert_eq!(refs.into_iter().collect::<Vec<_>>(), vec!["Data!B2", "Main!A1"]);

        assert!(evaluator.references("Main", "plain").unwrap().is_empty());
        assert!(evaluator.references("Main", "=1 +").is_err());
    }

    #[test]
    fn test_set_cell_input_recalculates_dependents() {
        let mut book = workbook();
        let evaluator = FormulaEvaluator::new();

        evaluator.set_cell_input(&mut book, &cell("Main!A1"), "10").unwrap();
        evaluator.set_cell_input(&mut book, &cell("Main!B1"), "=A1 * 2").unwrap();
        evaluator.set_cell_input(&mut book, &cell("Data!A1"), "=Main!B1 + Main!A1").unwrap();
        assert_eq!(shown(&book, "Main!B1"), "20");
        assert_eq!(shown(&book, "Data!A1"), "30");

        let previous = evaluator.set_cell_input(&mut book, &cell("Main!A1"), "1.5").unwrap();
        assert_eq!(previous.value, "10");
        assert_eq!(shown(&book, "Main!B1"), "3");
        assert_eq!(shown(&book, "Data!A1"), "4.5");
    }

    #[test]
    fn test_clearing_a_cell() {
        let mut book = workbook();
        let evaluator = FormulaEvaluator::new();

        evaluator.set_cell_input(&mut book, &cell("Main!A1"), "4").unwrap();
        evaluator.set_cell_input(&mut book, &cell("Main!A2"), "=A1 + 1").unwrap();
        evaluator.set_cell_input(&mut book, &cell("Main!A1"), "").unwrap();

        assert!(book.get_cell(&cell("Main!A1")).unwrap().is_empty());
        assert_eq!(shown(&book, "Main!A2"), "1");
    }

    #[test]
    fn test_formula_replaced_by_literal() {
        let mut book = workbook();
        let evaluator = FormulaEvaluator::new();

        evaluator.set_cell_input(&mut book, &cell("Main!A1"), "=1 + 1").unwrap();
        evaluator.set_cell_input(&mut book, &cell("Main!B1"), "=A1 * 10").unwrap();
        evaluator.set_cell_input(&mut book, &cell("Main!A1"), "text").unwrap();

        let a1 = book.get_cell(&cell("Main!A1")).unwrap();
        assert_eq!(a1.formula, None);
        assert_eq!(a1.value, "text");
        assert_eq!(shown(&book, "Main!B1"), "#VALUE!");
    }

    #[test]
    fn test_circular_reference_detection() {
        let mut book = workbook();
        let evaluator = FormulaEvaluator::new();

        evaluator.set_cell_input(&mut book, &cell("Main!A1"), "=B1 + 1").unwrap();
        evaluator.set_cell_input(&mut book, &cell("Main!B1"), "=C1 + 1").unwrap();

        assert!(evaluator.would_create_circular_reference(&book, &cell("Main!C1"), "=A1"));
        assert!(evaluator.would_create_circular_reference(&book, &cell("Main!D1"), "=D1"));
        assert!(evaluator.would_create_circular_reference(&book, &cell("Main!C1"), "=SUM(A1:A3)"));
        assert!(!evaluator.would_create_circular_reference(&book, &cell("Main!C1"), "=Data!A1"));
        assert!(!evaluator.would_create_circular_reference(&book, &cell("Main!C1"), "=A1 +"));

        let err = evaluator.set_cell_input(&mut book, &cell("Main!C1"), "=A1").unwrap_err();
        assert_eq!(err, DomainError::CircularReference("Main!C1".to_string()));
        assert!(book.get_cell(&cell("Main!C1")).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_sheet() {
        let mut book = workbook();
        let evaluator = FormulaEvaluator::new();
        assert_eq!(
            evaluator.set_cell_input(&mut book, &cell("Nope!A1"), "1"),
            Err(DomainError::UnknownSheet("Nope".to_string()))
        );
    }

    #[test]
    fn test_recalculate_all_marks_cycles() {
        let mut book = workbook();
        let sheet = book.sheet_mut("Main").unwrap();
        sheet.set_cell(0, 0, CellData { value: String::new(), formula: Some("=B1".to_string()) });
        sheet.set_cell(0, 1, CellData { value: String::new(), formula: Some("=A1".to_string()) });
        sheet.set_cell(0, 2, CellData { value: String::new(), formula: Some("=LEN(\"abc\")".to_string()) });

        FormulaEvaluator::new().recalculate_all(&mut book);

        assert_eq!(shown(&book, "Main!A1"), "#CYCLE!");
        assert_eq!(shown(&book, "Main!B1"), "#CYCLE!");
        assert_eq!(shown(&book, "Main!C1"), "3");
    }

    #[test]
    fn test_display_places() {
        let mut book = workbook();
        let evaluator = FormulaEvaluator::with_display_places(2);
        evaluator.set_cell_input(&mut book, &cell("Main!A1"), "=2/3").unwrap();
        assert_eq!(shown(&book, "Main!A1"), "0.67");
    }

    #[test]
    fn test_parse_errors_show_as_error_code() {
        let mut book = workbook();
        let evaluator = FormulaEvaluator::new();
        evaluator.set_cell_input(&mut book, &cell("Main!A1"), "=(1").unwrap();
        assert_eq!(shown(&book, "Main!A1"), "#ERROR");
    }
}
