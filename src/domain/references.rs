//! Reference collection as a [`Visitor`] over the parse tree.

use std::collections::BTreeSet;

use super::errors::{DomainError, DomainResult};
use super::evaluator::{ordered, range_ends};
use super::models::CellRef;
use super::tree::Tree;
use super::visit::Visitor;

/// Most range cells one formula may read. Larger ranges evaluate to
/// `#REF!` and are not expanded into dependencies.
pub const MAX_RANGE_CELLS: usize = 100_000;

/// A rectangular range read by a formula, corners normalised.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RangeRef {
    pub start: CellRef,
    pub end: CellRef,
}

impl RangeRef {
    /// Number of cells in the rectangle, `None` if it overflows `usize`.
    pub fn cell_count(&self) -> Option<usize> {
        let (top, bottom) = ordered(self.start.address.row, self.end.address.row);
        let (left, right) = ordered(self.start.address.col, self.end.address.col);
        (bottom - top).checked_add(1)?.checked_mul((right - left).checked_add(1)?)
    }

    /// Every cell in the rectangle, row by row, or `None` when it holds more
    /// than [`MAX_RANGE_CELLS`] cells.
    pub fn cells(&self) -> Option<Vec<CellRef>> {
        let count = self.cell_count().filter(|&n| n <= MAX_RANGE_CELLS)?;
        let (top, bottom) = ordered(self.start.address.row, self.end.address.row);
        let (left, right) = ordered(self.start.address.col, self.end.address.col);

        let mut cells = Vec::with_capacity(count);
        for row in top..=bottom {
            for col in left..=right {
                cells.push(CellRef::new(self.start.sheet.clone(), row, col));
            }
        }
        Some(cells)
    }
}

/// Collects the sheet-qualified cells a formula mentions.
///
/// A cell written without a sheet is qualified with `sheet_name`. Every
/// reference is stored once, as `Sheet!A1` text.
#[derive(Debug, Clone)]
pub struct CellRefFinder {
    sheet_name: String,
    refs: BTreeSet<String>,
    ranges: BTreeSet<RangeRef>,
}

impl CellRefFinder {
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            refs: BTreeSet::new(),
            ranges: BTreeSet::new(),
        }
    }

    pub fn refs(&self) -> &BTreeSet<String> {
        &self.refs
    }

    pub fn into_refs(self) -> BTreeSet<String> {
        self.refs
    }

    pub fn ranges(&self) -> &BTreeSet<RangeRef> {
        &self.ranges
    }

    /// Every cell the formula reads: single references plus all cells of
    /// each range. Ranges are left out when together they exceed
    /// [`MAX_RANGE_CELLS`], since the formula then evaluates to `#REF!`
    /// whatever they hold.
    pub fn precedents(&self) -> DomainResult<BTreeSet<CellRef>> {
        let mut cells = BTreeSet::new();
        for reference in &self.refs {
            cells.insert(reference.parse::<CellRef>()?);
        }

        let total = self
            .ranges
            .iter()
            .try_fold(0usize, |total, range| total.checked_add(range.cell_count()?))
            .filter(|&total| total <= MAX_RANGE_CELLS);
        if total.is_none() {
            tracing::debug!("Skipping {} oversized ranges in {}", self.ranges.len(), self.sheet_name);
            return Ok(cells);
        }
        for range in &self.ranges {
            cells.extend(range.cells().unwrap_or_default());
        }
        Ok(cells)
    }
}

impl Visitor for CellRefFinder {
    fn cell(&mut self, tree: &Tree) -> DomainResult<()> {
        let reference = match tree.terminals().collect::<Vec<_>>().as_slice() {
            [coord] if tree.children.len() == 1 => format!("{}!{}", self.sheet_name, coord),
            [sheet, coord] if tree.children.len() == 2 => format!("{}!{}", sheet, coord),
            _ => {
                return Err(DomainError::MalformedTree(format!(
                    "cell node with {} children\n{}",
                    tree.children.len(),
                    tree.pretty()
                )));
            }
        };
        self.refs.insert(reference);
        Ok(())
    }

    fn range(&mut self, tree: &Tree) -> DomainResult<()> {
        let (start, end) = range_ends(tree, &self.sheet_name)?;
        // a range spanning sheets evaluates to #REF! and reads nothing
        if start.sheet == end.sheet {
            self.ranges.insert(RangeRef { start, end });
        }
        Ok(())
    }
}

/// Collects the references of a parsed formula.
pub fn find_references(tree: &Tree, sheet_name: &str) -> DomainResult<CellRefFinder> {
    let mut finder = CellRefFinder::new(sheet_name);
    finder.visit(tree)?;
    Ok(finder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parser::parse_expression;
    use crate::domain::tree::{Node, Rule, Terminal, TerminalKind};
    use pretty_assertions::assert_eq;

    fn refs(input: &str) -> Vec<String> {
        let tree = parse_expression(input).unwrap();
        find_references(&tree, "Sheet1")
            .unwrap()
            .into_refs()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_unqualified_cells_use_the_sheet_name() {
        assert_eq!(refs("A1 + b2"), vec!["Sheet1!A1", "Sheet1!B2"]);
    }

    #[test]
    fn test_qualified_cells_join_both_children() {
        assert_eq!(refs("Data!C3 * 2"), vec!["Data!C3"]);
        assert_eq!(refs("'Q1 Plan'!A1"), vec!["Q1 Plan!A1"]);
    }

    #[test]
    fn test_references_are_unique() {
        assert_eq!(refs("A1 + A1 + Sheet1!A1"), vec!["Sheet1!A1"]);
    }

    #[test]
    fn test_no_references() {
        assert!(refs("1 + \"A1\"").is_empty());
    }

    #[test]
    fn test_ranges_are_recorded_and_expanded() {
        let tree = parse_expression("SUM(B1:A2) + Data!C1").unwrap();
        let finder = find_references(&tree, "Sheet1").unwrap();

        assert_eq!(
            finder.refs().iter().cloned().collect::<Vec<_>>(),
            vec!["Data!C1", "Sheet1!A2", "Sheet1!B1"]
        );
        assert_eq!(finder.ranges().len(), 1);

        let precedents: Vec<String> = finder
            .precedents()
            .unwrap()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(
            precedents,
            vec!["Data!C1", "Sheet1!A1", "Sheet1!B1", "Sheet1!A2", "Sheet1!B2"]
        );
    }

    #[test]
    fn test_range_cell_counts() {
        let range = |a: &str, b: &str| RangeRef { start: a.parse().unwrap(), end: b.parse().unwrap() };

        assert_eq!(range("S!B3", "S!A1").cell_count(), Some(6));
        assert_eq!(range("S!A1", "S!A1").cells().map(|c| c.len()), Some(1));
        assert_eq!(range("S!A1", "S!ZZZ1048576").cell_count(), Some(18_278 * 1_048_576));
        assert_eq!(range("S!A1", "S!ZZZ1048576").cells(), None);
    }

    #[test]
    fn test_oversized_ranges_are_not_expanded() {
        let tree = parse_expression("SUM(A1:ZZZ1000000) + B7").unwrap();
        let finder = find_references(&tree, "Sheet1").unwrap();
        let precedents: Vec<String> = finder.precedents().unwrap().iter().map(|c| c.to_string()).collect();
        assert_eq!(precedents, vec!["Sheet1!A1", "Sheet1!B7", "Sheet1!ZZZ1000000"]);

        // two ranges that fit alone but not together
        let tree = parse_expression("SUM(A1:A60000, B1:B60000)").unwrap();
        let finder = find_references(&tree, "Sheet1").unwrap();
        assert_eq!(finder.precedents().unwrap().len(), 4);
    }

    #[test]
    fn test_malformed_cell_is_an_error() {
        let terminal = |v: &str| -> Node { Terminal::new(TerminalKind::Coord, v).into() };
        let tree = Tree::new(Rule::Cell, vec![terminal("A"), terminal("B"), terminal("C")]);

        let mut finder = CellRefFinder::new("Sheet1");
        assert!(matches!(finder.visit(&tree), Err(DomainError::MalformedTree(_))));
    }
}
