//! Dependency tracking between formula cells.

use std::collections::{BTreeSet, HashMap, VecDeque};

use super::models::{CellRef, Workbook};
use super::parser::parse_expression;
use super::references::find_references;
use super::services::formula_body;

/// Precedent and dependent edges for every formula cell of a workbook.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    precedents: HashMap<CellRef, BTreeSet<CellRef>>,
    dependents: HashMap<CellRef, BTreeSet<CellRef>>,
}

impl DependencyGraph {
    /// Parses every formula in the workbook and records what it reads.
    ///
    /// A formula that fails to parse is still a node, with no precedents.
    pub fn build(workbook: &Workbook) -> Self {
        let mut graph = Self::default();
        for sheet in &workbook.sheets {
            for (address, formula) in sheet.formula_cells() {
                let cell = CellRef {
                    sheet: sheet.name.clone(),
                    address,
                };
                let precedents = formula_precedents(formula, &sheet.name);
                graph.insert(cell, precedents);
            }
        }
        tracing::debug!("Dependency graph built with {} formula cells", graph.precedents.len());
        graph
    }

    /// Sets the precedents of a formula cell, replacing earlier edges.
    pub fn insert(&mut self, cell: CellRef, precedents: BTreeSet<CellRef>) {
        self.remove(&cell);
        for precedent in &precedents {
            self.dependents
                .entry(precedent.clone())
                .or_default()
                .insert(cell.clone());
        }
        self.precedents.insert(cell, precedents);
    }

    /// Forgets a formula cell's outgoing edges.
    pub fn remove(&mut self, cell: &CellRef) {
        if let Some(old) = self.precedents.remove(cell) {
            for precedent in old {
                if let Some(readers) = self.dependents.get_mut(&precedent) {
                    readers.remove(cell);
                    if readers.is_empty() {
                        self.dependents.remove(&precedent);
                    }
                }
            }
        }
    }

    pub fn is_formula(&self, cell: &CellRef) -> bool {
        self.precedents.contains_key(cell)
    }

    pub fn precedents_of(&self, cell: &CellRef) -> Option<&BTreeSet<CellRef>> {
        self.precedents.get(cell)
    }

    pub fn formula_cells(&self) -> BTreeSet<CellRef> {
        self.precedents.keys().cloned().collect()
    }

    /// `cell` and every formula cell that reads it, directly or not.
    pub fn dependents_closure(&self, cell: &CellRef) -> BTreeSet<CellRef> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([cell.clone()]);

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(readers) = self.dependents.get(&current) {
                queue.extend(readers.iter().filter(|r| !seen.contains(*r)).cloned());
            }
        }

        seen
    }

    /// Orders the formula cells among `cells` so that every cell comes after
    /// the cells it reads.
    ///
    /// Returns the ordered cells and the cells that could not be ordered
    /// because they are on a cycle or read from one.
    pub fn evaluation_order(&self, cells: &BTreeSet<CellRef>) -> (Vec<CellRef>, Vec<CellRef>) {
        let members: BTreeSet<&CellRef> = cells.iter().filter(|c| self.is_formula(c)).collect();

        let mut pending: HashMap<&CellRef, usize> = members
            .iter()
            .map(|&cell| {
                let count = self.precedents[cell]
                    .iter()
                    .filter(|p| members.contains(p))
                    .count();
                (cell, count)
            })
            .collect();

        let mut ready: BTreeSet<&CellRef> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(cell, _)| *cell)
            .collect();

        let mut order = Vec::with_capacity(members.len());
        while let Some(cell) = ready.pop_first() {
            pending.remove(cell);
            order.push(cell.clone());

            let Some(readers) = self.dependents.get(cell) else {
                continue;
            };
            for reader in readers {
                if let Some(count) = pending.get_mut(reader) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(reader);
                    }
                }
            }
        }

        let mut cyclic: Vec<CellRef> = pending.into_keys().cloned().collect();
        cyclic.sort();
        (order, cyclic)
    }

    /// Whether giving `target` these precedents would close a loop.
    pub fn would_create_cycle(&self, target: &CellRef, precedents: &BTreeSet<CellRef>) -> bool {
        if precedents.contains(target) {
            return true;
        }
        let downstream = self.dependents_closure(target);
        precedents.iter().any(|p| downstream.contains(p))
    }
}

/// Cells read by a formula's text; empty when it does not parse.
pub(crate) fn formula_precedents(input: &str, sheet_name: &str) -> BTreeSet<CellRef> {
    let Some(body) = formula_body(input) else {
        return BTreeSet::new();
    };
    parse_expression(body)
        .and_then(|tree| find_references(&tree, sheet_name))
        .and_then(|finder| finder.precedents())
        .unwrap_or_default()
}
