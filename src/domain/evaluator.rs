//! Formula evaluation as an [`Interpreter`] over the parse tree.

use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};

use super::errors::{DomainError, DomainResult};
use super::functions::FunctionRegistry;
use super::models::{CellAddress, CellRef, Workbook};
use super::references::{RangeRef, MAX_RANGE_CELLS};
use super::tree::{Node, Rule, TerminalKind, Tree};
use super::value::{CellError, Value};
use super::visit::{Interpreter, Visited};

/// Where cell values come from during evaluation.
pub trait CellSource {
    fn cell_value(&self, cell: &CellRef) -> Value;
}

impl CellSource for Workbook {
    fn cell_value(&self, cell: &CellRef) -> Value {
        self.value_at(cell)
    }
}

/// Evaluates a formula tree to a [`Value`].
///
/// Structural problems (a tree the parser could not have produced) are
/// reported as [`DomainError::MalformedTree`]; everything else, including
/// type mismatches and division by zero, becomes an error value.
pub struct ExpressionEvaluator<'a, S: CellSource + ?Sized> {
    source: &'a S,
    functions: &'a FunctionRegistry,
    current_sheet: &'a str,
    /// Range cells expanded so far while evaluating this formula.
    expanded_cells: usize,
}

impl<'a, S: CellSource + ?Sized> ExpressionEvaluator<'a, S> {
    pub fn new(source: &'a S, functions: &'a FunctionRegistry, current_sheet: &'a str) -> Self {
        Self {
            source,
            functions,
            current_sheet,
            expanded_cells: 0,
        }
    }

    /// Evaluates a left-associative chain of `rule` nodes.
    ///
    /// The chain's spine is walked with a loop rather than by recursing into
    /// each left operand, so `1+1+...+1` needs constant stack however long
    /// it is. Right operands are ordinary subtrees.
    fn fold_chain(&mut self, tree: &Tree, rule: Rule) -> DomainResult<Value> {
        let spine = tree.left_spine(rule);
        let innermost = spine.last().copied().unwrap_or(tree);
        let first = match innermost.children.first() {
            Some(Node::Tree(first)) => first,
            _ => return Err(malformed("left operand must be a subtree", innermost)),
        };

        let mut acc = self.visit(first)?;
        for node in spine.iter().rev() {
            let (op, rhs) = match node.children.as_slice() {
                [_, Node::Terminal(op), Node::Tree(rhs)] => (op.value.as_str(), rhs),
                _ => return Err(malformed("binary node needs a terminal operator and two subtrees", node)),
            };
            let rhs = self.visit(rhs)?;
            acc = binary(rule, op, &acc, &rhs)
                .ok_or_else(|| malformed(&format!("unexpected operator {}", op), node))?;
        }
        Ok(acc)
    }

    fn cell_ref(&self, tree: &Tree) -> DomainResult<CellRef> {
        cell_ref_of(tree, self.current_sheet)
    }

    /// Expands a `range` node into its cell values, row by row.
    ///
    /// A range on two sheets, or one that would take the formula past
    /// [`MAX_RANGE_CELLS`] expanded cells in total, reads as `#REF!`.
    fn range_values(&mut self, tree: &Tree) -> DomainResult<Vec<Value>> {
        let (start, end) = range_ends(tree, self.current_sheet)?;
        if start.sheet != end.sheet {
            return Ok(vec![CellError::Ref.into()]);
        }

        let range = RangeRef { start, end };
        let within_budget = range
            .cell_count()
            .and_then(|count| self.expanded_cells.checked_add(count))
            .filter(|&total| total <= MAX_RANGE_CELLS);
        let Some(total) = within_budget else {
            return Ok(vec![CellError::Ref.into()]);
        };
        self.expanded_cells = total;

        let cells = range.cells().unwrap_or_default();
        Ok(cells.iter().map(|cell| self.source.cell_value(cell)).collect())
    }
}

impl<S: CellSource + ?Sized> Interpreter for ExpressionEvaluator<'_, S> {
    type Output = Value;

    fn add_expr(&mut self, tree: &Tree) -> DomainResult<Value> {
        self.fold_chain(tree, Rule::AddExpr)
    }

    fn mul_expr(&mut self, tree: &Tree) -> DomainResult<Value> {
        self.fold_chain(tree, Rule::MulExpr)
    }

    fn neg(&mut self, tree: &Tree) -> DomainResult<Value> {
        let operand = single_value(self.visit_children(tree)?, tree)?;
        Ok(match operand.as_number() {
            Ok(n) => Value::Number(-n),
            Err(e) => e.into(),
        })
    }

    fn parens(&mut self, tree: &Tree) -> DomainResult<Value> {
        single_value(self.visit_children(tree)?, tree)
    }

    fn number(&mut self, tree: &Tree) -> DomainResult<Value> {
        let text = single_terminal(tree, TerminalKind::Number)?;
        BigDecimal::from_str(text)
            .map(Value::bounded)
            .map_err(|e| malformed(&format!("invalid number {}: {}", text, e), tree))
    }

    fn string(&mut self, tree: &Tree) -> DomainResult<Value> {
        let text = single_terminal(tree, TerminalKind::String)?;
        let inner = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .ok_or_else(|| malformed("string literal is not quoted", tree))?;
        Ok(Value::Text(inner.to_string()))
    }

    fn cell(&mut self, tree: &Tree) -> DomainResult<Value> {
        let cell = self.cell_ref(tree)?;
        Ok(self.source.cell_value(&cell))
    }

    fn range(&mut self, tree: &Tree) -> DomainResult<Value> {
        // Validate the shape even though a bare range has no scalar value.
        range_ends(tree, self.current_sheet)?;
        Ok(CellError::Value.into())
    }

    fn call(&mut self, tree: &Tree) -> DomainResult<Value> {
        let (name, args) = tree
            .children
            .split_first()
            .ok_or_else(|| malformed("call without a name", tree))?;
        let name = name
            .as_terminal()
            .filter(|t| t.kind == TerminalKind::Name)
            .ok_or_else(|| malformed("call name must be a terminal", tree))?;

        let Some(func) = self.functions.get_function(&name.value).copied() else {
            return Ok(CellError::Name.into());
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let arg = arg
                .as_tree()
                .ok_or_else(|| malformed("call argument must be a subtree", tree))?;
            if arg.rule == Rule::Range {
                values.extend(self.range_values(arg)?);
            } else {
                values.push(self.visit(arg)?);
            }
        }

        Ok(func(&values))
    }
}

/// Builds the reference named by a `cell` node.
pub(crate) fn cell_ref_of(tree: &Tree, current_sheet: &str) -> DomainResult<CellRef> {
    let (sheet, coord) = match tree.children.as_slice() {
        [Node::Terminal(coord)] => (current_sheet, coord),
        [Node::Terminal(sheet), Node::Terminal(coord)] => (sheet.value.as_str(), coord),
        _ => return Err(malformed("unexpected cell shape", tree)),
    };
    let address = CellAddress::parse(&coord.value)
        .ok_or_else(|| DomainError::InvalidCellReference(coord.value.clone()))?;
    Ok(CellRef {
        sheet: sheet.to_string(),
        address,
    })
}

/// Both corners of a `range` node.
pub(crate) fn range_ends(tree: &Tree, current_sheet: &str) -> DomainResult<(CellRef, CellRef)> {
    match tree.children.as_slice() {
        [Node::Tree(start), Node::Tree(end)]
            if start.rule == Rule::Cell && end.rule == Rule::Cell =>
        {
            Ok((
                cell_ref_of(start, current_sheet)?,
                cell_ref_of(end, current_sheet)?,
            ))
        }
        _ => Err(malformed("unexpected range shape", tree)),
    }
}

pub(crate) fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Applies one binary operator of `rule`, or `None` if the operator does not
/// belong to that rule. Type and arithmetic failures are error values.
fn binary(rule: Rule, op: &str, lhs: &Value, rhs: &Value) -> Option<Value> {
    let valid = match rule {
        Rule::AddExpr => matches!(op, "+" | "-"),
        Rule::MulExpr => matches!(op, "*" | "/"),
        _ => false,
    };
    if !valid {
        return None;
    }

    let (a, b) = match numeric_operands(lhs, rhs) {
        Ok(pair) => pair,
        Err(e) => return Some(e.into()),
    };
    Some(match op {
        "+" => Value::bounded(a + b),
        "-" => Value::bounded(a - b),
        "*" => Value::bounded(a * b),
        _ if b.is_zero() => CellError::Div0.into(),
        _ => Value::bounded(a / b),
    })
}

fn numeric_operands(lhs: &Value, rhs: &Value) -> Result<(BigDecimal, BigDecimal), CellError> {
    // an error operand wins over a type mismatch on the other side
    if let Value::Error(e) = lhs {
        return Err(*e);
    }
    if let Value::Error(e) = rhs {
        return Err(*e);
    }
    Ok((lhs.as_number()?, rhs.as_number()?))
}

fn single_value(values: Vec<Visited<'_, Value>>, tree: &Tree) -> DomainResult<Value> {
    let mut values = values.into_iter();
    match (values.next(), values.next()) {
        (Some(Visited::Value(value)), None) => Ok(value),
        _ => Err(malformed("expected exactly one operand", tree)),
    }
}

fn single_terminal(tree: &Tree, kind: TerminalKind) -> DomainResult<&str> {
    match tree.children.as_slice() {
        [Node::Terminal(t)] if t.kind == kind => Ok(&t.value),
        _ => Err(malformed("expected a single terminal", tree)),
    }
}

fn malformed(message: &str, tree: &Tree) -> DomainError {
    DomainError::MalformedTree(format!("{}\n{}", message, tree.pretty()))
}
