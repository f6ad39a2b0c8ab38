//! Tree walkers.
//!
//! Two traversal styles are provided over [`Tree`]:
//!
//! - [`Visitor`] walks every subtree bottom-up and calls the method named
//!   after the subtree's rule. It returns nothing; implementors accumulate
//!   state in `self`. Reference collection is a visitor.
//! - [`Interpreter`] starts at the root and lets each rule method decide
//!   whether and how to descend, producing an [`Interpreter::Output`] per
//!   node. Evaluation is an interpreter.
//!
//! Both default every rule method, so an implementor only writes the rules it
//! cares about.

use super::errors::{DomainError, DomainResult};
use super::tree::{Node, Rule, Terminal, Tree};

/// Bottom-up visitor over every subtree.
pub trait Visitor {
    /// Visits all subtrees of `tree`, children before parents.
    fn visit(&mut self, tree: &Tree) -> DomainResult<()> {
        for subtree in tree.iter_subtrees() {
            self.visit_rule(subtree)?;
        }
        Ok(())
    }

    fn visit_rule(&mut self, tree: &Tree) -> DomainResult<()> {
        match tree.rule {
            Rule::AddExpr => self.add_expr(tree),
            Rule::MulExpr => self.mul_expr(tree),
            Rule::Neg => self.neg(tree),
            Rule::Parens => self.parens(tree),
            Rule::Number => self.number(tree),
            Rule::String => self.string(tree),
            Rule::Cell => self.cell(tree),
            Rule::Range => self.range(tree),
            Rule::Call => self.call(tree),
        }
    }

    /// Called for rules without their own method override.
    fn default_rule(&mut self, _tree: &Tree) -> DomainResult<()> {
        Ok(())
    }

    fn add_expr(&mut self, tree: &Tree) -> DomainResult<()> {
        self.default_rule(tree)
    }

    fn mul_expr(&mut self, tree: &Tree) -> DomainResult<()> {
        self.default_rule(tree)
    }

    fn neg(&mut self, tree: &Tree) -> DomainResult<()> {
        self.default_rule(tree)
    }

    fn parens(&mut self, tree: &Tree) -> DomainResult<()> {
        self.default_rule(tree)
    }

    fn number(&mut self, tree: &Tree) -> DomainResult<()> {
        self.default_rule(tree)
    }

    fn string(&mut self, tree: &Tree) -> DomainResult<()> {
        self.default_rule(tree)
    }

    fn cell(&mut self, tree: &Tree) -> DomainResult<()> {
        self.default_rule(tree)
    }

    fn range(&mut self, tree: &Tree) -> DomainResult<()> {
        self.default_rule(tree)
    }

    fn call(&mut self, tree: &Tree) -> DomainResult<()> {
        self.default_rule(tree)
    }
}

/// A child as seen by [`Interpreter::visit_children`]: subtrees are
/// interpreted, terminals are passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Visited<'t, T> {
    Terminal(&'t Terminal),
    Value(T),
}

impl<'t, T> Visited<'t, T> {
    pub fn terminal(&self) -> Option<&'t Terminal> {
        match self {
            Visited::Terminal(terminal) => Some(terminal),
            Visited::Value(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Visited::Value(value) => Some(value),
            Visited::Terminal(_) => None,
        }
    }
}

/// Top-down interpreter producing one output per visited tree.
pub trait Interpreter {
    type Output;

    fn visit(&mut self, tree: &Tree) -> DomainResult<Self::Output> {
        match tree.rule {
            Rule::AddExpr => self.add_expr(tree),
            Rule::MulExpr => self.mul_expr(tree),
            Rule::Neg => self.neg(tree),
            Rule::Parens => self.parens(tree),
            Rule::Number => self.number(tree),
            Rule::String => self.string(tree),
            Rule::Cell => self.cell(tree),
            Rule::Range => self.range(tree),
            Rule::Call => self.call(tree),
        }
    }

    /// Interprets each subtree child in order, passing terminals through.
    fn visit_children<'t>(
        &mut self,
        tree: &'t Tree,
    ) -> DomainResult<Vec<Visited<'t, Self::Output>>> {
        tree.children
            .iter()
            .map(|child| match child {
                Node::Tree(subtree) => self.visit(subtree).map(Visited::Value),
                Node::Terminal(terminal) => Ok(Visited::Terminal(terminal)),
            })
            .collect()
    }

    /// Called for rules the implementor did not handle.
    fn default_rule(&mut self, tree: &Tree) -> DomainResult<Self::Output> {
        Err(DomainError::MalformedTree(format!(
            "no handler for rule {}\n{}",
            tree.rule,
            tree.pretty()
        )))
    }

    fn add_expr(&mut self, tree: &Tree) -> DomainResult<Self::Output> {
        self.default_rule(tree)
    }

    fn mul_expr(&mut self, tree: &Tree) -> DomainResult<Self::Output> {
        self.default_rule(tree)
    }

    fn neg(&mut self, tree: &Tree) -> DomainResult<Self::Output> {
        self.default_rule(tree)
    }

    fn parens(&mut self, tree: &Tree) -> DomainResult<Self::Output> {
        self.default_rule(tree)
    }

    fn number(&mut self, tree: &Tree) -> DomainResult<Self::Output> {
        self.default_rule(tree)
    }

    fn string(&mut self, tree: &Tree) -> DomainResult<Self::Output> {
        self.default_rule(tree)
    }

    fn cell(&mut self, tree: &Tree) -> DomainResult<Self::Output> {
        self.default_rule(tree)
    }

    fn range(&mut self, tree: &Tree) -> DomainResult<Self::Output> {
        self.default_rule(tree)
    }

    fn call(&mut self, tree: &Tree) -> DomainResult<Self::Output> {
        self.default_rule(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parser::parse_expression;
    use pretty_assertions::assert_eq;

    /// Records rule names in visiting order.
    #[derive(Default)]
    struct Trace(Vec<&'static str>);

    impl Visitor for Trace {
        fn default_rule(&mut self, tree: &Tree) -> DomainResult<()> {
            self.0.push(tree.rule.name());
            Ok(())
        }
    }

    /// Counts number literals, refusing anything else it does not know.
    struct Counter;

    impl Interpreter for Counter {
        type Output = usize;

        fn add_expr(&mut self, tree: &Tree) -> DomainResult<usize> {
            Ok(self
                .visit_children(tree)?
                .into_iter()
                .filter_map(Visited::into_value)
                .sum())
        }

        fn number(&mut self, _tree: &Tree) -> DomainResult<usize> {
            Ok(1)
        }
    }

    #[test]
    fn test_visitor_visits_bottom_up() {
        let tree = parse_expression("(1 + A1) * 2").unwrap();
        let mut trace = Trace::default();
        trace.visit(&tree).unwrap();
        assert_eq!(
            trace.0,
            vec!["number", "cell", "add_expr", "parens", "number", "mul_expr"]
        );
    }

    #[test]
    fn test_interpreter_passes_terminals_through() {
        let tree = parse_expression("1 + 2").unwrap();
        let children = Counter.visit_children(&tree).unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(children[1].terminal().map(|t| t.value.as_str()), Some("+"));
        assert_eq!(Counter.visit(&tree).unwrap(), 2);
    }

    #[test]
    fn test_interpreter_unhandled_rule_is_malformed() {
        let tree = parse_expression("1 + \"x\"").unwrap();
        assert!(matches!(
            Counter.visit(&tree),
            Err(DomainError::MalformedTree(_))
        ));
    }
}
