//! Parse tree produced by the formula parser.
//!
//! The tree is deliberately generic: every interior node is a [`Tree`] tagged
//! with the grammar [`Rule`] that produced it, and every leaf is a
//! [`Terminal`] carrying the source text it was lexed from. Walkers in
//! [`crate::domain::visit`] dispatch on the rule and inspect the children,
//! so the shape of each rule's children is part of the contract:
//!
//! | rule       | children                                  |
//! |------------|-------------------------------------------|
//! | `add_expr` | tree, `AddOp` terminal, tree              |
//! | `mul_expr` | tree, `MulOp` terminal, tree              |
//! | `neg`      | tree                                      |
//! | `parens`   | tree                                      |
//! | `number`   | `Number` terminal                         |
//! | `string`   | `String` terminal (quotes included)       |
//! | `cell`     | `Coord`, or `Sheet` then `Coord`          |
//! | `range`    | `cell` tree, `cell` tree                  |
//! | `call`     | `Name` terminal, argument trees...        |

use std::fmt;

/// Grammar rule that produced a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    AddExpr,
    MulExpr,
    Neg,
    Parens,
    Number,
    String,
    Cell,
    Range,
    Call,
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::AddExpr => "add_expr",
            Rule::MulExpr => "mul_expr",
            Rule::Neg => "neg",
            Rule::Parens => "parens",
            Rule::Number => "number",
            Rule::String => "string",
            Rule::Cell => "cell",
            Rule::Range => "range",
            Rule::Call => "call",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of a leaf token kept in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalKind {
    Number,
    String,
    Sheet,
    Coord,
    Name,
    AddOp,
    MulOp,
}

/// A leaf of the parse tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    pub kind: TerminalKind,
    pub value: String,
}

impl Terminal {
    pub fn new(kind: TerminalKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// A child of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Tree(Tree),
    Terminal(Terminal),
}

impl Node {
    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Node::Tree(tree) => Some(tree),
            Node::Terminal(_) => None,
        }
    }

    pub fn as_terminal(&self) -> Option<&Terminal> {
        match self {
            Node::Terminal(terminal) => Some(terminal),
            Node::Tree(_) => None,
        }
    }
}

impl From<Tree> for Node {
    fn from(tree: Tree) -> Self {
        Node::Tree(tree)
    }
}

impl From<Terminal> for Node {
    fn from(terminal: Terminal) -> Self {
        Node::Terminal(terminal)
    }
}

/// An interior node of the parse tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub rule: Rule,
    pub children: Vec<Node>,
}

impl Tree {
    pub fn new(rule: Rule, children: Vec<Node>) -> Self {
        Self { rule, children }
    }

    /// Returns every subtree, children before their parent.
    pub fn iter_subtrees(&self) -> Vec<&Tree> {
        let mut out = Vec::new();
        let mut stack = vec![(self, false)];

        while let Some((tree, expanded)) = stack.pop() {
            if expanded {
                out.push(tree);
                continue;
            }
            stack.push((tree, true));
            for child in tree.children.iter().rev() {
                if let Node::Tree(subtree) = child {
                    stack.push((subtree, false));
                }
            }
        }

        out
    }

    /// Terminal children in order, skipping subtrees.
    pub fn terminals(&self) -> impl Iterator<Item = &Terminal> {
        self.children.iter().filter_map(Node::as_terminal)
    }

    /// The `rule` nodes reached by following first children from `self`,
    /// outermost first. A left-associative operator chain such as
    /// `1 + 2 + 3` is one spine, however long it is.
    pub fn left_spine(&self, rule: Rule) -> Vec<&Tree> {
        let mut spine = Vec::new();
        let mut current = Some(self);
        while let Some(tree) = current.filter(|t| t.rule == rule) {
            spine.push(tree);
            current = tree.children.first().and_then(Node::as_tree);
        }
        spine
    }

    /// Indented dump of the tree, one node per line.
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, 0);
        out
    }

    fn write_pretty(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let only_terminals = self.children.iter().all(|c| matches!(c, Node::Terminal(_)));

        if only_terminals {
            let values: Vec<&str> = self.terminals().map(|t| t.value.as_str()).collect();
            out.push_str(&format!("{}{}\t{}\n", indent, self.rule, values.join("\t")));
            return;
        }

        out.push_str(&format!("{}{}\n", indent, self.rule));
        for child in &self.children {
            match child {
                Node::Tree(tree) => tree.write_pretty(out, depth + 1),
                Node::Terminal(terminal) => {
                    out.push_str(&format!("{}  {}\n", indent, terminal.value));
                }
            }
        }
    }
}

impl Drop for Tree {
    // Long operator chains nest one level per operator; unlink them with an
    // explicit stack instead of recursive drop glue.
    fn drop(&mut self) {
        let mut pending: Vec<Tree> = Vec::new();
        let mut children = std::mem::take(&mut self.children);
        loop {
            for child in children.drain(..) {
                if let Node::Tree(subtree) = child {
                    pending.push(subtree);
                }
            }
            match pending.pop() {
                Some(mut tree) => children = std::mem::take(&mut tree.children),
                None => break,
            }
        }
    }
}
