pub mod dependencies;
pub mod errors;
pub mod evaluator;
pub mod functions;
pub mod models;
pub mod parser;
pub mod references;
pub mod services;
pub mod tree;
pub mod value;
pub mod visit;

pub use dependencies::DependencyGraph;
pub use errors::*;
pub use evaluator::{CellSource, ExpressionEvaluator};
pub use functions::{FunctionImpl, FunctionRegistry};
pub use models::*;
pub use parser::parse_expression;
pub use references::{find_references, CellRefFinder, RangeRef};
pub use services::*;
pub use tree::{Node, Rule, Terminal, TerminalKind, Tree};
pub use value::{CellError, Value};
pub use visit::{Interpreter, Visited, Visitor};
