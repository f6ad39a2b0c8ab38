//! sheetwalk - a terminal spreadsheet with a multi-sheet formula engine.
//!
//! Formulas are parsed into a generic tree, walked by visitors and
//! interpreters, and recalculated through a cross-sheet dependency graph.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
pub use application::*;
