//! Sandboxed expressions for derived variables.
//!
//! A [`Script`] is compiled once and evaluated per value set against the
//! table that owns it. The language has literals, `$('name')` lookups of
//! other variables of the row, arithmetic, comparisons, three-valued logic,
//! `cond ? a : b` and a fixed library of functions:
//!
//! | function              | result                                   |
//! |-----------------------|------------------------------------------|
//! | `now()`, `today()`    | evaluation time as datetime / date       |
//! | `year`, `month`, `day`, `weekday` | date parts (weekday 1 = Monday) |
//! | `concat(...)`         | text of the non-null arguments           |
//! | `coalesce(...)`       | first non-null argument                  |
//! | `isNull(x)`, `size(x)`| null test, element count                 |
//!
//! Any function can be called as a method on its first argument:
//! `$('visit').year()`.
//!
//! Expressions nest at most [`MAX_DEPTH`] levels; deeper input is a syntax
//! error.
//!
//! # Example
//!
//! ```ignore
//! let script = Script::compile("$('weight') / ($('height') * $('height'))")?;
//! let bmi = script.evaluate(&value_set, table)?;
//! ```

mod ast;
mod eval;
mod lexer;
mod library;
mod parser;

pub mod error;
pub mod filter;
pub mod script;
pub mod source;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use error::{Result, ScriptError};
pub use filter::ScriptFilter;
pub use parser::MAX_DEPTH;
pub use script::Script;
pub use source::ScriptVariableValueSource;
