//! Boolean function algebra.
//!
//! A [`FunctionTable`] is a single-output sum-of-products table whose rows are
//! ternary input cubes (`0`, `1`, `-`). [`merge`] substitutes one table into an
//! input variable of another; it is the only operation workers perform on
//! function data. The [`pla`] submodule reads tables from PLA source text.

mod merge;
pub mod pla;
mod table;

pub use merge::merge;
pub use table::{parse_literals, parse_output, FunctionTable, Literal, Row};
