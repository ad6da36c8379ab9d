//! Pest grammar parser for `.shape` definition files.

use pest_derive::Parser;

/// The `.shape` parser.
#[derive(Parser)]
#[grammar = "parser/shape.pest"]
pub struct ShapeParser;
