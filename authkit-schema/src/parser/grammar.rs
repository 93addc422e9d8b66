//! Pest grammar for rendered schema definitions.

use pest_derive::Parser;

/// The DDL extraction parser.
#[derive(Parser)]
#[grammar = "parser/ddl.pest"]
pub struct DdlParser;
