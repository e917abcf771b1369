pub mod ast;
pub mod parse;

pub use parse::{parse_source, GoParser, ParseError};
