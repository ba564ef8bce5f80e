//! LAP front end: lexing, parsing and the parsed plan descriptors.

pub mod lexer;
pub mod parser;
pub mod plan;
pub mod token;

pub use lexer::{Lexer, tokenize};
pub use parser::{Parser, parse_plan};
pub use plan::PlanSource;
pub use token::{Token, TokenKind};
