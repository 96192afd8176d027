//! Pyrite - a small indentation-based scripting language
//!
//! Dynamically typed, with single-inheritance classes, open field tables,
//! and dunder-style operator overloading. Blocks are delimited by 2-space
//! indentation.

pub mod ast;
pub mod closure;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod value;

pub use error::{PyriteError, Result};
pub use lexer::Lexer;
pub use parser::Parser;
pub use value::Value;

use std::io::Write;

use closure::Closure;
use interpreter::StreamContext;

/// Convenience function to run Pyrite source code.
///
/// Lexes, parses, and executes a whole program against a fresh root
/// closure, writing `print` output to the supplied sink.
pub fn run<W: Write>(source: &str, output: W) -> Result<()> {
    let lexer = Lexer::new(source)?;
    let mut parser = Parser::new(lexer);
    let program = parser.parse()?;

    let mut closure = Closure::new();
    let mut ctx = StreamContext::new(output);
    interpreter::run_program(&program, &mut closure, &mut ctx)
}

/// Version of the Pyrite language
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
