//! Error types for the Pyrite language
//!
//! Provides structured error handling with source locations.

use crate::token::Span;
use std::fmt;

/// Error kinds in Pyrite
#[derive(Debug, Clone)]
pub enum ErrorKind {
    // Lexer errors
    UnexpectedCharacter(char),
    UnterminatedString,
    InvalidNumber(String),
    InvalidIndent,

    // Parser errors
    ExpectedToken(String, String),
    ExpectedExpression,
    InvalidAssignmentTarget,
    UnknownClass(String),
    ReturnOutsideMethod,

    // Runtime errors
    UndefinedVariable(String),
    UndefinedField(String),
    TypeMismatch(String, String),
    DivisionByZero,
    MethodNotFound(String),

    // Output stream failure
    Io(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnexpectedCharacter(c) => write!(f, "unexpected character '{}'", c),
            ErrorKind::UnterminatedString => write!(f, "unterminated string"),
            ErrorKind::InvalidNumber(s) => write!(f, "invalid number '{}'", s),
            ErrorKind::InvalidIndent => write!(f, "invalid indent"),
            ErrorKind::ExpectedToken(expected, got) => {
                write!(f, "expected '{}', got '{}'", expected, got)
            }
            ErrorKind::ExpectedExpression => write!(f, "expected expression"),
            ErrorKind::InvalidAssignmentTarget => write!(f, "invalid assignment target"),
            ErrorKind::UnknownClass(name) => write!(f, "unknown class '{}'", name),
            ErrorKind::ReturnOutsideMethod => write!(f, "return outside of method"),
            ErrorKind::UndefinedVariable(name) => write!(f, "undefined variable '{}'", name),
            ErrorKind::UndefinedField(name) => write!(f, "undefined field '{}'", name),
            ErrorKind::TypeMismatch(expected, got) => {
                write!(f, "type mismatch: expected {}, got {}", expected, got)
            }
            ErrorKind::DivisionByZero => write!(f, "division by zero"),
            ErrorKind::MethodNotFound(name) => write!(f, "method not found '{}'", name),
            ErrorKind::Io(msg) => write!(f, "output error: {}", msg),
        }
    }
}

/// A Pyrite error with location information
#[derive(Debug, Clone)]
pub struct PyriteError {
    pub kind: ErrorKind,
    pub span: Option<Span>,
    pub source_line: Option<String>,
}

impl PyriteError {
    pub fn new(kind: ErrorKind, span: Option<Span>) -> Self {
        Self {
            kind,
            span,
            source_line: None,
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        if let Some(span) = &self.span {
            let lines: Vec<&str> = source.lines().collect();
            if span.line > 0 && span.line <= lines.len() {
                self.source_line = Some(lines[span.line - 1].to_string());
            }
        }
        self
    }
}

impl fmt::Display for PyriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(span) = &self.span {
            write!(f, "[line {}:{}] Error: {}", span.line, span.column, self.kind)?;

            if let Some(ref line) = self.source_line {
                write!(f, "\n  | {}", line)?;
                write!(f, "\n  | {}^", " ".repeat(span.column.saturating_sub(1)))?;
            }
        } else {
            write!(f, "Error: {}", self.kind)?;
        }
        Ok(())
    }
}

impl std::error::Error for PyriteError {}

/// Result type for Pyrite operations
pub type Result<T> = std::result::Result<T, PyriteError>;
