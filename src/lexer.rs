//! Lexer for the Pyrite language
//!
//! Converts source code into a stream of tokens. Pyrite is
//! indentation-based, so the lexer carries hidden state: the current
//! indent depth (one level = two spaces) and a pending delta that is
//! drained one synthetic Indent/Dedent token per call.

use crate::error::{ErrorKind, PyriteError, Result};
use crate::token::{lookup_keyword, Span, Token, TokenKind};

/// The lexer state
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current: Token,
    /// Indent depth of the line being scanned, in 2-space levels.
    indent: usize,
    /// Signed number of Indent (positive) or Dedent (negative) tokens
    /// still owed before fresh input is read.
    pending_indent: i64,
    current_pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer from source code.
    ///
    /// Leading comment lines are skipped, then the lexer advances once so
    /// that `current` already holds the first real token. Fails if that
    /// first token is malformed.
    pub fn new(source: &'a str) -> Result<Self> {
        let mut lexer = Self {
            source,
            chars: source.char_indices().peekable(),
            current: Token::new(TokenKind::Newline, Span::new(0, 0, 1, 1)),
            indent: 0,
            pending_indent: 0,
            current_pos: 0,
            line: 1,
            column: 1,
        };
        lexer.skip_initial_comments();
        lexer.next_token()?;
        Ok(lexer)
    }

    /// The most recently produced token
    pub fn current(&self) -> &Token {
        &self.current
    }

    /// Advance to the next token and return it
    pub fn next_token(&mut self) -> Result<Token> {
        if self.current.kind == TokenKind::Eof {
            return Ok(self.current.clone());
        }

        // A Newline ends a logical line: swallow any blank or comment lines
        // that follow and measure the indentation of the next real one.
        if self.current.kind == TokenKind::Newline {
            self.measure_indent()?;
        }

        if self.pending_indent != 0 {
            let kind = if self.pending_indent > 0 {
                self.pending_indent -= 1;
                TokenKind::Indent
            } else {
                self.pending_indent += 1;
                TokenKind::Dedent
            };
            self.current = Token::new(kind, self.span_here());
            return Ok(self.current.clone());
        }

        self.skip_spaces();

        let start_pos = self.current_pos;
        let start_line = self.line;
        let start_column = self.column;

        let kind = match self.peek_char() {
            // End-of-file mid-line first yields a synthetic Newline so every
            // logical line is terminated; the call after that yields Eof.
            None => {
                if matches!(
                    self.current.kind,
                    TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent
                ) {
                    TokenKind::Eof
                } else {
                    TokenKind::Newline
                }
            }

            Some('\n') => {
                self.advance();
                TokenKind::Newline
            }

            // A comment terminates the logical line
            Some('#') => {
                self.skip_line();
                TokenKind::Newline
            }

            Some(c) if c.is_ascii_digit() => self.scan_number()?,

            Some('\'') | Some('"') => self.scan_string()?,

            Some('=') => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Char('=')
                }
            }
            Some('!') => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::BangEqual
                } else {
                    return Err(PyriteError::new(
                        ErrorKind::UnexpectedCharacter('!'),
                        Some(Span::new(start_pos, self.current_pos, start_line, start_column)),
                    ));
                }
            }
            Some('<') => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::LessEqual
                } else {
                    TokenKind::Char('<')
                }
            }
            Some('>') => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Char('>')
                }
            }

            Some(c) if is_punctuation(c) => {
                self.advance();
                TokenKind::Char(c)
            }

            Some(c) if c.is_alphabetic() || c == '_' => self.scan_identifier(),

            Some(c) => {
                self.advance();
                return Err(PyriteError::new(
                    ErrorKind::UnexpectedCharacter(c),
                    Some(Span::new(start_pos, self.current_pos, start_line, start_column)),
                ));
            }
        };

        self.current = Token::new(
            kind,
            Span::new(start_pos, self.current_pos, start_line, start_column),
        );
        Ok(self.current.clone())
    }

    /// Advance and return the consumed character
    fn advance(&mut self) -> Option<char> {
        if let Some((pos, ch)) = self.chars.next() {
            self.current_pos = pos + ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            Some(ch)
        } else {
            self.current_pos = self.source.len();
            None
        }
    }

    /// Peek at the next character without advancing
    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn span_here(&self) -> Span {
        Span::new(self.current_pos, self.current_pos, self.line, self.column)
    }

    /// Skip spaces inside a logical line
    fn skip_spaces(&mut self) {
        while self.peek_char() == Some(' ') {
            self.advance();
        }
    }

    /// Skip the remainder of the physical line, including its newline
    fn skip_line(&mut self) {
        while let Some(c) = self.advance() {
            if c == '\n' {
                break;
            }
        }
    }

    /// Skip comment lines before the first real token
    fn skip_initial_comments(&mut self) {
        loop {
            self.skip_spaces();
            if self.peek_char() == Some('#') {
                self.skip_line();
            } else {
                return;
            }
        }
    }

    /// Consume blank and comment lines, then measure the indentation of the
    /// next real line and record the difference from the previous depth.
    fn measure_indent(&mut self) -> Result<()> {
        loop {
            let mut spaces = 0usize;
            while self.peek_char() == Some(' ') {
                self.advance();
                spaces += 1;
            }

            match self.peek_char() {
                Some('\n') => {
                    self.advance();
                }
                Some('#') => {
                    self.skip_line();
                }
                _ => {
                    if spaces % 2 == 1 {
                        return Err(PyriteError::new(
                            ErrorKind::InvalidIndent,
                            Some(self.span_here()),
                        ));
                    }
                    let level = spaces / 2;
                    self.pending_indent = level as i64 - self.indent as i64;
                    self.indent = level;
                    return Ok(());
                }
            }
        }
    }

    /// Scan a number literal
    fn scan_number(&mut self) -> Result<TokenKind> {
        let start = self.current_pos;
        let start_line = self.line;
        let start_column = self.column;

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        let end = self.current_pos;

        // A number must end at a space, newline, end of input, or punctuation.
        match self.peek_char() {
            None | Some(' ') | Some('\n') => {}
            Some(c) if is_punctuation(c) => {}
            Some(c) => {
                return Err(PyriteError::new(
                    ErrorKind::InvalidNumber(format!("{}{}", &self.source[start..end], c)),
                    Some(Span::new(start, end, start_line, start_column)),
                ));
            }
        }

        let text = &self.source[start..end];
        match text.parse::<i64>() {
            Ok(value) => Ok(TokenKind::Number(value)),
            Err(_) => Err(PyriteError::new(
                ErrorKind::InvalidNumber(text.to_string()),
                Some(Span::new(start, self.current_pos, start_line, start_column)),
            )),
        }
    }

    /// Scan a string literal, terminated by the same quote that opened it
    fn scan_string(&mut self) -> Result<TokenKind> {
        let start = self.current_pos;
        let start_line = self.line;
        let start_column = self.column;

        let quote = self.advance().unwrap_or('\'');
        let mut value = String::new();

        loop {
            match self.advance() {
                Some(c) if c == quote => return Ok(TokenKind::String(value)),
                Some('\\') => match self.advance() {
                    Some('t') => value.push('\t'),
                    Some('n') => value.push('\n'),
                    Some(c) => value.push(c),
                    None => break,
                },
                Some(c) => value.push(c),
                None => break,
            }
        }

        Err(PyriteError::new(
            ErrorKind::UnterminatedString,
            Some(Span::new(start, self.current_pos, start_line, start_column)),
        ))
    }

    /// Scan an identifier or keyword
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.current_pos;

        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.source[start..self.current_pos];

        if let Some(keyword) = lookup_keyword(text) {
            keyword
        } else {
            TokenKind::Ident(text.to_string())
        }
    }
}

fn is_punctuation(c: char) -> bool {
    matches!(
        c,
        '=' | '<' | '>' | '+' | '-' | '*' | '/' | '(' | ')' | ':' | ',' | '.'
    )
}
