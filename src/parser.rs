//! Parser for the Pyrite language
//!
//! A recursive-descent parser consuming tokens straight from the lexer's
//! pull interface. Class descriptors are built at parse time so that
//! `Name(args)` can resolve to an instantiation and `class B(A):` can
//! resolve its parent.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::ast::{BinaryOp, CompareOp, Expr, LogicalOp, Program, Stmt};
use crate::error::{ErrorKind, PyriteError, Result};
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};
use crate::value::{Class, ClassHandle, Method};

/// The parser state
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    /// Classes declared so far, by name
    classes: HashMap<String, Rc<Class>>,
    /// Name and handle of the class whose body is being parsed, so its
    /// own methods can instantiate it
    current_class: Option<(String, Weak<Class>)>,
    /// Nesting depth of method bodies; `return` is only legal inside one
    method_depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser reading from a lexer
    pub fn new(lexer: Lexer<'a>) -> Self {
        Self::with_classes(lexer, HashMap::new())
    }

    /// Create a parser that already knows some classes (REPL continuation)
    pub fn with_classes(lexer: Lexer<'a>, classes: HashMap<String, Rc<Class>>) -> Self {
        Self {
            lexer,
            classes,
            current_class: None,
            method_depth: 0,
        }
    }

    /// The class table accumulated while parsing
    pub fn into_classes(self) -> HashMap<String, Rc<Class>> {
        self.classes
    }

    /// Parse the token stream into a program
    pub fn parse(&mut self) -> Result<Program> {
        let mut statements = Vec::new();

        while !self.check(&TokenKind::Eof) {
            if self.check(&TokenKind::Newline) {
                self.advance()?;
                continue;
            }
            statements.push(self.statement()?);
        }

        Ok(Program::new(statements))
    }

    // ==================== Statements ====================

    fn statement(&mut self) -> Result<Stmt> {
        if self.check(&TokenKind::Class) {
            self.class_definition()
        } else if self.check(&TokenKind::If) {
            self.if_statement()
        } else if self.check(&TokenKind::Print) {
            self.print_statement()
        } else if self.check(&TokenKind::Return) {
            self.return_statement()
        } else {
            self.simple_statement()
        }
    }

    /// Parse an indented block: NEWLINE INDENT statement+ DEDENT
    fn suite(&mut self) -> Result<Stmt> {
        self.expect(&TokenKind::Newline)?;
        self.expect(&TokenKind::Indent)?;

        let mut stmts = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
            if self.check(&TokenKind::Newline) {
                self.advance()?;
                continue;
            }
            stmts.push(self.statement()?);
        }

        self.expect(&TokenKind::Dedent)?;
        Ok(Stmt::Block { stmts })
    }

    fn class_definition(&mut self) -> Result<Stmt> {
        self.advance()?; // consume 'class'
        let name = self.expect_ident("class name")?;

        let parent = if self.match_char('(')? {
            let parent_span = self.current_span();
            let parent_name = self.expect_ident("parent class name")?;
            let parent = self.classes.get(&parent_name).cloned().ok_or_else(|| {
                PyriteError::new(ErrorKind::UnknownClass(parent_name), Some(parent_span))
            })?;
            self.expect_char(')')?;
            Some(parent)
        } else {
            None
        };

        self.expect_char(':')?;
        self.expect(&TokenKind::Newline)?;
        self.expect(&TokenKind::Indent)?;

        // The class's own name must resolve inside its method bodies
        // (a method may instantiate the class it belongs to), so the
        // descriptor is built cyclically: the suite is parsed with a weak
        // handle to the descriptor under construction.
        let enclosing = self.current_class.take();
        let mut suite_error = None;
        let class = Rc::new_cyclic(|weak| {
            self.current_class = Some((name.clone(), weak.clone()));
            let mut methods = Vec::new();
            while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
                if self.check(&TokenKind::Newline) {
                    if let Err(e) = self.advance() {
                        suite_error = Some(e);
                        break;
                    }
                    continue;
                }
                match self.method_definition() {
                    Ok(method) => methods.push(method),
                    Err(e) => {
                        suite_error = Some(e);
                        break;
                    }
                }
            }
            Class::new(name.clone(), methods, parent)
        });
        self.current_class = enclosing;
        if let Some(e) = suite_error {
            return Err(e);
        }
        self.expect(&TokenKind::Dedent)?;

        self.classes.insert(name, class.clone());
        Ok(Stmt::ClassDef { class })
    }

    fn method_definition(&mut self) -> Result<Method> {
        self.expect(&TokenKind::Def)?;
        let name = self.expect_ident("method name")?;

        self.expect_char('(')?;
        let receiver_span = self.current_span();
        let receiver = self.expect_ident("receiver parameter")?;
        if receiver != "self" {
            return Err(PyriteError::new(
                ErrorKind::ExpectedToken("self".to_string(), receiver),
                Some(receiver_span),
            ));
        }

        let mut params = Vec::new();
        while self.match_char(',')? {
            params.push(self.expect_ident("parameter name")?);
        }
        self.expect_char(')')?;
        self.expect_char(':')?;

        self.method_depth += 1;
        let body = self.suite();
        self.method_depth -= 1;
        let body = body?;

        Ok(Method {
            name,
            formal_params: params,
            body: Stmt::MethodBody {
                body: Box::new(body),
            },
        })
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.advance()?; // consume 'if'
        let condition = self.expression()?;
        self.expect_char(':')?;
        let then_branch = Box::new(self.suite()?);

        let else_branch = if self.check(&TokenKind::Else) {
            self.advance()?;
            self.expect_char(':')?;
            Some(Box::new(self.suite()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        self.advance()?; // consume 'print'

        let mut args = Vec::new();
        if !self.check(&TokenKind::Newline) && !self.check(&TokenKind::Eof) {
            loop {
                args.push(self.expression()?);
                if !self.match_char(',')? {
                    break;
                }
            }
        }

        self.end_of_line()?;
        Ok(Stmt::Print { args })
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let span = self.current_span();
        self.advance()?; // consume 'return'

        if self.method_depth == 0 {
            return Err(PyriteError::new(ErrorKind::ReturnOutsideMethod, Some(span)));
        }

        let value = self.expression()?;
        self.end_of_line()?;
        Ok(Stmt::Return { value })
    }

    /// An assignment, a field assignment, or a bare expression statement
    fn simple_statement(&mut self) -> Result<Stmt> {
        let span = self.current_span();
        let expr = self.expression()?;

        if self.check_char('=') {
            self.advance()?;
            let value = self.expression()?;
            self.end_of_line()?;

            return match expr {
                Expr::Variable { mut ids } if ids.len() == 1 => Ok(Stmt::Assign {
                    name: ids.remove(0),
                    value,
                }),
                Expr::Variable { mut ids } => {
                    let field = ids.pop().unwrap_or_default();
                    Ok(Stmt::FieldAssign {
                        object: Expr::Variable { ids },
                        field,
                        value,
                    })
                }
                _ => Err(PyriteError::new(
                    ErrorKind::InvalidAssignmentTarget,
                    Some(span),
                )),
            };
        }

        self.end_of_line()?;
        Ok(Stmt::Expr { expr })
    }

    /// Consume the Newline terminating a simple statement (Eof qualifies)
    fn end_of_line(&mut self) -> Result<()> {
        if self.check(&TokenKind::Eof) {
            return Ok(());
        }
        self.expect(&TokenKind::Newline)?;
        Ok(())
    }

    // ==================== Expressions ====================

    fn expression(&mut self) -> Result<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut expr = self.and_expr()?;
        while self.check(&TokenKind::Or) {
            self.advance()?;
            let right = self.and_expr()?;
            expr = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut expr = self.not_expr()?;
        while self.check(&TokenKind::And) {
            self.advance()?;
            let right = self.not_expr()?;
            expr = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.check(&TokenKind::Not) {
            self.advance()?;
            let operand = self.not_expr()?;
            return Ok(Expr::Not {
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    /// Comparisons do not chain: `a < b < c` is rejected
    fn comparison(&mut self) -> Result<Expr> {
        let expr = self.additive()?;

        let op = match self.current() {
            TokenKind::EqualEqual => Some(CompareOp::Eq),
            TokenKind::BangEqual => Some(CompareOp::Ne),
            TokenKind::LessEqual => Some(CompareOp::Le),
            TokenKind::GreaterEqual => Some(CompareOp::Ge),
            TokenKind::Char('<') => Some(CompareOp::Lt),
            TokenKind::Char('>') => Some(CompareOp::Gt),
            _ => None,
        };

        if let Some(op) = op {
            self.advance()?;
            let right = self.additive()?;
            return Ok(Expr::Compare {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;
        loop {
            let op = match self.current() {
                TokenKind::Char('+') => BinaryOp::Add,
                TokenKind::Char('-') => BinaryOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.term()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;
        loop {
            let op = match self.current() {
                TokenKind::Char('*') => BinaryOp::Mul,
                TokenKind::Char('/') => BinaryOp::Div,
                _ => break,
            };
            self.advance()?;
            let right = self.unary()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    /// Negation desugars to subtraction from zero: -x is 0 - x
    fn unary(&mut self) -> Result<Expr> {
        if self.check_char('-') {
            self.advance()?;
            let operand = self.unary()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Sub,
                left: Box::new(Expr::Number { value: 0 }),
                right: Box::new(operand),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        let span = self.current_span();

        let expr = match self.current().clone() {
            TokenKind::Number(value) => {
                self.advance()?;
                Expr::Number { value }
            }
            TokenKind::String(value) => {
                self.advance()?;
                Expr::String { value }
            }
            TokenKind::True => {
                self.advance()?;
                Expr::Bool { value: true }
            }
            TokenKind::False => {
                self.advance()?;
                Expr::Bool { value: false }
            }
            TokenKind::None => {
                self.advance()?;
                Expr::None
            }
            TokenKind::Char('(') => {
                self.advance()?;
                let expr = self.expression()?;
                self.expect_char(')')?;
                expr
            }
            TokenKind::Ident(name) => {
                self.advance()?;
                self.name_expr(name, span)?
            }
            _ => return Err(PyriteError::new(ErrorKind::ExpectedExpression, Some(span))),
        };

        self.call_trailers(expr)
    }

    /// An identifier-led expression: stringify, instantiation, or a dotted
    /// variable chain that may end in a method call
    fn name_expr(&mut self, name: String, span: Span) -> Result<Expr> {
        if self.check_char('(') {
            if name == "str" {
                self.expect_char('(')?;
                let operand = self.expression()?;
                self.expect_char(')')?;
                return Ok(Expr::Stringify {
                    operand: Box::new(operand),
                });
            }

            let class = self.resolve_class(&name).ok_or_else(|| {
                PyriteError::new(ErrorKind::UnknownClass(name), Some(span))
            })?;
            let args = self.arguments()?;
            return Ok(Expr::NewInstance { class, args });
        }

        let mut ids = vec![name];
        while self.check_char('.') {
            self.advance()?;
            let id = self.expect_ident("field or method name")?;
            if self.check_char('(') {
                let args = self.arguments()?;
                return Ok(Expr::MethodCall {
                    object: Box::new(Expr::Variable { ids }),
                    method: id,
                    args,
                });
            }
            ids.push(id);
        }
        Ok(Expr::Variable { ids })
    }

    /// Resolve a class name for instantiation: the class currently being
    /// defined shadows any completed class of the same name
    fn resolve_class(&self, name: &str) -> Option<ClassHandle> {
        if let Some((current, weak)) = &self.current_class {
            if current == name {
                return Some(ClassHandle::SelfReference(weak.clone()));
            }
        }
        self.classes
            .get(name)
            .map(|class| ClassHandle::Shared(class.clone()))
    }

    /// Chained method calls on an arbitrary expression: `a.f().g()`
    fn call_trailers(&mut self, mut expr: Expr) -> Result<Expr> {
        while self.check_char('.') {
            self.advance()?;
            let method = self.expect_ident("method name")?;
            let args = self.arguments()?;
            expr = Expr::MethodCall {
                object: Box::new(expr),
                method,
                args,
            };
        }
        Ok(expr)
    }

    /// A parenthesized, comma-separated argument list
    fn arguments(&mut self) -> Result<Vec<Expr>> {
        self.expect_char('(')?;
        let mut args = Vec::new();
        if !self.check_char(')') {
            loop {
                args.push(self.expression()?);
                if !self.match_char(',')? {
                    break;
                }
            }
        }
        self.expect_char(')')?;
        Ok(args)
    }

    // ==================== Token helpers ====================

    fn current(&self) -> &TokenKind {
        &self.lexer.current().kind
    }

    fn current_span(&self) -> Span {
        self.lexer.current().span
    }

    /// Consume the current token and return it
    fn advance(&mut self) -> Result<Token> {
        let token = self.lexer.current().clone();
        self.lexer.next_token()?;
        Ok(token)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current() == kind
    }

    fn check_char(&self, c: char) -> bool {
        matches!(self.current(), TokenKind::Char(current) if *current == c)
    }

    fn match_char(&mut self, c: char) -> Result<bool> {
        if self.check_char(c) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token> {
        if self.check(kind) {
            return self.advance();
        }
        Err(PyriteError::new(
            ErrorKind::ExpectedToken(kind.to_string(), self.current().to_string()),
            Some(self.current_span()),
        ))
    }

    fn expect_char(&mut self, c: char) -> Result<()> {
        if self.check_char(c) {
            self.advance()?;
            return Ok(());
        }
        Err(PyriteError::new(
            ErrorKind::ExpectedToken(c.to_string(), self.current().to_string()),
            Some(self.current_span()),
        ))
    }

    fn expect_ident(&mut self, message: &str) -> Result<String> {
        if let TokenKind::Ident(name) = self.current() {
            let name = name.clone();
            self.advance()?;
            return Ok(name);
        }
        Err(PyriteError::new(
            ErrorKind::ExpectedToken(message.to_string(), self.current().to_string()),
            Some(self.current_span()),
        ))
    }
}
