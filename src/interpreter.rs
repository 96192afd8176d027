//! Tree-walking evaluator for Pyrite
//!
//! Executes statements against a closure, producing side effects on the
//! context's output stream. Method dispatch, operator overloading through
//! dunder methods, and value formatting all live here.
//!
//! Evaluation is recursive: AST depth and scripted method call depth map
//! directly onto the host stack, so deeply recursive programs are limited
//! by it (a few thousand frames on a default 8 MiB stack).

use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::{BinaryOp, CompareOp, Expr, LogicalOp, Program, Stmt};
use crate::closure::Closure;
use crate::error::{ErrorKind, PyriteError, Result};
use crate::value::{Instance, Value};

const INIT_METHOD: &str = "__init__";
const ADD_METHOD: &str = "__add__";
const EQ_METHOD: &str = "__eq__";
const LT_METHOD: &str = "__lt__";
const STR_METHOD: &str = "__str__";

/// Ambient execution services for a running program
pub trait Context {
    /// The sink that `print` writes to
    fn output_stream(&mut self) -> &mut dyn Write;
}

/// A Context backed by any writable sink
pub struct StreamContext<W: Write> {
    output: W,
}

impl<W: Write> StreamContext<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<W: Write> Context for StreamContext<W> {
    fn output_stream(&mut self) -> &mut dyn Write {
        &mut self.output
    }
}

/// How a statement completed: fall through to the next statement, or
/// unwind out of the enclosing method with a value.
#[derive(Debug)]
pub enum Flow {
    Normal(Value),
    Returned(Value),
}

impl Flow {
    /// The carried value, ignoring how the statement completed
    pub fn value(self) -> Value {
        match self {
            Flow::Normal(value) | Flow::Returned(value) => value,
        }
    }
}

/// Execute a whole program against a root closure
pub fn run_program(program: &Program, closure: &mut Closure, ctx: &mut dyn Context) -> Result<()> {
    for stmt in &program.statements {
        execute(stmt, closure, ctx)?;
    }
    Ok(())
}

/// Run a single statement
pub fn execute(stmt: &Stmt, closure: &mut Closure, ctx: &mut dyn Context) -> Result<Flow> {
    match stmt {
        Stmt::Assign { name, value } => {
            let value = evaluate(value, closure, ctx)?;
            closure.insert(name.clone(), value.clone());
            Ok(Flow::Normal(value))
        }

        Stmt::FieldAssign { object, field, value } => {
            let target = evaluate(object, closure, ctx)?;
            let instance = expect_instance(&target)?;
            let value = evaluate(value, closure, ctx)?;
            instance.set_field(field.clone(), value.clone());
            Ok(Flow::Normal(value))
        }

        Stmt::Print { args } => {
            let mut parts = Vec::with_capacity(args.len());
            for arg in args {
                let value = evaluate(arg, closure, ctx)?;
                parts.push(format_value(&value, ctx)?);
            }
            writeln!(ctx.output_stream(), "{}", parts.join(" ")).map_err(output_error)?;
            Ok(Flow::Normal(Value::None))
        }

        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => {
            if evaluate(condition, closure, ctx)?.is_truthy() {
                execute(then_branch, closure, ctx)
            } else if let Some(else_branch) = else_branch {
                execute(else_branch, closure, ctx)
            } else {
                Ok(Flow::Normal(Value::None))
            }
        }

        Stmt::Block { stmts } => {
            for stmt in stmts {
                if let Flow::Returned(value) = execute(stmt, closure, ctx)? {
                    return Ok(Flow::Returned(value));
                }
            }
            Ok(Flow::Normal(Value::None))
        }

        Stmt::Return { value } => {
            let value = evaluate(value, closure, ctx)?;
            Ok(Flow::Returned(value))
        }

        Stmt::ClassDef { class } => {
            closure.insert(class.name().to_string(), Value::Class(class.clone()));
            Ok(Flow::Normal(Value::None))
        }

        Stmt::MethodBody { body } => match execute(body, closure, ctx)? {
            Flow::Returned(value) => Ok(Flow::Normal(value)),
            Flow::Normal(_) => Ok(Flow::Normal(Value::None)),
        },

        Stmt::Expr { expr } => {
            let value = evaluate(expr, closure, ctx)?;
            Ok(Flow::Normal(value))
        }
    }
}

/// Evaluate an expression to a value
pub fn evaluate(expr: &Expr, closure: &Closure, ctx: &mut dyn Context) -> Result<Value> {
    match expr {
        Expr::Number { value } => Ok(Value::Number(*value)),
        Expr::String { value } => Ok(Value::String(value.clone())),
        Expr::Bool { value } => Ok(Value::Bool(*value)),
        Expr::None => Ok(Value::None),

        Expr::Variable { ids } => {
            let mut value = closure.get(&ids[0]).ok_or_else(|| {
                runtime_error(ErrorKind::UndefinedVariable(ids[0].clone()))
            })?;
            for id in &ids[1..] {
                let instance = value.as_instance().ok_or_else(|| {
                    runtime_error(ErrorKind::UndefinedField(id.clone()))
                })?;
                value = instance.field(id).ok_or_else(|| {
                    runtime_error(ErrorKind::UndefinedField(id.clone()))
                })?;
            }
            Ok(value)
        }

        Expr::Binary { op, left, right } => {
            let lhs = evaluate(left, closure, ctx)?;
            let rhs = evaluate(right, closure, ctx)?;
            binary_op(*op, lhs, rhs, ctx)
        }

        Expr::Compare { op, left, right } => {
            let lhs = evaluate(left, closure, ctx)?;
            let rhs = evaluate(right, closure, ctx)?;
            let result = match op {
                CompareOp::Eq => equal(&lhs, &rhs, ctx)?,
                CompareOp::Ne => !equal(&lhs, &rhs, ctx)?,
                CompareOp::Lt => less(&lhs, &rhs, ctx)?,
                CompareOp::Gt => !(less(&lhs, &rhs, ctx)? || equal(&lhs, &rhs, ctx)?),
                CompareOp::Le => less(&lhs, &rhs, ctx)? || equal(&lhs, &rhs, ctx)?,
                CompareOp::Ge => !less(&lhs, &rhs, ctx)?,
            };
            Ok(Value::Bool(result))
        }

        Expr::Logical { op, left, right } => {
            let left = evaluate(left, closure, ctx)?.is_truthy();
            let result = match op {
                LogicalOp::Or => {
                    if left {
                        true
                    } else {
                        evaluate(right, closure, ctx)?.is_truthy()
                    }
                }
                LogicalOp::And => {
                    if left {
                        evaluate(right, closure, ctx)?.is_truthy()
                    } else {
                        false
                    }
                }
            };
            Ok(Value::Bool(result))
        }

        Expr::Not { operand } => {
            let value = evaluate(operand, closure, ctx)?;
            Ok(Value::Bool(!value.is_truthy()))
        }

        Expr::MethodCall {
            object,
            method,
            args,
        } => {
            let receiver = evaluate(object, closure, ctx)?;
            let instance = expect_instance(&receiver)?;
            let mut actual = Vec::with_capacity(args.len());
            for arg in args {
                actual.push(evaluate(arg, closure, ctx)?);
            }
            call_method(&instance, method, actual, ctx)
        }

        Expr::NewInstance { class, args } => {
            let class = class.get().ok_or_else(|| {
                runtime_error(ErrorKind::TypeMismatch(
                    "class".to_string(),
                    "dropped class".to_string(),
                ))
            })?;
            let instance = Rc::new(Instance::new(class.clone()));

            // Run __init__ only when its arity matches; otherwise the bare
            // instance is the result.
            let init_matches = class
                .get_method(INIT_METHOD)
                .map_or(false, |m| m.formal_params.len() == args.len());
            if !init_matches {
                return Ok(Value::instance(instance));
            }

            let mut actual = Vec::with_capacity(args.len());
            for arg in args {
                actual.push(evaluate(arg, closure, ctx)?);
            }
            match call_method(&instance, INIT_METHOD, actual, ctx)? {
                Value::None => Ok(Value::instance(instance)),
                replacement => {
                    // __init__ may substitute another object; returning the
                    // receiver itself still yields the owning handle.
                    if replacement
                        .as_instance()
                        .map_or(false, |r| Rc::ptr_eq(&r, &instance))
                    {
                        Ok(Value::instance(instance))
                    } else {
                        Ok(replacement)
                    }
                }
            }
        }

        Expr::Stringify { operand } => {
            let value = evaluate(operand, closure, ctx)?;
            Ok(Value::String(format_value(&value, ctx)?))
        }
    }
}

/// Call a method on an instance.
///
/// The activation closure holds `self` (as a non-owning view) and the
/// positional parameters, nothing else. If the body rebinds `self` to a
/// different object, that rebinding becomes the call result.
pub fn call_method(
    receiver: &Rc<Instance>,
    name: &str,
    args: Vec<Value>,
    ctx: &mut dyn Context,
) -> Result<Value> {
    let method = receiver
        .class()
        .get_method(name)
        .filter(|m| m.formal_params.len() == args.len())
        .ok_or_else(|| runtime_error(ErrorKind::MethodNotFound(name.to_string())))?;

    let mut activation = Closure::new();
    activation.insert("self".to_string(), Value::instance_view(receiver));
    for (param, value) in method.formal_params.iter().zip(args) {
        activation.insert(param.clone(), value);
    }

    let result = execute(&method.body, &mut activation, ctx)?.value();

    if let Some(self_value) = activation.get("self") {
        let rebound = !self_value
            .as_instance()
            .map_or(false, |i| Rc::ptr_eq(&i, receiver));
        if rebound {
            return Ok(strengthen(self_value));
        }
    }
    Ok(strengthen(result))
}

/// Equality across values; instances dispatch to `__eq__`
fn equal(lhs: &Value, rhs: &Value, ctx: &mut dyn Context) -> Result<bool> {
    match (lhs, rhs) {
        (Value::None, Value::None) => Ok(true),
        (Value::Number(a), Value::Number(b)) => Ok(a == b),
        (Value::String(a), Value::String(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        _ => {
            if let Some(instance) = lhs.as_instance() {
                if instance.has_method(EQ_METHOD, 1) {
                    let result = call_method(&instance, EQ_METHOD, vec![rhs.clone()], ctx)?;
                    return Ok(result.is_truthy());
                }
            }
            Err(comparison_error(lhs, rhs))
        }
    }
}

/// Ordering across values; instances dispatch to `__lt__`
fn less(lhs: &Value, rhs: &Value, ctx: &mut dyn Context) -> Result<bool> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(a < b),
        (Value::String(a), Value::String(b)) => Ok(a < b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a < b),
        _ => {
            if let Some(instance) = lhs.as_instance() {
                if instance.has_method(LT_METHOD, 1) {
                    let result = call_method(&instance, LT_METHOD, vec![rhs.clone()], ctx)?;
                    return Ok(result.is_truthy());
                }
            }
            Err(comparison_error(lhs, rhs))
        }
    }
}

fn binary_op(op: BinaryOp, lhs: Value, rhs: Value, ctx: &mut dyn Context) -> Result<Value> {
    if op == BinaryOp::Add {
        return match (&lhs, &rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            _ => {
                if let Some(instance) = lhs.as_instance() {
                    if instance.has_method(ADD_METHOD, 1) {
                        return call_method(&instance, ADD_METHOD, vec![rhs], ctx);
                    }
                }
                Err(runtime_error(ErrorKind::TypeMismatch(
                    "two numbers, two strings, or an instance with '__add__'".to_string(),
                    format!("{} + {}", lhs.type_name(), rhs.type_name()),
                )))
            }
        };
    }

    match (&lhs, &rhs) {
        (Value::Number(a), Value::Number(b)) => match op {
            BinaryOp::Sub => Ok(Value::Number(a - b)),
            BinaryOp::Mul => Ok(Value::Number(a * b)),
            BinaryOp::Div => {
                if *b == 0 {
                    Err(runtime_error(ErrorKind::DivisionByZero))
                } else {
                    Ok(Value::Number(a / b))
                }
            }
            BinaryOp::Add => unreachable!("handled above"),
        },
        _ => Err(runtime_error(ErrorKind::TypeMismatch(
            "two numbers".to_string(),
            format!("{} {} {}", lhs.type_name(), op, rhs.type_name()),
        ))),
    }
}

/// Render a value the way `print` and `str(...)` show it.
///
/// Instances whose class defines a zero-argument `__str__` are formatted
/// through it; other instances get a stable per-object identifier.
pub fn format_value(value: &Value, ctx: &mut dyn Context) -> Result<String> {
    match value {
        Value::None => Ok("None".to_string()),
        Value::Bool(true) => Ok("True".to_string()),
        Value::Bool(false) => Ok("False".to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Class(class) => Ok(format!("Class {}", class.name())),
        Value::Instance(_) => {
            let instance = expect_instance(value)?;
            if instance.has_method(STR_METHOD, 0) {
                let result = call_method(&instance, STR_METHOD, Vec::new(), ctx)?;
                format_value(&result, ctx)
            } else {
                Ok(format!(
                    "<{} object at {:p}>",
                    instance.class().name(),
                    Rc::as_ptr(&instance)
                ))
            }
        }
    }
}

/// An escaping result must not stay a view: promote it to an owning
/// handle so it remains valid outside the activation.
fn strengthen(value: Value) -> Value {
    match &value {
        Value::Instance(handle) => match handle.upgrade() {
            Some(rc) => Value::instance(rc),
            None => value,
        },
        _ => value,
    }
}

fn expect_instance(value: &Value) -> Result<Rc<Instance>> {
    value.as_instance().ok_or_else(|| {
        runtime_error(ErrorKind::TypeMismatch(
            "instance".to_string(),
            value.type_name().to_string(),
        ))
    })
}

fn runtime_error(kind: ErrorKind) -> PyriteError {
    PyriteError::new(kind, None)
}

fn comparison_error(lhs: &Value, rhs: &Value) -> PyriteError {
    runtime_error(ErrorKind::TypeMismatch(
        "comparable operands".to_string(),
        format!("{} and {}", lhs.type_name(), rhs.type_name()),
    ))
}

fn output_error(err: io::Error) -> PyriteError {
    runtime_error(ErrorKind::Io(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &Expr) -> Result<Value> {
        let closure = Closure::new();
        let mut ctx = StreamContext::new(Vec::new());
        evaluate(expr, &closure, &mut ctx)
    }

    fn number(value: i64) -> Box<Expr> {
        Box::new(Expr::Number { value })
    }

    fn string(value: &str) -> Box<Expr> {
        Box::new(Expr::String {
            value: value.to_string(),
        })
    }

    #[test]
    fn test_add_with_precedence_from_ast() {
        // 1 + 2 * 3, precedence already encoded by the tree shape
        let expr = Expr::Binary {
            op: BinaryOp::Add,
            left: number(1),
            right: Box::new(Expr::Binary {
                op: BinaryOp::Mul,
                left: number(2),
                right: number(3),
            }),
        };
        assert_eq!(eval(&expr).unwrap(), Value::Number(7));
    }

    #[test]
    fn test_string_concatenation_is_associative() {
        let left_first = Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(Expr::Binary {
                op: BinaryOp::Add,
                left: string("a"),
                right: string("b"),
            }),
            right: string("c"),
        };
        let right_first = Expr::Binary {
            op: BinaryOp::Add,
            left: string("a"),
            right: Box::new(Expr::Binary {
                op: BinaryOp::Add,
                left: string("b"),
                right: string("c"),
            }),
        };
        assert_eq!(eval(&left_first).unwrap(), eval(&right_first).unwrap());
        assert_eq!(eval(&left_first).unwrap(), Value::String("abc".to_string()));
    }

    #[test]
    fn test_division_truncates_toward_zero() {
        let expr = Expr::Binary {
            op: BinaryOp::Div,
            left: number(-7),
            right: number(2),
        };
        assert_eq!(eval(&expr).unwrap(), Value::Number(-3));
    }

    #[test]
    fn test_division_by_zero() {
        for value in [-5, 0, 5] {
            let expr = Expr::Binary {
                op: BinaryOp::Div,
                left: number(value),
                right: number(0),
            };
            assert!(matches!(
                eval(&expr).err().map(|e| e.kind),
                Some(ErrorKind::DivisionByZero)
            ));
        }
    }

    #[test]
    fn test_add_type_mismatch() {
        let expr = Expr::Binary {
            op: BinaryOp::Add,
            left: string("1"),
            right: number(1),
        };
        assert!(matches!(
            eval(&expr).err().map(|e| e.kind),
            Some(ErrorKind::TypeMismatch(_, _))
        ));
    }

    #[test]
    fn test_derived_comparisons() {
        let pairs = [(1, 2), (2, 1), (3, 3)];
        for (a, b) in pairs {
            let compare = |op| {
                eval(&Expr::Compare {
                    op,
                    left: number(a),
                    right: number(b),
                })
                .unwrap()
            };
            let eq = compare(CompareOp::Eq) == Value::Bool(true);
            let lt = compare(CompareOp::Lt) == Value::Bool(true);
            assert_eq!(compare(CompareOp::Ne), Value::Bool(!eq));
            assert_eq!(compare(CompareOp::Gt), Value::Bool(!(lt || eq)));
            assert_eq!(compare(CompareOp::Le), Value::Bool(lt || eq));
            assert_eq!(compare(CompareOp::Ge), Value::Bool(!lt));
        }
    }

    #[test]
    fn test_none_equals_none() {
        let expr = Expr::Compare {
            op: CompareOp::Eq,
            left: Box::new(Expr::None),
            right: Box::new(Expr::None),
        };
        assert_eq!(eval(&expr).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_none_compared_to_value_is_error() {
        let expr = Expr::Compare {
            op: CompareOp::Eq,
            left: Box::new(Expr::None),
            right: number(0),
        };
        assert!(eval(&expr).is_err());
    }

    #[test]
    fn test_bool_ordering() {
        let expr = Expr::Compare {
            op: CompareOp::Lt,
            left: Box::new(Expr::Bool { value: false }),
            right: Box::new(Expr::Bool { value: true }),
        };
        assert_eq!(eval(&expr).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_logical_result_is_always_bool() {
        let expr = Expr::Logical {
            op: LogicalOp::Or,
            left: number(0),
            right: string("x"),
        };
        assert_eq!(eval(&expr).unwrap(), Value::Bool(true));

        let expr = Expr::Logical {
            op: LogicalOp::And,
            left: number(1),
            right: string("x"),
        };
        assert_eq!(eval(&expr).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_and_short_circuits() {
        // The right side would fail with an undefined variable
        let expr = Expr::Logical {
            op: LogicalOp::And,
            left: number(0),
            right: Box::new(Expr::Variable {
                ids: vec!["missing".to_string()],
            }),
        };
        assert_eq!(eval(&expr).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_stringify_none() {
        let expr = Expr::Stringify {
            operand: Box::new(Expr::None),
        };
        assert_eq!(eval(&expr).unwrap(), Value::String("None".to_string()));
    }

    #[test]
    fn test_print_none() {
        let mut closure = Closure::new();
        let mut ctx = StreamContext::new(Vec::new());
        let stmt = Stmt::Print {
            args: vec![Expr::None],
        };
        execute(&stmt, &mut closure, &mut ctx).unwrap();
        assert_eq!(ctx.into_inner(), b"None\n");
    }

    #[test]
    fn test_print_separates_with_spaces() {
        let mut closure = Closure::new();
        let mut ctx = StreamContext::new(Vec::new());
        let stmt = Stmt::Print {
            args: vec![
                Expr::Number { value: 1 },
                Expr::String {
                    value: "two".to_string(),
                },
                Expr::Bool { value: true },
            ],
        };
        execute(&stmt, &mut closure, &mut ctx).unwrap();
        assert_eq!(ctx.into_inner(), b"1 two True\n");
    }

    #[test]
    fn test_undefined_variable() {
        let expr = Expr::Variable {
            ids: vec!["ghost".to_string()],
        };
        assert!(matches!(
            eval(&expr).err().map(|e| e.kind),
            Some(ErrorKind::UndefinedVariable(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_block_stops_after_return() {
        let mut closure = Closure::new();
        let mut ctx = StreamContext::new(Vec::new());
        let stmt = Stmt::Block {
            stmts: vec![
                Stmt::Return {
                    value: Expr::Number { value: 1 },
                },
                Stmt::Assign {
                    name: "after".to_string(),
                    value: Expr::Number { value: 2 },
                },
            ],
        };
        let flow = execute(&stmt, &mut closure, &mut ctx).unwrap();
        assert!(matches!(flow, Flow::Returned(Value::Number(1))));
        assert!(!closure.contains("after"));
    }

    #[test]
    fn test_method_body_consumes_return() {
        let mut closure = Closure::new();
        let mut ctx = StreamContext::new(Vec::new());
        let stmt = Stmt::MethodBody {
            body: Box::new(Stmt::Block {
                stmts: vec![Stmt::Return {
                    value: Expr::Number { value: 9 },
                }],
            }),
        };
        let flow = execute(&stmt, &mut closure, &mut ctx).unwrap();
        assert!(matches!(flow, Flow::Normal(Value::Number(9))));
    }
}
