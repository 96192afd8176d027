//! End-to-end program tests: whole source programs against expected output
//!
//! Program sources are flush-left raw strings: Pyrite is
//! indentation-sensitive, so test programs cannot be re-indented to match
//! the surrounding Rust.

fn run(source: &str) -> Result<String, String> {
    let mut output = Vec::new();
    pyrite::run(source, &mut output).map_err(|e| e.to_string())?;
    String::from_utf8(output).map_err(|e| e.to_string())
}

fn run_ok(source: &str) -> String {
    run(source).expect("execution failed")
}

#[test]
fn test_hello_world_concatenation() {
    assert_eq!(run_ok("print 'hello' + ' ' + 'world'\n"), "hello world\n");
}

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(run_ok("print 1 + 2 * 3\n"), "7\n");
    assert_eq!(run_ok("print (1 + 2) * 3\n"), "9\n");
    assert_eq!(run_ok("print 10 - 2 - 3\n"), "5\n");
    assert_eq!(run_ok("print 7 / 2, -7 / 2\n"), "3 -3\n");
}

#[test]
fn test_class_with_method() {
    let output = run_ok(
        r#"
class Dog:
  def bark(self):
    print 'woof'
d = Dog()
d.bark()
"#,
    );
    assert_eq!(output, "woof\n");
}

#[test]
fn test_inheritance_and_override() {
    let output = run_ok(
        r#"
class A:
  def who(self):
    print 'A'
class B(A):
  def who(self):
    print 'B'
B().who()
A().who()
"#,
    );
    assert_eq!(output, "B\nA\n");
}

#[test]
fn test_early_return_through_nested_if() {
    let output = run_ok(
        r#"
class C:
  def f(self, x):
    if x < 0:
      return 'neg'
    if x == 0:
      return 'zero'
    return 'pos'
print C().f(-5), C().f(0), C().f(3)
"#,
    );
    assert_eq!(output, "neg zero pos\n");
}

#[test]
fn test_operator_overloading() {
    let output = run_ok(
        r#"
class V:
  def __init__(self, x):
    self.x = x
  def __add__(self, o):
    r = V(self.x + o.x)
    return r
  def __str__(self):
    return str(self.x)
print V(2) + V(40)
"#,
    );
    assert_eq!(output, "42\n");
}

#[test]
fn test_print_none() {
    assert_eq!(run_ok("print None\n"), "None\n");
    assert_eq!(run_ok("x = None\nprint x\n"), "None\n");
}

#[test]
fn test_stringify() {
    assert_eq!(run_ok("print str(None) + '!'\n"), "None!\n");
    assert_eq!(run_ok("print str(42) + str(True)\n"), "42True\n");
}

#[test]
fn test_print_class_value() {
    let output = run_ok(
        r#"
class Dog:
  def bark(self):
    print 'woof'
print Dog
"#,
    );
    assert_eq!(output, "Class Dog\n");
}

#[test]
fn test_division_by_zero() {
    let err = run("print 5 / 0\n").unwrap_err();
    assert!(err.contains("division by zero"), "unexpected error: {}", err);
    let err = run("print 0 / 0\n").unwrap_err();
    assert!(err.contains("division by zero"), "unexpected error: {}", err);
}

#[test]
fn test_derived_comparisons_on_primitives() {
    assert_eq!(
        run_ok("print 1 != 2, 3 >= 3, 'a' <= 'b', 2 > 1\n"),
        "True True True True\n"
    );
    assert_eq!(run_ok("print False < True, True <= True\n"), "True True\n");
    assert_eq!(run_ok("print 'abc' < 'abd', 'b' < 'ab'\n"), "True False\n");
}

#[test]
fn test_none_equality() {
    assert_eq!(run_ok("x = None\nprint x == None\n"), "True\n");
    assert!(run("print None == 0\n").is_err());
}

#[test]
fn test_truthiness_in_conditions() {
    let output = run_ok(
        r#"
if 0:
  print 'zero is true'
else:
  print 'zero is false'
if '':
  print 'empty is true'
else:
  print 'empty is false'
if None:
  print 'none is true'
else:
  print 'none is false'
if -1:
  print 'minus one is true'
"#,
    );
    assert_eq!(
        output,
        "zero is false\nempty is false\nnone is false\nminus one is true\n"
    );
}

#[test]
fn test_instances_are_falsy() {
    let output = run_ok(
        r#"
class Thing:
  def noop(self):
    return None
if Thing():
  print 'truthy'
else:
  print 'falsy'
"#,
    );
    assert_eq!(output, "falsy\n");
}

#[test]
fn test_logical_operators_return_bool() {
    assert_eq!(run_ok("print 1 and 'x'\n"), "True\n");
    assert_eq!(run_ok("print 0 or ''\n"), "False\n");
    assert_eq!(run_ok("print not ''\n"), "True\n");
    assert_eq!(run_ok("print not 5\n"), "False\n");
}

#[test]
fn test_logical_short_circuit() {
    // The undefined name on the right is never evaluated
    assert_eq!(run_ok("print 1 or ghost\n"), "True\n");
    assert_eq!(run_ok("print 0 and ghost\n"), "False\n");
}

#[test]
fn test_comments_and_blank_lines() {
    let output = run_ok(
        r#"
# leading comment
x = 1  # trailing comment

# a comment between statements

print x
"#,
    );
    assert_eq!(output, "1\n");
}

#[test]
fn test_print_multiple_args_spacing() {
    assert_eq!(run_ok("print 1, 'two', True, None\n"), "1 two True None\n");
}

#[test]
fn test_undefined_variable() {
    let err = run("print ghost\n").unwrap_err();
    assert!(
        err.contains("undefined variable 'ghost'"),
        "unexpected error: {}",
        err
    );
}

#[test]
fn test_add_type_mismatch() {
    let err = run("print '1' + 1\n").unwrap_err();
    assert!(err.contains("type mismatch"), "unexpected error: {}", err);
}

#[test]
fn test_compare_type_mismatch() {
    let err = run("print 1 < 'one'\n").unwrap_err();
    assert!(err.contains("type mismatch"), "unexpected error: {}", err);
}

#[test]
fn test_else_branch() {
    let output = run_ok(
        r#"
x = 10
if x < 5:
  print 'small'
else:
  print 'large'
"#,
    );
    assert_eq!(output, "large\n");
}

#[test]
fn test_nested_blocks() {
    let output = run_ok(
        r#"
x = 7
if x > 0:
  if x > 5:
    print 'big'
  else:
    print 'small'
  print 'positive'
"#,
    );
    assert_eq!(output, "big\npositive\n");
}

#[test]
fn test_reassignment_changes_type() {
    let output = run_ok(
        r#"
x = 1
x = 'now a string'
print x
"#,
    );
    assert_eq!(output, "now a string\n");
}

#[test]
fn test_methods_see_only_self_and_params() {
    // No lexical scoping: a method cannot read top-level names
    let result = run(
        r#"
g = 42
class C:
  def peek(self):
    return g
print C().peek()
"#,
    );
    assert!(result.unwrap_err().contains("undefined variable 'g'"));
}

#[test]
fn test_program_without_trailing_newline() {
    assert_eq!(run_ok("print 'end'"), "end\n");
}

#[test]
fn test_empty_program() {
    assert_eq!(run_ok(""), "");
    assert_eq!(run_ok("\n\n# only comments\n"), "");
}

#[test]
fn test_string_escapes_in_output() {
    assert_eq!(run_ok("print 'a\\tb'\n"), "a\tb\n");
    assert_eq!(run_ok("print 'line1\\nline2'\n"), "line1\nline2\n");
}

#[test]
fn test_recursive_method() {
    let output = run_ok(
        r#"
class Math:
  def fact(self, n):
    if n <= 1:
      return 1
    return n * self.fact(n - 1)
print Math().fact(10)
"#,
    );
    assert_eq!(output, "3628800\n");
}

#[test]
fn test_add_dispatch_inside_arithmetic() {
    let output = run_ok(
        r#"
class Acc:
  def __init__(self, total):
    self.total = total
  def __add__(self, n):
    return Acc(self.total + n)
  def __str__(self):
    return str(self.total)
a = Acc(1)
print a + 2 + 3
"#,
    );
    assert_eq!(output, "6\n");
}
