// Copyright (c) Chris Gunn.
// Licensed under the MIT license.

use crate::scope::{Entry, Value};

use super::*;

fn run(input: &str) -> Result<Scope, Error> {
    let parser = Parser::new();
    let file = parser.parse("t.conf", input)?;
    interpret(&parser, &file, SourceContext::default(), &ParseOptions::default())
}

fn run_err(input: &str) -> String {
    run(input).unwrap_err().to_string()
}

fn int_at(scope: &Scope, path: &str) -> Option<i64> {
    scope.find(path).and_then(|instance| instance.value.as_int())
}

#[test]
fn instances_copy_class_defaults() {
    let scope = run("class P {\nint x = 1\n}\nP a\nP b\na.x = 5\n").unwrap();

    assert_eq!(int_at(&scope, "a.x"), Some(5));
    assert_eq!(int_at(&scope, "b.x"), Some(1));
    assert_eq!(scope.get_type("P").and_then(|p| p.members.get("x")).map(|x| &x.value), Some(&Value::Int(1)));
}

#[test]
fn class_body_can_update_defaults() {
    let scope = run("class P\n{\nint x = 1\nx = x + 1\n}\nP p\n").unwrap();
    assert_eq!(int_at(&scope, "p.x"), Some(2));
}

#[test]
fn nested_class_members() {
    let input = "\
class Inner {
    int v = 1
}
class Outer {
    Inner i
}
Outer o
o.i.v = 4
int r = o.i.v * 2
";
    let scope = run(input).unwrap();
    assert_eq!(int_at(&scope, "o.i.v"), Some(4));
    assert_eq!(int_at(&scope, "r"), Some(8));
}

#[test]
fn reopened_scope_keeps_position() {
    let scope = run("a {\nint x = 1\n}\nint b = 2\na {\nint y = x + 1\n}\n").unwrap();

    let names: Vec<&str> = scope.children().map(Entry::name).collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(int_at(&scope, "a.x"), Some(1));
    assert_eq!(int_at(&scope, "a.y"), Some(2));
}

#[test]
fn open_scope_is_visible_by_its_own_name() {
    let scope = run("a {\nint x = 1\n}\na {\nint y = a.x + 1\na.x = 5\n}\n").unwrap();
    assert_eq!(int_at(&scope, "a.x"), Some(5));
    assert_eq!(int_at(&scope, "a.y"), Some(2));

    let scope = run("b {\nint x = 1\nint y = b.x\nc {\nint z = b.y + x\n}\n}\n").unwrap();
    assert_eq!(int_at(&scope, "b.y"), Some(1));
    assert_eq!(int_at(&scope, "b.c.z"), Some(2));
}

#[test]
fn object_takes_new_members() {
    let scope = run("object o\no.n = 3\no.n += 1\no.s = \"x\"\n").unwrap();
    assert_eq!(int_at(&scope, "o.n"), Some(4));
    assert_eq!(scope.find("o.s").map(|s| s.ty.as_str()), Some("string"));

    assert_eq!(
        run_err("class P {\nint x\n}\nP p\np.y = 1\n"),
        "t.conf:5:7 'y' is not a member of 'p'"
    );
}

#[test]
fn min_integer_literal() {
    let scope = run("int m = -9223372036854775808\n").unwrap();
    assert_eq!(int_at(&scope, "m"), Some(i64::MIN));
    assert_eq!(scope.to_string(), "int m = -9223372036854775808\n");
    assert!(run_err("int m = -(9223372036854775808)\n").starts_with("t.conf:1:"));
}

#[test]
fn float_results_stay_finite() {
    assert_eq!(run_err("float f = 1e308 * 10\n"), "t.conf:1:11 float overflow in '*'");
    assert_eq!(run_err("float f = 1e308\nf = f - -f\n"), "t.conf:2:5 float overflow in '-'");
    assert_eq!(run_err("float f = 2 * 1e999\n"), "t.conf:1:15 float literal is out of range");
}

#[test]
fn assignment_yields_assigned_value() {
    let scope = run("int a\nfloat b\na = 3\nb = a = 4\n").unwrap();
    assert_eq!(int_at(&scope, "a"), Some(4));
    assert_eq!(scope.find("b").map(|b| &b.value), Some(&Value::Float(4.0)));
}

#[test]
fn exponent_literal() {
    let scope = run("float f = 1e3 / 8\n").unwrap();
    assert_eq!(scope.find("f").map(|f| &f.value), Some(&Value::Float(125.0)));
}

#[test]
fn class_restrictions() {
    assert_eq!(run_err("class A {\nclass B {\n}\n}\n"), "t.conf:2:1 classes cannot be nested");
    assert_eq!(
        run_err("class A {\ns {\n}\n}\n"),
        "t.conf:2:1 scopes cannot be declared inside a class"
    );
    assert_eq!(
        run_err("class A {\n%use \"other.conf\"\n}\n"),
        "t.conf:2:1 directives are not allowed inside a class"
    );
}

#[test]
fn name_conflicts() {
    assert_eq!(run_err("int s\ns {\n}\n"), "t.conf:2:1 's' is already declared in this scope");
    assert_eq!(
        run_err("class A\n}\nclass A\n}\n"),
        "t.conf:3:1 'A' is already declared in this scope"
    );
    assert_eq!(run_err("class int {\n}\n"), "t.conf:1:1 'int' is a built-in type name");
}

#[test]
fn name_resolution_errors() {
    assert_eq!(run_err("int x = y\n"), "t.conf:1:9 cannot find 'y'");
    assert_eq!(run_err("s {\n}\nint x = s\n"), "t.conf:3:9 's' is a scope, not a value");
    assert_eq!(run_err("class C\n}\nint x = C\n"), "t.conf:3:9 'C' is a type, not a value");
    assert_eq!(run_err("int s\ns t\n"), "t.conf:2:1 's' is not a type");
    assert_eq!(run_err("int x = (1 + 2).y\n"), "t.conf:1:9 type 'int' has no members");
    assert_eq!(run_err("int a\nint x = a.b\n"), "t.conf:2:9 'a' of type 'int' has no members");
}

#[test]
fn invalid_assignments() {
    assert_eq!(run_err("s {\n}\ns = 1\n"), "t.conf:3:5 cannot assign to scope 's'");
    assert_eq!(run_err("string s = 1\n"), "t.conf:1:12 cannot assign 'int' to 'string'");
    assert_eq!(
        run_err("string s = -\"a\"\n"),
        "t.conf:1:12 operator '-' is not defined for 'string'"
    );
    assert_eq!(
        run_err("int x = -9223372036854775807 - 2\n"),
        "t.conf:1:9 integer overflow in '-'"
    );
}

#[test]
fn block_structure_errors() {
    assert_eq!(run_err("}\n"), "t.conf:1:1 unexpected '}'");
    assert_eq!(run_err("a {\nb {\n}\n"), "t.conf:1:1 unclosed block 'a'");
    assert_eq!(run_err("class C\n"), "t.conf:1:1 unclosed block 'C'");
}

#[test]
fn lone_brace_only_after_class() {
    assert_eq!(run_err("int x = 1\n{\n}\n"), "t.conf:2:1 unexpected '{'");
    assert_eq!(run_err("a {\n{\n}\n}\n"), "t.conf:2:1 unexpected '{'");
    assert_eq!(run_err("class A {\n{\n}\n"), "t.conf:2:1 unexpected '{'");
    assert_eq!(run_err("class A\n{\n{\n}\n"), "t.conf:3:1 unexpected '{'");

    let scope = run("class A\n{\nint x = 1\n}\nclass B\nint y = 2\n}\n").unwrap();
    assert!(scope.get_type("A").is_some());
    assert!(scope.get_type("B").is_some());
}
