// Copyright (c) Chris Gunn.
// Licensed under the MIT license.

use super::*;

fn int(name: &str, value: i64) -> Entry {
    Entry::Instance(Instance::new(name, TYPE_INT, Value::Int(value)))
}

fn string(name: &str, value: &str) -> Entry {
    Entry::Instance(Instance::new(name, TYPE_STRING, Value::String(value.to_string())))
}

fn point() -> TypeDef {
    let mut typedef = TypeDef::new("Point");
    for name in ["x", "y"] {
        typedef
            .members
            .insert(name.to_string(), Instance::new(name, TYPE_INT, Value::Int(0)));
    }
    typedef
}

fn sample() -> Scope {
    let mut server = Scope::new("server");
    server.insert(string("host", "localhost")).unwrap();
    server.insert(int("port", 8080)).unwrap();

    let mut scope = Scope::new("");
    scope.insert(string("name", "demo")).unwrap();
    scope.insert(Entry::Scope(server)).unwrap();
    scope.insert(Entry::Type(point())).unwrap();
    scope.insert(Entry::Instance(point().instantiate("origin"))).unwrap();
    scope.insert(int("count", 3)).unwrap();
    scope
}

#[test]
fn insert_rejects_duplicates() {
    let mut scope = Scope::new("");
    scope.insert(int("x", 1)).unwrap();
    let err = scope.insert(string("x", "a")).unwrap_err();

    assert_eq!(err.to_string(), "'x' is already declared in this scope");
    assert_eq!(scope.len(), 1);
}

#[test]
fn children_keep_declaration_order() {
    let scope = sample();
    let names: Vec<&str> = scope.children().map(Entry::name).collect();
    assert_eq!(names, ["name", "server", "Point", "origin", "count"]);
}

#[test]
fn natives_skip_scopes_types_and_objects() {
    let scope = sample();
    let natives: Vec<String> = scope
        .natives()
        .map(|instance| format!("{} = {}", instance.name, instance.value))
        .collect();
    assert_eq!(natives, ["name = demo", "count = 3"]);
}

#[test]
fn typed_lookups() {
    let scope = sample();
    assert!(scope.get_scope("server").is_some());
    assert!(scope.get_scope("name").is_none());
    assert_eq!(sample().get_scope_mut("server").map(|server| server.len()), Some(2));
    assert_eq!(scope.get_type("Point").map(|typedef| typedef.members.len()), Some(2));
    assert_eq!(scope.get_instance("origin").map(|instance| instance.ty.as_str()), Some("Point"));
    assert!(scope.get("missing").is_none());
}

#[test]
fn find_dotted_paths() {
    let scope = sample();
    assert_eq!(scope.find("server.port").and_then(|i| i.value.as_int()), Some(8080));
    assert_eq!(scope.find("origin.y").and_then(|i| i.value.as_int()), Some(0));
    assert_eq!(scope.find("count").and_then(|i| i.value.as_float()), Some(3.0));
    assert!(scope.find("server").is_none());
    assert!(scope.find("server.port.x").is_none());
    assert!(scope.find("Point.x").is_none());
    assert!(scope.find("").is_none());
}

#[test]
fn merge_override_and_default() {
    let mut incoming = Scope::new("");
    let mut server = Scope::new("server");
    server.insert(int("port", 9090)).unwrap();
    server.insert(int("workers", 4)).unwrap();
    incoming.insert(Entry::Scope(server)).unwrap();
    incoming.insert(string("name", "other")).unwrap();
    incoming.insert(int("extra", 1)).unwrap();

    let mut overridden = sample();
    overridden.merge(incoming.clone(), MergePolicy::Override).unwrap();
    assert_eq!(overridden.find("server.port").and_then(|i| i.value.as_int()), Some(9090));
    assert_eq!(overridden.find("server.workers").and_then(|i| i.value.as_int()), Some(4));
    assert_eq!(overridden.find("name").and_then(|i| i.value.as_str()), Some("other"));
    assert_eq!(overridden.children().last().map(Entry::name), Some("extra"));

    let mut defaulted = sample();
    defaulted.merge(incoming, MergePolicy::Default).unwrap();
    assert_eq!(defaulted.find("server.port").and_then(|i| i.value.as_int()), Some(8080));
    assert_eq!(defaulted.find("server.workers").and_then(|i| i.value.as_int()), Some(4));
    assert_eq!(defaulted.find("name").and_then(|i| i.value.as_str()), Some("demo"));
}

#[test]
fn merge_objects_member_wise() {
    let mut origin = point().instantiate("origin");
    if let Value::Object(members) = &mut origin.value {
        members.remove("x");
        if let Some(y) = members.get_mut("y") {
            y.value = Value::Int(7);
        }
    }
    let mut partial = Scope::new("");
    partial.insert(Entry::Instance(origin)).unwrap();

    let mut scope = sample();
    scope.merge(partial, MergePolicy::Override).unwrap();
    assert_eq!(scope.find("origin.x").and_then(|i| i.value.as_int()), Some(0));
    assert_eq!(scope.find("origin.y").and_then(|i| i.value.as_int()), Some(7));
}

#[test]
fn merge_conflicts() {
    let mut kind_clash = Scope::new("");
    kind_clash.insert(int("server", 1)).unwrap();
    let err = sample().merge(kind_clash, MergePolicy::Default).unwrap_err();
    assert_eq!(err.to_string(), "cannot merge 'server': scope conflicts with instance");

    let mut type_clash = Scope::new("");
    type_clash.insert(string("count", "three")).unwrap();
    let err = sample().merge(type_clash, MergePolicy::Override).unwrap_err();
    assert_eq!(err.to_string(), "cannot merge 'count': type 'int' conflicts with 'string'");
}

#[test]
fn display_tree() {
    let expected = "\
string name = \"demo\"
server {
    string host = \"localhost\"
    int port = 8080
}
class Point {
    int x = 0
    int y = 0
}
Point origin
origin.x = 0
origin.y = 0
int count = 3
";
    assert_eq!(sample().to_string(), expected);
}

#[test]
fn display_quotes_strings_as_source() {
    let mut scope = Scope::new("");
    scope.insert(string("s", "say \"hi\"\\\n\t\u{1b}é")).unwrap();
    assert_eq!(scope.to_string(), "string s = \"say \\\"hi\\\"\\\\\\n\\t\\u001bé\"\n");
}

#[test]
fn display_nested_object_members() {
    let mut inner = TypeDef::new("Inner");
    inner.members.insert("v".to_string(), Instance::new("v", TYPE_INT, Value::Int(4)));
    let mut outer = TypeDef::new("Outer");
    outer.members.insert("i".to_string(), inner.instantiate("i"));
    outer.members.insert(
        "label".to_string(),
        Instance::new("label", TYPE_STRING, Value::String("o".to_string())),
    );

    let mut scope = Scope::new("");
    scope.insert(Entry::Instance(outer.instantiate("o"))).unwrap();
    assert_eq!(scope.to_string(), "Outer o\no.i.v = 4\no.label = \"o\"\n");
}

#[test]
fn value_display() {
    assert_eq!(Value::Float(1.0).to_string(), "1.0");
    assert_eq!(Value::Float(-0.25).to_string(), "-0.25");
    assert_eq!(Value::String("a b".to_string()).to_string(), "a b");
    assert_eq!(Value::default_for(TYPE_OBJECT).map(|v| v.to_string()), Some("{}".to_string()));
    assert!(Value::default_for("Point").is_none());
}
