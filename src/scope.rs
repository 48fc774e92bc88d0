// Copyright (c) Chris Gunn.
// Licensed under the MIT license.

//! Parsed configuration tree.
//!
//! A [`Scope`] owns an ordered set of named [`Entry`] values: nested scopes, class
//! definitions and typed instances. Children keep their declaration order.

#[cfg(test)]
mod tests;

use std::fmt;

use anyhow::{anyhow, Error};
use hashlink::LinkedHashMap;

pub const TYPE_STRING: &str = "string";
pub const TYPE_INT: &str = "int";
pub const TYPE_FLOAT: &str = "float";
pub const TYPE_OBJECT: &str = "object";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scope {
    name: String,
    children: LinkedHashMap<String, Entry>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    Scope(Scope),
    Type(TypeDef),
    Instance(Instance),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub members: LinkedHashMap<String, Instance>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub name: String,
    /// Declared type. Assignments are converted to this type.
    pub ty: String,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Object(LinkedHashMap<String, Instance>),
}

/// How [`Scope::merge`] treats an instance present on both sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergePolicy {
    /// The incoming value replaces the existing one.
    Override,
    /// The existing value is kept.
    Default,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Scope {
        Scope {
            name: name.into(),
            children: LinkedHashMap::new(),
        }
    }

    /// Empty for the global scope.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> impl Iterator<Item = &Entry> {
        self.children.values()
    }

    pub fn into_children(self) -> impl Iterator<Item = Entry> {
        self.children.into_iter().map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.children.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.children.get_mut(name)
    }

    pub fn get_instance(&self, name: &str) -> Option<&Instance> {
        match self.children.get(name) {
            Some(Entry::Instance(instance)) => Some(instance),
            _ => None,
        }
    }

    pub fn get_scope(&self, name: &str) -> Option<&Scope> {
        match self.children.get(name) {
            Some(Entry::Scope(scope)) => Some(scope),
            _ => None,
        }
    }

    pub fn get_scope_mut(&mut self, name: &str) -> Option<&mut Scope> {
        match self.children.get_mut(name) {
            Some(Entry::Scope(scope)) => Some(scope),
            _ => None,
        }
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        match self.children.get(name) {
            Some(Entry::Type(typedef)) => Some(typedef),
            _ => None,
        }
    }

    /// Looks up a dotted path such as `server.tls.port`, descending through nested scopes
    /// and object members.
    pub fn find(&self, path: &str) -> Option<&Instance> {
        let mut segments = path.split('.');

        let mut scope = self;
        let mut instance = loop {
            match scope.get(segments.next()?)? {
                Entry::Scope(inner) => scope = inner,
                Entry::Instance(instance) => break instance,
                Entry::Type(_) => return None,
            }
        };

        for segment in segments {
            instance = match &instance.value {
                Value::Object(members) => members.get(segment)?,
                _ => return None,
            };
        }
        Some(instance)
    }

    /// Appends a new child. Names are unique within a scope.
    pub fn insert(&mut self, entry: Entry) -> Result<(), Error> {
        let name = entry.name().to_string();
        if self.children.contains_key(&name) {
            return Err(anyhow!("'{}' is already declared in this scope", name));
        }
        self.children.insert(name, entry);
        Ok(())
    }

    /// Iterates over the direct children holding a string, int or float value.
    pub fn natives(&self) -> impl Iterator<Item = &Instance> {
        self.children.values().filter_map(|entry| match entry {
            Entry::Instance(instance) if instance.value.is_native() => Some(instance),
            _ => None,
        })
    }

    /// Merges `other` into this scope.
    ///
    /// Entries missing here are appended in `other`'s order. Scopes and classes present on
    /// both sides are merged recursively. For an instance present on both sides, `policy`
    /// decides which value wins; the declared types must match.
    pub fn merge(&mut self, other: Scope, policy: MergePolicy) -> Result<(), Error> {
        for (name, incoming) in other.children {
            let Some(existing) = self.children.get_mut(&name) else {
                self.children.insert(name, incoming);
                continue;
            };

            match (existing, incoming) {
                (Entry::Scope(existing), Entry::Scope(incoming)) => existing.merge(incoming, policy)?,
                (Entry::Type(existing), Entry::Type(incoming)) => {
                    merge_members(&mut existing.members, incoming.members, policy)?
                }
                (Entry::Instance(existing), Entry::Instance(incoming)) => {
                    merge_instance(existing, incoming, policy)?
                }
                (existing, incoming) => {
                    return Err(anyhow!(
                        "cannot merge '{}': {} conflicts with {}",
                        name,
                        existing.kind_name(),
                        incoming.kind_name()
                    ))
                }
            }
        }
        Ok(())
    }
}

fn merge_instance(existing: &mut Instance, incoming: Instance, policy: MergePolicy) -> Result<(), Error> {
    if existing.ty != incoming.ty {
        return Err(anyhow!(
            "cannot merge '{}': type '{}' conflicts with '{}'",
            existing.name,
            existing.ty,
            incoming.ty
        ));
    }

    match (&mut existing.value, incoming.value) {
        // Objects merge member-wise so a partial override keeps the remaining members.
        (Value::Object(existing), Value::Object(incoming)) => merge_members(existing, incoming, policy),
        (existing, incoming) => {
            if policy == MergePolicy::Override {
                *existing = incoming;
            }
            Ok(())
        }
    }
}

fn merge_members(
    existing: &mut LinkedHashMap<String, Instance>,
    incoming: LinkedHashMap<String, Instance>,
    policy: MergePolicy,
) -> Result<(), Error> {
    for (name, member) in incoming {
        match existing.get_mut(&name) {
            Some(current) => merge_instance(current, member, policy)?,
            None => {
                existing.insert(name, member);
            }
        }
    }
    Ok(())
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::Scope(scope) => &scope.name,
            Entry::Type(typedef) => &typedef.name,
            Entry::Instance(instance) => &instance.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Entry::Scope(_) => "scope",
            Entry::Type(_) => "class",
            Entry::Instance(_) => "instance",
        }
    }
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> TypeDef {
        TypeDef {
            name: name.into(),
            members: LinkedHashMap::new(),
        }
    }

    /// A fresh instance carrying a copy of the member defaults.
    pub fn instantiate(&self, name: impl Into<String>) -> Instance {
        Instance {
            name: name.into(),
            ty: self.name.clone(),
            value: Value::Object(self.members.clone()),
        }
    }
}

impl Instance {
    pub fn new(name: impl Into<String>, ty: impl Into<String>, value: Value) -> Instance {
        Instance {
            name: name.into(),
            ty: ty.into(),
            value,
        }
    }
}

impl Value {
    /// The zero value of an intrinsic type.
    pub fn default_for(ty: &str) -> Option<Value> {
        match ty {
            TYPE_STRING => Some(Value::String(String::new())),
            TYPE_INT => Some(Value::Int(0)),
            TYPE_FLOAT => Some(Value::Float(0.0)),
            TYPE_OBJECT => Some(Value::Object(LinkedHashMap::new())),
            _ => None,
        }
    }

    pub fn is_native(&self) -> bool {
        !matches!(self, Value::Object(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn members(&self) -> Option<&LinkedHashMap<String, Instance>> {
        match self {
            Value::Object(members) => Some(members),
            _ => None,
        }
    }

    /// Strings are quoted with the escapes the lexer accepts.
    fn fmt_literal(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String(value) => fmt_quoted(f, value),
            Value::Object(members) => {
                f.write_str("{")?;
                for (i, member) in members.values().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, " {} = ", member.name)?;
                    member.value.fmt_literal(f)?;
                }
                if !members.is_empty() {
                    f.write_str(" ")?;
                }
                f.write_str("}")
            }
            _ => write!(f, "{}", self),
        }
    }
}

fn fmt_quoted(f: &mut fmt::Formatter, value: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in value.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\x08' => f.write_str("\\b")?,
            '\x0C' => f.write_str("\\f")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

/// The raw data, as printed by `name = data` listings. Strings are not quoted.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String(value) => f.write_str(value),
            Value::Int(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{:?}", value),
            Value::Object(_) => self.fmt_literal(f),
        }
    }
}

/// Renders the tree as configuration source that parses back into an equal tree.
///
/// An object instance is written as its declaration followed by one assignment per
/// native member, so `Point p` with `x = 1` becomes `Point p` and `p.x = 1`.
impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt_children(f, &self.children, 0)
    }
}

fn fmt_children(f: &mut fmt::Formatter, children: &LinkedHashMap<String, Entry>, depth: usize) -> fmt::Result {
    let indent = "    ".repeat(depth);
    for entry in children.values() {
        match entry {
            Entry::Scope(scope) => {
                writeln!(f, "{}{} {{", indent, scope.name)?;
                fmt_children(f, &scope.children, depth + 1)?;
                writeln!(f, "{}}}", indent)?;
            }
            Entry::Type(typedef) => {
                writeln!(f, "{}class {} {{", indent, typedef.name)?;
                let member_indent = format!("{}    ", indent);
                for member in typedef.members.values() {
                    fmt_instance(f, &member_indent, member)?;
                }
                writeln!(f, "{}}}", indent)?;
            }
            Entry::Instance(instance) => fmt_instance(f, &indent, instance)?,
        }
    }
    Ok(())
}

fn fmt_instance(f: &mut fmt::Formatter, indent: &str, instance: &Instance) -> fmt::Result {
    match &instance.value {
        Value::Object(members) => {
            writeln!(f, "{}{} {}", indent, instance.ty, instance.name)?;
            fmt_member_assignments(f, indent, &instance.name, members)
        }
        value => {
            write!(f, "{}{} {} = ", indent, instance.ty, instance.name)?;
            value.fmt_literal(f)?;
            writeln!(f)
        }
    }
}

fn fmt_member_assignments(
    f: &mut fmt::Formatter,
    indent: &str,
    path: &str,
    members: &LinkedHashMap<String, Instance>,
) -> fmt::Result {
    for member in members.values() {
        let member_path = format!("{}.{}", path, member.name);
        match &member.value {
            Value::Object(inner) => fmt_member_assignments(f, indent, &member_path, inner)?,
            value => {
                write!(f, "{}{} = ", indent, member_path)?;
                value.fmt_literal(f)?;
                writeln!(f)?;
            }
        }
    }
    Ok(())
}
