// Copyright (c) Chris Gunn.
// Licensed under the MIT license.

// Export of a configuration tree as a YAML document.

use anyhow::Error;
use hashlink::LinkedHashMap;
use saphyr::{Hash, Yaml, YamlEmitter};

use crate::scope::{Entry, Instance, Scope, Value};

/// Converts a scope into a YAML mapping. Class definitions are not data and are left out.
pub fn scope_to_yaml(scope: &Scope) -> Yaml {
    let mut hash = Hash::new();
    for entry in scope.children() {
        let value = match entry {
            Entry::Scope(scope) => scope_to_yaml(scope),
            Entry::Instance(instance) => value_to_yaml(&instance.value),
            Entry::Type(_) => continue,
        };
        hash.insert(Yaml::String(entry.name().to_string()), value);
    }
    Yaml::Hash(hash)
}

fn value_to_yaml(value: &Value) -> Yaml {
    match value {
        Value::String(value) => Yaml::String(value.clone()),
        Value::Int(value) => Yaml::Integer(*value),
        Value::Float(value) => Yaml::Real(float_to_yaml(*value)),
        Value::Object(members) => members_to_yaml(members),
    }
}

// YAML spells the non-finite floats as `.inf`, `-.inf` and `.nan`.
fn float_to_yaml(value: f64) -> String {
    if value.is_nan() {
        ".nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { ".inf" } else { "-.inf" }.to_string()
    } else {
        format!("{:?}", value)
    }
}

fn members_to_yaml(members: &LinkedHashMap<String, Instance>) -> Yaml {
    let mut hash = Hash::new();
    for member in members.values() {
        hash.insert(Yaml::String(member.name.clone()), value_to_yaml(&member.value));
    }
    Yaml::Hash(hash)
}

pub fn yaml_emit_to_string(doc: &Yaml) -> Result<String, Error> {
    let mut out_str = String::new();
    let mut emitter = YamlEmitter::new(&mut out_str);
    emitter.dump(doc)?;
    Ok(out_str)
}
