// Copyright (c) Chris Gunn.
// Licensed under the MIT license.

//! Parser for a line-oriented, typed configuration language.
//!
//! A file is a sequence of declarations (`int port = 8080`), class definitions, nested
//! scopes and `%use`/`%default` includes. Parsing yields an ordered [`Scope`] tree.

mod ast;
mod interpreter;
mod parser;
mod process_conf;
mod scope;
mod yaml_utils;

pub use process_conf::{parse_conf_file, parse_conf_str, ParseOptions};
pub use scope::{Entry, Instance, MergePolicy, Scope, TypeDef, Value};
pub use yaml_utils::{scope_to_yaml, yaml_emit_to_string};
