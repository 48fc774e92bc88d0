// Copyright (c) Chris Gunn.
// Licensed under the MIT license.


use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Error};
use tracing::debug;

use crate::{
    interpreter::{interpret, SourceContext},
    parser::Parser,
    scope::Scope,
};

/// Controls how `%use` and `%default` directives are followed.
#[derive(Clone, Debug)]
pub struct ParseOptions {
    pub allow_includes: bool,
    /// Maximum nesting of included files below the root file.
    pub max_include_depth: usize,
    /// Directory that includes in string input are resolved against. Defaults to the
    /// current directory.
    pub base_dir: Option<PathBuf>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            allow_includes: true,
            max_include_depth: 16,
            base_dir: None,
        }
    }
}

pub fn parse_conf_file(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Scope, Error> {
    let path = path.as_ref();
    let input = fs::read_to_string(path).map_err(|err| anyhow!("cannot read '{}': {}", path.display(), err))?;

    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let context = SourceContext {
        dir,
        include_stack: vec![canonical],
        depth: 0,
    };

    debug!(path = %path.display(), "loading configuration file");
    parse_with_context(&path.to_string_lossy(), &input, context, options)
}

pub fn parse_conf_str(filename: &str, input: &str, options: &ParseOptions) -> Result<Scope, Error> {
    let dir = match &options.base_dir {
        Some(dir) => dir.clone(),
        None => env::current_dir().unwrap_or_default(),
    };
    let context = SourceContext {
        dir,
        include_stack: Vec::new(),
        depth: 0,
    };
    parse_with_context(filename, input, context, options)
}

fn parse_with_context(
    filename: &str,
    input: &str,
    context: SourceContext,
    options: &ParseOptions,
) -> Result<Scope, Error> {
    let parser = Parser::new();
    let file = parser.parse(filename, input)?;
    interpret(&parser, &file, context, options)
}
