// Copyright (c) Chris Gunn.
// Licensed under the MIT license.

mod interpreter_run;

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use anyhow::Error;

use crate::{ast::ConfFile, parser::Parser, process_conf::ParseOptions, scope::Scope};

use interpreter_run::InterpreterRun;

/// Where a file came from, used to resolve `%use` and `%default` paths.
#[derive(Clone, Debug, Default)]
pub struct SourceContext {
    /// Directory relative include paths are resolved against.
    pub dir: PathBuf,
    /// Canonical paths of the files currently being loaded, outermost first.
    pub include_stack: Vec<PathBuf>,
    /// Number of `%use`/`%default` directives followed to reach this file.
    pub depth: usize,
}

pub fn interpret(
    parser: &Parser,
    file: &ConfFile,
    context: SourceContext,
    options: &ParseOptions,
) -> Result<Scope, Error> {
    let interpreter_run = InterpreterRun::new(parser, options, context);
    interpreter_run.interpret_file(file)
}
