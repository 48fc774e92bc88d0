// Copyright (c) Chris Gunn.
// Licensed under the MIT license.

use std::{path::PathBuf, process::ExitCode};

use anyhow::{anyhow, Error};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use confscope::{parse_conf_file, scope_to_yaml, yaml_emit_to_string, ParseOptions, Scope};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let matches = command().get_matches();

    init_logging(matches.get_count("verbose"));

    match run(&matches) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn command() -> Command {
    Command::new("confscope")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Parses a configuration file and prints its entries")
        .arg(
            Arg::new("file")
                .help("Configuration file to parse")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .help("Output format")
                .value_parser(["text", "tree", "yaml"])
                .default_value("text"),
        )
        .arg(
            Arg::new("no-includes")
                .long("no-includes")
                .help("Reject %use and %default directives")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max-include-depth")
                .long("max-include-depth")
                .help("Maximum nesting of included files")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Increase log verbosity")
                .action(ArgAction::Count),
        )
}

// RUST_LOG takes precedence over -v.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(matches: &ArgMatches) -> Result<String, Error> {
    let mut options = ParseOptions {
        allow_includes: !matches.get_flag("no-includes"),
        ..ParseOptions::default()
    };
    if let Some(depth) = matches.get_one::<usize>("max-include-depth") {
        options.max_include_depth = *depth;
    }

    let file = matches
        .get_one::<PathBuf>("file")
        .ok_or_else(|| anyhow!("missing configuration file"))?;
    debug!(file = %file.display(), ?options, "starting");

    let scope = parse_conf_file(file, &options)?;

    let format = matches.get_one::<String>("format").map(String::as_str);
    match format {
        Some("tree") => Ok(scope.to_string()),
        Some("yaml") => Ok(yaml_emit_to_string(&scope_to_yaml(&scope))? + "\n"),
        _ => Ok(format_natives(&scope)),
    }
}

/// One `name = data` line per top-level string, int or float entry.
fn format_natives(scope: &Scope) -> String {
    let mut out = String::new();
    for instance in scope.natives() {
        out.push_str(&format!("{} = {}\n", instance.name, instance.value));
    }
    out
}

#[cfg(test)]
mod tests {
    use confscope::parse_conf_str;

    use super::*;

    fn testdata(name: &str) -> String {
        let rootdir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        rootdir
            .join("src/process_conf/tests/testdata/tests")
            .join(name)
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn natives_listing_skips_scopes_classes_and_objects() {
        let input = "\
string name = \"confscope\"
server {
    int port = 80
}
class P {
    int x = 1
}
P p
object o
int count = 42
float ratio = 0.5
";
        let scope = parse_conf_str("n.conf", input, &ParseOptions::default()).unwrap();
        assert_eq!(format_natives(&scope), "name = confscope\ncount = 42\nratio = 0.5\n");
        assert_eq!(format_natives(&Scope::default()), "");
    }

    #[test]
    fn run_formats() {
        let file = testdata("simple_values.conf");

        let matches = command().try_get_matches_from(["confscope", file.as_str()]).unwrap();
        let text = run(&matches).unwrap();
        assert!(text.starts_with("name = confscope\ncount = 42\n"));

        let matches = command()
            .try_get_matches_from(["confscope", "-f", "yaml", file.as_str()])
            .unwrap();
        let yaml = run(&matches).unwrap();
        assert!(yaml.starts_with("---\nname: confscope\n"));
        assert!(yaml.ends_with('\n'));
    }

    #[test]
    fn run_respects_include_flags() {
        let file = testdata("include_use.conf");

        let matches = command()
            .try_get_matches_from(["confscope", "--no-includes", file.as_str()])
            .unwrap();
        let err = run(&matches).unwrap_err();
        assert!(err.to_string().ends_with("includes are disabled"));

        let matches = command()
            .try_get_matches_from(["confscope", "--max-include-depth", "0", file.as_str()])
            .unwrap();
        let err = run(&matches).unwrap_err();
        assert!(err.to_string().ends_with("include depth limit 0 exceeded"));
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(command().try_get_matches_from(["confscope", "-f", "json", "x.conf"]).is_err());
    }
}
