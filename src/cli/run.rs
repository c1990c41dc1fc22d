//! The script-execution pipeline: lex, parse, extract the schema, build
//! the script's own flag set, bind CLI arguments, and interpret.
//!
//! Metadata extraction always runs before dispatch, so `-h` on a script
//! renders help derived from the script's own declarations with no
//! re-entrant parsing.

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::ast::RslTypeKind;
use crate::cli::CliError;
use crate::context::RadContext;
use crate::evaluator::Evaluator;
use crate::lexer::Lexer;
use crate::meta::{self, ScriptArg, ScriptMetadata};
use crate::parser::{ParseError, Parser};
use crate::value::Value;

pub struct RunOptions {
    pub script_name: String,
    pub source: String,
    pub script_args: Vec<String>,
    pub shell: bool,
    /// True when the source came from stdin (`--STDIN`).
    pub stdin_mode: bool,
}

pub fn execute_script(options: &RunOptions, ctx: &mut RadContext) -> Result<(), CliError> {
    let tokens = Lexer::new(&options.source).lex().map_err(ParseError::from)?;
    let stmts = Parser::new(tokens).parse()?;
    let metadata = meta::extract_metadata(&stmts)?;

    let mut cmd = build_script_command(&options.script_name, &metadata);

    let matches = match cmd.try_get_matches_from_mut(&options.script_args) {
        Ok(matches) => matches,
        Err(e) if e.kind() == clap::error::ErrorKind::DisplayHelp => {
            let _ = e.print();
            emit_shell_exit(options, ctx);
            return Ok(());
        }
        Err(e) => return Err(CliError::Flag(e)),
    };

    let bound = match bind_args(&metadata, &matches)? {
        Bound::Values(values) => values,
        Bound::NeedsHelp => {
            let _ = cmd.print_help();
            emit_shell_exit(options, ctx);
            return Ok(());
        }
    };

    let mut evaluator = Evaluator::new(ctx);
    evaluator.init_args(bound);
    evaluator.run(&stmts)?;

    if options.shell {
        let exports: Vec<String> = evaluator
            .env
            .vars_sorted()
            .into_iter()
            .map(|(name, value)| format!("export {}=\"{}\"\n", name, value.to_printable()))
            .collect();
        for line in exports {
            ctx.printer.print_for_shell_eval(&line);
        }
    }
    Ok(())
}

/// With `--SHELL` and `--STDIN` both set, help output is followed by an
/// `exit 0` on stdout so an embedding shell can safely eval and stop.
fn emit_shell_exit(options: &RunOptions, ctx: &mut RadContext) {
    if options.shell && options.stdin_mode {
        ctx.printer.print_for_shell_eval("exit 0\n");
    }
}

fn build_script_command(script_name: &str, metadata: &ScriptMetadata) -> Command {
    let mut cmd = Command::new(script_name.to_string())
        .no_binary_name(true)
        .disable_version_flag(true)
        .override_usage(meta::generate_use_string(script_name, &metadata.args));

    if let Some(short) = metadata.short_description() {
        cmd = cmd.about(short);
    }
    if let Some(long) = metadata.long_description() {
        cmd = cmd.long_about(long);
    }

    cmd = cmd.arg(
        Arg::new("_positionals")
            .num_args(0..)
            .value_name("ARGS")
            .hide(true),
    );

    for arg in &metadata.args {
        let mut flag = Arg::new(arg.api_name.clone())
            .long(arg.api_name.clone())
            .help(arg.help.clone());
        if let Some(short) = arg.short {
            flag = flag.short(short);
        }
        flag = match arg.arg_type {
            RslTypeKind::Bool => flag.action(ArgAction::SetTrue),
            kind if kind.is_array() => flag.action(ArgAction::Append).value_delimiter(','),
            _ => flag.action(ArgAction::Set),
        };
        cmd = cmd.arg(flag);
    }
    cmd
}

enum Bound {
    Values(Vec<(String, Value)>),
    /// The script declares arguments and the user supplied none of them.
    NeedsHelp,
}

/// Fill argument values cobra-style: explicit flags win, then positionals
/// in declaration order, then defaults; bools fall back to false. Missing
/// required arguments and unused positionals are usage errors.
fn bind_args(metadata: &ScriptMetadata, matches: &ArgMatches) -> Result<Bound, CliError> {
    let positionals: Vec<String> = matches
        .get_many::<String>("_positionals")
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default();

    let mut bound = Vec::new();
    let mut missing = Vec::new();
    let mut pos_index = 0usize;
    let mut needs_help = !metadata.args.is_empty();

    for arg in &metadata.args {
        if let Some(value) = flag_value(matches, arg)? {
            bound.push((arg.name.clone(), value));
            needs_help = false;
        } else if pos_index < positionals.len() {
            let raw = &positionals[pos_index];
            pos_index += 1;
            bound.push((arg.name.clone(), parse_cli_value(raw, arg)?));
            needs_help = false;
        } else if arg.is_optional {
            if let Some(default) = &arg.default {
                bound.push((arg.name.clone(), default.clone()));
            }
            needs_help = false;
        } else if arg.arg_type == RslTypeKind::Bool {
            // bools are implicitly optional and default false
            bound.push((arg.name.clone(), Value::Bool(false)));
            needs_help = false;
        } else {
            missing.push(arg.api_name.clone());
        }
    }

    if needs_help {
        return Ok(Bound::NeedsHelp);
    }
    if !missing.is_empty() {
        return Err(CliError::Usage(format!(
            "Missing required arguments: [{}]",
            missing.join(", ")
        )));
    }
    if pos_index < positionals.len() {
        return Err(CliError::Usage(format!(
            "Too many positional arguments. Unused: [{}]",
            positionals[pos_index..].join(", ")
        )));
    }
    Ok(Bound::Values(bound))
}

/// The value of an explicitly set flag, or `None` if the user did not pass
/// it on the command line.
fn flag_value(matches: &ArgMatches, arg: &ScriptArg) -> Result<Option<Value>, CliError> {
    if matches.value_source(&arg.api_name) != Some(ValueSource::CommandLine) {
        return Ok(None);
    }

    if arg.arg_type == RslTypeKind::Bool {
        return Ok(Some(Value::Bool(matches.get_flag(&arg.api_name))));
    }

    if arg.arg_type.is_array() {
        let raw: Vec<String> = matches
            .get_many::<String>(&arg.api_name)
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default();
        return Ok(Some(parse_array_values(&raw, arg)?));
    }

    let raw = matches
        .get_one::<String>(&arg.api_name)
        .cloned()
        .unwrap_or_default();
    parse_scalar_value(&raw, arg).map(Some)
}

fn parse_cli_value(raw: &str, arg: &ScriptArg) -> Result<Value, CliError> {
    if arg.arg_type.is_array() {
        let parts: Vec<String> = if raw.is_empty() {
            Vec::new()
        } else {
            raw.split(',').map(|s| s.to_string()).collect()
        };
        parse_array_values(&parts, arg)
    } else {
        parse_scalar_value(raw, arg)
    }
}

fn parse_scalar_value(raw: &str, arg: &ScriptArg) -> Result<Value, CliError> {
    let invalid = |expected: &str| {
        CliError::Usage(format!(
            "Invalid {} value for '{}': {}",
            expected, arg.api_name, raw
        ))
    };
    match arg.arg_type.element_type() {
        RslTypeKind::Str => Ok(Value::String(raw.to_string())),
        RslTypeKind::Int => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| invalid("int")),
        RslTypeKind::Float => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| invalid("float")),
        RslTypeKind::Bool => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid("bool")),
        },
        other => panic!("internal error: scalar parse for {:?}", other),
    }
}

fn parse_array_values(raw: &[String], arg: &ScriptArg) -> Result<Value, CliError> {
    let mut scalars = Vec::with_capacity(raw.len());
    for item in raw {
        scalars.push(parse_scalar_value(item, arg)?);
    }
    Ok(match arg.arg_type.element_type() {
        RslTypeKind::Str => Value::StringArray(
            scalars
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => s,
                    _ => unreachable!("internal error: non-string scalar"),
                })
                .collect(),
        ),
        RslTypeKind::Int => Value::IntArray(
            scalars
                .into_iter()
                .map(|v| match v {
                    Value::Int(i) => i,
                    _ => unreachable!("internal error: non-int scalar"),
                })
                .collect(),
        ),
        RslTypeKind::Float => Value::FloatArray(
            scalars
                .into_iter()
                .map(|v| match v {
                    Value::Float(f) => f,
                    _ => unreachable!("internal error: non-float scalar"),
                })
                .collect(),
        ),
        RslTypeKind::Bool => Value::BoolArray(
            scalars
                .into_iter()
                .map(|v| match v {
                    Value::Bool(b) => b,
                    _ => unreachable!("internal error: non-bool scalar"),
                })
                .collect(),
        ),
        other => panic!("internal error: array parse for {:?}", other),
    })
}
