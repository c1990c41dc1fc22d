//! The fixed table of built-in functions.
//!
//! Each entry declares its arity and whether it produces a value or is
//! statement-only (`print`, `debug`). Dispatch validates arity against the
//! table before running the implementation.

use chrono::{Datelike, Timelike};
use regex::Regex;

use crate::ast::Token;
use crate::context::RadContext;
use crate::evaluator::EvalError;
use crate::value::{DynValue, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    /// Produces a value; usable in expressions and statements.
    Value,
    /// No result; usable only in statement position.
    Statement,
}

pub struct Builtin {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub kind: BuiltinKind,
}

const fn exact(name: &'static str, n: usize, kind: BuiltinKind) -> Builtin {
    Builtin {
        name,
        min_args: n,
        max_args: Some(n),
        kind,
    }
}

pub const BUILTINS: &[Builtin] = &[
    exact("len", 1, BuiltinKind::Value),
    exact("upper", 1, BuiltinKind::Value),
    exact("lower", 1, BuiltinKind::Value),
    exact("starts_with", 2, BuiltinKind::Value),
    exact("ends_with", 2, BuiltinKind::Value),
    exact("contains", 2, BuiltinKind::Value),
    exact("replace", 3, BuiltinKind::Value),
    Builtin {
        name: "join",
        min_args: 2,
        max_args: Some(4),
        kind: BuiltinKind::Value,
    },
    Builtin {
        name: "pick",
        min_args: 1,
        max_args: Some(2),
        kind: BuiltinKind::Value,
    },
    exact("today_date", 0, BuiltinKind::Value),
    exact("today_year", 0, BuiltinKind::Value),
    exact("today_month", 0, BuiltinKind::Value),
    exact("today_day", 0, BuiltinKind::Value),
    exact("today_hour", 0, BuiltinKind::Value),
    exact("today_minute", 0, BuiltinKind::Value),
    exact("today_second", 0, BuiltinKind::Value),
    exact("epoch_seconds", 0, BuiltinKind::Value),
    exact("epoch_millis", 0, BuiltinKind::Value),
    exact("epoch_nanos", 0, BuiltinKind::Value),
    Builtin {
        name: "print",
        min_args: 0,
        max_args: None,
        kind: BuiltinKind::Statement,
    },
    Builtin {
        name: "debug",
        min_args: 0,
        max_args: None,
        kind: BuiltinKind::Statement,
    },
];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

/// Validate arity and dispatch. Statement-only builtins return `None`.
pub fn call(
    ctx: &mut RadContext,
    function: &Token,
    args: Vec<Value>,
) -> Result<Option<Value>, EvalError> {
    let builtin = lookup(&function.lexeme)
        .ok_or_else(|| EvalError::name(function, format!("Unknown function: {}", function.lexeme)))?;
    check_arity(builtin, function, args.len())?;

    let result = match builtin.name {
        "len" => Some(run_len(function, &args)?),
        "upper" => Some(Value::String(args[0].to_printable().to_uppercase())),
        "lower" => Some(Value::String(args[0].to_printable().to_lowercase())),
        "starts_with" => Some(Value::Bool(
            args[0].to_printable().starts_with(&args[1].to_printable()),
        )),
        "ends_with" => Some(Value::Bool(
            args[0].to_printable().ends_with(&args[1].to_printable()),
        )),
        "contains" => Some(Value::Bool(
            args[0].to_printable().contains(&args[1].to_printable()),
        )),
        "replace" => Some(run_replace(function, &args)?),
        "join" => Some(run_join(function, &args)?),
        "pick" => Some(run_pick(ctx, function, &args)?),
        "today_date" => Some(Value::String(
            ctx.clock.now().format("%Y-%m-%d").to_string(),
        )),
        "today_year" => Some(Value::Int(ctx.clock.now().year() as i64)),
        "today_month" => Some(Value::Int(ctx.clock.now().month() as i64)),
        "today_day" => Some(Value::Int(ctx.clock.now().day() as i64)),
        "today_hour" => Some(Value::Int(ctx.clock.now().hour() as i64)),
        "today_minute" => Some(Value::Int(ctx.clock.now().minute() as i64)),
        "today_second" => Some(Value::Int(ctx.clock.now().second() as i64)),
        "epoch_seconds" => Some(Value::Int(ctx.clock.now().timestamp())),
        "epoch_millis" => Some(Value::Int(ctx.clock.now().timestamp_millis())),
        "epoch_nanos" => Some(Value::Int(
            ctx.clock
                .now()
                .timestamp_nanos_opt()
                .unwrap_or_else(|| panic!("internal error: timestamp out of nanosecond range")),
        )),
        "print" => {
            ctx.printer.print(&output_string(&args));
            None
        }
        "debug" => {
            ctx.printer.script_debug(&output_string(&args));
            None
        }
        other => panic!("internal error: builtin {} has no implementation", other),
    };
    Ok(result)
}

fn check_arity(builtin: &Builtin, function: &Token, got: usize) -> Result<(), EvalError> {
    let ok = got >= builtin.min_args && builtin.max_args.map_or(true, |max| got <= max);
    if ok {
        return Ok(());
    }
    let expectation = match (builtin.min_args, builtin.max_args) {
        (min, Some(max)) if min == max => format!("exactly {} argument{}", min, plural(min)),
        (min, Some(max)) => format!("between {} and {} arguments", min, max),
        (min, None) => format!("at least {} argument{}", min, plural(min)),
    };
    Err(EvalError::type_error(
        function,
        format!("{}() takes {}, got {}", builtin.name, expectation, got),
    ))
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn output_string(values: &[Value]) -> String {
    if values.is_empty() {
        return "\n".to_string();
    }
    let parts: Vec<String> = values.iter().map(Value::to_printable).collect();
    format!("{}\n", parts.join(" "))
}

fn run_len(function: &Token, args: &[Value]) -> Result<Value, EvalError> {
    match &args[0] {
        Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
        value => match value.array_len() {
            Some(len) => Ok(Value::Int(len as i64)),
            None => Err(EvalError::type_error(
                function,
                "len() takes a string or array".to_string(),
            )),
        },
    }
}

fn run_replace(function: &Token, args: &[Value]) -> Result<Value, EvalError> {
    let subject = args[0].to_printable();
    let pattern = args[1].to_printable();
    let replacement = args[2].to_printable();

    let regex = Regex::new(&pattern).map_err(|e| {
        EvalError::type_error(function, format!("Invalid regex in replace(): {}", e))
    })?;
    Ok(Value::String(
        regex.replace_all(&subject, replacement.as_str()).into_owned(),
    ))
}

fn run_join(function: &Token, args: &[Value]) -> Result<Value, EvalError> {
    let elements = args[0].dyn_elements().ok_or_else(|| {
        EvalError::type_error(
            function,
            "join() takes an array as the first argument".to_string(),
        )
    })?;
    let separator = args[1].to_printable();
    let prefix = args.get(2).map(Value::to_printable).unwrap_or_default();
    let suffix = args.get(3).map(Value::to_printable).unwrap_or_default();

    let parts: Vec<String> = elements.iter().map(DynValue::to_printable).collect();
    Ok(Value::String(format!(
        "{}{}{}",
        prefix,
        parts.join(&separator),
        suffix
    )))
}

fn run_pick(ctx: &mut RadContext, function: &Token, args: &[Value]) -> Result<Value, EvalError> {
    let options: Vec<String> = args[0]
        .dyn_elements()
        .ok_or_else(|| {
            EvalError::type_error(
                function,
                "pick() takes an array as the first argument".to_string(),
            )
        })?
        .iter()
        .map(DynValue::to_printable)
        .collect();
    let prompt = args
        .get(1)
        .map(Value::to_printable)
        .unwrap_or_else(|| "Pick an option:".to_string());

    let chosen = ctx
        .picker
        .pick(&prompt, &options)
        .map_err(|e| EvalError::io(function, e))?;
    Ok(Value::String(chosen))
}
