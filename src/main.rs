use std::io::Read;
use std::path::Path;
use std::process;

use clap::{Arg, ArgAction, Command};
use rad_lang::cli::{self, CliError, RunOptions};
use rad_lang::context::RadContext;
use rad_lang::http::Requester;
use rad_lang::output::Printer;

fn main() {
    let mut cmd = Command::new("rad")
        .about("Request And Display (RAD)")
        .long_about(
            "Request And Display (RAD): A tool for making HTTP requests, \
             extracting details, and displaying the result.",
        )
        .version("0.2.8")
        // Script args own -h: help for the host itself is rendered only
        // when no script is given.
        .disable_help_flag(true)
        .arg(
            Arg::new("SHELL")
                .long("SHELL")
                .action(ArgAction::SetTrue)
                .help("Output shell exports of script variables, so they can be eval'd"),
        )
        .arg(
            Arg::new("STDIN")
                .long("STDIN")
                .value_name("NAME")
                .help("Read the script from stdin; NAME is shown as the script name, usually $0"),
        )
        .arg(
            Arg::new("QUIET")
                .long("QUIET")
                .action(ArgAction::SetTrue)
                .help("Suppress informational output"),
        )
        .arg(
            Arg::new("DEBUG")
                .long("DEBUG")
                .action(ArgAction::SetTrue)
                .help("Enable debug output. Intended for RSL script developers"),
        )
        .arg(
            Arg::new("RAD-DEBUG")
                .long("RAD-DEBUG")
                .action(ArgAction::SetTrue)
                .help("Enable Rad debug output. Intended for Rad developers"),
        )
        .arg(
            Arg::new("MOCK-RESPONSE")
                .long("MOCK-RESPONSE")
                .value_name("PATTERN:FILE")
                .action(ArgAction::Append)
                .help("Mock json responses for urls matching a regex (pattern:filePath)"),
        )
        .arg(
            Arg::new("script")
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true)
                .help("Script path followed by script arguments"),
        );

    let matches = match cmd.try_get_matches_from_mut(std::env::args_os()) {
        Ok(matches) => matches,
        Err(e) => e.exit(),
    };

    let shell = matches.get_flag("SHELL");
    let quiet = matches.get_flag("QUIET");
    let debug = matches.get_flag("DEBUG");
    let rad_debug = matches.get_flag("RAD-DEBUG");
    let stdin_name = matches.get_one::<String>("STDIN").cloned();

    let raw: Vec<String> = matches
        .get_many::<String>("script")
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default();

    let mut printer = Printer::new(shell, quiet, debug, rad_debug);
    printer.rad_debug(&format!("Args passed: {:?}\n", raw));

    let mut requester = Requester::new();
    for mock in matches
        .get_many::<String>("MOCK-RESPONSE")
        .into_iter()
        .flatten()
    {
        let Some((pattern, file_path)) = mock.split_once(':') else {
            printer.error(&format!(
                "Invalid mock response (expected pattern:filePath): {}\n",
                mock
            ));
            process::exit(1);
        };
        if let Err(e) = requester.add_mocked_response(pattern, file_path) {
            printer.error(&format!(
                "Failed to compile mock response regex \"{}\": {}\n",
                pattern, e
            ));
            process::exit(1);
        }
        printer.rad_debug(&format!(
            "Mock response added: \"{}\" -> \"{}\"\n",
            pattern, file_path
        ));
    }

    let (script_name, source, script_args, stdin_mode) = match stdin_name {
        Some(name) => {
            let mut source = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut source) {
                printer.error(&format!("Could not read from stdin: {}\n", e));
                process::exit(1);
            }
            (base_name(&name), source, raw, true)
        }
        None => {
            if raw.is_empty() || raw[0] == "-h" || raw[0] == "--help" {
                let _ = cmd.print_help();
                return;
            }
            let script_path = &raw[0];
            let source = match std::fs::read_to_string(script_path) {
                Ok(source) => source,
                Err(e) => {
                    printer.error(&format!("Could not read script '{}': {}\n", script_path, e));
                    process::exit(1);
                }
            };
            (
                base_name(script_path),
                source,
                raw[1..].to_vec(),
                false,
            )
        }
    };

    let options = RunOptions {
        script_name,
        source,
        script_args,
        shell,
        stdin_mode,
    };
    let mut ctx = RadContext::new(printer, requester);

    if let Err(e) = cli::execute_script(&options, &mut ctx) {
        match e {
            CliError::Flag(e) => e.exit(),
            other => {
                ctx.printer.error(&format!("{}\n", other));
                process::exit(1);
            }
        }
    }
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
