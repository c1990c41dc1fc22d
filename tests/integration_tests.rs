use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use rad_lang::cli::{execute_script, RunOptions};
use rad_lang::context::{FixedClock, RadContext};
use rad_lang::evaluator::Evaluator;
use rad_lang::http::Requester;
use rad_lang::lexer::Lexer;
use rad_lang::output::Printer;
use rad_lang::parser::Parser;

#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

struct Run {
    stdout: String,
    stderr: String,
    result: Result<(), String>,
}

fn run_script(source: &str, script_args: &[&str], mocks: &[(&str, &str)]) -> Run {
    run_script_opts(source, script_args, mocks, false)
}

fn run_script_opts(
    source: &str,
    script_args: &[&str],
    mocks: &[(&str, &str)],
    shell: bool,
) -> Run {
    let out = SharedBuf::default();
    let err = SharedBuf::default();
    let printer = Printer::with_writers(
        shell,
        false,
        false,
        false,
        Box::new(out.clone()),
        Box::new(err.clone()),
    );
    let mut requester = Requester::new();
    for (pattern, file) in mocks {
        requester.add_mocked_response(pattern, file).unwrap();
    }
    let mut ctx = RadContext::new(printer, requester);

    let options = RunOptions {
        script_name: "test.rsl".to_string(),
        source: source.to_string(),
        script_args: script_args.iter().map(|s| s.to_string()).collect(),
        shell,
        stdin_mode: false,
    };
    let result = execute_script(&options, &mut ctx).map_err(|e| e.to_string());
    Run {
        stdout: out.contents(),
        stderr: err.contents(),
        result,
    }
}

#[test]
fn int_array_ops() {
    let source = "a int[] = [1, 2, 3]\n\
                  print(a)\n\
                  print(join(a, \"-\"))\n\
                  print(a + [4])\n\
                  print(a + 4)\n";
    let run = run_script(source, &[], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "[1, 2, 3]\n1-2-3\n[1, 2, 3, 4]\n[1, 2, 3, 4]\n");
}

#[test]
fn typed_array_rejects_heterogeneous_append() {
    let source = "\na int[] = [1, 2, 3]\nprint(a + [\"4\"])\n";
    let run = run_script(source, &[], &[]);
    assert_eq!(
        run.result.unwrap_err(),
        "RslError at L3/9 on '+': Cannot join two arrays of different types: int[], mixed array"
    );
}

#[test]
fn mixed_nested_arrays_index_elementwise() {
    let source = "a = [1, [2, [3, [\"four\"]], 5]]\n\
                  print(a[0])\n\
                  print(a[1])\n\
                  print(a[1][1])\n\
                  print(a[1][1][1])\n\
                  print(a[1][1][1][0])\n\
                  print(a[1][2])\n";
    let run = run_script(source, &[], &[]);
    run.result.unwrap();
    assert_eq!(
        run.stdout,
        "1\n[2, [3, [four]], 5]\n[3, [four]]\n[four]\nfour\n5\n"
    );
}

#[test]
fn mixed_array_ops() {
    let source = "a = [1, 2, 3]\n\
                  print(a)\n\
                  print(join(a, \"-\"))\n\
                  print(a + [\"4\"])\n\
                  b = [\"a\", 3, false, 5.5]\n\
                  print(b)\n\
                  print(join(b, \"-\"))\n\
                  print(b + [\"yo\"])\n\
                  print(b + 7)\n";
    let run = run_script(source, &[], &[]);
    run.result.unwrap();
    assert_eq!(
        run.stdout,
        "[1, 2, 3]\n\
         1-2-3\n\
         [1, 2, 3, 4]\n\
         [a, 3, false, 5.5]\n\
         a-3-false-5.5\n\
         [a, 3, false, 5.5, yo]\n\
         [a, 3, false, 5.5, 7]\n"
    );
}

#[test]
fn root_non_array_json_extraction() {
    let source = "url = \"https://google.com\"\n\
                  Id = json.id\n\
                  Names = json.names\n\
                  rad url:\n\
                  \x20\x20\x20\x20fields Id, Names\n";
    let run = run_script(
        source,
        &[],
        &[(".*", "tests/data/not_root_array.json")],
    );
    run.result.unwrap();
    assert_eq!(run.stdout, "Id  Names\n1   [Alice, Bob, Charlie]\n");
    assert_eq!(
        run.stderr,
        "Mocking response for url (matched \".*\"): https://google.com\n"
    );
}

#[test]
fn wildcard_key_extraction() {
    let source = "url = \"https://google.com\"\n\
                  Name = json.results.*\n\
                  Age = json.results.*.age\n\
                  Hometown = json.results.*.hometown\n\
                  rad url:\n\
                  \x20\x20\x20\x20fields Name, Age, Hometown\n";
    let run = run_script(source, &[], &[(".*", "tests/data/unique_keys.json")]);
    run.result.unwrap();
    assert_eq!(
        run.stdout,
        "Name   Age  Hometown\n\
         Alice  30   New York\n\
         Bob    40   Los Angeles\n"
    );
}

#[test]
fn nested_wildcard_extraction() {
    let source = "url = \"https://google.com\"\n\
                  city = json.*\n\
                  country = json.*.*[]\n\
                  name = json.*.*[].name\n\
                  age = json.*.*[].age\n\
                  rad url:\n\
                  \x20\x20\x20\x20fields city, country, name, age\n";
    let run = run_script(source, &[], &[(".*", "tests/data/nested_wildcard.json")]);
    run.result.unwrap();
    assert_eq!(
        run.stdout,
        "city  country    name       age\n\
         York  Australia  Charlotte  35\n\
         York  Australia  David      25\n\
         York  Australia  Eve        20\n\
         York  England    Alice      30\n\
         York  England    Bob        40\n"
    );
}

#[test]
fn rad_block_populates_bindings_as_string_arrays() {
    let source = "url = \"https://google.com\"\n\
                  city = json.*\n\
                  name = json.*.*[].name\n\
                  rad url:\n\
                  \x20\x20\x20\x20fields city, name\n\
                  print(city)\n\
                  print(name)\n";
    let run = run_script(source, &[], &[(".*", "tests/data/nested_wildcard.json")]);
    run.result.unwrap();
    assert!(run
        .stdout
        .ends_with("[York, York, York, York, York]\n[Charlotte, David, Eve, Alice, Bob]\n"));
}

#[test]
fn request_is_an_alias_for_rad() {
    let source = "url = \"https://google.com\"\n\
                  id = json[].id\n\
                  name = json[].name\n\
                  request url:\n\
                  \x20\x20\x20\x20fields id, name\n";
    let run = run_script(source, &[], &[(".*", "tests/data/id_name.json")]);
    run.result.unwrap();
    assert_eq!(run.stdout, "id  name\n1   Alice\n2   Bob\n");
}

#[test]
fn json_binding_is_empty_before_rad_block() {
    let source = "names = json.names\nprint(names)\n";
    let run = run_script(source, &[], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "[]\n");
}

#[test]
fn switch_assignment_with_discriminator() {
    let source = "args:\n\
                  \x20\x20\x20\x20mode string # operating mode\n\
                  x, y = switch mode:\n\
                  \x20\x20\x20\x20case \"a\": 1, 2\n\
                  \x20\x20\x20\x20case \"b\", \"c\": 3, 4\n\
                  \x20\x20\x20\x20default: 0, 0\n\
                  print(x, y)\n";
    let run = run_script(source, &["--mode", "c"], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "3 4\n");
}

#[test]
fn switch_assignment_falls_back_to_default() {
    let source = "args:\n\
                  \x20\x20\x20\x20mode string # operating mode\n\
                  x, y = switch mode:\n\
                  \x20\x20\x20\x20case \"a\": 1, 2\n\
                  \x20\x20\x20\x20default: 0, 0\n\
                  print(x, y)\n";
    let run = run_script(source, &["--mode", "zzz"], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "0 0\n");
}

#[test]
fn positional_args_fill_in_declaration_order() {
    let source = "args:\n\
                  \x20\x20\x20\x20name string # who to greet\n\
                  \x20\x20\x20\x20greeting string = \"hello\" # what to say\n\
                  print(greeting, name)\n";
    let run = run_script(source, &["world"], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "hello world\n");

    let run = run_script(source, &["world", "hey"], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "hey world\n");
}

#[test]
fn short_flag_and_rename_bind() {
    let source = "args:\n\
                  \x20\x20\x20\x20count \"total\" c int # how many\n\
                  print(count + 1)\n";
    let run = run_script(source, &["--total", "4"], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "5\n");

    let run = run_script(source, &["-c", "9"], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "10\n");
}

#[test]
fn bool_args_default_false() {
    let source = "args:\n\
                  \x20\x20\x20\x20loud bool # yell or not\n\
                  print(loud)\n";
    let run = run_script(source, &[], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "false\n");

    let run = run_script(source, &["--loud"], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "true\n");
}

#[test]
fn missing_required_argument_is_usage_error() {
    let source = "args:\n\
                  \x20\x20\x20\x20name string # who\n\
                  \x20\x20\x20\x20age int # years\n\
                  print(name, age)\n";
    let run = run_script(source, &["Alice"], &[]);
    let err = run.result.unwrap_err();
    assert_eq!(err, "Missing required arguments: [age]");
}

#[test]
fn too_many_positionals_is_usage_error() {
    let source = "args:\n\
                  \x20\x20\x20\x20name string # who\n\
                  print(name)\n";
    let run = run_script(source, &["Alice", "Bob"], &[]);
    let err = run.result.unwrap_err();
    assert_eq!(err, "Too many positional arguments. Unused: [Bob]");
}

#[test]
fn shell_mode_exports_variables_on_stdout() {
    let source = "name = \"Alice\"\ncount = 2\nprint(\"noise\")\n";
    let run = run_script_opts(source, &[], &[], true);
    run.result.unwrap();
    assert_eq!(run.stdout, "export count=\"2\"\nexport name=\"Alice\"\n");
    // regular output is rerouted off stdout so it cannot break eval
    assert_eq!(run.stderr, "noise\n");
}

#[test]
fn arithmetic_and_comparisons() {
    let source = "print(7 / 2)\n\
                  print(7.0 / 2)\n\
                  print(2 + 3 * 4)\n\
                  print((2 + 3) * 4)\n\
                  print(1 < 2 and 2 <= 2)\n\
                  print(\"a\" + \"b\")\n\
                  print(not false)\n\
                  print(-3 + 1)\n";
    let run = run_script(source, &[], &[]);
    run.result.unwrap();
    assert_eq!(
        run.stdout,
        "3\n3.5\n14\n20\ntrue\nab\ntrue\n-2\n"
    );
}

#[test]
fn division_by_zero_is_fatal() {
    let source = "print(1 / 0)\n";
    let run = run_script(source, &[], &[]);
    let err = run.result.unwrap_err();
    assert!(err.contains("Division by zero"), "{}", err);
    assert!(err.starts_with("RslError at L1/9 on '/'"), "{}", err);
}

#[test]
fn float_division_by_zero_is_fatal() {
    for source in ["print(1.0 / 0)\n", "print(1 / 0.0)\n", "print(1.5 / 0.0)\n"] {
        let run = run_script(source, &[], &[]);
        let err = run.result.unwrap_err();
        assert!(err.contains("Division by zero"), "{}", err);
        assert!(err.starts_with("RslError at L1/"), "{}", err);
    }
}

#[test]
fn string_builtins() {
    let source = "s = \"Hello World\"\n\
                  print(upper(s))\n\
                  print(lower(s))\n\
                  print(len(s))\n\
                  print(starts_with(s, \"Hello\"))\n\
                  print(ends_with(s, \"World\"))\n\
                  print(contains(s, \"lo W\"))\n\
                  print(replace(s, \"W(or)ld\", \"w$1ld\"))\n";
    let run = run_script(source, &[], &[]);
    run.result.unwrap();
    assert_eq!(
        run.stdout,
        "HELLO WORLD\nhello world\n11\ntrue\ntrue\ntrue\nHello world\n"
    );
}

#[test]
fn join_with_prefix_and_suffix() {
    let source = "a int[] = [1, 2, 3]\nprint(join(a, \", \", \"[\", \"]\"))\n";
    let run = run_script(source, &[], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "[1, 2, 3]\n");
}

#[test]
fn undefined_variable_is_name_error() {
    let run = run_script("print(x)\n", &[], &[]);
    let err = run.result.unwrap_err();
    assert_eq!(
        err,
        "RslError at L1/7 on 'x': Undefined variable referenced: x"
    );
}

#[test]
fn unknown_function_is_name_error() {
    let run = run_script("nope(1)\n", &[], &[]);
    let err = run.result.unwrap_err();
    assert_eq!(err, "RslError at L1/1 on 'nope': Unknown function: nope");
}

#[test]
fn print_in_expression_position_is_rejected() {
    let run = run_script("x = print(1)\n", &[], &[]);
    let err = run.result.unwrap_err();
    assert!(
        err.contains("print() does not return a value"),
        "{}",
        err
    );
}

#[test]
fn pick_delegates_to_the_context_picker() {
    use rad_lang::context::FixedPicker;

    let out = SharedBuf::default();
    let err = SharedBuf::default();
    let printer = Printer::with_writers(
        false,
        false,
        false,
        false,
        Box::new(out.clone()),
        Box::new(err.clone()),
    );
    let mut ctx = RadContext::new(printer, Requester::new());
    ctx.picker = Box::new(FixedPicker("staging".to_string()));

    let source = "env = pick([\"prod\", \"staging\"], \"Which env?\")\nprint(env)\n";
    let tokens = Lexer::new(source).lex().unwrap();
    let stmts = Parser::new(tokens).parse().unwrap();
    let mut evaluator = Evaluator::new(&mut ctx);
    evaluator.run(&stmts).unwrap();

    assert_eq!(out.contents(), "staging\n");
}

#[test]
fn clock_builtins_use_injected_clock() {
    use chrono::TimeZone;

    let out = SharedBuf::default();
    let err = SharedBuf::default();
    let printer = Printer::with_writers(
        false,
        false,
        false,
        false,
        Box::new(out.clone()),
        Box::new(err.clone()),
    );
    let mut ctx = RadContext::new(printer, Requester::new());
    ctx.clock = Box::new(FixedClock(
        chrono::Local.with_ymd_and_hms(2024, 6, 15, 10, 30, 45).unwrap(),
    ));

    let source = "print(today_date())\nprint(today_year(), today_month(), today_day())\n";
    let tokens = Lexer::new(source).lex().unwrap();
    let stmts = Parser::new(tokens).parse().unwrap();
    let mut evaluator = Evaluator::new(&mut ctx);
    evaluator.run(&stmts).unwrap();

    assert_eq!(out.contents(), "2024-06-15\n2024 6 15\n");
}

#[test]
fn file_header_feeds_script_descriptions() {
    let source = "\"\"\"\nGreets someone.\n\nLonger story here.\n\"\"\"\nprint(\"hi\")\n";
    let run = run_script(source, &[], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "hi\n");

    let tokens = Lexer::new(source).lex().unwrap();
    let stmts = Parser::new(tokens).parse().unwrap();
    let metadata = rad_lang::extract_metadata(&stmts).unwrap();
    assert_eq!(metadata.short_description().unwrap(), "Greets someone.");
    assert!(metadata.long_description().unwrap().contains("Longer story"));
}

#[test]
fn array_defaults_bind_when_flag_unset() {
    let source = "args:\n\
                  \x20\x20\x20\x20ids int[] = [1, 2] # which ids\n\
                  print(ids)\n";
    let run = run_script(source, &[], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "[1, 2]\n");

    let run = run_script(source, &["--ids", "5,6,7"], &[]);
    run.result.unwrap();
    assert_eq!(run.stdout, "[5, 6, 7]\n");
}
