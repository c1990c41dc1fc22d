use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

fn rad() -> Command {
    Command::cargo_bin("rad").unwrap()
}

#[test]
fn no_arguments_prints_host_help() {
    rad()
        .assert()
        .success()
        .stdout(contains("Request And Display"));
}

#[test]
fn runs_a_script_with_positional_argument() {
    rad()
        .args(["tests/data/hello.rsl", "world"])
        .assert()
        .success()
        .stdout("hello world\n");
}

#[test]
fn script_help_is_derived_from_declarations() {
    rad()
        .args(["tests/data/hello.rsl", "-h"])
        .assert()
        .success()
        .stdout(contains("Prints a friendly greeting.").and(contains("who to greet")));
}

#[test]
fn stdin_mode_reads_source_from_stdin() {
    rad()
        .args(["--STDIN", "inline.rsl"])
        .write_stdin("print(\"hi\")\n")
        .assert()
        .success()
        .stdout("hi\n");
}

#[test]
fn mock_response_bypasses_http() {
    rad()
        .args([
            "--MOCK-RESPONSE",
            ".*:tests/data/id_name.json",
            "tests/data/ids.rsl",
        ])
        .assert()
        .success()
        .stdout("id  name\n1   Alice\n2   Bob\n")
        .stderr(contains("Mocking response for url"));
}

#[test]
fn quiet_suppresses_mock_info() {
    rad()
        .args([
            "--QUIET",
            "--MOCK-RESPONSE",
            ".*:tests/data/id_name.json",
            "tests/data/ids.rsl",
        ])
        .assert()
        .success()
        .stderr("");
}

#[test]
fn lex_error_exits_one_with_position() {
    rad()
        .args(["--STDIN", "bad.rsl"])
        .write_stdin("a = \"oops\n")
        .assert()
        .failure()
        .code(1)
        .stderr(contains("Error at L1/5 on '\"oops'").and(contains("Unterminated string")));
}

#[test]
fn runtime_error_exits_one_with_rsl_prefix() {
    rad()
        .args(["--STDIN", "bad.rsl"])
        .write_stdin("\na int[] = [1, 2, 3]\nprint(a + [\"4\"])\n")
        .assert()
        .failure()
        .code(1)
        .stderr(contains(
            "RslError at L3/9 on '+': Cannot join two arrays of different types: int[], mixed array",
        ));
}

#[test]
fn unreadable_script_exits_one() {
    rad()
        .arg("tests/data/does_not_exist.rsl")
        .assert()
        .failure()
        .code(1)
        .stderr(contains("Could not read script"));
}

#[test]
fn debug_builtin_prints_only_with_debug_flag() {
    rad()
        .args(["--STDIN", "inline.rsl"])
        .write_stdin("debug(\"details\")\nprint(\"done\")\n")
        .assert()
        .success()
        .stdout("done\n")
        .stderr("");

    rad()
        .args(["--DEBUG", "--STDIN", "inline.rsl"])
        .write_stdin("debug(\"details\")\nprint(\"done\")\n")
        .assert()
        .success()
        .stdout("done\n")
        .stderr(contains("details"));
}

#[test]
fn shell_mode_emits_exports_on_stdout() {
    rad()
        .args(["--SHELL", "--STDIN", "inline.rsl"])
        .write_stdin("greeting = \"hi\"\n")
        .assert()
        .success()
        .stdout(contains("export greeting=\"hi\""));
}

#[test]
fn shell_stdin_help_emits_exit_zero() {
    rad()
        .args(["--SHELL", "--STDIN", "inline.rsl", "-h"])
        .write_stdin("args:\n    name string # who\nprint(name)\n")
        .assert()
        .success()
        .stdout(contains("exit 0"));
}
