//! Output routing and table rendering.
//!
//! All user-visible writes flow through [`Printer`], which knows the output
//! levels the host flags select: regular script output, shell-eval export
//! lines, info, script-developer debug (`--DEBUG`), and host-developer
//! debug (`--RAD-DEBUG`). Under `--SHELL` regular output is rerouted to
//! stderr so stdout carries only `export` lines an embedding shell can eval.

use std::io::{self, Write};

pub struct Printer {
    shell: bool,
    quiet: bool,
    debug: bool,
    rad_debug: bool,
    out: Box<dyn Write>,
    err: Box<dyn Write>,
}

impl Printer {
    pub fn new(shell: bool, quiet: bool, debug: bool, rad_debug: bool) -> Self {
        Printer::with_writers(
            shell,
            quiet,
            debug,
            rad_debug,
            Box::new(io::stdout()),
            Box::new(io::stderr()),
        )
    }

    pub fn with_writers(
        shell: bool,
        quiet: bool,
        debug: bool,
        rad_debug: bool,
        out: Box<dyn Write>,
        err: Box<dyn Write>,
    ) -> Self {
        Printer {
            shell,
            quiet,
            debug,
            rad_debug,
            out,
            err,
        }
    }

    /// Regular script output (`print`, tables).
    pub fn print(&mut self, text: &str) {
        if self.shell {
            let _ = self.err.write_all(text.as_bytes());
        } else {
            let _ = self.out.write_all(text.as_bytes());
        }
        let _ = self.flush();
    }

    /// Lines meant for `eval` by an embedding shell. Always stdout.
    pub fn print_for_shell_eval(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.flush();
    }

    /// Informational messages (mock hits, outgoing requests). Suppressed by
    /// `--QUIET`.
    pub fn rad_info(&mut self, text: &str) {
        if !self.quiet {
            let _ = self.err.write_all(text.as_bytes());
            let _ = self.flush();
        }
    }

    /// Script-developer diagnostics, enabled by `--DEBUG`.
    pub fn script_debug(&mut self, text: &str) {
        if self.debug {
            let _ = self.err.write_all(text.as_bytes());
            let _ = self.flush();
        }
    }

    /// Host-developer diagnostics, enabled by `--RAD-DEBUG`.
    pub fn rad_debug(&mut self, text: &str) {
        if self.rad_debug {
            let _ = self.err.write_all(text.as_bytes());
            let _ = self.flush();
        }
    }

    pub fn error(&mut self, text: &str) {
        let _ = self.err.write_all(text.as_bytes());
        let _ = self.flush();
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.err.flush()
    }
}

/// Render rows as a plain left-aligned table: each column as wide as its
/// widest cell or header, two-space gutters, trailing whitespace trimmed.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    render_row(&mut out, headers, &widths);
    for row in rows {
        render_row(&mut out, row, &widths);
    }
    out
}

fn render_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate() {
        line.push_str(cell);
        if i + 1 < cells.len() {
            let pad = widths[i].saturating_sub(cell.chars().count()) + 2;
            line.extend(std::iter::repeat(' ').take(pad));
        }
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn aligns_columns_to_widest_cell() {
        let headers = strings(&["Id", "Names"]);
        let rows = vec![strings(&["1", "[Alice, Bob, Charlie]"])];
        assert_eq!(
            render_table(&headers, &rows),
            "Id  Names\n1   [Alice, Bob, Charlie]\n"
        );
    }

    #[test]
    fn header_wider_than_cells_sets_column_width() {
        let headers = strings(&["Hometown", "Age"]);
        let rows = vec![strings(&["NY", "30"]), strings(&["LA", "40"])];
        assert_eq!(
            render_table(&headers, &rows),
            "Hometown  Age\nNY        30\nLA        40\n"
        );
    }

    #[test]
    fn renders_header_only_for_zero_rows() {
        let headers = strings(&["a", "b"]);
        assert_eq!(render_table(&headers, &[]), "a  b\n");
    }
}
