//! The interactive prompt.
//!
//! Reads one line at a time, dispatches dot-prefixed meta-commands and SQL
//! statements, and reports recoverable errors without leaving the loop.
//! Fatal storage errors propagate to `main`.

use crate::errors::Error;
use crate::sql::{self, Statement};
use crate::storage::{self, node, row, Table};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, BufRead, Write};
use tracing::{debug, info};

const PROMPT: &str = "db > ";

const HELP: &str = r#"Meta-commands:
.btree      Print the tree structure.
.constants  Print the storage layout constants.
.help       Show this help.
.exit       Flush to disk and quit.
"#;

enum MetaResult {
    Continue,
    Exit,
}

/// Runs the prompt loop until `.exit` or end of input, then closes the
/// table. Returns an error only for fatal conditions.
pub fn start(table: &mut Table) -> Result<(), Error> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print_prompt()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => break, // end of input closes like `.exit`
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('.') {
            match do_meta_command(table, input)? {
                MetaResult::Exit => break,
                MetaResult::Continue => continue,
            }
        }

        match sql::parse(input).and_then(|statement| execute_statement(table, statement)) {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!(input, error = %e, "Statement rejected");
                echo_error(&e.to_string());
            }
        }
    }

    table.close()
}

fn do_meta_command(table: &mut Table, input: &str) -> Result<MetaResult, Error> {
    match input {
        ".exit" => {
            info!("Exit requested");
            Ok(MetaResult::Exit)
        }
        ".btree" => {
            echo("Tree:");
            echo(storage::dump_tree(table)?.trim_end());
            Ok(MetaResult::Continue)
        }
        ".constants" => {
            echo("Constants:");
            echo(constants_table().trim_end());
            Ok(MetaResult::Continue)
        }
        ".help" => {
            echo(HELP.trim_end());
            Ok(MetaResult::Continue)
        }
        _ => {
            echo_error(&format!("Unrecognized command '{}'.", input));
            Ok(MetaResult::Continue)
        }
    }
}

fn execute_statement(table: &mut Table, statement: Statement) -> Result<(), Error> {
    match statement {
        Statement::Insert(insert) => {
            storage::insert_row(table, &insert.row)?;
            echo("Executed.");
        }
        Statement::Select => {
            for row in storage::select_rows(table)? {
                echo(&row.to_string());
            }
            echo("Executed.");
        }
    }
    Ok(())
}

/// The layout constants as a bordered table, for `.constants`.
fn constants_table() -> String {
    let headers = ["Constant".to_string(), "Value".to_string()];
    let rows: Vec<Vec<String>> = [
        ("ROW_SIZE", row::ROW_SIZE),
        ("COMMON_NODE_HEADER_SIZE", node::COMMON_NODE_HEADER_SIZE),
        ("LEAF_NODE_HEADER_SIZE", node::LEAF_NODE_HEADER_SIZE),
        ("LEAF_NODE_CELL_SIZE", node::LEAF_NODE_CELL_SIZE),
        ("LEAF_NODE_SPACE_FOR_CELLS", node::LEAF_NODE_SPACE_FOR_CELLS),
        ("LEAF_NODE_MAX_CELLS", node::LEAF_NODE_MAX_CELLS),
    ]
    .iter()
    .map(|(name, value)| vec![name.to_string(), value.to_string()])
    .collect();
    build_table(&headers, &rows)
}

fn print_prompt() -> Result<(), Error> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", PROMPT)?;
    stdout.flush()?;
    Ok(())
}

fn echo(s: &str) {
    let _ = execute!(io::stdout(), Print(s), Print("\n"));
}

fn echo_error(s: &str) {
    let _ = execute!(
        io::stdout(),
        SetForegroundColor(Color::Red),
        Print(s),
        Print("\n"),
        ResetColor,
    );
}

/// Renders rows as a bordered ASCII table, sized to the widest cell of
/// each column.
pub fn build_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let border: String = {
        let mut b = String::from("+");
        for width in &widths {
            b.push_str(&"-".repeat(*width));
            b.push('+');
        }
        b.push('\n');
        b
    };
    let format_row = |cells: &[String]| {
        let mut line = String::from("|");
        for (i, cell) in cells.iter().enumerate() {
            line.push_str(&format!("{:<width$}|", cell, width = widths[i]));
        }
        line.push('\n');
        line
    };

    let mut out = String::new();
    out.push_str(&border);
    out.push_str(&format_row(headers));
    out.push_str(&border);
    for row in rows {
        out.push_str(&format_row(row));
    }
    out.push_str(&border);
    out
}
