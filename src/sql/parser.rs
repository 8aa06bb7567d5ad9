//! Parses the two-statement command language.

use super::statement::{InsertStatement, Statement};
use crate::errors::Error;
use crate::storage::Row;
use once_cell::sync::Lazy;
use regex::Regex;

static INSERT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^insert\s+(-?\d+)\s+(\S+)\s+(\S+)$").expect("insert pattern"));

/// Turns one line of input into a typed statement.
pub fn parse(input: &str) -> Result<Statement, Error> {
    let input = input.trim();
    if input.starts_with("insert") {
        return Ok(Statement::Insert(parse_insert(input)?));
    }
    if input == "select" || input.starts_with("select ") {
        return Ok(Statement::Select);
    }
    Err(Error::Unrecognized(input.to_owned()))
}

/// `insert <id> <username> <email>`. The id is parsed as signed so a
/// leading minus is rejected as a negative id rather than a syntax error.
fn parse_insert(input: &str) -> Result<InsertStatement, Error> {
    let caps = INSERT_RE
        .captures(input)
        .ok_or_else(|| err!(Syntax, "malformed insert: '{}'", input))?;

    let id: i64 = caps[1]
        .parse()
        .map_err(|_| err!(Syntax, "id out of range: '{}'", &caps[1]))?;
    if id < 0 {
        return Err(Error::NegativeId);
    }
    let id = u32::try_from(id).map_err(|_| err!(Syntax, "id out of range: '{}'", id))?;

    let row = Row::new(id, &caps[2], &caps[3])?;
    Ok(InsertStatement { row })
}
