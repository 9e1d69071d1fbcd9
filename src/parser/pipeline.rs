// Script parser: commands separated by "|"

use super::command::parse_command;
use super::lexer::ws;
use crate::session::Command;
use nom::{
    bytes::complete::tag,
    combinator::{eof, opt},
    multi::separated_list0,
    IResult,
};

/// Parse a complete command script
/// Format: command | command | ...
pub fn parse_commands(input: &str) -> IResult<&str, Vec<Command>> {
    // Optional leading "|"
    let (input, _) = opt(ws(tag("|")))(input)?;

    let (input, commands) = separated_list0(ws(tag("|")), parse_command)(input)?;

    // Consume trailing whitespace and ensure end of input
    let (input, _) = ws(eof)(input)?;

    Ok((input, commands))
}
