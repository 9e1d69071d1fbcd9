// Command script parser module

pub mod command;
pub mod lexer;
pub mod pipeline;

pub use pipeline::parse_commands;

use crate::error::{Result, VizError};
use crate::session::Command;

/// Parse a whole script, mapping nom failures to [`VizError::Parse`].
pub fn parse_script(input: &str) -> Result<Vec<Command>> {
    match parse_commands(input) {
        Ok((_, commands)) => Ok(commands),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(VizError::Parse {
            remaining: e.input.trim().to_string(),
        }),
        Err(nom::Err::Incomplete(_)) => Err(VizError::Parse {
            remaining: input.trim().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script_ok() {
        let commands = parse_script("select(BarChart) | submit()").unwrap();
        assert_eq!(commands.len(), 2);
    }

    #[test]
    fn test_parse_script_reports_remaining() {
        match parse_script("select(BarChart) | oops") {
            Err(VizError::Parse { remaining }) => assert_eq!(remaining, "| oops"),
            other => panic!("expected Parse error, got {:?}", other),
        }
    }
}
