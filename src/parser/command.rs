// Command parsers: select, set, submit

use super::lexer::{bare_word, identifier, number_literal, string_literal, ws};
use crate::schema::{Value, NONE_OPTION};
use crate::session::Command;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{map, peek, recognize, value},
    sequence::terminated,
    IResult,
};

/// Parse a component selection
/// Format: select(BarChart) or select("Bar Chart")
pub fn parse_select(input: &str) -> IResult<&str, Command> {
    let (input, _) = ws(tag("select"))(input)?;
    let (input, _) = ws(char('('))(input)?;
    let (input, name) = ws(alt((string_literal, identifier)))(input)?;
    let (input, _) = ws(char(')'))(input)?;
    Ok((input, Command::SelectComponent(name)))
}

/// Parse a value assignment
/// Format: set(key: value) where value is a number, "string", word or none
pub fn parse_set(input: &str) -> IResult<&str, Command> {
    let (input, _) = ws(tag("set"))(input)?;
    let (input, _) = ws(char('('))(input)?;
    let (input, key) = ws(identifier)(input)?;
    let (input, _) = ws(char(':'))(input)?;
    let (input, value) = ws(parse_value)(input)?;
    let (input, _) = ws(char(')'))(input)?;
    Ok((input, Command::SetValue { key, value }))
}

/// Parse a submit
/// Format: submit()
pub fn parse_submit(input: &str) -> IResult<&str, Command> {
    let (input, _) = ws(tag("submit"))(input)?;
    let (input, _) = ws(char('('))(input)?;
    let (input, _) = ws(char(')'))(input)?;
    Ok((input, Command::Submit))
}

pub fn parse_command(input: &str) -> IResult<&str, Command> {
    alt((parse_select, parse_set, parse_submit))(input)
}

fn closes(input: &str) -> IResult<&str, char> {
    peek(ws(char(')')))(input)
}

// A numeric lexeme that does not print back the same way (`007`, `2019.50`)
// stays text so it can still name a column. Number inputs parse it later.
fn number_or_text(raw: &str) -> Option<Value> {
    match raw.parse::<f64>() {
        Ok(n) if n.to_string() == raw => Some(Value::Number(n)),
        _ => Some(Value::Text(raw.to_string())),
    }
}

// Literals must be followed by the closing paren, so `1abc` or `none_col`
// fall through to the bare word branch.
fn parse_value(input: &str) -> IResult<&str, Option<Value>> {
    alt((
        value(None, terminated(tag("none"), closes)),
        map(terminated(recognize(number_literal), closes), number_or_text),
        map(string_literal, |s| {
            if s == NONE_OPTION {
                None
            } else {
                Some(Value::Text(s))
            }
        }),
        map(bare_word, |s| Some(Value::Text(s))),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select() {
        let result = parse_select("select(BarChart)");
        assert_eq!(result, Ok(("", Command::SelectComponent("BarChart".to_string()))));
        let result = parse_select("select( \"Tree Heatmap\" )");
        assert_eq!(result, Ok(("", Command::SelectComponent("Tree Heatmap".to_string()))));
    }

    #[test]
    fn test_parse_set_values() {
        let set = |key: &str, value: Option<Value>| Command::SetValue { key: key.to_string(), value };

        assert_eq!(parse_set("set(x: region)"), Ok(("", set("x", Some(Value::from("region"))))));
        assert_eq!(parse_set("set(width: 640)"), Ok(("", set("width", Some(Value::Number(640.0))))));
        assert_eq!(parse_set("set(title: \"Q1 sales\")"), Ok(("", set("title", Some(Value::from("Q1 sales"))))));
        assert_eq!(parse_set("set(color: none)"), Ok(("", set("color", None))));
        assert_eq!(parse_set("set(color: \"(none)\")"), Ok(("", set("color", None))));
    }

    #[test]
    fn test_literal_prefix_falls_back_to_word() {
        let result = parse_set("set(x: none_col)").unwrap().1;
        assert_eq!(
            result,
            Command::SetValue { key: "x".to_string(), value: Some(Value::from("none_col")) }
        );
        let result = parse_set("set(x: 1abc)").unwrap().1;
        assert_eq!(
            result,
            Command::SetValue { key: "x".to_string(), value: Some(Value::from("1abc")) }
        );
    }

    #[test]
    fn test_numeric_lexeme_kept_when_not_canonical() {
        let value = |input: &str| match parse_set(input).unwrap().1 {
            Command::SetValue { value, .. } => value,
            other => panic!("expected SetValue, got {:?}", other),
        };
        assert_eq!(value("set(x: 007)"), Some(Value::from("007")));
        assert_eq!(value("set(x: 2019.50)"), Some(Value::from("2019.50")));
        assert_eq!(value("set(width: -2.5)"), Some(Value::Number(-2.5)));
        assert_eq!(value("set(width: 1e3)").and_then(|v| v.as_number()), Some(1000.0));
    }

    #[test]
    fn test_parse_submit() {
        assert_eq!(parse_submit("submit()"), Ok(("", Command::Submit)));
        assert!(parse_submit("submit").is_err());
    }

    #[test]
    fn test_parse_command_dispatch() {
        assert!(matches!(parse_command("select(A)"), Ok((_, Command::SelectComponent(_)))));
        assert!(matches!(parse_command("set(a: b)"), Ok((_, Command::SetValue { .. }))));
        assert!(matches!(parse_command("submit()"), Ok((_, Command::Submit))));
        assert!(parse_command("draw()").is_err());
    }
}
