//! Command-line value syntax
//!
//! Arguments are integers (`42`, `-7`, arbitrarily large), bracketed lists of
//! values (`[1, -2, [3]]`) or double-quoted text (`"x"`).

use anyhow::{bail, Result};
use num_bigint::BigInt;
use paribridge_runtime::ffi::marshal::MAX_NESTING;
use paribridge_runtime::Value;

/// Parse one command-line argument into a host value
pub fn parse_value(input: &str) -> Result<Value> {
    let mut parser = ValueParser {
        input,
        bytes: input.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_whitespace();
    if parser.pos != parser.bytes.len() {
        bail!(
            "unexpected '{}' at offset {} in '{}'",
            &input[parser.pos..],
            parser.pos,
            input
        );
    }
    Ok(value)
}

/// Parse every argument, reporting the first one that fails
pub fn parse_values(inputs: &[String]) -> Result<Vec<Value>> {
    inputs.iter().map(|arg| parse_value(arg)).collect()
}

struct ValueParser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl ValueParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<Value> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'[') => self.list(),
            Some(b'"') => self.text(),
            Some(b'-' | b'+' | b'0'..=b'9') => self.integer(),
            Some(_) => bail!(
                "expected an integer, list or string at offset {} in '{}'",
                self.pos,
                self.input
            ),
            None => bail!("expected a value in '{}'", self.input),
        }
    }

    fn list(&mut self) -> Result<Value> {
        if self.depth >= MAX_NESTING {
            bail!("lists nested deeper than {} levels in '{}'", MAX_NESTING, self.input);
        }
        self.depth += 1;
        let list = self.elements();
        self.depth -= 1;
        list
    }

    fn elements(&mut self) -> Result<Value> {
        self.pos += 1;
        let mut elements = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Value::sequence(elements));
        }
        loop {
            elements.push(self.value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::sequence(elements));
                }
                _ => bail!("unterminated list in '{}'", self.input),
            }
        }
    }

    fn text(&mut self) -> Result<Value> {
        let start = self.pos + 1;
        match self.input[start..].find('"') {
            Some(len) => {
                self.pos = start + len + 1;
                Ok(Value::text(&self.input[start..start + len]))
            }
            None => bail!("unterminated string in '{}'", self.input),
        }
    }

    fn integer(&mut self) -> Result<Value> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let literal = &self.input[start..self.pos];
        match literal.parse::<BigInt>() {
            Ok(n) => Ok(Value::Integer(n)),
            Err(_) => bail!("invalid integer '{}' in '{}'", literal, self.input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn ints(values: &[i64]) -> Value {
        Value::sequence(values.iter().map(|n| Value::integer(*n)).collect())
    }

    #[test]
    fn test_integers() {
        assert_eq!(parse_value("42").unwrap(), Value::integer(42));
        assert_eq!(parse_value(" -7 ").unwrap(), Value::integer(-7));
        assert_eq!(parse_value("+3").unwrap(), Value::integer(3));
        let big = "123456789012345678901234567890";
        assert_eq!(
            parse_value(big).unwrap(),
            Value::Integer(big.parse().unwrap())
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(parse_value("[]").unwrap(), ints(&[]));
        assert_eq!(parse_value("[1, -2,3]").unwrap(), ints(&[1, -2, 3]));
        assert_eq!(
            parse_value("[[1], [], 2]").unwrap(),
            Value::sequence(vec![ints(&[1]), ints(&[]), Value::integer(2)])
        );
    }

    #[test]
    fn test_text() {
        assert_eq!(parse_value("\"gmul\"").unwrap(), Value::text("gmul"));
    }

    #[rstest]
    #[case("")]
    #[case("-")]
    #[case("abc")]
    #[case("[1, 2")]
    #[case("[1 2]")]
    #[case("[1,]")]
    #[case("12x")]
    #[case("\"open")]
    fn test_rejects(#[case] input: &str) {
        assert!(parse_value(input).is_err(), "{:?} should not parse", input);
    }

    #[test]
    fn test_nesting_limit() {
        let at_limit = format!("{}1{}", "[".repeat(MAX_NESTING), "]".repeat(MAX_NESTING));
        assert!(parse_value(&at_limit).is_ok());

        let too_deep = format!("{}1{}", "[".repeat(MAX_NESTING + 1), "]".repeat(MAX_NESTING + 1));
        let err = parse_value(&too_deep).unwrap_err();
        assert!(err.to_string().contains("nested deeper"));
    }

    #[test]
    fn test_parse_values_stops_at_first_error() {
        let args = vec!["1".to_string(), "oops".to_string(), "2".to_string()];
        let err = parse_values(&args).unwrap_err();
        assert!(err.to_string().contains("oops"));
    }
}
