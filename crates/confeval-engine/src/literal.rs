//! Literal decoding of rendered template text
//!
//! Rendered templates are plain text. When that text spells out a literal
//! (a number, a quoted string, a boolean, null, or a container of these) it is
//! turned back into a structured value. Nothing is ever executed: anything
//! beyond literal syntax is rejected and the text is kept as-is.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use serde_json::{Map, Number, Value as JsonValue};
use thiserror::Error;

use crate::engine::Evaluated;

#[derive(Parser)]
#[grammar = "literal.pest"]
struct LiteralParser;

/// Literal decoding error
#[derive(Debug, Error)]
pub enum LiteralError {
    #[error("Parse error: {0}")]
    Pest(Box<pest::error::Error<Rule>>),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Invalid string: {0}")]
    InvalidString(String),

    #[error("Invalid mapping key: {0}")]
    InvalidKey(String),

    #[error("Unexpected rule: {0:?}")]
    UnexpectedRule(Rule),
}

impl From<pest::error::Error<Rule>> for LiteralError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        LiteralError::Pest(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, LiteralError>;

/// Decode rendered text, falling back to the raw text
pub fn decode(text: String) -> Evaluated {
    match parse_literal(&text) {
        Ok(value) => Evaluated::Literal(value),
        Err(err) => {
            tracing::debug!(error = %err, "rendered text is not a literal, keeping raw text");
            Evaluated::Raw(text)
        }
    }
}

/// Parse text that must consist of exactly one literal
pub fn parse_literal(text: &str) -> Result<JsonValue> {
    let literal = LiteralParser::parse(Rule::literal, text)?
        .next()
        .ok_or(LiteralError::UnexpectedRule(Rule::literal))?;

    convert(first_inner(literal)?)
}

fn first_inner(pair: Pair<Rule>) -> Result<Pair<Rule>> {
    let rule = pair.as_rule();
    pair.into_inner()
        .next()
        .ok_or(LiteralError::UnexpectedRule(rule))
}

fn convert(pair: Pair<Rule>) -> Result<JsonValue> {
    match pair.as_rule() {
        Rule::dict => {
            let mut map = Map::new();
            for entry in pair.into_inner() {
                let mut parts = entry.into_inner();
                let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                    return Err(LiteralError::UnexpectedRule(Rule::pair));
                };
                map.insert(mapping_key(convert(key)?)?, convert(value)?);
            }
            Ok(JsonValue::Object(map))
        }
        Rule::list | Rule::tuple => pair
            .into_inner()
            .map(convert)
            .collect::<Result<Vec<_>>>()
            .map(JsonValue::Array),
        Rule::group => convert(first_inner(pair)?),
        Rule::boolean_true => Ok(JsonValue::Bool(true)),
        Rule::boolean_false => Ok(JsonValue::Bool(false)),
        Rule::null => Ok(JsonValue::Null),
        Rule::number => parse_number(pair),
        Rule::string => parse_string(pair),
        other => Err(LiteralError::UnexpectedRule(other)),
    }
}

/// Mapping keys must be scalars; non-string scalars are stringified
fn mapping_key(key: JsonValue) -> Result<String> {
    match key {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        JsonValue::Null => Ok("null".to_string()),
        other => Err(LiteralError::InvalidKey(other.to_string())),
    }
}

fn parse_number(pair: Pair<Rule>) -> Result<JsonValue> {
    let text = pair.as_str();
    let mut negative = false;
    let mut body = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::sign => negative = inner.as_str() == "-",
            _ => body = Some(inner),
        }
    }

    let body = body.ok_or_else(|| LiteralError::InvalidNumber(text.to_string()))?;
    let digits: String = body.as_str().chars().filter(|c| *c != '_').collect();

    match body.as_rule() {
        Rule::dec_int => {
            if digits.len() > 1 && digits.starts_with('0') && digits.chars().any(|c| c != '0') {
                return Err(LiteralError::InvalidNumber(text.to_string()));
            }
            match digits.parse::<i128>() {
                Ok(n) => Ok(int_value(if negative { -n } else { n })),
                // Too large for any integer type, keep the magnitude as a float
                Err(_) => float_value(&digits, negative, text),
            }
        }
        Rule::hex_int => radix_int(&digits[2..], 16, negative, text),
        Rule::oct_int => radix_int(&digits[2..], 8, negative, text),
        Rule::bin_int => radix_int(&digits[2..], 2, negative, text),
        Rule::float => float_value(&digits, negative, text),
        other => Err(LiteralError::UnexpectedRule(other)),
    }
}

fn radix_int(digits: &str, radix: u32, negative: bool, text: &str) -> Result<JsonValue> {
    let n = i128::from_str_radix(digits, radix)
        .map_err(|_| LiteralError::InvalidNumber(text.to_string()))?;
    Ok(int_value(if negative { -n } else { n }))
}

fn int_value(n: i128) -> JsonValue {
    if let Ok(small) = i64::try_from(n) {
        JsonValue::Number(small.into())
    } else if let Ok(unsigned) = u64::try_from(n) {
        JsonValue::Number(unsigned.into())
    } else {
        Number::from_f64(n as f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

fn float_value(digits: &str, negative: bool, text: &str) -> Result<JsonValue> {
    let f: f64 = digits
        .parse()
        .map_err(|_| LiteralError::InvalidNumber(text.to_string()))?;
    let f = if negative { -f } else { f };

    Number::from_f64(f)
        .map(JsonValue::Number)
        .ok_or_else(|| LiteralError::InvalidNumber(text.to_string()))
}

fn parse_string(pair: Pair<Rule>) -> Result<JsonValue> {
    let mut raw = false;
    let mut body = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::raw_prefix => raw = true,
            Rule::dq_string | Rule::sq_string => body = Some(first_inner(inner)?),
            other => return Err(LiteralError::UnexpectedRule(other)),
        }
    }

    let body = body.ok_or(LiteralError::UnexpectedRule(Rule::string))?;
    if raw {
        Ok(JsonValue::String(body.as_str().to_string()))
    } else {
        unescape(body.as_str()).map(JsonValue::String)
    }
}

/// Resolve backslash escapes inside a quoted string
///
/// Unknown escapes keep their backslash. `\u{...}` is accepted alongside the
/// fixed-width `\uXXXX` form.
fn unescape(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some(escape) = chars.next() else {
            return Err(LiteralError::InvalidString(s.to_string()));
        };

        match escape {
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '\n' => {}
            '0'..='7' => {
                let mut code = escape.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char_from_code(code, s)?);
            }
            'x' => out.push(fixed_width_escape(&mut chars, 2, s)?),
            'U' => out.push(fixed_width_escape(&mut chars, 8, s)?),
            'u' if chars.peek() == Some(&'{') => {
                chars.next();
                let mut hex = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) if c.is_ascii_hexdigit() && hex.len() < 6 => hex.push(c),
                        _ => return Err(LiteralError::InvalidString(s.to_string())),
                    }
                }
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| LiteralError::InvalidString(s.to_string()))?;
                out.push(char_from_code(code, s)?);
            }
            'u' => out.push(fixed_width_escape(&mut chars, 4, s)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Ok(out)
}

fn fixed_width_escape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    width: usize,
    s: &str,
) -> Result<char> {
    let hex: String = chars.by_ref().take(width).collect();
    if hex.len() != width || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(LiteralError::InvalidString(s.to_string()));
    }
    let code =
        u32::from_str_radix(&hex, 16).map_err(|_| LiteralError::InvalidString(s.to_string()))?;
    char_from_code(code, s)
}

fn char_from_code(code: u32, s: &str) -> Result<char> {
    char::from_u32(code).ok_or_else(|| LiteralError::InvalidString(s.to_string()))
}
