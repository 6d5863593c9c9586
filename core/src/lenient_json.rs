//! Best-effort JSON reader.
//!
//! Upstream payloads occasionally arrive cut short. Instead of rejecting the whole
//! document, [`parse_lenient`] returns the deepest value it could build:
//!
//! - an unterminated object or array keeps every member parsed before the cut,
//! - an unterminated string keeps the characters read so far,
//! - a key without a value, a partial literal (`tru`), or a number that is not yet
//!   lexically valid (`-`, `1.`, `2e`) is dropped,
//! - a syntax error mid-document ends parsing with whatever was built up to it.
//!
//! Only input with no recoverable value at all is an error.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Nesting limit; deeper input is treated as a syntax break.
const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonError {
    #[error("empty JSON document")]
    Empty,
    #[error("JSON document ended before any value was recovered")]
    Truncated,
    #[error("unexpected character {found:?} at byte {offset}")]
    Unexpected { found: char, offset: usize },
}

/// Result of a best-effort parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub value: Value,
    /// `false` when the document was cut short or broken and `value` is a recovery.
    pub complete: bool,
}

pub fn parse_lenient(input: &str) -> Result<Parsed, JsonError> {
    let mut reader = Reader::new(input);
    reader.skip_whitespace();
    if reader.at_end() {
        return Err(JsonError::Empty);
    }

    match reader.value(0) {
        Scan::Done(value) => {
            reader.skip_whitespace();
            Ok(Parsed {
                value,
                complete: reader.at_end(),
            })
        }
        Scan::Partial(value) => Ok(Parsed {
            value,
            complete: false,
        }),
        Scan::Failed => Err(reader.failure()),
    }
}

enum Scan<T> {
    /// Fully parsed, terminator consumed.
    Done(T),
    /// Input ended or broke inside the value; parsing stops here.
    Partial(T),
    /// Nothing usable at this position.
    Failed,
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if matches!(ch, ' ' | '\t' | '\n' | '\r') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn failure(&self) -> JsonError {
        match self.peek() {
            Some(found) => JsonError::Unexpected {
                found,
                offset: self.pos,
            },
            None => JsonError::Truncated,
        }
    }

    fn value(&mut self, depth: usize) -> Scan<Value> {
        self.skip_whitespace();
        let Some(ch) = self.peek() else {
            return Scan::Failed;
        };

        match ch {
            '{' | '[' if depth >= MAX_DEPTH => Scan::Failed,
            '{' => self.object(depth + 1),
            '[' => self.array(depth + 1),
            '"' => match self.string() {
                Scan::Done(text) => Scan::Done(Value::String(text)),
                Scan::Partial(text) => Scan::Partial(Value::String(text)),
                Scan::Failed => Scan::Failed,
            },
            't' => self.literal("true", Value::Bool(true)),
            'f' => self.literal("false", Value::Bool(false)),
            'n' => self.literal("null", Value::Null),
            '-' | '0'..='9' => self.number(),
            _ => Scan::Failed,
        }
    }

    fn object(&mut self, depth: usize) -> Scan<Value> {
        self.pos += 1; // '{'
        let mut map = Map::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Scan::Partial(Value::Object(map)),
                Some('}') => {
                    self.pos += 1;
                    return Scan::Done(Value::Object(map));
                }
                Some('"') => {}
                Some(_) => return Scan::Partial(Value::Object(map)),
            }

            let Scan::Done(key) = self.string() else {
                return Scan::Partial(Value::Object(map));
            };

            self.skip_whitespace();
            if self.peek() != Some(':') {
                return Scan::Partial(Value::Object(map));
            }
            self.pos += 1;

            match self.value(depth) {
                Scan::Done(value) => {
                    map.insert(key, value);
                }
                Scan::Partial(value) => {
                    map.insert(key, value);
                    return Scan::Partial(Value::Object(map));
                }
                Scan::Failed => return Scan::Partial(Value::Object(map)),
            }

            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {
                    self.pos += 1;
                    return Scan::Done(Value::Object(map));
                }
                _ => return Scan::Partial(Value::Object(map)),
            }
        }
    }

    fn array(&mut self, depth: usize) -> Scan<Value> {
        self.pos += 1; // '['
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Scan::Partial(Value::Array(items)),
                Some(']') => {
                    self.pos += 1;
                    return Scan::Done(Value::Array(items));
                }
                Some(_) => {}
            }

            match self.value(depth) {
                Scan::Done(value) => items.push(value),
                Scan::Partial(value) => {
                    items.push(value);
                    return Scan::Partial(Value::Array(items));
                }
                Scan::Failed => return Scan::Partial(Value::Array(items)),
            }

            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {
                    self.pos += 1;
                    return Scan::Done(Value::Array(items));
                }
                _ => return Scan::Partial(Value::Array(items)),
            }
        }
    }

    fn string(&mut self) -> Scan<String> {
        self.pos += 1; // opening quote
        let mut out = String::new();

        loop {
            let Some(ch) = self.bump() else {
                return Scan::Partial(out);
            };
            match ch {
                '"' => return Scan::Done(out),
                '\\' => {
                    let Some(escape) = self.bump() else {
                        return Scan::Partial(out);
                    };
                    match escape {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'u' => match self.unicode_escape() {
                            Some(decoded) => out.push(decoded),
                            None => return Scan::Partial(out),
                        },
                        // '"', '\\', '/' and anything unknown stand for themselves.
                        other => out.push(other),
                    }
                }
                other => out.push(other),
            }
        }
    }

    /// Decode the digits after `\u`, pairing surrogates when possible.
    ///
    /// Returns `None` when the input ends (or breaks) inside the escape.
    fn unicode_escape(&mut self) -> Option<char> {
        let first = self.hex4()?;
        if !(0xD800..=0xDBFF).contains(&first) {
            return Some(char::from_u32(first).unwrap_or(char::REPLACEMENT_CHARACTER));
        }

        let rest = &self.src[self.pos..];
        if rest.is_empty() || rest == "\\" {
            // Low half may still be on its way.
            return None;
        }
        if !rest.starts_with("\\u") {
            return Some(char::REPLACEMENT_CHARACTER);
        }
        let digits = &rest[2..];
        if digits.len() < 4 && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let checkpoint = self.pos;
        self.pos += 2;
        match self.hex4() {
            Some(second) if (0xDC00..=0xDFFF).contains(&second) => {
                let combined = 0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00);
                Some(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER))
            }
            _ => {
                self.pos = checkpoint;
                Some(char::REPLACEMENT_CHARACTER)
            }
        }
    }

    fn hex4(&mut self) -> Option<u32> {
        let digits = self.src.get(self.pos..self.pos + 4)?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let code = u32::from_str_radix(digits, 16).ok()?;
        self.pos += 4;
        Some(code)
    }

    fn literal(&mut self, word: &str, value: Value) -> Scan<Value> {
        if self.src[self.pos..].starts_with(word) {
            self.pos += word.len();
            Scan::Done(value)
        } else {
            Scan::Failed
        }
    }

    fn number(&mut self) -> Scan<Value> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.' | 'e' | 'E') {
                self.pos += 1;
            } else {
                break;
            }
        }

        match self.src[start..self.pos].parse::<Number>() {
            Ok(number) => Scan::Done(Value::Number(number)),
            Err(_) => {
                self.pos = start;
                Scan::Failed
            }
        }
    }
}
