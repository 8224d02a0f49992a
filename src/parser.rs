//! Recursive-descent parser for the tree string grammar (spec §4.9):
//! `expr := op_name "(" expr ("," expr)? ")" | "var" uint | signed-decimal`.

use crate::error::ParseError;
use crate::node::{NodeId, Pool, Value};
use crate::op::Kind;

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    pool: &'a Pool,
}

impl<'a> Parser<'a> {
    fn new(pool: &'a Pool, input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            pool,
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.get(self.pos), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, expected: char, context: &'static str) -> Result<(), ParseError> {
        self.skip_ws();
        match self.chars.get(self.pos) {
            Some(&c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(&c) => Err(ParseError::Expected {
                expected: context,
                found: c.to_string(),
                position: self.pos,
            }),
            None => Err(ParseError::UnexpectedEnd { context }),
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while matches!(self.chars.get(self.pos), Some(&c) if pred(c)) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn parse_expr(&mut self) -> Result<NodeId, ParseError> {
        self.skip_ws();
        match self.peek() {
            None => Err(ParseError::UnexpectedEnd { context: "expression" }),
            Some(c) if c == '-' || c == '+' || c.is_ascii_digit() || c == '.' => {
                self.parse_number()
            }
            Some(c) if c.is_alphabetic() => {
                let start = self.pos;
                let ident = self.take_while(|c| c.is_alphanumeric() || c == '_');
                if ident == "var" {
                    self.parse_variable()
                } else {
                    self.parse_operator(ident, start)
                }
            }
            Some(c) => Err(ParseError::Expected {
                expected: "expression",
                found: c.to_string(),
                position: self.pos,
            }),
        }
    }

    fn parse_number(&mut self) -> Result<NodeId, ParseError> {
        let start = self.pos;
        let text = self.take_while(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
        let value: f64 = text.parse().map_err(|_| ParseError::MalformedNumber {
            substring: text.clone(),
            position: start,
        })?;
        self.pool
            .allocate_var(Kind::Constant, Value::of(value), None)
            .map_err(|_| ParseError::MalformedNumber {
                substring: text,
                position: start,
            })
    }

    fn parse_variable(&mut self) -> Result<NodeId, ParseError> {
        let start = self.pos;
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(ParseError::Expected {
                expected: "variable index",
                found: self.chars.get(self.pos).map(|c| c.to_string()).unwrap_or_default(),
                position: self.pos,
            });
        }
        let idx: u32 = digits.parse().map_err(|_| ParseError::MalformedNumber {
            substring: digits.clone(),
            position: start,
        })?;
        self.pool
            .allocate_var(Kind::Variable, Value::of(idx as f64), None)
            .map_err(|_| ParseError::MalformedNumber {
                substring: digits,
                position: start,
            })
    }

    fn parse_operator(&mut self, ident: String, ident_pos: usize) -> Result<NodeId, ParseError> {
        let kind = Kind::from_name(&ident).ok_or(ParseError::UnknownOperator {
            substring: ident,
            position: ident_pos,
        })?;
        self.expect('(', "(")?;
        let arity = kind.arity() as usize;
        let mut children = [None; 2];
        children[0] = Some(self.parse_expr()?);
        for slot in children.iter_mut().take(arity).skip(1) {
            self.expect(',', ",")?;
            *slot = Some(self.parse_expr()?);
        }
        self.expect(')', ")")?;
        self.pool
            .allocate_op(kind, children, None)
            .map_err(|_| ParseError::UnexpectedEnd {
                context: "operator allocation",
            })
    }
}

/// Parse `input` into a fresh tree inside `pool`. `op_name` must be a name
/// recognised by [`Kind::from_name`]; callers that need to further restrict
/// to a configured operator subset check membership themselves after a
/// successful parse, matching the fact that the grammar itself is agnostic
/// to which operators a given run has enabled.
pub fn parse(pool: &Pool, input: &str) -> Result<NodeId, ParseError> {
    let mut parser = Parser::new(pool, input);
    let root = parser.parse_expr()?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(ParseError::Expected {
            expected: "end of input",
            found: parser.chars[parser.pos..].iter().collect(),
            position: parser.pos,
        });
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ops;

    #[test]
    fn parses_a_variable() {
        let pool = Pool::new();
        let id = parse(&pool, "var2").unwrap();
        assert_eq!(pool.kind(id), Kind::Variable);
        assert_eq!(pool.value(id).scalar, 2.0);
    }

    #[test]
    fn parses_a_signed_decimal() {
        let pool = Pool::new();
        let id = parse(&pool, "-3.5").unwrap();
        assert_eq!(pool.kind(id), Kind::Constant);
        assert_eq!(pool.value(id).scalar, -3.5);
    }

    #[test]
    fn parses_nested_operators() {
        let pool = Pool::new();
        let id = parse(&pool, "add(mul(1, var0), sub(var0, var0))").unwrap();
        assert_eq!(pool.kind(id), Kind::Add);
    }

    #[test]
    fn round_trips_through_string_form() {
        let pool = Pool::new();
        let id = parse(&pool, "sin(var0)").unwrap();
        let text = ops::string(&pool, id, 4);
        let pool2 = Pool::new();
        let id2 = parse(&pool2, &text).unwrap();
        assert_eq!(ops::form(&pool, id), ops::form(&pool2, id2));
    }

    #[test]
    fn unknown_operator_is_an_error() {
        let pool = Pool::new();
        assert!(parse(&pool, "frobnicate(var0)").is_err());
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        let pool = Pool::new();
        assert!(parse(&pool, "var0 var1").is_err());
    }
}
