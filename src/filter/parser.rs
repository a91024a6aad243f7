//! Parser for the text form of filter expressions.
//!
//! ```text
//! country == 'UK' && year >= 2020
//! genre in ['comedy', 'drama'] || not (rating < 3.5)
//! author NOT IN ["john", "jill"] AND active == true
//! ```
//!
//! Precedence from loosest to tightest: `||`/`OR`, `&&`/`AND`, `!`/`NOT`, comparison.

use super::FilterError;
use super::expression::{ComparisonOp, Expression, FilterValue};

/// Deepest nesting of `!`/`NOT` and parentheses accepted by [`parse`].
const MAX_NESTING_DEPTH: usize = 128;

/// Parse the text form of a filter expression.
pub fn parse(input: &str) -> Result<Expression, FilterError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        end: input.len(),
        depth: 0,
    };
    let expression = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expression),
        Some(token) => Err(syntax(token.offset, "unexpected trailing input")),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Op(ComparisonOp),
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn syntax(offset: usize, message: impl Into<String>) -> FilterError {
    FilterError::Syntax {
        offset,
        message: message.into(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, FilterError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut idx = 0;

    while idx < bytes.len() {
        let start = idx;
        let current = bytes[idx];
        let next = bytes.get(idx + 1).copied();

        let (kind, len) = match current {
            b if b.is_ascii_whitespace() => {
                idx += 1;
                continue;
            }
            b'(' => (TokenKind::LParen, 1),
            b')' => (TokenKind::RParen, 1),
            b'[' => (TokenKind::LBracket, 1),
            b']' => (TokenKind::RBracket, 1),
            b',' => (TokenKind::Comma, 1),
            b'=' if next == Some(b'=') => (TokenKind::Op(ComparisonOp::Eq), 2),
            b'!' if next == Some(b'=') => (TokenKind::Op(ComparisonOp::Ne), 2),
            b'!' => (TokenKind::Not, 1),
            b'>' if next == Some(b'=') => (TokenKind::Op(ComparisonOp::Gte), 2),
            b'>' => (TokenKind::Op(ComparisonOp::Gt), 1),
            b'<' if next == Some(b'=') => (TokenKind::Op(ComparisonOp::Lte), 2),
            b'<' => (TokenKind::Op(ComparisonOp::Lt), 1),
            b'&' if next == Some(b'&') => (TokenKind::And, 2),
            b'|' if next == Some(b'|') => (TokenKind::Or, 2),
            b'\'' | b'"' => {
                let (text, consumed) = read_string(input, start)?;
                (TokenKind::Str(text), consumed)
            }
            b'-' | b'0'..=b'9' => read_number(input, start)?,
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let len = input[start..]
                    .bytes()
                    .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
                    .count();
                (keyword_or_ident(&input[start..start + len]), len)
            }
            _ => return Err(syntax(start, "unexpected character")),
        };

        tokens.push(Token {
            kind,
            offset: start,
        });
        idx = start + len;
    }

    Ok(tokens)
}

fn keyword_or_ident(word: &str) -> TokenKind {
    match word.to_ascii_lowercase().as_str() {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "nin" => TokenKind::Op(ComparisonOp::Nin),
        "true" => TokenKind::Bool(true),
        "false" => TokenKind::Bool(false),
        _ => TokenKind::Ident(word.to_string()),
    }
}

/// Returns the unescaped string and the number of bytes consumed, quotes included.
fn read_string(input: &str, start: usize) -> Result<(String, usize), FilterError> {
    let mut chars = input[start..].char_indices();
    let (_, quote) = chars.next().ok_or_else(|| syntax(start, "expected string"))?;
    let mut text = String::new();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some((_, escaped)) => text.push(escaped),
                None => break,
            },
            c if c == quote => return Ok((text, pos + c.len_utf8())),
            c => text.push(c),
        }
    }

    Err(syntax(start, "unterminated string literal"))
}

fn read_number(input: &str, start: usize) -> Result<(TokenKind, usize), FilterError> {
    let rest = &input[start..];
    let len = rest
        .char_indices()
        .take_while(|(idx, ch)| {
            ch.is_ascii_digit() || *ch == '.' || (*idx == 0 && *ch == '-') || matches!(ch, 'e' | 'E')
        })
        .count();
    let literal = &rest[..len];

    if literal.contains(['.', 'e', 'E']) {
        literal
            .parse::<f64>()
            .map(|value| (TokenKind::Float(value), len))
            .map_err(|_| syntax(start, format!("invalid number '{literal}'")))
    } else {
        literal
            .parse::<i64>()
            .map(|value| (TokenKind::Int(value), len))
            .map_err(|_| syntax(start, format!("invalid number '{literal}'")))
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|token| &token.kind)
    }

    fn offset(&self) -> usize {
        self.peek().map(|token| token.offset).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), FilterError> {
        match self.advance() {
            Some(token) if token.kind == kind => Ok(()),
            Some(token) => Err(syntax(token.offset, format!("expected {what}"))),
            None => Err(syntax(self.end, format!("expected {what}"))),
        }
    }

    fn parse_or(&mut self) -> Result<Expression, FilterError> {
        let mut left = self.parse_and()?;
        while self.peek_kind() == Some(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = left.or(right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, FilterError> {
        let mut left = self.parse_unary()?;
        while self.peek_kind() == Some(&TokenKind::And) {
            self.advance();
            let right = self.parse_unary()?;
            left = left.and(right);
        }
        Ok(left)
    }

    fn descend(&mut self) -> Result<(), FilterError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(syntax(self.offset(), "expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_unary(&mut self) -> Result<Expression, FilterError> {
        if self.peek_kind() == Some(&TokenKind::Not) {
            self.descend()?;
            self.advance();
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(inner.negate());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, FilterError> {
        if self.peek_kind() == Some(&TokenKind::LParen) {
            self.descend()?;
            self.advance();
            let inner = self.parse_or()?;
            self.expect(TokenKind::RParen, "')'")?;
            self.depth -= 1;
            return Ok(inner.group());
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression, FilterError> {
        let offset = self.offset();
        let key = match self.advance().map(|token| token.kind) {
            Some(TokenKind::Ident(name)) | Some(TokenKind::Str(name)) => name,
            _ => return Err(syntax(offset, "expected metadata key")),
        };

        let offset = self.offset();
        let op = match self.advance().map(|token| token.kind) {
            Some(TokenKind::Op(op)) => op,
            Some(TokenKind::In) => ComparisonOp::In,
            Some(TokenKind::Not) if self.peek_kind() == Some(&TokenKind::In) => {
                self.advance();
                ComparisonOp::Nin
            }
            _ => return Err(syntax(offset, "expected comparison operator")),
        };

        let offset = self.offset();
        let value = if op.expects_list() {
            self.parse_list()?
        } else {
            self.parse_literal()?
        };

        if !op.expects_list() && matches!(value, FilterValue::List(_)) {
            return Err(syntax(offset, format!("operator '{op}' does not accept a list")));
        }

        Ok(Expression::Comparison { key, op, value })
    }

    fn parse_list(&mut self) -> Result<FilterValue, FilterError> {
        self.expect(TokenKind::LBracket, "'['")?;
        let mut values = Vec::new();
        if self.peek_kind() == Some(&TokenKind::RBracket) {
            self.advance();
            return Ok(FilterValue::List(values));
        }
        loop {
            values.push(self.parse_literal()?);
            match self.advance() {
                Some(Token {
                    kind: TokenKind::Comma,
                    ..
                }) => continue,
                Some(Token {
                    kind: TokenKind::RBracket,
                    ..
                }) => break,
                Some(token) => return Err(syntax(token.offset, "expected ',' or ']'")),
                None => return Err(syntax(self.end, "unterminated list")),
            }
        }
        Ok(FilterValue::List(values))
    }

    fn parse_literal(&mut self) -> Result<FilterValue, FilterError> {
        let offset = self.offset();
        match self.advance().map(|token| token.kind) {
            Some(TokenKind::Str(text)) => Ok(FilterValue::Text(text)),
            Some(TokenKind::Int(value)) => Ok(FilterValue::Integer(value)),
            Some(TokenKind::Float(value)) => Ok(FilterValue::Float(value)),
            Some(TokenKind::Bool(value)) => Ok(FilterValue::Bool(value)),
            _ => Err(syntax(offset, "expected literal value")),
        }
    }
}
