//! Attribute filter expressions.
//!
//! A small subset of the SQL `WHERE` clause, enough to evaluate the
//! filters a caller installs on layers without an attribute table:
//!
//! ```text
//! expr      := and ( OR and )*
//! and       := not ( AND not )*
//! not       := NOT not | '(' expr ')' | predicate
//! predicate := operand ( cmp operand
//!                      | IS [NOT] NULL
//!                      | [NOT] IN '(' operand ( ',' operand )* ')'
//!                      | [NOT] LIKE operand )
//! cmp       := = | <> | != | < | <= | > | >=
//! operand   := identifier | "quoted identifier" | 'string' | number | NULL
//! ```
//!
//! Keywords and field names are case-insensitive. Comparisons involving a
//! NULL are unknown, and a record passes only when the whole expression is
//! true.

use std::cmp::Ordering;

use crate::errors::*;
use crate::store::db::{DbColumn, DbValue};
use crate::vector::{Defn, Feature, FieldValue};

/// A value an expression operates on.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
}

impl From<&FieldValue> for Value {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::IntegerValue(v) => Value::Number(f64::from(*v)),
            FieldValue::RealValue(v) => Value::Number(*v),
            FieldValue::StringValue(v) => Value::Text(v.clone()),
            FieldValue::DateTimeValue(v) => {
                Value::Text(v.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            FieldValue::TimeValue(v) => Value::Text(v.format("%H:%M:%S").to_string()),
        }
    }
}

impl From<&DbValue> for Value {
    fn from(value: &DbValue) -> Self {
        match value {
            DbValue::Null => Value::Null,
            DbValue::Int(v) => Value::Number(f64::from(*v)),
            DbValue::Double(v) => Value::Number(*v),
            DbValue::String(v) | DbValue::DateTime(v) => Value::Text(v.clone()),
        }
    }
}

/// Something with named values an expression can be evaluated against.
pub trait Record {
    /// Value of the named field, `None` when there is no such field.
    fn value(&self, name: &str) -> Option<Value>;
}

impl Record for Feature {
    fn value(&self, name: &str) -> Option<Value> {
        let idx = self.defn().field_index(name)?;
        let value = self.field_by_index(idx).ok()?;
        Some(value.map_or(Value::Null, Value::from))
    }
}

/// A fetched database row with the columns it was read with.
pub struct Row<'a> {
    pub columns: &'a [DbColumn],
    pub values: &'a [DbValue],
}

impl Record for Row<'_> {
    fn value(&self, name: &str) -> Option<Value> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))?;
        self.values.get(idx).map(Value::from)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Field(String),
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Operand, CmpOp, Operand),
    IsNull { operand: Operand, negated: bool },
    In {
        operand: Operand,
        list: Vec<Operand>,
        negated: bool,
    },
    Like {
        operand: Operand,
        pattern: Operand,
        negated: bool,
    },
    Between {
        operand: Operand,
        low: Operand,
        high: Operand,
        negated: bool,
    },
}

/// A parsed attribute filter.
///
/// ```
/// use gdal_grass::vector::AttributeQuery;
///
/// let query = AttributeQuery::parse("cat IN (3, 7) AND NOT name LIKE 'x%'").unwrap();
/// assert_eq!(query.field_names(), vec!["cat", "name"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeQuery {
    text: String,
    expr: Expr,
}

impl AttributeQuery {
    pub fn parse(text: &str) -> Result<Self> {
        let error = |msg: String| GrassError::InvalidAttributeFilter {
            expression: text.to_string(),
            msg,
        };
        let tokens = tokenize(text).map_err(error)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr().map_err(error)?;
        if let Some(token) = parser.peek() {
            return Err(error(format!("unexpected {token:?}")));
        }
        Ok(AttributeQuery {
            text: text.to_string(),
            expr,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Field names referenced by the expression, in order of appearance.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_fields(&self.expr, &mut names);
        names
    }

    /// Check that every referenced field exists in `defn`.
    pub fn validate(&self, defn: &Defn) -> Result<()> {
        match self
            .field_names()
            .into_iter()
            .find(|name| defn.field_index(name).is_none())
        {
            Some(name) => Err(GrassError::InvalidAttributeFilter {
                expression: self.text.clone(),
                msg: format!("no field '{name}' in layer '{}'", defn.name()),
            }),
            None => Ok(()),
        }
    }

    pub fn evaluate(&self, record: &dyn Record) -> bool {
        eval(&self.expr, record) == Some(true)
    }
}

fn push_field<'a>(operand: &'a Operand, names: &mut Vec<&'a str>) {
    if let Operand::Field(name) = operand {
        names.push(name.as_str());
    }
}

fn collect_fields<'a>(expr: &'a Expr, names: &mut Vec<&'a str>) {
    match expr {
        Expr::And(a, b) | Expr::Or(a, b) => {
            collect_fields(a, names);
            collect_fields(b, names);
        }
        Expr::Not(e) => collect_fields(e, names),
        Expr::Compare(a, _, b) => {
            push_field(a, names);
            push_field(b, names);
        }
        Expr::IsNull { operand, .. } => push_field(operand, names),
        Expr::In { operand, list, .. } => {
            push_field(operand, names);
            for item in list {
                push_field(item, names);
            }
        }
        Expr::Like {
            operand, pattern, ..
        } => {
            push_field(operand, names);
            push_field(pattern, names);
        }
        Expr::Between {
            operand, low, high, ..
        } => {
            push_field(operand, names);
            push_field(low, names);
            push_field(high, names);
        }
    }
}

fn resolve(operand: &Operand, record: &dyn Record) -> Value {
    match operand {
        Operand::Field(name) => record.value(name).unwrap_or(Value::Null),
        Operand::Literal(v) => v.clone(),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Text(y)) => x.partial_cmp(&y.trim().parse::<f64>().ok()?),
        (Value::Text(x), Value::Number(y)) => x.trim().parse::<f64>().ok()?.partial_cmp(y),
    }
}

fn eval(expr: &Expr, record: &dyn Record) -> Option<bool> {
    match expr {
        Expr::And(a, b) => match (eval(a, record), eval(b, record)) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        Expr::Or(a, b) => match (eval(a, record), eval(b, record)) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        Expr::Not(e) => eval(e, record).map(|b| !b),
        Expr::Compare(a, op, b) => {
            let ord = compare(&resolve(a, record), &resolve(b, record))?;
            Some(match op {
                CmpOp::Eq => ord == Ordering::Equal,
                CmpOp::Ne => ord != Ordering::Equal,
                CmpOp::Lt => ord == Ordering::Less,
                CmpOp::Le => ord != Ordering::Greater,
                CmpOp::Gt => ord == Ordering::Greater,
                CmpOp::Ge => ord != Ordering::Less,
            })
        }
        Expr::IsNull { operand, negated } => {
            Some((resolve(operand, record) == Value::Null) != *negated)
        }
        Expr::In {
            operand,
            list,
            negated,
        } => {
            let value = resolve(operand, record);
            if value == Value::Null {
                return None;
            }
            let mut unknown = false;
            for item in list {
                match compare(&value, &resolve(item, record)) {
                    Some(Ordering::Equal) => return Some(!negated),
                    Some(_) => {}
                    None => unknown = true,
                }
            }
            if unknown {
                None
            } else {
                Some(*negated)
            }
        }
        Expr::Like {
            operand,
            pattern,
            negated,
        } => {
            let text = match resolve(operand, record) {
                Value::Null => return None,
                Value::Number(n) => n.to_string(),
                Value::Text(t) => t,
            };
            let Value::Text(pattern) = resolve(pattern, record) else {
                return None;
            };
            Some(like(&text, &pattern) != *negated)
        }
        Expr::Between {
            operand,
            low,
            high,
            negated,
        } => {
            let value = resolve(operand, record);
            let above = compare(&value, &resolve(low, record)).map(|o| o != Ordering::Less);
            let below = compare(&value, &resolve(high, record)).map(|o| o != Ordering::Greater);
            let inside = match (above, below) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            };
            inside.map(|b| b != *negated)
        }
    }
}

/// Case-insensitive `LIKE` with `%` and `_` wildcards. `ILIKE` is the same.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    // matched[j]: pattern[..j] matches the text consumed so far
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    for j in 1..=pattern.len() {
        matched[j] = matched[j - 1] && pattern[j - 1] == '%';
    }
    for c in text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || matched[j],
                '_' => matched[j - 1],
                p => matched[j - 1] && p == c,
            };
        }
        matched = next;
    }
    matched[pattern.len()]
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Keyword(Keyword),
    Str(String),
    Number(f64),
    Op(CmpOp),
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    And,
    Or,
    Not,
    Is,
    Null,
    In,
    Like,
    ILike,
    Between,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word.to_ascii_uppercase().as_str() {
            "AND" => Keyword::And,
            "OR" => Keyword::Or,
            "NOT" => Keyword::Not,
            "IS" => Keyword::Is,
            "NULL" => Keyword::Null,
            "IN" => Keyword::In,
            "LIKE" => Keyword::Like,
            "ILIKE" => Keyword::ILike,
            "BETWEEN" => Keyword::Between,
            _ => return None,
        })
    }
}

fn tokenize(text: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Op(CmpOp::Eq));
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CmpOp::Ne));
                i += 2;
            }
            '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let (op, len) = match (c, next) {
                    ('<', Some('>')) => (CmpOp::Ne, 2),
                    ('<', Some('=')) => (CmpOp::Le, 2),
                    ('>', Some('=')) => (CmpOp::Ge, 2),
                    ('<', _) => (CmpOp::Lt, 1),
                    _ => (CmpOp::Gt, 1),
                };
                tokens.push(Token::Op(op));
                i += len;
            }
            '\'' | '"' => {
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(format!("unterminated quote at {i}")),
                        Some(&q) if q == c => {
                            if chars.get(i + 1) == Some(&c) {
                                s.push(c);
                                i += 2;
                            } else {
                                i += 1;
                                break;
                            }
                        }
                        Some(&other) => {
                            s.push(other);
                            i += 1;
                        }
                    }
                }
                tokens.push(if c == '\'' {
                    Token::Str(s)
                } else {
                    Token::Ident(s)
                });
            }
            c if c.is_ascii_digit() || c == '.' || (c == '-' && starts_number(&chars, i + 1)) => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || matches!(chars[i], 'e' | 'E')
                        || (matches!(chars[i], '+' | '-') && matches!(chars[i - 1], 'e' | 'E')))
                {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let n = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{literal}'"))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match Keyword::from_word(&word) {
                    Some(k) => Token::Keyword(k),
                    None => Token::Ident(word),
                });
            }
            other => return Err(format!("unexpected character '{other}' at {i}")),
        }
    }
    Ok(tokens)
}

fn starts_number(chars: &[char], i: usize) -> bool {
    chars.get(i).is_some_and(|c| c.is_ascii_digit() || *c == '.')
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type ParseResult<T> = std::result::Result<T, String>;

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> ParseResult<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| "unexpected end of expression".to_string())?;
        self.pos += 1;
        Ok(token)
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.peek() == Some(&Token::Keyword(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        let token = self.advance()?;
        if token == expected {
            Ok(())
        } else {
            Err(format!("expected {expected:?}, found {token:?}"))
        }
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.and()?;
        while self.eat_keyword(Keyword::Or) {
            lhs = Expr::Or(Box::new(lhs), Box::new(self.and()?));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.not()?;
        while self.eat_keyword(Keyword::And) {
            lhs = Expr::And(Box::new(lhs), Box::new(self.not()?));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> ParseResult<Expr> {
        if self.eat_keyword(Keyword::Not) {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let expr = self.expr()?;
            self.expect(Token::RParen)?;
            return Ok(expr);
        }
        self.predicate()
    }

    fn predicate(&mut self) -> ParseResult<Expr> {
        let operand = self.operand()?;
        match self.advance()? {
            Token::Op(op) => Ok(Expr::Compare(operand, op, self.operand()?)),
            Token::Keyword(Keyword::Is) => {
                let negated = self.eat_keyword(Keyword::Not);
                self.expect(Token::Keyword(Keyword::Null))?;
                Ok(Expr::IsNull { operand, negated })
            }
            Token::Keyword(Keyword::Not) => match self.advance()? {
                Token::Keyword(Keyword::In) => self.in_list(operand, true),
                Token::Keyword(Keyword::Like | Keyword::ILike) => Ok(Expr::Like {
                    operand,
                    pattern: self.operand()?,
                    negated: true,
                }),
                Token::Keyword(Keyword::Between) => self.between(operand, true),
                token => Err(format!(
                    "expected IN, LIKE or BETWEEN after NOT, found {token:?}"
                )),
            },
            Token::Keyword(Keyword::In) => self.in_list(operand, false),
            Token::Keyword(Keyword::Like | Keyword::ILike) => Ok(Expr::Like {
                operand,
                pattern: self.operand()?,
                negated: false,
            }),
            Token::Keyword(Keyword::Between) => self.between(operand, false),
            token => Err(format!("expected an operator, found {token:?}")),
        }
    }

    fn between(&mut self, operand: Operand, negated: bool) -> ParseResult<Expr> {
        let low = self.operand()?;
        self.expect(Token::Keyword(Keyword::And))?;
        let high = self.operand()?;
        Ok(Expr::Between {
            operand,
            low,
            high,
            negated,
        })
    }

    fn in_list(&mut self, operand: Operand, negated: bool) -> ParseResult<Expr> {
        self.expect(Token::LParen)?;
        let mut list = vec![self.operand()?];
        loop {
            match self.advance()? {
                Token::Comma => list.push(self.operand()?),
                Token::RParen => break,
                token => return Err(format!("expected ',' or ')', found {token:?}")),
            }
        }
        Ok(Expr::In {
            operand,
            list,
            negated,
        })
    }

    fn operand(&mut self) -> ParseResult<Operand> {
        match self.advance()? {
            Token::Ident(name) => Ok(Operand::Field(name)),
            Token::Str(s) => Ok(Operand::Literal(Value::Text(s))),
            Token::Number(n) => Ok(Operand::Literal(Value::Number(n))),
            Token::Keyword(Keyword::Null) => Ok(Operand::Literal(Value::Null)),
            token => Err(format!("expected a field or a value, found {token:?}")),
        }
    }
}
