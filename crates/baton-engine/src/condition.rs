//! Loop-termination condition evaluation.
//!
//! A deliberately closed comparison grammar: literals, context lookups
//! (dotted selectors and integer indexing), comparisons, and `&&`/`||`.
//! No arithmetic, no function calls, no truthiness. Anything unresolved
//! or mistyped is an error, never a silent `false`.

use serde_json::Value;

use baton_core::error::{BatonError, Result};

/// Evaluate a condition expression against the context tree.
///
/// The expression may be wrapped in `{{ }}` delimiters, which are
/// stripped before parsing.
pub fn eval_condition(expr: &str, data: &Value) -> Result<bool> {
    let mut trimmed = expr.trim();
    if trimmed.starts_with("{{") && trimmed.ends_with("}}") && trimmed.len() >= 4 {
        trimmed = trimmed[2..trimmed.len() - 2].trim();
    }
    if trimmed.is_empty() {
        return Err(BatonError::Condition("empty condition".into()));
    }

    let tokens = tokenize(trimmed)?;
    let mut parser = Parser { tokens, pos: 0 };
    let ast = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(BatonError::Condition(format!(
            "unexpected trailing input in condition: {}",
            trimmed
        )));
    }

    match eval(&ast, data)? {
        Value::Bool(b) => Ok(b),
        _ => Err(BatonError::Condition(
            "condition did not evaluate to bool".into(),
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '&' | '|' => {
                if chars.get(i + 1) == Some(&c) {
                    tokens.push(if c == '&' { Token::And } else { Token::Or });
                    i += 2;
                } else {
                    return Err(unexpected_char(c));
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Eq);
                    i += 2;
                } else {
                    return Err(unexpected_char(c));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    return Err(unexpected_char(c));
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '"' | '\'' => {
                let (literal, next) = read_string(&chars, i)?;
                tokens.push(Token::Str(literal));
                i = next;
            }
            _ if c.is_ascii_digit() || (c == '-' && next_is_digit(&chars, i)) => {
                let (token, next) = read_number(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => return Err(unexpected_char(c)),
        }
    }

    Ok(tokens)
}

fn unexpected_char(c: char) -> BatonError {
    BatonError::Condition(format!("unexpected character in condition: {:?}", c))
}

fn next_is_digit(chars: &[char], i: usize) -> bool {
    chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize)> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars.get(i + 1).ok_or_else(|| {
                    BatonError::Condition("unterminated string literal".into())
                })?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(BatonError::Condition("unterminated string literal".into()))
}

fn read_number(chars: &[char], start: usize) -> Result<(Token, usize)> {
    let mut i = start;
    if chars[i] == '-' {
        i += 1;
    }
    let mut is_float = false;
    while i < chars.len() {
        match chars[i] {
            c if c.is_ascii_digit() => i += 1,
            // a dot continues the number only when a digit follows,
            // so `nodes.0` style selectors never lex as floats
            '.' if !is_float && next_is_digit(chars, i) => {
                is_float = true;
                i += 1;
            }
            _ => break,
        }
    }
    let text: String = chars[start..i].iter().collect();
    if is_float {
        let value = text
            .parse::<f64>()
            .map_err(|e| BatonError::Condition(format!("bad float literal {}: {}", text, e)))?;
        Ok((Token::Float(value), i))
    } else {
        let value = text
            .parse::<i64>()
            .map_err(|e| BatonError::Condition(format!("bad integer literal {}: {}", text, e)))?;
        Ok((Token::Int(value), i))
    }
}

#[derive(Debug)]
enum Expr {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Select(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.bump();
            let right = self.parse_and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.bump();
            let right = self.parse_comparison()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_postfix()?;
        while let Some(op) = self.peek().and_then(comparison_op) {
            self.bump();
            let right = self.parse_postfix()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.bump();
                    match self.bump() {
                        Some(Token::Ident(name)) => {
                            expr = Expr::Select(Box::new(expr), name);
                        }
                        _ => {
                            return Err(BatonError::Condition(
                                "expected field name after '.'".into(),
                            ))
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.bump();
                    let index = self.parse_expr()?;
                    match self.bump() {
                        Some(Token::RBracket) => {
                            expr = Expr::Index(Box::new(expr), Box::new(index));
                        }
                        _ => return Err(BatonError::Condition("expected ']'".into())),
                    }
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.bump() {
            Some(Token::Int(v)) => Ok(Expr::Int(v)),
            Some(Token::Float(v)) => Ok(Expr::Float(v)),
            Some(Token::Str(v)) => Ok(Expr::Str(v)),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                _ => Ok(Expr::Ident(name)),
            },
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(BatonError::Condition("expected ')'".into())),
                }
            }
            Some(token) => Err(BatonError::Condition(format!(
                "unexpected token in condition: {:?}",
                token
            ))),
            None => Err(BatonError::Condition("unexpected end of condition".into())),
        }
    }
}

fn comparison_op(token: &Token) -> Option<BinOp> {
    match token {
        Token::Eq => Some(BinOp::Eq),
        Token::Ne => Some(BinOp::Ne),
        Token::Lt => Some(BinOp::Lt),
        Token::Le => Some(BinOp::Le),
        Token::Gt => Some(BinOp::Gt),
        Token::Ge => Some(BinOp::Ge),
        _ => None,
    }
}

fn eval(expr: &Expr, data: &Value) -> Result<Value> {
    match expr {
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Int(v) => Ok(Value::from(*v)),
        Expr::Float(v) => Ok(Value::from(*v)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Ident(name) => match data {
            Value::Object(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| BatonError::Condition(format!("unknown identifier: {}", name))),
            _ => Err(BatonError::Condition(format!(
                "unknown identifier: {}",
                name
            ))),
        },
        Expr::Select(base, key) => {
            let base = eval(base, data)?;
            match base {
                Value::Object(map) => map
                    .get(key)
                    .cloned()
                    .ok_or_else(|| BatonError::Condition(format!("missing key: {}", key))),
                other => Err(BatonError::Condition(format!(
                    "invalid selector on {}",
                    kind_name(&other)
                ))),
            }
        }
        Expr::Index(base, index) => {
            let base = eval(base, data)?;
            let index = eval(index, data)?;
            let idx = index
                .as_i64()
                .ok_or_else(|| BatonError::Condition("index must be an integer".into()))?;
            match base {
                Value::Array(items) => {
                    if idx < 0 || idx as usize >= items.len() {
                        return Err(BatonError::Condition(format!(
                            "index out of range: {}",
                            idx
                        )));
                    }
                    Ok(items[idx as usize].clone())
                }
                other => Err(BatonError::Condition(format!(
                    "invalid index on {}",
                    kind_name(&other)
                ))),
            }
        }
        Expr::Binary(op, left, right) => {
            let left = eval(left, data)?;
            let right = eval(right, data)?;
            eval_binary(*op, left, right)
        }
    }
}

fn eval_binary(op: BinOp, left: Value, right: Value) -> Result<Value> {
    match op {
        BinOp::And | BinOp::Or => match (left, right) {
            (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(if op == BinOp::And {
                l && r
            } else {
                l || r
            })),
            _ => Err(BatonError::Condition("logical ops require bools".into())),
        },
        _ => compare(op, &left, &right).map(Value::Bool),
    }
}

fn compare(op: BinOp, left: &Value, right: &Value) -> Result<bool> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            if let (Some(li), Some(ri)) = (l.as_i64(), r.as_i64()) {
                return Ok(ordering_matches(op, li.cmp(&ri)));
            }
            let lf = l
                .as_f64()
                .ok_or_else(|| BatonError::Condition("unsupported numeric value".into()))?;
            let rf = r
                .as_f64()
                .ok_or_else(|| BatonError::Condition("unsupported numeric value".into()))?;
            let ordering = lf.partial_cmp(&rf).ok_or_else(|| {
                BatonError::Condition("mismatched types for comparison".into())
            })?;
            Ok(ordering_matches(op, ordering))
        }
        (Value::String(l), Value::String(r)) => Ok(ordering_matches(op, l.cmp(r))),
        (Value::Bool(l), Value::Bool(r)) => match op {
            BinOp::Eq => Ok(l == r),
            BinOp::Ne => Ok(l != r),
            _ => Err(BatonError::Condition(
                "bool comparison supports only == and !=".into(),
            )),
        },
        _ => Err(BatonError::Condition(
            "mismatched types for comparison".into(),
        )),
    }
}

fn ordering_matches(op: BinOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinOp::Eq => ordering == Equal,
        BinOp::Ne => ordering != Equal,
        BinOp::Lt => ordering == Less,
        BinOp::Le => ordering != Greater,
        BinOp::Gt => ordering == Greater,
        BinOp::Ge => ordering != Less,
        BinOp::And | BinOp::Or => false,
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean_literals_and_logic() {
        let data = json!({});
        assert!(!eval_condition("true && false", &data).unwrap());
        assert!(eval_condition("true || false", &data).unwrap());
        assert!(eval_condition("(true || false) && true", &data).unwrap());
    }

    #[test]
    fn test_dotted_selector_comparison() {
        let data = json!({"a": {"b": {"c": 0}}});
        assert!(eval_condition("a.b.c == 0", &data).unwrap());
        assert!(!eval_condition("a.b.c != 0", &data).unwrap());
        assert!(eval_condition("a.b.c < 1", &data).unwrap());
    }

    #[test]
    fn test_delimiters_stripped() {
        let data = json!({"outputs": {"check": "ok"}});
        assert!(eval_condition(r#"{{ outputs.check == "ok" }}"#, &data).unwrap());
    }

    #[test]
    fn test_string_comparison() {
        let data = json!({"last": "done"});
        assert!(eval_condition(r#"last == "done""#, &data).unwrap());
        assert!(eval_condition(r#"last != 'pending'"#, &data).unwrap());
        assert!(eval_condition(r#""abc" < "abd""#, &data).unwrap());
    }

    #[test]
    fn test_numeric_coercion() {
        let data = json!({"score": 1.5});
        assert!(eval_condition("score > 1", &data).unwrap());
        assert!(eval_condition("score <= 1.5", &data).unwrap());
        assert!(eval_condition("2 >= 2", &data).unwrap());
    }

    #[test]
    fn test_sequence_indexing() {
        let data = json!({"nodes": [{"exit": 0}, {"exit": 1}]});
        assert!(eval_condition("nodes[1].exit == 1", &data).unwrap());
        assert!(eval_condition("nodes[0].exit == 0", &data).unwrap());
        assert!(eval_condition("nodes[2].exit == 0", &data).is_err());
    }

    #[test]
    fn test_mismatched_types_fail() {
        let data = json!({"m": {"k": 1}, "s": "text"});
        // mapping vs string must fail, not silently return false
        assert!(eval_condition(r#"m == "text""#, &data).is_err());
        assert!(eval_condition(r#"s == 1"#, &data).is_err());
    }

    #[test]
    fn test_logical_requires_bools() {
        let data = json!({"n": 1});
        assert!(eval_condition("n && true", &data).is_err());
    }

    #[test]
    fn test_unresolved_lookups_fail() {
        let data = json!({"a": {"b": 1}});
        assert!(eval_condition("missing == 1", &data).is_err());
        assert!(eval_condition("a.nope == 1", &data).is_err());
        assert!(eval_condition("a.b.deeper == 1", &data).is_err());
    }

    #[test]
    fn test_non_boolean_result_fails() {
        let data = json!({"n": 5});
        assert!(eval_condition("n", &data).is_err());
        assert!(eval_condition("\"text\"", &data).is_err());
    }

    #[test]
    fn test_empty_condition_fails() {
        assert!(eval_condition("", &json!({})).is_err());
        assert!(eval_condition("{{ }}", &json!({})).is_err());
        assert!(eval_condition("   ", &json!({})).is_err());
    }

    #[test]
    fn test_trailing_tokens_fail() {
        assert!(eval_condition("true true", &json!({})).is_err());
    }

    #[test]
    fn test_no_arithmetic_or_calls() {
        let data = json!({"n": 1});
        assert!(eval_condition("n + 1 == 2", &data).is_err());
        assert!(eval_condition("len(n) == 1", &data).is_err());
    }

    #[test]
    fn test_bool_ordering_rejected() {
        assert!(eval_condition("true < false", &json!({})).is_err());
        assert!(eval_condition("true == true", &json!({})).unwrap());
    }

    #[test]
    fn test_negative_integer_literal() {
        let data = json!({"n": -3});
        assert!(eval_condition("n == -3", &data).unwrap());
    }
}
