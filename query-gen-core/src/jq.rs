//! A small jq dialect: enough to build, validate and evaluate the extraction
//! expressions written to `event_query.yml`.
//!
//! Supported grammar (precedence low to high):
//!
//! ```text
//! pipeline := alt ('|' alt)*
//! alt      := cmp ('//' cmp)*
//! cmp      := term (('==' | '!=') term)?
//! term     := path | literal | 'empty' | 'select' '(' pipeline ')'
//!           | '{' (key ':' term) (',' key ':' term)* '}' | '(' pipeline ')'
//! path     := '.' | ('.' ident | '."str"' | '[]' | '["str"]')+
//! ```
//!
//! Expressions from an external model are accepted only if they parse here.

use serde_json::Value;

use crate::error::JqError;

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Field(String),
    Iterate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// An empty path is the identity `.`.
    Path(Vec<Segment>),
    Literal(Value),
    Empty,
    Select(Box<Expr>),
    Object(Vec<(String, Expr)>),
    Compare(Box<Expr>, CmpOp, Box<Expr>),
    Alt(Box<Expr>, Box<Expr>),
    Pipe(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Whether the expression's final alternative is `// empty`.
    pub fn ends_in_empty(&self) -> bool {
        match self {
            Expr::Pipe(_, rhs) => rhs.ends_in_empty(),
            Expr::Alt(_, rhs) => matches!(**rhs, Expr::Empty),
            _ => false,
        }
    }

    /// Keys of every object construction in the expression, in source order.
    pub fn object_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys<'a>(&'a self, keys: &mut Vec<&'a str>) {
        match self {
            Expr::Path(_) | Expr::Literal(_) | Expr::Empty => {}
            Expr::Select(inner) => inner.collect_keys(keys),
            Expr::Object(entries) => {
                for (key, value) in entries {
                    keys.push(key.as_str());
                    value.collect_keys(keys);
                }
            }
            Expr::Compare(lhs, _, rhs) | Expr::Alt(lhs, rhs) | Expr::Pipe(lhs, rhs) => {
                lhs.collect_keys(keys);
                rhs.collect_keys(keys);
            }
        }
    }

    /// Evaluates the expression against one input, producing jq's output stream.
    pub fn eval(&self, input: &Value) -> Result<Vec<Value>, JqError> {
        match self {
            Expr::Path(segments) => eval_path(segments, input),
            Expr::Literal(v) => Ok(vec![v.clone()]),
            Expr::Empty => Ok(Vec::new()),
            Expr::Select(cond) => {
                let keep = cond.eval(input)?.iter().any(truthy);
                Ok(if keep { vec![input.clone()] } else { Vec::new() })
            }
            Expr::Object(entries) => {
                let mut outputs = vec![serde_json::Map::new()];
                for (key, value_expr) in entries {
                    let values = value_expr.eval(input)?;
                    let mut next = Vec::with_capacity(outputs.len() * values.len());
                    for partial in &outputs {
                        for v in &values {
                            let mut obj = partial.clone();
                            obj.insert(key.clone(), v.clone());
                            next.push(obj);
                        }
                    }
                    outputs = next;
                }
                Ok(outputs.into_iter().map(Value::Object).collect())
            }
            Expr::Compare(lhs, op, rhs) => {
                let left = lhs.eval(input)?;
                let right = rhs.eval(input)?;
                let mut out = Vec::new();
                for r in &right {
                    for l in &left {
                        let equal = l == r;
                        out.push(Value::Bool(match op {
                            CmpOp::Eq => equal,
                            CmpOp::Ne => !equal,
                        }));
                    }
                }
                Ok(out)
            }
            Expr::Alt(lhs, rhs) => {
                let kept: Vec<Value> = lhs
                    .eval(input)
                    .map(|vs| vs.into_iter().filter(truthy).collect())
                    .unwrap_or_default();
                if kept.is_empty() {
                    rhs.eval(input)
                } else {
                    Ok(kept)
                }
            }
            Expr::Pipe(lhs, rhs) => {
                let mut out = Vec::new();
                for v in lhs.eval(input)? {
                    out.extend(rhs.eval(&v)?);
                }
                Ok(out)
            }
        }
    }
}

fn truthy(v: &Value) -> bool {
    !matches!(v, Value::Null | Value::Bool(false))
}

fn eval_path(segments: &[Segment], input: &Value) -> Result<Vec<Value>, JqError> {
    let mut current = vec![input.clone()];
    for segment in segments {
        let mut next = Vec::new();
        for v in current {
            match (segment, v) {
                (Segment::Field(name), Value::Object(map)) => {
                    next.push(map.get(name).cloned().unwrap_or(Value::Null))
                }
                (Segment::Field(_), Value::Null) => next.push(Value::Null),
                (Segment::Field(name), other) => {
                    return Err(runtime_error(format!(
                        "cannot index {} with \"{name}\"",
                        type_name(&other)
                    )))
                }
                (Segment::Iterate, Value::Array(items)) => next.extend(items),
                (Segment::Iterate, Value::Object(map)) => next.extend(map.into_iter().map(|(_, v)| v)),
                (Segment::Iterate, other) => {
                    return Err(runtime_error(format!(
                        "cannot iterate over {}",
                        type_name(&other)
                    )))
                }
            }
        }
        current = next;
    }
    Ok(current)
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn runtime_error(message: String) -> JqError {
    JqError { offset: 0, message }
}

/// Parses an expression, rejecting anything outside the supported grammar.
pub fn parse(source: &str) -> Result<Expr, JqError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
    };
    let expr = parser.pipeline()?;
    if let Some((offset, tok)) = parser.tokens.get(parser.pos) {
        return Err(JqError {
            offset: *offset,
            message: format!("unexpected {tok:?} after expression"),
        });
    }
    Ok(expr)
}

/// Parses and evaluates in one step.
pub fn run(source: &str, input: &Value) -> Result<Vec<Value>, JqError> {
    parse(source)?.eval(input)
}

/// `.name`, or `."name"` when the name is not a bare identifier.
pub fn field_accessor(name: &str) -> String {
    if is_identifier(name) {
        format!(".{name}")
    } else {
        format!(".{}", quote(name))
    }
}

fn object_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        quote(name)
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

/// Iterates a list container: `.guests[] | {moid: .moid} // empty`.
pub fn list_accessor(container: &str, id_name: &str, field: &str) -> String {
    format!(
        "{}[] | {{{}: {}}} // empty",
        field_accessor(container),
        object_key(id_name),
        field_accessor(field)
    )
}

/// Accesses a dict container: `.instance | select(. != null) | {moid: .moid} // empty`.
pub fn dict_accessor(container: &str, id_name: &str, field: &str) -> String {
    format!(
        "{} | select(. != null) | {{{}: {}}} // empty",
        field_accessor(container),
        object_key(id_name),
        field_accessor(field)
    )
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Dot,
    Field(String),
    Ident(String),
    Str(String),
    Num(f64),
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Pipe,
    Alt,
    EqEq,
    NotEq,
    Colon,
    Comma,
}

fn lex(source: &str) -> Result<Vec<(usize, Tok)>, JqError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    let err = |offset: usize, message: &str| JqError {
        offset,
        message: message.to_string(),
    };

    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '.' => {
                i += 1;
                if i < bytes.len() && (bytes[i].is_ascii_alphabetic() || bytes[i] == b'_') {
                    let (ident, next) = read_ident(source, i);
                    tokens.push((start, Tok::Field(ident)));
                    i = next;
                } else if i < bytes.len() && bytes[i] == b'"' {
                    let (s, next) = read_string(source, i)?;
                    tokens.push((start, Tok::Field(s)));
                    i = next;
                } else {
                    tokens.push((start, Tok::Dot));
                }
                continue;
            }
            '"' => {
                let (s, next) = read_string(source, i)?;
                tokens.push((start, Tok::Str(s)));
                i = next;
                continue;
            }
            '[' => tokens.push((start, Tok::LBracket)),
            ']' => tokens.push((start, Tok::RBracket)),
            '{' => tokens.push((start, Tok::LBrace)),
            '}' => tokens.push((start, Tok::RBrace)),
            '(' => tokens.push((start, Tok::LParen)),
            ')' => tokens.push((start, Tok::RParen)),
            ':' => tokens.push((start, Tok::Colon)),
            ',' => tokens.push((start, Tok::Comma)),
            '|' => tokens.push((start, Tok::Pipe)),
            '/' if bytes.get(i + 1) == Some(&b'/') => {
                tokens.push((start, Tok::Alt));
                i += 2;
                continue;
            }
            '=' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push((start, Tok::EqEq));
                i += 2;
                continue;
            }
            '!' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push((start, Tok::NotEq));
                i += 2;
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let (ident, next) = read_ident(source, i);
                tokens.push((start, Tok::Ident(ident)));
                i = next;
                continue;
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut end = i + 1;
                while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
                    end += 1;
                }
                let n: f64 = source[i..end]
                    .parse()
                    .map_err(|_| err(start, "malformed number"))?;
                tokens.push((start, Tok::Num(n)));
                i = end;
                continue;
            }
            _ => return Err(err(start, &format!("unexpected character '{c}'"))),
        }
        i += 1;
    }
    Ok(tokens)
}

fn read_ident(source: &str, start: usize) -> (String, usize) {
    let end = source[start..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map_or(source.len(), |n| start + n);
    (source[start..end].to_string(), end)
}

fn read_string(source: &str, start: usize) -> Result<(String, usize), JqError> {
    let mut escaped = false;
    for (n, c) in source[start + 1..].char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => {
                let end = start + 1 + n + 1;
                let s: String = serde_json::from_str(&source[start..end]).map_err(|e| JqError {
                    offset: start,
                    message: format!("bad string literal: {e}"),
                })?;
                return Ok((s, end));
            }
            _ => escaped = false,
        }
    }
    Err(JqError {
        offset: start,
        message: "unterminated string".into(),
    })
}

struct Parser {
    tokens: Vec<(usize, Tok)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, JqError> {
        Err(JqError {
            offset: self.offset(),
            message: message.into(),
        })
    }

    fn expect(&mut self, tok: Tok) -> Result<(), JqError> {
        if self.peek() == Some(&tok) {
            self.pos += 1;
            Ok(())
        } else {
            self.error(format!("expected {tok:?}"))
        }
    }

    fn pipeline(&mut self) -> Result<Expr, JqError> {
        let mut expr = self.alt()?;
        while self.peek() == Some(&Tok::Pipe) {
            self.pos += 1;
            let rhs = self.alt()?;
            expr = Expr::Pipe(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn alt(&mut self) -> Result<Expr, JqError> {
        let mut expr = self.cmp()?;
        while self.peek() == Some(&Tok::Alt) {
            self.pos += 1;
            let rhs = self.cmp()?;
            expr = Expr::Alt(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn cmp(&mut self) -> Result<Expr, JqError> {
        let lhs = self.term()?;
        let op = match self.peek() {
            Some(Tok::EqEq) => CmpOp::Eq,
            Some(Tok::NotEq) => CmpOp::Ne,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.term()?;
        Ok(Expr::Compare(Box::new(lhs), op, Box::new(rhs)))
    }

    fn term(&mut self) -> Result<Expr, JqError> {
        match self.peek().cloned() {
            Some(Tok::Dot) | Some(Tok::Field(_)) => self.path(),
            Some(Tok::Str(s)) => {
                self.pos += 1;
                Ok(Expr::Literal(Value::String(s)))
            }
            Some(Tok::Num(n)) => {
                self.pos += 1;
                Ok(Expr::Literal(
                    serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
                ))
            }
            Some(Tok::Ident(word)) => {
                self.pos += 1;
                match word.as_str() {
                    "null" => Ok(Expr::Literal(Value::Null)),
                    "true" => Ok(Expr::Literal(Value::Bool(true))),
                    "false" => Ok(Expr::Literal(Value::Bool(false))),
                    "empty" => Ok(Expr::Empty),
                    "select" => {
                        self.expect(Tok::LParen)?;
                        let cond = self.pipeline()?;
                        self.expect(Tok::RParen)?;
                        Ok(Expr::Select(Box::new(cond)))
                    }
                    other => {
                        self.pos -= 1;
                        self.error(format!("unsupported function '{other}'"))
                    }
                }
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let inner = self.pipeline()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Some(Tok::LBrace) => self.object(),
            Some(other) => self.error(format!("unexpected {other:?}")),
            None => self.error("unexpected end of expression"),
        }
    }

    fn path(&mut self) -> Result<Expr, JqError> {
        let mut segments = Vec::new();
        if self.peek() == Some(&Tok::Dot) {
            self.pos += 1;
            // `.` alone, or `.[]` / `.["x"]`
        }
        loop {
            match self.peek().cloned() {
                Some(Tok::Field(name)) => {
                    self.pos += 1;
                    segments.push(Segment::Field(name));
                }
                Some(Tok::LBracket) => {
                    self.pos += 1;
                    match self.peek().cloned() {
                        Some(Tok::RBracket) => {
                            self.pos += 1;
                            segments.push(Segment::Iterate);
                        }
                        Some(Tok::Str(name)) => {
                            self.pos += 1;
                            self.expect(Tok::RBracket)?;
                            segments.push(Segment::Field(name));
                        }
                        _ => return self.error("expected ']' or string index"),
                    }
                }
                _ => break,
            }
        }
        Ok(Expr::Path(segments))
    }

    fn object(&mut self) -> Result<Expr, JqError> {
        self.expect(Tok::LBrace)?;
        let mut entries = Vec::new();
        loop {
            let key = match self.peek().cloned() {
                Some(Tok::Ident(k)) | Some(Tok::Str(k)) => {
                    self.pos += 1;
                    k
                }
                Some(Tok::RBrace) if entries.is_empty() => break,
                _ => return self.error("expected object key"),
            };
            self.expect(Tok::Colon)?;
            let value = self.term()?;
            entries.push((key, value));
            match self.peek() {
                Some(Tok::Comma) => self.pos += 1,
                _ => break,
            }
        }
        self.expect(Tok::RBrace)?;
        Ok(Expr::Object(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_accessor_extracts_every_element() {
        let expr = list_accessor("guests", "moid", "moid");
        assert_eq!(expr, ".guests[] | {moid: .moid} // empty");
        let out = run(&expr, &json!({"guests": [{"moid": "vm-1"}, {"moid": "vm-2"}]})).unwrap();
        assert_eq!(out, vec![json!({"moid": "vm-1"}), json!({"moid": "vm-2"})]);
    }

    #[test]
    fn dict_accessor_skips_null_container() {
        let expr = dict_accessor("instance", "bios_uuid", "hw_product_uuid");
        assert_eq!(
            expr,
            ".instance | select(. != null) | {bios_uuid: .hw_product_uuid} // empty"
        );
        let out = run(&expr, &json!({"instance": {"hw_product_uuid": "4221"}})).unwrap();
        assert_eq!(out, vec![json!({"bios_uuid": "4221"})]);
        assert!(run(&expr, &json!({"changed": true})).unwrap().is_empty());
    }

    #[test]
    fn quotes_non_identifier_names() {
        let expr = list_accessor("vm-list", "id", "resource-id");
        assert_eq!(expr, r#"."vm-list"[] | {id: ."resource-id"} // empty"#);
        let out = run(&expr, &json!({"vm-list": [{"resource-id": 7}]})).unwrap();
        assert_eq!(out, vec![json!({"id": 7})]);
    }

    #[test]
    fn object_keys_are_listed_in_source_order() {
        let expr = parse(&dict_accessor("host", "bios_uuid", "hw_product_uuid")).unwrap();
        assert_eq!(expr.object_keys(), ["bios_uuid"]);
        let expr = parse(".a[] | {id: .id, name: .name} // empty").unwrap();
        assert_eq!(expr.object_keys(), ["id", "name"]);
        assert!(parse(".a // empty").unwrap().object_keys().is_empty());
    }

    #[test]
    fn alternative_falls_through_to_rhs() {
        assert_eq!(run(".a // .b", &json!({"b": 2})).unwrap(), vec![json!(2)]);
        assert!(run(".a // empty", &json!({})).unwrap().is_empty());
        assert_eq!(run(".a // \"x\"", &json!({"a": false})).unwrap(), vec![json!("x")]);
    }

    #[test]
    fn iterating_null_is_an_error() {
        assert!(run(".guests[]", &json!({})).is_err());
        assert!(run(".guests[] // empty", &json!({})).unwrap().is_empty());
    }

    #[test]
    fn detects_trailing_empty() {
        assert!(parse(".a[] | {id: .id} // empty").unwrap().ends_in_empty());
        assert!(!parse(".a[] | {id: .id}").unwrap().ends_in_empty());
    }

    #[test]
    fn rejects_invalid_syntax() {
        for bad in [
            "",
            ".a |",
            ".a[",
            "{id .id}",
            ".a | map(.id)",
            "select(.a",
            ".a ] ",
            "{id: .a | .b}",
            "\"unterminated",
        ] {
            assert!(parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn parses_bracket_string_index() {
        assert_eq!(
            parse(r#".a["b c"]"#).unwrap(),
            Expr::Path(vec![Segment::Field("a".into()), Segment::Field("b c".into())])
        );
    }
}
