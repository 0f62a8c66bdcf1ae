//! ECQL parser.
//!
//! Supported: `INCLUDE`, `EXCLUDE`, `AND`/`OR`/`NOT`, parentheses, binary
//! comparisons over expressions (properties, literals, function calls and
//! `+ - * /` arithmetic), `[NOT] LIKE`/`ILIKE`, `IS [NOT] NULL`,
//! `[NOT] BETWEEN`, `[NOT] IN (...)`, the temporal predicates (`BEFORE`,
//! `AFTER`, `DURING`, `BEFORE OR DURING`, `DURING OR AFTER`, `TEQUALS`), the
//! binary spatial predicates with an (E)WKT or `ENVELOPE` literal,
//! `DWITHIN`/`BEYOND` and `BBOX(prop, minx, miny, maxx, maxy)`.

use geo::{Geometry, Rect, coord};
use once_cell::sync::OnceCell;
use regex::Regex;

use super::{
    ArithmeticOp, CompareOp, DistanceOp, Expr, Filter, Literal, SpatialOp, TemporalOp,
    TemporalValue,
};
use crate::geometry::{Area, DEFAULT_SRID};
use crate::{AccessError, Result};

type ParseResult<T> = std::result::Result<T, String>;

const GEOMETRY_KEYWORDS: [&str; 9] = [
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
    "ENVELOPE",
    "SRID",
];

pub(super) fn parse(text: &str) -> Result<Filter> {
    let mut parser = Parser::new(text);
    let filter = parser
        .parse_filter()
        .and_then(|filter| match parser.next()? {
            Token::Eof => Ok(filter),
            other => Err(format!("unexpected trailing {other:?}")),
        })
        .map_err(|reason| AccessError::InvalidFilter {
            cql: text.to_string(),
            reason,
        })?;
    Ok(filter)
}

fn date_time_prefix(text: &str) -> ParseResult<Option<usize>> {
    static DATE_TIME: OnceCell<std::result::Result<Regex, String>> = OnceCell::new();
    let regex = DATE_TIME
        .get_or_init(|| {
            Regex::new(concat!(
                r"^\d{4}-\d{2}-\d{2}",
                r"(?:T\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}(?::?\d{2})?)?)?"
            ))
            .map_err(|err| err.to_string())
        })
        .as_ref()
        .map_err(Clone::clone)?;
    Ok(regex.find(text).map(|m| m.end()))
}

fn is_duration(word: &str) -> bool {
    let designator = |c: char| matches!(c, 'Y' | 'M' | 'W' | 'D' | 'T' | 'H' | 'S' | '.');
    word.len() > 1
        && word.starts_with('P')
        && word[1..].chars().all(|c| c.is_ascii_digit() || designator(c))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Quoted(String),
    Text(String),
    Number(f64),
    DateTime(String),
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Op(CompareOp),
    Eof,
}

impl Token {
    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Self::Ident(word) if word.eq_ignore_ascii_case(keyword))
    }
}

type Checkpoint = (usize, Option<(Token, usize)>);

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    peeked: Option<(Token, usize)>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            peeked: None,
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        (self.pos, self.peeked.clone())
    }

    fn restore(&mut self, (pos, peeked): Checkpoint) {
        self.pos = pos;
        self.peeked = peeked;
    }

    fn peek(&mut self) -> ParseResult<&Token> {
        if self.peeked.is_none() {
            let start = self.skip_whitespace();
            let token = self.lex()?;
            self.peeked = Some((token, start));
        }
        match &self.peeked {
            Some((token, _)) => Ok(token),
            None => Err("lexer state lost".to_string()),
        }
    }

    fn next(&mut self) -> ParseResult<Token> {
        self.peek()?;
        self.peeked
            .take()
            .map(|(token, _)| token)
            .ok_or_else(|| "lexer state lost".to_string())
    }

    fn expect(&mut self, expected: &Token) -> ParseResult<()> {
        let token = self.next()?;
        if &token == expected {
            Ok(())
        } else {
            Err(format!("expected {expected:?}, found {token:?}"))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> ParseResult<bool> {
        if self.peek()?.is_keyword(keyword) {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn skip_whitespace(&mut self) -> usize {
        let src = self.src;
        let rest = &src[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        self.pos
    }

    fn lex(&mut self) -> ParseResult<Token> {
        let src = self.src;
        let rest = &src[self.pos..];
        let Some(c) = rest.chars().next() else {
            return Ok(Token::Eof);
        };
        let single = |token: Token, parser: &mut Self| {
            parser.pos += 1;
            Ok(token)
        };
        match c {
            '(' => single(Token::LParen, self),
            ')' => single(Token::RParen, self),
            ',' => single(Token::Comma, self),
            '+' => single(Token::Plus, self),
            '-' => single(Token::Minus, self),
            '*' => single(Token::Star, self),
            '/' => single(Token::Slash, self),
            '=' => single(Token::Op(CompareOp::Eq), self),
            '<' => {
                let (op, len) = if rest.starts_with("<=") {
                    (CompareOp::Le, 2)
                } else if rest.starts_with("<>") {
                    (CompareOp::Ne, 2)
                } else {
                    (CompareOp::Lt, 1)
                };
                self.pos += len;
                Ok(Token::Op(op))
            }
            '>' => {
                let (op, len) = if rest.starts_with(">=") {
                    (CompareOp::Ge, 2)
                } else {
                    (CompareOp::Gt, 1)
                };
                self.pos += len;
                Ok(Token::Op(op))
            }
            '!' if rest.starts_with("!=") => {
                self.pos += 2;
                Ok(Token::Op(CompareOp::Ne))
            }
            '\'' => self.lex_delimited('\'').map(Token::Text),
            '"' => self.lex_delimited('"').map(Token::Quoted),
            c if c.is_ascii_digit() => match date_time_prefix(rest)? {
                Some(len) => {
                    self.pos += len;
                    Ok(Token::DateTime(rest[..len].to_string()))
                }
                None => self.lex_number(),
            },
            '.' => self.lex_number(),
            c if c.is_alphabetic() || c == '_' => {
                let len = rest
                    .find(|ch: char| !(ch.is_alphanumeric() || matches!(ch, '_' | ':' | '.')))
                    .unwrap_or(rest.len());
                self.pos += len;
                Ok(Token::Ident(rest[..len].to_string()))
            }
            other => Err(format!("unexpected character `{other}` at {}", self.pos)),
        }
    }

    /// Reads a `'...'` or `"..."` token where a doubled delimiter escapes itself.
    fn lex_delimited(&mut self, delimiter: char) -> ParseResult<String> {
        let start = self.pos;
        let mut out = String::new();
        let src = self.src;
        let mut chars = src[start + 1..].char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c == delimiter {
                if chars.peek().is_some_and(|(_, next)| *next == delimiter) {
                    out.push(delimiter);
                    chars.next();
                    continue;
                }
                self.pos = start + 1 + i + c.len_utf8();
                return Ok(out);
            }
            out.push(c);
        }
        Err(format!("unterminated literal starting at {start}"))
    }

    /// Unsigned decimal with optional exponent; signs are parsed as operators.
    fn lex_number(&mut self) -> ParseResult<Token> {
        let src = self.src;
        let rest = &src[self.pos..];
        let bytes = rest.as_bytes();
        let mut len = 0;
        while len < bytes.len() {
            let b = bytes[len];
            let exponent_sign =
                len > 0 && matches!(b, b'-' | b'+') && matches!(bytes[len - 1], b'e' | b'E');
            if b.is_ascii_digit() || b == b'.' || matches!(b, b'e' | b'E') || exponent_sign {
                len += 1;
            } else {
                break;
            }
        }
        let raw = &rest[..len];
        let value = raw
            .parse::<f64>()
            .map_err(|err| format!("bad number `{raw}`: {err}"))?;
        self.pos += len;
        Ok(Token::Number(value))
    }

    /// Whether the peeked identifier opens a geometry literal rather than
    /// naming a property, e.g. `POINT(1 2)` or `SRID=3857;...` but not `point = 3`.
    fn geometry_ahead(&mut self) -> ParseResult<bool> {
        self.peek()?;
        let Some((Token::Ident(word), start)) = &self.peeked else {
            return Ok(false);
        };
        let upper = word.to_ascii_uppercase();
        if !GEOMETRY_KEYWORDS.contains(&upper.as_str()) {
            return Ok(false);
        }
        let after = self.src[*start + word.len()..].trim_start();
        Ok(match upper.as_str() {
            "SRID" => after.starts_with('='),
            _ => {
                after.starts_with('(')
                    || after
                        .get(..5)
                        .is_some_and(|head| head.eq_ignore_ascii_case("EMPTY"))
            }
        })
    }

    /// Consumes a geometry literal (optionally `SRID=n;`-prefixed) starting at
    /// the peeked token, up to its balanced closing parenthesis.
    fn take_geometry(&mut self) -> ParseResult<Area> {
        if self.peek()?.is_keyword("ENVELOPE") {
            self.next()?;
            return self.parse_envelope();
        }
        let start = match &self.peeked {
            Some((Token::Ident(_), start)) => *start,
            Some((other, _)) => return Err(format!("expected geometry literal, found {other:?}")),
            None => return Err("lexer state lost".to_string()),
        };
        self.peeked = None;

        let src = self.src;
        let rest = &src[start..];
        let open = rest
            .find(['(', ',', ')'])
            .filter(|idx| rest.as_bytes()[*idx] == b'(');
        let end = match open {
            Some(open) => {
                let mut depth = 0usize;
                let mut close = None;
                for (i, c) in rest[open..].char_indices() {
                    match c {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                close = Some(open + i + 1);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                close.ok_or_else(|| "unbalanced parentheses in geometry literal".to_string())?
            }
            // `POINT EMPTY` and friends
            None => rest
                .find([')', ','])
                .ok_or_else(|| "unterminated geometry literal".to_string())?,
        };
        self.pos = start + end;
        Area::parse(rest[..end].trim()).map_err(|err| err.to_string())
    }

    /// `ENVELOPE(west, east, north, south)`, after the keyword.
    fn parse_envelope(&mut self) -> ParseResult<Area> {
        self.expect(&Token::LParen)?;
        let west = self.parse_number()?;
        self.expect(&Token::Comma)?;
        let east = self.parse_number()?;
        self.expect(&Token::Comma)?;
        let north = self.parse_number()?;
        self.expect(&Token::Comma)?;
        let south = self.parse_number()?;
        self.expect(&Token::RParen)?;
        let rect = Rect::new(coord! { x: west, y: south }, coord! { x: east, y: north });
        Ok(Area::new(Geometry::Polygon(rect.to_polygon()), DEFAULT_SRID))
    }

    fn parse_number(&mut self) -> ParseResult<f64> {
        let sign = match self.peek()? {
            Token::Minus => -1.0,
            _ => 1.0,
        };
        if matches!(self.peek()?, Token::Minus | Token::Plus) {
            self.next()?;
        }
        match self.next()? {
            Token::Number(n) => Ok(sign * n),
            other => Err(format!("expected number, found {other:?}")),
        }
    }

    fn parse_filter(&mut self) -> ParseResult<Filter> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR")? {
            let right = self.parse_and()?;
            left = match left {
                Filter::Or(mut parts) => {
                    parts.push(right);
                    Filter::Or(parts)
                }
                other => Filter::Or(vec![other, right]),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Filter> {
        let mut left = self.parse_unary()?;
        while self.eat_keyword("AND")? {
            let right = self.parse_unary()?;
            left = match left {
                Filter::And(mut parts) => {
                    parts.push(right);
                    Filter::And(parts)
                }
                other => Filter::And(vec![other, right]),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Filter> {
        if self.eat_keyword("NOT")? {
            let inner = self.parse_unary()?;
            return Ok(Filter::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Filter> {
        if self.peek()? == &Token::LParen {
            // `(a = 1 OR b = 2)` groups predicates, `(a + b) > 3` groups an expression
            let checkpoint = self.checkpoint();
            self.next()?;
            let grouped = self
                .parse_filter()
                .and_then(|inner| self.expect(&Token::RParen).map(|()| inner));
            if let Ok(inner) = grouped {
                return Ok(inner);
            }
            self.restore(checkpoint);
            let left = self.parse_expr()?;
            return self.parse_predicate(left);
        }

        if let Token::Ident(word) = self.peek()?.clone() {
            let upper = word.to_ascii_uppercase();
            if upper == "INCLUDE" || upper == "EXCLUDE" {
                self.next()?;
                return Ok(if upper == "INCLUDE" {
                    Filter::Include
                } else {
                    Filter::Exclude
                });
            }
            let checkpoint = self.checkpoint();
            self.next()?;
            if self.peek()? == &Token::LParen {
                if upper == "BBOX" {
                    return self.parse_bbox();
                }
                if let Some(op) = SpatialOp::from_keyword(&word) {
                    return self.parse_spatial(op);
                }
                if let Some(op) = DistanceOp::from_keyword(&word) {
                    return self.parse_distance(op);
                }
            }
            self.restore(checkpoint);
        }

        let left = self.parse_expr()?;
        self.parse_predicate(left)
    }

    fn parse_property(&mut self) -> ParseResult<String> {
        match self.next()? {
            Token::Ident(name) | Token::Quoted(name) => Ok(name),
            other => Err(format!("expected property name, found {other:?}")),
        }
    }

    fn parse_spatial(&mut self, op: SpatialOp) -> ParseResult<Filter> {
        self.expect(&Token::LParen)?;
        let property = self.parse_property()?;
        self.expect(&Token::Comma)?;
        let area = self.take_geometry()?;
        self.expect(&Token::RParen)?;
        Ok(Filter::Spatial { op, property, area })
    }

    /// `DWITHIN(prop, geometry, distance, units)`; units may span words, as
    /// in `statute miles`.
    fn parse_distance(&mut self, op: DistanceOp) -> ParseResult<Filter> {
        self.expect(&Token::LParen)?;
        let property = self.parse_property()?;
        self.expect(&Token::Comma)?;
        let area = self.take_geometry()?;
        self.expect(&Token::Comma)?;
        let distance = self.parse_number()?;
        self.expect(&Token::Comma)?;
        let mut words = Vec::new();
        loop {
            match self.next()? {
                Token::Ident(word) => words.push(word),
                Token::RParen if !words.is_empty() => break,
                other => return Err(format!("expected distance units, found {other:?}")),
            }
        }
        Ok(Filter::Distance {
            op,
            property,
            area,
            distance,
            units: words.join(" "),
        })
    }

    fn parse_bbox(&mut self) -> ParseResult<Filter> {
        self.expect(&Token::LParen)?;
        let property = self.parse_property()?;
        let mut coords = [0.0f64; 4];
        for slot in &mut coords {
            self.expect(&Token::Comma)?;
            *slot = self.parse_number()?;
        }
        // optional CRS argument, e.g. 'EPSG:4326'
        if self.peek()? == &Token::Comma {
            self.next()?;
            match self.next()? {
                Token::Text(_) => {}
                other => return Err(format!("expected bbox crs, found {other:?}")),
            }
        }
        self.expect(&Token::RParen)?;
        let [min_x, min_y, max_x, max_y] = coords;
        Ok(Filter::BBox {
            property,
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek()? {
                Token::Plus => ArithmeticOp::Add,
                Token::Minus => ArithmeticOp::Sub,
                _ => break,
            };
            self.next()?;
            let right = self.parse_term()?;
            left = Expr::Arithmetic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek()? {
                Token::Star => ArithmeticOp::Mul,
                Token::Slash => ArithmeticOp::Div,
                _ => break,
            };
            self.next()?;
            let right = self.parse_factor()?;
            left = Expr::Arithmetic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> ParseResult<Expr> {
        if self.geometry_ahead()? {
            return self.take_geometry().map(Expr::Geometry);
        }
        match self.next()? {
            Token::Minus => Ok(match self.parse_factor()? {
                Expr::Literal(Literal::Number(n)) => Expr::number(-n),
                other => Expr::Arithmetic {
                    op: ArithmeticOp::Mul,
                    left: Box::new(Expr::number(-1.0)),
                    right: Box::new(other),
                },
            }),
            Token::Plus => self.parse_factor(),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Number(n) => Ok(Expr::number(n)),
            Token::Text(s) => Ok(Expr::text(s)),
            Token::DateTime(s) => Ok(Expr::Literal(Literal::DateTime(s))),
            Token::Quoted(name) => Ok(Expr::Property(name)),
            Token::Ident(word) if word.eq_ignore_ascii_case("TRUE") => {
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            Token::Ident(word) if word.eq_ignore_ascii_case("FALSE") => {
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            Token::Ident(name) => {
                if self.peek()? != &Token::LParen {
                    return Ok(Expr::Property(name));
                }
                self.next()?;
                let mut args = Vec::new();
                if self.peek()? == &Token::RParen {
                    self.next()?;
                } else {
                    args.push(self.parse_expr()?);
                    while self.peek()? == &Token::Comma {
                        self.next()?;
                        args.push(self.parse_expr()?);
                    }
                    self.expect(&Token::RParen)?;
                }
                Ok(Expr::Function { name, args })
            }
            other => Err(format!("expected expression, found {other:?}")),
        }
    }

    fn parse_instant(&mut self) -> ParseResult<String> {
        match self.next()? {
            Token::DateTime(instant) => Ok(instant),
            Token::Ident(word) if is_duration(&word) => Ok(word),
            other => Err(format!("expected date-time or duration, found {other:?}")),
        }
    }

    fn parse_temporal_value(&mut self, op: TemporalOp) -> ParseResult<TemporalValue> {
        let start = self.parse_instant()?;
        if self.peek()? == &Token::Slash {
            self.next()?;
            let end = self.parse_instant()?;
            return Ok(TemporalValue::Period { start, end });
        }
        if op.needs_period() {
            return Err(format!("{} needs a period, found `{start}`", op.keyword()));
        }
        Ok(TemporalValue::Instant(start))
    }

    /// Tries `OR <second>` after a temporal keyword, leaving the input
    /// untouched when it belongs to an enclosing disjunction instead.
    fn eat_compound_temporal(&mut self, second: &str) -> ParseResult<bool> {
        let checkpoint = self.checkpoint();
        if self.eat_keyword("OR")? && self.eat_keyword(second)? {
            return Ok(true);
        }
        self.restore(checkpoint);
        Ok(false)
    }

    fn parse_predicate(&mut self, expr: Expr) -> ParseResult<Filter> {
        if let Token::Op(op) = self.peek()? {
            let op = *op;
            self.next()?;
            let right = self.parse_expr()?;
            return Ok(Filter::Compare {
                left: expr,
                op,
                right,
            });
        }

        if self.eat_keyword("IS")? {
            let negated = self.eat_keyword("NOT")?;
            if !self.eat_keyword("NULL")? {
                return Err("expected NULL after IS".to_string());
            }
            return Ok(Filter::IsNull { expr, negated });
        }

        let negated = self.eat_keyword("NOT")?;
        let keyword = match self.next()? {
            Token::Ident(word) => word.to_ascii_uppercase(),
            other => return Err(format!("expected operator after `{expr}`, found {other:?}")),
        };
        let temporal = match keyword.as_str() {
            "BEFORE" if self.eat_compound_temporal("DURING")? => Some(TemporalOp::BeforeOrDuring),
            "BEFORE" => Some(TemporalOp::Before),
            "DURING" if self.eat_compound_temporal("AFTER")? => Some(TemporalOp::DuringOrAfter),
            "DURING" => Some(TemporalOp::During),
            "AFTER" => Some(TemporalOp::After),
            "TEQUALS" => Some(TemporalOp::TEquals),
            _ => None,
        };
        if let Some(op) = temporal {
            if negated {
                return Err(format!("NOT cannot precede {}", op.keyword()));
            }
            let value = self.parse_temporal_value(op)?;
            return Ok(Filter::Temporal { expr, op, value });
        }

        match keyword.as_str() {
            "LIKE" | "ILIKE" => match self.next()? {
                Token::Text(pattern) => Ok(Filter::Like {
                    expr,
                    pattern,
                    case_insensitive: keyword == "ILIKE",
                    negated,
                }),
                other => Err(format!("expected LIKE pattern, found {other:?}")),
            },
            "BETWEEN" => {
                let lower = self.parse_expr()?;
                if !self.eat_keyword("AND")? {
                    return Err("expected AND in BETWEEN".to_string());
                }
                let upper = self.parse_expr()?;
                Ok(Filter::Between {
                    expr,
                    lower,
                    upper,
                    negated,
                })
            }
            "IN" => {
                self.expect(&Token::LParen)?;
                let mut values = vec![self.parse_expr()?];
                while self.peek()? == &Token::Comma {
                    self.next()?;
                    values.push(self.parse_expr()?);
                }
                self.expect(&Token::RParen)?;
                Ok(Filter::In {
                    expr,
                    values,
                    negated,
                })
            }
            other => Err(format!("unknown operator `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compare(left: Expr, op: CompareOp, right: Expr) -> Filter {
        Filter::Compare { left, op, right }
    }

    #[test]
    fn include_and_exclude() {
        assert_eq!(parse("INCLUDE").unwrap(), Filter::Include);
        assert_eq!(parse(" exclude ").unwrap(), Filter::Exclude);
    }

    #[test]
    fn comparison_with_string_escape() {
        let f = parse("name = 'O''Hara'").unwrap();
        assert_eq!(
            f,
            compare(Expr::property("name"), CompareOp::Eq, Expr::text("O'Hara"))
        );
    }

    #[test]
    fn negative_numbers_and_operators() {
        let f = parse("temp >= -3.5 AND depth <> 1e3").unwrap();
        match f {
            Filter::And(parts) => {
                assert_eq!(
                    parts[0],
                    compare(Expr::property("temp"), CompareOp::Ge, Expr::number(-3.5))
                );
                assert_eq!(
                    parts[1],
                    compare(Expr::property("depth"), CompareOp::Ne, Expr::number(1000.0))
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let f = parse("a = 1 OR b = 2 AND c = 3").unwrap();
        match f {
            Filter::Or(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[1], Filter::And(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn null_between_in_like() {
        assert!(matches!(
            parse("x IS NOT NULL").unwrap(),
            Filter::IsNull { negated: true, .. }
        ));
        assert!(matches!(
            parse("x NOT BETWEEN 1 AND 5").unwrap(),
            Filter::Between { negated: true, .. }
        ));
        match parse("state IN ('NY', 'CA')").unwrap() {
            Filter::In { values, negated, .. } => {
                assert!(!negated);
                assert_eq!(values.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            parse("name ILIKE 'ro%'").unwrap(),
            Filter::Like {
                case_insensitive: true,
                ..
            }
        ));
    }

    #[test]
    fn function_call_operand() {
        let f = parse("strToLowerCase(name) = 'x'").unwrap();
        assert_eq!(
            f,
            compare(
                Expr::Function {
                    name: "strToLowerCase".into(),
                    args: vec![Expr::property("name")],
                },
                CompareOp::Eq,
                Expr::text("x"),
            )
        );
        assert_eq!(f.to_string(), "strToLowerCase(name) = 'x'");

        let nested = parse("strLength(strTrim(name)) > 3 AND now() IS NOT NULL").unwrap();
        assert!(matches!(nested, Filter::And(ref parts) if parts.len() == 2));
    }

    #[test]
    fn arithmetic_precedence() {
        let f = parse("population / area > 100").unwrap();
        assert_eq!(
            f,
            compare(
                Expr::Arithmetic {
                    op: ArithmeticOp::Div,
                    left: Box::new(Expr::property("population")),
                    right: Box::new(Expr::property("area")),
                },
                CompareOp::Gt,
                Expr::number(100.0),
            )
        );

        let Filter::Compare { left, .. } = parse("a + b * 2 - 1 < 10").unwrap() else {
            panic!("expected comparison");
        };
        // ((a + (b * 2)) - 1)
        let Expr::Arithmetic { op, left: sum, .. } = left else {
            panic!("expected arithmetic");
        };
        assert_eq!(op, ArithmeticOp::Sub);
        assert!(matches!(
            *sum,
            Expr::Arithmetic { op: ArithmeticOp::Add, ref right, .. }
                if matches!(**right, Expr::Arithmetic { op: ArithmeticOp::Mul, .. })
        ));
    }

    #[test]
    fn parenthesised_expression_versus_group() {
        let grouped = parse("(a = 1 OR b = 2) AND c = 3").unwrap();
        assert!(matches!(grouped, Filter::And(ref parts) if matches!(parts[0], Filter::Or(_))));

        let expr = parse("(a + b) * 2 >= 10").unwrap();
        assert_eq!(expr.to_string(), "(a + b) * 2 >= 10");
    }

    #[test]
    fn temporal_instants_and_periods() {
        assert_eq!(
            parse("dt AFTER 2006-11-30T01:30:00Z").unwrap(),
            Filter::Temporal {
                expr: Expr::property("dt"),
                op: TemporalOp::After,
                value: TemporalValue::Instant("2006-11-30T01:30:00Z".into()),
            }
        );
        assert!(matches!(
            parse("dt BEFORE 2006-11-30").unwrap(),
            Filter::Temporal { op: TemporalOp::Before, .. }
        ));

        let during = parse("dt DURING 2006-11-30T00:30:00Z/2006-11-30T01:30:00Z").unwrap();
        assert_eq!(
            during.to_string(),
            "dt DURING 2006-11-30T00:30:00Z/2006-11-30T01:30:00Z"
        );
        assert!(matches!(
            parse("dt DURING 2006-11-30T00:30:00Z/P1D").unwrap(),
            Filter::Temporal {
                value: TemporalValue::Period { ref end, .. },
                ..
            } if end == "P1D"
        ));
    }

    #[test]
    fn compound_temporal_operators() {
        assert!(matches!(
            parse("dt BEFORE OR DURING P1D/2006-11-30T01:30:00Z").unwrap(),
            Filter::Temporal { op: TemporalOp::BeforeOrDuring, .. }
        ));
        assert!(matches!(
            parse("dt DURING OR AFTER 2006-11-30T00:30:00Z/2006-11-30T01:30:00Z").unwrap(),
            Filter::Temporal { op: TemporalOp::DuringOrAfter, .. }
        ));
        // a plain OR after a temporal predicate still splits the disjunction
        assert!(matches!(
            parse("dt BEFORE 2006-11-30 OR x = 1").unwrap(),
            Filter::Or(ref parts) if parts.len() == 2
        ));
    }

    #[test]
    fn during_needs_a_period() {
        let err = parse("dt DURING 2006-11-30T01:30:00Z").unwrap_err();
        assert!(err.to_string().contains("period"), "{err}");
    }

    #[test]
    fn spatial_predicate_with_ewkt() {
        let f = parse("INTERSECTS(the_geom, SRID=3857;POLYGON((0 0, 10 0, 10 10, 0 0)))").unwrap();
        match f {
            Filter::Spatial { op, property, area } => {
                assert_eq!(op, SpatialOp::Intersects);
                assert_eq!(property, "the_geom");
                assert_eq!(area.srid(), 3857);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn spatial_predicate_with_envelope() {
        let filter = parse("INTERSECTS(the_geom, ENVELOPE(0,10,0,10))").unwrap();
        let Filter::Spatial { area, .. } = filter else {
            panic!("expected spatial filter");
        };
        let Geometry::Polygon(polygon) = area.geometry() else {
            panic!("expected a polygon");
        };
        let rect = geo::BoundingRect::bounding_rect(polygon).unwrap();
        assert_eq!(rect.min(), coord! { x: 0.0, y: 0.0 });
        assert_eq!(rect.max(), coord! { x: 10.0, y: 10.0 });
        assert_eq!(area.srid(), DEFAULT_SRID);
    }

    #[test]
    fn distance_predicates() {
        let f = parse("DWITHIN(the_geom, POINT(1 2), 10, kilometers)").unwrap();
        match &f {
            Filter::Distance {
                op,
                property,
                distance,
                units,
                ..
            } => {
                assert_eq!(*op, DistanceOp::DWithin);
                assert_eq!(property, "the_geom");
                assert_eq!(*distance, 10.0);
                assert_eq!(units, "kilometers");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(f.to_string().starts_with("DWITHIN(the_geom, SRID=4326;POINT"));

        assert!(matches!(
            parse("BEYOND(geom, POINT(0 0), 2.5, statute miles)").unwrap(),
            Filter::Distance { op: DistanceOp::Beyond, ref units, .. } if units == "statute miles"
        ));
    }

    #[test]
    fn geometry_operand_in_function() {
        let f = parse("distance(the_geom, POINT(1 2)) < 5").unwrap();
        let Filter::Compare {
            left: Expr::Function { args, .. },
            ..
        } = f
        else {
            panic!("expected a function comparison");
        };
        assert!(matches!(args[1], Expr::Geometry(_)));
    }

    #[test]
    fn spatial_predicate_combined() {
        let f = parse("WITHIN(geom, POINT(1 2)) AND type = 'road'").unwrap();
        assert!(matches!(f, Filter::And(ref parts) if parts.len() == 2));
    }

    #[test]
    fn bbox_with_crs() {
        let f = parse("BBOX(geom, -10, -5, 10, 5, 'EPSG:4326')").unwrap();
        assert_eq!(
            f,
            Filter::BBox {
                property: "geom".into(),
                min_x: -10.0,
                min_y: -5.0,
                max_x: 10.0,
                max_y: 5.0,
            }
        );
    }

    #[test]
    fn quoted_property_names() {
        let f = parse("\"my attr\" < 4").unwrap();
        assert!(matches!(f, Filter::Compare { left: Expr::Property(ref p), .. } if p == "my attr"));
    }

    #[test]
    fn keywords_as_property_names() {
        for (text, name) in [("contains = 'x'", "contains"), ("point > 3", "point")] {
            let f = parse(text).unwrap();
            assert!(
                matches!(f, Filter::Compare { left: Expr::Property(ref p), .. } if p == name),
                "{text}"
            );
        }
    }

    #[test]
    fn printed_filters_parse_back() {
        for text in [
            "strToUpperCase(name) LIKE 'RO%'",
            "population / area > 100 AND dt AFTER 2006-11-30T01:30:00Z",
            "NOT (x IN (1, -2, 3))",
        ] {
            let f = parse(text).unwrap();
            assert_eq!(parse(&f.to_string()).unwrap(), f, "{text}");
        }
    }

    #[test]
    fn malformed_filters_are_rejected() {
        for bad in [
            "",
            "a =",
            "a = 1 AND",
            "(a = 1",
            "a ~ 1",
            "'unterminated",
            "a = 1 b",
            "f(a, ) = 1",
            "dt AFTER tomorrow",
            "DWITHIN(geom, POINT(0 0), 10)",
            "INTERSECTS(geom, ENVELOPE(0, 1, 2))",
        ] {
            let err = parse(bad).unwrap_err();
            assert!(
                matches!(err, AccessError::InvalidFilter { .. }),
                "{bad} should fail"
            );
        }
    }
}
