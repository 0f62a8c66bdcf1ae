//! Read/write filter model produced for enforcement.
//!
//! Rules carry their row filters as ECQL text; [`Filter::parse_ecql`] turns
//! them into this AST so area predicates can be merged in before the filter is
//! handed to the data layer. `Display` prints the filter back as ECQL.

mod cql;

use std::fmt;

use crate::geometry::Area;
use crate::Result;

/// Property name standing for the resource's default geometry.
pub const DEFAULT_GEOMETRY: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialOp {
    Intersects,
    Disjoint,
    Within,
    Contains,
    Crosses,
    Overlaps,
    Touches,
    Equals,
}

impl SpatialOp {
    fn keyword(self) -> &'static str {
        match self {
            Self::Intersects => "INTERSECTS",
            Self::Disjoint => "DISJOINT",
            Self::Within => "WITHIN",
            Self::Contains => "CONTAINS",
            Self::Crosses => "CROSSES",
            Self::Overlaps => "OVERLAPS",
            Self::Touches => "TOUCHES",
            Self::Equals => "EQUALS",
        }
    }

    fn from_keyword(word: &str) -> Option<Self> {
        let op = match word.to_ascii_uppercase().as_str() {
            "INTERSECTS" => Self::Intersects,
            "DISJOINT" => Self::Disjoint,
            "WITHIN" => Self::Within,
            "CONTAINS" => Self::Contains,
            "CROSSES" => Self::Crosses,
            "OVERLAPS" => Self::Overlaps,
            "TOUCHES" => Self::Touches,
            "EQUALS" => Self::Equals,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceOp {
    DWithin,
    Beyond,
}

impl DistanceOp {
    fn keyword(self) -> &'static str {
        match self {
            Self::DWithin => "DWITHIN",
            Self::Beyond => "BEYOND",
        }
    }

    fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "DWITHIN" => Some(Self::DWithin),
            "BEYOND" => Some(Self::Beyond),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalOp {
    Before,
    After,
    During,
    BeforeOrDuring,
    DuringOrAfter,
    TEquals,
}

impl TemporalOp {
    fn keyword(self) -> &'static str {
        match self {
            Self::Before => "BEFORE",
            Self::After => "AFTER",
            Self::During => "DURING",
            Self::BeforeOrDuring => "BEFORE OR DURING",
            Self::DuringOrAfter => "DURING OR AFTER",
            Self::TEquals => "TEQUALS",
        }
    }

    /// Whether the right-hand side must be a period rather than an instant.
    fn needs_period(self) -> bool {
        matches!(self, Self::During | Self::BeforeOrDuring | Self::DuringOrAfter)
    }
}

/// Right-hand side of a temporal predicate. Bounds are kept as written: an
/// ISO-8601 date-time or an ISO-8601 duration such as `P1D`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemporalValue {
    Instant(String),
    Period { start: String, end: String },
}

impl fmt::Display for TemporalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant(instant) => f.write_str(instant),
            Self::Period { start, end } => write!(f, "{start}/{end}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
    /// ISO-8601 date or date-time, unquoted in ECQL.
    DateTime(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Self::DateTime(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

/// Operand of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Property(String),
    Literal(Literal),
    Geometry(Area),
    Function {
        name: String,
        args: Vec<Expr>,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    #[must_use]
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    #[must_use]
    pub fn number(value: f64) -> Self {
        Self::Literal(Literal::Number(value))
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Literal(Literal::Text(value.into()))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property(name) => write_property(f, name),
            Self::Literal(literal) => write!(f, "{literal}"),
            Self::Geometry(area) => write!(f, "{area}"),
            Self::Function { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Self::Arithmetic { op, left, right } => {
                write_operand(f, left)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right)
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Arithmetic { .. } => write!(f, "({expr})"),
        _ => write!(f, "{expr}"),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Include,
    Exclude,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Compare {
        left: Expr,
        op: CompareOp,
        right: Expr,
    },
    Like {
        expr: Expr,
        pattern: String,
        case_insensitive: bool,
        negated: bool,
    },
    IsNull {
        expr: Expr,
        negated: bool,
    },
    Between {
        expr: Expr,
        lower: Expr,
        upper: Expr,
        negated: bool,
    },
    In {
        expr: Expr,
        values: Vec<Expr>,
        negated: bool,
    },
    Temporal {
        expr: Expr,
        op: TemporalOp,
        value: TemporalValue,
    },
    Spatial {
        op: SpatialOp,
        property: String,
        area: Area,
    },
    Distance {
        op: DistanceOp,
        property: String,
        area: Area,
        distance: f64,
        units: String,
    },
    BBox {
        property: String,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },
}

impl Filter {
    /// Parses ECQL text.
    pub fn parse_ecql(text: &str) -> Result<Self> {
        cql::parse(text)
    }

    /// `INTERSECTS(<default geometry>, area)`.
    #[must_use]
    pub fn intersects(area: Area) -> Self {
        Self::Spatial {
            op: SpatialOp::Intersects,
            property: DEFAULT_GEOMETRY.to_string(),
            area,
        }
    }

    /// Conjunction that keeps `INCLUDE`/`EXCLUDE` out of the tree.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Exclude, _) | (_, Self::Exclude) => Self::Exclude,
            (Self::Include, f) | (f, Self::Include) => f,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), f) => {
                left.push(f);
                Self::And(left)
            }
            (f, Self::And(mut right)) => {
                right.insert(0, f);
                Self::And(right)
            }
            (a, b) => Self::And(vec![a, b]),
        }
    }

    /// Disjunction that keeps `INCLUDE`/`EXCLUDE` out of the tree.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Include, _) | (_, Self::Include) => Self::Include,
            (Self::Exclude, f) | (f, Self::Exclude) => f,
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), f) => {
                left.push(f);
                Self::Or(left)
            }
            (a, b) => Self::Or(vec![a, b]),
        }
    }

    #[must_use]
    pub fn is_include(&self) -> bool {
        matches!(self, Self::Include)
    }

    #[must_use]
    pub fn is_exclude(&self) -> bool {
        matches!(self, Self::Exclude)
    }
}

fn write_property(f: &mut fmt::Formatter<'_>, property: &str) -> fmt::Result {
    let plain = !property.is_empty()
        && property
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.'))
        && !property.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        f.write_str(property)
    } else {
        write!(f, "\"{}\"", property.replace('"', "\"\""))
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Filter], sep: &str) -> fmt::Result {
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        match part {
            Filter::And(_) | Filter::Or(_) => write!(f, "({part})")?,
            _ => write!(f, "{part}")?,
        }
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Include => f.write_str("INCLUDE"),
            Self::Exclude => f.write_str("EXCLUDE"),
            Self::And(parts) => write_joined(f, parts, " AND "),
            Self::Or(parts) => write_joined(f, parts, " OR "),
            Self::Not(inner) => write!(f, "NOT ({inner})"),
            Self::Compare { left, op, right } => write!(f, "{left} {} {right}", op.symbol()),
            Self::Like {
                expr,
                pattern,
                case_insensitive,
                negated,
            } => {
                let not = if *negated { " NOT" } else { "" };
                let kw = if *case_insensitive { "ILIKE" } else { "LIKE" };
                write!(f, "{expr}{not} {kw} {}", Literal::Text(pattern.clone()))
            }
            Self::IsNull { expr, negated } => {
                let null = if *negated { "IS NOT NULL" } else { "IS NULL" };
                write!(f, "{expr} {null}")
            }
            Self::Between {
                expr,
                lower,
                upper,
                negated,
            } => {
                let not = if *negated { " NOT" } else { "" };
                write!(f, "{expr}{not} BETWEEN {lower} AND {upper}")
            }
            Self::In {
                expr,
                values,
                negated,
            } => {
                write!(f, "{expr}")?;
                f.write_str(if *negated { " NOT IN (" } else { " IN (" })?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str(")")
            }
            Self::Temporal { expr, op, value } => write!(f, "{expr} {} {value}", op.keyword()),
            Self::Spatial { op, property, area } => {
                write!(f, "{}(", op.keyword())?;
                write_property(f, property)?;
                write!(f, ", {area})")
            }
            Self::Distance {
                op,
                property,
                area,
                distance,
                units,
            } => {
                write!(f, "{}(", op.keyword())?;
                write_property(f, property)?;
                write!(f, ", {area}, {distance}, {units})")
            }
            Self::BBox {
                property,
                min_x,
                min_y,
                max_x,
                max_y,
            } => {
                f.write_str("BBOX(")?;
                write_property(f, property)?;
                write!(f, ", {min_x}, {min_y}, {max_x}, {max_y})")
            }
        }
    }
}
