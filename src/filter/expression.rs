//! Portable filter expression tree.

use std::fmt;

/// Comparison operators usable between a metadata key and a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// Membership in a list.
    In,
    /// Exclusion from a list.
    Nin,
}

impl ComparisonOp {
    /// Whether the operator expects a list operand.
    pub fn expects_list(self) -> bool {
        matches!(self, Self::In | Self::Nin)
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "in",
            Self::Nin => "nin",
        };
        f.write_str(symbol)
    }
}

/// Literal operand of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// String literal.
    Text(String),
    /// Integer literal.
    Integer(i64),
    /// Floating point literal.
    Float(f64),
    /// Boolean literal.
    Bool(bool),
    /// List literal, used by `in` / `nin`.
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Numeric view of the value, integers widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(
                f,
                "'{}'",
                text.replace('\\', "\\\\").replace('\'', "\\'")
            ),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value:?}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::List(values) => {
                f.write_str("[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Predicate over document metadata, independent of any backend syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `key <op> value`
    Comparison {
        /// Metadata key, possibly quoted or prefixed with `metadata.`.
        key: String,
        /// Operator.
        op: ComparisonOp,
        /// Right-hand operand.
        value: FilterValue,
    },
    /// Both operands hold.
    And(Box<Expression>, Box<Expression>),
    /// Either operand holds.
    Or(Box<Expression>, Box<Expression>),
    /// Operand does not hold.
    Not(Box<Expression>),
    /// Explicit parentheses, preserved so converters can emit them.
    Group(Box<Expression>),
}

impl Expression {
    /// Build a comparison node.
    pub fn compare(key: impl Into<String>, op: ComparisonOp, value: impl Into<FilterValue>) -> Self {
        Self::Comparison {
            key: key.into(),
            op,
            value: value.into(),
        }
    }

    /// `key == value`
    pub fn eq(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(key, ComparisonOp::Eq, value)
    }

    /// `key != value`
    pub fn ne(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(key, ComparisonOp::Ne, value)
    }

    /// `key > value`
    pub fn gt(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(key, ComparisonOp::Gt, value)
    }

    /// `key >= value`
    pub fn gte(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(key, ComparisonOp::Gte, value)
    }

    /// `key < value`
    pub fn lt(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(key, ComparisonOp::Lt, value)
    }

    /// `key <= value`
    pub fn lte(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(key, ComparisonOp::Lte, value)
    }

    /// `key in [values]`
    pub fn is_in<T: Into<FilterValue>>(key: impl Into<String>, values: Vec<T>) -> Self {
        Self::compare(key, ComparisonOp::In, values)
    }

    /// `key nin [values]`
    pub fn not_in<T: Into<FilterValue>>(key: impl Into<String>, values: Vec<T>) -> Self {
        Self::compare(key, ComparisonOp::Nin, values)
    }

    /// Conjunction with another expression.
    pub fn and(self, other: Expression) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Disjunction with another expression.
    pub fn or(self, other: Expression) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Negation of this expression.
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Wrap this expression in parentheses.
    pub fn group(self) -> Self {
        Self::Group(Box::new(self))
    }
}

/// Renders the text form accepted by [`crate::filter::parse`].
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comparison { key, op, value } if is_bare_key(key) => {
                write!(f, "{key} {op} {value}")
            }
            Self::Comparison { key, op, value } => {
                write!(f, "{} {op} {value}", FilterValue::Text(key.clone()))
            }
            Self::And(left, right) => {
                write_operand(f, left)?;
                f.write_str(" && ")?;
                write_operand(f, right)
            }
            Self::Or(left, right) => write!(f, "{left} || {right}"),
            Self::Not(inner) => match inner.as_ref() {
                Self::And(..) | Self::Or(..) => write!(f, "not ({inner})"),
                _ => write!(f, "not {inner}"),
            },
            Self::Group(inner) => write!(f, "({inner})"),
        }
    }
}

fn is_bare_key(key: &str) -> bool {
    let starts_well = key
        .chars()
        .next()
        .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_');
    let reserved = matches!(
        key.to_ascii_lowercase().as_str(),
        "and" | "or" | "not" | "in" | "nin" | "true" | "false"
    );
    starts_well
        && !reserved
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Expression) -> fmt::Result {
    match operand {
        Expression::Or(..) => write!(f, "({operand})"),
        _ => write!(f, "{operand}"),
    }
}
