//! Portable filter DSL: expression tree, text parser, and the converter seam that translates
//! expressions into each backend's native query syntax.

mod converter;
mod evaluate;
mod expression;
mod parser;

pub use converter::{FieldResolver, FilterExpressionConverter, ResolvedField};
pub use evaluate::{MetadataFilter, MetadataFilterConverter};
pub use expression::{ComparisonOp, Expression, FilterValue};
pub use parser::parse;

pub(crate) use converter::normalize_datetime;

use thiserror::Error;

/// Errors raised while parsing or converting filter expressions.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    /// Text form could not be parsed.
    #[error("Invalid filter expression at offset {offset}: {message}")]
    Syntax {
        /// Byte offset of the offending token.
        offset: usize,
        /// Description of what was expected.
        message: String,
    },
    /// Key is not one of the declared filterable metadata fields.
    #[error("Not allowed filter identifier name: {0}")]
    UnknownField(String),
    /// Value cannot be expressed for the field or backend.
    #[error("Unsupported filter value for '{key}': {message}")]
    UnsupportedValue {
        /// Field the value was compared against.
        key: String,
        /// Reason the value was rejected.
        message: String,
    },
}
