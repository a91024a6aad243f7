//! In-process evaluation of filter expressions against projected metadata fields.
//!
//! Used by backends without a native query language. Keys are rewritten to their `meta_<name>`
//! projection at conversion time, so evaluation only touches declared fields.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::converter::{FieldResolver, FilterExpressionConverter, normalize_datetime};
use super::expression::{ComparisonOp, Expression, FilterValue};
use super::FilterError;
use crate::store::{FieldType, MetadataField};

/// Converter producing a [`MetadataFilter`].
#[derive(Debug, Clone, Default)]
pub struct MetadataFilterConverter {
    resolver: FieldResolver,
}

impl MetadataFilterConverter {
    /// Build a converter over the declared filterable fields.
    pub fn new(fields: &[MetadataField]) -> Self {
        Self {
            resolver: FieldResolver::new(fields),
        }
    }

    fn rewrite(&self, expression: &Expression) -> Result<Expression, FilterError> {
        Ok(match expression {
            Expression::Comparison { key, op, value } => {
                let resolved = self.resolver.resolve(key)?;
                let value = match (resolved.field.field_type, value) {
                    (FieldType::DateTime, FilterValue::Text(text)) => FilterValue::Text(
                        normalize_datetime(text).ok_or_else(|| FilterError::UnsupportedValue {
                            key: resolved.indexed_name(),
                            message: format!("'{text}' is not an RFC 3339 timestamp"),
                        })?,
                    ),
                    _ => value.clone(),
                };
                Expression::Comparison {
                    key: resolved.indexed_name(),
                    op: *op,
                    value,
                }
            }
            Expression::And(left, right) => self.rewrite(left)?.and(self.rewrite(right)?),
            Expression::Or(left, right) => self.rewrite(left)?.or(self.rewrite(right)?),
            Expression::Not(inner) => self.rewrite(inner)?.negate(),
            Expression::Group(inner) => self.rewrite(inner)?.group(),
        })
    }
}

impl FilterExpressionConverter for MetadataFilterConverter {
    type Output = MetadataFilter;

    fn convert_expression(&self, expression: &Expression) -> Result<MetadataFilter, FilterError> {
        self.rewrite(expression).map(MetadataFilter)
    }
}

/// Validated expression over projected field names.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataFilter(pub Expression);

impl MetadataFilter {
    /// Check whether the projected fields satisfy the filter.
    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        evaluate(&self.0, fields)
    }
}

fn evaluate(expression: &Expression, fields: &Map<String, Value>) -> bool {
    match expression {
        Expression::Comparison { key, op, value } => match fields.get(key) {
            Some(actual) => compare(actual, *op, value),
            None => matches!(op, ComparisonOp::Ne | ComparisonOp::Nin),
        },
        Expression::And(left, right) => evaluate(left, fields) && evaluate(right, fields),
        Expression::Or(left, right) => evaluate(left, fields) || evaluate(right, fields),
        Expression::Not(inner) => !evaluate(inner, fields),
        Expression::Group(inner) => evaluate(inner, fields),
    }
}

fn compare(actual: &Value, op: ComparisonOp, expected: &FilterValue) -> bool {
    match op {
        ComparisonOp::Eq => value_eq(actual, expected),
        ComparisonOp::Ne => !value_eq(actual, expected),
        ComparisonOp::Gt => value_cmp(actual, expected) == Some(Ordering::Greater),
        ComparisonOp::Gte => matches!(
            value_cmp(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        ComparisonOp::Lt => value_cmp(actual, expected) == Some(Ordering::Less),
        ComparisonOp::Lte => matches!(
            value_cmp(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        ComparisonOp::In => list_contains(actual, expected),
        ComparisonOp::Nin => !list_contains(actual, expected),
    }
}

fn list_contains(actual: &Value, expected: &FilterValue) -> bool {
    match expected {
        FilterValue::List(values) => values.iter().any(|value| value_eq(actual, value)),
        single => value_eq(actual, single),
    }
}

fn value_eq(actual: &Value, expected: &FilterValue) -> bool {
    match (actual, expected) {
        (Value::String(text), FilterValue::Text(other)) => match normalize_datetime(text) {
            Some(normalized) => normalize_datetime(other).is_some_and(|o| o == normalized),
            None => text == other,
        },
        (Value::Bool(flag), FilterValue::Bool(other)) => flag == other,
        (Value::Number(number), expected) => match (number.as_f64(), expected.as_f64()) {
            (Some(left), Some(right)) => (left - right).abs() < f64::EPSILON,
            _ => false,
        },
        _ => false,
    }
}

fn value_cmp(actual: &Value, expected: &FilterValue) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(number), expected) => number.as_f64()?.partial_cmp(&expected.as_f64()?),
        (Value::String(text), FilterValue::Text(other)) => {
            match (normalize_datetime(text), normalize_datetime(other)) {
                (Some(left), Some(right)) => Some(left.cmp(&right)),
                _ => Some(text.as_str().cmp(other.as_str())),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse;
    use serde_json::json;

    fn converter() -> MetadataFilterConverter {
        MetadataFilterConverter::new(&[
            MetadataField::text("country"),
            MetadataField::int32("year"),
            MetadataField::boolean("active"),
            MetadataField::date("published"),
        ])
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn keys_are_rewritten_to_projected_names() {
        let filter = converter()
            .convert_expression(&parse("country == 'UK'").unwrap())
            .unwrap();
        assert_eq!(filter.0, Expression::eq("meta_country", "UK"));
    }

    #[test]
    fn evaluates_boolean_structure() {
        let filter = converter()
            .convert_expression(
                &parse("country in ['UK', 'NL'] && (year >= 2020 || active == true)").unwrap(),
            )
            .unwrap();

        assert!(filter.matches(&fields(json!({"meta_country": "UK", "meta_year": 2021}))));
        assert!(filter.matches(&fields(
            json!({"meta_country": "NL", "meta_year": 2001, "meta_active": true})
        )));
        assert!(!filter.matches(&fields(json!({"meta_country": "BG", "meta_year": 2021}))));
        assert!(!filter.matches(&fields(json!({"meta_country": "UK", "meta_year": 2019}))));
    }

    #[test]
    fn integer_and_float_values_compare_numerically() {
        let filter = converter()
            .convert_expression(&parse("year == 2020.0").unwrap())
            .unwrap();
        assert!(filter.matches(&fields(json!({"meta_year": 2020}))));
    }

    #[test]
    fn missing_fields_only_satisfy_negative_operators() {
        let converter = converter();
        let ne = converter
            .convert_expression(&parse("country != 'UK'").unwrap())
            .unwrap();
        let eq = converter
            .convert_expression(&parse("country == 'UK'").unwrap())
            .unwrap();
        let empty = Map::new();
        assert!(ne.matches(&empty));
        assert!(!eq.matches(&empty));
    }

    #[test]
    fn dates_compare_chronologically() {
        let filter = converter()
            .convert_expression(&parse("published > '2024-01-01T00:00:00Z'").unwrap())
            .unwrap();
        assert!(filter.matches(&fields(json!({"meta_published": "2024-06-01T12:00:00+02:00"}))));
        assert!(!filter.matches(&fields(json!({"meta_published": "2023-12-31T23:00:00Z"}))));
    }

    #[test]
    fn rejects_non_timestamp_dates() {
        let error = converter()
            .convert_expression(&parse("published == 'soon'").unwrap())
            .unwrap_err();
        assert!(matches!(error, FilterError::UnsupportedValue { key, .. } if key == "meta_published"));
    }
}
