//! Translation of portable filter expressions into Qdrant filter objects.

use serde_json::{Map, Value, json};

use crate::filter::{
    ComparisonOp, Expression, FieldResolver, FilterError, FilterExpressionConverter, FilterValue,
    ResolvedField, normalize_datetime,
};
use crate::store::{FieldType, MetadataField};

/// Converter producing Qdrant `filter` objects over the projected `meta_<name>` payload keys.
#[derive(Debug, Clone, Default)]
pub struct QdrantFilterConverter {
    resolver: FieldResolver,
}

impl QdrantFilterConverter {
    /// Build a converter over the declared filterable fields.
    pub fn new(fields: &[MetadataField]) -> Self {
        Self {
            resolver: FieldResolver::new(fields),
        }
    }

    fn condition(&self, expression: &Expression) -> Result<Value, FilterError> {
        match expression {
            Expression::Comparison { key, op, value } => {
                let field = self.resolver.resolve(key)?;
                comparison(field, *op, value)
            }
            Expression::And(..) => {
                let mut must = Vec::new();
                self.flatten_and(expression, &mut must)?;
                Ok(json!({ "must": must }))
            }
            Expression::Or(..) => {
                let mut should = Vec::new();
                self.flatten_or(expression, &mut should)?;
                Ok(json!({ "should": should }))
            }
            Expression::Not(inner) => Ok(json!({ "must_not": [self.condition(inner)?] })),
            Expression::Group(inner) => self.condition(inner),
        }
    }

    fn flatten_and(&self, expression: &Expression, out: &mut Vec<Value>) -> Result<(), FilterError> {
        match expression {
            Expression::And(left, right) => {
                self.flatten_and(left, out)?;
                self.flatten_and(right, out)
            }
            other => {
                out.push(self.condition(other)?);
                Ok(())
            }
        }
    }

    fn flatten_or(&self, expression: &Expression, out: &mut Vec<Value>) -> Result<(), FilterError> {
        match expression {
            Expression::Or(left, right) => {
                self.flatten_or(left, out)?;
                self.flatten_or(right, out)
            }
            other => {
                out.push(self.condition(other)?);
                Ok(())
            }
        }
    }
}

impl FilterExpressionConverter for QdrantFilterConverter {
    type Output = Value;

    fn convert_expression(&self, expression: &Expression) -> Result<Value, FilterError> {
        let condition = self.condition(expression)?;
        // The top level must be a filter object, not a bare field condition.
        let is_filter = condition
            .as_object()
            .is_some_and(|object| !object.contains_key("key"));
        Ok(if is_filter {
            condition
        } else {
            json!({ "must": [condition] })
        })
    }
}

fn comparison(
    field: ResolvedField<'_>,
    op: ComparisonOp,
    value: &FilterValue,
) -> Result<Value, FilterError> {
    let key = field.indexed_name();
    match op {
        ComparisonOp::Eq => equality(field, value),
        ComparisonOp::Ne => Ok(json!({ "must_not": [equality(field, value)?] })),
        ComparisonOp::Gt | ComparisonOp::Gte | ComparisonOp::Lt | ComparisonOp::Lte => {
            let bound = match op {
                ComparisonOp::Gt => "gt",
                ComparisonOp::Gte => "gte",
                ComparisonOp::Lt => "lt",
                _ => "lte",
            };
            let mut range = Map::new();
            range.insert(bound.into(), range_value(field, value)?);
            Ok(json!({ "key": key, range_condition(field): range }))
        }
        ComparisonOp::In | ComparisonOp::Nin => {
            let FilterValue::List(values) = value else {
                return Err(unsupported(&key, "membership operators require a list"));
            };
            let values = values
                .iter()
                .map(|value| match_value(field, value))
                .collect::<Result<Vec<_>, _>>()?;
            let matcher = if op == ComparisonOp::In { "any" } else { "except" };
            Ok(json!({ "key": key, "match": { matcher: values } }))
        }
    }
}

fn equality(field: ResolvedField<'_>, value: &FilterValue) -> Result<Value, FilterError> {
    let key = field.indexed_name();
    match (field.field.field_type, value) {
        // match.value has no float or datetime form; an exact range stands in.
        (FieldType::DateTime, _) | (_, FilterValue::Float(_)) => {
            let bound = range_value(field, value)?;
            Ok(json!({ "key": key, range_condition(field): { "gte": bound, "lte": bound } }))
        }
        _ => Ok(json!({ "key": key, "match": { "value": match_value(field, value)? } })),
    }
}

fn match_value(field: ResolvedField<'_>, value: &FilterValue) -> Result<Value, FilterError> {
    match value {
        FilterValue::Text(text) => Ok(Value::String(text.clone())),
        FilterValue::Integer(number) => Ok(Value::from(*number)),
        FilterValue::Bool(flag) => Ok(Value::Bool(*flag)),
        FilterValue::Float(_) => Err(unsupported(
            &field.indexed_name(),
            "floats can only be compared by range",
        )),
        FilterValue::List(_) => Err(unsupported(
            &field.indexed_name(),
            "lists are only valid with in / nin",
        )),
    }
}

/// Qdrant only accepts numbers in `range`; timestamps go through `datetime_range`.
fn range_condition(field: ResolvedField<'_>) -> &'static str {
    match field.field.field_type {
        FieldType::DateTime => "datetime_range",
        _ => "range",
    }
}

fn range_value(field: ResolvedField<'_>, value: &FilterValue) -> Result<Value, FilterError> {
    let key = field.indexed_name();
    match (field.field.field_type, value) {
        (FieldType::DateTime, FilterValue::Text(text)) => normalize_datetime(text)
            .map(Value::String)
            .ok_or_else(|| unsupported(&key, &format!("'{text}' is not an RFC 3339 timestamp"))),
        (_, FilterValue::Integer(number)) => Ok(Value::from(*number)),
        (_, FilterValue::Float(number)) => Ok(Value::from(*number)),
        _ => Err(unsupported(&key, "range comparisons require a number or timestamp")),
    }
}

fn unsupported(key: &str, message: &str) -> FilterError {
    FilterError::UnsupportedValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
