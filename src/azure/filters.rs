//! Translation of portable filter expressions into OData `$filter` syntax.

use crate::filter::{
    ComparisonOp, Expression, FieldResolver, FilterError, FilterExpressionConverter, FilterValue,
    ResolvedField, normalize_datetime,
};
use crate::store::{FieldType, MetadataField};

const SEARCH_IN_DELIMITERS: [char; 4] = [',', '|', ';', '~'];

/// Converter producing OData filter strings over the projected `meta_<name>` fields.
#[derive(Debug, Clone, Default)]
pub struct ODataFilterConverter {
    resolver: FieldResolver,
}

impl ODataFilterConverter {
    /// Build a converter over the declared filterable fields.
    pub fn new(fields: &[MetadataField]) -> Self {
        Self {
            resolver: FieldResolver::new(fields),
        }
    }

    fn write(&self, expression: &Expression, out: &mut String) -> Result<(), FilterError> {
        match expression {
            Expression::Comparison { key, op, value } => {
                let field = self.resolver.resolve(key)?;
                self.write_comparison(field, *op, value, out)
            }
            Expression::And(left, right) => {
                self.write_and_operand(left, out)?;
                out.push_str(" and ");
                self.write_and_operand(right, out)
            }
            Expression::Or(left, right) => {
                self.write(left, out)?;
                out.push_str(" or ");
                self.write(right, out)
            }
            Expression::Not(inner) => {
                out.push_str("not ");
                match inner.as_ref() {
                    Expression::Group(_) => self.write(inner, out),
                    other => {
                        out.push('(');
                        self.write(other, out)?;
                        out.push(')');
                        Ok(())
                    }
                }
            }
            Expression::Group(inner) => {
                out.push('(');
                self.write(inner, out)?;
                out.push(')');
                Ok(())
            }
        }
    }

    fn write_and_operand(&self, operand: &Expression, out: &mut String) -> Result<(), FilterError> {
        if matches!(operand, Expression::Or(..)) {
            out.push('(');
            self.write(operand, out)?;
            out.push(')');
            Ok(())
        } else {
            self.write(operand, out)
        }
    }

    fn write_comparison(
        &self,
        field: ResolvedField<'_>,
        op: ComparisonOp,
        value: &FilterValue,
        out: &mut String,
    ) -> Result<(), FilterError> {
        let name = field.indexed_name();
        let operator = match op {
            ComparisonOp::Eq => "eq",
            ComparisonOp::Ne => "ne",
            ComparisonOp::Gt => "gt",
            ComparisonOp::Gte => "ge",
            ComparisonOp::Lt => "lt",
            ComparisonOp::Lte => "le",
            ComparisonOp::In | ComparisonOp::Nin => {
                return self.write_membership(field, op == ComparisonOp::Nin, value, out);
            }
        };

        let literal = literal(field, value)?;
        out.push_str(&format!("{name} {operator} {literal}"));
        Ok(())
    }

    fn write_membership(
        &self,
        field: ResolvedField<'_>,
        negated: bool,
        value: &FilterValue,
        out: &mut String,
    ) -> Result<(), FilterError> {
        let name = field.indexed_name();
        let FilterValue::List(values) = value else {
            return Err(FilterError::UnsupportedValue {
                key: name,
                message: "membership operators require a list".into(),
            });
        };

        if negated {
            out.push_str("not ");
        }

        let texts: Option<Vec<&str>> = values
            .iter()
            .map(|value| match value {
                FilterValue::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();

        match texts {
            Some(texts) if field.field.field_type == FieldType::Text => {
                let delimiter = SEARCH_IN_DELIMITERS
                    .into_iter()
                    .find(|delimiter| texts.iter().all(|text| !text.contains(*delimiter)))
                    .ok_or_else(|| FilterError::UnsupportedValue {
                        key: name.clone(),
                        message: "list values contain every supported delimiter".into(),
                    })?;
                let joined = texts.join(&delimiter.to_string());
                out.push_str(&format!(
                    "search.in({name}, {}, '{delimiter}')",
                    quote(&joined)
                ));
            }
            _ => {
                // search.in only accepts strings; other types expand into a disjunction.
                out.push('(');
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(" or ");
                    }
                    out.push_str(&format!("{name} eq {}", literal(field, value)?));
                }
                out.push(')');
            }
        }
        Ok(())
    }
}

impl FilterExpressionConverter for ODataFilterConverter {
    type Output = String;

    fn convert_expression(&self, expression: &Expression) -> Result<String, FilterError> {
        let mut out = String::new();
        self.write(expression, &mut out)?;
        Ok(out)
    }
}

fn literal(field: ResolvedField<'_>, value: &FilterValue) -> Result<String, FilterError> {
    match (field.field.field_type, value) {
        (FieldType::DateTime, FilterValue::Text(text)) => {
            normalize_datetime(text).ok_or_else(|| FilterError::UnsupportedValue {
                key: field.indexed_name(),
                message: format!("'{text}' is not an RFC 3339 timestamp"),
            })
        }
        (_, FilterValue::Text(text)) => Ok(quote(text)),
        (_, FilterValue::Integer(value)) => Ok(value.to_string()),
        (_, FilterValue::Float(value)) => Ok(format!("{value:?}")),
        (_, FilterValue::Bool(value)) => Ok(value.to_string()),
        (_, FilterValue::List(_)) => Err(FilterError::UnsupportedValue {
            key: field.indexed_name(),
            message: "lists are only valid with in / nin".into(),
        }),
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse;

    fn converter() -> ODataFilterConverter {
        ODataFilterConverter::new(&[
            MetadataField::text("country"),
            MetadataField::int32("year"),
            MetadataField::boolean("active"),
            MetadataField::date("activationDate"),
            MetadataField::text("genre"),
        ])
    }

    fn convert(text: &str) -> String {
        converter()
            .convert_expression(&parse(text).unwrap())
            .unwrap()
    }

    #[test]
    fn converts_comparisons() {
        assert_eq!(convert("country == 'BG'"), "meta_country eq 'BG'");
        assert_eq!(convert("year >= 2020"), "meta_year ge 2020");
        assert_eq!(convert("year < 2020"), "meta_year lt 2020");
        assert_eq!(convert("active != true"), "meta_active ne true");
    }

    #[test]
    fn converts_boolean_structure() {
        assert_eq!(
            convert("country == 'BG' && year >= 2020"),
            "meta_country eq 'BG' and meta_year ge 2020"
        );
        assert_eq!(
            convert("(year >= 2020 || country == 'BG') && country != 'NL'"),
            "(meta_year ge 2020 or meta_country eq 'BG') and meta_country ne 'NL'"
        );
        assert_eq!(
            convert("not (country == 'BG' || year == 2020)"),
            "not (meta_country eq 'BG' or meta_year eq 2020)"
        );
    }

    #[test]
    fn builder_or_inside_and_is_parenthesized() {
        let expression = Expression::eq("country", "BG")
            .or(Expression::eq("country", "NL"))
            .and(Expression::gte("year", 2020));
        assert_eq!(
            converter().convert_expression(&expression).unwrap(),
            "(meta_country eq 'BG' or meta_country eq 'NL') and meta_year ge 2020"
        );
    }

    #[test]
    fn converts_membership() {
        assert_eq!(
            convert("genre in ['comedy', 'documentary', 'drama']"),
            "search.in(meta_genre, 'comedy,documentary,drama', ',')"
        );
        assert_eq!(
            convert("genre nin ['comedy', 'drama']"),
            "not search.in(meta_genre, 'comedy,drama', ',')"
        );
        assert_eq!(
            convert("genre in ['a,b', 'c']"),
            "search.in(meta_genre, 'a,b|c', '|')"
        );
        assert_eq!(
            convert("year in [2019, 2020]"),
            "(meta_year eq 2019 or meta_year eq 2020)"
        );
    }

    #[test]
    fn escapes_quotes_and_emits_bare_dates() {
        assert_eq!(convert("country == 'Côte d\\'Ivoire'"), "meta_country eq 'Côte d''Ivoire'");
        assert_eq!(
            convert("activationDate > '1970-01-01T00:00:02Z'"),
            "meta_activationDate gt 1970-01-01T00:00:02Z"
        );
    }

    #[test]
    fn rejects_undeclared_keys_and_bad_dates() {
        let error = converter()
            .convert_expression(&Expression::eq("author", "john"))
            .unwrap_err();
        assert_eq!(error, FilterError::UnknownField("meta_author".into()));

        let error = converter()
            .convert_expression(&Expression::gt("activationDate", "yesterday"))
            .unwrap_err();
        assert!(matches!(error, FilterError::UnsupportedValue { .. }));
    }
}
