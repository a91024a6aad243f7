use super::FilterError;
use super::expression::Expression;
use crate::store::MetadataField;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Translates a portable [`Expression`] into a backend-native filter.
pub trait FilterExpressionConverter: Send + Sync {
    /// Native representation produced by the converter.
    type Output;

    /// Convert the expression, rejecting keys that were not declared filterable.
    fn convert_expression(&self, expression: &Expression) -> Result<Self::Output, FilterError>;
}

/// Maps expression keys onto the projected `meta_<name>` fields declared for an index.
#[derive(Debug, Clone, Default)]
pub struct FieldResolver {
    fields: Vec<MetadataField>,
}

/// Declared field a key resolved to.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedField<'a> {
    /// Field declaration.
    pub field: &'a MetadataField,
}

impl ResolvedField<'_> {
    /// Name of the projected top-level field.
    pub fn indexed_name(&self) -> String {
        self.field.indexed_name()
    }
}

impl FieldResolver {
    /// Build a resolver over the declared filterable fields.
    pub fn new(fields: &[MetadataField]) -> Self {
        Self {
            fields: fields.to_vec(),
        }
    }

    /// Resolve a key, accepting outer quotes and an optional `metadata.` prefix.
    pub fn resolve(&self, key: &str) -> Result<ResolvedField<'_>, FilterError> {
        let identifier = strip_outer_quotes(key.trim());
        let identifier = identifier.strip_prefix("metadata.").unwrap_or(identifier);

        self.fields
            .iter()
            .find(|field| field.name == identifier)
            .map(|field| ResolvedField { field })
            .ok_or_else(|| FilterError::UnknownField(MetadataField::text(identifier).indexed_name()))
    }
}

fn strip_outer_quotes(key: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = key
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    key
}

/// Reformat an RFC 3339 timestamp in UTC, `None` when the text is not a timestamp.
pub(crate) fn normalize_datetime(text: &str) -> Option<String> {
    let parsed = OffsetDateTime::parse(text.trim(), &Rfc3339).ok()?;
    parsed.to_offset(time::UtcOffset::UTC).format(&Rfc3339).ok()
}
