//! Mapping between store records and Qdrant points.

use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::store::types::{CONTENT_FIELD_NAME, METADATA_FIELD_NAME};
use crate::store::{IndexRecord, ScoredRecord};

/// Payload key holding the caller-facing document id.
pub(crate) const DOCUMENT_ID_KEY: &str = "doc_id";

/// Qdrant point ids must be UUIDs or integers; other document ids map to a stable UUIDv5.
pub(crate) fn point_id(document_id: &str) -> String {
    match Uuid::parse_str(document_id) {
        Ok(uuid) => uuid.to_string(),
        Err(_) => Uuid::new_v5(&Uuid::NAMESPACE_OID, document_id.as_bytes()).to_string(),
    }
}

/// Serialize a record into a point body for `PUT /collections/{name}/points`.
pub(crate) fn build_point(record: IndexRecord) -> Value {
    let mut payload = Map::new();
    payload.insert(
        DOCUMENT_ID_KEY.into(),
        Value::String(record.id.clone()),
    );
    payload.insert(CONTENT_FIELD_NAME.into(), Value::String(record.content));
    payload.insert(METADATA_FIELD_NAME.into(), Value::String(record.metadata));
    payload.extend(record.fields);

    json!({
        "id": point_id(&record.id),
        "vector": record.embedding,
        "payload": payload,
    })
}

/// Map a cosine hit in `[-1, 1]` back to a record with a score in `[0, 1]`.
pub(crate) fn scored_record(
    point_id: String,
    score: f32,
    payload: Option<Map<String, Value>>,
) -> ScoredRecord {
    let mut payload = payload.unwrap_or_default();
    let id = match payload.remove(DOCUMENT_ID_KEY) {
        Some(Value::String(id)) => id,
        _ => point_id,
    };

    ScoredRecord {
        id,
        content: take_string(&mut payload, CONTENT_FIELD_NAME),
        metadata: take_string(&mut payload, METADATA_FIELD_NAME),
        score: ((f64::from(score) + 1.0) / 2.0).clamp(0.0, 1.0),
    }
}

fn take_string(payload: &mut Map<String, Value>, key: &str) -> Option<String> {
    match payload.remove(key)? {
        Value::String(text) => Some(text),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
