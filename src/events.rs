//! Event extraction and in-cycle deduplication (spec §4.6 step 5, §9).
//!
//! Results arrive from Splunk as open JSON objects. `take_required`/
//! `take_optional` are the "field-take" primitive the design notes call
//! for: remove a key, return its value, fail loudly if required and
//! missing — a direct port of `original_source/utils/splunk.py`'s
//! `take_required_field`/`take_optional_field` onto a typed `serde_json::Value`.

use crate::error::EventExtractionError;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// A single event surviving extraction, ready to hand to the downstream sink.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub timestamp: f64,
    pub event_type: Option<String>,
    pub msg_title: Option<String>,
    pub msg_text: Option<String>,
    pub source_type_name: Option<String>,
    /// Configured instance tags plus a `field:value` tag for every result
    /// field left over after the named fields above are taken, sorted by
    /// field name for determinism.
    pub tags: Vec<String>,
}

fn take_required(
    search: &str,
    obj: &mut Map<String, Value>,
    field: &str,
) -> Result<Value, EventExtractionError> {
    obj.remove(field)
        .ok_or_else(|| EventExtractionError::MissingField {
            search: search.to_string(),
            field: field.to_string(),
        })
}

fn take_optional(obj: &mut Map<String, Value>, field: &str) -> Option<Value> {
    obj.remove(field)
}

fn take_optional_string(
    search: &str,
    obj: &mut Map<String, Value>,
    field: &str,
) -> Result<Option<String>, EventExtractionError> {
    match take_optional(obj, field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(EventExtractionError::WrongType {
            search: search.to_string(),
            field: field.to_string(),
        }),
    }
}

/// Splunk's own dedup convention (`_bkt` + `_cd`) when present; otherwise a
/// hash of the timestamp and whatever fields remain after required/optional
/// extraction, so two structurally distinct records never collide.
fn identity_key(search: &str, raw: &Value, timestamp: f64, remainder: &Map<String, Value>) -> String {
    if let (Some(Value::String(bkt)), Some(Value::String(cd))) = (raw.get("_bkt"), raw.get("_cd")) {
        return format!("{bkt}:{cd}");
    }
    let mut hasher = Sha256::new();
    hasher.update(search.as_bytes());
    hasher.update(timestamp.to_bits().to_le_bytes());
    // `Map` without the `preserve_order` feature is backed by a `BTreeMap`,
    // so this serialization is deterministic regardless of field order.
    if let Ok(bytes) = serde_json::to_vec(remainder) {
        hasher.update(bytes);
    }
    format!("{:x}", hasher.finalize())
}

/// Turn every field left in the remainder into a `field:value` tag, sorted
/// by field name so the resulting order is deterministic.
fn remainder_tags(remainder: &Map<String, Value>) -> Vec<String> {
    let mut keys: Vec<&String> = remainder.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|k| format!("{k}:{}", value_to_tag_string(&remainder[k])))
        .collect()
}

fn value_to_tag_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Extract one `EventRecord` plus its dedup identity key from a raw result object.
pub fn extract_event(
    search: &str,
    tags: &[String],
    mut raw: Map<String, Value>,
) -> Result<(EventRecord, String), EventExtractionError> {
    let raw_value = Value::Object(raw.clone());

    let time_value = take_required(search, &mut raw, "_time")?;
    let timestamp = time_value
        .as_f64()
        .or_else(|| time_value.as_str().and_then(|s| s.parse::<f64>().ok()))
        .ok_or_else(|| EventExtractionError::WrongType {
            search: search.to_string(),
            field: "_time".to_string(),
        })?;

    // _bkt/_cd are consumed for the identity key below but are not part of
    // the emitted record, so drop them from `raw` (the remainder hashed on
    // the fallback path must not include fields already used for identity).
    raw.remove("_bkt");
    raw.remove("_cd");

    let event_type = take_optional_string(search, &mut raw, "event_type")?;
    let msg_title = take_optional_string(search, &mut raw, "msg_title")?;
    let msg_text = take_optional_string(search, &mut raw, "msg_text")?;
    let source_type_name = take_optional_string(search, &mut raw, "source_type_name")?;

    let key = identity_key(search, &raw_value, timestamp, &raw);

    let mut all_tags = tags.to_vec();
    all_tags.extend(remainder_tags(&raw));

    Ok((
        EventRecord {
            timestamp,
            event_type,
            msg_title,
            msg_text,
            source_type_name,
            tags: all_tags,
        },
        key,
    ))
}

/// Extract events from every page of a search's flattened results, dropping
/// events whose identity key has already been seen in this cycle.
///
/// `seen` accumulates across searches within one cycle — the spec requires
/// in-cycle dedup across the whole cycle, not just within one search.
pub fn extract_and_dedup(
    search: &str,
    tags: &[String],
    raw_results: Vec<Map<String, Value>>,
    seen: &mut HashSet<String>,
) -> Result<Vec<EventRecord>, EventExtractionError> {
    let mut out = Vec::with_capacity(raw_results.len());
    for raw in raw_results {
        let (event, key) = extract_event(search, tags, raw)?;
        if seen.insert(key) {
            out.push(event);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn minimal_record_yields_all_none_optionals() {
        let raw = obj(json!({ "_time": 1488974400.0 }));
        let (event, _key) = extract_event("events", &[], raw).unwrap();
        assert_eq!(event.timestamp, 1488974400.0);
        assert_eq!(event.event_type, None);
        assert_eq!(event.msg_title, None);
        assert_eq!(event.msg_text, None);
        assert_eq!(event.source_type_name, None);
    }

    #[test]
    fn missing_time_is_an_error() {
        let raw = obj(json!({ "event_type": "x" }));
        assert!(extract_event("events", &[], raw).is_err());
    }

    #[test]
    fn bkt_and_cd_form_identity_key_and_dedup_across_calls() {
        let raw1 = obj(json!({ "_time": 1.0, "_bkt": "db_1", "_cd": "5:10" }));
        let raw2 = obj(json!({ "_time": 2.0, "_bkt": "db_1", "_cd": "5:10" }));
        let mut seen = HashSet::new();
        let out1 = extract_and_dedup("events", &[], vec![raw1], &mut seen).unwrap();
        let out2 = extract_and_dedup("events", &[], vec![raw2], &mut seen).unwrap();
        assert_eq!(out1.len(), 1);
        assert_eq!(out2.len(), 0, "same _bkt/_cd must be deduplicated in-cycle");
    }

    #[test]
    fn distinct_records_without_bkt_cd_both_survive() {
        let raw1 = obj(json!({ "_time": 1.0, "msg_title": "a" }));
        let raw2 = obj(json!({ "_time": 1.0, "msg_title": "b" }));
        let mut seen = HashSet::new();
        let out = extract_and_dedup("events", &[], vec![raw1, raw2], &mut seen).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn identical_records_without_bkt_cd_are_deduplicated() {
        let raw1 = obj(json!({ "_time": 1.0, "msg_title": "a" }));
        let raw2 = obj(json!({ "_time": 1.0, "msg_title": "a" }));
        let mut seen = HashSet::new();
        let out = extract_and_dedup("events", &[], vec![raw1, raw2], &mut seen).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn tags_are_attached_to_every_event() {
        let raw = obj(json!({ "_time": 1.0 }));
        let tags = vec!["env:prod".to_string()];
        let (event, _) = extract_event("events", &tags, raw).unwrap();
        assert_eq!(event.tags, tags);
    }

    #[test]
    fn remaining_fields_are_appended_as_key_value_tags() {
        let raw = obj(json!({
            "_time": 1488974400.0,
            "from": "grey",
            "alarm_name": "disk_full"
        }));
        let tags = vec!["env:prod".to_string()];
        let (event, _) = extract_event("events", &tags, raw).unwrap();
        assert_eq!(
            event.tags,
            vec![
                "env:prod".to_string(),
                "alarm_name:disk_full".to_string(),
                "from:grey".to_string(),
            ]
        );
    }
}
