//! Normalisation of persisted entry records to the current shape.
//!
//! Records are classified before anything is read from them:
//!
//! * **Current**: carries a `schemaVersion` tag or an explicit
//!   `companionType` field.
//! * **Legacy**: an object from before companion types existed; its
//!   `companions` field, if any, is free text.
//! * **Invalid**: anything that is not a JSON object. Dropped.
//!
//! [`normalize`] is total over objects and idempotent: feeding its output
//! back in yields the same entry with `changed == false`.

use rand::rngs::SmallRng;
use serde_json::{Map, Value};

use crate::constants::{CURRENT_SCHEMA_VERSION, MAX_RATING};
use crate::entry::{CompanionType, Entry};
use crate::ids::{fallback_rng, legacy_fallback_id};

/// Fields the core owns; everything else is carried in [`Entry::extra`].
const KNOWN_FIELDS: &[&str] = &[
    "id",
    "country",
    "countryCode",
    "countryLabel",
    "city",
    "cityName",
    "startDate",
    "endDate",
    "purpose",
    "companionType",
    "companions",
    "memo",
    "rating",
    "schemaVersion",
];

/// Stored `companions` values with no text rendering are kept here.
pub const LEGACY_COMPANIONS_FIELD: &str = "legacyCompanions";

#[derive(Debug, Clone, PartialEq)]
pub enum RecordShape {
    Current(Map<String, Value>),
    Legacy(Map<String, Value>),
    Invalid(Value),
}

impl RecordShape {
    #[must_use]
    pub fn classify(raw: Value) -> Self {
        match raw {
            Value::Object(fields) => {
                let tagged = fields
                    .get("schemaVersion")
                    .and_then(Value::as_u64)
                    .is_some_and(|v| v >= 1);
                if tagged || fields.contains_key("companionType") {
                    Self::Current(fields)
                } else {
                    Self::Legacy(fields)
                }
            }
            other => Self::Invalid(other),
        }
    }
}

/// Result of normalising one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub entry: Entry,
    /// Whether the stored form differs from what will be written back
    pub changed: bool,
}

/// Source of ids for records stored without one.
pub struct FallbackIds {
    now_millis: i64,
    rng: SmallRng,
}

impl FallbackIds {
    #[must_use]
    pub fn new(now_millis: i64) -> Self {
        Self {
            now_millis,
            rng: fallback_rng(now_millis),
        }
    }

    fn issue(&mut self) -> String {
        legacy_fallback_id(self.now_millis, &mut self.rng)
    }
}

/// Outcome of a whole-list migration pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub entries: Vec<Entry>,
    pub changed: usize,
    pub dropped: usize,
}

impl MigrationReport {
    /// Whether the stored list must be rewritten.
    #[must_use]
    pub const fn needs_save(&self) -> bool {
        self.changed > 0 || self.dropped > 0
    }
}

fn text(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn read_id(fields: &Map<String, Value>) -> Option<String> {
    match fields.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn read_rating(fields: &Map<String, Value>) -> Option<u8> {
    let raw = match fields.get("rating") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    if !raw.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let clamped = raw.round().clamp(0.0, f64::from(MAX_RATING)) as u8;
    Some(clamped)
}

fn current_companions(fields: &Map<String, Value>) -> (CompanionType, String, Option<Value>) {
    let kind = match fields.get("companionType") {
        Some(Value::String(tag)) => CompanionType::from_tag(tag).unwrap_or(CompanionType::Custom),
        _ => CompanionType::Unset,
    };
    match fields.get("companions") {
        None | Some(Value::Null) => (kind, String::new(), None),
        Some(value) => match companion_text(value) {
            Some(detail) => (kind, detail, None),
            None => (kind, String::new(), Some(value.clone())),
        },
    }
}

/// Text form of a stored companions value: strings as-is, numbers
/// printed, lists of scalars joined. `None` for anything else.
fn companion_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(|names| names.join(", ")),
        _ => None,
    }
}

fn legacy_companions(fields: &Map<String, Value>) -> (CompanionType, String, Option<Value>) {
    match fields.get("companions") {
        None | Some(Value::Null) => (CompanionType::Unset, String::new(), None),
        Some(value) => match companion_text(value) {
            Some(detail) if detail.is_empty() => (CompanionType::Solo, detail, None),
            Some(detail) => (CompanionType::Custom, detail, None),
            None => (CompanionType::Unset, String::new(), Some(value.clone())),
        },
    }
}

fn build(
    fields: &Map<String, Value>,
    id: String,
    (companion_type, companions, unreadable): (CompanionType, String, Option<Value>),
) -> Entry {
    let mut extra: Map<String, Value> = fields
        .iter()
        .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if let Some(raw) = unreadable {
        extra.insert(LEGACY_COMPANIONS_FIELD.to_string(), raw);
    }
    Entry {
        id,
        country: text(fields, "country"),
        country_code: text(fields, "countryCode"),
        country_label: text(fields, "countryLabel"),
        city: text(fields, "city"),
        city_name: text(fields, "cityName"),
        start_date: text(fields, "startDate"),
        end_date: text(fields, "endDate"),
        purpose: text(fields, "purpose"),
        companion_type,
        companions,
        memo: text(fields, "memo"),
        rating: read_rating(fields),
        schema_version: CURRENT_SCHEMA_VERSION,
        extra,
    }
}

/// Normalise one record. `None` for records that are not objects.
pub fn normalize(raw: Value, ids: &mut FallbackIds) -> Option<Normalized> {
    let original = raw.clone();
    let entry = match RecordShape::classify(raw) {
        RecordShape::Current(fields) => {
            let id = read_id(&fields).unwrap_or_else(|| ids.issue());
            build(&fields, id, current_companions(&fields))
        }
        RecordShape::Legacy(fields) => {
            let id = read_id(&fields).unwrap_or_else(|| ids.issue());
            build(&fields, id, legacy_companions(&fields))
        }
        RecordShape::Invalid(_) => return None,
    };
    let changed = serde_json::to_value(&entry).map_or(true, |written| written != original);
    Some(Normalized { entry, changed })
}

/// Run the pass over a stored list.
pub fn migrate_entries(raw: Vec<Value>, now_millis: i64) -> MigrationReport {
    let mut ids = FallbackIds::new(now_millis);
    let mut report = MigrationReport::default();
    for value in raw {
        match normalize(value, &mut ids) {
            Some(Normalized { entry, changed }) => {
                if changed {
                    report.changed += 1;
                }
                report.entries.push(entry);
            }
            None => report.dropped += 1,
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(value: Value) -> Normalized {
        normalize(value, &mut FallbackIds::new(1_700_000_000_000)).unwrap()
    }

    #[test]
    fn empty_legacy_companions_become_solo() {
        let out = run(json!({"id": "1", "city": "Paris", "companions": ""}));
        assert_eq!(out.entry.companion_type, CompanionType::Solo);
        assert_eq!(out.entry.companions, "");
        assert!(out.changed);
    }

    #[test]
    fn named_legacy_companions_become_custom() {
        let out = run(json!({"id": "1", "companions": "엄마, 아빠"}));
        assert_eq!(out.entry.companion_type, CompanionType::Custom);
        assert_eq!(out.entry.companions, "엄마, 아빠");
    }

    #[test]
    fn whitespace_legacy_companions_stay_custom() {
        let out = run(json!({"id": "1", "companions": "   "}));
        assert_eq!(out.entry.companion_type, CompanionType::Custom);
        assert_eq!(out.entry.companions, "   ");
    }

    #[test]
    fn legacy_companion_lists_are_joined() {
        let out = run(json!({"id": "1", "companions": ["엄마", "아빠"]}));
        assert_eq!(out.entry.companion_type, CompanionType::Custom);
        assert_eq!(out.entry.companions, "엄마, 아빠");
        assert!(out.changed);

        let out = run(json!({"id": "2", "companions": []}));
        assert_eq!(out.entry.companion_type, CompanionType::Solo);
    }

    #[test]
    fn unreadable_legacy_companions_are_kept_aside() {
        let raw = json!({"id": "1", "companions": {"names": ["엄마"]}});
        let out = run(raw);
        assert_eq!(out.entry.companion_type, CompanionType::Unset);
        assert_eq!(
            out.entry.extra.get(LEGACY_COMPANIONS_FIELD),
            Some(&json!({"names": ["엄마"]}))
        );

        let again = run(serde_json::to_value(&out.entry).unwrap());
        assert!(!again.changed);
        assert_eq!(again.entry.extra, out.entry.extra);
    }

    #[test]
    fn missing_companions_leave_type_unset_but_present() {
        let out = run(json!({"id": "1"}));
        assert_eq!(out.entry.companion_type, CompanionType::Unset);
        let written = serde_json::to_value(&out.entry).unwrap();
        assert_eq!(written["companionType"], json!(""));
    }

    #[test]
    fn missing_ids_get_timestamp_fallbacks() {
        let report = migrate_entries(vec![json!({"city": "Rome"}), json!({"city": "Oslo"})], 77);
        assert_eq!(report.changed, 2);
        let ids: Vec<&str> = report.entries.iter().map(|e| e.id.as_str()).collect();
        assert!(ids.iter().all(|id| id.starts_with("77")));
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn numeric_ids_and_string_ratings_are_coerced() {
        let out = run(json!({"id": 1_699_999, "rating": "4", "companionType": "solo"}));
        assert_eq!(out.entry.id, "1699999");
        assert_eq!(out.entry.rating, Some(4));
        let out = run(json!({"id": "x", "rating": 9, "companionType": "solo"}));
        assert_eq!(out.entry.rating, Some(5));
    }

    #[test]
    fn unknown_companion_tags_become_custom() {
        let out = run(json!({"id": "1", "companionType": "pets", "companions": "콩이"}));
        assert_eq!(out.entry.companion_type, CompanionType::Custom);
        assert_eq!(out.entry.companions, "콩이");
    }

    #[test]
    fn extra_fields_survive() {
        let out = run(json!({"id": "1", "companionType": "", "lat": 35.6, "lng": 139.7}));
        assert_eq!(out.entry.extra.get("lat"), Some(&json!(35.6)));
        let again = run(serde_json::to_value(&out.entry).unwrap());
        assert!(!again.changed);
        assert_eq!(again.entry, out.entry);
    }

    #[test]
    fn non_objects_are_dropped() {
        let report = migrate_entries(vec![json!(3), json!(null), json!({"id": "a"})], 1);
        assert_eq!(report.dropped, 2);
        assert_eq!(report.entries.len(), 1);
        assert!(report.needs_save());
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let raw = vec![
            json!({"city": "Tokyo", "companions": "친구"}),
            json!({"id": "5", "companions": ""}),
            json!({"id": "6", "companionType": "family", "companions": "가족", "rating": 3}),
        ];
        let first = migrate_entries(raw, 1_000);
        let rewritten: Vec<Value> = first
            .entries
            .iter()
            .map(|e| serde_json::to_value(e).unwrap())
            .collect();
        let second = migrate_entries(rewritten, 2_000);
        assert_eq!(second.changed, 0);
        assert_eq!(second.dropped, 0);
        assert_eq!(second.entries, first.entries);
    }
}
