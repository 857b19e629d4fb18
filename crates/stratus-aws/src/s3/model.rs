//! Lifecycle rule types and their expand/flatten mappings

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use stratus_core::KeyValueTags;
use stratus_core::validation::nullable_int;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecycleRule {
    pub id: Option<String>,
    /// `Enabled` or `Disabled`
    pub status: String,
    /// Legacy rule-level prefix
    pub prefix: Option<String>,
    pub filter: Option<LifecycleRuleFilter>,
    pub expiration: Option<LifecycleExpiration>,
    pub abort_incomplete_multipart_upload: Option<AbortIncompleteMultipartUpload>,
    pub noncurrent_version_expiration: Option<NoncurrentVersionExpiration>,
    pub noncurrent_version_transitions: Option<Vec<NoncurrentVersionTransition>>,
    pub transitions: Option<Vec<Transition>>,
}

/// Rule filter. The API accepts exactly one member.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleRuleFilter {
    And(LifecycleRuleAndOperator),
    ObjectSizeGreaterThan(i64),
    ObjectSizeLessThan(i64),
    Prefix(String),
    Tag(Tag),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecycleRuleAndOperator {
    pub object_size_greater_than: Option<i64>,
    pub object_size_less_than: Option<i64>,
    pub prefix: Option<String>,
    pub tags: Option<KeyValueTags>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecycleExpiration {
    pub date: Option<DateTime<Utc>>,
    pub days: Option<i32>,
    pub expired_object_delete_marker: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbortIncompleteMultipartUpload {
    pub days_after_initiation: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoncurrentVersionExpiration {
    pub newer_noncurrent_versions: Option<i32>,
    pub noncurrent_days: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoncurrentVersionTransition {
    pub newer_noncurrent_versions: Option<i32>,
    pub noncurrent_days: Option<i32>,
    pub storage_class: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    pub date: Option<DateTime<Utc>>,
    pub days: Option<i32>,
    pub storage_class: String,
}

/// Two rule lists are equal when they have the same length and every rule
/// in `a` has a counterpart in `b` with the same ID and status.
pub fn lifecycle_rules_equal(a: &[LifecycleRule], b: &[LifecycleRule]) -> bool {
    let id = |r: &LifecycleRule| r.id.clone().unwrap_or_default();
    a.len() == b.len()
        && a
            .iter()
            .all(|r1| b.iter().any(|r2| id(r1) == id(r2) && r1.status == r2.status))
}

// ---------------------------------------------------------------------------
// expand: attribute values -> rules
// ---------------------------------------------------------------------------

pub fn expand_lifecycle_rules(rules: &[Value]) -> Vec<LifecycleRule> {
    rules
        .iter()
        .filter_map(Value::as_object)
        .map(expand_lifecycle_rule)
        .collect()
}

fn expand_lifecycle_rule(m: &Map<String, Value>) -> LifecycleRule {
    let mut rule = LifecycleRule {
        id: get_str(m, "id").map(str::to_string),
        status: get_str(m, "status").unwrap_or_default().to_string(),
        ..Default::default()
    };

    if let Some(abort) = first_block(m, "abort_incomplete_multipart_upload") {
        rule.abort_incomplete_multipart_upload = Some(AbortIncompleteMultipartUpload {
            days_after_initiation: get_i32(abort, "days_after_initiation"),
        });
    }

    if has_items(m, "expiration") {
        rule.expiration = Some(
            first_block(m, "expiration")
                .map(expand_expiration)
                .unwrap_or_default(),
        );
    }

    if has_items(m, "filter") {
        rule.filter = Some(
            first_block(m, "filter")
                .map(expand_filter)
                .unwrap_or_else(|| LifecycleRuleFilter::Prefix(String::new())),
        );
    }

    if rule.filter.is_none() {
        // Without a filter block, an empty prefix still goes out as an
        // empty-prefix filter; only a real prefix uses the legacy field.
        match get_str(m, "prefix").unwrap_or_default() {
            "" => rule.filter = Some(LifecycleRuleFilter::Prefix(String::new())),
            prefix => rule.prefix = Some(prefix.to_string()),
        }
    }

    if let Some(nve) = first_block(m, "noncurrent_version_expiration") {
        rule.noncurrent_version_expiration = Some(NoncurrentVersionExpiration {
            newer_noncurrent_versions: get_nullable_i32(nve, "newer_noncurrent_versions")
                .filter(|v| *v > 0),
            noncurrent_days: get_i32(nve, "noncurrent_days"),
        });
    }

    if has_items(m, "noncurrent_version_transition") {
        rule.noncurrent_version_transitions = Some(
            items(m, "noncurrent_version_transition")
                .map(|t| NoncurrentVersionTransition {
                    newer_noncurrent_versions: get_nullable_i32(t, "newer_noncurrent_versions")
                        .filter(|v| *v > 0),
                    noncurrent_days: get_i32(t, "noncurrent_days"),
                    storage_class: get_str(t, "storage_class").unwrap_or_default().to_string(),
                })
                .collect(),
        );
    }

    if has_items(m, "transition") {
        rule.transitions = Some(
            items(m, "transition")
                .map(|t| {
                    let date = get_date(t, "date");
                    // `date` and `days` are exclusive; an unset `days` is 0.
                    let days = match date {
                        Some(_) => None,
                        None => Some(get_i32(t, "days").unwrap_or(0)).filter(|d| *d >= 0),
                    };
                    Transition {
                        date,
                        days,
                        storage_class: get_str(t, "storage_class").unwrap_or_default().to_string(),
                    }
                })
                .collect(),
        );
    }

    rule
}

fn expand_expiration(m: &Map<String, Value>) -> LifecycleExpiration {
    let date = get_date(m, "date");
    let days = get_i32(m, "days").filter(|d| *d > 0);
    // The delete marker flag cannot be combined with a date or days.
    let expired_object_delete_marker = match (date, days) {
        (None, None) => Some(get_bool(m, "expired_object_delete_marker").unwrap_or(false)),
        _ => None,
    };
    LifecycleExpiration {
        date,
        days,
        expired_object_delete_marker,
    }
}

/// Later members override earlier ones: and, size greater than, size less
/// than, tag. The prefix is used only when nothing else is set.
fn expand_filter(m: &Map<String, Value>) -> LifecycleRuleFilter {
    let mut filter = None;

    if let Some(and) = first_block(m, "and") {
        filter = Some(LifecycleRuleFilter::And(expand_and_operator(and)));
    }

    if let Some(v) = get_nullable_i64(m, "object_size_greater_than").filter(|v| *v >= 0) {
        filter = Some(LifecycleRuleFilter::ObjectSizeGreaterThan(v));
    }

    if let Some(v) = get_nullable_i64(m, "object_size_less_than").filter(|v| *v > 0) {
        filter = Some(LifecycleRuleFilter::ObjectSizeLessThan(v));
    }

    if let Some(tag) = first_block(m, "tag") {
        filter = Some(LifecycleRuleFilter::Tag(Tag {
            key: get_str(tag, "key").unwrap_or_default().to_string(),
            value: get_str(tag, "value").unwrap_or_default().to_string(),
        }));
    }

    filter.unwrap_or_else(|| {
        LifecycleRuleFilter::Prefix(get_str(m, "prefix").unwrap_or_default().to_string())
    })
}

fn expand_and_operator(m: &Map<String, Value>) -> LifecycleRuleAndOperator {
    let tags = KeyValueTags::from_value(m.get("tags")).ignore_aws();
    LifecycleRuleAndOperator {
        object_size_greater_than: get_i64(m, "object_size_greater_than").filter(|v| *v > 0),
        object_size_less_than: get_i64(m, "object_size_less_than").filter(|v| *v > 0),
        prefix: get_str(m, "prefix").map(str::to_string),
        tags: (!tags.is_empty()).then_some(tags),
    }
}

// ---------------------------------------------------------------------------
// flatten: rules -> attribute values
// ---------------------------------------------------------------------------

pub fn flatten_lifecycle_rules(rules: &[LifecycleRule]) -> Value {
    Value::Array(rules.iter().map(flatten_lifecycle_rule).collect())
}

fn flatten_lifecycle_rule(rule: &LifecycleRule) -> Value {
    let mut m = Map::new();
    m.insert("status".into(), json!(rule.status));

    if let Some(abort) = &rule.abort_incomplete_multipart_upload {
        let mut a = Map::new();
        insert_opt(&mut a, "days_after_initiation", abort.days_after_initiation);
        m.insert("abort_incomplete_multipart_upload".into(), json!([a]));
    }

    if let Some(expiration) = &rule.expiration {
        let mut e = Map::new();
        insert_opt(&mut e, "date", expiration.date.map(format_date));
        insert_opt(&mut e, "days", expiration.days);
        insert_opt(
            &mut e,
            "expired_object_delete_marker",
            expiration.expired_object_delete_marker,
        );
        m.insert("expiration".into(), json!([e]));
    }

    if let Some(filter) = &rule.filter {
        m.insert("filter".into(), json!([flatten_filter(filter)]));
    }

    insert_opt(&mut m, "id", rule.id.clone());

    if let Some(nve) = &rule.noncurrent_version_expiration {
        let mut e = Map::new();
        insert_opt(&mut e, "newer_noncurrent_versions", nve.newer_noncurrent_versions);
        insert_opt(&mut e, "noncurrent_days", nve.noncurrent_days);
        m.insert("noncurrent_version_expiration".into(), json!([e]));
    }

    if let Some(transitions) = &rule.noncurrent_version_transitions {
        let items: Vec<Value> = transitions
            .iter()
            .map(|t| {
                let mut e = Map::new();
                e.insert("storage_class".into(), json!(t.storage_class));
                insert_opt(&mut e, "newer_noncurrent_versions", t.newer_noncurrent_versions);
                insert_opt(&mut e, "noncurrent_days", t.noncurrent_days);
                Value::Object(e)
            })
            .collect();
        m.insert("noncurrent_version_transition".into(), Value::Array(items));
    }

    insert_opt(&mut m, "prefix", rule.prefix.clone());

    if let Some(transitions) = &rule.transitions {
        let items: Vec<Value> = transitions
            .iter()
            .map(|t| {
                let mut e = Map::new();
                e.insert("days".into(), json!(t.days));
                e.insert("storage_class".into(), json!(t.storage_class));
                insert_opt(&mut e, "date", t.date.map(format_date));
                Value::Object(e)
            })
            .collect();
        m.insert("transition".into(), Value::Array(items));
    }

    Value::Object(m)
}

fn flatten_filter(filter: &LifecycleRuleFilter) -> Value {
    match filter {
        LifecycleRuleFilter::And(and) => {
            let mut a = Map::new();
            a.insert(
                "object_size_greater_than".into(),
                json!(and.object_size_greater_than),
            );
            a.insert("object_size_less_than".into(), json!(and.object_size_less_than));
            insert_opt(&mut a, "prefix", and.prefix.clone());
            if let Some(tags) = &and.tags {
                a.insert("tags".into(), tags.clone().ignore_aws().to_value());
            }
            json!({ "and": [a] })
        }
        LifecycleRuleFilter::ObjectSizeGreaterThan(v) => json!({ "object_size_greater_than": v }),
        LifecycleRuleFilter::ObjectSizeLessThan(v) => json!({ "object_size_less_than": v }),
        LifecycleRuleFilter::Prefix(p) => json!({ "prefix": p }),
        LifecycleRuleFilter::Tag(tag) => json!({ "tag": [{ "key": tag.key, "value": tag.value }] }),
    }
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn insert_opt<T: Into<Value>>(m: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(v) = value {
        m.insert(key.to_string(), v.into());
    }
}

// ---------------------------------------------------------------------------
// attribute accessors
// ---------------------------------------------------------------------------

fn has_items(m: &Map<String, Value>, key: &str) -> bool {
    m.get(key)
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty())
}

/// First element of a nested block list, if it is a non-empty object.
fn first_block<'a>(m: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    m.get(key)
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(Value::as_object)
        .filter(|block| !block.is_empty())
}

fn items<'a>(m: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Map<String, Value>> {
    m.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn get_str<'a>(m: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    m.get(key).and_then(Value::as_str)
}

fn get_bool(m: &Map<String, Value>, key: &str) -> Option<bool> {
    m.get(key).and_then(Value::as_bool)
}

fn get_i64(m: &Map<String, Value>, key: &str) -> Option<i64> {
    m.get(key).and_then(Value::as_i64)
}

fn get_i32(m: &Map<String, Value>, key: &str) -> Option<i32> {
    get_i64(m, key).and_then(|v| i32::try_from(v).ok())
}

fn get_nullable_i64(m: &Map<String, Value>, key: &str) -> Option<i64> {
    m.get(key).and_then(nullable_int).flatten()
}

fn get_nullable_i32(m: &Map<String, Value>, key: &str) -> Option<i32> {
    get_nullable_i64(m, key).and_then(|v| i32::try_from(v).ok())
}

fn get_date(m: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    get_str(m, key)
        .filter(|s| !s.is_empty())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}
