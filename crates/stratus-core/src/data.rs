//! Per-operation resource data
//!
//! [`ResourceData`] is what a resource handler works with: the prior state,
//! the values being applied, the resource ID and the effective timeouts.

use crate::duration::parse_go_duration;
use crate::schema::{Operation, ResourceSchema, Timeouts};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ResourceData {
    id: String,
    prior: Value,
    values: Map<String, Value>,
    new_resource: bool,
    timeouts: Timeouts,
}

impl ResourceData {
    /// Data for a create: no prior state, values are the planned config.
    pub fn new(schema: &ResourceSchema, planned: &Value) -> Self {
        Self {
            id: String::new(),
            prior: Value::Null,
            values: as_object(planned),
            new_resource: true,
            timeouts: effective_timeouts(schema, planned),
        }
    }

    /// Data for a read or delete of existing state.
    pub fn from_state(schema: &ResourceSchema, state: &Value) -> Self {
        Self {
            id: state_id(state),
            prior: state.clone(),
            values: as_object(state),
            new_resource: false,
            timeouts: effective_timeouts(schema, state),
        }
    }

    /// Data for an in-place update from `prior` to `planned`.
    pub fn for_update(schema: &ResourceSchema, prior: &Value, planned: &Value) -> Self {
        Self {
            id: state_id(prior),
            prior: prior.clone(),
            values: as_object(planned),
            new_resource: false,
            timeouts: effective_timeouts(schema, planned),
        }
    }

    /// Data for an import: only the ID is known.
    pub fn for_import(schema: &ResourceSchema, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prior: Value::Null,
            values: Map::new(),
            new_resource: false,
            timeouts: schema.timeouts,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Marks the object as gone; the host drops it from state.
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn is_new_resource(&self) -> bool {
        self.new_resource
    }

    pub fn timeout(&self, op: Operation) -> Duration {
        self.timeouts.get(op)
    }

    /// Looks up a value by dotted path (`"options.0.certificate_transparency_logging_preference"`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let root = self.values.get(first)?;
        lookup(root, parts)
    }

    pub fn get_str(&self, path: &str) -> &str {
        self.get(path).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn get_i64(&self, path: &str) -> i64 {
        self.get(path).and_then(Value::as_i64).unwrap_or_default()
    }

    pub fn get_bool(&self, path: &str) -> bool {
        self.get(path).and_then(Value::as_bool).unwrap_or_default()
    }

    pub fn get_list(&self, path: &str) -> &[Value] {
        match self.get(path) {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    pub fn get_string_list(&self, path: &str) -> Vec<String> {
        self.get_list(path)
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }

    pub fn get_string_set(&self, path: &str) -> BTreeSet<String> {
        self.get_string_list(path).into_iter().collect()
    }

    pub fn get_string_map(&self, path: &str) -> BTreeMap<String, String> {
        match self.get(path) {
            Some(Value::Object(obj)) => obj
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    /// Prior and current value of an attribute.
    pub fn get_change(&self, path: &str) -> (Option<&Value>, Option<&Value>) {
        let mut parts = path.split('.');
        let old = parts
            .next()
            .and_then(|first| self.prior.get(first))
            .and_then(|root| lookup(root, parts));
        (old.filter(|v| !v.is_null()), self.get(path).filter(|v| !v.is_null()))
    }

    pub fn has_change(&self, path: &str) -> bool {
        let (old, new) = self.get_change(path);
        old != new
    }

    pub fn has_changes(&self, paths: &[&str]) -> bool {
        paths.iter().any(|path| self.has_change(path))
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Current values as a JSON object, including `id`.
    pub fn state(&self) -> Value {
        let mut values = self.values.clone();
        values.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(values)
    }

    /// New state for the host, or `None` if the object is gone.
    pub fn into_state(self) -> Option<Value> {
        if self.id.is_empty() {
            return None;
        }
        let mut values = self.values;
        values.insert("id".to_string(), Value::String(self.id));
        Some(Value::Object(values))
    }
}

fn lookup<'a, 'p>(root: &'a Value, parts: impl Iterator<Item = &'p str>) -> Option<&'a Value> {
    let mut current = root;
    for part in parts {
        current = match current {
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            Value::Object(obj) => obj.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn as_object(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(obj) => obj.clone(),
        _ => Map::new(),
    }
}

fn state_id(state: &Value) -> String {
    state
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn effective_timeouts(schema: &ResourceSchema, values: &Value) -> Timeouts {
    let mut timeouts = schema.timeouts;
    if let Some(Value::Object(configured)) = values.get("timeouts") {
        for op in [
            Operation::Create,
            Operation::Read,
            Operation::Update,
            Operation::Delete,
        ] {
            if let Some(d) = configured
                .get(op.as_str())
                .and_then(Value::as_str)
                .and_then(|s| parse_go_duration(s).ok())
            {
                timeouts.set(op, d);
            }
        }
    }
    timeouts
}
