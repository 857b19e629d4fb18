//! Configuration validation
//!
//! [`validate_config`] walks a configuration object against a [`Block`] and
//! reports every problem as a [`Diagnostic`] instead of stopping at the
//! first one.

use crate::duration::{CalendarDuration, parse_go_duration};
use crate::schema::{Attribute, AttributeType, Block, Element};
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A validation finding, optionally tied to an attribute path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(attribute: Option<&str>, summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            attribute: attribute.map(str::to_string),
        }
    }

    pub fn warning(attribute: Option<&str>, summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            attribute: attribute.map(str::to_string),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)
    }
}

/// True if any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Signature of a custom validator: returns an error message for bad values.
pub type CustomCheck = fn(key: &str, value: &Value) -> Option<String>;

/// Value validators attached to primitive attributes
///
/// For list and set attributes with primitive elements the validators apply
/// to each element.
#[derive(Debug, Clone)]
pub enum Validator {
    StringLenBetween(usize, usize),
    StringInSlice(&'static [&'static str]),
    StringDoesNotMatch {
        pattern: &'static str,
        message: &'static str,
    },
    IntAtLeast(i64),
    IntBetween(i64, i64),
    /// Like `IntAtLeast`, but an unset value (`null` / `""`) is accepted.
    NullableIntAtLeast(i64),
    AccountId,
    Arn,
    Rfc3339Timestamp,
    /// Go duration or ISO-8601 duration
    Duration,
    Json,
    Custom {
        name: &'static str,
        check: CustomCheck,
    },
}

impl PartialEq for Validator {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::StringLenBetween(min, max) => write!(f, "length between {min} and {max}"),
            Validator::StringInSlice(values) => write!(f, "one of {}", values.join(", ")),
            Validator::StringDoesNotMatch { message, .. } => write!(f, "{message}"),
            Validator::IntAtLeast(min) => write!(f, "at least {min}"),
            Validator::IntBetween(min, max) => write!(f, "between {min} and {max}"),
            Validator::NullableIntAtLeast(min) => write!(f, "unset or at least {min}"),
            Validator::AccountId => write!(f, "12-digit AWS account ID"),
            Validator::Arn => write!(f, "ARN"),
            Validator::Rfc3339Timestamp => write!(f, "RFC3339 timestamp"),
            Validator::Duration => write!(f, "duration"),
            Validator::Json => write!(f, "JSON document"),
            Validator::Custom { name, .. } => write!(f, "{name}"),
        }
    }
}

impl Serialize for Validator {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl Validator {
    /// Checks a single value; returns the error message if it is invalid.
    pub fn check(&self, key: &str, value: &Value) -> Option<String> {
        match self {
            Validator::StringLenBetween(min, max) => {
                let s = value.as_str()?;
                let len = s.chars().count();
                (len < *min || len > *max).then(|| {
                    format!("expected length of {key} to be in the range ({min} - {max}), got {s}")
                })
            }
            Validator::StringInSlice(values) => {
                let s = value.as_str()?;
                (!values.contains(&s))
                    .then(|| format!("expected {key} to be one of {values:?}, got {s}"))
            }
            Validator::StringDoesNotMatch { pattern, message } => {
                let s = value.as_str()?;
                match Regex::new(pattern) {
                    Ok(re) if re.is_match(s) => Some(format!("invalid value for {key} ({message})")),
                    Ok(_) => None,
                    Err(err) => Some(format!("invalid pattern for {key}: {err}")),
                }
            }
            Validator::IntAtLeast(min) => {
                let n = as_int(value)?;
                (n < *min).then(|| format!("expected {key} to be at least ({min}), got {n}"))
            }
            Validator::IntBetween(min, max) => {
                let n = as_int(value)?;
                (n < *min || n > *max)
                    .then(|| format!("expected {key} to be in the range ({min} - {max}), got {n}"))
            }
            Validator::NullableIntAtLeast(min) => match nullable_int(value) {
                Some(None) => None,
                Some(Some(n)) if n < *min => {
                    Some(format!("expected {key} to be at least ({min}), got {n}"))
                }
                Some(Some(_)) => None,
                None => Some(format!("{key}: cannot parse {value} as int")),
            },
            Validator::AccountId => {
                let s = value.as_str()?;
                let valid = s.len() == 12 && s.chars().all(|c| c.is_ascii_digit());
                (!valid).then(|| format!("{key} ({s}) must be a 12-digit AWS account ID"))
            }
            Validator::Arn => {
                let s = value.as_str()?;
                (!is_arn(s)).then(|| format!("{key} ({s}) is an invalid ARN"))
            }
            Validator::Rfc3339Timestamp => {
                let s = value.as_str()?;
                chrono::DateTime::parse_from_rfc3339(s)
                    .err()
                    .map(|err| format!("{key} ({s}) cannot be parsed as RFC3339 Timestamp Format: {err}"))
            }
            Validator::Duration => {
                let s = value.as_str()?;
                CalendarDuration::parse(s)
                    .err()
                    .map(|err| format!("{key} ({s}) is not a valid duration: {err}"))
            }
            Validator::Json => {
                let s = value.as_str()?;
                serde_json::from_str::<Value>(s)
                    .err()
                    .map(|err| format!("{key} contains an invalid JSON: {err}"))
            }
            Validator::Custom { check, .. } => check(key, value),
        }
    }
}

fn as_int(value: &Value) -> Option<i64> {
    value.as_i64()
}

/// Reads a nullable int. The outer `None` means the value is not an int at
/// all; `Some(None)` is an unset value (`null` or `""`).
pub fn nullable_int(value: &Value) -> Option<Option<i64>> {
    match value {
        Value::Null => Some(None),
        Value::String(s) if s.is_empty() => Some(None),
        Value::String(s) => s.parse().ok().map(Some),
        Value::Number(n) => n.as_i64().map(Some),
        _ => None,
    }
}

fn is_arn(s: &str) -> bool {
    let parts: Vec<&str> = s.splitn(6, ':').collect();
    parts.len() == 6
        && parts[0] == "arn"
        && !parts[1].is_empty()
        && !parts[2].is_empty()
        && !parts[5].is_empty()
}

/// Validates a configuration object against a schema block.
pub fn validate_config(block: &Block, config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    match config {
        Value::Object(obj) => {
            if let Some(timeouts) = obj.get("timeouts") {
                validate_timeouts(timeouts, &mut diagnostics);
            }
            validate_block(block, obj, "", true, &mut diagnostics);
        }
        _ => diagnostics.push(Diagnostic::error(None, "configuration must be an object")),
    }
    diagnostics
}

fn validate_timeouts(value: &Value, diagnostics: &mut Vec<Diagnostic>) {
    let Some(obj) = value.as_object() else {
        diagnostics.push(Diagnostic::error(
            Some("timeouts"),
            "timeouts must be an object",
        ));
        return;
    };
    for (key, value) in obj {
        let path = format!("timeouts.{key}");
        if !matches!(key.as_str(), "create" | "read" | "update" | "delete") {
            diagnostics.push(Diagnostic::error(
                Some(&path),
                format!("An argument named \"{key}\" is not expected here."),
            ));
            continue;
        }
        let parsed = value
            .as_str()
            .ok_or_else(|| "string required".to_string())
            .and_then(parse_go_duration);
        if let Err(err) = parsed {
            diagnostics.push(Diagnostic::error(
                Some(&path),
                format!("invalid timeout for {path}: {err}"),
            ));
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn is_set(obj: &Map<String, Value>, name: &str) -> bool {
    match obj.get(name) {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

fn push_unique(diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    if !diagnostics.contains(&diagnostic) {
        diagnostics.push(diagnostic);
    }
}

fn validate_block(
    block: &Block,
    obj: &Map<String, Value>,
    prefix: &str,
    top_level: bool,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for key in obj.keys() {
        if top_level && (key == "timeouts" || key == "id") {
            continue;
        }
        if block.get(key).is_none() {
            let path = join_path(prefix, key);
            diagnostics.push(Diagnostic::error(
                Some(&path),
                format!("An argument named \"{key}\" is not expected here."),
            ));
        }
    }

    for (name, attr) in block.iter() {
        let path = join_path(prefix, name);
        match obj.get(name.as_str()).filter(|v| !v.is_null()) {
            None => {
                if attr.required {
                    diagnostics.push(Diagnostic::error(
                        Some(&path),
                        format!("The argument \"{path}\" is required, but no definition was found."),
                    ));
                }
            }
            Some(value) => {
                if attr.is_computed_only() {
                    diagnostics.push(Diagnostic::error(
                        Some(&path),
                        format!("Value for unconfigurable attribute: \"{path}\" is computed-only"),
                    ));
                    continue;
                }
                if let Some(message) = &attr.deprecated {
                    diagnostics.push(Diagnostic::warning(
                        Some(&path),
                        format!("Argument \"{path}\" is deprecated: {message}"),
                    ));
                }
                validate_value(&attr.ty, attr, value, &path, diagnostics);
            }
        }
        validate_constraints(name, attr, obj, prefix, diagnostics);
    }
}

fn validate_constraints(
    name: &str,
    attr: &Attribute,
    obj: &Map<String, Value>,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let path = join_path(prefix, name);
    if is_set(obj, name) {
        for other in &attr.conflicts_with {
            if is_set(obj, other) {
                diagnostics.push(Diagnostic::error(
                    Some(&path),
                    format!("\"{path}\": conflicts with {}", join_path(prefix, other)),
                ));
            }
        }
        if attr.required_with.iter().any(|other| !is_set(obj, other)) {
            let mut all = vec![name.to_string()];
            all.extend(attr.required_with.iter().cloned());
            diagnostics.push(Diagnostic::error(
                Some(&path),
                format!("\"{path}\": all of `{}` must be specified", all.join(",")),
            ));
        }
    }

    if !attr.exactly_one_of.is_empty() {
        let group = attr.exactly_one_of.join(",");
        let specified: Vec<&str> = attr
            .exactly_one_of
            .iter()
            .filter(|n| is_set(obj, n))
            .map(String::as_str)
            .collect();
        if specified.is_empty() {
            push_unique(
                diagnostics,
                Diagnostic::error(None, format!("one of `{group}` must be specified")),
            );
        } else if specified.len() > 1 {
            push_unique(
                diagnostics,
                Diagnostic::error(
                    None,
                    format!(
                        "only one of `{group}` can be specified, but `{}` were specified.",
                        specified.join(",")
                    ),
                ),
            );
        }
    }

    if !attr.at_least_one_of.is_empty() && !attr.at_least_one_of.iter().any(|n| is_set(obj, n)) {
        push_unique(
            diagnostics,
            Diagnostic::error(
                None,
                format!(
                    "one of `{}` must be specified",
                    attr.at_least_one_of.join(",")
                ),
            ),
        );
    }
}

fn type_error(path: &str, expected: &str, diagnostics: &mut Vec<Diagnostic>) {
    diagnostics.push(Diagnostic::error(
        Some(path),
        format!("Inappropriate value for attribute \"{path}\": {expected} required."),
    ));
}

fn run_validators(attr: &Attribute, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    for validator in &attr.validators {
        if let Some(message) = validator.check(path, value) {
            diagnostics.push(Diagnostic::error(Some(path), message));
        }
    }
}

fn validate_value(
    ty: &AttributeType,
    attr: &Attribute,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match ty {
        AttributeType::String => match value {
            Value::String(_) => run_validators(attr, value, path, diagnostics),
            _ => type_error(path, "string", diagnostics),
        },
        AttributeType::Int => {
            if value.as_i64().is_some() {
                run_validators(attr, value, path, diagnostics);
            } else {
                type_error(path, "number", diagnostics);
            }
        }
        AttributeType::Float => {
            if value.is_number() {
                run_validators(attr, value, path, diagnostics);
            } else {
                type_error(path, "number", diagnostics);
            }
        }
        AttributeType::Bool => {
            if value.is_boolean() {
                run_validators(attr, value, path, diagnostics);
            } else {
                type_error(path, "bool", diagnostics);
            }
        }
        AttributeType::NullableInt => {
            if nullable_int(value).is_some() {
                run_validators(attr, value, path, diagnostics);
            } else {
                type_error(path, "number", diagnostics);
            }
        }
        AttributeType::List(elem) | AttributeType::Set(elem) => {
            let Value::Array(items) = value else {
                let kind = if ty.is_set() { "set" } else { "list" };
                type_error(path, kind, diagnostics);
                return;
            };
            if let Some(max) = attr.max_items.filter(|max| items.len() > *max) {
                diagnostics.push(Diagnostic::error(
                    Some(path),
                    format!(
                        "Too many list items: Attribute \"{path}\" supports {max} item maximum, but config has {} declared.",
                        items.len()
                    ),
                ));
            }
            if let Some(min) = attr.min_items.filter(|min| items.len() < *min) {
                diagnostics.push(Diagnostic::error(
                    Some(path),
                    format!(
                        "Not enough list items: Attribute \"{path}\" requires {min} item minimum, but config has only {} declared.",
                        items.len()
                    ),
                ));
            }
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{path}.{i}");
                match elem {
                    Element::Primitive(elem_ty) => {
                        validate_value(elem_ty, attr, item, &item_path, diagnostics)
                    }
                    Element::Block(block) => match item {
                        Value::Object(obj) => {
                            validate_block(block, obj, &item_path, false, diagnostics)
                        }
                        _ => type_error(&item_path, "object", diagnostics),
                    },
                }
            }
        }
        AttributeType::Map(value_ty) => {
            let Value::Object(obj) = value else {
                type_error(path, "map", diagnostics);
                return;
            };
            for (key, item) in obj {
                validate_value(value_ty, attr, item, &format!("{path}.{key}"), diagnostics);
            }
        }
    }
}
