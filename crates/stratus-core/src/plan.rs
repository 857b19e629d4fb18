//! Planning: diff a configuration against prior state

use crate::resource::Resource;
use crate::schema::{AttributeType, Block, Element};
use crate::validation::nullable_int;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource in place
    Update,
    /// Delete and re-create (a `force_new` attribute changed)
    Replace,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// A changed top-level attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub path: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub requires_replace: bool,
    pub sensitive: bool,
}

/// Planned change for one resource instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceChange {
    /// Resource type (e.g. `aws_s3_bucket_lifecycle_configuration`)
    pub resource_type: String,

    pub action: ActionType,

    pub changes: Vec<AttributeChange>,

    pub prior: Option<Value>,

    /// Config with defaults and prior computed values filled in
    pub planned: Option<Value>,
}

impl ResourceChange {
    /// Turns an in-place update (or no-op) of a tainted object into a replace.
    pub fn force_replace(&mut self) {
        if matches!(self.action, ActionType::NoOp | ActionType::Update) {
            self.action = ActionType::Replace;
        }
    }

    /// Paths whose change forces replacement
    pub fn requires_replace(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.requires_replace)
            .map(|c| c.path.as_str())
            .collect()
    }
}

/// Computes the change needed to move `prior` to `config`.
///
/// `config` of `None` plans a delete. The config is assumed to be valid.
pub fn plan_resource(
    resource: &dyn Resource,
    prior: Option<&Value>,
    config: Option<&Value>,
) -> ResourceChange {
    let resource_type = resource.type_name().to_string();
    let Some(config) = config else {
        return ResourceChange {
            resource_type,
            action: if prior.is_some() {
                ActionType::Delete
            } else {
                ActionType::NoOp
            },
            changes: Vec::new(),
            prior: prior.cloned(),
            planned: None,
        };
    };

    let schema = resource.schema();
    let mut planned = planned_value(&schema.block, prior, config);

    let Some(prior) = prior else {
        return ResourceChange {
            resource_type,
            action: ActionType::Create,
            changes: Vec::new(),
            prior: None,
            planned: Some(planned),
        };
    };

    resource.customize_plan(prior, &mut planned);
    let changes = diff(resource, &schema.block, prior, &planned);
    let action = if changes.is_empty() {
        ActionType::NoOp
    } else if changes.iter().any(|c| c.requires_replace) {
        ActionType::Replace
    } else {
        ActionType::Update
    };

    ResourceChange {
        resource_type,
        action,
        changes,
        prior: Some(prior.clone()),
        planned: Some(planned),
    }
}

/// Config plus schema defaults plus prior values of computed attributes.
pub fn planned_value(block: &Block, prior: Option<&Value>, config: &Value) -> Value {
    let empty = Map::new();
    let config_obj = config.as_object().unwrap_or(&empty);
    let prior_obj = prior.and_then(Value::as_object);

    let mut planned = plan_block(block, prior_obj, config_obj);
    if let Some(timeouts) = config_obj.get("timeouts") {
        planned.insert("timeouts".to_string(), timeouts.clone());
    }
    if let Some(id) = prior_obj.and_then(|p| p.get("id")) {
        planned.insert("id".to_string(), id.clone());
    }
    Value::Object(planned)
}

fn plan_block(
    block: &Block,
    prior: Option<&Map<String, Value>>,
    config: &Map<String, Value>,
) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, attr) in block.iter() {
        let configured = config.get(name).filter(|v| !v.is_null());
        let prior_value = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());

        let value = match configured {
            Some(v) if !attr.is_computed_only() => Some(match attr.nested_block() {
                Some(nested) => plan_nested(nested, prior_value, v),
                None => v.clone(),
            }),
            _ if attr.computed => prior_value.cloned(),
            _ => attr.default.clone(),
        };
        if let Some(v) = value {
            out.insert(name.clone(), v);
        }
    }
    out
}

fn plan_nested(block: &Block, prior: Option<&Value>, config: &Value) -> Value {
    let Value::Array(items) = config else {
        return config.clone();
    };
    let planned = items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(obj) => {
                let prior_item = prior.and_then(|p| p.get(i)).and_then(Value::as_object);
                Value::Object(plan_block(block, prior_item, obj))
            }
            other => other.clone(),
        })
        .collect();
    Value::Array(planned)
}

fn diff(
    resource: &dyn Resource,
    block: &Block,
    prior: &Value,
    planned: &Value,
) -> Vec<AttributeChange> {
    let mut changes = Vec::new();
    for (name, attr) in block.iter() {
        let before = prior.get(name).filter(|v| !v.is_null());
        let after = planned.get(name).filter(|v| !v.is_null());

        if normalize(before, &attr.ty) == normalize(after, &attr.ty) {
            continue;
        }
        if attr.is_computed_only() && after.is_none() {
            continue;
        }
        if resource.suppress_diff(name, before, after) {
            continue;
        }
        changes.push(AttributeChange {
            path: name.clone(),
            before: before.cloned(),
            after: after.cloned(),
            requires_replace: attr.force_new,
            sensitive: attr.sensitive,
        });
    }
    changes
}

/// Whether two values of type `ty` are the same once normalized.
pub fn equivalent(ty: &AttributeType, a: Option<&Value>, b: Option<&Value>) -> bool {
    normalize(a, ty) == normalize(b, ty)
}

/// Canonical form for comparison: zero values are unset and sets are sorted.
fn normalize(value: Option<&Value>, ty: &AttributeType) -> Option<Value> {
    let value = value?;
    match (ty, value) {
        (_, Value::Null) => None,
        (AttributeType::NullableInt, v) => match nullable_int(v) {
            Some(Some(n)) => Some(Value::from(n)),
            Some(None) => None,
            None => Some(v.clone()),
        },
        (AttributeType::String, Value::String(s)) if s.is_empty() => None,
        (AttributeType::Int, Value::Number(n)) if n.as_i64() == Some(0) => None,
        (AttributeType::Bool, Value::Bool(false)) => None,
        (AttributeType::List(elem) | AttributeType::Set(elem), Value::Array(items)) => {
            let mut normalized: Vec<Value> = items
                .iter()
                .map(|item| normalize_element(elem, item))
                .collect();
            if normalized.is_empty() {
                return None;
            }
            if ty.is_set() {
                normalized.sort_by_key(|v| v.to_string());
                normalized.dedup();
            }
            Some(Value::Array(normalized))
        }
        (AttributeType::Map(_), Value::Object(obj)) if obj.is_empty() => None,
        (_, other) => Some(other.clone()),
    }
}

fn normalize_element(elem: &Element, item: &Value) -> Value {
    match (elem, item) {
        (Element::Block(block), Value::Object(obj)) => {
            let normalized = block
                .iter()
                .filter_map(|(name, attr)| {
                    normalize(obj.get(name), &attr.ty).map(|v| (name.clone(), v))
                })
                .collect();
            Value::Object(normalized)
        }
        (Element::Primitive(ty), item) => normalize(Some(item), ty).unwrap_or(Value::Null),
        (_, other) => other.clone(),
    }
}

/// Changes for several resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub changes: Vec<ResourceChange>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(changes: Vec<ResourceChange>) -> Self {
        let has_changes = changes.iter().any(|c| c.action != ActionType::NoOp);
        Self {
            changes,
            has_changes,
        }
    }

    fn count(&self, action_type: ActionType) -> usize {
        self.changes
            .iter()
            .filter(|c| c.action == action_type)
            .count()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.count(ActionType::Create),
            update: self.count(ActionType::Update),
            replace: self.count(ActionType::Replace),
            delete: self.count(ActionType::Delete),
            no_change: self.count(ActionType::NoOp),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ResourceData;
    use crate::error::Result;
    use crate::schema::{Attribute, ResourceSchema};
    use async_trait::async_trait;
    use serde_json::json;

    struct Widget;

    #[async_trait]
    impl Resource for Widget {
        fn type_name(&self) -> &'static str {
            "test_widget"
        }

        fn schema(&self) -> ResourceSchema {
            let rule = Block::new()
                .attribute("days", Attribute::optional(AttributeType::Int).default_value(0))
                .attribute("marker", Attribute::optional_computed(AttributeType::Bool));
            ResourceSchema::new(
                Block::new()
                    .attribute("name", Attribute::required(AttributeType::String).force_new())
                    .attribute("description", Attribute::optional(AttributeType::String))
                    .attribute("arn", Attribute::computed(AttributeType::String))
                    .attribute("labels", Attribute::optional(AttributeType::set(AttributeType::String)))
                    .attribute("rule", Attribute::optional(AttributeType::list(rule)))
                    .attribute("content", Attribute::optional(AttributeType::String)),
            )
        }

        async fn create(&self, _d: &mut ResourceData) -> Result<()> {
            Ok(())
        }

        async fn read(&self, _d: &mut ResourceData) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _d: &mut ResourceData) -> Result<()> {
            Ok(())
        }

        fn suppress_diff(&self, path: &str, old: Option<&Value>, new: Option<&Value>) -> bool {
            path == "content"
                && old.and_then(Value::as_str).map(str::trim) == new.and_then(Value::as_str).map(str::trim)
        }
    }

    fn prior() -> Value {
        json!({
            "id": "w1",
            "name": "w",
            "description": "",
            "arn": "arn:aws:test:::w1",
            "labels": ["b", "a"],
            "rule": [{"days": 0, "marker": true}],
            "content": "x",
        })
    }

    #[test]
    fn test_create_plan() {
        let change = plan_resource(&Widget, None, Some(&json!({"name": "w", "rule": [{}]})));
        assert_eq!(change.action, ActionType::Create);
        assert_eq!(
            change.planned.unwrap(),
            json!({"name": "w", "rule": [{"days": 0}]})
        );
    }

    #[test]
    fn test_no_op_plan() {
        let config = json!({"name": "w", "labels": ["a", "b"], "rule": [{}], "content": "x "});
        let change = plan_resource(&Widget, Some(&prior()), Some(&config));
        assert_eq!(change.action, ActionType::NoOp, "{:?}", change.changes);

        let planned = change.planned.unwrap();
        assert_eq!(planned["arn"], json!("arn:aws:test:::w1"));
        assert_eq!(planned["rule"][0]["marker"], json!(true));
        assert_eq!(planned["id"], json!("w1"));
    }

    #[test]
    fn test_update_and_replace() {
        let change = plan_resource(
            &Widget,
            Some(&prior()),
            Some(&json!({"name": "w", "description": "d", "labels": ["a", "b"], "rule": [{}], "content": "x"})),
        );
        assert_eq!(change.action, ActionType::Update);
        assert_eq!(change.changes.len(), 1);
        assert_eq!(change.changes[0].path, "description");

        let change = plan_resource(
            &Widget,
            Some(&prior()),
            Some(&json!({"name": "w2", "labels": ["a", "b"], "rule": [{}], "content": "x"})),
        );
        assert_eq!(change.action, ActionType::Replace);
        assert_eq!(change.requires_replace(), vec!["name"]);
    }

    #[test]
    fn test_delete_plan() {
        let change = plan_resource(&Widget, Some(&prior()), None);
        assert_eq!(change.action, ActionType::Delete);
        assert!(change.planned.is_none());
    }

    #[test]
    fn test_force_replace() {
        let config = json!({"name": "w", "labels": ["a", "b"], "rule": [{}], "content": "x"});
        let mut change = plan_resource(&Widget, Some(&prior()), Some(&config));
        assert_eq!(change.action, ActionType::NoOp);
        change.force_replace();
        assert_eq!(change.action, ActionType::Replace);

        let mut change = plan_resource(&Widget, Some(&prior()), None);
        change.force_replace();
        assert_eq!(change.action, ActionType::Delete);
    }

    #[test]
    fn test_plan_summary() {
        let create = plan_resource(&Widget, None, Some(&json!({"name": "w"})));
        let delete = plan_resource(&Widget, Some(&prior()), None);
        let plan = Plan::new(vec![create, delete]);
        assert!(plan.has_changes);
        assert_eq!(
            plan.summary().to_string(),
            "1 to create, 0 to update, 0 to replace, 1 to delete, 0 unchanged"
        );
    }

    #[test]
    fn test_equivalent() {
        let ty = AttributeType::NullableInt;
        assert!(equivalent(&ty, Some(&json!("1024")), Some(&json!(1024))));
        assert!(equivalent(&ty, Some(&json!("")), None));
        assert!(!equivalent(&ty, Some(&json!(0)), None));

        let set = AttributeType::set(AttributeType::String);
        assert!(equivalent(&set, Some(&json!(["b", "a", "a"])), Some(&json!(["a", "b"]))));
        assert!(equivalent(&set, Some(&json!([])), None));
    }
}
