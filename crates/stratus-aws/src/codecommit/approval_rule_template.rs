//! `aws_codecommit_approval_rule_template`

use super::api::{ApprovalRuleTemplate as Template, CodeCommitApi};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;
use stratus_core::error::{ACTION_CREATING, ACTION_DELETING, ACTION_READING, ACTION_UPDATING};
use stratus_core::{
    Attribute, AttributeType, Block, ProviderError, Resource, ResourceData, ResourceSchema,
    Result, Validator,
};

pub const TYPE_NAME: &str = "aws_codecommit_approval_rule_template";

const RESOURCE_NAME: &str = "Approval Rule Template";

pub(crate) const ERR_CODE_TEMPLATE_DOES_NOT_EXIST: &str =
    "ApprovalRuleTemplateDoesNotExistException";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(
        Block::new()
            .attribute(
                "approval_rule_template_id",
                Attribute::computed(AttributeType::String),
            )
            .attribute(
                "content",
                Attribute::required(AttributeType::String)
                    .validate(Validator::StringLenBetween(1, 3000))
                    .validate(Validator::Json),
            )
            .attribute("creation_date", Attribute::computed(AttributeType::String))
            .attribute(
                "description",
                Attribute::optional(AttributeType::String)
                    .validate(Validator::StringLenBetween(0, 1000)),
            )
            .attribute("last_modified_date", Attribute::computed(AttributeType::String))
            .attribute("last_modified_user", Attribute::computed(AttributeType::String))
            .attribute(
                "name",
                Attribute::required(AttributeType::String)
                    .validate(Validator::StringLenBetween(1, 100)),
            )
            .attribute("rule_content_sha256", Attribute::computed(AttributeType::String)),
    )
}

/// Approval rule template, identified by its name
pub struct ApprovalRuleTemplate {
    api: Arc<dyn CodeCommitApi>,
}

impl ApprovalRuleTemplate {
    pub fn new(api: Arc<dyn CodeCommitApi>) -> Self {
        Self { api }
    }
}

pub(crate) async fn find_approval_rule_template_by_name(
    api: &dyn CodeCommitApi,
    name: &str,
) -> Result<Template> {
    match api.get_approval_rule_template(name).await {
        Err(err) if err.code_equals(&[ERR_CODE_TEMPLATE_DOES_NOT_EXIST]) => {
            Err(ProviderError::not_found_from(err))
        }
        other => other,
    }
}

/// Two JSON documents that parse to the same value, ignoring formatting
/// and key order.
pub(crate) fn json_equivalent(a: &str, b: &str) -> bool {
    match (
        serde_json::from_str::<Value>(a),
        serde_json::from_str::<Value>(b),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn format_time(t: Option<&DateTime<Utc>>) -> String {
    t.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

#[async_trait]
impl Resource for ApprovalRuleTemplate {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        let description = Some(d.get_str("description")).filter(|s| !s.is_empty());

        tracing::info!(name = %name, "creating CodeCommit approval rule template");
        self.api
            .create_approval_rule_template(&name, d.get_str("content"), description)
            .await
            .map_err(|err| err.context(ACTION_CREATING, RESOURCE_NAME, name.as_str()))?;

        d.set_id(name);
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let template = match find_approval_rule_template_by_name(&*self.api, d.id()).await {
            Err(err) if !d.is_new_resource() && err.is_not_found() => {
                tracing::warn!(id = %d.id(), "CodeCommit {RESOURCE_NAME} not found, removing from state");
                d.clear_id();
                return Ok(());
            }
            Err(err) => return Err(err.context(ACTION_READING, RESOURCE_NAME, d.id())),
            Ok(template) => template,
        };

        d.set("approval_rule_template_id", template.id);
        d.set("content", template.content);
        d.set("creation_date", format_time(template.creation_date.as_ref()));
        d.set("description", template.description.unwrap_or_default());
        d.set("last_modified_date", format_time(template.last_modified_date.as_ref()));
        d.set("last_modified_user", template.last_modified_user.unwrap_or_default());
        d.set("name", template.name);
        d.set("rule_content_sha256", template.rule_content_sha256);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let api = &*self.api;

        if d.has_change("description") {
            api.update_approval_rule_template_description(d.id(), d.get_str("description"))
                .await
                .map_err(|err| err.context(ACTION_UPDATING, RESOURCE_NAME, d.id()))?;
        }

        let content_changed = match d.get_change("content") {
            (Some(Value::String(old)), Some(Value::String(new))) => !json_equivalent(old, new),
            _ => d.has_change("content"),
        };
        if content_changed {
            // The SHA-256 guards against concurrent edits and must be the
            // one last read.
            let (existing_sha, _) = d.get_change("rule_content_sha256");
            let existing_sha = existing_sha.and_then(Value::as_str).unwrap_or_default();
            api.update_approval_rule_template_content(d.id(), d.get_str("content"), existing_sha)
                .await
                .map_err(|err| err.context(ACTION_UPDATING, RESOURCE_NAME, d.id()))?;
        }

        if d.has_change("name") {
            let new_name = d.get_str("name").to_string();
            tracing::info!(old_name = %d.id(), new_name = %new_name, "renaming CodeCommit approval rule template");
            api.update_approval_rule_template_name(d.id(), &new_name)
                .await
                .map_err(|err| err.context(ACTION_UPDATING, RESOURCE_NAME, d.id()))?;
            d.set_id(new_name);
        }

        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        tracing::info!(id = %d.id(), "deleting CodeCommit approval rule template");
        match self.api.delete_approval_rule_template(d.id()).await {
            Err(err) if err.code_equals(&[ERR_CODE_TEMPLATE_DOES_NOT_EXIST]) => Ok(()),
            Err(err) => Err(err.context(ACTION_DELETING, RESOURCE_NAME, d.id())),
            Ok(()) => Ok(()),
        }
    }

    fn suppress_diff(&self, path: &str, old: Option<&Value>, new: Option<&Value>) -> bool {
        match (path, old.and_then(Value::as_str), new.and_then(Value::as_str)) {
            ("content", Some(old), Some(new)) => json_equivalent(old, new),
            _ => false,
        }
    }
}
