//! `aws_codecommit_trigger`
//!
//! Owns the whole trigger list of a repository. Every argument forces
//! replacement, so there is no update.

use super::api::{CodeCommitApi, RepositoryTrigger, RepositoryTriggers};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use stratus_core::error::{ACTION_CREATING, ACTION_DELETING, ACTION_READING};
use stratus_core::{
    Attribute, AttributeType, Block, ProviderError, Resource, ResourceData, ResourceSchema,
    Result, Validator,
};

pub const TYPE_NAME: &str = "aws_codecommit_trigger";

const RESOURCE_NAME: &str = "Trigger";

pub(crate) const ERR_CODE_REPOSITORY_DOES_NOT_EXIST: &str = "RepositoryDoesNotExistException";

pub const TRIGGER_EVENTS: &[&str] = &["all", "updateReference", "createReference", "deleteReference"];

pub fn schema() -> ResourceSchema {
    let trigger = Block::new()
        .attribute("name", Attribute::required(AttributeType::String))
        .attribute(
            "destination_arn",
            Attribute::required(AttributeType::String).validate(Validator::Arn),
        )
        .attribute("custom_data", Attribute::optional(AttributeType::String))
        .attribute(
            "branches",
            Attribute::optional(AttributeType::list(AttributeType::String)),
        )
        .attribute(
            "events",
            Attribute::required(AttributeType::list(AttributeType::String))
                .validate(Validator::StringInSlice(TRIGGER_EVENTS)),
        );

    ResourceSchema::new(
        Block::new()
            .attribute("configuration_id", Attribute::computed(AttributeType::String))
            .attribute(
                "repository_name",
                Attribute::required(AttributeType::String)
                    .force_new()
                    .validate(Validator::StringLenBetween(0, 100)),
            )
            .attribute(
                "trigger",
                Attribute::required(AttributeType::set(trigger))
                    .force_new()
                    .max_items(10),
            ),
    )
}

pub struct Trigger {
    api: Arc<dyn CodeCommitApi>,
}

impl Trigger {
    pub fn new(api: Arc<dyn CodeCommitApi>) -> Self {
        Self { api }
    }
}

/// Triggers of a repository; a missing repository or an empty trigger list
/// is "not found".
pub(crate) async fn find_repository_triggers_by_name(
    api: &dyn CodeCommitApi,
    repository_name: &str,
) -> Result<RepositoryTriggers> {
    match api.get_repository_triggers(repository_name).await {
        Err(err) if err.code_equals(&[ERR_CODE_REPOSITORY_DOES_NOT_EXIST]) => {
            Err(ProviderError::not_found_from(err))
        }
        Err(err) => Err(err),
        Ok(output) if output.triggers.is_empty() => Err(ProviderError::empty_result()),
        Ok(output) => Ok(output),
    }
}

fn expand_triggers(values: &[Value]) -> Vec<RepositoryTrigger> {
    let strings = |v: &Value| -> Vec<String> {
        v.as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };
    values
        .iter()
        .map(|t| RepositoryTrigger {
            name: t["name"].as_str().unwrap_or_default().to_string(),
            destination_arn: t["destination_arn"].as_str().unwrap_or_default().to_string(),
            custom_data: t["custom_data"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            branches: strings(&t["branches"]),
            events: strings(&t["events"]),
        })
        .collect()
}

fn flatten_triggers(triggers: &[RepositoryTrigger]) -> Value {
    triggers
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "destination_arn": t.destination_arn,
                "custom_data": t.custom_data.clone().unwrap_or_default(),
                "branches": t.branches,
                "events": t.events,
            })
        })
        .collect()
}

#[async_trait]
impl Resource for Trigger {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let repository_name = d.get_str("repository_name").to_string();
        let triggers = expand_triggers(d.get_list("trigger"));

        tracing::info!(repository_name = %repository_name, triggers = triggers.len(), "putting CodeCommit triggers");
        self.api
            .put_repository_triggers(&repository_name, &triggers)
            .await
            .map_err(|err| err.context(ACTION_CREATING, RESOURCE_NAME, repository_name.as_str()))?;

        d.set_id(repository_name);
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let output = match find_repository_triggers_by_name(&*self.api, d.id()).await {
            Err(err) if !d.is_new_resource() && err.is_not_found() => {
                tracing::warn!(id = %d.id(), "CodeCommit {RESOURCE_NAME} not found, removing from state");
                d.clear_id();
                return Ok(());
            }
            Err(err) => return Err(err.context(ACTION_READING, RESOURCE_NAME, d.id())),
            Ok(output) => output,
        };

        let repository_name = d.id().to_string();
        d.set("configuration_id", output.configuration_id.unwrap_or_default());
        d.set("repository_name", repository_name);
        d.set("trigger", flatten_triggers(&output.triggers));
        Ok(())
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        tracing::info!(id = %d.id(), "deleting CodeCommit triggers");
        match self.api.put_repository_triggers(d.id(), &[]).await {
            Err(err) if err.code_equals(&[ERR_CODE_REPOSITORY_DOES_NOT_EXIST]) => Ok(()),
            Err(err) => Err(err.context(ACTION_DELETING, RESOURCE_NAME, d.id())),
            Ok(_) => Ok(()),
        }
    }

    fn importable(&self) -> bool {
        false
    }
}
