//! CodeCommit API and its SDK implementation

use crate::error::{missing_field, sdk_error};
use async_trait::async_trait;
use aws_sdk_codecommit::primitives::DateTime as SdkDateTime;
use aws_sdk_codecommit::types as sdk;
use chrono::{DateTime, Utc};
use stratus_core::{ProviderError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryTrigger {
    pub name: String,
    pub destination_arn: String,
    pub custom_data: Option<String>,
    pub branches: Vec<String>,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryTriggers {
    pub configuration_id: Option<String>,
    pub triggers: Vec<RepositoryTrigger>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApprovalRuleTemplate {
    pub id: String,
    pub name: String,
    pub content: String,
    pub description: Option<String>,
    pub rule_content_sha256: String,
    pub creation_date: Option<DateTime<Utc>>,
    pub last_modified_date: Option<DateTime<Utc>>,
    pub last_modified_user: Option<String>,
}

/// One page of repositories associated with a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryNamesPage {
    pub repository_names: Vec<String>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait CodeCommitApi: Send + Sync {
    /// Replaces every trigger of the repository; returns the configuration ID.
    async fn put_repository_triggers(
        &self,
        repository_name: &str,
        triggers: &[RepositoryTrigger],
    ) -> Result<String>;

    async fn get_repository_triggers(&self, repository_name: &str) -> Result<RepositoryTriggers>;

    async fn create_approval_rule_template(
        &self,
        name: &str,
        content: &str,
        description: Option<&str>,
    ) -> Result<ApprovalRuleTemplate>;

    async fn get_approval_rule_template(&self, name: &str) -> Result<ApprovalRuleTemplate>;

    async fn update_approval_rule_template_description(
        &self,
        name: &str,
        description: &str,
    ) -> Result<()>;

    async fn update_approval_rule_template_content(
        &self,
        name: &str,
        content: &str,
        existing_rule_content_sha256: &str,
    ) -> Result<()>;

    async fn update_approval_rule_template_name(&self, old_name: &str, new_name: &str)
    -> Result<()>;

    async fn delete_approval_rule_template(&self, name: &str) -> Result<()>;

    async fn associate_approval_rule_template_with_repository(
        &self,
        template_name: &str,
        repository_name: &str,
    ) -> Result<()>;

    async fn disassociate_approval_rule_template_from_repository(
        &self,
        template_name: &str,
        repository_name: &str,
    ) -> Result<()>;

    async fn list_repositories_for_approval_rule_template(
        &self,
        template_name: &str,
        next_token: Option<&str>,
    ) -> Result<RepositoryNamesPage>;
}

#[async_trait]
impl CodeCommitApi for aws_sdk_codecommit::Client {
    async fn put_repository_triggers(
        &self,
        repository_name: &str,
        triggers: &[RepositoryTrigger],
    ) -> Result<String> {
        let triggers = triggers
            .iter()
            .map(to_sdk_trigger)
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(repository_name, triggers = triggers.len(), "PutRepositoryTriggers");
        let output = self
            .put_repository_triggers()
            .repository_name(repository_name)
            .set_triggers(Some(triggers))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(output.configuration_id().unwrap_or_default().to_string())
    }

    async fn get_repository_triggers(&self, repository_name: &str) -> Result<RepositoryTriggers> {
        tracing::debug!(repository_name, "GetRepositoryTriggers");
        let output = self
            .get_repository_triggers()
            .repository_name(repository_name)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(RepositoryTriggers {
            configuration_id: output.configuration_id().map(str::to_string),
            triggers: output.triggers().iter().map(from_sdk_trigger).collect(),
        })
    }

    async fn create_approval_rule_template(
        &self,
        name: &str,
        content: &str,
        description: Option<&str>,
    ) -> Result<ApprovalRuleTemplate> {
        tracing::debug!(name, "CreateApprovalRuleTemplate");
        let output = self
            .create_approval_rule_template()
            .approval_rule_template_name(name)
            .approval_rule_template_content(content)
            .set_approval_rule_template_description(description.map(str::to_string))
            .send()
            .await
            .map_err(sdk_error)?;
        output
            .approval_rule_template()
            .map(from_sdk_template)
            .ok_or_else(|| missing_field("ApprovalRuleTemplate"))
    }

    async fn get_approval_rule_template(&self, name: &str) -> Result<ApprovalRuleTemplate> {
        tracing::debug!(name, "GetApprovalRuleTemplate");
        let output = self
            .get_approval_rule_template()
            .approval_rule_template_name(name)
            .send()
            .await
            .map_err(sdk_error)?;
        output
            .approval_rule_template()
            .map(from_sdk_template)
            .ok_or_else(|| missing_field("ApprovalRuleTemplate"))
    }

    async fn update_approval_rule_template_description(
        &self,
        name: &str,
        description: &str,
    ) -> Result<()> {
        tracing::debug!(name, "UpdateApprovalRuleTemplateDescription");
        self.update_approval_rule_template_description()
            .approval_rule_template_name(name)
            .approval_rule_template_description(description)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn update_approval_rule_template_content(
        &self,
        name: &str,
        content: &str,
        existing_rule_content_sha256: &str,
    ) -> Result<()> {
        tracing::debug!(name, "UpdateApprovalRuleTemplateContent");
        self.update_approval_rule_template_content()
            .approval_rule_template_name(name)
            .new_rule_content(content)
            .existing_rule_content_sha256(existing_rule_content_sha256)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn update_approval_rule_template_name(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> Result<()> {
        tracing::debug!(old_name, new_name, "UpdateApprovalRuleTemplateName");
        self.update_approval_rule_template_name()
            .old_approval_rule_template_name(old_name)
            .new_approval_rule_template_name(new_name)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn delete_approval_rule_template(&self, name: &str) -> Result<()> {
        tracing::debug!(name, "DeleteApprovalRuleTemplate");
        self.delete_approval_rule_template()
            .approval_rule_template_name(name)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn associate_approval_rule_template_with_repository(
        &self,
        template_name: &str,
        repository_name: &str,
    ) -> Result<()> {
        tracing::debug!(template_name, repository_name, "AssociateApprovalRuleTemplateWithRepository");
        self.associate_approval_rule_template_with_repository()
            .approval_rule_template_name(template_name)
            .repository_name(repository_name)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn disassociate_approval_rule_template_from_repository(
        &self,
        template_name: &str,
        repository_name: &str,
    ) -> Result<()> {
        tracing::debug!(
            template_name,
            repository_name,
            "DisassociateApprovalRuleTemplateFromRepository"
        );
        self.disassociate_approval_rule_template_from_repository()
            .approval_rule_template_name(template_name)
            .repository_name(repository_name)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn list_repositories_for_approval_rule_template(
        &self,
        template_name: &str,
        next_token: Option<&str>,
    ) -> Result<RepositoryNamesPage> {
        tracing::debug!(template_name, next_token, "ListRepositoriesForApprovalRuleTemplate");
        let output = self
            .list_repositories_for_approval_rule_template()
            .approval_rule_template_name(template_name)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(RepositoryNamesPage {
            repository_names: output.repository_names().to_vec(),
            next_token: output.next_token().map(str::to_string),
        })
    }
}

fn to_sdk_trigger(trigger: &RepositoryTrigger) -> Result<sdk::RepositoryTrigger> {
    let events = trigger
        .events
        .iter()
        .map(|e| sdk::RepositoryTriggerEventEnum::from(e.as_str()))
        .collect();
    sdk::RepositoryTrigger::builder()
        .name(&trigger.name)
        .destination_arn(&trigger.destination_arn)
        .set_custom_data(trigger.custom_data.clone())
        .set_branches((!trigger.branches.is_empty()).then(|| trigger.branches.clone()))
        .set_events(Some(events))
        .build()
        .map_err(|err| ProviderError::InvalidConfig(err.to_string()))
}

fn from_sdk_trigger(trigger: &sdk::RepositoryTrigger) -> RepositoryTrigger {
    RepositoryTrigger {
        name: trigger.name().to_string(),
        destination_arn: trigger.destination_arn().to_string(),
        custom_data: trigger.custom_data().map(str::to_string),
        branches: trigger.branches().to_vec(),
        events: trigger
            .events()
            .iter()
            .map(|e| e.as_str().to_string())
            .collect(),
    }
}

fn from_sdk_date(date: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(date.secs(), 0)
}

fn from_sdk_template(template: &sdk::ApprovalRuleTemplate) -> ApprovalRuleTemplate {
    ApprovalRuleTemplate {
        id: template
            .approval_rule_template_id()
            .unwrap_or_default()
            .to_string(),
        name: template
            .approval_rule_template_name()
            .unwrap_or_default()
            .to_string(),
        content: template
            .approval_rule_template_content()
            .unwrap_or_default()
            .to_string(),
        description: template
            .approval_rule_template_description()
            .map(str::to_string),
        rule_content_sha256: template
            .rule_content_sha256()
            .unwrap_or_default()
            .to_string(),
        creation_date: template.creation_date().and_then(from_sdk_date),
        last_modified_date: template.last_modified_date().and_then(from_sdk_date),
        last_modified_user: template.last_modified_user().map(str::to_string),
    }
}
