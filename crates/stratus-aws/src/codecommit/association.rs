//! `aws_codecommit_approval_rule_template_association`

use super::api::CodeCommitApi;
use super::approval_rule_template::ERR_CODE_TEMPLATE_DOES_NOT_EXIST;
use super::trigger::ERR_CODE_REPOSITORY_DOES_NOT_EXIST;
use async_trait::async_trait;
use std::sync::Arc;
use stratus_core::error::{ACTION_CREATING, ACTION_DELETING, ACTION_READING};
use stratus_core::id::{DEFAULT_SEPARATOR, create_resource_id, parse_resource_id};
use stratus_core::{
    Attribute, AttributeType, Block, ProviderError, Resource, ResourceData, ResourceSchema,
    Result, Validator,
};

pub const TYPE_NAME: &str = "aws_codecommit_approval_rule_template_association";

const RESOURCE_NAME: &str = "Approval Rule Template Association";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(
        Block::new()
            .attribute(
                "approval_rule_template_name",
                Attribute::required(AttributeType::String)
                    .force_new()
                    .validate(Validator::StringLenBetween(1, 100)),
            )
            .attribute(
                "repository_name",
                Attribute::required(AttributeType::String)
                    .force_new()
                    .validate(Validator::StringLenBetween(0, 100)),
            ),
    )
}

/// Links a template to a repository. ID is `template,repository`.
pub struct ApprovalRuleTemplateAssociation {
    api: Arc<dyn CodeCommitApi>,
}

impl ApprovalRuleTemplateAssociation {
    pub fn new(api: Arc<dyn CodeCommitApi>) -> Self {
        Self { api }
    }

    fn parse_id(id: &str) -> Result<(String, String)> {
        let mut parts = parse_resource_id(id, 2, DEFAULT_SEPARATOR, false)?;
        let repository_name = parts.pop().unwrap_or_default();
        let template_name = parts.pop().unwrap_or_default();
        Ok((template_name, repository_name))
    }
}

/// Pages through the template's repositories looking for `repository_name`.
pub(crate) async fn find_approval_rule_template_association_by_two_part_key(
    api: &dyn CodeCommitApi,
    template_name: &str,
    repository_name: &str,
) -> Result<()> {
    let mut next_token: Option<String> = None;
    loop {
        let page = match api
            .list_repositories_for_approval_rule_template(template_name, next_token.as_deref())
            .await
        {
            Err(err) if err.code_equals(&[ERR_CODE_TEMPLATE_DOES_NOT_EXIST]) => {
                return Err(ProviderError::not_found_from(err));
            }
            Err(err) => return Err(err),
            Ok(page) => page,
        };
        if page.repository_names.iter().any(|r| r == repository_name) {
            return Ok(());
        }
        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }
    Err(ProviderError::not_found(format!(
        "{template_name} is not associated with {repository_name}"
    )))
}

#[async_trait]
impl Resource for ApprovalRuleTemplateAssociation {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let template_name = d.get_str("approval_rule_template_name").to_string();
        let repository_name = d.get_str("repository_name").to_string();
        let id = create_resource_id(
            &[template_name.as_str(), repository_name.as_str()],
            DEFAULT_SEPARATOR,
            false,
        )?;

        tracing::info!(id = %id, "associating CodeCommit approval rule template");
        self.api
            .associate_approval_rule_template_with_repository(&template_name, &repository_name)
            .await
            .map_err(|err| err.context(ACTION_CREATING, RESOURCE_NAME, id.as_str()))?;

        d.set_id(id);
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let (template_name, repository_name) = Self::parse_id(d.id())?;

        match find_approval_rule_template_association_by_two_part_key(
            &*self.api,
            &template_name,
            &repository_name,
        )
        .await
        {
            Err(err) if !d.is_new_resource() && err.is_not_found() => {
                tracing::warn!(id = %d.id(), "CodeCommit {RESOURCE_NAME} not found, removing from state");
                d.clear_id();
                return Ok(());
            }
            Err(err) => return Err(err.context(ACTION_READING, RESOURCE_NAME, d.id())),
            Ok(()) => {}
        }

        d.set("approval_rule_template_name", template_name);
        d.set("repository_name", repository_name);
        Ok(())
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let (template_name, repository_name) = Self::parse_id(d.id())?;

        tracing::info!(id = %d.id(), "disassociating CodeCommit approval rule template");
        match self
            .api
            .disassociate_approval_rule_template_from_repository(&template_name, &repository_name)
            .await
        {
            Err(err)
                if err.code_equals(&[
                    ERR_CODE_TEMPLATE_DOES_NOT_EXIST,
                    ERR_CODE_REPOSITORY_DOES_NOT_EXIST,
                ]) =>
            {
                Ok(())
            }
            Err(err) => Err(err.context(ACTION_DELETING, RESOURCE_NAME, d.id())),
            Ok(()) => Ok(()),
        }
    }
}
