//! In-memory CodeCommit used by the resource tests

use super::api::*;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use stratus_core::{ProviderError, Result};

const PAGE_SIZE: usize = 2;

#[derive(Default)]
pub(crate) struct FakeCodeCommit {
    pub repositories: Mutex<BTreeSet<String>>,
    pub triggers: Mutex<HashMap<String, RepositoryTriggers>>,
    pub templates: Mutex<BTreeMap<String, ApprovalRuleTemplate>>,
    /// template name -> repository names
    pub associations: Mutex<BTreeMap<String, Vec<String>>>,
    pub calls: Mutex<Vec<String>>,
    counter: Mutex<usize>,
}

impl FakeCodeCommit {
    pub fn with_repositories(names: &[&str]) -> Self {
        let fake = Self::default();
        fake.repositories
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        fake
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn next(&self) -> usize {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        *counter
    }

    fn check_repository(&self, name: &str) -> Result<()> {
        if self.repositories.lock().unwrap().contains(name) {
            Ok(())
        } else {
            Err(ProviderError::api(
                "RepositoryDoesNotExistException",
                format!("{name} does not exist"),
            ))
        }
    }

    fn template_missing(name: &str) -> ProviderError {
        ProviderError::api(
            "ApprovalRuleTemplateDoesNotExistException",
            format!("The template {name} does not exist."),
        )
    }
}

#[async_trait]
impl CodeCommitApi for FakeCodeCommit {
    async fn put_repository_triggers(
        &self,
        repository_name: &str,
        triggers: &[RepositoryTrigger],
    ) -> Result<String> {
        self.record(format!("put_triggers {repository_name} {}", triggers.len()));
        self.check_repository(repository_name)?;
        let configuration_id = format!("cfg-{}", self.next());
        self.triggers.lock().unwrap().insert(
            repository_name.to_string(),
            RepositoryTriggers {
                configuration_id: Some(configuration_id.clone()),
                triggers: triggers.to_vec(),
            },
        );
        Ok(configuration_id)
    }

    async fn get_repository_triggers(&self, repository_name: &str) -> Result<RepositoryTriggers> {
        self.check_repository(repository_name)?;
        Ok(self
            .triggers
            .lock()
            .unwrap()
            .get(repository_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_approval_rule_template(
        &self,
        name: &str,
        content: &str,
        description: Option<&str>,
    ) -> Result<ApprovalRuleTemplate> {
        self.record(format!("create_template {name}"));
        let mut templates = self.templates.lock().unwrap();
        if templates.contains_key(name) {
            return Err(ProviderError::api(
                "ApprovalRuleTemplateNameAlreadyExistsException",
                format!("{name} already exists"),
            ));
        }
        let now = Utc::now();
        let template = ApprovalRuleTemplate {
            id: format!("{:08}-0000-0000-0000-000000000000", self.next()),
            name: name.to_string(),
            content: content.to_string(),
            description: description.map(str::to_string),
            rule_content_sha256: format!("sha-{}", self.next()),
            creation_date: Some(now),
            last_modified_date: Some(now),
            last_modified_user: Some("arn:aws:iam::123456789012:user/tester".to_string()),
        };
        templates.insert(name.to_string(), template.clone());
        Ok(template)
    }

    async fn get_approval_rule_template(&self, name: &str) -> Result<ApprovalRuleTemplate> {
        self.templates
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Self::template_missing(name))
    }

    async fn update_approval_rule_template_description(
        &self,
        name: &str,
        description: &str,
    ) -> Result<()> {
        self.record(format!("update_description {name}"));
        let mut templates = self.templates.lock().unwrap();
        let template = templates
            .get_mut(name)
            .ok_or_else(|| Self::template_missing(name))?;
        template.description = Some(description.to_string());
        Ok(())
    }

    async fn update_approval_rule_template_content(
        &self,
        name: &str,
        content: &str,
        existing_rule_content_sha256: &str,
    ) -> Result<()> {
        self.record(format!("update_content {name}"));
        let sha = format!("sha-{}", self.next());
        let mut templates = self.templates.lock().unwrap();
        let template = templates
            .get_mut(name)
            .ok_or_else(|| Self::template_missing(name))?;
        if template.rule_content_sha256 != existing_rule_content_sha256 {
            return Err(ProviderError::api(
                "InvalidRuleContentSha256Exception",
                "The SHA-256 hash signature for the rule content is not valid.",
            ));
        }
        template.content = content.to_string();
        template.rule_content_sha256 = sha;
        Ok(())
    }

    async fn update_approval_rule_template_name(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> Result<()> {
        self.record(format!("update_name {old_name} {new_name}"));
        let mut templates = self.templates.lock().unwrap();
        let mut template = templates
            .remove(old_name)
            .ok_or_else(|| Self::template_missing(old_name))?;
        template.name = new_name.to_string();
        templates.insert(new_name.to_string(), template);

        let mut associations = self.associations.lock().unwrap();
        if let Some(repositories) = associations.remove(old_name) {
            associations.insert(new_name.to_string(), repositories);
        }
        Ok(())
    }

    async fn delete_approval_rule_template(&self, name: &str) -> Result<()> {
        self.record(format!("delete_template {name}"));
        self.templates
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Self::template_missing(name))
    }

    async fn associate_approval_rule_template_with_repository(
        &self,
        template_name: &str,
        repository_name: &str,
    ) -> Result<()> {
        self.record(format!("associate {template_name} {repository_name}"));
        if !self.templates.lock().unwrap().contains_key(template_name) {
            return Err(Self::template_missing(template_name));
        }
        self.check_repository(repository_name)?;
        let mut associations = self.associations.lock().unwrap();
        let repositories = associations.entry(template_name.to_string()).or_default();
        if !repositories.iter().any(|r| r == repository_name) {
            repositories.push(repository_name.to_string());
        }
        Ok(())
    }

    async fn disassociate_approval_rule_template_from_repository(
        &self,
        template_name: &str,
        repository_name: &str,
    ) -> Result<()> {
        self.record(format!("disassociate {template_name} {repository_name}"));
        if !self.templates.lock().unwrap().contains_key(template_name) {
            return Err(Self::template_missing(template_name));
        }
        self.check_repository(repository_name)?;
        if let Some(repositories) = self.associations.lock().unwrap().get_mut(template_name) {
            repositories.retain(|r| r != repository_name);
        }
        Ok(())
    }

    async fn list_repositories_for_approval_rule_template(
        &self,
        template_name: &str,
        next_token: Option<&str>,
    ) -> Result<RepositoryNamesPage> {
        self.record(format!(
            "list_repositories {template_name} {}",
            next_token.unwrap_or("-")
        ));
        if !self.templates.lock().unwrap().contains_key(template_name) {
            return Err(Self::template_missing(template_name));
        }
        let repositories = self
            .associations
            .lock()
            .unwrap()
            .get(template_name)
            .cloned()
            .unwrap_or_default();
        let start: usize = next_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + PAGE_SIZE).min(repositories.len());
        Ok(RepositoryNamesPage {
            repository_names: repositories[start..end].to_vec(),
            next_token: (end < repositories.len()).then(|| end.to_string()),
        })
    }
}
