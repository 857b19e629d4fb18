//! Provider: the registry of resource types and the host-facing entry points
//!
//! The host (or the `stratus` CLI) only ever talks to a [`Provider`]. Every
//! entry point takes and returns plain JSON attribute values.

use crate::data::ResourceData;
use crate::error::{ProviderError, Result};
use crate::plan::{ActionType, ResourceChange, plan_resource};
use crate::resource::{DataSource, Resource};
use crate::schema::ProviderSchema;
use crate::validation::{Diagnostic, has_errors, validate_config};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Registry of the resources and data sources a provider implements
#[derive(Clone, Default)]
pub struct Provider {
    name: String,
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("data_sources", &self.data_sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Provider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns the provider name (e.g. "aws")
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_resource(mut self, resource: impl Resource + 'static) -> Self {
        self.register_resource(Arc::new(resource));
        self
    }

    pub fn with_data_source(mut self, data_source: impl DataSource + 'static) -> Self {
        self.register_data_source(Arc::new(data_source));
        self
    }

    pub fn register_resource(&mut self, resource: Arc<dyn Resource>) {
        self.resources.insert(resource.type_name(), resource);
    }

    pub fn register_data_source(&mut self, data_source: Arc<dyn DataSource>) {
        self.data_sources.insert(data_source.type_name(), data_source);
    }

    pub fn resource(&self, type_name: &str) -> Result<&Arc<dyn Resource>> {
        self.resources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnsupportedResourceType(type_name.to_string()))
    }

    pub fn data_source(&self, type_name: &str) -> Result<&Arc<dyn DataSource>> {
        self.data_sources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnsupportedResourceType(type_name.to_string()))
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().copied()
    }

    pub fn data_source_types(&self) -> impl Iterator<Item = &str> {
        self.data_sources.keys().copied()
    }

    pub fn schema(&self) -> ProviderSchema {
        ProviderSchema {
            resources: self
                .resources
                .iter()
                .map(|(name, r)| (name.to_string(), r.schema()))
                .collect(),
            data_sources: self
                .data_sources
                .iter()
                .map(|(name, d)| (name.to_string(), d.schema()))
                .collect(),
        }
    }

    /// Validates a resource configuration. Errors fail the call; warnings
    /// are returned.
    pub fn validate_resource_config(
        &self,
        type_name: &str,
        config: &Value,
    ) -> Result<Vec<Diagnostic>> {
        let schema = self.resource(type_name)?.schema();
        check(validate_config(&schema.block, config))
    }

    pub fn validate_data_source_config(
        &self,
        type_name: &str,
        config: &Value,
    ) -> Result<Vec<Diagnostic>> {
        let schema = self.data_source(type_name)?.schema();
        check(validate_config(&schema.block, config))
    }

    /// Plans the change from `prior` state to `config`; `None` config plans a delete.
    pub fn plan(
        &self,
        type_name: &str,
        prior: Option<&Value>,
        config: Option<&Value>,
    ) -> Result<ResourceChange> {
        let resource = self.resource(type_name)?;
        if let Some(config) = config {
            self.validate_resource_config(type_name, config)?;
        }
        let change = plan_resource(resource.as_ref(), prior, config);
        tracing::debug!(
            resource_type = type_name,
            action = %change.action,
            changes = change.changes.len(),
            "planned"
        );
        Ok(change)
    }

    /// Applies a planned change and returns the new state (`None` once deleted).
    pub async fn apply(&self, change: &ResourceChange) -> Result<Option<Value>> {
        let type_name = change.resource_type.as_str();
        match (change.action, &change.prior, &change.planned) {
            (ActionType::NoOp, prior, _) => Ok(prior.clone()),
            (ActionType::Create, _, Some(planned)) => {
                self.create_planned(type_name, planned).await.map(Some)
            }
            (ActionType::Update, Some(prior), Some(planned)) => {
                self.update_planned(type_name, prior, planned).await.map(Some)
            }
            (ActionType::Replace, Some(prior), Some(planned)) => {
                self.delete(type_name, prior).await?;
                self.create_planned(type_name, planned).await.map(Some)
            }
            (ActionType::Delete, Some(prior), _) => {
                self.delete(type_name, prior).await?;
                Ok(None)
            }
            (action, _, _) => Err(ProviderError::InvalidConfig(format!(
                "incomplete {action} plan for {type_name}"
            ))),
        }
    }

    /// Creates an object from `config`, validating and planning it first.
    pub async fn create(&self, type_name: &str, config: &Value) -> Result<Value> {
        let change = self.plan(type_name, None, Some(config))?;
        let planned = change.planned.unwrap_or_default();
        self.create_planned(type_name, &planned).await
    }

    async fn create_planned(&self, type_name: &str, planned: &Value) -> Result<Value> {
        let resource = self.resource(type_name)?;
        let mut d = ResourceData::new(&resource.schema(), planned);
        let span = tracing::info_span!("create", resource_type = type_name);
        if let Err(err) = resource.create(&mut d).instrument(span).await {
            return Err(partial(type_name, d, err));
        }

        let id = d.id().to_string();
        tracing::info!(resource_type = type_name, id = %id, "created");
        d.into_state().ok_or_else(|| {
            ProviderError::StateError(format!(
                "{type_name}: provider returned no object after create"
            ))
        })
    }

    /// Refreshes state; `None` means the object is gone.
    pub async fn read(&self, type_name: &str, state: &Value) -> Result<Option<Value>> {
        let resource = self.resource(type_name)?;
        let mut d = ResourceData::from_state(&resource.schema(), state);
        let span = tracing::debug_span!("read", resource_type = type_name, id = %d.id());
        resource.read(&mut d).instrument(span).await?;

        let new_state = d.into_state();
        if new_state.is_none() {
            tracing::warn!(
                resource_type = type_name,
                "object not found, removing from state"
            );
        }
        Ok(new_state)
    }

    /// Updates the object in `prior` to match `config`, validating and
    /// planning it first.
    pub async fn update(&self, type_name: &str, prior: &Value, config: &Value) -> Result<Value> {
        let change = self.plan(type_name, Some(prior), Some(config))?;
        let planned = change.planned.unwrap_or_default();
        self.update_planned(type_name, prior, &planned).await
    }

    async fn update_planned(
        &self,
        type_name: &str,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value> {
        let resource = self.resource(type_name)?;
        let mut d = ResourceData::for_update(&resource.schema(), prior, planned);
        let span = tracing::info_span!("update", resource_type = type_name, id = %d.id());
        if let Err(err) = resource.update(&mut d).instrument(span).await {
            return Err(partial(type_name, d, err));
        }

        tracing::info!(resource_type = type_name, id = %d.id(), "updated");
        d.into_state().ok_or_else(|| {
            ProviderError::StateError(format!(
                "{type_name}: provider returned no object after update"
            ))
        })
    }

    pub async fn delete(&self, type_name: &str, state: &Value) -> Result<()> {
        let resource = self.resource(type_name)?;
        let mut d = ResourceData::from_state(&resource.schema(), state);
        let span = tracing::info_span!("delete", resource_type = type_name, id = %d.id());
        resource.delete(&mut d).instrument(span).await?;

        tracing::info!(resource_type = type_name, id = %d.id(), "deleted");
        Ok(())
    }

    /// Imports an existing object by ID; `None` if it does not exist.
    pub async fn import(&self, type_name: &str, id: &str) -> Result<Option<Value>> {
        let resource = self.resource(type_name)?;
        if !resource.importable() {
            return Err(ProviderError::InvalidConfig(format!(
                "resource {type_name} doesn't support import"
            )));
        }

        let mut d = ResourceData::for_import(&resource.schema(), id);
        let span = tracing::info_span!("import", resource_type = type_name, id);
        async {
            resource.import(&mut d).await?;
            resource.read(&mut d).await
        }
        .instrument(span)
        .await?;

        if d.id().is_empty() {
            return Ok(None);
        }
        tracing::info!(resource_type = type_name, id = %d.id(), "imported");
        Ok(d.into_state())
    }

    pub async fn read_data_source(&self, type_name: &str, config: &Value) -> Result<Value> {
        let data_source = self.data_source(type_name)?;
        self.validate_data_source_config(type_name, config)?;

        let mut d = ResourceData::new(&data_source.schema(), config);
        let span = tracing::debug_span!("read_data_source", data_source = type_name);
        data_source.read(&mut d).instrument(span).await?;
        Ok(d.state())
    }
}

/// Keeps whatever object a failed create or update left behind.
fn partial(type_name: &str, d: ResourceData, err: ProviderError) -> ProviderError {
    match d.into_state() {
        Some(state) => {
            tracing::warn!(
                resource_type = type_name,
                error = %err,
                "operation failed, keeping partial state"
            );
            ProviderError::Partial {
                state: Box::new(state),
                source: Box::new(err),
            }
        }
        None => err,
    }
}

fn check(diagnostics: Vec<Diagnostic>) -> Result<Vec<Diagnostic>> {
    if has_errors(&diagnostics) {
        Err(ProviderError::Validation(
            diagnostics.into_iter().filter(Diagnostic::is_error).collect(),
        ))
    } else {
        Ok(diagnostics)
    }
}

/// Retry configuration for provider operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the given (zero-based) retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .powi(attempt.min(i32::MAX as u32) as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(delay)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeType, Block, ResourceSchema};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// A resource backed by an in-memory map
    #[derive(Default)]
    struct Notes {
        remote: Mutex<BTreeMap<String, String>>,
    }

    #[async_trait]
    impl Resource for Notes {
        fn type_name(&self) -> &'static str {
            "test_note"
        }

        fn schema(&self) -> ResourceSchema {
            ResourceSchema::new(
                Block::new()
                    .attribute("name", Attribute::required(AttributeType::String).force_new())
                    .attribute("body", Attribute::required(AttributeType::String))
                    .attribute("length", Attribute::computed(AttributeType::Int)),
            )
        }

        async fn create(&self, d: &mut ResourceData) -> Result<()> {
            let name = d.get_str("name").to_string();
            self.remote
                .lock()
                .unwrap()
                .insert(name.clone(), d.get_str("body").to_string());
            d.set_id(name);
            self.read(d).await
        }

        async fn read(&self, d: &mut ResourceData) -> Result<()> {
            let body = self.remote.lock().unwrap().get(d.id()).cloned();
            match body {
                Some(body) => {
                    d.set("name", d.id().to_string());
                    d.set("length", body.len() as i64);
                    d.set("body", body);
                }
                None => d.clear_id(),
            }
            Ok(())
        }

        async fn update(&self, d: &mut ResourceData) -> Result<()> {
            self.remote
                .lock()
                .unwrap()
                .insert(d.id().to_string(), d.get_str("body").to_string());
            self.read(d).await
        }

        async fn delete(&self, d: &mut ResourceData) -> Result<()> {
            self.remote.lock().unwrap().remove(d.id());
            Ok(())
        }
    }

    /// Creates the remote object, then fails as if a follow-up wait timed out.
    #[derive(Default)]
    struct Flaky {
        notes: Notes,
    }

    #[async_trait]
    impl Resource for Flaky {
        fn type_name(&self) -> &'static str {
            "test_flaky"
        }

        fn schema(&self) -> ResourceSchema {
            self.notes.schema()
        }

        async fn create(&self, d: &mut ResourceData) -> Result<()> {
            self.notes.create(d).await?;
            Err(ProviderError::Timeout {
                last_state: "PENDING".to_string(),
                expected: vec!["READY".to_string()],
                timeout: Duration::from_secs(1),
                last_error: None,
            })
        }

        async fn read(&self, d: &mut ResourceData) -> Result<()> {
            self.notes.read(d).await
        }

        async fn update(&self, _d: &mut ResourceData) -> Result<()> {
            Err(ProviderError::api("Throttling", "slow down"))
        }

        async fn delete(&self, d: &mut ResourceData) -> Result<()> {
            self.notes.delete(d).await
        }
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let provider = Provider::new("test").with_resource(Notes::default());

        let change = provider
            .plan("test_note", None, Some(&json!({"name": "a", "body": "hello"})))
            .unwrap();
        assert_eq!(change.action, ActionType::Create);
        let state = provider.apply(&change).await.unwrap().unwrap();
        assert_eq!(state, json!({"id": "a", "name": "a", "body": "hello", "length": 5}));

        let change = provider
            .plan("test_note", Some(&state), Some(&json!({"name": "a", "body": "hello!"})))
            .unwrap();
        assert_eq!(change.action, ActionType::Update);
        let state = provider.apply(&change).await.unwrap().unwrap();
        assert_eq!(state["length"], json!(6));

        let change = provider
            .plan("test_note", Some(&state), Some(&json!({"name": "b", "body": "hello!"})))
            .unwrap();
        assert_eq!(change.action, ActionType::Replace);
        let state = provider.apply(&change).await.unwrap().unwrap();
        assert_eq!(state["id"], json!("b"));

        let imported = provider.import("test_note", "b").await.unwrap().unwrap();
        assert_eq!(imported, state);
        assert!(provider.import("test_note", "zzz").await.unwrap().is_none());

        let change = provider.plan("test_note", Some(&state), None).unwrap();
        assert!(provider.apply(&change).await.unwrap().is_none());
        assert!(provider.read("test_note", &state).await.unwrap().is_none());
    }

    #[test]
    fn test_validation_errors() {
        let provider = Provider::new("test").with_resource(Notes::default());
        let err = provider
            .plan("test_note", None, Some(&json!({"name": "a"})))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The argument \"body\" is required, but no definition was found."
        );

        let err = provider.plan("test_nope", None, None).unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedResourceType(_)));
    }

    #[tokio::test]
    async fn test_create_and_update_validate_config() {
        let provider = Provider::new("test").with_resource(Notes::default());

        let err = provider
            .create("test_note", &json!({"name": "a", "body": "x", "bogus": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)), "{err}");

        let err = provider
            .create("test_note", &json!({"name": "a"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)), "{err}");

        let err = provider
            .create("test_note", &json!({"name": "a", "body": "x", "length": 1}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("computed-only"), "{err}");

        let state = provider
            .create("test_note", &json!({"name": "a", "body": "x"}))
            .await
            .unwrap();
        let err = provider
            .update("test_note", &state, &json!({"name": "a", "body": 5, "bogus": true}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)), "{err}");

        let state = provider
            .update("test_note", &state, &json!({"name": "a", "body": "xyz"}))
            .await
            .unwrap();
        assert_eq!(state, json!({"id": "a", "name": "a", "body": "xyz", "length": 3}));
    }

    #[tokio::test]
    async fn test_failed_create_keeps_partial_state() {
        let provider = Provider::new("test").with_resource(Flaky::default());

        let err = provider
            .create("test_flaky", &json!({"name": "a", "body": "hello"}))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{err}");
        assert_eq!(
            err.partial_state(),
            Some(&json!({"id": "a", "name": "a", "body": "hello", "length": 5}))
        );
        assert!(err.to_string().starts_with("timeout while waiting"), "{err}");

        let state = json!({"id": "a", "name": "a", "body": "hello", "length": 5});
        let err = provider
            .update("test_flaky", &state, &json!({"name": "a", "body": "bye"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("Throttling"));
        assert_eq!(err.partial_state().unwrap()["id"], json!("a"));
    }

    #[test]
    fn test_schema_lists_resources() {
        let provider = Provider::new("test").with_resource(Notes::default());
        assert_eq!(provider.resource_types().collect::<Vec<_>>(), vec!["test_note"]);
        assert!(provider.schema().resources.contains_key("test_note"));
    }

    #[test]
    fn test_delay_for_attempt() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(10)); // capped at max
    }
}
