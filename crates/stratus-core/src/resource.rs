//! Resource and data source traits

use crate::data::ResourceData;
use crate::error::{ProviderError, Result};
use crate::schema::ResourceSchema;
use async_trait::async_trait;
use serde_json::Value;

/// A managed resource type
///
/// Handlers receive a [`ResourceData`] and mutate it in place. `read` calls
/// `clear_id()` when the remote object no longer exists.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name used in configuration (e.g. `aws_acm_certificate`)
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn create(&self, d: &mut ResourceData) -> Result<()>;

    async fn read(&self, d: &mut ResourceData) -> Result<()>;

    /// Resources whose arguments all force replacement never see an update.
    async fn update(&self, _d: &mut ResourceData) -> Result<()> {
        Err(ProviderError::InvalidConfig(format!(
            "{} does not support in-place updates",
            self.type_name()
        )))
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()>;

    fn importable(&self) -> bool {
        true
    }

    /// Prepares imported data before the read; the default keeps the ID as given.
    async fn import(&self, _d: &mut ResourceData) -> Result<()> {
        Ok(())
    }

    /// Returns true when the difference between `old` and `new` at `path`
    /// should not produce a change.
    fn suppress_diff(&self, _path: &str, _old: Option<&Value>, _new: Option<&Value>) -> bool {
        false
    }

    /// Adjusts the planned value before it is diffed against the prior state.
    fn customize_plan(&self, _prior: &Value, _planned: &mut Value) {}
}

/// A read-only data source
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn read(&self, d: &mut ResourceData) -> Result<()>;
}
