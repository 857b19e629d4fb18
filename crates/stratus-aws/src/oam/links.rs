//! `aws_oam_links` data source

use super::api::OamApi;
use async_trait::async_trait;
use std::sync::Arc;
use stratus_core::error::ACTION_READING;
use stratus_core::{
    Attribute, AttributeType, Block, DataSource, ResourceData, ResourceSchema, Result,
};

pub const TYPE_NAME: &str = "aws_oam_links";

const DATA_SOURCE_NAME: &str = "Links Data Source";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(Block::new().attribute(
        "arns",
        Attribute::computed(AttributeType::set(AttributeType::String)),
    ))
}

/// Every link in the region. The data source ID is the region.
pub struct Links {
    api: Arc<dyn OamApi>,
    region: String,
}

impl Links {
    pub fn new(api: Arc<dyn OamApi>, region: impl Into<String>) -> Self {
        Self {
            api,
            region: region.into(),
        }
    }
}

/// Follows `next_token` until the last page.
pub(crate) async fn list_link_arns(api: &dyn OamApi) -> Result<Vec<String>> {
    let mut arns = Vec::new();
    let mut next_token: Option<String> = None;
    loop {
        let page = api.list_links(next_token.as_deref()).await?;
        arns.extend(page.arns);
        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => return Ok(arns),
        }
    }
}

#[async_trait]
impl DataSource for Links {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let arns = list_link_arns(&*self.api)
            .await
            .map_err(|err| err.context(ACTION_READING, DATA_SOURCE_NAME, ""))?;

        d.set_id(self.region.clone());
        d.set("arns", arns);
        Ok(())
    }
}
