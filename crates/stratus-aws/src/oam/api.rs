//! CloudWatch Observability Access Manager API

use crate::error::sdk_error;
use async_trait::async_trait;
use stratus_core::Result;

/// One page of `ListLinks`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinksPage {
    pub arns: Vec<String>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait OamApi: Send + Sync {
    async fn list_links(&self, next_token: Option<&str>) -> Result<LinksPage>;
}

#[async_trait]
impl OamApi for aws_sdk_oam::Client {
    async fn list_links(&self, next_token: Option<&str>) -> Result<LinksPage> {
        tracing::debug!(next_token, "ListLinks");
        let output = self
            .list_links()
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(LinksPage {
            arns: output
                .items()
                .iter()
                .filter_map(|item| item.arn().map(str::to_string))
                .collect(),
            next_token: output.next_token().map(str::to_string),
        })
    }
}
