//! AWS client construction

use aws_config::{BehaviorVersion, Region, SdkConfig};
use stratus_config::ProviderSettings;
use stratus_core::{IgnoreConfig, KeyValueTags, RetryConfig, TagPolicy};

const OFFLINE_REGION: &str = "us-east-1";

/// Service clients shared by every resource of the provider
#[derive(Debug, Clone)]
pub struct AwsClient {
    region: String,
    tag_policy: TagPolicy,
    pub acm: aws_sdk_acm::Client,
    pub s3: aws_sdk_s3::Client,
    pub oam: aws_sdk_oam::Client,
    pub codecommit: aws_sdk_codecommit::Client,
}

impl AwsClient {
    /// Loads the SDK configuration (credentials, region) and builds clients.
    ///
    /// `region` and `profile` from the settings take precedence over the
    /// environment and shared config files.
    pub async fn from_settings(settings: &ProviderSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &settings.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(max_retries) = settings.max_retries {
            let retry = RetryConfig {
                max_attempts: max_retries,
                ..RetryConfig::default()
            };
            loader = loader.retry_config(
                aws_config::retry::RetryConfig::standard()
                    .with_max_attempts(retry.max_attempts)
                    .with_initial_backoff(retry.initial_delay)
                    .with_max_backoff(retry.max_delay),
            );
        }

        let config = loader.load().await;
        let client = Self::from_sdk_config(&config, tag_policy(settings));
        tracing::debug!(region = %client.region, "AWS client configured");
        client
    }

    pub fn from_sdk_config(config: &SdkConfig, tag_policy: TagPolicy) -> Self {
        Self {
            region: config.region().map(ToString::to_string).unwrap_or_default(),
            tag_policy,
            acm: aws_sdk_acm::Client::new(config),
            s3: aws_sdk_s3::Client::new(config),
            oam: aws_sdk_oam::Client::new(config),
            codecommit: aws_sdk_codecommit::Client::new(config),
        }
    }

    /// Clients that never resolve credentials. Good enough for schema
    /// listing and validation, which make no API calls.
    pub fn offline() -> Self {
        Self::offline_from_settings(&ProviderSettings::default())
    }

    /// Offline clients that still carry the settings' region and tag
    /// policy, so planning sees the same `tags_all` an apply would.
    pub fn offline_from_settings(settings: &ProviderSettings) -> Self {
        let region = settings.region.as_deref().unwrap_or(OFFLINE_REGION);
        let config = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .build();
        Self::from_sdk_config(&config, tag_policy(settings))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn tag_policy(&self) -> &TagPolicy {
        &self.tag_policy
    }
}

fn tag_policy(settings: &ProviderSettings) -> TagPolicy {
    TagPolicy {
        default_tags: KeyValueTags::from(settings.default_tags.clone()),
        ignore: IgnoreConfig {
            keys: settings.ignore_tags.keys.clone(),
            key_prefixes: settings.ignore_tags.key_prefixes.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_tag_policy_from_settings() {
        let mut settings = ProviderSettings::default();
        settings.default_tags = BTreeMap::from([("team".to_string(), "infra".to_string())]);
        settings.ignore_tags.key_prefixes = vec!["kubernetes.io/".to_string()];

        let policy = tag_policy(&settings);
        assert_eq!(policy.default_tags.get("team"), Some("infra"));
        assert!(policy.ignore.matches("kubernetes.io/cluster"));
        assert!(!policy.ignore.matches("team"));
    }

    #[test]
    fn test_offline_client_from_settings() {
        let mut settings = ProviderSettings::default();
        settings.region = Some("eu-west-1".to_string());
        settings.default_tags = BTreeMap::from([("team".to_string(), "infra".to_string())]);

        let client = AwsClient::offline_from_settings(&settings);
        assert_eq!(client.region(), "eu-west-1");
        assert_eq!(client.tag_policy().default_tags.get("team"), Some("infra"));
    }

    #[test]
    fn test_offline_client() {
        let client = AwsClient::offline();
        assert_eq!(client.region(), "us-east-1");
        assert!(client.tag_policy().default_tags.is_empty());
    }
}
