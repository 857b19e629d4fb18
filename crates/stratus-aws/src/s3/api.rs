//! S3 lifecycle API and its SDK implementation

use super::model::*;
use crate::error::sdk_error;
use async_trait::async_trait;
use aws_sdk_s3::primitives::DateTime as SdkDateTime;
use aws_sdk_s3::types as sdk;
use chrono::{DateTime, Utc};
use stratus_core::{KeyValueTags, ProviderError, Result};

/// Bucket lifecycle calls used by the lifecycle configuration resource
#[async_trait]
pub trait LifecycleApi: Send + Sync {
    async fn put_bucket_lifecycle_configuration(
        &self,
        bucket: &str,
        expected_bucket_owner: Option<&str>,
        rules: &[LifecycleRule],
    ) -> Result<()>;

    async fn get_bucket_lifecycle_configuration(
        &self,
        bucket: &str,
        expected_bucket_owner: Option<&str>,
    ) -> Result<Vec<LifecycleRule>>;

    async fn delete_bucket_lifecycle(
        &self,
        bucket: &str,
        expected_bucket_owner: Option<&str>,
    ) -> Result<()>;
}

#[async_trait]
impl LifecycleApi for aws_sdk_s3::Client {
    async fn put_bucket_lifecycle_configuration(
        &self,
        bucket: &str,
        expected_bucket_owner: Option<&str>,
        rules: &[LifecycleRule],
    ) -> Result<()> {
        let rules = rules
            .iter()
            .map(to_sdk_rule)
            .collect::<Result<Vec<_>>>()?;
        let configuration = sdk::BucketLifecycleConfiguration::builder()
            .set_rules(Some(rules))
            .build()
            .map_err(build_error)?;

        tracing::debug!(bucket, "PutBucketLifecycleConfiguration");
        self.put_bucket_lifecycle_configuration()
            .bucket(bucket)
            .set_expected_bucket_owner(expected_bucket_owner.map(str::to_string))
            .lifecycle_configuration(configuration)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn get_bucket_lifecycle_configuration(
        &self,
        bucket: &str,
        expected_bucket_owner: Option<&str>,
    ) -> Result<Vec<LifecycleRule>> {
        tracing::debug!(bucket, "GetBucketLifecycleConfiguration");
        let output = self
            .get_bucket_lifecycle_configuration()
            .bucket(bucket)
            .set_expected_bucket_owner(expected_bucket_owner.map(str::to_string))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(output.rules().iter().map(from_sdk_rule).collect())
    }

    async fn delete_bucket_lifecycle(
        &self,
        bucket: &str,
        expected_bucket_owner: Option<&str>,
    ) -> Result<()> {
        tracing::debug!(bucket, "DeleteBucketLifecycle");
        self.delete_bucket_lifecycle()
            .bucket(bucket)
            .set_expected_bucket_owner(expected_bucket_owner.map(str::to_string))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}

fn build_error(err: aws_sdk_s3::error::BuildError) -> ProviderError {
    ProviderError::InvalidConfig(err.to_string())
}

fn to_sdk_date(date: &DateTime<Utc>) -> SdkDateTime {
    SdkDateTime::from_secs(date.timestamp())
}

fn from_sdk_date(date: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(date.secs(), 0)
}

fn to_sdk_tag(key: &str, value: &str) -> Result<sdk::Tag> {
    sdk::Tag::builder()
        .key(key)
        .value(value)
        .build()
        .map_err(build_error)
}

#[allow(deprecated)]
fn to_sdk_rule(rule: &LifecycleRule) -> Result<sdk::LifecycleRule> {
    let filter = match &rule.filter {
        None => None,
        Some(LifecycleRuleFilter::And(and)) => {
            let tags = match &and.tags {
                Some(tags) => Some(
                    tags.iter()
                        .map(|(k, v)| to_sdk_tag(k, v))
                        .collect::<Result<Vec<_>>>()?,
                ),
                None => None,
            };
            let operator = sdk::LifecycleRuleAndOperator::builder()
                .set_prefix(and.prefix.clone())
                .set_tags(tags)
                .set_object_size_greater_than(and.object_size_greater_than)
                .set_object_size_less_than(and.object_size_less_than)
                .build();
            Some(sdk::LifecycleRuleFilter::builder().and(operator).build())
        }
        Some(LifecycleRuleFilter::ObjectSizeGreaterThan(v)) => Some(
            sdk::LifecycleRuleFilter::builder()
                .object_size_greater_than(*v)
                .build(),
        ),
        Some(LifecycleRuleFilter::ObjectSizeLessThan(v)) => Some(
            sdk::LifecycleRuleFilter::builder()
                .object_size_less_than(*v)
                .build(),
        ),
        Some(LifecycleRuleFilter::Prefix(p)) => {
            Some(sdk::LifecycleRuleFilter::builder().prefix(p).build())
        }
        Some(LifecycleRuleFilter::Tag(tag)) => Some(
            sdk::LifecycleRuleFilter::builder()
                .tag(to_sdk_tag(&tag.key, &tag.value)?)
                .build(),
        ),
    };

    let expiration = rule.expiration.as_ref().map(|e| {
        sdk::LifecycleExpiration::builder()
            .set_date(e.date.as_ref().map(to_sdk_date))
            .set_days(e.days)
            .set_expired_object_delete_marker(e.expired_object_delete_marker)
            .build()
    });

    let abort = rule.abort_incomplete_multipart_upload.as_ref().map(|a| {
        sdk::AbortIncompleteMultipartUpload::builder()
            .set_days_after_initiation(a.days_after_initiation)
            .build()
    });

    let noncurrent_expiration = rule.noncurrent_version_expiration.as_ref().map(|e| {
        sdk::NoncurrentVersionExpiration::builder()
            .set_newer_noncurrent_versions(e.newer_noncurrent_versions)
            .set_noncurrent_days(e.noncurrent_days)
            .build()
    });

    let noncurrent_transitions = rule.noncurrent_version_transitions.as_ref().map(|ts| {
        ts.iter()
            .map(|t| {
                sdk::NoncurrentVersionTransition::builder()
                    .set_newer_noncurrent_versions(t.newer_noncurrent_versions)
                    .set_noncurrent_days(t.noncurrent_days)
                    .storage_class(sdk::TransitionStorageClass::from(t.storage_class.as_str()))
                    .build()
            })
            .collect::<Vec<_>>()
    });

    let transitions = rule.transitions.as_ref().map(|ts| {
        ts.iter()
            .map(|t| {
                sdk::Transition::builder()
                    .set_date(t.date.as_ref().map(to_sdk_date))
                    .set_days(t.days)
                    .storage_class(sdk::TransitionStorageClass::from(t.storage_class.as_str()))
                    .build()
            })
            .collect::<Vec<_>>()
    });

    sdk::LifecycleRule::builder()
        .set_id(rule.id.clone())
        .status(sdk::ExpirationStatus::from(rule.status.as_str()))
        .set_prefix(rule.prefix.clone())
        .set_filter(filter)
        .set_expiration(expiration)
        .set_abort_incomplete_multipart_upload(abort)
        .set_noncurrent_version_expiration(noncurrent_expiration)
        .set_noncurrent_version_transitions(noncurrent_transitions)
        .set_transitions(transitions)
        .build()
        .map_err(build_error)
}

#[allow(deprecated)]
fn from_sdk_rule(rule: &sdk::LifecycleRule) -> LifecycleRule {
    LifecycleRule {
        id: rule.id().map(str::to_string),
        status: rule.status().as_str().to_string(),
        prefix: rule.prefix().map(str::to_string),
        filter: rule.filter().and_then(from_sdk_filter),
        expiration: rule.expiration().map(|e| LifecycleExpiration {
            date: e.date().and_then(from_sdk_date),
            days: e.days(),
            expired_object_delete_marker: e.expired_object_delete_marker(),
        }),
        abort_incomplete_multipart_upload: rule.abort_incomplete_multipart_upload().map(|a| {
            AbortIncompleteMultipartUpload {
                days_after_initiation: a.days_after_initiation(),
            }
        }),
        noncurrent_version_expiration: rule.noncurrent_version_expiration().map(|e| {
            NoncurrentVersionExpiration {
                newer_noncurrent_versions: e.newer_noncurrent_versions(),
                noncurrent_days: e.noncurrent_days(),
            }
        }),
        noncurrent_version_transitions: rule.noncurrent_version_transitions.as_ref().map(|ts| {
            ts.iter()
                .map(|t| NoncurrentVersionTransition {
                    newer_noncurrent_versions: t.newer_noncurrent_versions(),
                    noncurrent_days: t.noncurrent_days(),
                    storage_class: t
                        .storage_class()
                        .map(|c| c.as_str().to_string())
                        .unwrap_or_default(),
                })
                .collect()
        }),
        transitions: rule.transitions.as_ref().map(|ts| {
            ts.iter()
                .map(|t| Transition {
                    date: t.date().and_then(from_sdk_date),
                    days: t.days(),
                    storage_class: t
                        .storage_class()
                        .map(|c| c.as_str().to_string())
                        .unwrap_or_default(),
                })
                .collect()
        }),
    }
}

/// Maps the response filter onto its single set member, checked in the
/// same order the request side gives precedence to.
fn from_sdk_filter(filter: &sdk::LifecycleRuleFilter) -> Option<LifecycleRuleFilter> {
    if let Some(and) = filter.and() {
        let tags: KeyValueTags = and
            .tags()
            .iter()
            .map(|t| (t.key().to_string(), t.value().to_string()))
            .collect();
        return Some(LifecycleRuleFilter::And(LifecycleRuleAndOperator {
            object_size_greater_than: and.object_size_greater_than(),
            object_size_less_than: and.object_size_less_than(),
            prefix: and.prefix().map(str::to_string),
            tags: and.tags.as_ref().map(|_| tags),
        }));
    }
    if let Some(v) = filter.object_size_greater_than() {
        return Some(LifecycleRuleFilter::ObjectSizeGreaterThan(v));
    }
    if let Some(v) = filter.object_size_less_than() {
        return Some(LifecycleRuleFilter::ObjectSizeLessThan(v));
    }
    if let Some(tag) = filter.tag() {
        return Some(LifecycleRuleFilter::Tag(Tag {
            key: tag.key().to_string(),
            value: tag.value().to_string(),
        }));
    }
    filter
        .prefix()
        .map(|p| LifecycleRuleFilter::Prefix(p.to_string()))
}
