//! `aws_s3_bucket_lifecycle_configuration`

use super::api::LifecycleApi;
use super::model::{
    LifecycleRule, expand_lifecycle_rules, flatten_lifecycle_rules, lifecycle_rules_equal,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use stratus_core::error::{
    ACTION_CREATING, ACTION_DELETING, ACTION_READING, ACTION_UPDATING, ACTION_WAITING_CREATE,
    ACTION_WAITING_DELETE, ACTION_WAITING_UPDATE,
};
use stratus_core::id::{DEFAULT_SEPARATOR, create_resource_id, parse_resource_id};
use stratus_core::retry::{
    RetryError, StateChangeConf, retry_context, retry_until_not_found, retry_when_code_equals,
};
use stratus_core::{
    Attribute, AttributeType, Block, Operation, ProviderError, Resource, ResourceData,
    ResourceSchema, Result, Timeouts, Validator, equivalent,
};
use tokio::time::sleep;

pub const TYPE_NAME: &str = "aws_s3_bucket_lifecycle_configuration";

const RESOURCE_NAME: &str = "S3 Bucket Lifecycle Configuration";

const ERR_CODE_NO_SUCH_BUCKET: &str = "NoSuchBucket";
const ERR_CODE_NO_SUCH_LIFECYCLE_CONFIGURATION: &str = "NoSuchLifecycleConfiguration";
const ERR_CODE_INVALID_ARGUMENT: &str = "InvalidArgument";

const BUCKET_PROPAGATION_TIMEOUT: Duration = Duration::from_secs(2 * 60);
const RULES_EXTRA_RETRY_DELAY: Duration = Duration::from_secs(5);
const RULES_STEADY_TIMEOUT: Duration = Duration::from_secs(2 * 60);

pub const LIFECYCLE_RULE_STATUSES: &[&str] = &["Disabled", "Enabled"];

pub const TRANSITION_STORAGE_CLASSES: &[&str] = &[
    "GLACIER",
    "STANDARD_IA",
    "ONEZONE_IA",
    "INTELLIGENT_TIERING",
    "DEEP_ARCHIVE",
    "GLACIER_IR",
];

pub fn schema() -> ResourceSchema {
    let rule = Block::new()
        .attribute(
            "abort_incomplete_multipart_upload",
            Attribute::optional(AttributeType::list(Block::new().attribute(
                "days_after_initiation",
                Attribute::optional(AttributeType::Int),
            )))
            .max_items(1),
        )
        .attribute(
            "expiration",
            Attribute::optional(AttributeType::list(
                Block::new()
                    .attribute(
                        "date",
                        Attribute::optional(AttributeType::String)
                            .validate(Validator::Rfc3339Timestamp),
                    )
                    // The API returns 0 for an unset value.
                    .attribute(
                        "days",
                        Attribute::optional(AttributeType::Int).default_value(0),
                    )
                    .attribute(
                        "expired_object_delete_marker",
                        Attribute::optional_computed(AttributeType::Bool),
                    ),
            ))
            .max_items(1),
        )
        .attribute(
            "filter",
            Attribute::optional(AttributeType::list(filter_block())).max_items(1),
        )
        .attribute(
            "id",
            Attribute::required(AttributeType::String)
                .validate(Validator::StringLenBetween(1, 255)),
        )
        .attribute(
            "noncurrent_version_expiration",
            Attribute::optional(AttributeType::list(
                Block::new()
                    .attribute(
                        "newer_noncurrent_versions",
                        Attribute::optional(AttributeType::NullableInt)
                            .validate(Validator::NullableIntAtLeast(1)),
                    )
                    .attribute(
                        "noncurrent_days",
                        Attribute::optional(AttributeType::Int).validate(Validator::IntAtLeast(1)),
                    ),
            ))
            .max_items(1),
        )
        .attribute(
            "noncurrent_version_transition",
            Attribute::optional(AttributeType::set(
                Block::new()
                    .attribute(
                        "newer_noncurrent_versions",
                        Attribute::optional(AttributeType::NullableInt)
                            .validate(Validator::NullableIntAtLeast(1)),
                    )
                    .attribute(
                        "noncurrent_days",
                        Attribute::optional(AttributeType::Int).validate(Validator::IntAtLeast(0)),
                    )
                    .attribute("storage_class", storage_class()),
            )),
        )
        .attribute(
            "prefix",
            Attribute::optional(AttributeType::String).deprecated("Use filter instead"),
        )
        .attribute(
            "status",
            Attribute::required(AttributeType::String)
                .validate(Validator::StringInSlice(LIFECYCLE_RULE_STATUSES)),
        )
        .attribute(
            "transition",
            Attribute::optional(AttributeType::set(
                Block::new()
                    .attribute(
                        "date",
                        Attribute::optional(AttributeType::String)
                            .validate(Validator::Rfc3339Timestamp),
                    )
                    .attribute(
                        "days",
                        Attribute::optional(AttributeType::Int).validate(Validator::IntAtLeast(0)),
                    )
                    .attribute("storage_class", storage_class()),
            )),
        );

    let block = Block::new()
        .attribute(
            "bucket",
            Attribute::required(AttributeType::String)
                .force_new()
                .validate(Validator::StringLenBetween(1, 63)),
        )
        .attribute(
            "expected_bucket_owner",
            Attribute::optional(AttributeType::String)
                .force_new()
                .validate(Validator::AccountId),
        )
        .attribute("rule", Attribute::required(AttributeType::list(rule)));

    ResourceSchema::new(block).with_timeouts(
        Timeouts::default()
            .create(Duration::from_secs(3 * 60))
            .update(Duration::from_secs(3 * 60)),
    )
}

fn filter_block() -> Block {
    Block::new()
        .attribute(
            "and",
            Attribute::optional(AttributeType::list(
                Block::new()
                    .attribute(
                        "object_size_greater_than",
                        Attribute::optional(AttributeType::Int).validate(Validator::IntAtLeast(0)),
                    )
                    .attribute(
                        "object_size_less_than",
                        Attribute::optional(AttributeType::Int).validate(Validator::IntAtLeast(1)),
                    )
                    .attribute("prefix", Attribute::optional(AttributeType::String))
                    .attribute(
                        "tags",
                        Attribute::optional(AttributeType::map(AttributeType::String)),
                    ),
            ))
            .max_items(1),
        )
        .attribute(
            "object_size_greater_than",
            Attribute::optional(AttributeType::NullableInt),
        )
        .attribute(
            "object_size_less_than",
            Attribute::optional(AttributeType::NullableInt),
        )
        .attribute("prefix", Attribute::optional(AttributeType::String))
        .attribute(
            "tag",
            Attribute::optional(AttributeType::list(
                Block::new()
                    .attribute("key", Attribute::required(AttributeType::String))
                    .attribute("value", Attribute::required(AttributeType::String)),
            ))
            .max_items(1),
        )
}

fn storage_class() -> Attribute {
    Attribute::required(AttributeType::String)
        .validate(Validator::StringInSlice(TRANSITION_STORAGE_CLASSES))
}

/// Lifecycle configuration of one bucket
pub struct BucketLifecycleConfiguration {
    api: Arc<dyn LifecycleApi>,
}

impl BucketLifecycleConfiguration {
    pub fn new(api: Arc<dyn LifecycleApi>) -> Self {
        Self { api }
    }

    /// `(bucket, expected_bucket_owner)` from the resource ID
    fn parse_id(id: &str) -> Result<(String, String)> {
        let mut parts = parse_resource_id(id, 2, DEFAULT_SEPARATOR, true)?;
        let owner = parts.pop().unwrap_or_default();
        let bucket = parts.pop().unwrap_or_default();
        Ok((bucket, owner))
    }
}

fn owner_opt(owner: &str) -> Option<&str> {
    (!owner.is_empty()).then_some(owner)
}

/// Current rules; a missing bucket, a missing configuration and an empty
/// rule list all count as "not found".
pub(crate) async fn find_lifecycle_rules(
    api: &dyn LifecycleApi,
    bucket: &str,
    expected_bucket_owner: &str,
) -> Result<Vec<LifecycleRule>> {
    match api
        .get_bucket_lifecycle_configuration(bucket, owner_opt(expected_bucket_owner))
        .await
    {
        Err(err)
            if err.code_equals(&[
                ERR_CODE_NO_SUCH_BUCKET,
                ERR_CODE_NO_SUCH_LIFECYCLE_CONFIGURATION,
            ]) =>
        {
            Err(ProviderError::not_found_from(err))
        }
        Err(err) => Err(err),
        Ok(rules) if rules.is_empty() => Err(ProviderError::empty_result()),
        Ok(rules) => Ok(rules),
    }
}

/// Waits until the remote rules match `rules` three times in a row.
async fn wait_lifecycle_rules_equals(
    api: &dyn LifecycleApi,
    bucket: &str,
    expected_bucket_owner: &str,
    rules: &[LifecycleRule],
    timeout: Duration,
) -> Result<Vec<LifecycleRule>> {
    StateChangeConf::new(&["true"], timeout)
        .min_timeout(Duration::from_secs(10))
        .continuous_target_occurence(3)
        .not_found_checks(20)
        .wait_for_state(|| async move {
            match find_lifecycle_rules(api, bucket, expected_bucket_owner).await {
                Err(err) if err.is_not_found() => Ok(None),
                Err(err) => Err(err),
                Ok(output) => {
                    let state = lifecycle_rules_equal(&output, rules).to_string();
                    Ok(Some((output, state)))
                }
            }
        })
        .await
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

fn directory_bucket_error(err: ProviderError) -> ProviderError {
    ProviderError::InvalidConfig(format!("directory buckets are not supported: {err}"))
}

#[async_trait]
impl Resource for BucketLifecycleConfiguration {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let bucket = d.get_str("bucket").to_string();
        let owner = d.get_str("expected_bucket_owner").to_string();
        let rules = expand_lifecycle_rules(d.get_list("rule"));
        let api = &*self.api;

        tracing::info!(bucket = %bucket, rules = rules.len(), "creating S3 bucket lifecycle configuration");
        retry_when_code_equals(
            BUCKET_PROPAGATION_TIMEOUT,
            || api.put_bucket_lifecycle_configuration(&bucket, owner_opt(&owner), &rules),
            &[ERR_CODE_NO_SUCH_BUCKET],
        )
        .await
        .map_err(|err| {
            let err = if err.message_contains(
                ERR_CODE_INVALID_ARGUMENT,
                "LifecycleConfiguration is not valid, expected CreateBucketConfiguration",
            ) {
                directory_bucket_error(err)
            } else {
                err
            };
            err.context(ACTION_CREATING, RESOURCE_NAME, bucket.as_str())
        })?;

        d.set_id(create_resource_id(
            &[bucket.as_str(), owner.as_str()],
            DEFAULT_SEPARATOR,
            true,
        )?);

        wait_lifecycle_rules_equals(api, &bucket, &owner, &rules, d.timeout(Operation::Create))
            .await
            .map_err(|err| err.context(ACTION_WAITING_CREATE, RESOURCE_NAME, d.id()))?;

        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let (bucket, owner) = Self::parse_id(d.id())?;
        let id = d.id().to_string();
        let is_new = d.is_new_resource();
        let api = &*self.api;

        // The API is eventually consistent: keep reading until two
        // consecutive reads agree.
        let last_output: Mutex<Option<Vec<LifecycleRule>>> = Mutex::new(None);
        let last = &last_output;
        let (bucket_ref, owner_ref, id_ref) = (bucket.as_str(), owner.as_str(), id.as_str());
        let result = retry_context(RULES_STEADY_TIMEOUT, || async move {
            sleep(RULES_EXTRA_RETRY_DELAY).await;

            let output = match find_lifecycle_rules(api, bucket_ref, owner_ref).await {
                Err(err) if is_new && err.is_not_found() => return Err(RetryError::Retryable(err)),
                Err(err) => return Err(RetryError::NonRetryable(err)),
                Ok(output) => output,
            };

            let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
            if last.as_ref().is_some_and(|prev| lifecycle_rules_equal(prev, &output)) {
                return Ok(output);
            }
            *last = Some(output);
            Err(RetryError::Retryable(ProviderError::api(
                "",
                format!("{RESOURCE_NAME} ({id_ref}) has not stabilized; retrying"),
            )))
        })
        .await;

        let result = match result {
            Err(err) if err.is_timeout() => find_lifecycle_rules(api, &bucket, &owner).await,
            other => other,
        };

        let rules = match result {
            Err(err) if !is_new && err.is_not_found() => {
                tracing::warn!(id = %id, "{RESOURCE_NAME} not found, removing from state");
                d.clear_id();
                return Ok(());
            }
            Err(err) => return Err(err.context(ACTION_READING, RESOURCE_NAME, id)),
            Ok(rules) => rules,
        };

        d.set("bucket", bucket);
        d.set("expected_bucket_owner", owner);
        d.set("rule", flatten_lifecycle_rules(&rules));
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let (bucket, owner) = Self::parse_id(d.id())?;
        let rules = expand_lifecycle_rules(d.get_list("rule"));
        let api = &*self.api;

        tracing::info!(id = %d.id(), rules = rules.len(), "updating S3 bucket lifecycle configuration");
        retry_when_code_equals(
            BUCKET_PROPAGATION_TIMEOUT,
            || api.put_bucket_lifecycle_configuration(&bucket, owner_opt(&owner), &rules),
            &[ERR_CODE_NO_SUCH_LIFECYCLE_CONFIGURATION],
        )
        .await
        .map_err(|err| err.context(ACTION_UPDATING, RESOURCE_NAME, d.id()))?;

        wait_lifecycle_rules_equals(api, &bucket, &owner, &rules, d.timeout(Operation::Update))
            .await
            .map_err(|err| err.context(ACTION_WAITING_UPDATE, RESOURCE_NAME, d.id()))?;

        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let (bucket, owner) = Self::parse_id(d.id())?;
        let api = &*self.api;

        tracing::info!(id = %d.id(), "deleting S3 bucket lifecycle configuration");
        match api.delete_bucket_lifecycle(&bucket, owner_opt(&owner)).await {
            Err(err)
                if err.code_equals(&[
                    ERR_CODE_NO_SUCH_BUCKET,
                    ERR_CODE_NO_SUCH_LIFECYCLE_CONFIGURATION,
                ]) =>
            {
                return Ok(());
            }
            Err(err) => return Err(err.context(ACTION_DELETING, RESOURCE_NAME, d.id())),
            Ok(()) => {}
        }

        retry_until_not_found(BUCKET_PROPAGATION_TIMEOUT, || {
            find_lifecycle_rules(api, &bucket, &owner)
        })
        .await
        .map_err(|err| err.context(ACTION_WAITING_DELETE, RESOURCE_NAME, d.id()))
    }

    /// A rule whose filter block was left out of the configuration reads
    /// back with an empty-prefix filter; that difference is not a change.
    fn suppress_diff(&self, path: &str, old: Option<&Value>, new: Option<&Value>) -> bool {
        if path != "rule" {
            return false;
        }
        let (Some(Value::Array(old_rules)), Some(Value::Array(new_rules))) = (old, new) else {
            return false;
        };
        if old_rules.len() != new_rules.len() {
            return false;
        }

        // Exactly one filter with nothing set in it.
        let implicit_filter = |rule: &Value| match rule
            .get("filter")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
        {
            Some([filter]) => filter
                .as_object()
                .is_some_and(|fields| fields.values().all(is_empty_value)),
            _ => false,
        };
        let no_filter = |rule: &Value| {
            rule.get("filter")
                .and_then(Value::as_array)
                .is_none_or(Vec::is_empty)
        };
        let stripped: Vec<Value> = old_rules
            .iter()
            .zip(new_rules)
            .map(|(old_rule, new_rule)| {
                let mut old_rule = old_rule.clone();
                if implicit_filter(&old_rule) && no_filter(new_rule) {
                    if let Some(obj) = old_rule.as_object_mut() {
                        obj.remove("filter");
                    }
                }
                old_rule
            })
            .collect();

        schema()
            .block
            .get("rule")
            .is_some_and(|attr| equivalent(&attr.ty, Some(&Value::Array(stripped)), new))
    }
}
