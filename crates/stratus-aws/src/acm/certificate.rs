//! `aws_acm_certificate`
//!
//! A certificate is either requested from ACM (`domain_name` set, optionally
//! issued by a private CA) or imported (`certificate_body` + `private_key`).
//! The ARN is the resource ID.

use super::api::{AcmApi, CertificateDetail, ImportCertificateInput, RequestCertificateInput};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use stratus_core::duration::CalendarDuration;
use stratus_core::error::{
    ACTION_CREATING, ACTION_DELETING, ACTION_READING, ACTION_UPDATING, ACTION_WAITING_CREATE,
    ACTION_WAITING_UPDATE,
};
use stratus_core::retry::{RetryError, StateChangeConf, retry_context, retry_when_code_equals};
use stratus_core::{
    Attribute, AttributeType, Block, KeyValueTags, Operation, ProviderError, Resource,
    ResourceData, ResourceSchema, Result, TagPolicy, Validator,
};

pub const TYPE_NAME: &str = "aws_acm_certificate";

const RESOURCE_NAME: &str = "ACM Certificate";

const ERR_CODE_RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
const ERR_CODE_RESOURCE_IN_USE: &str = "ResourceInUseException";

const DNS_VALIDATION_ASSIGNMENT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const RENEWAL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const CERTIFICATE_TYPE_AMAZON_ISSUED: &str = "AMAZON_ISSUED";
const STATUS_VALIDATION_TIMED_OUT: &str = "VALIDATION_TIMED_OUT";
const RENEWAL_ELIGIBLE: &str = "ELIGIBLE";
const RENEWAL_STATUS_PENDING_AUTO_RENEWAL: &str = "PENDING_AUTO_RENEWAL";
const RENEWAL_STATUS_SUCCESS: &str = "SUCCESS";
const RENEWAL_STATUS_FAILED: &str = "FAILED";
const VALIDATION_METHOD_EMAIL: &str = "EMAIL";
const VALIDATION_METHOD_NONE: &str = "NONE";

pub const VALIDATION_METHODS: &[&str] = &["DNS", "EMAIL", "NONE"];

pub const KEY_ALGORITHMS: &[&str] = &[
    "RSA_1024",
    "RSA_2048",
    "RSA_3072",
    "RSA_4096",
    "EC_prime256v1",
    "EC_secp384r1",
    "EC_secp521r1",
];

pub const CERTIFICATE_TRANSPARENCY_LOGGING_PREFERENCES: &[&str] = &["ENABLED", "DISABLED"];

const IMPORTED: &[&str] = &["certificate_body", "certificate_chain", "private_key"];

pub fn schema() -> ResourceSchema {
    let domain_validation_option = Block::new()
        .attribute("domain_name", Attribute::computed(AttributeType::String))
        .attribute("resource_record_name", Attribute::computed(AttributeType::String))
        .attribute("resource_record_type", Attribute::computed(AttributeType::String))
        .attribute("resource_record_value", Attribute::computed(AttributeType::String));

    let renewal_summary = Block::new()
        .attribute("renewal_status", Attribute::computed(AttributeType::String))
        .attribute("renewal_status_reason", Attribute::computed(AttributeType::String))
        .attribute("updated_at", Attribute::computed(AttributeType::String));

    let block = Block::new()
        .attribute("arn", Attribute::computed(AttributeType::String))
        .attribute(
            "certificate_authority_arn",
            Attribute::optional(AttributeType::String)
                .force_new()
                .validate(Validator::Arn)
                .conflicts_with(&["certificate_body", "private_key", "validation_method"]),
        )
        .attribute(
            "certificate_body",
            Attribute::optional(AttributeType::String)
                .required_with(&["private_key"])
                .conflicts_with(&["certificate_authority_arn", "domain_name", "validation_method"]),
        )
        .attribute(
            "certificate_chain",
            Attribute::optional(AttributeType::String)
                .conflicts_with(&["certificate_authority_arn", "domain_name", "validation_method"]),
        )
        .attribute(
            "domain_name",
            Attribute::optional_computed(AttributeType::String)
                .force_new()
                .validate(Validator::StringLenBetween(1, 253))
                .validate(Validator::StringDoesNotMatch {
                    pattern: r"\.$",
                    message: "cannot end with a period",
                })
                .exactly_one_of(&["domain_name", "private_key"])
                .conflicts_with(IMPORTED),
        )
        .attribute(
            "domain_validation_options",
            Attribute::computed(AttributeType::set(domain_validation_option)),
        )
        .attribute(
            "early_renewal_duration",
            Attribute::optional(AttributeType::String)
                .validate(Validator::Duration)
                .conflicts_with(IMPORTED),
        )
        .attribute(
            "key_algorithm",
            Attribute::optional_computed(AttributeType::String)
                .force_new()
                .validate(Validator::StringInSlice(KEY_ALGORITHMS))
                .conflicts_with(IMPORTED),
        )
        .attribute("not_after", Attribute::computed(AttributeType::String))
        .attribute("not_before", Attribute::computed(AttributeType::String))
        .attribute(
            "options",
            Attribute::optional(AttributeType::list(Block::new().attribute(
                "certificate_transparency_logging_preference",
                Attribute::optional(AttributeType::String)
                    .default_value("ENABLED")
                    .validate(Validator::StringInSlice(
                        CERTIFICATE_TRANSPARENCY_LOGGING_PREFERENCES,
                    )),
            )))
            .max_items(1)
            .conflicts_with(IMPORTED),
        )
        .attribute("pending_renewal", Attribute::computed(AttributeType::Bool))
        .attribute(
            "private_key",
            Attribute::optional(AttributeType::String)
                .sensitive()
                .required_with(&["certificate_body"])
                .exactly_one_of(&["domain_name", "private_key"]),
        )
        .attribute("renewal_eligibility", Attribute::computed(AttributeType::String))
        .attribute(
            "renewal_summary",
            Attribute::computed(AttributeType::list(renewal_summary)),
        )
        .attribute("status", Attribute::computed(AttributeType::String))
        .attribute(
            "subject_alternative_names",
            Attribute::optional_computed(AttributeType::set(AttributeType::String))
                .force_new()
                .validate(Validator::StringLenBetween(1, 253))
                .conflicts_with(IMPORTED),
        )
        .attribute("type", Attribute::computed(AttributeType::String))
        .attribute(
            "validation_emails",
            Attribute::computed(AttributeType::list(AttributeType::String)),
        )
        .attribute(
            "validation_method",
            Attribute::optional_computed(AttributeType::String)
                .force_new()
                .validate(Validator::StringInSlice(VALIDATION_METHODS))
                .conflicts_with(&[
                    "certificate_authority_arn",
                    "certificate_body",
                    "certificate_chain",
                    "private_key",
                ]),
        )
        .attribute(
            "validation_option",
            Attribute::optional(AttributeType::set(
                Block::new()
                    .attribute(
                        "domain_name",
                        Attribute::required(AttributeType::String).force_new(),
                    )
                    .attribute(
                        "validation_domain",
                        Attribute::required(AttributeType::String).force_new(),
                    ),
            ))
            .force_new()
            .conflicts_with(IMPORTED),
        )
        .attribute(
            "tags",
            Attribute::optional(AttributeType::map(AttributeType::String)),
        )
        .attribute(
            "tags_all",
            Attribute::computed(AttributeType::map(AttributeType::String)),
        );

    ResourceSchema::new(block)
}

/// ACM certificate resource
pub struct Certificate {
    api: Arc<dyn AcmApi>,
    tag_policy: TagPolicy,
}

impl Certificate {
    pub fn new(api: Arc<dyn AcmApi>, tag_policy: TagPolicy) -> Self {
        Self { api, tag_policy }
    }

    fn tags_all(&self, d: &ResourceData) -> KeyValueTags {
        self.tag_policy
            .tags_all(&KeyValueTags::from_value(d.get("tags")))
    }

    async fn request(&self, d: &ResourceData) -> Result<String> {
        let domain_name = d.get_str("domain_name").to_string();
        let certificate_authority_arn = non_empty(d.get_str("certificate_authority_arn"));
        let validation_method = non_empty(d.get_str("validation_method"));
        if certificate_authority_arn.is_none() && validation_method.is_none() {
            return Err(ProviderError::InvalidConfig(
                "`certificate_authority_arn` or `validation_method` must be set when creating an ACM certificate".to_string(),
            ));
        }

        let input = RequestCertificateInput {
            subject_alternative_names: d
                .get_string_set("subject_alternative_names")
                .iter()
                .map(|san| trim_trailing_period(san).to_string())
                .collect(),
            // A private CA certificate needs no validation.
            validation_method: match certificate_authority_arn {
                Some(_) => None,
                None => validation_method,
            },
            domain_validation_options: d
                .get_list("validation_option")
                .iter()
                .map(|o| {
                    (
                        o["domain_name"].as_str().unwrap_or_default().to_string(),
                        o["validation_domain"].as_str().unwrap_or_default().to_string(),
                    )
                })
                .collect(),
            certificate_authority_arn,
            key_algorithm: non_empty(d.get_str("key_algorithm")),
            certificate_transparency_logging_preference: non_empty(
                d.get_str("options.0.certificate_transparency_logging_preference"),
            ),
            idempotency_token: uuid::Uuid::new_v4().simple().to_string(),
            tags: self.tags_all(d),
            domain_name,
        };

        tracing::info!(domain_name = %input.domain_name, "requesting ACM certificate");
        self.api.request_certificate(input).await
    }

    async fn import(&self, d: &ResourceData, certificate_arn: Option<String>) -> Result<String> {
        let input = ImportCertificateInput {
            tags: match certificate_arn {
                Some(_) => KeyValueTags::new(),
                None => self.tags_all(d),
            },
            certificate_arn,
            certificate: d.get_str("certificate_body").to_string(),
            private_key: d.get_str("private_key").to_string(),
            certificate_chain: non_empty(d.get_str("certificate_chain")),
        };
        tracing::info!(reimport = input.certificate_arn.is_some(), "importing ACM certificate");
        self.api.import_certificate(input).await
    }

    async fn update_tags(&self, d: &ResourceData) -> Result<()> {
        let (old, _) = d.get_change("tags_all");
        let old = KeyValueTags::from_value(old);
        let new = self.tags_all(d);

        let removed = old.removed(&new);
        if !removed.is_empty() {
            self.api.remove_tags_from_certificate(d.id(), &removed).await?;
        }
        let updated = old.updated(&new);
        if !updated.is_empty() {
            self.api.add_tags_to_certificate(d.id(), &updated).await?;
        }
        Ok(())
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn trim_trailing_period(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) async fn find_certificate_by_arn(
    api: &dyn AcmApi,
    arn: &str,
) -> Result<CertificateDetail> {
    match api.describe_certificate(arn).await {
        Err(err) if err.code_equals(&[ERR_CODE_RESOURCE_NOT_FOUND]) => {
            Err(ProviderError::not_found_from(err))
        }
        Err(err) => Err(err),
        Ok(certificate) if certificate.status == STATUS_VALIDATION_TIMED_OUT => {
            Err(ProviderError::not_found(STATUS_VALIDATION_TIMED_OUT))
        }
        Ok(certificate) => Ok(certificate),
    }
}

/// Whether ACM has published what the owner needs to validate the domains:
/// a DNS record per domain, or validation emails.
fn domain_validations_available(certificate: &CertificateDetail) -> bool {
    match certificate.certificate_type.as_str() {
        CERTIFICATE_TYPE_AMAZON_ISSUED => {
            !certificate.domain_validation_options.is_empty()
                && certificate.domain_validation_options.iter().all(|v| {
                    v.resource_record.is_some()
                        || v.validation_method.as_deref() == Some(VALIDATION_METHOD_EMAIL)
                        || !v.validation_emails.is_empty()
                })
        }
        _ => true,
    }
}

async fn wait_domain_validations_available(
    api: &dyn AcmApi,
    arn: &str,
    timeout: Duration,
) -> Result<CertificateDetail> {
    retry_context(timeout, || async move {
        let certificate = find_certificate_by_arn(api, arn)
            .await
            .map_err(RetryError::NonRetryable)?;
        if domain_validations_available(&certificate) {
            Ok(certificate)
        } else {
            Err(RetryError::Retryable(ProviderError::api(
                "",
                format!("waiting for {arn} to have domain validation options"),
            )))
        }
    })
    .await
}

async fn wait_certificate_renewed(
    api: &dyn AcmApi,
    arn: &str,
    timeout: Duration,
) -> Result<CertificateDetail> {
    StateChangeConf::new(&[RENEWAL_STATUS_SUCCESS], timeout)
        .pending(&[RENEWAL_STATUS_PENDING_AUTO_RENEWAL])
        .wait_for_state(|| async move {
            let certificate = match find_certificate_by_arn(api, arn).await {
                Err(err) if err.is_not_found() => return Ok(None),
                Err(err) => return Err(err),
                Ok(certificate) => certificate,
            };
            let Some(summary) = &certificate.renewal_summary else {
                return Ok(None);
            };
            let status = summary.renewal_status.clone();
            if status == RENEWAL_STATUS_FAILED {
                return Err(ProviderError::api(
                    RENEWAL_STATUS_FAILED,
                    summary.renewal_status_reason.clone().unwrap_or_default(),
                ));
            }
            Ok(Some((certificate, status)))
        })
        .await
}

/// `validation_method` as reported for the certificate
fn certificate_validation_method(certificate: &CertificateDetail) -> String {
    if certificate.certificate_type == CERTIFICATE_TYPE_AMAZON_ISSUED {
        if let Some(method) = certificate
            .domain_validation_options
            .iter()
            .find_map(|v| v.validation_method.clone())
        {
            return method;
        }
    }
    VALIDATION_METHOD_NONE.to_string()
}

/// Whether the certificate is inside its early-renewal window.
pub fn is_pending_renewal(
    early_renewal_duration: &str,
    certificate: &CertificateDetail,
    now: DateTime<Utc>,
) -> Result<bool> {
    if early_renewal_duration.is_empty()
        || certificate.renewal_eligibility.as_deref() != Some(RENEWAL_ELIGIBLE)
    {
        return Ok(false);
    }
    let Some(not_after) = certificate.not_after else {
        return Ok(false);
    };
    let duration = CalendarDuration::parse(early_renewal_duration).map_err(|err| {
        ProviderError::InvalidConfig(format!("parsing early_renewal_duration: {err}"))
    })?;
    Ok(duration
        .sub_from(not_after)
        .is_some_and(|early_expiration| now > early_expiration))
}

/// DNS records and validation emails
fn flatten_domain_validations(certificate: &CertificateDetail) -> (Vec<Value>, Vec<String>) {
    let mut records = Vec::new();
    let mut emails = Vec::new();
    for validation in &certificate.domain_validation_options {
        if let Some(record) = &validation.resource_record {
            records.push(json!({
                "domain_name": validation.domain_name,
                "resource_record_name": record.name,
                "resource_record_type": record.record_type,
                "resource_record_value": record.value,
            }));
        } else if !validation.validation_emails.is_empty() {
            emails.extend(validation.validation_emails.iter().cloned());
        }
    }
    (records, emails)
}

#[async_trait]
impl Resource for Certificate {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let api = &*self.api;
        if !d.get_str("domain_name").is_empty() {
            let domain_name = d.get_str("domain_name").to_string();
            let arn = self
                .request(d)
                .await
                .map_err(|err| err.context(ACTION_CREATING, RESOURCE_NAME, domain_name))?;
            d.set_id(arn);

            wait_domain_validations_available(api, d.id(), DNS_VALIDATION_ASSIGNMENT_TIMEOUT)
                .await
                .map_err(|err| err.context(ACTION_WAITING_CREATE, RESOURCE_NAME, d.id()))?;
        } else {
            let arn = self
                .import(d, None)
                .await
                .map_err(|err| err.context(ACTION_CREATING, RESOURCE_NAME, "import"))?;
            d.set_id(arn);
        }

        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let certificate = match find_certificate_by_arn(&*self.api, d.id()).await {
            Err(err) if !d.is_new_resource() && err.is_not_found() => {
                tracing::warn!(id = %d.id(), "{RESOURCE_NAME} not found, removing from state");
                d.clear_id();
                return Ok(());
            }
            Err(err) => return Err(err.context(ACTION_READING, RESOURCE_NAME, d.id())),
            Ok(certificate) => certificate,
        };

        let (records, emails) = flatten_domain_validations(&certificate);
        let pending_renewal =
            is_pending_renewal(d.get_str("early_renewal_duration"), &certificate, Utc::now())
                .map_err(|err| err.context(ACTION_READING, RESOURCE_NAME, d.id()))?;

        d.set("arn", certificate.certificate_arn.clone());
        d.set(
            "certificate_authority_arn",
            certificate.certificate_authority_arn.clone().unwrap_or_default(),
        );
        d.set("domain_name", certificate.domain_name.clone().unwrap_or_default());
        d.set("domain_validation_options", records);
        d.set("key_algorithm", certificate.key_algorithm.clone().unwrap_or_default());
        d.set(
            "not_after",
            certificate.not_after.as_ref().map(format_time).unwrap_or_default(),
        );
        d.set(
            "not_before",
            certificate.not_before.as_ref().map(format_time).unwrap_or_default(),
        );
        match &certificate.certificate_transparency_logging_preference {
            Some(preference) => d.set(
                "options",
                json!([{ "certificate_transparency_logging_preference": preference }]),
            ),
            None => d.set("options", json!([])),
        }
        d.set("pending_renewal", pending_renewal);
        d.set(
            "renewal_eligibility",
            certificate.renewal_eligibility.clone().unwrap_or_default(),
        );
        let renewal_summary: Vec<Value> = certificate
            .renewal_summary
            .iter()
            .map(|s| {
                json!({
                    "renewal_status": s.renewal_status,
                    "renewal_status_reason": s.renewal_status_reason.clone().unwrap_or_default(),
                    "updated_at": s.updated_at.as_ref().map(format_time).unwrap_or_default(),
                })
            })
            .collect();
        d.set("renewal_summary", renewal_summary);
        d.set("status", certificate.status.clone());
        d.set(
            "subject_alternative_names",
            certificate.subject_alternative_names.clone(),
        );
        d.set("type", certificate.certificate_type.clone());
        d.set("validation_emails", emails);
        d.set("validation_method", certificate_validation_method(&certificate));

        let remote_tags = self
            .api
            .list_tags_for_certificate(d.id())
            .await
            .map_err(|err| err.context(ACTION_READING, RESOURCE_NAME, d.id()))?;
        let (tags, tags_all) = self.tag_policy.flatten(remote_tags);
        d.set("tags", tags.to_value());
        d.set("tags_all", tags_all.to_value());
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let api = &*self.api;

        if d.has_changes(IMPORTED) && !d.get_str("certificate_body").is_empty() {
            let arn = d.id().to_string();
            self.import(d, Some(arn))
                .await
                .map_err(|err| err.context(ACTION_UPDATING, RESOURCE_NAME, d.id()))?;
        }

        let (prior_pending, _) = d.get_change("pending_renewal");
        let prior_pending = prior_pending.and_then(Value::as_bool).unwrap_or(false);
        if d.has_change("early_renewal_duration") || prior_pending {
            let certificate = find_certificate_by_arn(api, d.id())
                .await
                .map_err(|err| err.context(ACTION_READING, RESOURCE_NAME, d.id()))?;
            let pending =
                is_pending_renewal(d.get_str("early_renewal_duration"), &certificate, Utc::now())
                    .map_err(|err| err.context(ACTION_UPDATING, RESOURCE_NAME, d.id()))?;
            if pending {
                tracing::info!(id = %d.id(), "renewing ACM certificate");
                api.renew_certificate(d.id())
                    .await
                    .map_err(|err| err.context(ACTION_UPDATING, RESOURCE_NAME, d.id()))?;
                wait_certificate_renewed(api, d.id(), RENEWAL_TIMEOUT)
                    .await
                    .map_err(|err| err.context(ACTION_WAITING_UPDATE, RESOURCE_NAME, d.id()))?;
            }
        }

        if d.has_change("options") {
            let preference = match d.get_str("options.0.certificate_transparency_logging_preference") {
                "" => "ENABLED",
                preference => preference,
            };
            api.update_certificate_options(d.id(), preference)
                .await
                .map_err(|err| err.context(ACTION_UPDATING, RESOURCE_NAME, d.id()))?;
        }

        if d.has_changes(&["tags", "tags_all"]) {
            self.update_tags(d)
                .await
                .map_err(|err| err.context(ACTION_UPDATING, RESOURCE_NAME, d.id()))?;
        }

        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let api = &*self.api;
        let arn = d.id().to_string();

        tracing::info!(id = %arn, "deleting ACM certificate");
        // A certificate stays in use for a while after its last consumer
        // (load balancer, distribution) lets go of it.
        let result = retry_when_code_equals(
            d.timeout(Operation::Delete),
            || api.delete_certificate(&arn),
            &[ERR_CODE_RESOURCE_IN_USE],
        )
        .await;

        match result {
            Err(err) if err.code_equals(&[ERR_CODE_RESOURCE_NOT_FOUND]) => Ok(()),
            Err(err) => Err(err.context(ACTION_DELETING, RESOURCE_NAME, arn)),
            Ok(()) => Ok(()),
        }
    }

    fn customize_plan(&self, prior: &Value, planned: &mut Value) {
        let Some(obj) = planned.as_object_mut() else {
            return;
        };

        // ACM adds the domain name to the SANs; mirror it so a configured
        // SAN list does not show a perpetual diff.
        let configured_sans = obj
            .get("subject_alternative_names")
            .and_then(Value::as_array)
            .filter(|sans| !sans.is_empty())
            .cloned();
        if let Some(sans) = configured_sans {
            let mut names: BTreeSet<String> = sans
                .iter()
                .filter_map(Value::as_str)
                .map(|san| trim_trailing_period(san).to_string())
                .collect();
            if let Some(domain_name) = obj
                .get("domain_name")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
            {
                names.insert(domain_name.to_string());
            }
            obj.insert("subject_alternative_names".into(), json!(names));
        }

        // A certificate inside its renewal window plans an update.
        if prior.get("pending_renewal").and_then(Value::as_bool) == Some(true) {
            obj.insert("pending_renewal".into(), json!(false));
        }

        let tags = KeyValueTags::from_value(obj.get("tags"));
        obj.insert(
            "tags_all".into(),
            self.tag_policy.tags_all(&tags).to_value(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acm::api::{DomainValidation, RenewalSummary, ResourceRecord};
    use chrono::Duration as ChronoDuration;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use stratus_core::{ActionType, IgnoreConfig, Provider};

    /// In-memory ACM. DNS records show up on the second describe after a
    /// request, the way ACM assigns them asynchronously.
    #[derive(Default)]
    struct FakeAcm {
        certificates: Mutex<HashMap<String, CertificateDetail>>,
        tags: Mutex<HashMap<String, KeyValueTags>>,
        pending_records: Mutex<HashMap<String, usize>>,
        in_use_deletes: Mutex<usize>,
        calls: Mutex<Vec<String>>,
        counter: Mutex<usize>,
        /// Describe calls before DNS records appear (default 1).
        record_delay: Option<usize>,
        /// Renewals fail with this reason instead of succeeding.
        renewal_failure: Option<String>,
    }

    impl FakeAcm {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn next_arn(&self) -> String {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            format!("arn:aws:acm:us-east-1:123456789012:certificate/{}", *counter)
        }

        fn insert(&self, certificate: CertificateDetail) {
            self.certificates
                .lock()
                .unwrap()
                .insert(certificate.certificate_arn.clone(), certificate);
        }

        fn get(&self, arn: &str) -> CertificateDetail {
            self.certificates.lock().unwrap()[arn].clone()
        }
    }

    #[async_trait]
    impl AcmApi for FakeAcm {
        async fn request_certificate(&self, input: RequestCertificateInput) -> Result<String> {
            self.record(format!("request {}", input.domain_name));
            assert_eq!(input.idempotency_token.len(), 32);
            let arn = self.next_arn();

            let mut names = vec![input.domain_name.clone()];
            for san in &input.subject_alternative_names {
                if !names.contains(san) {
                    names.push(san.clone());
                }
            }
            let private = input.certificate_authority_arn.is_some();
            let domain_validation_options = names
                .iter()
                .map(|name| DomainValidation {
                    domain_name: name.clone(),
                    validation_method: input.validation_method.clone(),
                    validation_emails: match input.validation_method.as_deref() {
                        Some("EMAIL") => vec![format!("admin@{name}")],
                        _ => Vec::new(),
                    },
                    resource_record: None,
                })
                .collect();

            self.insert(CertificateDetail {
                certificate_arn: arn.clone(),
                domain_name: Some(input.domain_name.clone()),
                subject_alternative_names: names,
                domain_validation_options,
                status: if private { "ISSUED" } else { "PENDING_VALIDATION" }.to_string(),
                certificate_type: if private { "PRIVATE" } else { "AMAZON_ISSUED" }.to_string(),
                key_algorithm: Some(input.key_algorithm.unwrap_or_else(|| "RSA_2048".to_string())),
                certificate_authority_arn: input.certificate_authority_arn.clone(),
                renewal_eligibility: Some("INELIGIBLE".to_string()),
                certificate_transparency_logging_preference: input
                    .certificate_transparency_logging_preference
                    .clone(),
                ..Default::default()
            });
            self.tags.lock().unwrap().insert(arn.clone(), input.tags);
            if input.validation_method.as_deref() == Some("DNS") {
                self.pending_records
                    .lock()
                    .unwrap()
                    .insert(arn.clone(), self.record_delay.unwrap_or(1));
            }
            Ok(arn)
        }

        async fn import_certificate(&self, input: ImportCertificateInput) -> Result<String> {
            self.record(format!(
                "import {}",
                input.certificate_arn.as_deref().unwrap_or("new")
            ));
            let arn = match &input.certificate_arn {
                Some(arn) => arn.clone(),
                None => self.next_arn(),
            };
            self.insert(CertificateDetail {
                certificate_arn: arn.clone(),
                domain_name: Some("example.com".to_string()),
                subject_alternative_names: vec!["example.com".to_string()],
                status: "ISSUED".to_string(),
                certificate_type: "IMPORTED".to_string(),
                key_algorithm: Some("RSA_2048".to_string()),
                not_after: Some(Utc::now() + ChronoDuration::days(365)),
                renewal_eligibility: Some("INELIGIBLE".to_string()),
                ..Default::default()
            });
            if input.certificate_arn.is_none() {
                self.tags.lock().unwrap().insert(arn.clone(), input.tags);
            }
            Ok(arn)
        }

        async fn describe_certificate(&self, arn: &str) -> Result<CertificateDetail> {
            self.record(format!("describe {arn}"));
            let mut certificates = self.certificates.lock().unwrap();
            let Some(certificate) = certificates.get_mut(arn) else {
                return Err(ProviderError::api(
                    "ResourceNotFoundException",
                    format!("Could not find certificate {arn}."),
                ));
            };

            let mut pending = self.pending_records.lock().unwrap();
            match pending.get(arn).copied() {
                Some(0) => {
                    pending.remove(arn);
                    for v in &mut certificate.domain_validation_options {
                        v.resource_record = Some(ResourceRecord {
                            name: format!("_x1.{}.", v.domain_name),
                            record_type: "CNAME".to_string(),
                            value: "_x2.acm-validations.aws.".to_string(),
                        });
                    }
                }
                Some(n) => {
                    pending.insert(arn.to_string(), n - 1);
                }
                None => {}
            }

            // A renewal completes once it has been observed pending.
            let snapshot = certificate.clone();
            if let Some(summary) = &mut certificate.renewal_summary {
                if summary.renewal_status == RENEWAL_STATUS_PENDING_AUTO_RENEWAL {
                    match &self.renewal_failure {
                        Some(reason) => {
                            summary.renewal_status = RENEWAL_STATUS_FAILED.to_string();
                            summary.renewal_status_reason = Some(reason.clone());
                        }
                        None => {
                            summary.renewal_status = RENEWAL_STATUS_SUCCESS.to_string();
                            certificate.not_after = Some(Utc::now() + ChronoDuration::days(395));
                        }
                    }
                }
            }
            Ok(snapshot)
        }

        async fn renew_certificate(&self, arn: &str) -> Result<()> {
            self.record(format!("renew {arn}"));
            let mut certificates = self.certificates.lock().unwrap();
            let certificate = certificates.get_mut(arn).unwrap();
            certificate.renewal_summary = Some(RenewalSummary {
                renewal_status: RENEWAL_STATUS_PENDING_AUTO_RENEWAL.to_string(),
                renewal_status_reason: None,
                updated_at: Some(Utc::now()),
            });
            Ok(())
        }

        async fn update_certificate_options(&self, arn: &str, preference: &str) -> Result<()> {
            self.record(format!("options {arn} {preference}"));
            let mut certificates = self.certificates.lock().unwrap();
            certificates.get_mut(arn).unwrap().certificate_transparency_logging_preference =
                Some(preference.to_string());
            Ok(())
        }

        async fn delete_certificate(&self, arn: &str) -> Result<()> {
            self.record(format!("delete {arn}"));
            let mut in_use = self.in_use_deletes.lock().unwrap();
            if *in_use > 0 {
                *in_use -= 1;
                return Err(ProviderError::api(
                    "ResourceInUseException",
                    "Certificate is in use by a load balancer",
                ));
            }
            match self.certificates.lock().unwrap().remove(arn) {
                Some(_) => Ok(()),
                None => Err(ProviderError::api("ResourceNotFoundException", "not found")),
            }
        }

        async fn list_tags_for_certificate(&self, arn: &str) -> Result<KeyValueTags> {
            Ok(self.tags.lock().unwrap().get(arn).cloned().unwrap_or_default())
        }

        async fn add_tags_to_certificate(&self, arn: &str, tags: &KeyValueTags) -> Result<()> {
            self.record(format!("tag {arn} {:?}", tags.keys()));
            let mut all = self.tags.lock().unwrap();
            let current = all.entry(arn.to_string()).or_default();
            *current = current.merge(tags);
            Ok(())
        }

        async fn remove_tags_from_certificate(&self, arn: &str, tags: &KeyValueTags) -> Result<()> {
            self.record(format!("untag {arn} {:?}", tags.keys()));
            let mut all = self.tags.lock().unwrap();
            let current = all.entry(arn.to_string()).or_default();
            *current = current
                .iter()
                .filter(|(k, _)| tags.get(k).is_none())
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            Ok(())
        }
    }

    fn policy() -> TagPolicy {
        TagPolicy {
            default_tags: [("team".to_string(), "infra".to_string())].into_iter().collect(),
            ignore: IgnoreConfig::default(),
        }
    }

    fn provider(fake: Arc<FakeAcm>) -> Provider {
        Provider::new("aws").with_resource(Certificate::new(fake, policy()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_dns_certificate_lifecycle() {
        let fake = Arc::new(FakeAcm::default());
        let provider = provider(fake.clone());
        let config = json!({
            "domain_name": "example.com",
            "subject_alternative_names": ["www.example.com."],
            "validation_method": "DNS",
            "tags": {"env": "prod"},
        });
        provider.validate_resource_config(TYPE_NAME, &config).unwrap();

        let state = provider.create(TYPE_NAME, &config).await.unwrap();
        let arn = state["id"].as_str().unwrap().to_string();
        assert_eq!(state["arn"], json!(arn));
        assert_eq!(state["status"], json!("PENDING_VALIDATION"));
        assert_eq!(state["type"], json!("AMAZON_ISSUED"));
        assert_eq!(state["validation_method"], json!("DNS"));
        assert_eq!(
            state["subject_alternative_names"],
            json!(["example.com", "www.example.com"])
        );
        assert_eq!(state["domain_validation_options"].as_array().unwrap().len(), 2);
        assert_eq!(
            state["domain_validation_options"][0]["resource_record_type"],
            json!("CNAME")
        );
        assert_eq!(state["validation_emails"], json!([]));
        assert_eq!(state["pending_renewal"], json!(false));
        assert_eq!(state["not_after"], json!(""));
        assert_eq!(state["renewal_summary"], json!([]));
        assert_eq!(state["tags"], json!({"env": "prod"}));
        assert_eq!(state["tags_all"], json!({"env": "prod", "team": "infra"}));

        // The SAN with a trailing period matches what ACM reports.
        let change = provider.plan(TYPE_NAME, Some(&state), Some(&config)).unwrap();
        assert_eq!(change.action, ActionType::NoOp, "{:?}", change.changes);

        provider.delete(TYPE_NAME, &state).await.unwrap();
        assert!(fake.calls().contains(&format!("delete {arn}")));
        assert_eq!(provider.read(TYPE_NAME, &state).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_email_certificate() {
        let provider = provider(Arc::new(FakeAcm::default()));
        let state = provider
            .create(
                TYPE_NAME,
                &json!({"domain_name": "example.com", "validation_method": "EMAIL"}),
            )
            .await
            .unwrap();
        assert_eq!(state["validation_method"], json!("EMAIL"));
        assert_eq!(state["validation_emails"], json!(["admin@example.com"]));
        assert_eq!(state["domain_validation_options"], json!([]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_private_certificate() {
        let fake = Arc::new(FakeAcm::default());
        let provider = provider(fake.clone());
        let state = provider
            .create(
                TYPE_NAME,
                &json!({
                    "domain_name": "internal.example.com",
                    "certificate_authority_arn": "arn:aws:acm-pca:us-east-1:123456789012:certificate-authority/ca",
                }),
            )
            .await
            .unwrap();
        assert_eq!(state["type"], json!("PRIVATE"));
        assert_eq!(state["validation_method"], json!("NONE"));
        assert_eq!(state["status"], json!("ISSUED"));
        assert_eq!(state["subject_alternative_names"], json!(["internal.example.com"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_requires_validation_method() {
        let provider = provider(Arc::new(FakeAcm::default()));
        let err = provider
            .create(TYPE_NAME, &json!({"domain_name": "example.com"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be set when creating"), "{err}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_imported_certificate_reimport() {
        let fake = Arc::new(FakeAcm::default());
        let provider = provider(fake.clone());
        let config = json!({"certificate_body": "BODY", "private_key": "KEY"});
        let state = provider.create(TYPE_NAME, &config).await.unwrap();
        let arn = state["id"].as_str().unwrap().to_string();
        assert_eq!(state["type"], json!("IMPORTED"));
        assert_eq!(state["validation_method"], json!("NONE"));

        let config = json!({"certificate_body": "BODY2", "private_key": "KEY2"});
        let change = provider.plan(TYPE_NAME, Some(&state), Some(&config)).unwrap();
        assert_eq!(change.action, ActionType::Update);
        let new_state = provider.apply(&change).await.unwrap().unwrap();
        assert_eq!(new_state["id"], json!(arn));
        assert!(fake.calls().contains(&format!("import {arn}")));
    }

    const ELIGIBLE_ARN: &str = "arn:aws:acm:us-east-1:123456789012:certificate/issued";
    const CA_ARN: &str = "arn:aws:acm-pca:us-east-1:123456789012:certificate-authority/ca";

    /// A private certificate 30 days from expiry that ACM would renew.
    fn insert_renewable(fake: &FakeAcm) {
        fake.insert(CertificateDetail {
            certificate_arn: ELIGIBLE_ARN.to_string(),
            domain_name: Some("example.com".to_string()),
            subject_alternative_names: vec!["example.com".to_string()],
            status: "ISSUED".to_string(),
            certificate_type: "PRIVATE".to_string(),
            certificate_authority_arn: Some(CA_ARN.to_string()),
            not_after: Some(Utc::now() + ChronoDuration::days(30)),
            renewal_eligibility: Some("ELIGIBLE".to_string()),
            ..Default::default()
        });
    }

    /// Imported state with `early_renewal_duration` as it would be planned.
    async fn renewable_state(provider: &Provider, early_renewal_duration: &str) -> Value {
        let mut state = provider.import(TYPE_NAME, ELIGIBLE_ARN).await.unwrap().unwrap();
        // Not read from the API; comes from configuration.
        state["early_renewal_duration"] = json!(early_renewal_duration);
        state
    }

    fn renewal_config() -> Value {
        json!({
            "domain_name": "example.com",
            "certificate_authority_arn": CA_ARN,
            "early_renewal_duration": "P60D",
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_renewal() {
        let fake = Arc::new(FakeAcm::default());
        insert_renewable(&fake);
        let provider = provider(fake.clone());
        let arn = ELIGIBLE_ARN;

        let state = renewable_state(&provider, "P60D").await;
        let state = provider.read(TYPE_NAME, &state).await.unwrap().unwrap();
        assert_eq!(state["pending_renewal"], json!(true));

        let change = provider.plan(TYPE_NAME, Some(&state), Some(&renewal_config())).unwrap();
        assert_eq!(change.action, ActionType::Update, "{:?}", change.changes);

        let state = provider.apply(&change).await.unwrap().unwrap();
        assert!(fake.calls().contains(&format!("renew {arn}")));
        assert_eq!(state["renewal_summary"][0]["renewal_status"], json!("SUCCESS"));
        assert_eq!(state["pending_renewal"], json!(false));
        assert_eq!(fake.get(arn).renewal_summary.unwrap().renewal_status, "SUCCESS");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_renewal_reports_reason() {
        let fake = Arc::new(FakeAcm {
            renewal_failure: Some("CAA_ERROR".to_string()),
            ..Default::default()
        });
        insert_renewable(&fake);
        let provider = provider(fake.clone());

        let state = renewable_state(&provider, "P60D").await;
        let state = provider.read(TYPE_NAME, &state).await.unwrap().unwrap();
        let change = provider.plan(TYPE_NAME, Some(&state), Some(&renewal_config())).unwrap();

        let err = provider.apply(&change).await.unwrap_err();
        assert_eq!(err.code(), Some("FAILED"));
        let message = err.to_string();
        assert!(
            message.starts_with(&format!("waiting for update of ACM Certificate ({ELIGIBLE_ARN})")),
            "{message}"
        );
        assert!(message.contains("CAA_ERROR"), "{message}");
        assert_eq!(err.partial_state().unwrap()["id"], json!(ELIGIBLE_ARN));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_reports_bad_early_renewal_duration() {
        let fake = Arc::new(FakeAcm::default());
        insert_renewable(&fake);
        let provider = provider(fake);

        let state = renewable_state(&provider, "soon").await;
        let err = provider.read(TYPE_NAME, &state).await.unwrap_err();
        let message = err.to_string();
        assert!(
            message.starts_with(&format!("reading ACM Certificate ({ELIGIBLE_ARN})")),
            "{message}"
        );
        assert!(message.contains("parsing early_renewal_duration"), "{message}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dns_records_timeout_keeps_partial_state() {
        let fake = Arc::new(FakeAcm {
            record_delay: Some(usize::MAX),
            ..Default::default()
        });
        let provider = provider(fake.clone());
        let config = json!({"domain_name": "example.com", "validation_method": "DNS"});

        let err = provider.create(TYPE_NAME, &config).await.unwrap_err();
        assert!(err.is_timeout(), "{err}");
        let arn = "arn:aws:acm:us-east-1:123456789012:certificate/1";
        assert!(
            err.to_string()
                .starts_with(&format!("waiting for create of ACM Certificate ({arn})")),
            "{err}"
        );
        // The certificate was requested; state must keep its ARN.
        assert_eq!(err.partial_state().unwrap()["id"], json!(arn));
        assert!(fake.calls().contains(&"request example.com".to_string()));
    }

    #[test]
    fn test_is_pending_renewal() {
        let now = Utc::now();
        let certificate = CertificateDetail {
            not_after: Some(now + ChronoDuration::days(30)),
            renewal_eligibility: Some("ELIGIBLE".to_string()),
            ..Default::default()
        };
        assert!(!is_pending_renewal("720h", &certificate, now).unwrap());
        assert!(is_pending_renewal("721h", &certificate, now).unwrap());
        assert!(is_pending_renewal("P2M", &certificate, now).unwrap());
        assert!(!is_pending_renewal("", &certificate, now).unwrap());

        let ineligible = CertificateDetail {
            renewal_eligibility: Some("INELIGIBLE".to_string()),
            ..certificate.clone()
        };
        assert!(!is_pending_renewal("P2M", &ineligible, now).unwrap());
        assert!(is_pending_renewal("bogus", &certificate, now).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_options_and_tags() {
        let fake = Arc::new(FakeAcm::default());
        let provider = provider(fake.clone());
        let config = json!({
            "domain_name": "example.com",
            "validation_method": "EMAIL",
            "tags": {"env": "prod", "owner": "a"},
        });
        let state = provider.create(TYPE_NAME, &config).await.unwrap();
        let arn = state["id"].as_str().unwrap().to_string();

        let config = json!({
            "domain_name": "example.com",
            "validation_method": "EMAIL",
            "options": [{"certificate_transparency_logging_preference": "DISABLED"}],
            "tags": {"env": "staging"},
        });
        let change = provider.plan(TYPE_NAME, Some(&state), Some(&config)).unwrap();
        assert_eq!(change.action, ActionType::Update);
        let state = provider.apply(&change).await.unwrap().unwrap();

        assert_eq!(
            state["options"],
            json!([{"certificate_transparency_logging_preference": "DISABLED"}])
        );
        assert_eq!(state["tags"], json!({"env": "staging"}));
        let calls = fake.calls();
        assert!(calls.contains(&format!("options {arn} DISABLED")));
        assert!(calls.contains(&format!("untag {arn} [\"owner\"]")));
        assert!(calls.contains(&format!("tag {arn} [\"env\"]")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_retries_while_in_use() {
        let fake = Arc::new(FakeAcm::default());
        let provider = provider(fake.clone());
        let state = provider
            .create(TYPE_NAME, &json!({"certificate_body": "B", "private_key": "K"}))
            .await
            .unwrap();
        *fake.in_use_deletes.lock().unwrap() = 3;

        provider.delete(TYPE_NAME, &state).await.unwrap();
        let deletes = fake.calls().iter().filter(|c| c.starts_with("delete")).count();
        assert_eq!(deletes, 4);

        // Already gone.
        provider.delete(TYPE_NAME, &state).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_timed_out_is_removed() {
        let fake = Arc::new(FakeAcm::default());
        let arn = "arn:aws:acm:us-east-1:123456789012:certificate/expired";
        fake.insert(CertificateDetail {
            certificate_arn: arn.to_string(),
            status: STATUS_VALIDATION_TIMED_OUT.to_string(),
            certificate_type: "AMAZON_ISSUED".to_string(),
            ..Default::default()
        });
        let state = json!({"id": arn, "domain_name": "example.com"});
        assert_eq!(provider(fake).read(TYPE_NAME, &state).await.unwrap(), None);
    }

    #[test]
    fn test_config_validation() {
        let provider = provider(Arc::new(FakeAcm::default()));
        let check = |config: Value| {
            provider
                .validate_resource_config(TYPE_NAME, &config)
                .unwrap_err()
                .to_string()
        };

        let message = check(json!({"domain_name": "example.com.", "validation_method": "DNS"}));
        assert!(
            message.contains("invalid value for domain_name (cannot end with a period)"),
            "{message}"
        );

        let message = check(json!({
            "domain_name": "example.com",
            "validation_method": "DNS",
            "subject_alternative_names": [""],
        }));
        assert!(message.contains("expected length"), "{message}");

        let message = check(json!({"validation_method": "DNS"}));
        assert!(message.contains("one of `domain_name,private_key` must be specified"), "{message}");

        let message = check(json!({"certificate_body": "B"}));
        assert!(message.contains("private_key"), "{message}");

        provider
            .validate_resource_config(
                TYPE_NAME,
                &json!({"domain_name": "example.com", "validation_method": "DNS", "early_renewal_duration": "720h"}),
            )
            .unwrap();
    }
}
