//! ACM API and its SDK implementation

use crate::error::{missing_field, sdk_error};
use async_trait::async_trait;
use aws_sdk_acm::primitives::{Blob, DateTime as SdkDateTime};
use aws_sdk_acm::types as sdk;
use chrono::{DateTime, Utc};
use stratus_core::{KeyValueTags, ProviderError, Result};

/// Certificate as returned by `DescribeCertificate`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CertificateDetail {
    pub certificate_arn: String,
    pub domain_name: Option<String>,
    pub subject_alternative_names: Vec<String>,
    pub domain_validation_options: Vec<DomainValidation>,
    pub status: String,
    /// `AMAZON_ISSUED`, `IMPORTED` or `PRIVATE`
    pub certificate_type: String,
    pub key_algorithm: Option<String>,
    pub certificate_authority_arn: Option<String>,
    pub not_after: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    pub renewal_eligibility: Option<String>,
    pub renewal_summary: Option<RenewalSummary>,
    pub certificate_transparency_logging_preference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainValidation {
    pub domain_name: String,
    pub validation_method: Option<String>,
    pub validation_emails: Vec<String>,
    pub resource_record: Option<ResourceRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub record_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenewalSummary {
    pub renewal_status: String,
    pub renewal_status_reason: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestCertificateInput {
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    pub validation_method: Option<String>,
    /// `(domain_name, validation_domain)` pairs
    pub domain_validation_options: Vec<(String, String)>,
    pub certificate_authority_arn: Option<String>,
    pub key_algorithm: Option<String>,
    pub certificate_transparency_logging_preference: Option<String>,
    pub idempotency_token: String,
    pub tags: KeyValueTags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportCertificateInput {
    /// Set to re-import into an existing certificate
    pub certificate_arn: Option<String>,
    pub certificate: String,
    pub private_key: String,
    pub certificate_chain: Option<String>,
    pub tags: KeyValueTags,
}

#[async_trait]
pub trait AcmApi: Send + Sync {
    /// Returns the new certificate's ARN.
    async fn request_certificate(&self, input: RequestCertificateInput) -> Result<String>;

    /// Returns the (new or existing) certificate's ARN.
    async fn import_certificate(&self, input: ImportCertificateInput) -> Result<String>;

    async fn describe_certificate(&self, arn: &str) -> Result<CertificateDetail>;

    async fn renew_certificate(&self, arn: &str) -> Result<()>;

    async fn update_certificate_options(
        &self,
        arn: &str,
        certificate_transparency_logging_preference: &str,
    ) -> Result<()>;

    async fn delete_certificate(&self, arn: &str) -> Result<()>;

    async fn list_tags_for_certificate(&self, arn: &str) -> Result<KeyValueTags>;

    async fn add_tags_to_certificate(&self, arn: &str, tags: &KeyValueTags) -> Result<()>;

    async fn remove_tags_from_certificate(&self, arn: &str, tags: &KeyValueTags) -> Result<()>;
}

#[async_trait]
impl AcmApi for aws_sdk_acm::Client {
    async fn request_certificate(&self, input: RequestCertificateInput) -> Result<String> {
        let validation_options = input
            .domain_validation_options
            .iter()
            .map(|(domain, validation_domain)| {
                sdk::DomainValidationOption::builder()
                    .domain_name(domain)
                    .validation_domain(validation_domain)
                    .build()
                    .map_err(build_error)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut request = self
            .request_certificate()
            .domain_name(&input.domain_name)
            .idempotency_token(&input.idempotency_token)
            .set_certificate_authority_arn(input.certificate_authority_arn.clone())
            .set_validation_method(input.validation_method.as_deref().map(sdk::ValidationMethod::from))
            .set_key_algorithm(input.key_algorithm.as_deref().map(sdk::KeyAlgorithm::from))
            .set_tags(to_sdk_tags(&input.tags)?);
        if !input.subject_alternative_names.is_empty() {
            request = request.set_subject_alternative_names(Some(input.subject_alternative_names));
        }
        if !validation_options.is_empty() {
            request = request.set_domain_validation_options(Some(validation_options));
        }
        if let Some(preference) = &input.certificate_transparency_logging_preference {
            request = request.options(certificate_options(preference));
        }

        tracing::debug!(domain_name = %input.domain_name, "RequestCertificate");
        let output = request.send().await.map_err(sdk_error)?;
        output
            .certificate_arn()
            .map(str::to_string)
            .ok_or_else(|| missing_field("CertificateArn"))
    }

    async fn import_certificate(&self, input: ImportCertificateInput) -> Result<String> {
        let mut request = self
            .import_certificate()
            .certificate(Blob::new(input.certificate.into_bytes()))
            .private_key(Blob::new(input.private_key.into_bytes()))
            .set_certificate_arn(input.certificate_arn);
        if let Some(chain) = input.certificate_chain {
            request = request.certificate_chain(Blob::new(chain.into_bytes()));
        }
        // Tags may only be passed on the first import.
        if !input.tags.is_empty() {
            request = request.set_tags(to_sdk_tags(&input.tags)?);
        }

        tracing::debug!("ImportCertificate");
        let output = request.send().await.map_err(sdk_error)?;
        output
            .certificate_arn()
            .map(str::to_string)
            .ok_or_else(|| missing_field("CertificateArn"))
    }

    async fn describe_certificate(&self, arn: &str) -> Result<CertificateDetail> {
        tracing::debug!(arn, "DescribeCertificate");
        let output = self
            .describe_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        let certificate = output
            .certificate()
            .ok_or_else(|| missing_field("Certificate"))?;
        Ok(from_sdk_certificate(certificate))
    }

    async fn renew_certificate(&self, arn: &str) -> Result<()> {
        tracing::debug!(arn, "RenewCertificate");
        self.renew_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn update_certificate_options(
        &self,
        arn: &str,
        certificate_transparency_logging_preference: &str,
    ) -> Result<()> {
        tracing::debug!(arn, "UpdateCertificateOptions");
        self.update_certificate_options()
            .certificate_arn(arn)
            .options(certificate_options(certificate_transparency_logging_preference))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn delete_certificate(&self, arn: &str) -> Result<()> {
        tracing::debug!(arn, "DeleteCertificate");
        self.delete_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn list_tags_for_certificate(&self, arn: &str) -> Result<KeyValueTags> {
        let output = self
            .list_tags_for_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(output
            .tags()
            .iter()
            .map(|t| (t.key().to_string(), t.value().unwrap_or_default().to_string()))
            .collect())
    }

    async fn add_tags_to_certificate(&self, arn: &str, tags: &KeyValueTags) -> Result<()> {
        self.add_tags_to_certificate()
            .certificate_arn(arn)
            .set_tags(to_sdk_tags(tags)?)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn remove_tags_from_certificate(&self, arn: &str, tags: &KeyValueTags) -> Result<()> {
        self.remove_tags_from_certificate()
            .certificate_arn(arn)
            .set_tags(to_sdk_tags(tags)?)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}

fn build_error(err: aws_sdk_acm::error::BuildError) -> ProviderError {
    ProviderError::InvalidConfig(err.to_string())
}

fn certificate_options(preference: &str) -> sdk::CertificateOptions {
    sdk::CertificateOptions::builder()
        .certificate_transparency_logging_preference(
            sdk::CertificateTransparencyLoggingPreference::from(preference),
        )
        .build()
}

fn to_sdk_tags(tags: &KeyValueTags) -> Result<Option<Vec<sdk::Tag>>> {
    if tags.is_empty() {
        return Ok(None);
    }
    tags.iter()
        .map(|(k, v)| {
            sdk::Tag::builder()
                .key(k)
                .value(v)
                .build()
                .map_err(build_error)
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn from_sdk_date(date: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(date.secs(), 0)
}

fn from_sdk_certificate(c: &sdk::CertificateDetail) -> CertificateDetail {
    CertificateDetail {
        certificate_arn: c.certificate_arn().unwrap_or_default().to_string(),
        domain_name: c.domain_name().map(str::to_string),
        subject_alternative_names: c.subject_alternative_names().to_vec(),
        domain_validation_options: c
            .domain_validation_options()
            .iter()
            .map(from_sdk_domain_validation)
            .collect(),
        status: c
            .status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        certificate_type: c
            .r#type()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
        key_algorithm: c.key_algorithm().map(|k| k.as_str().to_string()),
        certificate_authority_arn: c.certificate_authority_arn().map(str::to_string),
        not_after: c.not_after().and_then(from_sdk_date),
        not_before: c.not_before().and_then(from_sdk_date),
        renewal_eligibility: c.renewal_eligibility().map(|r| r.as_str().to_string()),
        renewal_summary: c.renewal_summary().map(|r| RenewalSummary {
            renewal_status: r.renewal_status().as_str().to_string(),
            renewal_status_reason: r.renewal_status_reason().map(|f| f.as_str().to_string()),
            updated_at: from_sdk_date(r.updated_at()),
        }),
        certificate_transparency_logging_preference: c
            .options()
            .and_then(|o| o.certificate_transparency_logging_preference())
            .map(|p| p.as_str().to_string()),
    }
}

fn from_sdk_domain_validation(v: &sdk::DomainValidation) -> DomainValidation {
    DomainValidation {
        domain_name: v.domain_name().to_string(),
        validation_method: v.validation_method().map(|m| m.as_str().to_string()),
        validation_emails: v.validation_emails().to_vec(),
        resource_record: v.resource_record().map(|r| ResourceRecord {
            name: r.name().to_string(),
            record_type: r.r#type().as_str().to_string(),
            value: r.value().to_string(),
        }),
    }
}
