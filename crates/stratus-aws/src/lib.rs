//! AWS resources for Stratus
//!
//! Each service module has an `api` submodule with a small async trait over
//! the calls its resources make, implemented for the SDK client. Resources
//! hold the trait object, so tests run against in-memory services.
//!
//! | Type | Kind |
//! |------|------|
//! | `aws_acm_certificate` | resource |
//! | `aws_s3_bucket_lifecycle_configuration` | resource |
//! | `aws_codecommit_trigger` | resource |
//! | `aws_codecommit_approval_rule_template` | resource |
//! | `aws_codecommit_approval_rule_template_association` | resource |
//! | `aws_oam_links` | data source |

pub mod acm;
pub mod client;
pub mod codecommit;
mod error;
pub mod oam;
pub mod provider;
pub mod s3;

pub use client::AwsClient;
pub use provider::{PROVIDER_NAME, new_provider};
