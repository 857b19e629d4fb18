//! The `aws` provider: every resource and data source wired to one client

use crate::acm::Certificate;
use crate::client::AwsClient;
use crate::codecommit::{ApprovalRuleTemplate, ApprovalRuleTemplateAssociation, Trigger};
use crate::oam::Links;
use crate::s3::BucketLifecycleConfiguration;
use std::sync::Arc;
use stratus_core::Provider;

pub const PROVIDER_NAME: &str = "aws";

pub fn new_provider(client: &AwsClient) -> Provider {
    let codecommit = Arc::new(client.codecommit.clone());

    Provider::new(PROVIDER_NAME)
        .with_resource(Certificate::new(
            Arc::new(client.acm.clone()),
            client.tag_policy().clone(),
        ))
        .with_resource(BucketLifecycleConfiguration::new(Arc::new(client.s3.clone())))
        .with_resource(Trigger::new(codecommit.clone()))
        .with_resource(ApprovalRuleTemplate::new(codecommit.clone()))
        .with_resource(ApprovalRuleTemplateAssociation::new(codecommit))
        .with_data_source(Links::new(Arc::new(client.oam.clone()), client.region()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use stratus_core::Operation;

    #[test]
    fn test_registered_types() {
        let provider = new_provider(&AwsClient::offline());

        assert_eq!(
            provider.resource_types().collect::<Vec<_>>(),
            vec![
                "aws_acm_certificate",
                "aws_codecommit_approval_rule_template",
                "aws_codecommit_approval_rule_template_association",
                "aws_codecommit_trigger",
                "aws_s3_bucket_lifecycle_configuration",
            ]
        );
        assert_eq!(provider.data_source_types().collect::<Vec<_>>(), vec!["aws_oam_links"]);
    }

    #[test]
    fn test_schema_timeouts() {
        let schema = new_provider(&AwsClient::offline()).schema();
        let lifecycle = &schema.resources["aws_s3_bucket_lifecycle_configuration"];
        assert_eq!(
            lifecycle.timeouts.get(Operation::Create),
            Duration::from_secs(3 * 60)
        );
    }
}
