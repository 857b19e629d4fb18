//! AWS CodeCommit resources

pub mod api;
pub mod approval_rule_template;
pub mod association;
pub mod trigger;

#[cfg(test)]
pub(crate) mod fake;

pub use api::CodeCommitApi;
pub use approval_rule_template::ApprovalRuleTemplate;
pub use association::ApprovalRuleTemplateAssociation;
pub use trigger::Trigger;
