//! Stratus plugin framework
//!
//! Provider-agnostic building blocks for Terraform-style resource plugins:
//! declarative schemas, configuration validation, planning, resource
//! handlers, and the waiters that poll remote APIs until an object settles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │            host runtime / stratus CLI           │
//! └─────────────────┬───────────────────────────────┘
//!                   │ JSON attribute values
//! ┌─────────────────▼───────────────────────────────┐
//! │                 stratus-core                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  Provider { validate, plan, create, ...} │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌──────────────┐ ┌────────────┐   │
//! │  │  Schema  │ │ ResourceData │ │  Waiters   │   │
//! │  └──────────┘ └──────────────┘ └────────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │ trait Resource / DataSource
//! ┌─────────────────▼───────────────────────────────┐
//! │      stratus-aws (acm, s3, oam, codecommit)     │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod data;
pub mod duration;
pub mod error;
pub mod id;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod state;
pub mod tags;
pub mod validation;

// Re-exports
pub use data::ResourceData;
pub use error::{ProviderError, Result};
pub use plan::{ActionType, AttributeChange, Plan, PlanSummary, ResourceChange, equivalent};
pub use provider::{Provider, RetryConfig};
pub use resource::{DataSource, Resource};
pub use retry::{RetryError, StateChangeConf};
pub use schema::{
    Attribute, AttributeType, Block, Operation, ProviderSchema, ResourceSchema, Timeouts,
};
pub use state::{GlobalState, ResourceState, StateLock, StateManager, parse_address};
pub use tags::{IgnoreConfig, KeyValueTags, TagPolicy};
pub use validation::{Diagnostic, Severity, Validator};
