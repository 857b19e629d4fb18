//! Amazon S3 resources

pub mod api;
pub mod lifecycle;
pub mod model;

pub use api::LifecycleApi;
pub use lifecycle::BucketLifecycleConfiguration;
