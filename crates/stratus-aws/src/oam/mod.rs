//! CloudWatch Observability Access Manager

pub mod api;
pub mod links;

pub use api::OamApi;
pub use links::Links;
