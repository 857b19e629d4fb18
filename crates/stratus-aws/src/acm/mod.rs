//! AWS Certificate Manager

pub mod api;
pub mod certificate;

pub use api::AcmApi;
pub use certificate::Certificate;
