//! SDK error conversion

use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use stratus_core::ProviderError;

/// Converts an SDK error into [`ProviderError::Api`].
///
/// Service errors keep their code (`NoSuchBucket`, `ResourceNotFoundException`)
/// so handlers can match on it. Transport and construction failures have no
/// code and carry the full error chain as the message.
pub(crate) fn sdk_error<E, R>(err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    if let Some(code) = err.as_service_error().and_then(|e| e.code()) {
        let message = err
            .as_service_error()
            .and_then(|e| e.message())
            .unwrap_or_default();
        return ProviderError::api(code, message);
    }
    ProviderError::api("", DisplayErrorContext(&err).to_string())
}

/// Error for a response that is missing a field the API always returns.
pub(crate) fn missing_field(field: &str) -> ProviderError {
    ProviderError::not_found(format!("empty result: response has no {field}"))
}
