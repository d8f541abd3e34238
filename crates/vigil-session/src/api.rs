//! The remote account API the client depends on.

use std::future::Future;

use vigil_protocol::IdentitySnapshot;

use crate::ApiError;

/// Remote calls made by the session cache and the sign-out coordinator.
///
/// Implementations wrap whatever HTTP client the application uses. They
/// should map non-success responses through [`ApiError::from_status`] so
/// that 401 and 403 are classified correctly.
pub trait AccountApi: Send + Sync + 'static {
    /// Fetches the current user's profile. Takes no request body.
    fn fetch_profile(
        &self,
    ) -> impl Future<Output = Result<IdentitySnapshot, ApiError>> + Send;

    /// Ends the server-side session. Only success or failure matters.
    fn log_out(&self) -> impl Future<Output = Result<(), ApiError>> + Send;
}
