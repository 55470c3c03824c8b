use async_trait::async_trait;

use super::device_code::DeviceAuthorization;
use super::error::AuthError;

/// External actor that gets a device authorization approved or denied.
///
/// The flow awaits [`Approver::approve`] and then learns the outcome only by
/// polling the token endpoint. Implementations may drive a browser, print
/// the code for a human, or approve programmatically.
#[async_trait]
pub trait Approver: Send + Sync {
    async fn approve(&self, authorization: &DeviceAuthorization) -> Result<(), AuthError>;
}

/// Approver for callers that handle the user code out of band.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopApprover;

#[async_trait]
impl Approver for NoopApprover {
    async fn approve(&self, authorization: &DeviceAuthorization) -> Result<(), AuthError> {
        tracing::debug!(user_code = %authorization.user_code, "Approval left to caller");
        Ok(())
    }
}

#[async_trait]
impl<T: Approver + ?Sized> Approver for std::sync::Arc<T> {
    async fn approve(&self, authorization: &DeviceAuthorization) -> Result<(), AuthError> {
        (**self).approve(authorization).await
    }
}
