//! The seam to the control-plane wire client.

use std::future::Future;
use std::pin::Pin;

use pylon_core::TransportError;

use crate::info::{CheckRequestInfo, ReportRequestInfo};
use crate::response::CheckResponseInfo;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sends Check and Report calls to the control plane.
///
/// Implementations own the wire format and connection handling. Both calls
/// take their info by value and return `'static` futures so callers can
/// time them out or spawn them freely.
///
/// # Example
///
/// ```
/// use pylon_control::{
///     BoxFuture, CheckRequestInfo, CheckResponseInfo, ControlClient, ReportRequestInfo,
///     TransportError,
/// };
///
/// struct AllowAll;
///
/// impl ControlClient for AllowAll {
///     fn check(
///         &self,
///         _info: CheckRequestInfo,
///     ) -> BoxFuture<'static, Result<CheckResponseInfo, TransportError>> {
///         Box::pin(async { Ok(CheckResponseInfo::allowed("")) })
///     }
///
///     fn report(&self, _info: ReportRequestInfo) -> BoxFuture<'static, Result<(), TransportError>> {
///         Box::pin(async { Ok(()) })
///     }
/// }
/// ```
pub trait ControlClient: Send + Sync + 'static {
    /// Asks the control plane whether the call may proceed.
    fn check(&self, info: CheckRequestInfo)
        -> BoxFuture<'static, Result<CheckResponseInfo, TransportError>>;

    /// Records a finished call.
    fn report(&self, info: ReportRequestInfo) -> BoxFuture<'static, Result<(), TransportError>>;
}
