use bytes::Bytes;
use eyre::Result;
use http::Response;

use crate::core::DispatchContext;

/// ActionHandler defines the port (interface) between the dispatcher and the
/// application code behind a route.
///
/// The dispatcher has already enforced the route policy and picked the response
/// content type by the time `handle` runs.
pub trait ActionHandler: Send + Sync {
    /// Produce the response for a dispatched request
    ///
    /// # Arguments
    /// * `ctx` - The request, its matched route and the negotiated content type
    ///
    /// # Returns
    /// The response; the dispatcher sets `Content-Type` if the handler did not
    fn handle(&self, ctx: &DispatchContext<'_>) -> Result<Response<Bytes>>;
}

pub(crate) struct FnHandler<F>(pub F);

impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&DispatchContext<'_>) -> Result<Response<Bytes>> + Send + Sync,
{
    fn handle(&self, ctx: &DispatchContext<'_>) -> Result<Response<Bytes>> {
        (self.0)(ctx)
    }
}
