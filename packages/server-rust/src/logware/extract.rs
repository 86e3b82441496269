//! Axum extractor for the active call context.

use std::convert::Infallible;
use std::ops::Deref;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use logware_core::CallContext;

/// The [`CallContext`] of the current call.
///
/// The logware layer attaches one to every call it intercepts. Handlers
/// reached without the layer see an anonymous context.
///
/// ```ignore
/// async fn create_order(Caller(ctx): Caller) -> String {
///     ctx.request_id().to_string()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Caller(pub Arc<CallContext>);

impl Deref for Caller {
    type Target = CallContext;

    fn deref(&self) -> &CallContext {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = parts
            .extensions
            .get::<Arc<CallContext>>()
            .cloned()
            .unwrap_or_else(|| Arc::new(CallContext::anonymous()));
        Ok(Self(context))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    #[tokio::test]
    async fn reads_attached_context() {
        let context = Arc::new(CallContext::anonymous());
        let (mut parts, ()) = Request::builder()
            .extension(Arc::clone(&context))
            .body(())
            .unwrap()
            .into_parts();

        let Caller(found) = Caller::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(Arc::ptr_eq(&found, &context));
    }

    #[tokio::test]
    async fn falls_back_to_anonymous() {
        let (mut parts, ()) = Request::builder().body(()).unwrap().into_parts();

        let caller = Caller::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(!caller.is_authenticated());
        assert!(!caller.request_id().is_empty());
    }
}
