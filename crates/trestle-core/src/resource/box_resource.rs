//! BoxWebResource -- object-safe dynamic dispatch wrapper for WebResource.
//!
//! Follows the blanket-impl pattern used throughout the workspace:
//! 1. Define an object-safe `WebResourceDyn` trait with boxed futures
//! 2. Blanket-impl `WebResourceDyn` for all `T: WebResource`
//! 3. `BoxWebResource` wraps `Box<dyn WebResourceDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use trestle_types::class_def::ClassDefInfo;
use trestle_types::error::WebError;

use super::webargs::WebArgs;
use super::{WebMethodSpec, WebResource};
use crate::request::WebRequest;

/// Object-safe version of [`WebResource`] with boxed futures.
///
/// This trait exists solely to enable dynamic dispatch (`dyn WebResourceDyn`).
/// A blanket implementation is provided for all types implementing `WebResource`.
pub trait WebResourceDyn: Send + Sync {
    fn class_def(&self) -> ClassDefInfo;

    fn webmethods(&self) -> Vec<WebMethodSpec>;

    fn call_boxed<'a>(
        &'a self,
        method: &'a str,
        request: &'a WebRequest,
        args: WebArgs,
    ) -> Pin<Box<dyn Future<Output = Result<Value, WebError>> + Send + 'a>>;
}

/// Blanket implementation: any `WebResource` automatically implements `WebResourceDyn`.
impl<T: WebResource> WebResourceDyn for T {
    fn class_def(&self) -> ClassDefInfo {
        WebResource::class_def(self)
    }

    fn webmethods(&self) -> Vec<WebMethodSpec> {
        WebResource::webmethods(self)
    }

    fn call_boxed<'a>(
        &'a self,
        method: &'a str,
        request: &'a WebRequest,
        args: WebArgs,
    ) -> Pin<Box<dyn Future<Output = Result<Value, WebError>> + Send + 'a>> {
        Box::pin(self.call(method, request, args))
    }
}

/// Type-erased web resource for runtime routing.
///
/// Wraps any `WebResource` implementation behind dynamic dispatch so
/// heterogeneous resources can share one path map.
///
/// Since `WebResource` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxWebResource` provides equivalent methods that delegate to
/// the inner `WebResourceDyn` trait object.
pub struct BoxWebResource {
    inner: Box<dyn WebResourceDyn + Send + Sync>,
}

impl BoxWebResource {
    /// Wrap a concrete `WebResource` in a type-erased box.
    pub fn new<T: WebResource + 'static>(resource: T) -> Self {
        Self {
            inner: Box::new(resource),
        }
    }

    /// The resource's type tag, as reported in exception envelopes.
    pub fn class_def(&self) -> ClassDefInfo {
        self.inner.class_def()
    }

    /// The verb methods this resource declares.
    pub fn webmethods(&self) -> Vec<WebMethodSpec> {
        self.inner.webmethods()
    }

    /// Invoke a declared verb method with validated arguments.
    pub async fn call(
        &self,
        method: &str,
        request: &WebRequest,
        args: WebArgs,
    ) -> Result<Value, WebError> {
        self.inner.call_boxed(method, request, args).await
    }
}
