//! Web services and their pluggable backends.
//!
//! A `WebService` owns the routed resources, the auth and CORS maps, and
//! a named backend implementation. Backends register themselves in a
//! process-wide registry under an impl name; the service instantiates its
//! backend by name at start.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use trestle_types::debug::DebugFlags;

use crate::auth::{Authenticator, SpaceMap};
use crate::cors::CorsAffordanceMap;
use crate::http::supported_http_methods;
use crate::mappings::WebResourcePathMap;
use crate::resource::{BoxWebResource, webmethod_names};

// --- Status and errors ---

/// Where a service is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Stopped,
    Running,
    /// The backend task ended on its own.
    Gone,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Running => "running",
            ServiceStatus::Gone => "gone",
        };
        write!(f, "{name}")
    }
}

/// A lifecycle operation that is invalid for the service's current status.
#[derive(Debug, Clone, Error)]
#[error("cannot {operation} service '{service}': {message}")]
pub struct InvalidServiceOperation {
    pub service: String,
    pub operation: String,
    pub message: String,
}

/// Errors from service construction and lifecycle.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    InvalidOperation(#[from] InvalidServiceOperation),

    #[error("unknown service impl '{name}'; registered impls: [{}]", .known.join(", "))]
    UnknownImpl { name: String, known: Vec<String> },

    #[error("service backend error: {message}")]
    Backend { message: String },
}

// --- The shared service context ---

/// Everything a backend needs to serve requests.
#[derive(Default)]
pub struct ServiceContext {
    /// Listen addresses; embedded backends bind the first.
    pub uris: Vec<String>,
    /// Resource routes by path pattern.
    pub resources: WebResourcePathMap<BoxWebResource>,
    /// Auth spaces by path pattern.
    pub auth_spaces: SpaceMap,
    /// Run where an auth space governs the path.
    pub authenticator: Authenticator,
    /// CORS affordances by path pattern.
    pub cors_affordances: CorsAffordanceMap,
    /// Error envelope gating.
    pub debug_flags: DebugFlags,
}

impl ServiceContext {
    /// The union of HTTP methods supported across every routed resource.
    ///
    /// Distinguishes a 405 (some resource somewhere speaks the verb) from
    /// a 501 (the verb is foreign to the whole service).
    pub fn all_supported_http_methods(&self) -> BTreeSet<String> {
        let mut methods = BTreeSet::new();
        for (_, resource) in self.resources.iter() {
            methods.extend(supported_http_methods(webmethod_names(
                &resource.webmethods(),
            )));
        }
        methods
    }
}

// --- Backends ---

/// A running backend: cancel `shutdown` to stop, join `finished` to wait.
pub struct BackendHandle {
    pub shutdown: CancellationToken,
    pub finished: JoinHandle<()>,
}

/// A transport implementation that serves a service's requests.
pub trait ServiceBackend: Send + Sync {
    /// The impl name this backend registers under.
    fn name(&self) -> &str;

    /// Start serving. The returned handle stops the backend.
    fn start(
        &self,
        context: Arc<ServiceContext>,
    ) -> impl Future<Output = anyhow::Result<BackendHandle>> + Send;
}

/// Object-safe version of [`ServiceBackend`] with boxed futures.
pub trait ServiceBackendDyn: Send + Sync {
    fn name(&self) -> &str;

    fn start_boxed(
        &self,
        context: Arc<ServiceContext>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<BackendHandle>> + Send + '_>>;
}

/// Blanket implementation: any `ServiceBackend` automatically implements
/// `ServiceBackendDyn`.
impl<T: ServiceBackend> ServiceBackendDyn for T {
    fn name(&self) -> &str {
        ServiceBackend::name(self)
    }

    fn start_boxed(
        &self,
        context: Arc<ServiceContext>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<BackendHandle>> + Send + '_>> {
        Box::pin(self.start(context))
    }
}

/// Type-erased service backend, as the registry hands them out.
pub struct BoxServiceBackend {
    inner: Box<dyn ServiceBackendDyn + Send + Sync>,
}

impl BoxServiceBackend {
    pub fn new<T: ServiceBackend + 'static>(backend: T) -> Self {
        Self {
            inner: Box::new(backend),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn start(&self, context: Arc<ServiceContext>) -> anyhow::Result<BackendHandle> {
        self.inner.start_boxed(context).await
    }
}

// --- The impl registry ---

type BackendFactory = Box<dyn Fn() -> BoxServiceBackend + Send + Sync>;

static IMPLS: OnceLock<DashMap<String, BackendFactory>> = OnceLock::new();

fn impls() -> &'static DashMap<String, BackendFactory> {
    IMPLS.get_or_init(DashMap::new)
}

/// Register a backend implementation under an impl name.
pub fn register_impl(
    name: impl Into<String>,
    factory: impl Fn() -> BoxServiceBackend + Send + Sync + 'static,
) {
    impls().insert(name.into(), Box::new(factory));
}

/// The registered impl names, sorted.
pub fn impl_names() -> Vec<String> {
    let mut names: Vec<String> = impls().iter().map(|entry| entry.key().clone()).collect();
    names.sort();
    names
}

/// Instantiate a backend by impl name.
pub fn backend(name: &str) -> Result<BoxServiceBackend, ServiceError> {
    match impls().get(name) {
        Some(factory) => Ok(factory.value()()),
        None => Err(ServiceError::UnknownImpl {
            name: name.to_string(),
            known: impl_names(),
        }),
    }
}

// --- The service facade ---

/// A web service: routed resources, auth, CORS, and a named backend.
pub struct WebService {
    name: String,
    impl_name: String,
    context: Arc<ServiceContext>,
    status: ServiceStatus,
    handle: Option<BackendHandle>,
}

impl WebService {
    pub fn new(
        name: impl Into<String>,
        impl_name: impl Into<String>,
        context: ServiceContext,
    ) -> Self {
        Self {
            name: name.into(),
            impl_name: impl_name.into(),
            context: Arc::new(context),
            status: ServiceStatus::Stopped,
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn impl_name(&self) -> &str {
        &self.impl_name
    }

    pub fn context(&self) -> &Arc<ServiceContext> {
        &self.context
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    /// Refresh the status from the backend task and return it.
    pub fn probe(&mut self) -> ServiceStatus {
        if self.status == ServiceStatus::Running {
            if let Some(handle) = &self.handle {
                if handle.finished.is_finished() {
                    self.status = ServiceStatus::Gone;
                }
            }
        }
        self.status
    }

    /// Start the service's backend.
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        if self.probe() == ServiceStatus::Running {
            return Err(InvalidServiceOperation {
                service: self.name.clone(),
                operation: "start".to_string(),
                message: "the service is already running".to_string(),
            }
            .into());
        }
        let backend = backend(&self.impl_name)?;
        let handle = backend
            .start(Arc::clone(&self.context))
            .await
            .map_err(|err| ServiceError::Backend {
                message: format!("{err:#}"),
            })?;
        self.handle = Some(handle);
        self.status = ServiceStatus::Running;
        info!(service = %self.name, impl_name = %self.impl_name, "Service started");
        Ok(())
    }

    /// Stop the service's backend and wait for it to finish.
    pub async fn stop(&mut self) -> Result<(), ServiceError> {
        match self.probe() {
            ServiceStatus::Running => {}
            ServiceStatus::Gone => {
                return Err(InvalidServiceOperation {
                    service: self.name.clone(),
                    operation: "stop".to_string(),
                    message: "the service went away before it could be stopped".to_string(),
                }
                .into());
            }
            ServiceStatus::Stopped => {
                return Err(InvalidServiceOperation {
                    service: self.name.clone(),
                    operation: "stop".to_string(),
                    message: "the service is not running".to_string(),
                }
                .into());
            }
        }
        // probe() just saw Running, so a handle exists
        if let Some(handle) = self.handle.take() {
            handle.shutdown.cancel();
            if let Err(err) = handle.finished.await {
                warn!(service = %self.name, error = %err, "Backend task ended abnormally");
            }
        }
        self.status = ServiceStatus::Stopped;
        info!(service = %self.name, "Service stopped");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
