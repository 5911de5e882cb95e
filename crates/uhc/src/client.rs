//! Transport adapter: executes operations with reqwest and feeds the dispatcher.
//!
//! [`Uhc`] is the caller-facing contract: submit an [`Operation`] and return immediately.
//! [`ReqwestUhc`] implements it on a shared `reqwest::Client`. Each submitted operation is
//! spawned on the transport runtime, where its response is reported to a [`Dispatcher`] as
//! status, headers, body chunks and completion (or a failure at any point).
//!
//! # Example
//!
//! ```ignore
//! use uhc::{ReqwestUhc, Uhc, UhcConfig};
//!
//! let uhc = ReqwestUhc::with_config(UhcConfig::default().base_url("https://api.example.com"))?;
//!
//! let handle = uhc.execute_with(|b| {
//!     b.get()
//!         .path("/users")
//!         .query("page", "1")?
//!         .on_200_buffered(|response, body| println!("{}: {} bytes", response.status(), body.len()))
//! })?;
//!
//! // Cancel if needed; on_error receives Error::Cancelled.
//! handle.cancel();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use http::header::CONTENT_TYPE;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use url::Url;

use crate::config::UhcConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::events::ResponseEvents;
use crate::operation::{Operation, OperationBuilder, RequestBody, RequestSpec};
use crate::runtime;

/// Unique identifier for a submitted operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OperationId(u64);

impl OperationId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The numeric value of the identifier.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// A handle to a submitted operation that can be cancelled.
#[derive(Clone, Debug)]
pub struct OperationHandle {
    /// The unique ID of this operation.
    pub id: OperationId,
    cancel_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl OperationHandle {
    fn new(id: OperationId) -> (Self, oneshot::Receiver<()>) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let handle = Self {
            id,
            cancel_tx: Arc::new(Mutex::new(Some(cancel_tx))),
        };
        (handle, cancel_rx)
    }

    /// Cancel the operation.
    ///
    /// The operation fails with [`Error::Cancelled`] through its `on_error` handler. Returns
    /// `false` if it already finished or was already cancelled.
    pub fn cancel(&self) -> bool {
        if let Some(tx) = self.cancel_tx.lock().take() {
            tx.send(()).is_ok()
        } else {
            false
        }
    }

    /// Check if the operation is still running.
    pub fn is_pending(&self) -> bool {
        self.cancel_tx.lock().is_some()
    }

    fn settle(&self) {
        self.cancel_tx.lock().take();
    }
}

/// Executes operations asynchronously.
///
/// `execute` returns as soon as the operation is handed to the transport; the outcome is
/// observed only through the operation's handlers.
pub trait Uhc {
    /// Submit a built operation.
    fn execute(&self, operation: Operation) -> OperationHandle;

    /// Build an operation with `configure` and submit it.
    ///
    /// Construction errors are returned here; nothing is sent in that case.
    fn execute_with<F>(&self, configure: F) -> Result<OperationHandle>
    where
        F: FnOnce(OperationBuilder) -> Result<OperationBuilder>,
        Self: Sized,
    {
        let operation = configure(OperationBuilder::new())?.build()?;
        Ok(self.execute(operation))
    }
}

struct ReqwestUhcInner {
    client: reqwest::Client,
    config: UhcConfig,
    runtime: Handle,
}

/// [`Uhc`] backed by a long-lived `reqwest::Client`.
///
/// Create one per process (or per configuration) and share it; clones share the same
/// connection pool and runtime. The client and its pool are released when the last clone is
/// dropped.
#[derive(Clone)]
pub struct ReqwestUhc {
    inner: Arc<ReqwestUhcInner>,
}

impl ReqwestUhc {
    /// Create a client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(UhcConfig::default())
    }

    /// Create a client from configuration.
    ///
    /// Uses the current tokio runtime when called inside one, otherwise the process-wide
    /// runtime from [`runtime::handle`].
    pub fn with_config(config: UhcConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout);
        if let Some(ref user_agent) = config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        let client = builder.build()?;
        Ok(Self::from_parts(client, config, runtime::handle()?))
    }

    /// Create from an existing reqwest client and runtime.
    ///
    /// Timeouts in `config` are not applied to `client`; only the base URL is used.
    pub fn from_parts(client: reqwest::Client, config: UhcConfig, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(ReqwestUhcInner {
                client,
                config,
                runtime,
            }),
        }
    }

    /// Get the client's configuration.
    pub fn config(&self) -> &UhcConfig {
        &self.inner.config
    }

    /// Resolve an operation path to a URL.
    ///
    /// Absolute URLs with a host are used unchanged; anything else is appended to the base URL.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        if let Some(url) = Url::parse(path).ok().filter(Url::has_host) {
            return Ok(url);
        }
        let base = self.inner.config.base_url.as_deref().ok_or_else(|| {
            Error::InvalidUrl(format!("relative path '{path}' without a base URL"))
        })?;
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Ok(Url::parse(&format!("{}{}", base.trim_end_matches('/'), path))?)
    }

    /// Translate a request description into a reqwest request.
    fn build_request(&self, spec: RequestSpec) -> Result<reqwest::Request> {
        let mut url = self.resolve(&spec.path)?;
        if !spec.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, values) in &spec.query {
                for value in values {
                    pairs.append_pair(key, value);
                }
            }
        }

        let has_content_type = spec.headers.contains_key(CONTENT_TYPE);
        let mut builder = self
            .inner
            .client
            .request(spec.method.to_reqwest(), url)
            .headers(spec.headers);

        match spec.body {
            RequestBody::Empty => {}
            RequestBody::Text { text, content_type } => {
                if !has_content_type {
                    builder = builder.header(CONTENT_TYPE, content_type);
                }
                builder = builder.body(text);
            }
            RequestBody::Stream {
                stream,
                content_type,
            } => {
                if !has_content_type {
                    builder = builder.header(CONTENT_TYPE, content_type);
                }
                builder = builder.body(reqwest::Body::wrap_stream(stream));
            }
        }

        Ok(builder.build()?)
    }

    /// Send a request and report the response to `events`.
    ///
    /// Drives status, headers, each body chunk and completion. Stops early when the sink
    /// answers [`EventState::Abort`](crate::EventState::Abort). Transport failures are
    /// returned, not reported, so the caller decides how to deliver them.
    pub async fn exchange<E>(&self, spec: RequestSpec, events: &mut E) -> Result<()>
    where
        E: ResponseEvents + Send,
    {
        let request = self.build_request(spec)?;
        tracing::debug!(target: "uhc::client", "{} {}", request.method(), request.url());

        let mut response = self.inner.client.execute(request).await?;

        if !events.status(response.status().as_u16()).is_continue() {
            return Ok(());
        }
        if !events.headers(response.headers().clone()).is_continue() {
            return Ok(());
        }
        while let Some(chunk) = response.chunk().await? {
            if !events.body_part(&chunk).is_continue() {
                return Ok(());
            }
        }
        events.completed();
        Ok(())
    }
}

impl Uhc for ReqwestUhc {
    fn execute(&self, operation: Operation) -> OperationHandle {
        let id = OperationId::new();
        let (handle, cancel_rx) = OperationHandle::new(id);
        let (spec, handlers) = operation.into_parts();
        tracing::debug!(
            target: "uhc::client",
            "Submitting {} {} {}",
            id,
            spec.method,
            spec.path
        );

        // dropping an unpolled task drops the dispatcher, which settles the operation
        let mut dispatcher = Dispatcher::new(handlers);
        let this = self.clone();
        let task_handle = handle.clone();
        self.inner.runtime.spawn(async move {
            let outcome = tokio::select! {
                result = this.exchange(spec, &mut dispatcher) => result,
                _ = cancel_rx => Err(Error::Cancelled),
            };
            task_handle.settle();
            if let Err(error) = outcome {
                tracing::debug!(target: "uhc::client", "{} failed: {}", id, error);
                dispatcher.failed(error);
            }
        });

        handle
    }
}

impl std::fmt::Debug for ReqwestUhc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestUhc")
            .field("config", &self.inner.config)
            .finish()
    }
}
