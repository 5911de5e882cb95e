//! Runtime management for the transport.
//!
//! Operations run on a tokio runtime. When a client is created inside a tokio context that
//! runtime is used; otherwise a small process-wide runtime is started on first use and lives
//! until the process exits.

use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::{Error, Result};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Get the handle of the current runtime, or of the process-wide one.
pub fn handle() -> Result<Handle> {
    if let Ok(handle) = Handle::try_current() {
        return Ok(handle);
    }
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime.handle().clone());
    }

    let runtime = Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("uhc-worker")
        .enable_all()
        .build()
        .map_err(|e| Error::Config(format!("Failed to create tokio runtime: {e}")))?;
    tracing::debug!(target: "uhc::runtime", "Started process-wide transport runtime");
    Ok(RUNTIME.get_or_init(|| runtime).handle().clone())
}
