//! Declarative, callback-driven HTTP operations.
//!
//! An operation describes a request and the handlers that receive its outcome. Submitting it
//! returns immediately; the request runs on the transport's runtime and exactly one terminal
//! handler fires, followed by the optional `on_finally` hook.
//!
//! ```ignore
//! use uhc::{ReqwestUhc, Uhc, UhcConfig};
//!
//! let uhc = ReqwestUhc::with_config(
//!     UhcConfig::default().base_url("https://api.example.com"),
//! )?;
//!
//! uhc.execute_with(|b| {
//!     b.get()
//!         .path("/data")
//!         .header("Accept", "application/json")?
//!         .on_finally(|| println!("done"))
//!         .on_200_buffered(|response, body| {
//!             println!("{} bytes with status {}", body.len(), response.status());
//!         })
//! })?;
//! ```
//!
//! # Outcomes
//!
//! | Response                         | Handler                                  |
//! |----------------------------------|------------------------------------------|
//! | 200, buffered handler            | `on_200_buffered(response, body)`        |
//! | 200, streaming handler           | sink per chunk, then an empty chunk      |
//! | any other status                 | `on_non_success(response, body)`         |
//! | connect/timeout/read failure     | `on_error(error)`                        |
//! | cancelled through the handle     | `on_error(Error::Cancelled)`             |
//!
//! `on_non_success` and `on_error` default to logging through `tracing`.
//!
//! # Streaming
//!
//! ```ignore
//! uhc.execute_with(|b| {
//!     b.get().path("/feed").on_200_streaming(|response| {
//!         let mut total = 0;
//!         move |chunk: &[u8]| {
//!             if chunk.is_empty() {
//!                 println!("stream finished after {total} bytes");
//!             }
//!             total += chunk.len();
//!         }
//!     })
//! })?;
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
mod error;
pub mod events;
pub mod hexdump;
pub mod operation;
pub mod response;
pub mod runtime;

pub use client::{OperationHandle, OperationId, ReqwestUhc, Uhc};
pub use config::UhcConfig;
pub use dispatch::{Dispatcher, Phase};
pub use error::{Error, KeyKind, Result};
pub use events::{EventState, ResponseEvents};
pub use hexdump::HexDump;
pub use operation::{
    DEFAULT_CONTENT_TYPE, END_OF_STREAM, Method, Operation, OperationBuilder, RequestBody,
    RequestSpec,
};
pub use response::{Response, ResponseBuilder};
