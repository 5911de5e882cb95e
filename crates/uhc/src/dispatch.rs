//! Dispatch engine: turns transport events into one terminal callback.
//!
//! A [`Dispatcher`] is created per operation from its [`Handlers`] and fed through
//! [`ResponseEvents`]. It walks
//!
//! ```text
//! AwaitingStatus -> AwaitingHeaders -> ReceivingBody -> Terminal
//! ```
//!
//! and on completion or failure invokes exactly one of the success sink, the buffered success
//! handler, `on_non_success` or `on_error`, followed by `on_finally`.
//!
//! Streaming mode is chosen only when the operation has a streaming handler *and* the status
//! is 200. The status always precedes the headers, so a non-200 response is buffered and
//! `on_non_success` receives its real body.

use bytes::BytesMut;
use http::HeaderMap;

use crate::error::Error;
use crate::events::{EventState, ResponseEvents};
use crate::hexdump::HexDump;
use crate::operation::{
    ChunkSink, END_OF_STREAM, ErrorHandler, FinallyHandler, Handlers, NonSuccessHandler,
    SuccessHandler,
};
use crate::response::{Response, ResponseBuilder};

/// Externally visible progress of a dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No event received yet.
    AwaitingStatus,
    /// Status known, headers pending.
    AwaitingHeaders,
    /// Headers known, body chunks flowing.
    ReceivingBody,
    /// A terminal callback has been invoked; further events are ignored.
    Terminal,
}

enum Mode {
    Buffered(BytesMut),
    Streaming(ChunkSink),
}

enum DispatchState {
    AwaitingStatus,
    AwaitingHeaders(ResponseBuilder),
    ReceivingBody { response: Response, mode: Mode },
    Terminal,
}

/// Per-operation event consumer.
///
/// Owns the operation's handlers. Dropping a dispatcher that never reached a terminal event
/// fails the operation with [`Error::Abandoned`], so `on_error` and `on_finally` still run once.
pub struct Dispatcher {
    state: DispatchState,
    success: Option<SuccessHandler>,
    on_non_success: Option<NonSuccessHandler>,
    on_error: Option<ErrorHandler>,
    on_finally: Option<FinallyHandler>,
}

impl Dispatcher {
    /// Create a dispatcher for one operation's handlers.
    pub fn new(handlers: Handlers) -> Self {
        Self {
            state: DispatchState::AwaitingStatus,
            success: Some(handlers.success),
            on_non_success: Some(handlers.on_non_success),
            on_error: Some(handlers.on_error),
            on_finally: handlers.on_finally,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        match self.state {
            DispatchState::AwaitingStatus => Phase::AwaitingStatus,
            DispatchState::AwaitingHeaders(_) => Phase::AwaitingHeaders,
            DispatchState::ReceivingBody { .. } => Phase::ReceivingBody,
            DispatchState::Terminal => Phase::Terminal,
        }
    }

    /// Check if the operation has reached its terminal outcome.
    pub fn is_terminal(&self) -> bool {
        self.phase() == Phase::Terminal
    }

    /// Check if body chunks go to a streaming sink.
    pub fn is_streaming(&self) -> bool {
        matches!(
            self.state,
            DispatchState::ReceivingBody {
                mode: Mode::Streaming(_),
                ..
            }
        )
    }

    fn ignored(&self, event: &str) -> EventState {
        tracing::debug!(target: "uhc::dispatch", "Ignoring {} after terminal outcome", event);
        EventState::Abort
    }

    fn violation(&mut self, message: &str) -> EventState {
        tracing::warn!(target: "uhc::dispatch", "Transport protocol violation: {}", message);
        self.state = DispatchState::Terminal;
        self.fail(Error::protocol(message));
        EventState::Abort
    }

    fn complete(&mut self, response: Response, mode: Mode) {
        let success = self.success.take();
        let on_non_success = self.on_non_success.take();
        self.on_error = None;

        match mode {
            Mode::Streaming(mut sink) => {
                tracing::debug!(target: "uhc::dispatch", "Stream complete for HTTP {}", response.status());
                sink(END_OF_STREAM);
            }
            Mode::Buffered(body) => {
                let body = body.freeze();
                if response.is_ok() {
                    match success {
                        Some(SuccessHandler::Buffered(handler)) => handler(response, body),
                        // 200 with a streaming handler always selects streaming mode at headers
                        _ => tracing::error!(target: "uhc::dispatch", "No buffered handler for HTTP 200 response"),
                    }
                } else if let Some(handler) = on_non_success {
                    handler(response, body);
                }
            }
        }
        self.finish();
    }

    fn fail(&mut self, error: Error) {
        self.success = None;
        self.on_non_success = None;
        if let Some(handler) = self.on_error.take() {
            tracing::debug!(target: "uhc::dispatch", "Operation failed: {}", error);
            handler(error);
        }
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(finally) = self.on_finally.take() {
            finally();
        }
    }
}

impl ResponseEvents for Dispatcher {
    fn status(&mut self, status: u16) -> EventState {
        match std::mem::replace(&mut self.state, DispatchState::Terminal) {
            DispatchState::AwaitingStatus => {
                tracing::debug!(target: "uhc::dispatch", "Received status {}", status);
                self.state = DispatchState::AwaitingHeaders(Response::builder().status(status));
                EventState::Continue
            }
            DispatchState::Terminal => self.ignored("status"),
            _ => self.violation("status received twice"),
        }
    }

    fn headers(&mut self, headers: HeaderMap) -> EventState {
        match std::mem::replace(&mut self.state, DispatchState::Terminal) {
            DispatchState::AwaitingHeaders(builder) => {
                let response = builder.headers(headers).build();
                let mode = match self.success.take() {
                    Some(SuccessHandler::Streaming(factory)) if response.is_ok() => {
                        Mode::Streaming(factory(&response))
                    }
                    other => {
                        self.success = other;
                        Mode::Buffered(BytesMut::new())
                    }
                };
                tracing::debug!(
                    target: "uhc::dispatch",
                    status = response.status(),
                    streaming = matches!(mode, Mode::Streaming(_)),
                    "Received headers"
                );
                self.state = DispatchState::ReceivingBody { response, mode };
                EventState::Continue
            }
            DispatchState::Terminal => self.ignored("headers"),
            DispatchState::AwaitingStatus => self.violation("headers received before status"),
            DispatchState::ReceivingBody { .. } => self.violation("headers received twice"),
        }
    }

    fn body_part(&mut self, part: &[u8]) -> EventState {
        tracing::debug!(
            target: "uhc::dispatch",
            "Response body part (sz={}) =\n{}",
            part.len(),
            HexDump::new(part)
        );
        match &mut self.state {
            // an empty part would read as end of stream to a sink
            DispatchState::ReceivingBody { .. } if part.is_empty() => EventState::Continue,
            DispatchState::ReceivingBody {
                mode: Mode::Streaming(sink),
                ..
            } => {
                sink(part);
                EventState::Continue
            }
            DispatchState::ReceivingBody {
                mode: Mode::Buffered(body),
                ..
            } => {
                body.extend_from_slice(part);
                EventState::Continue
            }
            DispatchState::Terminal => self.ignored("body part"),
            _ => self.violation("body part received before headers"),
        }
    }

    fn completed(&mut self) {
        match std::mem::replace(&mut self.state, DispatchState::Terminal) {
            DispatchState::ReceivingBody { response, mode } => self.complete(response, mode),
            DispatchState::Terminal => {
                self.ignored("completion");
            }
            DispatchState::AwaitingStatus => {
                self.violation("completed before status");
            }
            DispatchState::AwaitingHeaders(_) => {
                self.violation("completed before headers");
            }
        }
    }

    fn failed(&mut self, error: Error) {
        match std::mem::replace(&mut self.state, DispatchState::Terminal) {
            DispatchState::Terminal => {
                tracing::debug!(target: "uhc::dispatch", "Ignoring failure after terminal outcome: {}", error);
            }
            _ => self.fail(error),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if self.on_error.is_some() {
            tracing::warn!(target: "uhc::dispatch", "Dispatcher dropped before a terminal event");
            self.state = DispatchState::Terminal;
            self.fail(Error::Abandoned);
        } else {
            // a terminal handler panicked before the hook ran
            self.finish();
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("phase", &self.phase())
            .field("streaming", &self.is_streaming())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::operation::{Operation, OperationBuilder};

    type Trace = Arc<Mutex<Vec<String>>>;

    fn traced(builder: OperationBuilder, trace: &Trace) -> Operation {
        let t_ns = trace.clone();
        let t_err = trace.clone();
        let t_fin = trace.clone();
        builder
            .on_non_success(move |response, body| {
                t_ns.lock().push(format!(
                    "non_success:{}:{}",
                    response.status(),
                    String::from_utf8_lossy(&body)
                ));
            })
            .on_error(move |error| t_err.lock().push(format!("error:{error}")))
            .on_finally(move || t_fin.lock().push("finally".to_string()))
            .build()
            .unwrap()
    }

    fn buffered(trace: &Trace) -> Dispatcher {
        let t = trace.clone();
        let builder = Operation::builder()
            .on_200_buffered(move |response, body| {
                t.lock().push(format!(
                    "buffered:{}:{}",
                    response.status(),
                    String::from_utf8_lossy(&body)
                ));
            })
            .unwrap();
        Dispatcher::new(traced(builder, trace).into_parts().1)
    }

    fn streaming(trace: &Trace) -> Dispatcher {
        let t = trace.clone();
        let builder = Operation::builder()
            .on_200_streaming(move |response| {
                t.lock().push(format!("sink_created:{}", response.status()));
                let t = t.clone();
                move |part: &[u8]| t.lock().push(format!("chunk:{}", String::from_utf8_lossy(part)))
            })
            .unwrap();
        Dispatcher::new(traced(builder, trace).into_parts().1)
    }

    fn events(trace: &Trace) -> Vec<String> {
        trace.lock().clone()
    }

    #[test]
    fn test_buffered_success_concatenates_chunks() {
        let trace = Trace::default();
        let mut d = buffered(&trace);

        assert_eq!(d.status(200), EventState::Continue);
        assert_eq!(d.phase(), Phase::AwaitingHeaders);
        assert_eq!(d.headers(HeaderMap::new()), EventState::Continue);
        assert!(!d.is_streaming());
        assert_eq!(d.body_part(b"ab"), EventState::Continue);
        assert_eq!(d.body_part(b"cd"), EventState::Continue);
        d.completed();

        assert!(d.is_terminal());
        assert_eq!(events(&trace), vec!["buffered:200:abcd", "finally"]);
    }

    #[test]
    fn test_streaming_success_ends_with_empty_chunk() {
        let trace = Trace::default();
        let mut d = streaming(&trace);

        d.status(200);
        d.headers(HeaderMap::new());
        assert!(d.is_streaming());
        d.body_part(b"z");
        d.completed();

        assert_eq!(
            events(&trace),
            vec!["sink_created:200", "chunk:z", "chunk:", "finally"]
        );
    }

    #[test]
    fn test_non_success_gets_status_and_body() {
        let trace = Trace::default();
        let mut d = buffered(&trace);

        d.status(404);
        d.headers(HeaderMap::new());
        d.body_part(b"err");
        d.completed();

        assert_eq!(events(&trace), vec!["non_success:404:err", "finally"]);
    }

    #[test]
    fn test_streaming_non_success_is_buffered() {
        let trace = Trace::default();
        let mut d = streaming(&trace);

        d.status(500);
        d.headers(HeaderMap::new());
        assert!(!d.is_streaming());
        d.body_part(b"oops");
        d.completed();

        assert_eq!(events(&trace), vec!["non_success:500:oops", "finally"]);
    }

    #[test]
    fn test_error_before_status() {
        let trace = Trace::default();
        let mut d = buffered(&trace);

        d.failed(Error::Connection("connection reset".to_string()));

        assert!(d.is_terminal());
        assert_eq!(
            events(&trace),
            vec!["error:Connection error: connection reset", "finally"]
        );
    }

    #[test]
    fn test_error_mid_stream() {
        let trace = Trace::default();
        let mut d = streaming(&trace);

        d.status(200);
        d.headers(HeaderMap::new());
        d.body_part(b"a");
        d.failed(Error::Timeout);

        assert_eq!(
            events(&trace),
            vec!["sink_created:200", "chunk:a", "error:Request timed out", "finally"]
        );
    }

    #[test]
    fn test_events_after_terminal_are_ignored() {
        let trace = Trace::default();
        let mut d = buffered(&trace);

        d.failed(Error::Timeout);
        assert_eq!(d.status(200), EventState::Abort);
        assert_eq!(d.body_part(b"x"), EventState::Abort);
        d.completed();
        d.failed(Error::Cancelled);

        assert_eq!(events(&trace), vec!["error:Request timed out", "finally"]);
    }

    #[test]
    fn test_body_before_headers_is_protocol_error() {
        let trace = Trace::default();
        let mut d = buffered(&trace);

        d.status(200);
        assert_eq!(d.body_part(b"x"), EventState::Abort);

        let events = events(&trace);
        assert_eq!(events.len(), 2);
        assert!(events[0].starts_with("error:Protocol violation"));
        assert_eq!(events[1], "finally");
    }

    #[test]
    fn test_completion_before_status_is_protocol_error() {
        let trace = Trace::default();
        let mut d = buffered(&trace);

        d.completed();

        let events = events(&trace);
        assert!(events[0].starts_with("error:Protocol violation"));
        assert_eq!(events[1], "finally");
    }

    #[test]
    fn test_empty_parts_are_not_forwarded() {
        let trace = Trace::default();
        let mut d = streaming(&trace);

        d.status(200);
        d.headers(HeaderMap::new());
        d.body_part(b"");
        d.body_part(b"q");
        d.completed();

        assert_eq!(
            events(&trace),
            vec!["sink_created:200", "chunk:q", "chunk:", "finally"]
        );
    }

    #[test]
    fn test_drop_before_terminal_abandons() {
        let trace = Trace::default();
        let mut d = buffered(&trace);
        d.status(200);
        drop(d);

        assert_eq!(
            events(&trace),
            vec!["error:Operation was abandoned before completion", "finally"]
        );
    }

    #[test]
    fn test_finally_runs_when_handler_panics() {
        let trace = Trace::default();
        let t = trace.clone();
        let op = Operation::builder()
            .on_200_buffered(|_, _| panic!("handler failure"))
            .unwrap()
            .on_finally(move || t.lock().push("finally".to_string()))
            .build()
            .unwrap();
        let mut d = Dispatcher::new(op.into_parts().1);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            d.status(200);
            d.headers(HeaderMap::new());
            d.completed();
        }));

        assert!(result.is_err());
        assert_eq!(events(&trace), vec!["finally"]);
    }

    #[test]
    fn test_finally_is_optional() {
        let trace = Trace::default();
        let t = trace.clone();
        let op = Operation::builder()
            .on_200_buffered(move |_, body| t.lock().push(format!("len:{}", body.len())))
            .unwrap()
            .build()
            .unwrap();
        let mut d = Dispatcher::new(op.into_parts().1);

        d.status(200);
        d.headers(HeaderMap::new());
        d.completed();

        assert_eq!(events(&trace), vec!["len:0"]);
    }

    #[test]
    fn test_dispatcher_is_send() {
        fn is_send<T: Send>() {}
        is_send::<Dispatcher>();
    }
}
