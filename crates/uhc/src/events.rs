//! Transport event sink (push model).
//!
//! Events: status → headers → body_part (×n) → completed / failed.

use http::HeaderMap;

use crate::error::Error;

/// What the transport should do after delivering an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventState {
    /// Keep delivering events for this exchange.
    Continue,
    /// Stop reading; the sink has already reached a terminal outcome.
    Abort,
}

impl EventState {
    /// Check if the transport should keep going.
    pub fn is_continue(self) -> bool {
        self == Self::Continue
    }
}

/// Receiver of the events a transport produces for one request.
///
/// A transport calls these in order, from one task at a time:
/// 1. `status(code)` once the status line is known
/// 2. `headers(map)` once the header block is complete
/// 3. `body_part(bytes)` for each chunk of body data, in transmission order
/// 4. `completed()` when the body is fully read
///
/// On connection, timeout, or read failure at any point only `failed(error)` is called.
/// Nothing is delivered after `completed` or `failed`.
pub trait ResponseEvents {
    /// Called when the response status is received.
    fn status(&mut self, status: u16) -> EventState;

    /// Called when all response headers are received.
    fn headers(&mut self, headers: HeaderMap) -> EventState;

    /// Called for each chunk of body data. Data is only valid for the duration of the call.
    fn body_part(&mut self, part: &[u8]) -> EventState;

    /// Called when the response is fully complete.
    fn completed(&mut self);

    /// Called when the request fails.
    fn failed(&mut self, error: Error);
}
