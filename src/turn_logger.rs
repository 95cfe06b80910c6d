//! Logging trait for model invocations.
//!
//! This module provides the [`TurnLogger`] trait that allows users to capture
//! every request the [`MessagesClient`](crate::MessagesClient) sends and everything
//! it streams back.

use crate::adapter::ModelResponse;
use crate::sse::StreamEvent;

/// A trait for logging model invocations.
///
/// # Example
///
/// ```rust,ignore
/// use chatwindow::{ModelResponse, StreamEvent, TurnLogger};
/// use std::io::Write;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl TurnLogger for FileLogger {
///     fn log_request(&self, body: &serde_json::Value) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Request: {body}").unwrap();
///     }
///
///     fn log_stream_event(&self, event: &StreamEvent) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Stream event: {event:?}").unwrap();
///     }
///
///     fn log_response(&self, response: &ModelResponse) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Response: {}", response.text).unwrap();
///     }
/// }
/// ```
pub trait TurnLogger: Send + Sync {
    /// Log the JSON body of an outgoing request.
    ///
    /// Image payloads are included verbatim, so bodies can be large.
    fn log_request(&self, body: &serde_json::Value);

    /// Log an individual streaming event.
    fn log_stream_event(&self, event: &StreamEvent);

    /// Log the aggregated response once a stream completes successfully.
    fn log_response(&self, response: &ModelResponse);
}
